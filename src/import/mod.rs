//! Bulk receipt ingestion from structured CSV exports.

mod csv_import;

pub use csv_import::{
    draft_from_row, import_csv, import_file, read_rows, CsvRow, CsvRows, ImportOutcome,
    RowRejection, DEFAULT_CATEGORY,
};
