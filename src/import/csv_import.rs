use anyhow::Context;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::models::{DraftReceipt, LineItem, ReceiptDate};
use crate::scoring;

pub const DEFAULT_CATEGORY: &str = "Uncategorized";
const ROW_ITEM: &str = "Item";
const REQUIRED_COLUMNS: [&str; 3] = ["vendor", "date", "total"];

/// One data row, cells trimmed. `line` is the 1-based line in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow {
    pub line: usize,
    pub vendor: String,
    pub date: String,
    pub total: String,
    pub tax: String,
    pub currency: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRejection {
    pub line: usize,
    pub reason: String,
}

/// Decoded rows plus the records that could not be decoded.
#[derive(Debug, Default)]
pub struct CsvRows {
    pub rows: Vec<CsvRow>,
    pub rejected: Vec<RowRejection>,
}

/// Result of a bulk import. Rejected rows never stop the batch.
#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub drafts: Vec<DraftReceipt>,
    pub rejected: Vec<RowRejection>,
}

#[derive(Debug)]
struct Columns {
    vendor: usize,
    date: usize,
    total: usize,
    tax: Option<usize>,
    currency: Option<usize>,
    category: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|name| find(*name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Error::validation(format!(
                "CSV header is missing column(s): {}",
                missing.join(", ")
            )));
        }
        Ok(Self {
            vendor: find("vendor").unwrap_or_default(),
            date: find("date").unwrap_or_default(),
            total: find("total").unwrap_or_default(),
            tax: find("tax"),
            currency: find("currency"),
            category: find("category"),
        })
    }
}

/// Read a headered CSV (`vendor,date,total[,tax,currency,category]`, any
/// order, header names case-insensitive). A record that is not valid UTF-8
/// is rejected on its own; only an unreadable header or an I/O error fails
/// the whole file.
pub fn read_rows<R: Read>(reader: R) -> Result<CsvRows> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| Error::validation(format!("Failed to read CSV header: {e}")))?
        .clone();
    let columns = Columns::from_headers(&headers)?;

    let mut out = CsvRows::default();
    for (i, result) in rdr.byte_records().enumerate() {
        let raw =
            result.map_err(|e| Error::validation(format!("Failed to read CSV record: {e}")))?;
        let line = raw.position().map(|p| p.line() as usize).unwrap_or(i + 2);
        let record = match csv::StringRecord::from_byte_record(raw) {
            Ok(record) => record,
            Err(e) => {
                warn!("CSV line {line} is not valid UTF-8: {}", e.utf8_error());
                out.rejected.push(RowRejection {
                    line,
                    reason: format!("Row {line}: not valid UTF-8 ({})", e.utf8_error()),
                });
                continue;
            }
        };
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let cell = |idx: Option<usize>| {
            idx.and_then(|c| record.get(c))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        out.rows.push(CsvRow {
            line,
            vendor: cell(Some(columns.vendor)),
            date: cell(Some(columns.date)),
            total: cell(Some(columns.total)),
            tax: cell(columns.tax),
            currency: cell(columns.currency),
            category: cell(columns.category),
        });
    }

    debug!(
        "Read {} CSV receipt rows, {} undecodable",
        out.rows.len(),
        out.rejected.len()
    );
    Ok(out)
}

/// Validate one row and turn it into a draft scored with the coarse bulk
/// scorer.
pub fn draft_from_row(row: &CsvRow) -> Result<DraftReceipt> {
    let line = row.line;
    if row.vendor.is_empty() {
        return Err(Error::validation(format!("Row {line}: vendor is required")));
    }
    if row.date.is_empty() {
        return Err(Error::validation(format!("Row {line}: date is required")));
    }
    if row.total.is_empty() {
        return Err(Error::validation(format!("Row {line}: total is required")));
    }

    let date = ReceiptDate::parse(&row.date).ok_or_else(|| {
        Error::validation(format!("Row {line}: could not parse date '{}'", row.date))
    })?;
    let total = parse_amount(&row.total)
        .map_err(|e| Error::validation(format!("Row {line}: total: {e}")))?;
    if total < Decimal::ZERO {
        return Err(Error::validation(format!(
            "Row {line}: total {total} is negative"
        )));
    }
    let tax = parse_amount(&row.tax)
        .map_err(|e| Error::validation(format!("Row {line}: tax: {e}")))?;
    if tax < Decimal::ZERO {
        return Err(Error::validation(format!("Row {line}: tax {tax} is negative")));
    }
    if !row.currency.is_empty() && !row.currency.eq_ignore_ascii_case("USD") {
        warn!(
            "Row {line}: currency {} is recorded as-is without conversion",
            row.currency
        );
    }

    let category = if row.category.is_empty() {
        DEFAULT_CATEGORY.to_string()
    } else {
        row.category.clone()
    };

    Ok(DraftReceipt {
        score: scoring::score_bulk(&category, &row.vendor),
        merchant: row.vendor.clone(),
        date,
        category,
        amount: total,
        items: vec![LineItem::new(ROW_ITEM, total)],
        subtotal: (total - tax).max(Decimal::ZERO),
        tax,
        discount: None,
        tip: None,
        payment_method: None,
        image_url: None,
    })
}

/// Read and convert every row, collecting rejections per row.
pub fn import_csv<R: Read>(reader: R) -> Result<ImportOutcome> {
    let CsvRows { rows, rejected } = read_rows(reader)?;
    let mut outcome = ImportOutcome {
        drafts: Vec::new(),
        rejected,
    };
    for row in rows {
        match draft_from_row(&row) {
            Ok(draft) => outcome.drafts.push(draft),
            Err(e) => {
                debug!("Rejected CSV row {}: {e}", row.line);
                outcome.rejected.push(RowRejection {
                    line: row.line,
                    reason: e.to_string(),
                });
            }
        }
    }
    outcome.rejected.sort_by_key(|r| r.line);
    info!(
        "CSV import: {} accepted, {} rejected",
        outcome.drafts.len(),
        outcome.rejected.len()
    );
    Ok(outcome)
}

pub fn import_file(path: &Path) -> Result<ImportOutcome> {
    let file = std::fs::File::open(path).map_err(|e| {
        Error::validation(format!("Failed to open CSV file {}: {e}", path.display()))
    })?;
    import_csv(file)
}

/// Money cell: `$` and thousands separators allowed, accounting-style
/// `(12.00)` is negative, blank is zero.
fn parse_amount(cell: &str) -> anyhow::Result<Decimal> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let (negative, body) = match cell.strip_prefix('(').and_then(|c| c.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, cell),
    };
    let digits: String = body.chars().filter(|c| !matches!(c, '$' | ',')).collect();
    let value = Decimal::from_str(digits.trim())
        .with_context(|| format!("'{cell}' is not a number"))?;
    Ok(if negative { -value } else { value })
}

#[cfg(test)]
#[path = "csv_import_tests.rs"]
mod tests;
