//! Reseet: receipt write-off scoring, category filing and swipe triage.
//!
//! The crate is the headless core of a receipt manager. A host supplies an
//! [`Extractor`] for the vision step and a [`ReceiptStore`] for durability;
//! everything else (scoring, filing, undo, the triage gesture machine and
//! the tax report field set) lives here.

pub mod assignment;
pub mod config;
pub mod error;
pub mod import;
pub mod ingest;
pub mod models;
pub mod report;
pub mod repository;
pub mod scoring;
pub mod store;
pub mod triage;

pub use assignment::{CategoryAssignmentService, UndoTarget};
pub use config::{default_database_path, init_logging, EngineConfig, SeedCategory};
pub use error::{Error, Result};
pub use ingest::{ExtractionSource, Extractor, IngestionPipeline};
pub use models::{
    Category, CategoryId, CategoryUpdate, DraftReceipt, LineItem, Receipt, ReceiptDate,
    ReceiptEdit, ReceiptId, UserId, WriteOffClass,
};
pub use report::{ReportRow, ReportSummary, ReportWindow};
pub use repository::{CategoryDeletion, ReceiptRepository};
pub use scoring::{score_bulk, score_receipt};
pub use store::{MemoryStore, ReceiptStore, SqliteStore};
pub use triage::{CategoryAnchor, DropOutcome, Point, TriageSession, TriageState};
