//! Receipt ingestion: hand captured bytes to the extraction collaborator,
//! read its loosely typed reply, and build a scored [`DraftReceipt`].
//!
//! [`DraftReceipt`]: crate::models::DraftReceipt

mod extraction;
mod pipeline;

pub use extraction::{parse_extraction, ExtractionSource, RawExtraction, RawLineItem};
pub use pipeline::{
    build_draft, Extractor, IngestionPipeline, DEFAULT_CATEGORY, SCANNED_ITEM, UNKNOWN_MERCHANT,
};
