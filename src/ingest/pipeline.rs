use anyhow::anyhow;
use async_trait::async_trait;
use log::{info, warn};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{parse_extraction, ExtractionSource, RawExtraction};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::models::{DraftReceipt, LineItem, ReceiptDate};

pub const UNKNOWN_MERCHANT: &str = "Unknown Store";
pub const DEFAULT_CATEGORY: &str = "General";
pub const SCANNED_ITEM: &str = "Scanned item";
const UNNAMED_ITEM: &str = "Item";

/// The vision/LLM receipt reader. Returns the model's raw text reply.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, source: &ExtractionSource) -> anyhow::Result<String>;
}

/// Turns captured bytes into a scored draft awaiting user confirmation.
pub struct IngestionPipeline {
    extractor: Arc<dyn Extractor>,
    timeout: Option<Duration>,
}

impl IngestionPipeline {
    pub fn new(extractor: Arc<dyn Extractor>, config: &EngineConfig) -> Self {
        Self {
            extractor,
            timeout: config.extraction_timeout,
        }
    }

    /// Extract, parse and build a draft.
    ///
    /// Once `cancel` fires no draft is returned, even if the collaborator
    /// already answered.
    pub async fn scan(
        &self,
        source: ExtractionSource,
        cancel: &CancellationToken,
    ) -> Result<DraftReceipt> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Scan cancelled during extraction");
                return Err(Error::Cancelled);
            }
            reply = self.extract(&source) => reply?,
        };

        if cancel.is_cancelled() {
            info!("Scan cancelled after extraction; discarding reply");
            return Err(Error::Cancelled);
        }

        let raw = parse_extraction(&text).map_err(|e| {
            warn!("Unparseable extraction reply: {e:#}");
            Error::extraction(e)
        })?;
        let image_url = source.is_image().then(|| source.data_url());
        Ok(build_draft(raw, image_url, ReceiptDate::today()))
    }

    async fn extract(&self, source: &ExtractionSource) -> Result<String> {
        let call = self.extractor.extract(source);
        let reply = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| Err(anyhow!("timed out after {}ms", limit.as_millis()))),
            None => call.await,
        };
        reply.map_err(|e| {
            warn!("Extraction failed: {e:#}");
            Error::extraction(e)
        })
    }
}

/// Fill every gap in `raw` with its default and score the result.
///
/// `today` stands in for a missing or unreadable date.
pub fn build_draft(
    raw: RawExtraction,
    image_url: Option<String>,
    today: ReceiptDate,
) -> DraftReceipt {
    let amount = raw.total.unwrap_or(Decimal::ZERO);

    let date = match raw.date.as_deref() {
        Some(text) => ReceiptDate::parse(text).unwrap_or_else(|| {
            warn!("Unreadable receipt date '{text}', using {today}");
            today
        }),
        None => today,
    };

    let mut items: Vec<LineItem> = raw
        .items
        .into_iter()
        .map(|item| LineItem {
            description: item.description.unwrap_or_else(|| UNNAMED_ITEM.to_string()),
            quantity: item.quantity,
            price: item.price.unwrap_or(Decimal::ZERO),
        })
        .collect();
    if items.is_empty() {
        items.push(LineItem::new(SCANNED_ITEM, amount));
    }

    let mut draft = DraftReceipt {
        merchant: raw.merchant.unwrap_or_else(|| UNKNOWN_MERCHANT.to_string()),
        date,
        category: raw.category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        amount,
        score: 0,
        items,
        subtotal: raw.subtotal.unwrap_or(Decimal::ZERO),
        tax: raw.tax.unwrap_or(Decimal::ZERO),
        discount: raw.discount.filter(|d| !d.is_zero()),
        tip: raw.tip.filter(|t| !t.is_zero()),
        payment_method: raw.payment_method,
        image_url,
    };
    draft.rescore();
    draft
}
