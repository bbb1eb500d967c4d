//! Storage-shaped rows and the lossless transform to and from the domain
//! types. Field names follow the snake_case column names of the backing
//! tables.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{
    Category, CategoryId, LineItem, Receipt, ReceiptDate, ReceiptId, STORAGE_FORMAT,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptRow {
    pub id: String,
    pub merchant: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub category: String,
    pub amount: Decimal,
    pub score: i64,
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Option<Decimal>,
    pub tip: Option<Decimal>,
    pub payment_method: Option<String>,
    pub image_url: Option<String>,
    pub folder_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRow {
    pub id: String,
    pub label: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Receipt> for ReceiptRow {
    fn from(r: &Receipt) -> Self {
        Self {
            id: r.id.to_string(),
            merchant: r.merchant.clone(),
            date: r.date.to_storage(),
            category: r.category.clone(),
            amount: r.amount,
            score: i64::from(r.score),
            items: r.items.clone(),
            subtotal: r.subtotal,
            tax: r.tax,
            discount: r.discount,
            tip: r.tip,
            payment_method: r.payment_method.clone(),
            image_url: r.image_url.clone(),
            folder_id: r.folder_id.map(|f| f.to_string()),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

impl TryFrom<ReceiptRow> for Receipt {
    type Error = anyhow::Error;

    fn try_from(row: ReceiptRow) -> Result<Self> {
        let id: ReceiptId = row
            .id
            .parse()
            .with_context(|| format!("Invalid receipt id '{}'", row.id))?;
        let date = NaiveDate::parse_from_str(&row.date, STORAGE_FORMAT)
            .with_context(|| format!("Receipt {}: invalid date '{}'", row.id, row.date))?;
        let folder_id = row
            .folder_id
            .as_deref()
            .map(str::parse::<CategoryId>)
            .transpose()
            .with_context(|| format!("Receipt {}: invalid folder_id", row.id))?;
        // Score is derived data; an out-of-range stored value is clamped.
        let score = row.score.clamp(0, 100) as u8;

        Ok(Receipt {
            id,
            merchant: row.merchant,
            date: ReceiptDate::new(date),
            category: row.category,
            amount: row.amount,
            score,
            items: row.items,
            subtotal: row.subtotal,
            tax: row.tax,
            discount: row.discount,
            tip: row.tip,
            payment_method: row.payment_method,
            image_url: row.image_url,
            folder_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl From<&Category> for CategoryRow {
    fn from(c: &Category) -> Self {
        Self {
            id: c.id.to_string(),
            label: c.label.clone(),
            color: c.color.clone(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

impl TryFrom<CategoryRow> for Category {
    type Error = anyhow::Error;

    fn try_from(row: CategoryRow) -> Result<Self> {
        let id: CategoryId = row
            .id
            .parse()
            .with_context(|| format!("Invalid category id '{}'", row.id))?;
        Ok(Category {
            id,
            label: row.label,
            color: row.color,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
