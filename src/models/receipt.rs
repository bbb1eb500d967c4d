use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CategoryId, ReceiptDate, ReceiptId};
use crate::error::{Error, Result};
use crate::scoring;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    /// Positive when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    pub price: Decimal,
}

impl LineItem {
    pub fn new<S: Into<String>>(description: S, price: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity: None,
            price,
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = (quantity > 0).then_some(quantity);
        self
    }
}

/// Likelihood band used by the tax report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOffClass {
    Likely,
    Possibly,
    NeedsReview,
}

impl WriteOffClass {
    pub fn from_score(score: u8) -> Self {
        match score {
            70.. => Self::Likely,
            40..=69 => Self::Possibly,
            _ => Self::NeedsReview,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Likely => "Likely business-related",
            Self::Possibly => "Possibly business-related",
            Self::NeedsReview => "Needs review",
        }
    }
}

impl std::fmt::Display for WriteOffClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A confirmed, persisted receipt.
///
/// `id`, `score` and `folder_id` are only changed by the repository and the
/// assignment service; everything else is plain content.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub(crate) id: ReceiptId,
    pub merchant: String,
    pub date: ReceiptDate,
    /// Semantic tag such as "Food" or "Travel", not the user's folder.
    pub category: String,
    pub amount: Decimal,
    pub(crate) score: u8,
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Option<Decimal>,
    pub tip: Option<Decimal>,
    pub payment_method: Option<String>,
    pub image_url: Option<String>,
    pub(crate) folder_id: Option<CategoryId>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Receipt {
    pub(crate) fn from_draft(draft: DraftReceipt, now: DateTime<Utc>) -> Self {
        Self {
            id: ReceiptId::generate(),
            merchant: draft.merchant,
            date: draft.date,
            category: draft.category,
            amount: draft.amount,
            score: draft.score,
            items: draft.items,
            subtotal: draft.subtotal,
            tax: draft.tax,
            discount: draft.discount,
            tip: draft.tip,
            payment_method: draft.payment_method,
            image_url: draft.image_url,
            folder_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> ReceiptId {
        self.id
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    /// `None` means unsorted.
    pub fn folder_id(&self) -> Option<CategoryId> {
        self.folder_id
    }

    pub fn is_unsorted(&self) -> bool {
        self.folder_id.is_none()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn classification(&self) -> WriteOffClass {
        WriteOffClass::from_score(self.score)
    }

    /// `amount - (subtotal + tax)`. Discounts and tips make this non-zero on
    /// legitimate receipts, so it is reported, never enforced.
    pub fn totals_drift(&self) -> Decimal {
        self.amount - (self.subtotal + self.tax)
    }

    pub(crate) fn rescore(&mut self) {
        self.score = scoring::score_receipt(&self.category, &self.merchant, self.amount, &self.items);
    }

    pub(crate) fn validate(&self) -> Result<()> {
        check_content(
            &self.merchant,
            self.amount,
            &self.items,
            &[Some(self.subtotal), Some(self.tax), self.discount, self.tip],
        )
    }
}

/// A receipt-shaped value awaiting user confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftReceipt {
    pub merchant: String,
    pub date: ReceiptDate,
    pub category: String,
    pub amount: Decimal,
    pub(crate) score: u8,
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Option<Decimal>,
    pub tip: Option<Decimal>,
    pub payment_method: Option<String>,
    pub image_url: Option<String>,
}

impl DraftReceipt {
    /// Manual entry: subtotal defaults to the amount, tax to zero, and the
    /// interactive score is computed immediately.
    pub fn new<M, C>(
        merchant: M,
        date: ReceiptDate,
        category: C,
        amount: Decimal,
        items: Vec<LineItem>,
    ) -> Self
    where
        M: Into<String>,
        C: Into<String>,
    {
        let mut draft = Self {
            merchant: merchant.into(),
            date,
            category: category.into(),
            amount,
            score: 0,
            items,
            subtotal: amount,
            tax: Decimal::ZERO,
            discount: None,
            tip: None,
            payment_method: None,
            image_url: None,
        };
        draft.rescore();
        draft
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    /// Recompute the interactive score after the user edited the draft.
    pub fn rescore(&mut self) {
        self.score = scoring::score_receipt(&self.category, &self.merchant, self.amount, &self.items);
    }

    pub(crate) fn validate(&self) -> Result<()> {
        check_content(
            &self.merchant,
            self.amount,
            &self.items,
            &[Some(self.subtotal), Some(self.tax), self.discount, self.tip],
        )
    }
}

/// Content edits applied by `ReceiptRepository::update_receipt`.
/// Nested options clear an optional field when set to `Some(None)`.
#[derive(Debug, Clone, Default)]
pub struct ReceiptEdit {
    pub merchant: Option<String>,
    pub date: Option<ReceiptDate>,
    pub category: Option<String>,
    pub amount: Option<Decimal>,
    pub items: Option<Vec<LineItem>>,
    pub subtotal: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub discount: Option<Option<Decimal>>,
    pub tip: Option<Option<Decimal>>,
    pub payment_method: Option<Option<String>>,
}

impl ReceiptEdit {
    pub(crate) fn apply_to(self, receipt: &mut Receipt) {
        if let Some(merchant) = self.merchant {
            receipt.merchant = merchant;
        }
        if let Some(date) = self.date {
            receipt.date = date;
        }
        if let Some(category) = self.category {
            receipt.category = category;
        }
        if let Some(amount) = self.amount {
            receipt.amount = amount;
        }
        if let Some(items) = self.items {
            receipt.items = items;
        }
        if let Some(subtotal) = self.subtotal {
            receipt.subtotal = subtotal;
        }
        if let Some(tax) = self.tax {
            receipt.tax = tax;
        }
        if let Some(discount) = self.discount {
            receipt.discount = discount;
        }
        if let Some(tip) = self.tip {
            receipt.tip = tip;
        }
        if let Some(payment_method) = self.payment_method {
            receipt.payment_method = payment_method;
        }
    }
}

fn check_content(
    merchant: &str,
    amount: Decimal,
    items: &[LineItem],
    other_amounts: &[Option<Decimal>],
) -> Result<()> {
    if merchant.trim().is_empty() {
        return Err(Error::validation("merchant is required"));
    }
    if amount < Decimal::ZERO {
        return Err(Error::validation(format!("amount {amount} is negative")));
    }
    if let Some(bad) = other_amounts
        .iter()
        .flatten()
        .find(|v| **v < Decimal::ZERO)
    {
        return Err(Error::validation(format!("negative amount {bad}")));
    }
    for item in items {
        if item.price < Decimal::ZERO {
            return Err(Error::validation(format!(
                "line item '{}' has negative price",
                item.description
            )));
        }
        if item.quantity == Some(0) {
            return Err(Error::validation(format!(
                "line item '{}' has zero quantity",
                item.description
            )));
        }
    }
    Ok(())
}
