//! Tax-report field set handed to the export collaborator.

use anyhow::{Context, Result};
use chrono::{Days, Months, NaiveDate};
use log::info;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

use crate::models::{Receipt, WriteOffClass};
use crate::repository::ReceiptRepository;

/// Look-back period for a report, relative to "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportWindow {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
    /// Last N days; zero is treated as one.
    CustomDays(u32),
}

impl ReportWindow {
    /// Earliest receipt date included in the report.
    pub fn cutoff(&self, today: NaiveDate) -> NaiveDate {
        let cutoff = match self {
            Self::Weekly => today.checked_sub_days(Days::new(7)),
            Self::Monthly => today.checked_sub_months(Months::new(1)),
            Self::Quarterly => today.checked_sub_months(Months::new(3)),
            Self::Yearly => today.checked_sub_months(Months::new(12)),
            Self::CustomDays(n) => today.checked_sub_days(Days::new(u64::from((*n).max(1)))),
        };
        cutoff.unwrap_or(NaiveDate::MIN)
    }
}

/// One exported line. Column names are part of the export contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "Receipt ID")]
    pub receipt_id: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Merchant/Vendor")]
    pub merchant: String,
    #[serde(rename = "Amount")]
    pub amount: Decimal,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Subtotal")]
    pub subtotal: Decimal,
    #[serde(rename = "Tax")]
    pub tax: Decimal,
    #[serde(rename = "Classification")]
    pub classification: String,
    #[serde(rename = "Write-off Likelihood")]
    pub likelihood: String,
    /// Always empty; reserved for the accountant.
    #[serde(rename = "Audit Notes")]
    pub audit_notes: String,
}

impl From<&Receipt> for ReportRow {
    fn from(r: &Receipt) -> Self {
        let description = if r.items.is_empty() {
            "No items".to_string()
        } else {
            r.items
                .iter()
                .map(|i| i.description.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        Self {
            receipt_id: r.id().to_string(),
            date: r.date.to_string(),
            merchant: r.merchant.clone(),
            amount: r.amount,
            category: r.category.clone(),
            description,
            subtotal: r.subtotal,
            tax: r.tax,
            classification: r.classification().to_string(),
            likelihood: format!("{}%", r.score()),
            audit_notes: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    pub count: usize,
    pub total_amount: Decimal,
    pub total_tax: Decimal,
    pub likely: usize,
    pub possibly: usize,
    pub needs_review: usize,
}

impl ReportSummary {
    pub fn from_receipts<'a, I>(receipts: I) -> Self
    where
        I: IntoIterator<Item = &'a Receipt>,
    {
        let mut summary = Self::default();
        for r in receipts {
            summary.count += 1;
            summary.total_amount += r.amount;
            summary.total_tax += r.tax;
            match r.classification() {
                WriteOffClass::Likely => summary.likely += 1,
                WriteOffClass::Possibly => summary.possibly += 1,
                WriteOffClass::NeedsReview => summary.needs_review += 1,
            }
        }
        summary
    }
}

/// Receipts dated within `window`, oldest first.
pub fn receipts_in_window(
    repo: &ReceiptRepository,
    window: ReportWindow,
    today: NaiveDate,
) -> Vec<&Receipt> {
    repo.receipts_since(window.cutoff(today))
}

/// Write a header and one row per receipt. Returns the number of rows.
pub fn write_csv<'a, W, I>(writer: W, receipts: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a Receipt>,
{
    let mut wtr = csv::Writer::from_writer(writer);
    let mut count = 0;
    for receipt in receipts {
        wtr.serialize(ReportRow::from(receipt))
            .with_context(|| format!("Failed to write report row for {}", receipt.id()))?;
        count += 1;
    }
    if count == 0 {
        // serialize() emits the header with the first row
        wtr.write_record(HEADER).context("Failed to write report header")?;
    }
    wtr.flush().context("Failed to flush report")?;
    info!("Wrote tax report with {count} receipts");
    Ok(count)
}

const HEADER: [&str; 11] = [
    "Receipt ID",
    "Date",
    "Merchant/Vendor",
    "Amount",
    "Category",
    "Description",
    "Subtotal",
    "Tax",
    "Classification",
    "Write-off Likelihood",
    "Audit Notes",
];
