//! Write-off likelihood heuristics.
//!
//! Two scorers live here and are deliberately kept apart: [`score_receipt`]
//! runs on the scan-and-confirm path where merchant, amount and line items
//! are known, while [`score_bulk`] runs on structured bulk ingestion where
//! only a category string and a vendor name are available. Their keyword
//! tables and weights differ, so they produce different scores for the same
//! receipt.

use log::debug;
use rust_decimal::Decimal;

use crate::models::LineItem;

/// A keyword list and the adjustment it contributes when any keyword is a
/// substring of the (lowercased) haystack.
struct KeywordGroup {
    keywords: &'static [&'static str],
    adjustment: i32,
}

impl KeywordGroup {
    fn matches(&self, haystack: &str) -> bool {
        self.keywords.iter().any(|k| haystack.contains(k))
    }
}

/// First matching group wins, in this order.
const MERCHANT_GROUPS: &[KeywordGroup] = &[
    KeywordGroup {
        keywords: &["office", "depot", "staples", "fedex", "ups", "usps"],
        adjustment: 15,
    },
    KeywordGroup {
        keywords: &["airline", "hotel", "rental", "uber", "lyft"],
        adjustment: 10,
    },
    KeywordGroup {
        keywords: &["shell", "chevron", "exxon", "bp ", "gas"],
        adjustment: 5,
    },
    KeywordGroup {
        keywords: &["grocery", "safeway", "walmart", "target", "costco"],
        adjustment: -10,
    },
    KeywordGroup {
        keywords: &["restaurant", "cafe", "coffee", "starbucks"],
        adjustment: -5,
    },
];

const ITEM_GROUPS: &[KeywordGroup] = &[
    KeywordGroup {
        keywords: &["paper", "ink", "folder", "pen", "notebook", "envelope"],
        adjustment: 5,
    },
    KeywordGroup {
        keywords: &["candy", "soda", "chips", "personal"],
        adjustment: -5,
    },
];

const BULK_BASE: i32 = 50;

/// Unlike the merchant groups, every band is checked independently.
const BULK_CATEGORY_BANDS: &[KeywordGroup] = &[
    KeywordGroup {
        keywords: &[
            "software",
            "office supplies",
            "advertising",
            "professional services",
            "subscriptions",
            "business travel",
            "equipment",
        ],
        adjustment: 30,
    },
    KeywordGroup {
        keywords: &["meals", "entertainment", "transport", "utilities", "internet", "phone"],
        adjustment: 15,
    },
    KeywordGroup {
        keywords: &["personal", "grocery", "clothing", "health"],
        adjustment: -20,
    },
];

const BULK_BUSINESS_VENDORS: KeywordGroup = KeywordGroup {
    keywords: &[
        "stripe",
        "paypal",
        "square",
        "shopify",
        "aws",
        "azure",
        "google cloud",
        "digitalocean",
        "github",
        "adobe",
        "microsoft",
        "apple developer",
        "uber",
        "lyft",
        "delta",
        "united",
        "american airlines",
        "hilton",
        "marriott",
        "hyatt",
        "airbnb",
        "fedex",
        "ups",
        "usps",
        "staples",
        "office depot",
    ],
    adjustment: 20,
};

/// Components of an interactive score, before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub base: i32,
    pub merchant: i32,
    pub amount: i32,
    pub items: i32,
}

impl ScoreBreakdown {
    pub fn raw_total(&self) -> i32 {
        self.base + self.merchant + self.amount + self.items
    }

    pub fn score(&self) -> u8 {
        clamp_score(self.raw_total())
    }
}

/// Interactive write-off score in `[0, 100]`.
pub fn score_receipt(category: &str, merchant: &str, amount: Decimal, items: &[LineItem]) -> u8 {
    let breakdown = score_breakdown(category, merchant, amount, items);
    let score = breakdown.score();
    debug!("Scored {merchant:?} ({category}, {amount}): {breakdown:?} -> {score}");
    score
}

pub fn score_breakdown(
    category: &str,
    merchant: &str,
    amount: Decimal,
    items: &[LineItem],
) -> ScoreBreakdown {
    ScoreBreakdown {
        base: base_for_category(category),
        merchant: first_match(MERCHANT_GROUPS, &merchant.to_lowercase()),
        amount: amount_adjustment(amount),
        items: item_adjustment(items),
    }
}

/// Coarse score for bulk/API ingestion, in `[0, 100]`.
pub fn score_bulk(category: &str, vendor: &str) -> u8 {
    let category = category.to_lowercase();
    let vendor = vendor.to_lowercase();

    let mut score = BULK_BASE;
    for band in BULK_CATEGORY_BANDS {
        if band.matches(&category) {
            score += band.adjustment;
        }
    }
    if BULK_BUSINESS_VENDORS.matches(&vendor) {
        score += BULK_BUSINESS_VENDORS.adjustment;
    }
    clamp_score(score)
}

// Exact, case-sensitive names as produced by the extraction prompt.
fn base_for_category(category: &str) -> i32 {
    match category {
        "Supplies" => 75,
        "Travel" => 70,
        "Fuel" => 65,
        "Food" => 40,
        _ => 50,
    }
}

fn amount_adjustment(amount: Decimal) -> i32 {
    if amount < Decimal::from(75) {
        -5
    } else if amount > Decimal::from(500) {
        5
    } else if amount > Decimal::from(200) {
        2
    } else {
        0
    }
}

fn item_adjustment(items: &[LineItem]) -> i32 {
    if items.is_empty() {
        return 0;
    }
    let descriptions = items
        .iter()
        .map(|i| i.description.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    first_match(ITEM_GROUPS, &descriptions)
}

fn first_match(groups: &[KeywordGroup], haystack: &str) -> i32 {
    groups
        .iter()
        .find(|g| g.matches(haystack))
        .map_or(0, |g| g.adjustment)
}

fn clamp_score(raw: i32) -> u8 {
    // Clamped to 0..=100 first, so the cast cannot truncate.
    raw.clamp(0, 100) as u8
}
