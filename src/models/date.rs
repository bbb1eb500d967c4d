use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display contract for receipt dates, e.g. `Jan 5, 2024`.
pub const DISPLAY_FORMAT: &str = "%b %-d, %Y";

/// Storage contract for receipt dates.
pub const STORAGE_FORMAT: &str = "%Y-%m-%d";

// Two-digit years must be tried before four-digit ones: `%Y` happily reads
// "24" as the year 24.
const PARSE_FORMATS: &[&str] = &[
    "%b %d, %Y",
    "%b %d %Y",
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%m-%d-%Y",
];

/// Calendar date of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptDate(NaiveDate);

impl ReceiptDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    /// Accepts the display format, ISO dates and the common US layouts.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }
        PARSE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
            .map(Self)
    }

    pub fn naive(&self) -> NaiveDate {
        self.0
    }

    pub fn to_storage(&self) -> String {
        self.0.format(STORAGE_FORMAT).to_string()
    }
}

impl fmt::Display for ReceiptDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DISPLAY_FORMAT))
    }
}

impl From<NaiveDate> for ReceiptDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}
