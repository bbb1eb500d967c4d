use chrono::{DateTime, Utc};
use regex::Regex;

use super::CategoryId;
use crate::error::{Error, Result};

const HEX_COLOR: &str = "^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$";

/// A user-created folder receipts are filed into.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub(crate) id: CategoryId,
    pub label: String,
    pub color: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Category {
    pub(crate) fn new(label: String, color: String, now: DateTime<Utc>) -> Self {
        Self {
            id: CategoryId::generate(),
            label,
            color,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> CategoryId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Find a category by label (case-insensitive) in a slice. Labels are not
    /// unique; the first match in list order wins.
    pub fn find_by_label<'a>(categories: &'a [Category], label: &str) -> Option<&'a Category> {
        let lower = label.to_lowercase();
        categories.iter().find(|c| c.label.to_lowercase() == lower)
    }

    /// Find a category by ID in a slice.
    pub fn find_by_id(categories: &[Category], id: CategoryId) -> Option<&Category> {
        categories.iter().find(|c| c.id == id)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// Partial rename/recolor.
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub label: Option<String>,
    pub color: Option<String>,
}

pub(crate) fn validate_label(label: &str) -> Result<String> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("category label must not be empty"));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn validate_color(color: &str) -> Result<String> {
    let trimmed = color.trim();
    let is_hex = Regex::new(HEX_COLOR)
        .map(|re| re.is_match(trimmed))
        .unwrap_or(false);
    if !is_hex {
        return Err(Error::validation(format!(
            "category color '{color}' is not a hex color"
        )));
    }
    Ok(trimmed.to_string())
}
