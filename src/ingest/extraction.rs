use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::debug;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

/// Bytes handed to the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionSource {
    Image { bytes: Vec<u8>, mime: String },
    Document { bytes: Vec<u8>, mime: String },
}

impl ExtractionSource {
    pub fn image<M: Into<String>>(bytes: Vec<u8>, mime: M) -> Self {
        Self::Image {
            bytes,
            mime: mime.into(),
        }
    }

    pub fn document<M: Into<String>>(bytes: Vec<u8>, mime: M) -> Self {
        Self::Document {
            bytes,
            mime: mime.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Image { bytes, .. } | Self::Document { bytes, .. } => bytes,
        }
    }

    pub fn mime(&self) -> &str {
        match self {
            Self::Image { mime, .. } | Self::Document { mime, .. } => mime,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }

    /// `data:<mime>;base64,<payload>`, the form kept as a receipt's image.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime(), STANDARD.encode(self.bytes()))
    }
}

/// Extraction output after every field has been checked. Anything the model
/// sent that was not usable is `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawExtraction {
    pub merchant: Option<String>,
    pub date: Option<String>,
    pub category: Option<String>,
    pub total: Option<Decimal>,
    pub subtotal: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub tip: Option<Decimal>,
    pub payment_method: Option<String>,
    pub items: Vec<RawLineItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawLineItem {
    pub description: Option<String>,
    pub quantity: Option<u32>,
    pub price: Option<Decimal>,
}

/// Parse the collaborator's text reply.
///
/// The reply must contain a JSON object, optionally wrapped in a Markdown
/// code fence. Malformed JSON is an error; malformed fields are not.
pub fn parse_extraction(text: &str) -> Result<RawExtraction> {
    let body = strip_code_fence(text);
    let value: Value =
        serde_json::from_str(body).context("Extraction reply is not valid JSON")?;
    let Value::Object(obj) = value else {
        bail!("Extraction reply is not a JSON object");
    };

    let items = match obj.get("items") {
        Some(Value::Array(entries)) => entries
            .iter()
            .filter_map(Value::as_object)
            .map(|item| RawLineItem {
                description: text_field(item, "description"),
                quantity: quantity_field(item, "quantity"),
                price: amount_field(item, "price"),
            })
            .collect(),
        _ => Vec::new(),
    };

    let raw = RawExtraction {
        merchant: text_field(&obj, "merchant"),
        date: text_field(&obj, "date"),
        category: text_field(&obj, "category"),
        total: amount_field(&obj, "total"),
        subtotal: amount_field(&obj, "subtotal"),
        tax: amount_field(&obj, "tax"),
        // printed as "-$2.00" on many receipts
        discount: number_field(&obj, "discount").map(|d| d.abs()),
        tip: amount_field(&obj, "tip"),
        payment_method: text_field(&obj, "paymentMethod")
            .filter(|m| !m.eq_ignore_ascii_case("unknown")),
        items,
    };
    debug!(
        "Parsed extraction: merchant={:?} total={:?} items={}",
        raw.merchant,
        raw.total,
        raw.items.len()
    );
    Ok(raw)
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string ("json") on the opening fence line
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest.trim_start_matches("json"),
    };
    rest.trim_end().trim_end_matches("```").trim()
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_field(obj: &Map<String, Value>, key: &str) -> Option<Decimal> {
    let parsed = match obj.get(key)? {
        Value::Number(n) => parse_number(&n.to_string()),
        Value::String(s) => parse_number(s),
        _ => None,
    };
    if parsed.is_none() {
        debug!("Ignoring unusable '{key}' in extraction");
    }
    parsed
}

/// Negative values count as absent; callers pick the default.
fn amount_field(obj: &Map<String, Value>, key: &str) -> Option<Decimal> {
    number_field(obj, key).filter(|d| *d >= Decimal::ZERO)
}

fn quantity_field(obj: &Map<String, Value>, key: &str) -> Option<u32> {
    let qty = number_field(obj, key)?;
    if qty.fract() != Decimal::ZERO || qty <= Decimal::ZERO {
        return None;
    }
    qty.to_u32()
}

fn parse_number(s: &str) -> Option<Decimal> {
    let cleaned = s.trim().replace(['$', ','], "");
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}
