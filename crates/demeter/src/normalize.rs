// ABOUTME: Numeric normalization for scraped table cells with K/M/B/T magnitude suffixes.
// ABOUTME: Malformed or sentinel text degrades to CellValue::Unavailable, never to zero.

//! Turns heterogeneous cell text ("1.5B", "250K", "1,234.56", "--") into
//! [`CellValue`]s.
//!
//! Rules:
//! - Leading/trailing whitespace is ignored.
//! - `K`, `M`, `B`, `T` suffixes (case-insensitive) scale by 1e3 through 1e12.
//! - Thousands separators must group correctly; "12,34" is rejected.
//! - Empty text and the dash sentinels ("-", "--") are `Unavailable`.
//! - Anything outside the grammar, and any non-finite result, is `Unavailable`.
//!   There is no partial parse of mixed text like "12.34 +0.5%".

use once_cell::sync::Lazy;
use regex::Regex;

use crate::record::CellValue;

/// Optional sign, grouped or plain integer digits, optional fraction, optional
/// whitespace, optional magnitude suffix. No exponent forms.
static MAGNITUDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d*)?|[+-]?\.\d+)\s*([KMBTkmbt])?$")
        .unwrap()
});

/// Parses one cell's text into a [`CellValue`].
pub fn parse_magnitude(text: &str) -> CellValue {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed == "--" {
        return CellValue::Unavailable;
    }
    let Some(caps) = MAGNITUDE.captures(trimmed) else {
        return CellValue::Unavailable;
    };
    let number = caps[1].replace(',', "");
    let multiplier = match caps.get(2).map(|m| m.as_str()) {
        Some(s) => match s.to_ascii_uppercase().as_str() {
            "K" => 1e3,
            "M" => 1e6,
            "B" => 1e9,
            _ => 1e12,
        },
        None => 1.0,
    };
    match number.parse::<f64>() {
        Ok(value) => CellValue::from_f64(value * multiplier),
        Err(_) => CellValue::Unavailable,
    }
}

/// Renders a [`CellValue`] for export. `Unavailable` becomes the empty string.
///
/// Numbers use the shortest decimal form that round-trips, so
/// `parse_magnitude(&render_value(v))` always reproduces `v`.
pub fn render_value(value: &CellValue) -> String {
    match value {
        CellValue::Number(n) => n.to_string(),
        CellValue::Unavailable => String::new(),
    }
}
