// ABOUTME: Core data model for sweeps: targets, normalized cell values and records.
// ABOUTME: CellValue keeps missing data distinct from zero so thresholds never conflate them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A page to sweep plus the category label stamped onto every record it yields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub url: String,
    pub category: String,
}

impl Target {
    pub fn new(url: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category: category.into(),
        }
    }
}

/// A normalized numeric cell.
///
/// `Unavailable` marks a cell whose source text was missing or malformed. It is
/// deliberately not zero: a fund with an unknown market cap must not pass a
/// "market cap at least X" filter.
///
/// Serializes as a JSON number, with `Unavailable` as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CellValue {
    Number(f64),
    #[default]
    Unavailable,
}

impl CellValue {
    /// Builds a `Number`, degrading non-finite input to `Unavailable`.
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            CellValue::Number(value)
        } else {
            CellValue::Unavailable
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, CellValue::Number(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Unavailable => None,
        }
    }

    /// Threshold check. `Unavailable` always fails.
    pub fn at_least(&self, floor: f64) -> bool {
        match self {
            CellValue::Number(n) => *n >= floor,
            CellValue::Unavailable => false,
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Unavailable => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<f64>::deserialize(deserializer)?;
        Ok(match value {
            Some(n) => CellValue::from_f64(n),
            None => CellValue::Unavailable,
        })
    }
}

/// One extracted table row, keyed by symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Mandatory instrument identifier. Never empty.
    pub symbol: String,
    /// Category label taken from the target, not from the page.
    pub category: String,
    /// Display name, when the page provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub price: CellValue,
    pub market_cap: CellValue,
    pub volume: CellValue,
}
