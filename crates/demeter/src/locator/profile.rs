// ABOUTME: Declarative table profiles: strategies, field rules and the profile registry.
// ABOUTME: Profiles are plain serde data so page-specific knowledge lives in JSON, not code.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The fields a sweep can pull out of a table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Symbol,
    Name,
    Price,
    MarketCap,
    Volume,
}

impl Field {
    /// Canonical order, also the precedence when one header cell could match
    /// several fields.
    pub const ALL: [Field; 5] = [
        Field::Symbol,
        Field::Name,
        Field::Price,
        Field::MarketCap,
        Field::Volume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Symbol => "symbol",
            Field::Name => "name",
            Field::Price => "price",
            Field::MarketCap => "market_cap",
            Field::Volume => "volume",
        }
    }

    /// Header substrings used when a profile does not spell out its own.
    pub fn default_keywords(&self) -> &'static [&'static str] {
        match self {
            Field::Symbol => &["symbol", "ticker"],
            Field::Name => &["name"],
            Field::Price => &["price", "last"],
            Field::MarketCap => &["market cap"],
            Field::Volume => &["volume"],
        }
    }

    /// Numeric fields run through the magnitude normalizer.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Field::Price | Field::MarketCap | Field::Volume)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An in-cell selector tried before falling back to the cell's own text.
///
/// Supports two JSON forms:
/// - `"a.ticker"` takes the text of the first match
/// - `["fin-streamer", "value"]` takes the named attribute of the first match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellPick {
    Css(String),
    CssAttr(Vec<String>),
}

/// How to find and read one field's cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Case-insensitive substrings matched against header cell text.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Fixed cell index for headerless tables. Overrides keyword mapping.
    #[serde(default)]
    pub column: Option<usize>,
    /// In-cell picks tried in order; the first non-empty result wins.
    #[serde(default)]
    pub picks: Vec<CellPick>,
}

impl FieldRule {
    pub fn matches_header(&self, header: &str) -> bool {
        let header = header.to_lowercase();
        self.keywords
            .iter()
            .any(|k| header.contains(&k.to_lowercase()))
    }
}

/// One way of locating the data table, tried in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocatorStrategy {
    /// Container carrying a `data-testid` attribute with this value.
    TestId { value: String },
    /// Container carrying an arbitrary attribute with this value.
    Attr { name: String, value: String },
    /// Any table whose headers cover all mandatory fields and that has at
    /// least one body row.
    HeaderText,
    /// The candidate with the most body rows, subject to the profile's
    /// minimum row threshold.
    LargestTable {
        #[serde(default = "default_table_css")]
        css: String,
    },
}

fn default_table_css() -> String {
    "table".to_string()
}

impl LocatorStrategy {
    /// Short label used in diagnostics, e.g. `test_id[scr-res-table]`.
    pub fn label(&self) -> String {
        match self {
            LocatorStrategy::TestId { value } => format!("test_id[{}]", value),
            LocatorStrategy::Attr { name, value } => format!("attr[{}={}]", name, value),
            LocatorStrategy::HeaderText => "header_text".to_string(),
            LocatorStrategy::LargestTable { css } => format!("largest_table[{}]", css),
        }
    }
}

/// Everything the locator and extractor need to know about one page family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableProfile {
    /// Registry lookup key.
    pub name: String,
    /// Domains this profile is the default for.
    #[serde(default)]
    pub domains: Vec<String>,
    /// Locator strategies in fallback order.
    pub strategies: Vec<LocatorStrategy>,
    /// Per-field rules. Fields without an entry fall back to default keywords.
    #[serde(default)]
    pub fields: HashMap<Field, FieldRule>,
    /// Fields that must map to a cell for a strategy to count as a match.
    #[serde(default = "default_mandatory")]
    pub mandatory: Vec<Field>,
    /// Minimum body rows for the largest-table heuristic, rejecting sidebars
    /// and other decoy tables.
    #[serde(default = "default_min_rows")]
    pub min_rows: usize,
    /// Symbol rewrites applied before the allowlist and dedup.
    #[serde(default)]
    pub rename: HashMap<String, String>,
    /// When non-empty, only these symbols (after rename) are kept.
    #[serde(default)]
    pub keep_only: Vec<String>,
}

fn default_mandatory() -> Vec<Field> {
    vec![Field::Symbol]
}

fn default_min_rows() -> usize {
    5
}

impl TableProfile {
    /// Effective rule for a field: the profile's own entry, topped up with
    /// default keywords when it gives neither keywords nor a column.
    pub fn field_rule(&self, field: Field) -> FieldRule {
        let mut rule = self.fields.get(&field).cloned().unwrap_or_default();
        if rule.keywords.is_empty() && rule.column.is_none() {
            rule.keywords = field
                .default_keywords()
                .iter()
                .map(|k| k.to_string())
                .collect();
        }
        rule
    }
}

/// Registry of table profiles, addressable by name or by domain.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    by_name: HashMap<String, TableProfile>,
    by_domain: HashMap<String, String>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a profile under its name and all of its domains. A later
    /// registration replaces an earlier one for the same key.
    pub fn register(&mut self, profile: TableProfile) {
        for domain in &profile.domains {
            self.by_domain
                .insert(domain.to_lowercase(), profile.name.clone());
        }
        self.by_name.insert(profile.name.clone(), profile);
    }

    pub fn get(&self, name: &str) -> Option<&TableProfile> {
        self.by_name.get(name)
    }

    pub fn for_domain(&self, domain: &str) -> Option<&TableProfile> {
        let name = self.by_domain.get(&domain.to_lowercase())?;
        self.by_name.get(name)
    }

    /// Registered profile names, sorted for stable listings.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_profile() -> TableProfile {
        serde_json::from_str(
            r#"{
                "name": "sample",
                "domains": ["example.com"],
                "strategies": [
                    { "type": "test_id", "value": "scr-res-table" },
                    { "type": "attr", "name": "class", "value": "data" },
                    { "type": "header_text" },
                    { "type": "largest_table" }
                ],
                "mandatory": ["symbol", "price"],
                "min_rows": 3,
                "fields": {
                    "symbol": { "keywords": ["symbol"], "picks": ["a.ticker"] },
                    "price": { "picks": [["fin-streamer", "value"]] }
                },
                "rename": { "United Kingdom": "UK10Y" },
                "keep_only": ["UK10Y"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn profile_deserializes() {
        let profile = sample_profile();
        assert_eq!(profile.name, "sample");
        assert_eq!(profile.strategies.len(), 4);
        assert_eq!(profile.mandatory, vec![Field::Symbol, Field::Price]);
        assert_eq!(profile.min_rows, 3);
        assert_eq!(
            profile.rename.get("United Kingdom"),
            Some(&"UK10Y".to_string())
        );
        assert_eq!(profile.keep_only, vec!["UK10Y"]);
    }

    #[test]
    fn pick_forms_deserialize() {
        let profile = sample_profile();
        let symbol = &profile.fields[&Field::Symbol];
        assert_eq!(symbol.picks, vec![CellPick::Css("a.ticker".to_string())]);
        let price = &profile.fields[&Field::Price];
        assert_eq!(
            price.picks,
            vec![CellPick::CssAttr(vec![
                "fin-streamer".to_string(),
                "value".to_string()
            ])]
        );
    }

    #[test]
    fn serde_roundtrip() {
        let profile = sample_profile();
        let json = serde_json::to_string(&profile).unwrap();
        let back: TableProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn defaults_applied_when_omitted() {
        let profile: TableProfile = serde_json::from_str(
            r#"{ "name": "bare", "strategies": [{ "type": "header_text" }] }"#,
        )
        .unwrap();
        assert_eq!(profile.mandatory, vec![Field::Symbol]);
        assert_eq!(profile.min_rows, 5);
        assert!(profile.fields.is_empty());
        assert!(profile.rename.is_empty());
        assert!(profile.keep_only.is_empty());
    }

    #[test]
    fn largest_table_css_defaults() {
        let strategy: LocatorStrategy =
            serde_json::from_str(r#"{ "type": "largest_table" }"#).unwrap();
        assert_eq!(
            strategy,
            LocatorStrategy::LargestTable {
                css: "table".to_string()
            }
        );
    }

    #[test]
    fn strategy_labels() {
        assert_eq!(
            LocatorStrategy::TestId {
                value: "scr-res-table".to_string()
            }
            .label(),
            "test_id[scr-res-table]"
        );
        assert_eq!(
            LocatorStrategy::Attr {
                name: "class".to_string(),
                value: "data".to_string()
            }
            .label(),
            "attr[class=data]"
        );
        assert_eq!(LocatorStrategy::HeaderText.label(), "header_text");
        assert_eq!(
            LocatorStrategy::LargestTable {
                css: "table".to_string()
            }
            .label(),
            "largest_table[table]"
        );
    }

    #[test]
    fn field_rule_falls_back_to_default_keywords() {
        let profile = sample_profile();
        // No entry at all: default keywords.
        let volume = profile.field_rule(Field::Volume);
        assert_eq!(volume.keywords, vec!["volume"]);
        // Entry with picks but no keywords and no column: defaults fill in.
        let price = profile.field_rule(Field::Price);
        assert_eq!(price.keywords, vec!["price", "last"]);
        assert_eq!(price.picks.len(), 1);
        // Entry with its own keywords keeps them.
        let symbol = profile.field_rule(Field::Symbol);
        assert_eq!(symbol.keywords, vec!["symbol"]);
    }

    #[test]
    fn column_rule_suppresses_default_keywords() {
        let profile: TableProfile = serde_json::from_str(
            r#"{
                "name": "headerless",
                "strategies": [{ "type": "largest_table" }],
                "fields": { "symbol": { "column": 0 } }
            }"#,
        )
        .unwrap();
        let rule = profile.field_rule(Field::Symbol);
        assert_eq!(rule.column, Some(0));
        assert!(rule.keywords.is_empty());
    }

    #[test]
    fn header_matching_is_case_insensitive() {
        let rule = FieldRule {
            keywords: vec!["market cap".to_string()],
            column: None,
            picks: vec![],
        };
        assert!(rule.matches_header("Market Cap"));
        assert!(rule.matches_header("MARKET CAP (intraday)"));
        assert!(!rule.matches_header("Price"));
    }

    #[test]
    fn registry_lookup() {
        let mut registry = ProfileRegistry::new();
        assert!(registry.is_empty());
        registry.register(sample_profile());
        assert_eq!(registry.len(), 1);
        assert!(registry.get("sample").is_some());
        assert!(registry.get("missing").is_none());
        assert!(registry.for_domain("example.com").is_some());
        assert!(registry.for_domain("EXAMPLE.com").is_some());
        assert!(registry.for_domain("other.com").is_none());
        assert_eq!(registry.names(), vec!["sample"]);
    }
}
