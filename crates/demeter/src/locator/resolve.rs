// ABOUTME: Resolves a table profile against an HTML snapshot into plain row data.
// ABOUTME: Tries strategies in order and records which ones were attempted.

//! Strategy-by-strategy table resolution.
//!
//! Key behaviors:
//! - Strategies run in the profile's declared order; the first match wins.
//! - A strategy only matches when every mandatory field maps to a cell, either
//!   through a fixed column or a header keyword.
//! - The result is plain owned data. No DOM handles escape this module, so the
//!   caller can hold a [`ResolvedTable`] across await points.

use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};

use super::heuristic::{self, TABLE, TD, TH, THEAD_TH, TR};
use super::profile::{CellPick, Field, LocatorStrategy, TableProfile};

/// One body row, materialized to owned text.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRow {
    /// Cell text in column order, whitespace-normalized.
    pub cells: Vec<String>,
    /// Per-field pick results, where an in-cell selector matched.
    pub picks: HashMap<Field, String>,
}

/// A located table, ready for record extraction.
#[derive(Debug, Clone)]
pub struct ResolvedTable {
    pub rows: Vec<ResolvedRow>,
    /// Field to cell-index mapping for this table.
    pub header_map: HashMap<Field, usize>,
    /// Label of the strategy that matched.
    pub strategy: String,
    /// Labels of the strategies tried and rejected before the match.
    pub attempted: Vec<String>,
}

/// All strategies failed. Carries the attempted labels for diagnostics.
#[derive(Debug, Clone)]
pub struct NotFound {
    pub attempted: Vec<String>,
}

impl std::fmt::Display for NotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "no locator strategy matched (tried: {})",
            self.attempted.join(", ")
        )
    }
}

impl std::error::Error for NotFound {}

/// Resolves `profile` against one HTML snapshot.
pub fn resolve_table(html: &str, profile: &TableProfile) -> Result<ResolvedTable, NotFound> {
    let doc = Html::parse_document(html);
    let mut attempted = Vec::new();
    for strategy in &profile.strategies {
        let label = strategy.label();
        if let Some(mut resolved) = try_strategy(&doc, strategy, profile) {
            resolved.strategy = label;
            resolved.attempted = attempted;
            return Ok(resolved);
        }
        attempted.push(label);
    }
    Err(NotFound { attempted })
}

fn try_strategy(
    doc: &Html,
    strategy: &LocatorStrategy,
    profile: &TableProfile,
) -> Option<ResolvedTable> {
    match strategy {
        LocatorStrategy::TestId { value } => {
            let selector = attr_selector("data-testid", value)?;
            let container = doc.select(&selector).next()?;
            let table = locate_table(container)?;
            finish(table, profile, false)
        }
        LocatorStrategy::Attr { name, value } => {
            let selector = attr_selector(name, value)?;
            let container = doc.select(&selector).next()?;
            let table = locate_table(container)?;
            finish(table, profile, false)
        }
        LocatorStrategy::HeaderText => doc
            .select(&TABLE)
            .find_map(|table| finish(table, profile, true)),
        LocatorStrategy::LargestTable { css } => {
            let container = heuristic::largest_table(doc, css, profile.min_rows)?;
            let table = locate_table(container)?;
            finish(table, profile, false)
        }
    }
}

/// Final gate for a candidate table: map headers, optionally require a body
/// row, then materialize.
fn finish(table: ElementRef<'_>, profile: &TableProfile, require_rows: bool) -> Option<ResolvedTable> {
    let header_map = map_headers(table, profile)?;
    let rows = heuristic::data_rows(table);
    if require_rows && rows.is_empty() {
        return None;
    }
    Some(materialize(&rows, &header_map, profile))
}

fn attr_selector(name: &str, value: &str) -> Option<Selector> {
    Selector::parse(&format!("[{}=\"{}\"]", name, value)).ok()
}

/// The container itself when it is a table, otherwise its first table
/// descendant. Test-id hooks usually sit on a wrapping div.
fn locate_table(container: ElementRef<'_>) -> Option<ElementRef<'_>> {
    if container.value().name() == "table" {
        return Some(container);
    }
    container.select(&TABLE).next()
}

/// Maps every field to a cell index, columns first, then header keywords.
/// Returns `None` when a mandatory field stays unmapped.
fn map_headers(table: ElementRef<'_>, profile: &TableProfile) -> Option<HashMap<Field, usize>> {
    let mut map = HashMap::new();
    for field in Field::ALL {
        if let Some(column) = profile.field_rule(field).column {
            map.insert(field, column);
        }
    }
    let headers = header_texts(table);
    for (index, text) in headers.iter().enumerate() {
        for field in Field::ALL {
            if map.contains_key(&field) {
                continue;
            }
            if profile.field_rule(field).matches_header(text) {
                map.insert(field, index);
                break;
            }
        }
    }
    for field in &profile.mandatory {
        if !map.contains_key(field) {
            return None;
        }
    }
    Some(map)
}

/// Header cell texts: `thead th` when present, otherwise the `th` cells of the
/// first row.
fn header_texts(table: ElementRef<'_>) -> Vec<String> {
    let headers: Vec<String> = table
        .select(&THEAD_TH)
        .map(|th| normalize_whitespace(&th.text().collect::<String>()))
        .collect();
    if !headers.is_empty() {
        return headers;
    }
    match table.select(&TR).next() {
        Some(first_row) => first_row
            .select(&TH)
            .map(|th| normalize_whitespace(&th.text().collect::<String>()))
            .collect(),
        None => Vec::new(),
    }
}

fn materialize(
    rows: &[ElementRef<'_>],
    header_map: &HashMap<Field, usize>,
    profile: &TableProfile,
) -> ResolvedTable {
    let resolved_rows = rows
        .iter()
        .map(|row| {
            let cells: Vec<ElementRef<'_>> = row.select(&TD).collect();
            let cell_texts = cells
                .iter()
                .map(|cell| normalize_whitespace(&cell.text().collect::<String>()))
                .collect();
            let mut picks = HashMap::new();
            for field in Field::ALL {
                let rule = profile.field_rule(field);
                if rule.picks.is_empty() {
                    continue;
                }
                let Some(&index) = header_map.get(&field) else {
                    continue;
                };
                let Some(cell) = cells.get(index) else {
                    continue;
                };
                if let Some(value) = first_pick(*cell, &rule.picks) {
                    picks.insert(field, value);
                }
            }
            ResolvedRow {
                cells: cell_texts,
                picks,
            }
        })
        .collect();
    ResolvedTable {
        rows: resolved_rows,
        header_map: header_map.clone(),
        strategy: String::new(),
        attempted: Vec::new(),
    }
}

/// First pick that yields non-empty text, in declared order. Unparsable
/// selectors are skipped, not fatal.
fn first_pick(cell: ElementRef<'_>, picks: &[CellPick]) -> Option<String> {
    for pick in picks {
        let value = match pick {
            CellPick::Css(css) => pick_text(cell, css),
            CellPick::CssAttr(parts) => match parts.as_slice() {
                [css] => pick_text(cell, css),
                [css, attr] => pick_attr(cell, css, attr),
                _ => None,
            },
        };
        if let Some(v) = value {
            return Some(v);
        }
    }
    None
}

fn pick_text(cell: ElementRef<'_>, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    cell.select(&selector)
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .find(|text| !text.is_empty())
}

fn pick_attr(cell: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    cell.select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
