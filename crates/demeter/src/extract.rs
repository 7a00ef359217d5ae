// ABOUTME: Turns a resolved table into Records: picks, normalization, rename and dedup.
// ABOUTME: Rows without a symbol are skipped and counted; bad numeric cells degrade to Unavailable.

//! Record extraction from a [`ResolvedTable`].
//!
//! Per row:
//! - the symbol comes from its pick selector when one matched, otherwise from
//!   the mapped cell's text; a row with no symbol is skipped and counted
//! - the profile's rename map rewrites the symbol, then the `keep_only`
//!   allowlist and first-occurrence dedup filter silently
//! - numeric fields run through [`parse_magnitude`]; missing or malformed
//!   cells become `Unavailable` rather than dropping the row

use std::collections::{HashMap, HashSet};

use crate::locator::profile::{Field, TableProfile};
use crate::locator::resolve::{ResolvedRow, ResolvedTable};
use crate::normalize::parse_magnitude;
use crate::record::{CellValue, Record};

/// Extracts records from `resolved`, stamping each with `category`.
///
/// Returns the records in row order plus the number of rows skipped for want
/// of a symbol.
pub fn extract_records(
    resolved: &ResolvedTable,
    profile: &TableProfile,
    category: &str,
) -> (Vec<Record>, usize) {
    let mut records = Vec::new();
    let mut skipped = 0usize;
    let mut seen: HashSet<String> = HashSet::new();

    for row in &resolved.rows {
        let Some(raw_symbol) = field_text(row, &resolved.header_map, Field::Symbol) else {
            skipped += 1;
            continue;
        };
        let symbol = profile
            .rename
            .get(&raw_symbol)
            .cloned()
            .unwrap_or(raw_symbol);
        if !profile.keep_only.is_empty() && !profile.keep_only.iter().any(|k| k == &symbol) {
            continue;
        }
        if !seen.insert(symbol.clone()) {
            continue;
        }

        let name = field_text(row, &resolved.header_map, Field::Name);
        let price = numeric_field(row, &resolved.header_map, Field::Price);
        let market_cap = numeric_field(row, &resolved.header_map, Field::MarketCap);
        let volume = numeric_field(row, &resolved.header_map, Field::Volume);

        records.push(Record {
            symbol,
            category: category.to_string(),
            name,
            price,
            market_cap,
            volume,
        });
    }

    (records, skipped)
}

/// A field's text for one row: the pick result when present, otherwise the
/// mapped cell's text. `None` when neither yields anything non-empty.
fn field_text(
    row: &ResolvedRow,
    header_map: &HashMap<Field, usize>,
    field: Field,
) -> Option<String> {
    if let Some(picked) = row.picks.get(&field) {
        if !picked.is_empty() {
            return Some(picked.clone());
        }
    }
    let index = *header_map.get(&field)?;
    let text = row.cells.get(index)?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn numeric_field(
    row: &ResolvedRow,
    header_map: &HashMap<Field, usize>,
    field: Field,
) -> CellValue {
    match field_text(row, header_map, field) {
        Some(text) => parse_magnitude(&text),
        None => CellValue::Unavailable,
    }
}
