// ABOUTME: Largest-table heuristic and shared row-counting helpers.
// ABOUTME: Last-resort locator for pages where every stable hook has churned away.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

pub(crate) static TBODY_TR: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr").unwrap());
pub(crate) static TD: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());
pub(crate) static TH: Lazy<Selector> = Lazy::new(|| Selector::parse("th").unwrap());
pub(crate) static THEAD_TH: Lazy<Selector> = Lazy::new(|| Selector::parse("thead th").unwrap());
pub(crate) static TR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
pub(crate) static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());

/// Body rows of a table: `tbody tr` elements that carry at least one `td`.
/// Header rows that the parser folded into an implicit tbody fall out here
/// because they hold only `th` cells.
pub(crate) fn data_rows<'a>(container: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    container
        .select(&TBODY_TR)
        .filter(|row| row.select(&TD).next().is_some())
        .collect()
}

/// Picks the candidate matching `css` with the most body rows, provided the
/// winner has at least `min_rows` of them. Ties keep the earliest candidate in
/// document order. An unparsable selector matches nothing.
pub(crate) fn largest_table<'a>(
    doc: &'a Html,
    css: &str,
    min_rows: usize,
) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    let mut best: Option<(usize, ElementRef<'a>)> = None;
    for candidate in doc.select(&selector) {
        let rows = data_rows(candidate).len();
        if best.map_or(true, |(max, _)| rows > max) {
            best = Some((rows, candidate));
        }
    }
    match best {
        Some((rows, el)) if rows >= min_rows => Some(el),
        _ => None,
    }
}
