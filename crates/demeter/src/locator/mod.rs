// ABOUTME: Table locator subsystem: profiles, fallback strategies and resolution.
// ABOUTME: Finds the one data table on a page and turns it into plain rows.

//! Declarative table location for structurally unstable pages.
//!
//! A [`profile::TableProfile`] names an ordered list of
//! [`profile::LocatorStrategy`]s, from the most specific (a `data-testid`
//! attribute) down to a largest-table heuristic. [`resolve::resolve_table`]
//! walks them in order and reports which strategies were attempted, so a page
//! redesign shows up in diagnostics instead of as silent data loss.

pub mod heuristic;
pub mod loader;
pub mod profile;
pub mod resolve;

pub use loader::{load_builtin_profiles, GENERIC_PROFILE};
pub use profile::{CellPick, Field, FieldRule, LocatorStrategy, ProfileRegistry, TableProfile};
pub use resolve::{resolve_table, NotFound, ResolvedRow, ResolvedTable};
