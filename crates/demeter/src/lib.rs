// ABOUTME: Main library entry point for the Demeter sweep engine.
// ABOUTME: Re-exports the public API: Sweeper, SweeperBuilder, Target, Record, RunReport, SweepError.

//! Demeter - a multi-target scrape-and-export pipeline.
//!
//! This crate sweeps an ordered list of target pages, locates a data table on
//! each one through a cascade of fallback strategies, normalizes the cell
//! values into records, and renders the accumulated records as a
//! deterministic tabular export.
//!
//! # Example
//!
//! ```no_run
//! use marketsweep_demeter::{Sweeper, Target};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut sweeper = Sweeper::builder().build();
//!     let targets = [
//!         Target::new("https://finance.yahoo.com/markets/etfs/top/", "ETFs"),
//!     ];
//!     let report = sweeper.run(&targets, &CancellationToken::new()).await;
//!     print!("{}", report.summary());
//! }
//! ```

pub mod accessor;
pub mod error;
pub mod export;
pub mod extract;
pub mod locator;
pub mod normalize;
pub mod options;
pub mod record;
pub mod report;
pub mod runner;
pub mod sink;
pub mod sweep;

pub use crate::accessor::{HttpAccessor, PageAccessor, StaticAccessor};
pub use crate::error::{ErrorCode, SweepError};
pub use crate::export::{
    render_table, Column, DateStamp, ExportFormat, ExportPlan, FilenameStamp, Partition,
    PartitionRule,
};
pub use crate::locator::loader::{load_builtin_profiles, GENERIC_PROFILE};
pub use crate::locator::profile::{
    CellPick, Field, FieldRule, LocatorStrategy, ProfileRegistry, TableProfile,
};
pub use crate::options::{Options, SweeperBuilder};
pub use crate::record::{CellValue, Record, Target};
pub use crate::report::{OutcomeKind, RunReport, TargetOutcome};
pub use crate::sink::{DirSink, ExportSink, MemorySink};
pub use crate::sweep::{partition_records, Sweeper};
