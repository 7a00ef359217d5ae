// ABOUTME: Per-target outcome reporting and the aggregate run report.
// ABOUTME: Failed targets keep their diagnostics so a partial run is still explainable.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, SweepError};
use crate::record::{Record, Target};

/// How a single target ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// At least one record was extracted.
    Scraped,
    /// A table was resolved but no records came out of it.
    Empty,
    /// The readiness predicate never held within the attempt timeout.
    Timeout,
    /// No locator strategy matched a table.
    NoTable,
    /// Navigation or snapshotting failed.
    PageError,
    /// The run was cancelled before or during this target.
    Cancelled,
}

impl OutcomeKind {
    pub fn from_error(err: &SweepError) -> Self {
        match err.code {
            ErrorCode::Timeout => OutcomeKind::Timeout,
            ErrorCode::NoTable => OutcomeKind::NoTable,
            ErrorCode::Empty => OutcomeKind::Empty,
            ErrorCode::Cancelled => OutcomeKind::Cancelled,
            _ => OutcomeKind::PageError,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeKind::Scraped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Scraped => "scraped",
            OutcomeKind::Empty => "empty",
            OutcomeKind::Timeout => "timeout",
            OutcomeKind::NoTable => "no-table",
            OutcomeKind::PageError => "page-error",
            OutcomeKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of sweeping one target, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetOutcome {
    pub target: Target,
    pub kind: OutcomeKind,
    /// Human-readable reason. Empty for successes.
    pub detail: String,
    /// Navigation attempts actually made.
    pub attempts: u32,
    /// Records extracted from this target.
    pub records: usize,
    /// Rows dropped because no symbol could be located.
    pub skipped_rows: usize,
}

impl TargetOutcome {
    pub fn scraped(target: Target, attempts: u32, records: usize, skipped_rows: usize) -> Self {
        Self {
            target,
            kind: OutcomeKind::Scraped,
            detail: String::new(),
            attempts,
            records,
            skipped_rows,
        }
    }

    pub fn failed(target: Target, attempts: u32, err: &SweepError) -> Self {
        Self {
            target,
            kind: OutcomeKind::from_error(err),
            detail: err.to_string(),
            attempts,
            records: 0,
            skipped_rows: 0,
        }
    }

    pub fn cancelled(target: Target) -> Self {
        Self {
            target,
            kind: OutcomeKind::Cancelled,
            detail: "run cancelled before this target started".to_string(),
            attempts: 0,
            records: 0,
            skipped_rows: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind.is_success()
    }
}

/// Everything a sweep produced: the accumulated records plus one outcome per
/// target, in target order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub records: Vec<Record>,
    pub outcomes: Vec<TargetOutcome>,
    /// Total rows skipped across all targets for want of a symbol.
    pub skipped_rows: usize,
}

impl RunReport {
    pub fn scraped_targets(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed_targets(&self) -> usize {
        self.outcomes.len() - self.scraped_targets()
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TargetOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// One line per target, suitable for logs or a terminal.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for outcome in &self.outcomes {
            out.push_str(&format!(
                "{} {} [{}] attempts={} records={}",
                outcome.kind, outcome.target.url, outcome.target.category, outcome.attempts,
                outcome.records
            ));
            if outcome.skipped_rows > 0 {
                out.push_str(&format!(" skipped={}", outcome.skipped_rows));
            }
            if !outcome.detail.is_empty() {
                out.push_str(": ");
                out.push_str(&outcome.detail);
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "{}/{} targets scraped, {} records, {} rows skipped\n",
            self.scraped_targets(),
            self.outcomes.len(),
            self.records.len(),
            self.skipped_rows
        ));
        out
    }
}
