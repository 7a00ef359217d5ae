// ABOUTME: Error types for sweep operations including ErrorCode enum and SweepError struct.
// ABOUTME: Provides categorized errors with convenience constructors and boolean helpers.

use std::fmt;

/// Error codes representing different categories of sweep failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The target URL could not be parsed or uses an unsupported scheme.
    InvalidUrl,
    /// The target host resolves to a private or local network.
    Ssrf,
    /// Navigating to the page failed (request error, bad status, oversized body).
    Navigate,
    /// Re-reading the current page failed.
    Snapshot,
    /// The readiness predicate did not hold within the attempt timeout.
    Timeout,
    /// No locator strategy matched a data table on the page.
    NoTable,
    /// A table was resolved but extraction produced zero records.
    Empty,
    /// An export could not be rendered or written.
    Sink,
    /// The run was cancelled.
    Cancelled,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidUrl => "invalid URL",
            ErrorCode::Ssrf => "private network blocked",
            ErrorCode::Navigate => "navigation failed",
            ErrorCode::Snapshot => "snapshot failed",
            ErrorCode::Timeout => "timeout",
            ErrorCode::NoTable => "no table matched",
            ErrorCode::Empty => "no records extracted",
            ErrorCode::Sink => "sink error",
            ErrorCode::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// The main error type for sweep operations.
///
/// Carries an [`ErrorCode`] category, the URL being swept, the operation that
/// failed, and an optional underlying cause.
#[derive(Debug, thiserror::Error)]
pub struct SweepError {
    pub code: ErrorCode,
    pub url: String,
    pub op: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for SweepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "demeter: {} {}: {}", self.op, self.url, self.code)?;
        if let Some(src) = &self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl SweepError {
    pub fn invalid_url(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::InvalidUrl,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    pub fn ssrf(url: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Ssrf,
            url: url.into(),
            op: op.into(),
            source: None,
        }
    }

    pub fn navigate(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::Navigate,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    pub fn snapshot(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::Snapshot,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    pub fn timeout(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::Timeout,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    pub fn no_table(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::NoTable,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    pub fn empty(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::Empty,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    pub fn sink(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code: ErrorCode::Sink,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    pub fn cancelled(url: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Cancelled,
            url: url.into(),
            op: op.into(),
            source: None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }

    pub fn is_no_table(&self) -> bool {
        self.code == ErrorCode::NoTable
    }

    pub fn is_empty(&self) -> bool {
        self.code == ErrorCode::Empty
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::Cancelled
    }

    pub fn is_ssrf(&self) -> bool {
        self.code == ErrorCode::Ssrf
    }

    pub fn is_sink(&self) -> bool {
        self.code == ErrorCode::Sink
    }

    /// Whether another attempt at the same target could plausibly succeed.
    ///
    /// Malformed URLs, blocked hosts and cancellation are deterministic, so
    /// retrying them only burns time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::Navigate
                | ErrorCode::Snapshot
                | ErrorCode::Timeout
                | ErrorCode::NoTable
                | ErrorCode::Empty
        )
    }
}
