// ABOUTME: Per-target attempt loop: navigate, poll for readiness, extract, retry.
// ABOUTME: Bounds every attempt with a deadline and classifies how it failed.

//! Runs one target through up to `max_retries` attempts.
//!
//! An attempt navigates, then polls snapshots until the page is ready: a table
//! resolves and has at least one body row. Extraction that yields zero records
//! is a soft failure and re-enters the retry loop. A timed-out attempt is
//! classified by what the last probe saw, so "never found a table" and "table
//! stayed empty" stay distinguishable in diagnostics.
//!
//! The page resource is released on every exit path.

use std::time::Duration;

use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::accessor::PageAccessor;
use crate::error::SweepError;
use crate::extract::extract_records;
use crate::locator::profile::TableProfile;
use crate::locator::resolve::{resolve_table, NotFound};
use crate::options::Options;
use crate::record::{Record, Target};
use crate::report::TargetOutcome;

/// What the last readiness probe saw. Classifies a timed-out attempt.
enum Miss {
    /// No snapshot completed yet.
    StillLoading,
    /// A table resolved but had no body rows.
    EmptyTable,
    /// Every strategy failed on the last snapshot.
    Unresolved(NotFound),
}

impl Miss {
    fn into_error(self, url: &str, waited: Duration) -> SweepError {
        match self {
            Miss::StillLoading => SweepError::timeout(
                url,
                "WaitForReady",
                Some(anyhow::anyhow!("no snapshot completed within {:?}", waited)),
            ),
            Miss::EmptyTable => SweepError::timeout(
                url,
                "WaitForReady",
                Some(anyhow::anyhow!(
                    "table resolved but no data rows appeared within {:?}",
                    waited
                )),
            ),
            Miss::Unresolved(not_found) => {
                SweepError::no_table(url, "WaitForReady", Some(anyhow::anyhow!("{}", not_found)))
            }
        }
    }
}

/// Sweeps a single target. Never panics and never propagates an error; the
/// outcome says how it went. Non-retryable failures stop the loop early.
pub async fn run_target(
    accessor: &mut dyn PageAccessor,
    profile: &TableProfile,
    opts: &Options,
    target: &Target,
    cancel: &CancellationToken,
) -> (TargetOutcome, Vec<Record>) {
    let mut last_err: Option<SweepError> = None;
    let mut attempts = 0u32;

    while attempts < opts.max_retries {
        if attempts > 0 {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    accessor.release().await;
                    let err = SweepError::cancelled(&target.url, "Retry");
                    return (TargetOutcome::failed(target.clone(), attempts, &err), Vec::new());
                }
                _ = sleep(opts.retry_backoff) => {}
            }
        }
        attempts += 1;
        debug!(
            "attempt {}/{} for {}",
            attempts, opts.max_retries, target.url
        );

        match run_attempt(accessor, profile, opts, target, cancel).await {
            Ok((records, skipped)) => {
                accessor.release().await;
                info!(
                    "scraped {}: {} records in {} attempt(s), {} rows skipped",
                    target.url,
                    records.len(),
                    attempts,
                    skipped
                );
                let outcome =
                    TargetOutcome::scraped(target.clone(), attempts, records.len(), skipped);
                return (outcome, records);
            }
            Err(err) if err.is_cancelled() => {
                accessor.release().await;
                return (TargetOutcome::failed(target.clone(), attempts, &err), Vec::new());
            }
            Err(err) => {
                warn!(
                    "attempt {}/{} failed for {}: {}",
                    attempts, opts.max_retries, target.url, err
                );
                let retryable = err.is_retryable();
                last_err = Some(err);
                if !retryable {
                    break;
                }
            }
        }
    }

    accessor.release().await;
    let err = last_err.unwrap_or_else(|| {
        SweepError::navigate(
            &target.url,
            "Run",
            Some(anyhow::anyhow!("no attempts were made")),
        )
    });
    (TargetOutcome::failed(target.clone(), attempts, &err), Vec::new())
}

/// One bounded attempt: navigate, poll until ready, extract.
async fn run_attempt(
    accessor: &mut dyn PageAccessor,
    profile: &TableProfile,
    opts: &Options,
    target: &Target,
    cancel: &CancellationToken,
) -> Result<(Vec<Record>, usize), SweepError> {
    let url = target.url.as_str();
    let deadline = Instant::now() + opts.attempt_timeout;

    // biased: cancellation wins over a simultaneously ready branch.
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(SweepError::cancelled(url, "Navigate")),
        _ = sleep_until(deadline) => {
            return Err(SweepError::timeout(
                url,
                "Navigate",
                Some(anyhow::anyhow!("navigation exceeded {:?}", opts.attempt_timeout)),
            ))
        }
        result = accessor.navigate(url) => result?,
    }

    let mut last_miss = Miss::StillLoading;
    let resolved = loop {
        let html = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SweepError::cancelled(url, "WaitForReady")),
            _ = sleep_until(deadline) => {
                return Err(last_miss.into_error(url, opts.attempt_timeout))
            }
            result = accessor.snapshot() => result?,
        };
        match resolve_table(&html, profile) {
            Ok(table) if !table.rows.is_empty() => break table,
            Ok(_) => last_miss = Miss::EmptyTable,
            Err(not_found) => last_miss = Miss::Unresolved(not_found),
        }
        // Do not start a poll pause that cannot finish before the deadline.
        if Instant::now() + opts.poll_interval >= deadline {
            return Err(last_miss.into_error(url, opts.attempt_timeout));
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SweepError::cancelled(url, "WaitForReady")),
            _ = sleep(opts.poll_interval) => {}
        }
    };

    if !resolved.attempted.is_empty() {
        debug!(
            "resolved {} via {} after trying {}",
            url,
            resolved.strategy,
            resolved.attempted.join(", ")
        );
    }

    let (records, skipped) = extract_records(&resolved, profile, &target.category);
    if records.is_empty() {
        return Err(SweepError::empty(
            url,
            "Extract",
            Some(anyhow::anyhow!(
                "{} rows yielded no records ({} skipped)",
                resolved.rows.len(),
                skipped
            )),
        ));
    }
    Ok((records, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::report::OutcomeKind;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    const GOOD_PAGE: &str = r#"
        <div data-testid="grid"><table>
            <thead><tr><th>Symbol</th><th>Price</th><th>Volume</th></tr></thead>
            <tbody>
                <tr><td>SPY</td><td>512.33</td><td>75.2M</td></tr>
                <tr><td>QQQ</td><td>441.07</td><td>41.8M</td></tr>
            </tbody>
        </table></div>"#;

    // Resolves via the test-id hook but has no body rows yet.
    const SHELL_PAGE: &str = r#"
        <div data-testid="grid"><table>
            <thead><tr><th>Symbol</th><th>Price</th></tr></thead>
            <tbody></tbody>
        </table></div>"#;

    const NO_TABLE_PAGE: &str = "<html><body><p>loading...</p></body></html>";

    const NO_SYMBOL_PAGE: &str = r#"
        <div data-testid="grid"><table>
            <thead><tr><th>Symbol</th><th>Price</th></tr></thead>
            <tbody>
                <tr><td></td><td>1.00</td></tr>
                <tr><td> </td><td>2.00</td></tr>
            </tbody>
        </table></div>"#;

    fn profile() -> TableProfile {
        serde_json::from_str(
            r#"{
                "name": "grid",
                "strategies": [
                    { "type": "test_id", "value": "grid" },
                    { "type": "header_text" }
                ],
                "min_rows": 1
            }"#,
        )
        .unwrap()
    }

    fn opts() -> Options {
        Options {
            max_retries: 3,
            attempt_timeout: Duration::from_millis(80),
            poll_interval: Duration::from_millis(10),
            retry_backoff: Duration::from_millis(5),
            target_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn target() -> Target {
        Target::new("https://example.com/grid", "Test")
    }

    struct ScriptedAccessor {
        navigate_err: Option<ErrorCode>,
        snapshot_err: bool,
        bodies: Vec<String>,
        navigations: u32,
        polls: u32,
        releases: u32,
    }

    impl ScriptedAccessor {
        fn serving(bodies: &[&str]) -> Self {
            assert!(!bodies.is_empty());
            Self {
                navigate_err: None,
                snapshot_err: false,
                bodies: bodies.iter().map(|b| b.to_string()).collect(),
                navigations: 0,
                polls: 0,
                releases: 0,
            }
        }

        fn failing_navigation(code: ErrorCode) -> Self {
            let mut scripted = Self::serving(&[""]);
            scripted.navigate_err = Some(code);
            scripted
        }

        fn failing_snapshots() -> Self {
            let mut scripted = Self::serving(&[""]);
            scripted.snapshot_err = true;
            scripted
        }
    }

    #[async_trait]
    impl PageAccessor for ScriptedAccessor {
        async fn navigate(&mut self, url: &str) -> Result<(), SweepError> {
            self.navigations += 1;
            match self.navigate_err {
                Some(ErrorCode::InvalidUrl) => Err(SweepError::invalid_url(url, "Navigate", None)),
                Some(_) => Err(SweepError::navigate(
                    url,
                    "Navigate",
                    Some(anyhow::anyhow!("scripted failure")),
                )),
                None => Ok(()),
            }
        }

        async fn snapshot(&mut self) -> Result<String, SweepError> {
            self.polls += 1;
            if self.snapshot_err {
                return Err(SweepError::snapshot(
                    "https://example.com/grid",
                    "Snapshot",
                    Some(anyhow::anyhow!("scripted failure")),
                ));
            }
            let index = (self.polls as usize - 1).min(self.bodies.len() - 1);
            Ok(self.bodies[index].clone())
        }

        async fn release(&mut self) {
            self.releases += 1;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt() {
        let mut accessor = ScriptedAccessor::serving(&[GOOD_PAGE]);
        let (outcome, records) = run_target(
            &mut accessor,
            &profile(),
            &opts(),
            &target(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.kind, OutcomeKind::Scraped);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.records, 2);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].symbol, "SPY");
        assert_eq!(accessor.navigations, 1);
        assert_eq!(accessor.releases, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_rows_appear() {
        let mut accessor = ScriptedAccessor::serving(&[SHELL_PAGE, SHELL_PAGE, GOOD_PAGE]);
        let (outcome, records) = run_target(
            &mut accessor,
            &profile(),
            &opts(),
            &target(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.kind, OutcomeKind::Scraped);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(records.len(), 2);
        assert_eq!(accessor.polls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_when_rows_never_appear() {
        let mut accessor = ScriptedAccessor::serving(&[SHELL_PAGE]);
        let (outcome, records) = run_target(
            &mut accessor,
            &profile(),
            &opts(),
            &target(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.kind, OutcomeKind::Timeout);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(accessor.navigations, 3);
        assert_eq!(accessor.releases, 1);
        assert!(records.is_empty());
        assert!(outcome.detail.contains("no data rows"));
    }

    #[tokio::test(start_paused = true)]
    async fn no_table_when_strategies_never_match() {
        let mut accessor = ScriptedAccessor::serving(&[NO_TABLE_PAGE]);
        let (outcome, _) = run_target(
            &mut accessor,
            &profile(),
            &opts(),
            &target(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.kind, OutcomeKind::NoTable);
        assert_eq!(accessor.navigations, 3);
        assert!(outcome.detail.contains("test_id[grid]"));
        assert!(outcome.detail.contains("header_text"));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_extraction_is_retried_then_reported() {
        let mut accessor = ScriptedAccessor::serving(&[NO_SYMBOL_PAGE]);
        let (outcome, _) = run_target(
            &mut accessor,
            &profile(),
            &opts(),
            &target(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.kind, OutcomeKind::Empty);
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.detail.contains("2 rows yielded no records"));
    }

    #[tokio::test(start_paused = true)]
    async fn navigate_errors_are_retried() {
        let mut accessor = ScriptedAccessor::failing_navigation(ErrorCode::Navigate);
        let (outcome, _) = run_target(
            &mut accessor,
            &profile(),
            &opts(),
            &target(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.kind, OutcomeKind::PageError);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(accessor.navigations, 3);
        assert_eq!(accessor.releases, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_url_fails_without_retrying() {
        let mut accessor = ScriptedAccessor::failing_navigation(ErrorCode::InvalidUrl);
        let (outcome, _) = run_target(
            &mut accessor,
            &profile(),
            &opts(),
            &target(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.kind, OutcomeKind::PageError);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(accessor.navigations, 1);
        assert_eq!(accessor.releases, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_errors_are_retried() {
        let mut accessor = ScriptedAccessor::failing_snapshots();
        let (outcome, _) = run_target(
            &mut accessor,
            &profile(),
            &opts(),
            &target(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.kind, OutcomeKind::PageError);
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_token_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut accessor = ScriptedAccessor::serving(&[GOOD_PAGE]);
        let (outcome, records) =
            run_target(&mut accessor, &profile(), &opts(), &target(), &cancel).await;

        assert_eq!(outcome.kind, OutcomeKind::Cancelled);
        assert!(records.is_empty());
        assert_eq!(accessor.navigations, 0);
        assert_eq!(accessor.releases, 1);
    }
}
