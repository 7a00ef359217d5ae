// ABOUTME: Sweep configuration options and the SweeperBuilder fluent API.
// ABOUTME: Provides defaults for retry, timeout, polling and pacing knobs.

use std::collections::HashMap;
use std::time::Duration;

use crate::accessor::{HttpAccessor, PageAccessor};
use crate::locator::loader::{load_builtin_profiles, GENERIC_PROFILE};
use crate::locator::profile::TableProfile;
use crate::sweep::Sweeper;

/// Configuration options for a sweep.
#[derive(Debug, Clone)]
pub struct Options {
    /// Total navigation attempts per target, including the first.
    pub max_retries: u32,
    /// Wall-clock budget for one attempt: navigation plus readiness polling.
    pub attempt_timeout: Duration,
    /// Pause between readiness probes. The first probe runs immediately.
    pub poll_interval: Duration,
    /// Pause before re-attempting a failed target.
    pub retry_backoff: Duration,
    /// Pause between consecutive targets.
    pub target_delay: Duration,
    /// User-Agent header sent with page fetches.
    pub user_agent: String,
    /// Allow fetching from private/loopback addresses. Off by default.
    pub allow_private_networks: bool,
    /// Extra headers sent with every page fetch.
    pub headers: HashMap<String, String>,
    /// Custom HTTP client. When `None`, one is built from these options.
    pub http_client: Option<reqwest::Client>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_retries: 3,
            attempt_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
            retry_backoff: Duration::from_secs(2),
            target_delay: Duration::from_secs(1),
            user_agent: "Mozilla/5.0 (compatible; Demeter/0.1; +https://github.com/marketsweep/demeter)"
                .to_string(),
            allow_private_networks: false,
            headers: HashMap::new(),
            http_client: None,
        }
    }
}

/// Builder for constructing a [`Sweeper`] with custom options.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use marketsweep_demeter::SweeperBuilder;
///
/// let sweeper = SweeperBuilder::new()
///     .max_retries(2)
///     .attempt_timeout(Duration::from_secs(10))
///     .build();
/// ```
#[derive(Default)]
pub struct SweeperBuilder {
    opts: Options,
    profile: Option<TableProfile>,
    accessor: Option<Box<dyn PageAccessor>>,
}

impl SweeperBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total attempts per target. Clamped to at least one at build
    /// time so every target is tried.
    pub fn max_retries(mut self, attempts: u32) -> Self {
        self.opts.max_retries = attempts;
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.opts.attempt_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.opts.poll_interval = interval;
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.opts.retry_backoff = backoff;
        self
    }

    pub fn target_delay(mut self, delay: Duration) -> Self {
        self.opts.target_delay = delay;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.opts.allow_private_networks = allow;
        self
    }

    /// Adds a header sent with every page fetch.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(name.into(), value.into());
        self
    }

    /// Uses a pre-configured HTTP client instead of building one.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Sets the table profile. Defaults to the builtin generic profile.
    pub fn profile(mut self, profile: TableProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Swaps in a custom page accessor, e.g. a [`crate::accessor::StaticAccessor`]
    /// for offline runs. Defaults to [`HttpAccessor`].
    pub fn accessor(mut self, accessor: Box<dyn PageAccessor>) -> Self {
        self.accessor = Some(accessor);
        self
    }

    /// Builds the [`Sweeper`].
    ///
    /// # Panics
    ///
    /// Panics if the default HTTP client cannot be constructed, which only
    /// happens when the TLS backend is unavailable.
    pub fn build(self) -> Sweeper {
        let mut opts = self.opts;
        opts.max_retries = opts.max_retries.max(1);
        let profile = self.profile.unwrap_or_else(|| {
            load_builtin_profiles()
                .get(GENERIC_PROFILE)
                .cloned()
                .expect("builtin profiles include a generic fallback")
        });
        let accessor = self
            .accessor
            .unwrap_or_else(|| Box::new(HttpAccessor::from_options(&opts)));
        Sweeper::new(opts, profile, accessor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_options() {
        let opts = Options::default();
        assert_eq!(opts.max_retries, 3);
        assert_eq!(opts.attempt_timeout, Duration::from_secs(30));
        assert_eq!(opts.poll_interval, Duration::from_secs(1));
        assert_eq!(opts.retry_backoff, Duration::from_secs(2));
        assert_eq!(opts.target_delay, Duration::from_secs(1));
        assert!(opts.user_agent.contains("Demeter"));
        assert!(!opts.allow_private_networks);
        assert!(opts.headers.is_empty());
        assert!(opts.http_client.is_none());
    }

    #[test]
    fn builder_sets_options() {
        let builder = SweeperBuilder::new()
            .max_retries(5)
            .attempt_timeout(Duration::from_secs(10))
            .poll_interval(Duration::from_millis(250))
            .retry_backoff(Duration::from_millis(500))
            .target_delay(Duration::ZERO)
            .user_agent("TestAgent/1.0")
            .allow_private_networks(true)
            .header("X-Test", "1");
        assert_eq!(builder.opts.max_retries, 5);
        assert_eq!(builder.opts.attempt_timeout, Duration::from_secs(10));
        assert_eq!(builder.opts.poll_interval, Duration::from_millis(250));
        assert_eq!(builder.opts.retry_backoff, Duration::from_millis(500));
        assert_eq!(builder.opts.target_delay, Duration::ZERO);
        assert_eq!(builder.opts.user_agent, "TestAgent/1.0");
        assert!(builder.opts.allow_private_networks);
        assert_eq!(builder.opts.headers.get("X-Test"), Some(&"1".to_string()));
    }

    #[test]
    fn build_clamps_retries_and_defaults_profile() {
        let sweeper = SweeperBuilder::new().max_retries(0).build();
        assert_eq!(sweeper.options().max_retries, 1);
        assert_eq!(sweeper.profile().name, "generic");
    }

    #[test]
    fn build_keeps_explicit_profile() {
        let profile = load_builtin_profiles().get("yahoo-etfs").cloned().unwrap();
        let sweeper = SweeperBuilder::new().profile(profile).build();
        assert_eq!(sweeper.profile().name, "yahoo-etfs");
    }
}
