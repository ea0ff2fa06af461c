//! Client configuration: API location, timeouts, cache window and poll policies.
//!
//! # Environment Variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `PANTRY_API_URL` | `http://localhost:5000/api` | Backend base URL |
//! | `PANTRY_TIMEOUT_MS` | `10000` | Per-request timeout |
//! | `PANTRY_CACHE_TTL_SECS` | `3600` | Freshness window of cached resources |
//! | `PANTRY_POLL_MAX_WAIT_SECS` | `300` | Upper bound on polling one job, `0` disables it |

use std::env;
use std::time::Duration;

use crate::domain::JobKind;
use crate::ValidationError;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(5 * 60);

/// How one job kind is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between a pending response and the next check.
    pub interval: Duration,
    /// Give up after this much virtual time without a terminal status.
    pub max_wait: Option<Duration>,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_wait: Option<Duration>) -> Result<Self, ValidationError> {
        if interval.is_zero() {
            return Err(ValidationError::ZeroPollInterval);
        }
        Ok(Self { interval, max_wait })
    }

    /// `interval` bounded by [`DEFAULT_MAX_WAIT`].
    pub fn fixed(interval: Duration) -> Result<Self, ValidationError> {
        Self::new(interval, Some(DEFAULT_MAX_WAIT))
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }
}

/// One poll policy per job kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub email_verification: PollPolicy,
    pub account_data_fetch: PollPolicy,
    pub dashboard_aggregate: PollPolicy,
}

impl PollingConfig {
    pub const fn policy_for(&self, kind: JobKind) -> PollPolicy {
        match kind {
            JobKind::EmailVerification => self.email_verification,
            JobKind::AccountDataFetch => self.account_data_fetch,
            JobKind::DashboardAggregate => self.dashboard_aggregate,
        }
    }

    fn with_max_wait(self, max_wait: Option<Duration>) -> Self {
        Self {
            email_verification: self.email_verification.with_max_wait(max_wait),
            account_data_fetch: self.account_data_fetch.with_max_wait(max_wait),
            dashboard_aggregate: self.dashboard_aggregate.with_max_wait(max_wait),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        let policy = |seconds| PollPolicy {
            interval: Duration::from_secs(seconds),
            max_wait: Some(DEFAULT_MAX_WAIT),
        };
        Self {
            email_verification: policy(3),
            account_data_fetch: policy(2),
            dashboard_aggregate: policy(5),
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_url: String,
    pub timeout_ms: u64,
    pub freshness_window: Duration,
    pub polling: PollingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: String::from(DEFAULT_API_URL),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            polling: PollingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `PANTRY_*` environment variables.
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("PANTRY_API_URL") {
            config = config.with_api_url(url);
        }
        if let Some(value) = lookup("PANTRY_TIMEOUT_MS") {
            config.timeout_ms = parse_u64("PANTRY_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("PANTRY_CACHE_TTL_SECS") {
            let seconds = parse_u64("PANTRY_CACHE_TTL_SECS", &value)?;
            config.freshness_window = Duration::from_secs(seconds);
        }
        if let Some(value) = lookup("PANTRY_POLL_MAX_WAIT_SECS") {
            let seconds = parse_u64("PANTRY_POLL_MAX_WAIT_SECS", &value)?;
            config = config.with_max_wait(max_wait_from_secs(seconds));
        }

        Ok(config)
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    /// Apply the same wait bound to every job kind; `None` polls without bound.
    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.polling = self.polling.with_max_wait(max_wait);
        self
    }

    pub fn with_poll_policy(mut self, kind: JobKind, policy: PollPolicy) -> Self {
        match kind {
            JobKind::EmailVerification => self.polling.email_verification = policy,
            JobKind::AccountDataFetch => self.polling.account_data_fetch = policy,
            JobKind::DashboardAggregate => self.polling.dashboard_aggregate = policy,
        }
        self
    }

    pub const fn poll_policy(&self, kind: JobKind) -> PollPolicy {
        self.polling.policy_for(kind)
    }
}

/// `0` means "no bound".
pub fn max_wait_from_secs(seconds: u64) -> Option<Duration> {
    (seconds > 0).then(|| Duration::from_secs(seconds))
}

fn parse_u64(key: &'static str, value: &str) -> Result<u64, ValidationError> {
    value
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidConfig {
            key,
            value: value.to_owned(),
        })
}
