//! Session configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Poll interval used when nothing else is configured.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Shortest poll interval a poller will run with.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Upper bound on how long a single job is polled.
pub const DEFAULT_MAX_POLL_SECS: u64 = 30 * 60;

/// How overlapping questions are handled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AskPolicy {
    /// Reject a question while another one is awaiting its answer
    #[default]
    Exclusive,
    /// Allow overlapping questions; answers are recorded in the order asked
    Pipelined,
}

/// Tunables for a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Delay between status polls
    pub poll_interval_ms: u64,
    /// Give up polling after this many seconds (`None` polls forever)
    pub max_poll_secs: Option<u64>,
    pub ask_policy: AskPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_poll_secs: Some(DEFAULT_MAX_POLL_SECS),
            ask_policy: AskPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Sub-millisecond intervals round up to [`MIN_POLL_INTERVAL`].
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.max(MIN_POLL_INTERVAL).as_millis() as u64;
        self
    }

    pub fn with_max_poll_duration(mut self, limit: Option<Duration>) -> Self {
        self.max_poll_secs = limit.map(|d| d.as_secs());
        self
    }

    pub fn with_ask_policy(mut self, policy: AskPolicy) -> Self {
        self.ask_policy = policy;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_poll_duration(&self) -> Option<Duration> {
        self.max_poll_secs.map(Duration::from_secs)
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> SessionResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `VIDRAG_POLL_INTERVAL_MS` and `VIDRAG_MAX_POLL_SECS` overrides.
    ///
    /// `VIDRAG_MAX_POLL_SECS=0` disables the polling limit.
    pub fn merge_env(mut self) -> SessionResult<Self> {
        if let Ok(value) = std::env::var("VIDRAG_POLL_INTERVAL_MS") {
            self.poll_interval_ms = value.trim().parse().map_err(|_| {
                SessionError::Config(format!("invalid VIDRAG_POLL_INTERVAL_MS: {}", value))
            })?;
        }
        if let Ok(value) = std::env::var("VIDRAG_MAX_POLL_SECS") {
            let secs: u64 = value.trim().parse().map_err(|_| {
                SessionError::Config(format!("invalid VIDRAG_MAX_POLL_SECS: {}", value))
            })?;
            self.max_poll_secs = (secs > 0).then_some(secs);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(SessionError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
