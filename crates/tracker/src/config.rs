use std::time::Duration;

use tcgen_client::config::{env_opt, env_or, ConfigError};
use tcgen_core::job::JobKind;

/// Default poll interval for generation jobs (milliseconds).
pub const DEFAULT_GENERATION_POLL_MS: u64 = 2000;

/// Default poll interval for recognition jobs (milliseconds).
pub const DEFAULT_RECOGNITION_POLL_MS: u64 = 1000;

/// Polling cadence plus the caller's abandonment policy.
///
/// The supervisor only uses `interval`. The limits are enforced by the
/// session; `None` means unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Give up after this many ticks without reaching a terminal state.
    pub max_ticks: Option<u32>,
    /// Give up after this many failed polls in a row.
    pub max_consecutive_errors: Option<u32>,
    /// Give up once the session has been polling this long. Checked when
    /// a poll returns, so a hung request is bounded only by the client's
    /// request timeout.
    pub timeout: Option<Duration>,
}

impl PollConfig {
    /// Poll every `interval` with no limits.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            max_ticks: None,
            max_consecutive_errors: None,
            timeout: None,
        }
    }

    /// Default cadence per kind: 2s for generation, 1s for recognition.
    pub fn for_kind(kind: JobKind) -> Self {
        let ms = match kind {
            JobKind::Generation => DEFAULT_GENERATION_POLL_MS,
            JobKind::Recognition => DEFAULT_RECOGNITION_POLL_MS,
        };
        Self::every(Duration::from_millis(ms))
    }

    pub fn with_max_ticks(mut self, max_ticks: u32) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    pub fn with_max_consecutive_errors(mut self, max: u32) -> Self {
        self.max_consecutive_errors = Some(max);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The reason to give up, if any limit has been crossed.
    pub fn exceeded(&self, ticks: u32, consecutive_errors: u32, elapsed: Duration) -> Option<String> {
        if let Some(max) = self.max_consecutive_errors {
            if consecutive_errors >= max {
                return Some(format!("{consecutive_errors} consecutive status polls failed"));
            }
        }
        if let Some(max) = self.max_ticks {
            if ticks >= max {
                return Some(format!("no terminal status after {ticks} polls"));
            }
        }
        if let Some(timeout) = self.timeout {
            if elapsed >= timeout {
                return Some(format!("no terminal status after {}s", elapsed.as_secs()));
            }
        }
        None
    }
}

/// Polling settings for both job kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub generation: PollConfig,
    pub recognition: PollConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            generation: PollConfig::for_kind(JobKind::Generation),
            recognition: PollConfig::for_kind(JobKind::Recognition),
        }
    }
}

impl TrackerConfig {
    /// Load polling settings from environment variables with defaults.
    ///
    /// | Env Var                     | Default     |
    /// |-----------------------------|-------------|
    /// | `TCGEN_GENERATION_POLL_MS`  | `2000`      |
    /// | `TCGEN_RECOGNITION_POLL_MS` | `1000`      |
    /// | `TCGEN_MAX_POLL_ERRORS`     | unbounded   |
    /// | `TCGEN_MAX_POLL_TICKS`      | unbounded   |
    /// | `TCGEN_POLL_TIMEOUT_SECS`   | unbounded   |
    pub fn from_env() -> Result<Self, ConfigError> {
        let generation_ms: u64 = env_or("TCGEN_GENERATION_POLL_MS", DEFAULT_GENERATION_POLL_MS)?;
        let recognition_ms: u64 =
            env_or("TCGEN_RECOGNITION_POLL_MS", DEFAULT_RECOGNITION_POLL_MS)?;
        let max_errors: Option<u32> = env_opt("TCGEN_MAX_POLL_ERRORS")?;
        let max_ticks: Option<u32> = env_opt("TCGEN_MAX_POLL_TICKS")?;
        let timeout_secs: Option<u64> = env_opt("TCGEN_POLL_TIMEOUT_SECS")?;

        let limits = |interval_ms: u64| PollConfig {
            interval: Duration::from_millis(interval_ms.max(1)),
            max_ticks,
            max_consecutive_errors: max_errors,
            timeout: timeout_secs.map(Duration::from_secs),
        };

        Ok(Self {
            generation: limits(generation_ms),
            recognition: limits(recognition_ms),
        })
    }

    pub fn for_kind(&self, kind: JobKind) -> &PollConfig {
        match kind {
            JobKind::Generation => &self.generation,
            JobKind::Recognition => &self.recognition,
        }
    }
}
