use std::time::Duration;

use tcgen_client::config::{ClientConfig, ConfigError};
use tcgen_tracker::config::TrackerConfig;

use crate::cli::Cli;

/// Everything the binary needs, loaded from the environment and then
/// overridden by command-line flags.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub tracker: TrackerConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            client: ClientConfig::from_env()?,
            tracker: TrackerConfig::from_env()?,
        })
    }

    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = Self::from_env()?;
        config.apply(cli);
        Ok(config)
    }

    fn apply(&mut self, cli: &Cli) {
        if let Some(base_url) = &cli.base_url {
            self.client.base_url = base_url.clone();
        }
        for poll in [&mut self.tracker.generation, &mut self.tracker.recognition] {
            if let Some(max) = cli.max_poll_errors {
                poll.max_consecutive_errors = Some(max);
            }
            if let Some(secs) = cli.timeout_secs {
                poll.timeout = Some(Duration::from_secs(secs));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn flags_override_both_kinds() {
        let cli = Cli::try_parse_from([
            "tcgen",
            "--base-url",
            "http://svc/api",
            "--max-poll-errors",
            "4",
            "--timeout-secs",
            "600",
            "ping",
        ])
        .unwrap();
        let mut config = AppConfig {
            client: ClientConfig::default(),
            tracker: TrackerConfig::default(),
        };
        config.apply(&cli);

        assert_eq!(config.client.base_url, "http://svc/api");
        assert_eq!(config.tracker.generation.max_consecutive_errors, Some(4));
        assert_eq!(config.tracker.recognition.timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.tracker.recognition.interval, Duration::from_secs(1));
    }
}
