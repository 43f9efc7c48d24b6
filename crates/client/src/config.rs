use std::str::FromStr;
use std::time::Duration;

/// Default service root of a local backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the remote job service.
///
/// All fields have defaults suitable for a local backend. Override via
/// environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service root that the endpoint paths are appended to.
    pub base_url: String,
    /// Timeout applied to every request (submit, status, result).
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                     |
    /// |------------------------------|-----------------------------|
    /// | `TCGEN_BASE_URL`             | `http://localhost:8080/api` |
    /// | `TCGEN_REQUEST_TIMEOUT_SECS` | `30`                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            std::env::var("TCGEN_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());

        let request_timeout_secs: u64 =
            env_or("TCGEN_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;

        Ok(Self {
            base_url,
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }
}

/// A present but unparsable environment variable.
#[derive(Debug, thiserror::Error)]
#[error("{var} must be a valid {expected}, got '{value}'")]
pub struct ConfigError {
    pub var: &'static str,
    pub expected: &'static str,
    pub value: String,
}

/// Parse `var` if set, otherwise return `default`.
pub fn env_or<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(env_opt(var)?.unwrap_or(default))
}

/// Parse `var` if set and non-empty.
pub fn env_opt<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => {
            value.trim().parse().map(Some).map_err(|_| ConfigError {
                var,
                expected: std::any::type_name::<T>(),
                value,
            })
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_backend() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080/api");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn unset_variable_yields_default() {
        let value: u64 = env_or("TCGEN_TEST_SURELY_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }
}
