use std::str::FromStr;

use hopper_core::job_queue::{DEFAULT_JOB_LEASE_SECS, DEFAULT_LEASE_SWEEP_INTERVAL_SECS};

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// Every field except the authorization key has a default suitable for
/// local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Shared secret expected in `Authorization: Bearer <key>`.
    pub authorization_key: String,
    /// Seconds without progress before a Processing job is failed.
    /// `0` disables the lease sweeper.
    pub job_lease_secs: u64,
    /// How often the lease sweeper runs.
    pub lease_sweep_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `HOST`                      | `0.0.0.0`               |
    /// | `PORT`                      | `3000`                  |
    /// | `CORS_ORIGINS`              | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                    |
    /// | `AUTHORIZATION_KEY`         | required                |
    /// | `JOB_LEASE_SECS`            | `3600`                  |
    /// | `LEASE_SWEEP_INTERVAL_SECS` | `60`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&lookup, "PORT", 3000u16)?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30u64)?;

        let authorization_key = lookup("AUTHORIZATION_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("AUTHORIZATION_KEY"))?;

        let job_lease_secs = parse_or(&lookup, "JOB_LEASE_SECS", DEFAULT_JOB_LEASE_SECS)?;
        let lease_sweep_interval_secs = parse_or(
            &lookup,
            "LEASE_SWEEP_INTERVAL_SECS",
            DEFAULT_LEASE_SWEEP_INTERVAL_SECS,
        )?;
        if lease_sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "LEASE_SWEEP_INTERVAL_SECS",
                value: "0".into(),
                reason: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            authorization_key,
            job_lease_secs,
            lease_sweep_interval_secs,
        })
    }
}

/// Parse `var` if present, otherwise fall back to `default`.
pub(crate) fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}
