use std::str::FromStr;
use std::time::Duration;

use hopper_core::job_queue::{
    validate_tag, validate_worker_id, DEFAULT_POLL_ERROR_MS, DEFAULT_POLL_IDLE_MS,
};

use crate::pool::BackoffPolicy;

/// Errors raised while reading worker configuration.
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

/// Worker process configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Base URL of the dispatcher, without the `/api/v1` suffix.
    pub dispatcher_url: String,
    /// Shared key sent as `Authorization: Bearer <key>`.
    pub authorization_key: String,
    /// Number of concurrent pollers.
    pub worker_count: usize,
    /// Only claim requests with this tag.
    pub tag: Option<String>,
    pub backoff: BackoffPolicy,
    /// Per-call HTTP timeout.
    pub http_timeout: Duration,
    /// Process name; poller `n` identifies itself as `<name>/<n>`.
    pub worker_name: String,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var             | Default                        |
    /// |---------------------|--------------------------------|
    /// | `DISPATCHER_URL`    | `http://127.0.0.1:3000`        |
    /// | `AUTHORIZATION_KEY` | required                       |
    /// | `WORKER_COUNT`      | available parallelism          |
    /// | `WORKER_TAG`        | none (claim any tag)           |
    /// | `POLL_IDLE_MS`      | `5000`                         |
    /// | `POLL_ERROR_MS`     | `5000`                         |
    /// | `HTTP_TIMEOUT_SECS` | `30`                           |
    /// | `WORKER_NAME`       | `$HOSTNAME` or `worker`, plus a random suffix |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let dispatcher_url = lookup("DISPATCHER_URL")
            .unwrap_or_else(|| "http://127.0.0.1:3000".into())
            .trim_end_matches('/')
            .to_string();

        let authorization_key = lookup("AUTHORIZATION_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("AUTHORIZATION_KEY"))?;

        let default_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let worker_count = parse_or(&lookup, "WORKER_COUNT", default_count)?;
        if worker_count == 0 {
            return Err(invalid("WORKER_COUNT", "0", "must be at least 1"));
        }

        let tag = lookup("WORKER_TAG").filter(|t| !t.is_empty());
        if let Some(tag) = tag.as_deref() {
            validate_tag(tag).map_err(|e| invalid("WORKER_TAG", tag, e))?;
        }

        let backoff = BackoffPolicy {
            idle: Duration::from_millis(parse_or(&lookup, "POLL_IDLE_MS", DEFAULT_POLL_IDLE_MS)?),
            error: Duration::from_millis(parse_or(
                &lookup,
                "POLL_ERROR_MS",
                DEFAULT_POLL_ERROR_MS,
            )?),
        };

        let http_timeout = Duration::from_secs(parse_or(&lookup, "HTTP_TIMEOUT_SECS", 30u64)?);

        let worker_name = match lookup("WORKER_NAME") {
            Some(name) => name,
            None => generated_name(lookup("HOSTNAME").as_deref()),
        };
        // Validate the longest identity any poller will send.
        validate_worker_id(&poller_identity(&worker_name, worker_count - 1))
            .map_err(|e| invalid("WORKER_NAME", &worker_name, e))?;

        Ok(Self {
            dispatcher_url,
            authorization_key,
            worker_count,
            tag,
            backoff,
            http_timeout,
            worker_name,
        })
    }
}

/// Identity poller `index` sends in `X-Worker-Id`.
pub fn poller_identity(worker_name: &str, index: usize) -> String {
    format!("{worker_name}/{index}")
}

fn generated_name(host: Option<&str>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let prefix = host
        .map(|h| h.trim())
        .filter(|h| !h.is_empty() && validate_worker_id(h).is_ok())
        .unwrap_or("worker");
    format!("{prefix}-{}", &suffix[..8])
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T>(
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
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, &value, e)),
    }
}
