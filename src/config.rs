use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, warn};

use crate::core::{Endpoint, EndpointClass, RetryConfig};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Trait for types that can retrieve a configuration value from environment variables
pub trait KeyFromEnv {
    /// The environment variable name for this value
    const KEY_NAME: &'static str;

    /// Find the value by checking the `.env` file first, then the process environment
    fn find_key() -> Option<String> {
        // Silently ignore a missing .env file
        let _ = dotenvy::dotenv();

        env::var(Self::KEY_NAME)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }
}

/// Per-class request timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub content_processing: Duration,
    pub generation: Duration,
    pub interactive: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            content_processing: Duration::from_secs(300),
            generation: Duration::from_secs(180),
            interactive: Duration::from_secs(60),
        }
    }
}

impl TimeoutPolicy {
    pub fn for_endpoint(&self, endpoint: Endpoint) -> Duration {
        match endpoint.class() {
            EndpointClass::ContentProcessing => self.content_processing,
            EndpointClass::Generation => self.generation,
            EndpointClass::Interactive => self.interactive,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeouts: TimeoutPolicy,
    pub retry: RetryConfig,
}

impl KeyFromEnv for ClientConfig {
    const KEY_NAME: &'static str = "STUDY_API_BASE_URL";
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeouts: TimeoutPolicy::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Build the configuration from `STUDY_*` environment variables (and `.env`).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let base_url = Self::find_key().unwrap_or(defaults.base_url);

        let timeouts = TimeoutPolicy {
            content_processing: Duration::from_secs(parse_or(
                "STUDY_TIMEOUT_PROCESS_SECS",
                env::var("STUDY_TIMEOUT_PROCESS_SECS").ok(),
                defaults.timeouts.content_processing.as_secs(),
            )),
            generation: Duration::from_secs(parse_or(
                "STUDY_TIMEOUT_GENERATE_SECS",
                env::var("STUDY_TIMEOUT_GENERATE_SECS").ok(),
                defaults.timeouts.generation.as_secs(),
            )),
            interactive: Duration::from_secs(parse_or(
                "STUDY_TIMEOUT_DEFAULT_SECS",
                env::var("STUDY_TIMEOUT_DEFAULT_SECS").ok(),
                defaults.timeouts.interactive.as_secs(),
            )),
        };

        let retry = RetryConfig {
            max_retries: parse_or(
                "STUDY_MAX_RETRIES",
                env::var("STUDY_MAX_RETRIES").ok(),
                defaults.retry.max_retries,
            ),
            base_delay: Duration::from_millis(parse_or(
                "STUDY_RETRY_BASE_MS",
                env::var("STUDY_RETRY_BASE_MS").ok(),
                defaults.retry.base_delay.as_millis() as u64,
            )),
        };

        debug!(base_url = %base_url, ?timeouts, ?retry, "Loaded client configuration");
        Self { base_url, timeouts, retry }
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Join the base URL and an endpoint path without doubling slashes.
    pub fn url_for(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), endpoint.path())
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Display + Copy,
{
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %value, default = %default, "Ignoring unparsable configuration value");
            default
        }),
    }
}
