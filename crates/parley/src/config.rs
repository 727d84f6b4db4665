use std::env;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display};
use std::time::Duration;

use parley_http::{HttpApiConfig, HttpApiConfigBuilder};

const API_URL_VAR: &str = "PARLEY_API_URL";
const API_TOKEN_VAR: &str = "PARLEY_API_TOKEN";
const TIMEOUT_VAR: &str = "PARLEY_TIMEOUT_SECS";

/// Client configuration read from the environment.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the chat backend.
    pub api_url: String,
    /// Bearer token sent with every request.
    pub api_token: String,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
}

impl Config {
    /// Reads `PARLEY_API_URL`, `PARLEY_API_TOKEN` and the optional
    /// `PARLEY_TIMEOUT_SECS`.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`Config::from_env`], with variables resolved by
    /// `lookup`.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let api_url = required(API_URL_VAR)?;
        let api_token = required(API_TOKEN_VAR)?;
        let timeout = match lookup(TIMEOUT_VAR) {
            Some(value) => {
                let secs = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidTimeout(value.clone()))?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };
        Ok(Self {
            api_url,
            api_token,
            timeout,
        })
    }

    /// Builds the HTTP client configuration.
    pub fn api_config(&self) -> HttpApiConfig {
        let builder = HttpApiConfigBuilder::with_base_url(&self.api_url)
            .with_token(&self.api_token);
        match self.timeout {
            Some(timeout) => builder.with_timeout(timeout),
            None => builder,
        }
        .build()
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field("api_token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Error returned when the environment does not form a valid
/// [`Config`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    Missing(&'static str),
    /// The timeout is not a whole number of seconds.
    InvalidTimeout(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(name) => {
                write!(f, "{name} environment variable is not set")
            }
            ConfigError::InvalidTimeout(value) => {
                write!(f, "{TIMEOUT_VAR} is not a number of seconds: {value}")
            }
        }
    }
}

impl StdError for ConfigError {}
