use std::fmt::Debug;
use std::time::Duration;

/// Builder for [`HttpApiConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HttpApiConfigBuilder {
    base_url: String,
    token: Option<String>,
    timeout: Option<Duration>,
}

impl HttpApiConfigBuilder {
    /// Creates a builder for the API rooted at `base_url`.
    #[inline]
    pub fn with_base_url<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: None,
        }
    }

    /// Sets the bearer token sent with every request.
    #[inline]
    pub fn with_token<S: Into<String>>(mut self, token: S) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Limits how long a single request may take. Without it, requests
    /// wait as long as the underlying client allows.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> HttpApiConfig {
        HttpApiConfig {
            base_url: self.base_url.trim_end_matches('/').to_owned(),
            token: self.token.map(|t| t.trim().to_owned()).unwrap_or_default(),
            timeout: self.timeout,
        }
    }
}

impl Debug for HttpApiConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApiConfigBuilder")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Configuration for [`crate::HttpChatApi`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HttpApiConfig {
    pub(crate) base_url: String,
    pub(crate) token: String,
    pub(crate) timeout: Option<Duration>,
}

impl HttpApiConfig {
    /// Returns the API root, without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Debug for HttpApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}
