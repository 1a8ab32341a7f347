//! Client configuration.

use std::time::Duration;

use url::Url;

use crate::ApiError;

/// Environment variable holding the backend base URL.
pub(crate) const BASE_URL_ENV: &str = "CHATLINE_BASE_URL";
/// Environment variable holding the request timeout in whole seconds.
pub(crate) const TIMEOUT_ENV: &str = "CHATLINE_TIMEOUT_SECS";

const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Configuration for [`ApiClient`](crate::ApiClient).
///
/// Defaults point at a backend on `localhost:3000` with a 30 second
/// request timeout. Override individual fields with the `with_*` setters or
/// read them from the environment with [`from_env`](Self::from_env).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Root of the backend API. Endpoint paths are appended to it, so a
    /// base of `https://host/api` yields `https://host/api/auth/token`.
    pub base_url: Url,

    /// Upper bound on a single request, connect to last byte.
    pub timeout: Duration,

    /// Sent as the `User-Agent` header.
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            timeout: Duration::from_secs(30),
            user_agent: concat!("chatline/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ApiConfig {
    /// Builds a config from `CHATLINE_BASE_URL` and `CHATLINE_TIMEOUT_SECS`,
    /// falling back to defaults for unset variables.
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] if a variable is set but invalid.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] if a variable is set but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let mut config = Self::default();

        if let Some(raw) = non_empty(lookup(BASE_URL_ENV)) {
            config = config.with_base_url(&raw)?;
        }

        if let Some(raw) = non_empty(lookup(TIMEOUT_ENV)) {
            let secs: u64 = raw.parse().map_err(|_| {
                ApiError::Config(format!("{TIMEOUT_ENV} must be a whole number of seconds, got {raw:?}"))
            })?;
            config = config.with_timeout(Duration::from_secs(secs))?;
        }

        Ok(config)
    }

    /// Sets the base URL.
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] if `raw` isn't an absolute `http(s)` URL.
    pub fn with_base_url(mut self, raw: &str) -> Result<Self, ApiError> {
        let url = Url::parse(raw.trim())
            .map_err(|e| ApiError::Config(format!("invalid base URL {raw:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::Config(format!(
                "base URL must use http or https, got {:?}",
                url.scheme()
            )));
        }
        self.base_url = url;
        Ok(self)
    }

    /// Sets the request timeout.
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] for a zero timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ApiError> {
        if timeout.is_zero() {
            return Err(ApiError::Config("timeout must be greater than zero".into()));
        }
        self.timeout = timeout;
        Ok(self)
    }

    /// Resolves an endpoint path under the base URL. Each segment is
    /// percent-encoded, so IDs can't escape their path position.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Config(format!("base URL {} cannot have a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
