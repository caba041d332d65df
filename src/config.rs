//! Library configuration.

use std::time::Duration;

const DEFAULT_REFRESH_URL: &str = "/api/Auth/RefreshToken";
const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 15;

/// Settings for the refresh exchange.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// URL of the token refresh endpoint.
    pub refresh_url: String,
    /// Upper bound on the refresh exchange; timing out counts as a failed
    /// exchange.
    pub refresh_timeout: Duration,
}

impl AuthConfig {
    #[must_use]
    pub fn new(refresh_url: impl Into<String>) -> Self {
        Self {
            refresh_url: refresh_url.into(),
            refresh_timeout: Duration::from_secs(DEFAULT_REFRESH_TIMEOUT_SECS),
        }
    }

    /// Load from `AUTH_REFRESH_URL` and `AUTH_REFRESH_TIMEOUT_SECS`,
    /// falling back to defaults for anything missing or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let refresh_url =
            std::env::var("AUTH_REFRESH_URL").unwrap_or_else(|_| DEFAULT_REFRESH_URL.to_owned());
        let timeout_secs = env_parse("AUTH_REFRESH_TIMEOUT_SECS", DEFAULT_REFRESH_TIMEOUT_SECS);
        Self {
            refresh_url,
            refresh_timeout: Duration::from_secs(timeout_secs),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_URL)
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
