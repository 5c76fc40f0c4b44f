//! Session-layer configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SOUK_API_BASE_URL` - Absolute base URL of the marketplace API
//!
//! ## Optional
//! - `SOUK_PUBLIC_ENDPOINTS` - Comma-separated URL substrings treated as
//!   public (no credential attached, no expiry handling). Overrides the
//!   built-in allow-list; most deployments leave it unset.

use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Session-layer configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Absolute base URL of the marketplace API.
    pub api_base_url: String,
    /// URL substrings identifying public endpoints.
    pub public_endpoints: Vec<String>,
}

impl SessionConfig {
    /// Configuration with the built-in public-endpoint allow-list.
    #[must_use]
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            public_endpoints: default_public_endpoints(),
        }
    }

    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `SOUK_API_BASE_URL` is missing or not an
    /// absolute URL.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = std::env::var("SOUK_API_BASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("SOUK_API_BASE_URL".to_owned()))?;
        Url::parse(&api_base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("SOUK_API_BASE_URL".to_owned(), e.to_string())
        })?;

        let public_endpoints = match std::env::var("SOUK_PUBLIC_ENDPOINTS") {
            Ok(raw) => {
                let patterns: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect();
                if patterns.is_empty() {
                    return Err(ConfigError::InvalidEnvVar(
                        "SOUK_PUBLIC_ENDPOINTS".to_owned(),
                        "no patterns after splitting on commas".to_owned(),
                    ));
                }
                patterns
            }
            Err(_) => default_public_endpoints(),
        };

        Ok(Self {
            api_base_url,
            public_endpoints,
        })
    }
}

/// The built-in public-endpoint allow-list: login/authenticate flows,
/// account-existence checks, and anonymous catalog reads.
#[must_use]
pub fn default_public_endpoints() -> Vec<String> {
    [
        "/auth/login",
        "/auth/authenticate",
        "/auth/exists",
        "/catalog/public",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
// env::set_var/remove_var are unsafe in edition 2024; fine in a test that
// serializes access.
#[allow(unsafe_code)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_the_minimum_allow_list() {
        let config = SessionConfig::new("https://api.souk.example");
        assert!(
            config
                .public_endpoints
                .iter()
                .any(|p| p.contains("login"))
        );
        assert!(
            config
                .public_endpoints
                .iter()
                .any(|p| p.contains("authenticate"))
        );
        assert!(
            config
                .public_endpoints
                .iter()
                .any(|p| p.contains("exists"))
        );
        assert!(
            config
                .public_endpoints
                .iter()
                .any(|p| p.contains("catalog"))
        );
    }

    #[test]
    fn test_from_env_requires_base_url() {
        // Serialize env mutation against other tests in this binary.
        static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());
        let _guard = ENV_LOCK.lock();

        unsafe {
            std::env::remove_var("SOUK_API_BASE_URL");
        }
        assert!(matches!(
            SessionConfig::from_env(),
            Err(ConfigError::MissingEnvVar(_))
        ));

        unsafe {
            std::env::set_var("SOUK_API_BASE_URL", "not a url");
        }
        assert!(matches!(
            SessionConfig::from_env(),
            Err(ConfigError::InvalidEnvVar(..))
        ));

        unsafe {
            std::env::set_var("SOUK_API_BASE_URL", "https://api.souk.example");
        }
        let config = SessionConfig::from_env().unwrap();
        assert_eq!(config.api_base_url, "https://api.souk.example");

        unsafe {
            std::env::remove_var("SOUK_API_BASE_URL");
        }
    }
}
