//! Remote API configuration.

use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_BASE_URL: &str = "http://localhost:3019";

/// Which build the client runs in.
///
/// Only a development build may substitute demonstration data for a failed
/// dashboard fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildProfile {
    #[default]
    Production,
    Development,
}

impl BuildProfile {
    pub const fn allows_demo_data(self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Connection settings for the remote API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    /// Base URL for the legacy dashboard endpoints used as a fallback.
    pub legacy_base_url: String,
    /// Per-request timeout. `None` leaves it to the HTTP client.
    pub timeout: Option<Duration>,
    pub profile: BuildProfile,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ApiConfig {
    /// Creates a production configuration pointing both endpoints at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = trim_base(base_url.into());
        Self {
            legacy_base_url: base_url.clone(),
            base_url,
            timeout: None,
            profile: BuildProfile::Production,
        }
    }

    #[must_use]
    pub fn with_legacy_base_url(mut self, url: impl Into<String>) -> Self {
        self.legacy_base_url = trim_base(url.into());
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn with_profile(mut self, profile: BuildProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Reads the configuration from `DESK_API_URL`, `DESK_LEGACY_API_URL`,
    /// `DESK_API_TIMEOUT_MS` and `DESK_PROFILE`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a value that cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("DESK_API_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        validate_url("DESK_API_URL", &base_url)?;

        let mut config = Self::new(base_url);

        if let Some(legacy) = lookup("DESK_LEGACY_API_URL") {
            validate_url("DESK_LEGACY_API_URL", &legacy)?;
            config = config.with_legacy_base_url(legacy);
        }

        if let Some(raw) = lookup("DESK_API_TIMEOUT_MS") {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidDuration {
                    var: "DESK_API_TIMEOUT_MS",
                    value: raw.clone(),
                })?;
            config = config.with_timeout(Duration::from_millis(millis));
        }

        if let Some(raw) = lookup("DESK_PROFILE") {
            let profile = match raw.trim().to_ascii_lowercase().as_str() {
                "production" | "prod" => BuildProfile::Production,
                "development" | "dev" => BuildProfile::Development,
                _ => {
                    return Err(ConfigError::InvalidProfile {
                        var: "DESK_PROFILE",
                        value: raw,
                    });
                }
            };
            config = config.with_profile(profile);
        }

        Ok(config)
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn validate_url(var: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl {
            var,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::from_lookup(lookup(&[])).expect("defaults should load");
        assert_eq!(config.base_url, "http://localhost:3019");
        assert_eq!(config.legacy_base_url, config.base_url);
        assert_eq!(config.timeout, None);
        assert_eq!(config.profile, BuildProfile::Production);
        assert!(!config.profile.allows_demo_data());
    }

    #[test]
    fn test_all_vars() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("DESK_API_URL", "https://api.example.com/"),
            ("DESK_LEGACY_API_URL", "https://legacy.example.com"),
            ("DESK_API_TIMEOUT_MS", "1500"),
            ("DESK_PROFILE", "development"),
        ]))
        .expect("config should load");

        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.legacy_base_url, "https://legacy.example.com");
        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
        assert!(config.profile.allows_demo_data());
    }

    #[test]
    fn test_invalid_values() {
        let err = ApiConfig::from_lookup(lookup(&[("DESK_API_URL", "localhost")]))
            .expect_err("url without scheme should fail");
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));

        let err = ApiConfig::from_lookup(lookup(&[("DESK_API_TIMEOUT_MS", "soon")]))
            .expect_err("non-numeric timeout should fail");
        assert!(matches!(err, ConfigError::InvalidDuration { .. }));

        let err = ApiConfig::from_lookup(lookup(&[("DESK_PROFILE", "staging")]))
            .expect_err("unknown profile should fail");
        assert!(matches!(err, ConfigError::InvalidProfile { .. }));
    }
}
