//! Configuration management for the Misskey poster.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{PosterError, Result};
use crate::ratelimit::{DEFAULT_MAX_REQUESTS, DEFAULT_REFILL_INTERVAL};

/// Default timeout for a single API call.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Prefix for environment variable overrides, e.g.
/// `MISSKEY_POSTER__MISSKEY__AUTH_TOKEN`.
pub const ENV_PREFIX: &str = "MISSKEY_POSTER";

/// Main configuration for the poster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PosterConfig {
    /// Misskey API configuration
    #[serde(default)]
    pub misskey: MisskeyConfig,
}

/// Connection and quota settings for one Misskey instance.
///
/// Zero numeric values mean "use the default".
#[derive(Clone, Serialize, Deserialize)]
pub struct MisskeyConfig {
    /// Instance host name, without scheme
    #[serde(default)]
    pub host: String,

    /// API access token
    #[serde(default)]
    pub auth_token: String,

    /// Requests allowed per refill interval
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Seconds for one request to be refilled
    #[serde(default = "default_refill_interval_secs")]
    pub refill_interval_secs: u64,

    /// Timeout for a single API call in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl std::fmt::Debug for MisskeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MisskeyConfig")
            .field("host", &self.host)
            .field("auth_token", &"<redacted>")
            .field("max_requests", &self.max_requests)
            .field("refill_interval_secs", &self.refill_interval_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl Default for MisskeyConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            auth_token: String::new(),
            max_requests: default_max_requests(),
            refill_interval_secs: default_refill_interval_secs(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_max_requests() -> u32 {
    DEFAULT_MAX_REQUESTS
}

fn default_refill_interval_secs() -> u64 {
    DEFAULT_REFILL_INTERVAL.as_secs()
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT.as_secs()
}

impl MisskeyConfig {
    /// Create a configuration for `host` with default quotas.
    pub fn new(host: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            auth_token: auth_token.into(),
            ..Self::default()
        }
    }

    /// Effective bucket capacity.
    pub fn max_requests(&self) -> u32 {
        if self.max_requests == 0 {
            DEFAULT_MAX_REQUESTS
        } else {
            self.max_requests
        }
    }

    /// Effective refill interval.
    pub fn refill_interval(&self) -> Duration {
        if self.refill_interval_secs == 0 {
            DEFAULT_REFILL_INTERVAL
        } else {
            Duration::from_secs(self.refill_interval_secs)
        }
    }

    /// Effective HTTP timeout.
    pub fn http_timeout(&self) -> Duration {
        if self.http_timeout_secs == 0 {
            DEFAULT_HTTP_TIMEOUT
        } else {
            Duration::from_secs(self.http_timeout_secs)
        }
    }

    /// Check that the required fields are present.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(PosterError::Config("misskey.host is required".to_string()));
        }
        if self.auth_token.trim().is_empty() {
            return Err(PosterError::Config(
                "misskey.auth_token is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl PosterConfig {
    /// Load configuration from an optional file, overridden by environment
    /// variables prefixed with [`ENV_PREFIX`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(::config::File::from(path));
        }

        let config: PosterConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| PosterError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| PosterError::Config(format!("Failed to parse configuration: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PosterConfig::default();
        assert_eq!(config.misskey.max_requests(), 3);
        assert_eq!(config.misskey.refill_interval(), Duration::from_secs(10));
        assert_eq!(config.misskey.http_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_values_fall_back_to_defaults() {
        let config = MisskeyConfig {
            max_requests: 0,
            refill_interval_secs: 0,
            http_timeout_secs: 0,
            ..MisskeyConfig::new("misskey.example", "token")
        };

        assert_eq!(config.max_requests(), 3);
        assert_eq!(config.refill_interval(), Duration::from_secs(10));
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
misskey:
  host: misskey.example
  auth_token: secret
  max_requests: 5
  refill_interval_secs: 60
"#;

        let config = PosterConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.misskey.host, "misskey.example");
        assert_eq!(config.misskey.auth_token, "secret");
        assert_eq!(config.misskey.max_requests(), 5);
        assert_eq!(config.misskey.refill_interval(), Duration::from_secs(60));
        // Not set, so the default applies
        assert_eq!(config.misskey.http_timeout(), Duration::from_secs(30));
        assert!(config.misskey.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_host_and_token() {
        assert!(MisskeyConfig::new("", "token").validate().is_err());
        assert!(MisskeyConfig::new("misskey.example", " ").validate().is_err());
        assert!(MisskeyConfig::new("misskey.example", "token").validate().is_ok());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = MisskeyConfig::new("misskey.example", "super-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("misskey.example"));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "misskey-poster-config-{}.yaml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "misskey:\n  host: files.example\n  auth_token: abc\n  max_requests: 7\n",
        )
        .unwrap();

        let config = PosterConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.misskey.host, "files.example");
        assert_eq!(config.misskey.max_requests(), 7);
        assert_eq!(config.misskey.refill_interval(), Duration::from_secs(10));
    }
}
