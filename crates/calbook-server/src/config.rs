//! Engine configuration.
//!
//! All settings live in a single `config.toml`, by default at
//! `~/.config/calbook/config.toml`:
//!
//! ```toml
//! [fan_out]
//! max_concurrency = 5
//! adapter_timeout_secs = 30
//!
//! [availability]
//! default_step_minutes = 15
//! max_range_days = 62
//!
//! [providers.google]
//! client_id = "xxx.apps.googleusercontent.com"
//! client_secret = "env::GOOGLE_CLIENT_SECRET"
//!
//! [links]
//! base_url = "https://cal.example.com"
//! ```
//!
//! Provider `client_id` and `client_secret` accept `env::VAR` references.

use std::path::{Path, PathBuf};
use std::time::Duration;

use calbook_providers::ProvidersConfig;
#[cfg(feature = "google")]
use calbook_providers::google::GoogleConfig;
#[cfg(feature = "office365")]
use calbook_providers::office365::Office365Config;
#[cfg(feature = "zoom")]
use calbook_providers::zoom::ZoomConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::secret;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot resolve secret {reference}: {message}")]
    Secret { reference: String, message: String },

    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Configuration of the booking engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fan_out: FanOutSettings,
    pub availability: AvailabilitySettings,
    pub providers: ProviderSettings,
    pub links: LinkSettings,
}

/// Bounds of one adapter fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanOutSettings {
    /// Adapter calls running at once within one operation.
    pub max_concurrency: usize,
    /// Deadline of each adapter call, in seconds.
    pub adapter_timeout_secs: u64,
}

impl Default for FanOutSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            adapter_timeout_secs: 30,
        }
    }
}

impl FanOutSettings {
    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_secs(self.adapter_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilitySettings {
    /// Step between candidate slots when the event type sets none.
    /// Defaults to the slot length.
    pub default_step_minutes: Option<u32>,
    /// Longest date range accepted by an availability query.
    pub max_range_days: u32,
}

impl Default for AvailabilitySettings {
    fn default() -> Self {
        Self {
            default_step_minutes: None,
            max_range_days: 62,
        }
    }
}

/// OAuth client registrations, one table per provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub google: Option<ProviderClient>,
    pub office365: Option<ProviderClient>,
    pub zoom: Option<ProviderClient>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderClient {
    pub client_id: String,
    pub client_secret: String,
    /// API base URL override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Token endpoint override.
    #[serde(default)]
    pub token_url: Option<String>,
}

impl ProviderClient {
    fn resolved_credentials(&self) -> Result<(String, String), ConfigError> {
        Ok((secret::resolve(&self.client_id)?, secret::resolve(&self.client_secret)?))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    /// Public base URL for cancel and reschedule links.
    pub base_url: Option<String>,
}

impl EngineConfig {
    /// Loads configuration from the default path, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calbook")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fan_out.max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "fan_out.max_concurrency",
                message: "must be at least 1".into(),
            });
        }
        if self.fan_out.adapter_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "fan_out.adapter_timeout_secs",
                message: "must be at least 1".into(),
            });
        }
        if self.availability.default_step_minutes == Some(0) {
            return Err(ConfigError::Invalid {
                field: "availability.default_step_minutes",
                message: "must be positive".into(),
            });
        }
        self.link_base()?;
        Ok(())
    }

    /// Builder: set the fan-out bounds.
    pub fn with_fan_out(mut self, max_concurrency: usize, adapter_timeout: Duration) -> Self {
        self.fan_out = FanOutSettings {
            max_concurrency,
            adapter_timeout_secs: adapter_timeout.as_secs(),
        };
        self
    }

    /// Builder: set the public base URL.
    pub fn with_link_base(mut self, base_url: impl Into<String>) -> Self {
        self.links.base_url = Some(base_url.into());
        self
    }

    /// Parses the link base URL, if configured.
    pub fn link_base(&self) -> Result<Option<Url>, ConfigError> {
        self.links
            .base_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw).map_err(|e| ConfigError::Invalid {
                    field: "links.base_url",
                    message: e.to_string(),
                })
            })
            .transpose()
    }

    /// Builds the adapter configurations, resolving secret references.
    pub fn providers_config(&self) -> Result<ProvidersConfig, ConfigError> {
        let timeout = self.fan_out.adapter_timeout();
        let mut config = ProvidersConfig::default();

        #[cfg(feature = "google")]
        if let Some(client) = &self.providers.google {
            let (id, secret) = client.resolved_credentials()?;
            let mut google = GoogleConfig::new(id, secret).with_timeout(timeout);
            if let Some(base) = &client.base_url {
                google = google.with_api_base(base.as_str());
            }
            if let Some(token_url) = &client.token_url {
                google = google.with_token_url(token_url.as_str());
            }
            config.google = Some(google);
        }

        #[cfg(feature = "office365")]
        if let Some(client) = &self.providers.office365 {
            let (id, secret) = client.resolved_credentials()?;
            let mut office365 = Office365Config::new(id, secret).with_timeout(timeout);
            if let Some(base) = &client.base_url {
                office365 = office365.with_api_base(base.as_str());
            }
            if let Some(token_url) = &client.token_url {
                office365 = office365.with_token_url(token_url.as_str());
            }
            config.office365 = Some(office365);
        }

        #[cfg(feature = "zoom")]
        if let Some(client) = &self.providers.zoom {
            let (id, secret) = client.resolved_credentials()?;
            let mut zoom = ZoomConfig::new(id, secret).with_timeout(timeout);
            if let Some(base) = &client.base_url {
                zoom = zoom.with_api_base(base.as_str());
            }
            if let Some(token_url) = &client.token_url {
                zoom = zoom.with_token_url(token_url.as_str());
            }
            config.zoom = Some(zoom);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.fan_out.max_concurrency, 5);
        assert_eq!(config.fan_out.adapter_timeout(), Duration::from_secs(30));
        assert_eq!(config.availability.max_range_days, 62);
        assert_eq!(config.availability.default_step_minutes, None);
        assert!(config.links.base_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[fan_out]
max_concurrency = 3

[availability]
default_step_minutes = 15

[providers.google]
client_id = "id.apps.googleusercontent.com"
client_secret = "plain-secret"
base_url = "http://127.0.0.1:9000/"

[links]
base_url = "https://cal.example.com"
"#
        )
        .unwrap();

        let config = EngineConfig::load_from(file.path()).unwrap();
        assert_eq!(config.fan_out.max_concurrency, 3);
        assert_eq!(config.fan_out.adapter_timeout_secs, 30);
        assert_eq!(config.availability.default_step_minutes, Some(15));
        assert_eq!(config.availability.max_range_days, 62);
        assert_eq!(
            config.link_base().unwrap().map(|u| u.to_string()),
            Some("https://cal.example.com/".to_string())
        );

        let providers = config.providers_config().unwrap();
        let google = providers.google.unwrap();
        assert_eq!(google.app.client_secret, "plain-secret");
        assert_eq!(google.api_base, "http://127.0.0.1:9000");
        assert!(providers.office365.is_none());
    }

    #[test]
    fn secrets_are_resolved_from_env() {
        unsafe {
            std::env::set_var("_CALBOOK_TEST_ZOOM_SECRET", "from-env");
        }
        let config: EngineConfig = toml::from_str(
            r#"
[providers.zoom]
client_id = "zoom-id"
client_secret = "env::_CALBOOK_TEST_ZOOM_SECRET"
"#,
        )
        .unwrap();
        let zoom = config.providers_config().unwrap().zoom.unwrap();
        assert_eq!(zoom.app.client_secret, "from-env");
        unsafe {
            std::env::remove_var("_CALBOOK_TEST_ZOOM_SECRET");
        }
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[fan_out]\nmax_concurrency = 0").unwrap();
        let err = EngineConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "fan_out.max_concurrency", .. }));

        let config = EngineConfig::default().with_link_base("not a url");
        assert!(config.validate().is_err());
    }

    #[test]
    fn unparsable_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[fan_out\nmax_concurrency = ").unwrap();
        assert!(matches!(
            EngineConfig::load_from(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn builder_sets_fan_out() {
        let config = EngineConfig::default().with_fan_out(2, Duration::from_secs(4));
        assert_eq!(config.fan_out.max_concurrency, 2);
        assert_eq!(config.fan_out.adapter_timeout(), Duration::from_secs(4));
    }
}
