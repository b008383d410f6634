//! # Configuration
//!
//! Runtime settings for bike-exchange. Values come from built-in defaults,
//! then a `.env` file, then `BX__`-prefixed environment variables, with
//! `__` separating nested keys (e.g. `BX__API__BASE_URL`).

use std::time::Duration;

use config::{Config, Environment, Map};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

pub const ENV_PREFIX: &str = "BX";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|token| !token.trim().is_empty())
        .map(SecretString::from))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Bearer token for the marketplace backend.
    #[serde(default, deserialize_with = "optional_secret")]
    pub token: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub dir: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncSettings {
    /// Seller whose postings are synced on startup.
    #[serde(default)]
    pub seller_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api: ApiSettings,
    pub cache: CacheSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Loads `.env` (if present) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::build(None)
    }

    /// Same as [`Settings::load`] but reads variables from `vars` instead of
    /// the process environment.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: Map<String, String> = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self::build(Some(vars))
    }

    fn build(vars: Option<Map<String, String>>) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .set_default("api.base_url", "http://localhost:8080")?
            .set_default("api.timeout_secs", 15)?
            .set_default("cache.dir", "./data/cache")?
            .set_default("log.json", false)?
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.api.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api.base_url must be an http(s) URL, got '{base_url}'"
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "api.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.cache.dir.trim().is_empty() {
            return Err(ConfigError::Invalid("cache.dir must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(settings.api.base_url, "http://localhost:8080");
        assert_eq!(settings.timeout(), Duration::from_secs(15));
        assert!(settings.api.token.is_none());
        assert_eq!(settings.cache.dir, "./data/cache");
        assert_eq!(settings.sync.seller_id, None);
        assert!(!settings.log.json);
    }

    #[test]
    fn test_environment_overrides() {
        let settings = Settings::from_vars([
            ("BX__API__BASE_URL", "https://api.bike-exchange.vn"),
            ("BX__API__TIMEOUT_SECS", "30"),
            ("BX__API__TOKEN", "t0k"),
            ("BX__SYNC__SELLER_ID", "42"),
            ("BX__LOG__JSON", "true"),
        ])
        .unwrap();
        assert_eq!(settings.api.base_url, "https://api.bike-exchange.vn");
        assert_eq!(settings.api.timeout_secs, 30);
        assert_eq!(
            settings.api.token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("t0k".to_string())
        );
        assert_eq!(settings.sync.seller_id, Some(42));
        assert!(settings.log.json);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            Settings::from_vars([("BX__API__BASE_URL", "localhost:8080")]),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Settings::from_vars([("BX__API__TIMEOUT_SECS", "0")]),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Settings::from_vars([("BX__API__TIMEOUT_SECS", "soon")]),
            Err(ConfigError::Load(_))
        ));
    }
}
