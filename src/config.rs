//! User settings and rate cache configuration, persisted as JSON.
//!
//! Every field has a default, so a partial or missing file is valid:
//!
//! ```json
//! {
//!   "settings": { "targetCurrency": "EUR", "enableExtension": true, "precision": 2 },
//!   "rates": {
//!     "ttlSecs": 600,
//!     "fetchTimeoutSecs": 10,
//!     "providerUrl": "https://api.exchangerate-api.com/v4/latest/",
//!     "basis": { "kind": "pivot", "base": "USD" }
//!   }
//! }
//! ```

use crate::core::conversion::RateBasis;
use crate::core::currency::{CurrencyCode, CurrencyError};
use crate::rates::cache::CachePolicy;
use crate::rates::provider::DEFAULT_PROVIDER_URL;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidCurrency(#[from] CurrencyError),
}

/// User-facing preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub target_currency: CurrencyCode,
    pub enable_extension: bool,
    /// Fraction digits shown for converted amounts.
    pub precision: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_currency: CurrencyCode::new("USD"),
            enable_extension: true,
            precision: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateCacheConfig {
    pub ttl_secs: u64,
    pub fetch_timeout_secs: u64,
    pub provider_url: String,
    pub basis: RateBasis,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            fetch_timeout_secs: 10,
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            basis: RateBasis::default(),
        }
    }
}

impl RateCacheConfig {
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            ttl: Duration::from_secs(self.ttl_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            basis: self.basis.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub settings: Settings,
    pub rates: RateCacheConfig,
}

impl AppConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        CurrencyCode::parse(self.settings.target_currency.as_str())?;
        if let RateBasis::Pivot(base) = &self.rates.basis {
            CurrencyCode::parse(base.as_str())?;
        }
        Ok(())
    }
}

/// Reads and writes an [`AppConfig`] at a fixed path.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config, falling back to defaults when the file does not exist.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        match fs::read_to_string(&self.path) {
            Ok(json) => AppConfig::from_json(&json),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!(
                    "no config at {}; using defaults",
                    self.path.display()
                );
                Ok(AppConfig::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let json = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, json).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.settings.target_currency.as_str(), "USD");
        assert!(config.settings.enable_extension);
        assert_eq!(config.settings.precision, 2);
        assert_eq!(config.rates.policy(), CachePolicy::default());
        assert_eq!(config.rates.provider_url, DEFAULT_PROVIDER_URL);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            AppConfig::from_json(r#"{"settings": {"targetCurrency": "eur"}, "rates": {"ttlSecs": 60}}"#)
                .unwrap();
        assert_eq!(config.settings.target_currency.as_str(), "EUR");
        assert_eq!(config.settings.precision, 2);
        assert_eq!(config.rates.policy().ttl, Duration::from_secs(60));
        assert_eq!(config.rates.fetch_timeout_secs, 10);
    }

    #[test]
    fn test_direct_basis() {
        let config = AppConfig::from_json(r#"{"rates": {"basis": {"kind": "direct"}}}"#).unwrap();
        assert_eq!(config.rates.basis, RateBasis::Direct);
    }

    #[test]
    fn test_invalid_target_rejected() {
        let err = AppConfig::from_json(r#"{"settings": {"targetCurrency": "EURO"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCurrency(_)));
    }

    #[test]
    fn test_malformed_json() {
        let err = AppConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_store_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::new(dir.path().join("settings.json"));
        assert_eq!(store.load().unwrap(), AppConfig::default());
    }

    #[test]
    fn test_store_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::new(dir.path().join("settings.json"));

        let mut config = AppConfig::default();
        config.settings.target_currency = CurrencyCode::new("JPY");
        config.settings.enable_extension = false;
        config.rates.basis = RateBasis::Pivot(CurrencyCode::new("EUR"));
        store.save(&config).unwrap();

        assert_eq!(store.load().unwrap(), config);
    }

    #[test]
    fn test_store_unreadable_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSettingsStore::new(dir.path());
        assert!(matches!(store.load().unwrap_err(), ConfigError::Io { .. }));
    }
}
