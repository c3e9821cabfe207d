//! Runtime configuration.
//!
//! Values come from an optional JSON file and are then overridden by
//! environment variables:
//! - `VOLVOX_SEARCH_DEBOUNCE_MS`
//! - `VOLVOX_DATA_DIR`
//! - `VOLVOX_CACHE_TTL_SECS`

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::services::{ContentCacheSettings, DEFAULT_CONSENT_KEY};
use crate::{ListingError, Result};

/// Preference key holding the remembered view mode.
pub const DEFAULT_VIEW_MODE_KEY: &str = "volvox-view-mode";

/// Listing engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Quiet period before typed search text is applied.
    pub search_debounce_ms: u64,
    /// Preference key of the remembered view mode.
    pub view_mode_key: String,
    /// Preference key of the cookie-consent record.
    pub consent_key: String,
    /// Current cookie policy version.
    pub consent_version: u32,
    /// Number of listings kept in the content cache.
    pub content_cache_capacity: usize,
    /// Freshness of cached content.
    pub content_cache_ttl_secs: u64,
    /// Directory for persisted preferences.
    pub data_dir: PathBuf,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            search_debounce_ms: 300,
            view_mode_key: DEFAULT_VIEW_MODE_KEY.to_string(),
            consent_key: DEFAULT_CONSENT_KEY.to_string(),
            consent_version: 1,
            content_cache_capacity: 16,
            content_cache_ttl_secs: 300,
            data_dir: default_data_dir(),
        }
    }
}

impl ListingConfig {
    /// Loads the file at `path` if given, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read(path)?;
                serde_json::from_slice(&raw)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|name| env::var(name).ok())?;
        Ok(config)
    }

    /// Applies overrides from a variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ms) = lookup("VOLVOX_SEARCH_DEBOUNCE_MS") {
            self.search_debounce_ms = parse_number("VOLVOX_SEARCH_DEBOUNCE_MS", &ms)?;
        }
        if let Some(dir) = lookup("VOLVOX_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
        if let Some(secs) = lookup("VOLVOX_CACHE_TTL_SECS") {
            self.content_cache_ttl_secs = parse_number("VOLVOX_CACHE_TTL_SECS", &secs)?;
        }
        Ok(())
    }

    /// Search debounce as a duration.
    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    /// Path of the preference file.
    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }

    /// Content cache settings.
    pub fn cache_settings(&self) -> ContentCacheSettings {
        ContentCacheSettings {
            capacity: self.content_cache_capacity,
            ttl: Duration::from_secs(self.content_cache_ttl_secs),
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ListingError::Config(format!("{} must be a number, got {:?}", name, value)))
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("dev", "Volvox", "volvox-listing")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".volvox"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = ListingConfig::default();
        assert_eq!(config.search_debounce(), Duration::from_millis(300));
        assert_eq!(config.view_mode_key, "volvox-view-mode");
        assert_eq!(config.consent_key, "volvox-cookie-consent");
        assert!(config.preferences_path().ends_with("preferences.json"));
    }

    #[test]
    fn overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("VOLVOX_SEARCH_DEBOUNCE_MS", "150"),
            ("VOLVOX_DATA_DIR", "/tmp/volvox"),
            ("VOLVOX_CACHE_TTL_SECS", " 10 "),
        ]
        .into_iter()
        .collect();

        let mut config = ListingConfig::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.search_debounce_ms, 150);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/volvox"));
        assert_eq!(config.cache_settings().ttl, Duration::from_secs(10));
    }

    #[test]
    fn bad_override_is_a_config_error() {
        let mut config = ListingConfig::default();
        let err = config
            .apply_overrides(|name| (name == "VOLVOX_SEARCH_DEBOUNCE_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ListingError::Config(_)));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listing.json");
        std::fs::write(&path, r#"{"search_debounce_ms": 500, "consent_version": 3}"#).unwrap();

        let mut config: ListingConfig = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        config.apply_overrides(|_| None).unwrap();
        assert_eq!(config.search_debounce_ms, 500);
        assert_eq!(config.consent_version, 3);
        assert_eq!(config.view_mode_key, DEFAULT_VIEW_MODE_KEY);
    }
}
