use anyhow::{Context, Result, anyhow, ensure};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::model::{Language, Location};

pub const DEFAULT_PRAYER_API_URL: &str = "https://api.aladhan.com/v1/timingsByCity";

/// Diyanet İşleri Başkanlığı, Turkey.
pub const DEFAULT_CALCULATION_METHOD: u32 = 14;

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub language: Language,

    /// Hours a cached location or day of prayer times stays valid.
    pub cache_ttl_hours: u32,

    /// Attempts per URL before moving on.
    pub retry_attempts: u32,

    pub request_timeout_ms: u64,

    /// Calculation method id understood by the prayer times API.
    pub calculation_method: u32,

    pub prayer_api_url: String,

    /// Geolocation endpoints, tried in order.
    pub geo_endpoints: Vec<String>,

    /// How soon to retry after a failed automatic refresh.
    pub failure_retry_minutes: u32,

    /// Used whenever geolocation fails.
    pub default_location: Location,

    /// Example TOML:
    /// [location]
    /// country = "Turkey"
    /// city = "Ankara"
    ///
    /// When set, IP geolocation is skipped entirely.
    pub location: Option<Location>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: Language::En,
            cache_ttl_hours: 24,
            retry_attempts: 3,
            request_timeout_ms: 10_000,
            calculation_method: DEFAULT_CALCULATION_METHOD,
            prayer_api_url: DEFAULT_PRAYER_API_URL.to_string(),
            geo_endpoints: vec![
                "https://ipapi.co/json/".to_string(),
                "https://ipinfo.io/json".to_string(),
                "https://ip-api.com/json".to_string(),
            ],
            failure_retry_minutes: 60,
            default_location: Location::new("Turkey", "Istanbul"),
            location: None,
        }
    }
}

impl Config {
    /// Load config from disk, or return the default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        cfg.validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "prayer-times", "prayer-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.cache_ttl_hours > 0, "cache_ttl_hours must be greater than zero");
        ensure!(self.retry_attempts > 0, "retry_attempts must be greater than zero");
        ensure!(self.request_timeout_ms > 0, "request_timeout_ms must be greater than zero");
        ensure!(!self.geo_endpoints.is_empty(), "geo_endpoints must not be empty");
        ensure!(
            !self.default_location.country.is_empty() && !self.default_location.city.is_empty(),
            "default_location needs both country and city"
        );
        Ok(())
    }

    /// Pin a location, or go back to IP geolocation with `None`.
    pub fn set_location(&mut self, location: Option<Location>) {
        self.location = location;
    }
}
