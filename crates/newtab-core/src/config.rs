use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use newtab_weather::{geocode::GOOGLE_GEOCODE_URL, location::IP_API_URL, provider::OPENWEATHER_URL};

use crate::error::ConfigError;
use crate::storage::DEFAULT_STATE_KEY;

const APP_DIR: &str = "newtab";
const GOOGLE_API_KEY_ENV: &str = "NEWTAB_GOOGLE_API_KEY";
const OPENWEATHER_API_KEY_ENV: &str = "NEWTAB_OPENWEATHER_API_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub location: LocationConfig,

    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file holding the persisted state
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,

    /// Key the state blob is stored under
    #[serde(default = "default_state_key")]
    pub state_key: String,
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_state_path() -> PathBuf {
    default_config_dir().join("state.db")
}

fn default_state_key() -> String {
    DEFAULT_STATE_KEY.to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
            state_key: default_state_key(),
        }
    }
}

/// Which location provider to use at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationProviderKind {
    /// Coarse location from the public IP address
    #[default]
    Ip,
    /// Fixed coordinates from `static_latitude`/`static_longitude`
    Static,
    /// No provider; the fallback coordinate is always used
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default)]
    pub provider: LocationProviderKind,

    /// How long to wait for a location fix
    #[serde(default = "default_location_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_true")]
    pub high_accuracy: bool,

    #[serde(default = "default_fallback_latitude")]
    pub fallback_latitude: f64,

    #[serde(default = "default_fallback_longitude")]
    pub fallback_longitude: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_latitude: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_longitude: Option<f64>,

    /// Re-acquire the location on every start even when onboarded
    #[serde(default = "default_true")]
    pub reacquire_on_start: bool,

    #[serde(default = "default_ip_lookup_url")]
    pub ip_lookup_url: String,
}

fn default_true() -> bool {
    true
}

fn default_location_timeout_ms() -> u64 {
    5000
}

fn default_fallback_latitude() -> f64 {
    40.7128
}

fn default_fallback_longitude() -> f64 {
    -74.0060
}

fn default_ip_lookup_url() -> String {
    IP_API_URL.to_string()
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            provider: LocationProviderKind::default(),
            timeout_ms: default_location_timeout_ms(),
            high_accuracy: true,
            fallback_latitude: default_fallback_latitude(),
            fallback_longitude: default_fallback_longitude(),
            static_latitude: None,
            static_longitude: None,
            reacquire_on_start: true,
            ip_lookup_url: default_ip_lookup_url(),
        }
    }
}

impl LocationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Configured static coordinate, if both halves are set
    pub fn static_coordinates(&self) -> Option<(f64, f64)> {
        self.static_latitude.zip(self.static_longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_geocode_url")]
    pub geocode_url: String,

    #[serde(default = "default_conditions_url")]
    pub conditions_url: String,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Google Geocoding API key (can be set via NEWTAB_GOOGLE_API_KEY)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_api_key: Option<String>,

    /// OpenWeatherMap API key (can be set via NEWTAB_OPENWEATHER_API_KEY)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openweather_api_key: Option<String>,
}

fn default_geocode_url() -> String {
    GOOGLE_GEOCODE_URL.to_string()
}

fn default_conditions_url() -> String {
    OPENWEATHER_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            geocode_url: default_geocode_url(),
            conditions_url: default_conditions_url(),
            request_timeout_secs: default_request_timeout_secs(),
            google_api_key: None,
            openweather_api_key: None,
        }
    }
}

impl WeatherConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Environment variable wins over the config file
    pub fn google_api_key(&self) -> Option<String> {
        std::env::var(GOOGLE_API_KEY_ENV)
            .ok()
            .or_else(|| self.google_api_key.clone())
            .filter(|k| !k.trim().is_empty())
    }

    /// Environment variable wins over the config file
    pub fn openweather_api_key(&self) -> Option<String> {
        std::env::var(OPENWEATHER_API_KEY_ENV)
            .ok()
            .or_else(|| self.openweather_api_key.clone())
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            storage: StorageConfig::default(),
            location: LocationConfig::default(),
            weather: WeatherConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, writing defaults there if missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        Ok(config)
    }

    /// Reject configurations with validation errors; log warnings.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let validation = self.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.storage.state_key.trim().is_empty() {
            result.add_error("storage.state_key", "State key must not be empty");
        }

        let location = &self.location;
        if location.timeout_ms == 0 {
            result.add_error("location.timeout_ms", "Location timeout must be greater than 0");
        } else if location.timeout_ms > 60_000 {
            result.add_warning(
                "location.timeout_ms",
                "Location timeout is more than a minute; startup may stall",
            );
        }

        validate_coordinate(
            location.fallback_latitude,
            location.fallback_longitude,
            "location.fallback",
            &mut result,
        );

        match location.provider {
            LocationProviderKind::Ip => {
                validate_url(&location.ip_lookup_url, "location.ip_lookup_url", &mut result);
            }
            LocationProviderKind::Static => match location.static_coordinates() {
                Some((lat, lon)) => {
                    validate_coordinate(lat, lon, "location.static", &mut result);
                }
                None => result.add_error(
                    "location.static_latitude",
                    "Static provider requires static_latitude and static_longitude",
                ),
            },
            LocationProviderKind::None => {}
        }

        validate_url(&self.weather.geocode_url, "weather.geocode_url", &mut result);
        validate_url(&self.weather.conditions_url, "weather.conditions_url", &mut result);

        if self.weather.request_timeout_secs == 0 {
            result.add_error(
                "weather.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }

        if self.weather.google_api_key().is_none() {
            result.add_warning(
                "weather.google_api_key",
                "Google API key not configured - weather will be unavailable",
            );
        }
        if self.weather.openweather_api_key().is_none() {
            result.add_warning(
                "weather.openweather_api_key",
                "OpenWeatherMap API key not configured - weather will be unavailable",
            );
        }

        result
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> PathBuf {
        default_config_dir().join("config.toml")
    }
}

fn validate_coordinate(lat: f64, lon: f64, field: &str, result: &mut ValidationResult) {
    if !(-90.0..=90.0).contains(&lat) {
        result.add_error(
            format!("{}_latitude", field),
            format!("Latitude must be within [-90, 90], got {}", lat),
        );
    }
    if !(-180.0..=180.0).contains(&lon) {
        result.add_error(
            format!("{}_longitude", field),
            format!("Longitude must be within [-180, 180], got {}", lon),
        );
    }
}

fn validate_url(url_str: &str, field_name: &str, result: &mut ValidationResult) {
    match Url::parse(url_str) {
        Ok(url) => {
            if url.scheme() != "http" && url.scheme() != "https" {
                result.add_error(
                    field_name,
                    format!("URL must use http or https scheme, got: {}", url.scheme()),
                );
            }

            if url.host().is_none() {
                result.add_error(field_name, "URL must have a host");
            }
        }
        Err(e) => {
            result.add_error(field_name, format!("Invalid URL: {}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        // Missing API keys are warnings only
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.weather.conditions_url = "ftp://localhost:8080".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.weather.geocode_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "weather.geocode_url"));
    }

    #[test]
    fn test_zero_location_timeout() {
        let mut config = Config::default();
        config.location.timeout_ms = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "location.timeout_ms"));
    }

    #[test]
    fn test_fallback_out_of_range() {
        let mut config = Config::default();
        config.location.fallback_latitude = 91.0;
        let result = config.validate();
        assert!(result
            .errors
            .iter()
            .any(|e| e.field == "location.fallback_latitude"));
    }

    #[test]
    fn test_static_provider_requires_coordinates() {
        let mut config = Config::default();
        config.location.provider = LocationProviderKind::Static;
        assert!(!config.validate().is_valid());

        config.location.static_latitude = Some(51.5);
        config.location.static_longitude = Some(-0.12);
        assert!(config.validate().is_valid());
    }

    #[test]
    fn test_validated_rejects_errors() {
        let mut config = Config::default();
        config.storage.state_key = " ".to_string();
        assert!(matches!(config.validated(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }

    #[test]
    fn test_load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.location.timeout_ms, 5000);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.storage.state_key, DEFAULT_STATE_KEY);
        assert_eq!(reloaded.location.fallback_latitude, 40.7128);
    }

    #[test]
    fn test_partial_file_gets_section_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "config_dir = \"/tmp/newtab\"\n\n[location]\nprovider = \"none\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.location.provider, LocationProviderKind::None);
        assert_eq!(config.location.timeout_ms, 5000);
        assert!(config.location.reacquire_on_start);
        assert_eq!(config.weather.request_timeout_secs, 10);
    }
}
