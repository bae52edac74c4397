use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Literal used when reverse geocoding yields no result.
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// Default wait for a location fix.
pub const DEFAULT_LOCATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Coarse weather categories derived from the provider's condition code.
///
/// The condition code is the OpenWeatherMap "main" group (e.g. `"Clouds"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    Clouds,
    Drizzle,
    Rain,
    Thunderstorm,
    Snow,
    /// Mist, fog, haze, smoke, dust and the other visibility groups
    Atmosphere,
    #[default]
    Unknown,
}

impl WeatherCondition {
    /// Map a provider condition code to a category.
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "clear" => Self::Clear,
            "clouds" => Self::Clouds,
            "drizzle" => Self::Drizzle,
            "rain" => Self::Rain,
            "thunderstorm" => Self::Thunderstorm,
            "snow" => Self::Snow,
            "mist" | "smoke" | "haze" | "dust" | "fog" | "sand" | "ash" | "squall"
            | "tornado" => Self::Atmosphere,
            _ => Self::Unknown,
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::Clouds => "Cloudy",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::Thunderstorm => "Thunderstorm",
            Self::Snow => "Snow",
            Self::Atmosphere => "Low Visibility",
            Self::Unknown => "Unknown",
        }
    }

    /// Icon name used by the background animation layer
    pub fn icon_name(&self) -> &'static str {
        match self {
            Self::Clear => "sun",
            Self::Clouds => "cloud",
            Self::Drizzle | Self::Rain => "cloud_rain",
            Self::Thunderstorm => "cloud_lightning",
            Self::Snow => "cloud_snow",
            Self::Atmosphere => "cloud_fog",
            Self::Unknown => "question",
        }
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Location the weather snapshot was resolved for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub lat: f64,
    pub lon: f64,
    pub display_name: String,
}

/// Current conditions at a location. Replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// Provider condition code, e.g. "Rain"
    pub condition: String,
    /// Degrees Celsius
    pub temperature: f64,
    pub description: String,
    pub location: ResolvedLocation,
}

impl WeatherSnapshot {
    pub fn category(&self) -> WeatherCondition {
        WeatherCondition::from_code(&self.condition)
    }

    /// JSON has no representation for NaN or infinity.
    pub fn is_finite(&self) -> bool {
        self.temperature.is_finite() && self.location.lat.is_finite() && self.location.lon.is_finite()
    }
}

/// Options for a one-shot location request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRequest {
    pub timeout: Duration,
    pub high_accuracy: bool,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LOCATION_TIMEOUT,
            high_accuracy: true,
        }
    }
}

/// Location service errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location is not supported in this environment")]
    Unsupported,
    #[error("Location error: {0}")]
    Other(String),
}

/// Weather provider errors.
///
/// Any failing sub-call (reverse geocode or conditions) surfaces as one of
/// these; callers do not need to know which request failed.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Missing API key: {0}")]
    MissingCredential(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_clear() {
        assert_eq!(WeatherCondition::from_code("Clear"), WeatherCondition::Clear);
    }

    #[test]
    fn test_snapshot_finiteness() {
        let mut snapshot = WeatherSnapshot {
            condition: "Clear".into(),
            temperature: 18.0,
            description: "clear sky".into(),
            location: ResolvedLocation {
                lat: 1.0,
                lon: 2.0,
                display_name: "Here".into(),
            },
        };
        assert!(snapshot.is_finite());
        snapshot.temperature = f64::INFINITY;
        assert!(!snapshot.is_finite());
        assert!(!Coordinates::new(0.0, f64::NAN).is_finite());
    }

    #[test]
    fn test_condition_is_case_insensitive() {
        assert_eq!(WeatherCondition::from_code("clouds"), WeatherCondition::Clouds);
        assert_eq!(WeatherCondition::from_code(" RAIN "), WeatherCondition::Rain);
    }

    #[test]
    fn test_condition_atmosphere_groups() {
        for code in ["Mist", "Smoke", "Haze", "Dust", "Fog", "Sand", "Ash", "Squall", "Tornado"] {
            assert_eq!(
                WeatherCondition::from_code(code),
                WeatherCondition::Atmosphere,
                "{code}"
            );
        }
    }

    #[test]
    fn test_condition_unknown_code() {
        assert_eq!(WeatherCondition::from_code(""), WeatherCondition::Unknown);
        assert_eq!(WeatherCondition::from_code("Meteor"), WeatherCondition::Unknown);
    }

    #[test]
    fn test_condition_icon_name() {
        assert_eq!(WeatherCondition::Clear.icon_name(), "sun");
        assert_eq!(WeatherCondition::Drizzle.icon_name(), "cloud_rain");
        assert_eq!(WeatherCondition::Thunderstorm.description(), "Thunderstorm");
    }

    #[test]
    fn test_snapshot_category() {
        let snapshot = WeatherSnapshot {
            condition: "Snow".to_string(),
            temperature: -3.5,
            description: "light snow".to_string(),
            location: ResolvedLocation {
                lat: 59.91,
                lon: 10.75,
                display_name: "Oslo, Norway".to_string(),
            },
        };
        assert_eq!(snapshot.category(), WeatherCondition::Snow);
    }

    #[test]
    fn test_default_location_request() {
        let req = LocationRequest::default();
        assert_eq!(req.timeout, Duration::from_secs(5));
        assert!(req.high_accuracy);
    }
}
