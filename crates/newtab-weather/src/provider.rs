//! Weather provider: reverse geocode plus current conditions, fetched as one
//! unit.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::geocode::{reverse_geocode, GOOGLE_GEOCODE_URL};
use crate::types::{Coordinates, ResolvedLocation, WeatherError, WeatherSnapshot};

pub const OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Async capability mapping a coordinate to a weather snapshot.
#[async_trait]
pub trait WeatherService: Send + Sync {
    /// Fetch current weather for the given coordinates.
    ///
    /// # Errors
    /// Returns a single `WeatherError` if any underlying request fails.
    async fn fetch_weather(&self, coords: Coordinates) -> Result<WeatherSnapshot, WeatherError>;
}

#[derive(Debug, Deserialize)]
struct ConditionsResponse {
    #[serde(default)]
    weather: Vec<ConditionsEntry>,
    main: Option<ConditionsMain>,
}

#[derive(Debug, Deserialize)]
struct ConditionsEntry {
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ConditionsMain {
    temp: f64,
}

/// Current conditions before they are joined with a place name.
#[derive(Debug, Clone, PartialEq)]
struct Conditions {
    condition: String,
    temperature: f64,
    description: String,
}

impl TryFrom<ConditionsResponse> for Conditions {
    type Error = WeatherError;

    fn try_from(body: ConditionsResponse) -> Result<Self, Self::Error> {
        let entry = body
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::Parse("conditions response has no weather entry".into()))?;
        let main = body
            .main
            .ok_or_else(|| WeatherError::Parse("conditions response has no main block".into()))?;
        if !main.temp.is_finite() {
            return Err(WeatherError::Parse(format!("temperature out of range: {}", main.temp)));
        }

        Ok(Conditions {
            condition: entry.main,
            temperature: main.temp,
            description: entry.description,
        })
    }
}

/// HTTP-backed weather provider (Google Geocoding + OpenWeatherMap).
#[derive(Debug, Clone)]
pub struct HttpWeatherProvider {
    client: Arc<Client>,
    geocode_url: String,
    conditions_url: String,
    google_api_key: Option<String>,
    openweather_api_key: Option<String>,
}

impl HttpWeatherProvider {
    /// Create a provider with the public endpoints and no credentials.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client: Arc::new(client),
            geocode_url: GOOGLE_GEOCODE_URL.to_string(),
            conditions_url: OPENWEATHER_URL.to_string(),
            google_api_key: None,
            openweather_api_key: None,
        })
    }

    pub fn with_geocode_url(mut self, url: impl Into<String>) -> Self {
        self.geocode_url = url.into();
        self
    }

    pub fn with_conditions_url(mut self, url: impl Into<String>) -> Self {
        self.conditions_url = url.into();
        self
    }

    pub fn with_google_api_key(mut self, key: Option<String>) -> Self {
        self.google_api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_openweather_api_key(mut self, key: Option<String>) -> Self {
        self.openweather_api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    #[instrument(skip(self, api_key), level = "debug")]
    async fn fetch_conditions(
        &self,
        coords: Coordinates,
        api_key: &str,
    ) -> Result<Conditions, WeatherError> {
        let lat = coords.latitude.to_string();
        let lon = coords.longitude.to_string();

        let response = self
            .client
            .get(&self.conditions_url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", api_key),
                ("units", "metric"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WeatherError::Status {
                service: "conditions",
                status: response.status().as_u16(),
            });
        }

        let body: ConditionsResponse = response
            .json()
            .await
            .map_err(|e| WeatherError::Parse(format!("conditions response: {}", e)))?;

        Conditions::try_from(body)
    }
}

#[async_trait]
impl WeatherService for HttpWeatherProvider {
    async fn fetch_weather(&self, coords: Coordinates) -> Result<WeatherSnapshot, WeatherError> {
        let google_key = self
            .google_api_key
            .as_deref()
            .ok_or(WeatherError::MissingCredential("google"))?;
        let openweather_key = self
            .openweather_api_key
            .as_deref()
            .ok_or(WeatherError::MissingCredential("openweather"))?;

        let display_name =
            reverse_geocode(&self.client, &self.geocode_url, google_key, coords).await?;
        let conditions = self.fetch_conditions(coords, openweather_key).await?;

        tracing::debug!(
            "Fetched weather for {}: {} {}°C",
            display_name,
            conditions.condition,
            conditions.temperature
        );

        Ok(WeatherSnapshot {
            condition: conditions.condition,
            temperature: conditions.temperature,
            description: conditions.description,
            location: ResolvedLocation {
                lat: coords.latitude,
                lon: coords.longitude,
                display_name,
            },
        })
    }
}
