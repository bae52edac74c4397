//! Reverse geocoding: convert coordinates to a human-readable place name.
//! Uses the Google Geocoding API, which requires an API key.

use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::types::{Coordinates, WeatherError, UNKNOWN_LOCATION};

pub const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: Option<String>,
}

impl GeocodeResponse {
    fn display_name(self) -> String {
        self.results
            .into_iter()
            .next()
            .and_then(|r| r.formatted_address)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
    }
}

/// Reverse geocode coordinates to a formatted address.
///
/// An empty result set resolves to [`UNKNOWN_LOCATION`]; transport errors,
/// non-2xx responses and unparseable bodies are failures.
#[instrument(skip(client, api_key), level = "debug")]
pub async fn reverse_geocode(
    client: &Client,
    base_url: &str,
    api_key: &str,
    coords: Coordinates,
) -> Result<String, WeatherError> {
    let latlng = format!("{},{}", coords.latitude, coords.longitude);

    let response = client
        .get(base_url)
        .query(&[("latlng", latlng.as_str()), ("key", api_key)])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(WeatherError::Status {
            service: "geocode",
            status: response.status().as_u16(),
        });
    }

    let body: GeocodeResponse = response
        .json()
        .await
        .map_err(|e| WeatherError::Parse(format!("geocode response: {}", e)))?;

    if let Some(status) = body.status.as_deref() {
        if status != "OK" {
            tracing::debug!("Reverse geocode status {}", status);
        }
    }

    let name = body.display_name();
    tracing::info!("Reverse geocoded to: {}", name);
    Ok(name)
}
