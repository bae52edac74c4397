//! Location providers: one-shot coordinate acquisition.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::types::{Coordinates, LocationError, LocationRequest};

pub const IP_API_URL: &str = "http://ip-api.com/json";

/// One-shot async capability returning the device's coordinates.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Acquire the current position.
    ///
    /// # Errors
    /// Returns a `LocationError` describing why no position is available.
    async fn acquire_location(&self, request: &LocationRequest)
        -> Result<Coordinates, LocationError>;
}

/// Acquire a location, giving up after `request.timeout`.
///
/// Providers are not trusted to honor the timeout themselves; an elapsed wait
/// maps to [`LocationError::Timeout`].
///
/// # Errors
/// Returns the provider's error, or `Timeout` if it did not answer in time.
pub async fn acquire_with_timeout(
    provider: &dyn LocationProvider,
    request: &LocationRequest,
) -> Result<Coordinates, LocationError> {
    match tokio::time::timeout(request.timeout, provider.acquire_location(request)).await {
        Ok(Ok(coords)) if !coords.is_finite() => Err(LocationError::Other(format!(
            "provider returned non-finite coordinates ({}, {})",
            coords.latitude, coords.longitude
        ))),
        Ok(result) => result,
        Err(_) => Err(LocationError::Timeout),
    }
}

/// Provider for environments with no location capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedLocationProvider;

#[async_trait]
impl LocationProvider for UnsupportedLocationProvider {
    async fn acquire_location(
        &self,
        _request: &LocationRequest,
    ) -> Result<Coordinates, LocationError> {
        Err(LocationError::Unsupported)
    }
}

/// Provider that always answers with a configured coordinate.
#[derive(Debug, Clone, Copy)]
pub struct StaticLocationProvider {
    coords: Coordinates,
}

impl StaticLocationProvider {
    pub fn new(coords: Coordinates) -> Self {
        Self { coords }
    }
}

#[async_trait]
impl LocationProvider for StaticLocationProvider {
    async fn acquire_location(
        &self,
        _request: &LocationRequest,
    ) -> Result<Coordinates, LocationError> {
        Ok(self.coords)
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
    message: Option<String>,
}

impl IpApiResponse {
    fn into_coordinates(self) -> Result<Coordinates, LocationError> {
        if self.status != "success" {
            return Err(LocationError::Other(
                self.message.unwrap_or_else(|| "IP lookup failed".to_string()),
            ));
        }
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Ok(Coordinates::new(lat, lon)),
            _ => Err(LocationError::Other("IP lookup returned no coordinates".into())),
        }
    }
}

/// Coarse location from the public IP address (ip-api.com response shape).
///
/// The high-accuracy hint cannot be honored and is ignored.
#[derive(Debug, Clone)]
pub struct IpLocationProvider {
    client: Arc<Client>,
    url: String,
}

impl IpLocationProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Arc::new(Client::new()),
            url: url.into(),
        }
    }
}

impl Default for IpLocationProvider {
    fn default() -> Self {
        Self::new(IP_API_URL)
    }
}

#[async_trait]
impl LocationProvider for IpLocationProvider {
    async fn acquire_location(
        &self,
        request: &LocationRequest,
    ) -> Result<Coordinates, LocationError> {
        let response = self
            .client
            .get(&self.url)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LocationError::Timeout
                } else {
                    LocationError::Other(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(LocationError::Other(format!(
                "IP lookup returned status {}",
                response.status()
            )));
        }

        let body: IpApiResponse = response
            .json()
            .await
            .map_err(|e| LocationError::Other(e.to_string()))?;

        let coords = body.into_coordinates()?;
        tracing::info!("Got location: {}, {}", coords.latitude, coords.longitude);
        Ok(coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct HangingProvider;

    #[async_trait]
    impl LocationProvider for HangingProvider {
        async fn acquire_location(
            &self,
            _request: &LocationRequest,
        ) -> Result<Coordinates, LocationError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_unsupported_provider() {
        let result = UnsupportedLocationProvider
            .acquire_location(&LocationRequest::default())
            .await;
        assert_eq!(result, Err(LocationError::Unsupported));
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticLocationProvider::new(Coordinates::new(51.5074, -0.1278));
        let coords = provider
            .acquire_location(&LocationRequest::default())
            .await
            .unwrap();
        assert_eq!(coords, Coordinates::new(51.5074, -0.1278));
    }

    #[tokio::test]
    async fn test_hanging_provider_times_out() {
        let request = LocationRequest {
            timeout: Duration::from_millis(20),
            high_accuracy: true,
        };
        let result = acquire_with_timeout(&HangingProvider, &request).await;
        assert_eq!(result, Err(LocationError::Timeout));
    }

    #[tokio::test]
    async fn test_non_finite_fix_is_rejected() {
        let provider = StaticLocationProvider::new(Coordinates::new(f64::NAN, 2.0));
        let result = acquire_with_timeout(&provider, &LocationRequest::default()).await;
        assert!(matches!(result, Err(LocationError::Other(_))));
    }

    #[test]
    fn test_ip_response_failure_message() {
        let body: IpApiResponse =
            serde_json::from_str(r#"{"status":"fail","message":"private range"}"#).unwrap();
        assert_eq!(
            body.into_coordinates(),
            Err(LocationError::Other("private range".into()))
        );
    }

    #[test]
    fn test_ip_response_success() {
        let body: IpApiResponse =
            serde_json::from_str(r#"{"status":"success","lat":48.8566,"lon":2.3522}"#).unwrap();
        assert_eq!(body.into_coordinates(), Ok(Coordinates::new(48.8566, 2.3522)));
    }
}
