//! Integration tests for the HTTP weather and location providers using wiremock.

use std::time::Duration;

use newtab_weather::{
    Coordinates, HttpWeatherProvider, IpLocationProvider, LocationError, LocationProvider,
    LocationRequest, WeatherError, WeatherService, UNKNOWN_LOCATION,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn nyc() -> Coordinates {
    Coordinates::new(40.7128, -74.006)
}

fn provider_for(server: &MockServer) -> HttpWeatherProvider {
    HttpWeatherProvider::new(Duration::from_secs(5))
        .unwrap()
        .with_geocode_url(format!("{}/geocode/json", server.uri()))
        .with_conditions_url(format!("{}/data/2.5/weather", server.uri()))
        .with_google_api_key(Some("google-key".into()))
        .with_openweather_api_key(Some("ow-key".into()))
}

fn conditions_body() -> serde_json::Value {
    serde_json::json!({
        "weather": [{ "id": 803, "main": "Clouds", "description": "broken clouds" }],
        "main": { "temp": 18.3, "humidity": 60 }
    })
}

#[tokio::test]
async fn test_fetch_weather_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geocode/json"))
        .and(query_param("latlng", "40.7128,-74.006"))
        .and(query_param("key", "google-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OK",
            "results": [{ "formatted_address": "New York, NY, USA" }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("appid", "ow-key"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(conditions_body()))
        .mount(&server)
        .await;

    let snapshot = provider_for(&server).fetch_weather(nyc()).await.unwrap();

    assert_eq!(snapshot.condition, "Clouds");
    assert_eq!(snapshot.temperature, 18.3);
    assert_eq!(snapshot.description, "broken clouds");
    assert_eq!(snapshot.location.display_name, "New York, NY, USA");
    assert_eq!(snapshot.location.lat, 40.7128);
    assert_eq!(snapshot.location.lon, -74.006);
}

#[tokio::test]
async fn test_fetch_weather_unknown_location_when_geocode_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geocode/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "ZERO_RESULTS",
            "results": []
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(conditions_body()))
        .mount(&server)
        .await;

    let snapshot = provider_for(&server).fetch_weather(nyc()).await.unwrap();
    assert_eq!(snapshot.location.display_name, UNKNOWN_LOCATION);
}

#[tokio::test]
async fn test_fetch_weather_geocode_http_error_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geocode/json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = provider_for(&server).fetch_weather(nyc()).await.unwrap_err();
    assert!(matches!(
        err,
        WeatherError::Status {
            service: "geocode",
            status: 500
        }
    ));
}

#[tokio::test]
async fn test_fetch_weather_conditions_unauthorized_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geocode/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{ "formatted_address": "New York, NY, USA" }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "cod": 401,
            "message": "Invalid API key"
        })))
        .mount(&server)
        .await;

    let err = provider_for(&server).fetch_weather(nyc()).await.unwrap_err();
    assert!(matches!(
        err,
        WeatherError::Status {
            service: "conditions",
            status: 401
        }
    ));
}

#[tokio::test]
async fn test_fetch_weather_malformed_conditions_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geocode/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": []
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = provider_for(&server).fetch_weather(nyc()).await.unwrap_err();
    assert!(matches!(err, WeatherError::Parse(_)));
}

#[tokio::test]
async fn test_ip_location_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "lat": 47.6062,
            "lon": -122.3321,
            "city": "Seattle"
        })))
        .mount(&server)
        .await;

    let provider = IpLocationProvider::new(format!("{}/json", server.uri()));
    let coords = provider
        .acquire_location(&LocationRequest::default())
        .await
        .unwrap();

    assert_eq!(coords, Coordinates::new(47.6062, -122.3321));
}

#[tokio::test]
async fn test_ip_location_slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "status": "success", "lat": 1.0, "lon": 2.0 }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let provider = IpLocationProvider::new(format!("{}/json", server.uri()));
    let request = LocationRequest {
        timeout: Duration::from_millis(50),
        high_accuracy: true,
    };

    let result = provider.acquire_location(&request).await;
    assert_eq!(result, Err(LocationError::Timeout));
}
