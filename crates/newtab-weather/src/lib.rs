//! Weather and location capabilities for the new-tab page.
//!
//! Provides the location and weather provider contracts along with
//! HTTP-backed implementations (IP geolocation, Google Geocoding,
//! OpenWeatherMap).

pub mod types;
pub mod geocode;
pub mod location;
pub mod provider;

pub use types::*;
pub use geocode::reverse_geocode;
pub use location::{
    acquire_with_timeout, IpLocationProvider, LocationProvider, StaticLocationProvider,
    UnsupportedLocationProvider,
};
pub use provider::{HttpWeatherProvider, WeatherService};
