//! Startup sequence state machine.
//!
//! `Start -> AcquiringLocation -> {LocationResolved | LocationFailed}
//!  -> RefreshingWeather -> Onboarded`. Driven by `AppStore::initialize_app`.

use newtab_weather::{Coordinates, LocationError, LocationRequest};

use crate::store::RefreshOutcome;

/// Substituted when no location can be acquired (New York City).
pub const FALLBACK_COORDINATES: Coordinates = Coordinates {
    latitude: 40.7128,
    longitude: -74.0060,
};

/// Phase of the startup sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InitPhase {
    #[default]
    Start,
    AcquiringLocation,
    LocationResolved(Coordinates),
    LocationFailed(LocationError),
    RefreshingWeather(Coordinates),
    Onboarded,
}

impl InitPhase {
    /// True while the sequence is in flight (the loading screen is shown).
    pub fn is_loading(&self) -> bool {
        !matches!(self, InitPhase::Start | InitPhase::Onboarded)
    }

    /// State after the location request is issued.
    pub fn begin(self) -> Self {
        match self {
            InitPhase::Start | InitPhase::Onboarded => InitPhase::AcquiringLocation,
            other => other,
        }
    }

    /// State after the location provider answered (or timed out).
    pub fn on_location(self, result: &Result<Coordinates, LocationError>) -> Self {
        match (self, result) {
            (InitPhase::AcquiringLocation, Ok(coords)) => InitPhase::LocationResolved(*coords),
            (InitPhase::AcquiringLocation, Err(e)) => InitPhase::LocationFailed(e.clone()),
            (other, _) => other,
        }
    }

    /// Coordinates the weather refresh should use, once location has settled.
    pub fn refresh_target(&self, fallback: Coordinates) -> Option<Coordinates> {
        match self {
            InitPhase::LocationResolved(coords) | InitPhase::RefreshingWeather(coords) => {
                Some(*coords)
            }
            InitPhase::LocationFailed(_) => Some(fallback),
            _ => None,
        }
    }

    /// State after the weather refresh is started.
    pub fn on_refresh_started(self, fallback: Coordinates) -> Self {
        match self.refresh_target(fallback) {
            Some(coords) => InitPhase::RefreshingWeather(coords),
            None => self,
        }
    }

    /// State after the weather refresh settled, successfully or not.
    pub fn on_weather_settled(self) -> Self {
        match self {
            InitPhase::RefreshingWeather(_) => InitPhase::Onboarded,
            other => other,
        }
    }
}

/// Knobs for the startup sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct InitOptions {
    pub request: LocationRequest,
    pub fallback: Coordinates,
    /// Re-acquire the location on every start, even when already onboarded
    /// with a saved location. When false, the saved location is reused.
    pub reacquire_on_start: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            request: LocationRequest::default(),
            fallback: FALLBACK_COORDINATES,
            reacquire_on_start: true,
        }
    }
}

/// Where the coordinates used at startup came from.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationSource {
    /// The location provider answered.
    Provider,
    /// The saved home location was reused.
    Saved,
    /// The provider failed and the fallback coordinate was substituted.
    Fallback(LocationError),
}

/// Outcome of one run of the startup sequence.
#[derive(Debug)]
pub struct InitReport {
    pub coordinates: Coordinates,
    pub location_source: LocationSource,
    pub weather: RefreshOutcome,
}

impl InitReport {
    pub fn used_fallback(&self) -> bool {
        matches!(self.location_source, LocationSource::Fallback(_))
    }
}
