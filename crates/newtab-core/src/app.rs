use std::sync::Arc;

use newtab_weather::{
    Coordinates, HttpWeatherProvider, IpLocationProvider, LocationProvider, LocationRequest,
    StaticLocationProvider, UnsupportedLocationProvider, WeatherService,
};

use crate::config::{Config, LocationProviderKind};
use crate::error::AppError;
use crate::init::{InitOptions, InitReport};
use crate::storage::{SqliteStateStorage, StateStorage};
use crate::store::{AppStore, StoreSettings};

/// Application lifecycle: owns the config and the one `AppStore`.
pub struct App {
    config: Arc<Config>,
    store: Arc<AppStore>,
}

impl App {
    /// Create a new application instance from the user's config file
    pub fn new() -> Result<Self, AppError> {
        let config = Config::load()?.validated()?;
        Self::with_config(config)
    }

    /// Build the storage, providers and store described by `config`
    pub fn with_config(config: Config) -> Result<Self, AppError> {
        if let Some(parent) = config.storage.state_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let storage: Arc<dyn StateStorage> =
            Arc::new(SqliteStateStorage::new(&config.storage.state_path)?);

        let weather: Arc<dyn WeatherService> = Arc::new(
            HttpWeatherProvider::new(config.weather.request_timeout())?
                .with_geocode_url(config.weather.geocode_url.clone())
                .with_conditions_url(config.weather.conditions_url.clone())
                .with_google_api_key(config.weather.google_api_key())
                .with_openweather_api_key(config.weather.openweather_api_key()),
        );

        let store = AppStore::new(
            storage,
            location_provider(&config),
            weather,
            store_settings(&config),
        );

        tracing::info!(
            "Application created (state: {})",
            config.storage.state_path.display()
        );

        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(store),
        })
    }

    /// Run the startup sequence once
    pub async fn start(&self) -> InitReport {
        self.store.initialize_app().await
    }

    /// Flush state and shut down
    pub fn shutdown(&self) -> Result<(), AppError> {
        tracing::info!("Shutting down application");
        self.store.flush()?;
        Ok(())
    }

    /// Get reference to application config
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle to the application store for consumers
    pub fn store(&self) -> Arc<AppStore> {
        self.store.clone()
    }
}

fn location_provider(config: &Config) -> Arc<dyn LocationProvider> {
    match config.location.provider {
        LocationProviderKind::Ip => Arc::new(IpLocationProvider::new(
            config.location.ip_lookup_url.clone(),
        )),
        LocationProviderKind::Static => match config.location.static_coordinates() {
            Some((lat, lon)) => Arc::new(StaticLocationProvider::new(Coordinates::new(lat, lon))),
            None => {
                tracing::warn!("Static location provider has no coordinates configured");
                Arc::new(UnsupportedLocationProvider)
            }
        },
        LocationProviderKind::None => Arc::new(UnsupportedLocationProvider),
    }
}

fn store_settings(config: &Config) -> StoreSettings {
    StoreSettings {
        storage_key: config.storage.state_key.clone(),
        init: InitOptions {
            request: LocationRequest {
                timeout: config.location.timeout(),
                high_accuracy: config.location.high_accuracy,
            },
            fallback: Coordinates::new(
                config.location.fallback_latitude,
                config.location.fallback_longitude,
            ),
            reacquire_on_start: config.location.reacquire_on_start,
        },
    }
}
