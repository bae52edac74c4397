pub mod app;
pub mod config;
pub mod error;
pub mod init;
pub mod state;
pub mod storage;
pub mod store;

pub use app::App;
pub use config::{Config, LocationConfig, LocationProviderKind, StorageConfig, WeatherConfig};
pub use error::{AppError, ConfigError, StorageError};
pub use init::{InitOptions, InitPhase, InitReport, LocationSource, FALLBACK_COORDINATES};
pub use state::{
    due_on, AppState, FeedItem, HomeLocation, NewTask, Position, PreferencesUpdate, Priority, Rating,
    Task, TaskUpdate, Theme, UserPreferences,
};
pub use storage::{SqliteStateStorage, StateStorage, DEFAULT_STATE_KEY};
pub use store::{AppStore, RefreshOutcome, StoreSettings};

use anyhow::Result;

/// Initialize tracing/logging
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("Newtab core initialized");
    Ok(())
}
