//! Application store: sole owner of `AppState`.
//!
//! Every mutation clones the current snapshot, applies the change, publishes
//! the new snapshot to subscribers and saves it under the state key. Mutations
//! on an unknown task or feed item id are no-ops and neither notify nor save.
//!
//! Non-finite floats have no JSON form, so they are refused where they enter:
//! positions, home coordinates, feed relevance scores and weather snapshots.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

use newtab_weather::{
    acquire_with_timeout, Coordinates, LocationProvider, WeatherError, WeatherService,
    WeatherSnapshot,
};

use crate::error::StorageError;
use crate::init::{InitOptions, InitPhase, InitReport, LocationSource};
use crate::state::{
    AppState, FeedItem, HomeLocation, NewTask, Position, PreferencesUpdate, Rating, Task,
    TaskUpdate,
};
use crate::storage::{load_state, save_state, StateStorage, DEFAULT_STATE_KEY};

/// Result of a weather refresh. Refresh never fails its caller; a failure is
/// reported here and the previous snapshot is kept.
#[derive(Debug)]
pub enum RefreshOutcome {
    Updated(WeatherSnapshot),
    Failed(WeatherError),
    /// No location in preferences; nothing was fetched or changed.
    SkippedNoLocation,
    /// The requested coordinate was not finite; nothing was changed.
    InvalidLocation,
}

impl RefreshOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, RefreshOutcome::Updated(_))
    }
}

/// Store construction settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub storage_key: String,
    pub init: InitOptions,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STATE_KEY.to_string(),
            init: InitOptions::default(),
        }
    }
}

pub struct AppStore {
    state: watch::Sender<Arc<AppState>>,
    storage: Arc<dyn StateStorage>,
    location: Arc<dyn LocationProvider>,
    weather: Arc<dyn WeatherService>,
    settings: StoreSettings,
    phase: Mutex<InitPhase>,
}

impl AppStore {
    /// Create the store, rehydrating state from `storage`.
    pub fn new(
        storage: Arc<dyn StateStorage>,
        location: Arc<dyn LocationProvider>,
        weather: Arc<dyn WeatherService>,
        settings: StoreSettings,
    ) -> Self {
        let initial = load_state(storage.as_ref(), &settings.storage_key);
        tracing::info!(
            "Store rehydrated (onboarded: {}, {} tasks, {} feed items)",
            initial.is_onboarded,
            initial.tasks.len(),
            initial.feed_items.len()
        );

        let (state, _) = watch::channel(Arc::new(initial));

        Self {
            state,
            storage,
            location,
            weather,
            settings,
            phase: Mutex::new(InitPhase::Start),
        }
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> Arc<AppState> {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state replacement.
    pub fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.state.subscribe()
    }

    pub fn init_phase(&self) -> InitPhase {
        self.phase.lock().clone()
    }

    /// Save the current snapshot explicitly.
    ///
    /// # Errors
    /// Returns a `StorageError` if the snapshot cannot be written.
    pub fn flush(&self) -> Result<(), StorageError> {
        let snapshot = self.snapshot();
        save_state(self.storage.as_ref(), &self.settings.storage_key, &snapshot)
    }

    /// Apply `f` to a copy of the state. `f` returns whether anything changed;
    /// only changed states are published and saved.
    ///
    /// The save is a synchronous SQLite write made while the watch sender is
    /// locked: `snapshot()` readers and the calling tokio worker wait for it.
    /// The blob is a few kilobytes, so this stays off `spawn_blocking`.
    fn mutate<F>(&self, op: &'static str, f: F) -> bool
    where
        F: FnOnce(&mut AppState) -> bool,
    {
        self.state.send_if_modified(|current| {
            let mut next = (**current).clone();
            if !f(&mut next) {
                tracing::debug!("{}: no change", op);
                return false;
            }

            // Saved while the sender is locked so blobs land in mutation order.
            if let Err(e) = save_state(self.storage.as_ref(), &self.settings.storage_key, &next) {
                tracing::warn!("{}: failed to persist state: {}", op, e);
            }
            *current = Arc::new(next);
            tracing::debug!("{}: state replaced", op);
            true
        })
    }

    fn advance_phase(&self, f: impl FnOnce(InitPhase) -> InitPhase) -> InitPhase {
        let mut phase = self.phase.lock();
        let next = f(phase.clone());
        *phase = next.clone();
        next
    }

    pub fn set_onboarded(&self, onboarded: bool) {
        self.mutate("set_onboarded", |s| {
            s.is_onboarded = onboarded;
            true
        });
    }

    pub fn set_show_settings(&self, show: bool) {
        self.mutate("set_show_settings", |s| {
            s.show_settings = show;
            true
        });
    }

    /// Shallow-merge `update` into the preferences. A non-finite location or
    /// layout entry is dropped from the update.
    pub fn update_user_preferences(&self, mut update: PreferencesUpdate) {
        if update.location.as_ref().is_some_and(|l| !l.is_finite()) {
            tracing::warn!("update_user_preferences: ignoring non-finite location");
            update.location = None;
        }
        if let Some(layout) = update.layout.as_mut() {
            layout.retain(|component_id, position| {
                let keep = position.is_finite();
                if !keep {
                    tracing::warn!(
                        "update_user_preferences: dropping non-finite position for '{}'",
                        component_id
                    );
                }
                keep
            });
        }
        self.mutate("update_user_preferences", |s| {
            update.apply(&mut s.user_preferences);
            true
        });
    }

    /// Insert or overwrite one entry of the layout map. Non-finite positions
    /// are ignored.
    pub fn update_layout_position(&self, component_id: impl Into<String>, position: Position) {
        let component_id = component_id.into();
        if !position.is_finite() {
            tracing::warn!(
                "update_layout_position: ignoring non-finite position for '{}'",
                component_id
            );
            return;
        }
        self.mutate("update_layout_position", |s| {
            s.user_preferences.layout.insert(component_id, position);
            true
        });
    }

    /// Save a new home location and refresh the weather for it.
    ///
    /// Returns once the refresh has settled; `weather_loading` is false by then.
    pub async fn update_location(&self, lat: f64, lon: f64) -> RefreshOutcome {
        if !lat.is_finite() || !lon.is_finite() {
            tracing::warn!("update_location: ignoring non-finite coordinate {}, {}", lat, lon);
            return RefreshOutcome::InvalidLocation;
        }
        self.mutate("update_location", |s| {
            s.user_preferences.location = Some(HomeLocation::new(lat, lon));
            s.weather_loading = true;
            true
        });
        self.refresh_weather().await
    }

    /// Refetch weather for the saved location.
    ///
    /// On failure the previous snapshot (or its absence) is kept and the
    /// loading flag is cleared.
    pub async fn refresh_weather(&self) -> RefreshOutcome {
        let Some(location) = self.snapshot().user_preferences.location.clone() else {
            tracing::debug!("refresh_weather: no location set");
            return RefreshOutcome::SkippedNoLocation;
        };

        let coords = Coordinates::new(location.lat, location.lon);
        let fetched = self.weather.fetch_weather(coords).await.and_then(|snapshot| {
            if snapshot.is_finite() {
                Ok(snapshot)
            } else {
                Err(WeatherError::Parse(format!(
                    "non-finite values in weather snapshot (temperature {})",
                    snapshot.temperature
                )))
            }
        });
        match fetched {
            Ok(snapshot) => {
                let stored = snapshot.clone();
                self.mutate("refresh_weather", |s| {
                    s.weather_data = Some(stored);
                    s.weather_loading = false;
                    true
                });
                RefreshOutcome::Updated(snapshot)
            }
            Err(e) => {
                tracing::warn!("Failed to refresh weather: {}", e);
                self.mutate("refresh_weather", |s| {
                    s.weather_loading = false;
                    true
                });
                RefreshOutcome::Failed(e)
            }
        }
    }

    /// Replace the feed and stamp the update time. Ratings are not carried over.
    ///
    /// Ids must be unique: only the first item with a given id is kept.
    /// Non-finite relevance scores are cleared.
    pub fn set_feed_items(&self, items: Vec<FeedItem>) {
        let mut seen = HashSet::with_capacity(items.len());
        let items: Vec<FeedItem> = items
            .into_iter()
            .filter(|item| {
                let first = seen.insert(item.id.clone());
                if !first {
                    tracing::warn!("set_feed_items: dropping duplicate feed id '{}'", item.id);
                }
                first
            })
            .map(|mut item| {
                if item.relevance_score.is_some_and(|score| !score.is_finite()) {
                    tracing::warn!("set_feed_items: clearing non-finite score on '{}'", item.id);
                    item.relevance_score = None;
                }
                item
            })
            .collect();
        self.mutate("set_feed_items", |s| {
            s.feed_items = items;
            s.last_feed_update = Some(Utc::now());
            true
        });
    }

    pub fn set_feed_loading(&self, loading: bool) {
        self.mutate("set_feed_loading", |s| {
            s.feed_loading = loading;
            true
        });
    }

    /// Rate a feed item. Returns false if no item has that id.
    pub fn rate_feed_item(&self, id: &str, rating: Rating) -> bool {
        self.mutate("rate_feed_item", |s| {
            match s.feed_items.iter_mut().find(|item| item.id == id) {
                Some(item) => {
                    item.user_rating = Some(rating);
                    true
                }
                None => false,
            }
        })
    }

    pub fn set_tasks_loading(&self, loading: bool) {
        self.mutate("set_tasks_loading", |s| {
            s.tasks_loading = loading;
            true
        });
    }

    /// Append a task with a generated id and creation time. `completed` is
    /// always false on the new task.
    pub fn add_task(&self, new_task: NewTask) -> Task {
        let mut task = new_task.into_task(generate_task_id(), Utc::now());
        self.mutate("add_task", |s| {
            while s.task(&task.id).is_some() {
                task.id = generate_task_id();
            }
            s.tasks.push(task.clone());
            true
        });
        tracing::debug!("Added task {}", task.id);
        task
    }

    /// Merge `update` into a task. Returns false if no task has that id.
    pub fn update_task(&self, id: &str, update: TaskUpdate) -> bool {
        self.mutate("update_task", |s| {
            match s.tasks.iter_mut().find(|t| t.id == id) {
                Some(task) => {
                    update.apply(task);
                    true
                }
                None => false,
            }
        })
    }

    /// Invert a task's completion flag. Returns false if no task has that id.
    pub fn toggle_task(&self, id: &str) -> bool {
        self.mutate("toggle_task", |s| {
            match s.tasks.iter_mut().find(|t| t.id == id) {
                Some(task) => {
                    task.completed = !task.completed;
                    true
                }
                None => false,
            }
        })
    }

    /// Remove a task permanently. Returns false if no task has that id.
    pub fn delete_task(&self, id: &str) -> bool {
        self.mutate("delete_task", |s| {
            let before = s.tasks.len();
            s.tasks.retain(|t| t.id != id);
            s.tasks.len() != before
        })
    }

    /// Run the startup sequence: acquire a location (falling back to a fixed
    /// coordinate), refresh the weather for it, then mark the app onboarded.
    ///
    /// Neither location nor weather failures prevent reaching `Onboarded`.
    pub async fn initialize_app(&self) -> InitReport {
        let options = self.settings.init.clone();
        tracing::info!("Initializing app");

        let saved = self.snapshot();
        let reuse_saved = if options.reacquire_on_start || !saved.is_onboarded {
            None
        } else {
            saved.user_preferences.location.clone()
        };

        let source = match reuse_saved {
            Some(location) => {
                let coords = Coordinates::new(location.lat, location.lon);
                tracing::debug!("Reusing saved location {}, {}", coords.latitude, coords.longitude);
                self.advance_phase(|_| InitPhase::LocationResolved(coords));
                LocationSource::Saved
            }
            None => {
                self.advance_phase(InitPhase::begin);
                let result = acquire_with_timeout(self.location.as_ref(), &options.request).await;
                self.advance_phase(|p| p.on_location(&result));
                match result {
                    Ok(_) => LocationSource::Provider,
                    Err(e) => {
                        tracing::warn!(
                            "Location unavailable ({}), using fallback {}, {}",
                            e,
                            options.fallback.latitude,
                            options.fallback.longitude
                        );
                        LocationSource::Fallback(e)
                    }
                }
            }
        };

        let phase = self.advance_phase(|p| p.on_refresh_started(options.fallback));
        let coordinates = phase.refresh_target(options.fallback).unwrap_or(options.fallback);

        let weather = self
            .update_location(coordinates.latitude, coordinates.longitude)
            .await;

        self.set_onboarded(true);
        self.advance_phase(InitPhase::on_weather_settled);

        tracing::info!(
            "App initialized at {}, {} (weather updated: {})",
            coordinates.latitude,
            coordinates.longitude,
            weather.is_updated()
        );

        InitReport {
            coordinates,
            location_source: source,
            weather,
        }
    }
}

/// `task_<unix millis>_<random suffix>`
fn generate_task_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("task_{}_{}", Utc::now().timestamp_millis(), &suffix[..9])
}
