//! Application state shape: preferences, feed, tasks and weather.
//!
//! Every struct here is persisted as part of one JSON blob. Containers carry
//! `#[serde(default)]` so blobs written before a field existed still load.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use newtab_weather::WeatherSnapshot;

/// Color scheme preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

/// The user's saved home location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeLocation {
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub city_name: Option<String>,
}

impl HomeLocation {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            city_name: None,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Position of a draggable component on the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub name: Option<String>,
    pub interests: BTreeSet<String>,
    pub location: Option<HomeLocation>,
    pub theme: Theme,
    /// Component id -> position
    pub layout: HashMap<String, Position>,
    pub weather_enabled: bool,
    pub feed_enabled: bool,
    pub tasks_enabled: bool,
    pub tasks_sync_enabled: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            name: None,
            interests: BTreeSet::new(),
            location: None,
            theme: Theme::System,
            layout: HashMap::new(),
            weather_enabled: true,
            feed_enabled: true,
            tasks_enabled: true,
            tasks_sync_enabled: false,
        }
    }
}

/// Partial preferences. Only `Some` fields are applied.
///
/// `layout`, when present, replaces the whole map; use
/// `AppStore::update_layout_position` to change a single entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesUpdate {
    pub name: Option<String>,
    pub interests: Option<BTreeSet<String>>,
    pub location: Option<HomeLocation>,
    pub theme: Option<Theme>,
    pub layout: Option<HashMap<String, Position>>,
    pub weather_enabled: Option<bool>,
    pub feed_enabled: Option<bool>,
    pub tasks_enabled: Option<bool>,
    pub tasks_sync_enabled: Option<bool>,
}

impl PreferencesUpdate {
    pub fn apply(self, prefs: &mut UserPreferences) {
        if let Some(name) = self.name {
            prefs.name = Some(name);
        }
        if let Some(interests) = self.interests {
            prefs.interests = interests;
        }
        if let Some(location) = self.location {
            prefs.location = Some(location);
        }
        if let Some(theme) = self.theme {
            prefs.theme = theme;
        }
        if let Some(layout) = self.layout {
            prefs.layout = layout;
        }
        if let Some(v) = self.weather_enabled {
            prefs.weather_enabled = v;
        }
        if let Some(v) = self.feed_enabled {
            prefs.feed_enabled = v;
        }
        if let Some(v) = self.tasks_enabled {
            prefs.tasks_enabled = v;
        }
        if let Some(v) = self.tasks_sync_enabled {
            prefs.tasks_sync_enabled = v;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Up,
    Down,
}

/// A single article in the content feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Set by the enrichment pipeline, never by the store
    #[serde(default)]
    pub ai_summary: Option<String>,
    #[serde(default)]
    pub relevance_score: Option<f64>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub user_rating: Option<Rating>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    /// Due instant in UTC. Date-only due dates are stored as midnight UTC of
    /// that day (see `due_on`).
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub ai_suggestions: Option<Vec<String>>,
    /// Identifier of the mirrored task in an external task service
    #[serde(default)]
    pub sync_id: Option<String>,
}

/// Midnight UTC of `date`, the stored form of a date-only due date.
pub fn due_on(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Caller-supplied fields for a new task.
///
/// `completed` is accepted for shape compatibility but always reset to
/// `false`; the id and creation time are assigned by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub ai_suggestions: Option<Vec<String>>,
    pub sync_id: Option<String>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub(crate) fn into_task(self, id: String, created_at: DateTime<Utc>) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            completed: false,
            created_at,
            due_date: self.due_date,
            priority: self.priority,
            ai_suggestions: self.ai_suggestions,
            sync_id: self.sync_id,
        }
    }
}

/// Partial task update. The id and creation time cannot be changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
    pub ai_suggestions: Option<Vec<String>>,
    pub sync_id: Option<String>,
}

impl TaskUpdate {
    pub fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = Some(description);
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(due) = self.due_date {
            task.due_date = Some(due);
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(suggestions) = self.ai_suggestions {
            task.ai_suggestions = Some(suggestions);
        }
        if let Some(sync_id) = self.sync_id {
            task.sync_id = Some(sync_id);
        }
    }
}

/// The complete application state at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppState {
    pub is_onboarded: bool,
    pub show_settings: bool,
    pub user_preferences: UserPreferences,

    pub weather_data: Option<WeatherSnapshot>,
    pub weather_loading: bool,

    pub feed_items: Vec<FeedItem>,
    pub feed_loading: bool,
    pub last_feed_update: Option<DateTime<Utc>>,

    pub tasks: Vec<Task>,
    pub tasks_loading: bool,
}

impl AppState {
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn feed_item(&self, id: &str) -> Option<&FeedItem> {
        self.feed_items.iter().find(|i| i.id == id)
    }
}
