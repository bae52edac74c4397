//! Durable key -> JSON blob storage for the application state.
//!
//! The whole `AppState` lives under one key. `SqliteStateStorage` keeps the
//! blobs in a single `kv` table.

use std::path::Path;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{RusqliteErrorExt, StorageError};
use crate::state::AppState;

/// Key the application state is stored under.
pub const DEFAULT_STATE_KEY: &str = "app-store";

/// Opaque key-value blob store.
pub trait StateStorage: Send + Sync {
    /// Load the blob stored under `key`, if any.
    ///
    /// # Errors
    /// Returns a `StorageError` if the backing store cannot be read.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `json` under `key`, replacing any previous blob.
    ///
    /// # Errors
    /// Returns a `StorageError` if the write fails.
    fn save(&self, key: &str, json: &str) -> Result<(), StorageError>;
}

/// SQLite-backed blob storage.
pub struct SqliteStateStorage {
    conn: Mutex<Connection>,
}

impl SqliteStateStorage {
    /// Open (or create) the storage database at `path`.
    ///
    /// # Errors
    /// Returns a `StorageError` if the database cannot be opened or migrated.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(RusqliteErrorExt::into_storage_error)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store. Contents are lost on drop.
    ///
    /// # Errors
    /// Returns a `StorageError` if SQLite cannot allocate the database.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(RusqliteErrorExt::into_storage_error)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(RusqliteErrorExt::into_storage_error)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl StateStorage for SqliteStateStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.conn
            .lock()
            .query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(RusqliteErrorExt::into_storage_error)
    }

    fn save(&self, key: &str, json: &str) -> Result<(), StorageError> {
        self.conn
            .lock()
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, json, Utc::now().to_rfc3339()],
            )
            .map_err(RusqliteErrorExt::into_storage_error)?;
        Ok(())
    }
}

/// Rehydrate the application state.
///
/// Missing, unreadable or undecodable blobs all yield the default state.
pub fn load_state(storage: &dyn StateStorage, key: &str) -> AppState {
    let blob = match storage.load(key) {
        Ok(Some(blob)) => blob,
        Ok(None) => {
            tracing::debug!("No persisted state under '{}', starting fresh", key);
            return AppState::default();
        }
        Err(e) => {
            tracing::warn!("Failed to load persisted state: {}", e);
            return AppState::default();
        }
    };

    match serde_json::from_str(&blob) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!("Persisted state is corrupt, using defaults: {}", e);
            AppState::default()
        }
    }
}

/// Serialize and store the full application state.
///
/// The blob is decoded again before writing; a state that would not reload
/// (e.g. a non-finite float serialized as `null`) leaves the previous blob in
/// place.
///
/// # Errors
/// Returns a `StorageError` if serialization, the reload check or the write
/// fails.
pub fn save_state(storage: &dyn StateStorage, key: &str, state: &AppState) -> Result<(), StorageError> {
    let json = serde_json::to_string(state)?;
    serde_json::from_str::<AppState>(&json)
        .map_err(|e| StorageError::Corruption(format!("state would not reload: {}", e)))?;
    storage.save(key, &json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Position, Theme};

    #[test]
    fn test_load_missing_key() {
        let storage = SqliteStateStorage::in_memory().unwrap();
        assert_eq!(storage.load("nothing").unwrap(), None);
    }

    #[test]
    fn test_save_overwrites() {
        let storage = SqliteStateStorage::in_memory().unwrap();
        storage.save("k", "1").unwrap();
        storage.save("k", "2").unwrap();
        assert_eq!(storage.load("k").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_keys_are_independent() {
        let storage = SqliteStateStorage::in_memory().unwrap();
        storage.save("a", "{}").unwrap();
        assert_eq!(storage.load("b").unwrap(), None);
    }

    #[test]
    fn test_load_state_defaults_when_absent() {
        let storage = SqliteStateStorage::in_memory().unwrap();
        assert_eq!(load_state(&storage, DEFAULT_STATE_KEY), AppState::default());
    }

    #[test]
    fn test_load_state_defaults_when_corrupt() {
        let storage = SqliteStateStorage::in_memory().unwrap();
        storage.save(DEFAULT_STATE_KEY, "{not json").unwrap();
        assert_eq!(load_state(&storage, DEFAULT_STATE_KEY), AppState::default());
    }

    #[test]
    fn test_state_round_trip() {
        let storage = SqliteStateStorage::in_memory().unwrap();
        let mut state = AppState::default();
        state.is_onboarded = true;
        state.user_preferences.theme = Theme::Light;

        save_state(&storage, DEFAULT_STATE_KEY, &state).unwrap();
        assert_eq!(load_state(&storage, DEFAULT_STATE_KEY), state);
    }

    #[test]
    fn test_unreloadable_state_keeps_previous_blob() {
        let storage = SqliteStateStorage::in_memory().unwrap();
        let mut state = AppState::default();
        state.is_onboarded = true;
        save_state(&storage, DEFAULT_STATE_KEY, &state).unwrap();

        let mut bad = state.clone();
        bad.user_preferences
            .layout
            .insert("feed".into(), Position::new(f64::NAN, 1.0));
        assert!(matches!(
            save_state(&storage, DEFAULT_STATE_KEY, &bad),
            Err(StorageError::Corruption(_))
        ));
        assert_eq!(load_state(&storage, DEFAULT_STATE_KEY), state);
    }
}
