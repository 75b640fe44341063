//! SQLite persistence backend.

use super::{ItemState, PersistenceStore};
use crate::core::store::{SortKey, SortPreference};
use crate::error::PersistenceError;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed persistence store
///
/// Uses WAL mode so the info workers can read while the owner thread
/// writes flag changes.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PersistenceError::OpenFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(path).map_err(|e| PersistenceError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;

        Self::init(conn, path.to_path_buf())
    }

    /// A store that lives only as long as this value
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory().map_err(|e| PersistenceError::OpenFailed {
            path: PathBuf::from(":memory:"),
            reason: e.to_string(),
        })?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, db_path: PathBuf) -> Result<Self, PersistenceError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS items (
                key TEXT PRIMARY KEY,
                description TEXT,
                archived INTEGER NOT NULL DEFAULT 0,
                favourite INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS collections (
                collection TEXT PRIMARY KEY,
                active TEXT,
                sort_key TEXT,
                sort_descending INTEGER NOT NULL DEFAULT 0
            );",
        )
        .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.conn.lock().map_err(|_| PersistenceError::Corrupted {
            path: self.db_path.clone(),
        })
    }

    fn ensure_item(conn: &Connection, key: &str) -> Result<(), PersistenceError> {
        conn.execute("INSERT OR IGNORE INTO items (key) VALUES (?)", [key])
            .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn ensure_collection(conn: &Connection, collection: &str) -> Result<(), PersistenceError> {
        conn.execute(
            "INSERT OR IGNORE INTO collections (collection) VALUES (?)",
            [collection],
        )
        .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn set_item_flag(&self, column: &str, key: &str, value: bool) -> Result<(), PersistenceError> {
        let conn = self.conn()?;
        Self::ensure_item(&conn, key)?;
        conn.execute(
            &format!("UPDATE items SET {} = ? WHERE key = ?", column),
            params![value as i64, key],
        )
        .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        Ok(())
    }
}

impl PersistenceStore for SqliteStore {
    fn item(&self, key: &str) -> Result<ItemState, PersistenceError> {
        let conn = self.conn()?;

        let result = conn.query_row(
            "SELECT description, archived, favourite FROM items WHERE key = ?",
            [key],
            |row| {
                Ok(ItemState {
                    description: row.get(0)?,
                    archived: row.get::<_, i64>(1)? != 0,
                    favourite: row.get::<_, i64>(2)? != 0,
                })
            },
        );

        match result {
            Ok(state) => Ok(state),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(ItemState::default()),
            Err(e) => Err(PersistenceError::QueryFailed(e.to_string())),
        }
    }

    fn set_description(&self, key: &str, description: &str) -> Result<(), PersistenceError> {
        let conn = self.conn()?;
        Self::ensure_item(&conn, key)?;
        conn.execute(
            "UPDATE items SET description = ? WHERE key = ?",
            params![description, key],
        )
        .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn set_archived(&self, key: &str, archived: bool) -> Result<(), PersistenceError> {
        self.set_item_flag("archived", key, archived)
    }

    fn set_favourite(&self, key: &str, favourite: bool) -> Result<(), PersistenceError> {
        self.set_item_flag("favourite", key, favourite)
    }

    fn active_item(&self, collection: &str) -> Result<Option<String>, PersistenceError> {
        let conn = self.conn()?;

        let result = conn.query_row(
            "SELECT active FROM collections WHERE collection = ?",
            [collection],
            |row| row.get::<_, Option<String>>(0),
        );

        match result {
            Ok(active) => Ok(active),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PersistenceError::QueryFailed(e.to_string())),
        }
    }

    fn set_active_item(&self, collection: &str, key: Option<&str>) -> Result<(), PersistenceError> {
        let conn = self.conn()?;
        Self::ensure_collection(&conn, collection)?;
        conn.execute(
            "UPDATE collections SET active = ? WHERE collection = ?",
            params![key, collection],
        )
        .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    fn sort_preference(&self, collection: &str) -> Result<Option<SortPreference>, PersistenceError> {
        let conn = self.conn()?;

        let result = conn.query_row(
            "SELECT sort_key, sort_descending FROM collections WHERE collection = ?",
            [collection],
            |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)?)),
        );

        match result {
            Ok((Some(key), descending)) => Ok(Some(SortPreference {
                key: SortKey::parse(&key),
                descending: descending != 0,
            })),
            Ok((None, _)) | Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(PersistenceError::QueryFailed(e.to_string())),
        }
    }

    fn set_sort_preference(
        &self,
        collection: &str,
        preference: SortPreference,
    ) -> Result<(), PersistenceError> {
        let conn = self.conn()?;
        Self::ensure_collection(&conn, collection)?;
        conn.execute(
            "UPDATE collections SET sort_key = ?, sort_descending = ? WHERE collection = ?",
            params![preference.key.as_str(), preference.descending as i64, collection],
        )
        .map_err(|e| PersistenceError::QueryFailed(e.to_string()))?;
        Ok(())
    }
}
