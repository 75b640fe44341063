//! In-memory persistence backend.

use super::{ItemState, PersistenceStore};
use crate::core::store::SortPreference;
use crate::error::PersistenceError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Collection {
    active: Option<String>,
    sort: Option<SortPreference>,
}

/// In-memory persistence backend
///
/// Nothing survives the process; used by tests and by `--db` less runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    items: RwLock<HashMap<String, ItemState>>,
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn corrupted() -> PersistenceError {
        PersistenceError::Corrupted {
            path: PathBuf::from("memory"),
        }
    }

    fn items(&self) -> Result<RwLockReadGuard<'_, HashMap<String, ItemState>>, PersistenceError> {
        self.items.read().map_err(|_| Self::corrupted())
    }

    fn items_mut(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<String, ItemState>>, PersistenceError> {
        self.items.write().map_err(|_| Self::corrupted())
    }

    fn collections_mut(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<String, Collection>>, PersistenceError> {
        self.collections.write().map_err(|_| Self::corrupted())
    }

    fn update_item<F>(&self, key: &str, update: F) -> Result<(), PersistenceError>
    where
        F: FnOnce(&mut ItemState),
    {
        let mut items = self.items_mut()?;
        update(items.entry(key.to_string()).or_default());
        Ok(())
    }
}

impl PersistenceStore for InMemoryStore {
    fn item(&self, key: &str) -> Result<ItemState, PersistenceError> {
        Ok(self.items()?.get(key).cloned().unwrap_or_default())
    }

    fn set_description(&self, key: &str, description: &str) -> Result<(), PersistenceError> {
        self.update_item(key, |item| item.description = Some(description.to_string()))
    }

    fn set_archived(&self, key: &str, archived: bool) -> Result<(), PersistenceError> {
        self.update_item(key, |item| item.archived = archived)
    }

    fn set_favourite(&self, key: &str, favourite: bool) -> Result<(), PersistenceError> {
        self.update_item(key, |item| item.favourite = favourite)
    }

    fn active_item(&self, collection: &str) -> Result<Option<String>, PersistenceError> {
        let collections = self.collections.read().map_err(|_| Self::corrupted())?;
        Ok(collections.get(collection).and_then(|c| c.active.clone()))
    }

    fn set_active_item(&self, collection: &str, key: Option<&str>) -> Result<(), PersistenceError> {
        let mut collections = self.collections_mut()?;
        collections.entry(collection.to_string()).or_default().active = key.map(String::from);
        Ok(())
    }

    fn sort_preference(&self, collection: &str) -> Result<Option<SortPreference>, PersistenceError> {
        let collections = self.collections.read().map_err(|_| Self::corrupted())?;
        Ok(collections.get(collection).and_then(|c| c.sort))
    }

    fn set_sort_preference(
        &self,
        collection: &str,
        preference: SortPreference,
    ) -> Result<(), PersistenceError> {
        let mut collections = self.collections_mut()?;
        collections.entry(collection.to_string()).or_default().sort = Some(preference);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::SortKey;

    #[test]
    fn missing_item_has_default_state() {
        let store = InMemoryStore::new();
        assert_eq!(store.item("/a.ma").unwrap(), ItemState::default());
    }

    #[test]
    fn merged_reads_proxy_flags_and_description() {
        let store = InMemoryStore::new();
        store.set_description("/r/shot.[0].exr", "hero plate").unwrap();
        store.set_favourite("/r/shot.[0].exr", true).unwrap();
        store.set_archived("/r/shot.[0001-0003].exr", true).unwrap();

        let state = store
            .merged("/r/shot.[0001-0003].exr", "/r/shot.[0].exr")
            .unwrap();
        assert_eq!(state.description.as_deref(), Some("hero plate"));
        assert!(state.archived);
        assert!(state.favourite);
    }

    #[test]
    fn collection_state_round_trips() {
        let store = InMemoryStore::new();
        store.set_active_item("plates", Some("/p/a.exr")).unwrap();
        let preference = SortPreference {
            key: SortKey::Size,
            descending: true,
        };
        store.set_sort_preference("plates", preference).unwrap();

        assert_eq!(store.active_item("plates").unwrap().as_deref(), Some("/p/a.exr"));
        assert_eq!(store.sort_preference("plates").unwrap(), Some(preference));

        store.set_active_item("plates", None).unwrap();
        assert_eq!(store.active_item("plates").unwrap(), None);
        assert_eq!(store.sort_preference("scenes").unwrap(), None);
    }
}
