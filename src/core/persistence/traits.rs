//! Persistence backend trait definition.

use super::ItemState;
use crate::core::store::SortPreference;
use crate::error::PersistenceError;

/// Trait for persistence backends
///
/// Implementations are shared between the owner thread and the info
/// workers, so every method takes `&self`.
pub trait PersistenceStore: Send + Sync {
    /// Stored state of an item; the default state when nothing is stored
    fn item(&self, key: &str) -> Result<ItemState, PersistenceError>;

    fn set_description(&self, key: &str, description: &str) -> Result<(), PersistenceError>;

    fn set_archived(&self, key: &str, archived: bool) -> Result<(), PersistenceError>;

    fn set_favourite(&self, key: &str, favourite: bool) -> Result<(), PersistenceError>;

    /// Status path of the collection's Active item
    fn active_item(&self, collection: &str) -> Result<Option<String>, PersistenceError>;

    fn set_active_item(&self, collection: &str, key: Option<&str>) -> Result<(), PersistenceError>;

    fn sort_preference(&self, collection: &str) -> Result<Option<SortPreference>, PersistenceError>;

    fn set_sort_preference(
        &self,
        collection: &str,
        preference: SortPreference,
    ) -> Result<(), PersistenceError>;

    /// Merged state of an item and its sequence proxy.
    ///
    /// The description comes from `key` when present, otherwise from
    /// `proxy`. Flags set under either key apply.
    fn merged(&self, key: &str, proxy: &str) -> Result<ItemState, PersistenceError> {
        let own = self.item(key)?;
        if key == proxy {
            return Ok(own);
        }
        let shared = self.item(proxy)?;
        Ok(ItemState {
            description: own.description.or(shared.description),
            archived: own.archived || shared.archived,
            favourite: own.favourite || shared.favourite,
        })
    }
}
