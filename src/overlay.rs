//! Speculative data-storage overlay: a writable view buffered in memory
//! over a read-only store snapshot, committed or discarded as a unit.

use crate::store::{StoreError, StoreHandle};
use std::collections::HashMap;

/// `None` marks a tombstoned delete; a present `Vec<u8>` is a pending
/// write. Keys absent from the buffer fall through to the underlying
/// snapshot.
pub struct Overlay {
    store: StoreHandle,
    tree_name: String,
    buffer: HashMap<Vec<u8>, Option<Vec<u8>>>,
}

impl Overlay {
    pub fn new(store: StoreHandle, tree_name: impl Into<String>) -> Self {
        Overlay {
            store,
            tree_name: tree_name.into(),
            buffer: HashMap::new(),
        }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(buffered) = self.buffer.get(key) {
            return Ok(buffered.clone());
        }
        self.store.view(&self.tree_name, |view| view.get(key))
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        self.buffer.insert(key.to_vec(), Some(value.to_vec()));
    }

    pub fn remove(&mut self, key: &[u8]) {
        self.buffer.insert(key.to_vec(), None);
    }

    /// Flushes the buffer into the underlying store as one atomic batch.
    /// Consumes `self`: overlays are not nested, and a committed overlay
    /// cannot be reused.
    pub fn commit(self) -> Result<(), StoreError> {
        let buffer = self.buffer;
        self.store.update(&self.tree_name, |update| {
            for (key, value) in buffer {
                match value {
                    Some(bytes) => update.set(&key, &bytes),
                    None => update.remove(&key),
                }
            }
            Ok(())
        })
    }

    /// Discards the buffer without touching the underlying store.
    pub fn rollback(self) {
        drop(self);
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_invisible_until_commit() {
        let store = StoreHandle::open_in_memory().unwrap();
        let mut overlay = Overlay::new(store.clone(), "accounts");
        overlay.set(b"k", b"v");
        assert_eq!(overlay.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert!(!store.view("accounts", |v| v.exists(b"k")).unwrap());

        overlay.commit().unwrap();
        assert!(store.view("accounts", |v| v.exists(b"k")).unwrap());
    }

    #[test]
    fn rollback_discards_pending_writes() {
        let store = StoreHandle::open_in_memory().unwrap();
        let mut overlay = Overlay::new(store.clone(), "accounts");
        overlay.set(b"k", b"v");
        overlay.rollback();
        assert!(!store.view("accounts", |v| v.exists(b"k")).unwrap());
    }

    #[test]
    fn tombstone_shadows_the_underlying_value() {
        let store = StoreHandle::open_in_memory().unwrap();
        store
            .update("accounts", |u| {
                u.set(b"k", b"v");
                Ok(())
            })
            .unwrap();

        let mut overlay = Overlay::new(store, "accounts");
        overlay.remove(b"k");
        assert_eq!(overlay.get(b"k").unwrap(), None);
    }
}
