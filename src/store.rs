//! Store backend: a `sled`-backed multi-reader/single-writer key-value
//! store implementing the View/Update contract external collaborators
//! expect. Values are opaque bytes except for the well-known scalar keys.

use crate::codec::{Reader, Writer};
use tracing::{debug, info};

const CHAIN_HEIGHT_KEY: &[u8] = b"chainHeight";
const CHAIN_KERNEL_HASH_KEY: &[u8] = b"chainKernelHash";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("codec error: {0}")]
    Codec(#[from] crate::codec::CodecError),
}

/// A read-only snapshot over the store. `sled`'s own MVCC gives us
/// multi-reader, non-blocking reads without a separate transaction type.
pub struct StoreView<'a> {
    tree: &'a sled::Tree,
}

impl<'a> StoreView<'a> {
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.tree.contains_key(key)?)
    }

    pub fn chain_height(&self) -> Result<u64, StoreError> {
        match self.get(CHAIN_HEIGHT_KEY)? {
            Some(bytes) => Ok(Reader::new(&bytes).read_uvarint()?),
            None => Ok(0),
        }
    }

    pub fn chain_kernel_hash(&self) -> Result<Vec<u8>, StoreError> {
        Ok(self.get(CHAIN_KERNEL_HASH_KEY)?.unwrap_or_default())
    }
}

pub struct StoreUpdate<'a> {
    tree: &'a sled::Tree,
    batch: sled::Batch,
}

impl<'a> StoreUpdate<'a> {
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        self.batch.insert(key, value);
    }

    pub fn remove(&mut self, key: &[u8]) {
        self.batch.remove(key);
    }

    pub fn set_chain_height(&mut self, height: u64) {
        let mut w = Writer::new();
        w.write_uvarint(height);
        self.set(CHAIN_HEIGHT_KEY, &w.into_bytes());
    }

    pub fn set_chain_kernel_hash(&mut self, hash: &[u8]) {
        self.set(CHAIN_KERNEL_HASH_KEY, hash);
    }
}

/// Handle shared across the prebuilder and the mempool worker. Cloning is
/// cheap (`sled::Db` is internally an `Arc`).
#[derive(Clone)]
pub struct StoreHandle {
    db: sled::Db,
}

impl StoreHandle {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        info!(path, "opening store");
        let db = sled::open(path)?;
        Ok(StoreHandle { db })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(StoreHandle { db })
    }

    fn tree(&self, name: &str) -> Result<sled::Tree, StoreError> {
        Ok(self.db.open_tree(name)?)
    }

    /// Read snapshot scoped to `tree_name`. Multiple views may be taken
    /// concurrently; none of them block writers.
    pub fn view<F, R>(&self, tree_name: &str, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&StoreView) -> Result<R, StoreError>,
    {
        let tree = self.tree(tree_name)?;
        let view = StoreView { tree: &tree };
        f(&view)
    }

    /// Writable update scoped to `tree_name`. Buffers writes into a
    /// `sled::Batch` and applies them atomically once `f` returns `Ok`.
    pub fn update<F, R>(&self, tree_name: &str, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut StoreUpdate) -> Result<R, StoreError>,
    {
        let tree = self.tree(tree_name)?;
        let mut update = StoreUpdate {
            tree: &tree,
            batch: sled::Batch::default(),
        };
        let result = f(&mut update)?;
        tree.apply_batch(update.batch)?;
        debug!(tree_name, "applied store update batch");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_height_defaults_to_zero() {
        let store = StoreHandle::open_in_memory().unwrap();
        let height = store.view("blockchain", |v| v.chain_height()).unwrap();
        assert_eq!(height, 0);
    }

    #[test]
    fn update_then_view_observes_the_write() {
        let store = StoreHandle::open_in_memory().unwrap();
        store
            .update("blockchain", |u| {
                u.set_chain_height(42);
                Ok(())
            })
            .unwrap();
        let height = store.view("blockchain", |v| v.chain_height()).unwrap();
        assert_eq!(height, 42);
    }

    #[test]
    fn txhash_key_round_trips_raw_bytes() {
        let store = StoreHandle::open_in_memory().unwrap();
        let key = b"txHash:deadbeef";
        store
            .update("mempool", |u| {
                u.set(key, b"1");
                Ok(())
            })
            .unwrap();
        assert!(store.view("mempool", |v| v.exists(key)).unwrap());
    }
}
