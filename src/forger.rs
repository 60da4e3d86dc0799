//! Block-forger collaborator: consensus and block assembly live outside
//! this crate. The mempool worker publishes inclusion-list snapshots here
//! and reacts to suspend/continue signals the forger drives.

use crate::mempool::record::MempoolRecord;
use std::sync::{Arc, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContinueKind {
    /// Keep overlay, keep cursor; a later retry.
    Error,
    /// Drop work entirely, await next tip.
    NoError,
    /// Keep sorted `tx_list`, drop overlay, restart cursor.
    NoErrorReset,
}

#[derive(Clone, Debug, Default)]
pub struct InclusionSnapshot {
    pub txs: Vec<MempoolRecord>,
    pub total_size: u64,
}

/// Single-writer/many-reader handle: the mempool worker is the sole
/// writer; the forger (and anyone else) reads under a short critical
/// section. No lock-free machinery is needed at this scale.
#[derive(Clone)]
pub struct ResultHandle {
    inner: Arc<RwLock<Arc<InclusionSnapshot>>>,
}

impl ResultHandle {
    pub fn new() -> Self {
        ResultHandle {
            inner: Arc::new(RwLock::new(Arc::new(InclusionSnapshot::default()))),
        }
    }

    pub fn publish(&self, snapshot: InclusionSnapshot) {
        let mut guard = self.inner.write().expect("result handle poisoned");
        *guard = Arc::new(snapshot);
    }

    pub fn read(&self) -> Arc<InclusionSnapshot> {
        self.inner.read().expect("result handle poisoned").clone()
    }
}

impl Default for ResultHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// What the mempool worker expects from the forger side of the
/// relationship: a place to poll the current best list, and the two
/// signals that pause/resume scanning during block assembly.
pub trait ForgerHandle: Send + Sync {
    fn poll_inclusion_list(&self) -> Arc<InclusionSnapshot>;
    fn suspend(&self);
    fn continue_processing(&self, kind: ContinueKind);
    fn remove_txs(&self, hashes: &[String]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_then_read_observes_latest_snapshot() {
        let handle = ResultHandle::new();
        assert_eq!(handle.read().total_size, 0);

        handle.publish(InclusionSnapshot {
            txs: Vec::new(),
            total_size: 128,
        });
        assert_eq!(handle.read().total_size, 128);
    }

    #[test]
    fn readers_see_a_consistent_arc_snapshot_even_mid_write() {
        let handle = ResultHandle::new();
        let before = handle.read();
        handle.publish(InclusionSnapshot {
            txs: Vec::new(),
            total_size: 7,
        });
        let after = handle.read();
        assert_eq!(before.total_size, 0);
        assert_eq!(after.total_size, 7);
    }
}
