//! Mempool worker: a single-threaded actor that accepts candidate
//! transactions, keeps them fee-density ordered, speculatively applies
//! them against an overlay, and publishes the current best inclusion list.

use crate::codec::WireCodec;
use crate::forger::{ContinueKind, InclusionSnapshot, ResultHandle};
use crate::mempool::record::{sort_records, MempoolRecord};
use crate::overlay::Overlay;
use crate::plain_account::PlainAccount;
use crate::store::StoreHandle;
use crate::transaction::Transaction;
use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const BLOCK_MAX_SIZE: u64 = 8 * 1024 * 1024;

fn plain_account_key(public_key: &[u8; 32]) -> Vec<u8> {
    format!("plainAccount:{}", hex::encode(public_key)).into_bytes()
}

fn read_plain_account(overlay: &Overlay, public_key: &[u8; 32]) -> PlainAccount {
    let decoded = match overlay.get(&plain_account_key(public_key)) {
        Ok(Some(bytes)) => PlainAccount::from_bytes(&bytes).ok(),
        _ => None,
    };
    match decoded {
        Some(mut account) => {
            account.public_key = *public_key;
            account
        }
        None => PlainAccount::new(*public_key),
    }
}

#[derive(Debug)]
pub struct NewWork {
    pub chain_hash: Vec<u8>,
    pub chain_height: u64,
}

pub struct AddTxRequest {
    pub record: MempoolRecord,
    pub reply: Option<oneshot::Sender<Result<(), String>>>,
}

pub struct InsertTxsRequest {
    pub records: Vec<MempoolRecord>,
    pub reply: oneshot::Sender<bool>,
}

pub struct RemoveTxsRequest {
    pub hashes: Vec<String>,
    pub reply: oneshot::Sender<bool>,
}

pub struct WorkerHandles {
    pub new_work: mpsc::Sender<NewWork>,
    pub suspend: mpsc::Sender<()>,
    pub continue_processing: mpsc::Sender<ContinueKind>,
    pub add_tx: mpsc::Sender<AddTxRequest>,
    pub insert_txs: mpsc::Sender<InsertTxsRequest>,
    pub remove_txs: mpsc::Sender<RemoveTxsRequest>,
}

struct Channels {
    new_work: mpsc::Receiver<NewWork>,
    suspend: mpsc::Receiver<()>,
    continue_processing: mpsc::Receiver<ContinueKind>,
    add_tx: mpsc::Receiver<AddTxRequest>,
    insert_txs: mpsc::Receiver<InsertTxsRequest>,
    remove_txs: mpsc::Receiver<RemoveTxsRequest>,
}

pub(crate) fn worker_channels(buffer: usize) -> (WorkerHandles, Channels) {
    let (nw_tx, nw_rx) = mpsc::channel(buffer);
    let (sp_tx, sp_rx) = mpsc::channel(buffer);
    let (cp_tx, cp_rx) = mpsc::channel(buffer);
    let (at_tx, at_rx) = mpsc::channel(buffer);
    let (it_tx, it_rx) = mpsc::channel(buffer);
    let (rt_tx, rt_rx) = mpsc::channel(buffer);

    (
        WorkerHandles {
            new_work: nw_tx,
            suspend: sp_tx,
            continue_processing: cp_tx,
            add_tx: at_tx,
            insert_txs: it_tx,
            remove_txs: rt_tx,
        },
        Channels {
            new_work: nw_rx,
            suspend: sp_rx,
            continue_processing: cp_rx,
            add_tx: at_rx,
            insert_txs: it_rx,
            remove_txs: rt_rx,
        },
    )
}

/// Owns the mutable mempool state: `tx_map`, `tx_list`, `verified_set`,
/// and the currently-included set for the active tip.
pub struct MempoolWorker {
    store: StoreHandle,
    result_handle: ResultHandle,
    tx_map: HashMap<String, MempoolRecord>,
    tx_list: Vec<MempoolRecord>,
    verified_set: HashSet<String>,
    included_txs: Vec<MempoolRecord>,
    included_total_size: u64,
    included_zether_nonces: HashSet<Vec<u8>>,
    cursor: usize,
    work: Option<NewWork>,
    suspended: bool,
    overlay: Option<Overlay>,
}

impl MempoolWorker {
    pub fn new(store: StoreHandle, result_handle: ResultHandle) -> Self {
        MempoolWorker {
            store,
            result_handle,
            tx_map: HashMap::new(),
            tx_list: Vec::new(),
            verified_set: HashSet::new(),
            included_txs: Vec::new(),
            included_total_size: 0,
            included_zether_nonces: HashSet::new(),
            cursor: 0,
            work: None,
            suspended: false,
            overlay: None,
        }
    }

    fn reset_for_new_work(&mut self, new_work: NewWork) {
        self.verified_set.clear();
        self.overlay = None;
        self.included_txs.clear();
        self.included_total_size = 0;
        self.included_zether_nonces.clear();
        self.cursor = 0;
        if self.tx_list.len() > 1 {
            sort_records(&mut self.tx_list);
        }
        info!(height = new_work.chain_height, "mempool worker reset for new tip");
        self.work = Some(new_work);
    }

    fn remove_txs(&mut self, req: RemoveTxsRequest) {
        let mut removed = false;
        let mut removed_set = HashSet::new();
        for hash in &req.hashes {
            if self.tx_map.remove(hash).is_some() {
                removed_set.insert(hash.clone());
                removed = true;
            }
        }
        if removed {
            self.tx_list.retain(|r| !removed_set.contains(&r.hash));
        }
        let _ = req.reply.send(removed);
    }

    fn insert_txs(&mut self, req: InsertTxsRequest) {
        let mut inserted = false;
        for record in req.records {
            if !self.tx_map.contains_key(&record.hash) {
                self.tx_map.insert(record.hash.clone(), record.clone());
                self.tx_list.push(record);
                inserted = true;
            }
        }
        let _ = req.reply.send(inserted);
    }

    fn apply_continue(&mut self, kind: ContinueKind) {
        self.suspended = false;
        match kind {
            ContinueKind::Error => {}
            ContinueKind::NoError => self.work = None,
            ContinueKind::NoErrorReset => {
                self.overlay = None;
                self.cursor = 0;
            }
        }
    }

    fn publish_inclusion(&self) {
        self.result_handle.publish(InclusionSnapshot {
            txs: self.included_txs.clone(),
            total_size: self.included_total_size,
        });
    }

    fn tree_name(&self) -> &'static str {
        "blockchain"
    }

    /// One scan step: consumes the tx at `cursor` (or the freshly-added
    /// one when the list is exhausted), checking chain membership, Zether
    /// nonce conflicts, and overlay application, exactly in that order.
    fn process_one(&mut self, tx: MempoolRecord, newly_added: bool) {
        if self.verified_set.contains(&tx.hash) {
            return;
        }
        self.verified_set.insert(tx.hash.clone());

        let tx_hash_key = format!("txHash:{}", tx.hash);
        let already_in_chain = self
            .store
            .view(self.tree_name(), |v| v.exists(tx_hash_key.as_bytes()))
            .unwrap_or(false);

        let mut rejection: Option<String> = None;

        if already_in_chain {
            rejection = Some("already in chain".into());
        } else if let Transaction::Zether(zether) = &tx.tx {
            for nonce in zether.nonces() {
                if self.included_zether_nonces.contains(nonce) {
                    rejection = Some("zether nonce conflict".into());
                    break;
                }
            }
        }

        if rejection.is_none() {
            if self.overlay.is_none() {
                self.overlay = Some(Overlay::new(self.store.clone(), self.tree_name()));
            }
            let overlay = self.overlay.as_mut().expect("overlay just initialized");

            if let Err(e) = tx.tx.validate() {
                rejection = Some(format!("validation failed: {e}"));
            } else if let Transaction::Simple(simple) = &tx.tx {
                let mut account = read_plain_account(overlay, &simple.vin.public_key);
                match simple.include_transaction(&mut account) {
                    Ok(()) => overlay.set(&plain_account_key(&simple.vin.public_key), &account.to_bytes()),
                    Err(e) => rejection = Some(format!("state error: {e}")),
                }
            }
        }

        match rejection {
            Some(reason) => {
                debug!(hash = %tx.hash, reason = %reason, "dropping tx from mempool");
                if let Some(overlay) = self.overlay.take() {
                    overlay.rollback();
                }
                self.tx_map.remove(&tx.hash);
                if !newly_added {
                    self.tx_list.retain(|r| r.hash != tx.hash);
                }
            }
            None => {
                if self.included_total_size + tx.size <= BLOCK_MAX_SIZE {
                    self.included_total_size += tx.size;
                    if let Transaction::Zether(zether) = &tx.tx {
                        for nonce in zether.nonces() {
                            self.included_zether_nonces.insert(nonce.to_vec());
                        }
                    }
                    if let Some(overlay) = self.overlay.take() {
                        if let Err(e) = overlay.commit() {
                            warn!(hash = %tx.hash, error = %e, "failed committing mempool overlay");
                        }
                    }
                    self.included_txs.push(tx.clone());
                    self.publish_inclusion();
                } else {
                    debug!(hash = %tx.hash, "tx exceeds remaining block size, leaving in pool");
                    if let Some(overlay) = self.overlay.take() {
                        overlay.rollback();
                    }
                }

                if newly_added {
                    self.tx_map.insert(tx.hash.clone(), tx.clone());
                    self.tx_list.push(tx);
                }
            }
        }
    }

    /// Runs the worker until `cancel` fires. This is the entry point
    /// spawned as a `tokio::task`.
    pub(crate) async fn run(mut self, mut channels: Channels, cancel: CancellationToken) {
        loop {
            if self.work.is_none() || self.suspended {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("mempool worker shutting down");
                        return;
                    }
                    Some(new_work) = channels.new_work.recv() => self.reset_for_new_work(new_work),
                    Some(()) = channels.suspend.recv() => self.suspended = true,
                    Some(kind) = channels.continue_processing.recv() => self.apply_continue(kind),
                    Some(req) = channels.remove_txs.recv() => self.remove_txs(req),
                    Some(req) = channels.insert_txs.recv() => self.insert_txs(req),
                    Some(req) = channels.add_tx.recv() => self.handle_add_tx_idle(req),
                }
                continue;
            }

            if let Ok(new_work) = channels.new_work.try_recv() {
                self.reset_for_new_work(new_work);
                continue;
            }
            if channels.suspend.try_recv().is_ok() {
                self.suspended = true;
                continue;
            }
            if let Ok(req) = channels.remove_txs.try_recv() {
                self.remove_txs(req);
                continue;
            }
            if let Ok(req) = channels.insert_txs.try_recv() {
                self.insert_txs(req);
                continue;
            }

            if self.cursor == self.tx_list.len() {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    Some(new_work) = channels.new_work.recv() => { self.reset_for_new_work(new_work); continue; }
                    Some(()) = channels.suspend.recv() => { self.suspended = true; continue; }
                    Some(req) = channels.add_tx.recv() => {
                        if self.tx_map.contains_key(&req.record.hash) {
                            if let Some(reply) = req.reply {
                                let _ = reply.send(Err("already found".into()));
                            }
                            continue;
                        }
                        let record = req.record.clone();
                        self.process_one(record, true);
                        if let Some(reply) = req.reply {
                            let _ = reply.send(Ok(()));
                        }
                        continue;
                    }
                }
            } else {
                let tx = self.tx_list[self.cursor].clone();
                self.cursor += 1;
                self.process_one(tx, false);
            }
        }
    }

    fn handle_add_tx_idle(&mut self, req: AddTxRequest) {
        if self.tx_map.contains_key(&req.record.hash) {
            if let Some(reply) = req.reply {
                let _ = reply.send(Err("already found".into()));
            }
            return;
        }
        self.tx_map.insert(req.record.hash.clone(), req.record.clone());
        self.tx_list.push(req.record);
        if let Some(reply) = req.reply {
            let _ = reply.send(Ok(()));
        }
    }
}

/// Spawns the worker as a background task, returning the handles used to
/// drive it and the shared result handle the forger reads from.
pub fn spawn(store: StoreHandle, cancel: CancellationToken) -> (WorkerHandles, ResultHandle) {
    let result_handle = ResultHandle::new();
    let worker = MempoolWorker::new(store, result_handle.clone());
    let (handles, channels) = worker_channels(128);
    tokio::spawn(worker.run(channels, cancel));
    (handles, result_handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::simple::{DataVersion, ScriptType, SimpleExtra, TransactionSimple, Vin};
    use std::time::Duration;

    /// `fee` only sets the record's fee-density priority; the wrapped tx's
    /// own fee is left at 0 so a fresh account (no delegated stake yet)
    /// can still pass `include_transaction`.
    fn sample_record(fee: u64, size: u64, salt: u8) -> MempoolRecord {
        let tx = Transaction::Simple(TransactionSimple {
            script: ScriptType::UpdateDelegate,
            data_version: DataVersion::None,
            data: Vec::new(),
            nonce: 0,
            fee: 0,
            vin: Vin {
                public_key: [salt; 32],
                signature: Vec::new(),
            },
            extra: SimpleExtra::UpdateDelegate {
                stake_delta: 0,
                sign: true,
            },
        });
        MempoolRecord::new(tx, size, fee)
    }

    #[tokio::test]
    async fn new_work_then_add_tx_includes_it() {
        let store = StoreHandle::open_in_memory().unwrap();
        let cancel = CancellationToken::new();
        let (handles, result_handle) = spawn(store, cancel.clone());

        handles
            .new_work
            .send(NewWork {
                chain_hash: vec![1],
                chain_height: 10,
            })
            .await
            .unwrap();

        let (reply_tx, reply_rx) = oneshot::channel();
        handles
            .add_tx
            .send(AddTxRequest {
                record: sample_record(100, 10, 1),
                reply: Some(reply_tx),
            })
            .await
            .unwrap();

        reply_rx.await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let snapshot = result_handle.read();
        assert_eq!(snapshot.txs.len(), 1);
        assert_eq!(snapshot.total_size, 10);

        cancel.cancel();
    }

    #[tokio::test]
    async fn tip_change_resets_included_list() {
        let store = StoreHandle::open_in_memory().unwrap();
        let cancel = CancellationToken::new();
        let (handles, result_handle) = spawn(store, cancel.clone());

        handles
            .new_work
            .send(NewWork {
                chain_hash: vec![1],
                chain_height: 1,
            })
            .await
            .unwrap();

        let (reply_tx, reply_rx) = oneshot::channel();
        handles
            .add_tx
            .send(AddTxRequest {
                record: sample_record(10, 10, 5),
                reply: Some(reply_tx),
            })
            .await
            .unwrap();
        reply_rx.await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(result_handle.read().txs.len(), 1);

        handles
            .new_work
            .send(NewWork {
                chain_hash: vec![2],
                chain_height: 2,
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(result_handle.read().total_size, 0);
        cancel.cancel();
    }
}
