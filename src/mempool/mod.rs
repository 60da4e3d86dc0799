//! Mempool: candidate-transaction bookkeeping and the scanning worker
//! that turns it into an inclusion list for the block forger.

pub mod record;
pub mod worker;

pub use record::MempoolRecord;
pub use worker::{spawn, AddTxRequest, InsertTxsRequest, MempoolWorker, NewWork, RemoveTxsRequest, WorkerHandles};
