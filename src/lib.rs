//! Zether transaction prebuilder and mempool execution core.
//!
//! This crate covers the node's transaction-construction and
//! mempool-scanning layers: sampling anonymity rings, folding pending
//! transactions into balance snapshots, and running the single-threaded
//! mempool worker that feeds a block forger. Range-proof generation,
//! consensus, and networking live outside this crate's boundary.

pub mod account;
pub mod codec;
pub mod config;
pub mod emap;
pub mod error;
pub mod forger;
pub mod mempool;
pub mod overlay;
pub mod plain_account;
pub mod prebuilder;
pub mod pubkey_index;
pub mod registration;
pub mod ring;
pub mod store;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use error::PrebuildError;
pub use prebuilder::{prebuild, PrebuildRequest, Witness};
