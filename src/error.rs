//! Per-component error enums. Each variant carries the payload needed to
//! identify the failing entity, per the "user-visible reporting" contract.

use crate::codec::CodecError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid script")]
    InvalidScript,
    #[error("invalid data length")]
    InvalidDataLength,
    #[error("invalid version")]
    InvalidVersion,
    #[error("invalid ring configuration: {0}")]
    InvalidRingConfig(String),
    #[error("signature size mismatch: expected {expected}, got {got}")]
    SignatureSizeMismatch { expected: usize, got: usize },
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("plain account not found")]
    PlainAccountNotFound,
    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("no funds")]
    NoFunds,
    #[error("balance cannot go negative")]
    BalanceCannotGoNegative,
    #[error("no asset fee liquidity for this asset")]
    NoAssetFeeLiquidity,
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("private key missing")]
    PrivateKeyMissing,
    #[error("spend public key mismatch")]
    SpendPublicKeyMismatch,
    #[error("spend private key missing")]
    SpendPrivateKeyMissing,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("missing registration signature for public key {0}")]
    MissingRegistrationSignature(String),
    #[error("address already used in ring")]
    AddressAlreadyUsedInRing,
}

#[derive(Debug, Error)]
pub enum MempoolError {
    #[error("tx already in mempool")]
    TxAlreadyInMempool,
    #[error("tx already in chain")]
    TxAlreadyInChain,
    #[error("zether nonce conflict")]
    ZetherNonceConflict,
    #[error("tx exceeds block size")]
    TxExceedsBlockSize,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cancelled")]
    Cancelled,
}

/// Unified error surfaced by the prebuilder's single `Result` return type.
#[derive(Debug, Error)]
pub enum PrebuildError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("storage error: {0}")]
    Store(String),
}
