//! Error types for the ledger.

use thiserror::Error;

/// Failure to read a persisted block record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("record truncated: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },
    #[error("varint length prefix does not fit in 64 bits")]
    VarintOverflow,
    #[error("field `{field}` is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
    #[error("length prefix exceeds addressable memory")]
    LengthOverflow,
}

/// Persistence failure. A missing key is not an error: see [`crate::store::Store::get`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("corrupt record: {0}")]
    Decode(#[from] DecodeError),
    #[error("storage backend: {0}")]
    Backend(String),
    #[error("store is closed")]
    Closed,
    #[error("record stored at height {key} claims height {found}")]
    KeyMismatch { key: u64, found: u64 },
}

impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        StoreError::Backend(err.into_string())
    }
}

/// Why a candidate block was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("height mismatch: expected {expected}, got {actual}")]
    HeightMismatch { expected: u64, actual: u64 },
    #[error("previous hash mismatch: expected {expected}, got {actual}")]
    PrevHashMismatch { expected: String, actual: String },
    #[error("hash mismatch: recomputed {expected}, stored {actual}")]
    HashMismatch { expected: String, actual: String },
    #[error("hash {hash} does not carry {difficulty} leading zeros")]
    InsufficientWork { difficulty: i32, hash: String },
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid block: {0}")]
    Validation(#[from] ValidationFailure),
    #[error("mining cancelled")]
    Cancelled,
    #[error("ledger already has a genesis block")]
    AlreadyInitialized,
    #[error("ledger is empty")]
    EmptyChain,
    #[error("tip moved during mining, gave up after {attempts} attempts")]
    TipMoved { attempts: u32 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, LedgerError>;
