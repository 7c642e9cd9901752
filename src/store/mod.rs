//! Ordered persistence of blocks keyed by height.
//!
//! Keys are the 8-byte big-endian height so that byte order equals height
//! order; values are [`codec`](crate::blockchain::codec) records.

pub mod memory;
pub mod rocks;

use crate::blockchain::Block;
use crate::error::StoreError;

pub use memory::MemoryStore;
pub use rocks::RocksStore;

/// Storage backend for ledger records.
///
/// Implementations must be thread-safe (`Send + Sync`); the chain calls them
/// from request handlers and from its own write path.
pub trait Store: Send + Sync {
    /// Block stored at `height`, or `Ok(None)` when nothing is stored there.
    fn get(&self, height: u64) -> Result<Option<Block>, StoreError>;

    /// Store `block` under `height`, replacing any previous record.
    fn add(&self, height: u64, block: &Block) -> Result<(), StoreError>;

    /// Up to `count` blocks in ascending height order starting at `height`.
    fn get_batch(&self, height: u64, count: usize) -> Result<Vec<Block>, StoreError>;

    fn exist(&self, height: u64) -> Result<bool, StoreError>;

    /// Release the backend. Calling it again is a no-op.
    fn close(&self) -> Result<(), StoreError>;
}

/// Store key for `height`.
pub fn height_key(height: u64) -> [u8; 8] {
    height.to_be_bytes()
}
