use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{Store, height_key};
use crate::blockchain::{Block, codec};
use crate::error::StoreError;

/// Ordered in-memory store for tests and ephemeral runs.
///
/// Records are held encoded, exactly as a disk engine would hold them, so the
/// codec is exercised on every read.
pub struct MemoryStore {
    map: RwLock<Option<BTreeMap<[u8; 8], Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(Some(BTreeMap::new())),
        }
    }

    /// Store raw bytes under `height`, bypassing the codec.
    pub fn put_raw(&self, height: u64, bytes: Vec<u8>) -> Result<(), StoreError> {
        let mut guard = self.map.write();
        let map = guard.as_mut().ok_or(StoreError::Closed)?;
        map.insert(height_key(height), bytes);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn get(&self, height: u64) -> Result<Option<Block>, StoreError> {
        let guard = self.map.read();
        let map = guard.as_ref().ok_or(StoreError::Closed)?;
        match map.get(&height_key(height)) {
            Some(bytes) => Ok(Some(codec::decode(bytes)?.0)),
            None => Ok(None),
        }
    }

    fn add(&self, height: u64, block: &Block) -> Result<(), StoreError> {
        self.put_raw(height, codec::encode(block))
    }

    fn get_batch(&self, height: u64, count: usize) -> Result<Vec<Block>, StoreError> {
        let guard = self.map.read();
        let map = guard.as_ref().ok_or(StoreError::Closed)?;
        map.range(height_key(height)..)
            .take(count)
            .map(|(_, bytes)| Ok(codec::decode(bytes)?.0))
            .collect()
    }

    fn exist(&self, height: u64) -> Result<bool, StoreError> {
        let guard = self.map.read();
        let map = guard.as_ref().ok_or(StoreError::Closed)?;
        Ok(map.contains_key(&height_key(height)))
    }

    fn close(&self) -> Result<(), StoreError> {
        self.map.write().take();
        Ok(())
    }
}
