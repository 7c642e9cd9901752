//! RocksDB-backed ledger storage.
//!
//! A single default column family holds every record. Point lookups go
//! through a bloom filter (10 bits per key) so misses at the end of the
//! ledger rarely touch disk.

use std::path::Path;

use log::{debug, info};
use parking_lot::RwLock;
use rocksdb::{BlockBasedOptions, DB, Direction, IteratorMode, Options};

use super::{Store, height_key};
use crate::blockchain::{Block, codec};
use crate::error::StoreError;

/// Bloom filter density for point lookups.
const BLOOM_BITS_PER_KEY: f64 = 10.0;

pub struct RocksStore {
    db: RwLock<Option<DB>>,
}

impl RocksStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut table = BlockBasedOptions::default();
        table.set_bloom_filter(BLOOM_BITS_PER_KEY, false);

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_block_based_table_factory(&table);

        let db = DB::open(&opts, path.as_ref())?;
        info!("STORE - opened rocksdb at {}", path.as_ref().display());
        Ok(Self {
            db: RwLock::new(Some(db)),
        })
    }
}

impl Store for RocksStore {
    fn get(&self, height: u64) -> Result<Option<Block>, StoreError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        match db.get(height_key(height))? {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?.0)),
            None => Ok(None),
        }
    }

    fn add(&self, height: u64, block: &Block) -> Result<(), StoreError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        db.put(height_key(height), codec::encode(block))?;
        Ok(())
    }

    fn get_batch(&self, height: u64, count: usize) -> Result<Vec<Block>, StoreError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;

        let start = height_key(height);
        let mut blocks = Vec::with_capacity(count.min(1024));
        for item in db.iterator(IteratorMode::From(&start, Direction::Forward)) {
            if blocks.len() >= count {
                break;
            }
            let (_, value) = item?;
            blocks.push(codec::decode(&value)?.0);
        }
        Ok(blocks)
    }

    fn exist(&self, height: u64) -> Result<bool, StoreError> {
        let guard = self.db.read();
        let db = guard.as_ref().ok_or(StoreError::Closed)?;
        Ok(db.get_pinned(height_key(height))?.is_some())
    }

    fn close(&self) -> Result<(), StoreError> {
        if let Some(db) = self.db.write().take() {
            db.flush()?;
            debug!("STORE - rocksdb closed");
        }
        Ok(())
    }
}
