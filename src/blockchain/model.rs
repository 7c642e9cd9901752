use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};

use super::{
    Block, DEFAULT_DIFFICULTY, DEFAULT_MAX_RETRIES, DifficultyPolicy, Miner, validate,
    validate_with_work,
};
use crate::error::{LedgerError, Result, StoreError};
use crate::store::Store;

/// Where the nonce search runs relative to the writer lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MiningMode {
    /// Mine while holding the writer lock; submissions queue behind each search.
    #[default]
    Exclusive,
    /// Mine a private candidate unlocked, then re-check the tip before appending.
    Optimistic,
}

#[derive(Debug, Clone)]
pub struct ChainOptions {
    pub difficulty: i32,
    pub policy: DifficultyPolicy,
    /// Also require the difficulty prefix when validating.
    pub strict_pow: bool,
    pub mode: MiningMode,
    pub max_retries: u32,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            policy: DifficultyPolicy::default(),
            strict_pow: false,
            mode: MiningMode::default(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

struct ChainState {
    blocks: Vec<Block>,
    difficulty: i32,
}

/// Append-only ledger backed by a [`Store`].
///
/// Memory is the source of truth for reads, the store for durability.
/// Every structural change goes through one writer lock; readers take a short
/// shared lock on the in-memory view and never see a half-applied append.
pub struct Blockchain {
    writer: Mutex<()>,
    state: RwLock<ChainState>,
    store: Arc<dyn Store>,
    policy: DifficultyPolicy,
    strict_pow: bool,
    mode: MiningMode,
    max_retries: u32,
}

impl Blockchain {
    pub fn new(store: Arc<dyn Store>, opts: ChainOptions) -> Self {
        Self {
            writer: Mutex::new(()),
            state: RwLock::new(ChainState {
                blocks: Vec::new(),
                difficulty: opts.difficulty,
            }),
            store,
            policy: opts.policy,
            strict_pow: opts.strict_pow,
            mode: opts.mode,
            max_retries: opts.max_retries,
        }
    }

    /// Read every persisted block, in height order, into memory.
    /// Stops at the first missing height; an empty store yields an empty ledger.
    ///
    /// Once the ledger holds more than genesis, the working difficulty resumes
    /// from the tip rather than from the configured value.
    pub fn load(&self) -> Result<usize> {
        let _w = self.writer.lock();
        let mut height = self.state.read().blocks.len() as u64;
        let mut loaded = 0;
        loop {
            let block = match self.store.get(height) {
                Ok(Some(block)) => block,
                Ok(None) => break,
                Err(e) => {
                    error!("CHAIN - load failed at height {height}: {e}");
                    return Err(e.into());
                }
            };
            if block.height != height {
                error!(
                    "CHAIN - record at key {height} claims height {}",
                    block.height
                );
                return Err(StoreError::KeyMismatch {
                    key: height,
                    found: block.height,
                }
                .into());
            }
            self.state.write().blocks.push(block);
            height += 1;
            loaded += 1;
        }

        let mut state = self.state.write();
        if let Some(resumed) = self.resume_difficulty(&state.blocks) {
            if resumed != state.difficulty {
                info!(
                    "CHAIN - resuming at difficulty {resumed} (configured {})",
                    state.difficulty
                );
            }
            state.difficulty = resumed;
        }
        info!("CHAIN - loaded {loaded} blocks from store");
        Ok(loaded)
    }

    /// Create, persist and append the genesis block. Refused once the ledger
    /// holds anything.
    pub fn generate_genesis(&self) -> Result<Block> {
        let _w = self.writer.lock();
        if !self.state.read().blocks.is_empty() {
            return Err(LedgerError::AlreadyInitialized);
        }
        let genesis = Block::genesis();
        self.append_locked(&genesis)?;
        info!("CHAIN - genesis created (hash={})", genesis.hash);
        Ok(genesis)
    }

    /// Persist `block` and publish it in memory. The block is taken as already
    /// validated. If the store refuses it, memory is left as it was.
    pub fn append(&self, block: Block) -> Result<()> {
        let _w = self.writer.lock();
        self.append_locked(&block)
    }

    /// Mine a successor of the tip carrying `payload`. The result is not
    /// appended; callers validate then append, or use [`Blockchain::submit`]
    /// to do all three atomically.
    pub fn extend(&self, payload: Vec<u8>) -> Result<Block> {
        let _w = self.writer.lock();
        self.extend_locked(payload, None)
    }

    /// Check `candidate` against the current tip.
    pub fn validate(&self, candidate: &Block) -> Result<()> {
        let state = self.state.read();
        let tip = state.blocks.last().ok_or(LedgerError::EmptyChain)?;
        self.check(candidate, tip)
    }

    /// Mine, validate and append `payload` using the configured [`MiningMode`].
    pub fn submit(&self, payload: Vec<u8>, cancel: Option<&AtomicBool>) -> Result<Block> {
        match self.mode {
            MiningMode::Exclusive => self.submit_exclusive(payload, cancel),
            MiningMode::Optimistic => self.submit_optimistic(payload, cancel),
        }
    }

    /// Extend, validate and append under one hold of the writer lock.
    pub fn submit_exclusive(&self, payload: Vec<u8>, cancel: Option<&AtomicBool>) -> Result<Block> {
        let _w = self.writer.lock();

        let result = self.extend_locked(payload, cancel).and_then(|block| {
            self.validate(&block)?;
            self.append_locked(&block)?;
            Ok(block)
        });

        if let Err(e) = &result {
            warn!("CHAIN - submission rejected: {e}");
        }
        result
    }

    /// Mine outside the writer lock, then append only if the tip is still the
    /// one mined against. Retries with a fresh candidate when it moved.
    pub fn submit_optimistic(&self, payload: Vec<u8>, cancel: Option<&AtomicBool>) -> Result<Block> {
        let attempts = self.max_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let (tip, difficulty) = {
                let state = self.state.read();
                let tip = state.blocks.last().ok_or(LedgerError::EmptyChain)?;
                (tip.clone(), state.difficulty)
            };

            let mut candidate = Block::candidate(&tip, payload.clone(), difficulty);
            Miner::search(&mut candidate, difficulty, cancel)?;

            let _w = self.writer.lock();
            let moved = self
                .state
                .read()
                .blocks
                .last()
                .is_none_or(|current| current.hash != tip.hash);
            if moved {
                debug!("CHAIN - tip moved while mining height {}, attempt {attempt}", candidate.height);
                continue;
            }

            self.validate(&candidate)?;
            self.append_locked(&candidate)?;
            return Ok(candidate);
        }
        warn!("CHAIN - optimistic submission gave up after {attempts} attempts");
        Err(LedgerError::TipMoved { attempts })
    }

    /* -------------------- Reads -------------------- */

    /// Snapshot of the blocks from height `start` up to the tip.
    pub fn blocks_from(&self, start: usize) -> Vec<Block> {
        let state = self.state.read();
        state.blocks.get(start..).map(<[Block]>::to_vec).unwrap_or_default()
    }

    pub fn block(&self, height: u64) -> Option<Block> {
        let index = usize::try_from(height).ok()?;
        self.state.read().blocks.get(index).cloned()
    }

    pub fn tip(&self) -> Option<Block> {
        self.state.read().blocks.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().blocks.is_empty()
    }

    pub fn difficulty(&self) -> i32 {
        self.state.read().difficulty
    }

    pub fn policy(&self) -> &DifficultyPolicy {
        &self.policy
    }

    pub fn mode(&self) -> MiningMode {
        self.mode
    }

    /// Seconds between the tip and its predecessor.
    pub fn last_interval_secs(&self) -> Option<i64> {
        let state = self.state.read();
        match state.blocks.as_slice() {
            [.., older, newer] => Some(newer.timestamp.saturating_sub(older.timestamp)),
            _ => None,
        }
    }

    /// Re-check the whole in-memory ledger: canonical genesis, then every
    /// link under the configured validation rule.
    pub fn is_valid_chain(&self) -> bool {
        let state = self.state.read();
        let Some(genesis) = state.blocks.first() else {
            return false;
        };
        if genesis.height != 0
            || !genesis.prev_hash.is_empty()
            || genesis.hash != Block::default().compute_hash()
        {
            return false;
        }
        state
            .blocks
            .windows(2)
            .all(|pair| self.check(&pair[1], &pair[0]).is_ok())
    }

    /// Release the store.
    pub fn close(&self) -> Result<()> {
        self.store.close()?;
        Ok(())
    }

    /* -------------------- Writer-side helpers -------------------- */
    // Callers hold `writer`.

    fn extend_locked(&self, payload: Vec<u8>, cancel: Option<&AtomicBool>) -> Result<Block> {
        let (mut candidate, difficulty) = {
            let state = self.state.read();
            let tip = state.blocks.last().ok_or(LedgerError::EmptyChain)?;
            (Block::candidate(tip, payload, state.difficulty), state.difficulty)
        };

        Miner::search(&mut candidate, difficulty, cancel)?;
        Ok(candidate)
    }

    /// Persist, then publish. Committing a block at a trigger height runs the
    /// difficulty check over the ledger it extends, so the step is taken once
    /// per accepted boundary block and never for a discarded candidate.
    fn append_locked(&self, block: &Block) -> Result<()> {
        if let Err(e) = self.store.add(block.height, block) {
            error!("CHAIN - failed to persist block #{}: {e}", block.height);
            return Err(e.into());
        }
        let mut state = self.state.write();
        if self.policy.is_due(block.height) {
            state.difficulty = self.policy.adjust(state.difficulty, &state.blocks);
        }
        state.blocks.push(block.clone());
        info!(
            "CHAIN - appended block #{} (hash={}, nonce={})",
            block.height, block.hash, block.nonce
        );
        Ok(())
    }

    /// Difficulty in force after `blocks`, read back from the ledger itself.
    /// `None` while only genesis (or nothing) is present.
    fn resume_difficulty(&self, blocks: &[Block]) -> Option<i32> {
        let [earlier @ .., tip] = blocks else {
            return None;
        };
        if earlier.is_empty() {
            return None;
        }
        let difficulty = if self.policy.is_due(tip.height) {
            self.policy.adjust(tip.difficulty, earlier)
        } else {
            tip.difficulty
        };
        Some(difficulty)
    }

    fn check(&self, candidate: &Block, prev: &Block) -> Result<()> {
        if self.strict_pow {
            validate_with_work(candidate, prev)?;
        } else {
            validate(candidate, prev)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::codec;
    use crate::error::{StoreError, ValidationFailure};
    use crate::store::MemoryStore;

    fn options(difficulty: i32) -> ChainOptions {
        ChainOptions {
            difficulty,
            ..ChainOptions::default()
        }
    }

    fn chain_with_genesis(difficulty: i32) -> (Arc<MemoryStore>, Blockchain) {
        let store = Arc::new(MemoryStore::new());
        let bc = Blockchain::new(store.clone(), options(difficulty));
        bc.generate_genesis().unwrap();
        (store, bc)
    }

    /// Store that accepts nothing.
    struct FailingStore;

    impl Store for FailingStore {
        fn get(&self, _: u64) -> std::result::Result<Option<Block>, StoreError> {
            Err(StoreError::Backend("disk on fire".into()))
        }
        fn add(&self, _: u64, _: &Block) -> std::result::Result<(), StoreError> {
            Err(StoreError::Backend("disk on fire".into()))
        }
        fn get_batch(&self, _: u64, _: usize) -> std::result::Result<Vec<Block>, StoreError> {
            Err(StoreError::Backend("disk on fire".into()))
        }
        fn exist(&self, _: u64) -> std::result::Result<bool, StoreError> {
            Err(StoreError::Backend("disk on fire".into()))
        }
        fn close(&self) -> std::result::Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn empty_store_loads_empty_ledger() {
        let bc = Blockchain::new(Arc::new(MemoryStore::new()), options(0));
        assert_eq!(bc.load().unwrap(), 0);
        assert!(bc.is_empty());
        assert!(bc.tip().is_none());
    }

    #[test]
    fn genesis_once() {
        let (store, bc) = chain_with_genesis(0);
        assert_eq!(bc.len(), 1);
        let g = bc.tip().unwrap();
        assert_eq!(g.height, 0);
        assert_eq!(g.hash, Block::default().compute_hash());
        assert!(store.exist(0).unwrap());
        assert!(matches!(
            bc.generate_genesis(),
            Err(LedgerError::AlreadyInitialized)
        ));
        assert_eq!(bc.len(), 1);
    }

    #[test]
    fn extend_validate_append() {
        let (store, bc) = chain_with_genesis(0);
        let b = bc.extend(b"hello".to_vec()).unwrap();
        assert_eq!(b.nonce, 0);
        assert_eq!(b.height, 1);
        assert_eq!(bc.len(), 1, "extend must not append");
        bc.validate(&b).unwrap();
        bc.append(b.clone()).unwrap();
        assert_eq!(bc.tip(), Some(b.clone()));
        assert_eq!(store.get(1).unwrap(), Some(b));
    }

    #[test]
    fn extend_on_empty_ledger_fails() {
        let bc = Blockchain::new(Arc::new(MemoryStore::new()), options(0));
        assert!(matches!(bc.extend(vec![1]), Err(LedgerError::EmptyChain)));
        assert!(matches!(bc.submit(vec![1], None), Err(LedgerError::EmptyChain)));
    }

    #[test]
    fn submitted_blocks_form_a_chain() {
        let (_, bc) = chain_with_genesis(1);
        for i in 0..5u8 {
            let b = bc.submit(vec![i], None).unwrap();
            assert!(b.hash.starts_with('0'));
            assert_eq!(b.difficulty, 1);
        }
        let blocks = bc.blocks_from(0);
        assert_eq!(blocks.len(), 6);
        for pair in blocks.windows(2) {
            assert_eq!(pair[1].prev_hash, pair[0].hash);
            assert_eq!(pair[1].height, pair[0].height + 1);
        }
        assert!(bc.is_valid_chain());
    }

    #[test]
    fn reload_restores_memory_view() {
        let (store, bc) = chain_with_genesis(0);
        bc.submit(b"a".to_vec(), None).unwrap();
        bc.submit(b"b".to_vec(), None).unwrap();

        let reloaded = Blockchain::new(store, options(0));
        assert_eq!(reloaded.load().unwrap(), 3);
        assert_eq!(reloaded.blocks_from(0), bc.blocks_from(0));
        assert!(reloaded.is_valid_chain());
    }

    #[test]
    fn load_stops_on_corrupt_record() {
        let (store, bc) = chain_with_genesis(0);
        bc.submit(b"a".to_vec(), None).unwrap();
        store.put_raw(2, vec![0xFF; 5]).unwrap();

        let reloaded = Blockchain::new(store, options(0));
        assert!(matches!(
            reloaded.load(),
            Err(LedgerError::Store(StoreError::Decode(_)))
        ));
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn load_surfaces_backend_errors() {
        let bc = Blockchain::new(Arc::new(FailingStore), options(0));
        assert!(matches!(
            bc.load(),
            Err(LedgerError::Store(StoreError::Backend(_)))
        ));
    }

    #[test]
    fn failed_persist_leaves_memory_untouched() {
        let bc = Blockchain::new(Arc::new(FailingStore), options(0));
        assert!(bc.generate_genesis().is_err());
        assert!(bc.is_empty());
        assert!(bc.append(Block::genesis()).is_err());
        assert!(bc.is_empty());
    }

    #[test]
    fn tampered_candidate_is_refused() {
        let (_, bc) = chain_with_genesis(0);
        let mut b = bc.extend(b"hello".to_vec()).unwrap();
        b.data = b"jello".to_vec();
        assert!(matches!(
            bc.validate(&b),
            Err(LedgerError::Validation(ValidationFailure::HashMismatch { .. }))
        ));
    }

    #[test]
    fn strict_mode_demands_work() {
        let store = Arc::new(MemoryStore::new());
        let bc = Blockchain::new(
            store,
            ChainOptions {
                difficulty: 0,
                strict_pow: true,
                ..ChainOptions::default()
            },
        );
        bc.generate_genesis().unwrap();
        let mut b = bc.extend(b"x".to_vec()).unwrap();
        b.difficulty = 8;
        b.hash = b.compute_hash();
        assert!(matches!(
            bc.validate(&b),
            Err(LedgerError::Validation(ValidationFailure::InsufficientWork { .. }))
        ));
    }

    #[test]
    fn cancelled_submission_changes_nothing() {
        let (store, bc) = chain_with_genesis(64);
        let flag = AtomicBool::new(true);
        assert!(matches!(
            bc.submit_exclusive(b"never".to_vec(), Some(&flag)),
            Err(LedgerError::Cancelled)
        ));
        assert!(matches!(
            bc.submit_optimistic(b"never".to_vec(), Some(&flag)),
            Err(LedgerError::Cancelled)
        ));
        assert_eq!(bc.len(), 1);
        assert!(!store.exist(1).unwrap());
        assert_eq!(bc.difficulty(), 64);
    }

    #[test]
    fn difficulty_steps_at_interval() {
        let store = Arc::new(MemoryStore::new());
        let bc = Blockchain::new(
            store,
            ChainOptions {
                difficulty: 0,
                policy: DifficultyPolicy {
                    interval: 2,
                    fast_below_secs: 100.0,
                    slow_above_secs: 1_000.0,
                    ..DifficultyPolicy::default()
                },
                ..ChainOptions::default()
            },
        );
        bc.generate_genesis().unwrap();
        bc.submit(vec![1], None).unwrap();
        assert_eq!(bc.difficulty(), 0);
        bc.submit(vec![2], None).unwrap();
        assert_eq!(bc.difficulty(), 1);
        let b3 = bc.submit(vec![3], None).unwrap();
        assert_eq!(b3.difficulty, 1);
        assert!(b3.hash.starts_with('0'));
    }

    #[test]
    fn optimistic_mode_appends() {
        let store = Arc::new(MemoryStore::new());
        let bc = Blockchain::new(
            store,
            ChainOptions {
                difficulty: 1,
                mode: MiningMode::Optimistic,
                ..ChainOptions::default()
            },
        );
        bc.generate_genesis().unwrap();
        let b = bc.submit(b"opt".to_vec(), None).unwrap();
        assert_eq!(b.height, 1);
        assert_eq!(bc.tip(), Some(b));
        assert!(bc.is_valid_chain());
    }

    #[test]
    fn concurrent_submissions_never_fork() {
        for mode in [MiningMode::Exclusive, MiningMode::Optimistic] {
            let store = Arc::new(MemoryStore::new());
            let bc = Arc::new(Blockchain::new(
                store,
                ChainOptions {
                    difficulty: 1,
                    mode,
                    max_retries: 1_000,
                    ..ChainOptions::default()
                },
            ));
            bc.generate_genesis().unwrap();

            let handles: Vec<_> = (0..4u8)
                .map(|t| {
                    let bc = Arc::clone(&bc);
                    std::thread::spawn(move || {
                        for i in 0..5u8 {
                            bc.submit(vec![t, i], None).unwrap();
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }

            assert_eq!(bc.len(), 21, "{mode:?}");
            assert!(bc.is_valid_chain(), "{mode:?}");
        }
    }

    fn stepping_options() -> ChainOptions {
        ChainOptions {
            difficulty: 0,
            policy: DifficultyPolicy {
                interval: 2,
                fast_below_secs: 100.0,
                slow_above_secs: 1_000.0,
                ..DifficultyPolicy::default()
            },
            ..ChainOptions::default()
        }
    }

    #[test]
    fn extend_without_append_leaves_difficulty_alone() {
        let bc = Blockchain::new(Arc::new(MemoryStore::new()), stepping_options());
        bc.generate_genesis().unwrap();
        bc.submit(vec![1], None).unwrap();

        for _ in 0..3 {
            let b = bc.extend(vec![2]).unwrap();
            assert_eq!(b.height, 2);
        }
        assert_eq!(bc.len(), 2);
        assert_eq!(bc.difficulty(), 0);

        let b = bc.extend(vec![2]).unwrap();
        bc.validate(&b).unwrap();
        bc.append(b).unwrap();
        assert_eq!(bc.difficulty(), 1);
    }

    #[test]
    fn reload_resumes_adjusted_difficulty() {
        let store = Arc::new(MemoryStore::new());
        let bc = Blockchain::new(store.clone(), stepping_options());
        bc.generate_genesis().unwrap();
        bc.submit(vec![1], None).unwrap();
        bc.submit(vec![2], None).unwrap();
        assert_eq!(bc.difficulty(), 1);

        // tip sits on the boundary: the step is recomputed from the ledger
        let reloaded = Blockchain::new(store.clone(), stepping_options());
        reloaded.load().unwrap();
        assert_eq!(reloaded.difficulty(), 1);

        // tip past the boundary: its recorded difficulty carries over
        bc.submit(vec![3], None).unwrap();
        let reloaded = Blockchain::new(store, stepping_options());
        reloaded.load().unwrap();
        assert_eq!(reloaded.difficulty(), 1);
    }

    #[test]
    fn genesis_only_ledger_keeps_configured_difficulty() {
        let (store, _) = chain_with_genesis(0);
        let reloaded = Blockchain::new(store, options(4));
        reloaded.load().unwrap();
        assert_eq!(reloaded.difficulty(), 4);
    }

    #[test]
    fn load_refuses_record_under_wrong_key() {
        let (store, _) = chain_with_genesis(0);
        let stray = Block {
            height: 7,
            ..Block::default()
        };
        store.put_raw(1, codec::encode(&stray)).unwrap();

        let reloaded = Blockchain::new(store, options(0));
        assert!(matches!(
            reloaded.load(),
            Err(LedgerError::Store(StoreError::KeyMismatch { key: 1, found: 7 }))
        ));
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn reads_past_tip_are_empty() {
        let (_, bc) = chain_with_genesis(0);
        assert!(bc.blocks_from(5).is_empty());
        assert_eq!(bc.blocks_from(1).len(), 0);
        assert!(bc.block(3).is_none());
        assert_eq!(bc.block(0).map(|b| b.height), Some(0));
        assert_eq!(bc.last_interval_secs(), None);
    }
}
