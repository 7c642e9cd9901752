use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};

use super::Block;
use super::block::has_zero_prefix;
use crate::error::{LedgerError, Result};

/// How many nonces are tried between checks of the cancel flag.
const CANCEL_CHECK_EVERY: i64 = 4096;

/// Proof-of-Work search over the nonce space.
pub struct Miner;

impl Miner {
    /// Find the first nonce, counting from 0, whose hash carries `difficulty`
    /// leading zeros, and seal `candidate` with it.
    ///
    /// Runs until success unless `cancel` is raised, in which case
    /// `LedgerError::Cancelled` is returned and nothing outside `candidate` is touched.
    pub fn search(candidate: &mut Block, difficulty: i32, cancel: Option<&AtomicBool>) -> Result<()> {
        candidate.nonce = 0;
        loop {
            let hash = candidate.compute_hash();
            if has_zero_prefix(&hash, difficulty) {
                debug!(
                    "MINER - height {} sealed after {} trials",
                    candidate.height,
                    candidate.nonce as u64 + 1
                );
                candidate.hash = hash;
                return Ok(());
            }
            candidate.nonce = candidate.nonce.wrapping_add(1);

            if candidate.nonce % CANCEL_CHECK_EVERY == 0
                && cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
            {
                debug!(
                    "MINER - height {} cancelled at nonce {}",
                    candidate.height, candidate.nonce
                );
                return Err(LedgerError::Cancelled);
            }
        }
    }
}

/// When and how the required prefix length moves.
///
/// Every `interval` blocks the average seconds-per-block over the last
/// `interval` blocks is compared with two thresholds: slower than
/// `slow_above_secs` lowers the difficulty by one, faster than
/// `fast_below_secs` raises it by one.
#[derive(Debug, Clone, PartialEq)]
pub struct DifficultyPolicy {
    pub interval: u64,
    pub slow_above_secs: f64,
    pub fast_below_secs: f64,
    pub min: i32,
    pub max: i32,
}

impl Default for DifficultyPolicy {
    fn default() -> Self {
        use super::{DEFAULT_ADJUST_INTERVAL, DIFF_MAX, DIFF_MIN};
        Self {
            interval: DEFAULT_ADJUST_INTERVAL,
            slow_above_secs: 2.0,
            fast_below_secs: 0.5,
            min: DIFF_MIN,
            max: DIFF_MAX,
        }
    }
}

impl DifficultyPolicy {
    /// Whether sealing a block at `height` triggers an adjustment check.
    pub fn is_due(&self, height: u64) -> bool {
        self.interval > 0 && height > 1 && height % self.interval == 0
    }

    /// Difficulty to use after observing `span_secs` over `intervals` blocks.
    pub fn next(&self, current: i32, span_secs: i64, intervals: u64) -> i32 {
        if intervals == 0 {
            return current;
        }
        let avg = span_secs as f64 / intervals as f64;
        let next = if avg > self.slow_above_secs {
            current - 1
        } else if avg < self.fast_below_secs {
            current + 1
        } else {
            current
        };
        let next = next.clamp(self.min, self.max);
        if next != current {
            info!("DIFFICULTY - avg {avg:.3}s/block over {intervals} blocks: {current} -> {next}");
        }
        next
    }

    /// Run the check against an in-memory ledger whose last element is the tip.
    /// The window reaches back `interval` heights, or to the first block when
    /// the ledger is shorter than that.
    pub fn adjust(&self, current: i32, blocks: &[Block]) -> i32 {
        let Some(tip) = blocks.last() else {
            return current;
        };
        let last = blocks.len() - 1;
        let first = last.saturating_sub(self.interval as usize);
        let span = tip.timestamp.saturating_sub(blocks[first].timestamp);
        self.next(current, span, (last - first) as u64)
    }
}
