pub mod block;
pub mod codec;
pub mod miner;
pub mod model;
pub mod validation;

pub use block::Block;
pub use miner::{DifficultyPolicy, Miner};
pub use model::{Blockchain, ChainOptions, MiningMode};
pub use validation::{validate, validate_with_work};

/// Default Proof-of-Work difficulty (number of leading zeros).
pub const DEFAULT_DIFFICULTY: i32 = 5;

/// Blocks between difficulty checks, also the width of the averaging window.
pub const DEFAULT_ADJUST_INTERVAL: u64 = 3600;

/// Difficulty bounds; 64 hex digits is the whole SHA-256 digest.
pub const DIFF_MIN: i32 = 0;
pub const DIFF_MAX: i32 = 64;

/// Optimistic submissions retried this many times when the tip keeps moving.
pub const DEFAULT_MAX_RETRIES: u32 = 8;
