use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A single record in the ledger: an opaque payload sealed by proof-of-work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub timestamp: i64, // Unix timestamp (UTC, seconds)
    pub hash: String,   // Hex SHA-256, the block's identity
    pub prev_hash: String,
    pub difficulty: i32, // Leading "0" hex digits required when mined
    pub nonce: i64,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl Block {
    /// Create the genesis block (first block in the chain).
    ///
    /// The hash is taken over an all-default block, so every ledger shares the
    /// same genesis hash no matter when it was created. Only the recorded
    /// `timestamp` reflects the wall clock.
    pub fn genesis() -> Self {
        Self {
            timestamp: Utc::now().timestamp(),
            hash: Block::default().compute_hash(),
            ..Block::default()
        }
    }

    /// Build an unmined successor of `prev` carrying `data`.
    /// `nonce` and `hash` are left for the miner.
    pub fn candidate(prev: &Block, data: Vec<u8>, difficulty: i32) -> Self {
        Self {
            height: prev.height + 1,
            timestamp: Utc::now().timestamp(),
            hash: String::new(),
            prev_hash: prev.hash.clone(),
            difficulty,
            nonce: 0,
            data,
        }
    }

    /// Hex SHA-256 over `height ‖ timestamp ‖ prev_hash ‖ nonce ‖ data`,
    /// integers big-endian. `hash` and `difficulty` are not covered.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.height.to_be_bytes());
        hasher.update(self.timestamp.to_be_bytes());
        hasher.update(self.prev_hash.as_bytes());
        hasher.update(self.nonce.to_be_bytes());
        hasher.update(&self.data);
        hex::encode(hasher.finalize())
    }

    /// True when the stored hash carries `difficulty` leading zeros.
    pub fn meets_difficulty(&self, difficulty: i32) -> bool {
        has_zero_prefix(&self.hash, difficulty)
    }
}

pub(crate) fn has_zero_prefix(hash: &str, difficulty: i32) -> bool {
    let n = difficulty.max(0) as usize;
    hash.len() >= n && hash.bytes().take(n).all(|c| c == b'0')
}

/// Payload bytes travel as hex in JSON.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
