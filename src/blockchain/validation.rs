use super::Block;
use crate::error::ValidationFailure;

/// Check that `candidate` may follow `prev`: height continuity, hash-chain
/// linkage and hash integrity, in that order.
///
/// The proof-of-work prefix is not re-checked here; a block whose stored hash
/// matches its own recomputation passes even if its nonce was never searched.
/// Use [`validate_with_work`] for the hardened rule.
pub fn validate(candidate: &Block, prev: &Block) -> Result<(), ValidationFailure> {
    let expected_height = prev.height + 1;
    if candidate.height != expected_height {
        return Err(ValidationFailure::HeightMismatch {
            expected: expected_height,
            actual: candidate.height,
        });
    }

    if candidate.prev_hash != prev.hash {
        return Err(ValidationFailure::PrevHashMismatch {
            expected: prev.hash.clone(),
            actual: candidate.prev_hash.clone(),
        });
    }

    let recomputed = candidate.compute_hash();
    if candidate.hash != recomputed {
        return Err(ValidationFailure::HashMismatch {
            expected: recomputed,
            actual: candidate.hash.clone(),
        });
    }

    Ok(())
}

/// [`validate`] plus a check that the hash carries the difficulty recorded on
/// the block.
pub fn validate_with_work(candidate: &Block, prev: &Block) -> Result<(), ValidationFailure> {
    validate(candidate, prev)?;
    if !candidate.meets_difficulty(candidate.difficulty) {
        return Err(ValidationFailure::InsufficientWork {
            difficulty: candidate.difficulty,
            hash: candidate.hash.clone(),
        });
    }
    Ok(())
}
