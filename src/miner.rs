//! Proof-of-work nonce search

use crate::blockchain::{meets_difficulty, Block};
use crate::error::{ChainError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Nonces searched between cancellation checks. The search stays CPU-bound
/// and blocking in between; this is its cooperative checkpoint.
pub const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Cancellation signal for an in-flight nonce search. Clones share the same
/// flag, so the engine keeps one end while the miner polls the other.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Search for a nonce whose hash satisfies the block's recorded difficulty.
///
/// Unbounded and blocking: there is no guaranteed termination bound. The
/// token is polled every [`CANCEL_CHECK_INTERVAL`] nonces; a cancelled
/// search abandons the block and reports [`ChainError::MiningCancelled`].
pub fn mine_block(mut block: Block, cancel: &CancelToken) -> Result<Block> {
    loop {
        block.hash = block.compute_hash();
        if meets_difficulty(&block.hash, block.difficulty) {
            return Ok(block);
        }

        if block.nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(ChainError::MiningCancelled);
        }

        block.nonce = block.nonce.wrapping_add(1);
    }
}
