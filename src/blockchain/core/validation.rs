use crate::config::ChainConfig;
use crate::error::{ChainError, Result};

use super::chain::{genesis_block, meets_difficulty, Block};
use super::state::BalanceSheet;

/// Structural, cryptographic and economic validation of a whole chain.
///
/// The genesis block is accepted only by exact equality with the expected
/// deterministic genesis for the active parameters. Later blocks are checked
/// in index order — linkage, hash integrity, difficulty — so the first
/// offending block is the one reported, then a single forward replay
/// enforces that no balance ever goes negative. Returns the replayed
/// balance sheet so callers adopting the chain need not replay twice.
pub fn validate_chain(blocks: &[Block], config: &ChainConfig) -> Result<BalanceSheet> {
    let genesis = blocks.first().ok_or(ChainError::EmptyChain)?;
    if *genesis != genesis_block(config) {
        return Err(ChainError::GenesisMismatch);
    }

    for window in blocks.windows(2) {
        let (prev, block) = (&window[0], &window[1]);

        if block.index != prev.index + 1 || block.previous_hash != prev.hash {
            return Err(ChainError::Linkage { index: block.index });
        }

        let computed = block.compute_hash();
        if computed != block.hash {
            return Err(ChainError::HashMismatch {
                index: block.index,
                computed,
                stored: block.hash.clone(),
            });
        }

        // The recorded target must be the one in force for these parameters;
        // a block claiming a trivial target would otherwise satisfy it.
        if block.difficulty != config.difficulty
            || !meets_difficulty(&block.hash, block.difficulty)
        {
            return Err(ChainError::DifficultyNotMet { index: block.index });
        }
    }

    BalanceSheet::replay_checked(blocks)
}
