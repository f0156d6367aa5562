use crate::config::ChainConfig;
use crate::error::{ChainError, Result};
use crate::transaction::Transaction;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, info};

use super::state::BalanceSheet;
use super::validation::validate_chain;

/// Fixed timestamp baked into the genesis block so independently
/// bootstrapped nodes with identical parameters agree on its hash.
pub const GENESIS_TIMESTAMP: i64 = 1_700_000_000;

/// Length of a hex-encoded SHA-256 digest.
pub const HASH_LENGTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub hash: String,
    pub nonce: u64,
    /// Difficulty target in force when this block was mined.
    pub difficulty: u32,
}

impl Block {
    /// Candidate block at nonce 0, timestamped now. The stored hash is kept
    /// consistent with the fields; the miner recomputes it per nonce.
    pub fn new(
        index: u64,
        previous_hash: String,
        difficulty: u32,
        transactions: Vec<Transaction>,
    ) -> Self {
        let timestamp = chrono::Utc::now().timestamp();
        let mut block = Block {
            index,
            timestamp,
            transactions,
            previous_hash,
            hash: String::new(),
            nonce: 0,
            difficulty,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Hex SHA-256 over every field except the stored hash. Transactions
    /// enter through their fixed-length digests and a count prefix, the
    /// previous hash through a length prefix, so no two distinct field sets
    /// share a preimage.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update((self.transactions.len() as u64).to_le_bytes());
        for tx in &self.transactions {
            hasher.update(tx.hash().as_bytes());
        }
        hasher.update((self.previous_hash.len() as u64).to_le_bytes());
        hasher.update(self.previous_hash.as_bytes());
        hasher.update(self.nonce.to_le_bytes());
        hasher.update(self.difficulty.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Proof-of-work predicate: the hex hash opens with `difficulty` zeros.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let prefix = difficulty as usize;
    hash.len() >= prefix && hash.bytes().take(prefix).all(|b| b == b'0')
}

/// Deterministic genesis for a parameter set: fixed timestamp, empty
/// transaction list, all-zero parent reference, nonce 0. Not mined; the
/// validator accepts it by equality, never by the difficulty predicate.
pub fn genesis_block(config: &ChainConfig) -> Block {
    let mut block = Block {
        index: 0,
        timestamp: GENESIS_TIMESTAMP,
        transactions: Vec::new(),
        previous_hash: "0".repeat(HASH_LENGTH),
        hash: String::new(),
        nonce: 0,
        difficulty: config.difficulty,
    };
    block.hash = block.compute_hash();
    block
}

/// The canonical chain plus its derived balance cache. All mutation goes
/// through [`Blockchain::append`] and [`Blockchain::adopt_if_better`];
/// blocks are never edited in place.
pub struct Blockchain {
    blocks: Vec<Block>,
    config: ChainConfig,
    balances: BalanceSheet,
}

impl Blockchain {
    pub fn new(config: ChainConfig) -> Self {
        let genesis = genesis_block(&config);
        Blockchain {
            blocks: vec![genesis],
            config,
            balances: BalanceSheet::new(),
        }
    }

    /// Rebuild a chain from stored blocks, e.g. after loading a persisted
    /// document. The blocks are fully validated before being accepted.
    pub fn from_blocks(blocks: Vec<Block>, config: ChainConfig) -> Result<Self> {
        let balances = validate_chain(&blocks, &config)?;
        Ok(Blockchain {
            blocks,
            config,
            balances,
        })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn tip(&self) -> &Block {
        self.blocks
            .last()
            .expect("chain always contains the genesis block")
    }

    pub fn tip_hash(&self) -> String {
        self.tip().hash.clone()
    }

    /// Confirmed-chain balance; pending pool transactions are not reflected.
    pub fn balance_of(&self, address: &str) -> i64 {
        self.balances.balance_of(address)
    }

    /// Clone of the derived balance cache, used when assembling a mining
    /// candidate against the current state.
    pub fn balance_sheet(&self) -> BalanceSheet {
        self.balances.clone()
    }

    /// Append a freshly mined block. The block must link to the current tip,
    /// carry a hash consistent with its fields that satisfies the target in
    /// force, and keep every balance non-negative.
    pub fn append(&mut self, block: Block) -> Result<()> {
        let tip = self.tip();
        if block.index != tip.index + 1 || block.previous_hash != tip.hash {
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

        if block.difficulty != self.config.difficulty
            || !meets_difficulty(&block.hash, block.difficulty)
        {
            return Err(ChainError::DifficultyNotMet { index: block.index });
        }

        let mut next = self.balances.clone();
        for tx in &block.transactions {
            next.apply_checked(tx, block.index)?;
        }

        debug!(index = block.index, hash = %block.hash, "appending block");
        self.blocks.push(block);
        self.balances = next;
        Ok(())
    }

    /// Longest-chain fork choice: the candidate replaces the local chain iff
    /// it validates and is strictly longer. Equal length never replaces.
    /// Returns the transactions embedded only in the replaced suffix, for
    /// mempool reconciliation.
    pub fn adopt_if_better(&mut self, candidate: Vec<Block>) -> Result<Vec<Transaction>> {
        let balances = validate_chain(&candidate, &self.config)?;

        if candidate.len() <= self.blocks.len() {
            return Err(ChainError::CandidateNotLonger {
                candidate: candidate.len(),
                local: self.blocks.len(),
            });
        }

        let dropped = self.dropped_transactions(&candidate);
        info!(
            old_len = self.blocks.len(),
            new_len = candidate.len(),
            "adopting longer valid chain"
        );

        self.blocks = candidate;
        self.balances = balances;
        Ok(dropped)
    }

    /// Transactions of local blocks beyond the common prefix that the
    /// candidate does not carry anywhere.
    fn dropped_transactions(&self, candidate: &[Block]) -> Vec<Transaction> {
        let embedded: HashSet<String> = candidate
            .iter()
            .flat_map(|b| &b.transactions)
            .map(Transaction::hash)
            .collect();

        let fork_point = self
            .blocks
            .iter()
            .zip(candidate.iter())
            .take_while(|(local, other)| local.hash == other.hash)
            .count();

        self.blocks[fork_point..]
            .iter()
            .flat_map(|b| &b.transactions)
            .filter(|tx| !embedded.contains(&tx.hash()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::{mine_block, CancelToken};

    fn test_config() -> ChainConfig {
        ChainConfig {
            difficulty: 1,
            mining_reward: 50,
        }
    }

    fn mined_child(chain: &Blockchain, transactions: Vec<Transaction>) -> Block {
        let block = Block::new(
            chain.tip().index + 1,
            chain.tip_hash(),
            chain.config().difficulty,
            transactions,
        );
        mine_block(block, &CancelToken::new()).unwrap()
    }

    #[test]
    fn genesis_is_deterministic_for_identical_parameters() {
        let a = genesis_block(&test_config());
        let b = genesis_block(&test_config());
        assert_eq!(a, b);
        assert_eq!(a.hash, a.compute_hash());
    }

    #[test]
    fn genesis_differs_across_parameter_sets() {
        let a = genesis_block(&ChainConfig {
            difficulty: 2,
            mining_reward: 50,
        });
        let b = genesis_block(&ChainConfig {
            difficulty: 3,
            mining_reward: 50,
        });
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn hash_depends_on_every_field() {
        let base = Block::new(
            1,
            "0".repeat(HASH_LENGTH),
            2,
            vec![Transaction::reward("addr-A", 50)],
        );
        let reference = base.compute_hash();

        let mut changed = base.clone();
        changed.index = 2;
        assert_ne!(changed.compute_hash(), reference);

        let mut changed = base.clone();
        changed.timestamp += 1;
        assert_ne!(changed.compute_hash(), reference);

        let mut changed = base.clone();
        changed.transactions[0].amount = 51;
        assert_ne!(changed.compute_hash(), reference);

        let mut changed = base.clone();
        changed.previous_hash = "1".repeat(HASH_LENGTH);
        assert_ne!(changed.compute_hash(), reference);

        let mut changed = base.clone();
        changed.nonce = 7;
        assert_ne!(changed.compute_hash(), reference);

        let mut changed = base.clone();
        changed.difficulty = 3;
        assert_ne!(changed.compute_hash(), reference);

        // The stored hash is excluded from the preimage.
        let mut changed = base;
        changed.hash = "f".repeat(HASH_LENGTH);
        assert_eq!(changed.compute_hash(), reference);
    }

    #[test]
    fn difficulty_predicate_counts_leading_zeros() {
        assert!(meets_difficulty("00ab", 2));
        assert!(!meets_difficulty("0a0b", 2));
        assert!(meets_difficulty("anything", 0));
        assert!(!meets_difficulty("00", 3));
    }

    #[test]
    fn append_advances_tip_and_balances() {
        let mut chain = Blockchain::new(test_config());
        let block = mined_child(&chain, vec![Transaction::reward("addr-A", 50)]);

        chain.append(block.clone()).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.tip_hash(), block.hash);
        assert_eq!(chain.balance_of("addr-A"), 50);
    }

    #[test]
    fn append_rejects_broken_linkage() {
        let mut chain = Blockchain::new(test_config());
        let mut block = mined_child(&chain, vec![]);
        block.previous_hash = "9".repeat(HASH_LENGTH);

        assert_eq!(
            chain.append(block),
            Err(ChainError::Linkage { index: 1 })
        );
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn append_rejects_tampered_payload() {
        let mut chain = Blockchain::new(test_config());
        let mut block = mined_child(&chain, vec![Transaction::reward("addr-A", 50)]);
        block.transactions[0].amount = 5000;

        assert!(matches!(
            chain.append(block),
            Err(ChainError::HashMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn append_rejects_unmet_difficulty() {
        let mut chain = Blockchain::new(test_config());
        // Consistent hash, but nonce 0 was not searched for the target.
        let mut block = Block::new(1, chain.tip_hash(), 1, vec![]);
        while meets_difficulty(&block.hash, block.difficulty) {
            block.nonce += 1;
            block.hash = block.compute_hash();
        }

        assert_eq!(
            chain.append(block),
            Err(ChainError::DifficultyNotMet { index: 1 })
        );
    }

    #[test]
    fn append_rejects_overspending_block() {
        let mut chain = Blockchain::new(test_config());
        let block = mined_child(&chain, vec![Transaction::new("addr-A", "addr-B", 10)]);

        assert_eq!(
            chain.append(block),
            Err(ChainError::NegativeBalance {
                index: 1,
                address: "addr-A".to_string(),
            })
        );
        assert_eq!(chain.balance_of("addr-B"), 0);
    }

    #[test]
    fn shorter_or_equal_candidate_never_replaces() {
        let mut local = Blockchain::new(test_config());
        local
            .append(mined_child(&local, vec![Transaction::reward("addr-A", 50)]))
            .unwrap();

        let mut other = Blockchain::new(test_config());
        other
            .append(mined_child(&other, vec![Transaction::reward("addr-B", 50)]))
            .unwrap();

        let before = local.tip_hash();
        assert_eq!(
            local.adopt_if_better(other.blocks().to_vec()),
            Err(ChainError::CandidateNotLonger {
                candidate: 2,
                local: 2,
            })
        );
        assert_eq!(local.tip_hash(), before);
    }

    #[test]
    fn longer_valid_candidate_replaces_and_reports_dropped_transactions() {
        let mut local = Blockchain::new(test_config());
        let local_tx = Transaction::new("addr-A", "addr-B", 10);
        local
            .append(mined_child(&local, vec![Transaction::reward("addr-A", 50)]))
            .unwrap();
        local
            .append(mined_child(
                &local,
                vec![Transaction::reward("addr-A", 50), local_tx.clone()],
            ))
            .unwrap();

        let mut other = Blockchain::new(test_config());
        for _ in 0..3 {
            other
                .append(mined_child(&other, vec![Transaction::reward("addr-C", 50)]))
                .unwrap();
        }

        let candidate_tip = other.tip_hash();
        let dropped = local.adopt_if_better(other.blocks().to_vec()).unwrap();

        assert_eq!(local.len(), 4);
        assert_eq!(local.tip_hash(), candidate_tip);
        assert_eq!(local.balance_of("addr-C"), 150);
        assert_eq!(local.balance_of("addr-A"), 0);
        // Both dropped blocks' rewards and the transfer surface for
        // reconciliation; the mempool decides what is re-admissible.
        assert!(dropped.contains(&local_tx));
    }
}
