//! Engine facade owned by the node's session
//!
//! One [`Node`] owns the authoritative chain behind a reader-writer lock
//! and the pending pool, and exposes the operations the transport layer and
//! the API gateway call into. It never listens on a socket and never
//! touches persistence; the owning process drives both at its boundaries.

use crate::blockchain::{Block, Blockchain};
use crate::config::ChainConfig;
use crate::error::{ChainError, Result};
use crate::mempool::Mempool;
use crate::miner::{mine_block, CancelToken};
use crate::transaction::Transaction;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ChainSummary {
    pub length: usize,
    pub tip_hash: String,
}

pub struct Node {
    chain: Arc<RwLock<Blockchain>>,
    mempool: Arc<Mempool>,
    /// Token of the in-flight nonce search, replaced per attempt. Chain
    /// adoption fires it so a stale search stops burning CPU.
    mining_cancel: Mutex<CancelToken>,
}

impl Node {
    pub fn new(config: ChainConfig) -> Self {
        Self::with_chain(Blockchain::new(config))
    }

    /// Wrap an existing chain, e.g. one rebuilt from a persisted document.
    pub fn with_chain(chain: Blockchain) -> Self {
        Node {
            chain: Arc::new(RwLock::new(chain)),
            mempool: Arc::new(Mempool::new()),
            mining_cancel: Mutex::new(CancelToken::new()),
        }
    }

    /// Admit a transaction into the pending pool. The classified rejection
    /// reason is returned to the caller; nothing reaches the chain here.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<()> {
        self.mempool.add(tx)?;
        debug!(pending = self.mempool.len(), "transaction admitted");
        Ok(())
    }

    /// Pending-pool snapshot for peer relay.
    pub fn pending_snapshot(&self) -> Vec<Transaction> {
        self.mempool.snapshot()
    }

    /// Confirmed-chain balance; pending transactions are excluded.
    pub fn balance_of(&self, address: &str) -> i64 {
        self.chain.read().balance_of(address)
    }

    pub fn chain_summary(&self) -> ChainSummary {
        let chain = self.chain.read();
        ChainSummary {
            length: chain.len(),
            tip_hash: chain.tip_hash(),
        }
    }

    /// Full-chain snapshot served to peers for their own fork choice.
    pub fn get_chain(&self) -> Vec<Block> {
        self.chain.read().blocks().to_vec()
    }

    /// Mine one block for `miner_address` and commit it.
    ///
    /// Snapshots the pool plus a synthesized reward, searches for a nonce,
    /// and appends under the write lock only if the tip has not moved since
    /// the search began. A moved tip or a cancelled search restarts the
    /// attempt against the new tip instead of surfacing an error.
    pub fn mine(&self, miner_address: &str) -> Result<Block> {
        loop {
            let token = CancelToken::new();
            *self.mining_cancel.lock() = token.clone();

            let candidate = self.assemble_candidate(miner_address)?;

            match mine_block(candidate, &token).and_then(|block| self.commit_mined(block)) {
                Ok(block) => {
                    info!(index = block.index, hash = %block.hash, "mined block committed");
                    return Ok(block);
                }
                Err(ChainError::StaleTip) | Err(ChainError::MiningCancelled) => {
                    debug!("nonce search overtaken, restarting against new tip");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Commit a freshly mined block, but only if the tip it was mined
    /// against is still the tip.
    fn commit_mined(&self, block: Block) -> Result<Block> {
        let mut chain = self.chain.write();
        if chain.tip_hash() != block.previous_hash {
            return Err(ChainError::StaleTip);
        }

        chain.append(block.clone())?;
        drop(chain);

        self.mempool.remove_included(&block.transactions);
        Ok(block)
    }

    /// Build the next candidate block: reward first, then the pool snapshot
    /// in admission order. Snapshot entries that would overdraw their sender
    /// against the current chain state are left in the pool and skipped, so
    /// of two conflicting spends only the first still-covered one is mined.
    fn assemble_candidate(&self, miner_address: &str) -> Result<Block> {
        let chain = self.chain.read();

        let reward = Transaction::reward(miner_address, chain.config().mining_reward);
        reward.validate_structure()?;

        let next_index = chain.tip().index + 1;
        let mut sheet = chain.balance_sheet();
        sheet.apply_checked(&reward, next_index)?;

        let mut transactions = vec![reward];
        for tx in self.mempool.snapshot() {
            match sheet.apply_checked(&tx, next_index) {
                Ok(()) => transactions.push(tx),
                Err(reason) => debug!(%reason, "skipping uncovered transaction"),
            }
        }

        let mut block = Block::new(next_index, chain.tip_hash(), chain.config().difficulty, transactions);
        // Keep timestamps moving forward even on fast successive blocks.
        if block.timestamp <= chain.tip().timestamp {
            block.timestamp = chain.tip().timestamp + 1;
            block.hash = block.compute_hash();
        }
        Ok(block)
    }

    /// Fork choice for a peer-supplied candidate chain. On adoption the
    /// in-flight nonce search is cancelled and the pool is reconciled:
    /// transactions now embedded in the new chain are removed, transactions
    /// that lived only in the replaced suffix are re-admitted.
    pub fn adopt_if_better(&self, candidate: Vec<Block>) -> Result<()> {
        let embedded: Vec<Transaction> = candidate
            .iter()
            .flat_map(|b| b.transactions.clone())
            .collect();

        let dropped = {
            let mut chain = self.chain.write();
            match chain.adopt_if_better(candidate) {
                Ok(dropped) => dropped,
                Err(reason) => {
                    warn!(%reason, "candidate chain rejected");
                    return Err(reason);
                }
            }
        };

        self.mining_cancel.lock().cancel();

        self.mempool.remove_included(&embedded);
        let readmitted = self.mempool.reconcile(dropped);
        if readmitted > 0 {
            debug!(readmitted, "re-admitted transactions from replaced blocks");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_node() -> Node {
        Node::new(ChainConfig {
            difficulty: 1,
            mining_reward: 50,
        })
    }

    #[test]
    fn submit_and_snapshot() {
        let node = test_node();
        node.submit_transaction(Transaction::new("addr-A", "addr-B", 0))
            .unwrap();
        assert_eq!(node.pending_snapshot().len(), 1);
    }

    #[test]
    fn summary_reflects_genesis() {
        let node = test_node();
        let summary = node.chain_summary();
        assert_eq!(summary.length, 1);
        assert_eq!(summary.tip_hash, node.get_chain()[0].hash);
    }

    #[test]
    fn mined_block_links_to_tip_at_submission() {
        let node = test_node();
        let tip_before = node.chain_summary().tip_hash;

        let block = node.mine("addr-M").unwrap();
        assert_eq!(block.previous_hash, tip_before);
        assert_eq!(node.chain_summary().tip_hash, block.hash);
    }

    #[test]
    fn uncovered_transaction_is_skipped_not_mined() {
        let node = test_node();
        node.submit_transaction(Transaction::new("addr-poor", "addr-B", 10))
            .unwrap();

        let block = node.mine("addr-M").unwrap();
        assert_eq!(block.transactions.len(), 1);
        assert!(block.transactions[0].is_reward());
        // The uncovered transaction stays pooled; it may become valid later.
        assert_eq!(node.pending_snapshot().len(), 1);
    }

    #[test]
    fn conflicting_spends_mine_first_covered_only() {
        let node = test_node();
        node.mine("addr-A").unwrap();

        node.submit_transaction(Transaction::new("addr-A", "addr-B", 50))
            .unwrap();
        node.submit_transaction(Transaction::new("addr-A", "addr-C", 50))
            .unwrap();

        let block = node.mine("addr-M").unwrap();
        let recipients: Vec<&str> = block
            .transactions
            .iter()
            .filter(|tx| !tx.is_reward())
            .map(|tx| tx.recipient.as_str())
            .collect();
        assert_eq!(recipients, vec!["addr-B"]);
        assert_eq!(node.balance_of("addr-B"), 50);
        assert_eq!(node.balance_of("addr-C"), 0);
    }
}
