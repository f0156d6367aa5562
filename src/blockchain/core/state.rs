//! Balance derivation by chain replay

use crate::error::{ChainError, Result};
use crate::transaction::{Transaction, SYSTEM_SENDER};
use std::collections::HashMap;

use super::chain::Block;

/// Per-address running totals derived from the chain. Never stored
/// independently of the blocks it was replayed from; the owning chain
/// rebuilds it on every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceSheet {
    balances: HashMap<String, i64>,
}

impl BalanceSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, address: &str) -> i64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Credit the recipient; debit the sender unless the value is
    /// system-issued. Rejects the transaction, leaving the sheet untouched,
    /// if the debit would drive the sender negative. `index` is the block
    /// the transaction is embedded in, carried into the reported reason.
    pub fn apply_checked(&mut self, tx: &Transaction, index: u64) -> Result<()> {
        if tx.sender != SYSTEM_SENDER {
            let next = self.balance_of(&tx.sender) - tx.amount;
            if next < 0 {
                return Err(ChainError::NegativeBalance {
                    index,
                    address: tx.sender.clone(),
                });
            }
            self.balances.insert(tx.sender.clone(), next);
        }

        *self.balances.entry(tx.recipient.clone()).or_insert(0) += tx.amount;
        Ok(())
    }

    /// Replay every transaction in index order, reporting the first
    /// underflowing transaction by block index and offending address.
    pub fn replay_checked(blocks: &[Block]) -> Result<Self> {
        let mut sheet = BalanceSheet::new();
        for block in blocks {
            for tx in &block.transactions {
                sheet.apply_checked(tx, block.index)?;
            }
        }
        Ok(sheet)
    }
}
