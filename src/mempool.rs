//! Pending-transaction pool

use crate::error::{ChainError, Result};
use crate::transaction::Transaction;
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::debug;

/// Transactions admitted but not yet embedded in a mined block.
///
/// Admission order is preserved so mining snapshots are deterministic, and a
/// companion key set detects duplicates. All access is serialized behind an
/// internal lock; producers submit concurrently while the miner snapshots.
///
/// Admission performs structural checks only. Balance enforcement is
/// deferred to replay validation, so conflicting spends of the same funds
/// coexist here until one of them is mined.
#[derive(Default)]
pub struct Mempool {
    inner: Mutex<PoolInner>,
}

#[derive(Default)]
struct PoolInner {
    order: Vec<Transaction>,
    seen: HashSet<String>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a transaction. Rejects structural failures (empty or malformed
    /// identifiers, negative amount), the reserved system sender — reward
    /// synthesis is the miner's privilege — and duplicates of an already
    /// pooled transaction.
    pub fn add(&self, tx: Transaction) -> Result<()> {
        tx.validate_structure()?;
        if tx.is_reward() {
            return Err(ChainError::StructuralValidation(
                "sender is the reserved system identifier".to_string(),
            ));
        }

        let key = tx.hash();
        let mut inner = self.inner.lock();
        if !inner.seen.insert(key.clone()) {
            return Err(ChainError::DuplicateTransaction(key));
        }
        inner.order.push(tx);
        Ok(())
    }

    /// Admission-ordered copy of the pool, atomic with respect to
    /// concurrent admissions.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.inner.lock().order.clone()
    }

    /// Purge transactions that were embedded in a committed block.
    pub fn remove_included(&self, included: &[Transaction]) {
        let keys: HashSet<String> = included.iter().map(Transaction::hash).collect();
        let mut inner = self.inner.lock();
        inner.order.retain(|tx| !keys.contains(&tx.hash()));
        inner.seen.retain(|key| !keys.contains(key));
    }

    /// Re-admit transactions from blocks discarded by a chain replacement.
    /// System-issued rewards stay dropped, as do duplicates and anything no
    /// longer structurally valid. Returns how many were re-admitted.
    pub fn reconcile(&self, dropped: Vec<Transaction>) -> usize {
        let mut readmitted = 0;
        for tx in dropped {
            if tx.is_reward() {
                continue;
            }
            match self.add(tx) {
                Ok(()) => readmitted += 1,
                Err(reason) => debug!(%reason, "dropped transaction not re-admitted"),
            }
        }
        readmitted
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().order.is_empty()
    }
}
