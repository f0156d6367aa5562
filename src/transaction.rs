//! Transaction type and structural validation

use crate::error::{ChainError, Result};
use sha2::{Digest, Sha256};

/// Reserved sender identifier for system-issued value. Transactions carrying
/// it credit the recipient without debiting anyone; only the miner may
/// synthesize them.
pub const SYSTEM_SENDER: &str = "0x0";

/// Maximum encoded transaction size in bytes, bounding identifier length.
pub const MAX_TRANSACTION_SIZE: usize = 1024;

/// A value transfer between two account identifiers.
///
/// `amount` is signed so that a negative submission is representable and can
/// be rejected with a classified reason instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: i64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: i64) -> Self {
        Transaction {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// Miner reward: mints `amount` to the beneficiary with no debited sender.
    pub fn reward(beneficiary: impl Into<String>, amount: i64) -> Self {
        Transaction {
            sender: SYSTEM_SENDER.to_string(),
            recipient: beneficiary.into(),
            amount,
        }
    }

    pub fn is_reward(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }

    /// Hex SHA-256 over the length-prefixed fields. Length prefixes keep the
    /// encoding unambiguous: no two distinct field sets share a preimage.
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update((self.sender.len() as u64).to_le_bytes());
        hasher.update(self.sender.as_bytes());
        hasher.update((self.recipient.len() as u64).to_le_bytes());
        hasher.update(self.recipient.as_bytes());
        hasher.update(self.amount.to_le_bytes());
        hex::encode(hasher.finalize())
    }

    /// Structural checks applied once at the admission boundary; downstream
    /// code trusts the shape of admitted transactions.
    pub fn validate_structure(&self) -> Result<()> {
        validate_identifier("sender", &self.sender)?;
        validate_identifier("recipient", &self.recipient)?;

        if self.amount < 0 {
            return Err(ChainError::StructuralValidation(format!(
                "amount must be non-negative, got {}",
                self.amount
            )));
        }

        self.validate_size()
    }

    fn validate_size(&self) -> Result<()> {
        let serialized = bincode::serialize(self)
            .map_err(|e| ChainError::Encoding(format!("serialization failed: {e}")))?;

        if serialized.len() > MAX_TRANSACTION_SIZE {
            return Err(ChainError::StructuralValidation(format!(
                "transaction too large: {} bytes (max: {})",
                serialized.len(),
                MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }
}

fn validate_identifier(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ChainError::StructuralValidation(format!(
            "{field} identifier is empty"
        )));
    }

    if !value.chars().all(|c| c.is_ascii_graphic()) {
        return Err(ChainError::StructuralValidation(format!(
            "{field} identifier contains non-printable or non-ASCII characters"
        )));
    }

    Ok(())
}
