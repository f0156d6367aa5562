//! Error types for Emberchain

use thiserror::Error;

/// Classified failure reasons surfaced by the ledger and consensus engine.
///
/// Candidate-chain failures carry the index of the first offending block so
/// callers can report exactly where a peer chain went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("invalid transaction: {0}")]
    StructuralValidation(String),

    #[error("duplicate transaction {0}")]
    DuplicateTransaction(String),

    #[error("hash mismatch at block {index}: recomputed {computed}, stored {stored}")]
    HashMismatch {
        index: u64,
        computed: String,
        stored: String,
    },

    #[error("broken linkage at block {index}: previous_hash does not match predecessor")]
    Linkage { index: u64 },

    #[error("difficulty target not met at block {index}")]
    DifficultyNotMet { index: u64 },

    #[error("transaction at block {index} would drive balance of {address} negative")]
    NegativeBalance { index: u64, address: String },

    #[error("genesis block does not match the expected genesis for these parameters")]
    GenesisMismatch,

    #[error("chain is empty")]
    EmptyChain,

    #[error("candidate chain is not longer than the local chain ({candidate} <= {local})")]
    CandidateNotLonger { candidate: usize, local: usize },

    #[error("mined block is stale: tip moved during the nonce search")]
    StaleTip,

    #[error("mining cancelled")]
    MiningCancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("persistence format error: {0}")]
    PersistenceFormat(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
