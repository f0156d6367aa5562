//! Chain document persistence
//!
//! The chain is stored as a self-describing JSON document: an ordered array
//! of block records with nested ordered transaction records. Field order
//! follows struct declaration order and never varies, so saving an
//! unchanged chain reproduces the previous document byte for byte.

use crate::blockchain::Block;
use crate::error::{ChainError, Result};
use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;

/// Encode the full ordered block sequence. Pure; byte-identical for equal
/// chains.
pub fn encode_chain(blocks: &[Block]) -> Result<String> {
    serde_json::to_string_pretty(blocks).map_err(|e| ChainError::Encoding(e.to_string()))
}

/// Decode a chain document. Malformed input is a format error; the decoded
/// blocks still need [`crate::blockchain::validate_chain`] before adoption.
pub fn decode_chain(document: &str) -> Result<Vec<Block>> {
    serde_json::from_str(document).map_err(|e| ChainError::PersistenceFormat(e.to_string()))
}

/// Abstraction over where the chain document lives. Invoked by the owning
/// process at its boundaries, never by the engine internally; a missing
/// source surfaces as an error and the fallback policy (typically a fresh
/// genesis chain) belongs to the caller.
pub trait ChainStore: Send + Sync {
    fn save_chain(&self, blocks: &[Block]) -> Result<()>;
    fn load_chain(&self) -> Result<Vec<Block>>;
}

/// File-backed store writing the JSON document to a configurable path.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ChainStore for JsonFileStore {
    fn save_chain(&self, blocks: &[Block]) -> Result<()> {
        let document = encode_chain(blocks)?;
        fs::write(&self.path, document)?;
        Ok(())
    }

    fn load_chain(&self) -> Result<Vec<Block>> {
        let document = fs::read_to_string(&self.path)?;
        decode_chain(&document)
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct InMemoryStore {
    document: Mutex<Option<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChainStore for InMemoryStore {
    fn save_chain(&self, blocks: &[Block]) -> Result<()> {
        let document = encode_chain(blocks)?;
        *self.document.lock() = Some(document);
        Ok(())
    }

    fn load_chain(&self) -> Result<Vec<Block>> {
        let document = self.document.lock();
        let document = document
            .as_ref()
            .ok_or_else(|| ChainError::Io("no chain document has been saved".to_string()))?;
        decode_chain(document)
    }
}
