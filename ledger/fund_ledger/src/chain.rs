//! # Chain
//!
//! Append-only sequence of hash-linked [`Block`]s.
//!
//! ## Hashing
//!
//! Each block's `hash` is the hex-encoded SHA-256 of the canonical JSON array
//!
//! ```text
//! [index, timestamp, payload, previous_hash]
//! ```
//!
//! where `timestamp` is RFC 3339 with nanosecond precision in UTC and
//! `payload` is a `serde_json` object. `serde_json`'s map keeps keys sorted,
//! and amounts inside payloads are decimal strings, so the digest is
//! reproducible in any process that reads the same block back.
//!
//! ## Genesis
//!
//! | Field           | Value                          |
//! |-----------------|--------------------------------|
//! | `index`         | `0`                            |
//! | `timestamp`     | Unix epoch                     |
//! | `payload`       | `{"action": "genesis"}`        |
//! | `previous_hash` | 64 zero hex digits             |
//!
//! Every field is fixed, so all ledgers share the same genesis hash.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Block payload: string keys to arbitrary JSON values.
pub type Payload = Map<String, Value>;

/// One immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: Payload,
    pub previous_hash: String,
    pub hash: String,
}

impl Block {
    fn seal(index: u64, timestamp: DateTime<Utc>, payload: Payload, previous_hash: String) -> Self {
        let hash = compute_hash(index, &timestamp, &payload, &previous_hash);
        Self {
            index,
            timestamp,
            payload,
            previous_hash,
            hash,
        }
    }

    fn genesis() -> Self {
        let mut payload = Payload::new();
        payload.insert("action".to_string(), Value::String("genesis".to_string()));
        Self::seal(
            0,
            DateTime::<Utc>::default(),
            payload,
            GENESIS_PREVIOUS_HASH.to_string(),
        )
    }

    /// Recompute this block's digest from its own fields.
    pub fn recompute_hash(&self) -> String {
        compute_hash(self.index, &self.timestamp, &self.payload, &self.previous_hash)
    }

    /// The `action` tag of the payload, if present.
    pub fn action(&self) -> Option<&str> {
        self.payload.get("action").and_then(Value::as_str)
    }
}

/// Canonical timestamp rendering used for hashing and persistence.
pub fn canonical_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn compute_hash(
    index: u64,
    timestamp: &DateTime<Utc>,
    payload: &Payload,
    previous_hash: &str,
) -> String {
    let canonical = json!([index, canonical_timestamp(timestamp), payload, previous_hash]);
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// First failure found while verifying a chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("chain is empty")]
    Empty,

    #[error("genesis block has been altered")]
    InvalidGenesis,

    #[error("non-contiguous index: expected {expected}, got {actual}")]
    InvalidIndex { expected: u64, actual: u64 },

    #[error("broken link at block {index}: expected previous_hash '{expected}', got '{actual}'")]
    BrokenLink {
        index: u64,
        expected: String,
        actual: String,
    },

    #[error("invalid hash at block {index}: expected '{expected}', got '{actual}'")]
    InvalidHash {
        index: u64,
        expected: String,
        actual: String,
    },
}

/// Ordered, append-only block sequence. Always starts with genesis.
#[derive(Debug, Clone)]
pub struct HashChain {
    blocks: Vec<Block>,
}

impl Default for HashChain {
    fn default() -> Self {
        Self::new()
    }
}

impl HashChain {
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
        }
    }

    /// Adopt a previously persisted block sequence after verifying it.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, ChainError> {
        let chain = Self { blocks };
        chain.verify()?;
        Ok(chain)
    }

    /// Seal `payload` into a new block linked to the current tip.
    pub fn append(&mut self, payload: Payload) -> Block {
        let (index, previous_hash) = match self.blocks.last() {
            Some(tip) => (tip.index + 1, tip.hash.clone()),
            None => (0, GENESIS_PREVIOUS_HASH.to_string()),
        };
        let block = Block::seal(index, Utc::now(), payload, previous_hash);
        self.blocks.push(block.clone());
        block
    }

    pub fn validate(&self) -> bool {
        self.verify().is_ok()
    }

    /// Walk the whole chain and report the first inconsistency.
    pub fn verify(&self) -> Result<(), ChainError> {
        let genesis = self.blocks.first().ok_or(ChainError::Empty)?;
        if *genesis != Block::genesis() {
            return Err(ChainError::InvalidGenesis);
        }

        for (position, block) in self.blocks.iter().enumerate() {
            let expected_index = position as u64;
            if block.index != expected_index {
                return Err(ChainError::InvalidIndex {
                    expected: expected_index,
                    actual: block.index,
                });
            }

            let recomputed = block.recompute_hash();
            if block.hash != recomputed {
                return Err(ChainError::InvalidHash {
                    index: block.index,
                    expected: recomputed,
                    actual: block.hash.clone(),
                });
            }

            if position > 0 {
                let predecessor = &self.blocks[position - 1];
                if block.previous_hash != predecessor.hash {
                    return Err(ChainError::BrokenLink {
                        index: block.index,
                        expected: predecessor.hash.clone(),
                        actual: block.previous_hash.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Blocks with `index >= from`, in order.
    pub fn since(&self, from: u64) -> &[Block] {
        let start = usize::try_from(from).unwrap_or(usize::MAX).min(self.blocks.len());
        &self.blocks[start..]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    #[cfg(test)]
    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }
}
