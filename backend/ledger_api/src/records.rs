//! Row shape of the `blocks` journal table and its conversion to and from
//! ledger [`Block`]s.

use chrono::{DateTime, Utc};
use fund_ledger::chain::canonical_timestamp;
use fund_ledger::{Block, Payload};

use crate::errors::{Result, ServiceError};

/// A block as stored in / read from the database.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct BlockRecord {
    pub idx: i64,
    pub timestamp: String,
    pub payload: String,
    pub previous_hash: String,
    pub hash: String,
}

impl BlockRecord {
    pub fn from_block(block: &Block) -> Result<Self> {
        Ok(Self {
            idx: i64::try_from(block.index).map_err(|_| ServiceError::StoredBlock {
                index: i64::MAX,
                reason: format!("index {} does not fit the journal", block.index),
            })?,
            timestamp: canonical_timestamp(&block.timestamp),
            payload: serde_json::to_string(&block.payload)?,
            previous_hash: block.previous_hash.clone(),
            hash: block.hash.clone(),
        })
    }

    pub fn into_block(self) -> Result<Block> {
        let malformed = |reason: String| ServiceError::StoredBlock {
            index: self.idx,
            reason,
        };
        let index = u64::try_from(self.idx).map_err(|_| malformed("negative index".into()))?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| malformed(format!("bad timestamp: {e}")))?
            .with_timezone(&Utc);
        let payload: Payload = serde_json::from_str(&self.payload)
            .map_err(|e| malformed(format!("bad payload: {e}")))?;

        Ok(Block {
            index,
            timestamp,
            payload,
            previous_hash: self.previous_hash,
            hash: self.hash,
        })
    }
}
