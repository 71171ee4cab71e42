//! Ledger-wide error types.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::chain::ChainError;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Project not found: {0}")]
    NotFound(String),

    #[error("All milestones already completed for project {0}")]
    AllMilestonesCompleted(String),

    #[error("Insufficient funds for project {project_id}: requested {requested}, available {available}")]
    InsufficientFunds {
        project_id: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Project already exists: {0}")]
    DuplicateProject(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Chain integrity violated: {0}")]
    ChainIntegrity(#[from] ChainError),

    #[error("Cannot replay block {index}: {reason}")]
    Replay { index: u64, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
