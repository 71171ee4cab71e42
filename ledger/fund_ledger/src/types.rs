//! # Types
//!
//! Structured records written into block payloads, plus the read-only views
//! handed to callers.
//!
//! Every block payload is a [`LedgerEvent`] serialized with an `action` tag:
//!
//! | `action`              | Written when                                  |
//! |-----------------------|-----------------------------------------------|
//! | `genesis`             | chain creation                                |
//! | `project_created`     | a project and its contractor are registered   |
//! | `milestone_completed` | a milestone releases budget to the contractor |
//! | `contractor_payment`  | the contractor pays a recipient               |
//! | `fraud_alert`         | the payment just recorded looks anomalous     |
//!
//! The payloads carry enough to rebuild all project state by replaying the
//! chain from genesis.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::Payload;
use crate::errors::{LedgerError, Result};
use crate::project::{ContractorAccount, Project};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LedgerEvent {
    Genesis,
    ProjectCreated {
        project_id: String,
        name: String,
        budget: Decimal,
        contractor: String,
        milestones: Vec<String>,
    },
    MilestoneCompleted {
        project_id: String,
        milestone: String,
        released_amount: Decimal,
        contractor_balance: Decimal,
    },
    ContractorPayment {
        project_id: String,
        recipient: String,
        amount: Decimal,
        remaining_balance: Decimal,
    },
    FraudAlert {
        project_id: String,
        amount: Decimal,
    },
}

impl LedgerEvent {
    pub fn to_payload(&self) -> Result<Payload> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(LedgerError::InvalidInput(format!(
                "ledger event did not serialize to an object: {other}"
            ))),
        }
    }

    pub fn from_payload(payload: &Payload) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(payload.clone()))?)
    }

    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::Genesis => None,
            Self::ProjectCreated { project_id, .. }
            | Self::MilestoneCompleted { project_id, .. }
            | Self::ContractorPayment { project_id, .. }
            | Self::FraudAlert { project_id, .. } => Some(project_id),
        }
    }
}

/// Point-in-time view of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project: Project,
    pub contractor: ContractorAccount,
    pub payment_count: usize,
    pub fraud_alerts: u32,
}

/// Result of a successful contractor payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub project_id: String,
    pub recipient: String,
    pub amount: Decimal,
    pub remaining_balance: Decimal,
    /// Whether a fraud alert block was appended for this payment.
    pub flagged: bool,
}
