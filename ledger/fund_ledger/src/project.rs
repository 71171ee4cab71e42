//! # Project
//!
//! Milestone tracking and contractor balances.
//!
//! ## Milestone release as a forward-only queue
//!
//! ```text
//! [m0, m1, ..., mN-1]   completed: {}          released: 0
//!   release ──► m0      completed: {m0}        released: budget / N
//!   ...
//!   release ──► mN-1    completed: {m0..mN-1}  released: budget
//!   release ──► AllMilestonesCompleted (no change)
//! ```
//!
//! Releases are never addressed by milestone id: each call takes the first
//! milestone in declaration order that is not yet completed. Every milestone
//! except the last releases `budget / N`; the last releases whatever is left
//! so the released total lands exactly on the budget.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};

/// Input for registering a project together with its contractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProject {
    pub id: String,
    pub name: String,
    pub budget: Decimal,
    pub contractor: String,
    pub milestones: Vec<String>,
}

impl NewProject {
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(LedgerError::InvalidInput("project id must not be empty".into()));
        }
        if self.budget <= Decimal::ZERO {
            return Err(LedgerError::InvalidInput(format!(
                "budget must be positive, got {}",
                self.budget
            )));
        }
        if self.milestones.is_empty() {
            return Err(LedgerError::InvalidInput(
                "a project needs at least one milestone".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for milestone in &self.milestones {
            if milestone.trim().is_empty() {
                return Err(LedgerError::InvalidInput("milestone names must not be empty".into()));
            }
            if !seen.insert(milestone.as_str()) {
                return Err(LedgerError::InvalidInput(format!(
                    "duplicate milestone: {milestone}"
                )));
            }
        }
        Ok(())
    }
}

/// A government project and its milestone tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub total_budget: Decimal,
    pub milestones: Vec<String>,
    pub completed_milestones: BTreeSet<String>,
    pub released_amount: Decimal,
}

/// Outcome of a single milestone release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneRelease {
    pub project_id: String,
    pub milestone: String,
    pub amount: Decimal,
}

impl Project {
    pub fn new(request: &NewProject) -> Self {
        Self {
            id: request.id.clone(),
            name: request.name.clone(),
            total_budget: request.budget,
            milestones: request.milestones.clone(),
            completed_milestones: BTreeSet::new(),
            released_amount: Decimal::ZERO,
        }
    }

    /// First milestone in declaration order that has not been completed.
    pub fn next_milestone(&self) -> Option<&str> {
        self.milestones
            .iter()
            .find(|m| !self.completed_milestones.contains(*m))
            .map(String::as_str)
    }

    pub fn remaining_milestones(&self) -> usize {
        self.milestones.len() - self.completed_milestones.len()
    }

    pub fn remaining_budget(&self) -> Decimal {
        self.total_budget - self.released_amount
    }

    /// Complete the next pending milestone and release its share of the budget.
    pub fn release_next_milestone(&mut self) -> Result<MilestoneRelease> {
        let milestone = self
            .next_milestone()
            .ok_or_else(|| LedgerError::AllMilestonesCompleted(self.id.clone()))?
            .to_string();

        let amount = if self.remaining_milestones() == 1 {
            self.remaining_budget()
        } else {
            self.total_budget / Decimal::from(self.milestones.len())
        };

        self.completed_milestones.insert(milestone.clone());
        self.released_amount += amount;

        Ok(MilestoneRelease {
            project_id: self.id.clone(),
            milestone,
            amount,
        })
    }
}

/// The contractor paired with a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractorAccount {
    pub project_id: String,
    pub name: String,
    pub balance: Decimal,
}

/// Record of an outgoing contractor payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub recipient: String,
    pub amount: Decimal,
    pub remaining_balance: Decimal,
}

impl ContractorAccount {
    pub fn new(project_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            name: name.into(),
            balance: Decimal::ZERO,
        }
    }

    pub fn receive_funds(&mut self, amount: Decimal) {
        self.balance += amount;
    }

    /// Debit `amount` for `recipient`. Rejected without mutation on overdraft.
    pub fn make_payment(&mut self, recipient: &str, amount: Decimal) -> Result<PaymentRecord> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidInput(format!(
                "payment amount must be positive, got {amount}"
            )));
        }
        if recipient.trim().is_empty() {
            return Err(LedgerError::InvalidInput("recipient must not be empty".into()));
        }
        if amount > self.balance {
            return Err(LedgerError::InsufficientFunds {
                project_id: self.project_id.clone(),
                requested: amount,
                available: self.balance,
            });
        }

        self.balance -= amount;
        Ok(PaymentRecord {
            recipient: recipient.to_string(),
            amount,
            remaining_balance: self.balance,
        })
    }
}
