//! # Storage
//!
//! Project state lives behind the [`ProjectStore`] trait so the ledger can be
//! backed by something other than process memory.
//!
//! ## Entries
//!
//! | Field          | Type                | Mutated by                     |
//! |----------------|---------------------|--------------------------------|
//! | `project`      | `Project`           | milestone release              |
//! | `contractor`   | `ContractorAccount` | milestone release, payment     |
//! | `payments`     | `Vec<Decimal>`      | payment (append only)          |
//! | `fraud_alerts` | `u32`               | payment flagged as anomalous   |
//!
//! All four sit under one [`Mutex`] per project. Holding that lock is what
//! makes a release credit the contractor in the same step that it advances
//! the milestone, and what keeps fraud scoring on a stable history.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;

use crate::errors::{LedgerError, Result};
use crate::project::{ContractorAccount, NewProject, Project};
use crate::types::ProjectSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectEntry {
    pub project: Project,
    pub contractor: ContractorAccount,
    pub payments: Vec<Decimal>,
    pub fraud_alerts: u32,
}

impl ProjectEntry {
    pub fn new(request: &NewProject) -> Self {
        Self {
            project: Project::new(request),
            contractor: ContractorAccount::new(request.id.clone(), request.contractor.clone()),
            payments: Vec::new(),
            fraud_alerts: 0,
        }
    }

    pub fn snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot {
            project: self.project.clone(),
            contractor: self.contractor.clone(),
            payment_count: self.payments.len(),
            fraud_alerts: self.fraud_alerts,
        }
    }
}

/// Shared handle to a project's locked state.
pub type SharedEntry = Arc<Mutex<ProjectEntry>>;

/// Keyed project repository.
pub trait ProjectStore: Send + Sync {
    fn get(&self, project_id: &str) -> Option<SharedEntry>;

    /// Insert a new entry. Fails with `DuplicateProject` if the id is taken;
    /// existing entries are never replaced.
    fn put(&self, project_id: &str, entry: SharedEntry) -> Result<()>;

    /// All entries ordered by project id.
    fn list(&self) -> Vec<SharedEntry>;
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<String, SharedEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectStore for InMemoryStore {
    fn get(&self, project_id: &str) -> Option<SharedEntry> {
        self.entries.read().get(project_id).cloned()
    }

    fn put(&self, project_id: &str, entry: SharedEntry) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(project_id) {
            return Err(LedgerError::DuplicateProject(project_id.to_string()));
        }
        entries.insert(project_id.to_string(), entry);
        Ok(())
    }

    fn list(&self) -> Vec<SharedEntry> {
        self.entries.read().values().cloned().collect()
    }
}
