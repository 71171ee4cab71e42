//! # Fund Ledger
//!
//! Tamper-evident record of public project funding. Every committed domain
//! event becomes a hash-linked [`Block`]:
//!
//! | Phase        | Entry Point(s)                                      |
//! |--------------|-----------------------------------------------------|
//! | Bootstrap    | [`Ledger::new`], [`Ledger::with_parts`], [`Ledger::restore`] |
//! | Registration | [`Ledger::create_project`]                          |
//! | Release      | [`Ledger::release_next_milestone`]                  |
//! | Payment      | [`Ledger::make_payment`] (may append a fraud alert) |
//! | Queries      | `get_project`, `list_projects`, `get_chain`, `blocks_since` |
//! | Audit        | [`Ledger::validate_chain`], [`Ledger::audit`]       |
//!
//! ## Ordering
//!
//! A mutation commits first and its block is appended only on success; a
//! failed operation never reaches the chain. A payment's fraud alert, if any,
//! is appended directly after the payment block under the same project lock.
//!
//! Locks are always taken project first, chain second. The chain lock is held
//! only for the append itself.
//!
//! Callers are expected to be authorized already; this crate has no notion of
//! roles.

pub mod chain;
pub mod config;
pub mod errors;
pub mod fraud;
pub mod project;
pub mod storage;
pub mod types;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_ledger;

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

pub use chain::{Block, ChainError, HashChain, Payload};
pub use config::{FraudConfig, LedgerConfig};
pub use errors::{LedgerError, Result};
pub use fraud::{AnomalyDetector, IsolationForest};
pub use project::{ContractorAccount, MilestoneRelease, NewProject, PaymentRecord, Project};
pub use storage::{InMemoryStore, ProjectEntry, ProjectStore, SharedEntry};
pub use types::{LedgerEvent, PaymentOutcome, ProjectSnapshot};

pub struct Ledger {
    chain: Mutex<HashChain>,
    store: Arc<dyn ProjectStore>,
    detector: Box<dyn AnomalyDetector>,
}

impl Ledger {
    // ─────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────

    /// Empty ledger (genesis only) over an in-memory store.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_parts(
            HashChain::new(),
            Arc::new(InMemoryStore::new()),
            Box::new(IsolationForest::new(config.fraud)),
        ))
    }

    pub fn with_parts(
        chain: HashChain,
        store: Arc<dyn ProjectStore>,
        detector: Box<dyn AnomalyDetector>,
    ) -> Self {
        Self {
            chain: Mutex::new(chain),
            store,
            detector,
        }
    }

    /// Rebuild a ledger from persisted blocks.
    ///
    /// The chain is verified before anything else. Every event is then
    /// re-applied in order; fraud alerts are counted, never rescored.
    pub fn restore(config: LedgerConfig, blocks: Vec<Block>) -> Result<Self> {
        config.validate()?;
        let chain = HashChain::from_blocks(blocks).map_err(|e| {
            error!("Refusing to restore ledger, chain integrity violated: {e}");
            LedgerError::ChainIntegrity(e)
        })?;

        let store: Arc<dyn ProjectStore> = Arc::new(InMemoryStore::new());
        let mut unalerted = BTreeMap::new();
        for block in chain.blocks() {
            let event =
                LedgerEvent::from_payload(&block.payload).map_err(|e| LedgerError::Replay {
                    index: block.index,
                    reason: e.to_string(),
                })?;
            replay(store.as_ref(), &mut unalerted, block.index, event)?;
        }
        info!("Restored ledger with {} blocks", chain.len());

        Ok(Self::with_parts(
            chain,
            store,
            Box::new(IsolationForest::new(config.fraud)),
        ))
    }

    // ─────────────────────────────────────────────────────────
    // Domain operations
    // ─────────────────────────────────────────────────────────

    /// Register a project and its contractor account.
    pub fn create_project(&self, request: NewProject) -> Result<(Project, ContractorAccount)> {
        request.validate()?;
        let payload = LedgerEvent::ProjectCreated {
            project_id: request.id.clone(),
            name: request.name.clone(),
            budget: request.budget,
            contractor: request.contractor.clone(),
            milestones: request.milestones.clone(),
        }
        .to_payload()?;

        let entry: SharedEntry = Arc::new(Mutex::new(ProjectEntry::new(&request)));
        // Locked before it is published so no other block for this project
        // can land ahead of its creation block.
        let guard = entry.lock();
        self.store.put(&request.id, Arc::clone(&entry))?;
        let block = self.append(payload);

        info!(
            project_id = %request.id,
            budget = %request.budget,
            block = block.index,
            "Project created"
        );
        Ok((guard.project.clone(), guard.contractor.clone()))
    }

    /// Release the next pending milestone and credit the contractor.
    pub fn release_next_milestone(&self, project_id: &str) -> Result<MilestoneRelease> {
        let entry = self.entry(project_id)?;
        let mut guard = entry.lock();

        // Stage on copies; nothing is committed until the block is ready.
        let mut project = guard.project.clone();
        let mut contractor = guard.contractor.clone();
        let release = project.release_next_milestone().map_err(|e| {
            warn!(project_id, "Milestone release rejected: {e}");
            e
        })?;
        contractor.receive_funds(release.amount);

        let payload = LedgerEvent::MilestoneCompleted {
            project_id: project_id.to_string(),
            milestone: release.milestone.clone(),
            released_amount: release.amount,
            contractor_balance: contractor.balance,
        }
        .to_payload()?;

        guard.project = project;
        guard.contractor = contractor;
        let block = self.append(payload);

        info!(
            project_id,
            milestone = %release.milestone,
            amount = %release.amount,
            block = block.index,
            "Milestone released"
        );
        Ok(release)
    }

    /// Pay `amount` from the project's contractor to `recipient`, then score
    /// the project's payment history.
    pub fn make_payment(
        &self,
        project_id: &str,
        recipient: &str,
        amount: Decimal,
    ) -> Result<PaymentOutcome> {
        let entry = self.entry(project_id)?;
        let mut guard = entry.lock();

        let mut contractor = guard.contractor.clone();
        let record = contractor.make_payment(recipient, amount).map_err(|e| {
            warn!(project_id, "Payment rejected: {e}");
            e
        })?;

        let payment = LedgerEvent::ContractorPayment {
            project_id: project_id.to_string(),
            recipient: record.recipient.clone(),
            amount: record.amount,
            remaining_balance: record.remaining_balance,
        }
        .to_payload()?;
        let alert = LedgerEvent::FraudAlert {
            project_id: project_id.to_string(),
            amount: record.amount,
        }
        .to_payload()?;

        guard.contractor = contractor;
        guard.payments.push(record.amount);
        let block = self.append(payment);
        info!(
            project_id,
            recipient = %record.recipient,
            amount = %record.amount,
            block = block.index,
            "Contractor payment recorded"
        );

        let flagged = self.detector.is_anomalous(&guard.payments);
        if flagged {
            guard.fraud_alerts += 1;
            let alert_block = self.append(alert);
            warn!(
                project_id,
                amount = %record.amount,
                block = alert_block.index,
                "Fraud alert: payment flagged as anomalous"
            );
        }

        Ok(PaymentOutcome {
            project_id: project_id.to_string(),
            recipient: record.recipient,
            amount: record.amount,
            remaining_balance: record.remaining_balance,
            flagged,
        })
    }

    // ─────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────

    pub fn get_project(&self, project_id: &str) -> Result<ProjectSnapshot> {
        Ok(self.entry(project_id)?.lock().snapshot())
    }

    pub fn list_projects(&self) -> Vec<ProjectSnapshot> {
        self.store
            .list()
            .iter()
            .map(|entry| entry.lock().snapshot())
            .collect()
    }

    pub fn get_chain(&self) -> Vec<Block> {
        self.chain.lock().blocks().to_vec()
    }

    /// Blocks with `index >= from`.
    pub fn blocks_since(&self, from: u64) -> Vec<Block> {
        self.chain.lock().since(from).to_vec()
    }

    pub fn chain_len(&self) -> usize {
        self.chain.lock().len()
    }

    // ─────────────────────────────────────────────────────────
    // Integrity
    // ─────────────────────────────────────────────────────────

    pub fn validate_chain(&self) -> bool {
        self.chain.lock().validate()
    }

    /// Full integrity audit. Failures are logged at error level.
    pub fn audit(&self) -> Result<()> {
        self.chain.lock().verify().map_err(|e| {
            error!("Chain integrity audit failed: {e}");
            LedgerError::ChainIntegrity(e)
        })
    }

    // ─────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────

    fn entry(&self, project_id: &str) -> Result<SharedEntry> {
        self.store
            .get(project_id)
            .ok_or_else(|| LedgerError::NotFound(project_id.to_string()))
    }

    fn append(&self, payload: Payload) -> Block {
        self.chain.lock().append(payload)
    }

    #[cfg(test)]
    pub(crate) fn with_chain_mut<R>(&self, f: impl FnOnce(&mut HashChain) -> R) -> R {
        f(&mut *self.chain.lock())
    }
}

/// Re-apply one persisted event to `store`.
///
/// `unalerted` holds, per project, the amount of a payment that is still the
/// latest block of that project. A fraud alert must consume such an entry
/// with the same amount; any other block of the project clears it.
fn replay(
    store: &dyn ProjectStore,
    unalerted: &mut BTreeMap<String, Decimal>,
    index: u64,
    event: LedgerEvent,
) -> Result<()> {
    let mismatch = |reason: String| LedgerError::Replay { index, reason };
    let lookup = |project_id: &str| {
        store
            .get(project_id)
            .ok_or_else(|| mismatch(format!("unknown project {project_id}")))
    };

    match event {
        LedgerEvent::Genesis => {
            if index != 0 {
                return Err(mismatch("genesis event after the first block".into()));
            }
        }
        LedgerEvent::ProjectCreated {
            project_id,
            name,
            budget,
            contractor,
            milestones,
        } => {
            let request = NewProject {
                id: project_id,
                name,
                budget,
                contractor,
                milestones,
            };
            request.validate().map_err(|e| mismatch(e.to_string()))?;
            store
                .put(&request.id, Arc::new(Mutex::new(ProjectEntry::new(&request))))
                .map_err(|e| mismatch(e.to_string()))?;
        }
        LedgerEvent::MilestoneCompleted {
            project_id,
            milestone,
            released_amount,
            contractor_balance,
        } => {
            unalerted.remove(&project_id);
            let entry = lookup(&project_id)?;
            let mut guard = entry.lock();
            let release = guard
                .project
                .release_next_milestone()
                .map_err(|e| mismatch(e.to_string()))?;
            if release.milestone != milestone || release.amount != released_amount {
                return Err(mismatch(format!(
                    "recorded release {milestone}/{released_amount} but recomputed {}/{}",
                    release.milestone, release.amount
                )));
            }
            guard.contractor.receive_funds(release.amount);
            if guard.contractor.balance != contractor_balance {
                return Err(mismatch(format!(
                    "recorded contractor balance {contractor_balance} but recomputed {}",
                    guard.contractor.balance
                )));
            }
        }
        LedgerEvent::ContractorPayment {
            project_id,
            recipient,
            amount,
            remaining_balance,
        } => {
            let entry = lookup(&project_id)?;
            let mut guard = entry.lock();
            let record = guard
                .contractor
                .make_payment(&recipient, amount)
                .map_err(|e| mismatch(e.to_string()))?;
            if record.remaining_balance != remaining_balance {
                return Err(mismatch(format!(
                    "recorded remaining balance {remaining_balance} but recomputed {}",
                    record.remaining_balance
                )));
            }
            guard.payments.push(amount);
            unalerted.insert(project_id, amount);
        }
        LedgerEvent::FraudAlert { project_id, amount } => {
            let entry = lookup(&project_id)?;
            match unalerted.remove(&project_id) {
                Some(paid) if paid == amount => entry.lock().fraud_alerts += 1,
                Some(paid) => {
                    return Err(mismatch(format!(
                        "fraud alert for {amount} follows a payment of {paid}"
                    )))
                }
                None => {
                    return Err(mismatch(format!(
                        "fraud alert for {project_id} does not follow a payment"
                    )))
                }
            }
        }
    }
    Ok(())
}
