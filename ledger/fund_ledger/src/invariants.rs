//! Stateless ledger invariant checks shared by the test modules.

#![allow(dead_code)]

use rust_decimal::Decimal;

use crate::chain::Block;
use crate::project::{ContractorAccount, Project};

/// Released budget stays within `[0, total_budget]`.
pub fn assert_budget_conserved(project: &Project) {
    assert!(
        project.released_amount >= Decimal::ZERO,
        "project {} released a negative amount ({})",
        project.id,
        project.released_amount
    );
    assert!(
        project.released_amount <= project.total_budget,
        "project {} released {} of a {} budget",
        project.id,
        project.released_amount,
        project.total_budget
    );
}

/// Completed milestones are a subset of the declared ones.
pub fn assert_completed_subset(project: &Project) {
    for milestone in &project.completed_milestones {
        assert!(
            project.milestones.contains(milestone),
            "project {} completed undeclared milestone {milestone}",
            project.id
        );
    }
}

/// Completed milestones only grow and released budget never shrinks.
pub fn assert_monotonic(before: &Project, after: &Project) {
    assert!(
        before.completed_milestones.is_subset(&after.completed_milestones),
        "project {} lost completed milestones",
        after.id
    );
    assert!(
        after.released_amount >= before.released_amount,
        "project {} released amount decreased from {} to {}",
        after.id,
        before.released_amount,
        after.released_amount
    );
}

pub fn assert_balance_non_negative(account: &ContractorAccount) {
    assert!(
        account.balance >= Decimal::ZERO,
        "contractor for {} has negative balance {}",
        account.project_id,
        account.balance
    );
}

/// Indices are contiguous from zero and each block links to its predecessor.
pub fn assert_linked(blocks: &[Block]) {
    for (position, block) in blocks.iter().enumerate() {
        assert_eq!(block.index, position as u64, "non-contiguous index");
        if position > 0 {
            assert_eq!(
                block.previous_hash,
                blocks[position - 1].hash,
                "block {} does not link to its predecessor",
                block.index
            );
        }
    }
}

/// Every `fraud_alert` block is preceded by a payment for the same project
/// and amount, with no other block of that project in between.
pub fn assert_alerts_follow_payments(blocks: &[Block]) {
    for (position, block) in blocks.iter().enumerate() {
        if block.action() != Some("fraud_alert") {
            continue;
        }
        let project_id = block.payload.get("project_id");
        let previous = blocks[..position]
            .iter()
            .rev()
            .find(|b| b.payload.get("project_id") == project_id)
            .unwrap_or_else(|| panic!("fraud alert at {} has no preceding block", block.index));
        assert_eq!(
            previous.action(),
            Some("contractor_payment"),
            "fraud alert at {} does not follow a payment",
            block.index
        );
        assert_eq!(previous.payload.get("amount"), block.payload.get("amount"));
    }
}

pub fn assert_project_invariants(project: &Project, account: &ContractorAccount) {
    assert_budget_conserved(project);
    assert_completed_subset(project);
    assert_balance_non_negative(account);
}
