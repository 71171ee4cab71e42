use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use crate::invariants::{
    assert_alerts_follow_payments, assert_linked, assert_monotonic, assert_project_invariants,
};
use crate::{Ledger, LedgerConfig, LedgerError, NewProject};

fn setup() -> Ledger {
    Ledger::new(LedgerConfig::default()).expect("default config is valid")
}

fn new_project(id: &str, budget: Decimal, milestones: &[&str]) -> NewProject {
    NewProject {
        id: id.to_string(),
        name: format!("Road {id}"),
        budget,
        contractor: "BuildCo".to_string(),
        milestones: milestones.iter().map(|m| m.to_string()).collect(),
    }
}

/// Ledger with one project whose contractor holds `balance` after a single
/// one-milestone release.
fn setup_funded(id: &str, balance: Decimal) -> Ledger {
    let ledger = setup();
    ledger
        .create_project(new_project(id, balance, &["handover"]))
        .unwrap();
    ledger.release_next_milestone(id).unwrap();
    ledger
}

#[test]
fn test_new_ledger_has_only_genesis() {
    let ledger = setup();
    let chain = ledger.get_chain();
    assert_eq!(chain.len(), 1);
    assert_eq!(chain[0].action(), Some("genesis"));
    assert!(ledger.validate_chain());
    assert!(ledger.audit().is_ok());
}

#[test]
fn test_create_project_records_block() {
    let ledger = setup();
    let (project, contractor) = ledger
        .create_project(new_project("P1", dec!(1000), &["design", "build"]))
        .unwrap();

    assert_eq!(project.id, "P1");
    assert_eq!(project.total_budget, dec!(1000));
    assert_eq!(project.released_amount, Decimal::ZERO);
    assert!(project.completed_milestones.is_empty());
    assert_eq!(contractor.name, "BuildCo");
    assert_eq!(contractor.balance, Decimal::ZERO);

    let chain = ledger.get_chain();
    assert_eq!(chain.len(), 2);
    let block = &chain[1];
    assert_eq!(block.action(), Some("project_created"));
    assert_eq!(block.payload.get("project_id"), Some(&json!("P1")));
    assert_eq!(block.payload.get("budget"), Some(&json!("1000")));
    assert_eq!(block.payload.get("contractor"), Some(&json!("BuildCo")));
    assert_eq!(block.payload.get("milestones"), Some(&json!(["design", "build"])));
}

#[test]
fn test_duplicate_project_rejected_without_block() {
    let ledger = setup();
    ledger
        .create_project(new_project("P1", dec!(1000), &["a"]))
        .unwrap();
    let err = ledger
        .create_project(new_project("P1", dec!(5), &["b"]))
        .unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateProject(id) if id == "P1"));
    assert_eq!(ledger.chain_len(), 2);
    assert_eq!(ledger.get_project("P1").unwrap().project.total_budget, dec!(1000));
}

#[test]
fn test_invalid_project_rejected_without_block() {
    let ledger = setup();
    let err = ledger
        .create_project(new_project("P1", dec!(0), &["a"]))
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));
    assert_eq!(ledger.chain_len(), 1);
    assert!(matches!(ledger.get_project("P1"), Err(LedgerError::NotFound(_))));
}

#[test]
fn test_two_milestone_release_scenario() {
    let ledger = setup();
    ledger
        .create_project(new_project("P1", dec!(1000), &["phase-1", "phase-2"]))
        .unwrap();

    let first = ledger.release_next_milestone("P1").unwrap();
    assert_eq!(first.milestone, "phase-1");
    assert_eq!(first.amount, dec!(500));
    let snapshot = ledger.get_project("P1").unwrap();
    assert_eq!(snapshot.project.released_amount, dec!(500));
    assert_eq!(snapshot.contractor.balance, dec!(500));

    let second = ledger.release_next_milestone("P1").unwrap();
    assert_eq!(second.milestone, "phase-2");
    assert_eq!(second.amount, dec!(500));
    let done = ledger.get_project("P1").unwrap();
    assert_eq!(done.project.released_amount, dec!(1000));
    assert_eq!(done.contractor.balance, dec!(1000));

    let chain_len = ledger.chain_len();
    let err = ledger.release_next_milestone("P1").unwrap_err();
    assert!(matches!(err, LedgerError::AllMilestonesCompleted(id) if id == "P1"));
    assert_eq!(ledger.chain_len(), chain_len);
    assert_eq!(ledger.get_project("P1").unwrap(), done);
}

#[test]
fn test_release_block_carries_balance() {
    let ledger = setup();
    ledger
        .create_project(new_project("P1", dec!(300), &["a", "b", "c"]))
        .unwrap();
    ledger.release_next_milestone("P1").unwrap();
    let block = ledger.get_chain().pop().unwrap();
    assert_eq!(block.action(), Some("milestone_completed"));
    assert_eq!(block.payload.get("milestone"), Some(&json!("a")));
    assert_eq!(block.payload.get("released_amount"), Some(&json!("100")));
    assert_eq!(block.payload.get("contractor_balance"), Some(&json!("100")));
}

#[test]
fn test_budget_conserved_across_all_releases() {
    let ledger = setup();
    let milestones = ["m1", "m2", "m3", "m4", "m5", "m6", "m7"];
    ledger
        .create_project(new_project("P7", dec!(1000), &milestones))
        .unwrap();

    let mut previous = ledger.get_project("P7").unwrap().project;
    for _ in milestones {
        ledger.release_next_milestone("P7").unwrap();
        let snapshot = ledger.get_project("P7").unwrap();
        assert_monotonic(&previous, &snapshot.project);
        assert_project_invariants(&snapshot.project, &snapshot.contractor);
        previous = snapshot.project;
    }

    assert_eq!(previous.released_amount, previous.total_budget);
    assert_eq!(previous.completed_milestones.len(), milestones.len());
}

#[test]
fn test_release_unknown_project() {
    let ledger = setup();
    assert!(matches!(
        ledger.release_next_milestone("nope"),
        Err(LedgerError::NotFound(id)) if id == "nope"
    ));
    assert_eq!(ledger.chain_len(), 1);
}

#[test]
fn test_payment_records_block() {
    let ledger = setup_funded("P1", dec!(500));
    let outcome = ledger.make_payment("P1", "CementCo", dec!(120)).unwrap();
    assert_eq!(outcome.recipient, "CementCo");
    assert_eq!(outcome.amount, dec!(120));
    assert_eq!(outcome.remaining_balance, dec!(380));
    assert!(!outcome.flagged);

    let block = ledger.get_chain().pop().unwrap();
    assert_eq!(block.action(), Some("contractor_payment"));
    assert_eq!(block.payload.get("recipient"), Some(&json!("CementCo")));
    assert_eq!(block.payload.get("amount"), Some(&json!("120")));
    assert_eq!(block.payload.get("remaining_balance"), Some(&json!("380")));

    let snapshot = ledger.get_project("P1").unwrap();
    assert_eq!(snapshot.contractor.balance, dec!(380));
    assert_eq!(snapshot.payment_count, 1);
}

#[test]
fn test_overdraft_scenario() {
    let ledger = setup_funded("P1", dec!(500));
    let chain_len = ledger.chain_len();

    let err = ledger.make_payment("P1", "SteelCo", dec!(600)).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientFunds { requested, available, .. }
            if requested == dec!(600) && available == dec!(500)
    ));

    let snapshot = ledger.get_project("P1").unwrap();
    assert_eq!(snapshot.contractor.balance, dec!(500));
    assert_eq!(snapshot.payment_count, 0);
    assert_eq!(ledger.chain_len(), chain_len);
}

#[test]
fn test_non_positive_payment_rejected() {
    let ledger = setup_funded("P1", dec!(500));
    let chain_len = ledger.chain_len();
    assert!(matches!(
        ledger.make_payment("P1", "SteelCo", dec!(0)),
        Err(LedgerError::InvalidInput(_))
    ));
    assert_eq!(ledger.chain_len(), chain_len);
}

#[test]
fn test_payment_unknown_project() {
    let ledger = setup();
    assert!(matches!(
        ledger.make_payment("ghost", "SteelCo", dec!(1)),
        Err(LedgerError::NotFound(_))
    ));
}

#[test]
fn test_few_payments_never_flagged() {
    let ledger = setup_funded("P1", dec!(100000));
    for amount in [dec!(10), dec!(10), dec!(10), dec!(50000)] {
        let outcome = ledger.make_payment("P1", "Supplier", amount).unwrap();
        assert!(!outcome.flagged);
    }
    assert_eq!(ledger.get_project("P1").unwrap().fraud_alerts, 0);
    assert!(ledger
        .get_chain()
        .iter()
        .all(|b| b.action() != Some("fraud_alert")));
}

#[test]
fn test_spike_payment_appends_fraud_alert() {
    let ledger = setup_funded("P1", dec!(10000));
    for _ in 0..4 {
        assert!(!ledger.make_payment("P1", "Supplier", dec!(10)).unwrap().flagged);
    }
    let outcome = ledger.make_payment("P1", "Shell Corp", dec!(500)).unwrap();
    assert!(outcome.flagged);
    // The payment itself is never reversed.
    assert_eq!(outcome.remaining_balance, dec!(9460));

    let chain = ledger.get_chain();
    let alert = &chain[chain.len() - 1];
    let payment = &chain[chain.len() - 2];
    assert_eq!(payment.action(), Some("contractor_payment"));
    assert_eq!(alert.action(), Some("fraud_alert"));
    assert_eq!(alert.payload.get("project_id"), Some(&json!("P1")));
    assert_eq!(alert.payload.get("amount"), Some(&json!("500")));
    assert_alerts_follow_payments(&chain);

    let snapshot = ledger.get_project("P1").unwrap();
    assert_eq!(snapshot.fraud_alerts, 1);
    assert_eq!(snapshot.payment_count, 5);
    assert_eq!(snapshot.contractor.balance, dec!(9460));
}

#[test]
fn test_payment_histories_are_per_project() {
    let ledger = setup();
    for id in ["A", "B"] {
        ledger
            .create_project(new_project(id, dec!(10000), &["all"]))
            .unwrap();
        ledger.release_next_milestone(id).unwrap();
    }
    for _ in 0..4 {
        ledger.make_payment("A", "Supplier", dec!(10)).unwrap();
    }
    // B has a single payment, so its spike cannot be scored yet.
    assert!(!ledger.make_payment("B", "Supplier", dec!(500)).unwrap().flagged);
    assert!(ledger.make_payment("A", "Supplier", dec!(500)).unwrap().flagged);
}

#[test]
fn test_list_projects_sorted() {
    let ledger = setup();
    for id in ["zeta", "alpha", "mid"] {
        ledger
            .create_project(new_project(id, dec!(10), &["x"]))
            .unwrap();
    }
    let ids: Vec<String> = ledger
        .list_projects()
        .into_iter()
        .map(|s| s.project.id)
        .collect();
    assert_eq!(ids, ["alpha", "mid", "zeta"]);
}

#[test]
fn test_blocks_since() {
    let ledger = setup_funded("P1", dec!(100));
    assert_eq!(ledger.blocks_since(0).len(), 3);
    let tail = ledger.blocks_since(2);
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].index, 2);
    assert!(ledger.blocks_since(99).is_empty());
}

#[test]
fn test_full_workflow_keeps_chain_valid() {
    let ledger = setup();
    ledger
        .create_project(new_project("P1", dec!(1000), &["a", "b"]))
        .unwrap();
    ledger.release_next_milestone("P1").unwrap();
    ledger.make_payment("P1", "X", dec!(100)).unwrap();
    let _ = ledger.make_payment("P1", "X", dec!(10000));
    ledger.release_next_milestone("P1").unwrap();
    let _ = ledger.release_next_milestone("P1");

    let chain = ledger.get_chain();
    assert_linked(&chain);
    assert!(ledger.validate_chain());
    let actions: Vec<_> = chain.iter().filter_map(|b| b.action()).collect();
    assert_eq!(
        actions,
        [
            "genesis",
            "project_created",
            "milestone_completed",
            "contractor_payment",
            "milestone_completed"
        ]
    );
}

#[test]
fn test_tampering_detected_by_audit() {
    let ledger = setup_funded("P1", dec!(500));
    ledger.make_payment("P1", "X", dec!(50)).unwrap();
    assert!(ledger.validate_chain());

    ledger.with_chain_mut(|chain| {
        chain.blocks_mut()[3]
            .payload
            .insert("amount".into(), json!("5"));
    });

    assert!(!ledger.validate_chain());
    assert!(matches!(ledger.audit(), Err(LedgerError::ChainIntegrity(_))));
}

#[test]
fn test_every_single_field_tamper_detected() {
    let ledger = setup_funded("P1", dec!(500));
    ledger.make_payment("P1", "X", dec!(50)).unwrap();
    let len = ledger.chain_len();

    type Tamper = fn(&mut crate::Block);
    let tampers: [Tamper; 5] = [
        |b| b.index += 1,
        |b| b.timestamp += chrono::Duration::seconds(1),
        |b| {
            b.payload.insert("extra".into(), json!(true));
        },
        |b| b.previous_hash = "1".repeat(64),
        |b| b.hash = "f".repeat(64),
    ];

    for position in 0..len {
        for tamper in tampers {
            let original = ledger.get_chain();
            ledger.with_chain_mut(|chain| tamper(&mut chain.blocks_mut()[position]));
            assert!(
                !ledger.validate_chain(),
                "tamper on block {position} went unnoticed"
            );
            ledger.with_chain_mut(|chain| *chain.blocks_mut() = original);
            assert!(ledger.validate_chain());
        }
    }
}
