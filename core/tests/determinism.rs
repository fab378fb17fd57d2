//! Same snapshot in, same answer out.
//!
//! Two evaluations of one snapshot must agree field for field, and the
//! structural guarantees of the output must hold on a deliberately messy
//! snapshot: overlapping feeds, echoes, orphans, bad numbers, over-locked
//! gold.

use custody_core::{
    balance::WalletBalances,
    config::{BasePolicy, CustodyConfig},
    engine::{evaluate, Evaluation},
    reconciliation::RecordGroup,
    record::BaseRecord,
    snapshot::CustodySnapshot,
};
use rust_decimal::Decimal;
use std::collections::HashSet;

const MIXED_SNAPSHOT: &str = r#"{
  "ledgerEntries": [
    {"id": "l-buy", "createdAt": "2025-03-04T09:00:00Z", "action": "Buy", "status": "Completed",
     "fromWallet": "External", "toWallet": "FinaPay", "goldGrams": "10", "valueUsd": "850",
     "transactionId": "tx-buy"},
    {"id": "l-echo", "createdAt": "2025-03-04T09:00:01Z", "action": "Digital Ownership",
     "goldGrams": "10", "transactionId": "tx-buy", "certificateNumber": "DO-1"},
    {"id": "l-trade", "createdAt": "2025-03-02T15:30:00Z", "action": "Trade Lock", "status": "Completed",
     "fromWallet": "FinaPay", "toWallet": "FinaBridge", "goldGrams": "3", "transactionId": "tx-trade"},
    {"id": "l-flag", "createdAt": "2025-03-03T08:00:00Z", "action": "Physical Storage", "isCertificate": true,
     "goldGrams": "2", "transactionId": "tx-vault", "certificateNumber": "PS-9"},
    {"id": "l-sell", "createdAt": "2025-03-04T09:00:00Z", "action": "Sell", "status": "Completed",
     "fromWallet": "FinaPay", "toWallet": "External", "goldGrams": "1.25", "transactionId": "tx-sell"}
  ],
  "transactions": [
    {"id": "tx-buy", "type": "Buy", "status": "Completed", "goldGrams": 10, "amountUsd": 850,
     "createdAt": "2025-03-04T09:00:00Z"},
    {"id": "tx-old", "type": "Receive", "status": "Completed", "goldGrams": "1",
     "createdAt": "2025-02-20T09:00:00Z"}
  ],
  "deposits": [
    {"id": "dep-1", "referenceNumber": "REF-1", "amountUsd": "500", "status": "Confirmed",
     "createdAt": "2025-03-01T07:00:00Z"}
  ],
  "certificates": [
    {"id": "c-do", "certificateNumber": "DO-1", "type": "Digital Ownership", "goldGrams": "10",
     "totalValueUsd": "850", "transactionId": "tx-buy", "issuedAt": "2025-03-04T09:00:02Z"},
    {"id": "c-ps", "certificateNumber": "PS-9", "type": "Physical Storage", "goldGrams": "2",
     "totalValueUsd": "170", "transactionId": "tx-vault", "issuedAt": "2025-03-03T08:00:00Z"},
    {"id": "c-ps2", "certificateNumber": "PS-10", "type": "Physical Storage", "goldGrams": "abc",
     "totalValueUsd": "85", "transactionId": "tx-vault", "issuedAt": "2025-03-03T08:00:05Z"},
    {"id": "c-tr", "certificateNumber": "TR-1", "type": "Trade Release", "goldGrams": "3",
     "transactionId": "tx-trade", "issuedAt": "2025-03-02T15:31:00Z"},
    {"id": "c-loose", "type": "Digital Ownership", "goldGrams": "0.5", "totalValueUsd": "42",
     "issuedAt": "2025-03-05T11:00:00Z"},
    {"id": "c-dup", "certificateNumber": "DO-1", "type": "Digital Ownership", "goldGrams": "10",
     "transactionId": "tx-buy", "issuedAt": "2025-03-04T09:00:02Z"}
  ],
  "vaultHoldings": [
    {"id": "h-1", "goldGrams": "7.5", "vaultLocation": "Dubai"},
    {"id": "h-2", "goldGrams": "oops"}
  ],
  "finabridgeWallet": {"availableGoldGrams": "1", "lockedGoldGrams": "3"},
  "savingsPlans": [
    {"id": "p-1", "status": "Active", "goldSoldGrams": "4"},
    {"id": "p-2", "status": "Maturing", "goldSoldGrams": "2"},
    {"id": "p-3", "status": "Completed", "goldSoldGrams": "50"}
  ],
  "spotWallet": {"goldGrams": "7.5", "usdBalance": "-12"},
  "goldPricePerGram": "85.10"
}"#;

fn mixed_snapshot() -> CustodySnapshot {
    CustodySnapshot::from_json(MIXED_SNAPSHOT).unwrap()
}

fn group_key(group: &RecordGroup) -> String {
    group
        .parent
        .transaction_id()
        .map(|tx| format!("tx:{tx}"))
        .unwrap_or_else(|| format!("parent:{}", group.parent.id()))
}

fn assert_groups_well_formed(groups: &[RecordGroup]) {
    // No certificate ever heads a group.
    for g in groups {
        assert!(
            !g.parent.is_certificate_shaped(),
            "certificate-shaped parent {} ({})",
            g.parent.id(),
            g.parent.action()
        );
    }

    // Each (identity, correlation key) pair appears at most once.
    let mut seen = HashSet::new();
    for g in groups {
        let key = group_key(g);
        for child in &g.children {
            assert!(
                seen.insert((child.identity().to_string(), key.clone())),
                "certificate {} attached twice under {key}",
                child.identity()
            );
        }
    }

    // Synthetic parents carry their children's totals.
    for g in groups.iter().filter(|g| g.parent.is_synthetic()) {
        assert!(!g.children.is_empty(), "synthetic parent {} has no children", g.parent.id());
        assert_eq!(
            g.parent.gold_grams().value(),
            g.children_gold_grams(),
            "synthetic parent {} gold != sum of children",
            g.parent.id()
        );
        let children_usd: Decimal = g
            .children
            .iter()
            .filter_map(|c| c.value_usd.as_ref())
            .map(|v| v.value())
            .sum();
        assert_eq!(
            g.parent.value_usd().map(|v| v.value()),
            Some(children_usd),
            "synthetic parent {} value != sum of children",
            g.parent.id()
        );
    }

    // Newest first.
    for pair in groups.windows(2) {
        assert!(
            pair[0].parent.created_at() >= pair[1].parent.created_at(),
            "groups out of order: {} before {}",
            pair[0].parent.id(),
            pair[1].parent.id()
        );
    }
}

fn assert_balances_non_negative(b: &WalletBalances) {
    let fields = [
        b.total_vault_gold,
        b.available_gold,
        b.bnsl_locked_grams,
        b.finabridge_locked_grams,
        b.usd_balance,
        b.available_gold_value_usd,
        b.total_available_usd,
        b.total_vault_value_usd,
        b.finapay_grams,
        b.bnsl_available_grams,
        b.finabridge_available_grams,
    ];
    assert!(
        fields.iter().all(|v| *v >= Decimal::ZERO),
        "negative balance figure in {b:?}"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: idempotence
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn same_snapshot_produces_identical_evaluations() {
    let config = CustodyConfig::default_test();
    let snapshot = mixed_snapshot();

    let a = evaluate(&snapshot, &config);
    let b = evaluate(&snapshot, &config);

    assert_eq!(a, b, "two evaluations of one snapshot diverged");

    let json_a = serde_json::to_string(&a).unwrap();
    let json_b = serde_json::to_string(&b).unwrap();
    assert_eq!(json_a, json_b, "serialized evaluations diverged");
}

#[test]
fn snapshot_survives_a_json_round_trip_unchanged_in_effect() {
    let config = CustodyConfig::default_test();
    let snapshot = mixed_snapshot();
    let reloaded = CustodySnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();

    let before: Evaluation = evaluate(&snapshot, &config);
    let after: Evaluation = evaluate(&reloaded, &config);

    assert_eq!(before.groups, after.groups);
    assert_eq!(before.balances, after.balances);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: structural guarantees on a messy snapshot
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn mixed_snapshot_groups_are_well_formed() {
    for policy in [BasePolicy::PreferLedgerFeed, BasePolicy::MergeByTransactionId] {
        let mut config = CustodyConfig::default_test();
        config.reconciliation.base_policy = policy;

        let evaluation = evaluate(&mixed_snapshot(), &config);

        assert_groups_well_formed(&evaluation.groups);
        assert_balances_non_negative(&evaluation.balances);
    }
}

#[test]
fn mixed_snapshot_expected_shape() {
    let evaluation = evaluate(&mixed_snapshot(), &CustodyConfig::default_test());
    let groups = &evaluation.groups;

    // Ledger feed has movements, so derived records stay out of the base.
    assert!(groups.iter().all(|g| g.parent.id() != "tx-old" && g.parent.id() != "dep-1"));

    // DO-1 arrives three times (echo, API, API duplicate) and is attached once.
    let buy = groups.iter().find(|g| g.parent.id() == "l-buy").unwrap();
    assert_eq!(buy.children.len(), 1);
    assert_eq!(buy.children[0].identity(), "DO-1");

    // Trade-finance activity is visible, so the Trade Release certificate is dropped.
    let trade = groups.iter().find(|g| g.parent.id() == "l-trade").unwrap();
    assert!(trade.children.is_empty());
    assert!(groups
        .iter()
        .flat_map(|g| &g.children)
        .all(|c| c.identity() != "TR-1"));

    // tx-vault has no movement of its own, so its two certificates share a synthetic parent.
    let vault = groups
        .iter()
        .find(|g| g.parent.transaction_id() == Some("tx-vault"))
        .unwrap();
    assert!(vault.parent.is_synthetic());
    assert_eq!(vault.parent.action(), "Physical Storage Deposit");
    assert_eq!(vault.children.len(), 2);
    assert_eq!(vault.parent.gold_grams().as_str(), "2");

    // The loose certificate is newest, under its own synthetic parent.
    assert_eq!(groups[0].parent.id(), "synthetic-c-loose");
    assert_eq!(groups[0].parent.action(), "Digital Storage Deposit");
}

#[test]
fn mixed_snapshot_balances_clamp_over_locked_gold() {
    let evaluation = evaluate(&mixed_snapshot(), &CustodyConfig::default_test());
    let b = &evaluation.balances;

    // 7.5 vault grams (one holding malformed) against 3 trade + 6 plan grams.
    assert_eq!(b.total_vault_gold, Decimal::new(75, 1));
    assert_eq!(b.bnsl_locked_grams, Decimal::new(6, 0));
    assert_eq!(b.finabridge_locked_grams, Decimal::new(3, 0));
    assert_eq!(b.available_gold, Decimal::ZERO);
    assert_eq!(b.usd_balance, Decimal::ZERO, "negative cash must clamp");
    assert_eq!(b.total_vault_value_usd, Decimal::new(63825, 2));
    assert!(!evaluation.signals.is_empty(), "recoveries must be reported");
}
