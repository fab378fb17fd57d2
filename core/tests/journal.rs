//! Integration tests for the engine's refresh cycle and the SQLite journal.
//!
//! Tests verify:
//! 1. No report exists before the first refresh
//! 2. Every refresh is journaled with its counts, balances and signals
//! 3. Refreshes recompute from scratch; each gets its own id
//! 4. An engine without a store still refreshes

use custody_core::{
    balance::WalletBalances,
    config::CustodyConfig,
    engine::CustodyEngine,
    error::CustodyError,
    reconciliation::RecordGroup,
    signal::DataQualitySignal,
    snapshot::CustodySnapshot,
    store::CustodyStore,
};
use rust_decimal::Decimal;

fn snapshot() -> CustodySnapshot {
    CustodySnapshot::from_json(
        r#"{
          "transactions": [
            {"id": "tx-1", "type": "Buy", "goldGrams": "5", "amountUsd": "400",
             "createdAt": "2025-03-02T10:00:00Z"}
          ],
          "deposits": [
            {"id": "dep-1", "referenceNumber": "REF-1", "amountUsd": "250",
             "createdAt": "2025-03-01T10:00:00Z"}
          ],
          "certificates": [
            {"id": "c-1", "certificateNumber": "DO-1", "type": "Digital Ownership",
             "goldGrams": "5", "transactionId": "tx-1", "issuedAt": "2025-03-02T10:00:01Z"},
            {"id": "c-2", "certificateNumber": "PS-1", "type": "Physical Storage",
             "goldGrams": "x", "transactionId": "tx-9", "issuedAt": "2025-03-03T10:00:00Z"}
          ],
          "vaultHoldings": [{"id": "h-1", "goldGrams": "5"}],
          "spotWallet": {"goldGrams": "5", "usdBalance": "250"},
          "goldPricePerGram": "80"
        }"#,
    )
    .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: before the first refresh
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn no_report_before_first_refresh() {
    let engine = CustodyEngine::build_test().unwrap();

    assert!(engine.last_report().is_none());
    assert!(matches!(engine.require_report(), Err(CustodyError::NoRefresh)));

    let store = engine.store.as_ref().unwrap();
    assert_eq!(store.refresh_count().unwrap(), 0);
    assert!(store.latest_refresh().unwrap().is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: journaling
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn refresh_is_journaled() {
    let mut engine = CustodyEngine::build_test().unwrap();

    let report = engine.refresh_snapshot(snapshot()).unwrap().clone();

    assert_eq!(report.evaluation.groups.len(), 3, "tx-1, dep-1 and a synthetic tx-9");
    assert_eq!(report.certificate_count(), 2);
    assert_eq!(report.synthetic_count(), 1);
    assert!(report.evaluation.groups[0].parent.is_synthetic(), "tx-9 is newest");

    let store = engine.store.as_ref().unwrap();
    assert_eq!(store.refresh_count().unwrap(), 1);

    let row = store.latest_refresh().unwrap().unwrap();
    assert_eq!(row.refresh_id, report.refresh_id);
    assert_eq!(row.group_count, 3);
    assert_eq!(row.certificate_count, 2);
    assert_eq!(row.synthetic_count, 1);

    let balances: WalletBalances = serde_json::from_str(&row.balances_json).unwrap();
    assert_eq!(balances, report.evaluation.balances);
    assert_eq!(balances.total_available_usd, Decimal::new(650, 0));

    let groups: Vec<RecordGroup> = serde_json::from_str(&row.groups_json).unwrap();
    assert_eq!(groups, report.evaluation.groups);

    let stored_snapshot = CustodySnapshot::from_json(&row.snapshot_json).unwrap();
    assert_eq!(stored_snapshot, snapshot());
}

#[test]
fn signals_are_journaled_in_order() {
    let mut engine = CustodyEngine::build_test().unwrap();
    let report = engine.refresh_snapshot(snapshot()).unwrap().clone();

    let store = engine.store.as_ref().unwrap();
    let entries = store.signals_for_refresh(&report.refresh_id).unwrap();

    assert_eq!(entries.len(), report.evaluation.signals.len());
    assert!(!entries.is_empty(), "malformed PS-1 grams must be reported");
    for (entry, signal) in entries.iter().zip(&report.evaluation.signals) {
        assert!(entry.id.is_some());
        assert_eq!(entry.refresh_id, report.refresh_id);
        let decoded: DataQualitySignal = serde_json::from_str(&entry.payload).unwrap();
        assert_eq!(&decoded, signal);
    }
    assert!(entries.iter().any(|e| e.signal_type == "malformed_amount"));

    assert!(store.signals_for_refresh("no-such-refresh").unwrap().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: every refresh starts over
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn repeated_refreshes_get_fresh_ids_and_equal_results() {
    let mut engine = CustodyEngine::build_test().unwrap();

    let first = engine.refresh_snapshot(snapshot()).unwrap().clone();
    let second = engine.refresh_snapshot(snapshot()).unwrap().clone();

    assert_ne!(first.refresh_id, second.refresh_id);
    assert_eq!(first.evaluation, second.evaluation);
    assert_eq!(engine.require_report().unwrap().refresh_id, second.refresh_id);

    let store = engine.store.as_ref().unwrap();
    assert_eq!(store.refresh_count().unwrap(), 2);
}

#[test]
fn empty_snapshot_refreshes_cleanly() {
    let mut engine = CustodyEngine::build_test().unwrap();

    let report = engine.refresh_snapshot(CustodySnapshot::default()).unwrap();

    assert!(report.evaluation.groups.is_empty());
    assert_eq!(report.evaluation.balances, WalletBalances::default());
    assert!(report.evaluation.signals.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: storeless engine and file-backed store
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn engine_without_store_still_refreshes() {
    let mut engine = CustodyEngine::new(CustodyConfig::default_test());

    let report = engine.refresh_snapshot(snapshot()).unwrap();

    assert_eq!(report.evaluation.groups.len(), 3);
    assert!(engine.store.is_none());
}

#[test]
fn file_store_persists_across_reopen() {
    // The directory guard also removes the WAL sidecar files.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.db");
    let path_str = path.to_str().unwrap().to_string();

    let refresh_id = {
        let store = CustodyStore::open(&path_str).unwrap();
        store.migrate().unwrap();
        let mut engine = CustodyEngine::with_store(CustodyConfig::default_test(), store);
        engine.refresh_snapshot(snapshot()).unwrap().refresh_id.clone()
    };

    let reopened = CustodyStore::open(&path_str).unwrap();
    reopened.migrate().unwrap();
    assert_eq!(reopened.refresh_count().unwrap(), 1);
    assert_eq!(reopened.latest_refresh().unwrap().unwrap().refresh_id, refresh_id);
}
