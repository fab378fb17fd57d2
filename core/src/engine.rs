//! The custody engine. Owns refresh policy around the two pure functions.
//!
//! REFRESH ORDER (fixed):
//!   1. Fetch every stream concurrently (isolated failures).
//!   2. Reconcile the movement streams into record groups.
//!   3. Aggregate wallet balances.
//!   4. Journal the outcome, if a store is attached.
//!
//! RULES:
//!   - Steps 2 and 3 are pure and independent; neither reads the other's output.
//!   - Every refresh recomputes from scratch. There is no incremental state.
//!   - Nothing here turns a data problem into an error; only I/O on the
//!     journal can fail a refresh.

use crate::{
    balance::{aggregate_detailed, WalletBalances},
    config::CustodyConfig,
    error::{CustodyError, CustodyResult},
    reconciliation::{LedgerReconciler, RecordGroup},
    record::BaseRecord,
    signal::{signal_type_name, DataQualitySignal, SignalLog, SignalLogEntry},
    snapshot::CustodySnapshot,
    source::{fetch_snapshot, CustodySource},
    store::{CustodyStore, RefreshRow},
    types::{RefreshId, Timestamp},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// What both pure functions produced for one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub groups: Vec<RecordGroup>,
    pub balances: WalletBalances,
    pub signals: Vec<DataQualitySignal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshReport {
    pub refresh_id: RefreshId,
    pub refreshed_at: Timestamp,
    #[serde(flatten)]
    pub evaluation: Evaluation,
}

impl RefreshReport {
    pub fn certificate_count(&self) -> usize {
        self.evaluation
            .groups
            .iter()
            .map(RecordGroup::certificate_count)
            .sum()
    }

    pub fn synthetic_count(&self) -> usize {
        self.evaluation
            .groups
            .iter()
            .filter(|g| g.parent.is_synthetic())
            .count()
    }
}

/// Run both pure functions over one snapshot. Deterministic.
pub fn evaluate(snapshot: &CustodySnapshot, config: &CustodyConfig) -> Evaluation {
    let mut signals = SignalLog::new("evaluate");

    let transaction_records = snapshot.transaction_records();
    let deposit_records = snapshot.deposit_records();
    let certificate_records = snapshot.certificate_records();
    let has_trade_finance = snapshot.has_trade_finance_transactions(&transaction_records);

    let reconciled = LedgerReconciler::new(&config.reconciliation).reconcile_detailed(
        &snapshot.ledger_entries,
        &transaction_records,
        &deposit_records,
        &certificate_records,
        has_trade_finance,
    );

    let price = snapshot
        .gold_price_per_gram
        .as_ref()
        .or(config.balances.fallback_gold_price_per_gram.as_ref())
        .map(|p| signals.amount("goldPrice", "goldPricePerGram", p));
    let usd_balance = snapshot
        .spot_wallet
        .as_ref()
        .map(|w| signals.amount("spotWallet", "usdBalance", &w.usd_balance))
        .unwrap_or(Decimal::ZERO);

    let aggregated = aggregate_detailed(
        snapshot.ownership_summary.as_ref(),
        &snapshot.vault_holdings,
        snapshot.finabridge_wallet.as_ref(),
        &snapshot.savings_plans,
        price,
        usd_balance,
    );

    let mut all = signals.into_vec();
    all.extend(reconciled.signals);
    all.extend(aggregated.signals);

    Evaluation {
        groups: reconciled.groups,
        balances: aggregated.balances,
        signals: all,
    }
}

pub struct CustodyEngine {
    pub config: CustodyConfig,
    pub store: Option<CustodyStore>,
    last: Option<RefreshReport>,
}

impl CustodyEngine {
    pub fn new(config: CustodyConfig) -> Self {
        Self {
            config,
            store: None,
            last: None,
        }
    }

    /// Engine that journals every refresh into `store`.
    pub fn with_store(config: CustodyConfig, store: CustodyStore) -> Self {
        Self {
            config,
            store: Some(store),
            last: None,
        }
    }

    /// Engine with test config and a migrated in-memory journal.
    pub fn build_test() -> CustodyResult<Self> {
        let store = CustodyStore::in_memory()?;
        store.migrate()?;
        Ok(Self::with_store(CustodyConfig::default_test(), store))
    }

    /// Fetch every stream from `source`, then evaluate and journal.
    pub fn refresh<S: CustodySource>(&mut self, source: Arc<S>) -> CustodyResult<&RefreshReport> {
        let fetched = fetch_snapshot(source, &self.config.fetch);
        self.run_cycle(fetched.snapshot, fetched.signals)
    }

    /// Evaluate and journal an already-assembled snapshot.
    pub fn refresh_snapshot(&mut self, snapshot: CustodySnapshot) -> CustodyResult<&RefreshReport> {
        self.run_cycle(snapshot, Vec::new())
    }

    pub fn last_report(&self) -> Option<&RefreshReport> {
        self.last.as_ref()
    }

    /// The last report, or `NoRefresh` before the first cycle.
    pub fn require_report(&self) -> CustodyResult<&RefreshReport> {
        self.last.as_ref().ok_or(CustodyError::NoRefresh)
    }

    fn run_cycle(
        &mut self,
        snapshot: CustodySnapshot,
        fetch_signals: Vec<DataQualitySignal>,
    ) -> CustodyResult<&RefreshReport> {
        let mut evaluation = evaluate(&snapshot, &self.config);
        let mut signals = fetch_signals;
        signals.append(&mut evaluation.signals);
        evaluation.signals = signals;

        let report = RefreshReport {
            refresh_id: Uuid::new_v4().to_string(),
            refreshed_at: Utc::now(),
            evaluation,
        };

        if let Some(store) = &self.store {
            journal(store, &report, &snapshot)?;
        }

        log::info!(
            "refresh {}: {} groups ({} certificates, {} synthetic), available {} g, {} signals",
            report.refresh_id,
            report.evaluation.groups.len(),
            report.certificate_count(),
            report.synthetic_count(),
            report.evaluation.balances.available_gold,
            report.evaluation.signals.len()
        );

        Ok(&*self.last.insert(report))
    }
}

fn journal(store: &CustodyStore, report: &RefreshReport, snapshot: &CustodySnapshot) -> CustodyResult<()> {
    let row = RefreshRow {
        refresh_id: report.refresh_id.clone(),
        refreshed_at: report.refreshed_at.to_rfc3339(),
        group_count: report.evaluation.groups.len() as i64,
        certificate_count: report.certificate_count() as i64,
        synthetic_count: report.synthetic_count() as i64,
        balances_json: serde_json::to_string(&report.evaluation.balances)?,
        groups_json: serde_json::to_string(&report.evaluation.groups)?,
        snapshot_json: snapshot.to_json()?,
    };

    let signals = report
        .evaluation
        .signals
        .iter()
        .map(|signal| -> CustodyResult<SignalLogEntry> {
            Ok(SignalLogEntry {
                id: None,
                refresh_id: report.refresh_id.clone(),
                signal_type: signal_type_name(signal).to_string(),
                payload: serde_json::to_string(signal)?,
            })
        })
        .collect::<CustodyResult<Vec<_>>>()?;

    store.record_refresh(&row, &signals)?;
    log::debug!(
        "refresh {}: journaled {} groups, newest parent {}",
        report.refresh_id,
        row.group_count,
        report
            .evaluation
            .groups
            .first()
            .map(|g| g.parent.id().to_string())
            .unwrap_or_else(|| "-".into())
    );
    Ok(())
}
