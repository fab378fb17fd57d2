//! Ledger reconciliation. Merges the four movement streams into one
//! deduplicated, grouped history.
//!
//! Steps (fixed order):
//!   1. Base records: the ledger feed when it carries movements, otherwise
//!      transaction records + deposit records. `MergeByTransactionId`
//!      instead tops the ledger feed up with derived records it lacks.
//!   2. Certificate echoes in the ledger feed leave the base and join the
//!      certificate index ahead of certificate-API rows.
//!   3. Trade Release certificates are dropped while trade-finance activity
//!      already shows the settlement as a plain movement.
//!   4. Certificates are indexed by correlation key; each
//!      (certificate identity, key) pair is attached at most once.
//!   5. One group per base record, children = the certificates on its key.
//!   6. Keys nobody claimed get a synthetic parent.
//!   7. Groups are sorted newest first; the sort is stable so ties keep
//!      input order.
//!
//! The reconciler never fails: bad numbers count as zero and every
//! recovery is reported as a `DataQualitySignal`.

use crate::{
    amount::Amount,
    config::{BasePolicy, ReconciliationConfig},
    record::{
        BaseRecord, CertificateKind, CertificateRecord, DepositRecord, LedgerEntry, ParentRecord,
        SyntheticParent, TransactionRecord,
    },
    signal::{DataQualitySignal, SignalLog},
    types::{TransactionId, FINABRIDGE_WALLET, FINAPAY_WALLET, VAULT_WALLET},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A movement and the certificates issued for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordGroup {
    pub parent: ParentRecord,
    pub children: Vec<CertificateRecord>,
}

impl RecordGroup {
    pub fn certificate_count(&self) -> usize {
        self.children.len()
    }

    /// Sum of the children's gold, malformed values counting as zero.
    pub fn children_gold_grams(&self) -> Decimal {
        self.children
            .iter()
            .map(|c| c.gold_grams.value())
            .fold(Decimal::ZERO, |acc, g| acc.checked_add(g).unwrap_or(acc))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub groups: Vec<RecordGroup>,
    pub signals: Vec<DataQualitySignal>,
}

pub struct LedgerReconciler {
    policy: BasePolicy,
}

impl Default for LedgerReconciler {
    fn default() -> Self {
        Self::new(&ReconciliationConfig::default())
    }
}

impl LedgerReconciler {
    pub fn new(config: &ReconciliationConfig) -> Self {
        Self {
            policy: config.base_policy,
        }
    }

    /// Group the four streams. Any stream may be empty.
    pub fn reconcile(
        &self,
        ledger_entries: &[LedgerEntry],
        transaction_records: &[TransactionRecord],
        deposit_records: &[DepositRecord],
        certificate_records: &[CertificateRecord],
        has_trade_finance_transactions: bool,
    ) -> Vec<RecordGroup> {
        self.reconcile_detailed(
            ledger_entries,
            transaction_records,
            deposit_records,
            certificate_records,
            has_trade_finance_transactions,
        )
        .groups
    }

    /// As `reconcile`, also returning the data-quality signals raised on the way.
    pub fn reconcile_detailed(
        &self,
        ledger_entries: &[LedgerEntry],
        transaction_records: &[TransactionRecord],
        deposit_records: &[DepositRecord],
        certificate_records: &[CertificateRecord],
        has_trade_finance_transactions: bool,
    ) -> ReconcileOutcome {
        let mut signals = SignalLog::new("reconcile");

        // ── Steps 1–2: base records and certificate echoes ─────────
        let (movements, echoes): (Vec<&LedgerEntry>, Vec<&LedgerEntry>) = ledger_entries
            .iter()
            .partition(|entry| !entry.is_certificate_shaped());

        for echo in &echoes {
            signals.push(DataQualitySignal::CertificateEchoRemoved {
                record_id: echo.id.clone(),
            });
        }

        let base = self.select_base(&movements, transaction_records, deposit_records);

        // ── Steps 3–4: certificate index ───────────────────────────
        let mut index = CertificateIndex::default();
        let ledger_certs = echoes.iter().map(|e| CertificateRecord::from_ledger_entry(e));
        let api_certs = certificate_records.iter().cloned();
        for cert in ledger_certs.chain(api_certs) {
            if has_trade_finance_transactions && cert.kind == CertificateKind::TradeRelease {
                continue;
            }
            index.insert(cert, &mut signals);
        }

        // ── Step 5: one group per base record ──────────────────────
        let base_count = base.len();
        let mut groups: Vec<RecordGroup> = base
            .into_iter()
            .map(|parent| {
                let children = parent
                    .transaction_id()
                    .and_then(correlation_key)
                    .map(|tx| index.take(&GroupKey::Transaction(tx.to_string())))
                    .unwrap_or_default();
                RecordGroup { parent, children }
            })
            .collect();

        // ── Step 6: synthetic parents for orphaned certificates ────
        let orphans = index.into_remaining();
        let synthetic_count = orphans.len();
        for (key, children) in orphans {
            let parent = synthesize_parent(&key, &children, &mut signals);
            groups.push(RecordGroup {
                parent: ParentRecord::Synthetic(parent),
                children,
            });
        }

        // ── Step 7: newest first ───────────────────────────────────
        groups.sort_by(|a, b| b.parent.created_at().cmp(&a.parent.created_at()));

        log::debug!(
            "reconcile: {} groups from {base_count} base records ({synthetic_count} synthetic, {} signals)",
            groups.len(),
            signals.len()
        );

        ReconcileOutcome {
            groups,
            signals: signals.into_vec(),
        }
    }

    fn select_base(
        &self,
        movements: &[&LedgerEntry],
        transaction_records: &[TransactionRecord],
        deposit_records: &[DepositRecord],
    ) -> Vec<ParentRecord> {
        let derived = transaction_records
            .iter()
            .filter(|r| !r.is_certificate_shaped())
            .cloned()
            .map(ParentRecord::from)
            .chain(
                deposit_records
                    .iter()
                    .filter(|r| !r.is_certificate_shaped())
                    .cloned()
                    .map(ParentRecord::from),
            );

        if movements.is_empty() {
            return derived.collect();
        }

        let ledger = movements.iter().map(|e| ParentRecord::Ledger((*e).clone()));
        match self.policy {
            BasePolicy::PreferLedgerFeed => ledger.collect(),
            BasePolicy::MergeByTransactionId => {
                let covered: HashSet<&str> = movements
                    .iter()
                    .flat_map(|e| [Some(e.id.as_str()), e.transaction_id.as_deref()])
                    .flatten()
                    .filter_map(correlation_key)
                    .collect();
                let missing: Vec<ParentRecord> = derived
                    .filter(|r| {
                        let key = r.transaction_id().and_then(correlation_key);
                        match key.or_else(|| correlation_key(r.id())) {
                            Some(key) => !covered.contains(key),
                            None => true,
                        }
                    })
                    .collect();
                ledger.chain(missing).collect()
            }
        }
    }
}

/// Group the four streams with the default base policy.
pub fn reconcile(
    ledger_entries: &[LedgerEntry],
    transaction_records: &[TransactionRecord],
    deposit_records: &[DepositRecord],
    certificate_records: &[CertificateRecord],
    has_trade_finance_transactions: bool,
) -> Vec<RecordGroup> {
    LedgerReconciler::default().reconcile(
        ledger_entries,
        transaction_records,
        deposit_records,
        certificate_records,
        has_trade_finance_transactions,
    )
}

/// True when any movement touches the trade-finance wallet, meaning trade
/// settlements are already visible without their Trade Release certificates.
pub fn has_trade_finance_activity(
    ledger_entries: &[LedgerEntry],
    transaction_records: &[TransactionRecord],
) -> bool {
    let touches = |from: &str, to: &str| {
        from.eq_ignore_ascii_case(FINABRIDGE_WALLET) || to.eq_ignore_ascii_case(FINABRIDGE_WALLET)
    };
    ledger_entries
        .iter()
        .filter(|e| !e.is_certificate_shaped())
        .any(|e| touches(&e.from_wallet, &e.to_wallet))
        || transaction_records
            .iter()
            .any(|r| touches(&r.from_wallet, &r.to_wallet))
}

// ── Certificate index ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Transaction(TransactionId),
    /// A certificate with no correlation key groups under its own identity.
    Unlinked(String),
}

impl GroupKey {
    fn for_certificate(cert: &CertificateRecord) -> Self {
        match cert.transaction_id.as_deref().and_then(correlation_key) {
            Some(tx) => Self::Transaction(tx.to_string()),
            None => Self::Unlinked(cert.identity().to_string()),
        }
    }
}

/// Correlation keys compare trimmed; a blank key is no key at all.
fn correlation_key(raw: &str) -> Option<&str> {
    let key = raw.trim();
    (!key.is_empty()).then_some(key)
}

/// Certificates by correlation key, in first-seen key order.
#[derive(Default)]
struct CertificateIndex {
    order: Vec<GroupKey>,
    by_key: HashMap<GroupKey, Vec<CertificateRecord>>,
    seen: HashSet<(String, GroupKey)>,
}

impl CertificateIndex {
    fn insert(&mut self, cert: CertificateRecord, signals: &mut SignalLog) {
        let key = GroupKey::for_certificate(&cert);
        let dedupe = (cert.identity().to_string(), key.clone());
        if !self.seen.insert(dedupe) {
            signals.push(DataQualitySignal::DuplicateCertificate {
                dedupe_key: format!("{}@{}", cert.identity(), key_label(&key)),
            });
            return;
        }
        if !self.by_key.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.by_key.entry(key).or_default().push(cert);
    }

    /// Remove and return the certificates on `key`, consuming the key.
    fn take(&mut self, key: &GroupKey) -> Vec<CertificateRecord> {
        self.by_key.remove(key).unwrap_or_default()
    }

    fn into_remaining(mut self) -> Vec<(GroupKey, Vec<CertificateRecord>)> {
        self.order
            .into_iter()
            .filter_map(|key| self.by_key.remove(&key).map(|certs| (key, certs)))
            .collect()
    }
}

fn key_label(key: &GroupKey) -> &str {
    match key {
        GroupKey::Transaction(tx) => tx,
        GroupKey::Unlinked(_) => "unlinked",
    }
}

// ── Synthetic parents ─────────────────────────────────────────────

fn synthesize_parent(
    key: &GroupKey,
    children: &[CertificateRecord],
    signals: &mut SignalLog,
) -> SyntheticParent {
    let mut gold = Decimal::ZERO;
    let mut value = Decimal::ZERO;
    for child in children {
        let g = signals.amount(&child.id, "goldGrams", &child.gold_grams);
        gold = signals.add("synthetic.goldGrams", gold, g);
        if let Some(usd) = &child.value_usd {
            let v = signals.amount(&child.id, "valueUsd", usd);
            value = signals.add("synthetic.valueUsd", value, v);
        }
    }

    let (id, transaction_id) = match key {
        GroupKey::Transaction(tx) => (format!("synthetic-{tx}"), Some(tx.clone())),
        GroupKey::Unlinked(identity) => (format!("synthetic-{identity}"), None),
    };

    SyntheticParent {
        id,
        // Index entries are never empty; the epoch fallback only keeps this total.
        created_at: children.first().map(|c| c.created_at).unwrap_or_default(),
        action: synthetic_action(children).to_string(),
        status: "Completed".into(),
        from_wallet: VAULT_WALLET.into(),
        to_wallet: FINAPAY_WALLET.into(),
        gold_grams: Amount::from_decimal(gold),
        value_usd: Amount::from_decimal(value),
        transaction_id,
    }
}

fn synthetic_action(children: &[CertificateRecord]) -> &'static str {
    let physical = children.iter().any(|c| c.kind == CertificateKind::PhysicalStorage);
    let digital = children.iter().any(|c| c.kind == CertificateKind::DigitalOwnership);
    let other = children.iter().any(|c| {
        !matches!(
            c.kind,
            CertificateKind::PhysicalStorage | CertificateKind::DigitalOwnership
        )
    });
    match (physical, digital, other) {
        (true, false, false) => "Physical Storage Deposit",
        (false, true, false) => "Digital Storage Deposit",
        _ => "Vault Deposit",
    }
}
