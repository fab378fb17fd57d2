//! Snapshot: every input of one refresh cycle, to/from JSON.
//!
//! A snapshot is immutable once assembled. Each field defaults when
//! absent, so a snapshot with failed or missing streams still loads and
//! still reconciles.

use crate::{
    amount::Amount,
    balance::{FinaBridgeWallet, OwnershipSummary, SavingsPlan, SpotWallet, VaultHolding},
    error::CustodyResult,
    reconciliation::has_trade_finance_activity,
    record::{
        Certificate, CertificateRecord, DepositRecord, DepositRequest, LedgerEntry,
        RawTransaction, TransactionRecord,
    },
    source::{StreamKind, StreamPayload},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustodySnapshot {
    pub ledger_entries: Vec<LedgerEntry>,
    pub transactions: Vec<RawTransaction>,
    pub deposits: Vec<DepositRequest>,
    pub certificates: Vec<Certificate>,
    pub ownership_summary: Option<OwnershipSummary>,
    pub vault_holdings: Vec<VaultHolding>,
    pub finabridge_wallet: Option<FinaBridgeWallet>,
    pub savings_plans: Vec<SavingsPlan>,
    pub spot_wallet: Option<SpotWallet>,
    pub gold_price_per_gram: Option<Amount>,
    /// Stated by upstream when known; otherwise inferred from the movements.
    pub has_trade_finance_transactions: Option<bool>,
}

impl CustodySnapshot {
    pub fn from_json(json: &str) -> CustodyResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> CustodyResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn transaction_records(&self) -> Vec<TransactionRecord> {
        self.transactions.iter().map(TransactionRecord::from_raw).collect()
    }

    pub fn deposit_records(&self) -> Vec<DepositRecord> {
        self.deposits.iter().map(DepositRecord::from_request).collect()
    }

    pub fn certificate_records(&self) -> Vec<CertificateRecord> {
        self.certificates
            .iter()
            .map(CertificateRecord::from_certificate)
            .collect()
    }

    pub fn has_trade_finance_transactions(&self, transaction_records: &[TransactionRecord]) -> bool {
        self.has_trade_finance_transactions
            .unwrap_or_else(|| has_trade_finance_activity(&self.ledger_entries, transaction_records))
    }

    /// Replace one stream with freshly fetched data.
    pub fn apply(&mut self, payload: StreamPayload) {
        match payload {
            StreamPayload::LedgerEntries(v)    => self.ledger_entries = v,
            StreamPayload::Transactions(v)     => self.transactions = v,
            StreamPayload::Deposits(v)         => self.deposits = v,
            StreamPayload::Certificates(v)     => self.certificates = v,
            StreamPayload::OwnershipSummary(v) => self.ownership_summary = v,
            StreamPayload::VaultHoldings(v)    => self.vault_holdings = v,
            StreamPayload::FinaBridgeWallet(v) => self.finabridge_wallet = v,
            StreamPayload::SavingsPlans(v)     => self.savings_plans = v,
            StreamPayload::SpotWallet(v)       => self.spot_wallet = v,
            StreamPayload::GoldPrice(v)        => self.gold_price_per_gram = v,
        }
    }

    /// The current contents of one stream.
    pub fn payload(&self, stream: StreamKind) -> StreamPayload {
        match stream {
            StreamKind::LedgerEntries    => StreamPayload::LedgerEntries(self.ledger_entries.clone()),
            StreamKind::Transactions     => StreamPayload::Transactions(self.transactions.clone()),
            StreamKind::Deposits         => StreamPayload::Deposits(self.deposits.clone()),
            StreamKind::Certificates     => StreamPayload::Certificates(self.certificates.clone()),
            StreamKind::OwnershipSummary => StreamPayload::OwnershipSummary(self.ownership_summary.clone()),
            StreamKind::VaultHoldings    => StreamPayload::VaultHoldings(self.vault_holdings.clone()),
            StreamKind::FinaBridgeWallet => StreamPayload::FinaBridgeWallet(self.finabridge_wallet.clone()),
            StreamKind::SavingsPlans     => StreamPayload::SavingsPlans(self.savings_plans.clone()),
            StreamKind::SpotWallet       => StreamPayload::SpotWallet(self.spot_wallet.clone()),
            StreamKind::GoldPrice        => StreamPayload::GoldPrice(self.gold_price_per_gram.clone()),
        }
    }
}
