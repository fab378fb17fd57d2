//! Record shapes for the four movement streams.
//!
//! Upstream hands over raw transactions, deposit requests and issued
//! certificates; each is projected 1:1 into a record that shares the
//! ledger-entry shape. Records are immutable snapshots: nothing in the
//! core mutates them after projection.

use crate::{
    amount::Amount,
    types::{
        RecordId, Timestamp, TransactionId, BANK_TRANSFER, EXTERNAL_WALLET, FINAPAY_WALLET,
    },
};
use serde::{Deserialize, Serialize};

/// Common read-only view over every record that can head or join a group.
pub trait BaseRecord {
    fn id(&self) -> &str;
    fn created_at(&self) -> Timestamp;
    fn action(&self) -> &str;
    fn transaction_id(&self) -> Option<&str>;
    fn gold_grams(&self) -> &Amount;
    fn value_usd(&self) -> Option<&Amount>;

    /// True when the record is really a certificate travelling through a movement feed.
    fn is_certificate_shaped(&self) -> bool {
        CertificateKind::is_certificate_action(self.action())
    }
}

// ── Certificate kinds ─────────────────────────────────────────────

/// Wire form is the display label, read the same lenient way for every feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum CertificateKind {
    PhysicalStorage,
    DigitalOwnership,
    TradeRelease,
    Unknown,
}

impl CertificateKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::PhysicalStorage  => "Physical Storage",
            Self::DigitalOwnership => "Digital Ownership",
            Self::TradeRelease     => "Trade Release",
            Self::Unknown          => "Certificate",
        }
    }

    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        [Self::PhysicalStorage, Self::DigitalOwnership, Self::TradeRelease]
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(label))
            .unwrap_or(Self::Unknown)
    }

    /// Actions that only ever describe a certificate, never a movement.
    pub fn is_certificate_action(action: &str) -> bool {
        matches!(
            Self::from_label(action),
            Self::PhysicalStorage | Self::DigitalOwnership
        )
    }
}

impl From<String> for CertificateKind {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<CertificateKind> for &'static str {
    fn from(kind: CertificateKind) -> Self {
        kind.label()
    }
}

/// Which feed a certificate record arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateSource {
    LedgerFeed,
    CertificateApi,
}

// ── Ledger feed ───────────────────────────────────────────────────

/// A movement from the authoritative ledger feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: RecordId,
    pub created_at: Timestamp,
    pub action: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub from_wallet: String,
    #[serde(default)]
    pub to_wallet: String,
    #[serde(default)]
    pub gold_grams: Amount,
    #[serde(default)]
    pub value_usd: Option<Amount>,
    #[serde(default)]
    pub transaction_id: Option<TransactionId>,
    #[serde(default)]
    pub balance_after_grams: Amount,
    /// Set when the feed echoes an issued certificate.
    #[serde(default)]
    pub certificate_number: Option<String>,
    #[serde(default)]
    pub is_certificate: bool,
}

impl BaseRecord for LedgerEntry {
    fn id(&self) -> &str {
        &self.id
    }
    fn created_at(&self) -> Timestamp {
        self.created_at
    }
    fn action(&self) -> &str {
        &self.action
    }
    fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }
    fn gold_grams(&self) -> &Amount {
        &self.gold_grams
    }
    fn value_usd(&self) -> Option<&Amount> {
        self.value_usd.as_ref()
    }
    fn is_certificate_shaped(&self) -> bool {
        self.is_certificate || CertificateKind::is_certificate_action(&self.action)
    }
}

// ── Raw transactions ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Buy,
    Sell,
    Send,
    Receive,
    Deposit,
    Withdrawal,
    Other,
}

impl TransactionType {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "buy"        => Self::Buy,
            "sell"       => Self::Sell,
            "send"       => Self::Send,
            "receive"    => Self::Receive,
            "deposit"    => Self::Deposit,
            "withdrawal" => Self::Withdrawal,
            _            => Self::Other,
        }
    }

    /// `(from_wallet, to_wallet)` implied by the transaction direction.
    pub fn wallets(self) -> (&'static str, &'static str) {
        match self {
            Self::Receive | Self::Deposit | Self::Buy    => (EXTERNAL_WALLET, FINAPAY_WALLET),
            Self::Send | Self::Withdrawal | Self::Sell   => (FINAPAY_WALLET, EXTERNAL_WALLET),
            Self::Other                                  => (FINAPAY_WALLET, FINAPAY_WALLET),
        }
    }
}

/// A user transaction as returned by the transactions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub id: RecordId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub gold_grams: Amount,
    #[serde(default)]
    pub amount_usd: Option<Amount>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub description: Option<String>,
}

/// Ledger-shaped projection of a raw transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: RecordId,
    pub created_at: Timestamp,
    pub action: String,
    pub status: String,
    pub from_wallet: String,
    pub to_wallet: String,
    pub gold_grams: Amount,
    pub value_usd: Option<Amount>,
    pub transaction_id: Option<TransactionId>,
    pub description: Option<String>,
}

impl TransactionRecord {
    pub fn from_raw(raw: &RawTransaction) -> Self {
        let (from_wallet, to_wallet) = TransactionType::from_label(&raw.kind).wallets();
        Self {
            id: raw.id.clone(),
            created_at: raw.created_at,
            action: raw.kind.clone(),
            status: raw.status.clone(),
            from_wallet: from_wallet.to_string(),
            to_wallet: to_wallet.to_string(),
            gold_grams: raw.gold_grams.clone(),
            value_usd: raw.amount_usd.clone(),
            transaction_id: Some(raw.id.clone()),
            description: raw.description.clone(),
        }
    }
}

impl BaseRecord for TransactionRecord {
    fn id(&self) -> &str {
        &self.id
    }
    fn created_at(&self) -> Timestamp {
        self.created_at
    }
    fn action(&self) -> &str {
        &self.action
    }
    fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }
    fn gold_grams(&self) -> &Amount {
        &self.gold_grams
    }
    fn value_usd(&self) -> Option<&Amount> {
        self.value_usd.as_ref()
    }
}

// ── Bank deposits ─────────────────────────────────────────────────

/// A bank-deposit request as returned by the deposits endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub id: RecordId,
    #[serde(default)]
    pub reference_number: String,
    #[serde(default)]
    pub amount_usd: Amount,
    #[serde(default)]
    pub status: String,
    pub created_at: Timestamp,
}

/// Ledger-shaped projection of a deposit request. Cash only, so no gold moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRecord {
    pub id: RecordId,
    pub created_at: Timestamp,
    pub action: String,
    pub status: String,
    pub from_wallet: String,
    pub to_wallet: String,
    pub gold_grams: Amount,
    pub value_usd: Option<Amount>,
    pub transaction_id: Option<TransactionId>,
    pub reference_number: String,
}

impl DepositRecord {
    pub fn from_request(request: &DepositRequest) -> Self {
        Self {
            id: request.id.clone(),
            created_at: request.created_at,
            action: "Deposit".into(),
            status: request.status.clone(),
            from_wallet: BANK_TRANSFER.into(),
            to_wallet: FINAPAY_WALLET.into(),
            gold_grams: Amount::zero(),
            value_usd: Some(request.amount_usd.clone()),
            transaction_id: Some(request.id.clone()),
            reference_number: request.reference_number.clone(),
        }
    }
}

impl BaseRecord for DepositRecord {
    fn id(&self) -> &str {
        &self.id
    }
    fn created_at(&self) -> Timestamp {
        self.created_at
    }
    fn action(&self) -> &str {
        &self.action
    }
    fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }
    fn gold_grams(&self) -> &Amount {
        &self.gold_grams
    }
    fn value_usd(&self) -> Option<&Amount> {
        self.value_usd.as_ref()
    }
}

// ── Certificates ──────────────────────────────────────────────────

/// An issued certificate as returned by the certificates endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: RecordId,
    #[serde(default)]
    pub certificate_number: Option<String>,
    #[serde(rename = "type")]
    pub kind: CertificateKind,
    #[serde(default)]
    pub gold_grams: Amount,
    #[serde(default)]
    pub total_value_usd: Option<Amount>,
    #[serde(default)]
    pub transaction_id: Option<TransactionId>,
    #[serde(default)]
    pub status: String,
    pub issued_at: Timestamp,
}

/// A certificate attached under a movement. Never a group parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    pub id: RecordId,
    pub created_at: Timestamp,
    pub kind: CertificateKind,
    pub certificate_number: Option<String>,
    pub transaction_id: Option<TransactionId>,
    pub gold_grams: Amount,
    pub value_usd: Option<Amount>,
    pub status: String,
    pub source: CertificateSource,
}

impl CertificateRecord {
    pub fn from_certificate(cert: &Certificate) -> Self {
        Self {
            id: cert.id.clone(),
            created_at: cert.issued_at,
            kind: cert.kind,
            certificate_number: cert.certificate_number.clone(),
            transaction_id: cert.transaction_id.clone(),
            gold_grams: cert.gold_grams.clone(),
            value_usd: cert.total_value_usd.clone(),
            status: cert.status.clone(),
            source: CertificateSource::CertificateApi,
        }
    }

    pub fn from_ledger_entry(entry: &LedgerEntry) -> Self {
        Self {
            id: entry.id.clone(),
            created_at: entry.created_at,
            kind: CertificateKind::from_label(&entry.action),
            certificate_number: entry.certificate_number.clone(),
            transaction_id: entry.transaction_id.clone(),
            gold_grams: entry.gold_grams.clone(),
            value_usd: entry.value_usd.clone(),
            status: entry.status.clone(),
            source: CertificateSource::LedgerFeed,
        }
    }

    /// The certificate number when present, else the record id.
    pub fn identity(&self) -> &str {
        match self.certificate_number.as_deref() {
            Some(number) if !number.trim().is_empty() => number,
            _ => &self.id,
        }
    }
}

impl BaseRecord for CertificateRecord {
    fn id(&self) -> &str {
        &self.id
    }
    fn created_at(&self) -> Timestamp {
        self.created_at
    }
    fn action(&self) -> &str {
        self.kind.label()
    }
    fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }
    fn gold_grams(&self) -> &Amount {
        &self.gold_grams
    }
    fn value_usd(&self) -> Option<&Amount> {
        self.value_usd.as_ref()
    }
    fn is_certificate_shaped(&self) -> bool {
        true
    }
}

// ── Group parents ─────────────────────────────────────────────────

/// Header manufactured for certificates with no correlating movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticParent {
    pub id: RecordId,
    pub created_at: Timestamp,
    pub action: String,
    pub status: String,
    pub from_wallet: String,
    pub to_wallet: String,
    pub gold_grams: Amount,
    pub value_usd: Amount,
    pub transaction_id: Option<TransactionId>,
}

impl BaseRecord for SyntheticParent {
    fn id(&self) -> &str {
        &self.id
    }
    fn created_at(&self) -> Timestamp {
        self.created_at
    }
    fn action(&self) -> &str {
        &self.action
    }
    fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }
    fn gold_grams(&self) -> &Amount {
        &self.gold_grams
    }
    fn value_usd(&self) -> Option<&Amount> {
        Some(&self.value_usd)
    }
    fn is_certificate_shaped(&self) -> bool {
        false
    }
}

/// Anything that may head a record group. Certificates are deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParentRecord {
    Ledger(LedgerEntry),
    Transaction(TransactionRecord),
    Deposit(DepositRecord),
    Synthetic(SyntheticParent),
}

impl ParentRecord {
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::Synthetic(_))
    }

    fn inner(&self) -> &dyn BaseRecord {
        match self {
            Self::Ledger(r)      => r,
            Self::Transaction(r) => r,
            Self::Deposit(r)     => r,
            Self::Synthetic(r)   => r,
        }
    }
}

impl BaseRecord for ParentRecord {
    fn id(&self) -> &str {
        self.inner().id()
    }
    fn created_at(&self) -> Timestamp {
        self.inner().created_at()
    }
    fn action(&self) -> &str {
        self.inner().action()
    }
    fn transaction_id(&self) -> Option<&str> {
        self.inner().transaction_id()
    }
    fn gold_grams(&self) -> &Amount {
        self.inner().gold_grams()
    }
    fn value_usd(&self) -> Option<&Amount> {
        self.inner().value_usd()
    }
    fn is_certificate_shaped(&self) -> bool {
        self.inner().is_certificate_shaped()
    }
}

impl From<LedgerEntry> for ParentRecord {
    fn from(entry: LedgerEntry) -> Self {
        Self::Ledger(entry)
    }
}

impl From<TransactionRecord> for ParentRecord {
    fn from(record: TransactionRecord) -> Self {
        Self::Transaction(record)
    }
}

impl From<DepositRecord> for ParentRecord {
    fn from(record: DepositRecord) -> Self {
        Self::Deposit(record)
    }
}
