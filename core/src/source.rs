//! Snapshot sources and the concurrent fetch.
//!
//! RULE: One failed stream never fails the others. Every stream is
//! fetched on its own worker with its own timeout; a stream that errors,
//! panics or runs late keeps its empty/null default and raises a
//! `StreamUnavailable` signal.

use crate::{
    amount::Amount,
    balance::{FinaBridgeWallet, OwnershipSummary, SavingsPlan, SpotWallet, VaultHolding},
    config::FetchConfig,
    error::CustodyError,
    record::{Certificate, DepositRequest, LedgerEntry, RawTransaction},
    signal::{DataQualitySignal, SignalLog},
    snapshot::CustodySnapshot,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt,
    path::PathBuf,
    sync::{mpsc, Arc},
    thread,
    time::Instant,
};

/// Every independently fetched input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    LedgerEntries,
    Transactions,
    Deposits,
    Certificates,
    OwnershipSummary,
    VaultHoldings,
    FinaBridgeWallet,
    SavingsPlans,
    SpotWallet,
    GoldPrice,
}

impl StreamKind {
    pub const ALL: [StreamKind; 10] = [
        StreamKind::LedgerEntries,
        StreamKind::Transactions,
        StreamKind::Deposits,
        StreamKind::Certificates,
        StreamKind::OwnershipSummary,
        StreamKind::VaultHoldings,
        StreamKind::FinaBridgeWallet,
        StreamKind::SavingsPlans,
        StreamKind::SpotWallet,
        StreamKind::GoldPrice,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StreamKind::LedgerEntries    => "ledger_entries",
            StreamKind::Transactions     => "transactions",
            StreamKind::Deposits         => "deposits",
            StreamKind::Certificates     => "certificates",
            StreamKind::OwnershipSummary => "ownership_summary",
            StreamKind::VaultHoldings    => "vault_holdings",
            StreamKind::FinaBridgeWallet => "finabridge_wallet",
            StreamKind::SavingsPlans     => "savings_plans",
            StreamKind::SpotWallet       => "spot_wallet",
            StreamKind::GoldPrice        => "gold_price",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.json", self.name())
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The fetched contents of one stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    LedgerEntries(Vec<LedgerEntry>),
    Transactions(Vec<RawTransaction>),
    Deposits(Vec<DepositRequest>),
    Certificates(Vec<Certificate>),
    OwnershipSummary(Option<OwnershipSummary>),
    VaultHoldings(Vec<VaultHolding>),
    FinaBridgeWallet(Option<FinaBridgeWallet>),
    SavingsPlans(Vec<SavingsPlan>),
    SpotWallet(Option<SpotWallet>),
    GoldPrice(Option<Amount>),
}

impl StreamPayload {
    pub fn kind(&self) -> StreamKind {
        match self {
            StreamPayload::LedgerEntries(_)    => StreamKind::LedgerEntries,
            StreamPayload::Transactions(_)     => StreamKind::Transactions,
            StreamPayload::Deposits(_)         => StreamKind::Deposits,
            StreamPayload::Certificates(_)     => StreamKind::Certificates,
            StreamPayload::OwnershipSummary(_) => StreamKind::OwnershipSummary,
            StreamPayload::VaultHoldings(_)    => StreamKind::VaultHoldings,
            StreamPayload::FinaBridgeWallet(_) => StreamKind::FinaBridgeWallet,
            StreamPayload::SavingsPlans(_)     => StreamKind::SavingsPlans,
            StreamPayload::SpotWallet(_)       => StreamKind::SpotWallet,
            StreamPayload::GoldPrice(_)        => StreamKind::GoldPrice,
        }
    }

    /// Decode a stream from its JSON response body.
    pub fn parse(stream: StreamKind, json: &str) -> serde_json::Result<Self> {
        Ok(match stream {
            StreamKind::LedgerEntries    => StreamPayload::LedgerEntries(serde_json::from_str(json)?),
            StreamKind::Transactions     => StreamPayload::Transactions(serde_json::from_str(json)?),
            StreamKind::Deposits         => StreamPayload::Deposits(serde_json::from_str(json)?),
            StreamKind::Certificates     => StreamPayload::Certificates(serde_json::from_str(json)?),
            StreamKind::OwnershipSummary => StreamPayload::OwnershipSummary(serde_json::from_str(json)?),
            StreamKind::VaultHoldings    => StreamPayload::VaultHoldings(serde_json::from_str(json)?),
            StreamKind::FinaBridgeWallet => StreamPayload::FinaBridgeWallet(serde_json::from_str(json)?),
            StreamKind::SavingsPlans     => StreamPayload::SavingsPlans(serde_json::from_str(json)?),
            StreamKind::SpotWallet       => StreamPayload::SpotWallet(serde_json::from_str(json)?),
            StreamKind::GoldPrice        => StreamPayload::GoldPrice(serde_json::from_str(json)?),
        })
    }
}

/// Anything that can produce the input streams. Called from worker threads.
pub trait CustodySource: Send + Sync + 'static {
    fn fetch(&self, stream: StreamKind) -> anyhow::Result<StreamPayload>;
}

/// A snapshot already in memory serves its own streams.
impl CustodySource for CustodySnapshot {
    fn fetch(&self, stream: StreamKind) -> anyhow::Result<StreamPayload> {
        Ok(self.payload(stream))
    }
}

/// Reads one `<stream>.json` file per stream from a directory.
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CustodySource for JsonDirSource {
    fn fetch(&self, stream: StreamKind) -> anyhow::Result<StreamPayload> {
        let path = self.dir.join(stream.file_name());
        if !path.exists() {
            return Err(CustodyError::StreamUnavailable {
                stream,
                reason: format!("{} not found", path.display()),
            }
            .into());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let payload = StreamPayload::parse(stream, &content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {}: {e}", path.display()))?;
        Ok(payload)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub snapshot: CustodySnapshot,
    pub signals: Vec<DataQualitySignal>,
}

/// Fetch every stream concurrently and assemble a snapshot.
///
/// Never fails. Workers that outlive their timeout are abandoned; their
/// late results are discarded.
pub fn fetch_snapshot<S: CustodySource>(source: Arc<S>, config: &FetchConfig) -> FetchOutcome {
    let mut signals = SignalLog::new("fetch");
    let mut snapshot = CustodySnapshot::default();
    let (tx, rx) = mpsc::channel::<(StreamKind, anyhow::Result<StreamPayload>)>();

    let started = Instant::now();
    let mut pending: BTreeMap<StreamKind, Instant> = BTreeMap::new();

    for stream in StreamKind::ALL {
        let tx = tx.clone();
        let source = Arc::clone(&source);
        let spawned = thread::Builder::new()
            .name(format!("fetch-{stream}"))
            .spawn(move || {
                let result = source.fetch(stream);
                // The receiver is gone once the fetch has given up on us.
                let _ = tx.send((stream, result));
            });
        match spawned {
            Ok(_) => {
                pending.insert(stream, started + config.timeout_for(stream));
            }
            Err(e) => signals.push(DataQualitySignal::StreamUnavailable {
                stream,
                reason: format!("worker spawn failed: {e}"),
            }),
        }
    }
    drop(tx);

    while !pending.is_empty() {
        let now = Instant::now();
        let expired: Vec<StreamKind> = pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(stream, _)| *stream)
            .collect();
        for stream in expired {
            pending.remove(&stream);
            signals.push(DataQualitySignal::StreamUnavailable {
                stream,
                reason: format!("timed out after {:?}", config.timeout_for(stream)),
            });
        }

        let Some(next_deadline) = pending.values().min().copied() else {
            break;
        };

        match rx.recv_timeout(next_deadline.saturating_duration_since(now)) {
            Ok((stream, result)) => {
                if pending.remove(&stream).is_none() {
                    continue;
                }
                match result {
                    Ok(payload) if payload.kind() == stream => snapshot.apply(payload),
                    Ok(payload) => signals.push(DataQualitySignal::StreamUnavailable {
                        stream,
                        reason: format!("source returned {} data", payload.kind()),
                    }),
                    Err(e) => signals.push(DataQualitySignal::StreamUnavailable {
                        stream,
                        reason: format!("{e:#}"),
                    }),
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                // Every worker has exited; whatever is still pending panicked.
                for stream in std::mem::take(&mut pending).into_keys() {
                    signals.push(DataQualitySignal::StreamUnavailable {
                        stream,
                        reason: "worker exited without a result".into(),
                    });
                }
            }
        }
    }

    log::debug!(
        "fetch: snapshot assembled in {:?} with {} unavailable streams",
        started.elapsed(),
        signals.len()
    );

    FetchOutcome {
        snapshot,
        signals: signals.into_vec(),
    }
}
