use crate::{amount::Amount, source::StreamKind};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};

// ── Reconciliation ─────────────────────────────────────────────────

/// How the reconciler picks its base records when the ledger feed is present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasePolicy {
    /// A non-empty ledger feed replaces the transaction and deposit records.
    #[default]
    PreferLedgerFeed,
    /// The ledger feed is topped up with derived records it does not already carry.
    MergeByTransactionId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    #[serde(default)]
    pub base_policy: BasePolicy,
}

// ── Balances ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BalanceConfig {
    /// Used only when the snapshot carries no gold price.
    #[serde(default)]
    pub fallback_gold_price_per_gram: Option<Amount>,
}

// ── Snapshot fetch ─────────────────────────────────────────────────

pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Per-stream overrides, keyed by stream name (e.g. "certificates").
    #[serde(default)]
    pub stream_timeouts_ms: HashMap<StreamKind, u64>,
}

fn default_fetch_timeout_ms() -> u64 {
    DEFAULT_FETCH_TIMEOUT_MS
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            stream_timeouts_ms: HashMap::new(),
        }
    }
}

impl FetchConfig {
    pub fn timeout_for(&self, stream: StreamKind) -> Duration {
        let ms = self
            .stream_timeouts_ms
            .get(&stream)
            .copied()
            .unwrap_or(self.default_timeout_ms);
        Duration::from_millis(ms)
    }
}

// ── Top level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustodyConfig {
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub balances: BalanceConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl CustodyConfig {
    /// Load from the data/ directory.
    /// In tests, use CustodyConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/config/custody.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: CustodyConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        Ok(config)
    }

    /// Defaults with short fetch timeouts so slow-source tests finish quickly.
    pub fn default_test() -> Self {
        Self {
            reconciliation: ReconciliationConfig {
                base_policy: BasePolicy::PreferLedgerFeed,
            },
            balances: BalanceConfig {
                fallback_gold_price_per_gram: None,
            },
            fetch: FetchConfig {
                default_timeout_ms: 200,
                stream_timeouts_ms: HashMap::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_config_loads() {
        let config = CustodyConfig::load("../data").unwrap();
        assert_eq!(config.reconciliation.base_policy, BasePolicy::PreferLedgerFeed);
        assert_eq!(
            config.balances.fallback_gold_price_per_gram,
            Some(Amount::new("85.00"))
        );
        assert_eq!(config.fetch.timeout_for(StreamKind::Certificates), Duration::from_secs(8));
        assert_eq!(config.fetch.timeout_for(StreamKind::Deposits), Duration::from_secs(5));
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: CustodyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.reconciliation.base_policy, BasePolicy::PreferLedgerFeed);
        assert_eq!(config.fetch.default_timeout_ms, DEFAULT_FETCH_TIMEOUT_MS);
        assert!(config.balances.fallback_gold_price_per_gram.is_none());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = CustodyConfig::load("/nonexistent/custody").unwrap_err();
        assert!(err.to_string().contains("Cannot read"));
    }
}
