//! Multi-wallet balance derivation.
//!
//! Two paths:
//!   - Summary: an `OwnershipSummary` is authoritative; every figure is
//!     read straight from it with no cross-check against raw holdings.
//!   - Fallback: no summary; figures are derived from vault holdings,
//!     the trade-finance wallet and the savings plans.
//!
//! Either way every gram figure is >= 0. Negative intermediates are
//! clamped and reported, never returned.

use crate::{
    amount::Amount,
    signal::{DataQualitySignal, SignalLog},
    types::RecordId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ── Inputs ────────────────────────────────────────────────────────

/// Authoritative per-user snapshot of gold across all sub-wallets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OwnershipSummary {
    pub total_gold_grams: Amount,
    pub available_grams: Amount,
    pub locked_bnsl_grams: Amount,
    pub reserved_trade_grams: Amount,
    pub fina_pay_grams: Amount,
    pub bnsl_available_grams: Amount,
    pub fina_bridge_available_grams: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultHolding {
    pub id: RecordId,
    #[serde(default)]
    pub gold_grams: Amount,
    #[serde(default)]
    pub vault_location: Option<String>,
}

/// The trade-finance (FinaBridge) wallet. Only aggregate figures are exposed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinaBridgeWallet {
    pub available_gold_grams: Amount,
    pub locked_gold_grams: Amount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    Active,
    #[serde(rename = "Pending Activation")]
    PendingActivation,
    Maturing,
    Completed,
    Cancelled,
    #[serde(other)]
    Other,
}

impl PlanStatus {
    /// Only these statuses still hold the sold gold.
    pub fn encumbers_gold(self) -> bool {
        matches!(self, Self::Active | Self::PendingActivation | Self::Maturing)
    }
}

/// A buy-now-sell-later (BNSL) savings plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsPlan {
    pub id: RecordId,
    pub status: PlanStatus,
    #[serde(default)]
    pub gold_sold_grams: Amount,
}

/// The spot (FinaPay) wallet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpotWallet {
    pub gold_grams: Amount,
    pub usd_balance: Amount,
}

// ── Output ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSource {
    OwnershipSummary,
    #[default]
    Derived,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalances {
    pub total_vault_gold: Decimal,
    pub available_gold: Decimal,
    pub bnsl_locked_grams: Decimal,
    pub finabridge_locked_grams: Decimal,
    pub usd_balance: Decimal,
    pub available_gold_value_usd: Decimal,
    pub total_available_usd: Decimal,
    pub total_vault_value_usd: Decimal,
    pub finapay_grams: Decimal,
    pub bnsl_available_grams: Decimal,
    pub finabridge_available_grams: Decimal,
    pub source: BalanceSource,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateOutcome {
    pub balances: WalletBalances,
    pub signals: Vec<DataQualitySignal>,
}

/// Derive wallet balances. Total: returns a value for any input.
pub fn aggregate(
    ownership_summary: Option<&OwnershipSummary>,
    vault_holdings: &[VaultHolding],
    finabridge_wallet: Option<&FinaBridgeWallet>,
    savings_plans: &[SavingsPlan],
    gold_price_per_gram: Option<Decimal>,
    usd_balance: Decimal,
) -> WalletBalances {
    aggregate_detailed(
        ownership_summary,
        vault_holdings,
        finabridge_wallet,
        savings_plans,
        gold_price_per_gram,
        usd_balance,
    )
    .balances
}

/// As `aggregate`, also returning the data-quality signals raised on the way.
pub fn aggregate_detailed(
    ownership_summary: Option<&OwnershipSummary>,
    vault_holdings: &[VaultHolding],
    finabridge_wallet: Option<&FinaBridgeWallet>,
    savings_plans: &[SavingsPlan],
    gold_price_per_gram: Option<Decimal>,
    usd_balance: Decimal,
) -> AggregateOutcome {
    let mut signals = SignalLog::new("balances");

    let mut balances = match ownership_summary {
        Some(summary) => from_summary(summary, &mut signals),
        None => derive(vault_holdings, finabridge_wallet, savings_plans, &mut signals),
    };

    let price = signals.non_negative("goldPricePerGram", gold_price_per_gram.unwrap_or_default());
    let cash = signals.non_negative("usdBalance", usd_balance);

    balances.usd_balance = cash;
    balances.available_gold_value_usd =
        signals.mul("availableGoldValueUsd", balances.available_gold, price);
    balances.total_available_usd =
        signals.add("totalAvailableUsd", balances.available_gold_value_usd, cash);
    balances.total_vault_value_usd =
        signals.mul("totalVaultValueUsd", balances.total_vault_gold, price);

    log::debug!(
        "balances: {:?} path, total={} available={} bnsl_locked={} finabridge_locked={}",
        balances.source,
        balances.total_vault_gold,
        balances.available_gold,
        balances.bnsl_locked_grams,
        balances.finabridge_locked_grams
    );

    AggregateOutcome {
        balances,
        signals: signals.into_vec(),
    }
}

fn from_summary(summary: &OwnershipSummary, signals: &mut SignalLog) -> WalletBalances {
    let mut read = |field: &str, amount: &Amount| {
        let value = signals.amount("ownershipSummary", field, amount);
        signals.non_negative(field, value)
    };

    WalletBalances {
        total_vault_gold: read("totalGoldGrams", &summary.total_gold_grams),
        available_gold: read("availableGrams", &summary.available_grams),
        bnsl_locked_grams: read("lockedBnslGrams", &summary.locked_bnsl_grams),
        finabridge_locked_grams: read("reservedTradeGrams", &summary.reserved_trade_grams),
        finapay_grams: read("finaPayGrams", &summary.fina_pay_grams),
        bnsl_available_grams: read("bnslAvailableGrams", &summary.bnsl_available_grams),
        finabridge_available_grams: read(
            "finaBridgeAvailableGrams",
            &summary.fina_bridge_available_grams,
        ),
        source: BalanceSource::OwnershipSummary,
        ..WalletBalances::default()
    }
}

fn derive(
    vault_holdings: &[VaultHolding],
    finabridge_wallet: Option<&FinaBridgeWallet>,
    savings_plans: &[SavingsPlan],
    signals: &mut SignalLog,
) -> WalletBalances {
    let mut total = Decimal::ZERO;
    for holding in vault_holdings {
        let grams = signals.amount(&holding.id, "goldGrams", &holding.gold_grams);
        total = signals.add("totalVaultGold", total, grams);
    }
    let total = signals.non_negative("totalVaultGold", total);

    let mut bnsl_locked = Decimal::ZERO;
    for plan in savings_plans.iter().filter(|p| p.status.encumbers_gold()) {
        let grams = signals.amount(&plan.id, "goldSoldGrams", &plan.gold_sold_grams);
        bnsl_locked = signals.add("bnslLockedGrams", bnsl_locked, grams);
    }
    let bnsl_locked = signals.non_negative("bnslLockedGrams", bnsl_locked);

    let (finabridge_locked, finabridge_available) = match finabridge_wallet {
        Some(wallet) => {
            let locked = signals.amount("finaBridgeWallet", "lockedGoldGrams", &wallet.locked_gold_grams);
            let available =
                signals.amount("finaBridgeWallet", "availableGoldGrams", &wallet.available_gold_grams);
            (
                signals.non_negative("finabridgeLockedGrams", locked),
                signals.non_negative("finabridgeAvailableGrams", available),
            )
        }
        None => (Decimal::ZERO, Decimal::ZERO),
    };

    let encumbered = signals.add("encumberedGrams", finabridge_locked, bnsl_locked);
    let available = signals.sub("availableGold", total, encumbered);
    let available = signals.non_negative("availableGold", available);

    WalletBalances {
        total_vault_gold: total,
        available_gold: available,
        bnsl_locked_grams: bnsl_locked,
        finabridge_locked_grams: finabridge_locked,
        finapay_grams: available,
        bnsl_available_grams: Decimal::ZERO,
        finabridge_available_grams: finabridge_available,
        source: BalanceSource::Derived,
        ..WalletBalances::default()
    }
}
