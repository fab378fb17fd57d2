//! Shared primitive types used across the custody core.

use chrono::{DateTime, Utc};

/// A stable identifier for any upstream record.
pub type RecordId = String;

/// The correlation key linking certificates to the movement they document.
pub type TransactionId = String;

/// Identifier of one refresh cycle in the journal.
pub type RefreshId = String;

/// Every record timestamp is carried in UTC.
pub type Timestamp = DateTime<Utc>;

/// Wallet label used for the spot (FinaPay) sub-wallet.
pub const FINAPAY_WALLET: &str = "FinaPay";

/// Wallet label used for the trade-finance (FinaBridge) sub-wallet.
pub const FINABRIDGE_WALLET: &str = "FinaBridge";

/// Wallet label used for the physical vault.
pub const VAULT_WALLET: &str = "Vault";

/// Counterparty label for movements that leave or enter the platform.
pub const EXTERNAL_WALLET: &str = "External";

/// Source label for bank-funded deposits.
pub const BANK_TRANSFER: &str = "Bank Transfer";
