//! custody-core: ownership-ledger reconciliation and multi-wallet balances
//! for a gold-custody platform.
//!
//! Two pure components sit at the centre:
//!   - `reconciliation` groups four movement streams into a deduplicated,
//!     newest-first history with certificates attached as children.
//!   - `balance` derives available / locked / reserved gold, either from an
//!     authoritative ownership summary or from raw sub-wallet holdings.
//!
//! Everything else (`source`, `engine`, `store`) is the orchestration a
//! caller needs around them: concurrent fetch with isolated failures,
//! full recomputation per refresh, and a journal of refresh outcomes.

pub mod amount;
pub mod balance;
pub mod config;
pub mod engine;
pub mod error;
pub mod reconciliation;
pub mod record;
pub mod signal;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod types;
