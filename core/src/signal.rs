//! Data-quality signals.
//!
//! RULE: Nothing in the reconciler or the aggregator fails. Every
//! recovery (coercion, clamping, a missing stream) is recorded here
//! instead, logged at warn level, and handed back to the caller.

use crate::{
    amount::Amount,
    source::StreamKind,
    types::{RecordId, RefreshId},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One recovered data-quality problem.
/// Variants are appended, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataQualitySignal {
    /// An upstream fetch failed or timed out; the stream was replaced by its default.
    StreamUnavailable {
        stream: StreamKind,
        reason: String,
    },
    /// A numeric field did not parse and was treated as zero.
    MalformedAmount {
        record_id: RecordId,
        field: String,
        raw: String,
    },
    /// A balance came out negative and was clamped to zero.
    NegativeClamped {
        field: String,
        value: Decimal,
    },
    /// Decimal arithmetic hit the representable bound and saturated.
    ArithmeticSaturated {
        field: String,
    },
    /// A ledger-feed row shaped like a certificate was removed from the base records.
    CertificateEchoRemoved {
        record_id: RecordId,
    },
    /// A certificate already attached to a group arrived again from another feed.
    DuplicateCertificate {
        dedupe_key: String,
    },
}

impl fmt::Display for DataQualitySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StreamUnavailable { stream, reason } => {
                write!(f, "stream {stream} unavailable: {reason}")
            }
            Self::MalformedAmount { record_id, field, raw } => {
                write!(f, "record {record_id}: {field}={raw:?} is not a decimal, using 0")
            }
            Self::NegativeClamped { field, value } => {
                write!(f, "{field} was {value}, clamped to 0")
            }
            Self::ArithmeticSaturated { field } => write!(f, "{field} saturated"),
            Self::CertificateEchoRemoved { record_id } => {
                write!(f, "ledger row {record_id} is a certificate echo, dropped from base")
            }
            Self::DuplicateCertificate { dedupe_key } => {
                write!(f, "certificate {dedupe_key} already attached, skipped")
            }
        }
    }
}

/// Collects signals during one computation.
#[derive(Debug, Default)]
pub struct SignalLog {
    component: &'static str,
    signals: Vec<DataQualitySignal>,
}

impl SignalLog {
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            signals: Vec::new(),
        }
    }

    pub fn push(&mut self, signal: DataQualitySignal) {
        match signal {
            // Expected whenever two feeds overlap; not worth a warning.
            DataQualitySignal::DuplicateCertificate { .. } => {
                log::debug!("{}: {signal}", self.component)
            }
            _ => log::warn!("{}: {signal}", self.component),
        }
        self.signals.push(signal);
    }

    /// Parse `amount`, recording a signal and yielding zero when it is malformed.
    pub fn amount(&mut self, record_id: &str, field: &str, amount: &Amount) -> Decimal {
        match amount.parse() {
            Some(value) => value,
            None => {
                self.push(DataQualitySignal::MalformedAmount {
                    record_id: record_id.to_string(),
                    field: field.to_string(),
                    raw: amount.as_str().to_string(),
                });
                Decimal::ZERO
            }
        }
    }

    /// `max(0, value)`, recording a signal when clamping happened.
    pub fn non_negative(&mut self, field: &str, value: Decimal) -> Decimal {
        if value.is_sign_negative() && !value.is_zero() {
            self.push(DataQualitySignal::NegativeClamped {
                field: field.to_string(),
                value,
            });
            Decimal::ZERO
        } else {
            value
        }
    }

    /// `a + b`, saturating at the decimal bounds.
    pub fn add(&mut self, field: &str, a: Decimal, b: Decimal) -> Decimal {
        a.checked_add(b).unwrap_or_else(|| {
            self.saturated(field);
            if b.is_sign_negative() { Decimal::MIN } else { Decimal::MAX }
        })
    }

    /// `a - b`, saturating at the decimal bounds.
    pub fn sub(&mut self, field: &str, a: Decimal, b: Decimal) -> Decimal {
        a.checked_sub(b).unwrap_or_else(|| {
            self.saturated(field);
            if b.is_sign_negative() { Decimal::MAX } else { Decimal::MIN }
        })
    }

    /// `a * b`, saturating at the decimal bounds.
    pub fn mul(&mut self, field: &str, a: Decimal, b: Decimal) -> Decimal {
        a.checked_mul(b).unwrap_or_else(|| {
            self.saturated(field);
            if a.is_sign_negative() != b.is_sign_negative() { Decimal::MIN } else { Decimal::MAX }
        })
    }

    fn saturated(&mut self, field: &str) {
        self.push(DataQualitySignal::ArithmeticSaturated {
            field: field.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn into_vec(self) -> Vec<DataQualitySignal> {
        self.signals
    }
}

/// A persisted signal row, as stored in the refresh journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalLogEntry {
    pub id: Option<i64>,
    pub refresh_id: RefreshId,
    pub signal_type: String,
    pub payload: String,
}

/// Stable string name for a signal variant, used as the journal's signal_type column.
pub fn signal_type_name(signal: &DataQualitySignal) -> &'static str {
    match signal {
        DataQualitySignal::StreamUnavailable { .. }      => "stream_unavailable",
        DataQualitySignal::MalformedAmount { .. }        => "malformed_amount",
        DataQualitySignal::NegativeClamped { .. }        => "negative_clamped",
        DataQualitySignal::ArithmeticSaturated { .. }    => "arithmetic_saturated",
        DataQualitySignal::CertificateEchoRemoved { .. } => "certificate_echo_removed",
        DataQualitySignal::DuplicateCertificate { .. }   => "duplicate_certificate",
    }
}
