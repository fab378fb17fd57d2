//! Decimal quantities as they cross the boundary.
//!
//! Grams and USD figures arrive as strings (occasionally as bare JSON
//! numbers or null) and are only turned into `Decimal` for arithmetic.
//! Text that does not parse counts as zero.

use rust_decimal::Decimal;
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize,
};
use std::{fmt, str::FromStr};

/// A gram or USD quantity in its wire form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Amount(String);

impl Amount {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn zero() -> Self {
        Self("0".into())
    }

    /// Render a computed value back into wire form, without trailing zeros.
    pub fn from_decimal(value: Decimal) -> Self {
        Self(value.normalize().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Strict parse. Blank text is zero; anything else unparseable is `None`.
    /// Digit separators (`1_000`) are not part of the upstream format.
    pub fn parse(&self) -> Option<Decimal> {
        let trimmed = self.0.trim();
        if trimmed.is_empty() {
            return Some(Decimal::ZERO);
        }
        if trimmed.contains('_') {
            return None;
        }
        Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .ok()
    }

    /// Lenient parse used by the arithmetic paths.
    pub fn value(&self) -> Decimal {
        self.parse().unwrap_or(Decimal::ZERO)
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Amount {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self::from_decimal(value)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string, a number, or null")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        Ok(Amount::new(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Amount, E> {
        Ok(Amount(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        Ok(Amount(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Ok(Amount(v.to_string()))
    }

    // f64 Display is the shortest round-trip form, so 0.1 stays "0.1".
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        Ok(Amount(v.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Amount, E> {
        Ok(Amount::zero())
    }

    fn visit_none<E: de::Error>(self) -> Result<Amount, E> {
        Ok(Amount::zero())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Amount, D::Error> {
        deserializer.deserialize_any(self)
    }
}
