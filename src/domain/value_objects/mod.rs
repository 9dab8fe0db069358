//! Value Objects for the wholesale portal

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use thiserror::Error;

/// SKU (Stock Keeping Unit) value object. Free text, case preserved.
/// Stored values are read back verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into().trim().to_string()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<Sku> for String {
    fn from(sku: Sku) -> Self { sku.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Money value object: a non-negative amount with two-decimal semantics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() { return Err(MoneyError::Negative(amount)); }
        Ok(Self(amount.round_dp(2)))
    }

    /// Builds an amount from a whole number of cents.
    pub fn from_cents(cents: u64) -> Self { Self(Decimal::from(cents) / Decimal::ONE_HUNDRED) }

    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_zero(&self) -> bool { self.0.is_zero() }
    pub fn multiply(&self, qty: u32) -> Money { Money(self.0 * Decimal::from(qty)) }
}

impl std::ops::Add for Money {
    type Output = Money;
    fn add(self, other: Money) -> Money { Money(self.0 + other.0) }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self { iter.fold(Money::ZERO, |acc, m| acc + m) }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyError;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self { money.0 }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "${:.2}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("negative amount: {0}")]
    Negative(Decimal),
}

/// Quantity value object. User-entered values below zero clamp to zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn from_input(value: i64) -> Self { Self(value.clamp(0, i64::from(u32::MAX)) as u32) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn adjust(&self, delta: i64) -> Self { Self::from_input(i64::from(self.0).saturating_add(delta)) }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sku_keeps_case_and_trims() {
        assert_eq!(Sku::new("  fx-1 Red ").as_str(), "fx-1 Red");
    }

    #[test]
    fn test_sku_reads_stored_text_verbatim() {
        let long = "x".repeat(100);
        let sku: Sku = serde_json::from_value(serde_json::json!(long)).unwrap();
        assert_eq!(sku.as_str(), long);
        let blank: Sku = serde_json::from_str("\"\"").unwrap();
        assert_eq!(blank.as_str(), "");
    }

    #[test]
    fn test_money_rejects_negative() {
        assert!(Money::new(Decimal::new(-1, 2)).is_err());
        assert_eq!(Money::new(Decimal::new(19999, 3)).unwrap().amount(), Decimal::new(2000, 2));
    }

    #[test]
    fn test_money_sum() {
        let total: Money = [Money::from_cents(1999).multiply(3), Money::from_cents(500)].into_iter().sum();
        assert_eq!(total.amount(), Decimal::new(6497, 2));
        assert_eq!(total.to_string(), "$64.97");
    }

    #[test]
    fn test_money_json_roundtrip() {
        let money: Money = serde_json::from_str("19.99").unwrap();
        assert_eq!(money, Money::from_cents(1999));
        assert!(serde_json::from_str::<Money>("-4.00").is_err());
    }

    #[test]
    fn test_quantity_clamps() {
        assert_eq!(Quantity::from_input(-3).value(), 0);
        assert_eq!(Quantity::new(1).adjust(-5).value(), 0);
        assert_eq!(Quantity::new(1).adjust(2).value(), 3);
    }

    #[test]
    fn test_quantity_adjust_saturates() {
        assert_eq!(Quantity::new(1).adjust(i64::MAX).value(), u32::MAX);
        assert_eq!(Quantity::new(u32::MAX).adjust(i64::MIN).value(), 0);
    }
}
