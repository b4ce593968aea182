//! Type-safe price representation using decimal arithmetic.
//!
//! Payment gateways take amounts as integers in the currency's minor unit
//! (paise for INR, cents for USD). [`Price::minor_units`] is the single place
//! that conversion happens; callers never multiply by 100 themselves.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors converting a price to gateway minor units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    #[error("amount must not be negative (got {0})")]
    Negative(Decimal),
    #[error("amount {0} is too large to express in minor units")]
    Overflow(Decimal),
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., rupees, not paise).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a price from an amount already in minor units.
    #[must_use]
    pub fn from_minor_units(minor: u64, currency_code: CurrencyCode) -> Self {
        Self {
            amount: Decimal::from(minor) / Decimal::ONE_HUNDRED,
            currency_code,
        }
    }

    /// Amount in the currency's minor unit, as sent to the payment gateway.
    ///
    /// The amount is rounded to two decimal places (midpoint away from zero)
    /// before scaling, so `117.9882` becomes `11799`.
    ///
    /// # Errors
    ///
    /// Returns `PriceError` if the amount is negative or does not fit in a `u64`.
    pub fn minor_units(&self) -> Result<u64, PriceError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(PriceError::Negative(self.amount));
        }

        let rounded = round_currency(self.amount);
        rounded
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|scaled| scaled.to_u64())
            .ok_or(PriceError::Overflow(self.amount))
    }

    /// Format for display (e.g., "₹590.00").
    #[must_use]
    pub fn display(&self) -> String {
        format!(
            "{}{:.2}",
            self.currency_code.symbol(),
            round_currency(self.amount)
        )
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Round a currency amount to two decimal places.
#[must_use]
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// ISO 4217 currency codes.
///
/// Only a base currency is configured per deployment; there is no conversion
/// between these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// The three-letter ISO code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }

    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn inr(amount: &str) -> Price {
        Price::new(amount.parse().unwrap(), CurrencyCode::INR)
    }

    #[test]
    fn test_minor_units_whole_amount() {
        assert_eq!(inr("590").minor_units().unwrap(), 59_000);
    }

    #[test]
    fn test_minor_units_rounds_fractional_paise() {
        assert_eq!(inr("117.9882").minor_units().unwrap(), 11_799);
        assert_eq!(inr("0.005").minor_units().unwrap(), 1);
        assert_eq!(inr("0.004").minor_units().unwrap(), 0);
    }

    #[test]
    fn test_minor_units_rejects_negative() {
        assert!(matches!(
            inr("-1").minor_units(),
            Err(PriceError::Negative(_))
        ));
    }

    #[test]
    fn test_minor_units_rejects_overflow() {
        assert!(matches!(
            Price::new(Decimal::MAX, CurrencyCode::INR).minor_units(),
            Err(PriceError::Overflow(_))
        ));
    }

    #[test]
    fn test_from_minor_units() {
        let price = Price::from_minor_units(59_000, CurrencyCode::INR);
        assert_eq!(price.amount, Decimal::from(590));
        assert_eq!(price.minor_units().unwrap(), 59_000);
    }

    #[test]
    fn test_display() {
        assert_eq!(inr("90").display(), "₹90.00");
        assert_eq!(
            Price::new("19.999".parse().unwrap(), CurrencyCode::USD).to_string(),
            "$20.00"
        );
    }

    #[test]
    fn test_currency_code_parse() {
        assert_eq!("inr".parse::<CurrencyCode>().unwrap(), CurrencyCode::INR);
        assert_eq!(" GBP ".parse::<CurrencyCode>().unwrap(), CurrencyCode::GBP);
        assert!("JPY".parse::<CurrencyCode>().is_err());
        assert_eq!(CurrencyCode::default(), CurrencyCode::INR);
    }
}
