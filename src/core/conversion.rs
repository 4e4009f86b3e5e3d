use crate::core::currency::{format_money, CurrencyCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of converting one amount between two currencies.
///
/// Derived per request from a rate table snapshot and never persisted by
/// the rate cache. `rate` is units of `to_currency` per unit of
/// `from_currency`, kept at full precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub converted_amount: Decimal,
    pub rate: Decimal,
    pub from_currency: CurrencyCode,
    pub to_currency: CurrencyCode,
}

impl ConversionResult {
    /// Apply `rate` to `amount`.
    ///
    /// Returns `None` when the product does not fit in a `Decimal`.
    pub fn new(
        amount: Decimal,
        rate: Decimal,
        from: CurrencyCode,
        to: CurrencyCode,
    ) -> Option<Self> {
        Some(Self {
            converted_amount: amount.checked_mul(rate)?,
            rate,
            from_currency: from,
            to_currency: to,
        })
    }

    /// Same-currency conversion: the amount passes through at rate one.
    pub fn identity(amount: Decimal, currency: CurrencyCode) -> Self {
        Self {
            converted_amount: amount,
            rate: Decimal::ONE,
            from_currency: currency.clone(),
            to_currency: currency,
        }
    }

    /// Converted amount formatted for display with the given precision.
    pub fn display_amount(&self, precision: u32) -> String {
        format_money(self.converted_amount, &self.to_currency, precision)
    }
}

impl fmt::Display for ConversionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (rate: 1 {} = {:.4} {})",
            self.display_amount(2),
            self.from_currency,
            self.rate,
            self.to_currency
        )
    }
}

/// How `convert` resolves a rate between two currencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "base", rename_all = "camelCase")]
pub enum RateBasis {
    /// Fetch the table keyed by the source currency and read the target directly.
    Direct,
    /// Fetch one table for a fixed base and compose `rate(to) / rate(from)`.
    Pivot(CurrencyCode),
}

impl RateBasis {
    /// Base currency whose table answers a `from -> to` conversion.
    pub fn table_base<'a>(&'a self, from: &'a CurrencyCode) -> &'a CurrencyCode {
        match self {
            RateBasis::Direct => from,
            RateBasis::Pivot(base) => base,
        }
    }
}

impl Default for RateBasis {
    fn default() -> Self {
        RateBasis::Pivot(CurrencyCode::new("USD"))
    }
}
