use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Target currencies a user can pick as their preferred currency.
pub const SUPPORTED_TARGETS: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "INR", "ZAR", "CAD", "AUD", "CHF", "CNY", "HKD", "SGD", "BRL",
    "RUB", "KRW", "MXN", "IDR", "TRY", "SAR", "AED", "BTC",
];

/// ISO 4217-style currency code.
///
/// Codes are stored upper-cased, so `"usd"` and `"USD"` compare equal.
/// Non-ISO identifiers such as `BTC` are accepted as well.
///
/// # Examples
///
/// ```
/// use pricelens::core::currency::CurrencyCode;
///
/// let usd = CurrencyCode::new("usd");
/// assert_eq!(usd.as_str(), "USD");
/// assert_ne!(usd, CurrencyCode::new("EUR"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_ascii_uppercase())
    }

    /// Parse a user-supplied code, rejecting anything that is not three ASCII letters.
    pub fn parse(code: &str) -> Result<Self, CurrencyError> {
        let trimmed = code.trim();
        if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self::new(trimmed))
        } else {
            Err(CurrencyError::InvalidCode(code.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this code is one of [`SUPPORTED_TARGETS`].
    pub fn is_supported_target(&self) -> bool {
        SUPPORTED_TARGETS.contains(&self.0.as_str())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CurrencyCode {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

/// Errors arising from currency codes and rate tables.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CurrencyError {
    #[error("invalid currency code '{0}'")]
    InvalidCode(String),
    #[error("exchange rate must be positive, got {rate} for {currency}")]
    InvalidRate { currency: CurrencyCode, rate: Decimal },
}

/// Exchange rates of every known currency relative to one base currency.
///
/// `rate(c)` is how many units of `c` one unit of the base buys. The base
/// itself always maps to exactly one. Tables are built once and never
/// mutated afterwards; a refresh produces a new table.
///
/// # Examples
///
/// ```
/// use pricelens::core::currency::{CurrencyCode, ExchangeRateTable};
/// use rust_decimal_macros::dec;
///
/// let table = ExchangeRateTable::with_rates(
///     CurrencyCode::new("USD"),
///     [(CurrencyCode::new("EUR"), dec!(0.91)), (CurrencyCode::new("GBP"), dec!(0.78))],
/// )
/// .unwrap();
///
/// assert_eq!(table.rate(&CurrencyCode::new("USD")), Some(dec!(1)));
/// assert_eq!(table.rate(&CurrencyCode::new("EUR")), Some(dec!(0.91)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeRateTable {
    base: CurrencyCode,
    rates: HashMap<CurrencyCode, Decimal>,
}

impl ExchangeRateTable {
    /// A table holding only the base currency.
    pub fn new(base: CurrencyCode) -> Self {
        let mut rates = HashMap::new();
        rates.insert(base.clone(), Decimal::ONE);
        Self { base, rates }
    }

    /// Build a table from `(currency, rate)` pairs.
    ///
    /// Every rate must be positive. An entry for the base currency is
    /// ignored: the base is pinned to one.
    pub fn with_rates(
        base: CurrencyCode,
        rates: impl IntoIterator<Item = (CurrencyCode, Decimal)>,
    ) -> Result<Self, CurrencyError> {
        let mut table = Self::new(base);
        for (currency, rate) in rates {
            if rate <= Decimal::ZERO {
                return Err(CurrencyError::InvalidRate { currency, rate });
            }
            if currency != table.base {
                table.rates.insert(currency, rate);
            }
        }
        Ok(table)
    }

    pub fn base(&self) -> &CurrencyCode {
        &self.base
    }

    /// Units of `currency` per one unit of the base.
    pub fn rate(&self, currency: &CurrencyCode) -> Option<Decimal> {
        self.rates.get(currency).copied()
    }

    /// Units of `to` per one unit of `from`, composed through the base.
    pub fn cross_rate(&self, from: &CurrencyCode, to: &CurrencyCode) -> Option<Decimal> {
        if from == to {
            return Some(Decimal::ONE);
        }
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        to_rate.checked_div(from_rate)
    }

    /// The same rates re-expressed against another base in the table.
    pub fn rebased(&self, base: &CurrencyCode) -> Option<Self> {
        let base_rate = self.rate(base)?;
        let rates = self
            .rates
            .iter()
            .filter_map(|(code, rate)| rate.checked_div(base_rate).map(|r| (code.clone(), r)));
        Self::with_rates(base.clone(), rates).ok()
    }

    pub fn contains(&self, currency: &CurrencyCode) -> bool {
        self.rates.contains_key(currency)
    }

    /// Number of currencies, base included.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// All currencies in the table, sorted.
    pub fn currencies(&self) -> Vec<CurrencyCode> {
        let mut codes: Vec<CurrencyCode> = self.rates.keys().cloned().collect();
        codes.sort();
        codes
    }
}

/// Display symbol for a currency, falling back to the code itself.
pub fn currency_symbol(currency: &CurrencyCode) -> &str {
    match currency.as_str() {
        "USD" => "$",
        "EUR" => "€",
        "GBP" => "£",
        "JPY" | "CNY" => "¥",
        "INR" => "₹",
        "CAD" => "C$",
        "AUD" => "A$",
        "BTC" => "₿",
        other => other,
    }
}

/// Number of fraction digits shown for a currency.
///
/// Yen has no minor unit in practice and bitcoin is quoted to the satoshi;
/// everything else uses the caller's precision.
pub fn display_decimals(currency: &CurrencyCode, precision: u32) -> u32 {
    match currency.as_str() {
        "JPY" => 0,
        "BTC" => 8,
        _ => precision,
    }
}

/// Format an amount for display: symbol, thousands grouping, rounded fraction.
///
/// ```
/// use pricelens::core::currency::{format_money, CurrencyCode};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_money(dec!(1123.4496), &CurrencyCode::new("EUR"), 2), "€1,123.45");
/// assert_eq!(format_money(dec!(15030.7), &CurrencyCode::new("JPY"), 2), "¥15,031");
/// ```
pub fn format_money(amount: Decimal, currency: &CurrencyCode, precision: u32) -> String {
    let decimals = display_decimals(currency, precision);
    let rounded = amount.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.*}", decimals as usize, rounded.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let symbol = currency_symbol(currency);
    if symbol == currency.as_str() {
        format!("{sign}{grouped} {symbol}")
    } else {
        format!("{sign}{symbol}{grouped}")
    }
}
