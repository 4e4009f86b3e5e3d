//! Sources of exchange rate tables.
//!
//! The cache treats every provider as untrusted: HTTP payloads go through
//! [`parse_rate_payload`] before they become an [`ExchangeRateTable`].

use crate::core::currency::{CurrencyCode, ExchangeRateTable};
use crate::rates::error::RateError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

/// Default endpoint; the base currency code is appended to it.
pub const DEFAULT_PROVIDER_URL: &str = "https://api.exchangerate-api.com/v4/latest/";

/// A source of exchange rate tables keyed by base currency.
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_rates(&self, base: &CurrencyCode) -> Result<ExchangeRateTable, RateError>;
}

/// Fetches `{base_url}{BASE}` and validates the JSON body.
#[derive(Debug, Clone)]
pub struct HttpRateProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRateProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for HttpRateProvider {
    fn default() -> Self {
        Self::new(DEFAULT_PROVIDER_URL)
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn fetch_rates(&self, base: &CurrencyCode) -> Result<ExchangeRateTable, RateError> {
        let url = format!("{}{}", self.base_url, base);
        log::debug!("fetching exchange rates from {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RateError::transport(format!(
                "API request failed: {}",
                status
            )));
        }

        let payload: Value = response.json().await?;
        parse_rate_payload(base, &payload)
    }
}

/// Serves fixed tables. Any currency present in a table can be asked for as
/// a base; the table is rebased on the fly.
#[derive(Debug, Clone, Default)]
pub struct StaticRateProvider {
    tables: HashMap<CurrencyCode, ExchangeRateTable>,
}

impl StaticRateProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table(table: ExchangeRateTable) -> Self {
        let mut provider = Self::new();
        provider.add_table(table);
        provider
    }

    pub fn add_table(&mut self, table: ExchangeRateTable) {
        self.tables.insert(table.base().clone(), table);
    }
}

#[async_trait]
impl RateProvider for StaticRateProvider {
    async fn fetch_rates(&self, base: &CurrencyCode) -> Result<ExchangeRateTable, RateError> {
        if let Some(table) = self.tables.get(base) {
            return Ok(table.clone());
        }
        self.tables
            .values()
            .find_map(|table| table.rebased(base))
            .ok_or_else(|| RateError::transport(format!("unsupported base currency {}", base)))
    }
}

/// Validate a provider payload of the form
/// `{"base": "USD", "rates": {"EUR": 0.91, ...}}`.
///
/// A non-null `error` field is reported as a provider failure. Entries with a
/// bad code or a non-positive rate are skipped; a payload with no usable
/// entry at all is malformed.
pub fn parse_rate_payload(
    base: &CurrencyCode,
    payload: &Value,
) -> Result<ExchangeRateTable, RateError> {
    let object = payload
        .as_object()
        .ok_or_else(|| RateError::malformed("payload is not a JSON object"))?;

    if let Some(error) = object.get("error") {
        match error {
            Value::Null | Value::Bool(false) => {}
            Value::String(message) => return Err(RateError::transport(message.clone())),
            other => return Err(RateError::transport(other.to_string())),
        }
    }

    if let Some(reported) = object.get("base").and_then(Value::as_str) {
        if CurrencyCode::new(reported) != *base {
            return Err(RateError::malformed(format!(
                "requested base {} but payload is based on {}",
                base, reported
            )));
        }
    }

    let rates = object
        .get("rates")
        .and_then(Value::as_object)
        .ok_or_else(|| RateError::malformed("missing 'rates' object"))?;

    let mut parsed = Vec::with_capacity(rates.len());
    for (code, value) in rates {
        let currency = match CurrencyCode::parse(code) {
            Ok(currency) => currency,
            Err(_) => {
                log::warn!("skipping rate entry with invalid code '{}'", code);
                continue;
            }
        };
        match decimal_from_json(value) {
            Some(rate) if rate > Decimal::ZERO => parsed.push((currency, rate)),
            _ => log::warn!("skipping unusable rate {} for {}", value, currency),
        }
    }

    if parsed.is_empty() {
        return Err(RateError::malformed("payload contains no usable rates"));
    }

    ExchangeRateTable::with_rates(base.clone(), parsed)
        .map_err(|e| RateError::malformed(e.to_string()))
}

// JSON floats go through their shortest text form so 0.91 stays 0.91.
fn decimal_from_json(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
