//! Payloads exchanged across the component boundary.
//!
//! Requests carry an `action` tag; amounts travel as decimal strings so no
//! precision is lost in transit.

use crate::core::conversion::ConversionResult;
use crate::core::currency::CurrencyCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A request to the rate service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    ConvertCurrency {
        amount: Decimal,
        from_currency: CurrencyCode,
        to_currency: CurrencyCode,
    },
    GetSettings,
}

/// Answer to [`Request::ConvertCurrency`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ConversionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the rate came from a table kept after a failed refresh.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

impl ConvertResponse {
    pub fn ok(result: ConversionResult) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            stale: false,
        }
    }

    /// A conversion answered from a table that could not be refreshed.
    pub fn ok_from_stale(result: ConversionResult) -> Self {
        Self {
            stale: true,
            ..Self::ok(result)
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.to_string()),
            stale: false,
        }
    }

    /// The conversion, or the reported error message.
    pub fn into_result(self) -> Result<ConversionResult, String> {
        match (self.success, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(self.error.unwrap_or_else(|| "Conversion failed".to_string())),
        }
    }
}

/// Answer to [`Request::GetSettings`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub preferred_currency: CurrencyCode,
}

/// Any answer from the rate service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Convert(ConvertResponse),
    Settings(SettingsResponse),
}

/// Notifications pushed to the page scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Notification {
    #[serde(rename_all = "camelCase")]
    SettingsChanged { target_currency: CurrencyCode },
    ToggleExtension { enabled: bool },
}
