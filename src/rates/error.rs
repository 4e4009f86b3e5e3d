use crate::core::currency::CurrencyCode;
use std::time::Duration;
use thiserror::Error;

/// Errors arising from fetching, caching and applying exchange rates.
///
/// `Clone` lets every waiter on a shared refresh observe the same failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateError {
    /// No table was ever obtained for `base` and the live fetch failed.
    #[error("no exchange rates available for {base}: {cause}")]
    ProviderUnavailable {
        base: CurrencyCode,
        cause: Box<RateError>,
    },
    /// The resolved table has no rate for one side of the pair.
    #[error("conversion rate not available for {from} to {to}")]
    RateUnavailable { from: CurrencyCode, to: CurrencyCode },
    /// The converted amount does not fit in a `Decimal`.
    #[error("converted amount overflows for {from} to {to}")]
    Overflow { from: CurrencyCode, to: CurrencyCode },
    /// The provider answered with a payload that failed validation.
    #[error("malformed rate payload: {reason}")]
    MalformedResponse { reason: String },
    /// The provider did not answer within the configured bound.
    #[error("rate fetch for {base} timed out after {after:?}")]
    Timeout { base: CurrencyCode, after: Duration },
    /// Network failure, non-success status, or an error reported by the provider.
    #[error("rate provider request failed: {reason}")]
    Transport { reason: String },
}

impl RateError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        RateError::MalformedResponse {
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        RateError::Transport {
            reason: reason.into(),
        }
    }

    /// Whether stale cached data may stand in for this failure.
    ///
    /// A missing currency or an overflowing amount is a property of the
    /// request, not of the refresh, so it is never masked by the cache.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            RateError::RateUnavailable { .. } | RateError::Overflow { .. }
        )
    }
}

impl From<reqwest::Error> for RateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RateError::malformed(err.to_string())
        } else {
            RateError::transport(err.to_string())
        }
    }
}
