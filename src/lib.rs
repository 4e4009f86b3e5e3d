//! # pricelens
//!
//! Finds prices in page text and converts them to a preferred currency on
//! hover, using exchange rates from a shared, time-bounded cache.
//!
//! ## Architecture
//!
//! - **core** — Currency codes, rate tables, conversion results, formatting
//! - **rates** — Rate providers, the TTL cache with stale fallback, and the
//!   service task that answers conversion requests
//! - **scan** — Document model, price patterns and extraction, scanning,
//!   hover interaction and debounced re-scanning
//! - **config** — User settings and cache configuration as JSON

pub mod config;
pub mod core;
pub mod rates;
pub mod scan;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::{AppConfig, JsonSettingsStore, Settings};
    pub use crate::core::conversion::{ConversionResult, RateBasis};
    pub use crate::core::currency::{CurrencyCode, ExchangeRateTable};
    pub use crate::rates::cache::{CachePolicy, RateCache};
    pub use crate::rates::error::RateError;
    pub use crate::rates::provider::{HttpRateProvider, RateProvider, StaticRateProvider};
    pub use crate::rates::service::{RateService, RateServiceHandle};
    pub use crate::scan::document::Document;
    pub use crate::scan::extractor::{DetectedAmount, Extractor};
    pub use crate::scan::interaction::{DisplayInstruction, Interaction};
    pub use crate::scan::page::Page;
    pub use crate::scan::scanner::Scanner;
}
