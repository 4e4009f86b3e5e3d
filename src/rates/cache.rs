//! Process-wide exchange rate cache.
//!
//! One [`RateCacheEntry`] per base currency ever queried. Entries are
//! replaced wholesale on a successful refresh and kept forever as the
//! fallback for failed refreshes. Each base has its own async lock, so at
//! most one provider fetch per base is in flight; callers that queue behind
//! a fetch share its outcome instead of issuing their own.

use crate::core::conversion::{ConversionResult, RateBasis};
use crate::core::currency::{CurrencyCode, ExchangeRateTable};
use crate::rates::error::RateError;
use crate::rates::provider::RateProvider;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Freshness and fetch policy of a [`RateCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct CachePolicy {
    /// Maximum age before a table is refreshed.
    pub ttl: Duration,
    /// Upper bound on a single provider fetch.
    pub fetch_timeout: Duration,
    /// How `convert` picks the table it reads.
    pub basis: RateBasis,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10 * 60),
            fetch_timeout: Duration::from_secs(10),
            basis: RateBasis::default(),
        }
    }
}

/// A cached table and when it was fetched.
#[derive(Debug, Clone)]
pub struct RateCacheEntry {
    table: Arc<ExchangeRateTable>,
    fetched_at: Instant,
    fetched_at_utc: DateTime<Utc>,
}

impl RateCacheEntry {
    fn new(table: ExchangeRateTable) -> Self {
        Self {
            table: Arc::new(table),
            fetched_at: Instant::now(),
            fetched_at_utc: Utc::now(),
        }
    }

    pub fn table(&self) -> &Arc<ExchangeRateTable> {
        &self.table
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at_utc
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }

    fn snapshot(&self, freshness: Freshness) -> RateSnapshot {
        RateSnapshot {
            table: Arc::clone(&self.table),
            fetched_at: self.fetched_at_utc,
            freshness,
        }
    }
}

/// Whether a returned table came from a successful refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum Freshness {
    Fresh,
    /// The refresh failed with `cause`; the table is the last good one.
    Stale { cause: RateError },
}

/// Result of [`RateCache::get_rates`].
#[derive(Debug, Clone)]
pub struct RateSnapshot {
    pub table: Arc<ExchangeRateTable>,
    pub fetched_at: DateTime<Utc>,
    pub freshness: Freshness,
}

impl RateSnapshot {
    pub fn is_stale(&self) -> bool {
        matches!(self.freshness, Freshness::Stale { .. })
    }
}

#[derive(Default)]
struct SlotState {
    entry: Option<RateCacheEntry>,
    last_failure: Option<RateError>,
}

#[derive(Default)]
struct RateSlot {
    /// Completed refresh attempts; read before queueing on `state`.
    attempts: AtomicU64,
    state: tokio::sync::Mutex<SlotState>,
}

/// Exchange rate cache with TTL refresh, stale fallback and fetch coalescing.
pub struct RateCache {
    provider: Arc<dyn RateProvider>,
    policy: CachePolicy,
    slots: Mutex<HashMap<CurrencyCode, Arc<RateSlot>>>,
    fetches: AtomicU64,
}

impl RateCache {
    pub fn new(provider: Arc<dyn RateProvider>, policy: CachePolicy) -> Self {
        Self {
            provider,
            policy,
            slots: Mutex::new(HashMap::new()),
            fetches: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Number of provider fetches issued so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Rates relative to `base`.
    ///
    /// Serves the cached table while it is younger than the TTL. Otherwise
    /// refreshes; if the refresh fails and an older table exists, that table
    /// is returned flagged [`Freshness::Stale`]. Fails with
    /// [`RateError::ProviderUnavailable`] only when nothing was ever cached.
    pub async fn get_rates(&self, base: &CurrencyCode) -> Result<RateSnapshot, RateError> {
        let slot = self.slot(base);
        let observed = slot.attempts.load(Ordering::Acquire);
        let mut state = slot.state.lock().await;

        if let Some(entry) = state.entry.as_ref() {
            if entry.is_fresh(self.policy.ttl) {
                log::debug!("rate cache hit for {} (age {:?})", base, entry.age());
                return Ok(entry.snapshot(Freshness::Fresh));
            }
        }

        // An attempt that completed while this caller was queued is shared.
        let shared = if slot.attempts.load(Ordering::Acquire) != observed {
            match (&state.last_failure, &state.entry) {
                (Some(failure), _) => Some(Err(failure.clone())),
                (None, Some(entry)) => Some(Ok(entry.clone())),
                (None, None) => None,
            }
        } else {
            None
        };
        let refreshed = match shared {
            Some(outcome) => outcome,
            None => self.refresh(base, &slot, &mut state).await,
        };

        match refreshed {
            Ok(entry) => Ok(entry.snapshot(Freshness::Fresh)),
            Err(cause) if !cause.is_recoverable() => Err(cause),
            Err(cause) => match state.entry.as_ref() {
                Some(entry) => {
                    log::warn!(
                        "using stale {} rates from {} due to refresh failure: {}",
                        base,
                        entry.fetched_at(),
                        cause
                    );
                    Ok(entry.snapshot(Freshness::Stale { cause }))
                }
                None => Err(RateError::ProviderUnavailable {
                    base: base.clone(),
                    cause: Box::new(cause),
                }),
            },
        }
    }

    /// Convert `amount` from one currency to another.
    ///
    /// Same-currency requests short-circuit without touching the cache.
    pub async fn convert(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Result<ConversionResult, RateError> {
        self.convert_with_freshness(amount, from, to)
            .await
            .map(|(result, _)| result)
    }

    /// [`convert`](Self::convert), also reporting whether the table used
    /// was a stale fallback.
    pub async fn convert_with_freshness(
        &self,
        amount: Decimal,
        from: &CurrencyCode,
        to: &CurrencyCode,
    ) -> Result<(ConversionResult, Freshness), RateError> {
        if from == to {
            return Ok((
                ConversionResult::identity(amount, from.clone()),
                Freshness::Fresh,
            ));
        }

        let base = self.policy.basis.table_base(from);
        let snapshot = self.get_rates(base).await?;
        let rate = snapshot
            .table
            .cross_rate(from, to)
            .ok_or_else(|| RateError::RateUnavailable {
                from: from.clone(),
                to: to.clone(),
            })?;
        let result = ConversionResult::new(amount, rate, from.clone(), to.clone()).ok_or_else(
            || RateError::Overflow {
                from: from.clone(),
                to: to.clone(),
            },
        )?;

        Ok((result, snapshot.freshness))
    }

    /// The cached entry for `base`, if any, without refreshing it.
    ///
    /// Returns `None` while a refresh for `base` holds the entry.
    pub fn entry(&self, base: &CurrencyCode) -> Option<RateCacheEntry> {
        let slot = self.existing_slot(base)?;
        let state = slot.state.try_lock().ok()?;
        state.entry.clone()
    }

    /// Base currencies that have a slot, sorted.
    pub fn cached_bases(&self) -> Vec<CurrencyCode> {
        let mut bases: Vec<CurrencyCode> = self.lock_slots().keys().cloned().collect();
        bases.sort();
        bases
    }

    /// Forget every cached table. In-flight refreshes finish into detached slots.
    pub fn clear(&self) {
        self.lock_slots().clear();
        log::info!("rate cache cleared");
    }

    async fn refresh(
        &self,
        base: &CurrencyCode,
        slot: &RateSlot,
        state: &mut SlotState,
    ) -> Result<RateCacheEntry, RateError> {
        let result = self.fetch(base).await;
        let outcome = match result {
            Ok(table) => {
                log::info!("refreshed {} rates ({} currencies)", base, table.len());
                let entry = RateCacheEntry::new(table);
                state.entry = Some(entry.clone());
                state.last_failure = None;
                Ok(entry)
            }
            Err(err) => {
                state.last_failure = Some(err.clone());
                Err(err)
            }
        };
        slot.attempts.fetch_add(1, Ordering::Release);
        outcome
    }

    async fn fetch(&self, base: &CurrencyCode) -> Result<ExchangeRateTable, RateError> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let timeout = self.policy.fetch_timeout;
        match tokio::time::timeout(timeout, self.provider.fetch_rates(base)).await {
            Ok(Ok(table)) if table.base() == base => Ok(table),
            Ok(Ok(table)) => Err(RateError::malformed(format!(
                "requested base {} but provider returned {}",
                base,
                table.base()
            ))),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(RateError::Timeout {
                base: base.clone(),
                after: timeout,
            }),
        }
    }

    fn slot(&self, base: &CurrencyCode) -> Arc<RateSlot> {
        let mut slots = self.lock_slots();
        Arc::clone(slots.entry(base.clone()).or_default())
    }

    fn existing_slot(&self, base: &CurrencyCode) -> Option<Arc<RateSlot>> {
        self.lock_slots().get(base).cloned()
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<CurrencyCode, Arc<RateSlot>>> {
        // Slot map operations never panic while holding the lock.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
