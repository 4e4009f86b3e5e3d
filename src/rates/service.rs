//! The rate service task.
//!
//! [`RateService`] owns the [`RateCache`]; everything else talks to it by
//! value through a [`RateServiceHandle`]. Each request is answered on its
//! own task so a slow refresh never blocks unrelated requests, while the
//! cache still coalesces refreshes of the same base.

use crate::core::currency::CurrencyCode;
use crate::rates::cache::{Freshness, RateCache};
use crate::rates::message::{ConvertResponse, Request, Response, SettingsResponse};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

/// Errors at the request/response boundary itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error("rate service is not running")]
    Closed,
    #[error("rate service sent a {0} response to a different request")]
    UnexpectedResponse(&'static str),
}

struct Envelope {
    request: Request,
    reply: oneshot::Sender<Response>,
}

/// Answers [`Request`]s from a rate cache and the current preferred currency.
pub struct RateService {
    cache: Arc<RateCache>,
    preferred: watch::Receiver<CurrencyCode>,
}

impl RateService {
    pub fn new(cache: Arc<RateCache>, preferred: watch::Receiver<CurrencyCode>) -> Self {
        Self { cache, preferred }
    }

    pub fn cache(&self) -> &Arc<RateCache> {
        &self.cache
    }

    /// Answer one request.
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::ConvertCurrency {
                amount,
                from_currency,
                to_currency,
            } => {
                let outcome = self
                    .cache
                    .convert_with_freshness(amount, &from_currency, &to_currency)
                    .await;
                match outcome {
                    Ok((result, Freshness::Fresh)) => {
                        Response::Convert(ConvertResponse::ok(result))
                    }
                    Ok((result, Freshness::Stale { cause })) => {
                        log::warn!(
                            "converted {} -> {} from stale rates: {}",
                            from_currency,
                            to_currency,
                            cause
                        );
                        Response::Convert(ConvertResponse::ok_from_stale(result))
                    }
                    Err(err) => {
                        log::error!(
                            "currency conversion {} -> {} failed: {}",
                            from_currency,
                            to_currency,
                            err
                        );
                        Response::Convert(ConvertResponse::failed(err))
                    }
                }
            }
            Request::GetSettings => {
                let preferred_currency = self.preferred.borrow().clone();
                Response::Settings(SettingsResponse { preferred_currency })
            }
        }
    }

    /// Run the service on the current tokio runtime.
    ///
    /// The task stops once every handle has been dropped.
    pub fn spawn(self, buffer: usize) -> RateServiceHandle {
        let (tx, mut rx) = mpsc::channel::<Envelope>(buffer.max(1));
        let service = Arc::new(self);

        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    let response = service.handle(envelope.request).await;
                    if envelope.reply.send(response).is_err() {
                        log::debug!("requester dropped before the rate service replied");
                    }
                });
            }
            log::info!("rate service stopped");
        });

        RateServiceHandle { tx }
    }
}

/// Cloneable client side of a running [`RateService`].
#[derive(Clone)]
pub struct RateServiceHandle {
    tx: mpsc::Sender<Envelope>,
}

impl RateServiceHandle {
    pub async fn request(&self, request: Request) -> Result<Response, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| ServiceError::Closed)?;
        response.await.map_err(|_| ServiceError::Closed)
    }

    pub async fn convert(
        &self,
        amount: Decimal,
        from_currency: CurrencyCode,
        to_currency: CurrencyCode,
    ) -> Result<ConvertResponse, ServiceError> {
        let request = Request::ConvertCurrency {
            amount,
            from_currency,
            to_currency,
        };
        match self.request(request).await? {
            Response::Convert(response) => Ok(response),
            Response::Settings(_) => Err(ServiceError::UnexpectedResponse("settings")),
        }
    }

    pub async fn preferred_currency(&self) -> Result<CurrencyCode, ServiceError> {
        match self.request(Request::GetSettings).await? {
            Response::Settings(settings) => Ok(settings.preferred_currency),
            Response::Convert(_) => Err(ServiceError::UnexpectedResponse("conversion")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::currency::ExchangeRateTable;
    use crate::rates::cache::CachePolicy;
    use crate::rates::error::RateError;
    use crate::rates::provider::{RateProvider, StaticRateProvider};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Serves one table, then fails every later fetch.
    struct FailsAfterFirst {
        table: ExchangeRateTable,
        served: AtomicBool,
    }

    #[async_trait]
    impl RateProvider for FailsAfterFirst {
        async fn fetch_rates(&self, _base: &CurrencyCode) -> Result<ExchangeRateTable, RateError> {
            if self.served.swap(true, Ordering::SeqCst) {
                Err(RateError::transport("503 Service Unavailable"))
            } else {
                Ok(self.table.clone())
            }
        }
    }

    fn running_service() -> (RateServiceHandle, watch::Sender<CurrencyCode>) {
        let table = ExchangeRateTable::with_rates(
            CurrencyCode::new("USD"),
            [
                (CurrencyCode::new("EUR"), dec!(0.91)),
                (CurrencyCode::new("JPY"), dec!(151.2)),
            ],
        )
        .unwrap();
        let cache = Arc::new(RateCache::new(
            Arc::new(StaticRateProvider::from_table(table)),
            CachePolicy::default(),
        ));
        let (preferred_tx, preferred_rx) = watch::channel(CurrencyCode::new("EUR"));
        let handle = RateService::new(cache, preferred_rx).spawn(16);
        (handle, preferred_tx)
    }

    #[tokio::test]
    async fn test_convert_over_channel() {
        let (handle, _preferred) = running_service();

        let response = handle
            .convert(dec!(100), CurrencyCode::new("USD"), CurrencyCode::new("EUR"))
            .await
            .unwrap();

        let result = response.into_result().unwrap();
        assert_eq!(result.converted_amount, dec!(91));
    }

    #[tokio::test]
    async fn test_conversion_failure_is_reported_not_raised() {
        let (handle, _preferred) = running_service();

        let response = handle
            .convert(dec!(100), CurrencyCode::new("USD"), CurrencyCode::new("XYZ"))
            .await
            .unwrap();

        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("conversion rate not available for USD to XYZ")
        );
    }

    #[tokio::test]
    async fn test_get_settings_tracks_preferred_currency() {
        let (handle, preferred) = running_service();
        assert_eq!(handle.preferred_currency().await.unwrap().as_str(), "EUR");

        preferred.send(CurrencyCode::new("GBP")).unwrap();
        assert_eq!(handle.preferred_currency().await.unwrap().as_str(), "GBP");
    }

    #[tokio::test]
    async fn test_overflowing_conversion_is_reported_not_raised() {
        let (handle, _preferred) = running_service();

        let response = handle
            .convert(
                dec!(1000000000000000000000000000),
                CurrencyCode::new("USD"),
                CurrencyCode::new("JPY"),
            )
            .await
            .unwrap();

        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("converted amount overflows for USD to JPY")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_rates_are_flagged() {
        let table = ExchangeRateTable::with_rates(
            CurrencyCode::new("USD"),
            [(CurrencyCode::new("EUR"), dec!(0.91))],
        )
        .unwrap();
        let provider = FailsAfterFirst {
            table,
            served: AtomicBool::new(false),
        };
        let cache = Arc::new(RateCache::new(Arc::new(provider), CachePolicy::default()));
        let (_preferred_tx, preferred_rx) = watch::channel(CurrencyCode::new("EUR"));
        let handle = RateService::new(cache, preferred_rx).spawn(16);
        let usd = CurrencyCode::new("USD");
        let eur = CurrencyCode::new("EUR");

        let first = handle.convert(dec!(100), usd.clone(), eur.clone()).await.unwrap();
        assert!(first.success);
        assert!(!first.stale);

        tokio::time::advance(Duration::from_secs(11 * 60)).await;
        let second = handle.convert(dec!(100), usd, eur).await.unwrap();
        assert!(second.success);
        assert!(second.stale);
        assert_eq!(second.into_result().unwrap().converted_amount, dec!(91));
    }
}
