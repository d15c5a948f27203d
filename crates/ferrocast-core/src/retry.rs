use std::time::Duration;

use tracing::{debug, warn};

use crate::data_source::{BarsRequest, DataSource, SourceError};
use crate::BarSeries;

/// How a single symbol's bars are fetched: bounded by a timeout, with at most
/// one immediate retry on retryable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub timeout: Duration,
    pub retry_once: bool,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_once: true,
        }
    }
}

impl FetchPolicy {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.retry_once = false;
        self
    }
}

pub async fn fetch_bars(
    source: &dyn DataSource,
    req: BarsRequest,
    policy: FetchPolicy,
) -> Result<BarSeries, SourceError> {
    match attempt(source, req.clone(), policy.timeout).await {
        Err(error) if policy.retry_once && error.retryable() => {
            warn!(
                symbol = %req.symbol,
                source = %source.id(),
                code = error.code(),
                "retrying bar fetch after transient failure"
            );
            attempt(source, req, policy.timeout).await
        }
        outcome => outcome,
    }
}

async fn attempt(
    source: &dyn DataSource,
    req: BarsRequest,
    timeout: Duration,
) -> Result<BarSeries, SourceError> {
    let symbol = req.symbol.clone();
    match tokio::time::timeout(timeout, source.bars(req)).await {
        Ok(result) => {
            if let Ok(series) = &result {
                debug!(symbol = %symbol, bars = series.len(), "fetched bars");
            }
            result
        }
        Err(_) => Err(SourceError::unavailable(format!(
            "fetching bars for '{symbol}' timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FixtureSource;
    use crate::data_source::SourceErrorKind;
    use crate::{ProviderId, Symbol, TradingDate};
    use std::future::Future;
    use std::pin::Pin;

    fn req(symbol: &Symbol) -> BarsRequest {
        BarsRequest::trailing(
            symbol.clone(),
            TradingDate::parse("2024-03-01").expect("date"),
            10,
        )
        .expect("request")
    }

    #[tokio::test]
    async fn retries_once_after_retryable_failure() {
        let symbol = Symbol::parse("AAA").expect("symbol");
        let source = FixtureSource::new()
            .with_series(BarSeries::empty(symbol.clone()))
            .with_transient_failure(symbol.clone(), SourceError::rate_limited("slow down"));

        let result = fetch_bars(&source, req(&symbol), FetchPolicy::default()).await;

        assert!(result.is_ok());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_failure() {
        let symbol = Symbol::parse("AAA").expect("symbol");
        let source = FixtureSource::new()
            .with_failure(symbol.clone(), SourceError::not_found("delisted"));

        let error = fetch_bars(&source, req(&symbol), FetchPolicy::default())
            .await
            .expect_err("permanent failure");

        assert_eq!(error.kind(), SourceErrorKind::NotFound);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn retry_can_be_disabled() {
        let symbol = Symbol::parse("AAA").expect("symbol");
        let source = FixtureSource::new()
            .with_series(BarSeries::empty(symbol.clone()))
            .with_transient_failure(symbol.clone(), SourceError::unavailable("blip"));

        let result = fetch_bars(&source, req(&symbol), FetchPolicy::default().without_retry()).await;

        assert!(result.is_err());
        assert_eq!(source.calls(), 1);
    }

    struct HangingSource;

    impl DataSource for HangingSource {
        fn id(&self) -> ProviderId {
            ProviderId::Fixture
        }

        fn bars<'a>(
            &'a self,
            _req: BarsRequest,
        ) -> Pin<Box<dyn Future<Output = Result<BarSeries, SourceError>> + Send + 'a>> {
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test]
    async fn slow_source_times_out_as_unavailable() {
        let symbol = Symbol::parse("AAA").expect("symbol");
        let policy = FetchPolicy::default()
            .with_timeout(Duration::from_millis(20))
            .without_retry();

        let error = fetch_bars(&HangingSource, req(&symbol), policy)
            .await
            .expect_err("must time out");

        assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        assert!(error.message().contains("timed out"));
    }
}
