//! Train-all orchestration.
//!
//! For each symbol: fetch bars, optionally merge them into a [`BarCache`],
//! build the training table, fit, and persist. A failing symbol is recorded
//! in the [`RunReport`] and never stops the run.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use ferrocast_core::{
    dedupe_symbols, fetch_bars, BarSeries, BarsRequest, DataSource, FetchPolicy, SourceError,
    Symbol, TradingDate, UtcDateTime,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ErrorKind, ForecastError};
use crate::features::FeatureBuilder;
use crate::model::ValidationMetrics;
use crate::store::ModelStore;
use crate::trainer::{ModelArtifact, ModelTrainer};

/// Local history that fetched bars are merged into before training.
pub trait BarCache: Send + Sync {
    fn last_bar_date(&self, symbol: &Symbol) -> Result<Option<TradingDate>, ForecastError>;

    /// Upsert `fetched` (newer bars win) and return the full cached series.
    fn merge(&self, fetched: &BarSeries) -> Result<BarSeries, ForecastError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Calendar days of history requested per symbol.
    pub history_days: u32,
    /// Last day to request; the last completed day (yesterday, UTC) when unset.
    pub end: Option<TradingDate>,
    pub concurrency: usize,
    pub fetch_timeout: Duration,
    pub retry_once: bool,
    /// Fetch pacing across the whole run; unpaced when unset.
    pub requests_per_second: Option<NonZeroU32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_days: 3_650,
            end: None,
            concurrency: 1,
            fetch_timeout: Duration::from_secs(30),
            retry_once: true,
            requests_per_second: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainedSymbol {
    pub symbol: Symbol,
    pub bars: usize,
    pub training_rows: usize,
    pub trained_from: TradingDate,
    pub trained_through: TradingDate,
    pub validation: Option<ValidationMetrics>,
}

impl TrainedSymbol {
    fn new(bars: usize, artifact: &ModelArtifact) -> Self {
        Self {
            symbol: artifact.symbol.clone(),
            bars,
            training_rows: artifact.metadata.training_rows,
            trained_from: artifact.metadata.trained_from,
            trained_through: artifact.metadata.trained_through,
            validation: artifact.metadata.validation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedSymbol {
    pub symbol: Symbol,
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: String,
}

impl FailedSymbol {
    fn new(symbol: Symbol, error: &ForecastError) -> Self {
        Self {
            symbol,
            kind: error.kind(),
            code: error.code(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: UtcDateTime,
    pub finished_at: UtcDateTime,
    pub succeeded: Vec<TrainedSymbol>,
    pub failed: Vec<FailedSymbol>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

type Outcome = Result<TrainedSymbol, ForecastError>;

/// Runs fetch, feature building, training and persistence per symbol.
#[derive(Clone)]
pub struct Orchestrator {
    source: Arc<dyn DataSource>,
    store: Arc<dyn ModelStore>,
    cache: Option<Arc<dyn BarCache>>,
    trainer: ModelTrainer,
    builder: FeatureBuilder,
    config: PipelineConfig,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn DataSource>,
        store: Arc<dyn ModelStore>,
        trainer: ModelTrainer,
        config: PipelineConfig,
    ) -> Self {
        let limiter = config
            .requests_per_second
            .map(|rate| Arc::new(RateLimiter::direct(Quota::per_second(rate))));
        Self {
            source,
            store,
            cache: None,
            trainer,
            builder: FeatureBuilder::new(),
            config,
            limiter,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn BarCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Train every symbol once. Duplicates are dropped before any work starts
    /// and report entries keep first-seen order.
    pub async fn run(&self, symbols: &[Symbol]) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = UtcDateTime::now();
        let symbols = dedupe_symbols(symbols.iter().cloned());
        info!(%run_id, symbols = symbols.len(), source = %self.source.id(), "training run started");

        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut jobs = JoinSet::new();
        for (index, symbol) in symbols.iter().cloned().enumerate() {
            let job = self.clone();
            let permits = Arc::clone(&permits);
            jobs.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let outcome = job.train_symbol(&symbol).await;
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<Outcome>> = symbols.iter().map(|_| None).collect();
        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(error) => warn!(%run_id, %error, "training job aborted"),
            }
        }

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (symbol, outcome) in symbols.into_iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|| {
                Err(ForecastError::TrainingFailed {
                    symbol: symbol.clone(),
                    reason: String::from("training job aborted"),
                })
            });
            match outcome {
                Ok(trained) => succeeded.push(trained),
                Err(error) => {
                    warn!(%run_id, symbol = %symbol, code = error.code(), %error, "symbol failed");
                    failed.push(FailedSymbol::new(symbol, &error));
                }
            }
        }

        info!(
            %run_id,
            succeeded = succeeded.len(),
            failed = failed.len(),
            "training run finished"
        );

        RunReport {
            run_id,
            started_at,
            finished_at: UtcDateTime::now(),
            succeeded,
            failed,
        }
    }

    async fn train_symbol(&self, symbol: &Symbol) -> Outcome {
        let end = self
            .config
            .end
            .unwrap_or_else(TradingDate::last_completed_day);
        let mut start = end.add_days(-(i64::from(self.config.history_days.max(1)) - 1));

        if let Some(cache) = &self.cache {
            let cache = Arc::clone(cache);
            let key = symbol.clone();
            let cached_through =
                run_blocking(symbol, move || cache.last_bar_date(&key)).await?;
            // Refetch the newest cached day; the merge keeps the fetched bar.
            if let Some(last) = cached_through {
                start = start.max(last);
            }
        }

        let fetched = if start > end {
            BarSeries::empty(symbol.clone())
        } else {
            self.fetch(symbol, start, end).await?
        };

        let job = self.clone();
        run_blocking(symbol, move || job.fit_and_store(fetched)).await
    }

    async fn fetch(
        &self,
        symbol: &Symbol,
        start: TradingDate,
        end: TradingDate,
    ) -> Result<BarSeries, ForecastError> {
        let unavailable = |source: SourceError| ForecastError::DataUnavailable {
            symbol: symbol.clone(),
            source,
        };

        let request = BarsRequest::new(symbol.clone(), start, end).map_err(unavailable)?;
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let mut policy = FetchPolicy::default().with_timeout(self.config.fetch_timeout);
        if !self.config.retry_once {
            policy = policy.without_retry();
        }
        fetch_bars(self.source.as_ref(), request, policy)
            .await
            .map_err(unavailable)
    }

    fn fit_and_store(&self, fetched: BarSeries) -> Outcome {
        let series = match &self.cache {
            Some(cache) => cache.merge(&fetched)?,
            None => fetched,
        };

        let table = self.builder.training(&series)?;
        let artifact = self.trainer.train_and_store(&table, self.store.as_ref())?;
        Ok(TrainedSymbol::new(series.len(), &artifact))
    }
}

/// Runs cache access and model fitting off the async executor.
async fn run_blocking<T, F>(symbol: &Symbol, work: F) -> Result<T, ForecastError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ForecastError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|error| ForecastError::TrainingFailed {
            symbol: symbol.clone(),
            reason: format!("training task failed: {error}"),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryModelStore;
    use ferrocast_core::{Bar, FixtureSource};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    fn end() -> TradingDate {
        TradingDate::parse("2024-06-30").expect("date")
    }

    fn series(symbol: &str, len: usize) -> BarSeries {
        let first = end().add_days(-(len as i64 - 1));
        let bars = (0..len)
            .map(|i| {
                let x = i as f64;
                let close = 30.0 + (x * 0.3).sin() * 2.0 + x * 0.02;
                let high = close * (1.0 + 0.008 + (x * 0.11).cos().abs() * 0.01);
                Bar::new(first.add_days(i as i64), close, high, close * 0.99, close, 2_000)
                    .expect("bar")
            })
            .collect();
        BarSeries::new(Symbol::parse(symbol).expect("symbol"), bars).expect("series")
    }

    fn symbols(names: &[&str]) -> Vec<Symbol> {
        names
            .iter()
            .map(|name| Symbol::parse(name).expect("symbol"))
            .collect()
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            history_days: 400,
            end: Some(end()),
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn short_history_fails_only_that_symbol() {
        let source = Arc::new(
            FixtureSource::new()
                .with_series(series("AAA", 200))
                .with_series(series("BBB", 10))
                .with_series(series("CCC", 200)),
        );
        let store = Arc::new(MemoryModelStore::new());
        let orchestrator =
            Orchestrator::new(source, store.clone(), ModelTrainer::default(), config());

        let report = orchestrator.run(&symbols(&["AAA", "BBB", "CCC"])).await;

        let trained: Vec<&str> = report.succeeded.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(trained, vec!["AAA", "CCC"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].symbol.as_str(), "BBB");
        assert_eq!(report.failed[0].kind, ErrorKind::InsufficientHistory);
        assert_eq!(
            store.symbols().expect("symbols"),
            symbols(&["AAA", "CCC"])
        );
    }

    #[tokio::test]
    async fn duplicates_are_trained_once() {
        let source = Arc::new(FixtureSource::new().with_series(series("AAA", 120)));
        let orchestrator = Orchestrator::new(
            source.clone(),
            Arc::new(MemoryModelStore::new()),
            ModelTrainer::default(),
            config(),
        );

        let report = orchestrator.run(&symbols(&["AAA", "AAA"])).await;

        assert_eq!(report.total(), 1);
        assert!(report.is_success());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn source_failures_become_data_unavailable() {
        let source = Arc::new(FixtureSource::new().with_failure(
            Symbol::parse("GONE").expect("symbol"),
            SourceError::not_found("delisted"),
        ));
        let orchestrator = Orchestrator::new(
            source,
            Arc::new(MemoryModelStore::new()),
            ModelTrainer::default(),
            config(),
        );

        let report = orchestrator.run(&symbols(&["GONE"])).await;

        assert_eq!(report.failed[0].kind, ErrorKind::DataUnavailable);
        assert_eq!(report.failed[0].code, "forecast.data_unavailable");
    }

    #[tokio::test]
    async fn parallel_run_keeps_input_order() {
        let names = ["EEE", "AAA", "DDD", "BBB", "CCC"];
        let source = names
            .iter()
            .fold(FixtureSource::new(), |source, name| {
                source.with_series(series(name, 120))
            });
        let orchestrator = Orchestrator::new(
            Arc::new(source),
            Arc::new(MemoryModelStore::new()),
            ModelTrainer::default(),
            PipelineConfig {
                concurrency: 3,
                ..config()
            },
        );

        let report = orchestrator.run(&symbols(&names)).await;

        let trained: Vec<&str> = report.succeeded.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(trained, names.to_vec());
    }

    #[derive(Default)]
    struct MemoryCache {
        bars: Mutex<BTreeMap<Symbol, BarSeries>>,
    }

    impl BarCache for MemoryCache {
        fn last_bar_date(&self, symbol: &Symbol) -> Result<Option<TradingDate>, ForecastError> {
            let bars = self.bars.lock().map_err(|e| ForecastError::Cache(e.to_string()))?;
            Ok(bars.get(symbol).and_then(BarSeries::last_date))
        }

        fn merge(&self, fetched: &BarSeries) -> Result<BarSeries, ForecastError> {
            let mut bars = self.bars.lock().map_err(|e| ForecastError::Cache(e.to_string()))?;
            let merged = match bars.remove(fetched.symbol()) {
                Some(existing) => existing.merge(fetched.clone()),
                None => fetched.clone(),
            };
            bars.insert(fetched.symbol().clone(), merged.clone());
            Ok(merged)
        }
    }

    #[tokio::test]
    async fn cached_history_is_extended_not_refetched() {
        let full = series("AAA", 150);
        let cache = Arc::new(MemoryCache::default());
        cache
            .merge(&full.truncate_after(end().add_days(-10)))
            .expect("seed cache");

        let source = Arc::new(FixtureSource::new().with_series(full.clone()));
        let orchestrator = Orchestrator::new(
            source,
            Arc::new(MemoryModelStore::new()),
            ModelTrainer::default(),
            config(),
        )
        .with_cache(cache.clone());

        let report = orchestrator.run(&symbols(&["AAA"])).await;

        assert_eq!(report.succeeded[0].bars, full.len());
        let symbol = Symbol::parse("AAA").expect("symbol");
        assert_eq!(cache.last_bar_date(&symbol).expect("cache"), Some(end()));
    }

    #[tokio::test]
    async fn newest_cached_bar_is_replaced_by_refetched_one() {
        let full = series("AAA", 150);
        let cache = Arc::new(MemoryCache::default());
        let provisional = full.truncate_after(end().add_days(-1));
        cache.merge(&provisional).expect("seed cache");

        let last = provisional.bars()[provisional.len() - 1].clone();
        let revised = Bar::new(last.date, last.open, 999.0, last.low, last.close, 1_000_000)
            .expect("bar");
        let mut bars = provisional.into_bars();
        bars.pop();
        bars.push(revised);
        bars.push(full.bars()[full.len() - 1].clone());
        let source = Arc::new(FixtureSource::new().with_series(
            BarSeries::new(Symbol::parse("AAA").expect("symbol"), bars).expect("series"),
        ));

        let orchestrator = Orchestrator::new(
            source,
            Arc::new(MemoryModelStore::new()),
            ModelTrainer::default(),
            config(),
        )
        .with_cache(cache.clone());
        let report = orchestrator.run(&symbols(&["AAA"])).await;
        assert!(report.is_success());

        let merged = cache
            .merge(&BarSeries::empty(Symbol::parse("AAA").expect("symbol")))
            .expect("cached");
        let refreshed = merged
            .bars()
            .iter()
            .find(|bar| bar.date == last.date)
            .expect("cached bar");
        assert_eq!(refreshed.high, 999.0);
        assert_eq!(refreshed.volume, 1_000_000);
        assert_eq!(merged.last_date(), Some(end()));
    }

    #[tokio::test]
    async fn unset_end_stops_before_the_current_day() {
        let today = TradingDate::today();
        let bars = (0..120)
            .map(|i| {
                let close = 40.0 + (i as f64 * 0.2).sin();
                Bar::new(today.add_days(i - 119), close, close * 1.01, close * 0.99, close, 1_500)
                    .expect("bar")
            })
            .collect();
        let source = Arc::new(FixtureSource::new().with_series(
            BarSeries::new(Symbol::parse("AAA").expect("symbol"), bars).expect("series"),
        ));
        let orchestrator = Orchestrator::new(
            source,
            Arc::new(MemoryModelStore::new()),
            ModelTrainer::default(),
            PipelineConfig {
                history_days: 400,
                ..PipelineConfig::default()
            },
        );

        let report = orchestrator.run(&symbols(&["AAA"])).await;

        assert!(report.is_success());
        assert_eq!(report.succeeded[0].bars, 119);
        assert!(report.succeeded[0].trained_through < TradingDate::last_completed_day());
    }
}
