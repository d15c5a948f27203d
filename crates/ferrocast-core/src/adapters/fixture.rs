use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::data_source::{BarsRequest, DataSource, SourceError};
use crate::{BarSeries, ProviderId, Symbol};

#[derive(Debug, Clone)]
enum Scripted {
    Series(BarSeries),
    Failure(SourceError),
}

/// In-memory source with scripted per-symbol responses.
///
/// Served bars are clipped to the requested range. Symbols with no script
/// answer with [`SourceError::not_found`]. A queue of one-shot failures can be
/// pushed ahead of the scripted answer to exercise retry paths.
#[derive(Debug, Default)]
pub struct FixtureSource {
    scripts: BTreeMap<Symbol, Scripted>,
    transient: Mutex<BTreeMap<Symbol, Vec<SourceError>>>,
    calls: AtomicUsize,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, series: BarSeries) -> Self {
        self.scripts
            .insert(series.symbol().clone(), Scripted::Series(series));
        self
    }

    pub fn with_failure(mut self, symbol: Symbol, error: SourceError) -> Self {
        self.scripts.insert(symbol, Scripted::Failure(error));
        self
    }

    /// Fail the next request for `symbol` once with `error`, then fall through.
    pub fn with_transient_failure(self, symbol: Symbol, error: SourceError) -> Self {
        if let Ok(mut transient) = self.transient.lock() {
            transient.entry(symbol).or_default().push(error);
        }
        self
    }

    /// Total number of `bars` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn take_transient(&self, symbol: &Symbol) -> Option<SourceError> {
        let mut transient = self.transient.lock().ok()?;
        let queue = transient.get_mut(symbol)?;
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }

    fn answer(&self, req: &BarsRequest) -> Result<BarSeries, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.take_transient(&req.symbol) {
            return Err(error);
        }

        match self.scripts.get(&req.symbol) {
            Some(Scripted::Series(series)) => {
                let bars = series
                    .bars()
                    .iter()
                    .filter(|bar| req.contains(bar.date))
                    .cloned()
                    .collect();
                BarSeries::new(req.symbol.clone(), bars).map_err(SourceError::from)
            }
            Some(Scripted::Failure(error)) => Err(error.clone()),
            None => Err(SourceError::not_found(format!(
                "no fixture data for '{}'",
                req.symbol
            ))),
        }
    }
}

impl DataSource for FixtureSource {
    fn id(&self) -> ProviderId {
        ProviderId::Fixture
    }

    fn bars<'a>(
        &'a self,
        req: BarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<BarSeries, SourceError>> + Send + 'a>> {
        Box::pin(async move { self.answer(&req) })
    }
}
