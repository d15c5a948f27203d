use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use time::macros::date;
use time::Weekday;
use tracing::{debug, warn};

use crate::data_source::{BarsRequest, DataSource, SourceError};
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::{Bar, BarSeries, ProviderId, Symbol, TradingDate};

const CHART_ENDPOINT: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance daily-bar adapter.
///
/// With a real transport it calls the public v8 chart endpoint. With a mock
/// transport (the default) it produces deterministic synthetic bars so the
/// whole pipeline can run offline.
#[derive(Clone)]
pub struct YahooAdapter {
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
    use_real_api: bool,
}

impl Default for YahooAdapter {
    fn default() -> Self {
        Self {
            http_client: Arc::new(NoopHttpClient),
            timeout_ms: 10_000,
            use_real_api: false,
        }
    }
}

impl YahooAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            use_real_api,
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms.max(1);
        self
    }

    async fn fetch_real_bars(&self, req: &BarsRequest) -> Result<BarSeries, SourceError> {
        // period2 is exclusive, so ask for midnight after the last requested day.
        let endpoint = format!(
            "{CHART_ENDPOINT}/{}?period1={}&period2={}&interval=1d&events=history",
            urlencoding::encode(req.symbol.as_str()),
            req.start.unix_midnight(),
            req.end.add_days(1).unix_midnight(),
        );

        let request = HttpRequest::get(endpoint)
            .with_header("referer", "https://finance.yahoo.com/")
            .with_timeout(Duration::from_millis(self.timeout_ms));

        let response = self.http_client.execute(request).await.map_err(|error| {
            if error.retryable() {
                SourceError::unavailable(format!("yahoo transport error: {}", error.message()))
            } else {
                SourceError::internal(format!("yahoo transport error: {}", error.message()))
            }
        })?;

        match response.status {
            404 => {
                return Err(SourceError::not_found(format!(
                    "yahoo has no chart data for '{}'",
                    req.symbol
                )))
            }
            429 => {
                return Err(SourceError::rate_limited(
                    "yahoo rate limited the chart request",
                ))
            }
            _ if !response.is_success() => {
                return Err(SourceError::unavailable(format!(
                    "yahoo returned status {}",
                    response.status
                )))
            }
            _ => {}
        }

        parse_chart_response(&req.symbol, &response.body, req)
    }

    fn fetch_fake_bars(&self, req: &BarsRequest) -> Result<BarSeries, SourceError> {
        let seed = symbol_seed(&req.symbol);
        let mut bars = Vec::new();
        let mut next = Some(req.start);

        while let Some(date) = next.filter(|date| *date <= req.end) {
            if !matches!(date.into_inner().weekday(), Weekday::Saturday | Weekday::Sunday) {
                bars.push(synthetic_bar(seed, date)?);
            }
            next = date.next_day();
        }

        BarSeries::new(req.symbol.clone(), bars).map_err(SourceError::from)
    }
}

impl DataSource for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn bars<'a>(
        &'a self,
        req: BarsRequest,
    ) -> Pin<Box<dyn Future<Output = Result<BarSeries, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            if self.use_real_api {
                self.fetch_real_bars(&req).await
            } else {
                self.fetch_fake_bars(&req)
            }
        })
    }
}

fn parse_chart_response(
    symbol: &Symbol,
    body: &str,
    req: &BarsRequest,
) -> Result<BarSeries, SourceError> {
    let chart_response: YahooChartResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::internal(format!("failed to parse yahoo chart: {e}")))?;

    if let Some(error) = chart_response.chart.error {
        let description = error.description.unwrap_or_default();
        if error.code.eq_ignore_ascii_case("not found") {
            return Err(SourceError::not_found(format!(
                "yahoo chart: {description}"
            )));
        }
        return Err(SourceError::unavailable(format!(
            "yahoo chart API error {}: {description}",
            error.code
        )));
    }

    let Some(result) = chart_response.chart.result.and_then(|mut r| r.pop()) else {
        return Err(SourceError::not_found(format!(
            "yahoo returned no chart result for '{symbol}'"
        )));
    };

    let Some(timestamps) = result.timestamp else {
        // A valid symbol with no trading days in range.
        return Ok(BarSeries::empty(symbol.clone()));
    };

    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::internal("yahoo chart has no quote block"))?;
    let adjclose = result
        .indicators
        .adjclose
        .and_then(|blocks| blocks.into_iter().next())
        .map(|block| block.adjclose);

    let mut bars = Vec::with_capacity(timestamps.len());
    let mut skipped = 0usize;
    for (index, &ts) in timestamps.iter().enumerate() {
        let date = TradingDate::from_unix_timestamp(ts)
            .map_err(|e| SourceError::internal(e.to_string()))?;
        if !req.contains(date) {
            continue;
        }

        let fields = (
            value_at(&quote.open, index),
            value_at(&quote.high, index),
            value_at(&quote.low, index),
            value_at(&quote.close, index),
        );
        let (Some(open), Some(high), Some(low), Some(close)) = fields else {
            // Holidays and halted sessions come back as nulls.
            continue;
        };
        let volume = quote
            .volume
            .get(index)
            .copied()
            .flatten()
            .unwrap_or(0)
            .max(0) as u64;

        // Split/dividend adjustment, the same ratio applied to every price field.
        let factor = adjclose
            .as_ref()
            .and_then(|values| value_at(values, index))
            .filter(|adj| close > 0.0 && adj.is_finite() && *adj > 0.0)
            .map(|adj| adj / close)
            .unwrap_or(1.0);

        match Bar::new(
            date,
            open * factor,
            high * factor,
            low * factor,
            close * factor,
            volume,
        ) {
            Ok(bar) => bars.push(bar),
            Err(error) => {
                skipped += 1;
                debug!(symbol = %symbol, %date, %error, "skipping malformed yahoo bar");
            }
        }
    }

    if skipped > 0 {
        warn!(symbol = %symbol, skipped, "yahoo chart contained malformed bars");
    }

    Ok(BarSeries::from_unsorted(symbol.clone(), bars))
}

fn value_at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten().filter(|v| v.is_finite())
}

fn symbol_seed(symbol: &Symbol) -> u64 {
    symbol
        .as_str()
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |acc, byte| {
            (acc ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
        })
}

/// Deterministic bar for `date`: the same symbol and day always yield the
/// same prices, whatever range was requested.
fn synthetic_bar(seed: u64, date: TradingDate) -> Result<Bar, SourceError> {
    let epoch = TradingDate::new(date!(2000 - 01 - 01));
    let day = epoch.days_until(date) as f64;
    let phase = (seed % 360) as f64;

    let base = 40.0 + (seed % 160) as f64;
    let trend = 1.0 + day * 0.00008;
    let cycle = 1.0 + 0.08 * ((day + phase) / 23.0).sin() + 0.03 * ((day + phase) / 5.0).sin();
    let close = base * trend * cycle;

    let noise = ((seed.wrapping_add(day as u64).wrapping_mul(2_654_435_761) >> 8) % 1000) as f64
        / 1000.0;
    let open = close * (1.0 + (noise - 0.5) * 0.02);
    let high = open.max(close) * (1.0 + 0.004 + noise * 0.012);
    let low = open.min(close) * (1.0 - 0.004 - (1.0 - noise) * 0.012);
    let volume = 200_000 + ((seed ^ day as u64) % 800_000);

    Bar::new(date, open, high, low, close, volume).map_err(SourceError::from)
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResponse {
    chart: YahooChartData,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartData {
    #[serde(default)]
    result: Option<Vec<YahooChartResult>>,
    #[serde(default)]
    error: Option<YahooChartError>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResult {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: YahooChartIndicators,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartIndicators {
    quote: Vec<YahooChartQuote>,
    #[serde(default)]
    adjclose: Option<Vec<YahooAdjClose>>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}
