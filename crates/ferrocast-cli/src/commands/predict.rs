use ferrocast_core::{fetch_bars, BarsRequest, FetchPolicy, SourceError, Symbol, TradingDate};
use ferrocast_ml::{ForecastError, Predictor};
use tracing::{info, warn};

use super::{CommandResult, Context};
use crate::cli::PredictArgs;
use crate::error::CliError;

pub async fn run(args: &PredictArgs, context: &Context) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let unavailable = |source: SourceError| ForecastError::DataUnavailable {
        symbol: symbol.clone(),
        source,
    };

    let end = TradingDate::last_completed_day();
    let request = BarsRequest::trailing(symbol.clone(), end, args.days).map_err(unavailable)?;
    let mut policy = FetchPolicy::default();
    if let Some(timeout) = context.settings.fetch_timeout() {
        policy = policy.with_timeout(timeout);
    }
    let source = context.source();
    let series = fetch_bars(source.as_ref(), request, policy)
        .await
        .map_err(unavailable)?;

    let predictor = Predictor::new(context.store(), context.settings.predictor);
    let record = predictor.predict(&series)?;
    info!(
        symbol = %record.symbol,
        as_of = %record.as_of,
        predicted_move = record.predicted_move,
        "prediction issued"
    );

    if !args.no_log {
        // Log failures only warn; the forecast is still printed.
        match context.warehouse() {
            Ok(warehouse) => {
                if let Err(error) = warehouse.append_prediction(&record) {
                    warn!(symbol = %symbol, error = %error, "prediction not logged");
                }
            }
            Err(error) => warn!(symbol = %symbol, error = %error, "prediction not logged"),
        }
    }

    Ok(CommandResult::ok(serde_json::to_value(&record)?))
}
