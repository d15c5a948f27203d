use ferrocast_core::Symbol;
use ferrocast_ml::ForecastError;
use serde_json::json;

use super::{CommandResult, Context};
use crate::cli::InspectArgs;
use crate::error::CliError;

pub fn run(args: &InspectArgs, context: &Context) -> Result<CommandResult, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let warehouse = context.warehouse()?;
    let coverage = warehouse
        .coverage(&symbol)?
        .ok_or_else(|| CliError::NoCachedBars {
            symbol: symbol.to_string(),
        })?;

    let model = match context.store().get(&symbol) {
        Ok(artifact) => Some(artifact.metadata),
        Err(ForecastError::ModelNotFound { .. }) => None,
        Err(error) => return Err(error.into()),
    };
    let predictions = warehouse.predictions_for(&symbol)?;

    Ok(CommandResult::ok(json!({
        "symbol": symbol,
        "first_date": coverage.first_date,
        "last_date": coverage.last_date,
        "trading_days": coverage.trading_days,
        "model": model,
        "logged_predictions": predictions.len(),
        "last_prediction": predictions.last(),
    })))
}
