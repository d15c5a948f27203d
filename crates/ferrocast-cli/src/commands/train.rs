use std::sync::Arc;

use ferrocast_core::{dedupe_symbols, read_symbol_file, Symbol};
use ferrocast_ml::{ModelTrainer, Orchestrator};
use tracing::info;

use super::{CommandResult, Context};
use crate::cli::TrainArgs;
use crate::error::CliError;

pub async fn run(args: &TrainArgs, context: &Context) -> Result<CommandResult, CliError> {
    let symbols = collect_symbols(args, context)?;
    let config = context
        .settings
        .pipeline_config(args.days, args.concurrency);
    let trainer = ModelTrainer::new(context.settings.trainer);

    let mut orchestrator = Orchestrator::new(context.source(), context.store(), trainer, config);
    if !args.no_cache {
        orchestrator = orchestrator.with_cache(Arc::new(context.warehouse()?));
    }

    info!(symbols = symbols.len(), home = %context.home.display(), "training run starting");
    let report = orchestrator.run(&symbols).await;

    Ok(CommandResult::ok(serde_json::to_value(&report)?)
        .with_partial_failure(!report.is_success()))
}

/// Positional symbols followed by the symbol file, duplicates dropped.
fn collect_symbols(args: &TrainArgs, context: &Context) -> Result<Vec<Symbol>, CliError> {
    let mut symbols = args
        .symbols
        .iter()
        .map(|raw| Symbol::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let file = args
        .symbols_file
        .as_ref()
        .or(context.settings.symbols_file.as_ref().filter(|_| symbols.is_empty()));
    if let Some(path) = file {
        symbols.extend(read_symbol_file(path)?);
    }

    if symbols.is_empty() {
        return Err(CliError::Usage(String::from(
            "no symbols given; pass SYMBOL arguments or --symbols FILE",
        )));
    }
    Ok(dedupe_symbols(symbols))
}
