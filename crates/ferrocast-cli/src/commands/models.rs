use ferrocast_core::Symbol;
use serde_json::{json, Value};

use super::{CommandResult, Context};
use crate::cli::ModelsArgs;
use crate::error::CliError;

pub fn run(args: &ModelsArgs, context: &Context) -> Result<CommandResult, CliError> {
    let store = context.store();

    if let Some(raw) = &args.remove {
        let symbol = Symbol::parse(raw)?;
        store.remove(&symbol)?;
        return Ok(CommandResult::ok(json!({ "removed": symbol })));
    }

    let mut rows = Vec::new();
    for symbol in store.symbols()? {
        let artifact = store.get(&symbol)?;
        let metadata = &artifact.metadata;
        rows.push(json!({
            "symbol": symbol,
            "trained_from": metadata.trained_from,
            "trained_through": metadata.trained_through,
            "training_rows": metadata.training_rows,
            "holdout_r2": metadata.validation.map(|m| m.r2),
            "holdout_mae": metadata.validation.map(|m| m.mae),
            "features": artifact.schema.len(),
            "trained_at": metadata.trained_at,
        }));
    }

    Ok(CommandResult::ok(Value::Array(rows)))
}
