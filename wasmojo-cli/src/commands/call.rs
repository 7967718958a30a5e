//! Call command - invoke an export by name.

use anyhow::{Context, Result};
use std::path::Path;
use wasmojo_core::RuntimeConfig;
use wasmojo_core::value::{format_val, parse_args};

/// Run the call command.
pub fn run(wasm: &Path, export: &str, args: &[String], fuel: Option<u64>) -> Result<()> {
    tracing::info!(wasm = %wasm.display(), export = %export, args = args.len(), "Calling export");

    let mut config = RuntimeConfig::default();
    if let Some(amount) = fuel {
        config = config.with_fuel(true, amount);
    }
    let mut session = super::open_session(wasm, config)?;

    let ty = session
        .func_type(export)
        .with_context(|| format!("Cannot call '{}'", export))?;
    let params = parse_args(&ty, args).with_context(|| format!("Bad arguments for '{}'", export))?;

    let result = session
        .call(export, &params)
        .with_context(|| format!("Call to '{}' failed", export))?;

    match result {
        Some(val) => println!("{}", format_val(&val)),
        None => println!("(no result)"),
    }

    super::print_captured(&session);

    if let (Some(budget), Some(left)) = (fuel, session.fuel()) {
        tracing::info!(consumed = budget.saturating_sub(left), "Fuel used");
    }

    Ok(())
}
