//! Imports command - check the module's imports against the host catalog.

use anyhow::{Context, Result};
use std::path::Path;
use wasmojo_core::imports::{ImportStatus, check_module_imports};
use wasmojo_core::{IMPORT_CATALOG, WasmRuntime};

/// Run the imports command.
///
/// Only compiles the module, so it works on modules that would fail to
/// instantiate.
pub fn run(wasm: &Path) -> Result<()> {
    let runtime = WasmRuntime::with_defaults().context("Failed to create WASM runtime")?;
    let module = runtime
        .compile_file(wasm)
        .with_context(|| format!("Failed to compile {}", wasm.display()))?;

    let checks = check_module_imports(module.module());

    println!("Imports of {}", wasm.display());
    println!("============{}", "=".repeat(wasm.display().to_string().len()));
    println!();

    let mut unresolved = 0;
    for check in &checks {
        let qualified = format!("{}::{}", check.module, check.name);
        match &check.status {
            ImportStatus::Provided => println!("  ✓ {}", qualified),
            ImportStatus::Missing => {
                unresolved += 1;
                println!("  ✗ {} (not provided)", qualified);
            }
            ImportStatus::SignatureMismatch { expected, declared } => {
                unresolved += 1;
                println!(
                    "  ✗ {} (declares {}, host provides {})",
                    qualified, declared, expected
                );
            }
            ImportStatus::NotAFunction => {
                unresolved += 1;
                println!("  ✗ {} (not a function import)", qualified);
            }
        }
    }

    let unused: Vec<_> = IMPORT_CATALOG
        .iter()
        .filter(|spec| !checks.iter().any(|c| c.name == spec.name))
        .map(|spec| spec.name)
        .collect();

    println!();
    println!(
        "{} imports, {} unresolved, {} catalog entries unused",
        checks.len(),
        unresolved,
        unused.len()
    );
    if !unused.is_empty() {
        println!("Unused: {}", unused.join(", "));
    }

    if unresolved > 0 {
        anyhow::bail!("{} import(s) cannot be satisfied", unresolved);
    }

    Ok(())
}
