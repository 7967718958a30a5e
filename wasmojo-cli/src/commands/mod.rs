//! CLI command implementations.

pub mod call;
pub mod exports;
pub mod imports;
pub mod roundtrip;
pub mod version;

use anyhow::{Context, Result};
use std::path::Path;
use wasmojo_core::{RuntimeConfig, Session, WasmRuntime};

/// Instantiate the module at `wasm` with the given runtime configuration.
pub(crate) fn open_session(wasm: &Path, config: RuntimeConfig) -> Result<Session> {
    if !wasm.exists() {
        anyhow::bail!("Module not found: {}", wasm.display());
    }

    let runtime = WasmRuntime::new(config).context("Failed to create WASM runtime")?;
    Session::load(&runtime, wasm)
        .with_context(|| format!("Failed to instantiate {}", wasm.display()))
}

/// Print whatever the guest wrote to stdout during the session.
pub(crate) fn print_captured(session: &Session) {
    let captured = session.captured_stdout();
    if captured.is_empty() {
        return;
    }
    println!();
    println!("Guest stdout:");
    for chunk in captured {
        print!("{chunk}");
    }
    if !captured.concat().ends_with('\n') {
        println!();
    }
}
