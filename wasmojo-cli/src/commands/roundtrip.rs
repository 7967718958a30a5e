//! Roundtrip command - marshal a string through guest memory.

use anyhow::{Context, Result};
use std::path::Path;
use wasmojo_core::RuntimeConfig;
use wasmtime::Val;

/// Run the roundtrip command.
pub fn run(wasm: &Path, text: &str, via: Option<&str>) -> Result<()> {
    let mut session = super::open_session(wasm, RuntimeConfig::default())?;

    let input = session
        .write_string_struct(text)
        .context("Failed to encode string")?;
    tracing::info!(struct_ptr = input, len = text.len(), "Encoded string");

    let decoded_ptr = match via {
        Some(export) => {
            let output = session
                .alloc_string_struct()
                .context("Failed to allocate output struct")?;
            session
                .call(export, &[Val::I64(input as i64), Val::I64(output as i64)])
                .with_context(|| format!("Call to '{}' failed", export))?;
            output
        }
        None => input,
    };

    let header = wasmojo_core::strings::read_string_header(
        session.store(),
        session.memory(),
        decoded_ptr,
    )
    .context("Failed to read string struct")?;
    let decoded = session
        .read_string_struct(decoded_ptr)
        .context("Failed to decode string")?;

    println!("Struct:  0x{:x}", decoded_ptr);
    println!("Form:    {:?}", header.repr());
    println!("Decoded: {:?}", decoded);

    super::print_captured(&session);

    if decoded != text {
        anyhow::bail!("Round trip changed the string: {:?} -> {:?}", text, decoded);
    }

    Ok(())
}
