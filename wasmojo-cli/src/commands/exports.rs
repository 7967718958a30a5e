//! Exports command - list what the module exports.

use anyhow::Result;
use std::path::Path;
use wasmojo_core::RuntimeConfig;
use wasmojo_core::session::extern_type_kind;
use wasmtime::ExternType;

/// Run the exports command.
pub fn run(wasm: &Path) -> Result<()> {
    let session = super::open_session(wasm, RuntimeConfig::default())?;
    let exports = session.exports();

    println!("Exports of {}", wasm.display());
    println!("============{}", "=".repeat(wasm.display().to_string().len()));
    println!();

    for (name, ty) in &exports {
        let detail = match ty {
            ExternType::Func(func) => {
                let params: Vec<String> = func.params().map(|p| p.to_string()).collect();
                let results: Vec<String> = func.results().map(|r| r.to_string()).collect();
                if results.is_empty() {
                    format!("({})", params.join(", "))
                } else {
                    format!("({}) -> {}", params.join(", "), results.join(", "))
                }
            }
            ExternType::Global(global) => format!("{}", global.content()),
            ExternType::Memory(memory) => format!(
                "{} pages{}",
                memory.minimum(),
                if memory.is_64() { ", 64-bit" } else { "" }
            ),
            _ => String::new(),
        };
        println!("  {:<10} {:<32} {}", extern_type_kind(ty), name, detail);
    }

    println!();
    println!("{} exports, heap base {}", exports.len(), session.heap_base());

    Ok(())
}
