//! Version command - show version information.

use anyhow::Result;
use wasmojo_core::IMPORT_CATALOG;

/// Version information.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the version command.
pub fn run() -> Result<()> {
    println!("wasmojo - Host harness for Mojo-compiled WebAssembly");
    println!();
    println!("Version:     {}", VERSION);
    println!(
        "Platform:    {} / {}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    println!("Imports:     {} host functions in module \"env\"", IMPORT_CATALOG.len());
    println!();
    println!("Components:");
    println!("  wasmojo-core  Import table, allocator, string ABI, sessions");
    println!("  wasmojo-cli   Command-line interface");

    Ok(())
}
