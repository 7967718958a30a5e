//! wasmojo CLI - Drive a Mojo-compiled WebAssembly module from the host.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wasmojo_core::observability::{TracingConfig, TracingGuard, init_tracing};

/// wasmojo - Host harness for Mojo-compiled wasm64 modules.
#[derive(Parser)]
#[command(name = "wasmojo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the compiled module
    #[arg(
        short,
        long,
        env = "WASMOJO_WASM",
        default_value = "build/out.wasm",
        global = true
    )]
    wasm: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call an exported function with positional arguments
    Call {
        /// Export name
        export: String,

        /// Arguments, parsed against the export's parameter types
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,

        /// Enable fuel metering with this budget
        #[arg(long)]
        fuel: Option<u64>,
    },

    /// List the module's imports and whether the host provides them
    Imports,

    /// List the module's exports
    Exports,

    /// Encode a string into guest memory and decode it back
    Roundtrip {
        /// Text to encode
        text: String,

        /// Guest function taking (input, output) string pointers to pass it through
        #[arg(long)]
        via: Option<String>,
    },

    /// Show version information
    Version,
}

fn setup_logging(verbosity: u8) -> Result<TracingGuard> {
    // WASMOJO_LOG_LEVEL / RUST_LOG take precedence over -v
    init_tracing(TracingConfig::from_env_or(verbosity_filter(verbosity)))
}

fn verbosity_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _tracing_guard = setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Call { export, args, fuel } => {
            commands::call::run(&cli.wasm, &export, &args, fuel)
        }
        Commands::Imports => commands::imports::run(&cli.wasm),
        Commands::Exports => commands::exports::run(&cli.wasm),
        Commands::Roundtrip { text, via } => {
            commands::roundtrip::run(&cli.wasm, &text, via.as_deref())
        }
        Commands::Version => commands::version::run(),
    }
}
