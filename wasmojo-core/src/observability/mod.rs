//! Logging setup for harness binaries.
//!
//! Format is controlled via `WASMOJO_LOG_FORMAT`:
//! - `json` - Structured JSON output
//! - `pretty` - Human-readable colored output (default when stderr is a TTY)
//! - `compact` - Compact single-line format
//!
//! # Example
//!
//! ```ignore
//! use wasmojo_core::observability::{TracingConfig, init_tracing};
//!
//! let _guard = init_tracing(TracingConfig::from_env())?;
//! ```

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig, TracingConfigBuilder};
pub use tracing_setup::{TracingGuard, init_tracing};
