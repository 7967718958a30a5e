//! wasmojo core library
//!
//! Host-side harness for WebAssembly modules compiled from Mojo. It
//! supplies the imports such a module expects, manages a bump allocator
//! over guest memory, and marshals strings to and from the guest's 24-byte
//! `String` struct.
//!
//! # Key Components
//!
//! - **LinearMemory**: Bounds-checked reads and writes over guest memory
//! - **BumpAllocator**: Monotonic allocator seeded from `__heap_base`
//! - **Imports**: The `env` functions the guest links against
//! - **Strings**: Inline and heap forms of the guest string struct
//! - **Session**: Call-by-name dispatch into any export
//!
//! # Example
//!
//! ```ignore
//! use wasmojo_core::prelude::*;
//!
//! let runtime = WasmRuntime::with_defaults()?;
//! let mut session = Session::load(&runtime, Path::new("build/out.wasm"))?;
//!
//! let input = session.write_string_struct("hello")?;
//! let output = session.alloc_string_struct()?;
//! session.call("return_input_string", &[Val::I64(input as i64), Val::I64(output as i64)])?;
//! assert_eq!(session.read_string_struct(output)?, "hello");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alloc;
pub mod error;
pub mod imports;
pub mod memory;
pub mod observability;
pub mod runtime;
pub mod session;
pub mod strings;
pub mod value;

pub use alloc::BumpAllocator;
pub use error::{HarnessError, Result};
pub use imports::{HostState, IMPORT_CATALOG, ImportSpec, ValKind};
pub use memory::LinearMemory;
pub use runtime::{CompiledModule, RuntimeConfig, WasmRuntime};
pub use session::Session;
pub use strings::{StringHeader, StringRepr};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{HarnessError, Result};
    pub use crate::runtime::{RuntimeConfig, WasmRuntime};
    pub use crate::session::Session;
    pub use std::path::Path;
    pub use wasmtime::Val;
}
