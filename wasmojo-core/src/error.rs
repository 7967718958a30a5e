//! Error types for the harness.
//!
//! Every variant carries a stable code so failures can be matched in logs
//! and tests without parsing messages. Engine failures (link errors, traps,
//! argument mismatches) are carried through untouched in [`HarnessError::Engine`].

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for harness operations.
#[derive(Error, Debug)]
pub enum HarnessError {
    // =========================================================================
    // Memory Errors (E100-E199)
    // =========================================================================
    /// Access beyond the current extent of linear memory.
    #[error("E101: Linear memory access out of bounds: offset={offset}, len={len}, size={size}")]
    Bounds {
        /// Requested start offset (may be negative when it came from the guest).
        offset: i128,
        /// Requested length in bytes.
        len: i128,
        /// Memory size in bytes at the time of the access.
        size: u64,
    },

    /// Allocation requested with an alignment that is not a power of two.
    #[error("E102: Invalid allocation alignment {align}: must be a power of two >= 1")]
    InvalidAlignment {
        /// The rejected alignment.
        align: i64,
    },

    /// Allocator cursor would overflow the address space.
    #[error("E103: Allocator exhausted: cursor {cursor} cannot advance by {requested} bytes")]
    AllocatorExhausted {
        /// Cursor position at the time of the request.
        cursor: u64,
        /// Number of bytes requested (including alignment padding).
        requested: u64,
    },

    // =========================================================================
    // Linking Errors (E200-E299)
    // =========================================================================
    /// A named export or import could not be resolved.
    #[error("E201: {kind} '{name}' not found")]
    NotFound {
        /// Either "export" or "import".
        kind: &'static str,
        /// The unresolved name (imports are module-qualified).
        name: String,
    },

    /// A named export exists but has the wrong kind or type.
    #[error("E202: Export '{name}' has wrong type: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The export name.
        name: String,
        /// What the caller required.
        expected: &'static str,
        /// What the module actually exports.
        actual: String,
    },

    // =========================================================================
    // ABI Errors (E300-E399)
    // =========================================================================
    /// A string struct pointed at bytes that are not valid UTF-8.
    #[error("E301: Malformed UTF-8 in string struct at {struct_ptr}: {source}")]
    Encoding {
        /// Address of the 24-byte string struct.
        struct_ptr: u64,
        /// The underlying decode failure.
        #[source]
        source: std::string::FromUtf8Error,
    },

    // =========================================================================
    // Loading Errors (E400-E499)
    // =========================================================================
    /// Engine creation or module compilation failed.
    #[error("E401: Failed to load WASM module '{module}': {cause}")]
    ModuleLoad {
        /// The module (or "engine") that failed.
        module: String,
        /// Reason for the failure.
        cause: String,
    },

    /// Reading a module from disk failed.
    #[error("E402: I/O error at {path}: {source}")]
    Io {
        /// The file being read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Registering a host function with the linker failed.
    #[error("E403: Host function '{function}' could not be registered: {cause}")]
    HostFunction {
        /// The import name.
        function: String,
        /// Reason for the failure.
        cause: String,
    },

    // =========================================================================
    // Engine Errors (E500-E599)
    // =========================================================================
    /// An error raised by wasmtime itself: instantiation failure, trap, or
    /// argument mismatch on a dynamic call.
    #[error(transparent)]
    Engine(#[from] wasmtime::Error),
}

impl HarnessError {
    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Bounds { .. } => "E101",
            Self::InvalidAlignment { .. } => "E102",
            Self::AllocatorExhausted { .. } => "E103",
            Self::NotFound { .. } => "E201",
            Self::TypeMismatch { .. } => "E202",
            Self::Encoding { .. } => "E301",
            Self::ModuleLoad { .. } => "E401",
            Self::Io { .. } => "E402",
            Self::HostFunction { .. } => "E403",
            Self::Engine(_) => "E501",
        }
    }

    /// The wasmtime trap code, if this error is a guest trap.
    #[must_use]
    pub fn trap(&self) -> Option<wasmtime::Trap> {
        match self {
            Self::Engine(err) => err.downcast_ref::<wasmtime::Trap>().copied(),
            _ => None,
        }
    }

    /// Check if this error is a linear-memory bounds violation.
    #[must_use]
    pub fn is_bounds(&self) -> bool {
        matches!(self, Self::Bounds { .. })
    }

    pub(crate) fn export_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "export",
            name: name.into(),
        }
    }
}

/// Result type alias using `HarnessError`.
pub type Result<T> = std::result::Result<T, HarnessError>;
