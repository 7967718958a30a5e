//! Host function bindings for the guest module.
//!
//! Provides the `env` namespace imports a Mojo-compiled module declares:
//! allocation hooks from the compiler runtime, libm intrinsics, libc-style
//! stubs, and a `write` syscall whose stdout is captured for inspection.
//!
//! ```text
//! KGEN_CompilerRT_AlignedAlloc(align: i64, size: i64) -> i64
//! KGEN_CompilerRT_AlignedFree(ptr: i64)
//! fmaf(f32, f32, f32) -> f32        fma(f64, f64, f64) -> f64
//! fminf(f32, f32) -> f32            fmin(f64, f64) -> f64
//! fmaxf(f32, f32) -> f32            fmax(f64, f64) -> f64
//! KGEN_CompilerRT_GetStackTrace(buf: i64, max: i64) -> i64
//! free(ptr: i64)
//! dup(fd: i32) -> i32
//! fdopen(fd: i32, mode: i64) -> i64
//! fflush(stream: i64) -> i32
//! fclose(stream: i64) -> i32
//! KGEN_CompilerRT_fprintf(stream: i64, fmt: i64, args: i64) -> i32
//! write(fd: i64, ptr: i64, len: i64) -> i32
//! ```

use crate::alloc::BumpAllocator;
use crate::error::{HarnessError, Result};
use crate::memory::{LinearMemory, guest_offset};
use std::io::Write as _;
use wasmtime::{Caller, Engine, Extern, Linker, Module, StoreLimits, ValType};

/// Module name every import is registered under.
pub const IMPORT_MODULE: &str = "env";

/// Numeric value kinds used in import signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValKind {
    /// 32-bit integer.
    I32,
    /// 64-bit integer.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl ValKind {
    /// Map a wasmtime value type onto a numeric kind.
    pub fn from_val_type(ty: &ValType) -> Option<Self> {
        match ty {
            ValType::I32 => Some(Self::I32),
            ValType::I64 => Some(Self::I64),
            ValType::F32 => Some(Self::F32),
            ValType::F64 => Some(Self::F64),
            _ => None,
        }
    }
}

impl std::fmt::Display for ValKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        })
    }
}

/// Name and signature of one host import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSpec {
    /// Import name within [`IMPORT_MODULE`].
    pub name: &'static str,
    /// Parameter kinds.
    pub params: &'static [ValKind],
    /// Result kinds (empty or one).
    pub results: &'static [ValKind],
}

impl ImportSpec {
    const fn new(
        name: &'static str,
        params: &'static [ValKind],
        results: &'static [ValKind],
    ) -> Self {
        Self {
            name,
            params,
            results,
        }
    }

    /// Render the signature as `(i64, i64) -> i64`.
    pub fn signature(&self) -> String {
        render_signature(self.params, self.results)
    }
}

use ValKind::{F32, F64, I32, I64};

/// Every import the harness provides, in the order the compiler emits them.
pub const IMPORT_CATALOG: &[ImportSpec] = &[
    ImportSpec::new("KGEN_CompilerRT_AlignedAlloc", &[I64, I64], &[I64]),
    ImportSpec::new("KGEN_CompilerRT_AlignedFree", &[I64], &[]),
    ImportSpec::new("fmaf", &[F32, F32, F32], &[F32]),
    ImportSpec::new("fminf", &[F32, F32], &[F32]),
    ImportSpec::new("fmaxf", &[F32, F32], &[F32]),
    ImportSpec::new("fma", &[F64, F64, F64], &[F64]),
    ImportSpec::new("fmin", &[F64, F64], &[F64]),
    ImportSpec::new("fmax", &[F64, F64], &[F64]),
    ImportSpec::new("KGEN_CompilerRT_GetStackTrace", &[I64, I64], &[I64]),
    ImportSpec::new("free", &[I64], &[]),
    ImportSpec::new("dup", &[I32], &[I32]),
    ImportSpec::new("fdopen", &[I32, I64], &[I64]),
    ImportSpec::new("fflush", &[I64], &[I32]),
    ImportSpec::new("fclose", &[I64], &[I32]),
    ImportSpec::new("KGEN_CompilerRT_fprintf", &[I64, I64, I64], &[I32]),
    ImportSpec::new("write", &[I64, I64, I64], &[I32]),
];

/// Look up a catalog entry by import name.
pub fn catalog_entry(name: &str) -> Option<&'static ImportSpec> {
    IMPORT_CATALOG.iter().find(|spec| spec.name == name)
}

/// How a module's declared import relates to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportStatus {
    /// Provided with a matching signature.
    Provided,
    /// Not in the catalog, or declared under another module name.
    Missing,
    /// Provided, but the module declares a different signature.
    SignatureMismatch {
        /// Signature the host provides.
        expected: String,
        /// Signature the module declares.
        declared: String,
    },
    /// Declared as something other than a function (memory, table, global).
    NotAFunction,
}

/// One import declared by a module, checked against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCheck {
    /// Import module name.
    pub module: String,
    /// Import field name.
    pub name: String,
    /// Result of the check.
    pub status: ImportStatus,
}

/// Compare every import `module` declares against [`IMPORT_CATALOG`].
pub fn check_module_imports(module: &Module) -> Vec<ImportCheck> {
    module
        .imports()
        .map(|import| {
            let status = match import.ty() {
                wasmtime::ExternType::Func(func_ty) => {
                    match catalog_entry(import.name()).filter(|_| import.module() == IMPORT_MODULE)
                    {
                        None => ImportStatus::Missing,
                        Some(spec) => {
                            let params: Vec<_> =
                                func_ty.params().map(|t| ValKind::from_val_type(&t)).collect();
                            let results: Vec<_> =
                                func_ty.results().map(|t| ValKind::from_val_type(&t)).collect();
                            let matches = params.len() == spec.params.len()
                                && results.len() == spec.results.len()
                                && params.iter().zip(spec.params).all(|(d, e)| *d == Some(*e))
                                && results.iter().zip(spec.results).all(|(d, e)| *d == Some(*e));
                            if matches {
                                ImportStatus::Provided
                            } else {
                                ImportStatus::SignatureMismatch {
                                    expected: spec.signature(),
                                    declared: render_declared(&params, &results),
                                }
                            }
                        }
                    }
                }
                _ => ImportStatus::NotAFunction,
            };
            ImportCheck {
                module: import.module().to_string(),
                name: import.name().to_string(),
                status,
            }
        })
        .collect()
}

fn render_signature(params: &[ValKind], results: &[ValKind]) -> String {
    let join = |kinds: &[ValKind]| {
        kinds
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    if results.is_empty() {
        format!("({})", join(params))
    } else {
        format!("({}) -> {}", join(params), join(results))
    }
}

fn render_declared(params: &[Option<ValKind>], results: &[Option<ValKind>]) -> String {
    let join = |kinds: &[Option<ValKind>]| {
        kinds
            .iter()
            .map(|k| k.map_or_else(|| "ref".to_string(), |k| k.to_string()))
            .collect::<Vec<_>>()
            .join(", ")
    };
    if results.is_empty() {
        format!("({})", join(params))
    } else {
        format!("({}) -> {}", join(params), join(results))
    }
}

/// State provided to host functions for the lifetime of a session.
///
/// Owned by the wasmtime `Store`, so every import sees the same allocator
/// cursor and captured output.
#[derive(Debug, Default)]
pub struct HostState {
    /// Allocator backing `KGEN_CompilerRT_AlignedAlloc`.
    pub allocator: BumpAllocator,
    /// Text written to fd 1, one entry per `write` call, in call order.
    pub stdout: Vec<String>,
    /// Resource limits applied to the store.
    pub limits: StoreLimits,
}

impl HostState {
    /// Create host state with the given store limits.
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            allocator: BumpAllocator::default(),
            stdout: Vec::new(),
            limits,
        }
    }

    /// Captured stdout, one entry per `write(1, ..)` call.
    pub fn captured_stdout(&self) -> &[String] {
        &self.stdout
    }
}

/// `fminf`/`fmin` as the guest runtime expects them.
///
/// Not IEEE `minNum`: returns the left operand only when it compares
/// strictly less. A NaN on the left yields the right operand; a NaN on the
/// right is returned as-is.
#[inline]
pub fn guest_min<T: PartialOrd>(left: T, right: T) -> T {
    if left < right { left } else { right }
}

/// `fmaxf`/`fmax`, mirroring [`guest_min`].
#[inline]
pub fn guest_max<T: PartialOrd>(left: T, right: T) -> T {
    if left > right { left } else { right }
}

/// `fmaf`: computed in double precision, then rounded to `f32`.
#[inline]
pub fn guest_fma32(x: f32, y: f32, z: f32) -> f32 {
    (f64::from(x) * f64::from(y) + f64::from(z)) as f32
}

/// `fma`: an unfused multiply-add.
#[inline]
pub fn guest_fma64(x: f64, y: f64, z: f64) -> f64 {
    x * y + z
}

/// Register all host functions with a Wasmtime Linker.
pub fn register_host_functions(linker: &mut Linker<HostState>) -> Result<()> {
    // Compiler runtime allocation hooks
    register_allocator_functions(linker)?;

    // libm intrinsics
    register_math_functions(linker)?;

    // libc stubs
    register_libc_stubs(linker)?;

    // Output
    register_output_functions(linker)?;

    Ok(())
}

fn host_function_error(function: &str) -> impl FnOnce(wasmtime::Error) -> HarnessError + '_ {
    move |e| HarnessError::HostFunction {
        function: function.to_string(),
        cause: e.to_string(),
    }
}

/// Register allocation functions.
fn register_allocator_functions(linker: &mut Linker<HostState>) -> Result<()> {
    // KGEN_CompilerRT_AlignedAlloc(align: i64, size: i64) -> i64
    // Traps on a non-power-of-two alignment or cursor overflow.
    linker
        .func_wrap(
            IMPORT_MODULE,
            "KGEN_CompilerRT_AlignedAlloc",
            |mut caller: Caller<'_, HostState>, align: i64, size: i64| -> wasmtime::Result<i64> {
                let ptr = caller
                    .data_mut()
                    .allocator
                    .aligned_alloc_signed(align, size)?;
                Ok(ptr as i64)
            },
        )
        .map_err(host_function_error("KGEN_CompilerRT_AlignedAlloc"))?;

    // KGEN_CompilerRT_AlignedFree(ptr: i64)
    linker
        .func_wrap(
            IMPORT_MODULE,
            "KGEN_CompilerRT_AlignedFree",
            |mut caller: Caller<'_, HostState>, ptr: i64| {
                caller.data_mut().allocator.aligned_free(ptr as u64);
            },
        )
        .map_err(host_function_error("KGEN_CompilerRT_AlignedFree"))?;

    // free(ptr: i64)
    linker
        .func_wrap(IMPORT_MODULE, "free", |_ptr: i64| {})
        .map_err(host_function_error("free"))?;

    Ok(())
}

/// Register libm intrinsics.
fn register_math_functions(linker: &mut Linker<HostState>) -> Result<()> {
    linker
        .func_wrap(IMPORT_MODULE, "fmaf", guest_fma32)
        .map_err(host_function_error("fmaf"))?;
    linker
        .func_wrap(IMPORT_MODULE, "fma", guest_fma64)
        .map_err(host_function_error("fma"))?;
    linker
        .func_wrap(IMPORT_MODULE, "fminf", guest_min::<f32>)
        .map_err(host_function_error("fminf"))?;
    linker
        .func_wrap(IMPORT_MODULE, "fmin", guest_min::<f64>)
        .map_err(host_function_error("fmin"))?;
    linker
        .func_wrap(IMPORT_MODULE, "fmaxf", guest_max::<f32>)
        .map_err(host_function_error("fmaxf"))?;
    linker
        .func_wrap(IMPORT_MODULE, "fmax", guest_max::<f64>)
        .map_err(host_function_error("fmax"))?;

    Ok(())
}

/// Register libc-style stubs. None of them touch memory.
fn register_libc_stubs(linker: &mut Linker<HostState>) -> Result<()> {
    // KGEN_CompilerRT_GetStackTrace(buf: i64, max_frames: i64) -> i64
    linker
        .func_wrap(
            IMPORT_MODULE,
            "KGEN_CompilerRT_GetStackTrace",
            |_buf: i64, _max_frames: i64| -> i64 { 0 },
        )
        .map_err(host_function_error("KGEN_CompilerRT_GetStackTrace"))?;

    // dup(fd: i32) -> i32
    linker
        .func_wrap(IMPORT_MODULE, "dup", |_fd: i32| -> i32 { 1 })
        .map_err(host_function_error("dup"))?;

    // fdopen(fd: i32, mode: i64) -> i64
    linker
        .func_wrap(IMPORT_MODULE, "fdopen", |_fd: i32, _mode: i64| -> i64 { 1 })
        .map_err(host_function_error("fdopen"))?;

    // fflush(stream: i64) -> i32
    linker
        .func_wrap(IMPORT_MODULE, "fflush", |_stream: i64| -> i32 { 1 })
        .map_err(host_function_error("fflush"))?;

    // fclose(stream: i64) -> i32
    linker
        .func_wrap(IMPORT_MODULE, "fclose", |_stream: i64| -> i32 { 1 })
        .map_err(host_function_error("fclose"))?;

    // KGEN_CompilerRT_fprintf(stream: i64, fmt: i64, args: i64) -> i32
    // No formatting is performed.
    linker
        .func_wrap(
            IMPORT_MODULE,
            "KGEN_CompilerRT_fprintf",
            |_stream: i64, _fmt: i64, _args: i64| -> i32 { 0 },
        )
        .map_err(host_function_error("KGEN_CompilerRT_fprintf"))?;

    Ok(())
}

/// Register output functions.
fn register_output_functions(linker: &mut Linker<HostState>) -> Result<()> {
    // write(fd: i64, ptr: i64, len: i64) -> i32
    // Returns len on success, -1 on an unsupported fd or bad pointer.
    linker
        .func_wrap(
            IMPORT_MODULE,
            "write",
            |mut caller: Caller<'_, HostState>, fd: i64, ptr: i64, len: i64| -> i32 {
                if len == 0 {
                    return 0;
                }
                match write_fd(&mut caller, fd, ptr, len) {
                    Ok(written) => written,
                    Err(err) => {
                        tracing::warn!(fd, ptr, len, error = %err, "guest write failed");
                        -1
                    }
                }
            },
        )
        .map_err(host_function_error("write"))?;

    Ok(())
}

/// Body of the `write` import. Any error here becomes the -1 sentinel.
fn write_fd(caller: &mut Caller<'_, HostState>, fd: i64, ptr: i64, len: i64) -> Result<i32> {
    let memory = match caller.get_export("memory") {
        Some(Extern::Memory(m)) => LinearMemory::new(m),
        Some(other) => {
            return Err(HarnessError::TypeMismatch {
                name: "memory".to_string(),
                expected: "memory",
                actual: crate::session::extern_kind(&other).to_string(),
            });
        }
        None => return Err(HarnessError::export_not_found("memory")),
    };

    let size = memory.size(&*caller);
    let too_long = || HarnessError::Bounds {
        offset: i128::from(ptr),
        len: i128::from(len),
        size,
    };
    // The return value must carry the full length, so reject it up front.
    let written = i32::try_from(len).map_err(|_| too_long())?;
    let length = u64::try_from(len).map_err(|_| too_long())?;
    let offset = guest_offset(ptr, length, size)?;
    let bytes = memory.read(&*caller, offset, length)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();

    match fd {
        1 => {
            caller.data_mut().stdout.push(text);
            Ok(written)
        }
        2 => {
            let mut stderr = std::io::stderr().lock();
            // Ignore host stderr failures; the guest only sees the length.
            let _ = stderr.write_all(text.as_bytes());
            Ok(written)
        }
        _ => {
            tracing::debug!(fd, "write to unsupported fd");
            Ok(-1)
        }
    }
}

/// Create a linker with all host functions registered.
pub fn create_linker(engine: &Engine) -> Result<Linker<HostState>> {
    let mut linker = Linker::new(engine);
    register_host_functions(&mut linker)?;
    Ok(linker)
}
