//! A live guest instance with call-by-name dispatch.
//!
//! A [`Session`] owns the store, the instance, and the host state the
//! imports mutate (allocator cursor, captured stdout). It is built in a
//! fixed order: link imports, instantiate, resolve `memory`, then seed the
//! allocator from `__heap_base`. Only after that may strings be marshalled
//! or exports called.

use crate::error::{HarnessError, Result};
use crate::imports::{HostState, create_linker};
use crate::memory::LinearMemory;
use crate::runtime::{CompiledModule, WasmRuntime};
use crate::strings;
use std::path::Path;
use wasmtime::{Extern, ExternType, Func, FuncType, Instance, Store, Val, WasmParams, WasmResults};

/// Name of the exported linear memory.
pub const MEMORY_EXPORT: &str = "memory";

/// Name of the exported global holding the first free heap address.
pub const HEAP_BASE_EXPORT: &str = "__heap_base";

/// A guest instance plus the host state its imports operate on.
pub struct Session {
    store: Store<HostState>,
    instance: Instance,
    memory: LinearMemory,
    heap_base: u64,
}

impl Session {
    /// Instantiate `module` and prepare it for calls.
    pub fn new(runtime: &WasmRuntime, module: &CompiledModule) -> Result<Self> {
        let engine = runtime.engine();
        let mut store = Store::new(engine, HostState::new(runtime.config().store_limits()));
        store.limiter(|state| &mut state.limits);
        if let Some(fuel) = runtime.initial_fuel() {
            store.set_fuel(fuel)?;
        }

        let linker = create_linker(engine)?;

        // Report a missing import by name rather than as a generic link error.
        for import in module.module().imports() {
            if linker.get_by_import(&mut store, &import).is_none() {
                return Err(HarnessError::NotFound {
                    kind: "import",
                    name: format!("{}::{}", import.module(), import.name()),
                });
            }
        }

        let instance = linker.instantiate(&mut store, module.module())?;

        let memory = match instance.get_export(&mut store, MEMORY_EXPORT) {
            Some(Extern::Memory(m)) => LinearMemory::new(m),
            Some(other) => {
                return Err(HarnessError::TypeMismatch {
                    name: MEMORY_EXPORT.to_string(),
                    expected: "memory",
                    actual: extern_kind(&other).to_string(),
                });
            }
            None => return Err(HarnessError::export_not_found(MEMORY_EXPORT)),
        };

        let heap_base = read_heap_base(&mut store, &instance)?;
        store.data_mut().allocator.seed(heap_base);

        tracing::debug!(
            module = module.name(),
            heap_base,
            memory_bytes = memory.size(&store),
            "session ready"
        );

        Ok(Self {
            store,
            instance,
            memory,
            heap_base,
        })
    }

    /// Compile (or fetch from cache) the module at `path` and instantiate it.
    pub fn load(runtime: &WasmRuntime, path: &Path) -> Result<Self> {
        let module = runtime.compile_file(path)?;
        Self::new(runtime, &module)
    }

    /// The `__heap_base` value the allocator was seeded with.
    pub fn heap_base(&self) -> u64 {
        self.heap_base
    }

    /// The guest's linear memory.
    pub fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    /// The wasmtime store backing this session.
    pub fn store(&self) -> &Store<HostState> {
        &self.store
    }

    /// Mutable access to the wasmtime store.
    pub fn store_mut(&mut self) -> &mut Store<HostState> {
        &mut self.store
    }

    /// Host state shared with the imports.
    pub fn host(&self) -> &HostState {
        self.store.data()
    }

    /// Text the guest wrote to stdout, one entry per `write` call.
    pub fn captured_stdout(&self) -> &[String] {
        self.store.data().captured_stdout()
    }

    /// Remaining fuel, when fuel metering is enabled.
    pub fn fuel(&self) -> Option<u64> {
        self.store.get_fuel().ok()
    }

    // -- raw memory ------------------------------------------------------

    /// Read `len` bytes at `offset`.
    pub fn read_bytes(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        self.memory.read(&self.store, offset, len)
    }

    /// Write `bytes` at `offset`.
    pub fn write_bytes(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.memory.write(&mut self.store, offset, bytes)
    }

    /// Read a little-endian `i64`.
    pub fn read_i64_le(&self, offset: u64) -> Result<i64> {
        self.memory.read_i64_le(&self.store, offset)
    }

    /// Read a little-endian `u64`.
    pub fn read_u64_le(&self, offset: u64) -> Result<u64> {
        self.memory.read_u64_le(&self.store, offset)
    }

    /// Write a little-endian `i64`.
    pub fn write_i64_le(&mut self, offset: u64, value: i64) -> Result<()> {
        self.memory.write_i64_le(&mut self.store, offset, value)
    }

    /// Allocate from the session's bump allocator.
    pub fn aligned_alloc(&mut self, align: u64, size: u64) -> Result<u64> {
        self.store.data_mut().allocator.aligned_alloc(align, size)
    }

    // -- strings ---------------------------------------------------------

    /// Encode `s` as a heap-form string struct and return its address.
    pub fn write_string_struct(&mut self, s: &str) -> Result<u64> {
        strings::write_string_struct(&mut self.store, &self.memory, s)
    }

    /// Allocate a zeroed string struct for use as an out-param.
    pub fn alloc_string_struct(&mut self) -> Result<u64> {
        strings::alloc_string_struct(&mut self.store, &self.memory)
    }

    /// Decode the string struct at `struct_ptr`.
    pub fn read_string_struct(&self, struct_ptr: u64) -> Result<String> {
        strings::read_string_struct(&self.store, &self.memory, struct_ptr)
    }

    // -- exports ---------------------------------------------------------

    /// Names and kinds of every export, in declaration order.
    pub fn exports(&self) -> Vec<(String, ExternType)> {
        self.instance
            .module(&self.store)
            .exports()
            .map(|export| (export.name().to_string(), export.ty()))
            .collect()
    }

    /// Resolve an exported function by name.
    pub fn func(&mut self, name: &str) -> Result<Func> {
        match self.instance.get_export(&mut self.store, name) {
            Some(Extern::Func(func)) => Ok(func),
            Some(other) => Err(HarnessError::TypeMismatch {
                name: name.to_string(),
                expected: "function",
                actual: extern_kind(&other).to_string(),
            }),
            None => Err(HarnessError::export_not_found(name)),
        }
    }

    /// Signature of an exported function.
    pub fn func_type(&mut self, name: &str) -> Result<FuncType> {
        let func = self.func(name)?;
        Ok(func.ty(&self.store))
    }

    /// Call an export by name with positional arguments.
    ///
    /// Returns the first result, or `None` for functions without results.
    /// Argument count/type mismatches and traps come back as
    /// [`HarnessError::Engine`] exactly as wasmtime reports them.
    pub fn call(&mut self, name: &str, args: &[Val]) -> Result<Option<Val>> {
        let func = self.func(name)?;
        let result_count = func.ty(&self.store).results().len();
        let mut results = vec![Val::I32(0); result_count];

        tracing::trace!(export = name, args = args.len(), "call");
        func.call(&mut self.store, args, &mut results)?;

        Ok(results.into_iter().next())
    }

    /// Call an export through a statically typed signature.
    pub fn call_typed<P, R>(&mut self, name: &str, params: P) -> Result<R>
    where
        P: WasmParams,
        R: WasmResults,
    {
        let func = self.func(name)?;
        let typed = func.typed::<P, R>(&self.store)?;
        tracing::trace!(export = name, "typed call");
        Ok(typed.call(&mut self.store, params)?)
    }
}

/// Read `__heap_base`, accepting either a wasm32 or wasm64 global.
fn read_heap_base(store: &mut Store<HostState>, instance: &Instance) -> Result<u64> {
    let global = match instance.get_export(&mut *store, HEAP_BASE_EXPORT) {
        Some(Extern::Global(g)) => g,
        Some(other) => {
            return Err(HarnessError::TypeMismatch {
                name: HEAP_BASE_EXPORT.to_string(),
                expected: "global",
                actual: extern_kind(&other).to_string(),
            });
        }
        None => return Err(HarnessError::export_not_found(HEAP_BASE_EXPORT)),
    };

    let mismatch = |actual: String| HarnessError::TypeMismatch {
        name: HEAP_BASE_EXPORT.to_string(),
        expected: "non-negative i32 or i64 global",
        actual,
    };
    match global.get(&mut *store) {
        Val::I32(v) => Ok(u64::from(v as u32)),
        Val::I64(v) => u64::try_from(v).map_err(|_| mismatch(format!("i64 {v}"))),
        other => Err(mismatch(format!("{other:?}"))),
    }
}

/// Short name of an export's kind, for diagnostics.
pub(crate) fn extern_kind(ext: &Extern) -> &'static str {
    match ext {
        Extern::Func(_) => "function",
        Extern::Global(_) => "global",
        Extern::Memory(_) => "memory",
        Extern::SharedMemory(_) => "shared memory",
        Extern::Table(_) => "table",
    }
}

/// Short name of an export type's kind, for listings.
pub fn extern_type_kind(ty: &ExternType) -> &'static str {
    match ty {
        ExternType::Func(_) => "function",
        ExternType::Global(_) => "global",
        ExternType::Memory(_) => "memory",
        ExternType::Table(_) => "table",
    }
}
