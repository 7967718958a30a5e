//! Session construction, export dispatch, and error surfaces.

mod common;

use common::{HEAP_BASE, as_i32, as_i64, guest_module, guest_session, session_for, test_runtime};
use std::io::Write;
use wasmojo_core::imports::{ImportStatus, check_module_imports};
use wasmojo_core::{HarnessError, RuntimeConfig, Session, WasmRuntime};
use wasmtime::{Trap, Val};

#[test]
fn test_session_seeds_allocator_from_heap_base() {
    let mut session = guest_session();
    assert_eq!(session.heap_base(), HEAP_BASE);
    assert_eq!(session.host().allocator.cursor(), HEAP_BASE);
    assert_eq!(session.memory().size(session.store()), 2 * 65_536);

    // Two struct allocations land back to back.
    assert_eq!(session.aligned_alloc(8, 24).expect("Failed to allocate"), HEAP_BASE);
    assert_eq!(
        session.aligned_alloc(8, 24).expect("Failed to allocate"),
        HEAP_BASE + 24
    );
}

#[test]
fn test_sessions_are_isolated() {
    let runtime = test_runtime();
    let module = runtime
        .compile("guest", &guest_module())
        .expect("Failed to compile guest");

    let mut a = Session::new(&runtime, &module).expect("Failed to instantiate");
    let b = Session::new(&runtime, &module).expect("Failed to instantiate");

    a.aligned_alloc(8, 64).expect("Failed to allocate");
    a.call("print_static_string", &[]).expect("Failed to call");

    assert_eq!(b.host().allocator.cursor(), HEAP_BASE);
    assert!(b.captured_stdout().is_empty());
}

#[test]
fn test_guest_imports_all_provided() {
    let runtime = test_runtime();
    let module = runtime
        .compile("guest", &guest_module())
        .expect("Failed to compile guest");

    let checks = check_module_imports(module.module());
    assert_eq!(checks.len(), 16);
    assert!(checks.iter().all(|c| c.status == ImportStatus::Provided));
}

#[test]
fn test_missing_export_vs_wrong_kind() {
    let mut session = guest_session();

    let err = session.call("does_not_exist", &[]).unwrap_err();
    assert!(matches!(err, HarnessError::NotFound { kind: "export", .. }));
    assert_eq!(err.code(), "E201");

    let err = session.call("counter", &[]).unwrap_err();
    assert!(matches!(
        &err,
        HarnessError::TypeMismatch { expected: "function", actual, .. } if actual == "global"
    ));
    assert_eq!(err.code(), "E202");
}

#[test]
fn test_argument_mismatch_is_engine_error() {
    let mut session = guest_session();

    let err = session.call("add_int32", &[Val::I32(1)]).unwrap_err();
    assert_eq!(err.code(), "E501");

    let err = session
        .call("add_int32", &[Val::I64(1), Val::I64(2)])
        .unwrap_err();
    assert_eq!(err.code(), "E501");
    assert!(err.trap().is_none());
}

#[test]
fn test_trap_is_reported() {
    let mut session = guest_session();
    let err = session.call("trap", &[]).unwrap_err();
    assert_eq!(err.trap(), Some(Trap::UnreachableCodeReached));

    // The session stays usable after a trap.
    let sum = session
        .call("add_int32", &[Val::I32(1), Val::I32(2)])
        .expect("Failed to call after trap");
    assert_eq!(as_i32(sum), 3);
}

#[test]
fn test_void_export_returns_none() {
    let mut session = guest_session();
    let out = session
        .call("print_static_string", &[])
        .expect("Failed to call");
    assert!(out.is_none());
}

#[test]
fn test_call_typed() {
    let mut session = guest_session();
    let sum: i64 = session
        .call_typed::<(i64, i64), i64>("add_int64", (5, 7))
        .expect("Failed to call typed");
    assert_eq!(sum, 12);

    let err = session
        .call_typed::<(i32, i32), i32>("add_int64", (5, 7))
        .unwrap_err();
    assert_eq!(err.code(), "E501");
}

#[test]
fn test_func_type_and_exports() {
    let mut session = guest_session();
    let ty = session.func_type("fma_float64").expect("Failed to get type");
    assert_eq!(ty.params().len(), 3);
    assert_eq!(ty.results().len(), 1);

    let names: Vec<String> = session.exports().into_iter().map(|(n, _)| n).collect();
    assert!(names.iter().any(|n| n == "memory"));
    assert!(names.iter().any(|n| n == "__heap_base"));
    assert!(names.iter().any(|n| n == "return_input_string"));
}

#[test]
fn test_missing_import_fails_by_name() {
    let wat = r#"
        (module
          (import "env" "malloc" (func (param i64) (result i64)))
          (memory (export "memory") i64 1)
          (global (export "__heap_base") i64 (i64.const 1024)))
    "#;
    let err = match session_for(wat) {
        Ok(_) => panic!("expected instantiation to fail"),
        Err(err) => err,
    };
    assert!(matches!(
        &err,
        HarnessError::NotFound { kind: "import", name } if name == "env::malloc"
    ));
}

#[test]
fn test_missing_memory_export() {
    let wat = r#"
        (module
          (memory i64 1)
          (global (export "__heap_base") i64 (i64.const 1024)))
    "#;
    let err = match session_for(wat) {
        Ok(_) => panic!("expected instantiation to fail"),
        Err(err) => err,
    };
    assert!(matches!(&err, HarnessError::NotFound { name, .. } if name == "memory"));
}

#[test]
fn test_missing_heap_base() {
    let wat = r#"(module (memory (export "memory") i64 1))"#;
    let err = match session_for(wat) {
        Ok(_) => panic!("expected instantiation to fail"),
        Err(err) => err,
    };
    assert!(matches!(&err, HarnessError::NotFound { name, .. } if name == "__heap_base"));
}

#[test]
fn test_heap_base_as_i32_global() {
    let wat = r#"
        (module
          (memory (export "memory") i64 1)
          (global (export "__heap_base") i32 (i32.const 2048)))
    "#;
    let session = session_for(wat).expect("Failed to instantiate");
    assert_eq!(session.heap_base(), 2048);
}

#[test]
fn test_negative_heap_base_is_type_mismatch() {
    let wat = r#"
        (module
          (memory (export "memory") i64 1)
          (global (export "__heap_base") i64 (i64.const -16)))
    "#;
    let err = match session_for(wat) {
        Ok(_) => panic!("expected instantiation to fail"),
        Err(err) => err,
    };
    assert_eq!(err.code(), "E202");
}

#[test]
fn test_out_of_bounds_read() {
    let session = guest_session();
    let size = session.memory().size(session.store());

    assert!(session.read_bytes(size - 4, 4).is_ok());
    assert!(session.read_bytes(size - 4, 5).unwrap_err().is_bounds());
    assert!(session.read_bytes(u64::MAX, 2).unwrap_err().is_bounds());
}

#[test]
fn test_memory_growth_respects_limit() {
    let runtime = WasmRuntime::new(
        RuntimeConfig::default()
            .with_cache(false)
            .with_max_memory_bytes(3 * 65_536),
    )
    .expect("Failed to create runtime");
    let module = runtime
        .compile("guest", &guest_module())
        .expect("Failed to compile guest");
    let mut session = Session::new(&runtime, &module).expect("Failed to instantiate");

    let old = session
        .call("grow_memory", &[Val::I64(1)])
        .expect("Failed to grow");
    assert_eq!(as_i64(old), 2);
    assert_eq!(session.memory().size(session.store()), 3 * 65_536);

    let denied = session
        .call("grow_memory", &[Val::I64(1)])
        .expect("Failed to call grow_memory");
    assert_eq!(as_i64(denied), -1);
}

#[test]
fn test_fuel_is_consumed() {
    let runtime = WasmRuntime::new(
        RuntimeConfig::default()
            .with_cache(false)
            .with_fuel(true, 100_000),
    )
    .expect("Failed to create runtime");
    let module = runtime
        .compile("guest", &guest_module())
        .expect("Failed to compile guest");
    let mut session = Session::new(&runtime, &module).expect("Failed to instantiate");

    let before = session.fuel().expect("fuel enabled");
    session
        .call("add_int32", &[Val::I32(1), Val::I32(1)])
        .expect("Failed to call");
    assert!(session.fuel().expect("fuel enabled") < before);
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".wasm")
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(&guest_module())
        .expect("Failed to write module");

    let runtime = test_runtime();
    let mut session = Session::load(&runtime, file.path()).expect("Failed to load");
    let sum = session
        .call("add_int32", &[Val::I32(2), Val::I32(2)])
        .expect("Failed to call");
    assert_eq!(as_i32(sum), 4);
}

#[test]
fn test_load_missing_file_is_io_error() {
    let runtime = test_runtime();
    let err = match Session::load(&runtime, std::path::Path::new("/nonexistent/out.wasm")) {
        Ok(_) => panic!("expected load to fail"),
        Err(err) => err,
    };
    assert_eq!(err.code(), "E402");
}

#[test]
fn test_module_cache_reuses_compilation() {
    let runtime = WasmRuntime::with_defaults().expect("Failed to create runtime");
    let bytes = guest_module();

    let a = runtime.compile("guest", &bytes).expect("Failed to compile");
    let b = runtime.compile("guest", &bytes).expect("Failed to compile");
    assert_eq!(a.hash(), b.hash());
    assert_eq!(runtime.cache_size(), 1);

    runtime.clear_cache();
    assert_eq!(runtime.cache_size(), 0);
}

#[test]
fn test_invalid_module_is_load_error() {
    let runtime = test_runtime();
    let err = runtime
        .compile("junk", b"\0asm\x01\0\0\0junk")
        .err()
        .expect("junk should not compile");
    assert_eq!(err.code(), "E401");
}
