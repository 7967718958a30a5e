//! Common test utilities for integration tests.
//!
//! The guest fixture is a hand-written memory64 module that imports the full
//! `env` surface a Mojo build links against and exports small functions
//! exercising each import, plus string helpers that normalize short strings
//! to the inline form the way the real guest runtime does.

#![allow(dead_code)]

use wasmojo_core::{RuntimeConfig, Session, WasmRuntime};
use wasmtime::Val;

/// `__heap_base` exported by the fixture.
pub const HEAP_BASE: u64 = 66_560;

/// Address of the static "Hello, World!\n" data segment.
pub const STATIC_TEXT_PTR: i64 = 1024;

/// The guest fixture.
pub const GUEST_WAT: &str = r#"
(module
  (import "env" "KGEN_CompilerRT_AlignedAlloc" (func $aligned_alloc (param i64 i64) (result i64)))
  (import "env" "KGEN_CompilerRT_AlignedFree" (func $aligned_free (param i64)))
  (import "env" "fmaf" (func $fmaf (param f32 f32 f32) (result f32)))
  (import "env" "fminf" (func $fminf (param f32 f32) (result f32)))
  (import "env" "fmaxf" (func $fmaxf (param f32 f32) (result f32)))
  (import "env" "fma" (func $fma (param f64 f64 f64) (result f64)))
  (import "env" "fmin" (func $fmin (param f64 f64) (result f64)))
  (import "env" "fmax" (func $fmax (param f64 f64) (result f64)))
  (import "env" "KGEN_CompilerRT_GetStackTrace" (func $get_stack_trace (param i64 i64) (result i64)))
  (import "env" "free" (func $free (param i64)))
  (import "env" "dup" (func $dup (param i32) (result i32)))
  (import "env" "fdopen" (func $fdopen (param i32 i64) (result i64)))
  (import "env" "fflush" (func $fflush (param i64) (result i32)))
  (import "env" "fclose" (func $fclose (param i64) (result i32)))
  (import "env" "KGEN_CompilerRT_fprintf" (func $fprintf (param i64 i64 i64) (result i32)))
  (import "env" "write" (func $write (param i64 i64 i64) (result i32)))

  (memory (export "memory") i64 2)
  (global (export "__heap_base") i64 (i64.const 66560))
  (global (export "counter") (mut i32) (i32.const 0))
  (data (i64.const 1024) "Hello, World!\0a")

  (func (export "add_int32") (param i32 i32) (result i32)
    (i32.add (local.get 0) (local.get 1)))
  (func (export "add_int64") (param i64 i64) (result i64)
    (i64.add (local.get 0) (local.get 1)))
  (func (export "add_float64") (param f64 f64) (result f64)
    (f64.add (local.get 0) (local.get 1)))

  (func (export "min_float32") (param f32 f32) (result f32)
    (call $fminf (local.get 0) (local.get 1)))
  (func (export "max_float32") (param f32 f32) (result f32)
    (call $fmaxf (local.get 0) (local.get 1)))
  (func (export "min_float64") (param f64 f64) (result f64)
    (call $fmin (local.get 0) (local.get 1)))
  (func (export "max_float64") (param f64 f64) (result f64)
    (call $fmax (local.get 0) (local.get 1)))
  (func (export "fma_float32") (param f32 f32 f32) (result f32)
    (call $fmaf (local.get 0) (local.get 1) (local.get 2)))
  (func (export "fma_float64") (param f64 f64 f64) (result f64)
    (call $fma (local.get 0) (local.get 1) (local.get 2)))

  (func (export "alloc") (param i64 i64) (result i64)
    (call $aligned_alloc (local.get 0) (local.get 1)))
  (func (export "write_fd") (param i64 i64 i64) (result i32)
    (call $write (local.get 0) (local.get 1) (local.get 2)))

  (func (export "call_stubs") (result i64)
    (call $aligned_free (i64.const 0))
    (call $free (i64.const 0))
    (i64.add
      (i64.add
        (i64.add
          (i64.extend_i32_s (call $dup (i32.const 1)))
          (call $fdopen (i32.const 1) (i64.const 0)))
        (i64.add
          (i64.extend_i32_s (call $fflush (i64.const 0)))
          (i64.extend_i32_s (call $fclose (i64.const 0)))))
      (i64.add
        (i64.extend_i32_s (call $fprintf (i64.const 0) (i64.const 0) (i64.const 0)))
        (call $get_stack_trace (i64.const 0) (i64.const 0)))))

  (func $is_inline (param $s i64) (result i32)
    (i64.ne
      (i64.and (i64.load offset=16 (local.get $s)) (i64.const 0x8000000000000000))
      (i64.const 0)))

  (func $str_len (param $s i64) (result i64)
    (if (result i64) (call $is_inline (local.get $s))
      (then
        (i64.and
          (i64.shr_u (i64.load offset=16 (local.get $s)) (i64.const 56))
          (i64.const 0x1f)))
      (else (i64.load offset=8 (local.get $s)))))

  (func $str_data (param $s i64) (result i64)
    (if (result i64) (call $is_inline (local.get $s))
      (then (local.get $s))
      (else (i64.load (local.get $s)))))

  (func (export "string_length") (param i64) (result i64)
    (call $str_len (local.get 0)))

  (func (export "string_is_inline") (param i64) (result i32)
    (call $is_inline (local.get 0)))

  ;; Copies a string into $out, storing it inline when it fits in 23 bytes.
  (func (export "return_input_string") (param $in i64) (param $out i64)
    (local $len i64) (local $data i64) (local $copy i64)
    (local.set $len (call $str_len (local.get $in)))
    (local.set $data (call $str_data (local.get $in)))
    (memory.fill (local.get $out) (i32.const 0) (i64.const 24))
    (if (i64.le_s (local.get $len) (i64.const 23))
      (then
        (memory.copy (local.get $out) (local.get $data) (local.get $len))
        (i32.store8 offset=23 (local.get $out)
          (i32.or (i32.const 0x80) (i32.wrap_i64 (local.get $len)))))
      (else
        (local.set $copy
          (call $aligned_alloc (i64.const 1) (i64.add (local.get $len) (i64.const 1))))
        (memory.copy (local.get $copy) (local.get $data) (local.get $len))
        (i64.store (local.get $out) (local.get $copy))
        (i64.store offset=8 (local.get $out) (local.get $len))
        (i64.store offset=16 (local.get $out) (i64.add (local.get $len) (i64.const 1))))))

  (func (export "print_input_string") (param i64)
    (drop (call $write
      (i64.const 1)
      (call $str_data (local.get 0))
      (call $str_len (local.get 0)))))

  (func (export "print_static_string")
    (drop (call $write (i64.const 1) (i64.const 1024) (i64.const 14))))

  (func (export "trap")
    unreachable)

  (func (export "grow_memory") (param i64) (result i64)
    (memory.grow (local.get 0)))
)
"#;

/// Compile the fixture to binary.
pub fn guest_module() -> Vec<u8> {
    wat::parse_str(GUEST_WAT).expect("Failed to parse WAT")
}

/// A runtime with caching disabled so every test compiles its own module.
pub fn test_runtime() -> WasmRuntime {
    WasmRuntime::new(RuntimeConfig::default().with_cache(false)).expect("Failed to create runtime")
}

/// A fresh session over the fixture.
pub fn guest_session() -> Session {
    let runtime = test_runtime();
    let module = runtime
        .compile("guest", &guest_module())
        .expect("Failed to compile guest");
    Session::new(&runtime, &module).expect("Failed to instantiate guest")
}

/// Session over an arbitrary WAT module.
pub fn session_for(wat: &str) -> wasmojo_core::Result<Session> {
    let runtime = test_runtime();
    let module = runtime.compile("adhoc", wat.as_bytes())?;
    Session::new(&runtime, &module)
}

/// Pointer argument as the guest ABI passes it.
pub fn ptr(addr: u64) -> Val {
    Val::I64(addr as i64)
}

/// Unwrap an `i64` result.
pub fn as_i64(val: Option<Val>) -> i64 {
    match val {
        Some(Val::I64(v)) => v,
        other => panic!("expected i64 result, got {other:?}"),
    }
}

/// Unwrap an `i32` result.
pub fn as_i32(val: Option<Val>) -> i32 {
    match val {
        Some(Val::I32(v)) => v,
        other => panic!("expected i32 result, got {other:?}"),
    }
}

/// Unwrap an `f64` result.
pub fn as_f64(val: Option<Val>) -> f64 {
    match val {
        Some(Val::F64(bits)) => f64::from_bits(bits),
        other => panic!("expected f64 result, got {other:?}"),
    }
}

/// Unwrap an `f32` result.
pub fn as_f32(val: Option<Val>) -> f32 {
    match val {
        Some(Val::F32(bits)) => f32::from_bits(bits),
        other => panic!("expected f32 result, got {other:?}"),
    }
}

/// `f64` argument.
pub fn f64_arg(v: f64) -> Val {
    Val::F64(v.to_bits())
}

/// `f32` argument.
pub fn f32_arg(v: f32) -> Val {
    Val::F32(v.to_bits())
}
