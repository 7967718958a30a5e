//! Conversions between textual arguments and wasm values.
//!
//! Used by tooling that drives exports from the command line: each raw
//! argument is parsed against the parameter type the export declares.

use crate::imports::ValKind;
use thiserror::Error;
use wasmtime::{FuncType, Val};

/// Failure to turn text into a wasm value.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValueError {
    /// The export takes a reference or vector type.
    #[error("parameter {index} has unsupported type {ty}")]
    UnsupportedType {
        /// Zero-based parameter index.
        index: usize,
        /// The declared type.
        ty: String,
    },
    /// The text is not a valid literal of the parameter's type.
    #[error("parameter {index}: '{raw}' is not a valid {kind}")]
    Parse {
        /// Zero-based parameter index.
        index: usize,
        /// The rejected text.
        raw: String,
        /// The expected kind.
        kind: ValKind,
    },
    /// Wrong number of arguments.
    #[error("expected {expected} arguments, got {actual}")]
    Arity {
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },
}

/// Parse one literal as a value of `kind`.
///
/// Floats accept `nan`, `inf` and `-inf` in addition to decimal literals.
pub fn parse_val(kind: ValKind, raw: &str, index: usize) -> Result<Val, ValueError> {
    let err = || ValueError::Parse {
        index,
        raw: raw.to_string(),
        kind,
    };
    Ok(match kind {
        ValKind::I32 => Val::I32(raw.parse().map_err(|_| err())?),
        ValKind::I64 => Val::I64(raw.parse().map_err(|_| err())?),
        ValKind::F32 => Val::F32(raw.parse::<f32>().map_err(|_| err())?.to_bits()),
        ValKind::F64 => Val::F64(raw.parse::<f64>().map_err(|_| err())?.to_bits()),
    })
}

/// Parse `args` against the parameter list of `ty`.
pub fn parse_args(ty: &FuncType, args: &[String]) -> Result<Vec<Val>, ValueError> {
    let params: Vec<_> = ty.params().collect();
    if params.len() != args.len() {
        return Err(ValueError::Arity {
            expected: params.len(),
            actual: args.len(),
        });
    }
    params
        .iter()
        .zip(args)
        .enumerate()
        .map(|(index, (param, raw))| {
            let kind = ValKind::from_val_type(param).ok_or_else(|| ValueError::UnsupportedType {
                index,
                ty: param.to_string(),
            })?;
            parse_val(kind, raw, index)
        })
        .collect()
}

/// Render a numeric value the way it would be written as an argument.
pub fn format_val(val: &Val) -> String {
    match val {
        Val::I32(v) => v.to_string(),
        Val::I64(v) => v.to_string(),
        Val::F32(bits) => f32::from_bits(*bits).to_string(),
        Val::F64(bits) => f64::from_bits(*bits).to_string(),
        other => format!("{other:?}"),
    }
}
