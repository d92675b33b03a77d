//! Error handling for the compiler back-end.
//!
//! Per the error-handling design: construction failures (bad arity, illegal
//! type combinations, non-first-class alloca types, mismatched cast widths,
//! ...) are recoverable and return `Err(CompileError)`. CFG/phi malformation,
//! interpreter traps and "too many spill iterations" are programmer-visible
//! bugs in an upstream pass and are asserted/panicked instead -- they never
//! flow through this type.

use thiserror::Error;

/// Errors produced while constructing or lowering IR/MIR.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("type error: {0}")]
    Type(String),

    #[error("bad operand arity: expected {expected}, got {got}")]
    Arity { expected: usize, got: usize },

    #[error("illegal cast: {0}")]
    Cast(String),

    #[error("alloca type must be first-class: {0}")]
    NonFirstClassAlloca(String),

    #[error("getelementptr: {0}")]
    Gep(String),

    #[error("register allocation failed: {0}")]
    RegAlloc(String),

    #[error("frame layout error: {0}")]
    Frame(String),
}

pub type CompileResult<T> = Result<T, CompileError>;
