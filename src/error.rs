//! Error types shared across the pipeline.
//!
//! Each stage keeps its own error type (see `front::lex::LexError` and
//! `front::parse::ParseError`); this module defines the error raised by the
//! core (`RuntimeError`, shared between the VM and the tree evaluator) and
//! the top-level `InterpError` that the CLI matches on.

use derive_more::Display;

use crate::front::{LexError, ParseError};

/// The seven runtime error kinds of the core. `TypeMismatch` covers both
/// binary operators (`rhs: Some(..)`) and unary ones (`rhs: None`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuntimeError {
    TypeMismatch {
        op: String,
        lhs: &'static str,
        rhs: Option<&'static str>,
    },
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    UnboundName { name: String },
    IndexOutOfBounds { index: i32, len: usize },
    DivideByZero,
    BadBranchCondition { got: &'static str },
    UnknownBuiltin { id: i64 },
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeError::TypeMismatch { op, lhs, rhs: Some(rhs) } => {
                write!(f, "type mismatch: '{op}' does not accept ({lhs}, {rhs})")
            }
            RuntimeError::TypeMismatch { op, lhs, rhs: None } => {
                write!(f, "type mismatch: unary '{op}' does not accept {lhs}")
            }
            RuntimeError::ArityMismatch { name, expected, got } => {
                write!(f, "'{name}' expects {expected} argument(s), got {got}")
            }
            RuntimeError::UnboundName { name } => write!(f, "unbound name '{name}'"),
            RuntimeError::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for length {len}")
            }
            RuntimeError::DivideByZero => write!(f, "division by zero"),
            RuntimeError::BadBranchCondition { got } => {
                write!(f, "branch condition must be bool, got {got}")
            }
            RuntimeError::UnknownBuiltin { id } => write!(f, "unknown builtin id {id}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Top-level error that unifies every stage so the CLI can match once.
#[derive(Debug, Display)]
pub enum InterpError {
    #[display("{_0}")]
    Lex(LexError),
    #[display("{_0}")]
    Parse(ParseError),
    #[display("{_0}")]
    Runtime(RuntimeError),
    #[display("{_0}")]
    Io(std::io::Error),
}

impl std::error::Error for InterpError {}

impl From<LexError> for InterpError {
    fn from(e: LexError) -> Self {
        InterpError::Lex(e)
    }
}

impl From<ParseError> for InterpError {
    fn from(e: ParseError) -> Self {
        InterpError::Parse(e)
    }
}

impl From<RuntimeError> for InterpError {
    fn from(e: RuntimeError) -> Self {
        InterpError::Runtime(e)
    }
}

impl From<std::io::Error> for InterpError {
    fn from(e: std::io::Error) -> Self {
        InterpError::Io(e)
    }
}
