//! Symbolic scalar expressions and compiled functions
//!
//! This is the smallest expression layer the mapping code needs: enough to
//! describe model equations, trace them over a whole horizon, and evaluate
//! the result either numerically or by substitution.

pub mod expr;
pub mod function;

pub use expr::{BinaryOp, Expr, Symbol, UnaryOp};
pub use function::{Evaluable, Function};

use thiserror::Error;

/// Errors raised while building or applying a [`Function`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SymbolicError {
    #[error("function '{function}' expects {expected} inputs, got {got}")]
    ArityMismatch {
        function: String,
        expected: usize,
        got: usize,
    },
    #[error("function '{function}' input {input} expects {expected} entries, got {got}")]
    InputSizeMismatch {
        function: String,
        input: usize,
        expected: usize,
        got: usize,
    },
    #[error("function '{function}' input {input} entry {index} is not a bare symbol")]
    NotASymbol {
        function: String,
        input: usize,
        index: usize,
    },
    #[error("function '{function}' lists symbol '{symbol}' as an input more than once")]
    DuplicateSymbol { function: String, symbol: String },
    #[error("function '{function}' depends on free symbol '{symbol}'")]
    FreeSymbol { function: String, symbol: String },
}
