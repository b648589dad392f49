//! Errors raised by the schema and the design-vector/output maps
//!
//! Every variant describes a defect in how the caller uses the mapping
//! layer. None of them is retried or replaced by a default value.

use std::fmt;

use thiserror::Error;

use crate::dae::{Namespace, UnavailableReason};
use crate::symbolic::SymbolicError;

/// Row/column extent of a vector or matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub rows: usize,
    pub cols: usize,
}

impl Shape {
    pub fn vector(len: usize) -> Self {
        Self { rows: len, cols: 1 }
    }

    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cols == 1 {
            write!(f, "{}", self.rows)
        } else {
            write!(f, "{}x{}", self.rows, self.cols)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    #[error("{what} has shape {got}, expected {expected}")]
    ShapeMismatch {
        what: String,
        expected: Shape,
        got: Shape,
    },
    #[error("unrecognized {namespace} name \"{name}\"")]
    UnknownName { name: String, namespace: Namespace },
    #[error("timestep {timestep} for \"{name}\" is out of range (must be < {limit})")]
    TimestepOutOfRange {
        name: String,
        timestep: usize,
        limit: usize,
    },
    #[error("\"{name}\" is defined at every node, please set a timestep")]
    TimestepRequired { name: String },
    #[error("\"{name}\" is a parameter, don't set a timestep (got {timestep})")]
    TimestepNotAllowed { name: String, timestep: usize },
    #[error("unsupported vector representation: {0}")]
    UnsupportedVectorType(String),
    #[error("output \"{name}\" depends on {reason} and cannot be evaluated at the shooting nodes")]
    UnavailableOutput {
        name: String,
        reason: UnavailableReason,
    },
    #[error("function '{function}' declares {declared} outputs but produces {actual}")]
    SchemaMismatch {
        function: String,
        declared: usize,
        actual: usize,
    },
    #[error("name \"{name}\" is already used as a {namespace} name")]
    DuplicateName { name: String, namespace: Namespace },
    #[error("differential state \"{state}\" has no right-hand side")]
    MissingOde { state: String },
    #[error(transparent)]
    Symbolic(#[from] SymbolicError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_display() {
        assert_eq!(Shape::vector(6).to_string(), "6");
        assert_eq!(Shape::matrix(3, 2).to_string(), "3x2");
    }

    #[test]
    fn test_messages_name_the_offender() {
        let err = MapError::UnknownName {
            name: "zeta".into(),
            namespace: Namespace::Design,
        };
        assert!(err.to_string().contains("\"zeta\""));

        let err = MapError::TimestepOutOfRange {
            name: "speed".into(),
            timestep: 3,
            limit: 3,
        };
        assert!(err.to_string().contains("must be < 3"));
    }
}
