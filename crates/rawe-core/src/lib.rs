//! # Rawe Core
//!
//! Collocation OCP indexing layer: the mapping between a continuous-time
//! model and the flat vectors a nonlinear programming solver works on.
//!
//! ## Modules
//!
//! - [`symbolic`]: scalar expressions and compiled multi-output functions
//! - [`dae`]: model builder and the state/control/parameter schema
//! - [`maps`]: design vector maps and per-node output maps
//! - [`error`]: the mapping error taxonomy

pub mod dae;
pub mod error;
pub mod maps;
pub mod symbolic;

pub use dae::{Dae, Namespace, Schema, UnavailableReason};
pub use error::{MapError, Shape};
pub use maps::{
    AnyOutputMap, ControlInput, ControlMatrix, DesignVector, DesignVectorMap, MissingEntries,
    OutputMap, OutputMapGenerator, WritableDesignMap,
};
pub use symbolic::{Evaluable, Expr, Function, Symbol, SymbolicError};
