//! Dynamic model definition
//!
//! - [`Schema`]: ordered state/control/parameter names with index tables
//! - [`Dae`]: symbolic model builder producing the schema, the ODE
//!   right-hand side and the output functions

pub mod model;
pub mod schema;

pub use model::{Dae, OutputFunctions, UnavailableReason};
pub use schema::{NameTable, Namespace, Schema};
