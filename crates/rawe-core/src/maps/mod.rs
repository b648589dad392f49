//! Named views over the flat vectors exchanged with an optimizer
//!
//! - [`DesignVectorMap`]: read-only, numeric or symbolic
//! - [`WritableDesignMap`]: filled incrementally with bounds or guesses
//! - [`OutputMapGenerator`] / [`OutputMap`]: node outputs over a horizon
//! - [`ControlMatrix`]: one control row per interval

pub mod controls;
pub mod design;
pub mod output;
pub mod table;
pub mod writable;

pub use controls::ControlMatrix;
pub use design::DesignVectorMap;
pub use output::{AnyOutputMap, ControlInput, DesignVector, OutputMap, OutputMapGenerator};
pub use table::MaskedTable;
pub use writable::{MissingEntries, WritableDesignMap};
