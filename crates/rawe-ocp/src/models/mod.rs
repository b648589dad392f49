//! Dynamic models
//!
//! - [`kite`]: tethered point-mass crosswind kite
//! - [`rocket`]: planar rocket ascent

pub mod kite;
pub mod rocket;

pub use kite::{crosswind_dae, KiteParams};
pub use rocket::{rocket_dae, RocketParams};
