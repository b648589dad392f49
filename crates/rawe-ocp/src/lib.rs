//! Rawe OCP
//!
//! Trajectory optimization for airborne wind energy and rocket models on top
//! of the [`rawe_core`] design-vector maps.
//!
//! # Architecture
//!
//! A [`Dae`](rawe_core::Dae) is discretized with multiple shooting over `nk`
//! intervals:
//!
//! ```text
//! minimize    J(v, u)
//! subject to  x_{k+1} = RK4(f, x_k, u_k, p, endTime / nk)
//!             g_lo <= g(v, u) <= g_hi
//!             lbx <= (v, u) <= ubx
//! ```
//!
//! The resulting NLP is handed to an external [`NlpSolver`], which reports
//! every iterate to an [`IterationCallback`] (e.g. live telemetry).
//!
//! # Components
//!
//! - [`config`]: TOML configuration
//! - [`ocp`]: multiple-shooting problem construction and solutions
//! - [`nlp`]: NLP solver collaborator interface
//! - [`telemetry`]: per-iterate visualizer snapshots
//! - [`ocprt`]: real-time iteration solver wrapper
//! - [`models`]: crosswind kite and rocket models
//! - [`scenarios`]: ready-made optimization problems

pub mod config;
pub mod models;
pub mod nlp;
pub mod ocp;
pub mod ocprt;
pub mod scenarios;
pub mod telemetry;

// exported solver bindings (only when feature is enabled)
#[cfg(feature = "acados")]
pub mod acados_ffi;

pub use config::{ConfigError, OcpConfig};
pub use nlp::{IterationCallback, Nlp, NlpError, NlpSolution, NlpSolver, NoCallback, SolveStatus};
pub use ocp::{
    interpolate_guess, parse_guess_trajectory, Comparison, MissingVariables, MultipleShootingOcp,
    OcpError, OcpLayout, OcpSolution,
};
pub use ocprt::{OcpRt, RtBackend, RtError};
pub use telemetry::{MultiCarousel, Publisher, TelemetryCallback, TelemetryError};
