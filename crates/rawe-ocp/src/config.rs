//! Optimization configuration
//!
//! Horizon, NLP solver, telemetry and carousel geometry settings, loadable
//! from TOML. Every section falls back to its defaults when omitted.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcpConfig {
    /// Discretization of the horizon
    pub horizon: HorizonConfig,
    /// NLP solver options
    pub solver: SolverConfig,
    /// Iteration telemetry
    pub telemetry: TelemetryConfig,
    /// Carousel geometry used by the kite model and the visualizer
    pub carousel: CarouselConfig,
}

impl OcpConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

/// Horizon discretization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonConfig {
    /// Number of shooting intervals (nk)
    pub num_intervals: usize,
    /// RK4 sub-steps per interval
    pub integrator_steps: usize,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            num_intervals: 50,  // crosswind setup uses 50 intervals
            integrator_steps: 1,
        }
    }
}

/// Sparse linear solver used inside the NLP solver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinearSolver {
    Ma27,
    #[default]
    Ma57,
    Mumps,
}

impl fmt::Display for LinearSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinearSolver::Ma27 => "ma27",
            LinearSolver::Ma57 => "ma57",
            LinearSolver::Mumps => "mumps",
        };
        f.write_str(name)
    }
}

/// NLP solver options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Iteration cap
    pub max_iterations: usize,
    /// Convergence tolerance
    pub tolerance: f64,
    pub linear_solver: LinearSolver,
    /// Expand the dynamics function into elementary operations
    pub expand_f: bool,
    /// Expand the constraint function into elementary operations
    pub expand_g: bool,
    /// Provide an exact Hessian of the Lagrangian
    pub generate_hessian: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-9,
            linear_solver: LinearSolver::Ma57,
            expand_f: true,
            expand_g: true,
            generate_hessian: true,
        }
    }
}

/// Iteration telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Address the visualizer subscribes to
    pub endpoint: String,
    pub topic: String,
    /// Opacity of kites from the current iterate
    pub kite_transparency: f64,
    /// Opacity of tether lines
    pub line_transparency: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: "tcp://*:5563".to_string(),
            topic: "multi-carousel".to_string(),
            kite_transparency: 1.0,
            line_transparency: 1.0,
        }
    }
}

/// Carousel geometry [m]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarouselConfig {
    /// Carousel arm length
    pub r_arm: f64,
    /// Tether attachment offset along the kite z axis
    pub zt: f64,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            r_arm: 1.085,
            zt: -0.01,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OcpConfig::default();
        assert_eq!(config.horizon.num_intervals, 50);
        assert_eq!(config.solver.max_iterations, 1000);
        assert_eq!(config.solver.linear_solver, LinearSolver::Ma57);
        assert_eq!(config.telemetry.topic, "multi-carousel");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = OcpConfig::from_toml_str(
            r#"
            [horizon]
            num_intervals = 20

            [solver]
            linear_solver = "mumps"
            tolerance = 1e-6
            "#,
        )
        .unwrap();

        assert_eq!(config.horizon.num_intervals, 20);
        assert_eq!(config.horizon.integrator_steps, 1);
        assert_eq!(config.solver.linear_solver, LinearSolver::Mumps);
        assert_eq!(config.solver.tolerance, 1e-6);
        assert!(config.solver.expand_g);
        assert_eq!(config.carousel, CarouselConfig::default());
    }

    #[test]
    fn test_rejects_unknown_linear_solver() {
        let err = OcpConfig::from_toml_str("[solver]\nlinear_solver = \"pardiso\"\n");
        assert!(matches!(err, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = OcpConfig::load("/nonexistent/rawe.toml");
        assert!(matches!(err, Err(ConfigError::Io(_))));
    }
}
