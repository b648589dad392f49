//! Nonlinear program handed to an external solver
//!
//! ```text
//! minimize    f(x)
//! subject to  lbx <= x    <= ubx
//!             lbg <= g(x) <= ubg
//! ```
//!
//! The solver itself lives outside this crate and is reached through
//! [`NlpSolver`]. It reports every outer iterate through a blocking
//! [`IterationCallback`] that runs to completion before the next iteration.

use nalgebra::DVector;
use thiserror::Error;

use rawe_core::{Expr, Function, SymbolicError};

use crate::config::SolverConfig;

#[derive(Debug, Error)]
pub enum NlpError {
    #[error(transparent)]
    Symbolic(#[from] SymbolicError),
    #[error("decision vector has length {got}, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("NLP solver failed: {0}")]
    Failed(String),
}

/// Termination reason reported by the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Converged,
    MaxIterations,
    Infeasible,
    /// Stopped early at the caller's request
    Stopped,
}

#[derive(Debug, Clone)]
pub struct NlpSolution {
    pub x: DVector<f64>,
    pub objective: f64,
    pub iterations: usize,
    pub status: SolveStatus,
}

/// Hook invoked by the solver after every outer iteration
///
/// `iteration` counts from 1 and is owned by the solver loop.
pub trait IterationCallback {
    fn on_iteration(&mut self, iteration: usize, x: &[f64]);
}

/// Callback that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCallback;

impl IterationCallback for NoCallback {
    fn on_iteration(&mut self, _iteration: usize, _x: &[f64]) {}
}

/// External NLP solver
pub trait NlpSolver {
    fn solve(
        &mut self,
        nlp: &Nlp,
        config: &SolverConfig,
        callback: &mut dyn IterationCallback,
    ) -> Result<NlpSolution, NlpError>;
}

#[derive(Debug, Clone)]
pub struct Nlp {
    /// Decision symbols, design vector followed by the row-major controls
    pub decision: Vec<Expr>,
    pub objective: Expr,
    pub constraints: Vec<Expr>,
    pub lbx: DVector<f64>,
    pub ubx: DVector<f64>,
    pub lbg: DVector<f64>,
    pub ubg: DVector<f64>,
    /// Initial guess
    pub x0: DVector<f64>,
}

/// Objective and constraints compiled against the decision symbols
#[derive(Debug, Clone)]
pub struct CompiledNlp {
    objective: Function,
    constraints: Function,
}

impl CompiledNlp {
    pub fn objective(&self, x: &[f64]) -> Result<f64, NlpError> {
        let f = self.objective.eval_numeric(&[x])?;
        Ok(f.first().copied().unwrap_or(0.0))
    }

    pub fn constraints(&self, x: &[f64]) -> Result<Vec<f64>, NlpError> {
        Ok(self.constraints.eval_numeric(&[x])?)
    }
}

impl Nlp {
    pub fn num_decision(&self) -> usize {
        self.decision.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn compile(&self) -> Result<CompiledNlp, NlpError> {
        let objective = Function::new(
            "objective",
            vec![self.decision.clone()],
            vec![self.objective.clone()],
        )?;
        let constraints = Function::new(
            "constraints",
            vec![self.decision.clone()],
            self.constraints.clone(),
        )?;
        Ok(CompiledNlp {
            objective,
            constraints,
        })
    }

    /// Largest bound or constraint violation at `x`, zero when feasible
    pub fn max_violation(&self, compiled: &CompiledNlp, x: &[f64]) -> Result<f64, NlpError> {
        if x.len() != self.num_decision() {
            return Err(NlpError::DimensionMismatch {
                expected: self.num_decision(),
                got: x.len(),
            });
        }

        let g = compiled.constraints(x)?;
        let bounds = x.iter().zip(self.lbx.iter().zip(self.ubx.iter()));
        let rows = g.iter().zip(self.lbg.iter().zip(self.ubg.iter()));

        let worst = bounds
            .chain(rows)
            .map(|(v, (lo, hi))| (lo - v).max(v - hi).max(0.0))
            .fold(0.0, f64::max);
        Ok(worst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn circle_nlp() -> Nlp {
        // min x^2 + y^2  s.t.  x + y >= 1,  0 <= x <= 2
        let decision = Expr::symbols("w", 2);
        let (x, y) = (&decision[0], &decision[1]);
        Nlp {
            objective: x.squared() + y.squared(),
            constraints: vec![x + y],
            lbx: DVector::from_vec(vec![0.0, f64::NEG_INFINITY]),
            ubx: DVector::from_vec(vec![2.0, f64::INFINITY]),
            lbg: DVector::from_vec(vec![1.0]),
            ubg: DVector::from_vec(vec![f64::INFINITY]),
            x0: DVector::zeros(2),
            decision,
        }
    }

    #[test]
    fn test_compile_and_evaluate() {
        let nlp = circle_nlp();
        let compiled = nlp.compile().unwrap();
        assert_relative_eq!(compiled.objective(&[0.5, 0.5]).unwrap(), 0.5);
        assert_eq!(compiled.constraints(&[0.5, 0.25]).unwrap(), vec![0.75]);
    }

    #[test]
    fn test_max_violation() {
        let nlp = circle_nlp();
        let compiled = nlp.compile().unwrap();
        assert_relative_eq!(nlp.max_violation(&compiled, &[0.5, 0.5]).unwrap(), 0.0);
        assert_relative_eq!(nlp.max_violation(&compiled, &[0.2, 0.2]).unwrap(), 0.6);
        assert_relative_eq!(nlp.max_violation(&compiled, &[3.0, 0.0]).unwrap(), 1.0);
        assert!(matches!(
            nlp.max_violation(&compiled, &[0.0]),
            Err(NlpError::DimensionMismatch { .. })
        ));
    }
}
