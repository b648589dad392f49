//! Multiple-shooting optimal control problem
//!
//! Decision vector layout for `nk` intervals:
//!
//! ```text
//! [ p | x_0 | x_1 | ... | x_nk | u_0 | u_1 | ... | u_nk-1 ]
//!  \______ design vector ______/ \______ controls ______/
//! ```
//!
//! Bounds, guesses, constraints and the objective are all written against
//! named lookups; the flat vectors are only assembled in [`MultipleShootingOcp::build_nlp`].

use std::fmt;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use thiserror::Error;
use tracing::{debug, info, warn};

use rawe_core::maps::MaskedTable;
use rawe_core::{
    ControlMatrix, Dae, DesignVectorMap, Expr, Function, MapError, MissingEntries, Namespace,
    OutputMap, OutputMapGenerator, Schema, Shape, WritableDesignMap,
};

use crate::config::SolverConfig;
use crate::nlp::{IterationCallback, Nlp, NlpError, NlpSolver, SolveStatus};

#[derive(Debug, Error)]
pub enum OcpError {
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("invalid bounds for \"{name}\": lower {lower} > upper {upper}")]
    InvalidBounds {
        name: String,
        lower: f64,
        upper: f64,
    },
    #[error("missing bounds: {0}")]
    MissingBounds(MissingVariables),
    #[error("missing initial guess: {0}")]
    MissingGuess(MissingVariables),
    #[error("invalid guess trajectory at line {line}: {reason}")]
    InvalidGuess { line: usize, reason: String },
    #[error(transparent)]
    Solver(#[from] NlpError),
}

impl From<rawe_core::SymbolicError> for OcpError {
    fn from(err: rawe_core::SymbolicError) -> Self {
        OcpError::Map(MapError::from(err))
    }
}

/// Relation used by [`MultipleShootingOcp::constrain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Le,
    Ge,
}

/// Unset design entries and unset control entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingVariables {
    pub design: MissingEntries,
    /// Control name and its unset intervals
    pub controls: Vec<(String, Vec<usize>)>,
}

impl MissingVariables {
    pub fn is_empty(&self) -> bool {
        self.design.is_empty() && self.controls.is_empty()
    }
}

impl fmt::Display for MissingVariables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.design.is_empty() {
            parts.push(self.design.to_string());
        }
        parts.extend(
            self.controls
                .iter()
                .map(|(name, steps)| format!("{name} {steps:?}")),
        );
        f.write_str(&parts.join(", "))
    }
}

/// Per-interval control values with an "is set" mask
#[derive(Debug, Clone)]
struct ControlTable(MaskedTable);

impl ControlTable {
    fn new(nk: usize, nu: usize) -> Self {
        Self(MaskedTable::new(nk, nu))
    }

    fn set(&mut self, k: usize, timestep: Option<usize>, value: f64) {
        match timestep {
            Some(t) => self.0.set(t, k, value),
            None => self.0.fill_column(k, value),
        }
    }

    fn missing(&self, names: &[String]) -> Vec<(String, Vec<usize>)> {
        names
            .iter()
            .enumerate()
            .filter_map(|(k, name)| {
                let unset = self.0.unset_rows(k);
                (!unset.is_empty()).then(|| (name.clone(), unset))
            })
            .collect()
    }

    /// Row-major values, NaN where unset
    fn flatten(&self) -> Vec<f64> {
        (0..self.0.nrows()).flat_map(|t| self.0.row_values(t)).collect()
    }
}

/// Shape of the decision vector, shared by the problem and its callbacks
#[derive(Debug, Clone)]
pub struct OcpLayout {
    schema: Arc<Schema>,
    nk: usize,
    outputs: OutputMapGenerator,
}

impl OcpLayout {
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn nk(&self) -> usize {
        self.nk
    }

    pub fn output_generator(&self) -> &OutputMapGenerator {
        &self.outputs
    }

    pub fn design_len(&self) -> usize {
        self.schema.design_len(self.nk)
    }

    pub fn decision_len(&self) -> usize {
        self.design_len() + self.nk * self.schema.nu()
    }

    /// Split a decision vector and evaluate its node outputs
    pub fn devectorize(&self, x: &[f64]) -> Result<OcpSolution, OcpError> {
        if x.len() != self.decision_len() {
            return Err(MapError::ShapeMismatch {
                what: "decision vector".to_string(),
                expected: Shape::vector(self.decision_len()),
                got: Shape::vector(x.len()),
            }
            .into());
        }
        let (dv, u) = x.split_at(self.design_len());
        let controls = ControlMatrix::new(self.nk, self.schema.nu(), u.to_vec())?;
        let outputs = OutputMap::new(&self.outputs, dv, &controls)?;

        Ok(OcpSolution {
            schema: Arc::clone(&self.schema),
            nk: self.nk,
            design: DVector::from_column_slice(dv),
            controls,
            outputs,
            objective: None,
            iterations: 0,
            status: None,
        })
    }
}

/// Numeric decision vector with named access
#[derive(Debug, Clone)]
pub struct OcpSolution {
    schema: Arc<Schema>,
    nk: usize,
    design: DVector<f64>,
    controls: ControlMatrix<f64>,
    outputs: OutputMap<f64>,
    pub objective: Option<f64>,
    pub iterations: usize,
    pub status: Option<SolveStatus>,
}

impl OcpSolution {
    pub fn nk(&self) -> usize {
        self.nk
    }

    pub fn design(&self) -> &DVector<f64> {
        &self.design
    }

    pub fn controls(&self) -> &ControlMatrix<f64> {
        &self.controls
    }

    pub fn outputs(&self) -> &OutputMap<f64> {
        &self.outputs
    }

    pub fn design_map(&self) -> Result<DesignVectorMap<'_, f64>, MapError> {
        DesignVectorMap::new(&self.schema, self.nk, self.design.as_slice())
    }

    /// State, parameter, control or node output by name
    pub fn lookup(&self, name: &str, timestep: Option<usize>) -> Result<f64, MapError> {
        match self.schema.resolve(name) {
            Some((Namespace::State | Namespace::Parameter, _)) => {
                self.design_map()?.lookup(name, timestep).copied()
            }
            Some((_, k)) => {
                let t = timestep.ok_or_else(|| MapError::TimestepRequired {
                    name: name.to_string(),
                })?;
                self.controls
                    .get(t, k)
                    .copied()
                    .ok_or_else(|| MapError::TimestepOutOfRange {
                        name: name.to_string(),
                        timestep: t,
                        limit: self.nk,
                    })
            }
            None => match timestep {
                Some(t) => self.outputs.lookup(name, t).copied(),
                None => {
                    self.outputs.series(name)?;
                    Err(MapError::TimestepRequired {
                        name: name.to_string(),
                    })
                }
            },
        }
    }

    /// Every node (states), interval (controls, outputs) or the single
    /// value (parameters) of `name`
    pub fn series(&self, name: &str) -> Result<Vec<f64>, MapError> {
        match self.schema.resolve(name) {
            Some((Namespace::State, _)) => (0..=self.nk)
                .map(|t| self.lookup(name, Some(t)))
                .collect(),
            Some((Namespace::Parameter, _)) => Ok(vec![self.lookup(name, None)?]),
            Some((_, k)) => Ok((0..self.nk)
                .filter_map(|t| self.controls.get(t, k).copied())
                .collect()),
            None => Ok(self.outputs.series(name)?.to_vec()),
        }
    }
}

/// RK4 step of `xdot = f(x, u, p)` over `h`
fn rk4(
    ode: &Function,
    x: &[Expr],
    u: &[Expr],
    p: &[Expr],
    h: &Expr,
) -> Result<Vec<Expr>, OcpError> {
    let f = |x: &[Expr]| ode.call(&[x, u, p]);
    let axpy = |x: &[Expr], k: &[Expr], scale: f64| -> Vec<Expr> {
        x.iter()
            .zip(k)
            .map(|(xi, ki)| xi + &(h * scale) * ki)
            .collect()
    };

    let k1 = f(x)?;
    let k2 = f(&axpy(x, &k1, 0.5))?;
    let k3 = f(&axpy(x, &k2, 0.5))?;
    let k4 = f(&axpy(x, &k3, 1.0))?;

    Ok(x.iter()
        .enumerate()
        .map(|(i, xi)| {
            let incr = &k1[i] + 2.0 * &k2[i] + 2.0 * &k3[i] + &k4[i];
            xi + h / 6.0 * incr
        })
        .collect())
}

#[derive(Debug, Clone)]
pub struct MultipleShootingOcp {
    dae: Dae,
    layout: OcpLayout,
    design: Vec<Expr>,
    controls: ControlMatrix<Expr>,
    outputs: OutputMap<Expr>,
    lower: WritableDesignMap,
    upper: WritableDesignMap,
    guess: WritableDesignMap,
    control_lower: ControlTable,
    control_upper: ControlTable,
    control_guess: ControlTable,
    constraints: Vec<Expr>,
    lbg: Vec<f64>,
    ubg: Vec<f64>,
    objective: Option<Expr>,
    dynamics_ready: bool,
}

impl MultipleShootingOcp {
    pub fn new(dae: &Dae, nk: usize) -> Result<Self, OcpError> {
        info!(nk, "setting up multiple shooting");
        let schema = Arc::new(dae.schema()?);
        let generator = OutputMapGenerator::new(dae, nk)?;

        let design = Expr::symbols("v", schema.design_len(nk));
        let controls = ControlMatrix::symbolic("u", nk, schema.nu());
        let outputs = OutputMap::new(&generator, &design, &controls)?;

        let nu = schema.nu();
        Ok(Self {
            dae: dae.clone(),
            layout: OcpLayout {
                schema: Arc::clone(&schema),
                nk,
                outputs: generator,
            },
            design,
            controls,
            outputs,
            lower: WritableDesignMap::new(Arc::clone(&schema), nk),
            upper: WritableDesignMap::new(Arc::clone(&schema), nk),
            guess: WritableDesignMap::new(schema, nk),
            control_lower: ControlTable::new(nk, nu),
            control_upper: ControlTable::new(nk, nu),
            control_guess: ControlTable::new(nk, nu),
            constraints: Vec::new(),
            lbg: Vec::new(),
            ubg: Vec::new(),
            objective: None,
            dynamics_ready: false,
        })
    }

    pub fn nk(&self) -> usize {
        self.layout.nk
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.layout.schema
    }

    pub fn layout(&self) -> &OcpLayout {
        &self.layout
    }

    pub fn dae(&self) -> &Dae {
        &self.dae
    }

    fn design_map(&self) -> Result<DesignVectorMap<'_, Expr>, MapError> {
        DesignVectorMap::new(&self.layout.schema, self.layout.nk, &self.design)
    }

    fn check_interval(&self, name: &str, timestep: usize) -> Result<(), MapError> {
        if timestep >= self.layout.nk {
            return Err(MapError::TimestepOutOfRange {
                name: name.to_string(),
                timestep,
                limit: self.layout.nk,
            });
        }
        Ok(())
    }

    /// Symbolic state, parameter, control or node output
    pub fn lookup(&self, name: &str, timestep: Option<usize>) -> Result<Expr, OcpError> {
        match self.layout.schema.resolve(name) {
            Some((Namespace::State | Namespace::Parameter, _)) => {
                Ok(self.design_map()?.lookup(name, timestep)?.clone())
            }
            Some((_, k)) => {
                let t = timestep.ok_or_else(|| MapError::TimestepRequired {
                    name: name.to_string(),
                })?;
                self.check_interval(name, t)?;
                let u = self.controls.get(t, k).ok_or_else(|| MapError::TimestepOutOfRange {
                    name: name.to_string(),
                    timestep: t,
                    limit: self.layout.nk,
                })?;
                Ok(u.clone())
            }
            None => match timestep {
                Some(t) => Ok(self.outputs.lookup(name, t)?.clone()),
                None => {
                    self.outputs.series(name)?;
                    Err(MapError::TimestepRequired {
                        name: name.to_string(),
                    }
                    .into())
                }
            },
        }
    }

    /// States at node `timestep`
    pub fn x_vec(&self, timestep: usize) -> Result<Vec<Expr>, OcpError> {
        Ok(self.design_map()?.state_slice(timestep)?.to_vec())
    }

    /// Controls of interval `timestep`
    pub fn u_vec(&self, timestep: usize) -> Result<Vec<Expr>, OcpError> {
        self.check_interval("control vector", timestep)?;
        Ok(self.controls.row(timestep).map(<[Expr]>::to_vec).unwrap_or_default())
    }

    pub fn p_vec(&self) -> Result<Vec<Expr>, OcpError> {
        Ok(self.design_map()?.parameter_slice().to_vec())
    }

    /// Bound a state or control (every node when `timestep` is `None`) or a
    /// parameter. Later calls overwrite earlier ones.
    pub fn bound(
        &mut self,
        name: &str,
        (lower, upper): (f64, f64),
        timestep: Option<usize>,
    ) -> Result<(), OcpError> {
        if lower > upper {
            return Err(OcpError::InvalidBounds {
                name: name.to_string(),
                lower,
                upper,
            });
        }
        match self.layout.schema.resolve(name) {
            Some((Namespace::Control, k)) => {
                if let Some(t) = timestep {
                    self.check_interval(name, t)?;
                }
                self.control_lower.set(k, timestep, lower);
                self.control_upper.set(k, timestep, upper);
            }
            _ => {
                self.lower.set_value(name, lower, timestep)?;
                self.upper.set_value(name, upper, timestep)?;
            }
        }
        debug!(name, lower, upper, ?timestep, "bound");
        Ok(())
    }

    /// Initial guess for a state, control or parameter
    pub fn guess(&mut self, name: &str, value: f64, timestep: Option<usize>) -> Result<(), OcpError> {
        match self.layout.schema.resolve(name) {
            Some((Namespace::Control, k)) => {
                if let Some(t) = timestep {
                    self.check_interval(name, t)?;
                }
                self.control_guess.set(k, timestep, value);
            }
            _ => self.guess.set_value(name, value, timestep)?,
        }
        Ok(())
    }

    /// Guess every state at node `timestep`
    pub fn guess_x(&mut self, values: &[f64], timestep: usize) -> Result<(), OcpError> {
        let schema = Arc::clone(&self.layout.schema);
        check_len("state guess", schema.nx(), values.len())?;
        for (name, v) in schema.state_names().iter().zip(values) {
            self.guess.set_value(name, *v, Some(timestep))?;
        }
        Ok(())
    }

    /// Guess every control of interval `timestep`
    pub fn guess_u(&mut self, values: &[f64], timestep: usize) -> Result<(), OcpError> {
        check_len("control guess", self.layout.schema.nu(), values.len())?;
        self.check_interval("control vector", timestep)?;
        for (k, v) in values.iter().enumerate() {
            self.control_guess.set(k, Some(timestep), *v);
        }
        Ok(())
    }

    /// Guess states and controls from a trajectory with one row per node,
    /// states first then controls; the last row's controls are ignored
    pub fn guess_trajectory(&mut self, rows: &DMatrix<f64>) -> Result<(), OcpError> {
        let (nx, nu, nk) = (self.layout.schema.nx(), self.layout.schema.nu(), self.layout.nk);
        if rows.nrows() != nk + 1 || rows.ncols() < nx + nu {
            return Err(MapError::ShapeMismatch {
                what: "guess trajectory".to_string(),
                expected: Shape::matrix(nk + 1, nx + nu),
                got: Shape::matrix(rows.nrows(), rows.ncols()),
            }
            .into());
        }
        for k in 0..=nk {
            let row: Vec<f64> = rows.row(k).iter().copied().collect();
            self.guess_x(&row[..nx], k)?;
            if k < nk {
                self.guess_u(&row[nx..nx + nu], k)?;
            }
        }
        Ok(())
    }

    pub fn constrain(&mut self, lhs: Expr, comparison: Comparison, rhs: Expr) {
        let (lo, hi) = match comparison {
            Comparison::Eq => (0.0, 0.0),
            Comparison::Le => (f64::NEG_INFINITY, 0.0),
            Comparison::Ge => (0.0, f64::INFINITY),
        };
        self.constraints.push(lhs - rhs);
        self.lbg.push(lo);
        self.ubg.push(hi);
    }

    /// `lower <= expr <= upper`
    pub fn constrain_bounds(&mut self, expr: Expr, (lower, upper): (f64, f64)) -> Result<(), OcpError> {
        if lower > upper {
            return Err(OcpError::InvalidBounds {
                name: expr.to_string(),
                lower,
                upper,
            });
        }
        self.constraints.push(expr);
        self.lbg.push(lower);
        self.ubg.push(upper);
        Ok(())
    }

    /// Value at node 0 equals value at node nk
    pub fn constrain_periodic(&mut self, name: &str) -> Result<(), OcpError> {
        let first = self.lookup(name, Some(0))?;
        let last = self.lookup(name, Some(self.layout.nk))?;
        self.constrain(first, Comparison::Eq, last);
        Ok(())
    }

    pub fn set_objective(&mut self, objective: Expr) {
        self.objective = Some(objective);
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Continuity constraints `x_k+1 = RK4(x_k, u_k, p)` with
    /// `integrator_steps` sub-steps per interval of length `end_time / nk`
    pub fn setup_dynamics(&mut self, end_time: Expr, integrator_steps: usize) -> Result<(), OcpError> {
        info!(integrator_steps, "setting up dynamics constraints");
        let ode = self.dae.ode_fun()?;
        let steps = integrator_steps.max(1);
        let h = end_time / (self.layout.nk.max(1) * steps) as f64;
        let p = self.p_vec()?;

        for k in 0..self.layout.nk {
            let u = self.u_vec(k)?;
            let mut x = self.x_vec(k)?;
            for _ in 0..steps {
                x = rk4(&ode, &x, &u, &p, &h)?;
            }
            for (end, next) in x.into_iter().zip(self.x_vec(k + 1)?) {
                self.constrain(end, Comparison::Eq, next);
            }
        }
        self.dynamics_ready = true;
        Ok(())
    }

    pub fn missing_bounds(&self) -> MissingVariables {
        MissingVariables {
            design: self.lower.missing_entries(),
            controls: self.control_lower.missing(self.layout.schema.control_names()),
        }
    }

    pub fn missing_guesses(&self) -> MissingVariables {
        MissingVariables {
            design: self.guess.missing_entries(),
            controls: self.control_guess.missing(self.layout.schema.control_names()),
        }
    }

    /// Assemble the flat NLP, failing when a bound or guess is missing
    pub fn build_nlp(&self) -> Result<Nlp, OcpError> {
        let missing = self.missing_bounds();
        if !missing.is_empty() {
            return Err(OcpError::MissingBounds(missing));
        }
        let missing = self.missing_guesses();
        if !missing.is_empty() {
            return Err(OcpError::MissingGuess(missing));
        }
        if !self.dynamics_ready {
            warn!("building NLP without dynamics constraints");
        }
        let objective = self.objective.clone().unwrap_or_else(|| {
            warn!("no objective set, minimizing 0");
            Expr::zero()
        });

        let join = |design: DVector<f64>, controls: &ControlTable| {
            let mut flat: Vec<f64> = design.iter().copied().collect();
            flat.extend(controls.flatten());
            DVector::from_vec(flat)
        };

        let mut decision = self.design.clone();
        decision.extend(self.controls.as_slice().iter().cloned());

        Ok(Nlp {
            decision,
            objective,
            constraints: self.constraints.clone(),
            lbx: join(self.lower.vectorize(), &self.control_lower),
            ubx: join(self.upper.vectorize(), &self.control_upper),
            lbg: DVector::from_vec(self.lbg.clone()),
            ubg: DVector::from_vec(self.ubg.clone()),
            x0: join(self.guess.vectorize(), &self.control_guess),
        })
    }

    /// Solve, optionally warm-starting from a previous decision vector
    pub fn solve<S: NlpSolver + ?Sized>(
        &self,
        solver: &mut S,
        config: &SolverConfig,
        callback: &mut dyn IterationCallback,
        warm_start: Option<&DVector<f64>>,
    ) -> Result<OcpSolution, OcpError> {
        let mut nlp = self.build_nlp()?;
        if let Some(x0) = warm_start {
            check_len("warm start", nlp.num_decision(), x0.len())?;
            nlp.x0 = x0.clone();
        }

        info!(
            decision = nlp.num_decision(),
            constraints = nlp.num_constraints(),
            max_iterations = config.max_iterations,
            linear_solver = %config.linear_solver,
            "solving"
        );
        let result = solver.solve(&nlp, config, callback)?;
        info!(
            status = ?result.status,
            iterations = result.iterations,
            objective = result.objective,
            "solver finished"
        );

        let mut solution = self.layout.devectorize(result.x.as_slice())?;
        solution.objective = Some(result.objective);
        solution.iterations = result.iterations;
        solution.status = Some(result.status);
        Ok(solution)
    }

    pub fn devectorize(&self, x: &[f64]) -> Result<OcpSolution, OcpError> {
        self.layout.devectorize(x)
    }
}

fn check_len(what: &str, expected: usize, got: usize) -> Result<(), MapError> {
    if expected != got {
        return Err(MapError::ShapeMismatch {
            what: what.to_string(),
            expected: Shape::vector(expected),
            got: Shape::vector(got),
        });
    }
    Ok(())
}

/// Parse a guess trajectory with one `[a, b, c]` row per line
pub fn parse_guess_trajectory(text: &str) -> Result<DMatrix<f64>, OcpError> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim().trim_start_matches('[').trim_end_matches(']');
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| OcpError::InvalidGuess {
                line: i + 1,
                reason: e.to_string(),
            })?;
        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(OcpError::InvalidGuess {
                    line: i + 1,
                    reason: format!("expected {} columns, got {}", first.len(), row.len()),
                });
            }
        }
        rows.push(row);
    }

    let ncols = rows.first().map_or(0, Vec::len);
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Ok(DMatrix::from_row_slice(rows.len(), ncols, &flat))
}

/// Resample `rows` (one row per sample, evenly spaced in time) onto `nk + 1`
/// evenly spaced nodes by linear interpolation of each column
pub fn interpolate_guess(rows: &DMatrix<f64>, nk: usize) -> Result<DMatrix<f64>, OcpError> {
    let n = rows.nrows();
    if n == 0 {
        return Err(OcpError::InvalidGuess {
            line: 0,
            reason: "empty trajectory".to_string(),
        });
    }

    let mut out = DMatrix::zeros(nk + 1, rows.ncols());
    for k in 0..=nk {
        let s = if nk == 0 { 0.0 } else { k as f64 / nk as f64 };
        let pos = s * (n - 1) as f64;
        let i = (pos.floor() as usize).min(n - 1);
        let j = (i + 1).min(n - 1);
        let alpha = pos - i as f64;
        for c in 0..rows.ncols() {
            out[(k, c)] = rows[(i, c)] + alpha * (rows[(j, c)] - rows[(i, c)]);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// `xdot = v`, `vdot = a`, one parameter `T`, output `energy`
    fn double_integrator() -> Dae {
        let mut dae = Dae::new();
        dae.add_x("pos").unwrap();
        let v = dae.add_x("vel").unwrap();
        let a = dae.add_u("acc").unwrap();
        dae.add_p("T").unwrap();
        dae.set_ode("pos", v.clone()).unwrap();
        dae.set_ode("vel", a).unwrap();
        dae.set_output("energy", 0.5 * v.squared()).unwrap();
        dae
    }

    #[test]
    fn test_lookup_namespaces() {
        let ocp = MultipleShootingOcp::new(&double_integrator(), 3).unwrap();
        assert!(ocp.lookup("pos", Some(3)).is_ok());
        assert!(ocp.lookup("T", None).is_ok());
        assert!(ocp.lookup("acc", Some(2)).is_ok());
        assert!(ocp.lookup("energy", Some(2)).is_ok());

        assert!(matches!(
            ocp.lookup("acc", Some(3)),
            Err(OcpError::Map(MapError::TimestepOutOfRange { limit: 3, .. }))
        ));
        assert!(matches!(
            ocp.lookup("acc", None),
            Err(OcpError::Map(MapError::TimestepRequired { .. }))
        ));
        assert!(matches!(
            ocp.lookup("nope", Some(0)),
            Err(OcpError::Map(MapError::UnknownName { .. }))
        ));
    }

    #[test]
    fn test_bounds_validation_and_missing() {
        let mut ocp = MultipleShootingOcp::new(&double_integrator(), 2).unwrap();
        assert!(matches!(
            ocp.bound("pos", (1.0, 0.0), None),
            Err(OcpError::InvalidBounds { .. })
        ));

        ocp.bound("pos", (-1.0, 1.0), None).unwrap();
        ocp.bound("vel", (0.0, 0.0), Some(0)).unwrap();
        ocp.bound("acc", (-2.0, 2.0), Some(1)).unwrap();

        let missing = ocp.missing_bounds();
        assert_eq!(missing.design.state("vel"), Some(&[1, 2][..]));
        assert_eq!(missing.design.parameters, vec!["T"]);
        assert_eq!(missing.controls, vec![("acc".to_string(), vec![0])]);
        assert!(matches!(ocp.build_nlp(), Err(OcpError::MissingBounds(_))));
    }

    #[test]
    fn test_rk4_matches_closed_form() {
        // constant acceleration is integrated exactly by RK4
        let dae = double_integrator();
        let ode = dae.ode_fun().unwrap();
        let x = Expr::symbols("x", 2);
        let u = vec![Expr::symbol("a")];
        let p = vec![Expr::symbol("T")];
        let h = Expr::symbol("h");
        let next = rk4(&ode, &x, &u, &p, &h).unwrap();

        let mut inputs = x.clone();
        inputs.extend(u.iter().cloned());
        inputs.extend(p.iter().cloned());
        inputs.push(h);
        let f = Function::new("step", vec![inputs], next).unwrap();
        let out = f.eval_numeric(&[&[1.0, 2.0, 3.0, 0.0, 0.5]]).unwrap();

        assert_relative_eq!(out[0], 1.0 + 2.0 * 0.5 + 0.5 * 3.0 * 0.25, epsilon = 1e-12);
        assert_relative_eq!(out[1], 2.0 + 3.0 * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_interpolate_guess() {
        let rows = DMatrix::from_row_slice(3, 2, &[0.0, 10.0, 1.0, 20.0, 2.0, 40.0]);
        let out = interpolate_guess(&rows, 4).unwrap();
        assert_eq!(out.nrows(), 5);
        assert_relative_eq!(out[(0, 0)], 0.0);
        assert_relative_eq!(out[(1, 0)], 0.5);
        assert_relative_eq!(out[(3, 1)], 30.0);
        assert_relative_eq!(out[(4, 1)], 40.0);
    }

    #[test]
    fn test_parse_guess_trajectory() {
        let text = "[1.0, 2.0]\n[3.5, -4]\n\n";
        let m = parse_guess_trajectory(text).unwrap();
        assert_eq!(m.nrows(), 2);
        assert_relative_eq!(m[(1, 1)], -4.0);

        assert!(matches!(
            parse_guess_trajectory("[1, 2]\n[3]\n"),
            Err(OcpError::InvalidGuess { line: 2, .. })
        ));
        assert!(matches!(
            parse_guess_trajectory("[1, x]\n"),
            Err(OcpError::InvalidGuess { line: 1, .. })
        ));
    }
}
