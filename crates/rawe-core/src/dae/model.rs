//! Differential-algebraic model builder
//!
//! A [`Dae`] owns one symbol per differential state, algebraic variable,
//! control, parameter and state derivative, the explicit right-hand side of
//! each state, and a list of named outputs built from those symbols.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::MapError;
use crate::symbolic::{Expr, Function, Symbol};

use super::schema::{Namespace, Schema};

/// Why an output is missing from the node-output evaluation scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// The output uses an algebraic variable
    Algebraic(String),
    /// The output uses the time derivative of a differential state
    StateDerivative(String),
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::Algebraic(name) => write!(f, "algebraic variable \"{name}\""),
            UnavailableReason::StateDerivative(name) => write!(f, "ddt(\"{name}\")"),
        }
    }
}

/// Output functions of a model
///
/// `all` takes `(x, z, u, p, xdot)` and returns every declared output;
/// `node` takes `(x, u, p)` and returns only the outputs computable from a
/// single node.
#[derive(Debug, Clone)]
pub struct OutputFunctions {
    pub all: Function,
    pub all_names: Vec<String>,
    pub node: Function,
    pub node_names: Vec<String>,
    pub unavailable: Vec<(String, UnavailableReason)>,
}

#[derive(Debug, Clone, Default)]
pub struct Dae {
    namespaces: HashMap<String, Namespace>,
    x: Vec<(String, Expr)>,
    xdot: Vec<Expr>,
    ode: Vec<Option<Expr>>,
    z: Vec<(String, Expr)>,
    u: Vec<(String, Expr)>,
    p: Vec<(String, Expr)>,
    outputs: Vec<(String, Expr)>,
}

fn find<'a>(
    entries: &'a [(String, Expr)],
    name: &str,
    namespace: Namespace,
) -> Result<(usize, &'a Expr), MapError> {
    entries
        .iter()
        .enumerate()
        .find(|(_, (n, _))| n == name)
        .map(|(k, (_, e))| (k, e))
        .ok_or_else(|| MapError::UnknownName {
            name: name.to_string(),
            namespace,
        })
}

fn exprs(entries: &[(String, Expr)]) -> Vec<Expr> {
    entries.iter().map(|(_, e)| e.clone()).collect()
}

fn names(entries: &[(String, Expr)]) -> Vec<String> {
    entries.iter().map(|(n, _)| n.clone()).collect()
}

fn symbol_ids(entries: &[Expr]) -> HashSet<u64> {
    entries
        .iter()
        .filter_map(Expr::symbol_ref)
        .map(Symbol::id)
        .collect()
}

impl Dae {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, name: &str, namespace: Namespace) -> Result<(), MapError> {
        if let Some(existing) = self.namespaces.get(name) {
            return Err(MapError::DuplicateName {
                name: name.to_string(),
                namespace: *existing,
            });
        }
        self.namespaces.insert(name.to_string(), namespace);
        Ok(())
    }

    /// Add a differential state
    pub fn add_x(&mut self, name: &str) -> Result<Expr, MapError> {
        self.register(name, Namespace::State)?;
        let sym = Expr::symbol(name);
        self.x.push((name.to_string(), sym.clone()));
        self.xdot.push(Expr::symbol(&format!("ddt({name})")));
        self.ode.push(None);
        Ok(sym)
    }

    /// Add an algebraic variable
    pub fn add_z(&mut self, name: &str) -> Result<Expr, MapError> {
        self.register(name, Namespace::Algebraic)?;
        let sym = Expr::symbol(name);
        self.z.push((name.to_string(), sym.clone()));
        Ok(sym)
    }

    /// Add a control input
    pub fn add_u(&mut self, name: &str) -> Result<Expr, MapError> {
        self.register(name, Namespace::Control)?;
        let sym = Expr::symbol(name);
        self.u.push((name.to_string(), sym.clone()));
        Ok(sym)
    }

    /// Add a time-invariant parameter
    pub fn add_p(&mut self, name: &str) -> Result<Expr, MapError> {
        self.register(name, Namespace::Parameter)?;
        let sym = Expr::symbol(name);
        self.p.push((name.to_string(), sym.clone()));
        Ok(sym)
    }

    pub fn x(&self, name: &str) -> Result<Expr, MapError> {
        find(&self.x, name, Namespace::State).map(|(_, e)| e.clone())
    }

    pub fn z(&self, name: &str) -> Result<Expr, MapError> {
        find(&self.z, name, Namespace::Algebraic).map(|(_, e)| e.clone())
    }

    pub fn u(&self, name: &str) -> Result<Expr, MapError> {
        find(&self.u, name, Namespace::Control).map(|(_, e)| e.clone())
    }

    pub fn p(&self, name: &str) -> Result<Expr, MapError> {
        find(&self.p, name, Namespace::Parameter).map(|(_, e)| e.clone())
    }

    /// Time derivative symbol of a differential state
    pub fn ddt(&self, name: &str) -> Result<Expr, MapError> {
        let (k, _) = find(&self.x, name, Namespace::State)?;
        Ok(self.xdot[k].clone())
    }

    /// Set the explicit right-hand side `ddt(state) = rhs`
    pub fn set_ode(&mut self, state: &str, rhs: Expr) -> Result<(), MapError> {
        let (k, _) = find(&self.x, state, Namespace::State)?;
        self.ode[k] = Some(rhs);
        Ok(())
    }

    /// Declare a named output
    pub fn set_output(&mut self, name: &str, expr: Expr) -> Result<(), MapError> {
        self.register(name, Namespace::Output)?;
        self.outputs.push((name.to_string(), expr));
        Ok(())
    }

    pub fn output(&self, name: &str) -> Result<Expr, MapError> {
        find(&self.outputs, name, Namespace::Output).map(|(_, e)| e.clone())
    }

    pub fn x_names(&self) -> Vec<String> {
        names(&self.x)
    }

    pub fn z_names(&self) -> Vec<String> {
        names(&self.z)
    }

    pub fn u_names(&self) -> Vec<String> {
        names(&self.u)
    }

    pub fn p_names(&self) -> Vec<String> {
        names(&self.p)
    }

    pub fn output_names(&self) -> Vec<String> {
        names(&self.outputs)
    }

    pub fn x_vec(&self) -> Vec<Expr> {
        exprs(&self.x)
    }

    pub fn z_vec(&self) -> Vec<Expr> {
        exprs(&self.z)
    }

    pub fn u_vec(&self) -> Vec<Expr> {
        exprs(&self.u)
    }

    pub fn p_vec(&self) -> Vec<Expr> {
        exprs(&self.p)
    }

    pub fn xdot_vec(&self) -> Vec<Expr> {
        self.xdot.clone()
    }

    /// The state/control/parameter schema of this model
    pub fn schema(&self) -> Result<Schema, MapError> {
        Schema::new(&self.x_names(), &self.u_names(), &self.p_names())
    }

    /// `f(x, u, p) -> xdot` in state order
    pub fn ode_fun(&self) -> Result<Function, MapError> {
        let rhs = self
            .x
            .iter()
            .zip(&self.ode)
            .map(|((name, _), rhs)| {
                rhs.clone()
                    .ok_or_else(|| MapError::MissingOde { state: name.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let f = Function::new("ode", vec![self.x_vec(), self.u_vec(), self.p_vec()], rhs)?;
        Ok(f)
    }

    /// First algebraic or derivative symbol `expr` depends on, if any
    fn unavailable_reason(&self, expr: &Expr) -> Option<UnavailableReason> {
        let z_ids = symbol_ids(&self.z_vec());
        let xdot_ids = symbol_ids(&self.xdot);

        for symbol in expr.free_symbols() {
            if z_ids.contains(&symbol.id()) {
                return Some(UnavailableReason::Algebraic(symbol.name().to_string()));
            }
            if xdot_ids.contains(&symbol.id()) {
                let k = self
                    .xdot
                    .iter()
                    .position(|e| e.symbol_ref().map(Symbol::id) == Some(symbol.id()))?;
                return Some(UnavailableReason::StateDerivative(self.x[k].0.clone()));
            }
        }
        None
    }

    /// Compile the all-outputs and node-outputs functions
    pub fn outputs_fun(&self) -> Result<OutputFunctions, MapError> {
        let all_names = self.output_names();
        let all = Function::new(
            "all_outputs",
            vec![
                self.x_vec(),
                self.z_vec(),
                self.u_vec(),
                self.p_vec(),
                self.xdot_vec(),
            ],
            exprs(&self.outputs),
        )?;

        let mut node_names = Vec::new();
        let mut node_outputs = Vec::new();
        let mut unavailable = Vec::new();
        for (name, expr) in &self.outputs {
            match self.unavailable_reason(expr) {
                None => {
                    node_names.push(name.clone());
                    node_outputs.push(expr.clone());
                }
                Some(reason) => unavailable.push((name.clone(), reason)),
            }
        }
        let node = Function::new(
            "node_outputs",
            vec![self.x_vec(), self.u_vec(), self.p_vec()],
            node_outputs,
        )?;

        Ok(OutputFunctions {
            all,
            all_names,
            node,
            node_names,
            unavailable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cart() -> Dae {
        let mut dae = Dae::new();
        let pos = dae.add_x("pos").unwrap();
        let vel = dae.add_x("vel").unwrap();
        let force = dae.add_u("force").unwrap();
        let mass = dae.add_p("mass").unwrap();
        let friction = dae.add_z("friction").unwrap();

        dae.set_ode("pos", vel.clone()).unwrap();
        dae.set_ode("vel", &force / &mass).unwrap();

        dae.set_output("momentum", &mass * &vel).unwrap();
        dae.set_output("power", &force * &vel).unwrap();
        dae.set_output("friction power", &friction * &vel).unwrap();
        let acc = dae.ddt("vel").unwrap();
        dae.set_output("inertial force", &mass * acc).unwrap();
        let _ = pos;
        dae
    }

    #[test]
    fn test_names_are_unique_across_namespaces() {
        let mut dae = cart();
        assert!(matches!(
            dae.add_p("pos"),
            Err(MapError::DuplicateName {
                namespace: Namespace::State,
                ..
            })
        ));
        assert!(dae.set_output("momentum", Expr::zero()).is_err());
    }

    #[test]
    fn test_ode_fun() {
        let dae = cart();
        let f = dae.ode_fun().unwrap();
        let xdot = f.eval_numeric(&[&[0.0, 3.0], &[4.0], &[2.0]]).unwrap();
        assert_relative_eq!(xdot[0], 3.0);
        assert_relative_eq!(xdot[1], 2.0);
    }

    #[test]
    fn test_missing_ode() {
        let mut dae = Dae::new();
        dae.add_x("lonely").unwrap();
        assert_eq!(
            dae.ode_fun().unwrap_err(),
            MapError::MissingOde {
                state: "lonely".into()
            }
        );
    }

    #[test]
    fn test_outputs_fun_splits_node_outputs() {
        let dae = cart();
        let fns = dae.outputs_fun().unwrap();
        assert_eq!(fns.all_names.len(), 4);
        assert_eq!(fns.node_names, vec!["momentum", "power"]);
        assert_eq!(fns.node.num_outputs(), 2);
        assert_eq!(
            fns.unavailable,
            vec![
                (
                    "friction power".to_string(),
                    UnavailableReason::Algebraic("friction".into())
                ),
                (
                    "inertial force".to_string(),
                    UnavailableReason::StateDerivative("vel".into())
                ),
            ]
        );

        let out = fns.node.eval_numeric(&[&[0.0, 2.0], &[5.0], &[3.0]]).unwrap();
        assert_relative_eq!(out[0], 6.0);
        assert_relative_eq!(out[1], 10.0);
    }
}
