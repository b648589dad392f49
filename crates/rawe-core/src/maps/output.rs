//! Node outputs evaluated over a whole trajectory
//!
//! [`OutputMapGenerator`] compiles a single batched function
//! `(design vector, controls) -> [outputs at node 0, .., outputs at node nk-1]`
//! so that subexpressions shared between outputs and between nodes are
//! evaluated once per call. [`OutputMap`] evaluates it for one trajectory,
//! either numerically (`f64`) or symbolically (`Expr`), and tabulates the
//! result per name.

use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::DVector;
use tracing::debug;

use crate::dae::{Dae, NameTable, Namespace, Schema, UnavailableReason};
use crate::error::{MapError, Shape};
use crate::symbolic::{Evaluable, Expr, Function};

use super::controls::ControlMatrix;
use super::design::DesignVectorMap;

/// Output names shared by a generator and every map it produces
#[derive(Debug)]
struct OutputNames {
    node: NameTable,
    all: Vec<String>,
    unavailable: HashMap<String, UnavailableReason>,
}

#[derive(Debug, Clone)]
pub struct OutputMapGenerator {
    schema: Arc<Schema>,
    nk: usize,
    names: Arc<OutputNames>,
    every_output: Function,
}

impl OutputMapGenerator {
    /// Compile the node outputs of `dae` over `nk` intervals
    pub fn new(dae: &Dae, nk: usize) -> Result<Self, MapError> {
        let schema = Arc::new(dae.schema()?);
        let fns = dae.outputs_fun()?;
        if fns.node.num_outputs() != fns.node_names.len() {
            return Err(MapError::SchemaMismatch {
                function: fns.node.name().to_string(),
                declared: fns.node_names.len(),
                actual: fns.node.num_outputs(),
            });
        }

        let nu = schema.nu();
        let dv = Expr::symbols("design", schema.design_len(nk));
        let controls = ControlMatrix::symbolic("control", nk, nu);
        let map = DesignVectorMap::new(&schema, nk, &dv)?;
        let p = map.parameter_slice();

        let mut flat = Vec::with_capacity(nk * fns.node_names.len());
        for k in 0..nk {
            let x = map.state_slice(k)?;
            let u = &controls.as_slice()[k * nu..(k + 1) * nu];
            flat.extend(fns.node.call(&[x, u, p])?);
        }

        let every_output = Function::new(
            "every_output",
            vec![dv, controls.as_slice().to_vec()],
            flat,
        )?;
        let declared = nk * fns.node_names.len();
        if every_output.num_outputs() != declared {
            return Err(MapError::SchemaMismatch {
                function: every_output.name().to_string(),
                declared,
                actual: every_output.num_outputs(),
            });
        }

        debug!(
            nk,
            node_outputs = fns.node_names.len(),
            unavailable = fns.unavailable.len(),
            "compiled output map generator"
        );

        let names = OutputNames {
            node: NameTable::new(fns.node_names, Namespace::Output)?,
            all: fns.all_names,
            unavailable: fns.unavailable.into_iter().collect(),
        };

        Ok(Self {
            schema,
            nk,
            names: Arc::new(names),
            every_output,
        })
    }

    pub fn nk(&self) -> usize {
        self.nk
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Outputs materialized at every node, in declaration order
    pub fn node_output_names(&self) -> &[String] {
        self.names.node.names()
    }

    /// Every declared output, node output or not
    pub fn output_names(&self) -> &[String] {
        &self.names.all
    }

    /// Declared outputs that cannot be evaluated per node, with the reason,
    /// in declaration order
    pub fn unavailable_outputs(&self) -> Vec<(&str, &UnavailableReason)> {
        self.names
            .all
            .iter()
            .filter_map(|name| {
                self.names
                    .unavailable
                    .get(name)
                    .map(|reason| (name.as_str(), reason))
            })
            .collect()
    }

    pub fn is_node_output(&self, name: &str) -> bool {
        self.names.node.contains(name)
    }
}

/// Per-name, per-interval table of node outputs
#[derive(Debug, Clone)]
pub struct OutputMap<T> {
    nk: usize,
    names: Arc<OutputNames>,
    table: Vec<Vec<T>>,
}

impl<T: Evaluable> OutputMap<T> {
    /// Evaluate `generator` at `dv` (length `np + nx*(nk+1)`) and `controls`
    /// (`nk x nu`)
    pub fn new(
        generator: &OutputMapGenerator,
        dv: &[T],
        controls: &ControlMatrix<T>,
    ) -> Result<Self, MapError> {
        let nk = generator.nk;
        let expected = generator.schema.design_len(nk);
        if dv.len() != expected {
            return Err(MapError::ShapeMismatch {
                what: "design vector".to_string(),
                expected: Shape::vector(expected),
                got: Shape::vector(dv.len()),
            });
        }
        controls.check_shape(nk, generator.schema.nu())?;

        let flat = T::evaluate(&generator.every_output, &[dv, controls.as_slice()])?;

        let n0 = generator.names.node.len();
        let mut table: Vec<Vec<T>> = (0..n0).map(|_| Vec::with_capacity(nk)).collect();
        for (i, value) in flat.into_iter().enumerate() {
            table[i % n0].push(value);
        }

        Ok(Self {
            nk,
            names: Arc::clone(&generator.names),
            table,
        })
    }
}

impl<T> OutputMap<T> {
    pub fn nk(&self) -> usize {
        self.nk
    }

    /// Node output names, in declaration order
    pub fn names(&self) -> &[String] {
        self.names.node.names()
    }

    fn column(&self, name: &str) -> Result<usize, MapError> {
        if let Some(j) = self.names.node.get(name) {
            return Ok(j);
        }
        match self.names.unavailable.get(name) {
            Some(reason) => Err(MapError::UnavailableOutput {
                name: name.to_string(),
                reason: reason.clone(),
            }),
            None => Err(MapError::UnknownName {
                name: name.to_string(),
                namespace: Namespace::Output,
            }),
        }
    }

    /// Value of `name` at interval `timestep`, `0 <= timestep < nk`
    pub fn lookup(&self, name: &str, timestep: usize) -> Result<&T, MapError> {
        let j = self.column(name)?;
        if timestep >= self.nk {
            return Err(MapError::TimestepOutOfRange {
                name: name.to_string(),
                timestep,
                limit: self.nk,
            });
        }
        Ok(&self.table[j][timestep])
    }

    /// Every interval's value of `name`
    pub fn series(&self, name: &str) -> Result<&[T], MapError> {
        let j = self.column(name)?;
        Ok(&self.table[j])
    }
}

/// A design vector whose representation is only known at runtime
#[derive(Debug, Clone)]
pub enum DesignVector {
    Numeric(DVector<f64>),
    Symbolic(Vec<Expr>),
}

impl DesignVector {
    pub fn len(&self) -> usize {
        match self {
            DesignVector::Numeric(v) => v.len(),
            DesignVector::Symbolic(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<DVector<f64>> for DesignVector {
    fn from(v: DVector<f64>) -> Self {
        DesignVector::Numeric(v)
    }
}

impl From<Vec<Expr>> for DesignVector {
    fn from(v: Vec<Expr>) -> Self {
        DesignVector::Symbolic(v)
    }
}

#[derive(Debug, Clone)]
pub enum ControlInput {
    Numeric(ControlMatrix<f64>),
    Symbolic(ControlMatrix<Expr>),
}

impl From<ControlMatrix<f64>> for ControlInput {
    fn from(c: ControlMatrix<f64>) -> Self {
        ControlInput::Numeric(c)
    }
}

impl From<ControlMatrix<Expr>> for ControlInput {
    fn from(c: ControlMatrix<Expr>) -> Self {
        ControlInput::Symbolic(c)
    }
}

/// Output map whose evaluation strategy was picked from its inputs
#[derive(Debug, Clone)]
pub enum AnyOutputMap {
    Numeric(OutputMap<f64>),
    Symbolic(OutputMap<Expr>),
}

impl AnyOutputMap {
    /// Numeric inputs are evaluated; a symbolic design vector produces
    /// expressions, lifting numeric controls to constants
    pub fn new(
        generator: &OutputMapGenerator,
        dv: &DesignVector,
        controls: &ControlInput,
    ) -> Result<Self, MapError> {
        match (dv, controls) {
            (DesignVector::Numeric(dv), ControlInput::Numeric(u)) => {
                OutputMap::new(generator, dv.as_slice(), u).map(AnyOutputMap::Numeric)
            }
            (DesignVector::Symbolic(dv), ControlInput::Symbolic(u)) => {
                OutputMap::new(generator, dv, u).map(AnyOutputMap::Symbolic)
            }
            (DesignVector::Symbolic(dv), ControlInput::Numeric(u)) => {
                OutputMap::new(generator, dv, &u.to_constants()).map(AnyOutputMap::Symbolic)
            }
            (DesignVector::Numeric(_), ControlInput::Symbolic(_)) => {
                Err(MapError::UnsupportedVectorType(
                    "numeric design vector with symbolic controls".to_string(),
                ))
            }
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, AnyOutputMap::Symbolic(_))
    }

    pub fn as_numeric(&self) -> Option<&OutputMap<f64>> {
        match self {
            AnyOutputMap::Numeric(m) => Some(m),
            AnyOutputMap::Symbolic(_) => None,
        }
    }

    pub fn as_symbolic(&self) -> Option<&OutputMap<Expr>> {
        match self {
            AnyOutputMap::Symbolic(m) => Some(m),
            AnyOutputMap::Numeric(_) => None,
        }
    }

    /// Lookup as an expression; numeric values become constants
    pub fn lookup_expr(&self, name: &str, timestep: usize) -> Result<Expr, MapError> {
        match self {
            AnyOutputMap::Numeric(m) => m.lookup(name, timestep).map(|v| Expr::constant(*v)),
            AnyOutputMap::Symbolic(m) => m.lookup(name, timestep).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Point mass on a line: states pos/vel, control force, parameter mass
    fn cart() -> Dae {
        let mut dae = Dae::new();
        dae.add_x("pos").unwrap();
        let vel = dae.add_x("vel").unwrap();
        let force = dae.add_u("force").unwrap();
        let mass = dae.add_p("mass").unwrap();
        let drag = dae.add_z("drag").unwrap();

        dae.set_ode("pos", vel.clone()).unwrap();
        dae.set_ode("vel", &force / &mass).unwrap();

        dae.set_output("momentum", &mass * &vel).unwrap();
        dae.set_output("power", &force * &vel).unwrap();
        dae.set_output("drag power", &drag * &vel).unwrap();
        dae
    }

    #[test]
    fn test_generator_names() {
        let gen = OutputMapGenerator::new(&cart(), 2).unwrap();
        assert_eq!(gen.node_output_names(), &["momentum", "power"]);
        assert_eq!(gen.output_names().len(), 3);
        assert!(gen.is_node_output("power"));
        assert!(!gen.is_node_output("drag power"));

        let unavailable = gen.unavailable_outputs();
        assert_eq!(unavailable.len(), 1);
        assert_eq!(unavailable[0].0, "drag power");
    }

    #[test]
    fn test_numeric_evaluation_per_interval() {
        let gen = OutputMapGenerator::new(&cart(), 2).unwrap();
        // [mass | pos0 vel0 | pos1 vel1 | pos2 vel2]
        let dv = [2.0, 0.0, 1.0, 1.0, 3.0, 4.0, 5.0];
        let u = ControlMatrix::from_rows(1, vec![vec![10.0], vec![20.0]]).unwrap();
        let map = OutputMap::new(&gen, &dv, &u).unwrap();

        assert_relative_eq!(*map.lookup("momentum", 0).unwrap(), 2.0);
        assert_relative_eq!(*map.lookup("momentum", 1).unwrap(), 6.0);
        assert_relative_eq!(*map.lookup("power", 1).unwrap(), 60.0);
        assert_eq!(map.series("power").unwrap(), &[10.0, 60.0]);
    }

    #[test]
    fn test_lookup_errors() {
        let gen = OutputMapGenerator::new(&cart(), 1).unwrap();
        let u = ControlMatrix::from_rows(1, vec![vec![1.0]]).unwrap();
        let map = OutputMap::new(&gen, &[1.0, 0.0, 0.0, 0.0, 0.0], &u).unwrap();

        assert!(matches!(
            map.lookup("drag power", 0),
            Err(MapError::UnavailableOutput {
                reason: UnavailableReason::Algebraic(_),
                ..
            })
        ));
        assert!(matches!(
            map.lookup("pos", 0),
            Err(MapError::UnknownName {
                namespace: Namespace::Output,
                ..
            })
        ));
        assert!(matches!(
            map.lookup("power", 1),
            Err(MapError::TimestepOutOfRange { limit: 1, .. })
        ));
    }

    #[test]
    fn test_input_shapes_are_checked() {
        let gen = OutputMapGenerator::new(&cart(), 1).unwrap();
        let u = ControlMatrix::from_rows(1, vec![vec![1.0]]).unwrap();
        assert!(matches!(
            OutputMap::new(&gen, &[1.0, 0.0, 0.0, 0.0], &u),
            Err(MapError::ShapeMismatch { .. })
        ));

        let wide = ControlMatrix::from_rows(2, vec![vec![1.0, 2.0]]).unwrap();
        assert!(matches!(
            OutputMap::new(&gen, &[1.0, 0.0, 0.0, 0.0, 0.0], &wide),
            Err(MapError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_symbolic_evaluation_then_numeric_agrees() {
        let gen = OutputMapGenerator::new(&cart(), 1).unwrap();
        let dv = Expr::symbols("w", 5);
        let u = ControlMatrix::symbolic("f", 1, 1);
        let map = OutputMap::new(&gen, &dv, &u).unwrap();

        let power = map.lookup("power", 0).unwrap().clone();
        let mut inputs = dv.clone();
        inputs.extend(u.as_slice().iter().cloned());
        let f = Function::new("power", vec![inputs], vec![power]).unwrap();
        let value = f
            .eval_numeric(&[&[1.0, 0.0, 3.0, 0.0, 0.0, 4.0]])
            .unwrap();
        assert_relative_eq!(value[0], 12.0);
    }

    #[test]
    fn test_any_output_map_dispatch() {
        let gen = OutputMapGenerator::new(&cart(), 1).unwrap();
        let numeric_dv = DesignVector::from(DVector::from_vec(vec![2.0, 0.0, 1.0, 0.0, 0.0]));
        let numeric_u = ControlInput::from(ControlMatrix::from_rows(1, vec![vec![3.0]]).unwrap());
        let symbolic_u = ControlInput::from(ControlMatrix::symbolic("f", 1, 1));

        let map = AnyOutputMap::new(&gen, &numeric_dv, &numeric_u).unwrap();
        assert!(!map.is_symbolic());
        assert_eq!(map.lookup_expr("power", 0).unwrap().as_constant(), Some(3.0));

        assert!(matches!(
            AnyOutputMap::new(&gen, &numeric_dv, &symbolic_u),
            Err(MapError::UnsupportedVectorType(_))
        ));

        let symbolic_dv = DesignVector::from(Expr::symbols("w", 5));
        let map = AnyOutputMap::new(&gen, &symbolic_dv, &numeric_u).unwrap();
        assert!(map.as_symbolic().is_some());
    }
}
