//! Compiled multi-output functions
//!
//! A [`Function`] fixes an ordered list of input symbol vectors and a list of
//! output expressions. It can then be evaluated numerically, or called with
//! symbolic arguments to splice its outputs into a larger expression graph.
//! Both paths walk the whole output list with one memo table, so a
//! subexpression shared between outputs is only evaluated once per call.

use std::collections::{HashMap, HashSet};

use super::expr::{Expr, Node, Symbol};
use super::SymbolicError;

#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    inputs: Vec<Vec<Symbol>>,
    outputs: Vec<Expr>,
}

impl Function {
    /// Build a function from symbolic inputs and outputs
    ///
    /// Every input entry must be a bare symbol, no symbol may appear twice
    /// across the inputs, and the outputs may only depend on input symbols.
    pub fn new(
        name: &str,
        inputs: Vec<Vec<Expr>>,
        outputs: Vec<Expr>,
    ) -> Result<Self, SymbolicError> {
        let mut seen = HashSet::new();
        let mut input_symbols = Vec::with_capacity(inputs.len());

        for (input, exprs) in inputs.iter().enumerate() {
            let mut symbols = Vec::with_capacity(exprs.len());
            for (index, expr) in exprs.iter().enumerate() {
                let symbol = expr.symbol_ref().ok_or_else(|| SymbolicError::NotASymbol {
                    function: name.to_string(),
                    input,
                    index,
                })?;
                if !seen.insert(symbol.id()) {
                    return Err(SymbolicError::DuplicateSymbol {
                        function: name.to_string(),
                        symbol: symbol.name().to_string(),
                    });
                }
                symbols.push(symbol.clone());
            }
            input_symbols.push(symbols);
        }

        for output in &outputs {
            if let Some(free) = output.free_symbols().iter().find(|s| !seen.contains(&s.id())) {
                return Err(SymbolicError::FreeSymbol {
                    function: name.to_string(),
                    symbol: free.name().to_string(),
                });
            }
        }

        Ok(Self {
            name: name.to_string(),
            inputs: input_symbols,
            outputs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn input_size(&self, input: usize) -> Option<usize> {
        self.inputs.get(input).map(Vec::len)
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn outputs(&self) -> &[Expr] {
        &self.outputs
    }

    fn check_arguments<T>(&self, args: &[&[T]]) -> Result<(), SymbolicError> {
        if args.len() != self.inputs.len() {
            return Err(SymbolicError::ArityMismatch {
                function: self.name.clone(),
                expected: self.inputs.len(),
                got: args.len(),
            });
        }
        for (input, (arg, symbols)) in args.iter().zip(&self.inputs).enumerate() {
            if arg.len() != symbols.len() {
                return Err(SymbolicError::InputSizeMismatch {
                    function: self.name.clone(),
                    input,
                    expected: symbols.len(),
                    got: arg.len(),
                });
            }
        }
        Ok(())
    }

    /// Evaluate every output at numeric arguments
    pub fn eval_numeric(&self, args: &[&[f64]]) -> Result<Vec<f64>, SymbolicError> {
        self.check_arguments(args)?;

        let mut bindings = HashMap::new();
        for (symbols, arg) in self.inputs.iter().zip(args) {
            for (symbol, value) in symbols.iter().zip(arg.iter()) {
                bindings.insert(symbol.id(), *value);
            }
        }

        let mut memo = HashMap::new();
        self.outputs
            .iter()
            .map(|out| self.eval_expr(out, &bindings, &mut memo))
            .collect()
    }

    fn eval_expr(
        &self,
        expr: &Expr,
        bindings: &HashMap<u64, f64>,
        memo: &mut HashMap<usize, f64>,
    ) -> Result<f64, SymbolicError> {
        if let Some(v) = memo.get(&expr.node_id()) {
            return Ok(*v);
        }
        let value = match expr.node() {
            Node::Constant(v) => *v,
            Node::Symbol(s) => *bindings.get(&s.id()).ok_or_else(|| SymbolicError::FreeSymbol {
                function: self.name.clone(),
                symbol: s.name().to_string(),
            })?,
            Node::Unary(op, a) => op.apply(self.eval_expr(a, bindings, memo)?),
            Node::Binary(op, a, b) => {
                let a = self.eval_expr(a, bindings, memo)?;
                let b = self.eval_expr(b, bindings, memo)?;
                op.apply(a, b)
            }
        };
        memo.insert(expr.node_id(), value);
        Ok(value)
    }

    /// Substitute symbolic arguments into every output
    pub fn call(&self, args: &[&[Expr]]) -> Result<Vec<Expr>, SymbolicError> {
        self.check_arguments(args)?;

        let mut bindings = HashMap::new();
        for (symbols, arg) in self.inputs.iter().zip(args) {
            for (symbol, value) in symbols.iter().zip(arg.iter()) {
                bindings.insert(symbol.id(), value.clone());
            }
        }

        let mut memo = HashMap::new();
        self.outputs
            .iter()
            .map(|out| self.substitute(out, &bindings, &mut memo))
            .collect()
    }

    fn substitute(
        &self,
        expr: &Expr,
        bindings: &HashMap<u64, Expr>,
        memo: &mut HashMap<usize, Expr>,
    ) -> Result<Expr, SymbolicError> {
        if let Some(e) = memo.get(&expr.node_id()) {
            return Ok(e.clone());
        }
        let result = match expr.node() {
            Node::Constant(_) => expr.clone(),
            Node::Symbol(s) => bindings
                .get(&s.id())
                .cloned()
                .ok_or_else(|| SymbolicError::FreeSymbol {
                    function: self.name.clone(),
                    symbol: s.name().to_string(),
                })?,
            Node::Unary(op, a) => Expr::unary(*op, self.substitute(a, bindings, memo)?),
            Node::Binary(op, a, b) => {
                let a = self.substitute(a, bindings, memo)?;
                let b = self.substitute(b, bindings, memo)?;
                Expr::binary(*op, a, b)
            }
        };
        memo.insert(expr.node_id(), result.clone());
        Ok(result)
    }
}

/// Element types a [`Function`] can be applied to
///
/// `f64` arguments are evaluated numerically, `Expr` arguments are
/// substituted symbolically. Callers pick the strategy through the element
/// type of the vectors they hold.
pub trait Evaluable: Clone + Sized {
    fn evaluate(function: &Function, args: &[&[Self]]) -> Result<Vec<Self>, SymbolicError>;
}

impl Evaluable for f64 {
    fn evaluate(function: &Function, args: &[&[f64]]) -> Result<Vec<f64>, SymbolicError> {
        function.eval_numeric(args)
    }
}

impl Evaluable for Expr {
    fn evaluate(function: &Function, args: &[&[Expr]]) -> Result<Vec<Expr>, SymbolicError> {
        function.call(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hypot_function() -> Function {
        let x = Expr::symbol("x");
        let y = Expr::symbol("y");
        let r = (&x * &x + &y * &y).sqrt();
        Function::new("hypot", vec![vec![x, y]], vec![r.clone(), &r * 2.0]).unwrap()
    }

    #[test]
    fn test_eval_numeric() {
        let f = hypot_function();
        let out = f.eval_numeric(&[&[3.0, 4.0]]).unwrap();
        assert_relative_eq!(out[0], 5.0, epsilon = 1e-12);
        assert_relative_eq!(out[1], 10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_symbolic_call_then_eval() {
        let f = hypot_function();
        let a = Expr::symbol("a");
        let called = f.call(&[&[a.clone(), Expr::constant(0.0)]]).unwrap();

        let g = Function::new("g", vec![vec![a]], called).unwrap();
        let out = g.eval_numeric(&[&[-2.0]]).unwrap();
        assert_relative_eq!(out[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(out[1], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_free_symbol() {
        let x = Expr::symbol("x");
        let hidden = Expr::symbol("hidden");
        let err = Function::new("f", vec![vec![x.clone()]], vec![x + hidden]).unwrap_err();
        assert!(matches!(err, SymbolicError::FreeSymbol { .. }));
    }

    #[test]
    fn test_rejects_non_symbol_input() {
        let x = Expr::symbol("x");
        let err = Function::new("f", vec![vec![&x * 2.0]], vec![x]).unwrap_err();
        assert!(matches!(err, SymbolicError::NotASymbol { input: 0, index: 0, .. }));
    }

    #[test]
    fn test_argument_checks() {
        let f = hypot_function();
        assert!(matches!(
            f.eval_numeric(&[]),
            Err(SymbolicError::ArityMismatch { expected: 1, got: 0, .. })
        ));
        assert!(matches!(
            f.eval_numeric(&[&[1.0]]),
            Err(SymbolicError::InputSizeMismatch { expected: 2, got: 1, .. })
        ));
    }
}
