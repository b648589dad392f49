//! Scalar symbolic expressions
//!
//! An [`Expr`] is an immutable expression tree whose nodes are shared through
//! reference counting. Cloning an expression is cheap and two clones refer to
//! the same node, which is what lets [`Function`](super::Function) evaluate a
//! shared subexpression once per call.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(0);

/// A named free variable with a process-unique identity
///
/// Two symbols created with the same name are still different symbols.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol {
    id: u64,
    name: Arc<str>,
}

impl Symbol {
    fn fresh(name: &str) -> Self {
        Self {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Abs,
    Asin,
    Acos,
    Atan,
}

impl UnaryOp {
    pub fn apply(self, a: f64) -> f64 {
        match self {
            UnaryOp::Neg => -a,
            UnaryOp::Sqrt => a.sqrt(),
            UnaryOp::Sin => a.sin(),
            UnaryOp::Cos => a.cos(),
            UnaryOp::Tan => a.tan(),
            UnaryOp::Exp => a.exp(),
            UnaryOp::Ln => a.ln(),
            UnaryOp::Abs => a.abs(),
            UnaryOp::Asin => a.asin(),
            UnaryOp::Acos => a.acos(),
            UnaryOp::Atan => a.atan(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Exp => "exp",
            UnaryOp::Ln => "ln",
            UnaryOp::Abs => "abs",
            UnaryOp::Asin => "asin",
            UnaryOp::Acos => "acos",
            UnaryOp::Atan => "atan",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Atan2,
}

impl BinaryOp {
    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            BinaryOp::Pow => a.powf(b),
            BinaryOp::Atan2 => a.atan2(b),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Node {
    Constant(f64),
    Symbol(Symbol),
    Unary(UnaryOp, Expr),
    Binary(BinaryOp, Expr, Expr),
}

/// Shared scalar expression
#[derive(Clone)]
pub struct Expr(Arc<Node>);

impl Expr {
    fn from_node(node: Node) -> Self {
        Self(Arc::new(node))
    }

    pub(crate) fn node(&self) -> &Node {
        &self.0
    }

    /// Identity of the underlying node, used to memoize evaluation
    pub(crate) fn node_id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn constant(value: f64) -> Self {
        Self::from_node(Node::Constant(value))
    }

    pub fn zero() -> Self {
        Self::constant(0.0)
    }

    /// Fresh symbol with the given display name
    pub fn symbol(name: &str) -> Self {
        Self::from_node(Node::Symbol(Symbol::fresh(name)))
    }

    /// `n` fresh symbols named `prefix_0 .. prefix_{n-1}`
    pub fn symbols(prefix: &str, n: usize) -> Vec<Self> {
        (0..n)
            .map(|i| Self::symbol(&format!("{prefix}_{i}")))
            .collect()
    }

    pub fn as_constant(&self) -> Option<f64> {
        match self.node() {
            Node::Constant(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.as_constant().is_some()
    }

    /// The symbol if this expression is a bare symbol
    pub fn symbol_ref(&self) -> Option<&Symbol> {
        match self.node() {
            Node::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Every symbol this expression depends on
    pub fn free_symbols(&self) -> BTreeSet<Symbol> {
        let mut found = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut stack = vec![self.clone()];
        while let Some(expr) = stack.pop() {
            if !visited.insert(expr.node_id()) {
                continue;
            }
            match expr.node() {
                Node::Constant(_) => {}
                Node::Symbol(s) => {
                    found.insert(s.clone());
                }
                Node::Unary(_, a) => stack.push(a.clone()),
                Node::Binary(_, a, b) => {
                    stack.push(a.clone());
                    stack.push(b.clone());
                }
            }
        }
        found
    }

    /// Whether any of the symbol ids in `ids` appears in this expression
    pub fn depends_on(&self, ids: &HashSet<u64>) -> bool {
        self.free_symbols().iter().any(|s| ids.contains(&s.id()))
    }

    pub(crate) fn unary(op: UnaryOp, a: Expr) -> Self {
        if let Some(v) = a.as_constant() {
            return Self::constant(op.apply(v));
        }
        Self::from_node(Node::Unary(op, a))
    }

    pub(crate) fn binary(op: BinaryOp, a: Expr, b: Expr) -> Self {
        match (op, a.as_constant(), b.as_constant()) {
            (_, Some(x), Some(y)) => Self::constant(op.apply(x, y)),
            (BinaryOp::Add, Some(x), None) if x == 0.0 => b,
            (BinaryOp::Add | BinaryOp::Sub, None, Some(y)) if y == 0.0 => a,
            (BinaryOp::Sub, Some(x), None) if x == 0.0 => Self::unary(UnaryOp::Neg, b),
            (BinaryOp::Mul, Some(x), None) if x == 1.0 => b,
            (BinaryOp::Mul | BinaryOp::Div, None, Some(y)) if y == 1.0 => a,
            (BinaryOp::Mul, Some(x), None) if x == 0.0 => Self::zero(),
            (BinaryOp::Mul, None, Some(y)) if y == 0.0 => Self::zero(),
            (BinaryOp::Pow, None, Some(y)) if y == 1.0 => a,
            _ => Self::from_node(Node::Binary(op, a, b)),
        }
    }

    pub fn sqrt(&self) -> Self {
        Self::unary(UnaryOp::Sqrt, self.clone())
    }

    pub fn sin(&self) -> Self {
        Self::unary(UnaryOp::Sin, self.clone())
    }

    pub fn cos(&self) -> Self {
        Self::unary(UnaryOp::Cos, self.clone())
    }

    pub fn tan(&self) -> Self {
        Self::unary(UnaryOp::Tan, self.clone())
    }

    pub fn exp(&self) -> Self {
        Self::unary(UnaryOp::Exp, self.clone())
    }

    pub fn ln(&self) -> Self {
        Self::unary(UnaryOp::Ln, self.clone())
    }

    pub fn abs(&self) -> Self {
        Self::unary(UnaryOp::Abs, self.clone())
    }

    pub fn asin(&self) -> Self {
        Self::unary(UnaryOp::Asin, self.clone())
    }

    pub fn acos(&self) -> Self {
        Self::unary(UnaryOp::Acos, self.clone())
    }

    pub fn atan(&self) -> Self {
        Self::unary(UnaryOp::Atan, self.clone())
    }

    pub fn atan2(&self, x: &Expr) -> Self {
        Self::binary(BinaryOp::Atan2, self.clone(), x.clone())
    }

    pub fn powf(&self, exponent: f64) -> Self {
        Self::binary(BinaryOp::Pow, self.clone(), Self::constant(exponent))
    }

    pub fn squared(&self) -> Self {
        self * self
    }

    /// Sum of a sequence of expressions, zero when empty
    pub fn sum<I: IntoIterator<Item = Expr>>(terms: I) -> Self {
        terms.into_iter().fold(Self::zero(), |acc, t| acc + t)
    }

    /// Dot product of two equally long expression slices
    pub fn dot(a: &[Expr], b: &[Expr]) -> Self {
        Self::sum(a.iter().zip(b).map(|(x, y)| x * y))
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            Node::Constant(v) => write!(f, "{v}"),
            Node::Symbol(s) => write!(f, "{s}"),
            Node::Unary(UnaryOp::Neg, a) => write!(f, "(-{a})"),
            Node::Unary(op, a) => write!(f, "{}({a})", op.label()),
            Node::Binary(BinaryOp::Add, a, b) => write!(f, "({a} + {b})"),
            Node::Binary(BinaryOp::Sub, a, b) => write!(f, "({a} - {b})"),
            Node::Binary(BinaryOp::Mul, a, b) => write!(f, "({a} * {b})"),
            Node::Binary(BinaryOp::Div, a, b) => write!(f, "({a} / {b})"),
            Node::Binary(BinaryOp::Pow, a, b) => write!(f, "pow({a}, {b})"),
            Node::Binary(BinaryOp::Atan2, a, b) => write!(f, "atan2({a}, {b})"),
        }
    }
}

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, self, rhs)
            }
        }

        impl $trait<&Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::binary($op, self, rhs.clone())
            }
        }

        impl $trait<Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, self.clone(), rhs)
            }
        }

        impl $trait<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::binary($op, self.clone(), rhs.clone())
            }
        }

        impl $trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                Expr::binary($op, self, Expr::constant(rhs))
            }
        }

        impl $trait<f64> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                Expr::binary($op, self.clone(), Expr::constant(rhs))
            }
        }

        impl $trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::binary($op, Expr::constant(self), rhs)
            }
        }

        impl $trait<&Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::binary($op, Expr::constant(self), rhs.clone())
            }
        }
    };
}

impl_binary_operator!(Add, add, BinaryOp::Add);
impl_binary_operator!(Sub, sub, BinaryOp::Sub);
impl_binary_operator!(Mul, mul, BinaryOp::Mul);
impl_binary_operator!(Div, div, BinaryOp::Div);

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self)
    }
}

impl Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_folding() {
        let e = Expr::constant(2.0) * Expr::constant(3.0) + 1.0;
        assert_eq!(e.as_constant(), Some(7.0));
    }

    #[test]
    fn test_identities_keep_shared_node() {
        let x = Expr::symbol("x");
        let y = &x * 1.0 + 0.0;
        assert_eq!(y.node_id(), x.node_id());
        assert_eq!((&x * 0.0).as_constant(), Some(0.0));
    }

    #[test]
    fn test_symbols_are_unique() {
        let a = Expr::symbol("a");
        let b = Expr::symbol("a");
        assert_ne!(a.symbol_ref(), b.symbol_ref());

        let batch = Expr::symbols("v", 3);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[2].symbol_ref().map(Symbol::name), Some("v_2"));
    }

    #[test]
    fn test_free_symbols() {
        let x = Expr::symbol("x");
        let y = Expr::symbol("y");
        let e = (&x * &y).sin() + &x;
        let free = e.free_symbols();
        assert_eq!(free.len(), 2);

        let only_y: HashSet<u64> = y.symbol_ref().map(Symbol::id).into_iter().collect();
        assert!(e.depends_on(&only_y));
        assert!(!x.depends_on(&only_y));
    }

    #[test]
    fn test_display() {
        let x = Expr::symbol("x");
        assert_eq!(format!("{}", (&x + 2.0).sqrt()), "sqrt((x + 2))");
    }
}
