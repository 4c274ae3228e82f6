//! Symbolic scalar expressions.
//!
//! Expressions are a closed tagged tree ([`Expr`]) over constants, symbols,
//! unary/binary operators and a fixed set of transcendental calls. The tree
//! supports exact structural differentiation ([`Expr::diff`]), free-symbol
//! collection, and host-side evaluation ([`Expr::eval`]) used as the
//! reference semantics when cross-checking generated kernels.
//!
//! Arithmetic operators are overloaded so models read like the equations
//! they implement:
//!
//! ```
//! use neurogen::expr::sym;
//!
//! let x = sym("x");
//! let drift = -2.0 * x.clone() + x.clone() * x;
//! let slope = drift.diff("x");
//! // -2 + 2x at x = 3
//! assert_eq!(slope.eval(&|s| (s == "x").then_some(3.0)).unwrap(), 4.0);
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{NeurogenError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Supported transcendental functions; each maps onto one libm call in
/// generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Func {
    Exp,
    Log,
    Sqrt,
    Sin,
    Cos,
    Tanh,
}

impl Func {
    /// Base name of the C math function (width suffix applied by codegen).
    pub fn cname(&self) -> &'static str {
        match self {
            Func::Exp => "exp",
            Func::Log => "log",
            Func::Sqrt => "sqrt",
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tanh => "tanh",
        }
    }
}

/// A symbolic scalar expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Const(f64),
    Sym(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

/// Shorthand for a symbol node.
pub fn sym(name: impl Into<String>) -> Expr {
    Expr::Sym(name.into())
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Const(value)
    }
}

// Constructors fold the identities that differentiation produces in bulk
// (0 + x, 1 * x, x^1, ...) so derivative trees stay readable and the
// emitted source stays compact. Folding is purely structural and
// deterministic.
fn add(a: Expr, b: Expr) -> Expr {
    match (a, b) {
        (Expr::Const(x), Expr::Const(y)) => Expr::Const(x + y),
        (Expr::Const(x), b) if x == 0.0 => b,
        (a, Expr::Const(y)) if y == 0.0 => a,
        (a, b) => Expr::Binary(BinaryOp::Add, Box::new(a), Box::new(b)),
    }
}

fn sub(a: Expr, b: Expr) -> Expr {
    match (a, b) {
        (Expr::Const(x), Expr::Const(y)) => Expr::Const(x - y),
        (a, Expr::Const(y)) if y == 0.0 => a,
        (Expr::Const(x), b) if x == 0.0 => neg(b),
        (a, b) => Expr::Binary(BinaryOp::Sub, Box::new(a), Box::new(b)),
    }
}

fn mul(a: Expr, b: Expr) -> Expr {
    match (a, b) {
        (Expr::Const(x), Expr::Const(y)) => Expr::Const(x * y),
        (Expr::Const(x), _) | (_, Expr::Const(x)) if x == 0.0 => Expr::Const(0.0),
        (Expr::Const(x), b) if x == 1.0 => b,
        (a, Expr::Const(y)) if y == 1.0 => a,
        (a, b) => Expr::Binary(BinaryOp::Mul, Box::new(a), Box::new(b)),
    }
}

fn div(a: Expr, b: Expr) -> Expr {
    match (a, b) {
        (a, Expr::Const(y)) if y == 1.0 => a,
        (Expr::Const(x), b) if x == 0.0 && b != Expr::Const(0.0) => Expr::Const(0.0),
        (a, b) => Expr::Binary(BinaryOp::Div, Box::new(a), Box::new(b)),
    }
}

fn neg(a: Expr) -> Expr {
    match a {
        Expr::Const(x) => Expr::Const(-x),
        Expr::Unary(UnaryOp::Neg, inner) => *inner,
        a => Expr::Unary(UnaryOp::Neg, Box::new(a)),
    }
}

impl Expr {
    pub fn exp(self) -> Expr {
        Expr::Call(Func::Exp, Box::new(self))
    }

    pub fn log(self) -> Expr {
        Expr::Call(Func::Log, Box::new(self))
    }

    pub fn sqrt(self) -> Expr {
        Expr::Call(Func::Sqrt, Box::new(self))
    }

    pub fn sin(self) -> Expr {
        Expr::Call(Func::Sin, Box::new(self))
    }

    pub fn cos(self) -> Expr {
        Expr::Call(Func::Cos, Box::new(self))
    }

    pub fn tanh(self) -> Expr {
        Expr::Call(Func::Tanh, Box::new(self))
    }

    pub fn pow(self, exponent: impl Into<Expr>) -> Expr {
        let exponent = exponent.into();
        match (&self, &exponent) {
            (_, Expr::Const(e)) if *e == 1.0 => self,
            (_, Expr::Const(e)) if *e == 0.0 => Expr::Const(1.0),
            _ => Expr::Binary(BinaryOp::Pow, Box::new(self), Box::new(exponent)),
        }
    }

    /// Exact analytic partial derivative with respect to `var`.
    pub fn diff(&self, var: &str) -> Expr {
        match self {
            Expr::Const(_) => Expr::Const(0.0),
            Expr::Sym(name) => {
                if name == var {
                    Expr::Const(1.0)
                } else {
                    Expr::Const(0.0)
                }
            }
            Expr::Unary(UnaryOp::Neg, a) => neg(a.diff(var)),
            Expr::Binary(op, a, b) => {
                let (da, db) = (a.diff(var), b.diff(var));
                match op {
                    BinaryOp::Add => add(da, db),
                    BinaryOp::Sub => sub(da, db),
                    BinaryOp::Mul => add(mul(da, (**b).clone()), mul((**a).clone(), db)),
                    BinaryOp::Div => div(
                        sub(mul(da, (**b).clone()), mul((**a).clone(), db)),
                        (**b).clone().pow(2.0),
                    ),
                    BinaryOp::Pow => match &**b {
                        // d/dx a^c = c * a^(c-1) * a'
                        Expr::Const(c) => mul(
                            mul(Expr::Const(*c), (**a).clone().pow(c - 1.0)),
                            da,
                        ),
                        // d/dx a^b = a^b * (b' ln a + b a'/a)
                        _ => mul(
                            (**a).clone().pow((**b).clone()),
                            add(
                                mul(db, (**a).clone().log()),
                                div(mul((**b).clone(), da), (**a).clone()),
                            ),
                        ),
                    },
                }
            }
            Expr::Call(func, a) => {
                let da = a.diff(var);
                let inner = (**a).clone();
                match func {
                    Func::Exp => mul(inner.exp(), da),
                    Func::Log => div(da, inner),
                    Func::Sqrt => div(da, mul(Expr::Const(2.0), inner.sqrt())),
                    Func::Sin => mul(inner.cos(), da),
                    Func::Cos => neg(mul(inner.sin(), da)),
                    Func::Tanh => mul(sub(Expr::Const(1.0), inner.tanh().pow(2.0)), da),
                }
            }
        }
    }

    /// Collect free symbols in `out`, sorted by name.
    pub fn symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Const(_) => {}
            Expr::Sym(name) => {
                out.insert(name.clone());
            }
            Expr::Unary(_, a) | Expr::Call(_, a) => a.symbols(out),
            Expr::Binary(_, a, b) => {
                a.symbols(out);
                b.symbols(out);
            }
        }
    }

    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.symbols(&mut out);
        out
    }

    /// Evaluate against a symbol lookup, failing on symbols the lookup
    /// does not resolve.
    pub fn eval(&self, lookup: &impl Fn(&str) -> Option<f64>) -> Result<f64> {
        match self {
            Expr::Const(v) => Ok(*v),
            Expr::Sym(name) => lookup(name)
                .ok_or_else(|| NeurogenError::undefined_symbol(name, "expression evaluation")),
            Expr::Unary(UnaryOp::Neg, a) => Ok(-a.eval(lookup)?),
            Expr::Binary(op, a, b) => {
                let (a, b) = (a.eval(lookup)?, b.eval(lookup)?);
                Ok(match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Pow => a.powf(b),
                })
            }
            Expr::Call(func, a) => {
                let a = a.eval(lookup)?;
                Ok(match func {
                    Func::Exp => a.exp(),
                    Func::Log => a.ln(),
                    Func::Sqrt => a.sqrt(),
                    Func::Sin => a.sin(),
                    Func::Cos => a.cos(),
                    Func::Tanh => a.tanh(),
                })
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(v) => write!(f, "{}", v),
            Expr::Sym(name) => write!(f, "{}", name),
            Expr::Unary(UnaryOp::Neg, a) => write!(f, "(-{})", a),
            Expr::Binary(op, a, b) => {
                let op = match op {
                    BinaryOp::Add => "+",
                    BinaryOp::Sub => "-",
                    BinaryOp::Mul => "*",
                    BinaryOp::Div => "/",
                    BinaryOp::Pow => "^",
                };
                write!(f, "({} {} {})", a, op, b)
            }
            Expr::Call(func, a) => write!(f, "{}({})", func.cname(), a),
        }
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $ctor:ident) => {
        impl std::ops::$trait for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $ctor(self, rhs)
            }
        }
        impl std::ops::$trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                $ctor(self, Expr::Const(rhs))
            }
        }
        impl std::ops::$trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $ctor(Expr::Const(self), rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, add);
impl_binary_op!(Sub, sub, sub);
impl_binary_op!(Mul, mul, mul);
impl_binary_op!(Div, div, div);

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        neg(self)
    }
}
