//! Host expression AST.
//!
//! An [`Expr`] is a boolean expression written against the members of a
//! target type, either built in code with [`col`] and the combinator
//! methods, or parsed from text by `ormbatch-lang`. It is deliberately more
//! permissive than the filter model: it can express method calls and
//! column-to-column comparisons, which the normalizer then rejects.

use std::ops::Not;

use serde::{Deserialize, Serialize};

use crate::query::ComparisonOp;
use crate::value::Value;

/// Binary comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl From<CompareOp> for ComparisonOp {
    fn from(op: CompareOp) -> Self {
        match op {
            CompareOp::Eq => ComparisonOp::Eq,
            CompareOp::Ne => ComparisonOp::Ne,
            CompareOp::Lt => ComparisonOp::Lt,
            CompareOp::Le => ComparisonOp::Le,
            CompareOp::Gt => ComparisonOp::Gt,
            CompareOp::Ge => ComparisonOp::Ge,
        }
    }
}

/// A boolean expression over the members of a target type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Reference to a member of the target type.
    Column(String),
    /// A constant.
    Literal(Value),
    /// A list of expressions (right-hand side of containment checks).
    List(Vec<Expr>),
    /// Binary comparison.
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Logical conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Logical disjunction.
    Or(Box<Expr>, Box<Expr>),
    /// Logical negation.
    Not(Box<Expr>),
    /// Null check.
    IsNull(Box<Expr>),
    /// Non-null check.
    IsNotNull(Box<Expr>),
    /// Method call on a receiver, e.g. `name.starts_with("A")`.
    Call {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
}

/// Reference a member of the target type.
pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column(name.into())
}

/// A constant expression.
pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

impl Expr {
    fn compare(self, op: CompareOp, rhs: impl Into<Expr>) -> Expr {
        Expr::Compare {
            op,
            lhs: Box::new(self),
            rhs: Box::new(rhs.into()),
        }
    }

    /// `self == rhs`
    pub fn eq(self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Eq, rhs)
    }

    /// `self != rhs`
    pub fn ne(self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Ne, rhs)
    }

    /// `self < rhs`
    pub fn lt(self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Lt, rhs)
    }

    /// `self <= rhs`
    pub fn le(self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Le, rhs)
    }

    /// `self > rhs`
    pub fn gt(self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Gt, rhs)
    }

    /// `self >= rhs`
    pub fn ge(self, rhs: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Ge, rhs)
    }

    /// `self && rhs`
    pub fn and(self, rhs: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(rhs))
    }

    /// `self || rhs`
    pub fn or(self, rhs: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(rhs))
    }

    /// `self is null`
    pub fn is_null(self) -> Expr {
        Expr::IsNull(Box::new(self))
    }

    /// `self is not null`
    pub fn is_not_null(self) -> Expr {
        Expr::IsNotNull(Box::new(self))
    }

    /// A method call with `self` as receiver.
    pub fn call(self, method: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call {
            receiver: Box::new(self),
            method: method.into(),
            args,
        }
    }

    /// `self.like(pattern)`
    pub fn like(self, pattern: impl Into<String>) -> Expr {
        self.call("like", vec![lit(pattern.into())])
    }

    /// `self.contains(text)` for a string member.
    pub fn contains(self, needle: impl Into<Expr>) -> Expr {
        self.call("contains", vec![needle.into()])
    }

    /// `self.starts_with(prefix)`
    pub fn starts_with(self, prefix: impl Into<String>) -> Expr {
        self.call("starts_with", vec![lit(prefix.into())])
    }

    /// `self.ends_with(suffix)`
    pub fn ends_with(self, suffix: impl Into<String>) -> Expr {
        self.call("ends_with", vec![lit(suffix.into())])
    }

    /// `self.is_in([values])`
    pub fn is_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> Expr {
        let list = Expr::List(values.into_iter().map(lit).collect());
        self.call("is_in", vec![list])
    }

    /// `self.between(low, high)`
    pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> Expr {
        self.call("between", vec![lit(low), lit(high)])
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Literal(value)
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        lit(value)
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        lit(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        lit(value)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        lit(value)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        lit(value)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        lit(value)
    }
}
