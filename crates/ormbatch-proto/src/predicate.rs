//! The accepted predicate shapes.

use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::query::{FilterCondition, FilterGroup};
use crate::value::Value;

/// A loosely-typed predicate as supplied by the caller.
///
/// Every variant is normalized into a [`FilterGroup`] before a statement
/// is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Column/value pairs that must all be equal (ANDed).
    KeyValue(Vec<(String, Value)>),
    /// A boolean expression over the members of the target type.
    Expression(Expr),
    /// A single leaf condition.
    Condition(FilterCondition),
    /// An already-built filter tree.
    Group(FilterGroup),
}

impl Predicate {
    /// Build a key/value predicate from pairs, keeping their order.
    pub fn key_values<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Predicate::KeyValue(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Short name of the shape, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Predicate::KeyValue(_) => "key-value",
            Predicate::Expression(_) => "expression",
            Predicate::Condition(_) => "condition",
            Predicate::Group(_) => "group",
        }
    }
}

impl From<Expr> for Predicate {
    fn from(expr: Expr) -> Self {
        Predicate::Expression(expr)
    }
}

impl From<FilterCondition> for Predicate {
    fn from(condition: FilterCondition) -> Self {
        Predicate::Condition(condition)
    }
}

impl From<FilterGroup> for Predicate {
    fn from(group: FilterGroup) -> Self {
        Predicate::Group(group)
    }
}
