//! Filter model error types.

use thiserror::Error;

use crate::query::ComparisonOp;

/// Errors raised while constructing filter model values.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    /// Operand count does not match what the operator requires.
    #[error("operator {op} on '{field}' expects {expected} operand(s), got {actual}")]
    InvalidCondition {
        field: String,
        op: ComparisonOp,
        expected: &'static str,
        actual: usize,
    },

    /// An AND/OR node was built without children.
    #[error("{0} group must have at least one child")]
    EmptyGroup(&'static str),
}
