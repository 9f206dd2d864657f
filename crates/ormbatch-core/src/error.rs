//! Core error types.

use std::error::Error as StdError;

use ormbatch_proto::ComparisonOp;
use thiserror::Error;

/// Boxed error produced by a database driver.
///
/// Kept as an opaque wrapper so that any driver error can be carried as
/// the source of [`Error::Execution`].
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DriverError(Box<dyn StdError + Send + Sync>);

impl DriverError {
    /// Wrap a driver error.
    pub fn new(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self(err.into())
    }

    /// Create a driver error from a plain message.
    pub fn message(msg: impl Into<String>) -> Self {
        Self(msg.into().into())
    }

    /// Access the underlying driver error.
    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.0
    }

    /// Unwrap into the underlying driver error.
    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync> {
        self.0
    }
}

/// Errors raised while translating or executing a batch.
#[derive(Debug, Error)]
pub enum Error {
    /// A key/value predicate is empty or names an unknown column.
    #[error("invalid predicate for '{target}': {message}")]
    InvalidPredicate { target: String, message: String },

    /// A host expression has no filter-model equivalent.
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// The dialect cannot render a comparison operator.
    #[error("operator {op} is not supported by the {dialect} dialect")]
    UnsupportedOperator {
        op: ComparisonOp,
        dialect: &'static str,
    },

    /// A provider hint would change the statement beyond hinting it.
    #[error("invalid hint: {0}")]
    InvalidHint(String),

    /// The database failed while executing the batch.
    #[error("execution error: {0}")]
    Execution(#[source] DriverError),

    /// The caller cancelled the call before results were received.
    #[error("query cancelled")]
    Cancelled,

    /// The driver returned a different number of result sets than the
    /// batch contains statements.
    #[error("expected {expected} result set(s), driver returned {actual}")]
    ResultSetCountMismatch { expected: usize, actual: usize },

    /// A call named too few or too many targets.
    #[error("a batch takes 1 to {max} targets, got {actual}")]
    TargetCount { max: usize, actual: usize },

    /// A payload did not hold the results of the expected target type.
    #[error("payload is not a result of {0}")]
    PayloadType(&'static str),

    /// Filter model construction error.
    #[error("filter model error: {0}")]
    Protocol(#[from] ormbatch_proto::Error),

    /// Textual predicate parse error.
    #[error("predicate parse error: {0}")]
    Parse(#[from] ormbatch_lang::ParseError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub(crate) fn invalid_predicate(target: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidPredicate {
            target: target.into(),
            message: message.into(),
        }
    }
}

impl From<DriverError> for Error {
    fn from(err: DriverError) -> Self {
        Error::Execution(err)
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
