//! Connection and transaction collaborators.
//!
//! The engine never constructs connections itself: it either opens one
//! through a provider, or borrows the connection of a caller-owned
//! transaction.

use async_trait::async_trait;
use ormbatch_proto::Value;

use super::cancel::CancellationToken;
use crate::error::DriverError;
use crate::query::SqlBatch;

/// Rows returned by one statement of a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names in row order.
    pub columns: Vec<String>,
    /// Raw rows, each as wide as `columns`.
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Create an empty result set with the given columns.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row.
    pub fn with_row(mut self, row: Vec<Value>) -> Self {
        self.rows.push(row);
        self
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A blocking database connection.
pub trait Connection: Send {
    /// Execute every statement of `batch` and return one result set per
    /// statement, in statement order.
    ///
    /// Drivers that can abort an in-flight round trip should watch `cancel`.
    fn execute_batch(
        &mut self,
        batch: &SqlBatch,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResultSet>, DriverError>;
}

/// Source of new blocking connections.
pub trait ConnectionProvider: Send + Sync {
    type Connection: Connection;

    /// Open a connection. The engine drops it when the call completes.
    fn open(&self) -> Result<Self::Connection, DriverError>;
}

/// A caller-owned transaction.
pub trait Transaction {
    type Connection: Connection;

    /// The connection the transaction runs on.
    fn connection(&mut self) -> &mut Self::Connection;
}

/// A non-blocking database connection.
#[async_trait]
pub trait AsyncConnection: Send {
    /// Execute every statement of `batch` and return one result set per
    /// statement, in statement order.
    async fn execute_batch(&mut self, batch: &SqlBatch) -> Result<Vec<ResultSet>, DriverError>;
}

/// Source of new non-blocking connections.
#[async_trait]
pub trait AsyncConnectionProvider: Send + Sync {
    type Connection: AsyncConnection;

    /// Open a connection. The engine drops it when the call completes.
    async fn open(&self) -> Result<Self::Connection, DriverError>;
}

/// A caller-owned transaction over a non-blocking connection.
pub trait AsyncTransaction: Send {
    type Connection: AsyncConnection;

    /// The connection the transaction runs on.
    fn connection(&mut self) -> &mut Self::Connection;
}
