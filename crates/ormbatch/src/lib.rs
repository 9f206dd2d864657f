//! ormbatch - several typed queries, one round trip.
//!
//! ormbatch turns up to seven typed queries into a single batched SQL
//! command, executes it once, and materializes each result set into its
//! own entity type. Results can be cached per query, so a call only sends
//! the queries whose results are not already cached.
//!
//! # Crate organization
//!
//! - [`proto`] - Filter model, host expressions and query descriptors
//! - [`lang`] - Text front end for predicate expressions
//! - [`core`] - Normalization, statement building, caches and the engine
//! - [`postgres`] - sqlx-backed PostgreSQL connections (`postgres` feature)
//!
//! # Example
//!
//! ```
//! use ormbatch::{col, impl_entity, DialectKind, EngineConfig, Query, QueryEngine};
//!
//! #[derive(Debug, Clone, Default)]
//! struct Order {
//!     id: i64,
//!     user_id: i64,
//!     total: f64,
//! }
//!
//! impl_entity!(Order, table = "orders", { id, user_id, total });
//!
//! let engine = QueryEngine::new(EngineConfig::new(DialectKind::SqlServer));
//! let large = Query::<Order>::new().filter(col("total").ge(100.0)).limit(5);
//!
//! let batch = engine.render(&(large,)).unwrap().unwrap();
//! assert_eq!(
//!     batch.text(),
//!     "SELECT TOP (5) * FROM [orders] WHERE [total] >= @p1"
//! );
//! ```

/// Re-export of the protocol crate.
pub use ormbatch_proto as proto;

/// Re-export of the predicate language crate.
pub use ormbatch_lang as lang;

/// Re-export of the core crate.
pub use ormbatch_core as core;

#[cfg(feature = "postgres")]
pub mod postgres;

// Commonly used types at crate root
pub use ormbatch_core::{
    impl_entity, AsyncConnection, AsyncConnectionProvider, AsyncTransaction, CacheProvider,
    CancellationToken, Connection, ConnectionProvider, DialectKind, DriverError, EngineConfig,
    Entity, Error, MemoryCacheProvider, Query, QueryEngine, QuerySet, QueryTracer, RecordingTracer,
    Result, ResultCache, ResultSet, SqlBatch, Transaction, TracingTracer,
};
pub use ormbatch_proto::{
    col, lit, CachePolicy, ComparisonOp, Expr, FilterCondition, FilterGroup, OrderField,
    Predicate, QueryDescriptor, Value,
};

#[cfg(feature = "postgres")]
pub use postgres::{PgConnectionProvider, PgPooledConnection, PgTransaction};

/// Parse a textual predicate such as `age > 30 && status == "active"`.
pub fn parse_predicate(source: &str) -> Result<Predicate> {
    let expr = ormbatch_lang::parse(source)?;
    Ok(Predicate::Expression(expr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_predicate() {
        let predicate = parse_predicate("age >= 18 and name like 'A%'").unwrap();
        assert_eq!(
            predicate,
            Predicate::Expression(col("age").ge(18).and(col("name").like("A%")))
        );
    }

    #[test]
    fn test_parse_predicate_error() {
        let err = parse_predicate("age = 18").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
