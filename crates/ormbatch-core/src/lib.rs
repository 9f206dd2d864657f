//! ormbatch core - predicate normalization, batched SQL building,
//! materialization and result caching.
//!
//! A call names one to seven typed queries. Their predicates are
//! normalized into filter trees, queries with a live cached result are
//! served from the [`ResultCache`], and the rest are rendered into a single
//! [`SqlBatch`] executed in one round trip. Each returned result set is
//! materialized into its target type with a compiled [`Materializer`]
//! shared through the [`MaterializerCache`].
//!
//! ```
//! use ormbatch_core::proto::col;
//! use ormbatch_core::{impl_entity, EngineConfig, DialectKind, Query, QueryEngine};
//!
//! #[derive(Debug, Clone, Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//!     age: i32,
//! }
//!
//! impl_entity!(User, table = "users", { id, name, age });
//!
//! let engine = QueryEngine::new(EngineConfig::new(DialectKind::Postgres));
//! let query = Query::<User>::new().filter(col("age").gt(30).and(col("age").lt(50)));
//!
//! let batch = engine.render(&(query,)).unwrap().unwrap();
//! assert_eq!(
//!     batch.text(),
//!     r#"SELECT * FROM "users" WHERE ("age" > $1 AND "age" < $2)"#
//! );
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod query;

pub use cache::{
    fingerprint, CacheEntry, CachePayload, CacheProvider, CacheStats, Materializer,
    MaterializerCache, MemoryCacheProvider, ResultCache,
};
pub use config::{DialectKind, EngineConfig};
pub use engine::{
    AsyncConnection, AsyncConnectionProvider, AsyncTransaction, CancellationToken, Connection,
    ConnectionProvider, NoopTracer, Query, QueryEngine, QuerySet, QueryTracer, RecordingTracer,
    ResultSet, Target, TraceEvent, TraceOutcome, TraceRecord, TracingTracer, Transaction,
};
pub use entity::{Assign, Entity, Member};
pub use error::{DriverError, Error, Result};
pub use query::{
    normalize, BatchMode, Dialect, MySqlDialect, PostgresDialect, SqlBatch, SqlServerDialect,
    SqlStatement, SqliteDialect, StatementBuilder, StatementSpec, TargetColumns,
};

/// Re-export protocol types.
pub use ormbatch_proto as proto;
