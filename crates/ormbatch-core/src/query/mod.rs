//! Predicate normalization and SQL rendering.

pub mod builder;
pub mod dialect;
pub mod normalize;

pub use builder::{SqlBatch, SqlStatement, StatementBuilder, StatementSpec};
pub use dialect::{
    BatchMode, Dialect, HintPlacement, LimitClause, MySqlDialect, PostgresDialect,
    SqlServerDialect, SqliteDialect,
};
pub use normalize::{escape_like, normalize, TargetColumns};
