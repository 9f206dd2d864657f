//! Engine configuration.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::query::dialect::{Dialect, MySqlDialect, PostgresDialect, SqlServerDialect, SqliteDialect};

/// SQL dialect selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    Postgres,
    MySql,
    Sqlite,
    SqlServer,
}

impl DialectKind {
    /// Instantiate the dialect.
    pub fn dialect(self) -> Arc<dyn Dialect> {
        match self {
            DialectKind::Postgres => Arc::new(PostgresDialect),
            DialectKind::MySql => Arc::new(MySqlDialect),
            DialectKind::Sqlite => Arc::new(SqliteDialect),
            DialectKind::SqlServer => Arc::new(SqlServerDialect),
        }
    }
}

/// Configuration for a [`QueryEngine`](crate::QueryEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Dialect used to render statements.
    pub dialect: DialectKind,
    /// Expiration applied to cache policies that do not set one.
    #[serde(with = "duration_secs")]
    pub default_cache_expiration: Duration,
    /// Maximum number of targets in one call.
    pub max_targets: usize,
    /// Include bound parameter values in trace events.
    pub trace_parameters: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dialect: DialectKind::Postgres,
            default_cache_expiration: Duration::from_secs(300),
            max_targets: ormbatch_proto::MAX_TARGETS,
            trace_parameters: true,
        }
    }
}

impl EngineConfig {
    /// Create a configuration for the given dialect with default settings.
    pub fn new(dialect: DialectKind) -> Self {
        Self {
            dialect,
            ..Default::default()
        }
    }

    /// Set the dialect.
    pub fn with_dialect(mut self, dialect: DialectKind) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the default cache expiration.
    pub fn with_default_cache_expiration(mut self, expiration: Duration) -> Self {
        self.default_cache_expiration = expiration;
        self
    }

    /// Set the maximum number of targets per call.
    pub fn with_max_targets(mut self, max_targets: usize) -> Self {
        self.max_targets = max_targets;
        self
    }

    /// Enable or disable parameter values in trace events.
    pub fn with_trace_parameters(mut self, enabled: bool) -> Self {
        self.trace_parameters = enabled;
        self
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.dialect, DialectKind::Postgres);
        assert_eq!(config.max_targets, 7);
        assert_eq!(config.default_cache_expiration, Duration::from_secs(300));
        assert!(config.trace_parameters);
    }

    #[test]
    fn test_builder_methods() {
        let config = EngineConfig::new(DialectKind::SqlServer)
            .with_default_cache_expiration(Duration::from_secs(30))
            .with_max_targets(3)
            .with_trace_parameters(false);

        assert_eq!(config.dialect, DialectKind::SqlServer);
        assert_eq!(config.max_targets, 3);
        assert!(!config.trace_parameters);
        assert_eq!(config.dialect.dialect().name(), "sqlserver");
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"dialect":"sqlite","default_cache_expiration":60}"#).unwrap();
        assert_eq!(config.dialect, DialectKind::Sqlite);
        assert_eq!(config.default_cache_expiration, Duration::from_secs(60));
        assert_eq!(config.max_targets, 7);
    }
}
