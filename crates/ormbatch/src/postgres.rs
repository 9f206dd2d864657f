//! PostgreSQL connections backed by sqlx.
//!
//! PostgreSQL does not return several result sets from one parameterized
//! round trip, so batches built for it are sequential: each statement runs
//! on the same connection in order and produces one [`ResultSet`].

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::query::Query as SqlxQuery;
use sqlx::types::chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::types::Uuid;
use sqlx::{Column, PgConnection, Row, TypeInfo, ValueRef};
use tracing::{debug, trace};

use ormbatch_core::{AsyncConnection, AsyncConnectionProvider, AsyncTransaction, DriverError};
use ormbatch_core::{ResultSet, SqlBatch};
use ormbatch_proto::Value;

/// Opens pooled PostgreSQL connections for the engine.
#[derive(Debug, Clone)]
pub struct PgConnectionProvider {
    pool: PgPool,
}

impl PgConnectionProvider {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool to `url`.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Connect using the `DATABASE_URL` environment variable.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| sqlx::Error::Configuration("DATABASE_URL is not set".into()))?;
        Self::connect(&url).await
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a transaction the caller owns.
    pub async fn begin(&self) -> Result<PgTransaction<'static>, sqlx::Error> {
        self.pool.begin().await.map(PgTransaction)
    }
}

#[async_trait]
impl AsyncConnectionProvider for PgConnectionProvider {
    type Connection = PgPooledConnection;

    async fn open(&self) -> Result<Self::Connection, DriverError> {
        let conn = self.pool.acquire().await.map_err(DriverError::new)?;
        Ok(PgPooledConnection(conn))
    }
}

/// A connection checked out of the pool. Dropping it returns it.
pub struct PgPooledConnection(PoolConnection<Postgres>);

#[async_trait]
impl AsyncConnection for PgPooledConnection {
    async fn execute_batch(&mut self, batch: &SqlBatch) -> Result<Vec<ResultSet>, DriverError> {
        run_batch(&mut self.0, batch).await
    }
}

/// A caller-owned PostgreSQL transaction.
///
/// The engine runs batches on it but never commits, rolls back or closes
/// it.
pub struct PgTransaction<'c>(sqlx::Transaction<'c, Postgres>);

impl<'c> PgTransaction<'c> {
    /// Wrap a transaction started elsewhere.
    pub fn new(inner: sqlx::Transaction<'c, Postgres>) -> Self {
        Self(inner)
    }

    /// Raw connection, for statements the engine does not build.
    pub fn as_connection(&mut self) -> &mut PgConnection {
        &mut self.0
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.0.commit().await
    }

    pub async fn rollback(self) -> Result<(), sqlx::Error> {
        self.0.rollback().await
    }
}

#[async_trait]
impl<'c> AsyncConnection for PgTransaction<'c> {
    async fn execute_batch(&mut self, batch: &SqlBatch) -> Result<Vec<ResultSet>, DriverError> {
        run_batch(&mut self.0, batch).await
    }
}

impl<'c> AsyncTransaction for PgTransaction<'c> {
    type Connection = Self;

    fn connection(&mut self) -> &mut Self {
        self
    }
}

async fn run_batch(
    conn: &mut PgConnection,
    batch: &SqlBatch,
) -> Result<Vec<ResultSet>, DriverError> {
    let mut sets = Vec::with_capacity(batch.len());

    for (index, statement) in batch.statements().iter().enumerate() {
        trace!(index, sql = %statement.sql, "running statement");
        let query = statement
            .params
            .iter()
            .fold(sqlx::query(&statement.sql), bind);
        let rows = query.fetch_all(&mut *conn).await.map_err(DriverError::new)?;
        sets.push(result_set(&rows));
    }

    debug!(statements = sets.len(), "batch executed");
    Ok(sets)
}

fn bind<'q>(
    query: SqlxQuery<'q, Postgres, PgArguments>,
    value: &Value,
) -> SqlxQuery<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int32(i) => query.bind(*i),
        Value::Int64(i) => query.bind(*i),
        Value::Float32(f) => query.bind(*f),
        Value::Float64(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::Timestamp(micros) => query.bind(timestamp(*micros)),
        Value::Uuid(bytes) => query.bind(Uuid::from_bytes(*bytes)),
    }
}

fn timestamp(micros: i64) -> Option<DateTime<Utc>> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::from_timestamp(secs, nanos)
}

fn result_set(rows: &[PgRow]) -> ResultSet {
    let Some(first) = rows.first() else {
        return ResultSet::default();
    };

    let columns = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let rows = rows
        .iter()
        .map(|row| (0..row.len()).map(|i| decode(row, i)).collect())
        .collect();

    ResultSet { columns, rows }
}

/// Decode one column by its PostgreSQL type. Types without a [`Value`]
/// counterpart are read as text when the driver allows it, else null.
fn decode(row: &PgRow, index: usize) -> Value {
    let type_name = match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => raw.type_info().name().to_string(),
        _ => return Value::Null,
    };

    let decoded = match type_name.as_str() {
        "BOOL" => row.try_get::<bool, _>(index).map(Value::Bool),
        "INT2" => row
            .try_get::<i16, _>(index)
            .map(|v| Value::Int32(i32::from(v))),
        "INT4" => row.try_get::<i32, _>(index).map(Value::Int32),
        "INT8" => row.try_get::<i64, _>(index).map(Value::Int64),
        "FLOAT4" => row.try_get::<f32, _>(index).map(Value::Float32),
        "FLOAT8" => row.try_get::<f64, _>(index).map(Value::Float64),
        "BYTEA" => row.try_get::<Vec<u8>, _>(index).map(Value::Bytes),
        "UUID" => row
            .try_get::<Uuid, _>(index)
            .map(|u| Value::Uuid(*u.as_bytes())),
        "TIMESTAMPTZ" => row
            .try_get::<DateTime<Utc>, _>(index)
            .map(|t| Value::Timestamp(t.timestamp_micros())),
        "TIMESTAMP" => row
            .try_get::<NaiveDateTime, _>(index)
            .map(|t| Value::Timestamp(t.and_utc().timestamp_micros())),
        _ => row.try_get::<String, _>(index).map(Value::String),
    };

    decoded.unwrap_or(Value::Null)
}
