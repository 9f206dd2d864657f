//! Shared fixtures: entities and a scripted in-memory connection.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ormbatch_core::proto::Value;
use ormbatch_core::{
    impl_entity, AsyncConnection, AsyncConnectionProvider, AsyncTransaction, CancellationToken,
    Connection, ConnectionProvider, DriverError, ResultSet, SqlBatch, Transaction,
};
use parking_lot::Mutex;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub age: i32,
}

impl_entity!(User, table = "users", { id, name, status, age });

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub total: f64,
}

impl_entity!(Order, table = "orders", { id, user_id, total });

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Product {
    pub id: i64,
    pub title: String,
}

impl_entity!(Product, table = "products", { id, title => "product_title" });

/// Database double. Answers each statement with the rows registered for
/// the table it selects from and records every batch it receives.
#[derive(Default)]
pub struct Script {
    tables: Mutex<HashMap<String, ResultSet>>,
    failures: Mutex<VecDeque<String>>,
    truncate: Mutex<Option<usize>>,
    delay: Mutex<Option<Duration>>,
    batches: Mutex<Vec<SqlBatch>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_table(self: &Arc<Self>, table: &str, set: ResultSet) -> Arc<Self> {
        self.tables.lock().insert(table.to_string(), set);
        Arc::clone(self)
    }

    /// Fail the next execution with `message`.
    pub fn fail_next(&self, message: &str) {
        self.failures.lock().push_back(message.to_string());
    }

    /// Return only the first `count` result sets.
    pub fn truncate_to(&self, count: usize) {
        *self.truncate.lock() = Some(count);
    }

    /// Make asynchronous executions take `delay`.
    pub fn delay_by(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn batches(&self) -> Vec<SqlBatch> {
        self.batches.lock().clone()
    }

    pub fn executions(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn answer(&self, batch: &SqlBatch) -> Result<Vec<ResultSet>, DriverError> {
        self.batches.lock().push(batch.clone());
        if let Some(message) = self.failures.lock().pop_front() {
            return Err(DriverError::message(message));
        }

        let tables = self.tables.lock();
        let mut sets: Vec<ResultSet> = batch
            .statements()
            .iter()
            .map(|s| {
                table_of(&s.sql)
                    .and_then(|t| tables.get(t).cloned())
                    .unwrap_or_default()
            })
            .collect();
        if let Some(count) = *self.truncate.lock() {
            sets.truncate(count);
        }
        Ok(sets)
    }
}

/// Table name of a PostgreSQL-quoted `FROM "table"` clause.
pub fn table_of(sql: &str) -> Option<&str> {
    let start = sql.find("FROM \"")? + 6;
    let len = sql[start..].find('"')?;
    Some(&sql[start..start + len])
}

pub struct MockConnection {
    script: Arc<Script>,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.script.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl Connection for MockConnection {
    fn execute_batch(
        &mut self,
        batch: &SqlBatch,
        _cancel: &CancellationToken,
    ) -> Result<Vec<ResultSet>, DriverError> {
        self.script.answer(batch)
    }
}

#[async_trait]
impl AsyncConnection for MockConnection {
    async fn execute_batch(&mut self, batch: &SqlBatch) -> Result<Vec<ResultSet>, DriverError> {
        let delay = *self.script.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.script.answer(batch)
    }
}

pub struct MockProvider {
    pub script: Arc<Script>,
}

impl MockProvider {
    pub fn new(script: &Arc<Script>) -> Self {
        Self {
            script: Arc::clone(script),
        }
    }

    fn connect(&self) -> MockConnection {
        self.script.opened.fetch_add(1, Ordering::SeqCst);
        MockConnection {
            script: Arc::clone(&self.script),
        }
    }
}

impl ConnectionProvider for MockProvider {
    type Connection = MockConnection;

    fn open(&self) -> Result<MockConnection, DriverError> {
        Ok(self.connect())
    }
}

#[async_trait]
impl AsyncConnectionProvider for MockProvider {
    type Connection = MockConnection;

    async fn open(&self) -> Result<MockConnection, DriverError> {
        Ok(self.connect())
    }
}

/// A transaction owning one connection for its whole life.
pub struct MockTransaction {
    pub connection: MockConnection,
}

impl MockTransaction {
    pub fn begin(provider: &MockProvider) -> Self {
        Self {
            connection: provider.connect(),
        }
    }
}

impl Transaction for MockTransaction {
    type Connection = MockConnection;

    fn connection(&mut self) -> &mut MockConnection {
        &mut self.connection
    }
}

impl AsyncTransaction for MockTransaction {
    type Connection = MockConnection;

    fn connection(&mut self) -> &mut MockConnection {
        &mut self.connection
    }
}

pub fn users_set() -> ResultSet {
    ResultSet::new(["id", "name", "status", "age"])
        .with_row(vec![
            Value::Int64(1),
            Value::String("Ann".into()),
            Value::String("active".into()),
            Value::Int32(34),
        ])
        .with_row(vec![
            Value::Int64(2),
            Value::String("Bob".into()),
            Value::String("active".into()),
            Value::Int32(41),
        ])
}

pub fn orders_set() -> ResultSet {
    ResultSet::new(["id", "user_id", "total"]).with_row(vec![
        Value::Int64(10),
        Value::Int64(1),
        Value::Float64(99.5),
    ])
}
