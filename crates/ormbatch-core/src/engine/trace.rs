//! Trace collaborator.
//!
//! Tracers observe each executed batch before and after the round trip.
//! They receive copies and cannot influence execution.

use std::collections::VecDeque;
use std::time::Duration;

use ormbatch_proto::Value;
use parking_lot::RwLock;
use tracing::{debug, warn};

/// A batch about to be executed.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    /// Identifier pairing the before and after hooks.
    pub batch_id: u64,
    /// Dialect name.
    pub dialect: &'static str,
    /// Command text of the batch.
    pub sql: String,
    /// Number of statements.
    pub statements: usize,
    /// Bound values, empty when parameter tracing is disabled.
    pub parameters: Vec<Value>,
}

/// How an execution ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceOutcome {
    /// The driver returned this many result sets.
    Completed { result_sets: usize },
    /// The driver failed.
    Failed(String),
    /// The caller cancelled.
    Cancelled,
}

/// Observer of executed batches.
pub trait QueryTracer: Send + Sync {
    /// Called right before the batch is sent.
    fn before_execute(&self, _event: &TraceEvent) {}

    /// Called once the round trip ended.
    fn after_execute(&self, _event: &TraceEvent, _elapsed: Duration, _outcome: &TraceOutcome) {}
}

/// Tracer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl QueryTracer for NoopTracer {}

/// Tracer that reports through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracer;

impl QueryTracer for TracingTracer {
    fn before_execute(&self, event: &TraceEvent) {
        debug!(
            batch_id = event.batch_id,
            dialect = event.dialect,
            statements = event.statements,
            sql = %event.sql,
            parameters = ?event.parameters,
            "executing batch"
        );
    }

    fn after_execute(&self, event: &TraceEvent, elapsed: Duration, outcome: &TraceOutcome) {
        let elapsed_us = elapsed.as_micros() as u64;
        match outcome {
            TraceOutcome::Completed { result_sets } => debug!(
                batch_id = event.batch_id,
                result_sets,
                elapsed_us,
                "batch completed"
            ),
            TraceOutcome::Failed(error) => warn!(
                batch_id = event.batch_id,
                elapsed_us,
                error = %error,
                "batch failed"
            ),
            TraceOutcome::Cancelled => debug!(
                batch_id = event.batch_id,
                elapsed_us,
                "batch cancelled"
            ),
        }
    }
}

/// One observed execution.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRecord {
    pub event: TraceEvent,
    /// Set once the execution ended.
    pub elapsed: Option<Duration>,
    /// Set once the execution ended.
    pub outcome: Option<TraceOutcome>,
}

/// Tracer keeping the most recent executions in memory.
#[derive(Debug)]
pub struct RecordingTracer {
    capacity: usize,
    records: RwLock<VecDeque<TraceRecord>>,
}

impl RecordingTracer {
    /// Keep at most `capacity` records; the oldest are dropped first.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: RwLock::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Snapshot of the records, oldest first.
    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.read().iter().cloned().collect()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no record is held.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Drop all records.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl Default for RecordingTracer {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl QueryTracer for RecordingTracer {
    fn before_execute(&self, event: &TraceEvent) {
        let mut records = self.records.write();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(TraceRecord {
            event: event.clone(),
            elapsed: None,
            outcome: None,
        });
    }

    fn after_execute(&self, event: &TraceEvent, elapsed: Duration, outcome: &TraceOutcome) {
        let mut records = self.records.write();
        if let Some(record) = records
            .iter_mut()
            .rev()
            .find(|r| r.event.batch_id == event.batch_id)
        {
            record.elapsed = Some(elapsed);
            record.outcome = Some(outcome.clone());
        }
    }
}
