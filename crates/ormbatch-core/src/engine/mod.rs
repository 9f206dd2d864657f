//! Batched execution: typed targets, collaborators and the engine.

pub mod cancel;
pub mod connection;
pub mod executor;
pub mod target;
pub mod trace;

pub use cancel::CancellationToken;
pub use connection::{
    AsyncConnection, AsyncConnectionProvider, AsyncTransaction, Connection, ConnectionProvider,
    ResultSet, Transaction,
};
pub use executor::QueryEngine;
pub use target::{Query, QuerySet, Target};
pub use trace::{
    NoopTracer, QueryTracer, RecordingTracer, TraceEvent, TraceOutcome, TraceRecord, TracingTracer,
};
