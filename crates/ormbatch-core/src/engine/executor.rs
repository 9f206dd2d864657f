//! The execution engine.
//!
//! One call normalizes every predicate, serves what it can from the result
//! cache, builds a single batch for the rest, executes it in one round trip
//! and interleaves fresh and cached results back into query order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ormbatch_proto::{CacheKey, FilterGroup};
use tracing::{debug, instrument};

use super::cancel::CancellationToken;
use super::connection::{
    AsyncConnection, AsyncConnectionProvider, AsyncTransaction, Connection, ConnectionProvider,
    ResultSet, Transaction,
};
use super::target::{QuerySet, Target};
use super::trace::{QueryTracer, TraceEvent, TraceOutcome, TracingTracer};
use crate::cache::{fingerprint, CachePayload, MaterializerCache, ResultCache};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::query::{normalize, Dialect, SqlBatch, StatementBuilder, StatementSpec};

/// A query that missed the result cache.
#[derive(Debug)]
struct Pending {
    position: usize,
    cache: Option<(String, Duration)>,
}

/// Everything decided before the round trip.
struct Plan<'q> {
    targets: Vec<&'q dyn Target>,
    slots: Vec<Option<CachePayload>>,
    pending: Vec<Pending>,
    batch: Option<SqlBatch>,
}

/// Batched query execution over shared caches.
pub struct QueryEngine {
    config: EngineConfig,
    dialect: Arc<dyn Dialect>,
    materializers: Arc<MaterializerCache>,
    results: Arc<ResultCache>,
    tracer: Arc<dyn QueryTracer>,
    next_batch_id: AtomicU64,
}

impl QueryEngine {
    /// Create an engine with fresh caches and the `tracing` tracer.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            dialect: config.dialect.dialect(),
            config,
            materializers: Arc::new(MaterializerCache::new()),
            results: Arc::new(ResultCache::in_memory()),
            tracer: Arc::new(TracingTracer),
            next_batch_id: AtomicU64::new(1),
        }
    }

    /// Share a materializer cache.
    pub fn with_materializers(mut self, materializers: Arc<MaterializerCache>) -> Self {
        self.materializers = materializers;
        self
    }

    /// Share a result cache.
    pub fn with_result_cache(mut self, results: Arc<ResultCache>) -> Self {
        self.results = results;
        self
    }

    /// Replace the tracer.
    pub fn with_tracer(mut self, tracer: Arc<dyn QueryTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Replace the dialect chosen by the configuration.
    pub fn with_dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.dialect = dialect;
        self
    }

    /// Configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Active dialect.
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Materializer cache.
    pub fn materializers(&self) -> &Arc<MaterializerCache> {
        &self.materializers
    }

    /// Result cache.
    pub fn result_cache(&self) -> &Arc<ResultCache> {
        &self.results
    }

    /// Drop one cached result.
    pub fn invalidate(&self, key: &str) -> bool {
        self.results.invalidate(key)
    }

    /// The batch a call would execute, without executing it.
    ///
    /// `None` when every query would be served from the result cache.
    pub fn render<Q: QuerySet>(&self, queries: &Q) -> Result<Option<SqlBatch>> {
        Ok(self.prepare(queries.targets())?.batch)
    }

    /// Run the queries on a new connection from `provider`.
    ///
    /// No connection is opened when every query is a cache hit.
    pub fn query_multiple<Q, P>(&self, provider: &P, queries: &Q) -> Result<Q::Output>
    where
        Q: QuerySet,
        P: ConnectionProvider,
    {
        self.query_multiple_cancellable(provider, queries, &CancellationToken::new())
    }

    /// [`query_multiple`](Self::query_multiple) with a cancellation signal.
    #[instrument(skip_all, fields(dialect = self.dialect.name()))]
    pub fn query_multiple_cancellable<Q, P>(
        &self,
        provider: &P,
        queries: &Q,
        cancel: &CancellationToken,
    ) -> Result<Q::Output>
    where
        Q: QuerySet,
        P: ConnectionProvider,
    {
        let plan = self.prepare(queries.targets())?;
        let sets = match &plan.batch {
            None => Vec::new(),
            Some(batch) => {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let mut connection = provider.open()?;
                self.execute(&mut connection, batch, cancel)?
            }
        };
        self.finish::<Q>(plan, sets)
    }

    /// Run the queries on the connection of a caller-owned transaction.
    ///
    /// The connection is borrowed and stays open.
    #[instrument(skip_all, fields(dialect = self.dialect.name()))]
    pub fn query_in_transaction<Q, T>(
        &self,
        transaction: &mut T,
        queries: &Q,
        cancel: &CancellationToken,
    ) -> Result<Q::Output>
    where
        Q: QuerySet,
        T: Transaction,
    {
        let plan = self.prepare(queries.targets())?;
        let sets = match &plan.batch {
            None => Vec::new(),
            Some(batch) => self.execute(transaction.connection(), batch, cancel)?,
        };
        self.finish::<Q>(plan, sets)
    }

    /// Asynchronous [`query_multiple_cancellable`](Self::query_multiple_cancellable).
    ///
    /// Only the round trip yields; it is abandoned as soon as `cancel` fires.
    #[instrument(skip_all, fields(dialect = self.dialect.name()))]
    pub async fn query_multiple_async<Q, P>(
        &self,
        provider: &P,
        queries: &Q,
        cancel: &CancellationToken,
    ) -> Result<Q::Output>
    where
        Q: QuerySet,
        P: AsyncConnectionProvider,
    {
        let plan = self.prepare(queries.targets())?;
        let sets = match &plan.batch {
            None => Vec::new(),
            Some(batch) => {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let mut connection = provider.open().await?;
                self.execute_async(&mut connection, batch, cancel).await?
            }
        };
        self.finish::<Q>(plan, sets)
    }

    /// Asynchronous [`query_in_transaction`](Self::query_in_transaction).
    #[instrument(skip_all, fields(dialect = self.dialect.name()))]
    pub async fn query_in_transaction_async<Q, T>(
        &self,
        transaction: &mut T,
        queries: &Q,
        cancel: &CancellationToken,
    ) -> Result<Q::Output>
    where
        Q: QuerySet,
        T: AsyncTransaction,
    {
        let plan = self.prepare(queries.targets())?;
        let sets = match &plan.batch {
            None => Vec::new(),
            Some(batch) => {
                self.execute_async(transaction.connection(), batch, cancel)
                    .await?
            }
        };
        self.finish::<Q>(plan, sets)
    }

    /// Normalize, consult the result cache and build the batch for misses.
    /// Performs no I/O.
    fn prepare<'q>(&self, targets: Vec<&'q dyn Target>) -> Result<Plan<'q>> {
        let count = targets.len();
        if count == 0 || count > self.config.max_targets {
            return Err(Error::TargetCount {
                max: self.config.max_targets,
                actual: count,
            });
        }

        let filters = targets
            .iter()
            .map(|target| {
                target
                    .descriptor()
                    .predicate
                    .as_ref()
                    .map(|predicate| normalize(predicate, &target.columns()))
                    .transpose()
            })
            .collect::<Result<Vec<Option<FilterGroup>>>>()?;

        let mut slots: Vec<Option<CachePayload>> = vec![None; count];
        let mut pending = Vec::new();
        for (position, (target, filter)) in targets.iter().zip(&filters).enumerate() {
            let cache = self.cache_entry(*target, filter.as_ref())?;
            if let Some((key, _)) = &cache {
                if let Some(hit) = target.cached(&self.results, key) {
                    slots[position] = Some(hit);
                    continue;
                }
            }
            pending.push(Pending { position, cache });
        }

        debug!(
            targets = count,
            cache_hits = count - pending.len(),
            "prepared batch"
        );

        let batch = if pending.is_empty() {
            None
        } else {
            let specs: Vec<StatementSpec<'_>> = pending
                .iter()
                .map(|p| {
                    StatementSpec::new(targets[p.position].descriptor(), filters[p.position].as_ref())
                })
                .collect();
            Some(StatementBuilder::new(self.dialect.as_ref()).build(&specs)?)
        };

        Ok(Plan {
            targets,
            slots,
            pending,
            batch,
        })
    }

    fn cache_entry(
        &self,
        target: &dyn Target,
        filter: Option<&FilterGroup>,
    ) -> Result<Option<(String, Duration)>> {
        let Some(policy) = &target.descriptor().cache else {
            return Ok(None);
        };
        let key = match &policy.key {
            CacheKey::Explicit(key) => key.clone(),
            CacheKey::Fingerprint => fingerprint(target.type_path(), target.descriptor(), filter)?,
        };
        let expiration = policy
            .expiration
            .unwrap_or(self.config.default_cache_expiration);
        Ok(Some((key, expiration)))
    }

    /// Materialize fresh result sets, populate the cache and restore order.
    fn finish<Q: QuerySet>(&self, plan: Plan<'_>, sets: Vec<ResultSet>) -> Result<Q::Output> {
        let Plan {
            targets,
            mut slots,
            pending,
            ..
        } = plan;

        if sets.len() != pending.len() {
            return Err(Error::ResultSetCountMismatch {
                expected: pending.len(),
                actual: sets.len(),
            });
        }

        for (miss, set) in pending.iter().zip(&sets) {
            let payload = targets[miss.position].materialize(&self.materializers, set);
            if let Some((key, expiration)) = &miss.cache {
                self.results.set(key, Arc::clone(&payload), *expiration);
            }
            slots[miss.position] = Some(payload);
        }

        let payloads = slots
            .into_iter()
            .zip(&targets)
            .map(|(slot, target)| slot.ok_or(Error::PayloadType(target.type_name())))
            .collect::<Result<Vec<_>>>()?;
        Q::assemble(payloads)
    }

    fn execute<C: Connection + ?Sized>(
        &self,
        connection: &mut C,
        batch: &SqlBatch,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResultSet>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let event = self.trace_event(batch);
        self.tracer.before_execute(&event);
        let started = Instant::now();

        let result = match connection.execute_batch(batch, cancel) {
            Ok(sets) => Ok(sets),
            Err(_) if cancel.is_cancelled() => Err(Error::Cancelled),
            Err(err) => Err(Error::Execution(err)),
        };

        self.observe(&event, started, &result);
        result
    }

    async fn execute_async<C: AsyncConnection + ?Sized>(
        &self,
        connection: &mut C,
        batch: &SqlBatch,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResultSet>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let event = self.trace_event(batch);
        self.tracer.before_execute(&event);
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            executed = connection.execute_batch(batch) => executed.map_err(Error::Execution),
        };

        self.observe(&event, started, &result);
        result
    }

    fn trace_event(&self, batch: &SqlBatch) -> TraceEvent {
        TraceEvent {
            batch_id: self.next_batch_id.fetch_add(1, Ordering::Relaxed),
            dialect: self.dialect.name(),
            sql: batch.text(),
            statements: batch.len(),
            parameters: if self.config.trace_parameters {
                batch.parameters()
            } else {
                Vec::new()
            },
        }
    }

    fn observe(&self, event: &TraceEvent, started: Instant, result: &Result<Vec<ResultSet>>) {
        let outcome = match result {
            Ok(sets) => TraceOutcome::Completed {
                result_sets: sets.len(),
            },
            Err(Error::Cancelled) => TraceOutcome::Cancelled,
            Err(err) => TraceOutcome::Failed(err.to_string()),
        };
        self.tracer
            .after_execute(event, started.elapsed(), &outcome);
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("config", &self.config)
            .field("dialect", &self.dialect.name())
            .field("materializers", &self.materializers)
            .field("results", &self.results)
            .finish_non_exhaustive()
    }
}
