mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{orders_set, users_set, MockProvider, MockTransaction, Order, Script, User};
use ormbatch_core::proto::{col, CachePolicy};
use ormbatch_core::{
    CancellationToken, EngineConfig, Error, Query, QueryEngine, RecordingTracer, TraceOutcome,
};

#[tokio::test]
async fn test_async_matches_sync_results() {
    let script = Script::new()
        .with_table("users", users_set())
        .with_table("orders", orders_set());
    let provider = MockProvider::new(&script);
    let engine = QueryEngine::new(EngineConfig::default());
    let queries = (
        Query::<Order>::new(),
        Query::<User>::new().filter(col("age").ge(18)),
    );

    let (orders, users) = engine
        .query_multiple_async(&provider, &queries, &CancellationToken::new())
        .await
        .unwrap();
    let (sync_orders, sync_users) = engine.query_multiple(&provider, &queries).unwrap();

    assert_eq!(orders, sync_orders);
    assert_eq!(users, sync_users);
    assert_eq!(script.executions(), 2);
    assert_eq!(script.closed(), 2);
}

#[tokio::test]
async fn test_async_serves_cache_hits() {
    let script = Script::new().with_table("users", users_set());
    let provider = MockProvider::new(&script);
    let engine = QueryEngine::default();
    let query = Query::<User>::new().cache(CachePolicy::keyed("users", Duration::from_secs(60)));
    let cancel = CancellationToken::new();

    engine
        .query_multiple_async(&provider, &(query.clone(),), &cancel)
        .await
        .unwrap();
    let (users,) = engine
        .query_multiple_async(&provider, &(query,), &cancel)
        .await
        .unwrap();

    assert_eq!(users.len(), 2);
    assert_eq!(script.executions(), 1);
}

#[tokio::test]
async fn test_cancel_aborts_round_trip() {
    let script = Script::new().with_table("users", users_set());
    script.delay_by(Duration::from_secs(30));
    let provider = MockProvider::new(&script);
    let tracer = Arc::new(RecordingTracer::default());
    let engine = QueryEngine::default().with_tracer(tracer.clone());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = engine
        .query_multiple_async(&provider, &(Query::<User>::new(),), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(tracer.records()[0].outcome, Some(TraceOutcome::Cancelled));
    assert_eq!(script.closed(), 1, "the abandoned connection is dropped");
}

#[tokio::test]
async fn test_async_transaction_connection_left_open() {
    let script = Script::new().with_table("orders", orders_set());
    let provider = MockProvider::new(&script);
    let engine = QueryEngine::default();
    let mut tx = MockTransaction::begin(&provider);

    let (orders,) = engine
        .query_in_transaction_async(&mut tx, &(Query::<Order>::new(),), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(orders.len(), 1);
    assert_eq!(script.opened(), 1);
    assert_eq!(script.closed(), 0);
}

#[tokio::test]
async fn test_async_unsupported_expression_skips_io() {
    let script = Script::new();
    let provider = MockProvider::new(&script);

    let err = QueryEngine::default()
        .query_multiple_async(
            &provider,
            &(Query::<User>::new().filter(col("age").eq(col("id"))),),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnsupportedExpression(_)));
    assert_eq!(script.opened(), 0);
}
