//! In-process worker pool draining the orchestrator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use abacus::config::OperationTimes;
use abacus::core::calc;
use abacus::orchestration::{ExpressionStatus, WorkerEvent, WorkerPool};

use crate::fixtures::{
    config, orchestrator, orchestrator_with_times, wait_for_finished, VALID_EXPRESSIONS,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_embedded_pool_evaluates_everything() {
    let orch = orchestrator(32);
    let pool = WorkerPool::from_config(&config(32), Arc::new(orch.clone())).spawn();
    assert_eq!(pool.worker_count(), 4);

    let mut submitted = Vec::new();
    for text in VALID_EXPRESSIONS {
        submitted.push((*text, orch.submit(text).await.unwrap()));
    }
    for (text, id) in &submitted {
        let expr = wait_for_finished(&orch, id).await;
        assert_eq!(expr.status, ExpressionStatus::Completed, "{}", text);
        assert_eq!(expr.result, Some(calc::evaluate(text).unwrap()), "{}", text);
    }

    pool.shutdown_and_join().await;
    orch.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_independent_operations_run_in_parallel() {
    let times = OperationTimes {
        addition_ms: 100,
        ..Default::default()
    };
    let orch = orchestrator_with_times(16, times);
    let pool = WorkerPool::new(
        4,
        Arc::new(orch.clone()),
        Duration::from_millis(2),
        Duration::from_millis(10),
    )
    .spawn();

    // Four independent additions and three more to combine them.
    let started = Instant::now();
    let id = orch
        .submit("(1 + 1) + (1 + 1) + (1 + 1) + (1 + 1)")
        .await
        .unwrap();
    let expr = wait_for_finished(&orch, &id).await;
    let elapsed = started.elapsed();

    assert_eq!(expr.result, Some(8.0));
    // Serial execution would take at least 700ms.
    assert!(elapsed < Duration::from_millis(650), "took {:?}", elapsed);

    pool.shutdown_and_join().await;
}

#[tokio::test]
async fn test_pool_reports_division_by_zero() {
    let orch = orchestrator(8);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let pool = WorkerPool::new(
        2,
        Arc::new(orch.clone()),
        Duration::from_millis(2),
        Duration::from_millis(10),
    )
    .with_events(tx)
    .spawn();

    let id = orch.submit("(4 - 4) + 1 / 0").await.unwrap();
    let expr = wait_for_finished(&orch, &id).await;
    assert_eq!(expr.status, ExpressionStatus::Failed);

    pool.shutdown_and_join().await;

    let mut claimed = 0;
    let mut stopped = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            WorkerEvent::Claimed { .. } => claimed += 1,
            WorkerEvent::Stopped { .. } => stopped += 1,
            _ => {}
        }
    }
    assert!(claimed >= 1);
    assert_eq!(stopped, 2);
}
