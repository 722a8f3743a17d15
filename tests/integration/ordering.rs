//! Completion-order independence.
//!
//! Workers may finish in any order, deliver a result twice, or deliver a
//! result for an expression that has already failed. None of that may
//! change the final value or create extra tasks.

use abacus::core::{Operator, TaskFault, TaskResult};
use abacus::orchestration::ExpressionStatus;
use abacus::{Error, FailureKind};

use crate::fixtures::{claim_all, drain, orchestrator, wait_for_planned};

#[tokio::test]
async fn test_reverse_completion_order() {
    let orch = orchestrator(16);
    let id = orch.submit("(1 + 2) * (3 + 4) - (10 / 5)").await.unwrap();
    wait_for_planned(&orch, &id).await;

    let mut leaves = claim_all(&orch).await;
    assert_eq!(leaves.len(), 3);
    leaves.reverse();
    for task in &leaves {
        orch.ingest_result(task.execute()).await.unwrap();
    }

    drain(&orch).await;
    let expr = orch.expression(&id).await.unwrap();
    assert_eq!(expr.result, Some(19.0));
    assert_eq!(orch.tasks_issued(&id).await, Some(5));
}

#[tokio::test]
async fn test_dependent_waits_for_both_operands() {
    let orch = orchestrator(16);
    let id = orch.submit("(2 + 3) * (4 - 1)").await.unwrap();
    wait_for_planned(&orch, &id).await;

    let leaves = claim_all(&orch).await;
    assert_eq!(leaves.len(), 2);

    orch.ingest_result(leaves[0].execute()).await.unwrap();
    assert!(orch.claim_task().await.is_none(), "root must wait for its right operand");

    orch.ingest_result(leaves[1].execute()).await.unwrap();
    let root = orch.claim_task().await.unwrap();
    assert_eq!(root.operation, Operator::Mul);
    assert_eq!((root.arg1, root.arg2), (5.0, 3.0));

    orch.ingest_result(root.execute()).await.unwrap();
    let expr = orch.expression(&id).await.unwrap();
    assert_eq!(expr.status, ExpressionStatus::Completed);
    assert_eq!(expr.result, Some(15.0));
}

#[tokio::test]
async fn test_operand_order_is_preserved() {
    let orch = orchestrator(16);
    let id = orch.submit("(9 - 4) / (1 + 1)").await.unwrap();
    drain(&orch).await;
    assert_eq!(orch.expression(&id).await.unwrap().result, Some(2.5));
}

#[tokio::test]
async fn test_duplicate_result_is_ignored() {
    let orch = orchestrator(16);
    let id = orch.submit("(1 + 1) + (2 + 2)").await.unwrap();
    wait_for_planned(&orch, &id).await;

    let leaves = claim_all(&orch).await;
    let first = leaves[0].execute();
    orch.ingest_result(first.clone()).await.unwrap();

    let dup = orch.ingest_result(first).await.unwrap_err();
    assert!(matches!(dup, Error::UnknownTask(_)));

    // A forged value for an already-answered task changes nothing either.
    let forged = TaskResult::value(leaves[0].id, 1000.0);
    assert!(orch.ingest_result(forged).await.is_err());

    for task in &leaves[1..] {
        orch.ingest_result(task.execute()).await.unwrap();
    }
    drain(&orch).await;

    assert_eq!(orch.expression(&id).await.unwrap().result, Some(6.0));
    assert_eq!(orch.tasks_issued(&id).await, Some(3));
}

#[tokio::test]
async fn test_late_results_after_failure_are_ignored() {
    let orch = orchestrator(16);
    let id = orch.submit("(8 / 0) + (1 + 1) * (2 + 2)").await.unwrap();
    wait_for_planned(&orch, &id).await;

    let leaves = claim_all(&orch).await;
    assert_eq!(leaves.len(), 3);

    orch.ingest_result(TaskResult::fault(leaves[0].id, TaskFault::DivisionByZero))
        .await
        .unwrap();
    for task in &leaves[1..] {
        assert!(matches!(
            orch.ingest_result(task.execute()).await,
            Err(Error::UnknownTask(_))
        ));
    }

    let expr = orch.expression(&id).await.unwrap();
    assert_eq!(expr.status, ExpressionStatus::Failed);
    assert_eq!(expr.error, Some(FailureKind::DivisionByZero));
    assert!(expr.result.is_none());
    assert!(orch.claim_task().await.is_none());
}

#[tokio::test]
async fn test_failure_is_isolated_per_expression() {
    let orch = orchestrator(16);
    let bad = orch.submit("1 / 0").await.unwrap();
    let good = orch.submit("6 * 7").await.unwrap();
    drain(&orch).await;

    assert_eq!(
        orch.expression(&bad).await.unwrap().error,
        Some(FailureKind::DivisionByZero)
    );
    assert_eq!(orch.expression(&good).await.unwrap().result, Some(42.0));
}

#[tokio::test]
async fn test_malformed_result_leaves_task_outstanding() {
    let orch = orchestrator(4);
    let id = orch.submit("2 + 2").await.unwrap();
    wait_for_planned(&orch, &id).await;

    let task = orch.claim_task().await.unwrap();
    let both = TaskResult {
        task_id: task.id,
        value: Some(4.0),
        error: Some(TaskFault::DivisionByZero),
    };
    assert!(matches!(
        orch.ingest_result(both).await,
        Err(Error::MalformedResult(_))
    ));

    orch.ingest_result(task.execute()).await.unwrap();
    assert_eq!(orch.expression(&id).await.unwrap().result, Some(4.0));
}

#[tokio::test]
async fn test_small_queue_backpressure() {
    let orch = orchestrator(1);
    let mut ids = Vec::new();
    for text in ["(1 + 1) * (1 + 1) * (1 + 1)", "(2 - 1) + (3 - 1) + (4 - 1)"] {
        ids.push(orch.submit(text).await.unwrap());
    }
    drain(&orch).await;

    assert_eq!(orch.expression(&ids[0]).await.unwrap().result, Some(8.0));
    assert_eq!(orch.expression(&ids[1]).await.unwrap().result, Some(6.0));
    assert!(orch.queue().len() <= 1);
}
