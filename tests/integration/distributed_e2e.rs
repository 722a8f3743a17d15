//! End-to-end distributed evaluation.
//!
//! Every expression evaluated through the orchestrator must end with the
//! same value, or the same failure, as the single-process calculator.

use abacus::core::{calc, ExpressionDag};
use abacus::orchestration::ExpressionStatus;
use abacus::FailureKind;

use crate::fixtures::{drain, orchestrator, wait_for_finished, VALID_EXPRESSIONS};

#[tokio::test]
async fn test_distributed_matches_local_calculator() {
    let orch = orchestrator(64);
    let mut submitted = Vec::new();
    for text in VALID_EXPRESSIONS {
        submitted.push((*text, orch.submit(text).await.unwrap()));
    }

    drain(&orch).await;

    for (text, id) in submitted {
        let expr = orch.expression(&id).await.unwrap();
        let expected = calc::evaluate(text).unwrap();
        assert_eq!(expr.status, ExpressionStatus::Completed, "{}", text);
        assert_eq!(expr.result, Some(expected), "{}", text);
        assert!(expr.error.is_none());
        assert!(expr.completed_at.is_some());
    }
}

#[tokio::test]
async fn test_task_count_equals_operation_count() {
    let orch = orchestrator(64);
    let mut submitted = Vec::new();
    for text in VALID_EXPRESSIONS {
        submitted.push((*text, orch.submit(text).await.unwrap()));
    }
    drain(&orch).await;

    for (text, id) in submitted {
        let nodes = ExpressionDag::parse(text).unwrap().node_count();
        assert_eq!(orch.tasks_issued(&id).await, Some(nodes), "{}", text);
    }
}

#[tokio::test]
async fn test_failures_match_local_calculator() {
    let cases = [
        ("3 / 0", FailureKind::DivisionByZero),
        ("(5 + 3", FailureKind::InvalidExpression),
        ("(5 + 3))", FailureKind::InvalidExpression),
        ("2 + * 3", FailureKind::InvalidExpression),
        ("abc", FailureKind::InvalidExpression),
        ("1 + (2 - 2) / (3 - 3)", FailureKind::DivisionByZero),
    ];

    let orch = orchestrator(16);
    let mut submitted = Vec::new();
    for (text, kind) in cases {
        submitted.push((text, kind, orch.submit(text).await.unwrap()));
    }
    drain(&orch).await;

    for (text, kind, id) in submitted {
        let expr = orch.expression(&id).await.unwrap();
        assert_eq!(expr.status, ExpressionStatus::Failed, "{}", text);
        assert_eq!(expr.error, Some(kind), "{}", text);
        assert!(expr.result.is_none(), "{}", text);

        let local = calc::evaluate(text).unwrap_err();
        assert_eq!(local.failure_kind(), Some(kind), "{}", text);
    }
}

#[tokio::test]
async fn test_out_of_range_values_fail_like_local_calculator() {
    let huge = "9".repeat(200);
    let cases = [
        (format!("{} * {}", huge, huge), FailureKind::Overflow),
        (format!("1 + ({} * {}) - 1", huge, huge), FailureKind::Overflow),
        ("9".repeat(400), FailureKind::InvalidExpression),
        (format!("2 * {}", "9".repeat(400)), FailureKind::InvalidExpression),
    ];

    let orch = orchestrator(16);
    let mut submitted = Vec::new();
    for (text, kind) in &cases {
        submitted.push((text, *kind, orch.submit(text).await.unwrap()));
    }
    drain(&orch).await;

    for (text, kind, id) in submitted {
        let expr = wait_for_finished(&orch, &id).await;
        assert_eq!(expr.status, ExpressionStatus::Failed, "{:.20}", text);
        assert_eq!(expr.error, Some(kind), "{:.20}", text);
        assert!(expr.result.is_none());

        let local = calc::evaluate(text).unwrap_err();
        assert_eq!(local.failure_kind(), Some(kind), "{:.20}", text);
    }
    assert!(orch.queue().is_empty());
}

#[tokio::test]
async fn test_empty_submission_is_rejected_synchronously() {
    let orch = orchestrator(4);
    for text in ["", "   ", "\t\n"] {
        let err = orch.submit(text).await.unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::EmptyExpression));
    }
    assert!(orch.expressions().await.is_empty());
}

#[tokio::test]
async fn test_bare_literal_needs_no_workers() {
    let orch = orchestrator(4);
    let id = orch.submit("  12.5 ").await.unwrap();
    let expr = wait_for_finished(&orch, &id).await;
    assert_eq!(expr.status, ExpressionStatus::Completed);
    assert_eq!(expr.result, Some(12.5));
    assert_eq!(orch.tasks_issued(&id).await, Some(0));
    assert!(orch.queue().is_empty());
}

#[tokio::test]
async fn test_listing_keeps_submission_order() {
    let orch = orchestrator(16);
    let mut ids = Vec::new();
    for text in ["1 + 1", "2 + 2", "3 + 3", "4 + 4"] {
        ids.push(orch.submit(text).await.unwrap());
        // Distinct creation timestamps.
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    let listed: Vec<_> = orch.expressions().await.into_iter().map(|e| e.id).collect();
    assert_eq!(listed, ids);
}
