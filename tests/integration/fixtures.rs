//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Building orchestrators with small, fast timings
//! - Waiting for expressions to be planned or finished
//! - Driving tasks by hand in a chosen order
//! - Serving the HTTP API on an ephemeral port

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use abacus::config::{Config, OperationTimes};
use abacus::core::Task;
use abacus::orchestration::{Expression, ExpressionId, Orchestrator, TaskQueue};
use abacus::server;

/// Expressions with a well-defined value.
pub const VALID_EXPRESSIONS: &[&str] = &[
    "3 + 5",
    "10 - 2 * 3",
    "(1 + 2) * 3",
    "10 / 2 + 3 * (2 - 1)",
    "(3 + 5) * (2 - 1)",
    "(1 + (2 + 3))",
    "2 * (3 + 5)",
    "(2 + 3) * (4 - 1)",
    "3 * (2 + 5) - 4",
    "((1 + 2) * (3 + 4)) / (5 - 3)",
    "1 - 2 - 3 - 4",
    "64 / 2 / 2 / 2",
    "1.5 * 4 + .5",
    "42",
];

pub fn config(queue_capacity: usize) -> Config {
    Config {
        queue_capacity,
        computing_power: 4,
        poll_interval_ms: 2,
        max_backoff_ms: 20,
        ..Default::default()
    }
}

pub fn orchestrator(queue_capacity: usize) -> Orchestrator {
    Orchestrator::new(&config(queue_capacity))
}

pub fn orchestrator_with_times(queue_capacity: usize, times: OperationTimes) -> Orchestrator {
    Orchestrator::with_queue(
        times,
        TaskQueue::new(queue_capacity),
        Duration::from_millis(2),
        Duration::from_millis(20),
    )
}

/// Wait until decomposition has issued tasks or finished the expression.
pub async fn wait_for_planned(orch: &Orchestrator, id: &ExpressionId) -> Expression {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let expr = orch.expression(id).await.expect("expression exists");
            let issued = orch.tasks_issued(id).await.unwrap_or(0);
            if expr.is_finished() || issued > 0 {
                return expr;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("expression was never planned")
}

/// Wait until the expression reaches a terminal status.
pub async fn wait_for_finished(orch: &Orchestrator, id: &ExpressionId) -> Expression {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let expr = orch.expression(id).await.expect("expression exists");
            if expr.is_finished() {
                return expr;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("expression never finished")
}

/// Claim every task currently queued.
pub async fn claim_all(orch: &Orchestrator) -> Vec<Task> {
    let mut tasks = Vec::new();
    while let Some(task) = orch.claim_task().await {
        tasks.push(task);
    }
    tasks
}

/// Act as a single worker until every expression is finished.
pub async fn drain(orch: &Orchestrator) {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match orch.claim_task().await {
                Some(task) => {
                    let _ = orch.ingest_result(task.execute()).await;
                }
                None => {
                    let all = orch.expressions().await;
                    if all.iter().all(|e| e.is_finished()) {
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }
        }
    })
    .await
    .expect("expressions did not drain");
}

/// A running HTTP server bound to an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: CancellationToken,
    pub handle: JoinHandle<abacus::Result<()>>,
}

impl TestServer {
    pub async fn start(orch: Orchestrator) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server::serve_on(listener, orch, shutdown.clone()));
        Self {
            addr,
            shutdown,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        let served = tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .expect("server task panicked");
        assert!(served.is_ok(), "server returned {:?}", served);
    }
}
