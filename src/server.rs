//! HTTP front end for the orchestrator.
//!
//! Public routes live under `/api/v1`; workers use the `/internal` pair.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::agent::{RESULT_PATH, TASK_PATH};
use crate::core::calc;
use crate::core::task::{Task, TaskResult};
use crate::orchestration::{Expression, ExpressionId, Orchestrator};
use crate::{alog, alog_debug, Error, Result};

/// Shared application state.
pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// Maps domain errors onto status codes with a `{error}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn unprocessable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::EmptyExpression
            | Error::InvalidExpression(_)
            | Error::DivisionByZero
            | Error::Overflow
            | Error::MalformedResult(_)
            | Error::Json(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::ExpressionNotFound(_) | Error::UnknownTask(_) | Error::NoTaskAvailable => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ExpressionRequest {
    pub expression: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub id: ExpressionId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpressionsResponse {
    pub expressions: Vec<Expression>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpressionResponse {
    pub expression: Expression,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CalculateResponse {
    pub result: f64,
}

pub fn router(orchestrator: Orchestrator) -> Router {
    let state = Arc::new(AppState { orchestrator });

    Router::new()
        .route(
            "/api/v1/expressions",
            post(submit_expression).get(list_expressions),
        )
        .route("/api/v1/expressions/{id}", get(get_expression))
        .route("/api/v1/calculate", post(calculate))
        .route(TASK_PATH, get(next_task))
        .route(RESULT_PATH, post(submit_result))
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` is cancelled.
pub async fn serve(
    orchestrator: Orchestrator,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, orchestrator, shutdown).await
}

/// Serve on an already-bound listener.
pub async fn serve_on(
    listener: TcpListener,
    orchestrator: Orchestrator,
    shutdown: CancellationToken,
) -> Result<()> {
    alog!("Orchestrator listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    alog_debug!("HTTP server stopped");
    Ok(())
}

async fn submit_expression(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ExpressionRequest>, JsonRejection>,
) -> std::result::Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::from(Error::EmptyExpression))?;
    let id = state.orchestrator.submit(&request.expression).await?;
    Ok((StatusCode::CREATED, Json(SubmitResponse { id })))
}

async fn list_expressions(State(state): State<Arc<AppState>>) -> Json<ExpressionsResponse> {
    Json(ExpressionsResponse {
        expressions: state.orchestrator.expressions().await,
    })
}

async fn get_expression(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> std::result::Result<Json<ExpressionResponse>, ApiError> {
    let id: ExpressionId = id
        .parse()
        .map_err(|_| ApiError::from(Error::ExpressionNotFound(id.clone())))?;
    let expression = state.orchestrator.expression(&id).await?;
    Ok(Json(ExpressionResponse { expression }))
}

async fn calculate(
    payload: std::result::Result<Json<ExpressionRequest>, JsonRejection>,
) -> std::result::Result<Json<CalculateResponse>, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::from(Error::EmptyExpression))?;
    let result = calc::evaluate(&request.expression)?;
    Ok(Json(CalculateResponse { result }))
}

async fn next_task(
    State(state): State<Arc<AppState>>,
) -> std::result::Result<Json<Task>, ApiError> {
    state
        .orchestrator
        .claim_task()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::from(Error::NoTaskAvailable))
}

async fn submit_result(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<TaskResult>, JsonRejection>,
) -> std::result::Result<StatusCode, ApiError> {
    let Json(result) = payload.map_err(|e| ApiError::unprocessable(e.body_text()))?;
    state.orchestrator.ingest_result(result).await?;
    Ok(StatusCode::OK)
}
