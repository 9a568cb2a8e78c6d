//! Execution launch and lookup handlers for the REST API.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use uuid::Uuid;

use humanloop_types::error::ResumeError;
use humanloop_types::execution::{Execution, ExecutionStatus};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Body of `POST /api/v1/executions`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchExecution {
    pub workflow_id: String,
    pub workflow_name: String,
    #[serde(default)]
    pub input_data: Option<serde_json::Value>,
}

/// Query parameters for the execution list endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct ExecutionListQuery {
    /// Filter by status (pending, running, waiting_for_input, completed, failed).
    pub status: Option<String>,
    /// Maximum results.
    pub limit: Option<i64>,
}

/// Parse a path id. Malformed ids are reported like unknown executions.
pub(crate) fn parse_execution_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse()
        .map_err(|_| AppError::Resume(ResumeError::ExecutionNotFound))
}

/// POST /api/v1/executions - Launch an execution owned by the caller.
pub async fn create_execution(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Json(body): Json<LaunchExecution>,
) -> Result<Json<ApiResponse<Execution>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let workflow_id = body.workflow_id.trim();
    if workflow_id.is_empty() {
        return Err(AppError::Validation("workflowId must not be empty".to_string()));
    }
    let workflow_name = match body.workflow_name.trim() {
        "" => workflow_id,
        name => name,
    };

    let execution = state
        .coordinator
        .tracker()
        .launch(&caller, workflow_id, workflow_name, body.input_data)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let id = execution.id;
    let resp = ApiResponse::success(execution, request_id, elapsed)
        .with_link("self", &format!("/api/v1/executions/{id}"))
        .with_link("input", &format!("/api/v1/executions/{id}/input"))
        .with_link("pause", &format!("/api/v1/executions/{id}/pause"));

    Ok(Json(resp))
}

/// GET /api/v1/executions - List the caller's executions, newest first.
pub async fn list_executions(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Query(query): Query<ExecutionListQuery>,
) -> Result<Json<ApiResponse<Vec<Execution>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let status = match &query.status {
        Some(s) => Some(s.parse::<ExecutionStatus>().map_err(AppError::Validation)?),
        None => None,
    };

    let executions = state
        .coordinator
        .tracker()
        .list_owned(&caller, status, query.limit)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let resp = ApiResponse::success(executions, request_id, elapsed)
        .with_link("self", "/api/v1/executions");

    Ok(Json(resp))
}

/// GET /api/v1/executions/:id - Get one of the caller's executions.
pub async fn get_execution(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Execution>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let id = parse_execution_id(&id)?;
    let execution = state.coordinator.tracker().get_owned(&id, &caller).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let resp = ApiResponse::success(execution, request_id, elapsed)
        .with_link("self", &format!("/api/v1/executions/{id}"))
        .with_link("input", &format!("/api/v1/executions/{id}/input"));

    Ok(Json(resp))
}
