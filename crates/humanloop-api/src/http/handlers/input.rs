//! Pause, input status, submission, and cancel handlers for the REST API.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use humanloop_core::resume::{InputStatusView, PauseRequest, SubmitInput, SubmitOutcome};
use humanloop_observe::spans;
use humanloop_types::execution::ExecutionStatus;
use humanloop_types::input_request::InputRequest;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::handlers::execution::parse_execution_id;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// An input request together with the signed link a human can answer it on.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedRequest {
    pub request: InputRequest,
    pub form_token: String,
    pub form_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedExecution {
    pub id: Uuid,
    pub status: ExecutionStatus,
    pub current_step: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    pub finished: bool,
    pub is_waiting_for_more_input: bool,
}

/// Body returned by the submit endpoints.
#[derive(Debug, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum SubmitView {
    Validated {
        valid: bool,
        sanitized_data: serde_json::Map<String, serde_json::Value>,
    },
    Submitted {
        execution: SubmittedExecution,
        workflow_status: WorkflowStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        next_input: Option<IssuedRequest>,
    },
}

/// Sign a form link for `request`, valid until its deadline.
pub(crate) fn issue(state: &AppState, request: InputRequest) -> Result<IssuedRequest, AppError> {
    let token = state
        .form_tokens
        .sign(request.id, request.execution_id, request.step, request.timeout_at)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(IssuedRequest {
        form_url: format!("/api/v1/forms/{token}"),
        form_token: token,
        request,
    })
}

pub(crate) fn render_outcome(
    state: &AppState,
    outcome: SubmitOutcome,
) -> Result<SubmitView, AppError> {
    Ok(match outcome {
        SubmitOutcome::Validated { sanitized } => SubmitView::Validated {
            valid: true,
            sanitized_data: sanitized,
        },
        SubmitOutcome::Submitted {
            execution,
            finished,
            waiting_for_more_input,
            next_request,
        } => SubmitView::Submitted {
            execution: SubmittedExecution {
                id: execution.id,
                status: execution.status,
                current_step: execution.dynamic_input.current_step,
            },
            workflow_status: WorkflowStatus {
                finished,
                is_waiting_for_more_input: waiting_for_more_input,
            },
            next_input: next_request.map(|r| issue(state, r)).transpose()?,
        },
    })
}

/// POST /api/v1/executions/:id/pause - Engine registers a pause point.
pub async fn register_pause(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Json(body): Json<PauseRequest>,
) -> Result<Json<ApiResponse<IssuedRequest>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let id = parse_execution_id(&id)?;
    let span = tracing::info_span!(
        spans::REGISTER_PAUSE,
        humanloop.execution_id = %id,
        humanloop.step = body.step,
    );
    let request = state
        .coordinator
        .register_pause(&caller, &id, body)
        .instrument(span)
        .await?;
    let issued = issue(&state, request)?;
    let elapsed = start.elapsed().as_millis() as u64;

    let form_url = issued.form_url.clone();
    let resp = ApiResponse::success(issued, request_id, elapsed)
        .with_link("input", &format!("/api/v1/executions/{id}/input"))
        .with_link("form", &form_url);

    Ok(Json(resp))
}

/// GET /api/v1/executions/:id/input - Is the execution waiting, and for what.
pub async fn get_input(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<InputStatusView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let id = parse_execution_id(&id)?;
    let view = state.coordinator.input_status(&caller, &id).await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let resp = ApiResponse::success(view, request_id, elapsed)
        .with_link("self", &format!("/api/v1/executions/{id}/input"))
        .with_link("execution", &format!("/api/v1/executions/{id}"));

    Ok(Json(resp))
}

/// POST /api/v1/executions/:id/input - Submit (or dry-run) human input.
pub async fn submit_input(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Json(body): Json<SubmitInput>,
) -> Result<Json<ApiResponse<SubmitView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let id = parse_execution_id(&id)?;
    let span = tracing::info_span!(
        spans::SUBMIT_INPUT,
        humanloop.execution_id = %id,
        validate_only = body.validate_only,
    );
    let outcome = state
        .coordinator
        .submit_input(&caller, &id, body)
        .instrument(span)
        .await?;
    let view = render_outcome(&state, outcome)?;
    let elapsed = start.elapsed().as_millis() as u64;

    let resp = ApiResponse::success(view, request_id, elapsed)
        .with_link("execution", &format!("/api/v1/executions/{id}"));

    Ok(Json(resp))
}

/// POST /api/v1/executions/:id/input/cancel - Cancel the open pause.
pub async fn cancel_input(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<InputRequest>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let id = parse_execution_id(&id)?;
    let span = tracing::info_span!(spans::CANCEL_INPUT, humanloop.execution_id = %id);
    let cancelled = state
        .coordinator
        .cancel_input(&caller, &id)
        .instrument(span)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    let resp = ApiResponse::success(cancelled, request_id, elapsed)
        .with_link("execution", &format!("/api/v1/executions/{id}"));

    Ok(Json(resp))
}
