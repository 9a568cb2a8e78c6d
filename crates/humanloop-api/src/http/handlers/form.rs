//! Signed form-link handlers.
//!
//! These routes take no API key: the token itself names the execution and
//! the one input request it may answer, and expires with that request.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;
use tracing::Instrument;
use uuid::Uuid;

use humanloop_core::resume::{InputStatusView, SubmitInput};
use humanloop_observe::spans;

use crate::http::error::AppError;
use crate::http::handlers::input::{SubmitView, render_outcome};
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/forms/:token - Input status for the linked request.
pub async fn get_form(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ApiResponse<InputStatusView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let claims = state.form_tokens.verify(&token, Utc::now())?;
    let view = state
        .coordinator
        .input_status_for_request(&claims.eid, &claims.rid)
        .await?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(Json(ApiResponse::success(view, request_id, elapsed)))
}

/// POST /api/v1/forms/:token - Submit input through the linked form.
pub async fn submit_form(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(mut body): Json<SubmitInput>,
) -> Result<Json<ApiResponse<SubmitView>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let claims = state.form_tokens.verify(&token, Utc::now())?;
    // The link answers exactly the step it was issued for.
    body.step = Some(claims.step);

    let span = tracing::info_span!(
        spans::SUBMIT_FORM,
        humanloop.execution_id = %claims.eid,
        humanloop.request_id = %claims.rid,
        humanloop.step = claims.step,
    );
    let outcome = state
        .coordinator
        .submit_for_request(&claims.eid, &claims.rid, body)
        .instrument(span)
        .await?;
    let view = render_outcome(&state, outcome)?;
    let elapsed = start.elapsed().as_millis() as u64;

    Ok(Json(ApiResponse::success(view, request_id, elapsed)))
}
