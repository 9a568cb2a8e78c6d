//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use humanloop_infra::crypto::token::TokenError;
use humanloop_types::error::{ExecutionError, LedgerError, ResumeError};

use crate::http::response::{ApiErrorDetail, ApiResponse};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Coordinator errors (including wrapped ledger/execution errors).
    Resume(ResumeError),
    /// Form token rejected.
    Token(TokenError),
    /// Authentication failure.
    Unauthorized(String),
    /// Validation error.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<ResumeError> for AppError {
    fn from(e: ResumeError) -> Self {
        AppError::Resume(e)
    }
}

impl From<ExecutionError> for AppError {
    fn from(e: ExecutionError) -> Self {
        match e {
            ExecutionError::NotFound => AppError::Resume(ResumeError::ExecutionNotFound),
            other => AppError::Resume(ResumeError::Execution(other)),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        AppError::Token(e)
    }
}

fn detail(code: &str, message: String) -> ApiErrorDetail {
    ApiErrorDetail {
        code: code.to_string(),
        message,
        details: None,
    }
}

fn ledger_error(e: &LedgerError) -> (StatusCode, ApiErrorDetail) {
    match e {
        LedgerError::DuplicateWebhook(_)
        | LedgerError::DuplicatePendingStep { .. }
        | LedgerError::StepOutOfOrder { .. }
        | LedgerError::InvalidTransition { .. }
        | LedgerError::ClaimConflict => (StatusCode::CONFLICT, detail("CONFLICT", e.to_string())),
        LedgerError::InvalidDeadline => (
            StatusCode::BAD_REQUEST,
            detail("VALIDATION_ERROR", e.to_string()),
        ),
        LedgerError::NotFound => (
            StatusCode::NOT_FOUND,
            detail("NO_PENDING_INPUT", e.to_string()),
        ),
        LedgerError::Storage(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            detail("STORAGE_ERROR", e.to_string()),
        ),
    }
}

impl AppError {
    /// Status code and envelope errors for this error.
    fn parts(&self) -> (StatusCode, Vec<ApiErrorDetail>) {
        let (status, detail) = match self {
            AppError::Resume(ResumeError::ExecutionNotFound) => (
                StatusCode::NOT_FOUND,
                detail("EXECUTION_NOT_FOUND", "Execution not found".to_string()),
            ),
            AppError::Resume(ResumeError::NotWaitingForInput) => (
                StatusCode::CONFLICT,
                detail(
                    "NOT_WAITING_FOR_INPUT",
                    "Execution is not waiting for input".to_string(),
                ),
            ),
            AppError::Resume(e @ ResumeError::InputExpired { .. }) => {
                (StatusCode::GONE, detail("INPUT_EXPIRED", e.to_string()))
            }
            AppError::Resume(ResumeError::NoPendingInputFound) => (
                StatusCode::NOT_FOUND,
                detail(
                    "NO_PENDING_INPUT",
                    "No pending input request found".to_string(),
                ),
            ),
            AppError::Resume(ResumeError::ValidationFailed(errors)) => {
                // Every entry carries the full message list under `details.errors`.
                let listed = json!({ "errors": errors });
                let details = errors
                    .iter()
                    .map(|message| {
                        let mut d = detail("VALIDATION_FAILED", message.clone());
                        d.details = Some(listed.clone());
                        d
                    })
                    .collect();
                return (StatusCode::BAD_REQUEST, details);
            }
            AppError::Resume(e @ ResumeError::ExternalResumeFailed(_)) => {
                let mut d = detail("EXTERNAL_RESUME_FAILED", e.to_string());
                d.details = Some(json!({ "retryable": true }));
                (StatusCode::BAD_GATEWAY, d)
            }
            AppError::Resume(e @ ResumeError::InvalidSchema(_)) => {
                (StatusCode::BAD_REQUEST, detail("INVALID_SCHEMA", e.to_string()))
            }
            AppError::Resume(ResumeError::Ledger(e)) => ledger_error(e),
            AppError::Resume(ResumeError::Execution(ExecutionError::NotFound)) => (
                StatusCode::NOT_FOUND,
                detail("EXECUTION_NOT_FOUND", "Execution not found".to_string()),
            ),
            AppError::Resume(ResumeError::Execution(e @ ExecutionError::AlreadyTerminal(_))) => {
                (StatusCode::CONFLICT, detail("EXECUTION_TERMINAL", e.to_string()))
            }
            AppError::Resume(ResumeError::Execution(e @ ExecutionError::Storage(_))) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail("STORAGE_ERROR", e.to_string()),
            ),
            AppError::Token(e @ TokenError::Expired) => {
                (StatusCode::GONE, detail("FORM_EXPIRED", e.to_string()))
            }
            AppError::Token(e) => (StatusCode::UNAUTHORIZED, detail("INVALID_FORM_TOKEN", e.to_string())),
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, detail("UNAUTHORIZED", msg.clone()))
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, detail("VALIDATION_ERROR", msg.clone()))
            }
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail("INTERNAL_ERROR", msg.clone()),
            ),
        };
        (status, vec![detail])
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, errors) = self.parts();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = ?self, "request failed");
        }

        let body = serde_json::to_string(&ApiResponse::failure(errors)).unwrap_or_else(|_| {
            r#"{"errors":[{"code":"SERIALIZATION_ERROR","message":"Failed to serialize response"}]}"#.to_string()
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}
