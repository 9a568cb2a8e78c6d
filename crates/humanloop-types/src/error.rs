use thiserror::Error;

use crate::execution::ExecutionStatus;
use crate::input_request::InputRequestStatus;

/// Errors from repository operations (used by trait definitions in humanloop-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Which uniqueness rule a conflicting insert violated.
pub const CONFLICT_WEBHOOK_URL: &str = "webhook_url";
pub const CONFLICT_PENDING_STEP: &str = "pending_step";

/// Errors raised by the Input Request ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("webhook url '{0}' is already registered")]
    DuplicateWebhook(String),

    #[error("a pending input request already exists for step {step}")]
    DuplicatePendingStep { step: u32 },

    #[error("step {step} is out of order (latest step is {latest})")]
    StepOutOfOrder { step: u32, latest: u32 },

    #[error("deadline must be in the future")]
    InvalidDeadline,

    #[error("invalid transition from '{from}' to '{to}'")]
    InvalidTransition {
        from: InputRequestStatus,
        to: InputRequestStatus,
    },

    /// Still `pending`, but another submission holds the in-flight claim.
    #[error("input request is being processed by another submission")]
    ClaimConflict,

    #[error("input request not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors raised by the Execution State Tracker.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("execution not found")]
    NotFound,

    #[error("execution is already {0}")]
    AlreadyTerminal(ExecutionStatus),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors surfaced by the Resume Coordinator.
#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("execution not found")]
    ExecutionNotFound,

    #[error("execution is not waiting for input")]
    NotWaitingForInput,

    #[error("input request for step {step} has expired")]
    InputExpired { step: u32 },

    #[error("no pending input request found")]
    NoPendingInputFound,

    #[error("input validation failed")]
    ValidationFailed(Vec<String>),

    /// Transient: no local state was changed, resubmitting is safe.
    #[error("resume callback failed: {0}")]
    ExternalResumeFailed(String),

    #[error("invalid input schema: {0}")]
    InvalidSchema(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = LedgerError::InvalidTransition {
            from: InputRequestStatus::Expired,
            to: InputRequestStatus::Received,
        };
        assert_eq!(
            err.to_string(),
            "invalid transition from 'expired' to 'received'"
        );
    }

    #[test]
    fn test_already_terminal_display() {
        let err = ExecutionError::AlreadyTerminal(ExecutionStatus::Completed);
        assert_eq!(err.to_string(), "execution is already completed");
    }

    #[test]
    fn test_resume_error_wraps_ledger_error() {
        let err: ResumeError = LedgerError::DuplicateWebhook("https://x".to_string()).into();
        assert!(err.to_string().contains("https://x"));
    }
}
