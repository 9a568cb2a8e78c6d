//! Input Request repository trait definition.

use chrono::{DateTime, Utc};
use humanloop_types::error::RepositoryError;
use humanloop_types::input_request::{InputRequest, InputRequestStatus};
use uuid::Uuid;

/// Claim precondition attached to a conditional status transition.
#[derive(Debug, Clone)]
pub enum ClaimGuard {
    /// The caller must hold the in-flight claim with this token.
    Holder(String),
    /// No live claim may exist: either none, or one stamped before `stale_before`.
    Unclaimed { stale_before: DateTime<Utc> },
}

/// Repository trait for Input Request persistence.
///
/// Implementations must reject inserts that violate webhook uniqueness or the
/// one-pending-per-(execution, step) rule with
/// `RepositoryError::Conflict(CONFLICT_WEBHOOK_URL | CONFLICT_PENDING_STEP)`.
pub trait InputRequestRepository: Send + Sync {
    /// Insert a new request.
    fn insert(
        &self,
        request: &InputRequest,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a request by ID.
    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<InputRequest>, RepositoryError>> + Send;

    /// The `pending` request of an execution regardless of its deadline.
    fn find_open(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<InputRequest>, RepositoryError>> + Send;

    /// The `pending` request registered under `webhook_url`, if any.
    fn find_pending_by_webhook(
        &self,
        webhook_url: &str,
    ) -> impl std::future::Future<Output = Result<Option<InputRequest>, RepositoryError>> + Send;

    /// Highest step recorded for an execution in any status.
    fn latest_step(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<u32>, RepositoryError>> + Send;

    /// All requests of an execution ordered by step.
    fn list_for_execution(
        &self,
        execution_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<InputRequest>, RepositoryError>> + Send;

    /// `pending` requests whose deadline is before `now` and that carry no
    /// live claim (none, or claimed before `stale_before`).
    fn list_overdue(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<InputRequest>, RepositoryError>> + Send;

    /// Number of `pending` requests system-wide.
    fn count_pending(
        &self,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Stamp an in-flight claim on a `pending` request with no live claim.
    ///
    /// Returns `true` if this call acquired the claim.
    fn claim(
        &self,
        id: &Uuid,
        token: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Drop a claim held under `token`. Status is left untouched.
    fn release_claim(
        &self,
        id: &Uuid,
        token: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Move a request out of `pending`:
    /// `UPDATE ... SET status = to WHERE id = ? AND status = 'pending' AND <guard>`.
    ///
    /// `input_data` is stored alongside (only meaningful for `received`).
    /// Returns `true` if this call performed the transition.
    fn transition(
        &self,
        id: &Uuid,
        to: InputRequestStatus,
        input_data: Option<&serde_json::Value>,
        guard: &ClaimGuard,
        now: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
