//! Input Request ledger.
//!
//! Tracks the outstanding human-input request of each (execution, step) and
//! its lifecycle. Every transition leaves `pending` through a conditional
//! update, so a concurrent submit and a concurrent sweep can never both win.

use chrono::{DateTime, Duration, Utc};
use humanloop_types::error::{
    CONFLICT_PENDING_STEP, CONFLICT_WEBHOOK_URL, LedgerError, RepositoryError,
};
use humanloop_types::input_request::{InputRequest, InputRequestMetadata, InputRequestStatus};
use humanloop_types::schema::InputSchema;
use uuid::Uuid;

use crate::repository::input_request::{ClaimGuard, InputRequestRepository};

/// Proof of holding the in-flight claim on a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimToken(String);

impl ClaimToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Ledger service over an [`InputRequestRepository`].
pub struct InputRequestLedger<R: InputRequestRepository> {
    repo: R,
    claim_ttl: Duration,
}

fn storage(e: RepositoryError) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

impl<R: InputRequestRepository> InputRequestLedger<R> {
    /// `claim_ttl` is the age after which an in-flight claim counts as abandoned.
    pub fn new(repo: R, claim_ttl: Duration) -> Self {
        Self { repo, claim_ttl }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn claim_ttl(&self) -> Duration {
        self.claim_ttl
    }

    /// Register a new `pending` request.
    ///
    /// Steps are strictly increasing per execution and a new step can only be
    /// opened once the previous one has left `pending`.
    pub async fn create(
        &self,
        execution_id: Uuid,
        step: u32,
        webhook_url: &str,
        input_schema: InputSchema,
        timeout_at: DateTime<Utc>,
        metadata: InputRequestMetadata,
    ) -> Result<InputRequest, LedgerError> {
        let now = Utc::now();
        if timeout_at <= now {
            return Err(LedgerError::InvalidDeadline);
        }

        if self
            .repo
            .find_pending_by_webhook(webhook_url)
            .await
            .map_err(storage)?
            .is_some()
        {
            return Err(LedgerError::DuplicateWebhook(webhook_url.to_string()));
        }

        if let Some(open) = self.repo.find_open(&execution_id).await.map_err(storage)? {
            if open.step == step {
                return Err(LedgerError::DuplicatePendingStep { step });
            }
            return Err(LedgerError::StepOutOfOrder {
                step,
                latest: open.step,
            });
        }

        if let Some(latest) = self.repo.latest_step(&execution_id).await.map_err(storage)? {
            if step <= latest {
                return Err(LedgerError::StepOutOfOrder { step, latest });
            }
        }

        let request = InputRequest::new(
            execution_id,
            step,
            webhook_url,
            input_schema,
            timeout_at,
            metadata,
        );

        self.repo.insert(&request).await.map_err(|e| match e {
            RepositoryError::Conflict(rule) if rule == CONFLICT_WEBHOOK_URL => {
                LedgerError::DuplicateWebhook(webhook_url.to_string())
            }
            RepositoryError::Conflict(rule) if rule == CONFLICT_PENDING_STEP => {
                LedgerError::DuplicatePendingStep { step }
            }
            other => storage(other),
        })?;

        tracing::info!(
            %execution_id,
            request_id = %request.id,
            step,
            timeout_at = %timeout_at,
            "input request registered"
        );
        Ok(request)
    }

    pub async fn get(&self, request_id: &Uuid) -> Result<InputRequest, LedgerError> {
        self.repo
            .get(request_id)
            .await
            .map_err(storage)?
            .ok_or(LedgerError::NotFound)
    }

    /// The single `pending`, unexpired request of an execution.
    pub async fn find_pending(
        &self,
        execution_id: &Uuid,
    ) -> Result<Option<InputRequest>, LedgerError> {
        let now = Utc::now();
        Ok(self
            .find_open(execution_id)
            .await?
            .filter(|r| !r.is_expired(now)))
    }

    /// The `pending` request of an execution even if its deadline has passed
    /// and the sweeper has not reaped it yet.
    pub async fn find_open(
        &self,
        execution_id: &Uuid,
    ) -> Result<Option<InputRequest>, LedgerError> {
        self.repo.find_open(execution_id).await.map_err(storage)
    }

    /// Correlate a resume address back to its still-pending, unexpired request.
    pub async fn find_by_webhook(
        &self,
        webhook_url: &str,
    ) -> Result<Option<InputRequest>, LedgerError> {
        let now = Utc::now();
        Ok(self
            .repo
            .find_pending_by_webhook(webhook_url)
            .await
            .map_err(storage)?
            .filter(|r| !r.is_expired(now)))
    }

    pub async fn history(&self, execution_id: &Uuid) -> Result<Vec<InputRequest>, LedgerError> {
        self.repo
            .list_for_execution(execution_id)
            .await
            .map_err(storage)
    }

    /// Overdue requests without a live claim.
    pub async fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<InputRequest>, LedgerError> {
        self.repo
            .list_overdue(now, now - self.claim_ttl)
            .await
            .map_err(storage)
    }

    pub async fn count_pending(&self) -> Result<u64, LedgerError> {
        self.repo.count_pending().await.map_err(storage)
    }

    /// Take the in-flight claim on a pending request.
    ///
    /// Returns `None` when the request already left `pending` or another
    /// submission holds a live claim.
    pub async fn claim(&self, request_id: &Uuid) -> Result<Option<ClaimToken>, LedgerError> {
        let now = Utc::now();
        let token = Uuid::now_v7().to_string();
        let won = self
            .repo
            .claim(request_id, &token, now, now - self.claim_ttl)
            .await
            .map_err(storage)?;
        Ok(won.then_some(ClaimToken(token)))
    }

    /// Give a claim back after a failed hand-off. The request stays `pending`.
    pub async fn release(&self, request_id: &Uuid, claim: &ClaimToken) -> Result<(), LedgerError> {
        let released = self
            .repo
            .release_claim(request_id, claim.as_str())
            .await
            .map_err(storage)?;
        if !released {
            tracing::warn!(%request_id, "claim was already gone when releasing");
        }
        Ok(())
    }

    /// `pending -> received`, storing the sanitized payload.
    pub async fn mark_received(
        &self,
        request_id: &Uuid,
        claim: &ClaimToken,
        sanitized: &serde_json::Value,
    ) -> Result<(), LedgerError> {
        self.leave_pending(
            request_id,
            InputRequestStatus::Received,
            Some(sanitized),
            ClaimGuard::Holder(claim.as_str().to_string()),
        )
        .await
    }

    /// `pending -> expired`. Refused while a live claim is held.
    pub async fn mark_expired(&self, request_id: &Uuid) -> Result<(), LedgerError> {
        let stale_before = Utc::now() - self.claim_ttl;
        self.leave_pending(
            request_id,
            InputRequestStatus::Expired,
            None,
            ClaimGuard::Unclaimed { stale_before },
        )
        .await
    }

    /// `pending -> cancelled`. Refused while a live claim is held.
    pub async fn mark_cancelled(&self, request_id: &Uuid) -> Result<(), LedgerError> {
        let stale_before = Utc::now() - self.claim_ttl;
        self.leave_pending(
            request_id,
            InputRequestStatus::Cancelled,
            None,
            ClaimGuard::Unclaimed { stale_before },
        )
        .await
    }

    async fn leave_pending(
        &self,
        request_id: &Uuid,
        to: InputRequestStatus,
        input_data: Option<&serde_json::Value>,
        guard: ClaimGuard,
    ) -> Result<(), LedgerError> {
        let moved = self
            .repo
            .transition(request_id, to, input_data, &guard, Utc::now())
            .await
            .map_err(storage)?;
        if moved {
            tracing::debug!(%request_id, to = %to, "input request transitioned");
            return Ok(());
        }

        let current = self.get(request_id).await?;
        if current.status == InputRequestStatus::Pending {
            Err(LedgerError::ClaimConflict)
        } else {
            Err(LedgerError::InvalidTransition {
                from: current.status,
                to,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryInputRequests;
    use serde_json::json;

    fn ledger() -> InputRequestLedger<InMemoryInputRequests> {
        InputRequestLedger::new(InMemoryInputRequests::default(), Duration::seconds(60))
    }

    async fn open(
        ledger: &InputRequestLedger<InMemoryInputRequests>,
        execution_id: Uuid,
        step: u32,
        url: &str,
    ) -> Result<InputRequest, LedgerError> {
        ledger
            .create(
                execution_id,
                step,
                url,
                InputSchema::default(),
                Utc::now() + Duration::minutes(5),
                InputRequestMetadata::default(),
            )
            .await
    }

    #[tokio::test]
    async fn create_and_find_pending() {
        let ledger = ledger();
        let exec = Uuid::now_v7();
        let req = open(&ledger, exec, 1, "https://engine/r/1").await.unwrap();

        let pending = ledger.find_pending(&exec).await.unwrap().unwrap();
        assert_eq!(pending.id, req.id);
        assert_eq!(pending.status, InputRequestStatus::Pending);

        let by_url = ledger.find_by_webhook("https://engine/r/1").await.unwrap();
        assert_eq!(by_url.map(|r| r.id), Some(req.id));
    }

    #[tokio::test]
    async fn duplicate_webhook_is_rejected() {
        let ledger = ledger();
        open(&ledger, Uuid::now_v7(), 1, "https://engine/r/dup").await.unwrap();
        let err = open(&ledger, Uuid::now_v7(), 1, "https://engine/r/dup")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateWebhook(_)));
    }

    #[tokio::test]
    async fn webhook_stays_unique_after_resolution() {
        let ledger = ledger();
        let exec = Uuid::now_v7();
        let req = open(&ledger, exec, 1, "https://engine/r/once").await.unwrap();
        ledger.mark_cancelled(&req.id).await.unwrap();

        let err = open(&ledger, exec, 2, "https://engine/r/once").await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateWebhook(_)));
    }

    #[tokio::test]
    async fn duplicate_pending_step_is_rejected() {
        let ledger = ledger();
        let exec = Uuid::now_v7();
        open(&ledger, exec, 1, "https://engine/r/a").await.unwrap();
        let err = open(&ledger, exec, 1, "https://engine/r/b").await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicatePendingStep { step: 1 }));
    }

    #[tokio::test]
    async fn next_step_requires_previous_to_leave_pending() {
        let ledger = ledger();
        let exec = Uuid::now_v7();
        let first = open(&ledger, exec, 1, "https://engine/r/1").await.unwrap();

        let err = open(&ledger, exec, 2, "https://engine/r/2").await.unwrap_err();
        assert!(matches!(err, LedgerError::StepOutOfOrder { step: 2, latest: 1 }));

        let claim = ledger.claim(&first.id).await.unwrap().unwrap();
        ledger
            .mark_received(&first.id, &claim, &json!({"ok": true}))
            .await
            .unwrap();
        open(&ledger, exec, 2, "https://engine/r/2").await.unwrap();
    }

    #[tokio::test]
    async fn steps_must_increase() {
        let ledger = ledger();
        let exec = Uuid::now_v7();
        let req = open(&ledger, exec, 3, "https://engine/r/3").await.unwrap();
        ledger.mark_cancelled(&req.id).await.unwrap();

        let err = open(&ledger, exec, 2, "https://engine/r/2").await.unwrap_err();
        assert!(matches!(err, LedgerError::StepOutOfOrder { step: 2, latest: 3 }));
    }

    #[tokio::test]
    async fn past_deadline_is_rejected() {
        let ledger = ledger();
        let err = ledger
            .create(
                Uuid::now_v7(),
                1,
                "https://engine/r/late",
                InputSchema::default(),
                Utc::now() - Duration::seconds(1),
                InputRequestMetadata::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidDeadline));
    }

    #[tokio::test]
    async fn terminal_status_never_reenters_pending() {
        let ledger = ledger();
        let exec = Uuid::now_v7();
        let req = open(&ledger, exec, 1, "https://engine/r/1").await.unwrap();
        ledger.mark_expired(&req.id).await.unwrap();

        let err = ledger.mark_cancelled(&req.id).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidTransition {
                from: InputRequestStatus::Expired,
                to: InputRequestStatus::Cancelled
            }
        ));
        assert!(ledger.claim(&req.id).await.unwrap().is_none());
        assert!(ledger.find_pending(&exec).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn received_stores_payload() {
        let ledger = ledger();
        let req = open(&ledger, Uuid::now_v7(), 1, "https://engine/r/1").await.unwrap();
        let claim = ledger.claim(&req.id).await.unwrap().unwrap();
        ledger
            .mark_received(&req.id, &claim, &json!({"name": "Al"}))
            .await
            .unwrap();

        let stored = ledger.get(&req.id).await.unwrap();
        assert_eq!(stored.status, InputRequestStatus::Received);
        assert_eq!(stored.input_data, Some(json!({"name": "Al"})));
        assert!(stored.resolved_at.is_some());
    }

    #[tokio::test]
    async fn live_claim_blocks_expiry_and_second_claim() {
        let ledger = ledger();
        let req = open(&ledger, Uuid::now_v7(), 1, "https://engine/r/1").await.unwrap();
        let claim = ledger.claim(&req.id).await.unwrap().unwrap();

        assert!(ledger.claim(&req.id).await.unwrap().is_none());
        let err = ledger.mark_expired(&req.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::ClaimConflict));

        ledger.release(&req.id, &claim).await.unwrap();
        assert!(ledger.claim(&req.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn received_requires_matching_claim() {
        let ledger = ledger();
        let req = open(&ledger, Uuid::now_v7(), 1, "https://engine/r/1").await.unwrap();
        let _held = ledger.claim(&req.id).await.unwrap().unwrap();

        let forged = ClaimToken("not-the-token".to_string());
        let err = ledger
            .mark_received(&req.id, &forged, &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ClaimConflict));
    }

    #[tokio::test]
    async fn stale_claim_can_be_taken_over() {
        let ledger = InputRequestLedger::new(InMemoryInputRequests::default(), Duration::zero());
        let req = open(&ledger, Uuid::now_v7(), 1, "https://engine/r/1").await.unwrap();
        let _first = ledger.claim(&req.id).await.unwrap().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(ledger.claim(&req.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_row_is_open_but_not_pending() {
        let ledger = ledger();
        let exec = Uuid::now_v7();
        let mut req = InputRequest::new(
            exec,
            1,
            "https://engine/r/old",
            InputSchema::default(),
            Utc::now() - Duration::seconds(1),
            InputRequestMetadata::default(),
        );
        req.created_at = Utc::now() - Duration::minutes(5);
        ledger.repository().insert(&req).await.unwrap();

        assert!(ledger.find_pending(&exec).await.unwrap().is_none());
        assert!(ledger.find_by_webhook("https://engine/r/old").await.unwrap().is_none());
        let open = ledger.find_open(&exec).await.unwrap().unwrap();
        assert!(open.is_expired(Utc::now()));
    }

    #[tokio::test]
    async fn concurrent_creates_yield_one_winner() {
        let ledger = std::sync::Arc::new(ledger());
        let exec = Uuid::now_v7();

        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                open(&ledger, exec, 1, &format!("https://engine/r/{i}")).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(ledger.history(&exec).await.unwrap().len(), 1);
    }
}
