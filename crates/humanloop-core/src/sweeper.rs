//! Expiry Sweeper.
//!
//! Reaps pending input requests whose deadline has passed and fails their
//! executions. Runs on its own interval, independent of any request path.
//! Each reap goes through the ledger's guarded `pending -> expired`
//! transition, so a submission that wins the race simply makes the sweep skip
//! that row.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use humanloop_types::error::{ExecutionError, LedgerError};
use humanloop_types::event::CoordinatorEvent;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::event::EventBus;
use crate::ledger::InputRequestLedger;
use crate::repository::execution::ExecutionRepository;
use crate::repository::input_request::InputRequestRepository;
use crate::tracker::ExecutionTracker;

/// Counters from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Overdue requests found.
    pub scanned: usize,
    /// Requests this pass moved to `expired`.
    pub expired: usize,
    /// Requests left alone because a submission held or won them.
    pub skipped: usize,
}

pub struct ExpirySweeper<E: ExecutionRepository, R: InputRequestRepository> {
    tracker: Arc<ExecutionTracker<E, R>>,
    ledger: Arc<InputRequestLedger<R>>,
    events: EventBus,
}

impl<E, R> ExpirySweeper<E, R>
where
    E: ExecutionRepository + 'static,
    R: InputRequestRepository + 'static,
{
    pub fn new(
        tracker: Arc<ExecutionTracker<E, R>>,
        ledger: Arc<InputRequestLedger<R>>,
        events: EventBus,
    ) -> Self {
        Self {
            tracker,
            ledger,
            events,
        }
    }

    /// Expire every request overdue at `now`. Safe to re-run.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepReport, LedgerError> {
        let overdue = self.ledger.overdue(now).await?;
        let mut report = SweepReport {
            scanned: overdue.len(),
            ..SweepReport::default()
        };

        for request in overdue {
            match self.ledger.mark_expired(&request.id).await {
                Ok(()) => {}
                Err(LedgerError::ClaimConflict | LedgerError::InvalidTransition { .. }) => {
                    tracing::debug!(request_id = %request.id, "request resolved concurrently; skipping");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::error!(request_id = %request.id, error = %e, "failed to expire request");
                    continue;
                }
            }
            report.expired += 1;
            self.events.publish(CoordinatorEvent::InputExpired {
                execution_id: request.execution_id,
                request_id: request.id,
                step: request.step,
            });

            let reason = format!("input request for step {} timed out", request.step);
            match self.tracker.mark_failed(&request.execution_id, &reason).await {
                Ok(()) => self.events.publish(CoordinatorEvent::ExecutionFailed {
                    execution_id: request.execution_id,
                    reason,
                }),
                Err(ExecutionError::AlreadyTerminal(status)) => {
                    tracing::debug!(
                        execution_id = %request.execution_id,
                        %status,
                        "execution already terminal"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        execution_id = %request.execution_id,
                        error = %e,
                        "expired request but could not fail its execution"
                    );
                }
            }
        }

        if report.scanned > 0 {
            tracing::info!(
                scanned = report.scanned,
                expired = report.expired,
                skipped = report.skipped,
                "expiry sweep finished"
            );
        }
        Ok(report)
    }

    /// Sweep every `period` until `cancel` fires.
    pub async fn run(self: Arc<Self>, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval_secs = period.as_secs(), "expiry sweeper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("expiry sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once(Utc::now()).await {
                        tracing::error!(error = %e, "expiry sweep failed");
                    }
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) onto the runtime.
    pub fn spawn(
        self: Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(period, cancel))
    }
}
