//! Resume Coordinator: the pause / submit / resume protocol.
//!
//! A submission is validated against the open request's schema, the request
//! is claimed, the engine's resume callback is invoked, and only after the
//! callback returns are the ledger and execution advanced. A failed callback
//! releases the claim and leaves every record untouched, so resubmitting the
//! same payload is always safe.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use humanloop_types::error::{ExecutionError, LedgerError, ResumeError};
use humanloop_types::event::CoordinatorEvent;
use humanloop_types::execution::{Execution, ExecutionStatus};
use humanloop_types::identity::Caller;
use humanloop_types::input_request::{InputRequest, InputRequestMetadata, InputRequestStatus};
use humanloop_types::schema::InputSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::callback::{NextPause, ResumeCallback, ResumeOutcome, ResumePayload};
use crate::event::EventBus;
use crate::ledger::InputRequestLedger;
use crate::repository::execution::ExecutionRepository;
use crate::repository::input_request::InputRequestRepository;
use crate::tracker::{ExecutionTracker, InputRequirement, elapsed_ms};
use crate::validation;

/// Pause signal sent by the engine when it needs human input.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseRequest {
    pub step: u32,
    #[serde(default)]
    pub input_schema: serde_json::Value,
    pub timeout_at: DateTime<Utc>,
    pub webhook_url: String,
    #[serde(default)]
    pub metadata: Option<InputRequestMetadata>,
}

/// A human submission for the open pause.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitInput {
    pub input_data: serde_json::Value,
    #[serde(default)]
    pub validate_only: bool,
    /// Step the form was rendered for. A mismatch means the form is stale.
    #[serde(default)]
    pub step: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub id: Uuid,
    pub status: ExecutionStatus,
    pub workflow_name: String,
}

/// What a client sees when it asks whether an execution needs input.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputStatusView {
    pub is_waiting_for_input: bool,
    pub execution: ExecutionSummary,
    pub input_requirement: Option<InputRequirement>,
}

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Dry run: the payload is valid, nothing was changed.
    Validated {
        sanitized: serde_json::Map<String, serde_json::Value>,
    },
    /// Input was handed to the engine and local state advanced.
    Submitted {
        execution: Execution,
        finished: bool,
        waiting_for_more_input: bool,
        next_request: Option<InputRequest>,
    },
}

fn not_found(e: ExecutionError) -> ResumeError {
    match e {
        ExecutionError::NotFound => ResumeError::ExecutionNotFound,
        other => ResumeError::Execution(other),
    }
}

/// Coordinates the ledger, the execution tracker and the engine callback.
pub struct ResumeCoordinator<E, R, C>
where
    E: ExecutionRepository,
    R: InputRequestRepository,
    C: ResumeCallback,
{
    tracker: Arc<ExecutionTracker<E, R>>,
    ledger: Arc<InputRequestLedger<R>>,
    callback: C,
    events: EventBus,
}

impl<E, R, C> ResumeCoordinator<E, R, C>
where
    E: ExecutionRepository,
    R: InputRequestRepository,
    C: ResumeCallback,
{
    pub fn new(
        tracker: Arc<ExecutionTracker<E, R>>,
        ledger: Arc<InputRequestLedger<R>>,
        callback: C,
        events: EventBus,
    ) -> Self {
        Self {
            tracker,
            ledger,
            callback,
            events,
        }
    }

    pub fn tracker(&self) -> &Arc<ExecutionTracker<E, R>> {
        &self.tracker
    }

    pub fn ledger(&self) -> &Arc<InputRequestLedger<R>> {
        &self.ledger
    }

    /// Register the engine's pause and flip the execution into waiting.
    pub async fn register_pause(
        &self,
        caller: &Caller,
        execution_id: &Uuid,
        pause: PauseRequest,
    ) -> Result<InputRequest, ResumeError> {
        let execution = self
            .tracker
            .get_owned(execution_id, caller)
            .await
            .map_err(not_found)?;
        if execution.status.is_terminal() {
            return Err(ExecutionError::AlreadyTerminal(execution.status).into());
        }
        let schema = InputSchema::from_value(&pause.input_schema)
            .map_err(|e| ResumeError::InvalidSchema(e.to_string()))?;

        self.open_pause(
            &execution,
            pause.step,
            &pause.webhook_url,
            schema,
            pause.timeout_at,
            pause.metadata,
        )
        .await
    }

    /// Current pause state of an execution owned by `caller`.
    pub async fn input_status(
        &self,
        caller: &Caller,
        execution_id: &Uuid,
    ) -> Result<InputStatusView, ResumeError> {
        let execution = self
            .tracker
            .get_owned(execution_id, caller)
            .await
            .map_err(not_found)?;
        self.status_of(execution).await
    }

    /// Current pause state reached through a signed form link.
    pub async fn input_status_for_request(
        &self,
        execution_id: &Uuid,
        request_id: &Uuid,
    ) -> Result<InputStatusView, ResumeError> {
        let execution = self.tracker.get(execution_id).await.map_err(not_found)?;
        self.ensure_request_is_current(&execution, request_id).await?;
        self.status_of(execution).await
    }

    /// Submit human input for the open pause of an execution owned by `caller`.
    pub async fn submit_input(
        &self,
        caller: &Caller,
        execution_id: &Uuid,
        input: SubmitInput,
    ) -> Result<SubmitOutcome, ResumeError> {
        let execution = self
            .tracker
            .get_owned(execution_id, caller)
            .await
            .map_err(not_found)?;
        self.submit(execution, input).await
    }

    /// Submit through a signed form link bound to one specific request.
    pub async fn submit_for_request(
        &self,
        execution_id: &Uuid,
        request_id: &Uuid,
        input: SubmitInput,
    ) -> Result<SubmitOutcome, ResumeError> {
        let execution = self.tracker.get(execution_id).await.map_err(not_found)?;
        self.ensure_request_is_current(&execution, request_id).await?;
        self.submit(execution, input).await
    }

    /// Administratively cancel the open pause. The execution goes back to
    /// `running` and the engine decides what happens next.
    pub async fn cancel_input(
        &self,
        caller: &Caller,
        execution_id: &Uuid,
    ) -> Result<InputRequest, ResumeError> {
        let execution = self
            .tracker
            .get_owned(execution_id, caller)
            .await
            .map_err(not_found)?;
        let open = self
            .ledger
            .find_open(&execution.id)
            .await?
            .ok_or(ResumeError::NoPendingInputFound)?;

        self.ledger.mark_cancelled(&open.id).await?;
        match self.tracker.clear_waiting(&execution.id).await {
            Ok(()) | Err(ExecutionError::AlreadyTerminal(_)) => {}
            Err(e) => return Err(e.into()),
        }

        self.events.publish(CoordinatorEvent::InputCancelled {
            execution_id: execution.id,
            request_id: open.id,
            step: open.step,
        });
        Ok(self.ledger.get(&open.id).await?)
    }

    async fn status_of(&self, execution: Execution) -> Result<InputStatusView, ResumeError> {
        let requirement = self
            .tracker
            .get_current_input_requirement(&execution.id)
            .await?;

        let mirror = &execution.dynamic_input;
        let ledger_waiting = requirement.is_some();
        if mirror.is_waiting_for_input != ledger_waiting
            || requirement
                .as_ref()
                .is_some_and(|r| r.step != mirror.current_step)
        {
            tracing::warn!(
                execution_id = %execution.id,
                mirror_waiting = mirror.is_waiting_for_input,
                mirror_step = mirror.current_step,
                ledger_step = requirement.as_ref().map(|r| r.step),
                "execution mirror disagrees with ledger"
            );
        }

        Ok(InputStatusView {
            is_waiting_for_input: requirement.as_ref().is_some_and(|r| !r.is_expired),
            execution: ExecutionSummary {
                id: execution.id,
                status: execution.status,
                workflow_name: execution.workflow_name,
            },
            input_requirement: requirement,
        })
    }

    /// Step of the most recent request when the sweeper already expired it.
    async fn swept_step(&self, execution_id: &Uuid) -> Result<Option<u32>, ResumeError> {
        let history = self.ledger.history(execution_id).await?;
        Ok(history
            .iter()
            .max_by_key(|request| (request.step, request.created_at))
            .filter(|latest| latest.status == InputRequestStatus::Expired)
            .map(|latest| latest.step))
    }

    async fn ensure_request_is_current(
        &self,
        execution: &Execution,
        request_id: &Uuid,
    ) -> Result<(), ResumeError> {
        let request = match self.ledger.get(request_id).await {
            Ok(request) => request,
            Err(LedgerError::NotFound) => return Err(ResumeError::NoPendingInputFound),
            Err(e) => return Err(e.into()),
        };
        if request.execution_id != execution.id {
            return Err(ResumeError::NoPendingInputFound);
        }
        match request.status {
            InputRequestStatus::Pending => Ok(()),
            InputRequestStatus::Expired => Err(ResumeError::InputExpired { step: request.step }),
            InputRequestStatus::Received | InputRequestStatus::Cancelled => {
                Err(ResumeError::NotWaitingForInput)
            }
        }
    }

    async fn submit(
        &self,
        execution: Execution,
        input: SubmitInput,
    ) -> Result<SubmitOutcome, ResumeError> {
        let open = self.ledger.find_open(&execution.id).await?;
        let mirror_waiting = execution.dynamic_input.is_waiting_for_input;

        if open.is_none() {
            if let Some(step) = self.swept_step(&execution.id).await? {
                return Err(ResumeError::InputExpired { step });
            }
        }

        let request = match open {
            None if mirror_waiting => {
                tracing::warn!(
                    execution_id = %execution.id,
                    step = execution.dynamic_input.current_step,
                    "execution is marked waiting but the ledger has no pending request"
                );
                return Err(ResumeError::NoPendingInputFound);
            }
            None => return Err(ResumeError::NotWaitingForInput),
            Some(_) if execution.status.is_terminal() => {
                return Err(ResumeError::NotWaitingForInput);
            }
            Some(request) => {
                if !mirror_waiting {
                    tracing::warn!(
                        execution_id = %execution.id,
                        step = request.step,
                        "ledger has a pending request the execution mirror does not show"
                    );
                }
                request
            }
        };

        if request.is_expired(Utc::now()) {
            return Err(ResumeError::InputExpired { step: request.step });
        }
        if input.step.is_some_and(|step| step != request.step) {
            tracing::warn!(
                execution_id = %execution.id,
                submitted_step = input.step,
                open_step = request.step,
                "submission targets a step that is no longer open"
            );
            return Err(ResumeError::NoPendingInputFound);
        }

        let serde_json::Value::Object(fields) = &input.input_data else {
            return Err(ResumeError::ValidationFailed(vec![
                "inputData must be an object".to_string(),
            ]));
        };
        let sanitized = validation::validate(fields, &request.input_schema)
            .into_result()
            .map_err(ResumeError::ValidationFailed)?;

        if input.validate_only {
            return Ok(SubmitOutcome::Validated { sanitized });
        }

        self.hand_off(execution, request, sanitized).await
    }

    async fn hand_off(
        &self,
        execution: Execution,
        request: InputRequest,
        sanitized: serde_json::Map<String, serde_json::Value>,
    ) -> Result<SubmitOutcome, ResumeError> {
        let Some(claim) = self.ledger.claim(&request.id).await? else {
            return Err(self.lost_claim(&request).await);
        };

        let sanitized = serde_json::Value::Object(sanitized);
        let payload = ResumePayload {
            execution_id: execution.id,
            request_id: request.id,
            step: request.step,
            input_data: sanitized.clone(),
        };

        let outcome = match self.callback.resume(&request.webhook_url, &payload).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    execution_id = %execution.id,
                    request_id = %request.id,
                    error = %e,
                    "resume callback failed; request left pending"
                );
                if let Err(release_err) = self.ledger.release(&request.id, &claim).await {
                    tracing::error!(request_id = %request.id, error = %release_err, "failed to release claim");
                }
                return Err(ResumeError::ExternalResumeFailed(e.to_string()));
            }
        };

        if let Err(e) = self.ledger.mark_received(&request.id, &claim, &sanitized).await {
            tracing::error!(
                execution_id = %execution.id,
                request_id = %request.id,
                error = %e,
                "input was handed off but the request could not be marked received"
            );
            return Err(e.into());
        }
        self.tracker.receive_input(&execution.id, &sanitized).await?;

        self.events.publish(CoordinatorEvent::InputReceived {
            execution_id: execution.id,
            request_id: request.id,
            step: request.step,
        });
        tracing::info!(
            execution_id = %execution.id,
            request_id = %request.id,
            step = request.step,
            "input handed off to engine"
        );

        let mut finished = false;
        let mut next_request = None;
        match outcome {
            ResumeOutcome::Finished { data } => {
                let duration_ms = elapsed_ms(execution.created_at, Utc::now());
                self.tracker
                    .mark_completed(&execution.id, data, duration_ms)
                    .await?;
                self.events.publish(CoordinatorEvent::ExecutionCompleted {
                    execution_id: execution.id,
                    duration_ms,
                });
                finished = true;
            }
            ResumeOutcome::Paused(next) => {
                next_request = self.open_next_pause(&execution, request.step, next).await?;
            }
            ResumeOutcome::Continuing => {}
        }

        Ok(SubmitOutcome::Submitted {
            execution: self.tracker.get(&execution.id).await?,
            finished,
            waiting_for_more_input: next_request.is_some(),
            next_request,
        })
    }

    /// Decide what a submission that lost the claim race should see.
    async fn lost_claim(&self, request: &InputRequest) -> ResumeError {
        match self.ledger.get(&request.id).await {
            Ok(current) if current.status == InputRequestStatus::Expired => {
                ResumeError::InputExpired { step: current.step }
            }
            Ok(current) if current.is_expired(Utc::now()) => {
                ResumeError::InputExpired { step: current.step }
            }
            Ok(_) => {
                tracing::warn!(
                    execution_id = %request.execution_id,
                    request_id = %request.id,
                    "concurrent submission won the request"
                );
                ResumeError::NoPendingInputFound
            }
            Err(e) => e.into(),
        }
    }

    /// Open the follow-up pause the engine asked for. A malformed pause
    /// fails the execution instead of the submission, which already happened.
    async fn open_next_pause(
        &self,
        execution: &Execution,
        previous_step: u32,
        next: NextPause,
    ) -> Result<Option<InputRequest>, ResumeError> {
        let step = previous_step + 1;
        if let Some(reported) = next.step.filter(|reported| *reported != step) {
            tracing::warn!(
                execution_id = %execution.id,
                reported,
                assigned = step,
                "engine reported a different next step; using the assigned one"
            );
        }

        let opened = match InputSchema::from_value(&next.input_schema) {
            Ok(schema) => {
                self.open_pause(
                    execution,
                    step,
                    &next.webhook_url,
                    schema,
                    next.timeout_at,
                    next.metadata,
                )
                .await
            }
            Err(e) => Err(ResumeError::InvalidSchema(e.to_string())),
        };

        match opened {
            Ok(request) => Ok(Some(request)),
            Err(e) => {
                let reason = format!("engine requested an invalid pause: {e}");
                match self.tracker.mark_failed(&execution.id, &reason).await {
                    Ok(()) => self.events.publish(CoordinatorEvent::ExecutionFailed {
                        execution_id: execution.id,
                        reason,
                    }),
                    Err(ExecutionError::AlreadyTerminal(_)) => {}
                    Err(e) => return Err(e.into()),
                }
                Ok(None)
            }
        }
    }

    async fn open_pause(
        &self,
        execution: &Execution,
        step: u32,
        webhook_url: &str,
        schema: InputSchema,
        timeout_at: DateTime<Utc>,
        metadata: Option<InputRequestMetadata>,
    ) -> Result<InputRequest, ResumeError> {
        let mut metadata = metadata.unwrap_or_default();
        if metadata.workflow_name.is_empty() {
            metadata.workflow_name = execution.workflow_name.clone();
        }

        let request = self
            .ledger
            .create(execution.id, step, webhook_url, schema, timeout_at, metadata)
            .await?;

        if let Err(e) = self.tracker.mark_waiting(&execution.id, step, webhook_url).await {
            if let Err(cancel_err) = self.ledger.mark_cancelled(&request.id).await {
                tracing::error!(request_id = %request.id, error = %cancel_err, "failed to roll back pause");
            }
            return Err(e.into());
        }

        self.events.publish(CoordinatorEvent::InputRequested {
            execution_id: execution.id,
            request_id: request.id,
            step,
            workflow_name: request.metadata.workflow_name.clone(),
            timeout_at,
            priority: request.metadata.priority,
            requires_immediate: request.metadata.requires_immediate,
        });
        Ok(request)
    }
}
