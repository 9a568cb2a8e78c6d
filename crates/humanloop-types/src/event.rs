//! Coordinator events for notification collaborators.
//!
//! `CoordinatorEvent` is broadcast whenever an input request or execution
//! changes state. Delivery is fire-and-forget: subscribers may lag or be
//! absent without affecting the coordinator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::input_request::Priority;

/// Events emitted by the human-input coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinatorEvent {
    /// The engine paused an execution and a form is waiting for a human.
    InputRequested {
        execution_id: Uuid,
        request_id: Uuid,
        step: u32,
        workflow_name: String,
        timeout_at: DateTime<Utc>,
        priority: Priority,
        requires_immediate: bool,
    },

    /// Validated input was handed off to the engine.
    InputReceived {
        execution_id: Uuid,
        request_id: Uuid,
        step: u32,
    },

    /// A pending request was cancelled administratively.
    InputCancelled {
        execution_id: Uuid,
        request_id: Uuid,
        step: u32,
    },

    /// A pending request passed its deadline without a submission.
    InputExpired {
        execution_id: Uuid,
        request_id: Uuid,
        step: u32,
    },

    /// The engine reported that the workflow finished.
    ExecutionCompleted { execution_id: Uuid, duration_ms: u64 },

    /// The execution failed (for example on an input timeout).
    ExecutionFailed { execution_id: Uuid, reason: String },
}

impl CoordinatorEvent {
    /// Stable snake_case name, identical to the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            CoordinatorEvent::InputRequested { .. } => "input_requested",
            CoordinatorEvent::InputReceived { .. } => "input_received",
            CoordinatorEvent::InputCancelled { .. } => "input_cancelled",
            CoordinatorEvent::InputExpired { .. } => "input_expired",
            CoordinatorEvent::ExecutionCompleted { .. } => "execution_completed",
            CoordinatorEvent::ExecutionFailed { .. } => "execution_failed",
        }
    }

    pub fn execution_id(&self) -> Uuid {
        match self {
            CoordinatorEvent::InputRequested { execution_id, .. }
            | CoordinatorEvent::InputReceived { execution_id, .. }
            | CoordinatorEvent::InputCancelled { execution_id, .. }
            | CoordinatorEvent::InputExpired { execution_id, .. }
            | CoordinatorEvent::ExecutionCompleted { execution_id, .. }
            | CoordinatorEvent::ExecutionFailed { execution_id, .. } => *execution_id,
        }
    }
}
