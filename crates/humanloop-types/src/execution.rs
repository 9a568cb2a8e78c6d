//! Execution domain types.
//!
//! An `Execution` is one run of an externally orchestrated workflow, tracked
//! locally for status and pause state. The `dynamic_input` block is a
//! denormalized mirror of the Input Request ledger used for fast display; the
//! ledger is the source of truth whenever the two disagree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Launched but not yet picked up by the workflow engine.
    Pending,
    /// The engine is executing steps.
    Running,
    /// Paused on a human-input request.
    WaitingForInput,
    /// Finished successfully (terminal).
    Completed,
    /// Finished with an error or a timed-out input request (terminal).
    Failed,
}

impl ExecutionStatus {
    /// Whether the execution can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }

    /// Stable string form used in storage and query parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::WaitingForInput => "waiting_for_input",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "running" => Ok(ExecutionStatus::Running),
            "waiting_for_input" => Ok(ExecutionStatus::WaitingForInput),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(format!("unknown execution status '{other}'")),
        }
    }
}

/// Mirror of the currently outstanding Input Request, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicInput {
    pub is_waiting_for_input: bool,
    pub current_step: u32,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl DynamicInput {
    /// Mirror state for a freshly registered pause.
    pub fn waiting(step: u32, webhook_url: impl Into<String>) -> Self {
        Self {
            is_waiting_for_input: true,
            current_step: step,
            webhook_url: Some(webhook_url.into()),
        }
    }

    /// Mirror state once the outstanding request left `pending`.
    ///
    /// The step counter is kept so clients can still see how far the
    /// execution progressed.
    pub fn cleared(&self) -> Self {
        Self {
            is_waiting_for_input: false,
            current_step: self.current_step,
            webhook_url: None,
        }
    }
}

/// One run of an externally orchestrated workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: Uuid,
    /// Owning user.
    pub user_id: String,
    /// Owning tenant.
    pub workspace_id: String,
    /// Reference to the workflow definition in the external engine.
    pub workflow_id: String,
    /// Display name of the workflow.
    pub workflow_name: String,
    pub status: ExecutionStatus,
    pub dynamic_input: DynamicInput,
    /// Accumulated input payloads, keyed by field name.
    pub input_data: serde_json::Value,
    #[serde(default)]
    pub output_data: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Execution {
    /// Build a freshly launched execution in `running` state.
    pub fn launch(
        owner: &crate::identity::Caller,
        workflow_id: impl Into<String>,
        workflow_name: impl Into<String>,
        input_data: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id: owner.user_id.clone(),
            workspace_id: owner.workspace_id.clone(),
            workflow_id: workflow_id.into(),
            workflow_name: workflow_name.into(),
            status: ExecutionStatus::Running,
            dynamic_input: DynamicInput::default(),
            input_data: input_data.unwrap_or_else(|| serde_json::json!({})),
            output_data: None,
            error: None,
            duration_ms: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Whether `caller` owns this execution (same user and same workspace).
    pub fn is_owned_by(&self, caller: &crate::identity::Caller) -> bool {
        self.user_id == caller.user_id && self.workspace_id == caller.workspace_id
    }
}

/// Merge `incoming` object fields into the `accumulated` input blob.
///
/// Non-object accumulators are replaced by an object. Later keys overwrite
/// earlier ones.
pub fn merge_input(accumulated: &serde_json::Value, incoming: &serde_json::Value) -> serde_json::Value {
    let mut merged = match accumulated {
        serde_json::Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    if let serde_json::Value::Object(fields) = incoming {
        for (key, value) in fields {
            merged.insert(key.clone(), value.clone());
        }
    }
    serde_json::Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Caller;
    use serde_json::json;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::Running,
            ExecutionStatus::WaitingForInput,
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
        ] {
            let parsed: ExecutionStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("paused".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_value(ExecutionStatus::WaitingForInput).unwrap();
        assert_eq!(json, json!("waiting_for_input"));
    }

    #[test]
    fn terminal_statuses() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(!ExecutionStatus::WaitingForInput.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
    }

    #[test]
    fn dynamic_input_uses_camel_case() {
        let mirror = DynamicInput::waiting(2, "https://engine/resume/abc");
        let json = serde_json::to_value(&mirror).unwrap();
        assert_eq!(json["isWaitingForInput"], true);
        assert_eq!(json["currentStep"], 2);
        assert_eq!(json["webhookUrl"], "https://engine/resume/abc");

        let cleared = mirror.cleared();
        assert!(!cleared.is_waiting_for_input);
        assert_eq!(cleared.current_step, 2);
        assert!(cleared.webhook_url.is_none());
    }

    #[test]
    fn ownership_requires_user_and_workspace() {
        let owner = Caller::new("u1", "w1");
        let exec = Execution::launch(&owner, "wf-1", "Onboarding", None);
        assert!(exec.is_owned_by(&owner));
        assert!(!exec.is_owned_by(&Caller::new("u1", "w2")));
        assert!(!exec.is_owned_by(&Caller::new("u2", "w1")));
    }

    #[test]
    fn merge_input_overwrites_and_keeps() {
        let merged = merge_input(&json!({"a": 1, "b": 2}), &json!({"b": 3, "c": 4}));
        assert_eq!(merged, json!({"a": 1, "b": 3, "c": 4}));

        let from_null = merge_input(&serde_json::Value::Null, &json!({"x": true}));
        assert_eq!(from_null, json!({"x": true}));
    }
}
