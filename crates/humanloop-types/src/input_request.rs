//! Input Request domain types.
//!
//! An Input Request is one pause point awaiting a human-supplied payload. Its
//! status leaves `pending` exactly once and never returns to it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::InputSchema;

/// Lifecycle status of an Input Request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputRequestStatus {
    Pending,
    Received,
    Expired,
    Cancelled,
}

impl InputRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputRequestStatus::Pending => "pending",
            InputRequestStatus::Received => "received",
            InputRequestStatus::Expired => "expired",
            InputRequestStatus::Cancelled => "cancelled",
        }
    }

    /// Every status other than `pending` is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InputRequestStatus::Pending)
    }
}

impl std::fmt::Display for InputRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InputRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InputRequestStatus::Pending),
            "received" => Ok(InputRequestStatus::Received),
            "expired" => Ok(InputRequestStatus::Expired),
            "cancelled" => Ok(InputRequestStatus::Cancelled),
            other => Err(format!("unknown input request status '{other}'")),
        }
    }
}

/// Notification priority of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Informational metadata consumed by notification collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRequestMetadata {
    #[serde(default)]
    pub workflow_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub requires_immediate: bool,
}

/// One pause point of an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRequest {
    pub id: Uuid,
    pub execution_id: Uuid,
    /// Monotonically increasing per execution.
    pub step: u32,
    /// Resume address supplied by the engine; unique system-wide.
    pub webhook_url: String,
    pub input_schema: InputSchema,
    pub status: InputRequestStatus,
    pub timeout_at: DateTime<Utc>,
    /// Populated only once `status == received`.
    #[serde(default)]
    pub input_data: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: InputRequestMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl InputRequest {
    /// Build a new `pending` request.
    pub fn new(
        execution_id: Uuid,
        step: u32,
        webhook_url: impl Into<String>,
        input_schema: InputSchema,
        timeout_at: DateTime<Utc>,
        metadata: InputRequestMetadata,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            execution_id,
            step,
            webhook_url: webhook_url.into(),
            input_schema,
            status: InputRequestStatus::Pending,
            timeout_at,
            input_data: None,
            metadata,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    /// Time left before the deadline, floored at zero.
    ///
    /// Only meaningful while the request is `pending`.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        let left = self.timeout_at - now;
        if left < Duration::zero() {
            Duration::zero()
        } else {
            left
        }
    }

    /// `pending` and past its deadline.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == InputRequestStatus::Pending && now > self.timeout_at
    }
}
