//! Outbound resume contract with the external workflow engine.
//!
//! The engine exposes one resume address per pause. The coordinator posts the
//! sanitized payload there and the engine replies synchronously with either a
//! completion or the descriptor of its next pause.

use chrono::{DateTime, Utc};
use humanloop_types::input_request::InputRequestMetadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body posted to the engine's resume address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumePayload {
    pub execution_id: Uuid,
    pub request_id: Uuid,
    pub step: u32,
    pub input_data: serde_json::Value,
}

/// Descriptor of the engine's next pause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextPause {
    /// Step the engine believes it is at. The coordinator numbers steps itself.
    #[serde(default)]
    pub step: Option<u32>,
    #[serde(default)]
    pub input_schema: serde_json::Value,
    pub timeout_at: DateTime<Utc>,
    pub webhook_url: String,
    #[serde(default)]
    pub metadata: Option<InputRequestMetadata>,
}

/// Raw synchronous reply of the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeResponse {
    pub finished: bool,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub next_pause: Option<NextPause>,
}

impl ResumeResponse {
    pub fn into_outcome(self) -> ResumeOutcome {
        if self.finished {
            if self.next_pause.is_some() {
                tracing::warn!("engine reported finished with a next pause; ignoring the pause");
            }
            return ResumeOutcome::Finished { data: self.data };
        }
        match self.next_pause {
            Some(next) => ResumeOutcome::Paused(next),
            None => ResumeOutcome::Continuing,
        }
    }
}

/// What the engine did with the handed-off input.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
    /// The workflow ran to completion.
    Finished { data: Option<serde_json::Value> },
    /// The workflow needs another round of human input.
    Paused(NextPause),
    /// The workflow continues without pausing yet.
    Continuing,
}

/// Failure to hand input to the engine. No local state changes on any variant.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallbackError {
    #[error("resume callback timed out")]
    Timeout,

    #[error("resume callback transport error: {0}")]
    Transport(String),

    #[error("resume callback rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("resume callback returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Hands validated input back to the workflow engine.
///
/// Implementations must bound the round-trip with a timeout.
pub trait ResumeCallback: Send + Sync {
    fn resume(
        &self,
        webhook_url: &str,
        payload: &ResumePayload,
    ) -> impl std::future::Future<Output = Result<ResumeOutcome, CallbackError>> + Send;
}
