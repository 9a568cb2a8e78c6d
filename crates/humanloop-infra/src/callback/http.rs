//! HTTP implementation of `ResumeCallback`.
//!
//! Posts the resume payload as JSON to the request's webhook URL with a
//! bounded timeout. When a signing secret is configured the raw body is
//! signed with HMAC-SHA256 and the signature sent in `X-Humanloop-Signature`.

use std::time::Duration;

use humanloop_core::resume::{CallbackError, ResumeCallback, ResumeOutcome, ResumePayload, ResumeResponse};
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};

use crate::crypto::signature::{SIGNATURE_HEADER, signature_header_value};

/// Longest slice of an error body kept in `CallbackError::Rejected`.
const MAX_ERROR_BODY: usize = 512;

pub struct HttpResumeCallback {
    client: reqwest::Client,
    signing_secret: Option<SecretString>,
}

impl HttpResumeCallback {
    pub fn new(timeout: Duration, signing_secret: Option<SecretString>) -> Result<Self, CallbackError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("humanloop/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CallbackError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            signing_secret,
        })
    }
}

fn transport_error(e: reqwest::Error) -> CallbackError {
    if e.is_timeout() {
        CallbackError::Timeout
    } else {
        CallbackError::Transport(e.to_string())
    }
}

impl ResumeCallback for HttpResumeCallback {
    async fn resume(
        &self,
        webhook_url: &str,
        payload: &ResumePayload,
    ) -> Result<ResumeOutcome, CallbackError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| CallbackError::Transport(format!("serialize payload: {e}")))?;

        let mut request = self
            .client
            .post(webhook_url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(secret) = &self.signing_secret {
            let signature = signature_header_value(secret.expose_secret().as_bytes(), &body)
                .map_err(|e| CallbackError::Transport(e.to_string()))?;
            request = request.header(SIGNATURE_HEADER, signature);
        }

        tracing::debug!(
            execution_id = %payload.execution_id,
            step = payload.step,
            "dispatching resume callback"
        );
        let response = request.body(body).send().await.map_err(transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;
        if !status.is_success() {
            let mut text = String::from_utf8_lossy(&bytes).into_owned();
            if text.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| text.is_char_boundary(*i))
                    .unwrap_or(0);
                text.truncate(cut);
            }
            return Err(CallbackError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(ResumeOutcome::Continuing);
        }
        let parsed: ResumeResponse = serde_json::from_slice(&bytes)
            .map_err(|e| CallbackError::InvalidResponse(e.to_string()))?;
        Ok(parsed.into_outcome())
    }
}
