//! Global configuration types for humanloop.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! HTTP listener, the expiry sweeper cadence, and outbound resume callbacks.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.humanloop/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub resume: ResumeConfig,
    #[serde(default)]
    pub forms: FormsConfig,
}

/// HTTP listener settings (overridable from the CLI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Expiry sweeper cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    30
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_sweep_interval(),
        }
    }
}

/// Outbound resume callback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeConfig {
    /// Upper bound for a single callback round-trip.
    #[serde(default = "default_resume_timeout")]
    pub timeout_secs: u64,
    /// Age after which an in-flight claim is considered abandoned.
    #[serde(default = "default_claim_ttl")]
    pub claim_ttl_secs: u64,
    /// When set, callbacks carry an `X-Humanloop-Signature` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_secret: Option<String>,
}

fn default_resume_timeout() -> u64 {
    15
}

fn default_claim_ttl() -> u64 {
    60
}

impl Default for ResumeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_resume_timeout(),
            claim_ttl_secs: default_claim_ttl(),
            signing_secret: None,
        }
    }
}

/// Signed form-link settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormsConfig {
    /// HMAC key for form tokens. Generated and persisted when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<String>,
}
