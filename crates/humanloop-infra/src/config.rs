//! Global configuration loader for humanloop.
//!
//! Reads `config.toml` from the data directory (`~/.humanloop/` in production)
//! and deserializes it into [`GlobalConfig`]. Falls back to sensible defaults
//! when the file is missing or malformed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use humanloop_types::config::GlobalConfig;
use secrecy::SecretString;

use crate::crypto::hash::random_hex;

/// Floor for the sweeper interval and the callback timeout.
const MIN_SECS: u64 = 1;

/// File holding the generated form-token key.
const FORM_KEY_FILE: &str = "form_token.key";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `HUMANLOOP_DATA_DIR` environment variable
/// 2. `~/.humanloop`
/// 3. `./.humanloop`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HUMANLOOP_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".humanloop");
    }

    PathBuf::from(".humanloop")
}

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`GlobalConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

/// Timing knobs derived from [`GlobalConfig`] with floors applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub sweep_interval: Duration,
    pub resume_timeout: Duration,
    /// Never shorter than twice the callback timeout, so a claim cannot go
    /// stale while its callback is still in flight.
    pub claim_ttl: Duration,
}

pub fn resolve_timings(config: &GlobalConfig) -> Timings {
    let sweep_interval = config.sweeper.interval_secs.max(MIN_SECS);
    let resume_timeout = config.resume.timeout_secs.max(MIN_SECS);
    let claim_ttl = config.resume.claim_ttl_secs.max(resume_timeout * 2);
    if claim_ttl != config.resume.claim_ttl_secs {
        tracing::warn!(
            configured = config.resume.claim_ttl_secs,
            effective = claim_ttl,
            "claim_ttl_secs raised to twice the resume timeout"
        );
    }
    Timings {
        sweep_interval: Duration::from_secs(sweep_interval),
        resume_timeout: Duration::from_secs(resume_timeout),
        claim_ttl: Duration::from_secs(claim_ttl),
    }
}

/// The HMAC key for form tokens.
///
/// Uses `[forms] token_secret` when set, otherwise reads
/// `{data_dir}/form_token.key`, generating it on first use.
pub async fn load_form_secret(data_dir: &Path, config: &GlobalConfig) -> Result<SecretString, ConfigError> {
    if let Some(secret) = config.forms.token_secret.as_ref().filter(|s| !s.is_empty()) {
        return Ok(SecretString::from(secret.clone()));
    }

    let path = data_dir.join(FORM_KEY_FILE);
    let io_err = |source| ConfigError::Io {
        path: path.clone(),
        source,
    };
    match tokio::fs::read_to_string(&path).await {
        Ok(existing) if !existing.trim().is_empty() => {
            return Ok(SecretString::from(existing.trim().to_string()));
        }
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(io_err(err)),
    }

    tokio::fs::create_dir_all(data_dir).await.map_err(io_err)?;
    let secret = random_hex(32);
    tokio::fs::write(&path, &secret).await.map_err(io_err)?;
    tracing::info!("Generated form token key at {}", path.display());
    Ok(SecretString::from(secret))
}
