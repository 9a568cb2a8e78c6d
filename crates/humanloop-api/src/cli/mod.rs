//! CLI command definitions and dispatch for the `hloop` binary.
//!
//! Uses clap derive macros for argument parsing. Resource commands follow a
//! noun-verb pattern (e.g., `hloop api-key create`, `hloop execution show`).

pub mod api_key;
pub mod execution;
pub mod status;
pub mod sweep;

use clap::{Parser, Subcommand};

/// Coordinate human-in-the-loop pauses for external workflows.
#[derive(Parser)]
#[command(name = "hloop", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server and the expiry sweeper.
    Serve {
        /// Port to listen on (defaults to config.toml, then 3000).
        #[arg(long, short)]
        port: Option<u16>,

        /// Host to bind to (defaults to config.toml, then 127.0.0.1).
        #[arg(long)]
        host: Option<String>,

        /// Export spans to stdout through OpenTelemetry.
        #[arg(long)]
        otel: bool,
    },

    /// Run one expiry sweep and report what was reaped.
    Sweep,

    /// Manage API keys.
    #[command(name = "api-key")]
    ApiKey {
        #[command(subcommand)]
        action: ApiKeyAction,
    },

    /// Inspect executions.
    Execution {
        #[command(subcommand)]
        action: ExecutionAction,
    },

    /// Show execution counts and pending input requests.
    Status,
}

#[derive(Subcommand)]
pub enum ApiKeyAction {
    /// Create a key bound to one user in one workspace.
    Create {
        /// User the key authenticates as.
        #[arg(long)]
        user: String,

        /// Workspace the key is scoped to.
        #[arg(long)]
        workspace: String,

        /// Label for the key.
        #[arg(long, default_value = "default")]
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ExecutionAction {
    /// Show an execution and its input request history.
    Show {
        /// Execution ID.
        id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_api_key_create() {
        let cli = Cli::parse_from([
            "hloop", "api-key", "create", "--user", "u1", "--workspace", "w1",
        ]);
        match cli.command {
            Commands::ApiKey {
                action: ApiKeyAction::Create { user, workspace, name },
            } => {
                assert_eq!(user, "u1");
                assert_eq!(workspace, "w1");
                assert_eq!(name, "default");
            }
            _ => panic!("expected api-key create"),
        }
    }

    #[test]
    fn global_flags_apply_after_subcommand() {
        let cli = Cli::parse_from(["hloop", "status", "--json", "-vv"]);
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn serve_overrides_are_optional() {
        let cli = Cli::parse_from(["hloop", "serve", "--port", "8080"]);
        match cli.command {
            Commands::Serve { port, host, otel } => {
                assert_eq!(port, Some(8080));
                assert!(host.is_none());
                assert!(!otel);
            }
            _ => panic!("expected serve"),
        }
    }
}
