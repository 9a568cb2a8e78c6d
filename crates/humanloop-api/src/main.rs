//! humanloop CLI and REST API entry point.
//!
//! Binary name: `hloop`
//!
//! Parses CLI arguments, initializes database and services, then dispatches
//! to the appropriate command handler or starts the REST API server together
//! with the expiry sweeper.

mod cli;
mod http;
mod state;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use cli::{ApiKeyAction, Cli, Commands, ExecutionAction};
use humanloop_core::event::logger::spawn_event_logger;
use humanloop_observe::telemetry::{TelemetryConfig, init_telemetry};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let otel = matches!(cli.command, Commands::Serve { otel: true, .. });
    let telemetry = TelemetryConfig::new(cli.verbose, cli.quiet).with_span_export(otel);
    let _telemetry = init_telemetry(&telemetry)
        .inspect_err(|e| eprintln!("Warning: failed to initialize tracing: {e}"))
        .ok();

    let state = AppState::init().await?;

    match cli.command {
        Commands::Serve { port, host, .. } => serve(state, host, port).await,
        Commands::Sweep => cli::sweep::sweep(&state, cli.json).await,
        Commands::ApiKey {
            action:
                ApiKeyAction::Create {
                    user,
                    workspace,
                    name,
                },
        } => cli::api_key::create_api_key(&state, &user, &workspace, &name, cli.json).await,
        Commands::Execution {
            action: ExecutionAction::Show { id },
        } => cli::execution::show_execution(&state, &id, cli.json).await,
        Commands::Status => cli::status::status(&state, cli.json).await,
    }
}

async fn serve(state: AppState, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| state.config.server.host.clone());
    let port = port.unwrap_or(state.config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let cancel = CancellationToken::new();
    let logger = spawn_event_logger(&state.events, cancel.clone());
    let sweeper = if state.config.sweeper.enabled {
        Some(
            state
                .sweeper
                .clone()
                .spawn(state.timings.sweep_interval, cancel.clone()),
        )
    } else {
        tracing::warn!("expiry sweeper disabled by config");
        None
    };

    println!(
        "  {} humanloop API listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cancel.cancel();
    if let Some(sweeper) = sweeper {
        let _ = sweeper.await;
    }
    let _ = logger.await;

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
