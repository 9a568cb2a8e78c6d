//! System status dashboard command.

use anyhow::Result;
use console::style;

use humanloop_types::execution::ExecutionStatus;

use crate::state::AppState;

const ORDER: [ExecutionStatus; 5] = [
    ExecutionStatus::Pending,
    ExecutionStatus::Running,
    ExecutionStatus::WaitingForInput,
    ExecutionStatus::Completed,
    ExecutionStatus::Failed,
];

/// Display system status dashboard.
///
/// Shows execution counts by status, pending input requests, and version.
pub async fn status(state: &AppState, json: bool) -> Result<()> {
    let counts = state.coordinator.tracker().count_by_status().await?;
    let pending_requests = state.coordinator.ledger().count_pending().await?;
    let count_of = |status: ExecutionStatus| {
        counts
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    };
    let total: u64 = counts.iter().map(|(_, n)| n).sum();

    if json {
        let mut executions = serde_json::Map::new();
        executions.insert("total".to_string(), total.into());
        for status in ORDER {
            executions.insert(status.as_str().to_string(), count_of(status).into());
        }
        let out = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "data_dir": state.data_dir.display().to_string(),
            "executions": executions,
            "pending_input_requests": pending_requests,
            "sweeper": {
                "enabled": state.config.sweeper.enabled,
                "interval_secs": state.timings.sweep_interval.as_secs(),
            },
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} humanloop v{}",
        style("⚡").bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("  {}", style("── Executions ──").dim());
    println!("  Total:             {}", style(total).bold());
    println!("  Running:           {}", style(count_of(ExecutionStatus::Running)).cyan());
    println!(
        "  Waiting for input: {}",
        style(count_of(ExecutionStatus::WaitingForInput)).yellow()
    );
    println!("  Completed:         {}", style(count_of(ExecutionStatus::Completed)).green());
    let failed = count_of(ExecutionStatus::Failed);
    if failed > 0 {
        println!("  Failed:            {}", style(failed).red());
    }
    let pending = count_of(ExecutionStatus::Pending);
    if pending > 0 {
        println!("  Pending:           {}", style(pending).dim());
    }
    println!();

    println!("  {}", style("── Input Requests ──").dim());
    println!("  Pending: {}", style(pending_requests).bold());
    println!();

    println!("  {}", style("── System ──").dim());
    println!("  Data dir: {}", style(state.data_dir.display()).dim());
    println!("  Database: {}", style("SQLite (WAL mode)").dim());
    println!(
        "  Sweeper:  {}",
        if state.config.sweeper.enabled {
            style(format!("every {}s", state.timings.sweep_interval.as_secs())).dim()
        } else {
            style("disabled".to_string()).yellow()
        }
    );
    println!();

    Ok(())
}
