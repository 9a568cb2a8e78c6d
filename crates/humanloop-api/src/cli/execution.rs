//! Execution inspection commands.

use anyhow::{Context, Result};
use chrono::Utc;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use humanloop_types::execution::ExecutionStatus;
use humanloop_types::input_request::InputRequestStatus;

use crate::state::AppState;

fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => format!("{}", style("○ pending").dim()),
        ExecutionStatus::Running => format!("{}", style("● running").cyan()),
        ExecutionStatus::WaitingForInput => format!("{}", style("◐ waiting for input").yellow()),
        ExecutionStatus::Completed => format!("{}", style("✓ completed").green()),
        ExecutionStatus::Failed => format!("{}", style("✗ failed").red()),
    }
}

fn request_status_cell(status: InputRequestStatus) -> Cell {
    match status {
        InputRequestStatus::Pending => Cell::new("● pending").fg(Color::Yellow),
        InputRequestStatus::Received => Cell::new("✓ received").fg(Color::Green),
        InputRequestStatus::Expired => Cell::new("✗ expired").fg(Color::Red),
        InputRequestStatus::Cancelled => Cell::new("◌ cancelled").fg(Color::DarkGrey),
    }
}

/// Show an execution with its input request history.
pub async fn show_execution(state: &AppState, id: &str, json: bool) -> Result<()> {
    let id: Uuid = id
        .parse()
        .with_context(|| format!("'{id}' is not a valid execution id"))?;
    let execution = state.coordinator.tracker().get(&id).await?;
    let history = state.coordinator.ledger().history(&id).await?;

    if json {
        let out = serde_json::json!({
            "execution": execution,
            "inputRequests": history,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style(&execution.workflow_name).cyan().bold(),
        style(format!("({})", execution.workflow_id)).dim()
    );
    println!();

    println!("  {}", style("── Details ──").dim());
    println!("  {}         {}", style("ID:").bold(), style(execution.id).dim());
    println!("  {}     {}", style("Status:").bold(), format_status(execution.status));
    println!(
        "  {}      {} / {}",
        style("Owner:").bold(),
        execution.user_id,
        execution.workspace_id
    );
    if execution.dynamic_input.is_waiting_for_input {
        println!(
            "  {}    step {}",
            style("Waiting:").bold(),
            execution.dynamic_input.current_step
        );
    }
    if let Some(error) = &execution.error {
        println!("  {}      {}", style("Error:").bold(), style(error).red());
    }
    if let Some(ms) = execution.duration_ms {
        println!("  {}   {ms} ms", style("Duration:").bold());
    }
    println!();

    if history.is_empty() {
        println!("  {}", style("No input requests yet.").dim());
        println!();
        return Ok(());
    }

    let now = Utc::now();
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Step").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Deadline").fg(Color::White),
        Cell::new("Webhook").fg(Color::White),
    ]);

    for request in &history {
        let deadline = if request.is_expired(now) {
            format!("{} (overdue)", request.timeout_at.format("%Y-%m-%d %H:%M:%S"))
        } else {
            request.timeout_at.format("%Y-%m-%d %H:%M:%S").to_string()
        };
        table.add_row(vec![
            Cell::new(request.step).fg(Color::Cyan),
            request_status_cell(request.status),
            Cell::new(deadline).fg(Color::DarkGrey),
            Cell::new(&request.webhook_url),
        ]);
    }

    println!("  {}", style("── Input Requests ──").dim());
    println!("{table}");
    println!();

    Ok(())
}
