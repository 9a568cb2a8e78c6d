//! One-shot expiry sweep.

use anyhow::Result;
use chrono::Utc;
use console::style;
use tracing::Instrument;

use humanloop_observe::spans;

use crate::state::AppState;

/// Run a single sweep pass now and print the report.
pub async fn sweep(state: &AppState, json: bool) -> Result<()> {
    let report = state
        .sweeper
        .sweep_once(Utc::now())
        .instrument(tracing::info_span!(spans::SWEEP))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    if report.scanned == 0 {
        println!("  {} No overdue input requests.", style("✓").green());
    } else {
        println!(
            "  {} Expired {} of {} overdue request{}",
            style("⏱").bold(),
            style(report.expired).bold(),
            report.scanned,
            if report.scanned == 1 { "" } else { "s" }
        );
        if report.skipped > 0 {
            println!(
                "  {}",
                style(format!("{} resolved concurrently and were skipped", report.skipped)).dim()
            );
        }
    }
    println!();

    Ok(())
}
