//! API key management commands.

use anyhow::Result;
use console::style;

use humanloop_types::identity::Caller;

use crate::state::AppState;

/// Create an API key and print the plaintext once.
pub async fn create_api_key(
    state: &AppState,
    user: &str,
    workspace: &str,
    name: &str,
    json: bool,
) -> Result<()> {
    let caller = Caller::new(user, workspace);
    let (record, plaintext) = state.api_keys.create(name, &caller).await?;

    if json {
        let out = serde_json::json!({
            "id": record.id,
            "name": record.name,
            "user_id": record.caller.user_id,
            "workspace_id": record.caller.workspace_id,
            "key": plaintext,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} API key '{}' created for {} in {} (save this -- it won't be shown again):",
        style("🔑").bold(),
        style(&record.name).cyan(),
        style(&record.caller.user_id).bold(),
        style(&record.caller.workspace_id).bold()
    );
    println!();
    println!("  {}", style(&plaintext).yellow().bold());
    println!();

    Ok(())
}
