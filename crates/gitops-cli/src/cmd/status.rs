use crate::client::Client;
use crate::output::{print_deployments, print_json};
use gitops_server::gateway::StatusView;

pub fn run(client: &Client, json: bool) -> anyhow::Result<()> {
    let status: StatusView = client.get("/api/status", &[])?;

    if json {
        return print_json(&status);
    }

    println!("App:        {}", status.app);
    println!("Current:    {}", status.current_version);
    println!("Target:     {}", status.target_version);
    println!("Status:     {}", status.status);
    println!("Health:     {}", status.health);
    println!(
        "Last sync:  {}",
        status.last_sync_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if status.status != gitops_core::types::SyncStatus::Synced {
        println!("Attempt:    {}/{}", status.attempt, status.max_attempts);
    }
    if let Some(at) = status.next_retry_at {
        println!("Next retry: {}", at.format("%H:%M:%S UTC"));
    }
    if status.retries_exhausted {
        println!("Retries exhausted; deploy again to restart.");
    }
    if let Some(err) = &status.last_error {
        println!("Last error: {err}");
    }

    if !status.deployments.is_empty() {
        println!();
        print_deployments(&status.deployments);
    }
    Ok(())
}
