use crate::client::Client;
use crate::output::{print_deployments, print_json};
use gitops_server::gateway::DeploymentView;

pub fn run(client: &Client, limit: Option<usize>, json: bool) -> anyhow::Result<()> {
    let query: Vec<(&str, String)> = limit.map(|n| ("limit", n.to_string())).into_iter().collect();
    let records: Vec<DeploymentView> = client.get("/api/history", &query)?;

    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No deployments recorded.");
        return Ok(());
    }
    print_deployments(&records);
    Ok(())
}
