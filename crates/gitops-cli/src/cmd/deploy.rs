use crate::client::Client;
use crate::output::print_json;
use gitops_core::version::Version;
use gitops_server::gateway::DeployResponse;

pub fn run(client: &Client, version: &str, commit: Option<&str>, json: bool) -> anyhow::Result<()> {
    // Reject malformed input before touching the network.
    let version = Version::parse(version)?;
    let query: Vec<(&str, String)> = commit.map(|c| ("commit", c.to_string())).into_iter().collect();
    let resp: DeployResponse = client.post(&format!("/api/deploy/{version}"), &query)?;
    report(&resp, json)
}

pub fn rollback(client: &Client, json: bool) -> anyhow::Result<()> {
    let resp: DeployResponse = client.post("/api/rollback", &[])?;
    report(&resp, json)
}

fn report(resp: &DeployResponse, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(resp);
    }
    println!("{}", resp.message);
    if resp.accepted {
        println!("Run `gitops status` to follow progress.");
    }
    Ok(())
}
