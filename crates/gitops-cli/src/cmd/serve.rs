use anyhow::Context;
use gitops_core::config::Config;
use std::path::Path;

pub fn run(config_path: Option<&Path>, port: u16, open: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(config_path).context("failed to load config")?;
    if config.has_errors() {
        anyhow::bail!("config has errors; run `gitops config validate` for details");
    }
    match config_path {
        Some(p) => tracing::info!(path = %p.display(), "loaded config"),
        None => tracing::info!("no gitops.yaml found; using built-in defaults"),
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        let actual_port = listener.local_addr()?.port();
        println!("GitOps dashboard for '{}' → http://localhost:{actual_port}", config.app.name);

        tokio::select! {
            res = gitops_server::serve_on(config, listener, open) => res,
            _ = tokio::signal::ctrl_c() => Ok(()),
        }
    })
}
