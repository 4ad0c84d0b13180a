mod client;
mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gitops",
    about = "GitOps reconciliation tracker: deploy versions, watch sync status, roll back",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: nearest gitops.yaml, else built-in defaults)
    #[arg(long, global = true, env = "GITOPS_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of a running gateway
    #[arg(
        long,
        global = true,
        env = "GITOPS_SERVER",
        default_value = "http://localhost:3000"
    )]
    server: String,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the status gateway and dashboard
    Serve {
        /// Port to listen on (0 = OS-assigned)
        #[arg(long, default_value = "3000")]
        port: u16,

        /// Open the dashboard in a browser
        #[arg(long)]
        open: bool,
    },

    /// Show the current reconciliation status
    Status,

    /// Request a deploy of VERSION
    Deploy {
        /// Semantic version, e.g. v2.0.0
        #[arg(id = "target_version", value_name = "VERSION")]
        version: String,

        /// Commit to record for this version
        #[arg(long)]
        commit: Option<String>,
    },

    /// Roll back to the previous good version
    Rollback,

    /// Show deployment history, newest first
    History {
        /// Maximum number of records (default: server's recent limit)
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Inspect and validate configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let config_path = root::resolve_config_path(cli.config.as_deref());
    let client = client::Client::new(&cli.server);

    let result = match cli.command {
        Commands::Serve { port, open } => cmd::serve::run(config_path.as_deref(), port, open),
        Commands::Status => cmd::status::run(&client, cli.json),
        Commands::Deploy { version, commit } => {
            cmd::deploy::run(&client, &version, commit.as_deref(), cli.json)
        }
        Commands::Rollback => cmd::deploy::rollback(&client, cli.json),
        Commands::History { limit } => cmd::history::run(&client, limit, cli.json),
        Commands::Config { subcommand } => {
            cmd::config::run(config_path.as_deref(), subcommand, cli.json)
        }
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
