use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use gitops_core::config::{Config, WarnLevel};
use gitops_core::paths::CONFIG_FILE;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,

    /// Write a default gitops.yaml (never overwrites)
    Init {
        /// Target path (default: ./gitops.yaml)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(config_path: Option<&Path>, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(config_path, json),
        ConfigSubcommand::Validate => validate(config_path, json),
        ConfigSubcommand::Init { path } => init(path, json),
    }
}

fn load(config_path: Option<&Path>) -> anyhow::Result<Config> {
    Config::load_or_default(config_path).context("failed to load config")
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(config_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = load(config_path)?;

    if json {
        let value = serde_json::json!({
            "path": config_path.map(|p| p.display().to_string()),
            "config": config,
        });
        return print_json(&value);
    }

    match config_path {
        Some(p) => println!("# {}", p.display()),
        None => println!("# built-in defaults"),
    }
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(config_path: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = load(config_path)?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(path: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let data = serde_yaml::to_string(&Config::default())?;
    let created = gitops_core::io::write_if_missing(&path, data.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    if json {
        let value = serde_json::json!({
            "path": path.display().to_string(),
            "created": created,
        });
        return print_json(&value);
    }

    if created {
        println!("Wrote {}", path.display());
    } else {
        println!("{} already exists; left unchanged", path.display());
    }
    Ok(())
}
