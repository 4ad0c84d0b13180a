use gitops_core::paths::resolve_config;
use std::path::{Path, PathBuf};

/// Resolve the config file for this invocation.
///
/// Priority:
/// 1. `--config` flag / `GITOPS_CONFIG` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `gitops.yaml`
/// 3. None: built-in defaults apply
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_config(explicit, &cwd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_config_wins() {
        let dir = TempDir::new().unwrap();
        let explicit = dir.path().join("elsewhere.yaml");
        assert_eq!(resolve_config_path(Some(&explicit)), Some(explicit));
    }
}
