use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "gitops.yaml";
pub const CONFIG_ENV: &str = "GITOPS_CONFIG";

/// Resolve the config file to load.
///
/// Priority:
/// 1. `--config` flag / `GITOPS_CONFIG` env var (passed in as `explicit`)
/// 2. Walk upward from `start` looking for `gitops.yaml`
/// 3. None: the caller runs on built-in defaults
pub fn resolve_config(explicit: Option<&Path>, start: &Path) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }

    let mut dir = Some(start);
    while let Some(d) = dir {
        let candidate = d.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = d.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_path_wins() {
        let dir = TempDir::new().unwrap();
        let explicit = dir.path().join("custom.yaml");
        let result = resolve_config(Some(&explicit), dir.path());
        assert_eq!(result, Some(explicit));
    }

    #[test]
    fn finds_config_in_ancestor() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "app: {}\n").unwrap();
        let deep = dir.path().join("src/deep");
        std::fs::create_dir_all(&deep).unwrap();

        let result = resolve_config(None, &deep);
        assert_eq!(result, Some(dir.path().join(CONFIG_FILE)));
    }

    #[test]
    fn none_when_absent() {
        let dir = TempDir::new().unwrap();
        let deep = dir.path().join("x");
        std::fs::create_dir_all(&deep).unwrap();
        // A stray gitops.yaml above the temp dir would be found; the temp root
        // itself is empty, so only check the result is not inside it.
        if let Some(found) = resolve_config(None, &deep) {
            assert!(!found.starts_with(dir.path()));
        }
    }
}
