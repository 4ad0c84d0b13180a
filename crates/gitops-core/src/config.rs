use crate::error::{GitopsError, Result};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_initial_version")]
    pub initial_version: String,
    #[serde(default = "default_initial_commit")]
    pub initial_commit: String,
}

fn default_app_name() -> String {
    "dashboard".to_string()
}

fn default_initial_version() -> String {
    "v1.0.0".to_string()
}

fn default_initial_commit() -> String {
    "abc123def".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            initial_version: default_initial_version(),
            initial_commit: default_initial_commit(),
        }
    }
}

// ---------------------------------------------------------------------------
// RetryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum apply attempts for one target, counting the first one.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

impl RetryConfig {
    /// Delay before attempt `failed_attempts + 1`: base * 2^(failed_attempts - 1),
    /// capped at `backoff_max_ms`.
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let exp = failed_attempts.saturating_sub(1).min(32);
        let ms = self
            .backoff_base_ms
            .saturating_mul(1u64 << exp)
            .min(self.backoff_max_ms.max(self.backoff_base_ms));
        Duration::from_millis(ms)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

// ---------------------------------------------------------------------------
// ApplyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyConfig {
    #[serde(default = "default_apply_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_apply_timeout_ms() -> u64 {
    60_000
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_apply_timeout_ms(),
        }
    }
}

impl ApplyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// SimulationConfig
// ---------------------------------------------------------------------------

/// Drives the built-in simulated apply step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Versions whose apply always fails.
    #[serde(default)]
    pub fail_versions: Vec<String>,
    /// Version -> commit the simulated apply reports.
    #[serde(default = "default_commits")]
    pub commits: HashMap<String, String>,
}

fn default_delay_ms() -> u64 {
    3_000
}

fn default_commits() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert("v1.0.0".to_string(), "abc123def".to_string());
    m.insert("v2.0.0".to_string(), "xyz789abc".to_string());
    m
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            fail_versions: Vec::new(),
            commits: default_commits(),
        }
    }
}

// ---------------------------------------------------------------------------
// HistoryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Records included in status snapshots.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

fn default_recent_limit() -> usize {
    20
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            recent_limit: default_recent_limit(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub apply: ApplyConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GitopsError::ConfigNotFound(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load `path` when given, otherwise fall back to built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    pub fn initial_version(&self) -> Result<Version> {
        Version::parse(&self.app.initial_version)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if Version::parse(&self.app.initial_version).is_err() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "app.initial_version '{}' is not a valid version",
                    self.app.initial_version
                ),
            });
        }

        if self.retry.max_retries == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "retry.max_retries is 0; treated as a single attempt".to_string(),
            });
        }

        if self.retry.backoff_max_ms < self.retry.backoff_base_ms {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "retry.backoff_max_ms ({}) is below retry.backoff_base_ms ({})",
                    self.retry.backoff_max_ms, self.retry.backoff_base_ms
                ),
            });
        }

        if self.apply.timeout_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "apply.timeout_ms must be greater than 0".to_string(),
            });
        } else if self.simulation.delay_ms >= self.apply.timeout_ms {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "simulation.delay_ms ({}) reaches apply.timeout_ms ({}); every simulated apply will time out",
                    self.simulation.delay_ms, self.apply.timeout_ms
                ),
            });
        }

        for v in self
            .simulation
            .fail_versions
            .iter()
            .chain(self.simulation.commits.keys())
        {
            if Version::parse(v).is_err() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("simulation entry '{v}' is not a valid version"),
                });
            }
        }

        if self.history.recent_limit == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "history.recent_limit is 0; status will show no deployments".to_string(),
            });
        }

        warnings
    }

    pub fn has_errors(&self) -> bool {
        self.validate().iter().any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
