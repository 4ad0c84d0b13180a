//! The apply seam: the external action that actually rolls a version out.
//!
//! The scheduler only sees the [`Apply`] trait. [`SimulatedApply`] stands in
//! for a real delivery mechanism (registry push, cluster rollout, ...).

use async_trait::async_trait;
use gitops_core::config::SimulationConfig;
use gitops_core::version::Version;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("apply failed: {0}")]
    Failed(String),

    #[error("apply timed out after {0:?}")]
    Timeout(Duration),
}

/// One apply invocation.
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub version: Version,
    /// Commit supplied by the caller, if it already knows it.
    pub commit: Option<String>,
    /// 1-based attempt number for this target.
    pub attempt: u32,
}

/// Drive the real system to `request.version`. Returns the deployed commit.
#[async_trait]
pub trait Apply: Send + Sync {
    async fn apply(&self, request: &ApplyRequest) -> Result<String, ApplyError>;
}

// ---------------------------------------------------------------------------
// SimulatedApply
// ---------------------------------------------------------------------------

/// Sleeps for a fixed delay, then reports success unless the version is
/// configured to fail.
#[derive(Debug, Clone)]
pub struct SimulatedApply {
    delay: Duration,
    fail_versions: HashSet<String>,
    commits: HashMap<String, String>,
}

impl SimulatedApply {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            fail_versions: HashSet::new(),
            commits: HashMap::new(),
        }
    }

    pub fn from_config(cfg: &SimulationConfig) -> Self {
        Self {
            delay: Duration::from_millis(cfg.delay_ms),
            fail_versions: cfg.fail_versions.iter().cloned().collect(),
            commits: cfg.commits.clone(),
        }
    }

    pub fn failing(mut self, version: impl Into<String>) -> Self {
        self.fail_versions.insert(version.into());
        self
    }

    fn commit_for(&self, request: &ApplyRequest) -> String {
        if let Some(c) = &request.commit {
            return c.clone();
        }
        if let Some(c) = self.commits.get(request.version.as_str()) {
            return c.clone();
        }
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(9);
        id
    }
}

#[async_trait]
impl Apply for SimulatedApply {
    async fn apply(&self, request: &ApplyRequest) -> Result<String, ApplyError> {
        tracing::debug!(
            version = %request.version,
            attempt = request.attempt,
            delay_ms = self.delay.as_millis() as u64,
            "simulated apply started"
        );
        tokio::time::sleep(self.delay).await;

        if self.fail_versions.contains(request.version.as_str()) {
            return Err(ApplyError::Failed(format!(
                "simulated failure for {}",
                request.version
            )));
        }
        Ok(self.commit_for(request))
    }
}
