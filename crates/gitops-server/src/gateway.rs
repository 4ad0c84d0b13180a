//! Caller-facing boundary: turns external requests into scheduler calls and
//! renders snapshots into the JSON shape the dashboard consumes.

use chrono::{DateTime, Utc};
use gitops_core::config::Config;
use gitops_core::error::Result;
use gitops_core::history::DeploymentRecord;
use gitops_core::machine::{ReconciliationMachine, RequestOutcome};
use gitops_core::types::{Health, Outcome, SyncKind, SyncStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::apply::{Apply, SimulatedApply};
use crate::scheduler::{DeployAck, DeploymentScheduler, SchedulerOptions, Snapshot};

// ---------------------------------------------------------------------------
// Rendered views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub app: String,
    pub current_version: String,
    pub target_version: String,
    pub status: SyncStatus,
    pub health: Health,
    #[serde(rename = "lastSync")]
    pub last_sync_at: DateTime<Utc>,
    pub kind: SyncKind,
    pub attempt: u32,
    pub max_attempts: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub retries_exhausted: bool,
    pub generation: u64,
    pub deployments: Vec<DeploymentView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentView {
    pub version: String,
    pub commit: String,
    pub timestamp: DateTime<Utc>,
    pub status: Outcome,
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&DeploymentRecord> for DeploymentView {
    fn from(r: &DeploymentRecord) -> Self {
        Self {
            version: r.version.to_string(),
            commit: r.commit.clone(),
            timestamp: r.timestamp,
            status: r.outcome,
            attempt: r.attempt,
            error: r.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResponse {
    pub message: String,
    pub accepted: bool,
    pub version: String,
    pub outcome: RequestOutcome,
    pub generation: u64,
}

impl From<DeployAck> for DeployResponse {
    fn from(ack: DeployAck) -> Self {
        Self {
            accepted: ack.accepted(),
            message: ack.message,
            version: ack.version.to_string(),
            outcome: ack.outcome,
            generation: ack.generation,
        }
    }
}

// ---------------------------------------------------------------------------
// StatusGateway
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct StatusGateway {
    app: Arc<str>,
    scheduler: DeploymentScheduler,
    recent_limit: usize,
}

impl StatusGateway {
    pub fn new(app: impl Into<String>, scheduler: DeploymentScheduler, recent_limit: usize) -> Self {
        Self {
            app: Arc::from(app.into()),
            scheduler,
            recent_limit,
        }
    }

    /// Build the full stack from config with the given apply implementation.
    pub fn from_config(config: &Config, apply: Arc<dyn Apply>) -> Result<Self> {
        let machine = ReconciliationMachine::new(
            config.initial_version()?,
            config.app.initial_commit.clone(),
        );
        let scheduler = DeploymentScheduler::new(
            machine,
            apply,
            SchedulerOptions {
                retry: config.retry.clone(),
                apply_timeout: config.apply.timeout(),
            },
        );
        Ok(Self::new(
            config.app.name.clone(),
            scheduler,
            config.history.recent_limit,
        ))
    }

    /// Build the full stack with the simulated apply step from `config.simulation`.
    pub fn simulated(config: &Config) -> Result<Self> {
        let apply = SimulatedApply::from_config(&config.simulation);
        Self::from_config(config, Arc::new(apply))
    }

    pub fn scheduler(&self) -> &DeploymentScheduler {
        &self.scheduler
    }

    /// Consistent point-in-time status. Always succeeds.
    pub fn get_status(&self) -> StatusView {
        self.render(&self.scheduler.snapshot())
    }

    /// Fire-and-forget deploy; progress is observed through `get_status`.
    pub fn deploy(&self, version: &str, commit: Option<String>) -> Result<DeployResponse> {
        self.scheduler
            .request_deploy(version, commit)
            .map(DeployResponse::from)
    }

    pub fn rollback(&self) -> Result<DeployResponse> {
        self.scheduler.request_rollback().map(DeployResponse::from)
    }

    pub fn history(&self, limit: usize) -> Vec<DeploymentView> {
        let snap = self.scheduler.snapshot();
        snap.history.list(limit).map(DeploymentView::from).collect()
    }

    pub fn render(&self, snap: &Snapshot) -> StatusView {
        let s = &snap.state;
        StatusView {
            app: self.app.to_string(),
            current_version: s.current_version.to_string(),
            target_version: s.target_version.to_string(),
            status: s.status,
            health: s.health,
            last_sync_at: s.last_sync_at,
            kind: s.kind,
            attempt: s.attempt,
            max_attempts: self.scheduler.options().retry.max_attempts(),
            next_retry_at: s.next_retry_at,
            last_error: s.last_error.clone(),
            retries_exhausted: s.retries_exhausted,
            generation: snap.generation,
            deployments: snap
                .history
                .list(self.recent_limit)
                .map(DeploymentView::from)
                .collect(),
        }
    }
}
