use crate::error::{GitopsError, Result};
use crate::history::{DeploymentRecord, VersionHistory};
use crate::types::{Health, SyncKind, SyncStatus};
use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ReconciliationState
// ---------------------------------------------------------------------------

/// The current/target/status/health tuple for the managed application.
///
/// Invariants upheld by [`ReconciliationMachine`]:
/// - `status == Synced` implies `current_version == target_version`
/// - `status == Syncing` implies an apply is in flight for `target_version`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationState {
    pub current_version: Version,
    pub target_version: Version,
    pub status: SyncStatus,
    pub health: Health,
    pub last_sync_at: DateTime<Utc>,
    pub kind: SyncKind,
    /// Apply attempts started for the current target.
    pub attempt: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub retries_exhausted: bool,
}

impl ReconciliationState {
    pub fn new(initial: Version) -> Self {
        Self {
            current_version: initial.clone(),
            target_version: initial,
            status: SyncStatus::Synced,
            health: Health::Healthy,
            last_sync_at: Utc::now(),
            kind: SyncKind::Deploy,
            attempt: 0,
            next_retry_at: None,
            last_error: None,
            retries_exhausted: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Transition results
// ---------------------------------------------------------------------------

/// What a deploy request did to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// A new reconciliation was started for the requested version.
    Started,
    /// The requested version is already the in-flight target.
    AlreadySyncing,
    /// The requested version is already running; nothing to do.
    AlreadySynced,
}

/// How an apply attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The apply step reported an error; the target is known to be unhealthy.
    Failed(String),
    /// The apply step did not answer in time. Unlike `Failed`, this leaves
    /// health `Unknown` rather than `Degraded`: the rollout may still have
    /// landed, so the machine does not claim the target is unhealthy.
    TimedOut(String),
}

impl Failure {
    pub fn message(&self) -> &str {
        match self {
            Failure::Failed(m) | Failure::TimedOut(m) => m,
        }
    }

    fn health(&self) -> Health {
        match self {
            Failure::Failed(_) => Health::Degraded,
            Failure::TimedOut(_) => Health::Unknown,
        }
    }
}

// ---------------------------------------------------------------------------
// ReconciliationMachine
// ---------------------------------------------------------------------------

/// Owns the live [`ReconciliationState`] and its [`VersionHistory`].
///
/// Every method either applies one legal transition or returns an error and
/// leaves both state and history untouched.
#[derive(Debug, Clone)]
pub struct ReconciliationMachine {
    state: ReconciliationState,
    history: VersionHistory,
}

impl ReconciliationMachine {
    /// Start synced at `initial`, seeding history with its deployment record.
    pub fn new(initial: Version, initial_commit: impl Into<String>) -> Self {
        let mut history = VersionHistory::new();
        history.append(DeploymentRecord::success(
            initial.clone(),
            initial_commit,
            1,
        ));
        Self {
            state: ReconciliationState::new(initial),
            history,
        }
    }

    pub fn state(&self) -> &ReconciliationState {
        &self.state
    }

    pub fn history(&self) -> &VersionHistory {
        &self.history
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Request that `version` become the running version.
    pub fn request(&mut self, version: &Version, kind: SyncKind) -> Result<RequestOutcome> {
        match self.state.status {
            SyncStatus::Synced if *version == self.state.current_version => {
                Ok(RequestOutcome::AlreadySynced)
            }
            SyncStatus::Syncing if *version == self.state.target_version => {
                Ok(RequestOutcome::AlreadySyncing)
            }
            SyncStatus::Syncing => Err(GitopsError::AlreadyInProgress {
                target: self.state.target_version.to_string(),
                requested: version.to_string(),
            }),
            // Synced on another version, or Error (same target = explicit
            // re-request with a fresh attempt budget).
            SyncStatus::Synced | SyncStatus::Error => {
                self.start(version.clone(), kind);
                Ok(RequestOutcome::Started)
            }
        }
    }

    /// The in-flight apply succeeded and resolved `commit`.
    pub fn succeed(&mut self, commit: impl Into<String>) -> Result<DeploymentRecord> {
        self.require(SyncStatus::Syncing, "succeed")?;

        let mut record = DeploymentRecord::success(
            self.state.target_version.clone(),
            commit,
            self.state.attempt,
        );
        record.outcome = self.state.kind.success_outcome();

        self.state.current_version = self.state.target_version.clone();
        self.state.status = SyncStatus::Synced;
        self.state.health = Health::Healthy;
        self.state.next_retry_at = None;
        self.state.last_error = None;
        self.state.retries_exhausted = false;
        self.history.append(record.clone());
        Ok(record)
    }

    /// The in-flight apply failed. The target is retained for retry.
    pub fn fail(&mut self, failure: &Failure) -> Result<DeploymentRecord> {
        self.require(SyncStatus::Syncing, "fail")?;

        self.state.status = SyncStatus::Error;
        self.state.health = failure.health();
        self.state.last_error = Some(failure.message().to_string());
        let record = DeploymentRecord::failed(
            self.state.target_version.clone(),
            self.state.attempt,
            failure.message(),
        );
        self.history.append(record.clone());
        Ok(record)
    }

    /// Note when the next retry is due, so readers can see the backoff.
    pub fn schedule_retry(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.require(SyncStatus::Error, "schedule_retry")?;
        self.state.next_retry_at = Some(at);
        Ok(())
    }

    /// Re-enter the in-flight state for the same target.
    pub fn retry(&mut self) -> Result<()> {
        self.require(SyncStatus::Error, "retry")?;
        if self.state.retries_exhausted {
            return Err(self.invalid("retry", "retries exhausted; a new request is required"));
        }
        self.state.status = SyncStatus::Syncing;
        self.state.attempt += 1;
        self.state.last_sync_at = Utc::now();
        self.state.next_retry_at = None;
        Ok(())
    }

    /// Give up on the current target. The machine stays in `Error` until a
    /// new explicit request arrives.
    pub fn exhaust(&mut self) -> Result<()> {
        self.require(SyncStatus::Error, "exhaust")?;
        self.state.retries_exhausted = true;
        self.state.next_retry_at = None;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn start(&mut self, target: Version, kind: SyncKind) {
        self.state.target_version = target;
        self.state.kind = kind;
        self.state.status = SyncStatus::Syncing;
        self.state.attempt = 1;
        self.state.last_sync_at = Utc::now();
        self.state.next_retry_at = None;
        self.state.retries_exhausted = false;
    }

    fn require(&self, expected: SyncStatus, event: &str) -> Result<()> {
        if self.state.status != expected {
            return Err(self.invalid(event, &format!("requires status {expected}")));
        }
        Ok(())
    }

    fn invalid(&self, event: &str, reason: &str) -> GitopsError {
        GitopsError::InvalidTransition {
            from: self.state.status.to_string(),
            event: event.to_string(),
            reason: reason.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
