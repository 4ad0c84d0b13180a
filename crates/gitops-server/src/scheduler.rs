//! The single writer for the reconciliation state.
//!
//! Every transition happens inside one short `std::sync::Mutex` section with
//! no `.await` in it, and ends by publishing a fresh [`Snapshot`] on a watch
//! channel. Readers only ever look at the latest published snapshot.

use chrono::Utc;
use gitops_core::config::RetryConfig;
use gitops_core::error::{GitopsError, Result};
use gitops_core::history::VersionHistory;
use gitops_core::machine::{Failure, ReconciliationMachine, ReconciliationState, RequestOutcome};
use gitops_core::types::SyncKind;
use gitops_core::version::Version;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::apply::{Apply, ApplyError, ApplyRequest};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Point-in-time copy of the state and history. Never mutated after publish.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub state: ReconciliationState,
    pub history: VersionHistory,
    /// Bumped on every accepted start; identifies the in-flight reconciliation.
    pub generation: u64,
}

/// Answer to a deploy or rollback request.
#[derive(Debug, Clone, Serialize)]
pub struct DeployAck {
    pub version: Version,
    pub outcome: RequestOutcome,
    pub generation: u64,
    pub message: String,
}

impl DeployAck {
    /// False only for the no-op "already running this version" answer.
    pub fn accepted(&self) -> bool {
        self.outcome != RequestOutcome::AlreadySynced
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub retry: RetryConfig,
    pub apply_timeout: Duration,
}

// ---------------------------------------------------------------------------
// DeploymentScheduler
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct DeploymentScheduler {
    shared: Arc<Shared>,
}

struct Shared {
    writer: Mutex<Writer>,
    snapshot_tx: watch::Sender<Arc<Snapshot>>,
    apply: Arc<dyn Apply>,
    opts: SchedulerOptions,
}

struct Writer {
    machine: ReconciliationMachine,
    generation: u64,
}

impl DeploymentScheduler {
    pub fn new(machine: ReconciliationMachine, apply: Arc<dyn Apply>, opts: SchedulerOptions) -> Self {
        let writer = Writer {
            machine,
            generation: 0,
        };
        let (snapshot_tx, _) = watch::channel(Arc::new(writer.snapshot()));
        Self {
            shared: Arc::new(Shared {
                writer: Mutex::new(writer),
                snapshot_tx,
                apply,
                opts,
            }),
        }
    }

    /// Latest published snapshot. Never touches the writer lock.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.shared.snapshot_tx.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.shared.snapshot_tx.subscribe()
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.shared.opts
    }

    /// Validate `raw` and ask for it to become the running version.
    ///
    /// Returns after a synchronous state check; the apply step runs on a
    /// spawned task. Must be called from within a Tokio runtime.
    pub fn request_deploy(&self, raw: &str, commit: Option<String>) -> Result<DeployAck> {
        let version = Version::parse(raw).inspect_err(|_| {
            info!(
                version = %log_preview(raw),
                len = raw.len(),
                "deploy rejected: invalid version"
            );
        })?;
        let mut writer = self.shared.lock();
        self.begin(&mut writer, version, SyncKind::Deploy, commit)
    }

    /// Redeploy the newest good version older than the current one.
    pub fn request_rollback(&self) -> Result<DeployAck> {
        let mut writer = self.shared.lock();
        let current = writer.machine.state().current_version.clone();
        let target = writer
            .machine
            .history()
            .last_good_before(&current)
            .map(|r| (r.version.clone(), r.commit.clone()))
            .ok_or_else(|| GitopsError::NoRollbackTarget(current.to_string()))?;
        let commit = Some(target.1).filter(|c| !c.is_empty());
        self.begin(&mut writer, target.0, SyncKind::Rollback, commit)
    }

    fn begin(
        &self,
        writer: &mut Writer,
        version: Version,
        kind: SyncKind,
        commit: Option<String>,
    ) -> Result<DeployAck> {
        let outcome = writer
            .machine
            .request(&version, kind)
            .inspect_err(|e| info!(version = %version, error = %e, "deploy rejected"))?;

        let message = match outcome {
            RequestOutcome::Started => {
                writer.generation += 1;
                self.shared.publish(writer);
                info!(
                    version = %version,
                    kind = %kind,
                    generation = writer.generation,
                    "reconciliation started"
                );
                tokio::spawn(run_reconciliation(
                    Arc::clone(&self.shared),
                    version.clone(),
                    commit,
                    writer.generation,
                ));
                match kind {
                    SyncKind::Deploy => format!("Deploying {version}..."),
                    SyncKind::Rollback => format!("Rolling back to {version}..."),
                }
            }
            RequestOutcome::AlreadySyncing => {
                debug!(version = %version, generation = writer.generation, "already syncing");
                format!("Deployment of {version} already in progress")
            }
            RequestOutcome::AlreadySynced => format!("{version} is already deployed"),
        };

        Ok(DeployAck {
            version,
            outcome,
            generation: writer.generation,
            message,
        })
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Writer> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, writer: &Writer) {
        self.snapshot_tx.send_replace(Arc::new(writer.snapshot()));
    }

    async fn run_apply(&self, request: ApplyRequest) -> std::result::Result<String, Failure> {
        let apply = Arc::clone(&self.apply);
        let timeout = self.opts.apply_timeout;
        let handle = tokio::spawn(async move { apply.apply(&request).await });
        let abort = handle.abort_handle();

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(Ok(commit))) => Ok(commit),
            Ok(Ok(Err(e @ ApplyError::Timeout(_)))) => Err(Failure::TimedOut(e.to_string())),
            Ok(Ok(Err(e))) => Err(Failure::Failed(e.to_string())),
            Ok(Err(join_err)) => Err(Failure::Failed(format!("apply task aborted: {join_err}"))),
            Err(_) => {
                abort.abort();
                Err(Failure::TimedOut(
                    ApplyError::Timeout(timeout).to_string(),
                ))
            }
        }
    }
}

impl Writer {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.machine.state().clone(),
            history: self.machine.history().clone(),
            generation: self.generation,
        }
    }
}

/// Longest prefix of untrusted input that goes into a log line.
const LOG_PREVIEW_MAX: usize = 64;

/// `raw` cut to at most `LOG_PREVIEW_MAX` bytes on a char boundary.
fn log_preview(raw: &str) -> &str {
    if raw.len() <= LOG_PREVIEW_MAX {
        return raw;
    }
    let mut end = LOG_PREVIEW_MAX;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    &raw[..end]
}

// ---------------------------------------------------------------------------
// Reconciliation task
// ---------------------------------------------------------------------------

/// Apply `version`, retrying with backoff until success, exhaustion, or
/// until a newer request supersedes this generation.
async fn run_reconciliation(
    shared: Arc<Shared>,
    version: Version,
    commit: Option<String>,
    generation: u64,
) {
    let max_attempts = shared.opts.retry.max_attempts();
    let mut attempt = 1;

    loop {
        let result = shared
            .run_apply(ApplyRequest {
                version: version.clone(),
                commit: commit.clone(),
                attempt,
            })
            .await;

        let delay = {
            let mut writer = shared.lock();
            if writer.generation != generation {
                info!(version = %version, generation, "apply result dropped: superseded");
                return;
            }
            match result {
                Ok(commit) => {
                    match writer.machine.succeed(commit) {
                        Ok(record) => info!(
                            version = %version,
                            commit = %record.commit,
                            attempt,
                            outcome = %record.outcome,
                            "reconciliation succeeded"
                        ),
                        Err(e) => warn!(version = %version, error = %e, "could not record success"),
                    }
                    shared.publish(&writer);
                    return;
                }
                Err(failure) => {
                    if let Err(e) = writer.machine.fail(&failure) {
                        warn!(version = %version, error = %e, "could not record failure");
                        shared.publish(&writer);
                        return;
                    }
                    warn!(
                        version = %version,
                        attempt,
                        max_attempts,
                        error = %failure.message(),
                        "apply failed"
                    );

                    if attempt >= max_attempts {
                        if let Err(e) = writer.machine.exhaust() {
                            warn!(version = %version, error = %e, "could not mark exhaustion");
                        }
                        shared.publish(&writer);
                        warn!(version = %version, attempts = attempt, "retries exhausted");
                        return;
                    }

                    let delay = shared.opts.retry.backoff(attempt);
                    let due = Utc::now()
                        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
                    if let Err(e) = writer.machine.schedule_retry(due) {
                        warn!(version = %version, error = %e, "could not schedule retry");
                    }
                    shared.publish(&writer);
                    delay
                }
            }
        };

        tokio::time::sleep(delay).await;

        {
            let mut writer = shared.lock();
            if writer.generation != generation {
                info!(version = %version, generation, "retry abandoned: superseded by a newer request");
                return;
            }
            if let Err(e) = writer.machine.retry() {
                warn!(version = %version, error = %e, "retry not possible");
                return;
            }
            shared.publish(&writer);
        }
        attempt += 1;
        debug!(version = %version, attempt, "retrying apply");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use gitops_core::types::{Health, Outcome, SyncStatus};
    use std::collections::VecDeque;
    use tokio::sync::Semaphore;

    /// Apply stub that returns scripted results and can be held mid-flight.
    struct Scripted {
        results: Mutex<VecDeque<std::result::Result<String, ApplyError>>>,
        gate: Semaphore,
        calls: Mutex<Vec<ApplyRequest>>,
    }

    impl Scripted {
        fn new(results: Vec<std::result::Result<String, ApplyError>>, open: bool) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
                gate: Semaphore::new(if open { Semaphore::MAX_PERMITS } else { 0 }),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn release(&self, n: usize) {
            self.gate.add_permits(n);
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl Apply for Scripted {
        async fn apply(&self, request: &ApplyRequest) -> std::result::Result<String, ApplyError> {
            self.calls.lock().unwrap().push(request.clone());
            let permit = self.gate.acquire().await.unwrap();
            permit.forget();
            if let Some(c) = &request.commit {
                return Ok(c.clone());
            }
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("c0ffee000".to_string()))
        }
    }

    fn fail() -> std::result::Result<String, ApplyError> {
        Err(ApplyError::Failed("boom".into()))
    }

    fn scheduler(apply: Arc<dyn Apply>, max_retries: u32) -> DeploymentScheduler {
        let machine =
            ReconciliationMachine::new(Version::parse("v1.0.0").unwrap(), "abc123def");
        DeploymentScheduler::new(
            machine,
            apply,
            SchedulerOptions {
                retry: RetryConfig {
                    max_retries,
                    backoff_base_ms: 100,
                    backoff_max_ms: 1_000,
                },
                apply_timeout: Duration::from_secs(10),
            },
        )
    }

    async fn wait_for(s: &DeploymentScheduler, pred: impl Fn(&Snapshot) -> bool) -> Arc<Snapshot> {
        let mut rx = s.subscribe();
        let snap = rx.wait_for(|snap| pred(snap.as_ref())).await.unwrap();
        Arc::clone(&snap)
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_succeeds_and_records_history() {
        let apply = Scripted::new(vec![Ok("xyz789abc".into())], true);
        let s = scheduler(apply, 3);

        let ack = s.request_deploy("v2.0.0", None).unwrap();
        assert!(ack.accepted());
        assert_eq!(ack.outcome, RequestOutcome::Started);
        assert_eq!(s.snapshot().state.status, SyncStatus::Syncing);
        assert_eq!(s.snapshot().state.target_version, "v2.0.0");

        let snap = wait_for(&s, |s| s.state.status == SyncStatus::Synced).await;
        assert_eq!(snap.state.current_version, "v2.0.0");
        assert_eq!(snap.state.health, Health::Healthy);
        let head = snap.history.latest().unwrap();
        assert_eq!(head.version, "v2.0.0");
        assert_eq!(head.outcome, Outcome::Success);
        assert_eq!(head.commit, "xyz789abc");
    }

    #[tokio::test(start_paused = true)]
    async fn second_version_rejected_while_syncing() {
        let apply = Scripted::new(vec![Ok("a".into())], false);
        let s = scheduler(apply.clone(), 3);

        s.request_deploy("v2.0.0", None).unwrap();
        let before = s.snapshot();
        let err = s.request_deploy("v3.0.0", None).unwrap_err();
        assert!(matches!(err, GitopsError::AlreadyInProgress { .. }));
        let after = s.snapshot();
        assert_eq!(before.state, after.state);
        assert_eq!(before.generation, after.generation);

        apply.release(1);
        wait_for(&s, |s| s.state.status == SyncStatus::Synced).await;
        assert_eq!(s.snapshot().state.current_version, "v2.0.0");
    }

    #[tokio::test(start_paused = true)]
    async fn same_version_while_syncing_is_idempotent() {
        let apply = Scripted::new(vec![Ok("a".into())], false);
        let s = scheduler(apply.clone(), 3);

        let first = s.request_deploy("v2.0.0", None).unwrap();
        let before = s.snapshot();
        let second = s.request_deploy("v2.0.0", None).unwrap();
        assert_eq!(second.outcome, RequestOutcome::AlreadySyncing);
        assert_eq!(second.generation, first.generation);
        assert_eq!(s.snapshot().state.last_sync_at, before.state.last_sync_at);

        apply.release(1);
        let snap = wait_for(&s, |s| s.state.status == SyncStatus::Synced).await;
        // Seed record plus exactly one success.
        assert_eq!(snap.history.len(), 2);
        assert_eq!(apply.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_version_changes_nothing() {
        let apply = Scripted::new(vec![], true);
        let s = scheduler(apply.clone(), 3);
        let before = s.snapshot();

        let err = s.request_deploy("", None).unwrap_err();
        assert!(matches!(err, GitopsError::InvalidVersion(_)));
        assert!(s.request_deploy("not-a-version", None).is_err());

        let after = s.snapshot();
        assert_eq!(before.state, after.state);
        assert_eq!(after.history.len(), 1);
        assert_eq!(apply.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn current_version_is_a_noop() {
        let apply = Scripted::new(vec![], true);
        let s = scheduler(apply.clone(), 3);
        let ack = s.request_deploy("v1.0.0", None).unwrap();
        assert!(!ack.accepted());
        assert_eq!(ack.outcome, RequestOutcome::AlreadySynced);
        assert_eq!(apply.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_exhausted() {
        let apply = Scripted::new(vec![fail(), fail(), fail()], true);
        let s = scheduler(apply.clone(), 3);

        s.request_deploy("v2.0.0", None).unwrap();
        let snap = wait_for(&s, |s| s.state.retries_exhausted).await;

        assert_eq!(snap.state.status, SyncStatus::Error);
        assert_eq!(snap.state.health, Health::Degraded);
        assert_eq!(snap.state.target_version, "v2.0.0");
        assert_eq!(snap.state.current_version, "v1.0.0");
        let failed = snap
            .history
            .iter()
            .filter(|r| r.outcome == Outcome::Failed)
            .count();
        assert_eq!(failed, 3);
        assert_eq!(apply.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let apply = Scripted::new(vec![fail(), Ok("fixed0001".into())], true);
        let s = scheduler(apply.clone(), 3);

        s.request_deploy("v2.0.0", None).unwrap();
        let snap = wait_for(&s, |s| s.state.status == SyncStatus::Synced).await;
        assert_eq!(snap.state.current_version, "v2.0.0");
        assert_eq!(snap.state.health, Health::Healthy);
        let outcomes: Vec<_> = snap.history.list(2).map(|r| (r.outcome, r.attempt)).collect();
        assert_eq!(outcomes, vec![(Outcome::Success, 2), (Outcome::Failed, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn new_request_supersedes_pending_retry() {
        // First attempt for v2 fails, then the backoff sleep is pending.
        let apply = Scripted::new(vec![fail(), Ok("v4commit".into())], true);
        let s = DeploymentScheduler::new(
            ReconciliationMachine::new(Version::parse("v1.0.0").unwrap(), "abc123def"),
            apply.clone(),
            SchedulerOptions {
                retry: RetryConfig {
                    max_retries: 3,
                    backoff_base_ms: 60_000,
                    backoff_max_ms: 60_000,
                },
                apply_timeout: Duration::from_secs(10),
            },
        );

        s.request_deploy("v2.0.0", None).unwrap();
        let snap = wait_for(&s, |s| s.state.status == SyncStatus::Error).await;
        assert!(snap.state.next_retry_at.is_some());

        let ack = s.request_deploy("v4.0.0", None).unwrap();
        assert_eq!(ack.outcome, RequestOutcome::Started);
        assert_eq!(s.snapshot().state.target_version, "v4.0.0");

        let snap = wait_for(&s, |s| s.state.status == SyncStatus::Synced).await;
        assert_eq!(snap.state.current_version, "v4.0.0");

        // Let the old backoff elapse; the stale task must not touch anything.
        tokio::time::sleep(Duration::from_secs(120)).await;
        let after = s.snapshot();
        assert_eq!(after.state.current_version, "v4.0.0");
        assert_eq!(after.state.status, SyncStatus::Synced);
        assert_eq!(after.history.len(), snap.history.len());
        assert_eq!(apply.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn apply_timeout_leaves_health_unknown() {
        struct Hang;
        #[async_trait::async_trait]
        impl Apply for Hang {
            async fn apply(&self, _: &ApplyRequest) -> std::result::Result<String, ApplyError> {
                std::future::pending().await
            }
        }

        let s = scheduler(Arc::new(Hang), 1);
        s.request_deploy("v2.0.0", None).unwrap();
        let snap = wait_for(&s, |s| s.state.retries_exhausted).await;
        assert_eq!(snap.state.health, Health::Unknown);
        assert!(snap.state.last_error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn rollback_returns_to_previous_good_version() {
        let apply = Scripted::new(vec![Ok("xyz789abc".into())], true);
        let s = scheduler(apply, 3);

        assert!(matches!(
            s.request_rollback(),
            Err(GitopsError::NoRollbackTarget(_))
        ));

        s.request_deploy("v2.0.0", None).unwrap();
        wait_for(&s, |s| s.state.current_version == "v2.0.0").await;

        let ack = s.request_rollback().unwrap();
        assert_eq!(ack.version, "v1.0.0");
        let snap = wait_for(&s, |s| {
            s.state.status == SyncStatus::Synced && s.state.current_version == "v1.0.0"
        })
        .await;
        let head = snap.history.latest().unwrap();
        assert_eq!(head.outcome, Outcome::RolledBack);
        assert_eq!(head.commit, "abc123def");
    }

    #[tokio::test(start_paused = true)]
    async fn never_two_syncs_in_flight() {
        let apply = Scripted::new(vec![], false);
        let s = scheduler(apply.clone(), 3);

        let mut started = 0;
        for v in ["v2.0.0", "v3.0.0", "v2.0.0", "v4.0.0", "v5.0.0"] {
            if let Ok(ack) = s.request_deploy(v, None) {
                if ack.outcome == RequestOutcome::Started {
                    started += 1;
                }
            }
        }
        assert_eq!(started, 1);
        assert_eq!(s.snapshot().generation, 1);

        apply.release(1);
        wait_for(&s, |s| s.state.status == SyncStatus::Synced).await;
        assert_eq!(apply.calls(), 1);
    }

    #[test]
    fn log_preview_bounds_untrusted_input() {
        assert_eq!(log_preview("v1.2.3"), "v1.2.3");
        let long = "x".repeat(10_000);
        assert_eq!(log_preview(&long).len(), LOG_PREVIEW_MAX);
        // A multi-byte char straddling the limit is dropped, not split.
        let straddle = format!("{}é", "a".repeat(LOG_PREVIEW_MAX - 1));
        assert_eq!(log_preview(&straddle), "a".repeat(LOG_PREVIEW_MAX - 1));
    }
}
