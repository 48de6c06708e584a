//! Background deployment status polling.
//!
//! A detached task queries the deployment until it reaches a terminal
//! state, the timeout elapses, or it is cancelled. Snapshots are published
//! on a `watch` channel. Dropping the [`PollHandle`] cancels the task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pagedrop_pages_api::PagesPlatform;
use pagedrop_protocol::{Deployment, StageStatus};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::status::{DeploymentStatus, has_started, map_deployment, stage_log_line};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Wait before the first query.
    pub initial_delay: Duration,
    /// Wait between subsequent queries.
    pub interval: Duration,
    /// Give up after this long. `None` polls until terminal or cancelled.
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            interval: Duration::from_secs(3),
            timeout: Some(Duration::from_secs(600)),
        }
    }
}

/// How a poller stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The deployment reached `Success` or `Failure`.
    Finished(DeploymentStatus),
    /// The timeout elapsed first. Not a deployment failure.
    TimedOut { last: Option<DeploymentStatus> },
    Cancelled,
}

/// Owner of a running poller.
pub struct PollHandle {
    cancel: CancellationToken,
    updates: watch::Receiver<Option<DeploymentStatus>>,
    task: JoinHandle<PollOutcome>,
    guard: DropGuard,
}

impl PollHandle {
    /// Stops polling. No further query is issued afterwards.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Receiver for every snapshot the poller publishes.
    pub fn subscribe(&self) -> watch::Receiver<Option<DeploymentStatus>> {
        self.updates.clone()
    }

    /// Most recent snapshot, if any query has succeeded yet.
    pub fn latest(&self) -> Option<DeploymentStatus> {
        self.updates.borrow().clone()
    }

    /// Waits for the poller to stop.
    pub async fn wait(self) -> PollOutcome {
        let Self { task, guard, .. } = self;
        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "poller task failed");
                PollOutcome::Cancelled
            }
        };
        guard.disarm();
        outcome
    }
}

/// Accumulates one log line per observed stage status change.
#[derive(Debug, Default)]
struct StageLog {
    lines: Vec<String>,
    seen: HashMap<String, Option<StageStatus>>,
}

impl StageLog {
    fn observe(&mut self, deployment: &Deployment) {
        let stages = deployment
            .stages
            .iter()
            .chain(deployment.latest_stage.iter())
            .filter(|s| has_started(s));
        for stage in stages {
            if self.seen.get(&stage.name) == Some(&stage.status) {
                continue;
            }
            self.seen.insert(stage.name.clone(), stage.status);
            self.lines.push(stage_log_line(stage));
        }
    }
}

/// Starts polling `deployment_id` on a detached task.
///
/// Each query is bounded by `call_timeout`. Query errors are logged and the
/// next tick tries again.
pub fn spawn_poller(
    platform: Arc<dyn PagesPlatform>,
    project: String,
    deployment_id: String,
    config: PollConfig,
    call_timeout: Duration,
) -> PollHandle {
    let cancel = CancellationToken::new();
    let (tx, updates) = watch::channel(None);

    let task = tokio::spawn(poll_loop(
        platform,
        project,
        deployment_id,
        config,
        call_timeout,
        cancel.clone(),
        tx,
    ));

    PollHandle {
        guard: cancel.clone().drop_guard(),
        cancel,
        updates,
        task,
    }
}

async fn poll_loop(
    platform: Arc<dyn PagesPlatform>,
    project: String,
    deployment_id: String,
    config: PollConfig,
    call_timeout: Duration,
    cancel: CancellationToken,
    tx: watch::Sender<Option<DeploymentStatus>>,
) -> PollOutcome {
    // A timeout too large to represent means no deadline.
    let deadline = config.timeout.and_then(|t| Instant::now().checked_add(t));
    let mut log = StageLog::default();
    let mut last: Option<DeploymentStatus> = None;
    let mut delay = config.initial_delay;

    debug!(project = %project, deployment = %deployment_id, "poller started");

    loop {
        let expired = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(deployment = %deployment_id, "poller cancelled");
                return PollOutcome::Cancelled;
            }
            _ = expired => {
                info!(deployment = %deployment_id, "status polling timed out");
                return PollOutcome::TimedOut { last };
            }
            _ = tokio::time::sleep(delay) => {}
        }
        delay = config.interval;

        let query = tokio::time::timeout(
            call_timeout,
            platform.get_deployment(&project, &deployment_id),
        );
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            r = query => r,
        };

        match result {
            Ok(Ok(deployment)) => {
                log.observe(&deployment);
                let mut status = map_deployment(&deployment);
                status.logs = log.lines.clone();
                tx.send_replace(Some(status.clone()));

                if status.is_terminal() {
                    info!(deployment = %deployment_id, state = ?status.state, "deployment finished");
                    return PollOutcome::Finished(status);
                }
                debug!(deployment = %deployment_id, state = ?status.state, "deployment in progress");
                last = Some(status);
            }
            Ok(Err(e)) => {
                warn!(deployment = %deployment_id, error = %e, "status query failed");
            }
            Err(_) => {
                warn!(deployment = %deployment_id, timeout_ms = call_timeout.as_millis() as u64, "status query timed out");
            }
        }
    }
}
