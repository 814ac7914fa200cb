//! Per-job state shared between the manager, the transfer task and handles.

use core_async::sync::{watch, CancellationToken};
use core_library::models::{ContentDownloadRecord, ContentId};
use core_runtime::events::{DownloadFailureKind, DownloadProgress};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Lifecycle of one download job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadState {
    /// Registered, waiting for a predecessor or a download permit.
    Queued,
    /// Transferring. `progress` is the latest update, if any.
    Running { progress: Option<DownloadProgress> },
    Completed { record: ContentDownloadRecord },
    Failed {
        kind: DownloadFailureKind,
        reason: String,
    },
    /// Cancelled or superseded. Cleanup has finished.
    Cancelled,
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadState::Completed { .. } | DownloadState::Failed { .. } | DownloadState::Cancelled
        )
    }
}

/// Final result of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Completed { record: ContentDownloadRecord },
    Failed {
        kind: DownloadFailureKind,
        reason: String,
    },
    Cancelled,
}

impl DownloadOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, DownloadOutcome::Completed { .. })
    }
}

impl From<DownloadState> for DownloadOutcome {
    fn from(state: DownloadState) -> Self {
        match state {
            DownloadState::Completed { record } => DownloadOutcome::Completed { record },
            DownloadState::Failed { kind, reason } => DownloadOutcome::Failed { kind, reason },
            DownloadState::Queued | DownloadState::Running { .. } | DownloadState::Cancelled => {
                DownloadOutcome::Cancelled
            }
        }
    }
}

/// Registry entry for an active job.
pub(crate) struct JobControl {
    job_id: Uuid,
    content_id: ContentId,
    token: CancellationToken,
    superseded: AtomicBool,
    state: watch::Sender<DownloadState>,
    progress: Mutex<Option<DownloadProgress>>,
}

impl JobControl {
    pub(crate) fn new(content_id: ContentId) -> Arc<Self> {
        let (state, _) = watch::channel(DownloadState::Queued);
        Arc::new(Self {
            job_id: Uuid::new_v4(),
            content_id,
            token: CancellationToken::new(),
            superseded: AtomicBool::new(false),
            state,
            progress: Mutex::new(None),
        })
    }

    pub(crate) fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub(crate) fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancels on behalf of a newer job for the same content. The record is
    /// then owned by the successor and must not be deleted.
    pub(crate) fn supersede(&self) {
        self.superseded.store(true, Ordering::SeqCst);
        self.token.cancel();
    }

    pub(crate) fn is_superseded(&self) -> bool {
        self.superseded.load(Ordering::SeqCst)
    }

    pub(crate) fn state(&self) -> DownloadState {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<DownloadState> {
        self.state.subscribe()
    }

    pub(crate) fn progress(&self) -> Option<DownloadProgress> {
        *self.progress.lock()
    }

    pub(crate) fn mark_running(&self) {
        let progress = self.progress();
        self.state.send_replace(DownloadState::Running { progress });
    }

    pub(crate) fn report_progress(&self, progress: DownloadProgress) {
        *self.progress.lock() = Some(progress);
        self.state.send_replace(DownloadState::Running {
            progress: Some(progress),
        });
    }

    /// Publishes the terminal state. Later calls are ignored.
    pub(crate) fn finish(&self, terminal: DownloadState) {
        self.state.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            *current = terminal;
            true
        });
    }

    /// Resolves once the job reached a terminal state.
    pub(crate) async fn wait_terminal(&self) -> DownloadState {
        let mut rx = self.subscribe();
        let result = rx.wait_for(DownloadState::is_terminal).await;
        match result {
            Ok(state) => state.clone(),
            Err(_) => DownloadState::Cancelled,
        }
    }
}

/// Active jobs by content id. At most one entry per id.
pub(crate) type JobRegistry = Arc<Mutex<HashMap<ContentId, Arc<JobControl>>>>;

/// Drops the registry entry if it still belongs to `control`.
pub(crate) fn unregister(registry: &JobRegistry, control: &JobControl) {
    let mut jobs = registry.lock();
    if jobs
        .get(control.content_id())
        .is_some_and(|current| current.job_id() == control.job_id())
    {
        jobs.remove(control.content_id());
    }
}

/// Unregisters the job and marks it failed if the transfer task is dropped
/// before finishing, e.g. when the runtime shuts down mid-transfer.
pub(crate) struct TerminalGuard {
    control: Arc<JobControl>,
    registry: JobRegistry,
}

impl TerminalGuard {
    pub(crate) fn new(control: Arc<JobControl>, registry: JobRegistry) -> Self {
        Self { control, registry }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        unregister(&self.registry, &self.control);
        self.control.finish(DownloadState::Failed {
            kind: DownloadFailureKind::Storage,
            reason: "Download task ended unexpectedly".to_string(),
        });
    }
}

/// Caller-side view of one download job.
///
/// Dropping the handle does not cancel the job.
#[derive(Clone)]
pub struct DownloadHandle {
    control: Arc<JobControl>,
}

impl DownloadHandle {
    pub(crate) fn new(control: Arc<JobControl>) -> Self {
        Self { control }
    }

    pub fn content_id(&self) -> &ContentId {
        self.control.content_id()
    }

    pub fn job_id(&self) -> Uuid {
        self.control.job_id()
    }

    /// Latest progress update.
    pub fn progress(&self) -> Option<DownloadProgress> {
        self.control.progress()
    }

    pub fn state(&self) -> DownloadState {
        self.control.state()
    }

    /// Watch the job's state transitions.
    pub fn subscribe(&self) -> watch::Receiver<DownloadState> {
        self.control.subscribe()
    }

    /// Waits for the job to finish, including its cleanup.
    pub async fn wait(&self) -> DownloadOutcome {
        self.control.wait_terminal().await.into()
    }

    /// Requests cooperative cancellation. Use [`DownloadHandle::wait`] to
    /// wait for cleanup.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.token().is_cancelled()
    }
}

impl std::fmt::Debug for DownloadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadHandle")
            .field("content_id", self.content_id())
            .field("job_id", &self.job_id())
            .field("state", &self.state())
            .finish()
    }
}
