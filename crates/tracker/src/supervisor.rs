//! Per-kind status polling.
//!
//! [`PollSupervisor`] owns at most one recurring poll task per
//! [`JobKind`]. Each task is represented by a [`PollHandle`]; dropping
//! the handle cancels the task, so replacing, stopping or finishing a
//! session always disposes of its timer.
//!
//! The supervisor never retries or gives up on its own: failed fetches
//! are reported as [`PollTick::Failed`] and polling simply continues on
//! the next tick. Limits are the caller's business.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tcgen_client::{ClientError, JobService};
use tcgen_core::job::{Job, JobKind};
use tcgen_core::state_machine::transition;
use tcgen_core::status::StatusReport;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Shortest interval a poll task will tick at.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Identifies one poll session; strictly increasing per supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken(u64);

impl SessionToken {
    pub(crate) const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of one poll tick, handed to the update callback.
#[derive(Debug, Clone)]
pub enum PollTick<O> {
    /// A status payload was fetched and folded into the job.
    Applied {
        token: SessionToken,
        tick: u32,
        job: Job<O>,
        /// Whether the payload changed the snapshot.
        changed: bool,
    },
    /// The fetch failed or the body could not be decoded. Non-terminal.
    Failed {
        token: SessionToken,
        tick: u32,
        job_id: String,
        error: String,
    },
}

impl<O> PollTick<O> {
    pub fn token(&self) -> SessionToken {
        match self {
            PollTick::Applied { token, .. } | PollTick::Failed { token, .. } => *token,
        }
    }
}

// ---------------------------------------------------------------------------
// PollHandle
// ---------------------------------------------------------------------------

/// Owned handle to a running poll task. Dropping it stops the task.
pub struct PollHandle {
    token: SessionToken,
    job_id: String,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Stop the task. Equivalent to dropping the handle.
    pub fn dispose(self) {}

    /// Release the handle without aborting the task. Only the task
    /// itself does this, right before it exits.
    fn detach(mut self) {
        self.task.take();
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// PollSupervisor
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SupervisorInner {
    /// Active poll sessions indexed by job kind.
    sessions: Mutex<HashMap<JobKind, PollHandle>>,
    next_token: AtomicU64,
}

impl SupervisorInner {
    fn sessions(&self) -> MutexGuard<'_, HashMap<JobKind, PollHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove the handle for `key` if it still belongs to `token`.
    fn take_if_current(&self, key: JobKind, token: SessionToken) -> Option<PollHandle> {
        let mut sessions = self.sessions();
        match sessions.get(&key) {
            Some(handle) if handle.token == token => sessions.remove(&key),
            _ => None,
        }
    }
}

/// Owns one poll timer per job kind.
///
/// Cheap to clone; clones share the same sessions. Dropping the last
/// clone stops every session.
#[derive(Clone, Default)]
pub struct PollSupervisor {
    inner: Arc<SupervisorInner>,
}

impl PollSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling `job` every `interval`.
    ///
    /// Any active session for `job.kind` is disposed first, before the
    /// new task issues its first fetch. The first tick fires
    /// immediately. `on_update` sees every tick; when a payload makes
    /// the job terminal the session removes itself, `on_update` gets the
    /// terminal tick and `on_terminal` is called exactly once.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<S, U, T>(
        &self,
        job: Job<S::Outcome>,
        service: Arc<dyn JobService>,
        interval: Duration,
        on_update: U,
        on_terminal: T,
    ) -> SessionToken
    where
        S: StatusReport,
        U: Fn(PollTick<S::Outcome>) + Send + Sync + 'static,
        T: FnOnce(SessionToken, Job<S::Outcome>) + Send + 'static,
    {
        let key = job.kind;
        let token = SessionToken::new(self.inner.next_token.fetch_add(1, Ordering::SeqCst) + 1);
        let cancel = CancellationToken::new();

        let mut sessions = self.inner.sessions();
        if let Some(previous) = sessions.remove(&key) {
            tracing::info!(
                kind = %key,
                old_token = %previous.token,
                old_job_id = %previous.job_id,
                new_job_id = %job.id,
                "Replacing active poll session",
            );
            previous.dispose();
        }

        let job_id = job.id.clone();
        let poll = PollLoop {
            supervisor: Arc::downgrade(&self.inner),
            token,
            job,
            service,
            interval: interval.max(MIN_INTERVAL),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(poll.run::<S, U, T>(on_update, on_terminal));

        tracing::info!(
            kind = %key,
            job_id = %job_id,
            %token,
            interval_ms = interval.as_millis() as u64,
            "Poll session started",
        );

        sessions.insert(
            key,
            PollHandle {
                token,
                job_id,
                cancel,
                task: Some(task),
            },
        );
        token
    }

    /// Stop and dispose the session for `key`. No-op when none is active.
    pub fn stop(&self, key: JobKind) -> bool {
        let handle = self.inner.sessions().remove(&key);
        match handle {
            Some(handle) => {
                tracing::info!(kind = %key, token = %handle.token, "Poll session stopped");
                handle.dispose();
                true
            }
            None => false,
        }
    }

    /// Stop the session for `key` only if it is still `token`.
    pub fn stop_if_current(&self, key: JobKind, token: SessionToken) -> bool {
        match self.inner.take_if_current(key, token) {
            Some(handle) => {
                tracing::info!(kind = %key, %token, "Poll session stopped");
                handle.dispose();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, key: JobKind) -> bool {
        self.inner.sessions().contains_key(&key)
    }

    pub fn current_token(&self, key: JobKind) -> Option<SessionToken> {
        self.inner.sessions().get(&key).map(|h| h.token)
    }

    pub fn active_count(&self) -> usize {
        self.inner.sessions().len()
    }

    /// Stop every session.
    pub fn shutdown(&self) {
        let drained: Vec<PollHandle> = self.inner.sessions().drain().map(|(_, h)| h).collect();
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "Stopping all poll sessions");
        }
        drop(drained);
    }
}

// ---------------------------------------------------------------------------
// Poll loop
// ---------------------------------------------------------------------------

struct PollLoop<O> {
    supervisor: Weak<SupervisorInner>,
    token: SessionToken,
    job: Job<O>,
    service: Arc<dyn JobService>,
    interval: Duration,
    cancel: CancellationToken,
}

impl<O> PollLoop<O>
where
    O: Clone + PartialEq + Send + Sync + 'static,
{
    async fn run<S, U, T>(mut self, on_update: U, on_terminal: T)
    where
        S: StatusReport<Outcome = O>,
        U: Fn(PollTick<O>) + Send + Sync + 'static,
        T: FnOnce(SessionToken, Job<O>) + Send + 'static,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick = 0u32;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            tick = tick.saturating_add(1);

            let fetched = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.service.fetch_status(self.job.kind, &self.job.id) => result,
            };
            if self.cancel.is_cancelled() {
                break;
            }

            let report = fetched.and_then(|body| {
                serde_json::from_value::<S>(body).map_err(|e| ClientError::Decode(e.to_string()))
            });

            match report {
                Err(e) => {
                    tracing::warn!(
                        kind = %self.job.kind,
                        job_id = %self.job.id,
                        token = %self.token,
                        tick,
                        error = %e,
                        "Status poll failed",
                    );
                    on_update(PollTick::Failed {
                        token: self.token,
                        tick,
                        job_id: self.job.id.clone(),
                        error: e.to_string(),
                    });
                }
                Ok(report) => {
                    let next = transition(&self.job, &report);
                    let changed = next != self.job;
                    self.job = next;
                    tracing::debug!(
                        kind = %self.job.kind,
                        job_id = %self.job.id,
                        token = %self.token,
                        tick,
                        state = %self.job.state,
                        progress = self.job.progress,
                        changed,
                        "Status polled",
                    );

                    if self.job.is_terminal() {
                        if let Some(handle) = self
                            .supervisor
                            .upgrade()
                            .and_then(|s| s.take_if_current(self.job.kind, self.token))
                        {
                            handle.detach();
                        }
                        tracing::info!(
                            kind = %self.job.kind,
                            job_id = %self.job.id,
                            token = %self.token,
                            state = %self.job.state,
                            "Poll session reached terminal state",
                        );
                        on_update(PollTick::Applied {
                            token: self.token,
                            tick,
                            job: self.job.clone(),
                            changed,
                        });
                        on_terminal(self.token, self.job);
                        return;
                    }

                    on_update(PollTick::Applied {
                        token: self.token,
                        tick,
                        job: self.job.clone(),
                        changed,
                    });
                }
            }
        }

        tracing::debug!(
            kind = %self.job.kind,
            job_id = %self.job.id,
            token = %self.token,
            "Poll session cancelled",
        );
    }
}
