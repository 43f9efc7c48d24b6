//! One job kind's submit / observe / cancel surface.
//!
//! A [`JobSession`] tracks at most one job at a time. Submitting again
//! cancels the previous job first. All tracked state lives behind one
//! mutex together with the token of the live poll session; every tick,
//! terminal transition and artifact result is applied only while that
//! token still matches, so anything arriving after `cancel()` or after a
//! newer `submit()` is discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tcgen_client::artifact::{ArtifactHandle, ResultRetriever};
use tcgen_client::JobService;
use tcgen_core::job::{Job, JobState};
use tcgen_core::request::{OutputFormat, SubmitRequest};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::config::PollConfig;
use crate::error::JobError;
use crate::events::SessionEvent;
use crate::flavor::{FlavorJob, JobFlavor, Outcome};
use crate::supervisor::{PollSupervisor, PollTick, SessionToken};

/// Broadcast channel capacity for session events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

struct Tracked<O> {
    /// Bumped by every submit and cancel; an in-flight submit that sees
    /// a different value on return has been overtaken.
    submission: u64,
    token: Option<SessionToken>,
    job: Option<Job<O>>,
    artifact_format: Option<OutputFormat>,
    artifact: Option<ArtifactHandle>,
    ticks: u32,
    consecutive_errors: u32,
    started: Option<Instant>,
}

impl<O> Default for Tracked<O> {
    fn default() -> Self {
        Self {
            submission: 0,
            token: None,
            job: None,
            artifact_format: None,
            artifact: None,
            ticks: 0,
            consecutive_errors: 0,
            started: None,
        }
    }
}

struct Shared<F: JobFlavor> {
    state: Mutex<Tracked<Outcome<F>>>,
    events: broadcast::Sender<SessionEvent<Outcome<F>>>,
    supervisor: PollSupervisor,
    retriever: ResultRetriever,
    config: PollConfig,
}

impl<F: JobFlavor> Shared<F> {
    fn state(&self) -> MutexGuard<'_, Tracked<Outcome<F>>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: SessionEvent<Outcome<F>>) {
        // Ignore the SendError; it only means there are no observers.
        let _ = self.events.send(event);
    }

    /// Apply one poll tick if it belongs to the live session.
    fn on_tick(&self, tick: PollTick<Outcome<F>>) {
        let mut st = self.state();
        if st.token != Some(tick.token()) {
            tracing::debug!(kind = %F::KIND, token = %tick.token(), "Discarding stale poll tick");
            return;
        }
        st.ticks = st.ticks.saturating_add(1);

        match tick {
            PollTick::Applied { job, changed, .. } => {
                st.consecutive_errors = 0;
                st.job = Some(job.clone());
                if job.is_terminal() {
                    return;
                }
                if changed {
                    self.publish(SessionEvent::Updated { job });
                }
            }
            PollTick::Failed { job_id, error, .. } => {
                st.consecutive_errors = st.consecutive_errors.saturating_add(1);
                self.publish(SessionEvent::PollFailed { job_id, error });
            }
        }

        let elapsed = st.started.map(|s| s.elapsed()).unwrap_or_default();
        if let Some(reason) = self.config.exceeded(st.ticks, st.consecutive_errors, elapsed) {
            let Some(token) = st.token.take() else {
                return;
            };
            self.supervisor.stop_if_current(F::KIND, token);
            if let Some(job) = st.job.clone() {
                tracing::warn!(kind = %F::KIND, job_id = %job.id, %reason, "Giving up on job");
                self.publish(SessionEvent::GaveUp { job, reason });
            }
        }
    }

    /// Record the terminal snapshot and, for a succeeded job with an
    /// artifact, start fetching it.
    fn on_terminal(self: &Arc<Self>, token: SessionToken, job: FlavorJob<F>) {
        let mut st = self.state();
        if st.token != Some(token) {
            tracing::debug!(kind = %F::KIND, %token, "Discarding stale terminal state");
            return;
        }
        st.job = Some(job.clone());

        match job.state {
            JobState::Succeeded => {
                tracing::info!(kind = %F::KIND, job_id = %job.id, "Job succeeded");
            }
            _ => {
                tracing::warn!(
                    kind = %F::KIND,
                    job_id = %job.id,
                    message = %job.message,
                    "Job failed",
                );
            }
        }

        let fetch = match (job.state, st.artifact_format) {
            (JobState::Succeeded, Some(format)) => Some((job.id.clone(), format)),
            _ => None,
        };
        self.publish(SessionEvent::Finished { job });
        drop(st);

        if let Some((job_id, format)) = fetch {
            let shared = Arc::clone(self);
            tokio::spawn(async move {
                let result = shared.retriever.fetch_artifact(&job_id, format).await;
                shared.on_artifact(token, job_id, result);
            });
        }
    }

    fn on_artifact(
        &self,
        token: SessionToken,
        job_id: String,
        result: Result<ArtifactHandle, tcgen_client::ClientError>,
    ) {
        let mut st = self.state();
        if st.token != Some(token) {
            // Dropping a late handle releases it.
            tracing::debug!(kind = %F::KIND, %job_id, "Discarding artifact of superseded job");
            return;
        }
        match result {
            Ok(handle) => {
                let suggested_filename = handle.suggested_filename().to_string();
                st.artifact = Some(handle);
                self.publish(SessionEvent::ArtifactReady {
                    job_id,
                    suggested_filename,
                });
            }
            Err(e) => {
                self.publish(SessionEvent::ArtifactUnavailable {
                    job_id,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Submit, observe and cancel jobs of flavor `F`.
///
/// At most one session per flavor should share a [`PollSupervisor`],
/// since the supervisor keys its timers by job kind.
pub struct JobSession<F: JobFlavor> {
    service: Arc<dyn JobService>,
    shared: Arc<Shared<F>>,
}

impl<F: JobFlavor> JobSession<F> {
    pub fn new(
        service: Arc<dyn JobService>,
        supervisor: PollSupervisor,
        retriever: ResultRetriever,
        config: PollConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            service,
            shared: Arc::new(Shared {
                state: Mutex::new(Tracked::default()),
                events,
                supervisor,
                retriever,
                config,
            }),
        }
    }

    /// Session with its own supervisor and retriever over `service`.
    pub fn standalone(service: Arc<dyn JobService>, config: PollConfig) -> Self {
        let retriever = ResultRetriever::new(Arc::clone(&service));
        Self::new(service, PollSupervisor::new(), retriever, config)
    }

    /// Validate and submit `request`, then start polling it.
    ///
    /// Invalid requests fail with [`JobError::InvalidRequest`] before
    /// any network call. Any job this session was tracking is cancelled
    /// first. A submit error starts no session.
    pub async fn submit(&self, request: F::Request) -> Result<String, JobError> {
        let artifact_format = F::artifact_format(&request);
        let request: SubmitRequest = request.into();
        request.validate()?;

        let submission = {
            let mut st = self.shared.state();
            let submission = self.reset(&mut st);
            st.submission = submission;
            submission
        };

        let job_id = self.service.submit(&request).await.map_err(|e| {
            tracing::error!(kind = %F::KIND, error = %e, "Job submission failed");
            JobError::Transport(e)
        })?;

        let mut st = self.shared.state();
        if st.submission != submission {
            tracing::info!(kind = %F::KIND, %job_id, "Submission overtaken, not tracking job");
            return Err(JobError::Superseded { job_id });
        }

        let job: FlavorJob<F> = Job::pending(job_id.clone(), F::KIND);
        st.job = Some(job.clone());
        st.artifact_format = artifact_format;
        st.started = Some(Instant::now());

        let on_update = {
            let shared: Weak<Shared<F>> = Arc::downgrade(&self.shared);
            move |tick: PollTick<Outcome<F>>| {
                if let Some(shared) = shared.upgrade() {
                    shared.on_tick(tick);
                }
            }
        };
        let on_terminal = {
            let shared: Weak<Shared<F>> = Arc::downgrade(&self.shared);
            move |token: SessionToken, job: FlavorJob<F>| {
                if let Some(shared) = shared.upgrade() {
                    shared.on_terminal(token, job);
                }
            }
        };

        let token = self.shared.supervisor.start::<F::Status, _, _>(
            job.clone(),
            Arc::clone(&self.service),
            self.shared.config.interval,
            on_update,
            on_terminal,
        );
        st.token = Some(token);

        tracing::info!(kind = %F::KIND, %job_id, %token, "Job submitted");
        self.shared.publish(SessionEvent::Submitted { job });
        Ok(job_id)
    }

    /// Stop polling and forget the tracked job. Returns whether a job
    /// was being tracked. Safe to call repeatedly.
    pub fn cancel(&self) -> bool {
        let mut st = self.shared.state();
        let tracked = st.job.is_some();
        let submission = self.reset(&mut st);
        st.submission = submission;
        tracked
    }

    /// Receive every event of this session from now on.
    pub fn observe(&self) -> broadcast::Receiver<SessionEvent<Outcome<F>>> {
        self.shared.events.subscribe()
    }

    /// The current job snapshot, if one is tracked.
    pub fn snapshot(&self) -> Option<FlavorJob<F>> {
        self.shared.state().job.clone()
    }

    pub fn job_id(&self) -> Option<String> {
        self.shared.state().job.as_ref().map(|j| j.id.clone())
    }

    pub fn token(&self) -> Option<SessionToken> {
        self.shared.state().token
    }

    /// Whether this session's poll timer is running.
    pub fn is_active(&self) -> bool {
        let token = self.shared.state().token;
        token.is_some() && self.shared.supervisor.current_token(F::KIND) == token
    }

    /// Take ownership of the fetched artifact, if one is ready.
    pub fn take_artifact(&self) -> Option<ArtifactHandle> {
        self.shared.state().artifact.take()
    }

    pub fn supervisor(&self) -> &PollSupervisor {
        &self.shared.supervisor
    }

    /// Tear down whatever is tracked and return the next submission
    /// number. Publishes `Cancelled` for a job that was tracked.
    fn reset(&self, st: &mut Tracked<Outcome<F>>) -> u64 {
        if let Some(token) = st.token.take() {
            self.shared.supervisor.stop_if_current(F::KIND, token);
        }
        // Dropping an untaken artifact releases it.
        st.artifact.take();
        st.artifact_format = None;
        st.ticks = 0;
        st.consecutive_errors = 0;
        st.started = None;
        if let Some(job) = st.job.take() {
            tracing::info!(kind = %F::KIND, job_id = %job.id, "Job session cancelled");
            self.shared.publish(SessionEvent::Cancelled { job_id: job.id });
        }
        st.submission.wrapping_add(1)
    }
}

impl<F: JobFlavor> Drop for JobSession<F> {
    fn drop(&mut self) {
        let mut st = self.shared.state();
        if let Some(token) = st.token.take() {
            self.shared.supervisor.stop_if_current(F::KIND, token);
        }
        st.artifact.take();
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tcgen_client::{ClientError, ResultBody};
    use tcgen_core::job::JobKind;
    use tcgen_core::request::{FileUpload, GenerationRequest, RecognitionRequest};

    use super::*;
    use crate::flavor::{Generation, Recognition};

    struct Unreachable;

    #[async_trait]
    impl JobService for Unreachable {
        async fn submit(&self, _request: &SubmitRequest) -> Result<String, ClientError> {
            Err(ClientError::Decode("unreachable".into()))
        }

        async fn fetch_status(
            &self,
            _kind: JobKind,
            _job_id: &str,
        ) -> Result<serde_json::Value, ClientError> {
            Err(ClientError::Decode("unreachable".into()))
        }

        async fn fetch_result(&self, _job_id: &str) -> Result<ResultBody, ClientError> {
            Err(ClientError::Decode("unreachable".into()))
        }
    }

    fn session<F: JobFlavor>() -> JobSession<F> {
        JobSession::standalone(Arc::new(Unreachable), PollConfig::for_kind(F::KIND))
    }

    #[tokio::test]
    async fn stale_tick_is_discarded() {
        let session = session::<Generation>();
        {
            let mut st = session.shared.state();
            st.token = Some(SessionToken::new(7));
            st.job = Some(Job::pending("t-1", JobKind::Generation));
        }
        let mut rx = session.observe();

        let mut late: Job = Job::pending("t-0", JobKind::Generation);
        late.state = JobState::Running;
        late.progress = 80;
        session.shared.on_tick(PollTick::Applied {
            token: SessionToken::new(6),
            tick: 1,
            job: late,
            changed: true,
        });

        assert_eq!(session.snapshot().unwrap().id, "t-1");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_terminal_is_discarded() {
        let session = session::<Recognition>();
        let mut rx = session.observe();

        let mut done: Job<String> = Job::pending("r-0", JobKind::Recognition);
        done.state = JobState::Succeeded;
        session.shared.on_terminal(SessionToken::new(3), done);

        assert!(session.snapshot().is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn invalid_generation_request_fails_fast() {
        let session = session::<Generation>();
        let result = session.submit(GenerationRequest::default()).await;
        assert!(matches!(result, Err(JobError::InvalidRequest(_))));
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn invalid_recognition_request_fails_fast() {
        let session = session::<Recognition>();
        let result = session
            .submit(RecognitionRequest::new(FileUpload::new("x.png", Vec::new())))
            .await;
        assert!(matches!(result, Err(JobError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn cancel_without_job_is_noop() {
        let session = session::<Generation>();
        assert!(!session.cancel());
        assert!(!session.cancel());
    }
}
