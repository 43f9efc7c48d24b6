//! Events broadcast by a [`JobSession`](crate::session::JobSession).

use serde::Serialize;
use tcgen_core::job::{Job, JobState};

use crate::error::JobError;

/// One observable change in a job session.
///
/// Every observer receives the same sequence. `Finished` is sent exactly
/// once per submitted job that reaches a terminal state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent<O> {
    /// The service accepted the job; polling has started.
    Submitted { job: Job<O> },

    /// A poll changed the job snapshot (non-terminal).
    Updated { job: Job<O> },

    /// One poll tick failed; polling continues.
    PollFailed { job_id: String, error: String },

    /// The job reached `Succeeded` or `Failed`.
    Finished { job: Job<O> },

    /// The result of a succeeded generation job is ready to take.
    ArtifactReady {
        job_id: String,
        suggested_filename: String,
    },

    /// The result of a succeeded generation job could not be fetched.
    ArtifactUnavailable { job_id: String, reason: String },

    /// A caller-imposed polling limit was hit; the job is no longer
    /// tracked and its last known state is kept.
    GaveUp { job: Job<O>, reason: String },

    /// The session was cancelled or superseded by a new submission.
    Cancelled { job_id: String },
}

impl<O> SessionEvent<O> {
    pub fn job_id(&self) -> &str {
        match self {
            SessionEvent::Submitted { job }
            | SessionEvent::Updated { job }
            | SessionEvent::Finished { job }
            | SessionEvent::GaveUp { job, .. } => &job.id,
            SessionEvent::PollFailed { job_id, .. }
            | SessionEvent::ArtifactReady { job_id, .. }
            | SessionEvent::ArtifactUnavailable { job_id, .. }
            | SessionEvent::Cancelled { job_id } => job_id,
        }
    }

    /// The terminal failure this event reports, if any.
    pub fn terminal_error(&self) -> Option<JobError> {
        match self {
            SessionEvent::Finished { job } if job.state == JobState::Failed => {
                Some(JobError::DomainFailure {
                    job_id: job.id.clone(),
                    message: job.message.clone(),
                })
            }
            SessionEvent::ArtifactUnavailable { job_id, reason } => {
                Some(JobError::ArtifactUnavailable {
                    job_id: job_id.clone(),
                    reason: reason.clone(),
                })
            }
            _ => None,
        }
    }
}
