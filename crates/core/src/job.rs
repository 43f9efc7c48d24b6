//! The tracked [`Job`] and its lifecycle states.

use std::fmt;

use serde::Serialize;

use crate::types::Timestamp;

/// The two kinds of remote work this client can track.
///
/// Each kind is an independent polling key: a generation job and a
/// recognition job may be tracked at the same time without interfering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Requirements document (or text) to test cases.
    Generation,
    /// Image to text.
    Recognition,
}

impl JobKind {
    /// Path prefix used by the remote service, e.g. `generation-status`.
    pub fn slug(self) -> &'static str {
        match self {
            JobKind::Generation => "generation",
            JobKind::Recognition => "recognition",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Local lifecycle state of a job.
///
/// Only advances `Pending -> Running -> {Succeeded | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Submitted; no status has been observed yet.
    Pending,
    /// The service reported progress but has not finished.
    Running,
    /// Terminal: the service completed the job.
    Succeeded,
    /// Terminal: the service reported a failure.
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    /// Position along the lifecycle, used to reject regressions.
    pub(crate) fn rank(self) -> u8 {
        match self {
            JobState::Pending => 0,
            JobState::Running => 1,
            JobState::Succeeded | JobState::Failed => 2,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One remote unit of work, as seen by this client.
///
/// `O` is the kind-specific success payload: `()` for generation (the
/// result is a downloadable artifact), `String` for recognition (the
/// recognized text). It is only set once the job has succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job<O = ()> {
    /// Opaque identifier assigned by the remote service (`task_id`).
    pub id: String,
    pub kind: JobKind,
    pub state: JobState,
    /// Completion percentage (0-100).
    pub progress: u8,
    /// Last human-readable message from the service. Display only.
    pub message: String,
    pub created_at: Timestamp,
    pub outcome: Option<O>,
}

/// A recognition job; `outcome` carries the recognized text.
pub type RecognitionResult = Job<String>;

impl<O> Job<O> {
    /// A freshly submitted job that has not been polled yet.
    pub fn pending(id: impl Into<String>, kind: JobKind) -> Self {
        Self {
            id: id.into(),
            kind,
            state: JobState::Pending,
            progress: 0,
            message: String::new(),
            created_at: chrono::Utc::now(),
            outcome: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

impl Job<String> {
    /// The recognized text, present only after the job succeeded.
    pub fn recognized_text(&self) -> Option<&str> {
        match self.state {
            JobState::Succeeded => self.outcome.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_job_starts_empty() {
        let job: Job = Job::pending("t-1", JobKind::Generation);
        assert_eq!(job.id, "t-1");
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.progress, 0);
        assert!(job.message.is_empty());
        assert!(job.outcome.is_none());
        assert!(!job.is_terminal());
    }

    #[test]
    fn only_succeeded_and_failed_are_terminal() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn recognized_text_hidden_until_success() {
        let mut job: RecognitionResult = Job::pending("r-1", JobKind::Recognition);
        job.outcome = Some("ABC".into());
        assert_eq!(job.recognized_text(), None);

        job.state = JobState::Succeeded;
        assert_eq!(job.recognized_text(), Some("ABC"));
    }

    #[test]
    fn kind_slugs_match_service_paths() {
        assert_eq!(JobKind::Generation.slug(), "generation");
        assert_eq!(JobKind::Recognition.to_string(), "recognition");
    }
}
