//! Status payloads returned by the remote job service.
//!
//! Both job kinds report `{ status, progress, message }`; recognition
//! adds `text` once the job has completed. [`StatusReport`] is the
//! common view the state machine and the poller work against.

use serde::de::DeserializeOwned;
use serde::Deserialize;

/// The explicit status field of a payload, the only termination signal.
///
/// The service also emits `queued` and `processing`; those are folded
/// into the nearest non-terminal variant. Anything else is kept as
/// [`RemoteStatus::Unknown`] and treated as still running.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum RemoteStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Unknown(String),
}

impl From<String> for RemoteStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" | "queued" => RemoteStatus::Pending,
            "running" | "processing" => RemoteStatus::Running,
            "completed" => RemoteStatus::Completed,
            "failed" => RemoteStatus::Failed,
            _ => RemoteStatus::Unknown(value),
        }
    }
}

/// Common accessors over a kind-specific status payload.
pub trait StatusReport: DeserializeOwned + std::fmt::Debug + Send + Sync + 'static {
    /// Extra data carried into [`crate::job::Job::outcome`] on success.
    type Outcome: Clone + std::fmt::Debug + PartialEq + Send + Sync + 'static;

    fn status(&self) -> &RemoteStatus;

    /// Reported progress clamped to 0-100, if the payload carried one.
    fn progress(&self) -> Option<u8>;

    fn message(&self) -> Option<&str>;

    /// The success payload, if this report carries one.
    fn outcome(&self) -> Option<Self::Outcome>;
}

/// `GET /generation-status/{task_id}` body.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationStatus {
    pub status: RemoteStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `GET /recognition-status/{task_id}` body.
#[derive(Debug, Clone, Deserialize)]
pub struct RecognitionStatus {
    pub status: RemoteStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    /// Present only when `status = completed`.
    #[serde(default)]
    pub text: Option<String>,
}

fn clamp_progress(raw: Option<f64>) -> Option<u8> {
    raw.filter(|p| p.is_finite())
        .map(|p| p.round().clamp(0.0, 100.0) as u8)
}

impl StatusReport for GenerationStatus {
    type Outcome = ();

    fn status(&self) -> &RemoteStatus {
        &self.status
    }

    fn progress(&self) -> Option<u8> {
        clamp_progress(self.progress)
    }

    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn outcome(&self) -> Option<()> {
        (self.status == RemoteStatus::Completed).then_some(())
    }
}

impl StatusReport for RecognitionStatus {
    type Outcome = String;

    fn status(&self) -> &RemoteStatus {
        &self.status
    }

    fn progress(&self) -> Option<u8> {
        clamp_progress(self.progress)
    }

    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn outcome(&self) -> Option<String> {
        match self.status {
            RemoteStatus::Completed => self.text.clone(),
            _ => None,
        }
    }
}
