use tcgen_client::ClientError;
use tcgen_core::error::CoreError;

/// Errors surfaced to callers of a job session.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Local validation failed; the service was never contacted.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Submitting the job failed (network, timeout, non-2xx).
    #[error("Transport error: {0}")]
    Transport(#[from] ClientError),

    /// The service reported `status = failed`. Terminal.
    #[error("Job {job_id} failed: {message}")]
    DomainFailure { job_id: String, message: String },

    /// The result of a succeeded job could not be fetched. Terminal.
    #[error("Artifact for job {job_id} unavailable: {reason}")]
    ArtifactUnavailable { job_id: String, reason: String },

    /// A newer submission or a cancel overtook this submission while it
    /// was in flight; the job is not tracked.
    #[error("Submission of job {job_id} was superseded")]
    Superseded { job_id: String },
}

impl From<CoreError> for JobError {
    fn from(value: CoreError) -> Self {
        JobError::InvalidRequest(value.to_string())
    }
}
