//! Job kinds as type-level parameters of the tracking machinery.
//!
//! Generation and recognition share one polling flow; a [`JobFlavor`]
//! supplies what differs between them: the request type, the status
//! payload shape and whether a finished job has an artifact to fetch.

use tcgen_core::job::{Job, JobKind};
use tcgen_core::request::{GenerationRequest, OutputFormat, RecognitionRequest, SubmitRequest};
use tcgen_core::status::{GenerationStatus, RecognitionStatus, StatusReport};

pub trait JobFlavor: Send + Sync + 'static {
    const KIND: JobKind;

    type Request: Into<SubmitRequest> + Send;

    type Status: StatusReport;

    /// Format of the artifact to download once the job succeeds, or
    /// `None` when the job's result is carried in its status payload.
    fn artifact_format(request: &Self::Request) -> Option<OutputFormat>;
}

/// Success payload of a flavor's jobs.
pub type Outcome<F> = <<F as JobFlavor>::Status as StatusReport>::Outcome;

/// Job snapshot type of a flavor.
pub type FlavorJob<F> = Job<Outcome<F>>;

/// Document or text to test cases; the result is a downloadable export.
pub struct Generation;

impl JobFlavor for Generation {
    const KIND: JobKind = JobKind::Generation;
    type Request = GenerationRequest;
    type Status = GenerationStatus;

    fn artifact_format(request: &GenerationRequest) -> Option<OutputFormat> {
        Some(request.output_format)
    }
}

/// Image to text; the recognized text arrives with the final status.
pub struct Recognition;

impl JobFlavor for Recognition {
    const KIND: JobKind = JobKind::Recognition;
    type Request = RecognitionRequest;
    type Status = RecognitionStatus;

    fn artifact_format(_request: &RecognitionRequest) -> Option<OutputFormat> {
        None
    }
}
