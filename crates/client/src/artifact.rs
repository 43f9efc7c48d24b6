//! Result retrieval for finished generation jobs.
//!
//! [`ResultRetriever::fetch_artifact`] downloads the exported test cases
//! and wraps them in an [`ArtifactHandle`]. Each handle is counted by an
//! [`ArtifactLedger`] until it is released, either explicitly via
//! [`ArtifactHandle::release`] or when dropped. A handle is released
//! exactly once.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tcgen_core::filename;
use tcgen_core::request::OutputFormat;

use crate::api::{ClientError, JobService};

/// Downloaded test-case export.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub job_id: String,
    pub bytes: Vec<u8>,
    pub suggested_filename: String,
    pub format: OutputFormat,
}

impl Artifact {
    /// Write the artifact into `dir` under its suggested filename.
    pub async fn save_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let name = filename::sanitize(&self.suggested_filename);
        let name = if name.is_empty() {
            filename::fallback(self.format)
        } else {
            name
        };
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(name);
        tokio::fs::write(&path, &self.bytes).await?;
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// ArtifactLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LedgerCounts {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

/// Shared counter of live artifact handles.
#[derive(Debug, Clone, Default)]
pub struct ArtifactLedger {
    counts: Arc<LedgerCounts>,
}

impl ArtifactLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles handed out so far.
    pub fn acquired(&self) -> usize {
        self.counts.acquired.load(Ordering::SeqCst)
    }

    /// Handles released so far.
    pub fn released(&self) -> usize {
        self.counts.released.load(Ordering::SeqCst)
    }

    /// Handles still held by callers.
    pub fn outstanding(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }

    fn acquire(&self, artifact: Artifact) -> ArtifactHandle {
        self.counts.acquired.fetch_add(1, Ordering::SeqCst);
        ArtifactHandle {
            artifact,
            ledger: self.clone(),
            released: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ArtifactHandle
// ---------------------------------------------------------------------------

/// Scoped ownership of a downloaded [`Artifact`].
#[derive(Debug)]
pub struct ArtifactHandle {
    artifact: Artifact,
    ledger: ArtifactLedger,
    released: bool,
}

impl ArtifactHandle {
    pub fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn job_id(&self) -> &str {
        &self.artifact.job_id
    }

    pub fn suggested_filename(&self) -> &str {
        &self.artifact.suggested_filename
    }

    /// Save the artifact to `dir`, then release the handle.
    pub async fn save_and_release(self, dir: &Path) -> std::io::Result<PathBuf> {
        let result = self.artifact.save_to(dir).await;
        self.release();
        result
    }

    /// Release the handle. Dropping it has the same effect.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.ledger.counts.released.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            job_id = %self.artifact.job_id,
            filename = %self.artifact.suggested_filename,
            "Artifact released",
        );
    }
}

impl Drop for ArtifactHandle {
    fn drop(&mut self) {
        self.release_once();
    }
}

// ---------------------------------------------------------------------------
// ResultRetriever
// ---------------------------------------------------------------------------

/// Fetches the artifact of a succeeded generation job.
#[derive(Clone)]
pub struct ResultRetriever {
    service: Arc<dyn JobService>,
    ledger: ArtifactLedger,
}

impl ResultRetriever {
    pub fn new(service: Arc<dyn JobService>) -> Self {
        Self::with_ledger(service, ArtifactLedger::new())
    }

    pub fn with_ledger(service: Arc<dyn JobService>, ledger: ArtifactLedger) -> Self {
        Self { service, ledger }
    }

    pub fn ledger(&self) -> &ArtifactLedger {
        &self.ledger
    }

    /// Download the result of `job_id`.
    ///
    /// Only call this once the job has succeeded. Any failure, including
    /// an empty body, is reported as [`ClientError::ArtifactUnavailable`]
    /// and is not retried: the caller has to resubmit.
    pub async fn fetch_artifact(
        &self,
        job_id: &str,
        format: OutputFormat,
    ) -> Result<ArtifactHandle, ClientError> {
        let body = self.service.fetch_result(job_id).await.map_err(|e| {
            tracing::error!(job_id, error = %e, "Failed to fetch job result");
            ClientError::ArtifactUnavailable {
                job_id: job_id.to_string(),
                reason: e.to_string(),
            }
        })?;

        if body.bytes.is_empty() {
            tracing::error!(job_id, "Job result body is empty");
            return Err(ClientError::ArtifactUnavailable {
                job_id: job_id.to_string(),
                reason: "empty result body".into(),
            });
        }

        let suggested_filename = filename::suggested(body.content_disposition.as_deref(), format);
        tracing::info!(
            job_id,
            filename = %suggested_filename,
            size = body.bytes.len(),
            "Artifact fetched",
        );

        Ok(self.ledger.acquire(Artifact {
            job_id: job_id.to_string(),
            bytes: body.bytes,
            suggested_filename,
            format,
        }))
    }
}
