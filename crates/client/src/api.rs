//! REST API client for the remote job service.
//!
//! Wraps the submit / status / result endpoints using [`reqwest`].
//! Every method performs exactly one HTTP request and keeps no state.

use async_trait::async_trait;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tcgen_core::error::CoreError;
use tcgen_core::job::JobKind;
use tcgen_core::request::{FileUpload, GenerationInput, SubmitRequest};

use crate::config::ClientConfig;

/// Transport seam between the tracker and the remote service.
///
/// Status bodies are returned undecoded so that one poller can serve
/// every job kind; the caller picks the payload type.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Submit a job and return the server-assigned `task_id`.
    async fn submit(&self, request: &SubmitRequest) -> Result<String, ClientError>;

    /// Fetch the raw status body of one job.
    async fn fetch_status(
        &self,
        kind: JobKind,
        job_id: &str,
    ) -> Result<serde_json::Value, ClientError>;

    /// Fetch the binary result of a finished generation job.
    async fn fetch_result(&self, job_id: &str) -> Result<ResultBody, ClientError>;
}

/// Binary result body plus the header the filename is derived from.
#[derive(Debug, Clone, Default)]
pub struct ResultBody {
    pub bytes: Vec<u8>,
    pub content_disposition: Option<String>,
}

/// Response returned by both submit endpoints.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned job identifier.
    pub task_id: String,
}

/// Errors from the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Job service error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The `detail` field of the body when present, else the raw body.
        body: String,
    },

    /// A response body did not have the expected shape.
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// The request was rejected before being sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] CoreError),

    /// The configured base URL cannot be used.
    #[error("Invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    /// The result of a job reported as succeeded could not be fetched.
    #[error("Artifact for job {job_id} unavailable: {reason}")]
    ArtifactUnavailable { job_id: String, reason: String },
}

/// HTTP client for one job service deployment.
pub struct StatusClient {
    client: reqwest::Client,
    base_url: String,
}

impl StatusClient {
    /// Create a client for a service rooted at `base_url`,
    /// e.g. `http://localhost:8080/api`, with the default request timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::from_config(&ClientConfig {
            base_url: base_url.into(),
            ..ClientConfig::default()
        })
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Build a client with the configured per-request timeout.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config.base_url.clone()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the service host answers on its root route.
    pub async fn ping(&self) -> Result<(), ClientError> {
        let root = reqwest::Url::parse(&self.base_url)
            .and_then(|u| u.join("/"))
            .map_err(|_| ClientError::InvalidBaseUrl(self.base_url.clone()))?;

        let response = self.client.get(root).send().await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Build the multipart form for a submission.
    fn build_form(request: &SubmitRequest) -> Result<Form, ClientError> {
        let form = match request {
            SubmitRequest::Generation(req) => {
                let form = match req.input()? {
                    GenerationInput::Document(doc) => Form::new().part("file", Self::file_part(doc)?),
                    GenerationInput::Text(text) => Form::new().text("text", text.to_string()),
                };
                form.text("output_format", req.output_format.as_str())
            }
            SubmitRequest::Recognition(req) => {
                req.validate()?;
                Form::new().part("file", Self::file_part(&req.image)?)
            }
        };
        Ok(form)
    }

    fn file_part(upload: &FileUpload) -> Result<Part, ClientError> {
        let part = Part::bytes(upload.bytes.clone()).file_name(upload.file_name.clone());
        match upload.effective_content_type() {
            Some(ct) => Ok(part.mime_str(&ct)?),
            None => Ok(part),
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ClientError::Api`] carrying
    /// the status and error detail on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                body: error_detail(body),
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl JobService for StatusClient {
    async fn submit(&self, request: &SubmitRequest) -> Result<String, ClientError> {
        let form = Self::build_form(request)?;
        let kind = request.kind();

        let response = self
            .client
            .post(self.url(&format!("submit-{}", kind.slug())))
            .multipart(form)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;
        tracing::debug!(%kind, job_id = %submitted.task_id, "Job accepted by service");
        Ok(submitted.task_id)
    }

    async fn fetch_status(
        &self,
        kind: JobKind,
        job_id: &str,
    ) -> Result<serde_json::Value, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("{}-status/{}", kind.slug(), job_id)))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    async fn fetch_result(&self, job_id: &str) -> Result<ResultBody, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("generation-result/{job_id}")))
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let content_disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();

        Ok(ResultBody {
            bytes,
            content_disposition,
        })
    }
}

/// Pull the `detail` string out of a `{"detail": "..."}` error body.
fn error_detail(body: String) -> String {
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or(body)
}
