//! Submission requests and their local validation.
//!
//! Validation runs before anything touches the network: an invalid
//! request never reaches the remote service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job::JobKind;

// ---------------------------------------------------------------------------
// Output format
// ---------------------------------------------------------------------------

/// Test-case export format requested from the generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Excel,
    Xmind,
}

impl OutputFormat {
    /// Value sent in the `output_format` form field.
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Excel => "excel",
            OutputFormat::Xmind => "xmind",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "excel" => Ok(OutputFormat::Excel),
            "xmind" => Ok(OutputFormat::Xmind),
            other => Err(CoreError::UnsupportedFormat(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

/// Image content types accepted by the recognition service.
pub const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/bmp", "image/tiff"];

/// A file attached to a multipart submission.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub file_name: String,
    /// Explicit MIME type; inferred from the extension when `None`.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The explicit content type, or one guessed from the file extension.
    pub fn effective_content_type(&self) -> Option<String> {
        if let Some(ct) = &self.content_type {
            return Some(ct.to_ascii_lowercase());
        }
        let ext = self.file_name.rsplit_once('.')?.1.to_ascii_lowercase();
        let guessed = match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "bmp" => "image/bmp",
            "tif" | "tiff" => "image/tiff",
            "md" | "markdown" => "text/markdown",
            "txt" => "text/plain",
            _ => return None,
        };
        Some(guessed.to_string())
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Request to turn a requirements document (or raw text) into test cases.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationRequest {
    pub document: Option<FileUpload>,
    pub text: Option<String>,
    pub output_format: OutputFormat,
}

/// The input a valid generation request resolves to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GenerationInput<'a> {
    Document(&'a FileUpload),
    Text(&'a str),
}

impl GenerationRequest {
    pub fn from_document(document: FileUpload, output_format: OutputFormat) -> Self {
        Self {
            document: Some(document),
            text: None,
            output_format,
        }
    }

    pub fn from_text(text: impl Into<String>, output_format: OutputFormat) -> Self {
        Self {
            document: None,
            text: Some(text.into()),
            output_format,
        }
    }

    /// Resolve which input will be sent. A non-empty document wins over
    /// text; text must contain something other than whitespace.
    pub fn input(&self) -> Result<GenerationInput<'_>, CoreError> {
        if let Some(doc) = self.document.as_ref().filter(|d| !d.is_empty()) {
            return Ok(GenerationInput::Document(doc));
        }
        match self.text.as_deref() {
            Some(text) if !text.trim().is_empty() => Ok(GenerationInput::Text(text)),
            _ => Err(CoreError::Validation(
                "a non-empty requirements document or text is required".into(),
            )),
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.input().map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Recognition
// ---------------------------------------------------------------------------

/// Request to recognize the text in an image.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionRequest {
    pub image: FileUpload,
}

impl RecognitionRequest {
    pub fn new(image: FileUpload) -> Self {
        Self { image }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.image.is_empty() {
            return Err(CoreError::Validation("a non-empty image is required".into()));
        }
        match self.image.effective_content_type() {
            Some(ct) if SUPPORTED_IMAGE_TYPES.contains(&ct.as_str()) => Ok(()),
            Some(ct) => Err(CoreError::Validation(format!(
                "unsupported image type '{ct}', expected JPG, PNG, BMP or TIFF"
            ))),
            None => Err(CoreError::Validation(format!(
                "cannot determine image type of '{}'",
                self.image.file_name
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Submission envelope
// ---------------------------------------------------------------------------

/// Either kind of request, as handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitRequest {
    Generation(GenerationRequest),
    Recognition(RecognitionRequest),
}

impl SubmitRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            SubmitRequest::Generation(_) => JobKind::Generation,
            SubmitRequest::Recognition(_) => JobKind::Recognition,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            SubmitRequest::Generation(r) => r.validate(),
            SubmitRequest::Recognition(r) => r.validate(),
        }
    }
}

impl From<GenerationRequest> for SubmitRequest {
    fn from(value: GenerationRequest) -> Self {
        SubmitRequest::Generation(value)
    }
}

impl From<RecognitionRequest> for SubmitRequest {
    fn from(value: RecognitionRequest) -> Self {
        SubmitRequest::Recognition(value)
    }
}
