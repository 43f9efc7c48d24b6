//! REST client for the remote test-case generation / recognition service.
//!
//! [`api::StatusClient`] performs single submit, status and result
//! requests and implements the [`api::JobService`] seam the tracker
//! polls through. [`artifact::ResultRetriever`] turns a finished
//! generation job into a scoped [`artifact::ArtifactHandle`].

pub mod api;
pub mod artifact;
pub mod config;

pub use api::{ClientError, JobService, ResultBody, StatusClient};
