//! Domain types for tracking remote test-case generation and image
//! recognition jobs.
//!
//! Everything in this crate is pure: job and status types, request
//! validation, the job state machine, and artifact filename derivation.
//! Transport lives in `tcgen-client`, polling in `tcgen-tracker`.

pub mod error;
pub mod filename;
pub mod job;
pub mod request;
pub mod state_machine;
pub mod status;
pub mod types;
