//! Asynchronous tracking of remote generation and recognition jobs.
//!
//! A [`session::JobSession`] submits one kind of job, polls it through
//! the shared [`supervisor::PollSupervisor`], folds every status payload
//! through the core state machine and broadcasts [`events::SessionEvent`]s
//! to any number of observers. [`tracker::JobTracker`] bundles the two
//! kinds over one service and supervisor.

pub mod config;
pub mod error;
pub mod events;
pub mod flavor;
pub mod session;
pub mod supervisor;
pub mod tracker;

pub use error::JobError;
pub use events::SessionEvent;
pub use flavor::{Generation, JobFlavor, Recognition};
pub use session::JobSession;
pub use supervisor::{PollSupervisor, PollTick, SessionToken};
pub use tracker::JobTracker;
