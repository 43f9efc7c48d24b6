//! Pure job state transitions.
//!
//! [`transition`] folds one status payload into the current job
//! snapshot. It never fails: payloads that would move the job backwards
//! (a late `pending`, lower progress, anything after a terminal state)
//! leave the job unchanged.

use crate::job::{Job, JobState};
use crate::status::{RemoteStatus, StatusReport};

/// Apply `payload` to `current`, returning the next snapshot.
pub fn transition<S: StatusReport>(current: &Job<S::Outcome>, payload: &S) -> Job<S::Outcome> {
    if current.is_terminal() {
        return current.clone();
    }

    let mut next = current.clone();
    match payload.status() {
        RemoteStatus::Completed => {
            next.state = JobState::Succeeded;
            next.progress = 100;
            if let Some(message) = payload.message() {
                next.message = message.to_string();
            }
            next.outcome = payload.outcome();
        }
        RemoteStatus::Failed => {
            next.state = JobState::Failed;
            if let Some(message) = payload.message() {
                next.message = message.to_string();
            }
        }
        RemoteStatus::Pending if current.state.rank() > JobState::Pending.rank() => {
            return current.clone();
        }
        RemoteStatus::Pending | RemoteStatus::Running | RemoteStatus::Unknown(_) => {
            if !apply_progress(&mut next, payload) {
                return current.clone();
            }
            next.state = JobState::Running;
        }
    }
    next
}

/// Copy progress and message from a non-terminal payload. Returns
/// `false` when the payload reports less progress than already seen.
fn apply_progress<S: StatusReport>(next: &mut Job<S::Outcome>, payload: &S) -> bool {
    let progress = payload.progress().unwrap_or(next.progress);
    if progress < next.progress {
        return false;
    }
    next.progress = progress;
    if let Some(message) = payload.message() {
        next.message = message.to_string();
    }
    true
}
