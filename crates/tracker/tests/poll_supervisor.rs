//! Tests for `PollSupervisor` driven directly with callbacks.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use tcgen_core::job::{Job, JobKind, JobState};
use tcgen_core::status::GenerationStatus;
use tcgen_tracker::{PollSupervisor, PollTick, SessionToken};
use tokio::sync::oneshot;

use common::{completed, running, settle, Reply, ScriptedService};

type Ticks = Arc<Mutex<Vec<PollTick<()>>>>;

fn start_generation(
    supervisor: &PollSupervisor,
    service: &Arc<ScriptedService>,
    job_id: &str,
) -> (SessionToken, Ticks, oneshot::Receiver<Job>) {
    let ticks: Ticks = Arc::default();
    let (done_tx, done_rx) = oneshot::channel();
    let token = supervisor.start::<GenerationStatus, _, _>(
        Job::pending(job_id, JobKind::Generation),
        service.clone(),
        Duration::from_secs(2),
        {
            let ticks = Arc::clone(&ticks);
            move |tick| ticks.lock().unwrap().push(tick)
        },
        move |_token, job| {
            let _ = done_tx.send(job);
        },
    );
    (token, ticks, done_rx)
}

// ---------------------------------------------------------------------------
// Test: the first poll happens immediately, then once per interval
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn polls_immediately_then_on_interval() {
    let service = ScriptedService::new();
    let supervisor = PollSupervisor::new();

    let (_token, ticks, _done) = start_generation(&supervisor, &service, "g-1");
    settle(Duration::from_millis(10)).await;
    assert_eq!(service.polls(JobKind::Generation), 1);

    settle(Duration::from_secs(2)).await;
    assert_eq!(service.polls(JobKind::Generation), 2);
    assert_eq!(ticks.lock().unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Test: a terminal payload ends the session and fires on_terminal once
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn terminal_payload_ends_session() {
    let service = ScriptedService::new();
    service.script(JobKind::Generation, [running(40), completed("done")]);
    let supervisor = PollSupervisor::new();

    let (token, ticks, done) = start_generation(&supervisor, &service, "g-1");
    let job = done.await.unwrap();

    assert_eq!(job.state, JobState::Succeeded);
    assert_eq!(job.message, "done");
    assert!(!supervisor.is_active(JobKind::Generation));
    assert!(!supervisor.stop_if_current(JobKind::Generation, token));

    settle(Duration::from_secs(10)).await;
    assert_eq!(service.polls(JobKind::Generation), 2);
    assert_matches!(
        ticks.lock().unwrap().last(),
        Some(PollTick::Applied { job, changed: true, .. }) if job.state == JobState::Succeeded
    );
}

// ---------------------------------------------------------------------------
// Test: starting the same kind again disposes the old timer
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn restart_replaces_previous_session() {
    let service = ScriptedService::new();
    let supervisor = PollSupervisor::new();

    let (first, first_ticks, _d1) = start_generation(&supervisor, &service, "g-1");
    settle(Duration::from_millis(10)).await;
    let (second, _second_ticks, _d2) = start_generation(&supervisor, &service, "g-2");

    assert!(second > first);
    assert_eq!(supervisor.active_count(), 1);
    assert_eq!(supervisor.current_token(JobKind::Generation), Some(second));

    let before = first_ticks.lock().unwrap().len();
    settle(Duration::from_secs(10)).await;
    assert_eq!(first_ticks.lock().unwrap().len(), before);
    assert!(!supervisor.stop_if_current(JobKind::Generation, first));
    assert!(supervisor.stop_if_current(JobKind::Generation, second));
}

// ---------------------------------------------------------------------------
// Test: failed fetches are reported and polling continues
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn failed_fetch_is_reported_and_retried() {
    let service = ScriptedService::new();
    service.script(
        JobKind::Generation,
        [Reply::Fail("unavailable".into()), completed("done")],
    );
    let supervisor = PollSupervisor::new();

    let (_token, ticks, done) = start_generation(&supervisor, &service, "g-1");
    done.await.unwrap();

    let ticks = ticks.lock().unwrap();
    assert_matches!(
        &ticks[0],
        PollTick::Failed { tick: 1, error, .. } if error.contains("unavailable")
    );
    assert_matches!(&ticks[1], PollTick::Applied { tick: 2, .. });
}

#[tokio::test(start_paused = true)]
async fn undecodable_body_is_a_failed_tick() {
    let service = ScriptedService::new();
    service.script(
        JobKind::Generation,
        [Reply::Status(serde_json::json!({"progress": "lots"}))],
    );
    let supervisor = PollSupervisor::new();

    let (_token, ticks, _done) = start_generation(&supervisor, &service, "g-1");
    settle(Duration::from_millis(10)).await;

    assert_matches!(ticks.lock().unwrap().first(), Some(PollTick::Failed { .. }));
    assert!(supervisor.is_active(JobKind::Generation));
}

// ---------------------------------------------------------------------------
// Test: stop and shutdown halt polling
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn stop_halts_polling() {
    let service = ScriptedService::new();
    let supervisor = PollSupervisor::new();

    start_generation(&supervisor, &service, "g-1");
    settle(Duration::from_millis(10)).await;

    assert!(supervisor.stop(JobKind::Generation));
    assert!(!supervisor.stop(JobKind::Generation));
    settle(Duration::from_secs(10)).await;
    assert_eq!(service.polls(JobKind::Generation), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_every_kind() {
    let service = ScriptedService::new();
    let supervisor = PollSupervisor::new();

    start_generation(&supervisor, &service, "g-1");
    let rec_ticks: Arc<Mutex<Vec<PollTick<String>>>> = Arc::default();
    supervisor.start::<tcgen_core::status::RecognitionStatus, _, _>(
        Job::pending("r-1", JobKind::Recognition),
        service.clone(),
        Duration::from_secs(1),
        {
            let rec_ticks = Arc::clone(&rec_ticks);
            move |tick| rec_ticks.lock().unwrap().push(tick)
        },
        |_, _| {},
    );
    assert_eq!(supervisor.active_count(), 2);

    settle(Duration::from_millis(10)).await;
    supervisor.shutdown();
    settle(Duration::from_secs(10)).await;

    assert_eq!(supervisor.active_count(), 0);
    assert_eq!(service.polls(JobKind::Generation), 1);
    assert_eq!(service.polls(JobKind::Recognition), 1);
}
