#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tcgen_client::{ClientError, JobService, ResultBody};
use tcgen_core::job::JobKind;
use tcgen_core::request::SubmitRequest;
use tcgen_tracker::SessionEvent;
use tokio::sync::{broadcast, Notify};

/// One scripted answer to a status poll.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(Value),
    Fail(String),
}

pub fn running(progress: u8) -> Reply {
    Reply::Status(json!({"status": "running", "progress": progress, "message": "working"}))
}

pub fn completed(message: &str) -> Reply {
    Reply::Status(json!({"status": "completed", "progress": 100, "message": message}))
}

pub fn failed(message: &str) -> Reply {
    Reply::Status(json!({"status": "failed", "progress": 0, "message": message}))
}

pub fn recognized(text: &str) -> Reply {
    Reply::Status(json!({"status": "completed", "progress": 100, "message": "done", "text": text}))
}

/// In-memory `JobService` that answers status polls from per-kind
/// scripts. When a script runs dry the last reply is repeated.
#[derive(Default)]
pub struct ScriptedService {
    scripts: Mutex<HashMap<JobKind, VecDeque<Reply>>>,
    last: Mutex<HashMap<JobKind, Reply>>,
    result: Mutex<Option<ResultBody>>,
    submits: AtomicUsize,
    polls: Mutex<HashMap<JobKind, usize>>,
    result_fetches: AtomicUsize,
    /// When set, every status fetch waits for a permit before answering.
    status_gate: Mutex<Option<Arc<Notify>>>,
    /// When set, every submit waits for a permit before answering.
    submit_gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, kind: JobKind, replies: impl IntoIterator<Item = Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .extend(replies);
    }

    pub fn set_result(&self, body: ResultBody) {
        *self.result.lock().unwrap() = Some(body);
    }

    pub fn gate_status(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.status_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Remove the status gate and wake every fetch parked on it.
    pub fn open_status_gate(&self) {
        if let Some(gate) = self.status_gate.lock().unwrap().take() {
            gate.notify_waiters();
        }
    }

    pub fn gate_submit(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.submit_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn polls(&self, kind: JobKind) -> usize {
        self.polls.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }

    pub fn result_fetches(&self) -> usize {
        self.result_fetches.load(Ordering::SeqCst)
    }

    fn next_reply(&self, kind: JobKind) -> Reply {
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front);
        let mut last = self.last.lock().unwrap();
        match next {
            Some(reply) => {
                last.insert(kind, reply.clone());
                reply
            }
            None => last.get(&kind).cloned().unwrap_or_else(|| running(0)),
        }
    }
}

#[async_trait]
impl JobService for ScriptedService {
    async fn submit(&self, request: &SubmitRequest) -> Result<String, ClientError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        let gate = self.submit_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(format!("{}-{n}", request.kind().slug()))
    }

    async fn fetch_status(&self, kind: JobKind, _job_id: &str) -> Result<Value, ClientError> {
        *self.polls.lock().unwrap().entry(kind).or_default() += 1;
        let gate = self.status_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.next_reply(kind) {
            Reply::Status(body) => Ok(body),
            Reply::Fail(detail) => Err(ClientError::Api {
                status: 503,
                body: detail,
            }),
        }
    }

    async fn fetch_result(&self, job_id: &str) -> Result<ResultBody, ClientError> {
        self.result_fetches.fetch_add(1, Ordering::SeqCst);
        self.result
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ClientError::Api {
                status: 404,
                body: format!("no result for {job_id}"),
            })
    }
}

/// Next event, failing the test if none arrives within a minute of
/// (virtual) time.
pub async fn next_event<O: Clone>(rx: &mut broadcast::Receiver<SessionEvent<O>>) -> SessionEvent<O> {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event channel closed")
}

/// Collect events until one matches `stop`, returning all of them.
pub async fn events_until<O: Clone>(
    rx: &mut broadcast::Receiver<SessionEvent<O>>,
    stop: impl Fn(&SessionEvent<O>) -> bool,
) -> Vec<SessionEvent<O>> {
    let mut seen = Vec::new();
    loop {
        let event = next_event(rx).await;
        let done = stop(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

/// Let spawned tasks run and virtual time pass.
pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}
