use std::sync::Arc;

use tcgen_client::artifact::{ArtifactLedger, ResultRetriever};
use tcgen_client::JobService;

use crate::config::TrackerConfig;
use crate::flavor::{Generation, Recognition};
use crate::session::JobSession;
use crate::supervisor::PollSupervisor;

/// Generation and recognition sessions over one service.
///
/// Both sessions share a [`PollSupervisor`], so each kind has at most one
/// live poll timer and the two kinds poll independently.
pub struct JobTracker {
    generation: JobSession<Generation>,
    recognition: JobSession<Recognition>,
    supervisor: PollSupervisor,
    ledger: ArtifactLedger,
}

impl JobTracker {
    pub fn new(service: Arc<dyn JobService>, config: TrackerConfig) -> Self {
        let supervisor = PollSupervisor::new();
        let ledger = ArtifactLedger::new();
        let retriever = ResultRetriever::with_ledger(Arc::clone(&service), ledger.clone());

        let generation = JobSession::new(
            Arc::clone(&service),
            supervisor.clone(),
            retriever.clone(),
            config.generation,
        );
        let recognition =
            JobSession::new(service, supervisor.clone(), retriever, config.recognition);

        Self {
            generation,
            recognition,
            supervisor,
            ledger,
        }
    }

    pub fn generation(&self) -> &JobSession<Generation> {
        &self.generation
    }

    pub fn recognition(&self) -> &JobSession<Recognition> {
        &self.recognition
    }

    pub fn supervisor(&self) -> &PollSupervisor {
        &self.supervisor
    }

    /// Counts of artifact handles fetched by the generation session.
    pub fn ledger(&self) -> &ArtifactLedger {
        &self.ledger
    }

    /// Cancel both sessions and stop every poll timer.
    pub fn shutdown(&self) {
        self.generation.cancel();
        self.recognition.cancel();
        self.supervisor.shutdown();
        tracing::info!("Job tracker shut down");
    }
}
