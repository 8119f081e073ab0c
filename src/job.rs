use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::analysis::{AnalysisProgress, Analyzer};
use crate::error::AnalysisError;
use crate::model::{MatchBatch, PlayerIdentity};
use crate::store::AnalysisStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded { entries: usize },
    Failed(AnalysisError),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

/// Lifecycle events sent from the worker thread, in emission order.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Progress {
        job_id: u64,
        current: usize,
        total: usize,
        message: String,
    },
    /// All stats for the batch are in the store.
    ResultReady { job_id: u64 },
    /// Last event of the job; the worker returns right after sending it.
    Completed { job_id: u64, outcome: JobOutcome },
}

impl JobEvent {
    pub fn job_id(&self) -> u64 {
        match self {
            JobEvent::Progress { job_id, .. }
            | JobEvent::ResultReady { job_id }
            | JobEvent::Completed { job_id, .. } => *job_id,
        }
    }
}

/// One analysis run over one batch, executed on its own thread.
pub struct AnalysisJob {
    id: u64,
    player: PlayerIdentity,
    batch: Option<MatchBatch>,
    store: Arc<AnalysisStore>,
    analyzer: Arc<dyn Analyzer>,
    tx: Option<Sender<JobEvent>>,
    handle: Option<JoinHandle<MatchBatch>>,
}

impl AnalysisJob {
    /// Builds the job together with the receiving end of its private event
    /// channel. Nothing runs until `start`.
    pub fn new(
        id: u64,
        batch: MatchBatch,
        player: PlayerIdentity,
        store: Arc<AnalysisStore>,
        analyzer: Arc<dyn Analyzer>,
    ) -> (Self, Receiver<JobEvent>) {
        let (tx, rx) = mpsc::channel();
        let job = Self {
            id,
            player,
            batch: Some(batch),
            store,
            analyzer,
            tx: Some(tx),
            handle: None,
        };
        (job, rx)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn player(&self) -> &PlayerIdentity {
        &self.player
    }

    pub fn is_started(&self) -> bool {
        self.batch.is_none()
    }

    /// Spawns the worker thread. Must be called once.
    ///
    /// If the thread cannot be spawned the sender is dropped with the closure,
    /// so the receiver observes a disconnect instead of a `Completed` event.
    pub fn start(&mut self) {
        debug_assert!(!self.is_started(), "analysis job {} started twice", self.id);
        let (Some(batch), Some(tx)) = (self.batch.take(), self.tx.take()) else {
            warn!(job_id = self.id, "ignoring second start of analysis job");
            return;
        };

        let job_id = self.id;
        let player = self.player.clone();
        let store = Arc::clone(&self.store);
        let analyzer = Arc::clone(&self.analyzer);
        info!(job_id, matches = batch.len(), player = %player, "analysis job starting");

        let spawned = thread::Builder::new()
            .name(format!("analysis-job-{job_id}"))
            .spawn(move || run_job(job_id, batch, player, store, analyzer, tx));
        match spawned {
            Ok(handle) => self.handle = Some(handle),
            Err(err) => warn!(job_id, "failed to spawn analysis thread: {err}"),
        }
    }

    /// Waits for the worker to exit and hands back its batch for release.
    /// Returns `None` when there is nothing to join or the thread panicked
    /// outside the analysis boundary.
    pub fn join(&mut self) -> Option<MatchBatch> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(batch) => Some(batch),
            Err(payload) => {
                warn!(
                    job_id = self.id,
                    "analysis thread panicked: {}",
                    panic_message(payload.as_ref())
                );
                None
            }
        }
    }
}

impl Drop for AnalysisJob {
    fn drop(&mut self) {
        if self.handle.is_some() {
            debug!(job_id = self.id, "joining analysis thread on drop");
            drop(self.join());
        }
    }
}

fn run_job(
    job_id: u64,
    batch: MatchBatch,
    player: PlayerIdentity,
    store: Arc<AnalysisStore>,
    analyzer: Arc<dyn Analyzer>,
    tx: Sender<JobEvent>,
) -> MatchBatch {
    let progress_tx = tx.clone();
    let mut on_progress = |progress: AnalysisProgress| {
        let _ = progress_tx.send(JobEvent::Progress {
            job_id,
            current: progress.current,
            total: progress.total,
            message: progress.message,
        });
    };

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        analyzer.analyze(&batch, &player, &mut on_progress)
    }));

    let outcome = match result {
        Ok(Ok(table)) => {
            let entries = table.len();
            store.write_all(table);
            let _ = tx.send(JobEvent::ResultReady { job_id });
            JobOutcome::Succeeded { entries }
        }
        Ok(Err(err)) => JobOutcome::Failed(err),
        Err(payload) => JobOutcome::Failed(AnalysisError::Panicked(panic_message(
            payload.as_ref(),
        ))),
    };
    let _ = tx.send(JobEvent::Completed { job_id, outcome });
    batch
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
