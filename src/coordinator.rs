use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};

use tracing::{debug, info, warn};

use crate::analysis::{Analyzer, TacticalAnalyzer};
use crate::error::{AnalysisError, CoordinatorError};
use crate::job::{AnalysisJob, JobEvent, JobOutcome};
use crate::model::{MapAnalytics, MapSideStats, MatchBatch, PlayerIdentity, Side};
use crate::store::AnalysisStore;

/// Upstream holder of the fetched matches.
pub trait MatchSupply {
    /// The analyzed copy of the player's matches is no longer needed.
    fn release_transient_payload(&mut self, player: &PlayerIdentity);
}

/// UI state that stays locked until a successful analysis.
pub trait DependentGate {
    fn unlock(&mut self);
}

/// Re-reads stats from the coordinator when results become available.
pub trait RenderTrigger {
    fn refresh(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    NotAnalyzed,
    Analyzing,
    Analyzed,
}

struct ActiveJob {
    job: AnalysisJob,
    events: Receiver<JobEvent>,
    progress: Option<(usize, usize)>,
}

/// Single-flight owner of analysis jobs.
///
/// Lives on the interactive thread. Worker events are only acted on inside
/// `poll`/`wait_for_completion`, so every collaborator callback runs on the
/// caller's thread, in the order the worker emitted the events.
pub struct AnalysisCoordinator {
    store: Arc<AnalysisStore>,
    analyzer: Arc<dyn Analyzer>,
    state: AnalysisState,
    active: Option<ActiveJob>,
    next_job_id: u64,
    last_error: Option<AnalysisError>,
}

impl Default for AnalysisCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisCoordinator {
    pub fn new() -> Self {
        Self::with_analyzer(Arc::new(TacticalAnalyzer))
    }

    pub fn with_analyzer(analyzer: Arc<dyn Analyzer>) -> Self {
        Self {
            store: Arc::new(AnalysisStore::new()),
            analyzer,
            state: AnalysisState::NotAnalyzed,
            active: None,
            next_job_id: 1,
            last_error: None,
        }
    }

    /// Hands `batch` to a new background job. The job may not have begun
    /// executing when this returns, but the state is already `Analyzing`.
    pub fn start_analysis(
        &mut self,
        batch: MatchBatch,
        player: PlayerIdentity,
    ) -> Result<u64, CoordinatorError> {
        if let Some(active) = &self.active {
            return Err(CoordinatorError::JobAlreadyRunning {
                job_id: active.job.id(),
            });
        }

        let job_id = self.next_job_id;
        self.next_job_id += 1;
        let (mut job, events) = AnalysisJob::new(
            job_id,
            batch,
            player,
            Arc::clone(&self.store),
            Arc::clone(&self.analyzer),
        );
        self.state = AnalysisState::Analyzing;
        self.last_error = None;
        job.start();
        self.active = Some(ActiveJob {
            job,
            events,
            progress: None,
        });
        Ok(job_id)
    }

    /// Dispatches every event already delivered by the active job without
    /// blocking. Returns the number of events handled.
    pub fn poll<C>(&mut self, consumer: &mut C) -> usize
    where
        C: RenderTrigger + DependentGate + MatchSupply,
    {
        let mut handled = 0;
        loop {
            let Some(active) = &self.active else {
                return handled;
            };
            let event = match active.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return handled,
                Err(TryRecvError::Disconnected) => vanished_event(active.job.id()),
            };
            handled += 1;
            self.dispatch(event, consumer);
        }
    }

    /// Blocks until the active job completes, dispatching its events as they
    /// arrive. Returns `None` if no job was active.
    pub fn wait_for_completion<C>(&mut self, consumer: &mut C) -> Option<JobOutcome>
    where
        C: RenderTrigger + DependentGate + MatchSupply,
    {
        loop {
            let active = self.active.as_ref()?;
            let event = active
                .events
                .recv()
                .unwrap_or_else(|_| vanished_event(active.job.id()));
            if let JobEvent::Completed { outcome, .. } = &event {
                let outcome = outcome.clone();
                self.dispatch(event, consumer);
                return Some(outcome);
            }
            self.dispatch(event, consumer);
        }
    }

    fn dispatch<C>(&mut self, event: JobEvent, consumer: &mut C)
    where
        C: RenderTrigger + DependentGate + MatchSupply,
    {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if event.job_id() != active.job.id() {
            warn!(
                job_id = event.job_id(),
                active = active.job.id(),
                "dropping event from stale analysis job"
            );
            return;
        }
        match event {
            JobEvent::Progress {
                current,
                total,
                message,
                ..
            } => {
                debug!(current, total, "{message}");
                active.progress = Some((current, total));
            }
            JobEvent::ResultReady { .. } => self.on_result_ready(consumer),
            JobEvent::Completed { outcome, .. } => self.on_completed(outcome, consumer),
        }
    }

    fn on_result_ready<R: RenderTrigger>(&mut self, render: &mut R) {
        if let Some(active) = &self.active {
            info!(job_id = active.job.id(), "analysis results ready");
        }
        render.refresh();
    }

    fn on_completed<C>(&mut self, outcome: JobOutcome, consumer: &mut C)
    where
        C: DependentGate + MatchSupply,
    {
        let Some(mut active) = self.active.take() else {
            return;
        };
        let job_id = active.job.id();
        let player = active.job.player().clone();

        // The worker sent its last event; this only reclaims the thread.
        let batch = active.job.join();
        drop(batch);
        drop(active);

        match outcome {
            JobOutcome::Succeeded { entries } => {
                self.state = AnalysisState::Analyzed;
                info!(job_id, entries, "analysis job completed");
                consumer.unlock();
                consumer.release_transient_payload(&player);
            }
            JobOutcome::Failed(err) => {
                self.state = AnalysisState::NotAnalyzed;
                warn!(job_id, "analysis job failed: {err}");
                self.last_error = Some(err);
            }
        }
    }

    pub fn state(&self) -> AnalysisState {
        self.state
    }

    pub fn is_analyzed(&self) -> bool {
        self.state == AnalysisState::Analyzed
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// `(current, total)` matches processed by the active job, if it reported any.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.active.as_ref().and_then(|a| a.progress)
    }

    pub fn last_error(&self) -> Option<&AnalysisError> {
        self.last_error.as_ref()
    }

    pub fn get_map_side_stats(&self, map_id: &str, side: Side) -> Option<MapSideStats> {
        if !self.is_analyzed() {
            return None;
        }
        self.store.query(map_id, side)
    }

    pub fn get_map_analytics(&self, map_id: &str) -> Option<MapAnalytics> {
        if !self.is_analyzed() {
            return None;
        }
        self.store.map_analytics(map_id)
    }

    pub fn store(&self) -> &Arc<AnalysisStore> {
        &self.store
    }
}

fn vanished_event(job_id: u64) -> JobEvent {
    JobEvent::Completed {
        job_id,
        outcome: JobOutcome::Failed(AnalysisError::WorkerVanished),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[derive(Default)]
    struct Calls(Vec<&'static str>);

    impl RenderTrigger for Calls {
        fn refresh(&mut self) {
            self.0.push("refresh");
        }
    }

    impl DependentGate for Calls {
        fn unlock(&mut self) {
            self.0.push("unlock");
        }
    }

    impl MatchSupply for Calls {
        fn release_transient_payload(&mut self, _player: &PlayerIdentity) {
            self.0.push("release");
        }
    }

    // A job whose worker never got to send anything: the only sender is gone.
    fn coordinator_with_silent_job() -> AnalysisCoordinator {
        let mut coordinator = AnalysisCoordinator::new();
        let (job, _unused) = AnalysisJob::new(
            9,
            MatchBatch::new(Vec::new()),
            PlayerIdentity::new("P1"),
            Arc::clone(&coordinator.store),
            Arc::clone(&coordinator.analyzer),
        );
        let (tx, events) = mpsc::channel::<JobEvent>();
        drop(tx);
        coordinator.state = AnalysisState::Analyzing;
        coordinator.active = Some(ActiveJob {
            job,
            events,
            progress: None,
        });
        coordinator
    }

    #[test]
    fn disconnected_worker_is_reported_as_vanished() {
        let mut coordinator = coordinator_with_silent_job();
        let mut calls = Calls::default();

        assert_eq!(coordinator.poll(&mut calls), 1);
        assert_eq!(coordinator.state(), AnalysisState::NotAnalyzed);
        assert_eq!(coordinator.last_error(), Some(&AnalysisError::WorkerVanished));
        assert!(calls.0.is_empty());
        assert!(!coordinator.is_running());

        coordinator
            .start_analysis(MatchBatch::new(Vec::new()), PlayerIdentity::new("P1"))
            .expect("slot should be free after the worker vanished");
        let outcome = coordinator.wait_for_completion(&mut calls);
        assert_eq!(outcome, Some(JobOutcome::Succeeded { entries: 0 }));
        assert_eq!(calls.0, vec!["refresh", "unlock", "release"]);
    }

    #[test]
    fn blocking_wait_also_reports_vanished_worker() {
        let mut coordinator = coordinator_with_silent_job();
        let mut calls = Calls::default();

        let outcome = coordinator.wait_for_completion(&mut calls);
        assert_eq!(
            outcome,
            Some(JobOutcome::Failed(AnalysisError::WorkerVanished))
        );
        assert!(!coordinator.is_analyzed());
        assert!(calls.0.is_empty());
    }
}
