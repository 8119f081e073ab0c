use thiserror::Error;

/// Caller misuse of the coordinator. Rejected synchronously, no state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("analysis job {job_id} is still running")]
    JobAlreadyRunning { job_id: u64 },
}

/// Unrecoverable failure of one analysis run.
///
/// Produced on the worker thread and only ever delivered to the coordinator
/// inside `JobOutcome::Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("none of the {skipped} matches had rounds played by this player")]
    NoUsableMatches { skipped: usize },
    #[error("analysis panicked: {0}")]
    Panicked(String),
    #[error("analysis worker exited without reporting completion")]
    WorkerVanished,
}
