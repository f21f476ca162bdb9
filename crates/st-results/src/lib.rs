//! st-results: scenario results, checkpoints, aggregation and export.

pub mod aggregate;
pub mod export;
pub mod hash;
pub mod maintenance;
pub mod store;
pub mod types;

pub use aggregate::{CumulativeStats, RankCriterion, decimate, rank};
pub use hash::compute_run_id;
pub use export::{Table, maintenance_tables, results_tables, write_tables};
pub use maintenance::{MaintenanceOutcome, MaintenancePolicy, replay, replay_all};
pub use store::CheckpointStore;
pub use types::*;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },

    #[error("Checkpoint {missing} of run {run_id} is missing ({found} found)")]
    MissingCheckpoint {
        run_id: String,
        missing: usize,
        found: usize,
    },

    #[error("Unknown ranking criterion: {0}")]
    UnknownCriterion(String),

    #[error("No results to aggregate")]
    Empty,
}
