//! Shared application service layer for stormtrap.
//!
//! Runs the scenario pipeline against a [`SimulationEngine`], exports stored
//! runs as tables, and drives batch variations for the CLI.

pub mod backup;
pub mod config;
pub mod engine;
pub mod error;
pub mod export_service;
pub mod process;
pub mod progress;
pub mod run_service;
pub mod swmm;
pub mod variations;

// Re-export key types for convenience
pub use backup::{clean_simulation_files, create_backup, restore_all_backups, restore_backup};
pub use config::{MaintenanceConfig, RunConfig, ScenarioConfig};
pub use engine::{EngineError, EngineOutput, EngineRequest, EngineStep, SimulationEngine};
pub use error::{AppError, AppResult};
pub use export_service::{
    ExportRequest, ExportResponse, export_maintenance, export_results,
    export_results_with_progress,
};
pub use progress::{RunProgressEvent, RunStage, SimulationProgress};
pub use run_service::{
    RunRequest, RunResponse, RunTimingSummary, run_scenarios, run_scenarios_with_progress,
};
pub use swmm::SwmmCli;
pub use variations::{
    VariationOutcome, VariationRequest, run_maintenance_variations, run_simulation_variations,
};
