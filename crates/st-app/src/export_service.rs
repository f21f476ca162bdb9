//! Aggregation and table export of stored runs.

use std::path::{Path, PathBuf};
use std::time::Instant;

use st_results::aggregate::DEFAULT_BLOCK;
use st_results::{
    CheckpointStore, SimulationResult, decimate, maintenance_tables, results_tables, write_tables,
};
use st_settings::read_settings;

use crate::config::{MaintenanceConfig, RunConfig};
use crate::error::{AppError, AppResult};
use crate::progress::{RunProgressEvent, RunStage};

pub struct ExportRequest<'a> {
    pub settings_path: &'a Path,
    /// Stored run to export; the most recent run when absent.
    pub run_id: Option<&'a str>,
    /// Output directory; the settings' results location when absent.
    pub output_dir: Option<&'a Path>,
    /// Keep the checkpoints after export instead of deleting them.
    pub keep_checkpoints: bool,
}

#[derive(Debug, Clone)]
pub struct ExportResponse {
    pub run_id: String,
    pub scenarios: usize,
    pub files: Vec<PathBuf>,
    pub export_time_s: f64,
}

fn emit(
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    stage: RunStage,
    started: Instant,
    message: String,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(RunProgressEvent::stage(
            stage,
            started.elapsed().as_secs_f64(),
            Some(message),
        ));
    }
}

fn load_config(settings_path: &Path) -> AppResult<RunConfig> {
    let settings = read_settings(settings_path)?;
    let base = settings_path.parent().unwrap_or_else(|| Path::new("."));
    RunConfig::from_settings(&settings, base)
}

fn load_run(store: &CheckpointStore, run_id: Option<&str>) -> AppResult<(String, Vec<SimulationResult>)> {
    let run_id = match run_id {
        Some(id) => id.to_string(),
        None => store
            .latest_run()?
            .map(|m| m.run_id)
            .ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "no stored run under {}",
                    store.root().display()
                ))
            })?,
    };
    let results = store.load_all(&run_id)?;
    Ok((run_id, results))
}

fn finish(
    store: &CheckpointStore,
    run_id: String,
    scenarios: usize,
    files: Vec<PathBuf>,
    keep: bool,
    started: Instant,
) -> AppResult<ExportResponse> {
    if !keep {
        store.clear(&run_id)?;
        tracing::debug!(run_id = %run_id, "checkpoints cleared");
    }
    Ok(ExportResponse {
        run_id,
        scenarios,
        files,
        export_time_s: started.elapsed().as_secs_f64(),
    })
}

pub fn export_results(request: &ExportRequest) -> AppResult<ExportResponse> {
    export_results_with_progress(request, None)
}

/// Rank a stored run by every configured criterion and write the tables.
pub fn export_results_with_progress(
    request: &ExportRequest,
    mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
) -> AppResult<ExportResponse> {
    let started = Instant::now();
    let config = load_config(request.settings_path)?;
    let store = CheckpointStore::for_network(&config.network_path)?;
    let (run_id, results) = load_run(&store, request.run_id)?;

    emit(
        &mut progress_cb,
        RunStage::Aggregating,
        started,
        format!("Aggregating {} scenarios", results.len()),
    );
    let results: Vec<SimulationResult> =
        results.iter().map(|r| decimate(r, DEFAULT_BLOCK)).collect();
    let tables = results_tables(
        &results,
        &config.order_criteria,
        &config.suffix,
        config.accumulative_statistics,
    )?;

    let dir = request.output_dir.unwrap_or(config.results_dir.as_path());
    emit(
        &mut progress_cb,
        RunStage::Exporting,
        started,
        format!("Writing {} tables to {}", tables.len(), dir.display()),
    );
    let files = write_tables(dir, &tables)?;
    tracing::info!(run_id = %run_id, tables = files.len(), dir = %dir.display(), "results exported");

    finish(&store, run_id, results.len(), files, request.keep_checkpoints, started)
}

/// Replay a stored run with a finite trap capacity and write the tables.
///
/// `maintenance` overrides the capacity and interval from the settings.
pub fn export_maintenance(
    request: &ExportRequest,
    maintenance: Option<MaintenanceConfig>,
) -> AppResult<ExportResponse> {
    let started = Instant::now();
    let config = load_config(request.settings_path)?;
    let Some(policy) = maintenance.or(config.maintenance) else {
        return Err(AppError::InvalidInput(
            "max_capacity and maintenance_interval are required".to_string(),
        ));
    };
    let store = CheckpointStore::for_network(&config.network_path)?;
    let (run_id, results) = load_run(&store, request.run_id)?;

    let tables = maintenance_tables(
        &results,
        &config.order_criteria,
        policy.capacity_kg,
        policy.interval_days,
        &config.suffix,
    )?;
    let dir = request.output_dir.unwrap_or(config.results_dir.as_path());
    let files = write_tables(dir, &tables)?;
    tracing::info!(
        run_id = %run_id,
        capacity_kg = policy.capacity_kg,
        interval_days = policy.interval_days,
        "maintenance exported"
    );

    finish(&store, run_id, results.len(), files, request.keep_checkpoints, started)
}
