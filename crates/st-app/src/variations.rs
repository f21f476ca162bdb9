//! Batch runs over the named variations of a scenario definition file.
//!
//! Each variation is applied to a temporary copy of the settings file next to
//! the original, so relative paths keep resolving the same way.

use std::fs;
use std::path::{Path, PathBuf};

use st_results::CheckpointStore;
use st_settings::{ScenarioDefinitions, Variation, read_settings, write_settings};

use crate::config::{MaintenanceConfig, RunConfig};
use crate::engine::SimulationEngine;
use crate::error::{AppError, AppResult};
use crate::export_service::{ExportRequest, export_maintenance, export_results_with_progress};
use crate::progress::RunProgressEvent;
use crate::run_service::{RunRequest, run_scenarios_with_progress};

const SIMULATION_SETTINGS: &str = "settings_temp.ini";
const MAINTENANCE_SETTINGS: &str = "settings_temp_m.ini";

pub struct VariationRequest<'a> {
    pub settings_path: &'a Path,
    pub definitions_path: &'a Path,
}

#[derive(Debug, Clone)]
pub struct VariationOutcome {
    pub name: String,
    pub run_id: Option<String>,
    pub output_dir: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Settings copy that is deleted when dropped.
struct TempSettings {
    path: PathBuf,
}

impl TempSettings {
    fn create(original: &Path, name: &str, variation: &Variation) -> AppResult<Self> {
        let path = settings_dir(original).join(name);
        fs::copy(original, &path)?;
        let temp = Self { path };
        write_settings(&temp.path, &variation.overrides)?;
        Ok(temp)
    }

    fn config(&self) -> AppResult<RunConfig> {
        RunConfig::from_settings(&read_settings(&self.path)?, settings_dir(&self.path))
    }
}

impl Drop for TempSettings {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %err, "temporary settings not removed");
        }
    }
}

fn settings_dir(settings_path: &Path) -> &Path {
    settings_path.parent().unwrap_or_else(|| Path::new("."))
}

fn reborrow<'a>(
    cb: &'a mut Option<&mut dyn FnMut(RunProgressEvent)>,
) -> Option<&'a mut dyn FnMut(RunProgressEvent)> {
    match cb {
        Some(cb) => Some(&mut **cb),
        None => None,
    }
}

/// `<settings dir>/results/<results stem>_<res_id>_<start>_<end>`
fn simulation_output_dir(request: &VariationRequest, config: &RunConfig) -> PathBuf {
    let stem = config
        .results_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "results".to_string());
    settings_dir(request.settings_path)
        .join("results")
        .join(format!("{}{}", stem, config.result_tag()))
}

/// Run and export every simulation variation, in name order.
pub fn run_simulation_variations(
    request: &VariationRequest,
    engine: &mut dyn SimulationEngine,
    mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
) -> AppResult<Vec<VariationOutcome>> {
    let definitions = ScenarioDefinitions::load(request.definitions_path)?;
    let mut outcomes = Vec::new();

    for variation in definitions.simulation_variations() {
        tracing::info!(variation = %variation.name, "running variation");
        let temp = TempSettings::create(request.settings_path, SIMULATION_SETTINGS, &variation)?;
        let config = temp.config()?;
        let output_dir = simulation_output_dir(request, &config);

        let run = run_scenarios_with_progress(
            &RunRequest {
                settings_path: &temp.path,
            },
            engine,
            reborrow(&mut progress_cb),
        )?;

        let files = match &run.run_id {
            Some(run_id) => {
                let export = ExportRequest {
                    settings_path: &temp.path,
                    run_id: Some(run_id.as_str()),
                    output_dir: Some(output_dir.as_path()),
                    keep_checkpoints: false,
                };
                export_results_with_progress(&export, reborrow(&mut progress_cb))?.files
            }
            None => {
                tracing::info!(variation = %variation.name, "simulations disabled, nothing exported");
                Vec::new()
            }
        };
        outcomes.push(VariationOutcome {
            name: variation.name,
            run_id: run.run_id,
            output_dir,
            files,
        });
    }
    Ok(outcomes)
}

fn override_f64(variation: &Variation, key: &str) -> AppResult<f64> {
    let raw = variation.overrides.get(key).ok_or_else(|| {
        AppError::InvalidInput(format!("variation {} has no {}", variation.name, key))
    })?;
    raw.parse().map_err(|_| {
        AppError::InvalidInput(format!(
            "variation {}: {} must be a number, got '{}'",
            variation.name, key, raw
        ))
    })
}

/// Replay the most recent stored run under every maintenance variation.
///
/// The network is prepared once per variation without simulating; the
/// stored run is deleted after the last variation.
pub fn run_maintenance_variations(
    request: &VariationRequest,
    engine: &mut dyn SimulationEngine,
) -> AppResult<Vec<VariationOutcome>> {
    let definitions = ScenarioDefinitions::load(request.definitions_path)?;
    let mut outcomes = Vec::new();
    let mut replayed: Option<(PathBuf, String)> = None;

    for variation in definitions.maintenance_variations() {
        let maintenance = MaintenanceConfig {
            capacity_kg: override_f64(&variation, "max_capacity")?,
            interval_days: override_f64(&variation, "maintenance_interval")?,
        };
        let temp = TempSettings::create(request.settings_path, MAINTENANCE_SETTINGS, &variation)?;
        let config = temp.config()?;
        run_scenarios_with_progress(
            &RunRequest {
                settings_path: &temp.path,
            },
            engine,
            None,
        )?;

        let output_dir = settings_dir(request.settings_path)
            .join("maintenance")
            .join(format!("results_{}_{}", config.res_id, variation.name));
        let export = ExportRequest {
            settings_path: &temp.path,
            run_id: None,
            output_dir: Some(output_dir.as_path()),
            keep_checkpoints: true,
        };
        let response = export_maintenance(&export, Some(maintenance))?;
        tracing::info!(variation = %variation.name, run_id = %response.run_id, "maintenance variation done");
        replayed = Some((config.network_path.clone(), response.run_id.clone()));
        outcomes.push(VariationOutcome {
            name: variation.name,
            run_id: Some(response.run_id),
            output_dir,
            files: response.files,
        });
    }

    if let Some((network_path, run_id)) = replayed {
        CheckpointStore::for_network(&network_path)?.clear(&run_id)?;
    }
    Ok(outcomes)
}
