//! Scenario run pipeline.
//!
//! settings -> backups -> time steps -> topology -> separation -> scenarios
//! -> one engine run per scenario -> checkpoints.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use st_network::{
    LandUseArea, NetworkFile, NetworkModel, Separation, change_time_steps, resolve,
    separate_junctions, set_treatment,
};
use st_results::{CheckpointStore, RunManifest, compute_run_id};
use st_scenario::{Scenario, ScenarioRng, SelectionPolicy, generate};
use st_settings::read_settings;

use crate::backup;
use crate::config::RunConfig;
use crate::engine::{EngineRequest, SimulationEngine};
use crate::error::AppResult;
use crate::process;
use crate::progress::{RunProgressEvent, RunStage, SimulationProgress};

/// Request to execute the pipeline for one settings file.
pub struct RunRequest<'a> {
    pub settings_path: &'a Path,
}

#[derive(Debug, Clone, Default)]
pub struct RunTimingSummary {
    pub prepare_time_s: f64,
    pub simulate_time_s: f64,
    pub save_time_s: f64,
    pub total_time_s: f64,
}

#[derive(Debug, Clone)]
pub struct RunResponse {
    /// Set when scenarios were simulated and checkpointed.
    pub run_id: Option<String>,
    pub scenarios: Vec<Scenario>,
    pub separation: Option<Separation>,
    pub simulated: usize,
    pub timing: RunTimingSummary,
}

fn emit_progress(
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    stage: RunStage,
    started: Instant,
    message: Option<String>,
    simulation: Option<SimulationProgress>,
) {
    if let Some(cb) = progress_cb.as_deref_mut() {
        cb(RunProgressEvent {
            stage,
            elapsed_wall_s: started.elapsed().as_secs_f64(),
            message,
            simulation,
        });
    }
}

/// Network as prepared for simulation, with names as simulated.
struct Prepared {
    file: NetworkFile,
    separation: Option<Separation>,
    candidates: Vec<String>,
    land_use_pools: BTreeMap<String, Vec<String>>,
    land_uses: Vec<String>,
    areas: BTreeMap<String, LandUseArea>,
}

impl Prepared {
    fn rename(&self, original: &str) -> String {
        match &self.separation {
            Some(s) => s.resolve_id(original),
            None => original.to_string(),
        }
    }
}

fn prepare_backups(config: &RunConfig) {
    if config.restore_backup
        && let Err(err) = backup::restore_backup(&config.network_path)
    {
        tracing::warn!(error = %err, "backup not restored");
    }
    if config.create_backup
        && let Err(err) = backup::create_backup(&config.network_path)
    {
        tracing::warn!(error = %err, "backup not created");
    }
}

fn prepare_network(
    config: &RunConfig,
    progress_cb: &mut Option<&mut dyn FnMut(RunProgressEvent)>,
    started: Instant,
) -> AppResult<Prepared> {
    emit_progress(
        progress_cb,
        RunStage::PreparingNetwork,
        started,
        Some(format!("Loading {}", config.network_path.display())),
        None,
    );
    let mut file = NetworkFile::load(&config.network_path)?;
    match &config.time_steps {
        Some(steps) => {
            let changed = change_time_steps(&mut file, steps)?;
            tracing::debug!(changed, "time steps applied");
        }
        None => tracing::debug!("time steps left as in the network file"),
    }

    emit_progress(
        progress_cb,
        RunStage::ResolvingTopology,
        started,
        Some("Resolving subcatchment topology".to_string()),
        None,
    );
    let topology = resolve(&NetworkModel::from_file(&file)?)?;
    tracing::info!(
        manholes = topology.manholes.len(),
        to_separate = topology.to_separate.len(),
        land_uses = topology.land_uses.len(),
        "topology resolved"
    );

    let separation = match &config.separation {
        Some(options) => {
            emit_progress(
                progress_cb,
                RunStage::SeparatingJunctions,
                started,
                Some(format!("Separating {} junctions", topology.to_separate.len())),
                None,
            );
            match separate_junctions(&mut file, &topology, options) {
                Ok(separation) => Some(separation),
                Err(err) => {
                    tracing::warn!(error = %err, "junction separation failed, continuing without it");
                    None
                }
            }
        }
        None => None,
    };

    let mut prepared = Prepared {
        file,
        separation,
        candidates: Vec::new(),
        land_use_pools: BTreeMap::new(),
        land_uses: topology.land_uses.clone(),
        areas: BTreeMap::new(),
    };
    prepared.candidates = match &prepared.separation {
        Some(s) => s.manholes.clone(),
        None => topology.manholes.clone(),
    };
    prepared.land_use_pools = topology
        .land_use_pools
        .iter()
        .map(|(land_use, pool)| {
            let renamed = pool.iter().map(|j| prepared.rename(j)).collect();
            (land_use.clone(), renamed)
        })
        .collect();
    prepared.areas = topology
        .areas
        .iter()
        .map(|(junction, area)| (prepared.rename(junction), area.clone()))
        .collect();
    Ok(prepared)
}

fn scenarios_for(config: &RunConfig, prepared: &Prepared) -> AppResult<Vec<Scenario>> {
    let Some(scenario_config) = &config.scenarios else {
        return Ok(vec![Scenario::baseline()]);
    };
    let policy = match &scenario_config.policy {
        SelectionPolicy::Explicit(sets) => SelectionPolicy::Explicit(
            sets.iter()
                .map(|set| set.iter().map(|j| prepared.rename(j)).collect())
                .collect(),
        ),
        other => other.clone(),
    };
    let mut rng = ScenarioRng::new(scenario_config.random_seed);
    let scenarios = generate(
        &prepared.candidates,
        &prepared.land_use_pools,
        &prepared.land_uses,
        &policy,
        &scenario_config.treatment,
        &mut rng,
    )?;
    Ok(scenarios)
}

/// Identity of a run: the untreated prepared network, the settings that shape
/// the simulation, and every scenario's node set.
fn run_id_for(config: &RunConfig, network_text: &str, scenarios: &[Scenario]) -> String {
    let mut key = config.simulation_key();
    if let Some(s) = &config.scenarios {
        key.push(("formula", s.treatment.function.clone()));
    }
    for scenario in scenarios {
        key.push(("scenario", scenario.nodes().collect::<Vec<_>>().join(",")));
    }
    compute_run_id(network_text, &key)
}

/// Execute the pipeline without progress reporting.
pub fn run_scenarios(
    request: &RunRequest,
    engine: &mut dyn SimulationEngine,
) -> AppResult<RunResponse> {
    run_scenarios_with_progress(request, engine, None)
}

/// Execute the pipeline and stream progress events.
pub fn run_scenarios_with_progress(
    request: &RunRequest,
    engine: &mut dyn SimulationEngine,
    mut progress_cb: Option<&mut dyn FnMut(RunProgressEvent)>,
) -> AppResult<RunResponse> {
    let started = Instant::now();
    let mut timing = RunTimingSummary::default();

    emit_progress(
        &mut progress_cb,
        RunStage::LoadingSettings,
        started,
        Some(format!("Reading {}", request.settings_path.display())),
        None,
    );
    let settings = read_settings(request.settings_path)?;
    let base = request.settings_path.parent().unwrap_or_else(|| Path::new("."));
    let config = RunConfig::from_settings(&settings, base)?;

    if config.restore_backup || config.create_backup {
        emit_progress(&mut progress_cb, RunStage::RestoringBackup, started, None, None);
        prepare_backups(&config);
    }

    let mut prepared = prepare_network(&config, &mut progress_cb, started)?;

    emit_progress(
        &mut progress_cb,
        RunStage::GeneratingScenarios,
        started,
        None,
        None,
    );
    let scenarios = scenarios_for(&config, &prepared)?;
    tracing::info!(scenarios = scenarios.len(), "scenarios generated");

    set_treatment(&mut prepared.file, &[], true)?;
    prepared.file.save(&config.network_path)?;
    timing.prepare_time_s = started.elapsed().as_secs_f64();

    if !config.run_simulations {
        timing.total_time_s = started.elapsed().as_secs_f64();
        emit_progress(
            &mut progress_cb,
            RunStage::Completed,
            started,
            Some("Network prepared, simulations disabled".to_string()),
            None,
        );
        return Ok(RunResponse {
            run_id: None,
            scenarios,
            separation: prepared.separation,
            simulated: 0,
            timing,
        });
    }

    let run_id = run_id_for(&config, &prepared.file.to_string(), &scenarios);
    let store = CheckpointStore::for_network(&config.network_path)?;
    store.begin(&RunManifest {
        run_id: run_id.clone(),
        created: chrono::Utc::now(),
        network: config.network_path.display().to_string(),
        scenarios: scenarios.len(),
    })?;
    tracing::info!(run_id = %run_id, "run started");

    let total = scenarios.len();
    let mut baseline_pollutant: Option<f64> = None;
    for (position, scenario) in scenarios.iter().enumerate() {
        set_treatment(&mut prepared.file, &scenario.treatments(), true)?;
        prepared.file.save(&config.network_path)?;

        let nodes: Vec<String> = scenario.nodes().map(str::to_string).collect();
        let engine_request = EngineRequest {
            network_path: &config.network_path,
            start: config.start,
            end: config.end,
            pollutant: &config.pollutant,
            outfall: &config.outfall,
            nodes: &nodes,
            create_report: config.create_report,
        };

        let sim_started = Instant::now();
        let suppress = config.suppress_output;
        let outcome = engine.run(&engine_request, &mut |percent_complete| {
            if !suppress {
                emit_progress(
                    &mut progress_cb,
                    RunStage::Simulating,
                    started,
                    None,
                    Some(SimulationProgress {
                        scenario: position,
                        scenarios: total,
                        percent_complete,
                    }),
                );
            }
        });
        let output = match outcome {
            Ok(output) => output,
            Err(err) => {
                set_treatment(&mut prepared.file, &[], true)?;
                prepared.file.save(&config.network_path)?;
                return Err(err.into());
            }
        };
        let sim_time = sim_started.elapsed().as_secs_f64();
        timing.simulate_time_s += sim_time;

        let save_started = Instant::now();
        let result = process::summarize(
            &output,
            scenario.index,
            &nodes,
            baseline_pollutant,
            process::area_covered(&nodes, &prepared.areas),
            sim_time,
        );
        if scenario.is_baseline() {
            baseline_pollutant = Some(result.total_pollutant);
        }
        store.save(&run_id, &result)?;
        timing.save_time_s += save_started.elapsed().as_secs_f64();

        if !suppress {
            emit_progress(
                &mut progress_cb,
                RunStage::SavingResults,
                started,
                Some(format!(
                    "Scenario {}/{} saved, removal {:.2} %",
                    position + 1,
                    total,
                    result.removal_percent
                )),
                None,
            );
        }
        tracing::debug!(
            scenario = scenario.index,
            nodes = nodes.len(),
            removal_mass = result.removal_mass,
            "scenario simulated"
        );
    }

    set_treatment(&mut prepared.file, &[], true)?;
    prepared.file.save(&config.network_path)?;

    timing.total_time_s = started.elapsed().as_secs_f64();
    emit_progress(
        &mut progress_cb,
        RunStage::Completed,
        started,
        Some(format!("{} scenarios simulated", total)),
        None,
    );
    tracing::info!(run_id = %run_id, scenarios = total, "run finished");

    Ok(RunResponse {
        run_id: Some(run_id),
        scenarios,
        separation: prepared.separation,
        simulated: total,
        timing,
    })
}
