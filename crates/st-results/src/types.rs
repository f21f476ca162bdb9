//! Result data types.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

pub type RunId = String;

/// Written once per run next to its checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub created: DateTime<Utc>,
    pub network: String,
    pub scenarios: usize,
}

/// Area draining into the treated nodes, in square meters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaCovered {
    pub total: f64,
    pub by_land_use: BTreeMap<String, f64>,
}

impl AreaCovered {
    pub fn share_percent(&self, land_use: &str) -> f64 {
        let area = self.by_land_use.get(land_use).copied().unwrap_or(0.0);
        st_core::percent_of(area, self.total)
    }
}

/// Summary of one scenario simulation.
///
/// Volumes are liters and masses milligrams. Per-step series are aligned with
/// `step_times`; cumulative series are running sums of the outfall series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub index: usize,
    /// Treated nodes; empty for the baseline.
    pub nodes: Vec<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Wall-clock duration of the engine run.
    pub simulation_time_s: f64,
    pub step_times: Vec<NaiveDateTime>,
    pub volume_per_step: Vec<f64>,
    pub pollutant_per_step: Vec<f64>,
    /// Lateral inflow through the treated nodes, `None` for the baseline.
    pub node_volume_per_step: Option<Vec<f64>>,
    pub node_pollutant_per_step: Option<Vec<f64>>,
    pub cumulative_volume: Vec<f64>,
    pub cumulative_pollutant: Vec<f64>,
    pub total_volume: f64,
    pub total_pollutant: f64,
    /// Pollutant leaving the untreated system.
    pub system_pollutant: f64,
    pub removal_mass: f64,
    pub removal_percent: f64,
    /// mg per m2 of drained area.
    pub removal_per_area: f64,
    pub flow_error: f64,
    pub quality_error: f64,
    pub area_covered: AreaCovered,
}

impl SimulationResult {
    pub fn is_baseline(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Treated nodes joined for display, with `suffix` stripped.
    pub fn node_label(&self, suffix: &str) -> String {
        self.nodes
            .iter()
            .map(|n| n.strip_suffix(suffix).unwrap_or(n))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn cumulative(series: &[f64]) -> Vec<f64> {
    series
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}
