//! Finite filter capacity replay.
//!
//! A trap stores what it removes until it is full; removal beyond the
//! remaining capacity flows on to the outfall. Emptying the trap at a fixed
//! interval resets the storage.

use serde::{Deserialize, Serialize};
use st_core::{days_to_seconds, kg_to_mg, percent_of};

use crate::types::SimulationResult;

/// Maintenance schedule and trap capacity in internal units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaintenancePolicy {
    pub interval_s: f64,
    pub capacity_mg: f64,
}

impl MaintenancePolicy {
    /// From the settings units: kilograms and days.
    pub fn from_settings(capacity_kg: f64, interval_days: f64) -> Self {
        Self {
            interval_s: days_to_seconds(interval_days),
            capacity_mg: kg_to_mg(capacity_kg),
        }
    }

    pub fn unbounded() -> Self {
        Self {
            interval_s: f64::INFINITY,
            capacity_mg: f64::INFINITY,
        }
    }

    /// An infinite (or NaN) capacity or interval turns the adjustment off.
    ///
    /// A trap that is never emptied is treated as never filling up, so a finite
    /// capacity is ignored when the interval is infinite.
    pub fn is_bounded(&self) -> bool {
        self.interval_s.is_finite() && self.capacity_mg.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceOutcome {
    pub index: usize,
    /// Removal with the capacity limit applied, mg.
    pub removal_mass: f64,
    pub removal_percent: f64,
    /// Mass released back to the system because the trap was full, mg.
    pub diverted_mass: f64,
    /// Adjusted removal as a percentage of the unadjusted removal.
    pub share_of_potential: f64,
    pub maintenance_events: usize,
}

fn step_seconds(result: &SimulationResult, i: usize) -> f64 {
    match (result.step_times.get(i - 1), result.step_times.get(i)) {
        (Some(prev), Some(cur)) => (*cur - *prev).num_milliseconds() as f64 / 1000.0,
        _ => 0.0,
    }
}

/// Replay one scenario against the baseline under `policy`.
pub fn replay(
    baseline: &SimulationResult,
    result: &SimulationResult,
    policy: &MaintenancePolicy,
) -> MaintenanceOutcome {
    let mut diverted = 0.0;
    let mut events = 0;

    if !result.is_baseline() && policy.is_bounded() {
        let mut stored = 0.0;
        let mut elapsed = 0.0;
        let steps = result
            .pollutant_per_step
            .iter()
            .zip(&baseline.pollutant_per_step);
        for (i, (treated, untreated)) in steps.enumerate() {
            if i > 0 {
                elapsed += step_seconds(result, i);
                if elapsed >= policy.interval_s {
                    stored = 0.0;
                    elapsed = 0.0;
                    events += 1;
                }
            }
            let removal = (untreated - treated).abs();
            let room = (policy.capacity_mg - stored).max(0.0);
            let accepted = removal.min(room);
            stored += accepted;
            diverted += removal - accepted;
        }
    }

    let removal_mass = result.removal_mass - diverted;
    MaintenanceOutcome {
        index: result.index,
        removal_mass,
        removal_percent: percent_of(removal_mass, result.system_pollutant),
        diverted_mass: diverted,
        share_of_potential: percent_of(removal_mass, result.removal_mass),
        maintenance_events: events,
    }
}

/// Replay every result against the first (baseline) one.
pub fn replay_all(results: &[SimulationResult], policy: &MaintenancePolicy) -> Vec<MaintenanceOutcome> {
    let Some(baseline) = results.first() else {
        return Vec::new();
    };
    results.iter().map(|r| replay(baseline, r, policy)).collect()
}
