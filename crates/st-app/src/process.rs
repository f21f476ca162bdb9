//! Engine output to per-scenario results.

use std::collections::BTreeMap;

use st_core::percent_of;
use st_network::LandUseArea;
use st_results::{AreaCovered, SimulationResult, cumulative};

use crate::engine::EngineOutput;

fn seconds_between(a: chrono::NaiveDateTime, b: chrono::NaiveDateTime) -> f64 {
    (b - a).num_milliseconds() as f64 / 1000.0
}

/// Drained area of the treated nodes in m2.
///
/// `areas` holds hectares keyed by node name as simulated.
pub fn area_covered(nodes: &[String], areas: &BTreeMap<String, LandUseArea>) -> AreaCovered {
    let mut merged = LandUseArea::default();
    for node in nodes {
        match areas.get(node) {
            Some(area) => merged.merge(area),
            None => tracing::debug!(node = %node, "treated node drains no subcatchment"),
        }
    }
    let m2 = merged.to_m2();
    AreaCovered {
        total: m2.total,
        by_land_use: m2.by_land_use,
    }
}

/// Integrate one engine run into a [`SimulationResult`].
///
/// Volume per step is inflow (L/s) times the step length; mass per step is
/// volume times concentration (mg/L). `baseline_system_pollutant` is the
/// baseline's outfall load, which is also this run's own load when the run
/// is the baseline itself.
pub fn summarize(
    output: &EngineOutput,
    index: usize,
    nodes: &[String],
    baseline_system_pollutant: Option<f64>,
    area: AreaCovered,
    simulation_time_s: f64,
) -> SimulationResult {
    let steps = output.steps.len();
    let mut step_times = Vec::with_capacity(steps);
    let mut volume_per_step = Vec::with_capacity(steps);
    let mut pollutant_per_step = Vec::with_capacity(steps);
    let with_nodes = !nodes.is_empty();
    let mut node_volume = Vec::new();
    let mut node_pollutant = Vec::new();

    let mut previous = output.start;
    for step in &output.steps {
        let dt = seconds_between(previous, step.time).max(0.0);
        previous = step.time;

        let volume = step.outfall_inflow * dt;
        step_times.push(step.time);
        volume_per_step.push(volume);
        pollutant_per_step.push(volume * step.outfall_concentration);

        if with_nodes {
            let (v, m) = step
                .node_inflow
                .iter()
                .zip(&step.node_concentration)
                .fold((0.0, 0.0), |(v, m), (q, c)| (v + q * dt, m + q * dt * c));
            node_volume.push(v);
            node_pollutant.push(m);
        }
    }

    let cumulative_volume = cumulative(&volume_per_step);
    let cumulative_pollutant = cumulative(&pollutant_per_step);
    let total_volume = cumulative_volume.last().copied().unwrap_or(0.0);
    let total_pollutant = cumulative_pollutant.last().copied().unwrap_or(0.0);
    let system_pollutant = baseline_system_pollutant.unwrap_or(total_pollutant);
    let removal_mass = system_pollutant - total_pollutant;
    let removal_per_area = if area.total > 0.0 {
        removal_mass / area.total
    } else {
        0.0
    };

    SimulationResult {
        index,
        nodes: nodes.to_vec(),
        start: output.start,
        end: step_times.last().copied().unwrap_or(output.start),
        simulation_time_s,
        step_times,
        volume_per_step,
        pollutant_per_step,
        node_volume_per_step: with_nodes.then_some(node_volume),
        node_pollutant_per_step: with_nodes.then_some(node_pollutant),
        cumulative_volume,
        cumulative_pollutant,
        total_volume,
        total_pollutant,
        system_pollutant,
        removal_mass,
        removal_percent: percent_of(removal_mass, system_pollutant),
        removal_per_area,
        flow_error: output.flow_error,
        quality_error: output.quality_error,
        area_covered: area,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineStep;
    use chrono::{Duration, NaiveDate};

    fn output(conc: f64) -> EngineOutput {
        let t0 = NaiveDate::from_ymd_opt(2020, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let steps = (1..=3)
            .map(|i| EngineStep {
                time: t0 + Duration::seconds(60 * i),
                outfall_inflow: 2.0,
                outfall_concentration: conc,
                node_inflow: vec![1.0],
                node_concentration: vec![10.0],
            })
            .collect();
        EngineOutput {
            start: t0,
            steps,
            flow_error: 0.1,
            quality_error: -0.2,
        }
    }

    #[test]
    fn baseline_integrates_outfall_series() {
        let r = summarize(&output(5.0), 0, &[], None, AreaCovered::default(), 1.5);
        assert!(r.is_baseline());
        assert_eq!(r.volume_per_step, vec![120.0; 3]);
        assert_eq!(r.total_volume, 360.0);
        assert_eq!(r.total_pollutant, 1800.0);
        assert_eq!(r.system_pollutant, 1800.0);
        assert_eq!(r.removal_mass, 0.0);
        assert_eq!(r.removal_percent, 0.0);
        assert!(r.node_volume_per_step.is_none());
        assert_eq!(r.end, r.step_times[2]);
        assert_eq!(r.quality_error, -0.2);
    }

    #[test]
    fn treated_run_measured_against_baseline() {
        let mut areas = BTreeMap::new();
        areas.insert(
            "J1_m".to_string(),
            LandUseArea {
                total: 0.5,
                by_land_use: BTreeMap::from([("road".to_string(), 0.5)]),
            },
        );
        let nodes = vec!["J1_m".to_string()];
        let area = area_covered(&nodes, &areas);
        assert_eq!(area.total, 5000.0);

        let r = summarize(&output(4.0), 1, &nodes, Some(1800.0), area, 0.0);
        assert_eq!(r.total_pollutant, 1440.0);
        assert_eq!(r.removal_mass, 360.0);
        assert_eq!(r.removal_percent, 20.0);
        assert!((r.removal_per_area - 0.072).abs() < 1e-12);
        assert_eq!(r.node_volume_per_step, Some(vec![60.0; 3]));
        assert_eq!(r.node_pollutant_per_step, Some(vec![600.0; 3]));
    }

    #[test]
    fn unknown_nodes_cover_no_area() {
        let area = area_covered(&["J9".to_string()], &BTreeMap::new());
        assert_eq!(area.total, 0.0);
        assert!(area.by_land_use.is_empty());
    }
}
