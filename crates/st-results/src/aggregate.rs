//! Decimation, ranking and cumulative comparison of scenario results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ResultsError;
use crate::types::SimulationResult;

/// Block size used when loading checkpoints for aggregation.
pub const DEFAULT_BLOCK: usize = 1000;

fn block_sums(series: &[f64], block: usize) -> Vec<f64> {
    series.chunks(block).map(|c| c.iter().sum()).collect()
}

fn every_nth<T: Clone>(series: &[T], block: usize) -> Vec<T> {
    series.iter().step_by(block).cloned().collect()
}

/// Reduce time resolution to bound memory.
///
/// Timestamps and cumulative series keep every `block`-th entry; per-step
/// series are summed over non-overlapping blocks, so totals are unchanged.
/// A block of 0 or 1 returns the result unchanged.
pub fn decimate(result: &SimulationResult, block: usize) -> SimulationResult {
    if block <= 1 {
        return result.clone();
    }
    SimulationResult {
        step_times: every_nth(&result.step_times, block),
        volume_per_step: block_sums(&result.volume_per_step, block),
        pollutant_per_step: block_sums(&result.pollutant_per_step, block),
        node_volume_per_step: result
            .node_volume_per_step
            .as_deref()
            .map(|s| block_sums(s, block)),
        node_pollutant_per_step: result
            .node_pollutant_per_step
            .as_deref()
            .map(|s| block_sums(s, block)),
        cumulative_volume: every_nth(&result.cumulative_volume, block),
        cumulative_pollutant: every_nth(&result.cumulative_pollutant, block),
        ..result.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankCriterion {
    RemovalMass,
    RemovalPercent,
    RemovalPerArea,
    TotalVolume,
    TotalPollutant,
}

impl RankCriterion {
    pub const ALL: [RankCriterion; 5] = [
        RankCriterion::RemovalMass,
        RankCriterion::RemovalPercent,
        RankCriterion::RemovalPerArea,
        RankCriterion::TotalVolume,
        RankCriterion::TotalPollutant,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RankCriterion::RemovalMass => "removal_mass",
            RankCriterion::RemovalPercent => "removal_percent",
            RankCriterion::RemovalPerArea => "removal_per_area",
            RankCriterion::TotalVolume => "total_volume",
            RankCriterion::TotalPollutant => "total_pollutant",
        }
    }

    pub fn value(self, result: &SimulationResult) -> f64 {
        match self {
            RankCriterion::RemovalMass => result.removal_mass,
            RankCriterion::RemovalPercent => result.removal_percent,
            RankCriterion::RemovalPerArea => result.removal_per_area,
            RankCriterion::TotalVolume => result.total_volume,
            RankCriterion::TotalPollutant => result.total_pollutant,
        }
    }
}

impl fmt::Display for RankCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RankCriterion {
    type Err = ResultsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // the settings file historically spells pollutant columns as TSS
        let normalized = s.trim().to_ascii_lowercase().replace("tss", "pollutant");
        RankCriterion::ALL
            .into_iter()
            .find(|c| c.name() == normalized)
            .ok_or_else(|| ResultsError::UnknownCriterion(s.to_string()))
    }
}

/// Best first. Ties keep their input order.
pub fn rank(results: &[SimulationResult], criterion: RankCriterion) -> Vec<&SimulationResult> {
    let mut ranked: Vec<&SimulationResult> = results.iter().collect();
    ranked.sort_by(|a, b| criterion.value(b).total_cmp(&criterion.value(a)));
    ranked
}

/// Running sums of removal percent over a ranked list, for comparison plots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CumulativeStats {
    /// Best scenario first.
    pub best_to_worst: Vec<f64>,
    /// Worst scenario first.
    pub worst_to_best: Vec<f64>,
    pub difference: Vec<f64>,
    /// Mean removal percent repeated.
    pub mean: Vec<f64>,
}

impl CumulativeStats {
    pub fn from_percentages(ranked: &[f64]) -> Self {
        let best_to_worst = crate::types::cumulative(ranked);
        let reversed: Vec<f64> = ranked.iter().rev().copied().collect();
        let worst_to_best = crate::types::cumulative(&reversed);
        let difference = best_to_worst
            .iter()
            .zip(&worst_to_best)
            .map(|(b, w)| b - w)
            .collect();
        let mean_value = if ranked.is_empty() {
            0.0
        } else {
            ranked.iter().sum::<f64>() / ranked.len() as f64
        };
        let mean = crate::types::cumulative(&vec![mean_value; ranked.len()]);
        Self {
            best_to_worst,
            worst_to_best,
            difference,
            mean,
        }
    }

    pub fn from_ranked(ranked: &[&SimulationResult]) -> Self {
        let percents: Vec<f64> = ranked.iter().map(|r| r.removal_percent).collect();
        Self::from_percentages(&percents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AreaCovered;
    use chrono::NaiveDate;

    fn result(index: usize, removal_mass: f64, system: f64) -> SimulationResult {
        let t0 = NaiveDate::from_ymd_opt(2019, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        SimulationResult {
            index,
            nodes: vec![format!("J{}_m", index)],
            start: t0,
            end: t0,
            simulation_time_s: 0.0,
            step_times: vec![t0],
            volume_per_step: vec![1.0],
            pollutant_per_step: vec![system - removal_mass],
            node_volume_per_step: None,
            node_pollutant_per_step: None,
            cumulative_volume: vec![1.0],
            cumulative_pollutant: vec![system - removal_mass],
            total_volume: 1.0,
            total_pollutant: system - removal_mass,
            system_pollutant: system,
            removal_mass,
            removal_percent: st_core::percent_of(removal_mass, system),
            removal_per_area: 0.0,
            flow_error: 0.0,
            quality_error: 0.0,
            area_covered: AreaCovered::default(),
        }
    }

    #[test]
    fn rank_by_removal_mass() {
        let results = vec![
            result(0, 300.0, 600.0),
            result(1, 100.0, 600.0),
            result(2, 200.0, 600.0),
        ];
        let ranked = rank(&results, RankCriterion::RemovalMass);
        let masses: Vec<f64> = ranked.iter().map(|r| r.removal_mass).collect();
        assert_eq!(masses, vec![300.0, 200.0, 100.0]);

        let stats = CumulativeStats::from_ranked(&ranked);
        assert!((stats.best_to_worst[0] - 50.0).abs() < 1e-9);
        assert!((stats.best_to_worst[1] - 83.333_333_333).abs() < 1e-6);
        assert!((stats.best_to_worst[2] - 100.0).abs() < 1e-9);
        assert!((stats.worst_to_best[0] - 16.666_666_666).abs() < 1e-6);
        assert!((stats.mean[2] - 100.0).abs() < 1e-9);
        assert!(stats.difference[2].abs() < 1e-9);
    }

    #[test]
    fn ties_keep_input_order() {
        let results = vec![result(0, 5.0, 10.0), result(1, 5.0, 10.0), result(2, 7.0, 10.0)];
        let ranked = rank(&results, RankCriterion::RemovalMass);
        let order: Vec<usize> = ranked.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn decimate_preserves_totals() {
        let mut r = result(0, 0.0, 10.0);
        r.volume_per_step = (1..=7).map(f64::from).collect();
        r.step_times = vec![r.start; 7];
        r.cumulative_volume = crate::types::cumulative(&r.volume_per_step);
        let d = decimate(&r, 3);
        assert_eq!(d.volume_per_step, vec![6.0, 15.0, 7.0]);
        assert_eq!(d.step_times.len(), 3);
        assert_eq!(d.cumulative_volume, vec![1.0, 10.0, 28.0]);
        assert_eq!(d.volume_per_step.iter().sum::<f64>(), 28.0);
    }

    #[test]
    fn criterion_names() {
        assert_eq!(
            "removal_mass".parse::<RankCriterion>().unwrap(),
            RankCriterion::RemovalMass
        );
        assert_eq!(
            "total_TSS".parse::<RankCriterion>().unwrap(),
            RankCriterion::TotalPollutant
        );
        assert!("fastest".parse::<RankCriterion>().is_err());
    }
}
