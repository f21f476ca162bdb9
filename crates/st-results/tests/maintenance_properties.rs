use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use st_results::{AreaCovered, MaintenancePolicy, SimulationResult, replay};

fn series_result(index: usize, pollutant: Vec<f64>, system: f64) -> SimulationResult {
    let t0 = NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let step_times = (0..pollutant.len())
        .map(|i| t0 + Duration::minutes(15 * i as i64))
        .collect();
    let total: f64 = pollutant.iter().sum();
    SimulationResult {
        index,
        nodes: if index == 0 {
            Vec::new()
        } else {
            vec!["J1_m".to_string()]
        },
        start: t0,
        end: t0,
        simulation_time_s: 0.0,
        step_times,
        volume_per_step: vec![0.0; pollutant.len()],
        pollutant_per_step: pollutant.clone(),
        node_volume_per_step: None,
        node_pollutant_per_step: None,
        cumulative_volume: Vec::new(),
        cumulative_pollutant: st_results::cumulative(&pollutant),
        total_volume: 0.0,
        total_pollutant: total,
        system_pollutant: system,
        removal_mass: system - total,
        removal_percent: st_core::percent_of(system - total, system),
        removal_per_area: 0.0,
        flow_error: 0.0,
        quality_error: 0.0,
        area_covered: AreaCovered::default(),
    }
}

/// Baseline series and a treated series that never exceeds it.
fn paired_series() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    prop::collection::vec((1.0f64..1000.0, 0.0f64..1.0), 1..40).prop_map(|steps| {
        let baseline = steps.iter().map(|(b, _)| *b).collect();
        let treated = steps.iter().map(|(b, f)| b * f).collect();
        (baseline, treated)
    })
}

proptest! {
    #[test]
    fn unbounded_policy_keeps_removal((base, treated) in paired_series()) {
        let system: f64 = base.iter().sum();
        let baseline = series_result(0, base, system);
        let result = series_result(1, treated, system);
        let out = replay(&baseline, &result, &MaintenancePolicy::unbounded());
        prop_assert_eq!(out.removal_mass, result.removal_mass);
        prop_assert_eq!(out.diverted_mass, 0.0);
    }

    #[test]
    fn capacity_limits_removal(
        (base, treated) in paired_series(),
        capacity in 0.0f64..5000.0,
        interval in 900.0f64..36_000.0,
    ) {
        let system: f64 = base.iter().sum();
        let baseline = series_result(0, base, system);
        let result = series_result(1, treated, system);
        let policy = MaintenancePolicy { interval_s: interval, capacity_mg: capacity };
        let out = replay(&baseline, &result, &policy);
        prop_assert!(out.diverted_mass >= 0.0);
        prop_assert!(out.removal_percent <= result.removal_percent + 1e-9);
        prop_assert!(out.share_of_potential <= 100.0 + 1e-9);
    }
}
