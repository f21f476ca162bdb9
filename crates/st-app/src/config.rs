//! Run configuration derived from the settings file.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use st_network::{SeparationOptions, TimeSteps};
use st_results::RankCriterion;
use st_scenario::{SelectionPolicy, TreatmentSpec};
use st_settings::{Settings, SettingsError};

use crate::error::{AppError, AppResult};

/// Dates in the settings file are written month first.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Scenario generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub policy: SelectionPolicy,
    pub treatment: TreatmentSpec,
    pub random_seed: Option<u64>,
}

/// Trap capacity and emptying interval in settings units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaintenanceConfig {
    pub capacity_kg: f64,
    pub interval_days: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub network_path: PathBuf,
    pub pollutant: String,
    pub start_date: String,
    pub end_date: String,
    /// Start of the first simulated day.
    pub start: NaiveDateTime,
    /// 23:59 on the last simulated day.
    pub end: NaiveDateTime,
    pub outfall: String,
    pub suffix: String,
    pub res_id: String,
    /// Export location; a workbook name such as `results.xlsx` becomes the
    /// directory `results`.
    pub results_dir: PathBuf,
    pub time_steps: Option<TimeSteps>,
    pub separation: Option<SeparationOptions>,
    pub scenarios: Option<ScenarioConfig>,
    pub run_simulations: bool,
    pub create_report: bool,
    pub restore_backup: bool,
    pub create_backup: bool,
    pub accumulative_statistics: bool,
    pub suppress_output: bool,
    pub order_criteria: Vec<RankCriterion>,
    pub maintenance: Option<MaintenanceConfig>,
}

/// Absent flags read as off.
fn flag(settings: &Settings, key: &str) -> AppResult<bool> {
    match settings.get_bool(key) {
        Ok(v) => Ok(v),
        Err(SettingsError::Missing { .. }) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn optional_str(settings: &Settings, key: &str) -> AppResult<Option<String>> {
    match settings.get_str(key) {
        Ok(v) => Ok(Some(v.to_string())),
        Err(SettingsError::Missing { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn optional_f64(settings: &Settings, key: &str) -> AppResult<Option<f64>> {
    match settings.get_f64(key) {
        Ok(v) => Ok(Some(v)),
        Err(SettingsError::Missing { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn count(settings: &Settings, key: &str) -> AppResult<usize> {
    let value = settings.get_i64(key)?;
    usize::try_from(value)
        .map_err(|_| AppError::InvalidInput(format!("{} must not be negative, got {}", key, value)))
}

pub fn parse_date(key: &str, value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        AppError::InvalidInput(format!("{} must be MM/DD/YYYY, got '{}'", key, value))
    })
}

/// Simulation period: midnight of `start_date` to 23:59 of `end_date`.
pub fn simulation_period(start_date: &str, end_date: &str) -> AppResult<(NaiveDateTime, NaiveDateTime)> {
    let start = parse_date("start_date", start_date)?.and_time(NaiveTime::MIN);
    let end = parse_date("end_date", end_date)?
        .and_hms_opt(23, 59, 0)
        .ok_or_else(|| AppError::InvalidInput(format!("end_date '{}'", end_date)))?;
    if end < start {
        return Err(AppError::InvalidInput(format!(
            "end_date {} is before start_date {}",
            end_date, start_date
        )));
    }
    Ok((start, end))
}

fn time_steps(settings: &Settings) -> AppResult<Option<TimeSteps>> {
    let values = [
        optional_str(settings, "REPORT_STEP")?,
        optional_str(settings, "WET_STEP")?,
        optional_str(settings, "DRY_STEP")?,
        optional_str(settings, "ROUTING_STEP")?,
    ];
    Ok(match values {
        [Some(report_step), Some(wet_step), Some(dry_step), Some(routing_step)] => {
            Some(TimeSteps {
                report_step,
                wet_step,
                dry_step,
                routing_step,
            })
        }
        _ => None,
    })
}

/// The first enabled policy wins: ranking, land-use priority, user sets,
/// uniform sampling.
fn selection_policy(settings: &Settings) -> AppResult<SelectionPolicy> {
    if flag(settings, "rank_junctions")? {
        return Ok(SelectionPolicy::RankJunctions);
    }
    if flag(settings, "land_use_prioritization")? {
        return Ok(SelectionPolicy::LandUsePrioritized {
            preferred: settings.get_list("preferred_land_uses")?.to_vec(),
            samples: count(settings, "number_of_samples")?,
            scenarios: count(settings, "number_of_scenarios")?,
        });
    }
    if flag(settings, "use_specific_scenarios")? {
        return Ok(SelectionPolicy::Explicit(
            settings.get_scenarios("user_scenarios")?.to_vec(),
        ));
    }
    Ok(SelectionPolicy::UniformRandom {
        samples: count(settings, "number_of_samples")?,
        scenarios: count(settings, "number_of_scenarios")?,
    })
}

fn results_dir(base: &Path, results_file: Option<String>) -> PathBuf {
    let name = results_file.unwrap_or_else(|| "results".to_string());
    base.join(name).with_extension("")
}

impl RunConfig {
    /// Relative paths are resolved against `base`, the settings file's directory.
    pub fn from_settings(settings: &Settings, base: &Path) -> AppResult<Self> {
        let start_date = settings.get_str("start_date")?.to_string();
        let end_date = settings.get_str("end_date")?.to_string();
        let (start, end) = simulation_period(&start_date, &end_date)?;
        let suffix = optional_str(settings, "junction_suffix")?.unwrap_or_default();

        let separation = if flag(settings, "separate_junctions")? {
            let options = SeparationOptions {
                suffix: suffix.clone(),
                height_offset: settings.get_f64("height_offset")?,
                coord_offset: settings.get_f64("coord_offset")?,
                conduit_length: settings.get_f64("conduit_length")?,
            };
            options.validate()?;
            Some(options)
        } else {
            None
        };

        let scenarios = if flag(settings, "create_treatment_scenarios")? {
            let seed = settings
                .get_i64_opt("random_seed")?
                .map(|s| s as u64);
            Some(ScenarioConfig {
                policy: selection_policy(settings)?,
                treatment: TreatmentSpec {
                    pollutant: settings.get_str("pollutant")?.to_string(),
                    function: settings.get_formula("formula")?.to_string(),
                },
                random_seed: seed,
            })
        } else {
            None
        };

        let order_criteria = match settings.get_list("order_criteria") {
            Ok(names) => names
                .iter()
                .map(|n| n.parse())
                .collect::<Result<Vec<RankCriterion>, _>>()?,
            Err(SettingsError::Missing { .. }) => vec![RankCriterion::RemovalMass],
            Err(e) => return Err(e.into()),
        };

        let maintenance = match (
            optional_f64(settings, "max_capacity")?,
            optional_f64(settings, "maintenance_interval")?,
        ) {
            (Some(capacity_kg), Some(interval_days)) => Some(MaintenanceConfig {
                capacity_kg,
                interval_days,
            }),
            _ => None,
        };

        Ok(Self {
            network_path: base.join(settings.get_str("input_file")?),
            pollutant: settings.get_str("pollutant")?.to_string(),
            start_date,
            end_date,
            start,
            end,
            outfall: settings.get_str("outfall_node")?.to_string(),
            suffix,
            res_id: optional_str(settings, "res_id")?.unwrap_or_default(),
            results_dir: results_dir(base, optional_str(settings, "results_file")?),
            time_steps: time_steps(settings)?,
            separation,
            scenarios,
            run_simulations: flag(settings, "run_simulations")?,
            create_report: flag(settings, "create_report")?,
            restore_backup: flag(settings, "restore_backup")?,
            create_backup: flag(settings, "create_backup")?,
            accumulative_statistics: flag(settings, "accumulative_statistics")?,
            suppress_output: flag(settings, "suppress_output")?,
            order_criteria,
            maintenance,
        })
    }

    /// Settings that decide what a simulation produces, in a fixed order.
    pub fn simulation_key(&self) -> Vec<(&'static str, String)> {
        vec![
            ("pollutant", self.pollutant.clone()),
            ("start_date", self.start_date.clone()),
            ("end_date", self.end_date.clone()),
            ("outfall_node", self.outfall.clone()),
        ]
    }

    /// `_<res_id>_<start digits>_<end digits>`, used to name copied results.
    pub fn result_tag(&self) -> String {
        format!(
            "_{}_{}_{}",
            self.res_id,
            self.start_date.replace('/', ""),
            self.end_date.replace('/', "")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use st_settings::parse_settings;

    const BASE: &str = "\
input_file = network.inp
pollutant = TSS
start_date = 06/01/2020
end_date = 06/30/2020
outfall_node = OUT1
junction_suffix = _m
res_id = r1
results_file = results.xlsx
formula = R;0.8
number_of_samples = 2
number_of_scenarios = 3
";

    fn config(extra: &str) -> AppResult<RunConfig> {
        let settings = parse_settings(&format!("{}{}", BASE, extra)).unwrap();
        RunConfig::from_settings(&settings, Path::new("/work"))
    }

    #[test]
    fn paths_dates_and_defaults() {
        let c = config("").unwrap();
        assert_eq!(c.network_path, PathBuf::from("/work/network.inp"));
        assert_eq!(c.results_dir, PathBuf::from("/work/results"));
        assert_eq!(c.start.to_string(), "2020-06-01 00:00:00");
        assert_eq!(c.end.to_string(), "2020-06-30 23:59:00");
        assert!(c.separation.is_none());
        assert!(c.scenarios.is_none());
        assert!(c.time_steps.is_none());
        assert!(!c.run_simulations);
        assert_eq!(c.order_criteria, vec![RankCriterion::RemovalMass]);
        assert_eq!(c.result_tag(), "_r1_06012020_06302020");
    }

    #[test]
    fn policy_precedence() {
        let c = config("create_treatment_scenarios=1\nrank_junctions=1\nland_use_prioritization=1\n")
            .unwrap();
        let s = c.scenarios.unwrap();
        assert_eq!(s.policy, SelectionPolicy::RankJunctions);
        assert_eq!(s.treatment.function, "R = 0.8");

        let c = config("create_treatment_scenarios=1\nuse_specific_scenarios=1\nuser_scenarios=J1,J2;J3\n")
            .unwrap();
        assert_eq!(
            c.scenarios.unwrap().policy,
            SelectionPolicy::Explicit(vec![
                vec!["J1".to_string(), "J2".to_string()],
                vec!["J3".to_string()]
            ])
        );

        let c = config("create_treatment_scenarios=1\nrandom_seed=7\n").unwrap();
        let s = c.scenarios.unwrap();
        assert_eq!(
            s.policy,
            SelectionPolicy::UniformRandom {
                samples: 2,
                scenarios: 3
            }
        );
        assert_eq!(s.random_seed, Some(7));
    }

    #[test]
    fn separation_requires_its_values() {
        let err = config("separate_junctions=1\n").unwrap_err();
        assert!(matches!(err, AppError::Settings(_)));
        let c = config("separate_junctions=1\nheight_offset=-0.5\ncoord_offset=1\nconduit_length=0.1\n")
            .unwrap();
        assert_eq!(c.separation.unwrap().height_offset, -0.5);

        let err = config("separate_junctions=1\nheight_offset=NaN\ncoord_offset=1\nconduit_length=0.1\n")
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(ref m) if m.contains("height_offset")));
    }

    #[test]
    fn bad_dates_and_criteria_rejected() {
        let settings = parse_settings(&BASE.replace("06/30/2020", "2020-06-30")).unwrap();
        assert!(matches!(
            RunConfig::from_settings(&settings, Path::new(".")),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            simulation_period("06/30/2020", "06/01/2020"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            config("order_criteria=removal_mass,fastest\n"),
            Err(AppError::Results(_))
        ));
        let c = config("order_criteria=removal_percent,total_TSS\n").unwrap();
        assert_eq!(
            c.order_criteria,
            vec![RankCriterion::RemovalPercent, RankCriterion::TotalPollutant]
        );
    }
}
