//! Scenario definition file: named sets of settings overrides.
//!
//! ```json
//! {
//!   "simulation_scenarios": { "dry_year": { "start_date": "01/01/2018", "res_id": "dry" } },
//!   "maintenance": { "small": { "max_capacity": "5", "maintenance_interval": "30" } }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::SettingsResult;

/// Values may be written as JSON strings or numbers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl RawValue {
    fn as_setting(&self) -> String {
        match self {
            RawValue::Text(s) => s.clone(),
            RawValue::Number(n) => n.to_string(),
            RawValue::Flag(b) => if *b { "1" } else { "0" }.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MaintenanceDef {
    pub max_capacity: RawValue,
    pub maintenance_interval: RawValue,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScenarioDefinitions {
    #[serde(default)]
    pub simulation_scenarios: BTreeMap<String, BTreeMap<String, RawValue>>,
    #[serde(default)]
    pub maintenance: BTreeMap<String, MaintenanceDef>,
}

/// One named override set, applied with `write_settings`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variation {
    pub name: String,
    pub overrides: BTreeMap<String, String>,
}

impl ScenarioDefinitions {
    pub fn from_json(text: &str) -> SettingsResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> SettingsResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Simulation variations in name order.
    pub fn simulation_variations(&self) -> Vec<Variation> {
        self.simulation_scenarios
            .iter()
            .map(|(name, params)| Variation {
                name: name.clone(),
                overrides: params
                    .iter()
                    .map(|(k, v)| (k.clone(), v.as_setting()))
                    .collect(),
            })
            .collect()
    }

    /// Maintenance variations: replay only, no simulation and no output.
    ///
    /// Each name is `maintenance_<capacity>kg_<interval>d`, also stored under
    /// the `maintenance_id` override.
    pub fn maintenance_variations(&self) -> Vec<Variation> {
        self.maintenance
            .values()
            .map(|def| {
                let capacity = def.max_capacity.as_setting();
                let interval = def.maintenance_interval.as_setting();
                let id = format!("maintenance_{}kg_{}d", capacity, interval);
                let overrides = [
                    ("maintenance_id", id.clone()),
                    ("suppress_output", "1".to_string()),
                    ("run_simulations", "0".to_string()),
                    ("rank_junctions", "0".to_string()),
                    ("max_capacity", capacity),
                    ("maintenance_interval", interval),
                ]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
                Variation { name: id, overrides }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFS: &str = r#"{
        "simulation_scenarios": {
            "wet": { "start_date": "06/01/2019", "number_of_samples": 5 },
            "dry": { "start_date": "01/01/2018", "res_id": "dry" }
        },
        "maintenance": {
            "m1": { "max_capacity": "5", "maintenance_interval": 30 }
        }
    }"#;

    #[test]
    fn simulation_variations_in_name_order() {
        let defs = ScenarioDefinitions::from_json(DEFS).unwrap();
        let vars = defs.simulation_variations();
        assert_eq!(vars[0].name, "dry");
        assert_eq!(vars[1].overrides["number_of_samples"], "5");
    }

    #[test]
    fn maintenance_expands_overrides() {
        let defs = ScenarioDefinitions::from_json(DEFS).unwrap();
        let vars = defs.maintenance_variations();
        assert_eq!(vars.len(), 1);
        let m = &vars[0];
        assert_eq!(m.name, "maintenance_5kg_30d");
        assert_eq!(m.overrides["maintenance_id"], "maintenance_5kg_30d");
        assert_eq!(m.overrides["run_simulations"], "0");
        assert_eq!(m.overrides["suppress_output"], "1");
        assert_eq!(m.overrides["maintenance_interval"], "30");
    }

    #[test]
    fn missing_groups_default_to_empty() {
        let defs = ScenarioDefinitions::from_json("{}").unwrap();
        assert!(defs.simulation_variations().is_empty());
        assert!(defs.maintenance_variations().is_empty());
    }
}
