use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use st_network::Treatment;

/// Pollutant and removal function written for one treated node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreatmentSpec {
    pub pollutant: String,
    /// e.g. `R = 0.8`
    pub function: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub index: usize,
    /// Junction id -> treatment. Empty for the baseline.
    pub assignments: BTreeMap<String, TreatmentSpec>,
}

impl Scenario {
    pub fn baseline() -> Self {
        Self::default()
    }

    pub fn is_baseline(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.assignments.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Records for the network file's `[TREATMENT]` section.
    pub fn treatments(&self) -> Vec<Treatment> {
        self.assignments
            .iter()
            .map(|(node, spec)| Treatment {
                node: node.clone(),
                pollutant: spec.pollutant.clone(),
                function: spec.function.clone(),
            })
            .collect()
    }
}
