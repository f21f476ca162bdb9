//! st-scenario: treatment scenario generation.
//!
//! A scenario is a set of junctions that receive a sediment trap. The first
//! scenario of every generated sequence is the untreated baseline.

pub mod generate;
pub mod rng;
pub mod scenario;

pub use generate::{SelectionPolicy, generate};
pub use rng::ScenarioRng;
pub use scenario::{Scenario, TreatmentSpec};

pub type ScenarioResult<T> = Result<T, ScenarioError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("Sampling infeasible: {requested} junctions requested from a pool of {available}")]
    SamplingInfeasible { requested: usize, available: usize },

    #[error("Unknown land use: {land_use}")]
    UnknownLandUse { land_use: String },

    #[error("Junction {junction} in scenario {scenario} is not a treatment candidate")]
    UnknownJunction { junction: String, scenario: usize },

    #[error("Duplicate junction {junction} in scenario {scenario}")]
    DuplicateJunction { junction: String, scenario: usize },
}
