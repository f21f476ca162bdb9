//! Simulation engine boundary.
//!
//! The pipeline never simulates anything itself: it hands a prepared network
//! file to a [`SimulationEngine`] and gets back outfall and node time series.

use std::path::Path;

use chrono::NaiveDateTime;

/// Failure raised by an engine run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub struct EngineRequest<'a> {
    pub network_path: &'a Path,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub pollutant: &'a str,
    pub outfall: &'a str,
    /// Nodes whose lateral inflow is reported, in this order.
    pub nodes: &'a [String],
    /// Keep the engine's report and output files next to the network.
    pub create_report: bool,
}

/// Values at the end of one routing or reporting step.
///
/// Flows are liters per second and concentrations milligrams per liter.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStep {
    pub time: NaiveDateTime,
    pub outfall_inflow: f64,
    pub outfall_concentration: f64,
    /// Aligned with [`EngineRequest::nodes`].
    pub node_inflow: Vec<f64>,
    pub node_concentration: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutput {
    /// Start of the first step.
    pub start: NaiveDateTime,
    pub steps: Vec<EngineStep>,
    /// Flow routing continuity error, percent.
    pub flow_error: f64,
    /// Quality routing continuity error, percent.
    pub quality_error: f64,
}

pub trait SimulationEngine {
    /// Run one simulation. `progress` receives the percent complete.
    fn run(
        &mut self,
        request: &EngineRequest<'_>,
        progress: &mut dyn FnMut(f64),
    ) -> Result<EngineOutput, EngineError>;
}
