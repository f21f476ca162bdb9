#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    LoadingSettings,
    RestoringBackup,
    PreparingNetwork,
    ResolvingTopology,
    SeparatingJunctions,
    GeneratingScenarios,
    Simulating,
    SavingResults,
    Aggregating,
    Exporting,
    Completed,
}

impl RunStage {
    pub fn label(self) -> &'static str {
        match self {
            RunStage::LoadingSettings => "settings",
            RunStage::RestoringBackup => "backup",
            RunStage::PreparingNetwork => "network",
            RunStage::ResolvingTopology => "topology",
            RunStage::SeparatingJunctions => "separation",
            RunStage::GeneratingScenarios => "scenarios",
            RunStage::Simulating => "simulating",
            RunStage::SavingResults => "saving",
            RunStage::Aggregating => "aggregating",
            RunStage::Exporting => "exporting",
            RunStage::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationProgress {
    /// Zero-based scenario index; 0 is the baseline.
    pub scenario: usize,
    pub scenarios: usize,
    /// Engine completion of the current scenario, 0 to 100.
    pub percent_complete: f64,
}

impl SimulationProgress {
    /// Completion over all scenarios, 0 to 1.
    pub fn fraction_complete(&self) -> f64 {
        if self.scenarios == 0 {
            return 1.0;
        }
        (self.scenario as f64 + self.percent_complete / 100.0) / self.scenarios as f64
    }
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub stage: RunStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
    pub simulation: Option<SimulationProgress>,
}

impl RunProgressEvent {
    pub fn stage(stage: RunStage, elapsed_wall_s: f64, message: Option<String>) -> Self {
        Self {
            stage,
            elapsed_wall_s,
            message,
            simulation: None,
        }
    }
}
