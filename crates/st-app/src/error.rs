//! Error types for the st-app service layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the backend crates and
/// gives the CLI one error interface.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Section [{section}] not found in network file")]
    SectionNotFound { section: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Scenario generation failed: {0}")]
    Scenario(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("No backup to restore for {path}")]
    BackupUnavailable { path: PathBuf },

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for st-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<st_network::NetworkError> for AppError {
    fn from(err: st_network::NetworkError) -> Self {
        match err {
            st_network::NetworkError::SectionNotFound { section } => {
                AppError::SectionNotFound { section }
            }
            other => AppError::Network(other.to_string()),
        }
    }
}

impl From<st_core::StError> for AppError {
    fn from(err: st_core::StError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<st_settings::SettingsError> for AppError {
    fn from(err: st_settings::SettingsError) -> Self {
        match err {
            st_settings::SettingsError::Io(io) => AppError::Io(io),
            other => AppError::Settings(other.to_string()),
        }
    }
}

impl From<st_scenario::ScenarioError> for AppError {
    fn from(err: st_scenario::ScenarioError) -> Self {
        AppError::Scenario(err.to_string())
    }
}

impl From<st_results::ResultsError> for AppError {
    fn from(err: st_results::ResultsError) -> Self {
        match err {
            st_results::ResultsError::Io(io) => AppError::Io(io),
            other => AppError::Results(other.to_string()),
        }
    }
}

impl From<crate::engine::EngineError> for AppError {
    fn from(err: crate::engine::EngineError) -> Self {
        AppError::Simulation(err.to_string())
    }
}
