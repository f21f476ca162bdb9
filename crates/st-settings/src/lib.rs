//! st-settings: typed `key=value` settings file and scenario definition file.

pub mod schema;
pub mod store;
pub mod variations;

pub use schema::{FieldKind, Formula, SettingValue, field_kind};
pub use store::{Settings, parse_settings, read_settings, rewrite_settings, write_settings};
pub use variations::{ScenarioDefinitions, Variation};

pub type SettingsResult<T> = Result<T, SettingsError>;

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("Malformed line {line}: '{text}' (expected key=value)")]
    MalformedLine { line: usize, text: String },

    #[error("Invalid value: {key} = {value} (expected {expected})")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("Missing setting: {key}")]
    Missing { key: String },

    #[error("Wrong type: {key} is not {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
