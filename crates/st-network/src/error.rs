//! Network-file error types.

use std::path::PathBuf;

/// Errors raised while reading, resolving or mutating a network file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// A bracketed section header is absent from the file.
    SectionNotFound { section: String },

    /// A data line does not have the fields its section requires.
    MalformedRecord {
        section: &'static str,
        line: String,
        reason: String,
    },

    /// Insert position lies past the end of a section body.
    PositionOutOfRange {
        section: String,
        position: usize,
        len: usize,
    },

    /// A subcatchment outlet chain loops back on itself.
    CyclicOutlet { subcatchment: String },

    /// A record references a node that has no geometry.
    MissingGeometry { id: String },

    /// Separation or edit options that cannot be written to the file.
    InvalidOptions { reason: String },

    /// Reading or writing the file failed.
    Io { path: PathBuf, message: String },
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::SectionNotFound { section } => {
                write!(f, "Section [{}] not found in network file", section)
            }
            NetworkError::MalformedRecord {
                section,
                line,
                reason,
            } => {
                write!(f, "Malformed [{}] record '{}': {}", section, line, reason)
            }
            NetworkError::PositionOutOfRange {
                section,
                position,
                len,
            } => {
                write!(
                    f,
                    "Insert position {} out of range for [{}] ({} lines)",
                    position, section, len
                )
            }
            NetworkError::CyclicOutlet { subcatchment } => {
                write!(
                    f,
                    "Outlet chain of subcatchment {} never reaches a junction",
                    subcatchment
                )
            }
            NetworkError::MissingGeometry { id } => {
                write!(f, "No coordinates or polygon for {}", id)
            }
            NetworkError::InvalidOptions { reason } => write!(f, "Invalid options: {}", reason),
            NetworkError::Io { path, message } => {
                write!(f, "I/O error on {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<st_core::StError> for NetworkError {
    fn from(err: st_core::StError) -> Self {
        NetworkError::InvalidOptions {
            reason: err.to_string(),
        }
    }
}

pub type NetworkResult<T> = Result<T, NetworkError>;
