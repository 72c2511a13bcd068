//! Error and anomaly types for the reconciliation engine.
//!
//! Nothing here is ever propagated out of `reconcile`: validation errors
//! and protocol anomalies are logged, recorded on the change set, and the
//! offending field or event is skipped.

use std::fmt;

use thiserror::Error;

use crate::ports::PortField;

/// A single malformed field in an inbound payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} value {value} is outside (0, 65536)")]
    PortOutOfRange { field: PortField, value: i64 },

    #[error("{field} value {value:?} is not a number")]
    PortNotNumeric { field: PortField, value: String },

    #[error("event for project {got} delivered to project {expected}")]
    IdMismatch { expected: String, got: String },

    #[error("unknown start mode {0:?}")]
    UnknownStartMode(String),

    #[error("invalid application URL {url:?}: {detail}")]
    InvalidUrl { url: String, detail: String },

    #[error("unrecognized {field} value {value:?}")]
    UnknownStatus { field: &'static str, value: String },
}

/// An event that arrived while the model was not in a state to accept it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolAnomaly {
    /// Snapshot or event addressed to a different project.
    IdMismatch { expected: String, got: String },
    /// Restart result with no restart in flight.
    UnexpectedRestartResult,
    /// Deletion result with no deletion in flight.
    UnexpectedDeletionResult,
    /// App reported started but the snapshot carried no ports object.
    StartedWithoutPorts,
    /// Snapshot carried a sequence number older than one already applied.
    StaleSnapshot { version: u64, applied: u64 },
}

impl fmt::Display for ProtocolAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdMismatch { expected, got } => {
                write!(f, "event for project {got} delivered to project {expected}")
            }
            Self::UnexpectedRestartResult => f.write_str("restart result with no pending restart"),
            Self::UnexpectedDeletionResult => {
                f.write_str("deletion result with no pending deletion")
            }
            Self::StartedWithoutPorts => f.write_str("application started but no ports reported"),
            Self::StaleSnapshot { version, applied } => {
                write!(f, "stale snapshot version {version} (applied {applied})")
            }
        }
    }
}

/// Failure loading an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_error_names_field_and_value() {
        let err = ValidationError::PortOutOfRange {
            field: PortField::App,
            value: 70000,
        };
        assert_eq!(err.to_string(), "appPort value 70000 is outside (0, 65536)");
    }

    #[test]
    fn anomaly_display() {
        let a = ProtocolAnomaly::StaleSnapshot {
            version: 3,
            applied: 5,
        };
        assert_eq!(a.to_string(), "stale snapshot version 3 (applied 5)");
    }
}
