//! Error types for CardioZone

use thiserror::Error;

use crate::types::SessionPhase;

/// Errors that can occur while computing zones or driving a workout session
#[derive(Debug, Error)]
pub enum WorkoutError {
    #[error("No target zone supplied")]
    InvalidZone,

    #[error("Invalid max heart rate: {0} (must be positive)")]
    InvalidMaxHeartRate(i32),

    #[error("Invalid age: {0} (supported range is 18-100)")]
    InvalidAge(u32),

    #[error("Unknown zone: {0}")]
    UnknownZone(String),

    #[error("Cannot {operation} while session is {phase}")]
    InvalidTransition {
        operation: &'static str,
        phase: SessionPhase,
    },

    #[error("Session is closed")]
    SessionClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Errors reported by a speech capability.
///
/// These never leave the announcer: they are logged and the tick carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeechError {
    #[error("Speech output unavailable")]
    Unavailable,

    #[error("Speech output failed: {0}")]
    Failed(String),
}
