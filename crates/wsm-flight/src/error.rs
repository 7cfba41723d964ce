use std::fmt::Debug;
use std::path::PathBuf;

use thiserror::Error;

use crate::id::FlightId;
use crate::roles::FlightRole;
use crate::store::FlightStatus;

/// Error from a failed undo during the undo cascade.
#[derive(Debug, thiserror::Error)]
#[error("undo failed for step '{step}': {description}")]
pub struct UndoError<E> {
    /// Name of the step whose undo failed.
    pub step: String,
    /// Description of what the undo was trying to do.
    pub description: String,
    /// The underlying error.
    #[source]
    pub error: E,
}

/// Error from flight execution.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlightError<E: Debug> {
    /// A step failed fatally and every completed step was undone.
    #[error("step '{step}' failed after {attempts} attempt(s)")]
    StepFailed {
        /// Name of the step that failed.
        step: String,
        /// Attempts made before giving up.
        attempts: u32,
        /// The error that caused the step to fail.
        #[source]
        source: E,
    },

    /// A step failed and some undo operations also failed.
    #[error("step '{failed_step}' failed, and {} undo(s) also failed", undo_errors.len())]
    UndoFailed {
        /// Name of the step that originally failed.
        failed_step: String,
        /// The error from the failed step.
        step_error: E,
        /// Errors from failed undo operations.
        undo_errors: Vec<UndoError<E>>,
    },

    /// The flight was interrupted before running `step`; its state can be resumed.
    #[error("flight {flight_id} interrupted before step '{step}'")]
    Interrupted { flight_id: FlightId, step: String },

    /// A resumed undo cascade finished; the original failure is only known by message.
    #[error("flight {flight_id} rolled back after step '{step}' failed: {reason}")]
    RolledBack {
        flight_id: FlightId,
        step: String,
        reason: String,
        undo_errors: Vec<UndoError<E>>,
    },

    /// The stored flight was checkpointed with a different step list.
    #[error("flight {flight_id} was stored with a different step list")]
    IncompatibleFlight { flight_id: FlightId },

    /// The stored flight already reached a terminal state.
    #[error("flight {flight_id} is {status} and cannot be resumed")]
    NotResumable {
        flight_id: FlightId,
        status: FlightStatus,
    },

    /// No stored state exists for the flight.
    #[error("no stored state for flight {0}")]
    UnknownFlight(FlightId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error from assembling a flight.
#[derive(Debug, Error)]
pub enum FlightBuildError {
    #[error("step '{step}' does not support {role} flights (supports {supported})")]
    RoleNotSupported {
        step: String,
        role: FlightRole,
        supported: String,
    },
}

/// Error from reading or writing persisted flight state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read flight state '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write flight state '{path}'")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse flight state '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize working map of flight {flight_id}")]
    Serialize {
        flight_id: FlightId,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to restore working map of flight {flight_id}")]
    Deserialize {
        flight_id: FlightId,
        #[source]
        source: serde_json::Error,
    },

    #[error("flight store lock poisoned")]
    Poisoned,
}
