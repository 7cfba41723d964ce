use std::time::Duration;

use thiserror::Error;
use wsm_core::{CloudError, CoreError, ResourceKind};
use wsm_flight::{
    FlightBuildError, FlightError, FlightRole, RetryClassification, StepFailure, StepOutcome,
    StoreError,
};

/// Details about an undo that failed while a flight was rolling back.
#[derive(Debug)]
pub struct UndoFailure {
    /// Name of the step whose undo failed.
    pub step: String,
    /// Description of what the undo was trying to do.
    pub description: String,
    /// The error that occurred during undo.
    pub error: Box<OperationError>,
}

#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("duplicate resource: {0}")]
    DuplicateResource(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("working map value '{key}' is missing")]
    MissingWorkingValue { key: &'static str },

    #[error("flight input '{name}' is missing")]
    MissingInput { name: &'static str },

    #[error("failed to {operation}")]
    Cloud {
        operation: &'static str,
        #[source]
        source: CloudError,
    },

    #[error("resource database error: {0}")]
    Database(String),

    #[error("{operation} did not finish within {}s", timeout.as_secs())]
    OperationTimeout {
        operation: String,
        timeout: Duration,
    },

    #[error("bucket '{bucket}' could not be deleted after {attempts} attempts")]
    BucketDeleteTimeout { bucket: String, attempts: u32 },

    #[error("cluster '{cluster}' must be RUNNING to be updated but is {state}")]
    ClusterNotRunning { cluster: String, state: String },

    #[error("{kind} resources do not support {role} flights")]
    UnsupportedOperation {
        kind: ResourceKind,
        role: FlightRole,
    },

    #[error(transparent)]
    FlightBuild(#[from] FlightBuildError),

    #[error(transparent)]
    FlightStore(#[from] StoreError),

    #[error("flight failed at step '{step}'")]
    FlightFailed {
        step: String,
        #[source]
        source: Box<OperationError>,
    },

    #[error(
        "flight failed at step '{step}' and {} undo(s) also failed", undo_failures.len()
    )]
    FlightUndoFailed {
        step: String,
        #[source]
        source: Box<OperationError>,
        undo_failures: Vec<UndoFailure>,
    },

    #[error("flight was interrupted at step '{step}'")]
    FlightInterrupted { step: String },

    #[error("flight was rolled back after step '{step}' failed: {reason}")]
    FlightRolledBack { step: String, reason: String },

    #[error("flight cannot be run: {0}")]
    FlightRejected(String),
}

pub type Result<T> = std::result::Result<T, OperationError>;

impl OperationError {
    /// Wrap a cloud client error. Client errors other than throttling become
    /// `ResourceNotFound`, `Conflict` or `BadRequest`; everything else keeps
    /// the raw cloud error so it can be retried.
    #[must_use]
    pub fn cloud(operation: &'static str, source: CloudError) -> Self {
        let detail = || format!("{operation}: {}", source.message());
        if source.is_not_found() {
            Self::ResourceNotFound(detail())
        } else if source.is_conflict() {
            Self::Conflict(detail())
        } else if source.is_client_error() && !source.is_throttled() {
            Self::BadRequest(detail())
        } else {
            Self::Cloud { operation, source }
        }
    }

    /// Whether a step failing with this error should be retried.
    #[must_use]
    pub fn step_status(&self) -> StepOutcome {
        match self {
            Self::Cloud { source, .. } if source.is_transient() => StepOutcome::Retry,
            Self::Database(_) | Self::OperationTimeout { .. } => StepOutcome::Retry,
            _ => StepOutcome::Fatal,
        }
    }

    /// The domain error a caller should see: the step error behind any
    /// flight-level wrapper.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::FlightFailed { source, .. } | Self::FlightUndoFailed { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

impl RetryClassification for OperationError {
    fn outcome(&self) -> StepOutcome {
        self.step_status()
    }
}

impl From<OperationError> for StepFailure<OperationError> {
    fn from(err: OperationError) -> Self {
        Self::classified(err)
    }
}

impl From<FlightError<OperationError>> for OperationError {
    fn from(err: FlightError<OperationError>) -> Self {
        match err {
            FlightError::StepFailed { step, source, .. } => Self::FlightFailed {
                step,
                source: Box::new(source),
            },
            FlightError::UndoFailed {
                failed_step,
                step_error,
                undo_errors,
            } => {
                let undo_failures = undo_errors
                    .into_iter()
                    .map(|e| UndoFailure {
                        step: e.step,
                        description: e.description,
                        error: Box::new(e.error),
                    })
                    .collect();
                Self::FlightUndoFailed {
                    step: failed_step,
                    source: Box::new(step_error),
                    undo_failures,
                }
            }
            FlightError::Interrupted { step, .. } => Self::FlightInterrupted { step },
            FlightError::RolledBack { step, reason, .. } => Self::FlightRolledBack { step, reason },
            FlightError::Store(source) => Self::FlightStore(source),
            other => Self::FlightRejected(other.to_string()),
        }
    }
}
