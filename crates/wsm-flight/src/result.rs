use serde::{Deserialize, Serialize};

/// Tri-state outcome of a single `do` or `undo` attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Retry,
    Fatal,
}

/// A failed step attempt, classified for the executor's retry loop.
#[derive(Debug)]
pub enum StepFailure<E> {
    /// Transient failure; the executor retries within the step's policy.
    Retry(E),
    /// Permanent failure; the executor starts the undo cascade.
    Fatal(E),
}

impl<E> StepFailure<E> {
    /// Classify an error by its own [`RetryClassification`].
    pub fn classified(error: E) -> Self
    where
        E: RetryClassification,
    {
        match error.outcome() {
            StepOutcome::Retry => Self::Retry(error),
            StepOutcome::Success | StepOutcome::Fatal => Self::Fatal(error),
        }
    }

    #[must_use]
    pub fn outcome(&self) -> StepOutcome {
        match self {
            Self::Retry(_) => StepOutcome::Retry,
            Self::Fatal(_) => StepOutcome::Fatal,
        }
    }

    #[must_use]
    pub fn error(&self) -> &E {
        match self {
            Self::Retry(error) | Self::Fatal(error) => error,
        }
    }

    pub fn into_error(self) -> E {
        match self {
            Self::Retry(error) | Self::Fatal(error) => error,
        }
    }

    #[must_use]
    pub fn is_retry(&self) -> bool {
        matches!(self, Self::Retry(_))
    }

    /// Turn a retryable failure into a fatal one, keeping the error.
    #[must_use]
    pub fn into_fatal(self) -> Self {
        Self::Fatal(self.into_error())
    }
}

/// Result of a single `do` or `undo` attempt.
pub type StepResult<E> = Result<(), StepFailure<E>>;

/// Errors that know whether retrying could help.
pub trait RetryClassification {
    /// Whether a failure carrying this error should be retried or is fatal.
    fn outcome(&self) -> StepOutcome;
}
