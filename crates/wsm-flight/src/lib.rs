//! Durable, compensating multi-step flights.
//!
//! A [`Flight`] is an ordered list of [`Step`]s, each paired with a
//! [`RetryPolicy`]. The [`FlightExecutor`] runs the steps in order against a
//! shared working map. Steps classify their own failures as retryable or
//! fatal; a fatal failure (or exhausted retries) undoes every completed step
//! in reverse order.

mod audit;
mod builder;
mod error;
mod executor;
mod flight;
mod id;
mod result;
mod retry;
mod roles;
mod step;
mod store;

pub use audit::{FlightAuditLog, StepRecord, StepStatus};
pub use builder::FlightBuilder;
pub use error::{FlightBuildError, FlightError, StoreError, UndoError};
pub use executor::{FlightExecutor, FlightRun, InterruptHandle, SpawnedFlight};
pub use flight::{Flight, FlightStep};
pub use id::FlightId;
pub use result::{RetryClassification, StepFailure, StepOutcome, StepResult};
pub use retry::{Backoff, RetryPolicy, Sleeper, ThreadSleeper};
pub use roles::{FlightRole, FlightRoles};
pub use step::{BoxedStep, Step};
pub use store::{
    Direction, FileSystemFlightStore, FlightState, FlightStatus, FlightStore, InMemoryFlightStore,
};
