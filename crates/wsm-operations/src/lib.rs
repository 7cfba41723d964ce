//! Resource lifecycle flights for workspace manager.
//!
//! Each controlled resource kind has a [`ResourcePlanner`] that turns a
//! descriptor into the ordered steps of a create, delete, update, clone or
//! access flight. The [`FlightFactory`] wraps those steps with the metadata
//! and cloud-context steps every flight shares, and the flight engine in
//! `wsm-flight` runs them against a [`FlightServices`] context.

pub(crate) mod classify;
mod context;
mod error;
pub mod plan;
pub(crate) mod polling;
pub mod providers;
pub mod steps;
pub mod traits;
pub mod types;
mod working_map;

#[cfg(test)]
pub mod mocks;

pub use context::{CloudClients, FlightServices, OperationSettings};
pub use error::{OperationError, Result, UndoFailure};
pub use plan::{
    DataprocClusterPlanner, FlightFactory, GcsBucketPlanner, KubernetesNamespacePlanner,
    ManagedIdentityPlanner, PlannedStep, PlannerRegistry, ResourceFlight, ResourcePlanner,
    execute,
};
pub use working_map::{AzureState, CloneState, GcpState, UpdateState, WorkingMap};
