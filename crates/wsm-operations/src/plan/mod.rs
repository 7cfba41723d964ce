//! Step-graph assembly.
//!
//! Planners are pure: they look at a resource descriptor and the flight's
//! inputs and return the ordered steps, never calling a cloud service.

mod dataproc;
mod factory;
mod gcs_bucket;
mod kubernetes_namespace;
mod managed_identity;
mod registry;

use wsm_core::{ControlledResource, ResourceKind};
use wsm_flight::{Flight, FlightRole, FlightStep, RetryPolicy, Step};

pub use dataproc::DataprocClusterPlanner;
pub use factory::{FlightFactory, execute};
pub use gcs_bucket::GcsBucketPlanner;
pub use kubernetes_namespace::KubernetesNamespacePlanner;
pub use managed_identity::ManagedIdentityPlanner;
pub use registry::PlannerRegistry;

use crate::Result;
use crate::context::{FlightServices, OperationSettings};
use crate::error::OperationError;
use crate::types::{FlightInputs, FlightUser};
use crate::working_map::WorkingMap;

/// A resource step with the retry policy it runs under.
pub type PlannedStep = FlightStep<FlightServices, WorkingMap, OperationError>;

/// A flight over the resource steps.
pub type ResourceFlight = Flight<FlightServices, WorkingMap, OperationError>;

/// Builds the step lists for one resource kind.
///
/// Update and clone are unsupported unless a planner says otherwise; access
/// revocation is a no-op for kinds without native access.
pub trait ResourcePlanner: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// # Errors
    ///
    /// Returns an error if the resource is of another kind or an input the
    /// steps need is missing.
    fn create_steps(
        &self,
        resource: &ControlledResource,
        inputs: &FlightInputs,
        settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>>;

    /// # Errors
    ///
    /// Returns an error if the resource is of another kind.
    fn delete_steps(
        &self,
        resource: &ControlledResource,
        inputs: &FlightInputs,
        settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>>;

    /// # Errors
    ///
    /// Returns `OperationError::UnsupportedOperation` unless overridden.
    fn update_steps(
        &self,
        _resource: &ControlledResource,
        _inputs: &FlightInputs,
        _settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        Err(self.unsupported(FlightRole::Update))
    }

    /// # Errors
    ///
    /// Returns `OperationError::UnsupportedOperation` unless overridden.
    fn clone_steps(
        &self,
        _resource: &ControlledResource,
        _inputs: &FlightInputs,
        _settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        Err(self.unsupported(FlightRole::Clone))
    }

    /// # Errors
    ///
    /// Returns an error if the resource is of another kind.
    fn revoke_access_steps(
        &self,
        _resource: &ControlledResource,
        _settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        Ok(Vec::new())
    }

    /// # Errors
    ///
    /// Returns an error if the resource is of another kind.
    fn restore_access_steps(
        &self,
        _resource: &ControlledResource,
        _settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        Ok(Vec::new())
    }

    fn unsupported(&self, role: FlightRole) -> OperationError {
        OperationError::UnsupportedOperation {
            kind: self.kind(),
            role,
        }
    }
}

fn planned<S>(step: S, policy: &RetryPolicy) -> PlannedStep
where
    S: Step<Context = FlightServices, WorkingMap = WorkingMap, Error = OperationError> + 'static,
{
    FlightStep::new(step, policy.clone())
}

fn require_user(inputs: &FlightInputs) -> Result<&FlightUser> {
    inputs
        .user
        .as_ref()
        .ok_or(OperationError::MissingInput { name: "user" })
}
