use indexmap::IndexMap;
use wsm_core::ResourceKind;
use wsm_flight::FlightRole;

use super::{
    DataprocClusterPlanner, GcsBucketPlanner, KubernetesNamespacePlanner, ManagedIdentityPlanner,
    ResourcePlanner,
};
use crate::Result;
use crate::error::OperationError;

/// Planners by resource kind, built once at startup and handed to the
/// [`FlightFactory`](super::FlightFactory).
#[derive(Default)]
pub struct PlannerRegistry {
    planners: IndexMap<ResourceKind, Box<dyn ResourcePlanner>>,
}

impl PlannerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every planner this crate ships.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(ManagedIdentityPlanner);
        registry.register(KubernetesNamespacePlanner);
        registry.register(DataprocClusterPlanner);
        registry.register(GcsBucketPlanner);
        registry
    }

    /// Add a planner, replacing any planner already registered for its kind.
    pub fn register<P: ResourcePlanner + 'static>(&mut self, planner: P) {
        self.planners.insert(planner.kind(), Box::new(planner));
    }

    /// # Errors
    ///
    /// Returns `OperationError::UnsupportedOperation` if no planner handles `kind`.
    pub fn get(&self, kind: ResourceKind, role: FlightRole) -> Result<&dyn ResourcePlanner> {
        self.planners
            .get(&kind)
            .map(Box::as_ref)
            .ok_or(OperationError::UnsupportedOperation { kind, role })
    }

    #[must_use]
    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.planners.keys().copied()
    }
}
