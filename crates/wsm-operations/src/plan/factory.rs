use tracing::debug;
use wsm_core::{CloudPlatform, ControlledResource};
use wsm_flight::{FlightBuilder, FlightExecutor, FlightRole};

use super::{PlannedStep, PlannerRegistry, ResourceFlight, planned};
use crate::Result;
use crate::context::{FlightServices, OperationSettings};
use crate::steps::{
    DeletePolicyResourceStep, DeleteResourceMetadataStep, GetAzureCloudContextStep,
    GetGcpCloudContextStep, StoreResourceMetadataStep,
};
use crate::types::FlightInputs;
use crate::working_map::WorkingMap;

/// Assembles complete flights: the resource steps a planner returns,
/// wrapped with the metadata and cloud-context steps every flight of a role
/// shares.
///
/// | role | flight |
/// |---|---|
/// | create | store metadata, cloud context, resource steps |
/// | delete | cloud context, delete policy, resource steps, delete metadata |
/// | update | cloud context, resource steps |
/// | clone, revoke/restore access | resource steps |
pub struct FlightFactory {
    registry: PlannerRegistry,
    settings: OperationSettings,
}

impl FlightFactory {
    #[must_use]
    pub fn new(registry: PlannerRegistry, settings: OperationSettings) -> Self {
        Self { registry, settings }
    }

    /// A factory over [`PlannerRegistry::standard`].
    #[must_use]
    pub fn standard(settings: OperationSettings) -> Self {
        Self::new(PlannerRegistry::standard(), settings)
    }

    #[must_use]
    pub fn settings(&self) -> &OperationSettings {
        &self.settings
    }

    /// Build the flight for `role`.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor is invalid, no planner supports the
    /// role for its kind, or a required input is missing.
    pub fn flight(
        &self,
        role: FlightRole,
        resource: &ControlledResource,
        inputs: &FlightInputs,
    ) -> Result<ResourceFlight> {
        match role {
            FlightRole::Create => self.create_flight(resource, inputs),
            FlightRole::Delete => self.delete_flight(resource, inputs),
            FlightRole::Update => self.update_flight(resource, inputs),
            FlightRole::Clone => self.clone_flight(resource, inputs),
            FlightRole::RevokeAccess => self.revoke_access_flight(resource),
            FlightRole::RestoreAccess => self.restore_access_flight(resource),
        }
    }

    /// # Errors
    ///
    /// See [`FlightFactory::flight`].
    pub fn create_flight(
        &self,
        resource: &ControlledResource,
        inputs: &FlightInputs,
    ) -> Result<ResourceFlight> {
        let role = FlightRole::Create;
        resource.validate()?;
        let steps = self
            .registry
            .get(resource.kind(), role)?
            .create_steps(resource, inputs, &self.settings)?;

        let mut flight = vec![
            planned(
                StoreResourceMetadataStep::new(resource.clone()),
                self.settings.short_database_retry(),
            ),
            self.cloud_context_step(resource),
        ];
        flight.extend(steps);
        assemble(role, resource, flight)
    }

    /// # Errors
    ///
    /// See [`FlightFactory::flight`].
    pub fn delete_flight(
        &self,
        resource: &ControlledResource,
        inputs: &FlightInputs,
    ) -> Result<ResourceFlight> {
        let role = FlightRole::Delete;
        resource.validate()?;
        let steps = self
            .registry
            .get(resource.kind(), role)?
            .delete_steps(resource, inputs, &self.settings)?;

        let mut flight = vec![
            self.cloud_context_step(resource),
            planned(
                DeletePolicyResourceStep::new(resource.clone()),
                self.settings.cloud_retry(),
            ),
        ];
        flight.extend(steps);
        flight.push(planned(
            DeleteResourceMetadataStep::new(resource.workspace_id(), resource.resource_id()),
            self.settings.short_database_retry(),
        ));
        assemble(role, resource, flight)
    }

    /// # Errors
    ///
    /// See [`FlightFactory::flight`].
    pub fn update_flight(
        &self,
        resource: &ControlledResource,
        inputs: &FlightInputs,
    ) -> Result<ResourceFlight> {
        let role = FlightRole::Update;
        resource.validate()?;
        let steps = self
            .registry
            .get(resource.kind(), role)?
            .update_steps(resource, inputs, &self.settings)?;

        let mut flight = vec![self.cloud_context_step(resource)];
        flight.extend(steps);
        assemble(role, resource, flight)
    }

    /// # Errors
    ///
    /// See [`FlightFactory::flight`].
    pub fn clone_flight(
        &self,
        resource: &ControlledResource,
        inputs: &FlightInputs,
    ) -> Result<ResourceFlight> {
        let role = FlightRole::Clone;
        resource.validate()?;
        let steps = self
            .registry
            .get(resource.kind(), role)?
            .clone_steps(resource, inputs, &self.settings)?;
        assemble(role, resource, steps)
    }

    /// # Errors
    ///
    /// See [`FlightFactory::flight`].
    pub fn revoke_access_flight(&self, resource: &ControlledResource) -> Result<ResourceFlight> {
        let role = FlightRole::RevokeAccess;
        resource.validate()?;
        let steps = self
            .registry
            .get(resource.kind(), role)?
            .revoke_access_steps(resource, &self.settings)?;
        assemble(role, resource, steps)
    }

    /// # Errors
    ///
    /// See [`FlightFactory::flight`].
    pub fn restore_access_flight(&self, resource: &ControlledResource) -> Result<ResourceFlight> {
        let role = FlightRole::RestoreAccess;
        resource.validate()?;
        let steps = self
            .registry
            .get(resource.kind(), role)?
            .restore_access_steps(resource, &self.settings)?;
        assemble(role, resource, steps)
    }

    fn cloud_context_step(&self, resource: &ControlledResource) -> PlannedStep {
        let workspace_id = resource.workspace_id();
        let policy = self.settings.short_database_retry();
        match resource.platform() {
            CloudPlatform::Azure => planned(GetAzureCloudContextStep::new(workspace_id), policy),
            CloudPlatform::Gcp => planned(GetGcpCloudContextStep::new(workspace_id), policy),
        }
    }
}

fn assemble(
    role: FlightRole,
    resource: &ControlledResource,
    steps: Vec<PlannedStep>,
) -> Result<ResourceFlight> {
    let name = format!("{role}-{}", resource.kind().as_str().replace(' ', "-"));
    let flight = FlightBuilder::new(name, role).steps(steps).build()?;
    debug!(
        flight_id = %flight.id(),
        resource_id = %resource.resource_id(),
        steps = ?flight.step_names(),
        "planned flight"
    );
    Ok(flight)
}

/// Run a flight from an empty working map and return the map it left behind.
///
/// # Errors
///
/// Returns the flight's failure, with the failing step's own error as its
/// [`OperationError::root_cause`](crate::OperationError::root_cause).
pub fn execute(
    executor: &FlightExecutor,
    flight: &ResourceFlight,
    services: &FlightServices,
) -> Result<WorkingMap> {
    let mut map = WorkingMap::new();
    executor.run(flight, services, &mut map)?;
    Ok(map)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wsm_core::{CloudError, ResourceKind, WorkspaceId};
    use wsm_flight::StepStatus;

    use super::*;
    use crate::OperationError;
    use crate::mocks::{
        GCP_PROJECT, RecordingSleeper, TestServices, gcs_bucket_resource,
        managed_identity_resource,
    };
    use crate::traits::ResourceStore;

    fn factory() -> FlightFactory {
        FlightFactory::standard(OperationSettings::default())
    }

    fn executor() -> FlightExecutor {
        FlightExecutor::new(Arc::new(RecordingSleeper::default()))
    }

    #[test]
    fn create_wraps_resource_steps_with_metadata_and_context() -> anyhow::Result<()> {
        let resource: ControlledResource =
            gcs_bucket_resource(WorkspaceId::new(), "analysis-bucket").into();

        let flight = factory().create_flight(&resource, &FlightInputs::default())?;

        assert_eq!(flight.name(), "create-gcs-bucket");
        assert_eq!(
            flight.step_names(),
            vec![
                "store_resource_metadata",
                "get_gcp_cloud_context",
                "create_gcs_bucket",
                "gcs_bucket_cloud_sync",
            ]
        );
        Ok(())
    }

    #[test]
    fn delete_removes_policy_first_and_metadata_last() -> anyhow::Result<()> {
        let resource: ControlledResource =
            managed_identity_resource(WorkspaceId::new(), "analysis-id").into();

        let flight = factory().delete_flight(&resource, &FlightInputs::default())?;

        assert_eq!(
            flight.step_names(),
            vec![
                "get_azure_cloud_context",
                "delete_policy_resource",
                "delete_azure_managed_identity",
                "delete_resource_metadata",
            ]
        );
        Ok(())
    }

    #[test]
    fn invalid_descriptor_is_rejected_before_planning() {
        let resource: ControlledResource =
            gcs_bucket_resource(WorkspaceId::new(), "Not_A_Bucket").into();

        let err = factory()
            .create_flight(&resource, &FlightInputs::default())
            .expect_err("invalid bucket name");

        assert!(matches!(err, OperationError::Core(_)));
    }

    #[test]
    fn managed_identity_has_no_access_steps() -> anyhow::Result<()> {
        let resource: ControlledResource =
            managed_identity_resource(WorkspaceId::new(), "analysis-id").into();

        let flight = factory().revoke_access_flight(&resource)?;

        assert!(flight.is_empty());
        Ok(())
    }

    #[test]
    fn bucket_clone_is_unsupported() {
        let resource: ControlledResource =
            gcs_bucket_resource(WorkspaceId::new(), "analysis-bucket").into();

        let err = factory()
            .flight(FlightRole::Clone, &resource, &FlightInputs::default())
            .expect_err("unsupported");

        assert!(matches!(
            err,
            OperationError::UnsupportedOperation {
                kind: ResourceKind::GcsBucket,
                role: FlightRole::Clone,
            }
        ));
    }

    #[test]
    fn bucket_create_flight_runs_end_to_end() -> anyhow::Result<()> {
        let workspace_id = WorkspaceId::new();
        let resource: ControlledResource =
            gcs_bucket_resource(workspace_id, "analysis-bucket").into();
        let services = TestServices::new().with_gcp_workspace(workspace_id);
        let ctx = services.build();
        let flight = factory().create_flight(&resource, &FlightInputs::default())?;

        let map = execute(&executor(), &flight, &ctx)?;

        assert_eq!(services.storage.bucket_names(), vec!["analysis-bucket"]);
        assert_eq!(
            services
                .resources
                .get_resource(workspace_id, resource.resource_id())?,
            resource
        );
        assert_eq!(
            map.gcp.cloud_context.map(|context| context.project_id),
            Some(GCP_PROJECT.to_string())
        );
        Ok(())
    }

    #[test]
    fn transient_create_failure_is_retried() -> anyhow::Result<()> {
        let workspace_id = WorkspaceId::new();
        let resource: ControlledResource =
            gcs_bucket_resource(workspace_id, "analysis-bucket").into();
        let services = TestServices::new().with_gcp_workspace(workspace_id);
        services
            .storage
            .fail_next_create(CloudError::http(503, "backend unavailable"));
        let ctx = services.build();
        let flight = factory().create_flight(&resource, &FlightInputs::default())?;
        let mut map = WorkingMap::new();

        let (result, audit) = executor().run_with_audit(&flight, &ctx, &mut map);

        result.map_err(OperationError::from)?;
        let create = audit
            .records()
            .iter()
            .find(|record| record.name == "create_gcs_bucket")
            .expect("create step recorded");
        assert_eq!(create.attempts, 2);
        Ok(())
    }

    #[test]
    fn taken_bucket_name_undoes_metadata_and_surfaces_duplicate() -> anyhow::Result<()> {
        let workspace_id = WorkspaceId::new();
        let resource: ControlledResource =
            gcs_bucket_resource(workspace_id, "analysis-bucket").into();
        let services = TestServices::new().with_gcp_workspace(workspace_id);
        services.storage.insert_foreign_bucket("analysis-bucket");
        let ctx = services.build();
        let flight = factory().create_flight(&resource, &FlightInputs::default())?;
        let mut map = WorkingMap::new();

        let (result, audit) = executor().run_with_audit(&flight, &ctx, &mut map);

        let err = OperationError::from(result.expect_err("name taken"));
        assert!(matches!(
            err.root_cause(),
            OperationError::DuplicateResource(_)
        ));
        assert_eq!(
            audit.steps_with_status(StepStatus::Undone),
            vec!["store_resource_metadata", "get_gcp_cloud_context"]
        );
        assert!(
            services
                .resources
                .get_resource(workspace_id, resource.resource_id())
                .is_err()
        );
        Ok(())
    }

    #[test]
    fn rerunning_identity_create_is_idempotent() -> anyhow::Result<()> {
        let workspace_id = WorkspaceId::new();
        let resource: ControlledResource =
            managed_identity_resource(workspace_id, "analysis-id").into();
        let services = TestServices::new().with_azure_workspace(workspace_id);
        let ctx = services.build();
        let factory = factory();
        let executor = executor();

        for _ in 0..2 {
            let flight = factory.create_flight(&resource, &FlightInputs::default())?;
            execute(&executor, &flight, &ctx)?;
        }

        assert_eq!(services.identities.identity_names(), vec!["analysis-id"]);
        Ok(())
    }
}
