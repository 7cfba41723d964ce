use tracing::{debug, info};
use wsm_core::{ControlledResource, ResourceId, WorkspaceId};
use wsm_flight::{FlightRoles, Step};

use super::StepResult;
use crate::classify;
use crate::context::FlightServices;
use crate::error::OperationError;
use crate::working_map::WorkingMap;

/// Records the resource in the resource database before anything is created
/// in the cloud.
pub struct StoreResourceMetadataStep {
    resource: ControlledResource,
}

impl StoreResourceMetadataStep {
    #[must_use]
    pub fn new(resource: ControlledResource) -> Self {
        Self { resource }
    }
}

impl Step for StoreResourceMetadataStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "store_resource_metadata"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE
    }

    fn do_step(&self, ctx: &FlightServices, _map: &mut WorkingMap) -> StepResult {
        ctx.resources().create_controlled_resource(&self.resource)?;
        debug!(
            resource_id = %self.resource.resource_id(),
            kind = %self.resource.kind(),
            "stored resource metadata"
        );
        Ok(())
    }

    fn undo_step(&self, ctx: &FlightServices, _map: &mut WorkingMap) -> StepResult {
        ctx.resources()
            .delete_resource(self.resource.workspace_id(), self.resource.resource_id())?;
        Ok(())
    }

    fn undo_description(&self) -> String {
        format!("remove metadata of resource {}", self.resource.resource_id())
    }
}

/// Removes the resource from the resource database once its cloud objects are gone.
pub struct DeleteResourceMetadataStep {
    workspace_id: WorkspaceId,
    resource_id: ResourceId,
}

impl DeleteResourceMetadataStep {
    #[must_use]
    pub fn new(workspace_id: WorkspaceId, resource_id: ResourceId) -> Self {
        Self {
            workspace_id,
            resource_id,
        }
    }
}

impl Step for DeleteResourceMetadataStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "delete_resource_metadata"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::DELETE
    }

    fn do_step(&self, ctx: &FlightServices, _map: &mut WorkingMap) -> StepResult {
        let deleted = ctx
            .resources()
            .delete_resource(self.workspace_id, self.resource_id)?;
        debug!(resource_id = %self.resource_id, deleted, "deleted resource metadata");
        Ok(())
    }

    fn reversible(&self) -> bool {
        false
    }
}

/// Loads the workspace's Azure cloud context into the working map.
pub struct GetAzureCloudContextStep {
    workspace_id: WorkspaceId,
}

impl GetAzureCloudContextStep {
    #[must_use]
    pub fn new(workspace_id: WorkspaceId) -> Self {
        Self { workspace_id }
    }
}

impl Step for GetAzureCloudContextStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "get_azure_cloud_context"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE
            .union(FlightRoles::DELETE)
            .union(FlightRoles::UPDATE)
            .union(FlightRoles::REVOKE_ACCESS)
            .union(FlightRoles::RESTORE_ACCESS)
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        map.azure.cloud_context = Some(ctx.resources().azure_cloud_context(self.workspace_id)?);
        Ok(())
    }
}

/// Loads the workspace's Google project into the working map.
pub struct GetGcpCloudContextStep {
    workspace_id: WorkspaceId,
}

impl GetGcpCloudContextStep {
    #[must_use]
    pub fn new(workspace_id: WorkspaceId) -> Self {
        Self { workspace_id }
    }
}

impl Step for GetGcpCloudContextStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "get_gcp_cloud_context"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE
            .union(FlightRoles::DELETE)
            .union(FlightRoles::UPDATE)
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        map.gcp.cloud_context = Some(ctx.resources().gcp_cloud_context(self.workspace_id)?);
        Ok(())
    }
}

/// Deletes the resource's access policy so nobody can reach it while its
/// cloud objects are torn down.
pub struct DeletePolicyResourceStep {
    resource: ControlledResource,
}

impl DeletePolicyResourceStep {
    #[must_use]
    pub fn new(resource: ControlledResource) -> Self {
        Self { resource }
    }
}

impl Step for DeletePolicyResourceStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "delete_policy_resource"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::DELETE
    }

    fn do_step(&self, ctx: &FlightServices, _map: &mut WorkingMap) -> StepResult {
        let deleted = classify::deleted(ctx.policy().delete_resource_policy(&self.resource))
            .map_err(|e| OperationError::cloud("delete resource policy", e))?;
        if !deleted {
            info!(
                resource_id = %self.resource.resource_id(),
                "resource policy already deleted"
            );
        }
        Ok(())
    }

    fn reversible(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{GCP_PROJECT, TestServices, gcs_bucket_resource};
    use crate::traits::ResourceStore;

    #[test]
    fn store_metadata_is_idempotent_and_undone() -> anyhow::Result<()> {
        let workspace_id = WorkspaceId::new();
        let resource: ControlledResource = gcs_bucket_resource(workspace_id, "bucket-a").into();
        let services = TestServices::new();
        let ctx = services.build();
        let mut map = WorkingMap::new();
        let step = StoreResourceMetadataStep::new(resource.clone());

        step.do_step(&ctx, &mut map).map_err(|f| f.into_error())?;
        step.do_step(&ctx, &mut map).map_err(|f| f.into_error())?;
        assert_eq!(
            services
                .resources
                .get_resource(workspace_id, resource.resource_id())?,
            resource
        );

        step.undo_step(&ctx, &mut map).map_err(|f| f.into_error())?;
        assert!(
            services
                .resources
                .get_resource(workspace_id, resource.resource_id())
                .is_err()
        );
        Ok(())
    }

    #[test]
    fn missing_cloud_context_is_fatal() {
        let services = TestServices::new();
        let ctx = services.build();

        let failure = GetGcpCloudContextStep::new(WorkspaceId::new())
            .do_step(&ctx, &mut WorkingMap::new())
            .expect_err("no context");

        assert!(!failure.is_retry());
    }

    #[test]
    fn cloud_context_lands_in_working_map() -> anyhow::Result<()> {
        let workspace_id = WorkspaceId::new();
        let services = TestServices::new().with_gcp_workspace(workspace_id);
        let ctx = services.build();
        let mut map = WorkingMap::new();

        GetGcpCloudContextStep::new(workspace_id)
            .do_step(&ctx, &mut map)
            .map_err(|f| f.into_error())?;

        assert_eq!(map.gcp_cloud_context()?.project_id, GCP_PROJECT);
        Ok(())
    }

    #[test]
    fn policy_delete_tolerates_already_deleted_policy() {
        let resource: ControlledResource =
            gcs_bucket_resource(WorkspaceId::new(), "bucket-a").into();
        let services = TestServices::new();
        let ctx = services.build();
        let step = DeletePolicyResourceStep::new(resource.clone());

        assert!(step.do_step(&ctx, &mut WorkingMap::new()).is_ok());
        assert!(step.do_step(&ctx, &mut WorkingMap::new()).is_ok());

        assert_eq!(services.policy.deleted_policies(), vec![resource.resource_id()]);
        assert!(!step.reversible());
    }

    #[test]
    fn metadata_delete_of_missing_record_succeeds() {
        let services = TestServices::new();
        let ctx = services.build();

        let step = DeleteResourceMetadataStep::new(WorkspaceId::new(), ResourceId::new());

        assert!(step.do_step(&ctx, &mut WorkingMap::new()).is_ok());
    }
}
