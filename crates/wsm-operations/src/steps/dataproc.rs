use std::collections::BTreeMap;

use tracing::{debug, info, warn};
use wsm_core::{ControlledResource, DataprocClusterResource, ResourceId, WorkspaceId};
use wsm_flight::{FlightRoles, Step};

use super::{StepResult, user_email};
use crate::Result;
use crate::classify;
use crate::context::FlightServices;
use crate::error::OperationError;
use crate::polling::wait_for_dataproc_operation;
use crate::types::{
    ClusterAttributes, ClusterName, ClusterPatch, ClusterSpec, ClusterState,
    DataprocClusterCreationParameters, FlightUser,
};
use crate::working_map::WorkingMap;

fn cluster_name(resource: &DataprocClusterResource) -> ClusterName {
    ClusterName {
        project_id: resource.project_id.clone(),
        region: resource.region().to_string(),
        cluster_id: resource.cluster_id.clone(),
    }
}

/// Lets the flight's user act as their pet service account, which the
/// cluster runs as.
pub struct GrantPetUsagePermissionStep {
    workspace_id: WorkspaceId,
    user: FlightUser,
}

impl GrantPetUsagePermissionStep {
    #[must_use]
    pub fn new(workspace_id: WorkspaceId, user: FlightUser) -> Self {
        Self { workspace_id, user }
    }
}

impl Step for GrantPetUsagePermissionStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "grant_pet_usage_permission"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let email = user_email(ctx, &self.user)?;
        let granted = ctx
            .policy()
            .enable_pet_impersonation(self.workspace_id, &email)
            .map_err(|e| OperationError::cloud("grant pet usage permission", e))?;
        // A retried attempt sees the grant as already present; keep the first answer.
        WorkingMap::set_once(&mut map.gcp.pet_permission_granted, granted);
        Ok(())
    }

    fn undo_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        if map.gcp.pet_permission_granted != Some(true) {
            return Ok(());
        }
        let email = user_email(ctx, &self.user)?;
        ctx.policy()
            .disable_pet_impersonation(self.workspace_id, &email)
            .map_err(|e| OperationError::cloud("revoke pet usage permission", e))?;
        Ok(())
    }

    fn undo_description(&self) -> String {
        "revoke pet usage permission".to_string()
    }
}

/// Creates the cluster and waits for the creation operation to finish.
pub struct CreateDataprocClusterStep {
    resource: DataprocClusterResource,
    parameters: DataprocClusterCreationParameters,
    user: FlightUser,
}

impl CreateDataprocClusterStep {
    #[must_use]
    pub fn new(
        resource: DataprocClusterResource,
        parameters: DataprocClusterCreationParameters,
        user: FlightUser,
    ) -> Self {
        Self {
            resource,
            parameters,
            user,
        }
    }

    fn bucket_name(&self, ctx: &FlightServices, bucket: ResourceId) -> Result<String> {
        let resource = ctx
            .resources()
            .get_resource(self.resource.common.workspace_id, bucket)?;
        Ok(resource.as_gcs_bucket()?.bucket_name.clone())
    }

    fn spec(&self, ctx: &FlightServices, map: &WorkingMap) -> Result<ClusterSpec> {
        let subnetwork = WorkingMap::require(&map.gcp.subnetwork, "gcp.subnetwork")?;
        let email = user_email(ctx, &self.user)?;
        let service_account = ctx
            .policy()
            .pet_service_account(self.resource.common.workspace_id, &email)
            .map_err(|e| OperationError::cloud("get pet service account", e))?;
        Ok(ClusterSpec {
            name: cluster_name(&self.resource),
            subnetwork: subnetwork.name.clone(),
            service_account,
            config_bucket: self.bucket_name(ctx, self.parameters.config_bucket)?,
            temp_bucket: self.bucket_name(ctx, self.parameters.temp_bucket)?,
            parameters: self.parameters.clone(),
            labels: BTreeMap::from([
                (
                    "workspace-id".to_string(),
                    self.resource.common.workspace_id.to_string(),
                ),
                (
                    "resource-id".to_string(),
                    self.resource.common.resource_id.to_string(),
                ),
            ]),
        })
    }
}

impl Step for CreateDataprocClusterStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "create_dataproc_cluster"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let spec = self.spec(ctx, map)?;
        let handle = classify::created(ctx.dataproc().create_cluster(&spec))
            .map_err(|e| OperationError::cloud("create dataproc cluster", e))?;
        let Some(handle) = handle else {
            debug!(cluster = %spec.name, "dataproc cluster already created");
            return Ok(());
        };
        wait_for_dataproc_operation(
            ctx.dataproc(),
            ctx.sleeper(),
            ctx.settings().dataproc_create(),
            &handle,
            "create dataproc cluster",
        )?;
        info!(cluster = %spec.name, "created dataproc cluster");
        Ok(())
    }

    fn undo_step(&self, ctx: &FlightServices, _map: &mut WorkingMap) -> StepResult {
        delete_cluster(ctx, &cluster_name(&self.resource))?;
        Ok(())
    }

    fn undo_description(&self) -> String {
        format!("delete dataproc cluster '{}'", self.resource.cluster_id)
    }
}

/// Grants the cluster's policy bindings on the cluster's IAM policy.
pub struct DataprocClusterCloudSyncStep {
    resource: DataprocClusterResource,
}

impl DataprocClusterCloudSyncStep {
    #[must_use]
    pub fn new(resource: DataprocClusterResource) -> Self {
        Self { resource }
    }
}

impl Step for DataprocClusterCloudSyncStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "dataproc_cluster_cloud_sync"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE
    }

    fn do_step(&self, ctx: &FlightServices, _map: &mut WorkingMap) -> StepResult {
        let name = cluster_name(&self.resource);
        let bindings = ctx
            .policy()
            .resource_role_bindings(&ControlledResource::from(self.resource.clone()))
            .map_err(|e| OperationError::cloud("read resource role bindings", e))?;
        let mut policy = ctx
            .dataproc()
            .get_iam_policy(&name)
            .map_err(|e| OperationError::cloud("get cluster iam policy", e))?;
        if !policy.merge(&bindings) {
            debug!(cluster = %name, "cluster iam policy already in sync");
            return Ok(());
        }
        ctx.dataproc()
            .set_iam_policy(&name, &policy)
            .map_err(|e| OperationError::cloud("set cluster iam policy", e))?;
        info!(cluster = %name, roles = bindings.len(), "synced cluster iam policy");
        Ok(())
    }
}

/// Deletes the cluster and waits for the deletion operation.
pub struct DeleteDataprocClusterStep {
    resource: DataprocClusterResource,
}

impl DeleteDataprocClusterStep {
    #[must_use]
    pub fn new(resource: DataprocClusterResource) -> Self {
        Self { resource }
    }
}

impl Step for DeleteDataprocClusterStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "delete_dataproc_cluster"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::DELETE
    }

    fn do_step(&self, ctx: &FlightServices, _map: &mut WorkingMap) -> StepResult {
        delete_cluster(ctx, &cluster_name(&self.resource))?;
        Ok(())
    }

    fn reversible(&self) -> bool {
        false
    }
}

/// Fails an update unless the cluster is running.
pub struct ValidateDataprocClusterStep {
    resource: DataprocClusterResource,
}

impl ValidateDataprocClusterStep {
    #[must_use]
    pub fn new(resource: DataprocClusterResource) -> Self {
        Self { resource }
    }
}

impl Step for ValidateDataprocClusterStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "validate_dataproc_cluster"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::UPDATE
    }

    fn do_step(&self, ctx: &FlightServices, _map: &mut WorkingMap) -> StepResult {
        let name = cluster_name(&self.resource);
        let cluster = ctx
            .dataproc()
            .get_cluster(&name)
            .map_err(|e| OperationError::cloud("get dataproc cluster", e))?;
        if cluster.state != ClusterState::Running {
            return Err(OperationError::ClusterNotRunning {
                cluster: name.to_string(),
                state: cluster.state.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Captures the cluster's current attributes for the update's undo.
pub struct RetrieveDataprocClusterAttributesStep {
    resource: DataprocClusterResource,
}

impl RetrieveDataprocClusterAttributesStep {
    #[must_use]
    pub fn new(resource: DataprocClusterResource) -> Self {
        Self { resource }
    }
}

impl Step for RetrieveDataprocClusterAttributesStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "retrieve_dataproc_cluster_attributes"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::UPDATE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let cluster = ctx
            .dataproc()
            .get_cluster(&cluster_name(&self.resource))
            .map_err(|e| OperationError::cloud("get dataproc cluster", e))?;
        WorkingMap::set_once(&mut map.update.previous_cluster, cluster.attributes);
        Ok(())
    }
}

/// Patches the cluster with the requested attributes.
pub struct UpdateDataprocClusterStep {
    resource: DataprocClusterResource,
    update: ClusterAttributes,
}

impl UpdateDataprocClusterStep {
    #[must_use]
    pub fn new(resource: DataprocClusterResource, update: ClusterAttributes) -> Self {
        Self { resource, update }
    }

    fn patch(
        &self,
        ctx: &FlightServices,
        patch: &ClusterPatch,
        operation: &'static str,
    ) -> Result<()> {
        let name = cluster_name(&self.resource);
        let handle = ctx
            .dataproc()
            .update_cluster(&name, patch)
            .map_err(|e| OperationError::cloud(operation, e))?;
        wait_for_dataproc_operation(
            ctx.dataproc(),
            ctx.sleeper(),
            ctx.settings().dataproc_create(),
            &handle,
            operation,
        )?;
        info!(cluster = %name, fields = ?patch.update_mask, "patched dataproc cluster");
        Ok(())
    }
}

impl Step for UpdateDataprocClusterStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "update_dataproc_cluster"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::UPDATE
    }

    fn do_step(&self, ctx: &FlightServices, _map: &mut WorkingMap) -> StepResult {
        let patch = ClusterPatch::from_attributes(self.update.clone());
        if patch.is_empty() {
            debug!(cluster = %self.resource.cluster_id, "nothing to update");
            return Ok(());
        }
        self.patch(ctx, &patch, "update dataproc cluster")?;
        Ok(())
    }

    fn undo_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let applied = ClusterPatch::from_attributes(self.update.clone());
        if applied.is_empty() {
            return Ok(());
        }
        let previous =
            WorkingMap::require(&map.update.previous_cluster, "update.previous_cluster")?;
        let restore = ClusterPatch::restoring(previous, &applied);
        self.patch(ctx, &restore, "restore dataproc cluster")?;
        Ok(())
    }

    fn undo_description(&self) -> String {
        format!("restore attributes of cluster '{}'", self.resource.cluster_id)
    }
}

fn delete_cluster(ctx: &FlightServices, name: &ClusterName) -> Result<()> {
    let handle = classify::found(ctx.dataproc().delete_cluster(name))
        .map_err(|e| OperationError::cloud("delete dataproc cluster", e))?;
    let Some(handle) = handle else {
        warn!(cluster = %name, "dataproc cluster already deleted");
        return Ok(());
    };
    wait_for_dataproc_operation(
        ctx.dataproc(),
        ctx.sleeper(),
        ctx.settings().dataproc_delete(),
        &handle,
        "delete dataproc cluster",
    )?;
    info!(cluster = %name, "deleted dataproc cluster");
    Ok(())
}
