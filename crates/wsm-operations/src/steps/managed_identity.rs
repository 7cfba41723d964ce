use tracing::{debug, info, warn};
use wsm_core::{ControlledResource, ManagedIdentityResource, ResourceFields, ResourceId};
use wsm_flight::{FlightRoles, Step};

use super::StepResult;
use crate::Result;
use crate::classify;
use crate::context::FlightServices;
use crate::error::OperationError;
use crate::types::{AzureCloudContext, CloneDestination, ManagedIdentity, ownership_tags};
use crate::working_map::WorkingMap;

/// Fails the flight if an identity with the target name already exists and
/// belongs to some other resource.
pub struct GetAzureManagedIdentityStep {
    resource: ManagedIdentityResource,
}

impl GetAzureManagedIdentityStep {
    #[must_use]
    pub fn new(resource: ManagedIdentityResource) -> Self {
        Self { resource }
    }
}

impl Step for GetAzureManagedIdentityStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "get_azure_managed_identity"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let cloud = map.azure_cloud_context()?;
        let name = &self.resource.managed_identity_name;
        let existing = classify::found(ctx.identities().get_identity(cloud, name))
            .map_err(|e| OperationError::cloud("get managed identity", e))?;
        match existing {
            None => Ok(()),
            Some(identity)
                if identity.is_owned_by(
                    self.resource.common.workspace_id,
                    self.resource.common.resource_id,
                ) =>
            {
                debug!(identity = %name, "managed identity already created by this resource");
                Ok(())
            }
            Some(_) => Err(OperationError::DuplicateResource(format!(
                "managed identity '{name}' already exists"
            ))
            .into()),
        }
    }
}

/// Creates the managed identity, tagged with its workspace and resource ids.
pub struct CreateAzureManagedIdentityStep {
    resource: ManagedIdentityResource,
}

impl CreateAzureManagedIdentityStep {
    #[must_use]
    pub fn new(resource: ManagedIdentityResource) -> Self {
        Self { resource }
    }
}

impl Step for CreateAzureManagedIdentityStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "create_azure_managed_identity"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let cloud = map.azure_cloud_context()?;
        create_owned_identity(ctx, cloud, &self.resource)?;
        Ok(())
    }

    fn undo_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let cloud = map.azure_cloud_context()?;
        delete_identity(ctx, cloud, &self.resource.managed_identity_name)?;
        Ok(())
    }

    fn undo_description(&self) -> String {
        format!(
            "delete managed identity '{}'",
            self.resource.managed_identity_name
        )
    }
}

/// Deletes the managed identity. There is no way to bring it back.
pub struct DeleteAzureManagedIdentityStep {
    resource: ManagedIdentityResource,
}

impl DeleteAzureManagedIdentityStep {
    #[must_use]
    pub fn new(resource: ManagedIdentityResource) -> Self {
        Self { resource }
    }
}

impl Step for DeleteAzureManagedIdentityStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "delete_azure_managed_identity"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::DELETE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let cloud = map.azure_cloud_context()?;
        delete_identity(ctx, cloud, &self.resource.managed_identity_name)?;
        Ok(())
    }

    fn reversible(&self) -> bool {
        false
    }
}

/// Copies a managed identity's definition into another workspace: a new
/// identity with a name derived from the destination resource id, plus its
/// metadata record.
pub struct CopyAzureManagedIdentityDefinitionStep {
    source: ManagedIdentityResource,
    destination: CloneDestination,
}

impl CopyAzureManagedIdentityDefinitionStep {
    #[must_use]
    pub fn new(source: ManagedIdentityResource, destination: CloneDestination) -> Self {
        Self {
            source,
            destination,
        }
    }

    fn destination_resource(&self) -> ManagedIdentityResource {
        let source = &self.source.common;
        ManagedIdentityResource {
            common: ResourceFields {
                workspace_id: self.destination.workspace_id,
                resource_id: self.destination.resource_id,
                name: self
                    .destination
                    .name
                    .clone()
                    .unwrap_or_else(|| source.name.clone()),
                description: self
                    .destination
                    .description
                    .clone()
                    .or_else(|| source.description.clone()),
                region: source.region.clone(),
                access_scope: source.access_scope,
                assigned_user: source.assigned_user.clone(),
                created_by: source.created_by.clone(),
            },
            managed_identity_name: cloned_identity_name(self.destination.resource_id),
        }
    }
}

/// Azure name of a cloned identity. Deterministic so a re-run finds the
/// identity an earlier attempt created.
fn cloned_identity_name(resource_id: ResourceId) -> String {
    format!("id{resource_id}")
}

impl Step for CopyAzureManagedIdentityDefinitionStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "copy_azure_managed_identity_definition"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CLONE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let destination = self.destination_resource();
        let cloud = ctx
            .resources()
            .azure_cloud_context(self.destination.workspace_id)?;
        let record = ControlledResource::from(destination.clone());
        record.validate().map_err(OperationError::from)?;
        ctx.resources().create_controlled_resource(&record)?;
        create_owned_identity(ctx, &cloud, &destination)?;
        info!(
            source = %self.source.common.resource_id,
            destination = %self.destination.resource_id,
            identity = %destination.managed_identity_name,
            "cloned managed identity"
        );
        map.clone.destination = Some(record);
        Ok(())
    }

    fn undo_step(&self, ctx: &FlightServices, _map: &mut WorkingMap) -> StepResult {
        let workspace_id = self.destination.workspace_id;
        let cloud = ctx.resources().azure_cloud_context(workspace_id)?;
        delete_identity(
            ctx,
            &cloud,
            &cloned_identity_name(self.destination.resource_id),
        )?;
        ctx.resources()
            .delete_resource(workspace_id, self.destination.resource_id)?;
        Ok(())
    }

    fn undo_description(&self) -> String {
        format!(
            "delete cloned managed identity {}",
            self.destination.resource_id
        )
    }
}

/// Create an identity, treating a 409 as success when the existing identity
/// carries this resource's ownership tags.
fn create_owned_identity(
    ctx: &FlightServices,
    cloud: &AzureCloudContext,
    resource: &ManagedIdentityResource,
) -> Result<ManagedIdentity> {
    let name = &resource.managed_identity_name;
    let workspace_id = resource.common.workspace_id;
    let resource_id = resource.common.resource_id;
    let region = resource.common.region.as_deref().unwrap_or_default();
    let tags = ownership_tags(workspace_id, resource_id);

    let created = classify::created(ctx.identities().create_identity(cloud, name, region, &tags))
        .map_err(|e| OperationError::cloud("create managed identity", e))?;
    if let Some(identity) = created {
        debug!(identity = %name, principal_id = %identity.principal_id, "created managed identity");
        return Ok(identity);
    }

    let existing = ctx
        .identities()
        .get_identity(cloud, name)
        .map_err(|e| OperationError::cloud("get managed identity", e))?;
    if existing.is_owned_by(workspace_id, resource_id) {
        warn!(identity = %name, "managed identity already exists, created by an earlier attempt");
        Ok(existing)
    } else {
        Err(OperationError::DuplicateResource(format!(
            "managed identity '{name}' already exists"
        )))
    }
}

fn delete_identity(ctx: &FlightServices, cloud: &AzureCloudContext, name: &str) -> Result<()> {
    let deleted = classify::deleted(ctx.identities().delete_identity(cloud, name))
        .map_err(|e| OperationError::cloud("delete managed identity", e))?;
    if !deleted {
        info!(identity = %name, "managed identity already deleted");
    }
    Ok(())
}
