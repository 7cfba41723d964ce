use tracing::{debug, info};
use wsm_core::{ManagedIdentityResource, ResourceId, WorkspaceId};
use wsm_flight::{FlightRoles, Step};

use super::StepResult;
use crate::Result;
use crate::classify;
use crate::context::FlightServices;
use crate::error::OperationError;
use crate::types::{ManagedIdentity, MissingIdentityBehavior};
use crate::working_map::WorkingMap;

/// Resolves a workspace managed identity (by resource id or resource name)
/// and stores its Azure principal in the working map.
pub struct GetWorkspaceManagedIdentityStep {
    workspace_id: WorkspaceId,
    identity: String,
    behavior: MissingIdentityBehavior,
}

impl GetWorkspaceManagedIdentityStep {
    #[must_use]
    pub fn new(
        workspace_id: WorkspaceId,
        identity: impl Into<String>,
        behavior: MissingIdentityBehavior,
    ) -> Self {
        Self {
            workspace_id,
            identity: identity.into(),
            behavior,
        }
    }

    fn resolve_resource(&self, ctx: &FlightServices) -> Result<Option<ManagedIdentityResource>> {
        let lookup = match self.identity.parse::<ResourceId>() {
            Ok(resource_id) => ctx.resources().get_resource(self.workspace_id, resource_id),
            Err(_) => ctx
                .resources()
                .get_resource_by_name(self.workspace_id, &self.identity),
        };
        match lookup {
            Ok(resource) => Ok(Some(resource.as_managed_identity()?.clone())),
            Err(OperationError::ResourceNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Step for GetWorkspaceManagedIdentityStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "get_workspace_managed_identity"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE.union(FlightRoles::DELETE)
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let identity = match self.resolve_resource(ctx)? {
            Some(resource) => {
                let cloud = map.azure_cloud_context()?;
                classify::found(
                    ctx.identities()
                        .get_identity(cloud, &resource.managed_identity_name),
                )
                .map_err(|e| OperationError::cloud("get managed identity", e))?
            }
            None => None,
        };
        record_identity(
            map,
            identity,
            self.behavior,
            &format!("workspace managed identity '{}'", self.identity),
        )?;
        Ok(())
    }
}

/// Resolves the pet managed identity of the user a private resource belongs to.
pub struct GetPetManagedIdentityStep {
    workspace_id: WorkspaceId,
    user_email: String,
    behavior: MissingIdentityBehavior,
}

impl GetPetManagedIdentityStep {
    #[must_use]
    pub fn new(
        workspace_id: WorkspaceId,
        user_email: impl Into<String>,
        behavior: MissingIdentityBehavior,
    ) -> Self {
        Self {
            workspace_id,
            user_email: user_email.into(),
            behavior,
        }
    }
}

impl Step for GetPetManagedIdentityStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "get_pet_managed_identity"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE.union(FlightRoles::DELETE)
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let identity = classify::found(
            ctx.policy()
                .pet_managed_identity(self.workspace_id, &self.user_email),
        )
        .map_err(|e| OperationError::cloud("get pet managed identity", e))?;
        record_identity(
            map,
            identity,
            self.behavior,
            &format!("pet managed identity of {}", self.user_email),
        )?;
        Ok(())
    }
}

fn record_identity(
    map: &mut WorkingMap,
    identity: Option<ManagedIdentity>,
    behavior: MissingIdentityBehavior,
    description: &str,
) -> Result<()> {
    match (identity, behavior) {
        (Some(identity), _) => {
            debug!(
                identity = %identity.name,
                principal_id = %identity.principal_id,
                "resolved managed identity"
            );
            map.azure.managed_identity = Some(identity);
            Ok(())
        }
        (None, MissingIdentityBehavior::AllowMissing) => {
            info!("{description} no longer exists, nothing to clean up for it");
            map.azure.managed_identity = None;
            Ok(())
        }
        (None, MissingIdentityBehavior::FailOnMissing) => {
            Err(OperationError::ResourceNotFound(description.to_string()))
        }
    }
}
