use tracing::{error, info};
use wsm_core::{
    AccessScope, DatabaseResource, KubernetesNamespaceResource, ResourceId, WorkspaceId,
};
use wsm_flight::{FlightRoles, Step};

use super::StepResult;
use crate::Result;
use crate::classify;
use crate::context::FlightServices;
use crate::error::OperationError;
use crate::types::{DatabaseAccess, NamespaceRoleRequest};
use crate::working_map::WorkingMap;

/// Creates the database role the namespace's managed identity logs in as,
/// after checking the namespace may connect to each requested database.
pub struct CreateNamespaceRoleStep {
    resource: KubernetesNamespaceResource,
}

impl CreateNamespaceRoleStep {
    #[must_use]
    pub fn new(resource: KubernetesNamespaceResource) -> Self {
        Self { resource }
    }

    fn role_name(&self) -> &str {
        &self.resource.kubernetes_service_account
    }

    /// Database names the namespace may connect to, or every reason it may not.
    fn accessible_databases(&self, ctx: &FlightServices) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(self.resource.databases.len());
        let mut refusals = Vec::new();
        for &database_id in &self.resource.databases {
            match self.check_database(ctx, database_id)? {
                Ok(name) => names.push(name),
                Err(reason) => refusals.push(reason),
            }
        }
        if refusals.is_empty() {
            Ok(names)
        } else {
            Err(OperationError::BadRequest(format!(
                "Could not connect to database(s): [{}]",
                refusals.join(", ")
            )))
        }
    }

    /// The outer error is a store failure; the inner one a refusal reason.
    fn check_database(
        &self,
        ctx: &FlightServices,
        database_id: ResourceId,
    ) -> Result<std::result::Result<String, String>> {
        let resource = match ctx
            .resources()
            .get_resource(self.resource.common.workspace_id, database_id)
        {
            Ok(resource) => resource,
            Err(OperationError::ResourceNotFound(_)) => {
                return Ok(Err(format!("Resource {database_id} does not exist")));
            }
            Err(e) => return Err(e),
        };
        let Ok(database) = resource.as_database() else {
            return Ok(Err(format!(
                "Resource {database_id} is not a controlled Azure database"
            )));
        };
        Ok(self
            .may_connect(database)
            .then(|| database.database_name.clone())
            .ok_or_else(|| self.refusal(database)))
    }

    fn may_connect(&self, database: &DatabaseResource) -> bool {
        match database.common.access_scope {
            AccessScope::Private => {
                database.common.assigned_user.is_some()
                    && database.common.assigned_user == self.resource.common.assigned_user
            }
            AccessScope::Shared => {
                database.allow_access_for_all_workspace_users
                    || (database.database_owner.is_some()
                        && database.database_owner == self.resource.managed_identity)
            }
        }
    }

    fn refusal(&self, database: &DatabaseResource) -> String {
        let id = database.common.resource_id;
        match database.common.access_scope {
            AccessScope::Private => {
                format!("Connection to private database {id} is only permitted to assigned user")
            }
            AccessScope::Shared => {
                format!("Connection to database {id} is only permitted to owner identity")
            }
        }
    }
}

impl Step for CreateNamespaceRoleStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "create_namespace_role"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let databases = self.accessible_databases(ctx)?;
        let cloud = map.azure_cloud_context()?;
        let identity = WorkingMap::require(&map.azure.managed_identity, "azure.managed_identity")?;

        let request = NamespaceRoleRequest {
            workspace_id: self.resource.common.workspace_id,
            role_name: self.role_name().to_string(),
            principal_id: identity.principal_id.clone(),
            databases,
        };
        ctx.database_roles()
            .create_namespace_role(cloud, &request)
            .map_err(|e| OperationError::cloud("create namespace role", e))?;
        info!(
            role = %request.role_name,
            databases = ?request.databases,
            "created namespace database role"
        );
        Ok(())
    }

    fn undo_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let cloud = map.azure_cloud_context()?;
        if let Err(e) = ctx.database_roles().delete_namespace_role(
            cloud,
            self.resource.common.workspace_id,
            self.role_name(),
        ) {
            error!(role = %self.role_name(), error = %e, "failed to delete namespace role");
        }
        Ok(())
    }

    fn undo_description(&self) -> String {
        format!("delete namespace role '{}'", self.role_name())
    }
}

/// Drops the namespace's database role.
pub struct DeleteNamespaceRoleStep {
    workspace_id: WorkspaceId,
    role_name: String,
}

impl DeleteNamespaceRoleStep {
    #[must_use]
    pub fn new(workspace_id: WorkspaceId, role_name: impl Into<String>) -> Self {
        Self {
            workspace_id,
            role_name: role_name.into(),
        }
    }
}

impl Step for DeleteNamespaceRoleStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "delete_namespace_role"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::DELETE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let cloud = map.azure_cloud_context()?;
        let deleted = classify::deleted(ctx.database_roles().delete_namespace_role(
            cloud,
            self.workspace_id,
            &self.role_name,
        ))
        .map_err(|e| OperationError::cloud("delete namespace role", e))?;
        if !deleted {
            info!(role = %self.role_name, "namespace role already deleted");
        }
        Ok(())
    }

    fn reversible(&self) -> bool {
        false
    }
}

/// Revokes or restores a namespace role's ability to log in.
pub struct UpdateNamespaceRoleDatabaseAccessStep {
    workspace_id: WorkspaceId,
    role_name: String,
    access: DatabaseAccess,
}

impl UpdateNamespaceRoleDatabaseAccessStep {
    #[must_use]
    pub fn new(
        workspace_id: WorkspaceId,
        role_name: impl Into<String>,
        access: DatabaseAccess,
    ) -> Self {
        Self {
            workspace_id,
            role_name: role_name.into(),
            access,
        }
    }

    fn apply(&self, ctx: &FlightServices, map: &WorkingMap, access: DatabaseAccess) -> Result<()> {
        let cloud = map.azure_cloud_context()?;
        ctx.database_roles()
            .set_namespace_role_access(cloud, self.workspace_id, &self.role_name, access)
            .map_err(|e| OperationError::cloud("update namespace role access", e))?;
        info!(role = %self.role_name, %access, "updated namespace role database access");
        Ok(())
    }
}

impl Step for UpdateNamespaceRoleDatabaseAccessStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "update_namespace_role_database_access"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::REVOKE_ACCESS.union(FlightRoles::RESTORE_ACCESS)
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        self.apply(ctx, map, self.access)?;
        Ok(())
    }

    fn undo_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        self.apply(ctx, map, self.access.opposite())?;
        Ok(())
    }

    fn undo_description(&self) -> String {
        format!(
            "{} database access of role '{}'",
            self.access.opposite(),
            self.role_name
        )
    }
}
