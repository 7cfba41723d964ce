use wsm_core::{
    AccessScope, ControlledResource, CoreError, KubernetesNamespaceResource, ResourceKind,
};

use super::{PlannedStep, ResourcePlanner, planned};
use crate::Result;
use crate::context::OperationSettings;
use crate::steps::{
    CreateFederatedIdentityStep, CreateKubernetesNamespaceStep, CreateNamespaceRoleStep,
    DeleteFederatedCredentialStep, DeleteKubernetesNamespaceStep, DeleteNamespaceRoleStep,
    GetAzureCloudContextStep, GetFederatedIdentityStep, GetPetManagedIdentityStep,
    GetWorkspaceManagedIdentityStep, KubernetesNamespaceGuardStep,
    UpdateNamespaceRoleDatabaseAccessStep,
};
use crate::types::{DatabaseAccess, FlightInputs, MissingIdentityBehavior};

/// Namespaces on the workspace's shared Kubernetes cluster.
///
/// A private namespace runs as its user's pet identity, a shared one as the
/// workspace identity it names. Either identity is federated with the
/// namespace's service account, and the service account's database role is
/// granted to every database the namespace declares.
pub struct KubernetesNamespacePlanner;

impl KubernetesNamespacePlanner {
    fn identity_step(
        namespace: &KubernetesNamespaceResource,
        behavior: MissingIdentityBehavior,
        settings: &OperationSettings,
    ) -> Result<Option<PlannedStep>> {
        let workspace_id = namespace.common.workspace_id;
        let step = match namespace.common.access_scope {
            AccessScope::Private => {
                let user = namespace
                    .common
                    .assigned_user
                    .clone()
                    .ok_or(CoreError::MissingField {
                        field: "assigned_user",
                    })?;
                planned(
                    GetPetManagedIdentityStep::new(workspace_id, user, behavior),
                    settings.cloud_retry(),
                )
            }
            AccessScope::Shared => match &namespace.managed_identity {
                Some(identity) => planned(
                    GetWorkspaceManagedIdentityStep::new(workspace_id, identity.clone(), behavior),
                    settings.cloud_retry(),
                ),
                None => return Ok(None),
            },
        };
        Ok(Some(step))
    }

    fn access_steps(
        resource: &ControlledResource,
        access: DatabaseAccess,
        settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        let namespace = resource.as_kubernetes_namespace()?;
        if !namespace.requires_databases() {
            return Ok(Vec::new());
        }
        let workspace_id = namespace.common.workspace_id;
        Ok(vec![
            planned(
                GetAzureCloudContextStep::new(workspace_id),
                settings.short_database_retry(),
            ),
            planned(
                UpdateNamespaceRoleDatabaseAccessStep::new(
                    workspace_id,
                    namespace.kubernetes_service_account.clone(),
                    access,
                ),
                settings.cloud_retry(),
            ),
        ])
    }
}

impl ResourcePlanner for KubernetesNamespacePlanner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::KubernetesNamespace
    }

    fn create_steps(
        &self,
        resource: &ControlledResource,
        _inputs: &FlightInputs,
        settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        let namespace = resource.as_kubernetes_namespace()?;
        let name = &namespace.kubernetes_namespace;
        let service_account = &namespace.kubernetes_service_account;
        let mut steps = vec![
            planned(
                KubernetesNamespaceGuardStep::new(name.clone()),
                settings.cloud_retry(),
            ),
            planned(
                CreateKubernetesNamespaceStep::new(
                    name.clone(),
                    namespace.common.workspace_id,
                    namespace.common.resource_id,
                ),
                settings.cloud_retry(),
            ),
        ];

        if let Some(identity) =
            Self::identity_step(namespace, MissingIdentityBehavior::FailOnMissing, settings)?
        {
            steps.push(identity);
            steps.push(planned(
                GetFederatedIdentityStep::new(name.clone(), service_account.clone()),
                settings.cloud_retry(),
            ));
            steps.push(planned(
                CreateFederatedIdentityStep::new(name.clone(), service_account.clone()),
                settings.cloud_retry(),
            ));
        }

        if namespace.requires_databases() {
            steps.push(planned(
                CreateNamespaceRoleStep::new(namespace.clone()),
                settings.cloud_retry(),
            ));
        }
        Ok(steps)
    }

    fn delete_steps(
        &self,
        resource: &ControlledResource,
        _inputs: &FlightInputs,
        settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        let namespace = resource.as_kubernetes_namespace()?;
        let name = &namespace.kubernetes_namespace;
        let service_account = &namespace.kubernetes_service_account;
        let mut steps = vec![planned(
            DeleteKubernetesNamespaceStep::new(name.clone()),
            settings.cloud_retry(),
        )];

        // The identity may already be gone; its credential is then skipped.
        if let Some(identity) =
            Self::identity_step(namespace, MissingIdentityBehavior::AllowMissing, settings)?
        {
            steps.push(identity);
            steps.push(planned(
                DeleteFederatedCredentialStep::new(name.clone(), service_account.clone()),
                settings.cloud_retry(),
            ));
        }

        if namespace.requires_databases() {
            steps.push(planned(
                DeleteNamespaceRoleStep::new(
                    namespace.common.workspace_id,
                    service_account.clone(),
                ),
                settings.cloud_retry(),
            ));
        }
        Ok(steps)
    }

    fn revoke_access_steps(
        &self,
        resource: &ControlledResource,
        settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        Self::access_steps(resource, DatabaseAccess::Revoke, settings)
    }

    fn restore_access_steps(
        &self,
        resource: &ControlledResource,
        settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        Self::access_steps(resource, DatabaseAccess::Restore, settings)
    }
}
