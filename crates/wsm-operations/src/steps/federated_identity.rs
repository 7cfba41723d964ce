use std::collections::BTreeMap;

use tracing::{debug, error, info};
use wsm_flight::{FlightRoles, Step};

use super::StepResult;
use crate::Result;
use crate::classify;
use crate::context::FlightServices;
use crate::error::OperationError;
use crate::types::{
    AzureCloudContext, FederatedCredential, ManagedIdentity, ServiceAccount,
    WORKLOAD_IDENTITY_CLIENT_ID_ANNOTATION,
};
use crate::working_map::WorkingMap;

/// Records whether the namespace's federated credential and service account
/// already exist, so a re-run neither recreates nor undoes them.
pub struct GetFederatedIdentityStep {
    namespace: String,
    service_account: String,
}

impl GetFederatedIdentityStep {
    #[must_use]
    pub fn new(namespace: impl Into<String>, service_account: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            service_account: service_account.into(),
        }
    }
}

impl Step for GetFederatedIdentityStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "get_federated_identity"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let cloud = map.azure_cloud_context()?;
        let identity = WorkingMap::require(&map.azure.managed_identity, "azure.managed_identity")?;

        let credential = classify::found(ctx.federated_credentials().get_credential(
            cloud,
            &identity.name,
            &self.namespace,
        ))
        .map_err(|e| OperationError::cloud("get federated credential", e))?;
        let account = classify::found(ctx.kubernetes().get_service_account(
            cloud,
            &self.namespace,
            &self.service_account,
        ))
        .map_err(|e| OperationError::cloud("get kubernetes service account", e))?;

        let exists = credential.is_some() && account.is_some();
        debug!(namespace = %self.namespace, exists, "checked federated identity");
        WorkingMap::set_once(&mut map.azure.federated_identity_exists, exists);
        Ok(())
    }
}

/// Federates the managed identity with the namespace's Kubernetes service
/// account and creates that service account.
pub struct CreateFederatedIdentityStep {
    namespace: String,
    service_account: String,
}

impl CreateFederatedIdentityStep {
    #[must_use]
    pub fn new(namespace: impl Into<String>, service_account: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            service_account: service_account.into(),
        }
    }

    fn service_account_for(&self, identity: &ManagedIdentity) -> ServiceAccount {
        ServiceAccount {
            name: self.service_account.clone(),
            namespace: self.namespace.clone(),
            annotations: BTreeMap::from([(
                WORKLOAD_IDENTITY_CLIENT_ID_ANNOTATION.to_string(),
                identity.client_id.clone(),
            )]),
        }
    }
}

impl Step for CreateFederatedIdentityStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "create_federated_identity"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        if map.azure.federated_identity_exists == Some(true) {
            info!(namespace = %self.namespace, "federated identity already exists");
            return Ok(());
        }
        let cloud = map.azure_cloud_context()?;
        let identity = WorkingMap::require(&map.azure.managed_identity, "azure.managed_identity")?;

        let issuer = ctx
            .kubernetes()
            .oidc_issuer(cloud)
            .map_err(|e| OperationError::cloud("get cluster oidc issuer", e))?;
        let credential = FederatedCredential::for_service_account(
            &issuer,
            &self.namespace,
            &self.service_account,
        );
        ctx.federated_credentials()
            .create_or_update_credential(cloud, &identity.name, &credential)
            .map_err(|e| OperationError::cloud("create federated credential", e))?;

        let account = self.service_account_for(identity);
        let created = classify::created(ctx.kubernetes().create_service_account(cloud, &account))
            .map_err(|e| OperationError::cloud("create kubernetes service account", e))?;
        if created.is_none() {
            debug!(service_account = %self.service_account, "service account already exists");
        }
        info!(
            namespace = %self.namespace,
            identity = %identity.name,
            "federated managed identity with service account"
        );
        Ok(())
    }

    fn undo_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        if map.azure.federated_identity_exists == Some(true) {
            return Ok(());
        }
        let cloud = map.azure_cloud_context()?;
        let Some(identity) = &map.azure.managed_identity else {
            return Ok(());
        };
        if let Err(e) = classify::deleted(ctx.kubernetes().delete_service_account(
            cloud,
            &self.namespace,
            &self.service_account,
        )) {
            error!(
                service_account = %self.service_account,
                error = %e,
                "failed to delete kubernetes service account"
            );
        }
        delete_credential(ctx, cloud, &identity.name, &self.namespace)?;
        Ok(())
    }

    fn undo_description(&self) -> String {
        format!("remove federated identity of namespace '{}'", self.namespace)
    }
}

/// Removes the federated credential and service account of a namespace being
/// deleted. Skipped when the identity no longer exists.
pub struct DeleteFederatedCredentialStep {
    namespace: String,
    service_account: String,
}

impl DeleteFederatedCredentialStep {
    #[must_use]
    pub fn new(namespace: impl Into<String>, service_account: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            service_account: service_account.into(),
        }
    }
}

impl Step for DeleteFederatedCredentialStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "delete_federated_credential"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::DELETE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let cloud = map.azure_cloud_context()?;
        let Some(identity) = &map.azure.managed_identity else {
            info!(
                namespace = %self.namespace,
                "no managed identity, skipping federated credential"
            );
            return Ok(());
        };
        classify::deleted(ctx.kubernetes().delete_service_account(
            cloud,
            &self.namespace,
            &self.service_account,
        ))
        .map_err(|e| OperationError::cloud("delete kubernetes service account", e))?;
        delete_credential(ctx, cloud, &identity.name, &self.namespace)?;
        Ok(())
    }

    fn reversible(&self) -> bool {
        false
    }
}

fn delete_credential(
    ctx: &FlightServices,
    cloud: &AzureCloudContext,
    identity_name: &str,
    credential_name: &str,
) -> Result<()> {
    let deleted = classify::deleted(ctx.federated_credentials().delete_credential(
        cloud,
        identity_name,
        credential_name,
    ))
    .map_err(|e| OperationError::cloud("delete federated credential", e))?;
    if !deleted {
        debug!(credential = %credential_name, "federated credential already deleted");
    }
    Ok(())
}
