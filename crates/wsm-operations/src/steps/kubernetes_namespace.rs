use std::collections::BTreeMap;

use tracing::{debug, info};
use wsm_core::{ResourceId, WorkspaceId};
use wsm_flight::{FlightRoles, Step};

use super::StepResult;
use crate::Result;
use crate::classify;
use crate::context::FlightServices;
use crate::error::OperationError;
use crate::polling::poll_until;
use crate::types::{AzureCloudContext, KubernetesNamespace};
use crate::working_map::WorkingMap;

const WORKSPACE_ID_LABEL: &str = "workspace-manager/workspace-id";
const RESOURCE_ID_LABEL: &str = "workspace-manager/resource-id";

/// Fails the flight if the namespace name is already in use on the cluster.
pub struct KubernetesNamespaceGuardStep {
    namespace: String,
}

impl KubernetesNamespaceGuardStep {
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

impl Step for KubernetesNamespaceGuardStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "kubernetes_namespace_guard"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let cloud = map.azure_cloud_context()?;
        let existing = classify::found(ctx.kubernetes().get_namespace(cloud, &self.namespace))
            .map_err(|e| OperationError::cloud("get kubernetes namespace", e))?;
        if existing.is_some() {
            return Err(OperationError::DuplicateResource(format!(
                "kubernetes namespace '{}' already exists",
                self.namespace
            ))
            .into());
        }
        Ok(())
    }
}

/// Creates the namespace, labelled with its workspace and resource.
pub struct CreateKubernetesNamespaceStep {
    namespace: String,
    workspace_id: WorkspaceId,
    resource_id: ResourceId,
}

impl CreateKubernetesNamespaceStep {
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        workspace_id: WorkspaceId,
        resource_id: ResourceId,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            workspace_id,
            resource_id,
        }
    }
}

impl Step for CreateKubernetesNamespaceStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "create_kubernetes_namespace"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let cloud = map.azure_cloud_context()?;
        let namespace = KubernetesNamespace {
            name: self.namespace.clone(),
            labels: BTreeMap::from([
                (WORKSPACE_ID_LABEL.to_string(), self.workspace_id.to_string()),
                (RESOURCE_ID_LABEL.to_string(), self.resource_id.to_string()),
            ]),
        };
        let created = classify::created(ctx.kubernetes().create_namespace(cloud, &namespace))
            .map_err(|e| OperationError::cloud("create kubernetes namespace", e))?;
        if created.is_some() {
            info!(namespace = %self.namespace, "created kubernetes namespace");
        } else {
            debug!(namespace = %self.namespace, "kubernetes namespace already exists");
        }
        Ok(())
    }

    fn undo_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let cloud = map.azure_cloud_context()?;
        delete_namespace(ctx, cloud, &self.namespace)?;
        Ok(())
    }

    fn undo_description(&self) -> String {
        format!("delete kubernetes namespace '{}'", self.namespace)
    }
}

/// Deletes the namespace and waits until the cluster has removed it.
pub struct DeleteKubernetesNamespaceStep {
    namespace: String,
}

impl DeleteKubernetesNamespaceStep {
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

impl Step for DeleteKubernetesNamespaceStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "delete_kubernetes_namespace"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::DELETE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let cloud = map.azure_cloud_context()?;
        delete_namespace(ctx, cloud, &self.namespace)?;
        Ok(())
    }

    fn reversible(&self) -> bool {
        false
    }
}

fn delete_namespace(ctx: &FlightServices, cloud: &AzureCloudContext, name: &str) -> Result<()> {
    let deleted = match ctx.kubernetes().delete_namespace(cloud, name) {
        Err(e) if e.is_conflict() => {
            debug!(namespace = %name, "kubernetes namespace is already terminating");
            true
        }
        result => classify::deleted(result)
            .map_err(|e| OperationError::cloud("delete kubernetes namespace", e))?,
    };
    if !deleted {
        debug!(namespace = %name, "kubernetes namespace already deleted");
        return Ok(());
    }
    poll_until(
        ctx.sleeper(),
        ctx.settings().namespace_delete(),
        "delete kubernetes namespace",
        || {
            let remaining = classify::found(ctx.kubernetes().get_namespace(cloud, name))
                .map_err(|e| OperationError::cloud("get kubernetes namespace", e))?;
            Ok(remaining.is_none())
        },
    )?;
    info!(namespace = %name, "deleted kubernetes namespace");
    Ok(())
}

#[cfg(test)]
mod tests {
    use wsm_core::WorkspaceId;

    use super::*;
    use crate::mocks::{TestServices, azure_context};
    use crate::traits::KubernetesClient;

    #[test]
    fn guard_rejects_existing_namespace() -> anyhow::Result<()> {
        let services = TestServices::new();
        let ctx = services.build();
        let mut map = services.azure_map();
        let guard = KubernetesNamespaceGuardStep::new("ns-a");

        guard.do_step(&ctx, &mut map).map_err(|f| f.into_error())?;

        CreateKubernetesNamespaceStep::new("ns-a", WorkspaceId::new(), ResourceId::new())
            .do_step(&ctx, &mut map)
            .map_err(|f| f.into_error())?;
        let failure = guard.do_step(&ctx, &mut map).expect_err("namespace exists");
        assert!(matches!(
            failure.error(),
            OperationError::DuplicateResource(_)
        ));
        Ok(())
    }

    #[test]
    fn create_is_idempotent_and_labels_namespace() -> anyhow::Result<()> {
        let services = TestServices::new();
        let ctx = services.build();
        let workspace_id = WorkspaceId::new();
        let mut map = services.azure_map();
        let step = CreateKubernetesNamespaceStep::new("ns-a", workspace_id, ResourceId::new());

        step.do_step(&ctx, &mut map).map_err(|f| f.into_error())?;
        step.do_step(&ctx, &mut map).map_err(|f| f.into_error())?;

        let namespace = services.kubernetes.namespace("ns-a").expect("created");
        assert_eq!(
            namespace.labels.get(WORKSPACE_ID_LABEL),
            Some(&workspace_id.to_string())
        );
        Ok(())
    }

    #[test]
    fn delete_waits_for_namespace_to_disappear() -> anyhow::Result<()> {
        let services = TestServices::new();
        services.kubernetes.linger_after_delete(2);
        let ctx = services.build();
        let mut map = services.azure_map();
        CreateKubernetesNamespaceStep::new("ns-a", WorkspaceId::new(), ResourceId::new())
            .do_step(&ctx, &mut map)
            .map_err(|f| f.into_error())?;

        DeleteKubernetesNamespaceStep::new("ns-a")
            .do_step(&ctx, &mut map)
            .map_err(|f| f.into_error())?;

        assert!(services.kubernetes.namespace("ns-a").is_none());
        assert_eq!(services.sleeper.sleep_count(), 2);
        Ok(())
    }

    #[test]
    fn delete_of_missing_namespace_succeeds() {
        let services = TestServices::new();
        let ctx = services.build();
        let mut map = services.azure_map();

        assert!(
            DeleteKubernetesNamespaceStep::new("never-created")
                .do_step(&ctx, &mut map)
                .is_ok()
        );
        assert_eq!(services.sleeper.sleep_count(), 0);
    }

    #[test]
    fn delete_resumes_polling_when_namespace_is_terminating() -> anyhow::Result<()> {
        let services = TestServices::new();
        services.kubernetes.linger_after_delete(2);
        let ctx = services.build();
        let mut map = services.azure_map();
        CreateKubernetesNamespaceStep::new("ns-a", WorkspaceId::new(), ResourceId::new())
            .do_step(&ctx, &mut map)
            .map_err(|f| f.into_error())?;
        services
            .kubernetes
            .delete_namespace(&azure_context(), "ns-a")?;

        DeleteKubernetesNamespaceStep::new("ns-a")
            .do_step(&ctx, &mut map)
            .map_err(|f| f.into_error())?;

        assert!(services.kubernetes.namespace("ns-a").is_none());
        assert_eq!(services.sleeper.sleep_count(), 2);
        Ok(())
    }
}
