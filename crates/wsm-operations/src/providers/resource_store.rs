use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use wsm_core::{ControlledResource, ResourceId, WorkspaceId};

use crate::Result;
use crate::error::OperationError;
use crate::traits::ResourceStore;
use crate::types::{AzureCloudContext, GcpCloudContext};

type ResourceKey = (WorkspaceId, ResourceId);

/// A [`ResourceStore`] held in memory, in insertion order.
#[derive(Default)]
pub struct InMemoryResourceStore {
    resources: RwLock<IndexMap<ResourceKey, ControlledResource>>,
    azure_contexts: RwLock<HashMap<WorkspaceId, AzureCloudContext>>,
    gcp_contexts: RwLock<HashMap<WorkspaceId, GcpCloudContext>>,
}

impl InMemoryResourceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns an error if the store's lock is poisoned.
    pub fn set_azure_context(
        &self,
        workspace_id: WorkspaceId,
        context: AzureCloudContext,
    ) -> Result<()> {
        self.azure_contexts
            .write()
            .map_err(|_| poisoned())?
            .insert(workspace_id, context);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the store's lock is poisoned.
    pub fn set_gcp_context(
        &self,
        workspace_id: WorkspaceId,
        context: GcpCloudContext,
    ) -> Result<()> {
        self.gcp_contexts
            .write()
            .map_err(|_| poisoned())?
            .insert(workspace_id, context);
        Ok(())
    }

    /// Store a resource, replacing any with the same id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store's lock is poisoned.
    pub fn put_resource(&self, resource: ControlledResource) -> Result<()> {
        self.write_resources()?
            .insert((resource.workspace_id(), resource.resource_id()), resource);
        Ok(())
    }

    /// All resources of a workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if the store's lock is poisoned.
    pub fn list_resources(&self, workspace_id: WorkspaceId) -> Result<Vec<ControlledResource>> {
        Ok(self
            .read_resources()?
            .values()
            .filter(|resource| resource.workspace_id() == workspace_id)
            .cloned()
            .collect())
    }

    fn read_resources(
        &self,
    ) -> Result<RwLockReadGuard<'_, IndexMap<ResourceKey, ControlledResource>>> {
        self.resources.read().map_err(|_| poisoned())
    }

    fn write_resources(
        &self,
    ) -> Result<RwLockWriteGuard<'_, IndexMap<ResourceKey, ControlledResource>>> {
        self.resources.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> OperationError {
    OperationError::Database("resource store lock poisoned".to_string())
}

impl ResourceStore for InMemoryResourceStore {
    fn get_resource(
        &self,
        workspace_id: WorkspaceId,
        resource_id: ResourceId,
    ) -> Result<ControlledResource> {
        self.read_resources()?
            .get(&(workspace_id, resource_id))
            .cloned()
            .ok_or_else(|| {
                OperationError::ResourceNotFound(format!(
                    "resource {resource_id} in workspace {workspace_id}"
                ))
            })
    }

    fn get_resource_by_name(
        &self,
        workspace_id: WorkspaceId,
        name: &str,
    ) -> Result<ControlledResource> {
        self.read_resources()?
            .values()
            .find(|resource| resource.workspace_id() == workspace_id && resource.name() == name)
            .cloned()
            .ok_or_else(|| {
                OperationError::ResourceNotFound(format!(
                    "resource '{name}' in workspace {workspace_id}"
                ))
            })
    }

    fn create_controlled_resource(&self, resource: &ControlledResource) -> Result<()> {
        let mut resources = self.write_resources()?;
        let key = (resource.workspace_id(), resource.resource_id());
        if let Some(existing) = resources.get(&key) {
            if existing == resource {
                return Ok(());
            }
            return Err(OperationError::DuplicateResource(format!(
                "resource {} already exists in workspace {}",
                resource.resource_id(),
                resource.workspace_id()
            )));
        }
        let name_taken = resources.values().any(|existing| {
            existing.workspace_id() == resource.workspace_id() && existing.name() == resource.name()
        });
        if name_taken {
            return Err(OperationError::DuplicateResource(format!(
                "a resource named '{}' already exists in workspace {}",
                resource.name(),
                resource.workspace_id()
            )));
        }
        resources.insert(key, resource.clone());
        Ok(())
    }

    fn delete_resource(&self, workspace_id: WorkspaceId, resource_id: ResourceId) -> Result<bool> {
        Ok(self
            .write_resources()?
            .shift_remove(&(workspace_id, resource_id))
            .is_some())
    }

    fn azure_cloud_context(&self, workspace_id: WorkspaceId) -> Result<AzureCloudContext> {
        self.azure_contexts
            .read()
            .map_err(|_| poisoned())?
            .get(&workspace_id)
            .cloned()
            .ok_or_else(|| {
                OperationError::ResourceNotFound(format!(
                    "azure cloud context of workspace {workspace_id}"
                ))
            })
    }

    fn gcp_cloud_context(&self, workspace_id: WorkspaceId) -> Result<GcpCloudContext> {
        self.gcp_contexts
            .read()
            .map_err(|_| poisoned())?
            .get(&workspace_id)
            .cloned()
            .ok_or_else(|| {
                OperationError::ResourceNotFound(format!(
                    "gcp cloud context of workspace {workspace_id}"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use wsm_core::{GcsBucketResource, ResourceFields};

    use super::*;

    fn bucket(workspace_id: WorkspaceId, name: &str) -> ControlledResource {
        GcsBucketResource {
            common: ResourceFields::new(workspace_id, name),
            bucket_name: format!("{name}-bucket"),
        }
        .into()
    }

    #[test]
    fn create_is_idempotent_for_the_same_resource() -> anyhow::Result<()> {
        let store = InMemoryResourceStore::new();
        let resource = bucket(WorkspaceId::new(), "data");

        store.create_controlled_resource(&resource)?;
        store.create_controlled_resource(&resource)?;

        assert_eq!(store.list_resources(resource.workspace_id())?.len(), 1);
        Ok(())
    }

    #[test]
    fn create_rejects_name_collision() {
        let store = InMemoryResourceStore::new();
        let workspace_id = WorkspaceId::new();
        store
            .create_controlled_resource(&bucket(workspace_id, "data"))
            .expect("first create");

        let result = store.create_controlled_resource(&bucket(workspace_id, "data"));

        assert!(matches!(result, Err(OperationError::DuplicateResource(_))));
    }

    #[test]
    fn lookups_report_not_found() {
        let store = InMemoryResourceStore::new();
        let workspace_id = WorkspaceId::new();

        assert!(matches!(
            store.get_resource(workspace_id, ResourceId::new()),
            Err(OperationError::ResourceNotFound(_))
        ));
        assert!(matches!(
            store.get_resource_by_name(workspace_id, "missing"),
            Err(OperationError::ResourceNotFound(_))
        ));
        assert!(matches!(
            store.azure_cloud_context(workspace_id),
            Err(OperationError::ResourceNotFound(_))
        ));
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() -> anyhow::Result<()> {
        let resource = bucket(WorkspaceId::new(), "data");
        let store = InMemoryResourceStore::new();
        store.put_resource(resource.clone())?;

        assert!(store.delete_resource(resource.workspace_id(), resource.resource_id())?);
        assert!(!store.delete_resource(resource.workspace_id(), resource.resource_id())?);
        Ok(())
    }
}
