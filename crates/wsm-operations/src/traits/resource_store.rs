use wsm_core::{ControlledResource, ResourceId, WorkspaceId};

use crate::Result;
use crate::types::{AzureCloudContext, GcpCloudContext};

/// Controlled resource metadata and workspace cloud contexts.
///
/// Not-found lookups fail with `OperationError::ResourceNotFound`; transient
/// storage failures with `OperationError::Database`.
pub trait ResourceStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the resource does not exist.
    fn get_resource(
        &self,
        workspace_id: WorkspaceId,
        resource_id: ResourceId,
    ) -> Result<ControlledResource>;

    /// # Errors
    ///
    /// Returns an error if no resource in the workspace has that name.
    fn get_resource_by_name(&self, workspace_id: WorkspaceId, name: &str)
    -> Result<ControlledResource>;

    /// Stores a new resource. Storing the same resource again succeeds.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::DuplicateResource` if another resource with
    /// the same id or name exists in the workspace.
    fn create_controlled_resource(&self, resource: &ControlledResource) -> Result<()>;

    /// Returns whether a resource was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn delete_resource(&self, workspace_id: WorkspaceId, resource_id: ResourceId) -> Result<bool>;

    /// # Errors
    ///
    /// Returns an error if the workspace has no Azure cloud context.
    fn azure_cloud_context(&self, workspace_id: WorkspaceId) -> Result<AzureCloudContext>;

    /// # Errors
    ///
    /// Returns an error if the workspace has no GCP cloud context.
    fn gcp_cloud_context(&self, workspace_id: WorkspaceId) -> Result<GcpCloudContext>;
}
