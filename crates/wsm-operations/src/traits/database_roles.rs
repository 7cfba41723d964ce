use wsm_core::WorkspaceId;

use super::CloudResult;
use crate::types::{AzureCloudContext, DatabaseAccess, NamespaceRoleRequest};

/// Runs database administration jobs against the workspace's database server.
pub trait DatabaseRoleRunner: Send + Sync {
    /// Creates a login role for a managed identity and grants it the listed databases.
    ///
    /// # Errors
    ///
    /// Returns an error if the job fails. Creating a role that already exists succeeds.
    fn create_namespace_role(
        &self,
        cloud: &AzureCloudContext,
        request: &NamespaceRoleRequest,
    ) -> CloudResult<()>;

    /// # Errors
    ///
    /// Returns a 404 error if the role does not exist.
    fn delete_namespace_role(
        &self,
        cloud: &AzureCloudContext,
        workspace_id: WorkspaceId,
        role_name: &str,
    ) -> CloudResult<()>;

    /// Revokes or restores the role's ability to log in.
    ///
    /// # Errors
    ///
    /// Returns an error if the job fails.
    fn set_namespace_role_access(
        &self,
        cloud: &AzureCloudContext,
        workspace_id: WorkspaceId,
        role_name: &str,
        access: DatabaseAccess,
    ) -> CloudResult<()>;
}
