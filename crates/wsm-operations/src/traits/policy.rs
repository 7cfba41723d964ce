use indexmap::IndexMap;
use wsm_core::{ControlledResource, WorkspaceId};

use super::CloudResult;
use crate::types::ManagedIdentity;

/// The authorization service: users' pet identities and the access policies
/// of controlled resources.
pub trait PolicyOracle: Send + Sync {
    /// # Errors
    ///
    /// Returns a 404 error if the subject is unknown.
    fn email_for_subject(&self, subject_id: &str) -> CloudResult<String>;

    /// The Azure pet managed identity of a user in a workspace.
    ///
    /// # Errors
    ///
    /// Returns a 404 error if the user has no pet identity.
    fn pet_managed_identity(
        &self,
        workspace_id: WorkspaceId,
        user_email: &str,
    ) -> CloudResult<ManagedIdentity>;

    /// The Google pet service account of a user in a workspace.
    ///
    /// # Errors
    ///
    /// Returns an error if the pet cannot be resolved.
    fn pet_service_account(&self, workspace_id: WorkspaceId, user_email: &str)
    -> CloudResult<String>;

    /// Lets the user act as their pet service account. Returns whether the
    /// permission was newly granted.
    ///
    /// # Errors
    ///
    /// Returns an error if the permission cannot be changed.
    fn enable_pet_impersonation(
        &self,
        workspace_id: WorkspaceId,
        user_email: &str,
    ) -> CloudResult<bool>;

    /// # Errors
    ///
    /// Returns an error if the permission cannot be changed.
    fn disable_pet_impersonation(
        &self,
        workspace_id: WorkspaceId,
        user_email: &str,
    ) -> CloudResult<()>;

    /// Cloud role bindings (role to members) that the resource's policy grants.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource has no policy yet.
    fn resource_role_bindings(
        &self,
        resource: &ControlledResource,
    ) -> CloudResult<IndexMap<String, Vec<String>>>;

    /// Deletes the access policy of a controlled resource.
    ///
    /// # Errors
    ///
    /// Returns a 404 error if the resource has no policy.
    fn delete_resource_policy(&self, resource: &ControlledResource) -> CloudResult<()>;
}
