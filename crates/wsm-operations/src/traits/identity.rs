use std::collections::BTreeMap;

use super::CloudResult;
use crate::types::{AzureCloudContext, FederatedCredential, ManagedIdentity};

/// Azure user-assigned managed identities in a workspace's resource group.
pub trait ManagedIdentityClient: Send + Sync {
    /// # Errors
    ///
    /// Returns a 404 error if no identity with that name exists.
    fn get_identity(&self, cloud: &AzureCloudContext, name: &str) -> CloudResult<ManagedIdentity>;

    /// # Errors
    ///
    /// Returns a 409 error if an identity with that name already exists.
    fn create_identity(
        &self,
        cloud: &AzureCloudContext,
        name: &str,
        region: &str,
        tags: &BTreeMap<String, String>,
    ) -> CloudResult<ManagedIdentity>;

    /// # Errors
    ///
    /// Returns a 404 error if the identity does not exist.
    fn delete_identity(&self, cloud: &AzureCloudContext, name: &str) -> CloudResult<()>;
}

/// Federated credentials attached to a managed identity.
pub trait FederatedCredentialClient: Send + Sync {
    /// # Errors
    ///
    /// Returns a 404 error if the identity has no credential with that name.
    fn get_credential(
        &self,
        cloud: &AzureCloudContext,
        identity_name: &str,
        credential_name: &str,
    ) -> CloudResult<FederatedCredential>;

    /// Creates the credential or replaces one with the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity does not exist or the call fails.
    fn create_or_update_credential(
        &self,
        cloud: &AzureCloudContext,
        identity_name: &str,
        credential: &FederatedCredential,
    ) -> CloudResult<()>;

    /// # Errors
    ///
    /// Returns a 404 error if the credential does not exist.
    fn delete_credential(
        &self,
        cloud: &AzureCloudContext,
        identity_name: &str,
        credential_name: &str,
    ) -> CloudResult<()>;
}
