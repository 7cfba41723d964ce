use super::CloudResult;
use crate::types::{AzureCloudContext, KubernetesNamespace, ServiceAccount};

/// The workspace's shared Kubernetes cluster.
///
/// Errors carry the API server's status code.
pub trait KubernetesClient: Send + Sync {
    /// OIDC issuer URL of the cluster, used for workload identity federation.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster cannot be found or has no issuer.
    fn oidc_issuer(&self, cloud: &AzureCloudContext) -> CloudResult<String>;

    /// # Errors
    ///
    /// Returns a 404 error if the namespace does not exist.
    fn get_namespace(&self, cloud: &AzureCloudContext, name: &str)
    -> CloudResult<KubernetesNamespace>;

    /// # Errors
    ///
    /// Returns a 409 error if the namespace already exists.
    fn create_namespace(
        &self,
        cloud: &AzureCloudContext,
        namespace: &KubernetesNamespace,
    ) -> CloudResult<()>;

    /// Starts deleting a namespace; the namespace disappears asynchronously.
    ///
    /// # Errors
    ///
    /// Returns a 404 error if the namespace does not exist, 409 while an
    /// earlier delete is still terminating it.
    fn delete_namespace(&self, cloud: &AzureCloudContext, name: &str) -> CloudResult<()>;

    /// # Errors
    ///
    /// Returns a 404 error if the service account does not exist.
    fn get_service_account(
        &self,
        cloud: &AzureCloudContext,
        namespace: &str,
        name: &str,
    ) -> CloudResult<ServiceAccount>;

    /// # Errors
    ///
    /// Returns a 409 error if the service account already exists.
    fn create_service_account(
        &self,
        cloud: &AzureCloudContext,
        account: &ServiceAccount,
    ) -> CloudResult<()>;

    /// # Errors
    ///
    /// Returns a 404 error if the service account does not exist.
    fn delete_service_account(
        &self,
        cloud: &AzureCloudContext,
        namespace: &str,
        name: &str,
    ) -> CloudResult<()>;
}
