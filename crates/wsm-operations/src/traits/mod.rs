mod database_roles;
mod gcp;
mod identity;
mod kubernetes;
mod policy;
mod resource_store;

use wsm_core::CloudError;

pub use database_roles::DatabaseRoleRunner;
pub use gcp::{ComputeClient, DataprocClient, ResourceManagerClient, StorageClient};
pub use identity::{FederatedCredentialClient, ManagedIdentityClient};
pub use kubernetes::KubernetesClient;
pub use policy::PolicyOracle;
pub use resource_store::ResourceStore;

/// Result of a call to a cloud service.
pub type CloudResult<T> = std::result::Result<T, CloudError>;
