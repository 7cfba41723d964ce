//! Flight steps, grouped by the resource family they act on.
//!
//! Every step reads its fixed inputs from its own fields and passes what it
//! discovers to later steps through the [`WorkingMap`](crate::WorkingMap).

mod dataproc;
mod federated_identity;
mod gcs_bucket;
mod identity_lookup;
mod kubernetes_namespace;
mod managed_identity;
mod metadata;
mod namespace_role;
mod network;

pub use dataproc::{
    CreateDataprocClusterStep, DataprocClusterCloudSyncStep, DeleteDataprocClusterStep,
    GrantPetUsagePermissionStep, RetrieveDataprocClusterAttributesStep,
    UpdateDataprocClusterStep, ValidateDataprocClusterStep,
};
pub use federated_identity::{
    CreateFederatedIdentityStep, DeleteFederatedCredentialStep, GetFederatedIdentityStep,
};
pub use gcs_bucket::{
    CreateGcsBucketStep, DeleteGcsBucketStep, GcsBucketCloudSyncStep,
    RetrieveGcsBucketAttributesStep, UpdateGcsBucketStep,
};
pub use identity_lookup::{GetPetManagedIdentityStep, GetWorkspaceManagedIdentityStep};
pub use kubernetes_namespace::{
    CreateKubernetesNamespaceStep, DeleteKubernetesNamespaceStep, KubernetesNamespaceGuardStep,
};
pub use managed_identity::{
    CopyAzureManagedIdentityDefinitionStep, CreateAzureManagedIdentityStep,
    DeleteAzureManagedIdentityStep, GetAzureManagedIdentityStep,
};
pub use metadata::{
    DeletePolicyResourceStep, DeleteResourceMetadataStep, GetAzureCloudContextStep,
    GetGcpCloudContextStep, StoreResourceMetadataStep,
};
pub use namespace_role::{
    CreateNamespaceRoleStep, DeleteNamespaceRoleStep, UpdateNamespaceRoleDatabaseAccessStep,
};
pub use network::RetrieveNetworkNameStep;

use crate::Result;
use crate::context::FlightServices;
use crate::error::OperationError;
use crate::types::FlightUser;

/// Result of one `do` or `undo` attempt of a resource step.
pub type StepResult = wsm_flight::StepResult<OperationError>;

/// The email of the user a flight acts for, looked up by subject if needed.
fn user_email(services: &FlightServices, user: &FlightUser) -> Result<String> {
    if let Some(email) = &user.email {
        return Ok(email.clone());
    }
    services
        .policy()
        .email_for_subject(&user.subject_id)
        .map_err(|e| OperationError::cloud("look up user email", e))
}
