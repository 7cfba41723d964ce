use serde::{Deserialize, Serialize};
use wsm_core::ControlledResource;

use crate::Result;
use crate::error::OperationError;
use crate::types::{
    AzureCloudContext, BucketAttributes, ClusterAttributes, GcpCloudContext, ManagedIdentity,
    Subnetwork,
};

/// Per-flight state shared by the steps of one flight.
///
/// Each resource family writes to its own section. Fields a later step
/// depends on are read through [`WorkingMap::require`], which fails the flight
/// instead of retrying when an earlier step never produced the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkingMap {
    #[serde(default)]
    pub azure: AzureState,
    #[serde(default)]
    pub gcp: GcpState,
    #[serde(default)]
    pub update: UpdateState,
    #[serde(default)]
    pub clone: CloneState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AzureState {
    pub cloud_context: Option<AzureCloudContext>,
    /// Identity the namespace's service account runs as.
    pub managed_identity: Option<ManagedIdentity>,
    /// Whether the federated credential and service account both existed
    /// before this flight. Written once.
    pub federated_identity_exists: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GcpState {
    pub cloud_context: Option<GcpCloudContext>,
    pub subnetwork: Option<Subnetwork>,
    /// Whether this flight granted the pet impersonation permission. Written once.
    pub pet_permission_granted: Option<bool>,
}

/// Attribute values captured before an update, restored by its undo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateState {
    pub previous_cluster: Option<ClusterAttributes>,
    pub previous_bucket: Option<BucketAttributes>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloneState {
    pub destination: Option<ControlledResource>,
}

impl WorkingMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value an earlier step must have written.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::MissingWorkingValue` if it is absent.
    pub fn require<'a, T>(field: &'a Option<T>, key: &'static str) -> Result<&'a T> {
        field
            .as_ref()
            .ok_or(OperationError::MissingWorkingValue { key })
    }

    /// Store a value unless one is already present. Returns whether it was stored.
    pub fn set_once<T>(field: &mut Option<T>, value: T) -> bool {
        if field.is_some() {
            return false;
        }
        *field = Some(value);
        true
    }

    /// # Errors
    ///
    /// Returns an error if no Azure cloud context step ran.
    pub fn azure_cloud_context(&self) -> Result<&AzureCloudContext> {
        Self::require(&self.azure.cloud_context, "azure.cloud_context")
    }

    /// # Errors
    ///
    /// Returns an error if no GCP cloud context step ran.
    pub fn gcp_cloud_context(&self) -> Result<&GcpCloudContext> {
        Self::require(&self.gcp.cloud_context, "gcp.cloud_context")
    }
}
