use std::collections::BTreeMap;
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use wsm_core::{CloudError, ResourceId, WorkspaceId};

/// Where a workspace's Azure resources live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureCloudContext {
    pub tenant_id: String,
    pub subscription_id: String,
    pub resource_group: String,
}

/// The Google project backing a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcpCloudContext {
    pub project_id: String,
}

/// A user-assigned managed identity as Azure reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedIdentity {
    pub name: String,
    pub principal_id: String,
    pub client_id: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

pub const WORKSPACE_ID_TAG: &str = "workspace_id";
pub const RESOURCE_ID_TAG: &str = "resource_id";

/// Tags identifying the workspace resource an Azure identity belongs to.
#[must_use]
pub fn ownership_tags(
    workspace_id: WorkspaceId,
    resource_id: ResourceId,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (WORKSPACE_ID_TAG.to_string(), workspace_id.to_string()),
        (RESOURCE_ID_TAG.to_string(), resource_id.to_string()),
    ])
}

impl ManagedIdentity {
    /// Whether the identity carries the ownership tags of this resource.
    #[must_use]
    pub fn is_owned_by(&self, workspace_id: WorkspaceId, resource_id: ResourceId) -> bool {
        let workspace = workspace_id.to_string();
        let resource = resource_id.to_string();
        self.tags.get(WORKSPACE_ID_TAG) == Some(&workspace)
            && self.tags.get(RESOURCE_ID_TAG) == Some(&resource)
    }
}

pub const TOKEN_EXCHANGE_AUDIENCE: &str = "api://AzureADTokenExchange";
pub const WORKLOAD_IDENTITY_CLIENT_ID_ANNOTATION: &str = "azure.workload.identity/client-id";

/// A federated identity credential letting a Kubernetes service account
/// exchange its token for the managed identity's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedCredential {
    pub name: String,
    pub issuer: String,
    pub subject: String,
    pub audiences: Vec<String>,
}

impl FederatedCredential {
    /// The credential for `service_account` in `namespace`. One credential
    /// exists per namespace, named after it.
    #[must_use]
    pub fn for_service_account(issuer: &str, namespace: &str, service_account: &str) -> Self {
        Self {
            name: namespace.to_string(),
            issuer: issuer.to_string(),
            subject: format!("system:serviceaccount:{namespace}:{service_account}"),
            audiences: vec![TOKEN_EXCHANGE_AUDIENCE.to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesNamespace {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Request to create the database role a namespace's identity logs in as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRoleRequest {
    pub workspace_id: WorkspaceId,
    pub role_name: String,
    pub principal_id: String,
    pub databases: Vec<String>,
}

/// Whether a namespace role may currently log in to its databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseAccess {
    Revoke,
    Restore,
}

impl DatabaseAccess {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Revoke => Self::Restore,
            Self::Restore => Self::Revoke,
        }
    }
}

impl fmt::Display for DatabaseAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Revoke => f.write_str("revoke"),
            Self::Restore => f.write_str("restore"),
        }
    }
}

/// Fully qualified Dataproc cluster name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterName {
    pub project_id: String,
    pub region: String,
    pub cluster_id: String,
}

impl fmt::Display for ClusterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/regions/{}/clusters/{}",
            self.project_id, self.region, self.cluster_id
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterState {
    Creating,
    Running,
    Updating,
    Stopping,
    Stopped,
    Starting,
    Error,
    Deleting,
    Unknown,
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Creating => "CREATING",
            Self::Running => "RUNNING",
            Self::Updating => "UPDATING",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Starting => "STARTING",
            Self::Error => "ERROR",
            Self::Deleting => "DELETING",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// The cluster settings an update flight may change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_primary_workers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_secondary_workers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_delete_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub name: ClusterName,
    pub state: ClusterState,
    pub attributes: ClusterAttributes,
}

/// A cluster patch: the new values plus the field mask naming which of them apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterPatch {
    pub attributes: ClusterAttributes,
    pub update_mask: Vec<&'static str>,
}

pub const MASK_PRIMARY_WORKERS: &str = "config.worker_config.num_instances";
pub const MASK_SECONDARY_WORKERS: &str = "config.secondary_worker_config.num_instances";
pub const MASK_AUTOSCALING_POLICY: &str = "config.autoscaling_config.policy_uri";
pub const MASK_IDLE_DELETE_TTL: &str = "config.lifecycle_config.idle_delete_ttl";

impl ClusterPatch {
    /// Patch every field set in `attributes`.
    #[must_use]
    pub fn from_attributes(attributes: ClusterAttributes) -> Self {
        let mut update_mask = Vec::new();
        if attributes.num_primary_workers.is_some() {
            update_mask.push(MASK_PRIMARY_WORKERS);
        }
        if attributes.num_secondary_workers.is_some() {
            update_mask.push(MASK_SECONDARY_WORKERS);
        }
        if attributes.autoscaling_policy.is_some() {
            update_mask.push(MASK_AUTOSCALING_POLICY);
        }
        if attributes.idle_delete_ttl_secs.is_some() {
            update_mask.push(MASK_IDLE_DELETE_TTL);
        }
        Self {
            attributes,
            update_mask,
        }
    }

    /// The patch that puts back `previous` for every field `applied` changed.
    #[must_use]
    pub fn restoring(previous: &ClusterAttributes, applied: &ClusterPatch) -> Self {
        let masked = |field: &str| applied.update_mask.iter().any(|mask| *mask == field);
        Self {
            attributes: ClusterAttributes {
                num_primary_workers: previous
                    .num_primary_workers
                    .filter(|_| masked(MASK_PRIMARY_WORKERS)),
                num_secondary_workers: previous
                    .num_secondary_workers
                    .filter(|_| masked(MASK_SECONDARY_WORKERS)),
                autoscaling_policy: previous
                    .autoscaling_policy
                    .clone()
                    .filter(|_| masked(MASK_AUTOSCALING_POLICY)),
                idle_delete_ttl_secs: previous
                    .idle_delete_ttl_secs
                    .filter(|_| masked(MASK_IDLE_DELETE_TTL)),
            },
            update_mask: applied.update_mask.clone(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.update_mask.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceGroup {
    pub machine_type: String,
    pub num_instances: u32,
    #[serde(default = "default_boot_disk_gb")]
    pub boot_disk_size_gb: u32,
}

fn default_boot_disk_gb() -> u32 {
    500
}

/// What a Dataproc cluster is created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: ClusterName,
    pub subnetwork: String,
    pub service_account: String,
    pub config_bucket: String,
    pub temp_bucket: String,
    pub parameters: DataprocClusterCreationParameters,
    pub labels: BTreeMap<String, String>,
}

/// Handle to a long-running cloud operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationHandle {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationStatus {
    pub done: bool,
    pub error: Option<CloudError>,
}

impl OperationStatus {
    #[must_use]
    pub fn running() -> Self {
        Self {
            done: false,
            error: None,
        }
    }

    #[must_use]
    pub fn succeeded() -> Self {
        Self {
            done: true,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: CloudError) -> Self {
        Self {
            done: true,
            error: Some(error),
        }
    }
}

/// Role name to members, in the order the provider returned them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamPolicy {
    pub bindings: IndexMap<String, IndexSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl IamPolicy {
    /// Add every member of `bindings` to this policy. Returns whether anything changed.
    pub fn merge(&mut self, bindings: &IndexMap<String, Vec<String>>) -> bool {
        let mut changed = false;
        for (role, members) in bindings {
            let existing = self.bindings.entry(role.clone()).or_default();
            for member in members {
                changed |= existing.insert(member.clone());
            }
        }
        changed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnetwork {
    pub name: String,
    pub network: String,
    pub region: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageClass {
    Standard,
    Nearline,
    Coldline,
    Archive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleAction {
    Delete,
    SetStorageClass { storage_class: StorageClass },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_newer_versions: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_live: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches_storage_class: Vec<StorageClass>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRule {
    pub action: LifecycleAction,
    #[serde(default)]
    pub condition: LifecycleCondition,
}

impl LifecycleRule {
    /// Delete every object regardless of age.
    #[must_use]
    pub fn delete_all_objects() -> Self {
        Self {
            action: LifecycleAction::Delete,
            condition: LifecycleCondition {
                age_days: Some(0),
                ..LifecycleCondition::default()
            },
        }
    }
}

/// The bucket settings an update flight may change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<StorageClass>,
    #[serde(default)]
    pub lifecycle_rules: Vec<LifecycleRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub name: String,
    /// Number of the project that owns the bucket.
    pub project_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub attributes: BucketAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub attributes: BucketAttributes,
    pub labels: BTreeMap<String, String>,
}

/// A bucket change. `None` leaves the setting as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<StorageClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_rules: Option<Vec<LifecycleRule>>,
}

impl BucketUpdate {
    /// The update that puts back `previous` for every setting `applied` changed.
    #[must_use]
    pub fn restoring(previous: &BucketAttributes, applied: &BucketUpdate) -> Self {
        Self {
            storage_class: applied.storage_class.and(previous.storage_class),
            lifecycle_rules: applied
                .lifecycle_rules
                .as_ref()
                .map(|_| previous.lifecycle_rules.clone()),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage_class.is_none() && self.lifecycle_rules.is_none()
    }
}

/// The user a flight acts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightUser {
    /// Subject id from the caller's token.
    pub subject_id: String,
    /// Email when the caller already knows it; looked up by subject otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataprocClusterCreationParameters {
    /// Bucket resource used for cluster configuration files.
    pub config_bucket: ResourceId,
    /// Bucket resource used for temporary job data.
    pub temp_bucket: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_version: Option<String>,
    pub manager: InstanceGroup,
    pub primary_workers: InstanceGroup,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_workers: Option<InstanceGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_delete_ttl_secs: Option<u64>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcsBucketCreationParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<StorageClass>,
    #[serde(default)]
    pub lifecycle_rules: Vec<LifecycleRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreationParameters {
    DataprocCluster(DataprocClusterCreationParameters),
    GcsBucket(GcsBucketCreationParameters),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdateParameters {
    DataprocCluster(ClusterAttributes),
    GcsBucket(BucketUpdate),
}

/// Where a cloned resource goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneDestination {
    pub workspace_id: WorkspaceId,
    pub resource_id: ResourceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Flight-scoped inputs, fixed when the flight is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightInputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<FlightUser>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation: Option<CreationParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone: Option<CloneDestination>,
}

/// What an identity lookup does when the identity is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingIdentityBehavior {
    FailOnMissing,
    AllowMissing,
}
