use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::validation;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|source| CoreError::InvalidId {
                        value: s.to_string(),
                        source,
                    })
            }
        }
    };
}

uuid_id!(
    /// Identifier of a workspace.
    WorkspaceId
);
uuid_id!(
    /// Identifier of a controlled resource within a workspace.
    ResourceId
);

/// Who may use a controlled resource.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessScope {
    /// Every workspace member.
    #[default]
    Shared,
    /// Only the assigned user.
    Private,
}

impl fmt::Display for AccessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => f.write_str("shared"),
            Self::Private => f.write_str("private"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloudPlatform {
    Azure,
    Gcp,
}

impl fmt::Display for CloudPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Azure => f.write_str("azure"),
            Self::Gcp => f.write_str("gcp"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ManagedIdentity,
    KubernetesNamespace,
    Database,
    DataprocCluster,
    GcsBucket,
}

impl ResourceKind {
    pub const ALL: [Self; 5] = [
        Self::ManagedIdentity,
        Self::KubernetesNamespace,
        Self::Database,
        Self::DataprocCluster,
        Self::GcsBucket,
    ];

    #[must_use]
    pub fn platform(self) -> CloudPlatform {
        match self {
            Self::ManagedIdentity | Self::KubernetesNamespace | Self::Database => {
                CloudPlatform::Azure
            }
            Self::DataprocCluster | Self::GcsBucket => CloudPlatform::Gcp,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManagedIdentity => "managed identity",
            Self::KubernetesNamespace => "kubernetes namespace",
            Self::Database => "database",
            Self::DataprocCluster => "dataproc cluster",
            Self::GcsBucket => "gcs bucket",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields every controlled resource carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFields {
    pub workspace_id: WorkspaceId,
    pub resource_id: ResourceId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub access_scope: AccessScope,
    /// Email of the user a private resource belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl ResourceFields {
    #[must_use]
    pub fn new(workspace_id: WorkspaceId, name: impl Into<String>) -> Self {
        Self {
            workspace_id,
            resource_id: ResourceId::new(),
            name: name.into(),
            description: None,
            region: None,
            access_scope: AccessScope::Shared,
            assigned_user: None,
            created_by: None,
        }
    }

    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    #[must_use]
    pub fn private_to(mut self, user_email: impl Into<String>) -> Self {
        self.access_scope = AccessScope::Private;
        self.assigned_user = Some(user_email.into());
        self
    }

    #[must_use]
    pub fn with_resource_id(mut self, resource_id: ResourceId) -> Self {
        self.resource_id = resource_id;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::MissingField { field: "name" });
        }
        if self.access_scope == AccessScope::Private
            && self.assigned_user.as_deref().is_none_or(str::is_empty)
        {
            return Err(CoreError::Inconsistent(
                "private resources require an assigned user",
            ));
        }
        Ok(())
    }

    fn require_region(&self) -> Result<&str> {
        self.region
            .as_deref()
            .filter(|region| !region.is_empty())
            .ok_or(CoreError::MissingField { field: "region" })
    }
}

/// An Azure user-assigned managed identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedIdentityResource {
    pub common: ResourceFields,
    pub managed_identity_name: String,
}

/// A Kubernetes namespace on the workspace's shared cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesNamespaceResource {
    pub common: ResourceFields,
    pub kubernetes_namespace: String,
    pub kubernetes_service_account: String,
    /// Workspace managed identity (resource id or resource name) the
    /// namespace's service account runs as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_identity: Option<String>,
    /// Database resources the namespace is granted access to.
    #[serde(default)]
    pub databases: BTreeSet<ResourceId>,
}

impl KubernetesNamespaceResource {
    /// Whether the namespace needs a federated identity bound to its service account.
    #[must_use]
    pub fn requires_federated_identity(&self) -> bool {
        self.common.access_scope == AccessScope::Private || self.managed_identity.is_some()
    }

    #[must_use]
    pub fn requires_databases(&self) -> bool {
        !self.databases.is_empty()
    }
}

/// An Azure database on the workspace's shared database server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseResource {
    pub common: ResourceFields,
    pub database_name: String,
    /// Managed identity (resource id or name) that owns the database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_owner: Option<String>,
    #[serde(default)]
    pub allow_access_for_all_workspace_users: bool,
}

/// A Google Dataproc cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataprocClusterResource {
    pub common: ResourceFields,
    pub cluster_id: String,
    pub project_id: String,
}

impl DataprocClusterResource {
    /// The cluster's region; validated to be present.
    #[must_use]
    pub fn region(&self) -> &str {
        self.common.region.as_deref().unwrap_or_default()
    }
}

/// A Google Cloud Storage bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcsBucketResource {
    pub common: ResourceFields,
    pub bucket_name: String,
}

/// Every controlled resource kind a flight can act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlledResource {
    ManagedIdentity(ManagedIdentityResource),
    KubernetesNamespace(KubernetesNamespaceResource),
    Database(DatabaseResource),
    DataprocCluster(DataprocClusterResource),
    GcsBucket(GcsBucketResource),
}

impl ControlledResource {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::ManagedIdentity(_) => ResourceKind::ManagedIdentity,
            Self::KubernetesNamespace(_) => ResourceKind::KubernetesNamespace,
            Self::Database(_) => ResourceKind::Database,
            Self::DataprocCluster(_) => ResourceKind::DataprocCluster,
            Self::GcsBucket(_) => ResourceKind::GcsBucket,
        }
    }

    #[must_use]
    pub fn common(&self) -> &ResourceFields {
        match self {
            Self::ManagedIdentity(r) => &r.common,
            Self::KubernetesNamespace(r) => &r.common,
            Self::Database(r) => &r.common,
            Self::DataprocCluster(r) => &r.common,
            Self::GcsBucket(r) => &r.common,
        }
    }

    #[must_use]
    pub fn platform(&self) -> CloudPlatform {
        self.kind().platform()
    }

    #[must_use]
    pub fn workspace_id(&self) -> WorkspaceId {
        self.common().workspace_id
    }

    #[must_use]
    pub fn resource_id(&self) -> ResourceId {
        self.common().resource_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.common().name
    }

    /// Check the descriptor before any flight is built for it.
    ///
    /// # Errors
    ///
    /// Returns the first missing, malformed or inconsistent field.
    pub fn validate(&self) -> Result<()> {
        self.common().validate()?;
        match self {
            Self::ManagedIdentity(r) => {
                validation::validate_managed_identity_name(&r.managed_identity_name)
            }
            Self::KubernetesNamespace(r) => {
                validation::validate_kubernetes_namespace(&r.kubernetes_namespace)?;
                if r.kubernetes_service_account.is_empty() {
                    return Err(CoreError::MissingField {
                        field: "kubernetes_service_account",
                    });
                }
                if r.common.access_scope == AccessScope::Shared
                    && r.managed_identity.is_none()
                    && r.requires_databases()
                {
                    return Err(CoreError::Inconsistent("Databases require an identity"));
                }
                r.common.require_region().map(|_| ())
            }
            Self::Database(r) => {
                if r.database_name.is_empty() {
                    return Err(CoreError::MissingField {
                        field: "database_name",
                    });
                }
                Ok(())
            }
            Self::DataprocCluster(r) => {
                validation::validate_cluster_id(&r.cluster_id)?;
                if r.project_id.is_empty() {
                    return Err(CoreError::MissingField { field: "project_id" });
                }
                r.common.require_region().map(|_| ())
            }
            Self::GcsBucket(r) => validation::validate_bucket_name(&r.bucket_name),
        }
    }

    /// # Errors
    ///
    /// Returns `CoreError::WrongResourceType` for any other kind.
    pub fn as_managed_identity(&self) -> Result<&ManagedIdentityResource> {
        match self {
            Self::ManagedIdentity(r) => Ok(r),
            other => Err(other.wrong_type(ResourceKind::ManagedIdentity)),
        }
    }

    /// # Errors
    ///
    /// Returns `CoreError::WrongResourceType` for any other kind.
    pub fn as_kubernetes_namespace(&self) -> Result<&KubernetesNamespaceResource> {
        match self {
            Self::KubernetesNamespace(r) => Ok(r),
            other => Err(other.wrong_type(ResourceKind::KubernetesNamespace)),
        }
    }

    /// # Errors
    ///
    /// Returns `CoreError::WrongResourceType` for any other kind.
    pub fn as_database(&self) -> Result<&DatabaseResource> {
        match self {
            Self::Database(r) => Ok(r),
            other => Err(other.wrong_type(ResourceKind::Database)),
        }
    }

    /// # Errors
    ///
    /// Returns `CoreError::WrongResourceType` for any other kind.
    pub fn as_dataproc_cluster(&self) -> Result<&DataprocClusterResource> {
        match self {
            Self::DataprocCluster(r) => Ok(r),
            other => Err(other.wrong_type(ResourceKind::DataprocCluster)),
        }
    }

    /// # Errors
    ///
    /// Returns `CoreError::WrongResourceType` for any other kind.
    pub fn as_gcs_bucket(&self) -> Result<&GcsBucketResource> {
        match self {
            Self::GcsBucket(r) => Ok(r),
            other => Err(other.wrong_type(ResourceKind::GcsBucket)),
        }
    }

    fn wrong_type(&self, expected: ResourceKind) -> CoreError {
        CoreError::WrongResourceType {
            expected,
            actual: self.kind(),
        }
    }
}

impl From<ManagedIdentityResource> for ControlledResource {
    fn from(resource: ManagedIdentityResource) -> Self {
        Self::ManagedIdentity(resource)
    }
}

impl From<KubernetesNamespaceResource> for ControlledResource {
    fn from(resource: KubernetesNamespaceResource) -> Self {
        Self::KubernetesNamespace(resource)
    }
}

impl From<DatabaseResource> for ControlledResource {
    fn from(resource: DatabaseResource) -> Self {
        Self::Database(resource)
    }
}

impl From<DataprocClusterResource> for ControlledResource {
    fn from(resource: DataprocClusterResource) -> Self {
        Self::DataprocCluster(resource)
    }
}

impl From<GcsBucketResource> for ControlledResource {
    fn from(resource: GcsBucketResource) -> Self {
        Self::GcsBucket(resource)
    }
}
