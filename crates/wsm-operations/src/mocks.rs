//! In-memory stand-ins for the cloud services, used by the step and planner tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use indexmap::IndexMap;
use wsm_config::{BucketDeletionConfig, WsmConfig};
use wsm_core::{
    CloudError, ControlledResource, DataprocClusterResource, GcsBucketResource,
    ManagedIdentityResource, ResourceFields, ResourceId, WorkspaceId,
};
use wsm_flight::Sleeper;

use crate::context::{CloudClients, FlightServices, OperationSettings};
use crate::providers::InMemoryResourceStore;
use crate::traits::{
    CloudResult, ComputeClient, DatabaseRoleRunner, DataprocClient, FederatedCredentialClient,
    KubernetesClient, ManagedIdentityClient, PolicyOracle, ResourceManagerClient, StorageClient,
};
use crate::types::{
    AzureCloudContext, BucketAttributes, BucketInfo, BucketSpec, BucketUpdate, ClusterAttributes,
    ClusterInfo, ClusterName, ClusterPatch, ClusterSpec, ClusterState, DatabaseAccess,
    DataprocClusterCreationParameters, FederatedCredential, GcpCloudContext, IamPolicy,
    InstanceGroup, KubernetesNamespace, ManagedIdentity, NamespaceRoleRequest, OperationHandle,
    MASK_AUTOSCALING_POLICY, MASK_IDLE_DELETE_TTL, MASK_PRIMARY_WORKERS, MASK_SECONDARY_WORKERS,
    OperationStatus, ServiceAccount, Subnetwork, ownership_tags,
};
use crate::working_map::WorkingMap;

pub const GCP_PROJECT: &str = "terra-project";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().expect("mock lock poisoned")
}

pub fn azure_context() -> AzureCloudContext {
    AzureCloudContext {
        tenant_id: "tenant".to_string(),
        subscription_id: "subscription".to_string(),
        resource_group: "mrg-workspace".to_string(),
    }
}

pub fn gcp_context() -> GcpCloudContext {
    GcpCloudContext {
        project_id: GCP_PROJECT.to_string(),
    }
}

pub fn managed_identity_resource(workspace_id: WorkspaceId, name: &str) -> ManagedIdentityResource {
    ManagedIdentityResource {
        common: ResourceFields::new(workspace_id, name).with_region("eastus"),
        managed_identity_name: name.to_string(),
    }
}

pub fn pet_identity(email: &str) -> ManagedIdentity {
    let local = email.split('@').next().unwrap_or(email);
    ManagedIdentity {
        name: format!("pet-{local}"),
        principal_id: format!("principal-pet-{local}"),
        client_id: format!("client-pet-{local}"),
        tags: BTreeMap::new(),
    }
}

pub fn gcs_bucket_resource(workspace_id: WorkspaceId, bucket_name: &str) -> GcsBucketResource {
    GcsBucketResource {
        common: ResourceFields::new(workspace_id, bucket_name),
        bucket_name: bucket_name.to_string(),
    }
}

pub fn dataproc_resource(workspace_id: WorkspaceId, cluster_id: &str) -> DataprocClusterResource {
    DataprocClusterResource {
        common: ResourceFields::new(workspace_id, cluster_id).with_region("us-central1"),
        cluster_id: cluster_id.to_string(),
        project_id: GCP_PROJECT.to_string(),
    }
}

pub fn cluster_parameters(
    config_bucket: ResourceId,
    temp_bucket: ResourceId,
) -> DataprocClusterCreationParameters {
    DataprocClusterCreationParameters {
        config_bucket,
        temp_bucket,
        image_version: None,
        manager: InstanceGroup {
            machine_type: "n2-standard-4".to_string(),
            num_instances: 1,
            boot_disk_size_gb: 500,
        },
        primary_workers: InstanceGroup {
            machine_type: "n2-standard-4".to_string(),
            num_instances: 2,
            boot_disk_size_gb: 500,
        },
        secondary_workers: None,
        autoscaling_policy: None,
        idle_delete_ttl_secs: None,
        properties: BTreeMap::new(),
    }
}

/// Records sleeps instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleep_count(&self) -> usize {
        lock(&self.sleeps).len()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        lock(&self.sleeps).push(duration);
    }
}

#[derive(Default)]
pub struct MockIdentities {
    identities: Mutex<BTreeMap<String, ManagedIdentity>>,
    get_failures: Mutex<VecDeque<CloudError>>,
}

impl MockIdentities {
    pub fn identity_names(&self) -> Vec<String> {
        lock(&self.identities).keys().cloned().collect()
    }

    pub fn insert_foreign(&self, name: &str) {
        lock(&self.identities).insert(name.to_string(), identity(name, BTreeMap::new()));
    }

    pub fn insert_owned(&self, resource: &ManagedIdentityResource) {
        let tags = ownership_tags(resource.common.workspace_id, resource.common.resource_id);
        let name = &resource.managed_identity_name;
        lock(&self.identities).insert(name.clone(), identity(name, tags));
    }

    pub fn fail_next_get(&self, error: CloudError) {
        lock(&self.get_failures).push_back(error);
    }
}

fn identity(name: &str, tags: BTreeMap<String, String>) -> ManagedIdentity {
    ManagedIdentity {
        name: name.to_string(),
        principal_id: format!("principal-{name}"),
        client_id: format!("client-{name}"),
        tags,
    }
}

impl ManagedIdentityClient for MockIdentities {
    fn get_identity(&self, _cloud: &AzureCloudContext, name: &str) -> CloudResult<ManagedIdentity> {
        if let Some(error) = lock(&self.get_failures).pop_front() {
            return Err(error);
        }
        lock(&self.identities)
            .get(name)
            .cloned()
            .ok_or_else(|| CloudError::not_found(format!("identity {name}")))
    }

    fn create_identity(
        &self,
        _cloud: &AzureCloudContext,
        name: &str,
        _region: &str,
        tags: &BTreeMap<String, String>,
    ) -> CloudResult<ManagedIdentity> {
        let mut identities = lock(&self.identities);
        if identities.contains_key(name) {
            return Err(CloudError::conflict(format!("identity {name} exists")));
        }
        let created = identity(name, tags.clone());
        identities.insert(name.to_string(), created.clone());
        Ok(created)
    }

    fn delete_identity(&self, _cloud: &AzureCloudContext, name: &str) -> CloudResult<()> {
        lock(&self.identities)
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CloudError::not_found(format!("identity {name}")))
    }
}

#[derive(Default)]
pub struct MockFederatedCredentials {
    credentials: Mutex<BTreeMap<(String, String), FederatedCredential>>,
}

impl MockFederatedCredentials {
    pub fn credential(&self, identity_name: &str, name: &str) -> Option<FederatedCredential> {
        lock(&self.credentials)
            .get(&(identity_name.to_string(), name.to_string()))
            .cloned()
    }
}

impl FederatedCredentialClient for MockFederatedCredentials {
    fn get_credential(
        &self,
        _cloud: &AzureCloudContext,
        identity_name: &str,
        credential_name: &str,
    ) -> CloudResult<FederatedCredential> {
        self.credential(identity_name, credential_name)
            .ok_or_else(|| CloudError::not_found(format!("credential {credential_name}")))
    }

    fn create_or_update_credential(
        &self,
        _cloud: &AzureCloudContext,
        identity_name: &str,
        credential: &FederatedCredential,
    ) -> CloudResult<()> {
        lock(&self.credentials).insert(
            (identity_name.to_string(), credential.name.clone()),
            credential.clone(),
        );
        Ok(())
    }

    fn delete_credential(
        &self,
        _cloud: &AzureCloudContext,
        identity_name: &str,
        credential_name: &str,
    ) -> CloudResult<()> {
        lock(&self.credentials)
            .remove(&(identity_name.to_string(), credential_name.to_string()))
            .map(|_| ())
            .ok_or_else(|| CloudError::not_found(format!("credential {credential_name}")))
    }
}

#[derive(Default)]
pub struct MockKubernetes {
    namespaces: Mutex<BTreeMap<String, KubernetesNamespace>>,
    /// Deleted namespaces still visible for the given number of reads.
    terminating: Mutex<BTreeMap<String, (KubernetesNamespace, u32)>>,
    linger: Mutex<u32>,
    service_accounts: Mutex<BTreeMap<(String, String), ServiceAccount>>,
}

impl MockKubernetes {
    pub fn namespace(&self, name: &str) -> Option<KubernetesNamespace> {
        lock(&self.namespaces).get(name).cloned()
    }

    pub fn service_account(&self, namespace: &str, name: &str) -> Option<ServiceAccount> {
        lock(&self.service_accounts)
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn linger_after_delete(&self, reads: u32) {
        *lock(&self.linger) = reads;
    }
}

impl KubernetesClient for MockKubernetes {
    fn oidc_issuer(&self, _cloud: &AzureCloudContext) -> CloudResult<String> {
        Ok("https://oidc.example.com/issuer".to_string())
    }

    fn get_namespace(
        &self,
        _cloud: &AzureCloudContext,
        name: &str,
    ) -> CloudResult<KubernetesNamespace> {
        if let Some(namespace) = lock(&self.namespaces).get(name) {
            return Ok(namespace.clone());
        }
        let mut terminating = lock(&self.terminating);
        match terminating.get_mut(name) {
            Some((namespace, remaining)) if *remaining > 0 => {
                *remaining -= 1;
                Ok(namespace.clone())
            }
            Some(_) => {
                terminating.remove(name);
                Err(CloudError::not_found(format!("namespace {name}")))
            }
            None => Err(CloudError::not_found(format!("namespace {name}"))),
        }
    }

    fn create_namespace(
        &self,
        _cloud: &AzureCloudContext,
        namespace: &KubernetesNamespace,
    ) -> CloudResult<()> {
        let mut namespaces = lock(&self.namespaces);
        if namespaces.contains_key(&namespace.name) {
            return Err(CloudError::conflict(format!("namespace {}", namespace.name)));
        }
        namespaces.insert(namespace.name.clone(), namespace.clone());
        Ok(())
    }

    fn delete_namespace(&self, _cloud: &AzureCloudContext, name: &str) -> CloudResult<()> {
        if lock(&self.terminating).contains_key(name) {
            return Err(CloudError::conflict(format!("namespace {name} is terminating")));
        }
        let removed = lock(&self.namespaces)
            .remove(name)
            .ok_or_else(|| CloudError::not_found(format!("namespace {name}")))?;
        let linger = *lock(&self.linger);
        if linger > 0 {
            lock(&self.terminating).insert(name.to_string(), (removed, linger));
        }
        lock(&self.service_accounts).retain(|(namespace, _), _| namespace != name);
        Ok(())
    }

    fn get_service_account(
        &self,
        _cloud: &AzureCloudContext,
        namespace: &str,
        name: &str,
    ) -> CloudResult<ServiceAccount> {
        self.service_account(namespace, name)
            .ok_or_else(|| CloudError::not_found(format!("service account {name}")))
    }

    fn create_service_account(
        &self,
        _cloud: &AzureCloudContext,
        account: &ServiceAccount,
    ) -> CloudResult<()> {
        let key = (account.namespace.clone(), account.name.clone());
        let mut accounts = lock(&self.service_accounts);
        if accounts.contains_key(&key) {
            return Err(CloudError::conflict(format!("service account {}", account.name)));
        }
        accounts.insert(key, account.clone());
        Ok(())
    }

    fn delete_service_account(
        &self,
        _cloud: &AzureCloudContext,
        namespace: &str,
        name: &str,
    ) -> CloudResult<()> {
        lock(&self.service_accounts)
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| CloudError::not_found(format!("service account {name}")))
    }
}

#[derive(Default)]
pub struct MockDatabaseRoles {
    roles: Mutex<Vec<NamespaceRoleRequest>>,
    access_changes: Mutex<Vec<(String, DatabaseAccess)>>,
}

impl MockDatabaseRoles {
    pub fn roles(&self) -> Vec<NamespaceRoleRequest> {
        lock(&self.roles).clone()
    }

    pub fn access_changes(&self) -> Vec<(String, DatabaseAccess)> {
        lock(&self.access_changes).clone()
    }
}

impl DatabaseRoleRunner for MockDatabaseRoles {
    fn create_namespace_role(
        &self,
        _cloud: &AzureCloudContext,
        request: &NamespaceRoleRequest,
    ) -> CloudResult<()> {
        let mut roles = lock(&self.roles);
        roles.retain(|role| role.role_name != request.role_name);
        roles.push(request.clone());
        Ok(())
    }

    fn delete_namespace_role(
        &self,
        _cloud: &AzureCloudContext,
        _workspace_id: WorkspaceId,
        role_name: &str,
    ) -> CloudResult<()> {
        let mut roles = lock(&self.roles);
        let before = roles.len();
        roles.retain(|role| role.role_name != role_name);
        if roles.len() == before {
            return Err(CloudError::not_found(format!("role {role_name}")));
        }
        Ok(())
    }

    fn set_namespace_role_access(
        &self,
        _cloud: &AzureCloudContext,
        _workspace_id: WorkspaceId,
        role_name: &str,
        access: DatabaseAccess,
    ) -> CloudResult<()> {
        lock(&self.access_changes).push((role_name.to_string(), access));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockDataproc {
    clusters: Mutex<IndexMap<ClusterName, ClusterInfo>>,
    created_specs: Mutex<Vec<ClusterSpec>>,
    patches: Mutex<Vec<ClusterPatch>>,
    create_failures: Mutex<VecDeque<CloudError>>,
    operation_failure: Mutex<Option<CloudError>>,
    polls_before_done: Mutex<u32>,
    operations: Mutex<HashMap<String, u32>>,
    policies: Mutex<HashMap<ClusterName, IamPolicy>>,
    policy_writes: Mutex<usize>,
}

impl MockDataproc {
    pub fn cluster_ids(&self) -> Vec<String> {
        lock(&self.clusters)
            .keys()
            .map(|name| name.cluster_id.clone())
            .collect()
    }

    pub fn insert_cluster(
        &self,
        name: &ClusterName,
        state: ClusterState,
        attributes: ClusterAttributes,
    ) {
        lock(&self.clusters).insert(
            name.clone(),
            ClusterInfo {
                name: name.clone(),
                state,
                attributes,
            },
        );
    }

    pub fn created_specs(&self) -> Vec<ClusterSpec> {
        lock(&self.created_specs).clone()
    }

    pub fn patches(&self) -> Vec<ClusterPatch> {
        lock(&self.patches).clone()
    }

    pub fn fail_next_create(&self, error: CloudError) {
        lock(&self.create_failures).push_back(error);
    }

    /// Every operation started from now on finishes with `error`.
    pub fn fail_operations(&self, error: CloudError) {
        *lock(&self.operation_failure) = Some(error);
    }

    pub fn operation_polls_before_done(&self, polls: u32) {
        *lock(&self.polls_before_done) = polls;
    }

    pub fn iam_policy(&self, name: &ClusterName) -> IamPolicy {
        lock(&self.policies).get(name).cloned().unwrap_or_default()
    }

    pub fn iam_policy_writes(&self) -> usize {
        *lock(&self.policy_writes)
    }

    fn start_operation(&self) -> OperationHandle {
        let mut operations = lock(&self.operations);
        let name = format!("operations/{}", operations.len() + 1);
        operations.insert(name.clone(), *lock(&self.polls_before_done));
        OperationHandle { name }
    }
}

impl DataprocClient for MockDataproc {
    fn create_cluster(&self, spec: &ClusterSpec) -> CloudResult<OperationHandle> {
        if let Some(error) = lock(&self.create_failures).pop_front() {
            return Err(error);
        }
        let mut clusters = lock(&self.clusters);
        if clusters.contains_key(&spec.name) {
            return Err(CloudError::conflict(format!("cluster {}", spec.name)));
        }
        let parameters = &spec.parameters;
        clusters.insert(
            spec.name.clone(),
            ClusterInfo {
                name: spec.name.clone(),
                state: ClusterState::Running,
                attributes: ClusterAttributes {
                    num_primary_workers: Some(parameters.primary_workers.num_instances),
                    num_secondary_workers: parameters
                        .secondary_workers
                        .as_ref()
                        .map(|group| group.num_instances),
                    autoscaling_policy: parameters.autoscaling_policy.clone(),
                    idle_delete_ttl_secs: parameters.idle_delete_ttl_secs,
                },
            },
        );
        drop(clusters);
        lock(&self.created_specs).push(spec.clone());
        Ok(self.start_operation())
    }

    fn get_cluster(&self, name: &ClusterName) -> CloudResult<ClusterInfo> {
        lock(&self.clusters)
            .get(name)
            .cloned()
            .ok_or_else(|| CloudError::not_found(format!("cluster {name}")))
    }

    fn update_cluster(
        &self,
        name: &ClusterName,
        patch: &ClusterPatch,
    ) -> CloudResult<OperationHandle> {
        let mut clusters = lock(&self.clusters);
        let cluster = clusters
            .get_mut(name)
            .ok_or_else(|| CloudError::not_found(format!("cluster {name}")))?;
        let attributes = &mut cluster.attributes;
        let patched = &patch.attributes;
        for field in &patch.update_mask {
            match *field {
                MASK_PRIMARY_WORKERS => {
                    attributes.num_primary_workers = patched.num_primary_workers;
                }
                MASK_SECONDARY_WORKERS => {
                    attributes.num_secondary_workers = patched.num_secondary_workers;
                }
                MASK_AUTOSCALING_POLICY => {
                    attributes.autoscaling_policy = patched.autoscaling_policy.clone();
                }
                MASK_IDLE_DELETE_TTL => {
                    attributes.idle_delete_ttl_secs = patched.idle_delete_ttl_secs;
                }
                _ => {}
            }
        }
        drop(clusters);
        lock(&self.patches).push(patch.clone());
        Ok(self.start_operation())
    }

    fn delete_cluster(&self, name: &ClusterName) -> CloudResult<OperationHandle> {
        lock(&self.clusters)
            .shift_remove(name)
            .ok_or_else(|| CloudError::not_found(format!("cluster {name}")))?;
        Ok(self.start_operation())
    }

    fn get_operation(&self, handle: &OperationHandle) -> CloudResult<OperationStatus> {
        if let Some(error) = lock(&self.operation_failure).clone() {
            return Ok(OperationStatus::failed(error));
        }
        let mut operations = lock(&self.operations);
        let remaining = operations
            .get_mut(&handle.name)
            .ok_or_else(|| CloudError::not_found(format!("operation {}", handle.name)))?;
        if *remaining > 0 {
            *remaining -= 1;
            return Ok(OperationStatus::running());
        }
        Ok(OperationStatus::succeeded())
    }

    fn get_iam_policy(&self, name: &ClusterName) -> CloudResult<IamPolicy> {
        Ok(self.iam_policy(name))
    }

    fn set_iam_policy(&self, name: &ClusterName, policy: &IamPolicy) -> CloudResult<()> {
        lock(&self.policies).insert(name.clone(), policy.clone());
        *lock(&self.policy_writes) += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MockStorage {
    buckets: Mutex<IndexMap<String, BucketInfo>>,
    create_failures: Mutex<VecDeque<CloudError>>,
    delete_failure: Mutex<Option<CloudError>>,
    delete_calls: Mutex<usize>,
    updates: Mutex<Vec<(String, BucketUpdate)>>,
    lifecycle_clears: Mutex<usize>,
    policies: Mutex<HashMap<String, IamPolicy>>,
}

impl MockStorage {
    pub fn bucket_names(&self) -> Vec<String> {
        lock(&self.buckets).keys().cloned().collect()
    }

    pub fn insert_bucket_in_project(&self, name: &str, project_id: &str) {
        self.insert_bucket(name, project_number(project_id));
    }

    /// A bucket in some other project.
    pub fn insert_foreign_bucket(&self, name: &str) {
        self.insert_bucket(name, "999".to_string());
    }

    fn insert_bucket(&self, name: &str, project_number: String) {
        lock(&self.buckets).insert(
            name.to_string(),
            BucketInfo {
                name: name.to_string(),
                project_number,
                location: None,
                attributes: BucketAttributes::default(),
            },
        );
    }

    pub fn set_attributes(&self, name: &str, attributes: BucketAttributes) {
        if let Some(bucket) = lock(&self.buckets).get_mut(name) {
            bucket.attributes = attributes;
        }
    }

    pub fn attributes(&self, name: &str) -> BucketAttributes {
        lock(&self.buckets)
            .get(name)
            .map(|bucket| bucket.attributes.clone())
            .unwrap_or_default()
    }

    pub fn fail_next_create(&self, error: CloudError) {
        lock(&self.create_failures).push_back(error);
    }

    pub fn always_fail_delete(&self, error: CloudError) {
        *lock(&self.delete_failure) = Some(error);
    }

    pub fn delete_calls(&self) -> usize {
        *lock(&self.delete_calls)
    }

    pub fn updates(&self) -> Vec<(String, BucketUpdate)> {
        lock(&self.updates).clone()
    }

    pub fn lifecycle_clears(&self) -> usize {
        *lock(&self.lifecycle_clears)
    }
}

fn project_number(project_id: &str) -> String {
    format!("{project_id}-number")
}

impl StorageClient for MockStorage {
    fn get_bucket(&self, name: &str) -> CloudResult<BucketInfo> {
        lock(&self.buckets)
            .get(name)
            .cloned()
            .ok_or_else(|| CloudError::not_found(format!("bucket {name}")))
    }

    fn create_bucket(&self, project_id: &str, spec: &BucketSpec) -> CloudResult<BucketInfo> {
        if let Some(error) = lock(&self.create_failures).pop_front() {
            return Err(error);
        }
        let mut buckets = lock(&self.buckets);
        if buckets.contains_key(&spec.name) {
            return Err(CloudError::conflict(format!("bucket {}", spec.name)));
        }
        let bucket = BucketInfo {
            name: spec.name.clone(),
            project_number: project_number(project_id),
            location: spec.location.clone(),
            attributes: spec.attributes.clone(),
        };
        buckets.insert(spec.name.clone(), bucket.clone());
        Ok(bucket)
    }

    fn update_bucket(&self, name: &str, update: &BucketUpdate) -> CloudResult<()> {
        let mut buckets = lock(&self.buckets);
        let bucket = buckets
            .get_mut(name)
            .ok_or_else(|| CloudError::not_found(format!("bucket {name}")))?;
        if let Some(storage_class) = update.storage_class {
            bucket.attributes.storage_class = Some(storage_class);
        }
        if let Some(rules) = &update.lifecycle_rules {
            bucket.attributes.lifecycle_rules.clone_from(rules);
        }
        drop(buckets);
        lock(&self.updates).push((name.to_string(), update.clone()));
        Ok(())
    }

    fn clear_lifecycle_rules(&self, name: &str) -> CloudResult<()> {
        let mut buckets = lock(&self.buckets);
        let bucket = buckets
            .get_mut(name)
            .ok_or_else(|| CloudError::not_found(format!("bucket {name}")))?;
        bucket.attributes.lifecycle_rules.clear();
        *lock(&self.lifecycle_clears) += 1;
        Ok(())
    }

    fn delete_bucket(&self, name: &str) -> CloudResult<()> {
        *lock(&self.delete_calls) += 1;
        if let Some(error) = lock(&self.delete_failure).clone() {
            return Err(error);
        }
        lock(&self.buckets)
            .shift_remove(name)
            .map(|_| ())
            .ok_or_else(|| CloudError::not_found(format!("bucket {name}")))
    }

    fn get_iam_policy(&self, name: &str) -> CloudResult<IamPolicy> {
        Ok(lock(&self.policies).get(name).cloned().unwrap_or_default())
    }

    fn set_iam_policy(&self, name: &str, policy: &IamPolicy) -> CloudResult<()> {
        lock(&self.policies).insert(name.to_string(), policy.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MockResourceManager {
    failures: Mutex<VecDeque<CloudError>>,
}

impl MockResourceManager {
    pub fn fail_next(&self, error: CloudError) {
        lock(&self.failures).push_back(error);
    }
}

impl ResourceManagerClient for MockResourceManager {
    fn project_number(&self, project_id: &str) -> CloudResult<String> {
        if let Some(error) = lock(&self.failures).pop_front() {
            return Err(error);
        }
        Ok(project_number(project_id))
    }
}

#[derive(Default)]
pub struct MockCompute {
    subnetworks: Mutex<Vec<Subnetwork>>,
}

impl MockCompute {
    pub fn add_subnetwork(&self, subnetwork: Subnetwork) {
        lock(&self.subnetworks).push(subnetwork);
    }
}

impl ComputeClient for MockCompute {
    fn list_subnetworks(&self, _project_id: &str, _region: &str) -> CloudResult<Vec<Subnetwork>> {
        Ok(lock(&self.subnetworks).clone())
    }
}

#[derive(Default)]
pub struct MockPolicy {
    impersonation: Mutex<BTreeSet<(WorkspaceId, String)>>,
    role_bindings: Mutex<IndexMap<String, Vec<String>>>,
    deleted_policies: Mutex<Vec<ResourceId>>,
    missing_pets: Mutex<BTreeSet<String>>,
}

impl MockPolicy {
    pub fn impersonation_grants(&self) -> usize {
        lock(&self.impersonation).len()
    }

    pub fn set_role_bindings(&self, bindings: IndexMap<String, Vec<String>>) {
        *lock(&self.role_bindings) = bindings;
    }

    pub fn deleted_policies(&self) -> Vec<ResourceId> {
        lock(&self.deleted_policies).clone()
    }

    pub fn remove_pet(&self, email: &str) {
        lock(&self.missing_pets).insert(email.to_string());
    }
}

impl PolicyOracle for MockPolicy {
    fn email_for_subject(&self, subject_id: &str) -> CloudResult<String> {
        Ok(format!("{subject_id}@example.com"))
    }

    fn pet_managed_identity(
        &self,
        _workspace_id: WorkspaceId,
        user_email: &str,
    ) -> CloudResult<ManagedIdentity> {
        if lock(&self.missing_pets).contains(user_email) {
            return Err(CloudError::not_found(format!("pet of {user_email}")));
        }
        Ok(pet_identity(user_email))
    }

    fn pet_service_account(
        &self,
        _workspace_id: WorkspaceId,
        user_email: &str,
    ) -> CloudResult<String> {
        Ok(format!("pet-{user_email}"))
    }

    fn enable_pet_impersonation(
        &self,
        workspace_id: WorkspaceId,
        user_email: &str,
    ) -> CloudResult<bool> {
        Ok(lock(&self.impersonation).insert((workspace_id, user_email.to_string())))
    }

    fn disable_pet_impersonation(
        &self,
        workspace_id: WorkspaceId,
        user_email: &str,
    ) -> CloudResult<()> {
        lock(&self.impersonation).remove(&(workspace_id, user_email.to_string()));
        Ok(())
    }

    fn resource_role_bindings(
        &self,
        _resource: &ControlledResource,
    ) -> CloudResult<IndexMap<String, Vec<String>>> {
        Ok(lock(&self.role_bindings).clone())
    }

    fn delete_resource_policy(&self, resource: &ControlledResource) -> CloudResult<()> {
        let mut deleted = lock(&self.deleted_policies);
        if deleted.contains(&resource.resource_id()) {
            return Err(CloudError::not_found("policy already deleted"));
        }
        deleted.push(resource.resource_id());
        Ok(())
    }
}

/// Every mock a flight touches, shared with the [`FlightServices`] built from it
/// so tests can inspect what the steps did.
pub struct TestServices {
    pub identities: Arc<MockIdentities>,
    pub federated_credentials: Arc<MockFederatedCredentials>,
    pub kubernetes: Arc<MockKubernetes>,
    pub database_roles: Arc<MockDatabaseRoles>,
    pub dataproc: Arc<MockDataproc>,
    pub storage: Arc<MockStorage>,
    pub resource_manager: Arc<MockResourceManager>,
    pub compute: Arc<MockCompute>,
    pub policy: Arc<MockPolicy>,
    pub resources: Arc<InMemoryResourceStore>,
    pub sleeper: Arc<RecordingSleeper>,
    config: WsmConfig,
}

impl TestServices {
    pub fn new() -> Self {
        Self {
            identities: Arc::default(),
            federated_credentials: Arc::default(),
            kubernetes: Arc::default(),
            database_roles: Arc::default(),
            dataproc: Arc::default(),
            storage: Arc::default(),
            resource_manager: Arc::default(),
            compute: Arc::default(),
            policy: Arc::default(),
            resources: Arc::default(),
            sleeper: Arc::default(),
            config: WsmConfig::default(),
        }
    }

    pub fn with_azure_workspace(self, workspace_id: WorkspaceId) -> Self {
        self.resources
            .set_azure_context(workspace_id, azure_context())
            .expect("store azure context");
        self
    }

    pub fn with_gcp_workspace(self, workspace_id: WorkspaceId) -> Self {
        self.resources
            .set_gcp_context(workspace_id, gcp_context())
            .expect("store gcp context");
        self
    }

    pub fn with_resource(self, resource: ControlledResource) -> Self {
        self.resources.put_resource(resource).expect("store resource");
        self
    }

    pub fn with_bucket_delete_attempts(mut self, max_attempts: u32) -> Self {
        self.config = self
            .config
            .with_bucket_deletion(BucketDeletionConfig::default().with_max_attempts(max_attempts));
        self
    }

    pub fn settings(&self) -> OperationSettings {
        OperationSettings::from_config(&self.config)
    }

    pub fn azure_map(&self) -> WorkingMap {
        let mut map = WorkingMap::new();
        map.azure.cloud_context = Some(azure_context());
        map
    }

    pub fn gcp_map(&self) -> WorkingMap {
        let mut map = WorkingMap::new();
        map.gcp.cloud_context = Some(gcp_context());
        map
    }

    pub fn build(&self) -> FlightServices {
        let clients = CloudClients {
            identities: self.identities.clone(),
            federated_credentials: self.federated_credentials.clone(),
            kubernetes: self.kubernetes.clone(),
            database_roles: self.database_roles.clone(),
            dataproc: self.dataproc.clone(),
            storage: self.storage.clone(),
            resource_manager: self.resource_manager.clone(),
            compute: self.compute.clone(),
        };
        FlightServices::new(
            clients,
            self.policy.clone(),
            self.resources.clone(),
            self.settings(),
        )
        .with_sleeper(self.sleeper.clone())
    }
}
