use std::sync::Arc;
use std::time::Duration;

use wsm_config::{PollWindow, WsmConfig};
use wsm_flight::{RetryPolicy, Sleeper, ThreadSleeper};

use crate::traits::{
    ComputeClient, DataprocClient, DatabaseRoleRunner, FederatedCredentialClient,
    KubernetesClient, ManagedIdentityClient, PolicyOracle, ResourceManagerClient, ResourceStore,
    StorageClient,
};

/// Retry profiles and loop bounds the planners and steps run with.
#[derive(Debug, Clone)]
pub struct OperationSettings {
    cloud_retry: RetryPolicy,
    long_sync_retry: RetryPolicy,
    short_database_retry: RetryPolicy,
    dataproc_create: PollWindow,
    dataproc_delete: PollWindow,
    namespace_delete: PollWindow,
    bucket_delete_interval: Duration,
    bucket_delete_max_attempts: u32,
}

impl OperationSettings {
    #[must_use]
    pub fn from_config(config: &WsmConfig) -> Self {
        Self {
            cloud_retry: config.retry().cloud(),
            long_sync_retry: config.retry().long_sync(),
            short_database_retry: config.retry().short_database(),
            dataproc_create: config.polling().dataproc_create(),
            dataproc_delete: config.polling().dataproc_delete(),
            namespace_delete: config.polling().namespace_delete(),
            bucket_delete_interval: config.bucket_deletion().interval(),
            bucket_delete_max_attempts: config.bucket_deletion().max_attempts(),
        }
    }

    #[must_use]
    pub fn cloud_retry(&self) -> &RetryPolicy {
        &self.cloud_retry
    }

    #[must_use]
    pub fn long_sync_retry(&self) -> &RetryPolicy {
        &self.long_sync_retry
    }

    #[must_use]
    pub fn short_database_retry(&self) -> &RetryPolicy {
        &self.short_database_retry
    }

    #[must_use]
    pub fn dataproc_create(&self) -> PollWindow {
        self.dataproc_create
    }

    #[must_use]
    pub fn dataproc_delete(&self) -> PollWindow {
        self.dataproc_delete
    }

    #[must_use]
    pub fn namespace_delete(&self) -> PollWindow {
        self.namespace_delete
    }

    #[must_use]
    pub fn bucket_delete_interval(&self) -> Duration {
        self.bucket_delete_interval
    }

    #[must_use]
    pub fn bucket_delete_max_attempts(&self) -> u32 {
        self.bucket_delete_max_attempts
    }
}

impl Default for OperationSettings {
    fn default() -> Self {
        Self::from_config(&WsmConfig::default())
    }
}

/// The cloud services steps call.
pub struct CloudClients {
    pub identities: Arc<dyn ManagedIdentityClient>,
    pub federated_credentials: Arc<dyn FederatedCredentialClient>,
    pub kubernetes: Arc<dyn KubernetesClient>,
    pub database_roles: Arc<dyn DatabaseRoleRunner>,
    pub dataproc: Arc<dyn DataprocClient>,
    pub storage: Arc<dyn StorageClient>,
    pub resource_manager: Arc<dyn ResourceManagerClient>,
    pub compute: Arc<dyn ComputeClient>,
}

/// Everything a step needs besides the working map: the flight context.
pub struct FlightServices {
    clients: CloudClients,
    policy: Arc<dyn PolicyOracle>,
    resources: Arc<dyn ResourceStore>,
    sleeper: Arc<dyn Sleeper>,
    settings: OperationSettings,
}

impl FlightServices {
    #[must_use]
    pub fn new(
        clients: CloudClients,
        policy: Arc<dyn PolicyOracle>,
        resources: Arc<dyn ResourceStore>,
        settings: OperationSettings,
    ) -> Self {
        Self {
            clients,
            policy,
            resources,
            sleeper: Arc::new(ThreadSleeper),
            settings,
        }
    }

    /// Replace the sleeper used by polling and bucket deletion.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    #[must_use]
    pub fn identities(&self) -> &dyn ManagedIdentityClient {
        self.clients.identities.as_ref()
    }

    #[must_use]
    pub fn federated_credentials(&self) -> &dyn FederatedCredentialClient {
        self.clients.federated_credentials.as_ref()
    }

    #[must_use]
    pub fn kubernetes(&self) -> &dyn KubernetesClient {
        self.clients.kubernetes.as_ref()
    }

    #[must_use]
    pub fn database_roles(&self) -> &dyn DatabaseRoleRunner {
        self.clients.database_roles.as_ref()
    }

    #[must_use]
    pub fn dataproc(&self) -> &dyn DataprocClient {
        self.clients.dataproc.as_ref()
    }

    #[must_use]
    pub fn storage(&self) -> &dyn StorageClient {
        self.clients.storage.as_ref()
    }

    #[must_use]
    pub fn resource_manager(&self) -> &dyn ResourceManagerClient {
        self.clients.resource_manager.as_ref()
    }

    #[must_use]
    pub fn compute(&self) -> &dyn ComputeClient {
        self.clients.compute.as_ref()
    }

    #[must_use]
    pub fn policy(&self) -> &dyn PolicyOracle {
        self.policy.as_ref()
    }

    #[must_use]
    pub fn resources(&self) -> &dyn ResourceStore {
        self.resources.as_ref()
    }

    #[must_use]
    pub fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper.as_ref()
    }

    #[must_use]
    pub fn settings(&self) -> &OperationSettings {
        &self.settings
    }
}
