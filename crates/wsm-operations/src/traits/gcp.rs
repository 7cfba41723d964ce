use super::CloudResult;
use crate::types::{
    BucketInfo, BucketSpec, BucketUpdate, ClusterInfo, ClusterName, ClusterPatch, ClusterSpec,
    IamPolicy, OperationHandle, OperationStatus, Subnetwork,
};

/// Google Dataproc clusters.
pub trait DataprocClient: Send + Sync {
    /// Starts creating a cluster.
    ///
    /// # Errors
    ///
    /// Returns a 409 error if the cluster already exists, 400 for an invalid spec.
    fn create_cluster(&self, spec: &ClusterSpec) -> CloudResult<OperationHandle>;

    /// # Errors
    ///
    /// Returns a 404 error if the cluster does not exist.
    fn get_cluster(&self, name: &ClusterName) -> CloudResult<ClusterInfo>;

    /// Starts patching the fields named in the patch's update mask.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster cannot be patched.
    fn update_cluster(&self, name: &ClusterName, patch: &ClusterPatch)
    -> CloudResult<OperationHandle>;

    /// Starts deleting a cluster.
    ///
    /// # Errors
    ///
    /// Returns a 404 error if the cluster does not exist.
    fn delete_cluster(&self, name: &ClusterName) -> CloudResult<OperationHandle>;

    /// # Errors
    ///
    /// Returns an error if the operation cannot be read.
    fn get_operation(&self, handle: &OperationHandle) -> CloudResult<OperationStatus>;

    /// # Errors
    ///
    /// Returns an error if the policy cannot be read.
    fn get_iam_policy(&self, name: &ClusterName) -> CloudResult<IamPolicy>;

    /// # Errors
    ///
    /// Returns an error if the policy cannot be written, including etag mismatches.
    fn set_iam_policy(&self, name: &ClusterName, policy: &IamPolicy) -> CloudResult<()>;
}

/// Google Cloud Storage buckets.
pub trait StorageClient: Send + Sync {
    /// # Errors
    ///
    /// Returns a 404 error if the bucket does not exist, 403 if it exists but
    /// is not visible to the caller.
    fn get_bucket(&self, name: &str) -> CloudResult<BucketInfo>;

    /// # Errors
    ///
    /// Returns a 409 error if the name is taken, 400 for an invalid spec.
    fn create_bucket(&self, project_id: &str, spec: &BucketSpec) -> CloudResult<BucketInfo>;

    /// Applies the settings present in `update`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket cannot be updated.
    fn update_bucket(&self, name: &str, update: &BucketUpdate) -> CloudResult<()>;

    /// Removes every lifecycle rule from the bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket cannot be updated.
    fn clear_lifecycle_rules(&self, name: &str) -> CloudResult<()>;

    /// Deletes an empty bucket.
    ///
    /// # Errors
    ///
    /// Returns a 404 error if the bucket does not exist, 409 while objects remain.
    fn delete_bucket(&self, name: &str) -> CloudResult<()>;

    /// # Errors
    ///
    /// Returns an error if the policy cannot be read.
    fn get_iam_policy(&self, name: &str) -> CloudResult<IamPolicy>;

    /// # Errors
    ///
    /// Returns an error if the policy cannot be written, including etag mismatches.
    fn set_iam_policy(&self, name: &str, policy: &IamPolicy) -> CloudResult<()>;
}

/// Google Cloud Resource Manager.
pub trait ResourceManagerClient: Send + Sync {
    /// The numeric project number for a project id.
    ///
    /// # Errors
    ///
    /// Returns an error if the project cannot be read.
    fn project_number(&self, project_id: &str) -> CloudResult<String>;
}

/// Google Compute Engine networking.
pub trait ComputeClient: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the subnetworks cannot be listed.
    fn list_subnetworks(&self, project_id: &str, region: &str) -> CloudResult<Vec<Subnetwork>>;
}
