use std::collections::BTreeMap;

use tracing::{debug, info, warn};
use wsm_core::{ControlledResource, GcsBucketResource};
use wsm_flight::{FlightRoles, Step, StepFailure};

use super::StepResult;
use crate::Result;
use crate::classify;
use crate::context::FlightServices;
use crate::error::OperationError;
use crate::types::{
    BucketAttributes, BucketInfo, BucketSpec, BucketUpdate, GcsBucketCreationParameters,
    LifecycleRule,
};
use crate::working_map::WorkingMap;

/// Bucket names are global, so an existing bucket only counts as ours when it
/// lives in the workspace project.
fn bucket_in_project(ctx: &FlightServices, bucket: &BucketInfo, project_id: &str) -> Result<bool> {
    let project_number = ctx
        .resource_manager()
        .project_number(project_id)
        .map_err(|e| OperationError::cloud("look up workspace project number", e))?;
    debug!(
        bucket = %bucket.name,
        bucket_project = %bucket.project_number,
        workspace_project = %project_number,
        "found existing bucket"
    );
    Ok(bucket.project_number == project_number)
}

/// Fetch a bucket that may be outside the workspace project. 403 and 404 both
/// mean it cannot be ours.
fn existing_bucket(ctx: &FlightServices, name: &str) -> Result<Option<BucketInfo>> {
    match ctx.storage().get_bucket(name) {
        Ok(bucket) => Ok(Some(bucket)),
        Err(e) if e.is_not_found() || e.is_forbidden() => Ok(None),
        Err(e) => Err(OperationError::cloud("look up existing bucket", e)),
    }
}

fn name_taken() -> OperationError {
    OperationError::DuplicateResource(
        "the provided bucket name is already in use, please choose another".to_string(),
    )
}

/// Creates the bucket in the workspace project.
pub struct CreateGcsBucketStep {
    resource: GcsBucketResource,
    parameters: GcsBucketCreationParameters,
}

impl CreateGcsBucketStep {
    #[must_use]
    pub fn new(resource: GcsBucketResource, parameters: GcsBucketCreationParameters) -> Self {
        Self {
            resource,
            parameters,
        }
    }

    fn spec(&self) -> BucketSpec {
        BucketSpec {
            name: self.resource.bucket_name.clone(),
            location: self.parameters.location.clone(),
            attributes: BucketAttributes {
                storage_class: self.parameters.storage_class,
                lifecycle_rules: self.parameters.lifecycle_rules.clone(),
            },
            labels: BTreeMap::from([
                (
                    "workspace-id".to_string(),
                    self.resource.common.workspace_id.to_string(),
                ),
                (
                    "resource-id".to_string(),
                    self.resource.common.resource_id.to_string(),
                ),
            ]),
        }
    }
}

impl Step for CreateGcsBucketStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "create_gcs_bucket"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let project_id = &map.gcp_cloud_context()?.project_id;
        let name = &self.resource.bucket_name;

        // Lookup failures are fatal, not retried.
        let existing = existing_bucket(ctx, name).map_err(StepFailure::Fatal)?;
        if let Some(bucket) = existing {
            return if bucket_in_project(ctx, &bucket, project_id).map_err(StepFailure::Fatal)? {
                info!(bucket = %name, "bucket already exists in workspace project");
                Ok(())
            } else {
                Err(StepFailure::Fatal(name_taken()))
            };
        }

        match ctx.storage().create_bucket(project_id, &self.spec()) {
            Ok(_) => {
                info!(bucket = %name, project = %project_id, "created bucket");
                Ok(())
            }
            Err(e) if e.is_conflict() => Err(StepFailure::Fatal(name_taken())),
            Err(e) => Err(OperationError::cloud("create bucket", e).into()),
        }
    }

    fn undo_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let project_id = &map.gcp_cloud_context()?.project_id;
        let name = &self.resource.bucket_name;
        let Some(bucket) = existing_bucket(ctx, name)? else {
            return Ok(());
        };
        if !bucket_in_project(ctx, &bucket, project_id)? {
            warn!(bucket = %name, "bucket belongs to another project, leaving it");
            return Ok(());
        }
        classify::deleted(ctx.storage().delete_bucket(name))
            .map_err(|e| OperationError::cloud("delete bucket", e))?;
        Ok(())
    }

    fn undo_description(&self) -> String {
        format!("delete bucket '{}'", self.resource.bucket_name)
    }
}

/// Grants the bucket's policy bindings on the bucket's IAM policy.
pub struct GcsBucketCloudSyncStep {
    resource: GcsBucketResource,
}

impl GcsBucketCloudSyncStep {
    #[must_use]
    pub fn new(resource: GcsBucketResource) -> Self {
        Self { resource }
    }
}

impl Step for GcsBucketCloudSyncStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "gcs_bucket_cloud_sync"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE
    }

    fn do_step(&self, ctx: &FlightServices, _map: &mut WorkingMap) -> StepResult {
        let name = &self.resource.bucket_name;
        let bindings = ctx
            .policy()
            .resource_role_bindings(&ControlledResource::from(self.resource.clone()))
            .map_err(|e| OperationError::cloud("read resource role bindings", e))?;
        let mut policy = ctx
            .storage()
            .get_iam_policy(name)
            .map_err(|e| OperationError::cloud("get bucket iam policy", e))?;
        if policy.merge(&bindings) {
            ctx.storage()
                .set_iam_policy(name, &policy)
                .map_err(|e| OperationError::cloud("set bucket iam policy", e))?;
            info!(bucket = %name, roles = bindings.len(), "synced bucket iam policy");
        }
        Ok(())
    }
}

/// Empties and deletes a bucket.
///
/// Objects are removed by a lifecycle rule, which the storage service applies
/// asynchronously, so each attempt re-applies the rule and tries the delete,
/// then waits the configured interval before the next attempt.
pub struct DeleteGcsBucketStep {
    bucket_name: String,
}

impl DeleteGcsBucketStep {
    #[must_use]
    pub fn new(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
        }
    }

    fn delete(&self, ctx: &FlightServices) -> Result<()> {
        let name = &self.bucket_name;
        let max_attempts = ctx.settings().bucket_delete_max_attempts();
        let expire_everything = BucketUpdate {
            storage_class: None,
            lifecycle_rules: Some(vec![LifecycleRule::delete_all_objects()]),
        };

        for attempt in 1..=max_attempts {
            match ctx.storage().update_bucket(name, &expire_everything) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    info!(bucket = %name, "bucket already deleted");
                    return Ok(());
                }
                Err(e) => warn!(
                    bucket = %name,
                    attempt,
                    error = %e,
                    "failed to set delete lifecycle rule"
                ),
            }

            match classify::deleted(ctx.storage().delete_bucket(name)) {
                Ok(_) => {
                    info!(bucket = %name, attempt, "deleted bucket");
                    return Ok(());
                }
                Err(e) => {
                    debug!(bucket = %name, attempt, error = %e, "bucket not deleted yet");
                }
            }

            if attempt < max_attempts {
                ctx.sleeper().sleep(ctx.settings().bucket_delete_interval());
            }
        }

        Err(OperationError::BucketDeleteTimeout {
            bucket: name.clone(),
            attempts: max_attempts,
        })
    }
}

impl Step for DeleteGcsBucketStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "delete_gcs_bucket"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::DELETE
    }

    fn do_step(&self, ctx: &FlightServices, _map: &mut WorkingMap) -> StepResult {
        self.delete(ctx)?;
        Ok(())
    }

    fn reversible(&self) -> bool {
        false
    }
}

/// Captures the bucket's current attributes for the update's undo.
pub struct RetrieveGcsBucketAttributesStep {
    bucket_name: String,
}

impl RetrieveGcsBucketAttributesStep {
    #[must_use]
    pub fn new(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
        }
    }
}

impl Step for RetrieveGcsBucketAttributesStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "retrieve_gcs_bucket_attributes"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::UPDATE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let bucket = ctx
            .storage()
            .get_bucket(&self.bucket_name)
            .map_err(|e| OperationError::cloud("get bucket", e))?;
        WorkingMap::set_once(&mut map.update.previous_bucket, bucket.attributes);
        Ok(())
    }
}

/// Applies a storage class and lifecycle rule change.
pub struct UpdateGcsBucketStep {
    bucket_name: String,
    update: BucketUpdate,
}

impl UpdateGcsBucketStep {
    #[must_use]
    pub fn new(bucket_name: impl Into<String>, update: BucketUpdate) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            update,
        }
    }

    fn apply(&self, ctx: &FlightServices, update: &BucketUpdate) -> Result<()> {
        let name = &self.bucket_name;
        if let Some(rules) = &update.lifecycle_rules {
            // Rules replace the existing set rather than merging into it.
            ctx.storage()
                .clear_lifecycle_rules(name)
                .map_err(|e| OperationError::cloud("clear bucket lifecycle rules", e))?;
            if !rules.is_empty() {
                let rules_only = BucketUpdate {
                    storage_class: None,
                    lifecycle_rules: Some(rules.clone()),
                };
                ctx.storage()
                    .update_bucket(name, &rules_only)
                    .map_err(|e| OperationError::cloud("set bucket lifecycle rules", e))?;
            }
        }
        if let Some(storage_class) = update.storage_class {
            let class_only = BucketUpdate {
                storage_class: Some(storage_class),
                lifecycle_rules: None,
            };
            ctx.storage()
                .update_bucket(name, &class_only)
                .map_err(|e| OperationError::cloud("set bucket storage class", e))?;
        }
        Ok(())
    }
}

impl Step for UpdateGcsBucketStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "update_gcs_bucket"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::UPDATE
    }

    fn do_step(&self, ctx: &FlightServices, _map: &mut WorkingMap) -> StepResult {
        if self.update.is_empty() {
            debug!(bucket = %self.bucket_name, "nothing to update");
            return Ok(());
        }
        self.apply(ctx, &self.update)?;
        info!(bucket = %self.bucket_name, "updated bucket");
        Ok(())
    }

    fn undo_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        if self.update.is_empty() {
            return Ok(());
        }
        let previous = WorkingMap::require(&map.update.previous_bucket, "update.previous_bucket")?;
        let restore = BucketUpdate::restoring(previous, &self.update);
        self.apply(ctx, &restore)?;
        Ok(())
    }

    fn undo_description(&self) -> String {
        format!("restore attributes of bucket '{}'", self.bucket_name)
    }
}
