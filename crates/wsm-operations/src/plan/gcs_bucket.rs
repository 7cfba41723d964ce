use wsm_core::{ControlledResource, ResourceKind};

use super::{PlannedStep, ResourcePlanner, planned};
use crate::Result;
use crate::context::OperationSettings;
use crate::error::OperationError;
use crate::steps::{
    CreateGcsBucketStep, DeleteGcsBucketStep, GcsBucketCloudSyncStep,
    RetrieveGcsBucketAttributesStep, UpdateGcsBucketStep,
};
use crate::types::{CreationParameters, FlightInputs, UpdateParameters};

pub struct GcsBucketPlanner;

impl ResourcePlanner for GcsBucketPlanner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::GcsBucket
    }

    fn create_steps(
        &self,
        resource: &ControlledResource,
        inputs: &FlightInputs,
        settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        let bucket = resource.as_gcs_bucket()?;
        let parameters = match &inputs.creation {
            Some(CreationParameters::GcsBucket(parameters)) => parameters.clone(),
            None => Default::default(),
            Some(other) => {
                return Err(OperationError::BadRequest(format!(
                    "gcs bucket cannot be created with {other:?}"
                )));
            }
        };

        Ok(vec![
            planned(
                CreateGcsBucketStep::new(bucket.clone(), parameters),
                settings.cloud_retry(),
            ),
            planned(
                GcsBucketCloudSyncStep::new(bucket.clone()),
                settings.long_sync_retry(),
            ),
        ])
    }

    fn delete_steps(
        &self,
        resource: &ControlledResource,
        _inputs: &FlightInputs,
        settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        let bucket = resource.as_gcs_bucket()?;
        Ok(vec![planned(
            DeleteGcsBucketStep::new(bucket.bucket_name.clone()),
            settings.cloud_retry(),
        )])
    }

    fn update_steps(
        &self,
        resource: &ControlledResource,
        inputs: &FlightInputs,
        settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        let bucket = resource.as_gcs_bucket()?;
        let Some(UpdateParameters::GcsBucket(update)) = &inputs.update else {
            return Err(OperationError::MissingInput {
                name: "update.gcs_bucket",
            });
        };

        Ok(vec![
            planned(
                RetrieveGcsBucketAttributesStep::new(bucket.bucket_name.clone()),
                settings.cloud_retry(),
            ),
            planned(
                UpdateGcsBucketStep::new(bucket.bucket_name.clone(), update.clone()),
                settings.cloud_retry(),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use wsm_core::WorkspaceId;

    use super::*;
    use crate::mocks::gcs_bucket_resource;
    use crate::types::{BucketUpdate, ClusterAttributes, StorageClass};

    fn names(steps: &[PlannedStep]) -> Vec<&'static str> {
        steps.iter().map(PlannedStep::name).collect()
    }

    #[test]
    fn create_uses_default_parameters() -> anyhow::Result<()> {
        let resource: ControlledResource =
            gcs_bucket_resource(WorkspaceId::new(), "analysis-bucket").into();

        let steps = GcsBucketPlanner.create_steps(
            &resource,
            &FlightInputs::default(),
            &OperationSettings::default(),
        )?;

        assert_eq!(names(&steps), vec!["create_gcs_bucket", "gcs_bucket_cloud_sync"]);
        Ok(())
    }

    #[test]
    fn update_captures_then_applies() -> anyhow::Result<()> {
        let resource: ControlledResource =
            gcs_bucket_resource(WorkspaceId::new(), "analysis-bucket").into();
        let inputs = FlightInputs {
            update: Some(UpdateParameters::GcsBucket(BucketUpdate {
                storage_class: Some(StorageClass::Nearline),
                lifecycle_rules: None,
            })),
            ..FlightInputs::default()
        };

        let steps =
            GcsBucketPlanner.update_steps(&resource, &inputs, &OperationSettings::default())?;

        assert_eq!(
            names(&steps),
            vec!["retrieve_gcs_bucket_attributes", "update_gcs_bucket"]
        );
        Ok(())
    }

    #[test]
    fn update_with_cluster_attributes_is_rejected() {
        let resource: ControlledResource =
            gcs_bucket_resource(WorkspaceId::new(), "analysis-bucket").into();
        let inputs = FlightInputs {
            update: Some(UpdateParameters::DataprocCluster(ClusterAttributes::default())),
            ..FlightInputs::default()
        };

        let err = GcsBucketPlanner
            .update_steps(&resource, &inputs, &OperationSettings::default())
            .expect_err("wrong parameters");

        assert!(matches!(err, OperationError::MissingInput { .. }));
    }
}
