use wsm_core::{ControlledResource, ResourceKind};

use super::{PlannedStep, ResourcePlanner, planned, require_user};
use crate::Result;
use crate::context::OperationSettings;
use crate::error::OperationError;
use crate::steps::{
    CreateDataprocClusterStep, DataprocClusterCloudSyncStep, DeleteDataprocClusterStep,
    GrantPetUsagePermissionStep, RetrieveDataprocClusterAttributesStep, RetrieveNetworkNameStep,
    UpdateDataprocClusterStep, ValidateDataprocClusterStep,
};
use crate::types::{CreationParameters, FlightInputs, UpdateParameters};

pub struct DataprocClusterPlanner;

impl ResourcePlanner for DataprocClusterPlanner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::DataprocCluster
    }

    fn create_steps(
        &self,
        resource: &ControlledResource,
        inputs: &FlightInputs,
        settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        let cluster = resource.as_dataproc_cluster()?;
        let user = require_user(inputs)?;
        let Some(CreationParameters::DataprocCluster(parameters)) = &inputs.creation else {
            return Err(OperationError::MissingInput {
                name: "creation.dataproc_cluster",
            });
        };

        Ok(vec![
            planned(
                RetrieveNetworkNameStep::new(cluster.region()),
                settings.cloud_retry(),
            ),
            planned(
                GrantPetUsagePermissionStep::new(cluster.common.workspace_id, user.clone()),
                settings.cloud_retry(),
            ),
            planned(
                CreateDataprocClusterStep::new(cluster.clone(), parameters.clone(), user.clone()),
                settings.cloud_retry(),
            ),
            planned(
                DataprocClusterCloudSyncStep::new(cluster.clone()),
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
        let cluster = resource.as_dataproc_cluster()?;
        Ok(vec![planned(
            DeleteDataprocClusterStep::new(cluster.clone()),
            settings.cloud_retry(),
        )])
    }

    fn update_steps(
        &self,
        resource: &ControlledResource,
        inputs: &FlightInputs,
        settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        let cluster = resource.as_dataproc_cluster()?;
        let Some(UpdateParameters::DataprocCluster(attributes)) = &inputs.update else {
            return Err(OperationError::MissingInput {
                name: "update.dataproc_cluster",
            });
        };

        Ok(vec![
            planned(
                ValidateDataprocClusterStep::new(cluster.clone()),
                settings.cloud_retry(),
            ),
            planned(
                RetrieveDataprocClusterAttributesStep::new(cluster.clone()),
                settings.cloud_retry(),
            ),
            planned(
                UpdateDataprocClusterStep::new(cluster.clone(), attributes.clone()),
                settings.cloud_retry(),
            ),
        ])
    }
}
