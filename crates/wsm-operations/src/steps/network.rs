use tracing::debug;
use wsm_flight::{FlightRoles, Step};

use super::StepResult;
use crate::context::FlightServices;
use crate::error::OperationError;
use crate::working_map::WorkingMap;

/// Finds the workspace project's subnetwork in the cluster's region.
pub struct RetrieveNetworkNameStep {
    region: String,
}

impl RetrieveNetworkNameStep {
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

impl Step for RetrieveNetworkNameStep {
    type Context = FlightServices;
    type WorkingMap = WorkingMap;
    type Error = OperationError;

    fn name(&self) -> &'static str {
        "retrieve_network_name"
    }

    fn roles(&self) -> FlightRoles {
        FlightRoles::CREATE
    }

    fn do_step(&self, ctx: &FlightServices, map: &mut WorkingMap) -> StepResult {
        let project_id = map.gcp_cloud_context()?.project_id.clone();
        let subnetworks = ctx
            .compute()
            .list_subnetworks(&project_id, &self.region)
            .map_err(|e| OperationError::cloud("list subnetworks", e))?;
        let subnetwork = subnetworks
            .into_iter()
            .find(|subnetwork| subnetwork.region == self.region)
            .ok_or_else(|| {
                OperationError::ResourceNotFound(format!(
                    "no subnetwork in region '{}' of project '{project_id}'",
                    self.region
                ))
            })?;
        debug!(subnetwork = %subnetwork.name, network = %subnetwork.network, "found subnetwork");
        map.gcp.subnetwork = Some(subnetwork);
        Ok(())
    }
}
