use wsm_core::{ControlledResource, ResourceKind};

use super::{PlannedStep, ResourcePlanner, planned};
use crate::Result;
use crate::context::OperationSettings;
use crate::error::OperationError;
use crate::steps::{
    CopyAzureManagedIdentityDefinitionStep, CreateAzureManagedIdentityStep,
    DeleteAzureManagedIdentityStep, GetAzureManagedIdentityStep,
};
use crate::types::FlightInputs;

pub struct ManagedIdentityPlanner;

impl ResourcePlanner for ManagedIdentityPlanner {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ManagedIdentity
    }

    fn create_steps(
        &self,
        resource: &ControlledResource,
        _inputs: &FlightInputs,
        settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        let identity = resource.as_managed_identity()?;
        Ok(vec![
            planned(
                GetAzureManagedIdentityStep::new(identity.clone()),
                settings.cloud_retry(),
            ),
            planned(
                CreateAzureManagedIdentityStep::new(identity.clone()),
                settings.cloud_retry(),
            ),
        ])
    }

    fn delete_steps(
        &self,
        resource: &ControlledResource,
        _inputs: &FlightInputs,
        settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        let identity = resource.as_managed_identity()?;
        Ok(vec![planned(
            DeleteAzureManagedIdentityStep::new(identity.clone()),
            settings.cloud_retry(),
        )])
    }

    fn clone_steps(
        &self,
        resource: &ControlledResource,
        inputs: &FlightInputs,
        settings: &OperationSettings,
    ) -> Result<Vec<PlannedStep>> {
        let identity = resource.as_managed_identity()?;
        let destination = inputs
            .clone
            .clone()
            .ok_or(OperationError::MissingInput { name: "clone" })?;
        Ok(vec![planned(
            CopyAzureManagedIdentityDefinitionStep::new(identity.clone(), destination),
            settings.cloud_retry(),
        )])
    }
}

#[cfg(test)]
mod tests {
    use wsm_core::{ResourceId, WorkspaceId};

    use super::*;
    use crate::mocks::managed_identity_resource;
    use crate::types::CloneDestination;

    fn resource() -> ControlledResource {
        managed_identity_resource(WorkspaceId::new(), "analysis-id").into()
    }

    fn names(steps: &[PlannedStep]) -> Vec<&'static str> {
        steps.iter().map(PlannedStep::name).collect()
    }

    #[test]
    fn create_guards_before_creating() -> anyhow::Result<()> {
        let steps = ManagedIdentityPlanner.create_steps(
            &resource(),
            &FlightInputs::default(),
            &OperationSettings::default(),
        )?;

        assert_eq!(
            names(&steps),
            vec!["get_azure_managed_identity", "create_azure_managed_identity"]
        );
        Ok(())
    }

    #[test]
    fn clone_needs_destination() -> anyhow::Result<()> {
        let settings = OperationSettings::default();
        let err = ManagedIdentityPlanner
            .clone_steps(&resource(), &FlightInputs::default(), &settings)
            .expect_err("no destination");
        assert!(matches!(err, OperationError::MissingInput { name: "clone" }));

        let inputs = FlightInputs {
            clone: Some(CloneDestination {
                workspace_id: WorkspaceId::new(),
                resource_id: ResourceId::new(),
                name: None,
                description: None,
            }),
            ..FlightInputs::default()
        };
        let steps = ManagedIdentityPlanner.clone_steps(&resource(), &inputs, &settings)?;
        assert_eq!(names(&steps), vec!["copy_azure_managed_identity_definition"]);
        Ok(())
    }

    #[test]
    fn update_is_unsupported() {
        let err = ManagedIdentityPlanner
            .update_steps(
                &resource(),
                &FlightInputs::default(),
                &OperationSettings::default(),
            )
            .expect_err("unsupported");

        assert!(matches!(
            err,
            OperationError::UnsupportedOperation {
                kind: ResourceKind::ManagedIdentity,
                ..
            }
        ));
    }
}
