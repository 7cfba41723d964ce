use crate::error::FlightBuildError;
use crate::flight::{Flight, FlightStep};
use crate::id::FlightId;
use crate::retry::RetryPolicy;
use crate::roles::FlightRole;
use crate::step::Step;

/// Assembles a [`Flight`] for one role.
///
/// Every step added must declare the flight's role in [`Step::roles`];
/// [`FlightBuilder::build`] rejects the flight otherwise.
///
/// # Example
///
/// ```ignore
/// let flight = FlightBuilder::new("create-bucket", FlightRole::Create)
///     .step(CreateBucket, RetryPolicy::cloud())
///     .step(SyncBucketIam, RetryPolicy::long_sync())
///     .build()?;
/// ```
pub struct FlightBuilder<C, M, E> {
    id: FlightId,
    name: String,
    role: FlightRole,
    steps: Vec<FlightStep<C, M, E>>,
}

impl<C, M, E> FlightBuilder<C, M, E> {
    #[must_use]
    pub fn new(name: impl Into<String>, role: FlightRole) -> Self {
        Self {
            id: FlightId::new(),
            name: name.into(),
            role,
            steps: Vec::new(),
        }
    }

    /// Reuse an existing flight id, for resuming a persisted flight.
    #[must_use]
    pub fn with_id(mut self, id: FlightId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn step<S>(mut self, step: S, policy: RetryPolicy) -> Self
    where
        S: Step<Context = C, WorkingMap = M, Error = E> + 'static,
    {
        self.steps.push(FlightStep::new(step, policy));
        self
    }

    #[must_use]
    pub fn steps(mut self, steps: impl IntoIterator<Item = FlightStep<C, M, E>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Build the flight.
    ///
    /// # Errors
    ///
    /// Returns `FlightBuildError::RoleNotSupported` if a step does not declare
    /// the flight's role.
    pub fn build(self) -> Result<Flight<C, M, E>, FlightBuildError> {
        if let Some(step) = self
            .steps
            .iter()
            .find(|entry| !entry.step().roles().contains(self.role))
        {
            return Err(FlightBuildError::RoleNotSupported {
                step: step.name().to_string(),
                role: self.role,
                supported: step.step().roles().to_string(),
            });
        }

        Ok(Flight::from_parts(self.id, self.name, self.role, self.steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::StepResult;
    use crate::roles::FlightRoles;

    struct Noop {
        name: &'static str,
        roles: FlightRoles,
    }

    impl Step for Noop {
        type Context = ();
        type WorkingMap = ();
        type Error = String;

        fn name(&self) -> &'static str {
            self.name
        }

        fn roles(&self) -> FlightRoles {
            self.roles
        }

        fn do_step(&self, _ctx: &(), _map: &mut ()) -> StepResult<String> {
            Ok(())
        }
    }

    #[test]
    fn builds_steps_in_order() -> anyhow::Result<()> {
        let flight = FlightBuilder::new("create", FlightRole::Create)
            .step(
                Noop {
                    name: "guard",
                    roles: FlightRoles::CREATE,
                },
                RetryPolicy::cloud(),
            )
            .step(
                Noop {
                    name: "create",
                    roles: FlightRoles::CREATE.union(FlightRoles::CLONE),
                },
                RetryPolicy::short_database(),
            )
            .build()?;

        assert_eq!(flight.step_names(), vec!["guard", "create"]);
        assert_eq!(flight.steps()[1].policy().name(), "short_database");
        assert_eq!(flight.role(), FlightRole::Create);
        Ok(())
    }

    #[test]
    fn rejects_step_without_flight_role() {
        let result = FlightBuilder::new("delete", FlightRole::Delete)
            .step(
                Noop {
                    name: "guard",
                    roles: FlightRoles::CREATE,
                },
                RetryPolicy::cloud(),
            )
            .build();

        assert!(matches!(
            result,
            Err(FlightBuildError::RoleNotSupported { ref step, role: FlightRole::Delete, .. })
                if step == "guard"
        ));
    }

    #[test]
    fn empty_flight_is_allowed() -> anyhow::Result<()> {
        let flight: Flight<(), (), String> =
            FlightBuilder::new("noop", FlightRole::Update).build()?;
        assert!(flight.is_empty());
        Ok(())
    }

    #[test]
    fn with_id_keeps_given_id() -> anyhow::Result<()> {
        let id = FlightId::new();
        let flight: Flight<(), (), String> = FlightBuilder::new("resume", FlightRole::Create)
            .with_id(id)
            .build()?;
        assert_eq!(flight.id(), id);
        Ok(())
    }
}
