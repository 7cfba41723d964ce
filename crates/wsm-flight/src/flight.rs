use crate::id::FlightId;
use crate::retry::RetryPolicy;
use crate::roles::FlightRole;
use crate::step::{BoxedStep, Step};

/// A step paired with the retry policy the executor applies to it.
pub struct FlightStep<C, M, E> {
    step: BoxedStep<C, M, E>,
    policy: RetryPolicy,
}

impl<C, M, E> FlightStep<C, M, E> {
    pub fn new<S>(step: S, policy: RetryPolicy) -> Self
    where
        S: Step<Context = C, WorkingMap = M, Error = E> + 'static,
    {
        Self {
            step: Box::new(step),
            policy,
        }
    }

    #[must_use]
    pub fn step(&self) -> &dyn Step<Context = C, WorkingMap = M, Error = E> {
        self.step.as_ref()
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.step.name()
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<C, M, E> std::fmt::Debug for FlightStep<C, M, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightStep")
            .field("step", &self.step.name())
            .field("policy", &self.policy.name())
            .finish()
    }
}

/// An assembled flight ready for execution.
///
/// Steps run strictly in list order. When a step fails fatally, the steps
/// that completed before it are undone in exactly the reverse order.
pub struct Flight<C, M, E> {
    id: FlightId,
    name: String,
    role: FlightRole,
    steps: Vec<FlightStep<C, M, E>>,
}

impl<C, M, E> Flight<C, M, E> {
    pub(crate) fn from_parts(
        id: FlightId,
        name: String,
        role: FlightRole,
        steps: Vec<FlightStep<C, M, E>>,
    ) -> Self {
        Self {
            id,
            name,
            role,
            steps,
        }
    }

    #[must_use]
    pub fn id(&self) -> FlightId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn role(&self) -> FlightRole {
        self.role
    }

    #[must_use]
    pub fn steps(&self) -> &[FlightStep<C, M, E>] {
        &self.steps
    }

    #[must_use]
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(FlightStep::name).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<C, M, E> std::fmt::Debug for Flight<C, M, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flight")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("steps", &self.steps)
            .finish()
    }
}
