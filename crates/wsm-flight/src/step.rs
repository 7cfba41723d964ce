use crate::result::StepResult;
use crate::roles::FlightRoles;

/// A step in a flight that can be done and undone.
///
/// Steps carry no mutable state of their own. Everything a step discovers
/// while running goes into the flight's working map, which later steps and
/// the step's own `undo_step` read back.
///
/// # Type Parameters
///
/// - `Context`: Shared dependencies (clients, stores, settings)
/// - `WorkingMap`: Per-flight mutable state passed between steps
/// - `Error`: The error type carried by retryable and fatal failures
pub trait Step: Send + Sync {
    /// Shared context providing dependencies.
    type Context;

    /// Mutable state shared by all steps of one flight.
    type WorkingMap;

    /// Error type for step failures.
    type Error;

    /// Stable name for logging, audit records and structural comparison.
    fn name(&self) -> &'static str;

    /// Flight roles this step may appear in.
    fn roles(&self) -> FlightRoles;

    /// Perform one unit of forward work.
    ///
    /// The executor may call this more than once for the same flight, so it
    /// must be safe to re-run after a partial or complete earlier attempt.
    ///
    /// # Errors
    ///
    /// Returns [`StepFailure::Retry`](crate::StepFailure::Retry) for transient
    /// failures and [`StepFailure::Fatal`](crate::StepFailure::Fatal) for
    /// failures a retry cannot fix.
    fn do_step(&self, ctx: &Self::Context, map: &mut Self::WorkingMap)
    -> StepResult<Self::Error>;

    /// Reverse the effects of a completed `do_step`.
    ///
    /// Only called for steps whose `do_step` succeeded. The default is a no-op,
    /// suitable for guard and read-only steps.
    ///
    /// # Errors
    ///
    /// Returns a failure if the reversal could not be completed.
    fn undo_step(
        &self,
        ctx: &Self::Context,
        map: &mut Self::WorkingMap,
    ) -> StepResult<Self::Error> {
        let _ = (ctx, map);
        Ok(())
    }

    /// Whether `undo_step` can actually reverse this step.
    ///
    /// Irreversible steps (physical deletes) are skipped by the undo cascade;
    /// the executor logs them and the flight surfaces the original failure.
    fn reversible(&self) -> bool {
        true
    }

    /// Human-readable description of what undo will do.
    fn undo_description(&self) -> String {
        format!("undo {}", self.name())
    }
}

/// A step boxed behind its context, working map and error types.
pub type BoxedStep<C, M, E> = Box<dyn Step<Context = C, WorkingMap = M, Error = E>>;
