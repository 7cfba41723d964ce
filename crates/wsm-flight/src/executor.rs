use std::fmt::{Debug, Display};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::audit::{FlightAuditLog, StepStatus};
use crate::error::{FlightError, StoreError, UndoError};
use crate::flight::{Flight, FlightStep};
use crate::result::StepFailure;
use crate::retry::{Sleeper, ThreadSleeper};
use crate::store::{Direction, FlightState, FlightStatus, FlightStore};

/// Requests that running flights stop at the next step boundary or retry.
///
/// An interrupted flight keeps its position; the interrupted step runs again
/// when the flight is resumed.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a flight run on its own thread.
#[derive(Debug)]
pub struct FlightRun<M, E: Debug> {
    pub result: Result<(), FlightError<E>>,
    pub audit: FlightAuditLog,
    pub working_map: M,
}

/// A flight running on its own thread, with an interrupt handle that reaches
/// only this flight.
#[derive(Debug)]
pub struct SpawnedFlight<M, E: Debug> {
    thread: JoinHandle<FlightRun<M, E>>,
    interrupt: InterruptHandle,
}

impl<M, E: Debug> SpawnedFlight<M, E> {
    /// Interrupts flights run on this thread through `run`, `run_with_audit`
    /// or `resume`. Spawned flights carry their own handle.
    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Wait for the flight thread to finish.
    ///
    /// # Errors
    ///
    /// Returns the panic payload if the flight thread panicked.
    pub fn join(self) -> std::thread::Result<FlightRun<M, E>> {
        self.thread.join()
    }
}

/// Runs flights: the retry loop per step, the reverse undo cascade, and
/// checkpointing to a [`FlightStore`] for crash resumption.
pub struct FlightExecutor {
    sleeper: Arc<dyn Sleeper>,
    store: Option<Arc<dyn FlightStore>>,
    interrupt: InterruptHandle,
}

impl Default for FlightExecutor {
    fn default() -> Self {
        Self::new(Arc::new(ThreadSleeper))
    }
}

enum AttemptFailure<E> {
    Failed { error: E, attempts: u32 },
    Interrupted,
}

struct Checkpoint<'a> {
    status: FlightStatus,
    direction: Direction,
    next_step: usize,
    failed_step: Option<&'a str>,
    failure: Option<String>,
}

impl FlightExecutor {
    #[must_use]
    pub fn new(sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            sleeper,
            store: None,
            interrupt: InterruptHandle::default(),
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn FlightStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn store(&self) -> Option<&Arc<dyn FlightStore>> {
        self.store.as_ref()
    }

    /// Interrupts flights run on this thread through `run`, `run_with_audit`
    /// or `resume`. Spawned flights carry their own handle.
    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Run a flight to completion.
    ///
    /// # Errors
    ///
    /// Returns `FlightError::StepFailed` if a step fails and every undo succeeds,
    /// `FlightError::UndoFailed` if some undo operations also fail,
    /// `FlightError::Interrupted` if the interrupt handle was triggered, and
    /// `FlightError::Store` if checkpointing fails.
    pub fn run<C, M, E>(
        &self,
        flight: &Flight<C, M, E>,
        ctx: &C,
        map: &mut M,
    ) -> Result<(), FlightError<E>>
    where
        M: Serialize,
        E: Debug + Display,
    {
        let (result, _audit) = self.run_with_audit(flight, ctx, map);
        result
    }

    /// Run a flight and return both the result and an audit log.
    pub fn run_with_audit<C, M, E>(
        &self,
        flight: &Flight<C, M, E>,
        ctx: &C,
        map: &mut M,
    ) -> (Result<(), FlightError<E>>, FlightAuditLog)
    where
        M: Serialize,
        E: Debug + Display,
    {
        let mut audit = FlightAuditLog::new();
        info!(
            flight_id = %flight.id(),
            flight = flight.name(),
            role = %flight.role(),
            steps = flight.len(),
            "flight started"
        );
        let result = self.execute_from(flight, ctx, map, 0, &mut audit);
        log_outcome(flight, &result);
        (result, audit)
    }

    /// Resume a persisted flight from its last checkpoint.
    ///
    /// The flight must have the same id and step list as the one that was
    /// checkpointed. Returns the working map as it stands after the run.
    pub fn resume<C, M, E>(
        &self,
        flight: &Flight<C, M, E>,
        ctx: &C,
    ) -> (Result<M, FlightError<E>>, FlightAuditLog)
    where
        M: Serialize + DeserializeOwned,
        E: Debug + Display,
    {
        let mut audit = FlightAuditLog::new();
        let state = match self.load_resumable(flight) {
            Ok(state) => state,
            Err(error) => return (Err(error), audit),
        };
        let mut map: M = match state
            .working_map
            .clone()
            .map(serde_json::from_value)
            .transpose()
        {
            Ok(Some(map)) => map,
            Ok(None) => {
                return (
                    Err(FlightError::NotResumable {
                        flight_id: flight.id(),
                        status: state.status,
                    }),
                    audit,
                );
            }
            Err(source) => {
                return (
                    Err(StoreError::Deserialize {
                        flight_id: flight.id(),
                        source,
                    }
                    .into()),
                    audit,
                );
            }
        };

        info!(
            flight_id = %flight.id(),
            flight = flight.name(),
            direction = ?state.direction,
            next_step = state.next_step,
            "resuming flight"
        );

        let result = match state.direction {
            Direction::Do => self.execute_from(flight, ctx, &mut map, state.next_step, &mut audit),
            Direction::Undo => {
                let failed_step = state.failed_step.clone().unwrap_or_default();
                let reason = state.failure.clone().unwrap_or_default();
                self.finish_resumed_undo(
                    flight,
                    ctx,
                    &mut map,
                    state.next_step,
                    &failed_step,
                    reason,
                    &mut audit,
                )
            }
        };
        log_outcome(flight, &result);
        (result.map(|()| map), audit)
    }

    /// Run a flight on its own thread. The returned handle interrupts this
    /// flight alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<C, M, E>(
        &self,
        flight: Flight<C, M, E>,
        ctx: Arc<C>,
        mut map: M,
    ) -> std::io::Result<SpawnedFlight<M, E>>
    where
        C: Send + Sync + 'static,
        M: Serialize + Send + 'static,
        E: Debug + Display + Send + 'static,
    {
        let interrupt = InterruptHandle::default();
        let executor = Self {
            sleeper: Arc::clone(&self.sleeper),
            store: self.store.clone(),
            interrupt: interrupt.clone(),
        };
        let thread = std::thread::Builder::new()
            .name(format!("flight-{}", flight.id()))
            .spawn(move || {
                let (result, audit) = executor.run_with_audit(&flight, &ctx, &mut map);
                FlightRun {
                    result,
                    audit,
                    working_map: map,
                }
            })?;
        Ok(SpawnedFlight { thread, interrupt })
    }

    fn load_resumable<C, M, E: Debug>(
        &self,
        flight: &Flight<C, M, E>,
    ) -> Result<FlightState, FlightError<E>> {
        let store = self
            .store
            .as_ref()
            .ok_or(FlightError::UnknownFlight(flight.id()))?;
        let state = store
            .load(flight.id())?
            .ok_or(FlightError::UnknownFlight(flight.id()))?;

        if state.status.is_terminal() {
            return Err(FlightError::NotResumable {
                flight_id: flight.id(),
                status: state.status,
            });
        }
        if state.step_names != flight.step_names() {
            return Err(FlightError::IncompatibleFlight {
                flight_id: flight.id(),
            });
        }
        Ok(state)
    }

    fn execute_from<C, M, E>(
        &self,
        flight: &Flight<C, M, E>,
        ctx: &C,
        map: &mut M,
        start: usize,
        audit: &mut FlightAuditLog,
    ) -> Result<(), FlightError<E>>
    where
        M: Serialize,
        E: Debug + Display,
    {
        self.checkpoint(flight, &doing(FlightStatus::Running, start), Some(&*map))?;

        for (index, entry) in flight.steps().iter().enumerate().skip(start) {
            audit.record_start(entry.name());
            debug!(flight_id = %flight.id(), step = entry.name(), index, "running step");

            match self.attempt_do(entry, ctx, map, audit) {
                Ok(()) => {
                    audit.record_success(entry.step().undo_description());
                    self.checkpoint(flight, &doing(FlightStatus::Running, index + 1), Some(&*map))?;
                }
                Err(AttemptFailure::Interrupted) => {
                    audit.record_failure();
                    self.checkpoint(flight, &doing(FlightStatus::Interrupted, index), Some(&*map))?;
                    return Err(FlightError::Interrupted {
                        flight_id: flight.id(),
                        step: entry.name().to_string(),
                    });
                }
                Err(AttemptFailure::Failed { error, attempts }) => {
                    audit.record_failure();
                    return Err(self.undo_after_failure(
                        flight, ctx, map, index, error, attempts, audit,
                    ));
                }
            }
        }

        self.checkpoint::<C, M, E>(flight, &doing(FlightStatus::Succeeded, flight.len()), None)?;
        Ok(())
    }

    fn attempt_do<C, M, E: Display>(
        &self,
        entry: &FlightStep<C, M, E>,
        ctx: &C,
        map: &mut M,
        audit: &mut FlightAuditLog,
    ) -> Result<(), AttemptFailure<E>> {
        let mut attempts = 0;
        loop {
            if self.interrupt.is_interrupted() {
                return Err(AttemptFailure::Interrupted);
            }
            attempts += 1;
            audit.record_attempt();

            match entry.step().do_step(ctx, map) {
                Ok(()) => return Ok(()),
                Err(StepFailure::Fatal(error)) => {
                    return Err(AttemptFailure::Failed { error, attempts });
                }
                Err(StepFailure::Retry(error)) => {
                    let Some(delay) = entry.policy().delay_for_retry(attempts) else {
                        warn!(
                            step = entry.name(),
                            attempts,
                            policy = entry.policy().name(),
                            error = %error,
                            "retries exhausted"
                        );
                        return Err(AttemptFailure::Failed { error, attempts });
                    };
                    warn!(
                        step = entry.name(),
                        attempt = attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "step failed, retrying"
                    );
                    self.sleeper.sleep(delay);
                }
            }
        }
    }

    fn attempt_undo<C, M, E: Display>(
        &self,
        entry: &FlightStep<C, M, E>,
        ctx: &C,
        map: &mut M,
    ) -> Result<(), AttemptFailure<E>> {
        let mut attempts = 0;
        loop {
            if self.interrupt.is_interrupted() {
                return Err(AttemptFailure::Interrupted);
            }
            attempts += 1;

            match entry.step().undo_step(ctx, map) {
                Ok(()) => return Ok(()),
                Err(StepFailure::Fatal(error)) => {
                    return Err(AttemptFailure::Failed { error, attempts });
                }
                Err(StepFailure::Retry(error)) => {
                    let Some(delay) = entry.policy().delay_for_retry(attempts) else {
                        return Err(AttemptFailure::Failed { error, attempts });
                    };
                    warn!(step = entry.name(), attempt = attempts, error = %error, "undo failed, retrying");
                    self.sleeper.sleep(delay);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn undo_after_failure<C, M, E>(
        &self,
        flight: &Flight<C, M, E>,
        ctx: &C,
        map: &mut M,
        failed_index: usize,
        step_error: E,
        attempts: u32,
        audit: &mut FlightAuditLog,
    ) -> FlightError<E>
    where
        M: Serialize,
        E: Debug + Display,
    {
        let failed_step = flight.steps()[failed_index].name();
        error!(
            flight_id = %flight.id(),
            step = failed_step,
            attempts,
            error = %step_error,
            "step failed, undoing completed steps"
        );

        let reason = step_error.to_string();
        let undo_errors = match self.unwind(flight, ctx, map, failed_index, failed_step, &reason, audit)
        {
            Ok(undo_errors) => undo_errors,
            Err(error) => return error,
        };

        let status = if undo_errors.is_empty() {
            FlightStatus::Failed
        } else {
            FlightStatus::UndoFailed
        };
        let terminal = Checkpoint {
            status,
            direction: Direction::Undo,
            next_step: 0,
            failed_step: Some(failed_step),
            failure: Some(reason),
        };
        if let Err(error) = self.checkpoint::<C, M, E>(flight, &terminal, None) {
            return error.into();
        }

        if undo_errors.is_empty() {
            FlightError::StepFailed {
                step: failed_step.to_string(),
                attempts,
                source: step_error,
            }
        } else {
            FlightError::UndoFailed {
                failed_step: failed_step.to_string(),
                step_error,
                undo_errors,
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_resumed_undo<C, M, E>(
        &self,
        flight: &Flight<C, M, E>,
        ctx: &C,
        map: &mut M,
        remaining: usize,
        failed_step: &str,
        reason: String,
        audit: &mut FlightAuditLog,
    ) -> Result<(), FlightError<E>>
    where
        M: Serialize,
        E: Debug + Display,
    {
        let undo_errors = self.unwind(flight, ctx, map, remaining, failed_step, &reason, audit)?;
        let status = if undo_errors.is_empty() {
            FlightStatus::Failed
        } else {
            FlightStatus::UndoFailed
        };
        let terminal = Checkpoint {
            status,
            direction: Direction::Undo,
            next_step: 0,
            failed_step: Some(failed_step),
            failure: Some(reason.clone()),
        };
        self.checkpoint::<C, M, E>(flight, &terminal, None)?;

        Err(FlightError::RolledBack {
            flight_id: flight.id(),
            step: failed_step.to_string(),
            reason,
            undo_errors,
        })
    }

    /// Undo the first `completed` steps in reverse order.
    ///
    /// Undo failures are collected and unwinding continues with the earlier steps.
    #[allow(clippy::too_many_arguments)]
    fn unwind<C, M, E>(
        &self,
        flight: &Flight<C, M, E>,
        ctx: &C,
        map: &mut M,
        completed: usize,
        failed_step: &str,
        reason: &str,
        audit: &mut FlightAuditLog,
    ) -> Result<Vec<UndoError<E>>, FlightError<E>>
    where
        M: Serialize,
        E: Debug + Display,
    {
        let mut undo_errors = Vec::new();

        for index in (0..completed).rev() {
            let entry = &flight.steps()[index];
            let undoing = Checkpoint {
                status: FlightStatus::Running,
                direction: Direction::Undo,
                next_step: index + 1,
                failed_step: Some(failed_step),
                failure: Some(reason.to_string()),
            };
            self.checkpoint(flight, &undoing, Some(&*map))?;

            if !entry.step().reversible() {
                error!(
                    flight_id = %flight.id(),
                    step = entry.name(),
                    failed_step,
                    "step cannot be undone; surfacing original failure"
                );
                audit.record_undo(entry.name(), StepStatus::Irreversible);
                continue;
            }

            let description = entry.step().undo_description();
            debug!(flight_id = %flight.id(), step = entry.name(), "{description}");
            match self.attempt_undo(entry, ctx, map) {
                Ok(()) => audit.record_undo(entry.name(), StepStatus::Undone),
                Err(AttemptFailure::Interrupted) => {
                    let interrupted = Checkpoint {
                        status: FlightStatus::Interrupted,
                        ..undoing
                    };
                    self.checkpoint(flight, &interrupted, Some(&*map))?;
                    return Err(FlightError::Interrupted {
                        flight_id: flight.id(),
                        step: entry.name().to_string(),
                    });
                }
                Err(AttemptFailure::Failed { error, attempts }) => {
                    error!(
                        flight_id = %flight.id(),
                        step = entry.name(),
                        attempts,
                        error = %error,
                        "undo failed, continuing with earlier steps"
                    );
                    audit.record_undo(entry.name(), StepStatus::UndoFailed);
                    undo_errors.push(UndoError {
                        step: entry.name().to_string(),
                        description,
                        error,
                    });
                }
            }
        }

        Ok(undo_errors)
    }

    fn checkpoint<C, M, E>(
        &self,
        flight: &Flight<C, M, E>,
        checkpoint: &Checkpoint<'_>,
        map: Option<&M>,
    ) -> Result<(), StoreError>
    where
        M: Serialize,
    {
        let Some(store) = &self.store else {
            return Ok(());
        };

        let working_map = map
            .map(serde_json::to_value)
            .transpose()
            .map_err(|source| StoreError::Serialize {
                flight_id: flight.id(),
                source,
            })?;

        store.save(&FlightState {
            flight_id: flight.id(),
            flight_name: flight.name().to_string(),
            role: flight.role(),
            status: checkpoint.status,
            direction: checkpoint.direction,
            next_step: checkpoint.next_step,
            step_names: flight
                .step_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            failed_step: checkpoint.failed_step.map(str::to_string),
            failure: checkpoint.failure.clone(),
            working_map,
            updated_at: Utc::now(),
        })
    }
}

fn doing(status: FlightStatus, next_step: usize) -> Checkpoint<'static> {
    Checkpoint {
        status,
        direction: Direction::Do,
        next_step,
        failed_step: None,
        failure: None,
    }
}

fn log_outcome<C, M, E: Debug + Display, T>(
    flight: &Flight<C, M, E>,
    result: &Result<T, FlightError<E>>,
) {
    match result {
        Ok(_) => info!(flight_id = %flight.id(), flight = flight.name(), "flight succeeded"),
        Err(FlightError::Interrupted { step, .. }) => {
            warn!(flight_id = %flight.id(), flight = flight.name(), step, "flight interrupted");
        }
        Err(error) => {
            error!(flight_id = %flight.id(), flight = flight.name(), error = %error, "flight failed");
        }
    }
}
