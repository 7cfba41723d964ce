use std::time::Duration;

use tracing::debug;
use wsm_config::PollWindow;
use wsm_flight::Sleeper;

use crate::Result;
use crate::error::OperationError;
use crate::traits::DataprocClient;
use crate::types::OperationHandle;

/// Check `done` every `window.interval()` until it reports true or the
/// window's timeout has elapsed.
///
/// `done` runs once immediately, so an already finished operation never sleeps.
pub(crate) fn poll_until<F>(
    sleeper: &dyn Sleeper,
    window: PollWindow,
    operation: &str,
    mut done: F,
) -> Result<()>
where
    F: FnMut() -> Result<bool>,
{
    let mut waited = Duration::ZERO;
    loop {
        if done()? {
            return Ok(());
        }
        if waited + window.interval() > window.timeout() {
            return Err(OperationError::OperationTimeout {
                operation: operation.to_string(),
                timeout: window.timeout(),
            });
        }
        debug!(operation, waited_secs = waited.as_secs(), "waiting for operation");
        sleeper.sleep(window.interval());
        waited += window.interval();
    }
}

/// Wait for a Dataproc long-running operation; an operation that finished
/// with an error fails with that error.
pub(crate) fn wait_for_dataproc_operation(
    dataproc: &dyn DataprocClient,
    sleeper: &dyn Sleeper,
    window: PollWindow,
    handle: &OperationHandle,
    operation: &'static str,
) -> Result<()> {
    poll_until(sleeper, window, operation, || {
        let status = dataproc
            .get_operation(handle)
            .map_err(|e| OperationError::cloud(operation, e))?;
        match status.error {
            Some(error) => Err(OperationError::cloud(operation, error)),
            None => Ok(status.done),
        }
    })
}
