//! Status-code helpers shared by steps.
//!
//! Cloud calls fail with a [`CloudError`](wsm_core::CloudError). These helpers turn the expected
//! responses (a 404 on an existence check or delete, a 409 on a create) into
//! values, leaving everything else to `OperationError::cloud` and its retry
//! classification.

use crate::traits::CloudResult;

/// A lookup where absence is an expected answer: 404 becomes `None`.
pub(crate) fn found<T>(result: CloudResult<T>) -> CloudResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// A delete where "already gone" counts as done. Returns whether this call
/// deleted anything.
pub(crate) fn deleted(result: CloudResult<()>) -> CloudResult<bool> {
    found(result).map(|deleted| deleted.is_some())
}

/// A create where "already exists" is a possible answer: 409 becomes `None`.
pub(crate) fn created<T>(result: CloudResult<T>) -> CloudResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_conflict() => Ok(None),
        Err(e) => Err(e),
    }
}
