use thiserror::Error;

use crate::types::ResourceKind;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("invalid {field} '{value}': {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("{0}")]
    Inconsistent(&'static str),

    #[error("expected a {expected} resource but found {actual}")]
    WrongResourceType {
        expected: ResourceKind,
        actual: ResourceKind,
    },

    #[error("invalid identifier '{value}'")]
    InvalidId {
        value: String,
        #[source]
        source: uuid::Error,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;
