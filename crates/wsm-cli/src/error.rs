use std::path::PathBuf;

use thiserror::Error;
use wsm_flight::FlightId;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error")]
    Config(#[from] wsm_config::ConfigError),

    #[error("cannot plan flight")]
    Operation(#[from] wsm_operations::OperationError),

    #[error("flight store error")]
    Store(#[from] wsm_flight::StoreError),

    #[error("failed to read '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid flight id '{id}'")]
    InvalidFlightId {
        id: String,
        #[source]
        source: uuid::Error,
    },

    #[error("no stored state for flight {0}")]
    FlightNotFound(FlightId),

    #[error("no flight store configured; pass --store or set [flight_store] directory")]
    NoFlightStore,

    #[error("failed to render working map")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
