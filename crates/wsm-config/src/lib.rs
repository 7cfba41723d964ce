mod config;
mod error;
mod raw;

pub const DEFAULT_CONFIG_FILE: &str = "wsm.toml";

pub use config::{
    BucketDeletionConfig, FlightStoreConfig, PollWindow, PollingConfig, RetryProfile,
    RetryProfiles, RetryStrategy, WsmConfig, load_config, parse_config,
};
pub use error::ConfigError;

pub type Result<T> = std::result::Result<T, ConfigError>;
