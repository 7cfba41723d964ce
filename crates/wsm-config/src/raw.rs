use std::path::PathBuf;

use serde::Deserialize;

use crate::config::RetryStrategy;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawConfig {
    #[serde(default)]
    pub(crate) retry: RawRetryProfiles,
    #[serde(default)]
    pub(crate) polling: RawPolling,
    #[serde(default)]
    pub(crate) bucket_deletion: RawBucketDeletion,
    #[serde(default)]
    pub(crate) flight_store: RawFlightStore,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawRetryProfiles {
    pub(crate) cloud: Option<RawRetryProfile>,
    pub(crate) long_sync: Option<RawRetryProfile>,
    pub(crate) short_database: Option<RawRetryProfile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawRetryProfile {
    pub(crate) strategy: Option<RetryStrategy>,
    pub(crate) initial_interval_secs: Option<u64>,
    pub(crate) max_interval_secs: Option<u64>,
    pub(crate) max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawPolling {
    pub(crate) dataproc_create: Option<RawPollWindow>,
    pub(crate) dataproc_delete: Option<RawPollWindow>,
    pub(crate) namespace_delete: Option<RawPollWindow>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawPollWindow {
    pub(crate) interval_secs: Option<u64>,
    pub(crate) timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawBucketDeletion {
    pub(crate) interval_secs: Option<u64>,
    pub(crate) max_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawFlightStore {
    pub(crate) directory: Option<PathBuf>,
}
