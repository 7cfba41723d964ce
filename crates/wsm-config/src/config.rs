use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use wsm_flight::{Backoff, RetryPolicy};

use crate::error::ConfigError;
use crate::raw::{RawConfig, RawPollWindow, RawRetryProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    Fixed,
    Exponential,
}

/// One named retry profile as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryProfile {
    strategy: RetryStrategy,
    initial_interval_secs: u64,
    max_interval_secs: u64,
    max_retries: u32,
}

impl RetryProfile {
    fn from_policy(policy: &RetryPolicy) -> Self {
        match policy.backoff() {
            Backoff::Fixed { interval } => Self {
                strategy: RetryStrategy::Fixed,
                initial_interval_secs: interval.as_secs(),
                max_interval_secs: interval.as_secs(),
                max_retries: policy.max_retries(),
            },
            Backoff::Exponential { initial, max } => Self {
                strategy: RetryStrategy::Exponential,
                initial_interval_secs: initial.as_secs(),
                max_interval_secs: max.as_secs(),
                max_retries: policy.max_retries(),
            },
        }
    }

    #[must_use]
    pub fn strategy(&self) -> RetryStrategy {
        self.strategy
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub fn to_policy(&self, name: &str) -> RetryPolicy {
        let initial = Duration::from_secs(self.initial_interval_secs);
        let backoff = match self.strategy {
            RetryStrategy::Fixed => Backoff::Fixed { interval: initial },
            RetryStrategy::Exponential => Backoff::Exponential {
                initial,
                max: Duration::from_secs(self.max_interval_secs),
            },
        };
        RetryPolicy::new(name, backoff, self.max_retries)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryProfiles {
    cloud: RetryProfile,
    long_sync: RetryProfile,
    short_database: RetryProfile,
}

impl Default for RetryProfiles {
    fn default() -> Self {
        Self {
            cloud: RetryProfile::from_policy(&RetryPolicy::cloud()),
            long_sync: RetryProfile::from_policy(&RetryPolicy::long_sync()),
            short_database: RetryProfile::from_policy(&RetryPolicy::short_database()),
        }
    }
}

impl RetryProfiles {
    #[must_use]
    pub fn cloud(&self) -> RetryPolicy {
        self.cloud.to_policy("cloud")
    }

    #[must_use]
    pub fn long_sync(&self) -> RetryPolicy {
        self.long_sync.to_policy("long_sync")
    }

    #[must_use]
    pub fn short_database(&self) -> RetryPolicy {
        self.short_database.to_policy("short_database")
    }
}

/// Interval and ceiling for polling a long-running cloud operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollWindow {
    interval: Duration,
    timeout: Duration,
}

impl PollWindow {
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    dataproc_create: PollWindow,
    dataproc_delete: PollWindow,
    namespace_delete: PollWindow,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            dataproc_create: PollWindow::new(Duration::from_secs(20), Duration::from_secs(15 * 60)),
            dataproc_delete: PollWindow::new(Duration::from_secs(20), Duration::from_secs(12 * 60)),
            namespace_delete: PollWindow::new(Duration::from_secs(5), Duration::from_secs(10 * 60)),
        }
    }
}

impl PollingConfig {
    #[must_use]
    pub fn dataproc_create(&self) -> PollWindow {
        self.dataproc_create
    }

    #[must_use]
    pub fn dataproc_delete(&self) -> PollWindow {
        self.dataproc_delete
    }

    #[must_use]
    pub fn namespace_delete(&self) -> PollWindow {
        self.namespace_delete
    }
}

/// Bounds of the bucket-deletion loop: set a delete-everything lifecycle
/// rule, try to delete, sleep, repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketDeletionConfig {
    interval: Duration,
    max_attempts: u32,
}

impl Default for BucketDeletionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            max_attempts: 72,
        }
    }
}

impl BucketDeletionConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[cfg(any(test, feature = "testing"))]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlightStoreConfig {
    directory: Option<PathBuf>,
}

impl FlightStoreConfig {
    #[must_use]
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WsmConfig {
    retry: RetryProfiles,
    polling: PollingConfig,
    bucket_deletion: BucketDeletionConfig,
    flight_store: FlightStoreConfig,
}

impl WsmConfig {
    #[must_use]
    pub fn retry(&self) -> &RetryProfiles {
        &self.retry
    }

    #[must_use]
    pub fn polling(&self) -> &PollingConfig {
        &self.polling
    }

    #[must_use]
    pub fn bucket_deletion(&self) -> &BucketDeletionConfig {
        &self.bucket_deletion
    }

    #[must_use]
    pub fn flight_store(&self) -> &FlightStoreConfig {
        &self.flight_store
    }

    #[cfg(any(test, feature = "testing"))]
    #[must_use]
    pub fn with_bucket_deletion(mut self, bucket_deletion: BucketDeletionConfig) -> Self {
        self.bucket_deletion = bucket_deletion;
        self
    }
}

/// Load the config file at `path`, or the defaults if it does not exist.
///
/// # Errors
///
/// Returns `ConfigError::Read` if the file exists but cannot be read, and
/// the errors of [`parse_config`] for its content.
pub fn load_config(path: &Path) -> crate::Result<WsmConfig> {
    match fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(WsmConfig::default()),
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Parse config file content, filling every absent key with its default.
///
/// # Errors
///
/// Returns `ConfigError::Parse` for malformed TOML or unknown keys and
/// `ConfigError::Invalid` for values outside their allowed range.
pub fn parse_config(content: &str) -> crate::Result<WsmConfig> {
    let raw: RawConfig = toml::from_str(content)?;
    let defaults = WsmConfig::default();

    let retry = RetryProfiles {
        cloud: build_retry_profile("retry.cloud", raw.retry.cloud, defaults.retry.cloud)?,
        long_sync: build_retry_profile(
            "retry.long_sync",
            raw.retry.long_sync,
            defaults.retry.long_sync,
        )?,
        short_database: build_retry_profile(
            "retry.short_database",
            raw.retry.short_database,
            defaults.retry.short_database,
        )?,
    };

    let polling = PollingConfig {
        dataproc_create: build_poll_window(
            "polling.dataproc_create",
            raw.polling.dataproc_create,
            defaults.polling.dataproc_create,
        )?,
        dataproc_delete: build_poll_window(
            "polling.dataproc_delete",
            raw.polling.dataproc_delete,
            defaults.polling.dataproc_delete,
        )?,
        namespace_delete: build_poll_window(
            "polling.namespace_delete",
            raw.polling.namespace_delete,
            defaults.polling.namespace_delete,
        )?,
    };

    let bucket_deletion = BucketDeletionConfig {
        interval: raw
            .bucket_deletion
            .interval_secs
            .map_or(defaults.bucket_deletion.interval, Duration::from_secs),
        max_attempts: raw
            .bucket_deletion
            .max_attempts
            .unwrap_or(defaults.bucket_deletion.max_attempts),
    };
    if bucket_deletion.max_attempts == 0 {
        return Err(invalid("bucket_deletion.max_attempts", "must be at least 1"));
    }

    Ok(WsmConfig {
        retry,
        polling,
        bucket_deletion,
        flight_store: FlightStoreConfig {
            directory: raw.flight_store.directory,
        },
    })
}

fn invalid(key: &str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason,
    }
}

fn build_retry_profile(
    key: &str,
    raw: Option<RawRetryProfile>,
    defaults: RetryProfile,
) -> crate::Result<RetryProfile> {
    let Some(raw) = raw else {
        return Ok(defaults);
    };

    let profile = RetryProfile {
        strategy: raw.strategy.unwrap_or(defaults.strategy),
        initial_interval_secs: raw
            .initial_interval_secs
            .unwrap_or(defaults.initial_interval_secs),
        max_interval_secs: raw.max_interval_secs.unwrap_or(defaults.max_interval_secs),
        max_retries: raw.max_retries.unwrap_or(defaults.max_retries),
    };

    if profile.initial_interval_secs == 0 {
        return Err(invalid(key, "initial_interval_secs must be positive"));
    }
    if profile.strategy == RetryStrategy::Exponential
        && profile.max_interval_secs < profile.initial_interval_secs
    {
        return Err(invalid(
            key,
            "max_interval_secs must not be below initial_interval_secs",
        ));
    }
    Ok(profile)
}

fn build_poll_window(
    key: &str,
    raw: Option<RawPollWindow>,
    defaults: PollWindow,
) -> crate::Result<PollWindow> {
    let Some(raw) = raw else {
        return Ok(defaults);
    };

    let window = PollWindow {
        interval: raw
            .interval_secs
            .map_or(defaults.interval, Duration::from_secs),
        timeout: raw.timeout_secs.map_or(defaults.timeout, Duration::from_secs),
    };

    if window.interval.is_zero() {
        return Err(invalid(key, "interval_secs must be positive"));
    }
    if window.timeout < window.interval {
        return Err(invalid(key, "timeout_secs must not be below interval_secs"));
    }
    Ok(window)
}
