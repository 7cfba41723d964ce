use std::time::Duration;

/// How long to wait between attempts of a retried step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Wait the same interval before every retry.
    Fixed { interval: Duration },
    /// Double the wait after each retry, starting at `initial` and capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

/// Bounds and backoff for retrying a step that failed with a retryable error.
///
/// Policies are immutable and cheap to clone; steps requesting the same
/// profile share equal values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    name: String,
    backoff: Backoff,
    max_retries: u32,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(name: impl Into<String>, backoff: Backoff, max_retries: u32) -> Self {
        Self {
            name: name.into(),
            backoff,
            max_retries,
        }
    }

    /// Moderate bounded exponential backoff for cloud provisioning calls.
    #[must_use]
    pub fn cloud() -> Self {
        Self::new(
            "cloud",
            Backoff::Exponential {
                initial: Duration::from_secs(1),
                max: Duration::from_secs(8),
            },
            40,
        )
    }

    /// Longer backoff for permission propagation, which is eventually consistent.
    #[must_use]
    pub fn long_sync() -> Self {
        Self::new(
            "long_sync",
            Backoff::Exponential {
                initial: Duration::from_secs(2),
                max: Duration::from_secs(60),
            },
            20,
        )
    }

    /// Few, fast retries for metadata writes.
    #[must_use]
    pub fn short_database() -> Self {
        Self::new(
            "short_database",
            Backoff::Fixed {
                interval: Duration::from_secs(1),
            },
            5,
        )
    }

    /// A single attempt; any retryable failure escalates immediately.
    #[must_use]
    pub fn none() -> Self {
        Self::new(
            "none",
            Backoff::Fixed {
                interval: Duration::ZERO,
            },
            0,
        )
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `retry` (1-based), or `None` once the
    /// policy's retries are exhausted.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Option<Duration> {
        if retry == 0 || retry > self.max_retries {
            return None;
        }

        let delay = match self.backoff {
            Backoff::Fixed { interval } => interval,
            Backoff::Exponential { initial, max } => {
                let factor = 1_u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
                initial.saturating_mul(factor).min(max)
            }
        };
        Some(delay)
    }
}

/// Blocks the executing thread between retries and poll iterations.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
