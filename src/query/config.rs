use std::time::Duration;

/// Configuration for query behavior.
///
/// This controls how queries cache data, when they consider it stale and how
/// often a failed read is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// How long data is considered fresh before becoming stale.
    ///
    /// When data is fresh, queries will use cached data without refetching.
    /// Once stale, queries will refetch in the background while still showing cached data.
    pub stale_time: Duration,

    /// How long an entry with no subscribers is retained before being garbage collected.
    pub cache_time: Duration,

    /// How many times a retryable read failure is retried before surfacing.
    pub retry: u32,

    /// Pause between a failed attempt and its retry.
    pub retry_delay: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::from_secs(60),
            cache_time: Duration::from_secs(60),
            retry: 1,
            retry_delay: Duration::from_millis(250),
        }
    }
}

impl QueryConfig {
    /// Creates a new query configuration with the given stale and cache times.
    #[must_use]
    pub const fn new(stale_time: Duration, cache_time: Duration) -> Self {
        Self {
            stale_time,
            cache_time,
            retry: 1,
            retry_delay: Duration::from_millis(250),
        }
    }

    /// Overrides the retry count and delay.
    #[must_use]
    pub const fn with_retry(mut self, retry: u32, retry_delay: Duration) -> Self {
        self.retry = retry;
        self.retry_delay = retry_delay;
        self
    }
}
