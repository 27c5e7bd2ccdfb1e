use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, Shared};

use crate::error::ApiError;

/// Type-erased cached value.
pub(crate) type ErasedData = Arc<dyn Any + Send + Sync>;

/// A request shared by every caller of the same key.
pub(crate) type SharedFetch = Shared<BoxFuture<'static, Result<ErasedData, ApiError>>>;

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Created but never fetched, or its last result was discarded.
    Idle,
    Loading,
    Success,
    Error,
}

/// A typed snapshot of one cache entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: Option<T>,
    pub error: Option<ApiError>,
    pub status: FetchStatus,
    pub fetched_at: Option<Instant>,
    /// When the data stops being fresh. `None` until the first success.
    pub stale_after: Option<Instant>,
    /// Set by invalidation; cleared by the next successful write.
    pub is_invalidated: bool,
}

impl<T> CacheEntry<T> {
    /// Checks if this entry should be refetched at `now`.
    pub fn is_stale_at(&self, now: Instant) -> bool {
        self.is_invalidated || self.stale_after.is_none_or(|deadline| now > deadline)
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Instant::now())
    }
}

/// Storage for one key inside the client.
///
/// Data is type-erased, everything else is not, so invalidation and garbage
/// collection can work without knowing the value type.
pub(crate) struct Slot {
    pub(crate) data: Option<ErasedData>,
    pub(crate) error: Option<ApiError>,
    pub(crate) status: FetchStatus,
    pub(crate) fetched_at: Option<Instant>,
    pub(crate) invalidated: bool,
    pub(crate) subscribers: usize,
    pub(crate) idle_since: Option<Instant>,
    /// Sequence number of the most recently issued request for this key.
    pub(crate) latest_request: u64,
    pub(crate) inflight: Option<(u64, SharedFetch)>,
}

impl Slot {
    pub(crate) fn new() -> Self {
        Self {
            data: None,
            error: None,
            status: FetchStatus::Idle,
            fetched_at: None,
            invalidated: false,
            subscribers: 0,
            idle_since: Some(Instant::now()),
            latest_request: 0,
            inflight: None,
        }
    }

    /// Checks if the data is missing, invalidated or older than `stale_time`.
    pub(crate) fn is_stale(&self, stale_time: Duration) -> bool {
        self.invalidated
            || self.data.is_none()
            || self
                .fetched_at
                .is_none_or(|fetched| fetched.elapsed() > stale_time)
    }

    /// Stores a successful result, resetting timestamp and staleness.
    pub(crate) fn update(&mut self, data: ErasedData) {
        self.data = Some(data);
        self.error = None;
        self.status = FetchStatus::Success;
        self.fetched_at = Some(Instant::now());
        self.invalidated = false;
    }

    pub(crate) fn fail(&mut self, error: ApiError) {
        self.error = Some(error);
        self.status = FetchStatus::Error;
    }

    /// Marks this entry as stale and forgets its in-flight request, so the
    /// next read issues a new one.
    pub(crate) fn mark_stale(&mut self) {
        self.invalidated = true;
        self.inflight = None;
    }

    /// Checks if this entry should be garbage collected.
    pub(crate) fn should_gc(&self, cache_time: Duration) -> bool {
        self.subscribers == 0 && self.idle_since.is_some_and(|idle| idle.elapsed() > cache_time)
    }

    pub(crate) fn snapshot<T: Clone + 'static>(&self, stale_time: Duration) -> CacheEntry<T> {
        CacheEntry {
            data: self
                .data
                .as_ref()
                .and_then(|data| data.downcast_ref::<T>())
                .cloned(),
            error: self.error.clone(),
            status: self.status,
            fetched_at: self.fetched_at,
            stale_after: self.fetched_at.map(|fetched| fetched + stale_time),
            is_invalidated: self.invalidated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn erased(value: i32) -> ErasedData {
        Arc::new(value)
    }

    #[test]
    fn test_new_slot() {
        let slot = Slot::new();
        assert!(slot.data.is_none());
        assert_eq!(slot.status, FetchStatus::Idle);
        assert!(slot.is_stale(Duration::from_secs(60)));
    }

    #[test]
    fn test_check_staleness_fresh() {
        let mut slot = Slot::new();
        slot.update(erased(42));
        assert!(!slot.is_stale(Duration::from_secs(1)));
    }

    #[test]
    fn test_check_staleness_stale() {
        let mut slot = Slot::new();
        slot.update(erased(42));
        sleep(Duration::from_millis(10));
        assert!(slot.is_stale(Duration::from_millis(5)));
    }

    #[test]
    fn test_mark_stale_then_update() {
        let mut slot = Slot::new();
        slot.update(erased(42));
        slot.mark_stale();
        assert!(slot.is_stale(Duration::from_secs(60)));

        slot.update(erased(100));
        assert!(!slot.is_stale(Duration::from_secs(60)));
        assert_eq!(slot.snapshot::<i32>(Duration::from_secs(60)).data, Some(100));
    }

    #[test]
    fn test_failure_keeps_previous_data() {
        let mut slot = Slot::new();
        slot.update(erased(1));
        slot.fail(ApiError::Network("down".into()));

        let entry = slot.snapshot::<i32>(Duration::from_secs(60));
        assert_eq!(entry.status, FetchStatus::Error);
        assert_eq!(entry.data, Some(1));
        assert!(entry.error.is_some());
    }

    #[test]
    fn test_snapshot_of_wrong_type_has_no_data() {
        let mut slot = Slot::new();
        slot.update(erased(1));
        assert_eq!(slot.snapshot::<String>(Duration::from_secs(60)).data, None);
    }

    #[test]
    fn test_should_gc_only_without_subscribers() {
        let mut slot = Slot::new();
        sleep(Duration::from_millis(10));
        assert!(slot.should_gc(Duration::from_millis(5)));

        slot.subscribers = 1;
        assert!(!slot.should_gc(Duration::from_millis(5)));
    }

    #[test]
    fn test_entry_staleness_window() {
        let now = Instant::now();
        let entry: CacheEntry<i32> = CacheEntry {
            data: Some(1),
            error: None,
            status: FetchStatus::Success,
            fetched_at: Some(now),
            stale_after: Some(now + Duration::from_secs(60)),
            is_invalidated: false,
        };
        assert!(!entry.is_stale_at(now + Duration::from_secs(59)));
        assert!(entry.is_stale_at(now + Duration::from_secs(61)));
    }
}
