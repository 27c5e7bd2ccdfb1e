//! The query client: owner of the cache.
//!
//! The cache is only ever changed in two ways: a settled request writes its
//! result for its key, and invalidation marks keys stale. Everything else is
//! a read.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ApiError;

use super::cache::{CacheEntry, ErasedData, FetchStatus, SharedFetch, Slot};
use super::config::QueryConfig;
use super::key::{KeyPrefix, QueryKey};

/// An async function producing the value for one key.
pub type Fetcher<V> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, ApiError>> + Send + Sync>;

type Cache = DashMap<QueryKey, Slot>;

/// A client for managing the query cache and invalidation.
///
/// The `QueryClient` is the central state manager for queries. It handles:
/// - Caching query results per [`QueryKey`]
/// - Sharing one in-flight request between concurrent readers of a key
/// - Marking keys stale and broadcasting invalidation notifications
/// - Dropping entries nobody has used for `cache_time`
///
/// # Example
///
/// ```rust
/// use desk_query::query::{QueryClient, QueryConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let config = QueryConfig::new(
///     Duration::from_secs(30),  // stale_time
///     Duration::from_secs(300), // cache_time
/// );
///
/// let client = Arc::new(QueryClient::with_config(config));
/// ```
pub struct QueryClient {
    cache: Arc<Cache>,
    invalidation_tx: broadcast::Sender<QueryKey>,
    config: QueryConfig,
    next_request: AtomicU64,
    shutdown: CancellationToken,
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.cache.len())
            .field("config", &self.config)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl QueryClient {
    /// Creates a new query client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    /// Creates a new query client with the given configuration.
    #[must_use]
    pub fn with_config(config: QueryConfig) -> Self {
        let (invalidation_tx, _) = broadcast::channel(100);
        Self {
            cache: Arc::new(DashMap::new()),
            invalidation_tx,
            config,
            next_request: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    /// Gets the query configuration.
    pub const fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Returns every live key.
    pub fn keys(&self) -> Vec<QueryKey> {
        self.cache.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Returns the cached value for `key`, fresh or not.
    pub fn get_query_data<V: Clone + 'static>(&self, key: &QueryKey) -> Option<V> {
        self.cache
            .get(key)
            .and_then(|slot| slot.data.as_ref().and_then(|d| d.downcast_ref::<V>().cloned()))
    }

    /// Returns a typed snapshot of the entry for `key`.
    pub fn entry<V: Clone + 'static>(&self, key: &QueryKey) -> Option<CacheEntry<V>> {
        self.cache
            .get(key)
            .map(|slot| slot.snapshot(self.config.stale_time))
    }

    /// Checks if `key` has data that is neither invalidated nor older than `stale_time`.
    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        self.cache
            .get(key)
            .is_some_and(|slot| !slot.is_stale(self.config.stale_time))
    }

    /// Returns every live key that starts with `prefix` and satisfies `predicate`.
    pub fn match_keys(
        &self,
        prefix: &KeyPrefix,
        predicate: Option<&(dyn Fn(&QueryKey) -> bool + Send + Sync)>,
    ) -> Vec<QueryKey> {
        self.cache
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|key| key.starts_with(prefix))
            .filter(|key| predicate.is_none_or(|matches| matches(key)))
            .collect()
    }

    /// Marks every matching entry stale and notifies its subscribers.
    ///
    /// Cached data is kept, so readers keep seeing the old value until the
    /// refetch lands. A request already in flight for a matching key can no
    /// longer write its result. Matching nothing is a no-op.
    pub fn invalidate(
        &self,
        prefix: &KeyPrefix,
        predicate: Option<&(dyn Fn(&QueryKey) -> bool + Send + Sync)>,
    ) -> Vec<QueryKey> {
        let keys = self.match_keys(prefix, predicate);
        for key in &keys {
            if let Some(mut slot) = self.cache.get_mut(key) {
                slot.mark_stale();
                slot.latest_request = self.next_sequence();
            }
            // No receivers is fine: nobody is watching.
            let _ = self.invalidation_tx.send(key.clone());
        }
        if !keys.is_empty() {
            info!(count = keys.len(), prefix = ?prefix.segments(), "invalidated queries");
        }
        keys
    }

    /// Marks exactly `key` stale.
    pub fn invalidate_key(&self, key: &QueryKey) -> bool {
        let exact = key.clone();
        let matches = move |candidate: &QueryKey| *candidate == exact;
        !self.invalidate(&KeyPrefix::from(key), Some(&matches)).is_empty()
    }

    /// Subscribes to invalidation notifications.
    pub fn subscribe_invalidation(&self) -> broadcast::Receiver<QueryKey> {
        self.invalidation_tx.subscribe()
    }

    /// Registers a subscriber for `key`, creating its entry if needed.
    ///
    /// While at least one guard is alive the entry is never garbage
    /// collected, and settled requests are allowed to write into it.
    pub fn subscribe(&self, key: &QueryKey) -> SubscriberGuard {
        let mut slot = self.cache.entry(key.clone()).or_insert_with(Slot::new);
        slot.subscribers += 1;
        slot.idle_since = None;
        SubscriberGuard {
            cache: Arc::downgrade(&self.cache),
            key: key.clone(),
        }
    }

    /// Returns the number of live subscribers of `key`.
    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.cache.get(key).map_or(0, |slot| slot.subscribers)
    }

    /// Returns fresh cached data, or fetches it.
    ///
    /// Concurrent callers for the same key share one request. A caller whose
    /// request was superseded by a later one receives the later outcome
    /// instead of its own.
    pub async fn fetch_query<V>(&self, key: &QueryKey, fetcher: &Fetcher<V>) -> Result<V, ApiError>
    where
        V: Clone + Send + Sync + 'static,
    {
        if self.is_disposed() {
            return Err(ApiError::Disposed);
        }
        if let Some(data) = self.fresh_data::<V>(key) {
            debug!(%key, "cache hit");
            return Ok(data);
        }
        // Awaiting callers count as subscribers, so their result is kept.
        let _guard = self.subscribe(key);
        let (seq, request) = self.start_request(key, fetcher, false)?;
        self.await_request(key, seq, request).await
    }

    /// Issues a new request for `key` even if one is already in flight.
    ///
    /// The older request is superseded: whichever order they complete in,
    /// only this one may write to the cache.
    pub async fn refetch_query<V>(
        &self,
        key: &QueryKey,
        fetcher: &Fetcher<V>,
    ) -> Result<V, ApiError>
    where
        V: Clone + Send + Sync + 'static,
    {
        if self.is_disposed() {
            return Err(ApiError::Disposed);
        }
        let _guard = self.subscribe(key);
        let (seq, request) = self.start_request(key, fetcher, true)?;
        self.await_request(key, seq, request).await
    }

    fn fresh_data<V: Clone + 'static>(&self, key: &QueryKey) -> Option<V> {
        let slot = self.cache.get(key)?;
        if slot.is_stale(self.config.stale_time) {
            return None;
        }
        slot.data.as_ref()?.downcast_ref::<V>().cloned()
    }

    fn next_sequence(&self) -> u64 {
        self.next_request.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn start_request<V>(
        &self,
        key: &QueryKey,
        fetcher: &Fetcher<V>,
        force: bool,
    ) -> Result<(u64, SharedFetch), ApiError>
    where
        V: Clone + Send + Sync + 'static,
    {
        if self.is_disposed() {
            return Err(ApiError::Disposed);
        }

        let mut slot = self.cache.entry(key.clone()).or_insert_with(Slot::new);
        if !force {
            if let Some((seq, request)) = &slot.inflight {
                debug!(%key, seq, "joining in-flight request");
                return Ok((*seq, request.clone()));
            }
        }

        let seq = self.next_sequence();
        slot.latest_request = seq;
        slot.status = FetchStatus::Loading;

        let cache = Arc::downgrade(&self.cache);
        let fetcher = Arc::clone(fetcher);
        let shutdown = self.shutdown.clone();
        let config = self.config.clone();
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let outcome = tokio::select! {
                () = shutdown.cancelled() => Err(ApiError::Disposed),
                outcome = fetch_with_retry(&task_key, &fetcher, &config) => outcome,
            };
            let outcome = outcome.map(|data| Arc::new(data) as ErasedData);
            if let Some(cache) = cache.upgrade() {
                settle(&cache, &task_key, seq, &outcome);
            }
            outcome
        });

        let request = async move {
            task.await
                .unwrap_or_else(|err| Err(ApiError::Network(format!("fetch task failed: {err}"))))
        }
        .boxed()
        .shared();

        debug!(%key, seq, "request issued");
        slot.inflight = Some((seq, request.clone()));
        Ok((seq, request))
    }

    async fn await_request<V>(
        &self,
        key: &QueryKey,
        mut seq: u64,
        mut request: SharedFetch,
    ) -> Result<V, ApiError>
    where
        V: Clone + Send + Sync + 'static,
    {
        loop {
            let outcome = request.await;

            let Some(slot) = self.cache.get(key) else {
                return outcome.and_then(|data| downcast(&data));
            };
            if slot.latest_request == seq {
                return outcome.and_then(|data| downcast(&data));
            }
            match &slot.inflight {
                Some((newer, next)) if *newer != seq => {
                    debug!(%key, seq, newer, "following newer request");
                    seq = *newer;
                    request = next.clone();
                }
                _ => match &slot.data {
                    Some(data) if !slot.invalidated => return downcast(data),
                    _ => return outcome.and_then(|data| downcast(&data)),
                },
            }
        }
    }

    /// Drops every entry with no subscribers that has been idle longer than
    /// `cache_time`. Returns the number of entries removed.
    pub fn gc(&self) -> usize {
        let before = self.cache.len();
        let cache_time = self.config.cache_time;
        self.cache
            .retain(|_, slot| slot.inflight.is_some() || !slot.should_gc(cache_time));
        let removed = before.saturating_sub(self.cache.len());
        if removed > 0 {
            debug!(removed, "garbage collected idle queries");
        }
        removed
    }

    /// Runs [`QueryClient::gc`] every `period` until the client is disposed
    /// or dropped.
    pub fn start_gc(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let client: Weak<Self> = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            let mut ticks = IntervalStream::new(ticker).skip(1);

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    tick = ticks.next() => {
                        let (Some(_), Some(strong)) = (tick, client.upgrade()) else {
                            break;
                        };
                        strong.gc();
                    }
                }
            }
            debug!("query gc stopped");
        })
    }

    /// Cancels pending requests, ends every query stream, stops the GC task
    /// and drops every entry.
    pub fn dispose(&self) {
        self.shutdown.cancel();
        let dropped = self.cache.len();
        self.cache.clear();
        info!(dropped, "query client disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token cancelled by [`QueryClient::dispose`].
    pub(crate) fn shutdown(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps an entry alive and eligible for writes while held.
#[derive(Debug)]
pub struct SubscriberGuard {
    cache: Weak<Cache>,
    key: QueryKey,
}

impl SubscriberGuard {
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        let Some(cache) = self.cache.upgrade() else {
            return;
        };
        if let Some(mut slot) = cache.get_mut(&self.key) {
            slot.subscribers = slot.subscribers.saturating_sub(1);
            if slot.subscribers == 0 {
                slot.idle_since = Some(Instant::now());
            }
        }
    }
}

async fn fetch_with_retry<V>(
    key: &QueryKey,
    fetcher: &Fetcher<V>,
    config: &QueryConfig,
) -> Result<V, ApiError> {
    let mut attempt = 0;
    loop {
        match fetcher().await {
            Err(err) if err.is_retryable() && attempt < config.retry => {
                attempt += 1;
                debug!(%key, attempt, error = %err, "retrying query");
                tokio::time::sleep(config.retry_delay).await;
            }
            outcome => return outcome,
        }
    }
}

/// Writes a finished request into its entry, unless it lost the race.
fn settle(cache: &Cache, key: &QueryKey, seq: u64, outcome: &Result<ErasedData, ApiError>) {
    let Some(mut slot) = cache.get_mut(key) else {
        debug!(%key, seq, "entry gone, result discarded");
        return;
    };
    if slot.inflight.as_ref().is_some_and(|(current, _)| *current == seq) {
        slot.inflight = None;
    }
    if slot.latest_request != seq {
        debug!(%key, seq, latest = slot.latest_request, "superseded result discarded");
        return;
    }
    if slot.subscribers == 0 {
        debug!(%key, seq, "no subscribers, result discarded");
        slot.status = if slot.data.is_some() {
            FetchStatus::Success
        } else {
            FetchStatus::Idle
        };
        return;
    }
    match outcome {
        Ok(data) => slot.update(Arc::clone(data)),
        Err(err) => slot.fail(err.clone()),
    }
}

fn downcast<V: Clone + 'static>(data: &ErasedData) -> Result<V, ApiError> {
    data.downcast_ref::<V>()
        .cloned()
        .ok_or_else(|| ApiError::Decode("cached value has a different type".to_string()))
}
