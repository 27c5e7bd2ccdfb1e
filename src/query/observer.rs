//! Query subscriptions with stale-while-revalidate.
//!
//! Queries are **subscriptions** that keep a view in sync with one cache key.
//! When a [`Query`] stream starts:
//!
//! 1. If cached data exists it is emitted immediately, marked stale or not
//! 2. If data is missing or stale a fetch is issued (shared with any other
//!    reader of the same key)
//! 3. When the key is invalidated the stale value is re-emitted and a
//!    refetch follows
//!
//! A stream ends once its client is disposed.
//!
//! A disabled query never touches the network. Its stream yields a single
//! value: the placeholder if one was given, otherwise [`QueryState::Idle`].
//!
//! # Example
//!
//! ```rust,ignore
//! use desk_query::query::{Query, QueryClient, QueryKey};
//! use desk_query::subscription::Subscription;
//!
//! let query = Query::new(
//!     QueryKey::MessageStats,
//!     move || Box::pin(async move { api.get_message_stats().await }),
//!     client.clone(),
//! );
//! let subscription = Subscription::new(query).map(Message::Stats);
//! ```

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use futures::StreamExt;
use futures::future::{self, BoxFuture};
use futures::stream::{self, BoxStream};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::error::ApiError;
use crate::subscription::{SubscriptionId, SubscriptionSource};

use super::cache::FetchStatus;
use super::client::{Fetcher, QueryClient, SubscriberGuard};
use super::key::QueryKey;

/// The state of a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
    /// Query is disabled or has not started.
    Idle,
    /// Query is fetching and has no data to show yet.
    Loading,
    /// Query has data.
    Success {
        /// The data returned by the query.
        data: T,
        /// Whether the data is stale and being (or about to be) refetched.
        is_stale: bool,
    },
    /// Query failed. Data from an earlier success is kept for display.
    Error {
        error: ApiError,
        stale_data: Option<T>,
    },
}

/// A query result containing the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    /// The current state of the query.
    pub state: QueryState<T>,
}

impl<T> QueryResult<T> {
    pub const fn new(state: QueryState<T>) -> Self {
        Self { state }
    }

    /// Returns the data to display, including data kept through an error.
    pub const fn data(&self) -> Option<&T> {
        match &self.state {
            QueryState::Success { data, .. } => Some(data),
            QueryState::Error {
                stale_data: Some(data),
                ..
            } => Some(data),
            _ => None,
        }
    }

    /// Consumes the result, returning its data.
    pub fn into_data(self) -> Option<T> {
        match self.state {
            QueryState::Success { data, .. } => Some(data),
            QueryState::Error { stale_data, .. } => stale_data,
            _ => None,
        }
    }

    /// Returns the error if the query failed.
    pub const fn error(&self) -> Option<&ApiError> {
        match &self.state {
            QueryState::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Returns `true` if the query is loading without data.
    pub const fn is_loading(&self) -> bool {
        matches!(self.state, QueryState::Loading)
    }

    /// Returns `true` if the query succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self.state, QueryState::Success { .. })
    }

    /// Returns `true` if the query failed.
    pub const fn is_error(&self) -> bool {
        matches!(self.state, QueryState::Error { .. })
    }

    /// Returns `true` if the query data is stale.
    pub const fn is_stale(&self) -> bool {
        matches!(self.state, QueryState::Success { is_stale: true, .. })
    }

    /// Returns `true` if the query is disabled or not started.
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, QueryState::Idle)
    }

    /// Transforms the data, keeping the state.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryResult<U> {
        let state = match self.state {
            QueryState::Idle => QueryState::Idle,
            QueryState::Loading => QueryState::Loading,
            QueryState::Success { data, is_stale } => QueryState::Success {
                data: f(data),
                is_stale,
            },
            QueryState::Error { error, stale_data } => QueryState::Error {
                error,
                stale_data: stale_data.map(f),
            },
        };
        QueryResult { state }
    }
}

/// A query subscription that monitors and fetches one key.
pub struct Query<V> {
    key: QueryKey,
    fetcher: Fetcher<V>,
    client: Arc<QueryClient>,
    enabled: bool,
    placeholder: Option<V>,
}

impl<V> Query<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new query with the given key, fetcher, and client.
    ///
    /// # Arguments
    ///
    /// * `key` - Cache key for this query
    /// * `fetcher` - An async function that fetches the data
    /// * `client` - The query client owning the cache
    pub fn new<F>(key: QueryKey, fetcher: F, client: Arc<QueryClient>) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<V, ApiError>> + Send + Sync + 'static,
    {
        Self {
            key,
            fetcher: Arc::new(fetcher),
            client,
            enabled: true,
            placeholder: None,
        }
    }

    /// Enables or disables execution. A disabled query never fetches.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Value reported while the query is disabled.
    #[must_use]
    pub fn placeholder(mut self, value: V) -> Self {
        self.placeholder = Some(value);
        self
    }

    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns fresh data from the cache or fetches it once.
    ///
    /// A disabled query resolves to its placeholder without any request, or
    /// to [`ApiError::MissingInput`] when it has none.
    pub async fn fetch(&self) -> Result<V, ApiError> {
        if !self.enabled {
            return self.disabled_value();
        }
        self.client.fetch_query(&self.key, &self.fetcher).await
    }

    /// Issues a new request even if the cached data is fresh.
    pub async fn refetch(&self) -> Result<V, ApiError> {
        if !self.enabled {
            return self.disabled_value();
        }
        self.client.refetch_query(&self.key, &self.fetcher).await
    }

    fn disabled_value(&self) -> Result<V, ApiError> {
        self.placeholder
            .clone()
            .ok_or(ApiError::MissingInput("query input"))
    }

    /// Current state, read from the cache without fetching.
    pub fn current(&self) -> QueryResult<V> {
        if !self.enabled {
            let state = match &self.placeholder {
                Some(data) => QueryState::Success {
                    data: data.clone(),
                    is_stale: false,
                },
                None => QueryState::Idle,
            };
            return QueryResult::new(state);
        }

        let Some(entry) = self.client.entry::<V>(&self.key) else {
            return QueryResult::new(QueryState::Idle);
        };
        let state = match (entry.status, entry.data, entry.error) {
            (FetchStatus::Error, stale_data, Some(error)) => QueryState::Error { error, stale_data },
            (_, Some(data), _) => QueryState::Success {
                data,
                is_stale: !self.client.is_fresh(&self.key),
            },
            (FetchStatus::Loading, None, _) => QueryState::Loading,
            _ => QueryState::Idle,
        };
        QueryResult::new(state)
    }
}

impl<V> SubscriptionSource for Query<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Output = QueryResult<V>;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        if !self.enabled {
            return stream::once(future::ready(self.current())).boxed();
        }

        let watch = Arc::new(Watch {
            key: self.key.clone(),
            fetcher: Arc::clone(&self.fetcher),
            client: Arc::clone(&self.client),
            _guard: self.client.subscribe(&self.key),
        });

        stream::unfold(State::Initial, move |state| {
            let watch = Arc::clone(&watch);
            async move { watch.step(state).await }
        })
        .boxed()
    }

    fn id(&self) -> SubscriptionId {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}

impl<V> Hash for Query<V> {
    fn hash<H>(&self, hasher: &mut H)
    where
        H: Hasher,
    {
        self.key.hash(hasher);
        self.enabled.hash(hasher);
    }
}

/// Everything a running stream needs. Dropping the stream drops the guard.
struct Watch<V> {
    key: QueryKey,
    fetcher: Fetcher<V>,
    client: Arc<QueryClient>,
    _guard: SubscriberGuard,
}

/// Internal state machine for the Query subscription.
enum State {
    Initial,
    Fetching { rx: broadcast::Receiver<QueryKey> },
    Watching { rx: broadcast::Receiver<QueryKey> },
    Done,
}

impl<V> Watch<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn step(&self, state: State) -> Option<(QueryResult<V>, State)> {
        match state {
            State::Initial => {
                // Subscribe first so an invalidation racing the fetch is not lost.
                let rx = self.client.subscribe_invalidation();
                match self.client.get_query_data::<V>(&self.key) {
                    Some(data) => {
                        let is_stale = !self.client.is_fresh(&self.key);
                        let result = QueryResult::new(QueryState::Success { data, is_stale });
                        if is_stale {
                            Some((result, State::Fetching { rx }))
                        } else {
                            Some((result, State::Watching { rx }))
                        }
                    }
                    None => Some((QueryResult::new(QueryState::Loading), State::Fetching { rx })),
                }
            }

            State::Fetching { rx } => {
                match self.client.fetch_query(&self.key, &self.fetcher).await {
                    Ok(data) => {
                        let result = QueryResult::new(QueryState::Success {
                            data,
                            is_stale: false,
                        });
                        Some((result, State::Watching { rx }))
                    }
                    Err(ApiError::Disposed) => {
                        let result = QueryResult::new(QueryState::Error {
                            error: ApiError::Disposed,
                            stale_data: None,
                        });
                        Some((result, State::Done))
                    }
                    Err(error) => {
                        let result = QueryResult::new(QueryState::Error {
                            error,
                            stale_data: self.client.get_query_data(&self.key),
                        });
                        Some((result, State::Watching { rx }))
                    }
                }
            }

            State::Watching { mut rx } => {
                let shutdown = self.client.shutdown();
                loop {
                    let received = tokio::select! {
                        () = shutdown.cancelled() => return None,
                        received = rx.recv() => received,
                    };
                    match received {
                        Ok(invalidated) if invalidated == self.key => break,
                        Ok(_) => {}
                        // Missed notifications: refetch only if ours was among them.
                        Err(RecvError::Lagged(_)) if !self.client.is_fresh(&self.key) => break,
                        Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => return None,
                    }
                }
                let state = match self.client.get_query_data::<V>(&self.key) {
                    Some(data) => QueryState::Success {
                        data,
                        is_stale: true,
                    },
                    None => QueryState::Loading,
                };
                Some((QueryResult::new(state), State::Fetching { rx }))
            }

            State::Done => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::KeyPrefix;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_query(client: &Arc<QueryClient>, calls: &Arc<AtomicUsize>) -> Query<usize> {
        let calls = Arc::clone(calls);
        Query::new(
            QueryKey::MessageStats,
            move || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Ok(n) }.boxed()
            },
            Arc::clone(client),
        )
    }

    #[test]
    fn test_query_result_data() {
        let result = QueryResult::new(QueryState::Success {
            data: 42,
            is_stale: false,
        });
        assert_eq!(result.data(), Some(&42));

        let result: QueryResult<i32> = QueryResult::new(QueryState::Loading);
        assert_eq!(result.data(), None);

        let result = QueryResult::new(QueryState::Error {
            error: ApiError::Network("down".into()),
            stale_data: Some(1),
        });
        assert_eq!(result.data(), Some(&1));
        assert!(result.is_error());
        assert_eq!(result.error(), Some(&ApiError::Network("down".into())));
    }

    #[test]
    fn test_query_result_predicates() {
        let loading: QueryResult<i32> = QueryResult::new(QueryState::Loading);
        assert!(loading.is_loading());
        assert!(!loading.is_success());
        assert!(!loading.is_error());
        assert!(!loading.is_stale());

        let stale = QueryResult::new(QueryState::Success {
            data: 42,
            is_stale: true,
        });
        assert!(stale.is_success());
        assert!(stale.is_stale());

        let idle: QueryResult<i32> = QueryResult::new(QueryState::Idle);
        assert!(idle.is_idle());
        assert!(!idle.is_loading());
    }

    #[test]
    fn test_query_result_map() {
        let result = QueryResult::new(QueryState::Success {
            data: 2,
            is_stale: true,
        })
        .map(|n| n * 10);
        assert_eq!(result.data(), Some(&20));
        assert!(result.is_stale());
    }

    #[tokio::test]
    async fn test_disabled_query_never_fetches() {
        let client = Arc::new(QueryClient::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_query(&client, &calls).enabled(false).placeholder(0);

        let values: Vec<_> = query.stream().collect().await;
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].data(), Some(&0));
        assert_eq!(query.fetch().await, Ok(0));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(client.keys().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_query_without_placeholder_is_idle() {
        let client = Arc::new(QueryClient::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_query(&client, &calls).enabled(false);

        assert!(query.current().is_idle());
        assert_eq!(
            query.fetch().await,
            Err(ApiError::MissingInput("query input"))
        );
    }

    #[tokio::test]
    async fn test_stream_loads_then_succeeds() {
        let client = Arc::new(QueryClient::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_query(&client, &calls);

        let mut stream = query.stream();
        assert!(stream.next().await.expect("loading").is_loading());
        let loaded = stream.next().await.expect("success");
        assert_eq!(loaded.data(), Some(&1));
        assert!(!loaded.is_stale());
        assert_eq!(client.subscriber_count(&QueryKey::MessageStats), 1);

        drop(stream);
        assert_eq!(client.subscriber_count(&QueryKey::MessageStats), 0);
    }

    #[tokio::test]
    async fn test_stream_refetches_after_invalidation() {
        let client = Arc::new(QueryClient::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_query(&client, &calls);

        let mut stream = query.stream();
        stream.next().await.expect("loading");
        stream.next().await.expect("success");

        client.invalidate(&KeyPrefix::new(&["messageStats"]), None);

        let stale = stream.next().await.expect("stale snapshot");
        assert_eq!(stale.data(), Some(&1));
        assert!(stale.is_stale());

        let fresh = stream.next().await.expect("refetched");
        assert_eq!(fresh.data(), Some(&2));
        assert!(!fresh.is_stale());
    }

    #[tokio::test]
    async fn test_second_subscriber_sees_cached_value() {
        let client = Arc::new(QueryClient::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let first = counting_query(&client, &calls);
        assert_eq!(first.fetch().await, Ok(1));

        let second = counting_query(&client, &calls);
        let mut stream = second.stream();
        let cached = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("emits immediately")
            .expect("value");
        assert_eq!(cached.data(), Some(&1));
        assert!(!cached.is_stale());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispose_ends_watching_stream() {
        let client = Arc::new(QueryClient::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_query(&client, &calls);

        let mut stream = query.stream();
        stream.next().await.expect("loading");
        stream.next().await.expect("success");

        client.dispose();
        let next = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("stream ends after dispose");
        assert!(next.is_none());
    }

    #[test]
    fn test_query_id_depends_on_key() {
        let client = Arc::new(QueryClient::new());
        let a: Query<i32> = Query::new(
            QueryKey::MessageStats,
            || async { Ok(1) }.boxed(),
            Arc::clone(&client),
        );
        let b: Query<i32> = Query::new(QueryKey::Chats(None), || async { Ok(1) }.boxed(), client);
        assert_ne!(a.id(), b.id());
    }
}
