//! Write operations and the cache invalidation they trigger.
//!
//! A [`Mutation`] pairs a write against the API with an invalidation plan.
//! When the write succeeds the plan is evaluated against the input and the
//! result, and every matching cache key is marked stale so subscribed
//! queries refetch. Cached data is never patched in place.
//!
//! A failed write invalidates nothing; the error goes back to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use desk_query::query::{Invalidation, KeyPrefix, Mutation};
//!
//! let mutation = Mutation::new(
//!     move |request| Box::pin(async move { api.create_message(&request).await }),
//!     |_request, _message| vec![Invalidation::prefix(KeyPrefix::new(&["chats"]))],
//!     client.clone(),
//! );
//! let message = mutation.mutate_async(request).await?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::ApiError;

use super::client::QueryClient;
use super::key::{KeyPrefix, QueryKey};

/// How long a [`MutationNotice`] stays visible.
pub const NOTICE_TTL: Duration = Duration::from_secs(3);

/// The state of a mutation result.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationState<T> {
    /// Mutation is idle (not yet started).
    Idle,
    /// Mutation is in progress.
    Loading,
    /// Mutation succeeded with a result.
    Success(T),
    /// Mutation failed with an error.
    Error(ApiError),
}

/// A mutation result containing the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult<T> {
    /// The current state of the mutation.
    pub state: MutationState<T>,
}

impl<T> MutationResult<T> {
    /// Returns the result data if the mutation succeeded, otherwise `None`.
    pub const fn data(&self) -> Option<&T> {
        match &self.state {
            MutationState::Success(data) => Some(data),
            _ => None,
        }
    }

    pub const fn error(&self) -> Option<&ApiError> {
        match &self.state {
            MutationState::Error(error) => Some(error),
            _ => None,
        }
    }

    /// Returns `true` if the mutation is currently loading.
    pub const fn is_loading(&self) -> bool {
        matches!(self.state, MutationState::Loading)
    }

    /// Returns `true` if the mutation succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self.state, MutationState::Success(_))
    }

    /// Returns `true` if the mutation failed.
    pub const fn is_error(&self) -> bool {
        matches!(self.state, MutationState::Error(_))
    }
}

type KeyPredicate = Box<dyn Fn(&QueryKey) -> bool + Send + Sync>;

/// One group of keys to mark stale after a successful write.
pub struct Invalidation {
    prefix: KeyPrefix,
    predicate: Option<KeyPredicate>,
}

impl fmt::Debug for Invalidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invalidation")
            .field("prefix", &self.prefix)
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}

impl Invalidation {
    /// Every key starting with `prefix`.
    pub const fn prefix(prefix: KeyPrefix) -> Self {
        Self {
            prefix,
            predicate: None,
        }
    }

    /// Exactly `key`.
    pub fn exact(key: QueryKey) -> Self {
        let prefix = KeyPrefix::from(&key);
        Self::matching(prefix, move |candidate| *candidate == key)
    }

    /// Keys starting with `prefix` for which `predicate` holds.
    pub fn matching<P>(prefix: KeyPrefix, predicate: P) -> Self
    where
        P: Fn(&QueryKey) -> bool + Send + Sync + 'static,
    {
        Self {
            prefix,
            predicate: Some(Box::new(predicate)),
        }
    }

    /// Marks the matching keys stale. Returns the keys it touched.
    pub fn apply(&self, client: &QueryClient) -> Vec<QueryKey> {
        client.invalidate(&self.prefix, self.predicate.as_deref())
    }

    /// Returns `true` if `key` would be invalidated by this entry.
    pub fn covers(&self, key: &QueryKey) -> bool {
        key.starts_with(&self.prefix) && self.predicate.as_ref().is_none_or(|matches| matches(key))
    }
}

type Mutator<I, O> = Arc<dyn Fn(I) -> BoxFuture<'static, Result<O, ApiError>> + Send + Sync>;
type Plan<I, O> = Arc<dyn Fn(&I, &O) -> Vec<Invalidation> + Send + Sync>;

/// A write operation with targeted invalidation on success.
pub struct Mutation<I, O> {
    mutator: Mutator<I, O>,
    plan: Plan<I, O>,
    client: Arc<QueryClient>,
    state: watch::Sender<MutationState<O>>,
    pending: Arc<AtomicUsize>,
}

impl<I, O> fmt::Debug for Mutation<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutation")
            .field("pending", &self.pending.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<I, O> Mutation<I, O>
where
    I: Clone + Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    /// Creates a mutation from a write function and an invalidation plan.
    ///
    /// # Arguments
    ///
    /// * `mutator` - An async function that performs the write
    /// * `plan` - Computes which keys to invalidate from the input and result
    /// * `client` - The query client whose cache is invalidated
    pub fn new<F, P>(mutator: F, plan: P, client: Arc<QueryClient>) -> Self
    where
        F: Fn(I) -> BoxFuture<'static, Result<O, ApiError>> + Send + Sync + 'static,
        P: Fn(&I, &O) -> Vec<Invalidation> + Send + Sync + 'static,
    {
        let (state, _) = watch::channel(MutationState::Idle);
        Self {
            mutator: Arc::new(mutator),
            plan: Arc::new(plan),
            client,
            state,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Runs the write and, on success, invalidates the planned keys.
    pub async fn mutate_async(&self, input: I) -> Result<O, ApiError> {
        let _pending = Pending::enter(&self.pending);
        self.state.send_replace(MutationState::Loading);

        match (self.mutator)(input.clone()).await {
            Ok(output) => {
                let invalidated: Vec<QueryKey> = (self.plan)(&input, &output)
                    .iter()
                    .flat_map(|invalidation| invalidation.apply(&self.client))
                    .collect();
                info!(count = invalidated.len(), "mutation succeeded");
                self.state.send_replace(MutationState::Success(output.clone()));
                Ok(output)
            }
            Err(err) => {
                warn!(error = %err, "mutation failed, nothing invalidated");
                self.state.send_replace(MutationState::Error(err.clone()));
                Err(err)
            }
        }
    }

    /// Returns `true` while at least one write is in progress.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    /// Outcome of the most recent write.
    pub fn result(&self) -> MutationResult<O> {
        MutationResult {
            state: self.state.borrow().clone(),
        }
    }

    /// Watches state changes.
    pub fn watch(&self) -> watch::Receiver<MutationState<O>> {
        self.state.subscribe()
    }

    /// Returns to [`MutationState::Idle`].
    pub fn reset(&self) {
        self.state.send_replace(MutationState::Idle);
    }
}

struct Pending(Arc<AtomicUsize>);

impl Pending {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// A short-lived message shown after a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationNotice {
    pub kind: NoticeKind,
    pub message: String,
    pub shown_at: Instant,
}

impl MutationNotice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
            shown_at: Instant::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
            shown_at: Instant::now(),
        }
    }

    /// Builds the notice for a finished write.
    pub fn from_outcome<O>(
        outcome: &Result<O, ApiError>,
        on_success: &str,
        on_error: &str,
    ) -> Self {
        match outcome {
            Ok(_) => Self::success(on_success),
            Err(_) => Self::error(on_error),
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) >= NOTICE_TTL
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Waits until the notice should be dismissed.
    pub async fn expired(&self) {
        tokio::time::sleep_until((self.shown_at + NOTICE_TTL).into()).await;
    }
}
