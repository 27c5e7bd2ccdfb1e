//! Long-lived data sources a view can listen to.
//!
//! A [`SubscriptionSource`] describes a stream of values plus a stable
//! identity. Views hold [`Subscription`]s, which erase the source type and
//! can be mapped into the view's own message type.

use std::any::TypeId;
use std::fmt;

use futures::StreamExt;
use futures::stream::BoxStream;

/// Identity of a subscription: the source type plus a hash of its inputs.
///
/// Two subscriptions with the same id watch the same thing, so a view can
/// keep the running one instead of starting a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    type_id: TypeId,
    hash: u64,
}

impl SubscriptionId {
    /// Builds an id for source type `T` with the given input hash.
    pub fn of<T: 'static>(hash: u64) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            hash,
        }
    }
}

/// A source of values over time.
pub trait SubscriptionSource: Send + Sync {
    type Output;

    /// Starts a new stream of values.
    fn stream(&self) -> BoxStream<'static, Self::Output>;

    /// Stable identity of this source.
    fn id(&self) -> SubscriptionId;
}

/// A type-erased, mappable subscription.
pub struct Subscription<T> {
    id: SubscriptionId,
    start: Box<dyn FnOnce() -> BoxStream<'static, T> + Send>,
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Subscription<T> {
    pub fn new<S>(source: S) -> Self
    where
        S: SubscriptionSource<Output = T> + 'static,
    {
        Self {
            id: source.id(),
            start: Box::new(move || source.stream()),
        }
    }

    /// Transforms every value with `f`, keeping the identity.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> Subscription<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + 'static,
    {
        let start = self.start;
        Subscription {
            id: self.id,
            start: Box::new(move || start().map(f).boxed()),
        }
    }

    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Starts the underlying stream.
    pub fn into_stream(self) -> BoxStream<'static, T> {
        (self.start)()
    }
}
