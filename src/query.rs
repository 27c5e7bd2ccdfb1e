//! Query cache, subscriptions and mutations, similar to SWR or TanStack Query.
//!
//! - [`QueryKey`] names a cached result; [`KeyPrefix`] selects groups of them
//! - [`QueryClient`] owns the cache, de-duplicates requests and invalidates
//! - [`Query`] is a subscription that keeps one key up to date
//! - [`Mutation`] writes and then invalidates exactly what the write touched

mod cache;
mod client;
mod config;
mod key;
mod mutation;
mod observer;

pub use cache::{CacheEntry, FetchStatus};
pub use client::{Fetcher, QueryClient, SubscriberGuard};
pub use config::QueryConfig;
pub use key::{KeyPrefix, QueryKey, Segment};
pub use mutation::{
    Invalidation, Mutation, MutationNotice, MutationResult, MutationState, NOTICE_TTL, NoticeKind,
};
pub use observer::{Query, QueryResult, QueryState};
