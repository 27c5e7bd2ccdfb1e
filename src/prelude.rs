//! Prelude module for convenient imports.
//!
//! ```
//! use desk_query::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`QueryClient`], [`Query`], [`Mutation`] - The cache and its read/write handles
//! - [`QueryKey`] and [`KeyPrefix`] - Cache keys and invalidation prefixes
//! - [`Resources`] - Ready-made queries and mutations per resource
//! - [`ApiClient`] and [`HttpApiClient`] - The API seam and its HTTP implementation
//! - [`Subscription`] - For watching a query as a stream

pub use crate::api::{
    ApiClient, ChatFilterParams, CpfLookupParams, DateRangeParams, HttpApiClient,
    PaginationParams, RetryFilterParams, TransbordoFilterParams,
};
pub use crate::config::{ApiConfig, BuildProfile};
pub use crate::error::ApiError;
pub use crate::hooks::Resources;
pub use crate::query::{
    Invalidation, KeyPrefix, Mutation, MutationState, Query, QueryClient, QueryConfig, QueryKey,
    QueryResult, QueryState,
};
pub use crate::subscription::{Subscription, SubscriptionSource};
