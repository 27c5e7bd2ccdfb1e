//! # desk-query - query cache for the support desk dashboard
//!
//! desk-query is the data layer of a support-operations dashboard: it reads
//! chats, messages, session events, handoffs (transbordos), resend attempts,
//! CPF consultations and dashboard aggregates from a REST API, caches them
//! under structured keys, and keeps them coherent after writes by
//! invalidating exactly the keys a write may have changed.
//!
//! ## Architecture
//!
//! 1. **Keys**: every cached value lives under a [`QueryKey`](query::QueryKey)
//!    built from its resource and parameters
//! 2. **Cache**: a [`QueryClient`](query::QueryClient) owns the entries,
//!    de-duplicates concurrent fetches and lets the latest request win
//! 3. **Queries**: a [`Query`](query::Query) reads with stale-while-revalidate
//!    semantics and can be watched as a [`Subscription`](subscription::Subscription)
//! 4. **Mutations**: a [`Mutation`](query::Mutation) writes, then marks the
//!    planned keys stale so watchers refetch
//! 5. **Hooks**: [`Resources`](hooks::Resources) hands out ready-made queries
//!    and mutations per resource
//! 6. **Transforms**: raw payloads become view models in [`transform`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use desk_query::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ApiConfig::from_env()?;
//! let profile = config.profile;
//! let api: Arc<dyn ApiClient> = Arc::new(HttpApiClient::new(config)?);
//! let client = Arc::new(QueryClient::new());
//! let resources = Resources::new(Arc::clone(&client), api).with_profile(profile);
//!
//! let page = resources.inbox_chats(PaginationParams::default()).fetch().await?;
//! println!("{} chats", page.pagination.total);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod hooks;
pub mod persist;
pub mod prelude;
pub mod query;
pub mod subscription;
pub mod transform;
