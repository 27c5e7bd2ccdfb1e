//! Per-resource queries and mutations.
//!
//! [`Resources`] binds a [`QueryClient`] to an [`ApiClient`] and hands out
//! ready-made [`Query`] and [`Mutation`] values, one method per resource.
//! Each method derives the cache key from its parameters, decides whether
//! the query may run at all, and for writes, which keys to invalidate.
//!
//! ```rust,ignore
//! let resources = Resources::new(client, api);
//! let page = resources.inbox_chats(PaginationParams::default()).fetch().await?;
//! ```

mod chats;
mod cpf;
mod dashboard;
mod inbox;
mod retries;
mod transbordos;

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;

use crate::api::ApiClient;
use crate::config::BuildProfile;
use crate::error::ApiError;
use crate::query::{Invalidation, Mutation, Query, QueryClient, QueryKey};

pub use chats::message_invalidations;
pub use inbox::{DEFAULT_AGENTE, TransbordoTrigger, inbox_message_invalidations, transbordo_request};
pub use retries::{RetryStatus, retry_status};
pub use transbordos::transbordo_invalidations;

/// Query and mutation factory for every dashboard resource.
#[derive(Clone)]
pub struct Resources {
    client: Arc<QueryClient>,
    api: Arc<dyn ApiClient>,
    profile: BuildProfile,
}

impl std::fmt::Debug for Resources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resources")
            .field("client", &self.client)
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl Resources {
    /// Creates a production resource set.
    pub fn new(client: Arc<QueryClient>, api: Arc<dyn ApiClient>) -> Self {
        Self {
            client,
            api,
            profile: BuildProfile::Production,
        }
    }

    /// Sets the build profile, which decides whether demo data is allowed.
    #[must_use]
    pub const fn with_profile(mut self, profile: BuildProfile) -> Self {
        self.profile = profile;
        self
    }

    pub const fn client(&self) -> &Arc<QueryClient> {
        &self.client
    }

    pub const fn profile(&self) -> BuildProfile {
        self.profile
    }

    /// Builds a query whose fetcher gets its own handle to the API.
    fn query<V, F, Fut>(&self, key: QueryKey, fetch: F) -> Query<V>
    where
        V: Clone + Send + Sync + 'static,
        F: Fn(Arc<dyn ApiClient>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    {
        let api = Arc::clone(&self.api);
        Query::new(key, move || fetch(Arc::clone(&api)).boxed(), Arc::clone(&self.client))
    }

    /// Builds a mutation whose writer gets its own handle to the API.
    fn mutation<I, O, F, Fut, P>(&self, write: F, plan: P) -> Mutation<I, O>
    where
        I: Clone + Send + 'static,
        O: Clone + Send + Sync + 'static,
        F: Fn(Arc<dyn ApiClient>, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, ApiError>> + Send + 'static,
        P: Fn(&I, &O) -> Vec<Invalidation> + Send + Sync + 'static,
    {
        let api = Arc::clone(&self.api);
        Mutation::new(
            move |input| write(Arc::clone(&api), input).boxed(),
            plan,
            Arc::clone(&self.client),
        )
    }
}

/// Returns `true` when `value` is set and not blank.
fn filled(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}
