use crate::api::{
    CreateTransbordoRequest, Page, PaginationParams, Transbordo, TransbordoFilterParams,
};
use crate::error::ApiError;
use crate::query::{Invalidation, KeyPrefix, Mutation, Query, QueryKey};

use super::{Resources, filled};

/// Keys made stale by a recorded handoff: every transbordo page, plus the
/// filtered chat pages scoped to the same phone.
pub fn transbordo_invalidations(request: &CreateTransbordoRequest) -> Vec<Invalidation> {
    let mut plan = vec![Invalidation::prefix(KeyPrefix::new(&["transbordos"]))];

    if filled(Some(request.telefone.as_str())) {
        let telefone = request.telefone.clone();
        plan.push(Invalidation::matching(
            KeyPrefix::new(&["chats", "filtered"]),
            move |key| match key {
                QueryKey::FilteredChats(filters) => {
                    filters.telefone.as_deref() == Some(telefone.as_str())
                }
                _ => false,
            },
        ));
    }

    plan
}

impl Resources {
    /// Transbordo page for `params`.
    pub fn transbordos(&self, params: TransbordoFilterParams) -> Query<Page<Transbordo>> {
        let key = QueryKey::Transbordos(params.clone());
        self.query(key, move |api| {
            let params = params.clone();
            async move { api.get_transbordos(&params).await }
        })
    }

    /// Filtered page when `filters` has content, plain pagination otherwise.
    pub fn active_transbordos(
        &self,
        pagination: PaginationParams,
        filters: Option<TransbordoFilterParams>,
    ) -> Query<Page<Transbordo>> {
        match filters.filter(TransbordoFilterParams::has_filters) {
            Some(filters) => self.transbordos(filters),
            None => self.transbordos(TransbordoFilterParams::from_pagination(pagination)),
        }
    }

    /// `POST /transbordos`, then [`transbordo_invalidations`].
    pub fn create_transbordo(&self) -> Mutation<CreateTransbordoRequest, Transbordo> {
        self.mutation(
            |api, request: CreateTransbordoRequest| async move {
                if !filled(Some(request.telefone.as_str())) {
                    return Err(ApiError::MissingInput("telefone"));
                }
                api.create_transbordo(&request).await
            },
            |request, _| transbordo_invalidations(request),
        )
    }
}
