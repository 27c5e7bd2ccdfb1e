use crate::api::{CpfConsultation, CpfLookupParams, Page, PaginationParams};
use crate::query::{Query, QueryKey};

use super::Resources;

impl Resources {
    /// Paginated CPF consultations.
    pub fn cpf_consultations(&self, pagination: PaginationParams) -> Query<Page<CpfConsultation>> {
        self.query(QueryKey::CpfConsultations(pagination), move |api| async move {
            api.get_cpf_consultations(&pagination).await
        })
    }

    /// CPF consultations matching a lookup. Disabled until a field is filled.
    pub fn cpf_lookup(&self, params: CpfLookupParams) -> Query<Page<CpfConsultation>> {
        let enabled = params.has_filters();
        let key = QueryKey::CpfLookup(params.clone());
        self.query(key, move |api| {
            let params = params.clone();
            async move { api.lookup_cpf_consultations(&params).await }
        })
        .enabled(enabled)
    }

    /// Lookup results when `lookup` has content, plain pagination otherwise.
    pub fn active_cpf_consultations(
        &self,
        pagination: PaginationParams,
        lookup: Option<CpfLookupParams>,
    ) -> Query<Page<CpfConsultation>> {
        match lookup.filter(CpfLookupParams::has_filters) {
            Some(params) => self.cpf_lookup(params),
            None => self.cpf_consultations(pagination),
        }
    }
}
