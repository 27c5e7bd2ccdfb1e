use serde_json::Value;

use crate::api::{Page, PaginationParams, Retry, RetryFilterParams};
use crate::query::{Query, QueryKey};

use super::Resources;

/// Outcome of a resend attempt as the retries table shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStatus {
    Success,
    Failure,
    Unknown,
}

/// Reads the outcome from `retur_api`, which is either a status string or
/// an object with a `msg`.
pub fn retry_status(retry: &Retry) -> RetryStatus {
    match &retry.retur_api {
        Value::String(status) if status.to_lowercase().contains("success") => RetryStatus::Success,
        Value::String(_) => RetryStatus::Failure,
        Value::Object(map) => match map.get("msg").and_then(Value::as_str) {
            Some(msg) if msg.to_lowercase().contains("sucesso") => RetryStatus::Success,
            _ => RetryStatus::Failure,
        },
        _ => RetryStatus::Unknown,
    }
}

impl Resources {
    /// Retry page for `params`.
    pub fn retries(&self, params: RetryFilterParams) -> Query<Page<Retry>> {
        let key = QueryKey::Retries(params.clone());
        self.query(key, move |api| {
            let params = params.clone();
            async move { api.get_retries(&params).await }
        })
    }

    /// Filtered page when `filters` has content, plain pagination otherwise.
    pub fn active_retries(
        &self,
        pagination: PaginationParams,
        filters: Option<RetryFilterParams>,
    ) -> Query<Page<Retry>> {
        match filters.filter(RetryFilterParams::has_filters) {
            Some(filters) => self.retries(filters),
            None => self.retries(RetryFilterParams::from_pagination(pagination)),
        }
    }
}
