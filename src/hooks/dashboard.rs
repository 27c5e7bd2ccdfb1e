use tracing::warn;

use crate::api::{
    ApiClient, ConsultationsData, DashboardData, DateRangeParams, MessageStats, PerformanceData,
};
use crate::error::ApiError;
use crate::query::{Query, QueryKey};
use crate::transform::{DashboardSummary, format_dashboard};

use super::Resources;

/// Primary dashboard endpoint, then the legacy one.
async fn dashboard_or_legacy(
    api: &dyn ApiClient,
    range: Option<&DateRangeParams>,
) -> Result<DashboardData, ApiError> {
    match api.get_dashboard(range).await {
        Ok(data) => Ok(data),
        Err(err) => {
            warn!(error = %err, "dashboard endpoint failed, trying legacy");
            api.get_legacy_dashboard().await
        }
    }
}

/// Primary performance endpoint, then the legacy one.
async fn performance_or_legacy(
    api: &dyn ApiClient,
    range: Option<&DateRangeParams>,
) -> Result<PerformanceData, ApiError> {
    match api.get_performance(range).await {
        Ok(data) => Ok(data),
        Err(err) => {
            warn!(error = %err, "performance endpoint failed, trying legacy");
            api.get_legacy_performance().await
        }
    }
}

impl Resources {
    /// Dashboard aggregates, falling back to the legacy endpoint.
    pub fn dashboard(&self, range: Option<DateRangeParams>) -> Query<DashboardData> {
        let key = QueryKey::Dashboard(range.clone());
        self.query(key, move |api| {
            let range = range.clone();
            async move { dashboard_or_legacy(api.as_ref(), range.as_ref()).await }
        })
    }

    /// Performance metrics, falling back to the legacy endpoint.
    pub fn performance(&self, range: Option<DateRangeParams>) -> Query<PerformanceData> {
        let key = QueryKey::Performance(range.clone());
        self.query(key, move |api| {
            let range = range.clone();
            async move { performance_or_legacy(api.as_ref(), range.as_ref()).await }
        })
    }

    /// CPF consultation aggregates. No legacy fallback.
    pub fn consultations(&self, range: Option<DateRangeParams>) -> Query<ConsultationsData> {
        let key = QueryKey::Consultations(range.clone());
        self.query(key, move |api| {
            let range = range.clone();
            async move { api.get_consultations(range.as_ref()).await }
        })
    }

    /// Message statistics from the legacy API.
    pub fn message_stats(&self) -> Query<MessageStats> {
        self.query(QueryKey::MessageStats, |api| async move {
            api.get_message_stats().await
        })
    }

    /// The formatted dashboard page.
    ///
    /// Missing performance metrics only blank the derived rates. When the
    /// dashboard itself cannot be loaded, development builds fall back to
    /// [`DashboardSummary::demo`] and production builds report the error.
    pub fn dashboard_summary(&self, range: Option<DateRangeParams>) -> Query<DashboardSummary> {
        let profile = self.profile();
        let key = QueryKey::DashboardSummary(range.clone());
        self.query(key, move |api| {
            let range = range.clone();
            async move {
                let (dashboard, performance) = futures::join!(
                    dashboard_or_legacy(api.as_ref(), range.as_ref()),
                    performance_or_legacy(api.as_ref(), range.as_ref()),
                );

                let performance = performance
                    .inspect_err(|err| warn!(error = %err, "performance unavailable"))
                    .ok();

                match dashboard {
                    Ok(dashboard) => Ok(format_dashboard(Some(&dashboard), performance.as_ref())),
                    Err(err) if profile.allows_demo_data() => {
                        warn!(error = %err, "dashboard unavailable, showing demo data");
                        Ok(DashboardSummary::demo())
                    }
                    Err(err) => Err(err),
                }
            }
        })
    }
}
