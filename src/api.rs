//! Remote API access.
//!
//! [`ApiClient`] is the seam between the query layer and the network. The
//! hooks only ever talk to `Arc<dyn ApiClient>`, so tests can swap in an
//! in-process fake while production uses [`HttpApiClient`].

mod http;
pub mod params;
pub mod types;

use async_trait::async_trait;

use crate::error::ApiError;

pub use http::HttpApiClient;
pub use params::{
    ChatFilterParams, CpfLookupParams, DateRangeParams, PaginationParams, RetryFilterParams,
    TransbordoFilterParams,
};
pub use types::{
    ApiChat, ApiMessage, ApiSessionEvent, ConsultationsData, CpfConsultation,
    CreateMessageRequest, CreateTransbordoRequest, DashboardData, MessageStats, Page, Pagination,
    PerformanceData, Retry, Transbordo, TransbordoRequest,
};

/// Every endpoint the dashboard consumes.
///
/// Implementations must surface non-2xx responses as [`ApiError::Http`] and
/// `success: false` envelopes as [`ApiError::Application`].
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// `GET /chats`
    async fn get_chats(&self, params: Option<&PaginationParams>) -> Result<Page<ApiChat>, ApiError>;

    /// `GET /chats/filter`
    async fn filter_chats(&self, filters: &ChatFilterParams) -> Result<Page<ApiChat>, ApiError>;

    /// `GET /chats/{id}/messages`
    async fn get_chat_messages(&self, chat_id: &str) -> Result<Vec<ApiMessage>, ApiError>;

    /// `GET /events/session/{id}`
    async fn get_session_events(&self, chat_id: &str) -> Result<Vec<ApiSessionEvent>, ApiError>;

    /// `POST /messages`
    async fn create_message(&self, request: &CreateMessageRequest) -> Result<ApiMessage, ApiError>;

    /// `GET /transbordos`
    async fn get_transbordos(
        &self,
        params: &TransbordoFilterParams,
    ) -> Result<Page<Transbordo>, ApiError>;

    /// `POST /transbordos`
    async fn create_transbordo(
        &self,
        request: &CreateTransbordoRequest,
    ) -> Result<Transbordo, ApiError>;

    /// `POST /webhook/n8n`
    async fn request_transbordo(&self, request: &TransbordoRequest) -> Result<(), ApiError>;

    /// `GET /retries`
    async fn get_retries(&self, params: &RetryFilterParams) -> Result<Page<Retry>, ApiError>;

    /// `GET /cpf-consultations` with pagination only.
    async fn get_cpf_consultations(
        &self,
        params: &PaginationParams,
    ) -> Result<Page<CpfConsultation>, ApiError>;

    /// `GET /cpf-consultations` with lookup filters.
    async fn lookup_cpf_consultations(
        &self,
        params: &CpfLookupParams,
    ) -> Result<Page<CpfConsultation>, ApiError>;

    /// `GET /dashboard`
    async fn get_dashboard(&self, range: Option<&DateRangeParams>)
    -> Result<DashboardData, ApiError>;

    /// `GET /dashboard` on the legacy base URL, without a date range.
    async fn get_legacy_dashboard(&self) -> Result<DashboardData, ApiError>;

    /// `GET /dashboard/performance`
    async fn get_performance(
        &self,
        range: Option<&DateRangeParams>,
    ) -> Result<PerformanceData, ApiError>;

    /// `GET /dashboard/performance` on the legacy base URL.
    async fn get_legacy_performance(&self) -> Result<PerformanceData, ApiError>;

    /// `GET /dashboard/consultations`
    async fn get_consultations(
        &self,
        range: Option<&DateRangeParams>,
    ) -> Result<ConsultationsData, ApiError>;

    /// `GET /messages/stats`
    async fn get_message_stats(&self) -> Result<MessageStats, ApiError>;
}
