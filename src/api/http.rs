use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use super::params::{
    ChatFilterParams, CpfLookupParams, DateRangeParams, PaginationParams, RetryFilterParams,
    TransbordoFilterParams,
};
use super::types::{
    ApiChat, ApiMessage, ApiSessionEvent, ConsultationsData, CpfConsultation,
    CreateMessageRequest, CreateTransbordoRequest, DashboardData, MessageStats, Page, Pagination,
    PerformanceData, Retry, Transbordo, TransbordoRequest,
};
use super::ApiClient;
use crate::config::ApiConfig;
use crate::error::ApiError;

/// Body shape shared by every endpoint: `{success, data, pagination?}`.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    pagination: Option<Pagination>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

const fn default_success() -> bool {
    true
}

#[derive(Debug)]
struct Envelope<T> {
    data: T,
    pagination: Option<Pagination>,
}

impl<T> Envelope<Vec<T>> {
    fn into_page(self) -> Page<T> {
        Page {
            items: self.data,
            pagination: self.pagination.unwrap_or_default(),
        }
    }
}

fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<Envelope<T>, ApiError> {
    let raw: RawEnvelope = serde_json::from_str(body)?;
    if !raw.success {
        let reason = raw
            .message
            .or(raw.error)
            .unwrap_or_else(|| "server reported success: false".to_string());
        return Err(ApiError::Application(reason));
    }
    let data = serde_json::from_value(raw.data)?;
    Ok(Envelope {
        data,
        pagination: raw.pagination,
    })
}

/// Pulls a human-readable reason out of an error body, if it has one.
fn error_reason(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|field| value.get(*field)?.as_str().map(str::to_string))
}

/// [`ApiClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: Client,
    config: ApiConfig,
}

impl HttpApiClient {
    /// Builds a client with JSON headers and the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub const fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(base: &str, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(base)
            .map_err(|e| ApiError::Network(format!("invalid base URL {base}: {e}")))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| ApiError::Network(format!("base URL cannot carry a path: {base}")))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> Result<String, ApiError> {
        let response = request.send().await.map_err(|e| {
            error!(path, error = %e, "API request failed");
            ApiError::from(e)
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!(path, error = %e, "failed to read API response body");
            ApiError::Network(e.to_string())
        })?;

        if !status.is_success() {
            let message = error_reason(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string()
            });
            error!(path, status = status.as_u16(), %message, "API error response");
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
            });
        }

        debug!(path, status = status.as_u16(), "API response");
        Ok(body)
    }

    async fn get<T, Q>(
        &self,
        base: &str,
        segments: &[&str],
        query: Option<&Q>,
    ) -> Result<Envelope<T>, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized + Sync,
    {
        let url = Self::url(base, segments)?;
        let path = url.path().to_string();
        let mut request = self.client.get(url);
        if let Some(query) = query {
            request = request.query(query);
        }
        let body = self.send(request, &path).await?;
        decode_envelope(&body).inspect_err(|e| error!(path, error = %e, "API envelope rejected"))
    }

    async fn post<T, B>(&self, segments: &[&str], body: &B) -> Result<Envelope<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let url = Self::url(&self.config.base_url, segments)?;
        let path = url.path().to_string();
        let text = self.send(self.client.post(url).json(body), &path).await?;
        decode_envelope(&text).inspect_err(|e| error!(path, error = %e, "API envelope rejected"))
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn get_chats(&self, params: Option<&PaginationParams>) -> Result<Page<ApiChat>, ApiError> {
        let envelope: Envelope<Vec<ApiChat>> =
            self.get(&self.config.base_url, &["chats"], params).await?;
        Ok(envelope.into_page())
    }

    async fn filter_chats(&self, filters: &ChatFilterParams) -> Result<Page<ApiChat>, ApiError> {
        let envelope: Envelope<Vec<ApiChat>> = self
            .get(&self.config.base_url, &["chats", "filter"], Some(filters))
            .await?;
        Ok(envelope.into_page())
    }

    async fn get_chat_messages(&self, chat_id: &str) -> Result<Vec<ApiMessage>, ApiError> {
        let envelope: Envelope<Vec<ApiMessage>> = self
            .get::<_, ()>(&self.config.base_url, &["chats", chat_id, "messages"], None)
            .await?;
        Ok(envelope.data)
    }

    async fn get_session_events(&self, chat_id: &str) -> Result<Vec<ApiSessionEvent>, ApiError> {
        let envelope: Envelope<Vec<ApiSessionEvent>> = self
            .get::<_, ()>(&self.config.base_url, &["events", "session", chat_id], None)
            .await?;
        Ok(envelope.data)
    }

    async fn create_message(&self, request: &CreateMessageRequest) -> Result<ApiMessage, ApiError> {
        let envelope: Envelope<ApiMessage> = self.post(&["messages"], request).await?;
        Ok(envelope.data)
    }

    async fn get_transbordos(
        &self,
        params: &TransbordoFilterParams,
    ) -> Result<Page<Transbordo>, ApiError> {
        let envelope: Envelope<Vec<Transbordo>> = self
            .get(&self.config.base_url, &["transbordos"], Some(params))
            .await?;
        Ok(envelope.into_page())
    }

    async fn create_transbordo(
        &self,
        request: &CreateTransbordoRequest,
    ) -> Result<Transbordo, ApiError> {
        let envelope: Envelope<Transbordo> = self.post(&["transbordos"], request).await?;
        Ok(envelope.data)
    }

    async fn request_transbordo(&self, request: &TransbordoRequest) -> Result<(), ApiError> {
        // The webhook answers with whatever the workflow returns, so only the
        // status is checked.
        let url = Self::url(&self.config.base_url, &["webhook", "n8n"])?;
        let path = url.path().to_string();
        self.send(self.client.post(url).json(request), &path)
            .await
            .map(|_| ())
    }

    async fn get_retries(&self, params: &RetryFilterParams) -> Result<Page<Retry>, ApiError> {
        let envelope: Envelope<Vec<Retry>> = self
            .get(&self.config.base_url, &["retries"], Some(params))
            .await?;
        Ok(envelope.into_page())
    }

    async fn get_cpf_consultations(
        &self,
        params: &PaginationParams,
    ) -> Result<Page<CpfConsultation>, ApiError> {
        let envelope: Envelope<Vec<CpfConsultation>> = self
            .get(&self.config.base_url, &["cpf-consultations"], Some(params))
            .await?;
        Ok(envelope.into_page())
    }

    async fn lookup_cpf_consultations(
        &self,
        params: &CpfLookupParams,
    ) -> Result<Page<CpfConsultation>, ApiError> {
        let envelope: Envelope<Vec<CpfConsultation>> = self
            .get(&self.config.base_url, &["cpf-consultations"], Some(params))
            .await?;
        Ok(envelope.into_page())
    }

    async fn get_dashboard(
        &self,
        range: Option<&DateRangeParams>,
    ) -> Result<DashboardData, ApiError> {
        let envelope: Envelope<DashboardData> = self
            .get(&self.config.base_url, &["dashboard"], range)
            .await?;
        Ok(envelope.data)
    }

    async fn get_legacy_dashboard(&self) -> Result<DashboardData, ApiError> {
        let envelope: Envelope<DashboardData> = self
            .get::<_, ()>(&self.config.legacy_base_url, &["dashboard"], None)
            .await?;
        Ok(envelope.data)
    }

    async fn get_performance(
        &self,
        range: Option<&DateRangeParams>,
    ) -> Result<PerformanceData, ApiError> {
        let envelope: Envelope<PerformanceData> = self
            .get(&self.config.base_url, &["dashboard", "performance"], range)
            .await?;
        Ok(envelope.data)
    }

    async fn get_legacy_performance(&self) -> Result<PerformanceData, ApiError> {
        let envelope: Envelope<PerformanceData> = self
            .get::<_, ()>(
                &self.config.legacy_base_url,
                &["dashboard", "performance"],
                None,
            )
            .await?;
        Ok(envelope.data)
    }

    async fn get_consultations(
        &self,
        range: Option<&DateRangeParams>,
    ) -> Result<ConsultationsData, ApiError> {
        let envelope: Envelope<ConsultationsData> = self
            .get(&self.config.base_url, &["dashboard", "consultations"], range)
            .await?;
        Ok(envelope.data)
    }

    async fn get_message_stats(&self) -> Result<MessageStats, ApiError> {
        let envelope: Envelope<MessageStats> = self
            .get::<_, ()>(&self.config.base_url, &["messages", "stats"], None)
            .await?;
        Ok(envelope.data)
    }
}
