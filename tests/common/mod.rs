// In-process ApiClient used by the cache integration tests.
// Every call is counted; failures and delays are switched on per test.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use desk_query::api::{
    ApiChat, ApiClient, ApiMessage, ApiSessionEvent, ChatFilterParams, ConsultationsData,
    CpfConsultation, CpfLookupParams, CreateMessageRequest, CreateTransbordoRequest,
    DashboardData, DateRangeParams, MessageStats, Page, Pagination, PaginationParams,
    PerformanceData, Retry, RetryFilterParams, Transbordo, TransbordoFilterParams,
    TransbordoRequest,
};
use desk_query::error::ApiError;

#[derive(Debug, Default)]
pub struct FakeApi {
    calls: Mutex<HashMap<&'static str, usize>>,
    message_delays: Mutex<VecDeque<Duration>>,
    pub chat_delay: Mutex<Option<Duration>>,
    pub fail_writes: AtomicBool,
    pub fail_dashboard: AtomicBool,
    pub fail_legacy_dashboard: AtomicBool,
    pub fail_performance: AtomicBool,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }

    /// Delays for successive `get_chat_messages` calls, in order.
    pub fn queue_message_delays(&self, delays: &[Duration]) {
        self.message_delays.lock().unwrap().extend(delays);
    }

    pub fn fail(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }

    fn hit(&self, endpoint: &'static str) -> usize {
        let mut calls = self.calls.lock().unwrap();
        let count = calls.entry(endpoint).or_insert(0);
        *count += 1;
        *count
    }

    fn check(flag: &AtomicBool) -> Result<(), ApiError> {
        if flag.load(Ordering::SeqCst) {
            Err(ApiError::Http {
                status: 500,
                message: "Internal Server Error".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

pub fn chat(id: &str, telefone: &str) -> ApiChat {
    ApiChat {
        id: id.to_string(),
        telefone: Some(telefone.to_string()),
        session: Some(format!("s-{id}")),
        last_message: Some(serde_json::json!("oi")),
        ..ApiChat::default()
    }
}

fn page<T>(items: Vec<T>) -> Page<T> {
    let total = items.len() as u64;
    Page {
        items,
        pagination: Pagination {
            total,
            limit: 10,
            offset: 0,
        },
    }
}

#[async_trait]
impl ApiClient for FakeApi {
    async fn get_chats(&self, _params: Option<&PaginationParams>) -> Result<Page<ApiChat>, ApiError> {
        let n = self.hit("get_chats");
        let delay = *self.chat_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(page(vec![chat(&format!("chat-{n}"), "5511954591234")]))
    }

    async fn filter_chats(&self, filters: &ChatFilterParams) -> Result<Page<ApiChat>, ApiError> {
        self.hit("filter_chats");
        let telefone = filters.telefone.clone().unwrap_or_default();
        Ok(page(vec![chat("filtered", &telefone)]))
    }

    async fn get_chat_messages(&self, chat_id: &str) -> Result<Vec<ApiMessage>, ApiError> {
        let n = self.hit("get_chat_messages");
        let delay = self.message_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(vec![ApiMessage {
            id: format!("{chat_id}-v{n}"),
            message: Some(format!("version {n}")),
            sender: Some("in".to_string()),
            ..ApiMessage::default()
        }])
    }

    async fn get_session_events(&self, chat_id: &str) -> Result<Vec<ApiSessionEvent>, ApiError> {
        let n = self.hit("get_session_events");
        Ok(vec![ApiSessionEvent {
            id: format!("{chat_id}-e{n}"),
            type_event: Some("message".to_string()),
            message: Some(format!("event {n}")),
            ..ApiSessionEvent::default()
        }])
    }

    async fn create_message(&self, request: &CreateMessageRequest) -> Result<ApiMessage, ApiError> {
        self.hit("create_message");
        Self::check(&self.fail_writes)?;
        Ok(ApiMessage {
            id: "sent".to_string(),
            session_id: request.chat_id.clone(),
            telefone: Some(request.telefone.clone()),
            message: Some(request.message.clone()),
            sender: Some("out".to_string()),
            ..ApiMessage::default()
        })
    }

    async fn get_transbordos(
        &self,
        _params: &TransbordoFilterParams,
    ) -> Result<Page<Transbordo>, ApiError> {
        self.hit("get_transbordos");
        Ok(page(Vec::new()))
    }

    async fn create_transbordo(
        &self,
        request: &CreateTransbordoRequest,
    ) -> Result<Transbordo, ApiError> {
        self.hit("create_transbordo");
        Self::check(&self.fail_writes)?;
        Ok(Transbordo {
            id: "t1".to_string(),
            telefone: request.telefone.clone(),
            transbordo: request.transbordo,
            ..Transbordo::default()
        })
    }

    async fn request_transbordo(&self, _request: &TransbordoRequest) -> Result<(), ApiError> {
        self.hit("request_transbordo");
        Self::check(&self.fail_writes)
    }

    async fn get_retries(&self, _params: &RetryFilterParams) -> Result<Page<Retry>, ApiError> {
        self.hit("get_retries");
        Ok(page(Vec::new()))
    }

    async fn get_cpf_consultations(
        &self,
        _params: &PaginationParams,
    ) -> Result<Page<CpfConsultation>, ApiError> {
        self.hit("get_cpf_consultations");
        Ok(page(Vec::new()))
    }

    async fn lookup_cpf_consultations(
        &self,
        _params: &CpfLookupParams,
    ) -> Result<Page<CpfConsultation>, ApiError> {
        self.hit("lookup_cpf_consultations");
        Ok(page(Vec::new()))
    }

    async fn get_dashboard(&self, _range: Option<&DateRangeParams>) -> Result<DashboardData, ApiError> {
        self.hit("get_dashboard");
        Self::check(&self.fail_dashboard)?;
        let mut data = DashboardData::default();
        data.totals.messages = 200;
        Ok(data)
    }

    async fn get_legacy_dashboard(&self) -> Result<DashboardData, ApiError> {
        self.hit("get_legacy_dashboard");
        Self::check(&self.fail_legacy_dashboard)?;
        let mut data = DashboardData::default();
        data.totals.messages = 100;
        Ok(data)
    }

    async fn get_performance(
        &self,
        _range: Option<&DateRangeParams>,
    ) -> Result<PerformanceData, ApiError> {
        self.hit("get_performance");
        Self::check(&self.fail_performance)?;
        let mut data = PerformanceData::default();
        data.metrics.transbordo_rate = 25.0;
        Ok(data)
    }

    async fn get_legacy_performance(&self) -> Result<PerformanceData, ApiError> {
        self.hit("get_legacy_performance");
        Self::check(&self.fail_performance)?;
        Ok(PerformanceData::default())
    }

    async fn get_consultations(
        &self,
        _range: Option<&DateRangeParams>,
    ) -> Result<ConsultationsData, ApiError> {
        self.hit("get_consultations");
        Ok(ConsultationsData::default())
    }

    async fn get_message_stats(&self) -> Result<MessageStats, ApiError> {
        self.hit("get_message_stats");
        Ok(MessageStats::default())
    }
}
