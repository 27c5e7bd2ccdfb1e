//! Request and response payloads.
//!
//! Response records are deliberately lenient: every optional or loosely typed
//! field is accepted as-is (often as a raw [`Value`]) and turned into a fully
//! populated view model by [`crate::transform`]. A required field that is
//! missing or `null` takes its default.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Reads `null` as the type's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Pagination block returned by list endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub limit: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub offset: u64,
}

/// A list response: the `data` array plus its pagination block.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub const fn total(&self) -> u64 {
        self.pagination.total
    }
}

/// A chat as stored remotely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiChat {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    /// Either a string or an empty-object sentinel.
    pub last_message: Option<Value>,
    /// Either a number or a numeric string.
    pub message_count: Option<Value>,
    pub telefone: Option<String>,
    pub session: Option<String>,
    pub instancia: Option<String>,
    pub balance: Option<String>,
    pub bank: Option<String>,
    pub has_balance: Option<bool>,
    pub creating_at: Option<Value>,
    pub updated_at: Option<String>,
}

/// A chat message from `GET /chats/{id}/messages` or `POST /messages`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiMessage {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    pub session_id: Option<String>,
    pub instancia: Option<String>,
    pub telefone: Option<String>,
    /// One of `in`, `out`, `user`, `bot`; anything else is tolerated.
    pub sender: Option<String>,
    pub transbordo: Option<bool>,
    pub message: Option<String>,
    pub creating_at: Option<Value>,
    pub created_at: Option<String>,
    pub retry: Option<bool>,
    pub retorno_api: Option<Value>,
}

/// An event from `GET /events/session/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSessionEvent {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    pub type_event: Option<String>,
    pub session_id: Option<String>,
    pub instancia: Option<String>,
    pub session: Option<String>,
    pub telefone: Option<String>,
    pub cpf: Option<String>,
    pub agente: Option<String>,
    pub sender: Option<String>,
    pub transbordo: Option<bool>,
    pub event_group: Option<bool>,
    pub message: Option<String>,
    pub id_event_n8n: Option<String>,
    pub id_event_sub_flow_n8n: Option<String>,
    pub creating_at: Option<String>,
    pub retur_api: Option<Value>,
}

/// Body of `POST /messages`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMessageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instancia: Option<String>,
    pub telefone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transbordo: Option<bool>,
    pub message: String,
}

impl CreateMessageRequest {
    pub fn new(telefone: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            telefone: telefone.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    #[must_use]
    pub fn instancia(mut self, instancia: impl Into<String>) -> Self {
        self.instancia = Some(instancia.into());
        self
    }

    #[must_use]
    pub fn sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }
}

/// A handoff record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transbordo {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub session: String,
    #[serde(deserialize_with = "null_as_default")]
    pub telefone: String,
    #[serde(deserialize_with = "null_as_default")]
    pub transbordo: bool,
    /// Either a string or `{status, descricao, protocolo, sessaoid}`.
    pub retur_api: Value,
    #[serde(deserialize_with = "null_as_default")]
    pub codigo: String,
    #[serde(deserialize_with = "null_as_default")]
    pub creating_at: String,
    pub created_at: Option<String>,
}

/// Body of `POST /transbordos`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransbordoRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_n8n: Option<String>,
    pub telefone: String,
    pub transbordo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retur_api: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codigo: Option<String>,
}

/// Body of `POST /webhook/n8n`, which hands the conversation to a human.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransbordoRequest {
    pub telefone: String,
    pub session: String,
    pub agente: String,
    pub instancia: String,
}

/// A recorded resend attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Retry {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub session: String,
    #[serde(deserialize_with = "null_as_default")]
    pub telefone: String,
    #[serde(deserialize_with = "null_as_default")]
    pub error: String,
    #[serde(deserialize_with = "null_as_default")]
    pub flague_transbordo: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tentativas_executadas: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ultima_mensagem: String,
    #[serde(deserialize_with = "null_as_default")]
    pub new_message: String,
    /// Either a string or `{msg, id_facebook?}`.
    pub retur_api: Value,
    #[serde(deserialize_with = "null_as_default")]
    pub creating_at: String,
}

/// A CPF registry lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpfConsultation {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub session: String,
    #[serde(deserialize_with = "null_as_default")]
    pub telefone: String,
    #[serde(deserialize_with = "null_as_default")]
    pub agente: String,
    #[serde(deserialize_with = "null_as_default")]
    pub cpf: String,
    pub retur_api: Value,
    #[serde(deserialize_with = "null_as_default")]
    pub creating_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DashboardTotals {
    #[serde(deserialize_with = "null_as_default")]
    pub chats: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub messages: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub contacts: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub transbordos: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub cpf_consultations: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub events: u64,
}

/// Date-bucketed counter. Counts arrive as strings or numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartItem {
    #[serde(deserialize_with = "null_as_default")]
    pub date: String,
    pub count: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankDistributionItem {
    #[serde(deserialize_with = "null_as_default")]
    pub bank: String,
    pub count: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventTypeItem {
    #[serde(deserialize_with = "null_as_default")]
    pub type_event: String,
    pub count: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DashboardCharts {
    #[serde(deserialize_with = "null_as_default")]
    pub chats_by_day: Vec<ChartItem>,
    #[serde(deserialize_with = "null_as_default")]
    pub messages_by_day: Vec<ChartItem>,
    #[serde(deserialize_with = "null_as_default")]
    pub transbordos_by_day: Vec<ChartItem>,
    #[serde(deserialize_with = "null_as_default")]
    pub bank_distribution: Vec<BankDistributionItem>,
    #[serde(deserialize_with = "null_as_default")]
    pub events_by_type: Vec<EventTypeItem>,
}

/// Payload of `GET /dashboard`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardData {
    #[serde(deserialize_with = "null_as_default")]
    pub totals: DashboardTotals,
    #[serde(deserialize_with = "null_as_default")]
    pub charts: DashboardCharts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PerformanceMetrics {
    #[serde(deserialize_with = "null_as_default")]
    pub transbordo_rate: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub avg_time_to_transbordo: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub avg_messages_per_chat: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDistributionItem {
    #[serde(deserialize_with = "null_as_default")]
    pub agente: String,
    pub count: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceDistributionItem {
    #[serde(deserialize_with = "null_as_default")]
    pub range: String,
    pub count: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PerformanceDistributions {
    #[serde(deserialize_with = "null_as_default")]
    pub agent_distribution: Vec<AgentDistributionItem>,
    #[serde(deserialize_with = "null_as_default")]
    pub balance_distribution: Vec<BalanceDistributionItem>,
}

/// Payload of `GET /dashboard/performance`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceData {
    #[serde(deserialize_with = "null_as_default")]
    pub metrics: PerformanceMetrics,
    #[serde(deserialize_with = "null_as_default")]
    pub distributions: PerformanceDistributions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventGroupItem {
    #[serde(deserialize_with = "null_as_default")]
    pub group_type: String,
    pub count: Value,
}

/// Payload of `GET /dashboard/consultations`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConsultationsData {
    #[serde(deserialize_with = "null_as_default")]
    pub consultations_by_day: Vec<ChartItem>,
    #[serde(deserialize_with = "null_as_default")]
    pub events_by_group: Vec<EventGroupItem>,
    #[serde(deserialize_with = "null_as_default")]
    pub balance_by_consultation: Vec<BalanceDistributionItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderCount {
    #[serde(deserialize_with = "null_as_default")]
    pub sender: String,
    pub count: Value,
}

/// Payload of the legacy `GET /messages/stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageStats {
    #[serde(deserialize_with = "null_as_default")]
    pub total_messages: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub messages_by_day: Vec<ChartItem>,
    #[serde(deserialize_with = "null_as_default")]
    pub transbordo_count: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub messages_by_sender: Vec<SenderCount>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_accepts_loose_fields() {
        let chat: ApiChat = serde_json::from_value(json!({
            "id": "7",
            "last_message": {},
            "message_count": "5",
            "balance": null
        }))
        .expect("chat should parse");

        assert_eq!(chat.id, "7");
        assert_eq!(chat.last_message, Some(json!({})));
        assert_eq!(chat.message_count, Some(json!("5")));
        assert_eq!(chat.telefone, None);
        assert_eq!(chat.balance, None);
    }

    #[test]
    fn test_null_fields_take_defaults() {
        let retry: Retry = serde_json::from_value(json!({
            "id": "r1",
            "session": null,
            "error": null,
            "tentativas_executadas": "2",
            "retur_api": null
        }))
        .expect("retry should parse");
        assert_eq!(retry.session, "");
        assert_eq!(retry.error, "");
        assert_eq!(retry.tentativas_executadas, "2");
        assert_eq!(retry.retur_api, Value::Null);

        let transbordo: Transbordo = serde_json::from_value(json!({
            "id": "t1",
            "codigo": null,
            "transbordo": null
        }))
        .expect("transbordo should parse");
        assert_eq!(transbordo.codigo, "");
        assert!(!transbordo.transbordo);

        let page: Pagination =
            serde_json::from_value(json!({"total": null, "limit": 10})).expect("pagination");
        assert_eq!(page, Pagination { total: 0, limit: 10, offset: 0 });
    }

    #[test]
    fn test_dashboard_camel_case() {
        let data: DashboardData = serde_json::from_value(json!({
            "totals": {"chats": 3, "cpfConsultations": 2},
            "charts": {"messagesByDay": [{"date": "2024-03-10", "count": "12"}]}
        }))
        .expect("dashboard should parse");

        assert_eq!(data.totals.chats, 3);
        assert_eq!(data.totals.cpf_consultations, 2);
        assert_eq!(data.charts.messages_by_day.len(), 1);
        assert!(data.charts.events_by_type.is_empty());
    }

    #[test]
    fn test_create_message_skips_absent_fields() {
        let req = CreateMessageRequest::new("5511999999999", "hi").chat_id("42");
        let body = serde_json::to_value(&req).expect("request serializes");
        assert_eq!(
            body,
            json!({"chat_id": "42", "telefone": "5511999999999", "message": "hi"})
        );
    }
}
