use serde_json::Value;

use crate::api::types::ApiMessage;

use super::event::EventType;
use super::non_empty;

/// Instance shown when neither the message nor its session names one.
pub const DEFAULT_INSTANCIA: &str = "App Web";

/// Who wrote a message, from the agent's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    /// The customer.
    User,
    /// The automated agent or the platform.
    Bot,
}

impl Sender {
    /// Maps a raw sender. `in` is the customer, `out` the agent. Unknown
    /// values are treated as the agent.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("in" | "user") => Self::User,
            _ => Self::Bot,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

/// A message or session event as the chat detail view shows it.
#[derive(Debug, Clone, PartialEq)]
pub struct InboxMessage {
    pub id: String,
    pub sender: Sender,
    pub instancia: String,
    pub content: String,
    pub timestamp: String,
    pub event_type: EventType,
    pub retry: Option<bool>,
    /// Whether the row is a handoff. Always `true` for transbordo events.
    pub is_transbordo: Option<bool>,
    /// The top-level transbordo flag exactly as received.
    pub transbordo_flag: Option<bool>,
    /// Outcome of the handoff. A nested `retur_api.status` overrides the
    /// top-level flag.
    pub transbordo_status: bool,
    pub event_data: Option<Value>,
    pub agente: Option<String>,
    pub session: Option<String>,
}

impl InboxMessage {
    /// Returns `true` when the nested API status and the top-level flag
    /// disagree about a handoff.
    pub fn transbordo_conflict(&self) -> bool {
        self.event_type == EventType::Transbordo
            && self
                .transbordo_flag
                .is_some_and(|flag| flag != self.transbordo_status)
    }
}

/// Messages of one chat. Empty when no chat is selected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageList {
    pub messages: Vec<InboxMessage>,
}

/// Events of one session. Empty when no chat is selected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionEventList {
    pub events: Vec<InboxMessage>,
}

/// Reads a `status` field that counts as true only when it says `"true"`.
pub(crate) fn status_is_true(value: &Value) -> bool {
    matches!(value, Value::String(s) if s == "true") || value == &Value::Bool(true)
}

fn default_instancia(messages: &[ApiMessage]) -> String {
    messages
        .iter()
        .find_map(|m| non_empty(m.instancia.as_deref()))
        .or_else(|| messages.first().and_then(|m| non_empty(m.session_id.as_deref())))
        .unwrap_or(DEFAULT_INSTANCIA)
        .to_string()
}

fn timestamp(message: &ApiMessage) -> String {
    if let Some(created) = non_empty(message.created_at.as_deref()) {
        return created.to_string();
    }
    match &message.creating_at {
        Some(Value::String(at)) => at.clone(),
        _ => chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    }
}

/// Converts chat messages from the legacy messages endpoint.
pub fn transform_messages(messages: &[ApiMessage]) -> Vec<InboxMessage> {
    let fallback = default_instancia(messages);

    messages
        .iter()
        .enumerate()
        .map(|(index, message)| {
            let retorno = message.retorno_api.as_ref().filter(|r| r.is_object());
            let content = non_empty(message.message.as_deref())
                .or_else(|| retorno.and_then(|r| r.get("descricao")).and_then(Value::as_str))
                .unwrap_or_default()
                .to_string();

            InboxMessage {
                id: if message.id.is_empty() {
                    format!("msg-{index}")
                } else {
                    message.id.clone()
                },
                sender: Sender::from_raw(message.sender.as_deref()),
                instancia: non_empty(message.instancia.as_deref())
                    .map_or_else(|| fallback.clone(), str::to_string),
                content,
                timestamp: timestamp(message),
                event_type: EventType::Message,
                retry: message.retry,
                is_transbordo: message.transbordo,
                transbordo_flag: message.transbordo,
                transbordo_status: retorno
                    .and_then(|r| r.get("status"))
                    .is_some_and(status_is_true),
                event_data: None,
                agente: None,
                session: message.session_id.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn messages(value: Value) -> Vec<ApiMessage> {
        serde_json::from_value(value).expect("valid messages")
    }

    #[test]
    fn test_sender_mapping() {
        let rows = transform_messages(&messages(json!([
            {"sender": "in", "message": "x"},
            {"sender": "weird", "message": "y"},
            {"sender": "out", "message": "z"},
            {"sender": "user", "message": "w"},
            {"message": "v"}
        ])));
        let senders: Vec<_> = rows.iter().map(|m| m.sender.as_str()).collect();
        assert_eq!(senders, vec!["user", "bot", "bot", "user", "bot"]);
    }

    #[test]
    fn test_ids_and_content_defaults() {
        let rows = transform_messages(&messages(json!([
            {"retorno_api": {"descricao": "entregue", "status": "true"}},
            {"id": "m2"}
        ])));
        assert_eq!(rows[0].id, "msg-0");
        assert_eq!(rows[0].content, "entregue");
        assert!(rows[0].transbordo_status);
        assert_eq!(rows[1].id, "m2");
        assert_eq!(rows[1].content, "");
        assert!(!rows[1].transbordo_status);
    }

    #[test]
    fn test_instancia_fallbacks() {
        let rows = transform_messages(&messages(json!([
            {"session_id": "s1"},
            {"instancia": "  "},
            {"instancia": "Loja"}
        ])));
        assert!(rows.iter().take(2).all(|m| m.instancia == "Loja"));

        let rows = transform_messages(&messages(json!([{"session_id": "s1"}])));
        assert_eq!(rows[0].instancia, "s1");

        let rows = transform_messages(&messages(json!([{}])));
        assert_eq!(rows[0].instancia, DEFAULT_INSTANCIA);
    }

    #[test]
    fn test_timestamp_prefers_created_at() {
        let rows = transform_messages(&messages(json!([
            {"created_at": "2024-01-01T00:00:00Z", "creating_at": "2023-01-01T00:00:00Z"},
            {"creating_at": "2023-01-01T00:00:00Z"}
        ])));
        assert_eq!(rows[0].timestamp, "2024-01-01T00:00:00Z");
        assert_eq!(rows[1].timestamp, "2023-01-01T00:00:00Z");
    }
}
