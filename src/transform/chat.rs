use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::api::types::{ApiChat, Pagination};

use super::count_of;

/// Phone shown for chats that arrive without one.
pub const DEFAULT_TELEFONE: &str = "5511999999999";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatStatus {
    #[default]
    Active,
    Transbordo,
    Closed,
}

/// A chat as the inbox list shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxChat {
    pub id: String,
    pub telefone: String,
    pub session: String,
    pub instancia: Option<String>,
    pub balance: Option<String>,
    pub bank: Option<String>,
    pub has_balance: bool,
    /// Display name. There is no contact book, so this is the phone.
    pub customer: String,
    pub last_message: String,
    pub message_count: u64,
    pub timestamp: String,
    pub unread: bool,
    pub status: ChatStatus,
}

/// One page of inbox chats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatPage {
    pub chats: Vec<InboxChat>,
    pub pagination: Pagination,
}

/// Label for the last message.
///
/// The API sends either the text itself or an object. An empty object (or
/// nothing) means the text was not loaded, so the label falls back to the
/// message total.
fn last_message_label(last_message: Option<&Value>, message_count: u64) -> String {
    match last_message {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(map)) if !map.is_empty() => "Sem mensagens".to_string(),
        Some(Value::Array(items)) if !items.is_empty() => "Sem mensagens".to_string(),
        _ => format!("Última mensagem (total: {message_count})"),
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn transform_chat(chat: &ApiChat) -> InboxChat {
    let telefone = chat
        .telefone
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TELEFONE.to_string());
    let message_count = chat.message_count.as_ref().map_or(0, count_of);
    let timestamp = match &chat.creating_at {
        Some(Value::String(at)) => at.clone(),
        _ => now_iso(),
    };

    InboxChat {
        id: chat.id.clone(),
        customer: telefone.clone(),
        telefone,
        session: chat.session.clone().unwrap_or_default(),
        instancia: chat.instancia.clone(),
        balance: chat.balance.clone(),
        bank: chat.bank.clone(),
        has_balance: chat.has_balance == Some(true),
        last_message: last_message_label(chat.last_message.as_ref(), message_count),
        message_count,
        timestamp,
        unread: false,
        status: ChatStatus::Active,
    }
}

/// Converts API chats into inbox rows, keeping their order.
pub fn transform_chats(chats: &[ApiChat]) -> Vec<InboxChat> {
    chats.iter().map(transform_chat).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chat(value: Value) -> ApiChat {
        serde_json::from_value(value).expect("valid chat")
    }

    #[test]
    fn test_empty_input() {
        assert!(transform_chats(&[]).is_empty());
    }

    #[test]
    fn test_empty_object_sentinel_uses_total() {
        let chats = transform_chats(&[chat(json!({
            "id": "1",
            "last_message": {},
            "message_count": "5"
        }))]);

        assert_eq!(chats.len(), 1);
        assert!(chats[0].last_message.contains("total: 5"));
        assert_eq!(chats[0].message_count, 5);
    }

    #[test]
    fn test_defaults() {
        let row = &transform_chats(&[chat(json!({"id": "1"}))])[0];
        assert_eq!(row.telefone, DEFAULT_TELEFONE);
        assert_eq!(row.customer, DEFAULT_TELEFONE);
        assert_eq!(row.session, "");
        assert_eq!(row.message_count, 0);
        assert_eq!(row.last_message, "Última mensagem (total: 0)");
        assert!(!row.has_balance);
        assert_eq!(row.status, ChatStatus::Active);
        assert!(!row.timestamp.is_empty());
    }

    #[test]
    fn test_string_fields_pass_through() {
        let row = &transform_chats(&[chat(json!({
            "id": "9",
            "telefone": "5531988887777",
            "session": "abc",
            "last_message": "olá",
            "message_count": 3,
            "has_balance": true,
            "creating_at": "2024-03-10T12:00:00Z"
        }))])[0];

        assert_eq!(row.telefone, "5531988887777");
        assert_eq!(row.last_message, "olá");
        assert_eq!(row.message_count, 3);
        assert!(row.has_balance);
        assert_eq!(row.timestamp, "2024-03-10T12:00:00Z");
    }

    #[test]
    fn test_non_empty_object_means_no_messages() {
        let row = &transform_chats(&[chat(json!({
            "id": "1",
            "last_message": {"text": "?"}
        }))])[0];
        assert_eq!(row.last_message, "Sem mensagens");
    }
}
