//! View models built from raw API payloads.
//!
//! Every transform is total: missing or malformed optional fields are
//! replaced by a fixed default, never reported as an error.

mod chat;
mod dashboard;
mod event;
mod message;

use serde_json::Value;

pub use chat::{ChatPage, ChatStatus, DEFAULT_TELEFONE, InboxChat, transform_chats};
pub use dashboard::{
    ActivePhone, DailyCount, DashboardSummary, DataSource, MessageAnalytics, SenderShare,
    format_dashboard, format_phone_number, format_stat,
};
pub use event::{EventType, transform_session_events};
pub use message::{
    DEFAULT_INSTANCIA, InboxMessage, MessageList, SessionEventList, Sender, transform_messages,
};

/// Reads a count that may arrive as a number or a numeric string.
///
/// Strings are read up to the first non-digit, so `"12 msgs"` is 12.
/// Anything unreadable counts as zero.
pub(crate) fn count_of(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => {
            let trimmed = s.trim_start();
            let digits: &str = trimmed
                .find(|c: char| !c.is_ascii_digit())
                .map_or(trimmed, |end| &trimmed[..end]);
            digits.parse().unwrap_or(0)
        }
        _ => 0,
    }
}

/// Returns `Some` for strings that are not blank.
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}
