use std::fmt;

use serde_json::Value;

use crate::api::types::ApiSessionEvent;

use super::message::{DEFAULT_INSTANCIA, InboxMessage, Sender, status_is_true};
use super::non_empty;

/// Kind of a session event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    Message,
    Transbordo,
    ConsultaCpf,
    ValidaCpf,
    Other(String),
}

impl EventType {
    /// Parses `type_event`. A missing type is a plain message.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            None | Some("message") => Self::Message,
            Some("transbordo") => Self::Transbordo,
            Some("consulta cpf") => Self::ConsultaCpf,
            Some("valida cpf") => Self::ValidaCpf,
            Some(other) => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Message => "message",
            Self::Transbordo => "transbordo",
            Self::ConsultaCpf => "consulta cpf",
            Self::ValidaCpf => "valida cpf",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn text<'a>(payload: Option<&'a Value>, field: &str) -> Option<&'a str> {
    non_empty(payload?.get(field)?.as_str())
}

fn transbordo_content(payload: Option<&Value>) -> String {
    let mut content = "Transferência de atendimento".to_string();
    if let Some(descricao) = text(payload, "descricao") {
        content.push_str(&format!(": {descricao}"));
    }
    if let Some(protocolo) = text(payload, "protocolo") {
        content.push_str(&format!(" (Protocolo: {protocolo})"));
    }
    content
}

fn consulta_content(cpf: &str, payload: Option<&Value>) -> String {
    let found = text(payload, "banco").is_some() && text(payload, "valor_liquido").is_some();
    let empty = payload.and_then(|p| p.get("msg")).is_some_and(Value::is_null);
    if found {
        format!("Consulta de CPF: {cpf} - Resultado encontrado")
    } else if empty {
        format!("Consulta de CPF: {cpf} - Sem resultado")
    } else {
        format!("Consulta de CPF: {cpf}")
    }
}

fn valida_content(cpf: &str, payload: Option<&Value>) -> String {
    match text(payload, "cpf") {
        Some(validated) => match text(payload, "id_cadastro") {
            Some(id) => format!("Validação de CPF: {validated} (ID: {id})"),
            None => format!("Validação de CPF: {validated}"),
        },
        None => format!("Validação de CPF: {cpf}"),
    }
}

fn transform_event(event: &ApiSessionEvent, index: usize, fallback: &str) -> InboxMessage {
    let event_type = EventType::from_raw(event.type_event.as_deref());
    let payload = event.retur_api.as_ref().filter(|r| r.is_object());
    let cpf = non_empty(event.cpf.as_deref()).unwrap_or("N/A");

    let mut is_transbordo = event.transbordo;
    let mut transbordo_status = false;
    let content = match &event_type {
        EventType::Message => event.message.clone().unwrap_or_default(),
        EventType::Transbordo => {
            is_transbordo = Some(true);
            transbordo_status = match payload.and_then(|p| p.get("status")) {
                Some(status) => status_is_true(status),
                None => event.transbordo == Some(true),
            };
            transbordo_content(payload)
        }
        EventType::ConsultaCpf => consulta_content(cpf, payload),
        EventType::ValidaCpf => valida_content(cpf, payload),
        EventType::Other(raw) => match non_empty(event.message.as_deref()) {
            Some(message) => format!("Evento: {raw} - {message}"),
            None => format!("Evento: {raw}"),
        },
    };

    InboxMessage {
        id: if event.id.is_empty() {
            format!("event-{index}")
        } else {
            event.id.clone()
        },
        sender: if event.sender.as_deref() == Some("in") {
            Sender::User
        } else {
            Sender::Bot
        },
        instancia: non_empty(event.instancia.as_deref()).unwrap_or(fallback).to_string(),
        content,
        timestamp: event.creating_at.clone().unwrap_or_else(|| {
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
        }),
        event_type,
        retry: Some(false),
        is_transbordo,
        transbordo_flag: event.transbordo,
        transbordo_status,
        event_data: event.retur_api.clone(),
        agente: event.agente.clone(),
        session: event.session.clone(),
    }
}

/// Converts session events into timeline rows.
///
/// Events without an instance inherit the first event's instance.
pub fn transform_session_events(events: &[ApiSessionEvent]) -> Vec<InboxMessage> {
    let fallback = events
        .first()
        .and_then(|e| non_empty(e.instancia.as_deref()))
        .unwrap_or(DEFAULT_INSTANCIA);

    events
        .iter()
        .enumerate()
        .map(|(index, event)| transform_event(event, index, fallback))
        .collect()
}
