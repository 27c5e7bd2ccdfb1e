use crate::api::{ChatFilterParams, CreateMessageRequest, PaginationParams, TransbordoRequest};
use crate::error::ApiError;
use crate::query::{Invalidation, KeyPrefix, Mutation, Query, QueryKey};
use crate::transform::{
    ChatPage, InboxChat, InboxMessage, MessageList, SessionEventList, transform_chats,
    transform_messages, transform_session_events,
};

use super::chats::validate_message;
use super::{Resources, filled};

/// Agent named on handoffs triggered from the inbox.
pub const DEFAULT_AGENTE: &str = "Agente Sofia";

/// Input of [`Resources::request_transbordo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransbordoTrigger {
    /// Chat whose timeline refreshes once the handoff is accepted.
    pub chat_id: String,
    pub request: TransbordoRequest,
}

impl TransbordoTrigger {
    /// Builds the trigger for the selected chat.
    pub fn for_chat(chat: &InboxChat, messages: &[InboxMessage]) -> Self {
        Self {
            chat_id: chat.id.clone(),
            request: transbordo_request(chat, messages),
        }
    }
}

/// Webhook body for handing `chat` to a human agent.
///
/// The instance comes from the chat, then from its first message.
pub fn transbordo_request(chat: &InboxChat, messages: &[InboxMessage]) -> TransbordoRequest {
    let instancia = chat
        .instancia
        .clone()
        .filter(|i| filled(Some(i.as_str())))
        .or_else(|| messages.first().map(|m| m.instancia.clone()))
        .unwrap_or_default();

    TransbordoRequest {
        telefone: chat.telefone.clone(),
        session: chat.session.clone(),
        agente: DEFAULT_AGENTE.to_string(),
        instancia,
    }
}

fn timeline(chat_id: &str) -> [Invalidation; 2] {
    [
        Invalidation::exact(QueryKey::InboxMessages {
            chat_id: Some(chat_id.to_string()),
        }),
        Invalidation::exact(QueryKey::SessionEvents {
            chat_id: Some(chat_id.to_string()),
        }),
    ]
}

/// Keys made stale by a message sent from the inbox.
pub fn inbox_message_invalidations(request: &CreateMessageRequest) -> Vec<Invalidation> {
    let mut plan = Vec::with_capacity(4);
    if let Some(chat_id) = request.chat_id.as_deref().filter(|id| !id.is_empty()) {
        plan.extend(timeline(chat_id));
    }

    plan.push(Invalidation::matching(
        KeyPrefix::new(&["inbox", "chats"]),
        |key| matches!(key, QueryKey::InboxChats(_)),
    ));

    let telefone = request.telefone.clone();
    plan.push(Invalidation::matching(
        KeyPrefix::new(&["inbox", "chats", "filtered"]),
        move |key| match key {
            QueryKey::FilteredInboxChats(filters) => {
                filters.telefone.as_deref() == Some(telefone.as_str())
            }
            _ => false,
        },
    ));

    plan
}

impl Resources {
    /// One page of inbox chats as view models.
    pub fn inbox_chats(&self, pagination: PaginationParams) -> Query<ChatPage> {
        self.query(QueryKey::InboxChats(pagination), move |api| async move {
            let page = api.get_chats(Some(&pagination)).await?;
            Ok(ChatPage {
                chats: transform_chats(&page.items),
                pagination: page.pagination,
            })
        })
    }

    /// Inbox chats matching `filters`. Disabled until a filter is filled.
    pub fn filtered_inbox_chats(&self, filters: ChatFilterParams) -> Query<ChatPage> {
        let enabled = filters.has_filters();
        let key = QueryKey::FilteredInboxChats(filters.clone());
        self.query(key, move |api| {
            let filters = filters.clone();
            async move {
                let page = api.filter_chats(&filters).await?;
                Ok(ChatPage {
                    chats: transform_chats(&page.items),
                    pagination: page.pagination,
                })
            }
        })
        .enabled(enabled)
    }

    /// The inbox list the view should show: filtered when the user applied
    /// a filter with content, paginated otherwise.
    pub fn active_inbox_chats(
        &self,
        filters: &ChatFilterParams,
        pagination: PaginationParams,
        filter_active: bool,
    ) -> Query<ChatPage> {
        if filter_active && filters.has_filters() {
            self.filtered_inbox_chats(filters.clone().with_pagination(pagination))
        } else {
            self.inbox_chats(pagination)
        }
    }

    /// Messages of the selected chat. Empty without a selection.
    pub fn inbox_messages(&self, chat_id: Option<&str>) -> Query<MessageList> {
        let chat_id = chat_id.filter(|id| !id.is_empty()).map(str::to_string);
        let enabled = chat_id.is_some();
        let key = QueryKey::InboxMessages {
            chat_id: chat_id.clone(),
        };
        let id = chat_id.unwrap_or_default();

        self.query(key, move |api| {
            let id = id.clone();
            async move {
                let messages = api.get_chat_messages(&id).await?;
                Ok(MessageList {
                    messages: transform_messages(&messages),
                })
            }
        })
        .enabled(enabled)
        .placeholder(MessageList::default())
    }

    /// Session events of the selected chat. Empty without a selection.
    pub fn session_events(&self, chat_id: Option<&str>) -> Query<SessionEventList> {
        let chat_id = chat_id.filter(|id| !id.is_empty()).map(str::to_string);
        let enabled = chat_id.is_some();
        let key = QueryKey::SessionEvents {
            chat_id: chat_id.clone(),
        };
        let id = chat_id.unwrap_or_default();

        self.query(key, move |api| {
            let id = id.clone();
            async move {
                let events = api.get_session_events(&id).await?;
                Ok(SessionEventList {
                    events: transform_session_events(&events),
                })
            }
        })
        .enabled(enabled)
        .placeholder(SessionEventList::default())
    }

    /// Sends a message from the inbox, then [`inbox_message_invalidations`].
    pub fn send_inbox_message(&self) -> Mutation<CreateMessageRequest, InboxMessage> {
        self.mutation(
            |api, request: CreateMessageRequest| async move {
                validate_message(&request)?;
                let sent = api.create_message(&request).await?;
                transform_messages(std::slice::from_ref(&sent))
                    .pop()
                    .ok_or_else(|| ApiError::Decode("empty message".to_string()))
            },
            |request, _| inbox_message_invalidations(request),
        )
    }

    /// Hands the chat to a human agent, then refreshes its timeline.
    pub fn request_transbordo(&self) -> Mutation<TransbordoTrigger, ()> {
        self.mutation(
            |api, trigger: TransbordoTrigger| async move {
                if !filled(Some(trigger.request.telefone.as_str())) {
                    return Err(ApiError::MissingInput("telefone"));
                }
                api.request_transbordo(&trigger.request).await
            },
            |trigger, _| timeline(&trigger.chat_id).into_iter().collect(),
        )
    }
}
