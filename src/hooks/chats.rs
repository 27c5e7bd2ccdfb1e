use crate::api::{ApiChat, ApiMessage, ChatFilterParams, CreateMessageRequest, Page, PaginationParams};
use crate::error::ApiError;
use crate::query::{Invalidation, KeyPrefix, Mutation, Query, QueryKey};

use super::{Resources, filled};

/// Keys made stale by a new chat message.
///
/// - the chat's own message list, when the chat is known
/// - every unfiltered chat page, since rows show the last message
/// - filtered chat pages that could contain the chat: same phone, session
///   equal to the chat id, or no phone/session filter at all
pub fn message_invalidations(request: &CreateMessageRequest) -> Vec<Invalidation> {
    let mut plan = Vec::with_capacity(3);

    let chat_id = request.chat_id.clone().filter(|id| !id.is_empty());
    if let Some(chat_id) = &chat_id {
        plan.push(Invalidation::exact(QueryKey::ChatMessages {
            chat_id: chat_id.clone(),
        }));
    }

    plan.push(Invalidation::matching(KeyPrefix::new(&["chats"]), |key| {
        matches!(key, QueryKey::Chats(_))
    }));

    let telefone = request.telefone.clone();
    plan.push(Invalidation::matching(
        KeyPrefix::new(&["chats", "filtered"]),
        move |key| match key {
            QueryKey::FilteredChats(filters) => {
                filters.lacks_subject()
                    || (filled(filters.telefone.as_deref())
                        && filters.telefone.as_deref() == Some(telefone.as_str()))
                    || (filled(filters.session.as_deref())
                        && chat_id.is_some()
                        && filters.session == chat_id)
            }
            _ => false,
        },
    ));

    plan
}

/// Rejects messages that cannot be sent.
pub(super) fn validate_message(request: &CreateMessageRequest) -> Result<(), ApiError> {
    if !filled(Some(request.telefone.as_str())) {
        return Err(ApiError::MissingInput("telefone"));
    }
    if !filled(Some(request.message.as_str())) {
        return Err(ApiError::MissingInput("message"));
    }
    Ok(())
}

impl Resources {
    /// Paginated chats, `["chats", {params}]`.
    pub fn chats(&self, params: Option<PaginationParams>) -> Query<Page<ApiChat>> {
        self.query(QueryKey::Chats(params), move |api| async move {
            api.get_chats(params.as_ref()).await
        })
    }

    /// Chats matching `filters`. Disabled until a filter field is filled.
    pub fn filtered_chats(&self, filters: ChatFilterParams) -> Query<Page<ApiChat>> {
        let enabled = filters.has_filters();
        let key = QueryKey::FilteredChats(filters.clone());
        self.query(key, move |api| {
            let filters = filters.clone();
            async move { api.filter_chats(&filters).await }
        })
        .enabled(enabled)
    }

    /// Raw messages of one chat. Without a chat id it never fetches and
    /// reports an empty list.
    pub fn chat_messages(&self, chat_id: Option<&str>) -> Query<Vec<ApiMessage>> {
        let chat_id = chat_id.filter(|id| !id.is_empty()).map(str::to_string);
        let enabled = chat_id.is_some();
        let id = chat_id.unwrap_or_default();

        self.query(QueryKey::ChatMessages { chat_id: id.clone() }, move |api| {
            let id = id.clone();
            async move { api.get_chat_messages(&id).await }
        })
        .enabled(enabled)
        .placeholder(Vec::new())
    }

    /// `POST /messages`, then [`message_invalidations`].
    pub fn create_message(&self) -> Mutation<CreateMessageRequest, ApiMessage> {
        self.mutation(
            |api, request: CreateMessageRequest| async move {
                validate_message(&request)?;
                api.create_message(&request).await
            },
            |request, _| message_invalidations(request),
        )
    }
}
