// Integration tests for the cache behaviour seen through the resource hooks.
// The API is an in-process fake; see tests/common.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FakeApi;
use desk_query::api::{ChatFilterParams, CreateMessageRequest, PaginationParams};
use desk_query::config::BuildProfile;
use desk_query::error::ApiError;
use desk_query::hooks::{Resources, TransbordoTrigger};
use desk_query::query::{QueryClient, QueryConfig, QueryKey};
use desk_query::subscription::SubscriptionSource;
use desk_query::transform::MessageList;
use futures::StreamExt;
use tokio::time::timeout;

fn setup(config: QueryConfig) -> (Arc<FakeApi>, Arc<QueryClient>, Resources) {
    let api = Arc::new(FakeApi::new());
    let client = Arc::new(QueryClient::with_config(config));
    let resources = Resources::new(Arc::clone(&client), api.clone());
    (api, client, resources)
}

fn no_retry() -> QueryConfig {
    QueryConfig::default().with_retry(0, Duration::ZERO)
}

fn content(list: &MessageList) -> &str {
    &list.messages[0].content
}

#[tokio::test]
async fn test_concurrent_reads_share_one_request() {
    let (api, _client, resources) = setup(no_retry());
    *api.chat_delay.lock().unwrap() = Some(Duration::from_millis(30));

    let first = resources.inbox_chats(PaginationParams::default());
    let second = resources.inbox_chats(PaginationParams::default());
    let (a, b) = tokio::join!(first.fetch(), second.fetch());

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(api.calls("get_chats"), 1);
}

#[tokio::test]
async fn test_fresh_data_is_served_from_cache() {
    let (api, _client, resources) = setup(no_retry());

    let page = resources.inbox_chats(PaginationParams::default()).fetch().await.unwrap();
    let again = resources.inbox_chats(PaginationParams::default()).fetch().await.unwrap();

    assert_eq!(page, again);
    assert_eq!(page.chats[0].last_message, "oi");
    assert_eq!(api.calls("get_chats"), 1);

    // Different pagination is a different key.
    resources
        .inbox_chats(PaginationParams::new(10, 10))
        .fetch()
        .await
        .unwrap();
    assert_eq!(api.calls("get_chats"), 2);
}

#[tokio::test]
async fn test_stale_data_is_shown_while_revalidating() {
    let config = QueryConfig::new(Duration::ZERO, Duration::from_secs(60)).with_retry(0, Duration::ZERO);
    let (api, _client, resources) = setup(config);

    let query = resources.inbox_messages(Some("42"));
    let first = query.fetch().await.unwrap();
    assert_eq!(content(&first), "version 1");

    let mut stream = query.stream();
    let cached = stream.next().await.unwrap();
    assert!(cached.is_stale());
    assert_eq!(content(cached.data().unwrap()), "version 1");

    let revalidated = timeout(Duration::from_secs(1), stream.next())
        .await
        .unwrap()
        .unwrap();
    assert!(!revalidated.is_stale());
    assert_eq!(content(revalidated.data().unwrap()), "version 2");
    assert_eq!(api.calls("get_chat_messages"), 2);
}

#[tokio::test]
async fn test_missing_chat_id_never_fetches() {
    let (api, client, resources) = setup(no_retry());

    let messages = resources.inbox_messages(None);
    assert!(!messages.is_enabled());
    assert_eq!(messages.fetch().await, Ok(MessageList::default()));

    let events = resources.session_events(Some(""));
    assert!(events.fetch().await.unwrap().events.is_empty());

    let mut stream = messages.stream();
    let only = stream.next().await.unwrap();
    assert_eq!(only.data(), Some(&MessageList::default()));
    assert!(stream.next().await.is_none());

    assert_eq!(api.calls("get_chat_messages"), 0);
    assert_eq!(api.calls("get_session_events"), 0);
    assert!(client.keys().is_empty());
}

#[tokio::test]
async fn test_filtered_query_waits_for_a_filter() {
    let (api, _client, resources) = setup(no_retry());

    let blank = ChatFilterParams {
        telefone: Some("  ".to_string()),
        ..ChatFilterParams::default()
    };
    let query = resources.filtered_inbox_chats(blank);
    assert!(!query.is_enabled());
    assert!(query.current().is_idle());
    assert_eq!(query.fetch().await, Err(ApiError::MissingInput("query input")));
    assert_eq!(api.calls("filter_chats"), 0);

    let active = resources.active_inbox_chats(
        &ChatFilterParams::default(),
        PaginationParams::default(),
        true,
    );
    assert_eq!(active.key(), &QueryKey::InboxChats(PaginationParams::default()));

    let phone = ChatFilterParams::default().telefone("5511954591234");
    let active = resources.active_inbox_chats(&phone, PaginationParams::default(), true);
    let page = active.fetch().await.unwrap();
    assert_eq!(page.chats[0].telefone, "5511954591234");
    assert_eq!(api.calls("filter_chats"), 1);
}

#[tokio::test]
async fn test_failed_write_invalidates_nothing() {
    let (api, client, resources) = setup(no_retry());

    let messages = resources.inbox_messages(Some("42"));
    messages.fetch().await.unwrap();
    let chats = resources.inbox_chats(PaginationParams::default());
    chats.fetch().await.unwrap();

    FakeApi::fail(&api.fail_writes);
    let send = resources.send_inbox_message();
    let request = CreateMessageRequest::new("5511954591234", "oi").chat_id("42");
    let err = send.mutate_async(request).await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert!(send.result().is_error());
    assert!(client.is_fresh(messages.key()));
    assert!(client.is_fresh(chats.key()));

    messages.fetch().await.unwrap();
    assert_eq!(api.calls("get_chat_messages"), 1);
}

#[tokio::test]
async fn test_write_refreshes_watching_query() {
    let (api, _client, resources) = setup(no_retry());

    let messages = resources.inbox_messages(Some("42"));
    let mut stream = messages.stream();
    assert!(stream.next().await.unwrap().is_loading());
    let loaded = stream.next().await.unwrap();
    assert_eq!(content(loaded.data().unwrap()), "version 1");

    let send = resources.send_inbox_message();
    let request = CreateMessageRequest::new("5511954591234", "oi").chat_id("42");
    let sent = send.mutate_async(request).await.unwrap();
    assert_eq!(sent.content, "oi");

    let stale = timeout(Duration::from_secs(1), stream.next()).await.unwrap().unwrap();
    assert!(stale.is_stale());
    let fresh = timeout(Duration::from_secs(1), stream.next()).await.unwrap().unwrap();
    assert_eq!(content(fresh.data().unwrap()), "version 2");
    assert_eq!(api.calls("get_chat_messages"), 2);
}

#[tokio::test]
async fn test_transbordo_trigger_refreshes_timeline() {
    let (api, client, resources) = setup(no_retry());

    let events = resources.session_events(Some("42"));
    events.fetch().await.unwrap();
    let other = resources.session_events(Some("7"));
    other.fetch().await.unwrap();

    let page = resources.inbox_chats(PaginationParams::default()).fetch().await.unwrap();
    let mut chat = page.chats[0].clone();
    chat.id = "42".to_string();
    let trigger = TransbordoTrigger::for_chat(&chat, &[]);

    resources.request_transbordo().mutate_async(trigger).await.unwrap();
    assert_eq!(api.calls("request_transbordo"), 1);
    assert!(!client.is_fresh(events.key()));
    assert!(client.is_fresh(other.key()));

    let refreshed = events.fetch().await.unwrap();
    assert_eq!(refreshed.events[0].content, "event 3");
}

#[tokio::test]
async fn test_later_refetch_wins_out_of_order() {
    let (api, client, resources) = setup(no_retry());
    api.queue_message_delays(&[Duration::from_millis(80), Duration::from_millis(5)]);

    let query = resources.inbox_messages(Some("42"));
    let slow = query.refetch();
    let fast = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        query.refetch().await
    };
    let (slow, fast) = tokio::join!(slow, fast);

    assert_eq!(content(&fast.unwrap()), "version 2");
    assert_eq!(content(&slow.unwrap()), "version 2");

    // Let the superseded task finish and confirm it did not overwrite.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let cached: MessageList = client.get_query_data(query.key()).unwrap();
    assert_eq!(content(&cached), "version 2");
}

#[tokio::test]
async fn test_dashboard_falls_back_to_legacy() {
    let (api, _client, resources) = setup(no_retry());
    FakeApi::fail(&api.fail_dashboard);

    let data = resources.dashboard(None).fetch().await.unwrap();
    assert_eq!(data.totals.messages, 100);
    assert_eq!(api.calls("get_legacy_dashboard"), 1);

    let summary = resources.dashboard_summary(None).fetch().await.unwrap();
    assert!(!summary.is_demo());
    assert_eq!(summary.total_messages, 100);
    assert!((summary.success_rate - 75.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_summary_without_performance() {
    let (api, _client, resources) = setup(no_retry());
    FakeApi::fail(&api.fail_performance);

    let summary = resources.dashboard_summary(None).fetch().await.unwrap();
    assert_eq!(summary.total_messages, 200);
    assert!(summary.success_rate.abs() < f64::EPSILON);
    assert_eq!(api.calls("get_legacy_performance"), 1);
}

#[tokio::test]
async fn test_demo_data_only_in_development() {
    let (api, _client, resources) = setup(no_retry());
    FakeApi::fail(&api.fail_dashboard);
    FakeApi::fail(&api.fail_legacy_dashboard);

    let err = resources.dashboard_summary(None).fetch().await.unwrap_err();
    assert_eq!(err.status(), Some(500));

    let dev = resources.clone().with_profile(BuildProfile::Development);
    let summary = dev.dashboard_summary(None).fetch().await.unwrap();
    assert!(summary.is_demo());
    assert_eq!(summary.total_messages, 26142);
}

#[tokio::test]
async fn test_retry_once_before_error() {
    let config = QueryConfig::default().with_retry(1, Duration::from_millis(1));
    let (api, _client, resources) = setup(config);
    FakeApi::fail(&api.fail_dashboard);
    FakeApi::fail(&api.fail_legacy_dashboard);

    let result = resources.dashboard(None).fetch().await;
    assert!(result.is_err());
    assert_eq!(api.calls("get_dashboard"), 2);
    assert_eq!(api.calls("get_legacy_dashboard"), 2);
}

#[tokio::test]
async fn test_dispose_ends_watchers() {
    let (_api, client, resources) = setup(no_retry());

    let query = resources.inbox_chats(PaginationParams::default());
    let mut stream = query.stream();
    assert!(stream.next().await.unwrap().is_loading());
    assert!(stream.next().await.unwrap().is_success());

    client.dispose();
    let ended = timeout(Duration::from_secs(2), stream.next()).await.unwrap();
    assert!(ended.is_none());

    assert_eq!(query.fetch().await, Err(ApiError::Disposed));
    assert!(client.keys().is_empty());
}
