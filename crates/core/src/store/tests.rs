use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use parley_model::{Conversation, ErrorKind, FileContext, Role};
use parley_test_api::{PresetReply, Route, TestChatApi};

use crate::{ChatStore, ChatStoreBuilder, Error, Operation};

fn seeded(ids: &[&str]) -> TestChatApi {
    let api = TestChatApi::default();
    for id in ids.iter().rev() {
        api.insert_conversation(Conversation::new(
            *id,
            format!("Conversation {id}"),
            Utc::now(),
        ));
    }
    api
}

async fn opened(api: &TestChatApi, id: &str) -> ChatStore {
    let store = ChatStoreBuilder::with_api(api.clone()).build();
    store.fetch_conversations().await.unwrap();
    store.fetch_conversation(id).await.unwrap();
    store
}

#[tokio::test(start_paused = true)]
async fn test_send_message() {
    let api = seeded(&["c1"]);
    api.add_reply(
        PresetReply::with_content("Hi there").delayed(Duration::from_millis(100)),
    );
    let store = opened(&api, "c1").await;

    let reply = store.send_message("c1", "Hello", None);
    let mut state_rx = store.subscribe();
    let state = state_rx
        .wait_for(|s| s.is_message_loading())
        .await
        .unwrap()
        .clone();
    let messages = &state.current_conversation().unwrap().messages;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_provisional());
    assert!(messages[0].id.to_string().starts_with("temp-"));
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "Hello");

    let reply = reply.await.unwrap();
    assert_eq!(reply.content, "Hi there");

    let state = store.state();
    let messages = &state.current_conversation().unwrap().messages;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0], reply);
    assert!(!state.is_message_loading());
    assert_eq!(state.error(), None);
}

#[tokio::test]
async fn test_send_message_with_echo() {
    let api = seeded(&["c1"]);
    api.add_reply(PresetReply::with_content("Hi").echoing_user());
    let store = opened(&api, "c1").await;

    store.send_message("c1", "Hello", None).await.unwrap();

    let state = store.state();
    let messages = &state.current_conversation().unwrap().messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "Hello");
    assert!(!messages[0].is_provisional());
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Hi");
}

#[tokio::test]
async fn test_failed_send_then_retry() {
    let api = seeded(&["c1"]);
    api.fail_next(Route::SendMessage, ErrorKind::Server, None);
    let store = opened(&api, "c1").await;

    let err = store.send_message("c1", "Hello", None).await.unwrap_err();
    assert_eq!(
        err,
        Error::Rejected {
            operation: Operation::SendMessage,
            message: "Failed to send message".to_owned(),
        }
    );

    let state = store.state();
    assert_eq!(state.error(), Some("Failed to send message"));
    assert!(!state.is_message_loading());
    let failed = state.last_failed_message().unwrap();
    assert_eq!(failed.content, "Hello");
    assert_eq!(failed.failure(), Some("Failed to send message"));

    let id = failed.id.as_provisional().unwrap();
    let reply = store.retry_message(id).await.unwrap();
    assert_eq!(reply.content, "You said Hello");

    let state = store.state();
    let messages = &state.current_conversation().unwrap().messages;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0], reply);
    assert_eq!(state.error(), None);
}

#[tokio::test]
async fn test_discard_failed_message() {
    let api = seeded(&["c1"]);
    api.fail_next(Route::SendMessage, ErrorKind::Transport, None);
    let store = opened(&api, "c1").await;

    store.send_message("c1", "Hello", None).await.unwrap_err();
    let state = store.state();
    let id = state.last_failed_message().unwrap().id.as_provisional().unwrap();

    assert!(store.discard_message(id).await.unwrap());
    assert!(store.state().current_conversation().unwrap().messages.is_empty());
    assert!(!store.discard_message(id).await.unwrap());
    assert!(matches!(
        store.retry_message(id).await,
        Err(Error::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_send_to_closed_conversation() {
    let api = seeded(&["c1"]);
    let store = ChatStoreBuilder::with_api(api.clone()).build();

    let reply = store.send_message("c1", "Hello", None).await.unwrap();
    assert_eq!(reply.content, "You said Hello");
    assert!(store.state().current_conversation().is_none());
    assert_eq!(api.conversation("c1").unwrap().messages.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_sends() {
    let api = seeded(&["c1"]);
    api.add_reply(
        PresetReply::with_content("slow").delayed(Duration::from_millis(200)),
    );
    api.add_reply(
        PresetReply::with_content("fast").delayed(Duration::from_millis(50)),
    );
    let store = opened(&api, "c1").await;

    let first = store.send_message("c1", "one", None);
    let second = store.send_message("c1", "two", None);

    assert_eq!(second.await.unwrap().content, "fast");
    let state = store.state();
    assert!(state.is_message_loading());
    let messages = &state.current_conversation().unwrap().messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "one");
    assert!(messages[0].is_provisional());
    assert_eq!(messages[1].content, "fast");

    assert_eq!(first.await.unwrap().content, "slow");
    let state = store.state();
    assert!(!state.is_message_loading());
    let messages = &state.current_conversation().unwrap().messages;
    assert!(messages.iter().all(|m| !m.is_provisional()));
    assert_eq!(messages.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reply_after_reopen_is_dropped() {
    let api = seeded(&["c1"]);
    api.add_reply(
        PresetReply::with_content("Hi").delayed(Duration::from_millis(100)),
    );
    let store = opened(&api, "c1").await;

    let reply = store.send_message("c1", "Hello", None);
    // The server already holds both messages, so the reloaded copy
    // carries them.
    store.fetch_conversation("c1").await.unwrap();
    reply.await.unwrap();

    let state = store.state();
    let messages = &state.current_conversation().unwrap().messages;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "Hello");
    assert_eq!(messages[1].content, "Hi");
    assert!(!state.is_message_loading());
}

#[tokio::test(start_paused = true)]
async fn test_reply_after_switch_is_dropped() {
    let api = seeded(&["c1", "c2"]);
    api.add_reply(
        PresetReply::with_content("Hi").delayed(Duration::from_millis(100)),
    );
    let store = opened(&api, "c1").await;

    let reply = store.send_message("c1", "Hello", None);
    store.clear_current_conversation();
    store.fetch_conversation("c2").await.unwrap();
    reply.await.unwrap();

    let state = store.state();
    let current = state.current_conversation().unwrap();
    assert_eq!(current.id, "c2");
    assert!(current.messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reply_after_failed_reload() {
    let api = seeded(&["c1"]);
    api.add_reply(
        PresetReply::with_content("Hi there").delayed(Duration::from_millis(100)),
    );
    let store = opened(&api, "c1").await;

    let reply = store.send_message("c1", "Hello", None);
    api.fail_next(Route::GetConversation, ErrorKind::Server, None);
    store.fetch_conversation("c1").await.unwrap_err();
    assert_eq!(reply.await.unwrap().content, "Hi there");

    let state = store.state();
    let messages = &state.current_conversation().unwrap().messages;
    assert_eq!(messages.len(), 1);
    assert!(messages.iter().all(|m| !m.is_provisional()));
    assert_eq!(messages[0].content, "Hi there");
    assert!(!state.is_message_loading());
}

#[tokio::test(start_paused = true)]
async fn test_reply_after_failed_switch() {
    let api = seeded(&["c1", "c2"]);
    api.add_reply(
        PresetReply::with_content("Hi there").delayed(Duration::from_millis(100)),
    );
    let store = opened(&api, "c1").await;

    let reply = store.send_message("c1", "Hello", None);
    api.fail_next(Route::GetConversation, ErrorKind::NotFound, None);
    store.fetch_conversation("c2").await.unwrap_err();
    reply.await.unwrap();

    let state = store.state();
    let current = state.current_conversation().unwrap();
    assert_eq!(current.id, "c1");
    assert_eq!(current.messages.len(), 1);
    assert!(!current.messages[0].is_provisional());
    assert_eq!(current.messages[0].content, "Hi there");
}

#[tokio::test]
async fn test_retry_replays_file_context() {
    let api = seeded(&["c1"]);
    api.fail_next(Route::SendMessage, ErrorKind::Server, None);
    let store = opened(&api, "c1").await;

    let file_context: FileContext = ["f9"].into_iter().collect();
    store
        .send_message("c1", "Hello", Some(file_context.clone()))
        .await
        .unwrap_err();
    let state = store.state();
    let id = state.last_failed_message().unwrap().id.as_provisional().unwrap();
    store.retry_message(id).await.unwrap();

    let sends: Vec<_> = api
        .requests()
        .into_iter()
        .filter(|r| r.route == Route::SendMessage)
        .collect();
    assert_eq!(sends.len(), 2);
    assert!(sends.iter().all(|r| r.file_context.as_ref() == Some(&file_context)));
}

#[tokio::test(start_paused = true)]
async fn test_last_opened_conversation_wins() {
    let api = seeded(&["c1", "c2"]);
    api.set_delay(Duration::from_millis(100));
    let store = ChatStoreBuilder::with_api(api.clone()).build();

    let first = store.fetch_conversation("c1");
    store.subscribe().wait_for(|s| s.is_loading()).await.unwrap();
    api.set_delay(Duration::from_millis(50));
    let second = store.fetch_conversation("c2");

    assert_eq!(second.await.unwrap().id, "c2");
    assert_eq!(store.state().current_conversation().unwrap().id, "c2");
    assert!(store.state().is_loading());

    // The older response arrives last and must not replace the newer one.
    assert_eq!(first.await.unwrap().id, "c1");
    assert_eq!(store.state().current_conversation().unwrap().id, "c2");
    assert!(!store.state().is_loading());
}

#[tokio::test]
async fn test_create_conversation() {
    let api = seeded(&["c1", "c2"]);
    let store = opened(&api, "c1").await;

    let file_context: FileContext = ["f1"].into_iter().collect();
    let created = store
        .create_conversation("Third", Some(file_context.clone()))
        .await
        .unwrap();
    assert_eq!(created.title, "Third");

    let state = store.state();
    assert_eq!(state.conversations().len(), 3);
    assert_eq!(state.conversations()[0], created);
    let current = state.current_conversation().unwrap();
    assert_eq!(current.id, created.id);
    assert_eq!(current.file_context, file_context);
}

#[tokio::test]
async fn test_blank_input_is_refused() {
    let api = seeded(&["c1"]);
    let store = opened(&api, "c1").await;
    let sent_before = api.requests().len();

    assert_eq!(
        store.create_conversation("   ", None).await,
        Err(Error::InvalidInput("Please enter a title for the conversation"))
    );
    assert!(matches!(
        store.send_message("c1", " \n", None).await,
        Err(Error::InvalidInput(_))
    ));
    assert_eq!(api.requests().len(), sent_before);
    assert!(store.state().current_conversation().unwrap().messages.is_empty());
}

#[tokio::test]
async fn test_delete_other_conversation() {
    let api = seeded(&["c1", "c2"]);
    let store = opened(&api, "c1").await;

    store.delete_conversation("c2").await.unwrap();

    let state = store.state();
    assert!(state.conversations().iter().all(|c| c.id != "c2"));
    assert_eq!(state.current_conversation().unwrap().id, "c1");
}

#[tokio::test]
async fn test_delete_open_conversation() {
    let api = seeded(&["c1", "c2"]);
    let store = opened(&api, "c1").await;

    store.delete_conversation("c1").await.unwrap();

    let state = store.state();
    assert_eq!(state.conversations().len(), 1);
    assert!(state.current_conversation().is_none());
}

#[tokio::test]
async fn test_update_context() {
    let api = seeded(&["c1", "c2"]);
    let store = opened(&api, "c1").await;

    let file_context: FileContext = ["f1", "f2"].into_iter().collect();
    store
        .update_context("c1", file_context.clone())
        .await
        .unwrap();

    let state = store.state();
    assert_eq!(state.conversations()[0].file_context, file_context);
    assert_eq!(state.current_conversation().unwrap().file_context, file_context);
    assert!(state.conversations()[1].file_context.is_empty());
}

#[tokio::test]
async fn test_error_messages() {
    let api = seeded(&["c1"]);
    api.fail_next(
        Route::CreateConversation,
        ErrorKind::Rejected,
        Some("Title too long"),
    );
    api.fail_next(Route::CreateConversation, ErrorKind::Rejected, Some("  "));
    let store = ChatStoreBuilder::with_api(api.clone()).build();

    store.create_conversation("A", None).await.unwrap_err();
    assert_eq!(store.state().error(), Some("Title too long"));

    store.create_conversation("A", None).await.unwrap_err();
    assert_eq!(store.state().error(), Some("Failed to create conversation"));

    let err = store.fetch_conversation("missing").await.unwrap_err();
    assert_eq!(err.to_string(), "Conversation not found");

    store.clear_error();
    store.fetch_conversations().await.unwrap();
    assert_eq!(store.state().error(), None);
}

#[tokio::test(start_paused = true)]
async fn test_loading_flag() {
    let api = seeded(&["c1"]);
    api.set_delay(Duration::from_millis(100));
    let store = ChatStoreBuilder::with_api(api).build();

    let conversations = store.fetch_conversations();
    store
        .subscribe()
        .wait_for(|s| s.is_loading())
        .await
        .unwrap();
    assert!(!store.state().is_message_loading());

    assert_eq!(conversations.await.unwrap().len(), 1);
    assert!(!store.state().is_loading());
}

#[tokio::test]
async fn test_on_error_callback() {
    let api = seeded(&[]);
    let errors = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = Arc::clone(&errors);
    let store = ChatStoreBuilder::with_api(api)
        .on_error(move |msg| errors_clone.lock().unwrap().push(msg.to_owned()))
        .build();

    store.delete_conversation("missing").await.unwrap_err();
    assert_eq!(*errors.lock().unwrap(), ["Conversation not found"]);
}

#[tokio::test]
async fn test_shutdown() {
    let store = ChatStoreBuilder::with_api(seeded(&["c1"])).build();
    store.shutdown();
    assert_eq!(store.fetch_conversations().await, Err(Error::StoreStopped));
}
