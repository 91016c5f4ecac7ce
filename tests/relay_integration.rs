//! End-to-end tests of the dispatcher, pairing protocol and relays against
//! a recording messenger.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pairbridge::DeliveryError;
use pairbridge::dispatcher::Dispatcher;
use pairbridge::messenger::{Messenger, Outbox, TextFormat};
use pairbridge::observability::NoopObserver;
use pairbridge::pairing::PairingStore;
use pairbridge::relay::ForwardRelay;
use pairbridge::telegram::{ChatId, Update};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sent {
    Copy {
        to: ChatId,
        from: ChatId,
        message_id: i64,
    },
    Text {
        to: ChatId,
        text: String,
    },
}

/// Records every outbound call. Chats in `blocked` fail delivery.
#[derive(Default)]
struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    blocked: Mutex<HashSet<ChatId>>,
}

impl RecordingMessenger {
    fn block(&self, chat: ChatId) {
        self.blocked.lock().unwrap().insert(chat);
    }

    fn take(&self) -> Vec<Sent> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    fn check(&self, to: ChatId) -> Result<(), DeliveryError> {
        if self.blocked.lock().unwrap().contains(&to) {
            return Err(DeliveryError::Api {
                code: 403,
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn copy_message(
        &self,
        to: ChatId,
        from: ChatId,
        message_id: i64,
    ) -> Result<(), DeliveryError> {
        self.check(to)?;
        self.sent.lock().unwrap().push(Sent::Copy {
            to,
            from,
            message_id,
        });
        Ok(())
    }

    async fn send_message(
        &self,
        to: ChatId,
        text: &str,
        _format: TextFormat,
    ) -> Result<(), DeliveryError> {
        self.check(to)?;
        self.sent.lock().unwrap().push(Sent::Text {
            to,
            text: text.to_string(),
        });
        Ok(())
    }
}

struct Harness {
    messenger: Arc<RecordingMessenger>,
    store: Arc<PairingStore>,
    dispatcher: Dispatcher,
    _dir: TempDir,
}

fn outbox(messenger: &Arc<RecordingMessenger>) -> Outbox {
    Outbox::new(
        messenger.clone(),
        Duration::from_secs(2),
        Arc::new(NoopObserver),
    )
}

fn pair_harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let messenger = Arc::new(RecordingMessenger::default());
    let store = Arc::new(PairingStore::load(dir.path().join("pairs.json")));
    let dispatcher = Dispatcher::pair(store.clone(), outbox(&messenger));
    Harness {
        messenger,
        store,
        dispatcher,
        _dir: dir,
    }
}

fn text_update(update_id: i64, chat: ChatId, chat_type: &str, text: &str) -> Update {
    let mut message = serde_json::json!({
        "message_id": update_id * 10,
        "from": {"id": chat, "is_bot": false, "first_name": "U"},
        "chat": {"id": chat, "type": chat_type},
        "text": text,
    });
    if text.starts_with('/') {
        let len = text.split_whitespace().next().unwrap_or_default().len();
        message["entities"] = serde_json::json!([
            {"type": "bot_command", "offset": 0, "length": len}
        ]);
    }
    serde_json::from_value(serde_json::json!({
        "update_id": update_id,
        "message": message,
    }))
    .unwrap()
}

fn texts_to(sent: &[Sent], chat: ChatId) -> Vec<&str> {
    sent.iter()
        .filter_map(|s| match s {
            Sent::Text { to, text } if *to == chat => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_link_then_relay_from_partner() {
    let h = pair_harness();

    h.dispatcher
        .dispatch(&text_update(1, 100, "private", "/link 200"))
        .await;
    let sent = h.messenger.take();
    assert!(texts_to(&sent, 100)[0].contains("<code>200</code>"));
    assert!(texts_to(&sent, 200)[0].contains("<code>100</code>"));
    assert_eq!(h.store.get_partner(200).await, Some(100));

    h.dispatcher
        .dispatch(&text_update(2, 200, "private", "hello there"))
        .await;
    assert_eq!(
        h.messenger.take(),
        vec![Sent::Copy {
            to: 100,
            from: 200,
            message_id: 20
        }]
    );
}

#[tokio::test]
async fn test_link_non_numeric_leaves_store_unchanged() {
    let h = pair_harness();
    h.dispatcher
        .dispatch(&text_update(1, 100, "private", "/link abc"))
        .await;

    let sent = h.messenger.take();
    assert_eq!(sent.len(), 1);
    assert!(texts_to(&sent, 100)[0].contains("must be numeric"));
    assert!(h.store.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_link_without_argument_and_self_link() {
    let h = pair_harness();
    h.dispatcher
        .dispatch(&text_update(1, 100, "private", "/link"))
        .await;
    h.dispatcher
        .dispatch(&text_update(2, 100, "private", "/link 100"))
        .await;

    let sent = h.messenger.take();
    let replies = texts_to(&sent, 100);
    assert!(replies[0].contains("Provide an ID"));
    assert!(replies[1].contains("yourself"));
    assert!(h.store.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_unpaired_message_is_not_relayed() {
    let h = pair_harness();
    h.dispatcher
        .dispatch(&text_update(1, 100, "private", "anyone there?"))
        .await;
    assert!(h.messenger.take().is_empty());
}

#[tokio::test]
async fn test_group_and_bot_messages_are_not_relayed() {
    let h = pair_harness();
    h.store.set_pair(-500, 200).await.unwrap();
    h.store.set_pair(300, 400).await.unwrap();

    h.dispatcher
        .dispatch(&text_update(1, -500, "group", "hi group"))
        .await;

    let from_bot: Update = serde_json::from_value(serde_json::json!({
        "update_id": 2,
        "message": {
            "message_id": 5,
            "from": {"id": 300, "is_bot": true, "first_name": "Bot"},
            "chat": {"id": 300, "type": "private"},
            "text": "beep"
        }
    }))
    .unwrap();
    h.dispatcher.dispatch(&from_bot).await;

    assert!(h.messenger.take().is_empty());
}

#[tokio::test]
async fn test_blocked_partner_is_swallowed() {
    let h = pair_harness();
    h.store.set_pair(100, 200).await.unwrap();
    h.messenger.block(100);

    h.dispatcher
        .dispatch(&text_update(1, 200, "private", "are you there"))
        .await;
    assert!(h.messenger.take().is_empty());
    // Pairing untouched by the failure.
    assert_eq!(h.store.get_partner(200).await, Some(100));
}

#[tokio::test]
async fn test_link_succeeds_when_target_unreachable() {
    let h = pair_harness();
    h.messenger.block(200);

    h.dispatcher
        .dispatch(&text_update(1, 100, "private", "/link 200"))
        .await;
    let sent = h.messenger.take();
    assert_eq!(texts_to(&sent, 100).len(), 1);
    assert_eq!(h.store.get_partner(100).await, Some(200));
    assert_eq!(h.store.get_partner(200).await, Some(100));
}

#[tokio::test]
async fn test_unlink_notifies_partner() {
    let h = pair_harness();
    h.store.set_pair(100, 200).await.unwrap();

    h.dispatcher
        .dispatch(&text_update(1, 100, "private", "/unlink"))
        .await;
    let sent = h.messenger.take();
    assert_eq!(texts_to(&sent, 100), vec!["Link removed."]);
    assert_eq!(texts_to(&sent, 200), vec!["❌ Your partner dissolved the link."]);
    assert_eq!(h.store.get_partner(200).await, None);

    h.dispatcher
        .dispatch(&text_update(2, 100, "private", "/unlink"))
        .await;
    let sent = h.messenger.take();
    assert_eq!(texts_to(&sent, 100), vec!["There was no link."]);
}

#[tokio::test]
async fn test_relink_notifies_displaced_partner() {
    let h = pair_harness();
    h.store.set_pair(100, 300).await.unwrap();

    h.dispatcher
        .dispatch(&text_update(1, 100, "private", "/link 200"))
        .await;
    let sent = h.messenger.take();
    assert_eq!(texts_to(&sent, 300).len(), 1);
    assert!(texts_to(&sent, 300)[0].contains("replaced"));
    assert_eq!(h.store.get_partner(300).await, None);
    assert_eq!(h.store.get_partner(100).await, Some(200));
}

#[tokio::test]
async fn test_start_and_myid_reply_without_state_change() {
    let h = pair_harness();
    h.dispatcher
        .dispatch(&text_update(1, 100, "private", "/start"))
        .await;
    h.dispatcher
        .dispatch(&text_update(2, 100, "private", "/myid"))
        .await;

    let sent = h.messenger.take();
    let replies = texts_to(&sent, 100);
    assert!(replies[0].contains("<code>100</code>"));
    assert!(replies[0].contains("No link yet"));
    assert_eq!(replies[1], "Your ID: <code>100</code>");
    assert!(h.store.snapshot().await.is_empty());

    h.store.set_pair(100, 200).await.unwrap();
    h.dispatcher
        .dispatch(&text_update(3, 100, "private", "/help"))
        .await;
    let sent = h.messenger.take();
    assert!(texts_to(&sent, 100)[0].contains("Already linked with: <code>200</code>"));
}

#[tokio::test]
async fn test_unknown_command_is_neither_answered_nor_relayed() {
    let h = pair_harness();
    h.store.set_pair(100, 200).await.unwrap();
    h.dispatcher
        .dispatch(&text_update(1, 100, "private", "/settings"))
        .await;
    assert!(h.messenger.take().is_empty());
}

#[tokio::test]
async fn test_edited_message_is_relayed() {
    let h = pair_harness();
    h.store.set_pair(100, 200).await.unwrap();

    let edited: Update = serde_json::from_value(serde_json::json!({
        "update_id": 9,
        "edited_message": {
            "message_id": 77,
            "from": {"id": 100, "is_bot": false, "first_name": "A"},
            "chat": {"id": 100, "type": "private"},
            "text": "typo fixed"
        }
    }))
    .unwrap();
    h.dispatcher.dispatch(&edited).await;
    assert_eq!(
        h.messenger.take(),
        vec![Sent::Copy {
            to: 200,
            from: 100,
            message_id: 77
        }]
    );
}

/// Never answers within any reasonable timeout.
struct StalledMessenger;

#[async_trait]
impl Messenger for StalledMessenger {
    async fn copy_message(&self, _: ChatId, _: ChatId, _: i64) -> Result<(), DeliveryError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }

    async fn send_message(&self, _: ChatId, _: &str, _: TextFormat) -> Result<(), DeliveryError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }
}

#[tokio::test]
async fn test_relink_with_stalled_platform_returns_within_one_timeout() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(PairingStore::load(dir.path().join("pairs.json")));
    store.set_pair(100, 300).await.unwrap();
    store.set_pair(200, 400).await.unwrap();

    let timeout = Duration::from_millis(200);
    let outbox = Outbox::new(Arc::new(StalledMessenger), timeout, Arc::new(NoopObserver));
    let dispatcher = Dispatcher::pair(store.clone(), outbox);

    // Reply to 100 plus notices to 200, 300 and 400: four stalled calls.
    let started = Instant::now();
    dispatcher
        .dispatch(&text_update(1, 100, "private", "/link 200"))
        .await;
    let elapsed = started.elapsed();

    assert!(elapsed >= timeout, "returned before any call timed out: {elapsed:?}");
    assert!(elapsed < timeout * 3, "calls were awaited one after another: {elapsed:?}");
    assert_eq!(store.get_partner(100).await, Some(200));
    assert_eq!(store.get_partner(300).await, None);
    assert_eq!(store.get_partner(400).await, None);
}

fn forward_dispatcher(
    messenger: &Arc<RecordingMessenger>,
    target: ChatId,
    source: Option<ChatId>,
) -> Dispatcher {
    let outbox = outbox(messenger);
    Dispatcher::forward(ForwardRelay::new(target, source, outbox.clone()), outbox)
}

#[tokio::test]
async fn test_forward_never_delivers_from_target() {
    let messenger = Arc::new(RecordingMessenger::default());
    let dispatcher = forward_dispatcher(&messenger, -1000, None);

    dispatcher
        .dispatch(&text_update(1, -1000, "supergroup", "loop?"))
        .await;
    assert!(messenger.take().is_empty());

    dispatcher
        .dispatch(&text_update(2, 42, "private", "news"))
        .await;
    assert_eq!(
        messenger.take(),
        vec![Sent::Copy {
            to: -1000,
            from: 42,
            message_id: 20
        }]
    );
}

#[tokio::test]
async fn test_forward_source_restriction() {
    let messenger = Arc::new(RecordingMessenger::default());
    let dispatcher = forward_dispatcher(&messenger, -1000, Some(-2000));

    dispatcher
        .dispatch(&text_update(1, 42, "private", "not from source"))
        .await;
    assert!(messenger.take().is_empty());

    let post: Update = serde_json::from_value(serde_json::json!({
        "update_id": 2,
        "channel_post": {
            "message_id": 3,
            "chat": {"id": -2000, "type": "channel"},
            "text": "announcement"
        }
    }))
    .unwrap();
    dispatcher.dispatch(&post).await;
    assert_eq!(
        messenger.take(),
        vec![Sent::Copy {
            to: -1000,
            from: -2000,
            message_id: 3
        }]
    );
}

#[tokio::test]
async fn test_forward_answers_myid_without_forwarding() {
    let messenger = Arc::new(RecordingMessenger::default());
    let dispatcher = forward_dispatcher(&messenger, -1000, None);

    dispatcher
        .dispatch(&text_update(1, 42, "private", "/myid"))
        .await;
    assert_eq!(
        messenger.take(),
        vec![Sent::Text {
            to: 42,
            text: "Your ID: <code>42</code>".to_string()
        }]
    );

    dispatcher
        .dispatch(&text_update(2, 42, "private", "/link 5"))
        .await;
    assert!(messenger.take().is_empty());
}
