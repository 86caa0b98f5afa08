//! End-to-end session scenarios over the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use hotmess_backend::{Backend, MemoryBackend};
use hotmess_client::{SessionConfig, SubscriptionState, ThreadEvent, ThreadSession};
use hotmess_shared::{
    BackendError, ChangeEvent, MessageId, SendError, ThreadId, ThreadKind, ThreadStatus, UserId,
};

fn user() -> UserId {
    UserId(Uuid::new_v4())
}

/// Fast resubscription so disconnect tests finish quickly.
fn test_config() -> SessionConfig {
    SessionConfig {
        resubscribe_base: Duration::from_millis(10),
        resubscribe_max: Duration::from_millis(50),
        ..SessionConfig::default()
    }
}

async fn open(
    backend: &Arc<MemoryBackend>,
    thread: ThreadId,
    user: UserId,
) -> (ThreadSession, tokio::sync::mpsc::Receiver<ThreadEvent>) {
    ThreadSession::open(
        backend.clone(),
        ThreadKind::Connect,
        thread,
        user,
        test_config(),
    )
    .await
    .expect("session should open")
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within deadline"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn open_fails_for_unknown_thread() {
    let backend = Arc::new(MemoryBackend::new());
    let result = ThreadSession::open(
        backend.clone(),
        ThreadKind::Connect,
        ThreadId::new(),
        user(),
        test_config(),
    )
    .await;

    assert!(matches!(result, Err(BackendError::ThreadNotFound(_))));
}

#[tokio::test]
async fn optimistic_send_converges_to_one_sent_row() {
    let backend = Arc::new(MemoryBackend::new());
    let thread = backend.create_thread(ThreadKind::Connect);
    let (session, _events) = open(&backend, thread, user()).await;

    let local_id = session.send("anyone at the arches tonight?").unwrap();

    // Visible immediately, before any network round trip.
    let snapshot = session.messages();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot[0].is_pending());
    assert_eq!(snapshot[0].local_id, local_id);
    assert_eq!(snapshot[0].server_id, None);

    wait_until(|| session.messages()[0].is_sent()).await;

    let snapshot = session.messages();
    assert_eq!(snapshot.len(), 1, "echo must not duplicate the send");
    let message = &snapshot[0];
    assert_eq!(message.server_id, Some(message.local_id));
    assert_eq!(message.body, "anyone at the arches tonight?");
}

#[tokio::test]
async fn two_sessions_exchange_messages() {
    let backend = Arc::new(MemoryBackend::new());
    let thread = backend.create_thread(ThreadKind::Connect);
    let (alice_user, bob_user) = (user(), user());

    let (alice, _alice_events) = open(&backend, thread, alice_user).await;
    let (bob, _bob_events) = open(&backend, thread, bob_user).await;

    wait_until(|| alice.subscription_state() == SubscriptionState::Subscribed).await;
    wait_until(|| bob.subscription_state() == SubscriptionState::Subscribed).await;

    alice.send("selling one ticket, face value").unwrap();
    wait_until(|| bob.messages().len() == 1).await;

    let received = &bob.messages()[0];
    assert!(received.is_sent());
    assert_eq!(received.sender_id, alice_user);

    bob.send("taking it, dm me").unwrap();
    wait_until(|| alice.messages().len() == 2 && alice.messages().iter().all(|m| m.is_sent()))
        .await;

    let timestamps: Vec<_> = alice.messages().iter().map(|m| m.created_at).collect();
    assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn write_failure_marks_failed_then_retry_succeeds() {
    let backend = Arc::new(MemoryBackend::new());
    let thread = backend.create_thread(ThreadKind::Connect);
    let (session, _events) = open(&backend, thread, user()).await;

    backend.fail_next_inserts(1);
    let local_id = session.send("is the list still open").unwrap();

    wait_until(|| session.messages().first().is_some_and(|m| m.is_failed())).await;

    // Only failed rows can be retried.
    assert!(matches!(
        session.retry(MessageId::new()),
        Err(SendError::NotRetryable)
    ));

    let retry_id = session.retry(local_id).unwrap();
    assert_ne!(retry_id, local_id);

    wait_until(|| session.messages().first().is_some_and(|m| m.is_sent())).await;

    let snapshot = session.messages();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].body, "is the list still open");
}

#[tokio::test]
async fn dismiss_removes_a_failed_row() {
    let backend = Arc::new(MemoryBackend::new());
    let thread = backend.create_thread(ThreadKind::Connect);
    let (session, _events) = open(&backend, thread, user()).await;

    backend.fail_next_inserts(1);
    let local_id = session.send("lost my plus one").unwrap();
    wait_until(|| session.messages().first().is_some_and(|m| m.is_failed())).await;

    assert!(session.dismiss(local_id));
    assert!(session.messages().is_empty());
    assert!(!session.dismiss(local_id));
}

#[tokio::test]
async fn composer_validation() {
    let backend = Arc::new(MemoryBackend::new());
    let thread = backend.create_thread(ThreadKind::Connect);
    let (session, _events) = open(&backend, thread, user()).await;

    assert_eq!(session.send(""), Err(SendError::EmptyBody));

    let oversize = "x".repeat(test_config().max_body_len + 1);
    assert!(matches!(
        session.send(&oversize),
        Err(SendError::BodyTooLong { .. })
    ));

    // Nothing reached the store.
    assert!(session.messages().is_empty());
}

#[tokio::test]
async fn closed_thread_gates_the_composer() {
    let backend = Arc::new(MemoryBackend::new());
    let thread = backend.create_thread(ThreadKind::Connect);
    let (session, _events) = open(&backend, thread, user()).await;

    wait_until(|| session.thread_status() == ThreadStatus::Open).await;
    session.send("last call").unwrap();

    backend.close_thread(ThreadKind::Connect, thread).unwrap();
    wait_until(|| session.thread_status() == ThreadStatus::Closed).await;

    assert_eq!(session.send("one more"), Err(SendError::ThreadClosed));
}

#[tokio::test]
async fn refresh_preserves_pending_rows() {
    let backend = Arc::new(MemoryBackend::new());
    let thread = backend.create_thread(ThreadKind::Connect);
    let me = user();
    let other = user();
    let (session, _events) = open(&backend, thread, me).await;

    // A foreign message lands without its change event being delivered.
    backend.mute_change_feed(true);
    backend
        .insert_message(ThreadKind::Connect, thread, other, "seen the queue?")
        .await
        .unwrap();

    // Slow writes keep our own row pending across the refresh.
    backend.set_insert_delay(Some(Duration::from_millis(400)));
    let local_id = session.send("two minutes away").unwrap();

    session.refresh().await.unwrap();

    let snapshot = session.messages();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.iter().any(|m| m.body == "seen the queue?" && m.is_sent()));
    let mine = snapshot.iter().find(|m| m.local_id == local_id).unwrap();
    assert!(mine.is_pending(), "refresh must not clobber in-flight rows");

    // The delayed write eventually confirms through the synchronous path
    // even with the change feed muted.
    wait_until(|| {
        session
            .messages()
            .iter()
            .all(|m| m.is_sent())
    })
    .await;
    assert_eq!(session.messages().len(), 2);
}

/// Next `SubscriptionChanged` event, skipping unrelated chatter.
///
/// The event channel queues every transition, so unlike the coalescing
/// `watch` value it observes short-lived states deterministically.
async fn next_subscription_state(
    events: &mut tokio::sync::mpsc::Receiver<ThreadEvent>,
) -> SubscriptionState {
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            match events.recv().await.expect("event channel open") {
                ThreadEvent::SubscriptionChanged { state } => break state,
                _ => continue,
            }
        }
    })
    .await
    .expect("subscription transition expected")
}

#[tokio::test]
async fn listener_resubscribes_after_transport_drop() {
    let backend = Arc::new(MemoryBackend::new());
    let thread = backend.create_thread(ThreadKind::Connect);
    let other = user();
    let (session, mut events) = open(&backend, thread, user()).await;

    assert_eq!(
        next_subscription_state(&mut events).await,
        SubscriptionState::Subscribing
    );
    assert_eq!(
        next_subscription_state(&mut events).await,
        SubscriptionState::Subscribed
    );

    let topic = ThreadKind::Connect.message_topic(thread);
    backend.drop_subscribers(&topic);

    // The listener must drop out and come back on its own.
    assert_eq!(
        next_subscription_state(&mut events).await,
        SubscriptionState::Disconnected
    );
    assert_eq!(
        next_subscription_state(&mut events).await,
        SubscriptionState::Subscribing
    );
    assert_eq!(
        next_subscription_state(&mut events).await,
        SubscriptionState::Subscribed
    );

    // And the revived subscription actually delivers.
    backend
        .insert_message(ThreadKind::Connect, thread, other, "back on")
        .await
        .unwrap();
    wait_until(|| session.messages().iter().any(|m| m.body == "back on")).await;
}

#[tokio::test]
async fn malformed_events_are_dropped_not_fatal() {
    let backend = Arc::new(MemoryBackend::new());
    let thread = backend.create_thread(ThreadKind::Connect);
    let other = user();
    let (session, _events) = open(&backend, thread, user()).await;

    wait_until(|| session.subscription_state() == SubscriptionState::Subscribed).await;

    let topic = ThreadKind::Connect.message_topic(thread);
    backend.publish(ChangeEvent {
        topic: topic.clone(),
        payload: serde_json::json!({ "old": { "id": "nope" } }),
    });
    backend.publish(ChangeEvent {
        topic: topic.clone(),
        payload: serde_json::json!({ "new": { "id": 42, "body": [] } }),
    });

    backend
        .insert_message(ThreadKind::Connect, thread, other, "still here")
        .await
        .unwrap();

    wait_until(|| session.messages().len() == 1).await;
    assert_eq!(session.messages()[0].body, "still here");
}

#[tokio::test]
async fn duplicate_change_events_do_not_duplicate_rows() {
    let backend = Arc::new(MemoryBackend::new());
    let thread = backend.create_thread(ThreadKind::Connect);
    let other = user();
    let (session, _events) = open(&backend, thread, user()).await;

    wait_until(|| session.subscription_state() == SubscriptionState::Subscribed).await;

    let row = backend
        .insert_message(ThreadKind::Connect, thread, other, "going twice")
        .await
        .unwrap();

    // The transport redelivers the same insert twice more.
    let topic = ThreadKind::Connect.message_topic(thread);
    backend.publish(ChangeEvent::with_row(topic.clone(), &row));
    backend.publish(ChangeEvent::with_row(topic, &row));

    wait_until(|| !session.messages().is_empty()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(session.messages().len(), 1);
}

#[tokio::test]
async fn event_stream_reports_the_send_lifecycle() {
    let backend = Arc::new(MemoryBackend::new());
    let thread = backend.create_thread(ThreadKind::Connect);
    let (session, mut events) = open(&backend, thread, user()).await;

    let local_id = session.send("on the guest list?").unwrap();

    // Subscription chatter may precede it, but the first message event must
    // be the pending optimistic row.
    let first = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            match events.recv().await.expect("channel open") {
                ThreadEvent::MessageUpserted {
                    message,
                    previous_local_id,
                } => break (message, previous_local_id),
                _ => continue,
            }
        }
    })
    .await
    .expect("optimistic upsert expected");

    assert!(first.0.is_pending());
    assert_eq!(first.0.local_id, local_id);
    assert_eq!(first.1, None);

    // Skip subscription chatter until the confirmation upsert arrives.
    let confirmed = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            match events.recv().await.expect("channel open") {
                ThreadEvent::MessageUpserted {
                    message,
                    previous_local_id,
                } if message.is_sent() => break (message, previous_local_id),
                _ => continue,
            }
        }
    })
    .await
    .expect("confirmation event expected");

    assert_eq!(confirmed.1, Some(local_id));
    assert_eq!(confirmed.0.server_id, Some(confirmed.0.local_id));
}

#[tokio::test]
async fn closed_session_stops_observing_the_thread() {
    let backend = Arc::new(MemoryBackend::new());
    let thread = backend.create_thread(ThreadKind::Connect);
    let (alice, _alice_events) = open(&backend, thread, user()).await;
    let (bob, _bob_events) = open(&backend, thread, user()).await;

    wait_until(|| alice.subscription_state() == SubscriptionState::Subscribed).await;
    wait_until(|| bob.subscription_state() == SubscriptionState::Subscribed).await;

    alice.close();
    assert_eq!(alice.subscription_state(), SubscriptionState::Disconnected);

    bob.send("anyone still here?").unwrap();
    wait_until(|| bob.messages().first().is_some_and(|m| m.is_sent())).await;

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(
        alice.messages().is_empty(),
        "no store mutation may happen after teardown"
    );
}
