//! In-process backend used by tests and demos.
//!
//! Rows live in a mutex-held map; change events fan out over one
//! `tokio::sync::broadcast` channel per topic, so a slow subscriber lags
//! and loses events instead of blocking the publisher -- the same delivery
//! contract the hosted service gives us.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;

use hotmess_shared::constants::CHANGE_FEED_CAPACITY;
use hotmess_shared::{
    BackendError, ChangeEvent, MessageId, MessageRow, StatusRow, ThreadId, ThreadKind,
    ThreadStatus, UserId,
};

use crate::backend::Backend;

struct ThreadRecord {
    status: ThreadStatus,
    messages: Vec<MessageRow>,
}

#[derive(Default)]
struct Inner {
    threads: HashMap<(ThreadKind, ThreadId), ThreadRecord>,
    topics: HashMap<String, broadcast::Sender<ChangeEvent>>,
    /// Number of upcoming writes to fail with a transport error.
    fail_inserts: u32,
    /// When set, successful writes publish no change event.
    muted: bool,
    /// Artificial latency applied to every write.
    insert_delay: Option<Duration>,
}

/// An in-memory [`Backend`].
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Register a new open thread and return its id.
    pub fn create_thread(&self, kind: ThreadKind) -> ThreadId {
        let thread = ThreadId::new();
        let mut inner = self.inner.lock().expect("backend state poisoned");
        inner.threads.insert(
            (kind, thread),
            ThreadRecord {
                status: ThreadStatus::Open,
                messages: Vec::new(),
            },
        );
        thread
    }

    /// Close a thread and publish the status change.
    pub fn close_thread(&self, kind: ThreadKind, thread: ThreadId) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().expect("backend state poisoned");
        let record = inner
            .threads
            .get_mut(&(kind, thread))
            .ok_or(BackendError::ThreadNotFound(thread))?;
        record.status = ThreadStatus::Closed;

        let row = StatusRow {
            id: thread,
            status: ThreadStatus::Closed,
        };
        let event = ChangeEvent::with_row(kind.status_topic(thread), &row);
        Self::publish_locked(&mut inner, event);
        Ok(())
    }

    /// Fail the next `count` writes with a transport error.
    pub fn fail_next_inserts(&self, count: u32) {
        self.inner.lock().expect("backend state poisoned").fail_inserts = count;
    }

    /// Delay every write by `delay` (pass `None` to restore instant writes).
    ///
    /// Lets tests hold a row in `Pending` for a controlled window.
    pub fn set_insert_delay(&self, delay: Option<Duration>) {
        self.inner.lock().expect("backend state poisoned").insert_delay = delay;
    }

    /// Suppress (or restore) change-event publication for successful writes.
    ///
    /// Simulates the dropped-notification gap: the write lands durably but
    /// no subscriber ever hears about it.
    pub fn mute_change_feed(&self, muted: bool) {
        self.inner.lock().expect("backend state poisoned").muted = muted;
    }

    /// Tear down a topic, closing every open subscription on it.
    ///
    /// Subscribers observe a closed receiver, exactly as they would when the
    /// hosted transport drops the connection.
    pub fn drop_subscribers(&self, topic: &str) {
        let mut inner = self.inner.lock().expect("backend state poisoned");
        inner.topics.remove(topic);
    }

    /// Publish an arbitrary event on a topic.
    ///
    /// Lets tests inject malformed payloads at the subscription boundary.
    pub fn publish(&self, event: ChangeEvent) {
        let mut inner = self.inner.lock().expect("backend state poisoned");
        Self::publish_locked(&mut inner, event);
    }

    fn publish_locked(inner: &mut Inner, event: ChangeEvent) {
        let sender = inner
            .topics
            .entry(event.topic.clone())
            .or_insert_with(|| broadcast::channel(CHANGE_FEED_CAPACITY).0);
        // A send error only means nobody is subscribed right now.
        if sender.send(event).is_err() {
            debug!("change event published with no subscribers");
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch_messages(
        &self,
        kind: ThreadKind,
        thread: ThreadId,
    ) -> Result<Vec<MessageRow>, BackendError> {
        let inner = self.inner.lock().expect("backend state poisoned");
        let record = inner
            .threads
            .get(&(kind, thread))
            .ok_or(BackendError::ThreadNotFound(thread))?;

        let mut rows = record.messages.clone();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn insert_message(
        &self,
        kind: ThreadKind,
        thread: ThreadId,
        sender: UserId,
        body: &str,
    ) -> Result<MessageRow, BackendError> {
        let delay = self
            .inner
            .lock()
            .expect("backend state poisoned")
            .insert_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().expect("backend state poisoned");

        if inner.fail_inserts > 0 {
            inner.fail_inserts -= 1;
            return Err(BackendError::Request("injected write failure".to_string()));
        }

        let record = inner
            .threads
            .get_mut(&(kind, thread))
            .ok_or(BackendError::ThreadNotFound(thread))?;

        if record.status == ThreadStatus::Closed {
            return Err(BackendError::Rejected("thread is closed".to_string()));
        }

        let row = MessageRow {
            id: MessageId::new(),
            thread_id: thread,
            sender_id: sender,
            body: body.to_string(),
            created_at: Utc::now(),
        };
        record.messages.push(row.clone());

        if !inner.muted {
            let event = ChangeEvent::with_row(kind.message_topic(thread), &row);
            Self::publish_locked(&mut inner, event);
        }

        Ok(row)
    }

    async fn fetch_status(
        &self,
        kind: ThreadKind,
        thread: ThreadId,
    ) -> Result<ThreadStatus, BackendError> {
        let inner = self.inner.lock().expect("backend state poisoned");
        inner
            .threads
            .get(&(kind, thread))
            .map(|record| record.status)
            .ok_or(BackendError::ThreadNotFound(thread))
    }

    async fn subscribe(
        &self,
        topic: &str,
    ) -> Result<broadcast::Receiver<ChangeEvent>, BackendError> {
        let mut inner = self.inner.lock().expect("backend state poisoned");
        let sender = inner
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANGE_FEED_CAPACITY).0);
        Ok(sender.subscribe())
    }
}
