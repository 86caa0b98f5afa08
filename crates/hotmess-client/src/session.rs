//! One mounted thread view: store, writer, listener, status watcher.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use hotmess_backend::Backend;
use hotmess_shared::{BackendError, MessageId, SendError, ThreadId, ThreadKind, ThreadStatus, UserId};
use hotmess_store::{LocalMessage, ThreadStore};

use crate::config::SessionConfig;
use crate::events::{emit, SubscriptionState, ThreadEvent};
use crate::{listener, status};

/// A live session on one conversation thread.
///
/// Construction loads the thread history and spawns two background tasks:
/// the change listener (message inserts) and the status watcher.  Both are
/// torn down structurally when the session is closed or dropped; no store
/// mutation can happen through them afterwards.
///
/// The session owns the [`ThreadStore`] exclusively.  Sends are optimistic:
/// [`ThreadSession::send`] records the message locally and returns
/// immediately; the durable write completes out of band and either confirms
/// the row (rekeying it to its server id) or marks it failed for retry.
pub struct ThreadSession {
    kind: ThreadKind,
    thread: ThreadId,
    local_user: UserId,
    backend: Arc<dyn Backend>,
    config: SessionConfig,
    store: Arc<Mutex<ThreadStore>>,
    events_tx: mpsc::Sender<ThreadEvent>,
    subscription_tx: Arc<watch::Sender<SubscriptionState>>,
    subscription_rx: watch::Receiver<SubscriptionState>,
    status_rx: watch::Receiver<ThreadStatus>,
    listener_task: JoinHandle<()>,
    status_task: JoinHandle<()>,
}

impl ThreadSession {
    /// Open a session: load history, then go live.
    ///
    /// Returns the session and the receiving end of its event channel.
    /// Fails only if the initial history load fails; the status starts as
    /// `Unknown` and is filled in by the watcher.
    pub async fn open(
        backend: Arc<dyn Backend>,
        kind: ThreadKind,
        thread: ThreadId,
        local_user: UserId,
        config: SessionConfig,
    ) -> Result<(Self, mpsc::Receiver<ThreadEvent>), BackendError> {
        let history = backend.fetch_messages(kind, thread).await?;
        info!(thread = %thread, count = history.len(), "thread history loaded");

        let mut store = ThreadStore::new();
        store.load(&history);
        let store = Arc::new(Mutex::new(store));

        let (events_tx, events_rx) = mpsc::channel(config.event_capacity);

        let (subscription_tx, subscription_rx) = watch::channel(SubscriptionState::Disconnected);
        let subscription_tx = Arc::new(subscription_tx);
        let listener_task = listener::spawn_change_listener(
            backend.clone(),
            kind.message_topic(thread),
            store.clone(),
            events_tx.clone(),
            subscription_tx.clone(),
            config.clone(),
        );

        let (status_tx, status_rx) = watch::channel(ThreadStatus::Unknown);
        let status_task = status::spawn_status_watcher(
            backend.clone(),
            kind,
            thread,
            events_tx.clone(),
            Arc::new(status_tx),
            config.clone(),
        );

        Ok((
            Self {
                kind,
                thread,
                local_user,
                backend,
                config,
                store,
                events_tx,
                subscription_tx,
                subscription_rx,
                status_rx,
                listener_task,
                status_task,
            },
            events_rx,
        ))
    }

    /// Send a message optimistically.
    ///
    /// Validates the body, records a `Pending` row, and returns its local id
    /// without waiting for the network.  The durable write runs in its own
    /// task: on success the row is confirmed (the change-feed echo is then a
    /// duplicate); on failure the row is marked `Failed` and nothing is
    /// raised here.
    pub fn send(&self, body: &str) -> Result<MessageId, SendError> {
        if body.is_empty() {
            return Err(SendError::EmptyBody);
        }
        let len = body.chars().count();
        if len > self.config.max_body_len {
            return Err(SendError::BodyTooLong {
                len,
                limit: self.config.max_body_len,
            });
        }
        if !self.status_rx.borrow().allows_posting() {
            return Err(SendError::ThreadClosed);
        }

        let (local_id, message) = {
            let mut store = self.lock_store();
            let local_id = store.insert_optimistic(self.local_user, body);
            (local_id, store.get(local_id).cloned())
        };
        if let Some(message) = message {
            emit(
                &self.events_tx,
                ThreadEvent::MessageUpserted {
                    message,
                    previous_local_id: None,
                },
            );
        }
        debug!(thread = %self.thread, id = %local_id, "optimistic row recorded");

        let backend = self.backend.clone();
        let store = self.store.clone();
        let events = self.events_tx.clone();
        let (kind, thread, sender) = (self.kind, self.thread, self.local_user);
        let body = body.to_string();

        tokio::spawn(async move {
            match backend.insert_message(kind, thread, sender, &body).await {
                Ok(row) => {
                    let changed = {
                        let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
                        store.confirm(local_id, &row)
                    };
                    if changed {
                        let message = {
                            let store = store.lock().unwrap_or_else(PoisonError::into_inner);
                            store.get(row.id).cloned()
                        };
                        match message {
                            Some(message) => emit(
                                &events,
                                ThreadEvent::MessageUpserted {
                                    message,
                                    previous_local_id: Some(local_id),
                                },
                            ),
                            // confirm collapsed a duplicate pending row
                            None => emit(&events, ThreadEvent::MessageRemoved { local_id }),
                        }
                    }
                    debug!(thread = %thread, id = %row.id, "message write confirmed");
                }
                Err(e) => {
                    error!(thread = %thread, id = %local_id, error = %e, "message write failed");
                    let marked = {
                        let mut store = store.lock().unwrap_or_else(PoisonError::into_inner);
                        store.mark_failed(local_id)
                    };
                    if marked {
                        let message = {
                            let store = store.lock().unwrap_or_else(PoisonError::into_inner);
                            store.get(local_id).cloned()
                        };
                        if let Some(message) = message {
                            emit(
                                &events,
                                ThreadEvent::MessageUpserted {
                                    message,
                                    previous_local_id: None,
                                },
                            );
                        }
                    }
                }
            }
        });

        Ok(local_id)
    }

    /// Re-send a failed message.
    ///
    /// The failed row is removed and a fresh optimistic send is issued with
    /// the same body, producing a new, independent row.
    pub fn retry(&self, local_id: MessageId) -> Result<MessageId, SendError> {
        let body = {
            let mut store = self.lock_store();
            let body = match store.get(local_id) {
                Some(message) if message.is_failed() => message.body.clone(),
                _ => return Err(SendError::NotRetryable),
            };
            store.remove(local_id);
            body
        };
        emit(&self.events_tx, ThreadEvent::MessageRemoved { local_id });

        self.send(&body)
    }

    /// Dismiss a row (normally a failed send).  Returns whether it existed.
    pub fn dismiss(&self, local_id: MessageId) -> bool {
        let removed = self.lock_store().remove(local_id).is_some();
        if removed {
            emit(&self.events_tx, ThreadEvent::MessageRemoved { local_id });
        }
        removed
    }

    /// Re-fetch the thread history and merge it into the store.
    ///
    /// Pending and failed rows are preserved; the refresh never clobbers an
    /// in-flight optimistic write.
    pub async fn refresh(&self) -> Result<(), BackendError> {
        let history = self.backend.fetch_messages(self.kind, self.thread).await?;
        let count = history.len();
        self.lock_store().load(&history);
        emit(&self.events_tx, ThreadEvent::HistoryLoaded { count });
        debug!(thread = %self.thread, count, "history refreshed");
        Ok(())
    }

    /// Snapshot of the thread's messages, sorted by timestamp ascending.
    pub fn messages(&self) -> Vec<LocalMessage> {
        self.lock_store().messages().to_vec()
    }

    /// Watch the change subscription's lifecycle.
    pub fn subscription(&self) -> watch::Receiver<SubscriptionState> {
        self.subscription_rx.clone()
    }

    /// Current subscription state.
    pub fn subscription_state(&self) -> SubscriptionState {
        *self.subscription_rx.borrow()
    }

    /// Watch the thread's open/closed status.
    pub fn status(&self) -> watch::Receiver<ThreadStatus> {
        self.status_rx.clone()
    }

    /// Current thread status (`Unknown` until the first load completes).
    pub fn thread_status(&self) -> ThreadStatus {
        *self.status_rx.borrow()
    }

    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    pub fn kind(&self) -> ThreadKind {
        self.kind
    }

    /// Tear the session down: both subscriptions are released and no
    /// further store mutations can come through them.
    pub fn close(&self) {
        self.listener_task.abort();
        self.status_task.abort();
        self.subscription_tx
            .send_replace(SubscriptionState::Disconnected);
        debug!(thread = %self.thread, "session closed");
    }

    fn lock_store(&self) -> std::sync::MutexGuard<'_, ThreadStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ThreadSession {
    fn drop(&mut self) {
        self.close();
    }
}
