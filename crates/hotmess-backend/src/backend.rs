use async_trait::async_trait;
use tokio::sync::broadcast;

use hotmess_shared::{
    BackendError, ChangeEvent, MessageRow, ThreadId, ThreadKind, ThreadStatus, UserId,
};

/// The hosted backend, seen from the client.
///
/// Four contracts, nothing more:
///
/// * a durable read path returning one thread's messages oldest first,
/// * a durable write path that persists a message, publishes exactly one
///   insert event on the matching topic, and returns the stored row
///   (server id and authoritative timestamp),
/// * a point read of a thread's open/closed status,
/// * a change-event subscription keyed by topic.
///
/// Delivery on the change feed is at-least-once but not guaranteed; a
/// lagging subscriber loses events rather than blocking the publisher.
#[async_trait]
pub trait Backend: Send + Sync {
    /// All messages in `thread`, oldest first.
    async fn fetch_messages(
        &self,
        kind: ThreadKind,
        thread: ThreadId,
    ) -> Result<Vec<MessageRow>, BackendError>;

    /// Durably persist a new message.
    ///
    /// On success the row has been stored, one insert event has been
    /// published to all subscribers of the thread's message topic
    /// (including the writer), and the stored row is returned.
    async fn insert_message(
        &self,
        kind: ThreadKind,
        thread: ThreadId,
        sender: UserId,
        body: &str,
    ) -> Result<MessageRow, BackendError>;

    /// Current lifecycle status of `thread`.
    async fn fetch_status(
        &self,
        kind: ThreadKind,
        thread: ThreadId,
    ) -> Result<ThreadStatus, BackendError>;

    /// Open a change-event subscription on `topic`.
    ///
    /// The receiver is closed when the backend tears the topic down; the
    /// caller is responsible for resubscribing.
    async fn subscribe(
        &self,
        topic: &str,
    ) -> Result<broadcast::Receiver<ChangeEvent>, BackendError>;
}
