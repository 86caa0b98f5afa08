//! Notifications emitted by a session toward the embedding UI.

use serde::Serialize;
use tokio::sync::mpsc;

use hotmess_shared::{MessageId, ThreadStatus};
use hotmess_store::LocalMessage;

/// Lifecycle of the remote change subscription.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    /// No channel is open for this thread.
    Disconnected,
    /// A channel has been requested from the transport.
    Subscribing,
    /// The transport confirmed the subscription; events are flowing.
    Subscribed,
}

/// One UI-facing notification.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ThreadEvent {
    /// A message row appeared or changed.  `previous_local_id` is set when a
    /// pending row was rekeyed to its server id, so the UI can migrate its
    /// row key instead of re-rendering from scratch.
    MessageUpserted {
        message: LocalMessage,
        #[serde(rename = "previousLocalId")]
        previous_local_id: Option<MessageId>,
    },
    /// A row was removed (dismissed failed send, or a duplicate collapsed).
    MessageRemoved {
        #[serde(rename = "localId")]
        local_id: MessageId,
    },
    /// The thread's open/closed status changed.
    StatusChanged { status: ThreadStatus },
    /// The change subscription changed state.
    SubscriptionChanged { state: SubscriptionState },
    /// A history refresh was merged into the store.
    HistoryLoaded { count: usize },
}

/// Best-effort emit: a full or closed channel drops the event rather than
/// stalling the session.
pub(crate) fn emit(events: &mpsc::Sender<ThreadEvent>, event: ThreadEvent) {
    if let Err(e) = events.try_send(event) {
        tracing::debug!(error = %e, "dropping session event");
    }
}
