//! The remote change listener.
//!
//! One subscription per (table, thread) per session, running in its own
//! task.  The task is a supervising loop: when the transport closes the
//! feed the listener drops to `Disconnected` and resubscribes after a
//! jittered exponential backoff, so a mounted thread view stays live
//! instead of going silently dead.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use hotmess_backend::Backend;
use hotmess_shared::{ChangeEvent, MessageRow};
use hotmess_store::{ReconcileOutcome, ThreadStore};

use crate::backoff::resubscribe_delay;
use crate::config::SessionConfig;
use crate::events::{emit, SubscriptionState, ThreadEvent};

pub(crate) fn spawn_change_listener(
    backend: Arc<dyn Backend>,
    topic: String,
    store: Arc<Mutex<ThreadStore>>,
    events: mpsc::Sender<ThreadEvent>,
    state_tx: Arc<watch::Sender<SubscriptionState>>,
    config: SessionConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut attempt: u32 = 0;

        loop {
            set_state(&state_tx, &events, SubscriptionState::Subscribing);

            match backend.subscribe(&topic).await {
                Ok(mut rx) => {
                    set_state(&state_tx, &events, SubscriptionState::Subscribed);
                    info!(topic = %topic, "change feed subscribed");
                    attempt = 0;
                    pump(&mut rx, &topic, &store, &events).await;
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "change feed subscription failed");
                }
            }

            set_state(&state_tx, &events, SubscriptionState::Disconnected);

            let delay =
                resubscribe_delay(attempt, config.resubscribe_base, config.resubscribe_max);
            attempt = attempt.saturating_add(1);
            debug!(
                topic = %topic,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "resubscribing after backoff"
            );
            tokio::time::sleep(delay).await;
        }
    })
}

/// Drain the feed until the transport closes it.
async fn pump(
    rx: &mut broadcast::Receiver<ChangeEvent>,
    topic: &str,
    store: &Mutex<ThreadStore>,
    events: &mpsc::Sender<ThreadEvent>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => apply(&event, topic, store, events),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(topic = %topic, skipped, "change feed lagged, events were dropped");
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!(topic = %topic, "change feed closed by transport");
                return;
            }
        }
    }
}

/// Validate one event at the boundary and reconcile it into the store.
fn apply(
    event: &ChangeEvent,
    topic: &str,
    store: &Mutex<ThreadStore>,
    events: &mpsc::Sender<ThreadEvent>,
) {
    let row = match MessageRow::from_change(event) {
        Ok(row) => row,
        Err(e) => {
            warn!(topic = %topic, error = %e, "dropping malformed change event");
            return;
        }
    };

    let (outcome, message) = {
        let mut guard = store.lock().unwrap_or_else(PoisonError::into_inner);
        let outcome = guard.reconcile(&row);
        (outcome, guard.get(row.id).cloned())
    };

    match outcome {
        ReconcileOutcome::Duplicate => {
            debug!(topic = %topic, id = %row.id, "duplicate change event ignored");
        }
        ReconcileOutcome::Confirmed { previous_local_id } => {
            debug!(topic = %topic, id = %row.id, "optimistic row confirmed by echo");
            if let Some(message) = message {
                emit(
                    events,
                    ThreadEvent::MessageUpserted {
                        message,
                        previous_local_id: Some(previous_local_id),
                    },
                );
            }
        }
        ReconcileOutcome::Appended => {
            debug!(
                topic = %topic,
                id = %row.id,
                sender = %row.sender_id.short(),
                "new message appended"
            );
            if let Some(message) = message {
                emit(
                    events,
                    ThreadEvent::MessageUpserted {
                        message,
                        previous_local_id: None,
                    },
                );
            }
        }
    }
}

fn set_state(
    state_tx: &watch::Sender<SubscriptionState>,
    events: &mpsc::Sender<ThreadEvent>,
    state: SubscriptionState,
) {
    if *state_tx.borrow() != state {
        state_tx.send_replace(state);
        emit(events, ThreadEvent::SubscriptionChanged { state });
    }
}
