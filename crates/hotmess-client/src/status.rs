//! The thread status watcher.
//!
//! A point read plus a change subscription over one thread's open/closed
//! flag, exposed as a `watch` value for composer gating.  Supervised the
//! same way as the message listener; the point read is repeated after each
//! reconnect so a transition missed while offline is still picked up.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use hotmess_backend::Backend;
use hotmess_shared::{ChangeEvent, StatusRow, ThreadId, ThreadKind, ThreadStatus};

use crate::backoff::resubscribe_delay;
use crate::config::SessionConfig;
use crate::events::{emit, ThreadEvent};

pub(crate) fn spawn_status_watcher(
    backend: Arc<dyn Backend>,
    kind: ThreadKind,
    thread: ThreadId,
    events: mpsc::Sender<ThreadEvent>,
    state_tx: Arc<watch::Sender<ThreadStatus>>,
    config: SessionConfig,
) -> JoinHandle<()> {
    let topic = kind.status_topic(thread);

    tokio::spawn(async move {
        let mut attempt: u32 = 0;

        loop {
            match backend.fetch_status(kind, thread).await {
                Ok(status) => update(&state_tx, &events, status),
                Err(e) => {
                    warn!(thread = %thread, error = %e, "thread status load failed");
                }
            }

            match backend.subscribe(&topic).await {
                Ok(mut rx) => {
                    debug!(topic = %topic, "status feed subscribed");
                    attempt = 0;
                    pump(&mut rx, &topic, thread, &state_tx, &events).await;
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "status subscription failed");
                }
            }

            let delay =
                resubscribe_delay(attempt, config.resubscribe_base, config.resubscribe_max);
            attempt = attempt.saturating_add(1);
            tokio::time::sleep(delay).await;
        }
    })
}

async fn pump(
    rx: &mut broadcast::Receiver<ChangeEvent>,
    topic: &str,
    thread: ThreadId,
    state_tx: &watch::Sender<ThreadStatus>,
    events: &mpsc::Sender<ThreadEvent>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => match StatusRow::from_change(&event) {
                Ok(row) if row.id == thread => update(state_tx, events, row.status),
                Ok(row) => {
                    debug!(topic = %topic, other = %row.id, "status event for another thread ignored");
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "dropping malformed status event");
                }
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(topic = %topic, skipped, "status feed lagged, events were dropped");
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!(topic = %topic, "status feed closed by transport");
                return;
            }
        }
    }
}

fn update(
    state_tx: &watch::Sender<ThreadStatus>,
    events: &mpsc::Sender<ThreadEvent>,
    status: ThreadStatus,
) {
    if *state_tx.borrow() != status {
        info!(status = ?status, "thread status changed");
        state_tx.send_replace(status);
        emit(events, ThreadEvent::StatusChanged { status });
    }
}
