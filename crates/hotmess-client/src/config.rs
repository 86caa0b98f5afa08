use std::time::Duration;

use hotmess_shared::constants::{
    MAX_MESSAGE_BODY, RESUBSCRIBE_BASE_MS, RESUBSCRIBE_MAX_MS, SESSION_EVENT_CAPACITY,
};

/// Tuning for one thread session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum message body length accepted by the composer, in characters.
    pub max_body_len: usize,

    /// Delay before the first resubscription attempt after the change feed
    /// drops.  Subsequent attempts back off exponentially.
    pub resubscribe_base: Duration,

    /// Upper bound on the resubscription backoff.
    pub resubscribe_max: Duration,

    /// Buffered capacity of the UI-facing event channel.  When the embedder
    /// stops draining, further events are dropped rather than blocking the
    /// listener.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_body_len: MAX_MESSAGE_BODY,
            resubscribe_base: Duration::from_millis(RESUBSCRIBE_BASE_MS),
            resubscribe_max: Duration::from_millis(RESUBSCRIBE_MAX_MS),
            event_capacity: SESSION_EVENT_CAPACITY,
        }
    }
}
