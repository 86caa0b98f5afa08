/// Maximum message body length in characters, matching the composer limit.
pub const MAX_MESSAGE_BODY: usize = 2000;

/// Reconciliation window in seconds.
///
/// A pending optimistic row only matches a remote confirmation when the two
/// timestamps are closer than this.
pub const RECONCILE_WINDOW_SECS: i64 = 15;

/// Capacity of per-topic change-event broadcast channels.
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// Capacity of the session's UI-facing event channel.
pub const SESSION_EVENT_CAPACITY: usize = 256;

/// Base delay before the first resubscription attempt, in milliseconds.
pub const RESUBSCRIBE_BASE_MS: u64 = 500;

/// Upper bound on the resubscription backoff, in milliseconds.
pub const RESUBSCRIBE_MAX_MS: u64 = 30_000;
