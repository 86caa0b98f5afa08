use std::time::Duration;

use rand::Rng;

/// Jittered exponential backoff for resubscription attempts.
///
/// `base * 2^attempt`, capped at `max`, plus a uniform jitter of up to one
/// base interval so a fleet of sessions does not resubscribe in lockstep.
pub(crate) fn resubscribe_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let base_ms = (base.as_millis() as u64).max(1);
    let max_ms = (max.as_millis() as u64).max(base_ms);

    let exponent = attempt.min(16);
    let scaled = base_ms.saturating_mul(1u64 << exponent).min(max_ms);
    let jitter: u64 = rand::thread_rng().gen_range(0..=base_ms);

    Duration::from_millis(scaled.saturating_add(jitter))
}
