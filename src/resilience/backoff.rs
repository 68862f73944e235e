//! Exponential backoff with jitter for collaborator retries.

use std::time::Duration;

use rand::Rng;

/// Upper bound of the random jitter, as a fraction of the delay (1/10).
const JITTER_DIVISOR: u64 = 10;

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at `max_ms`, plus up to 10% jitter so parallel service pipelines
/// don't hit a rate-limited search endpoint in lockstep.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    Duration::from_millis(capped + jitter(capped))
}

fn jitter(delay_ms: u64) -> u64 {
    let range = delay_ms / JITTER_DIVISOR;
    if range == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..range)
}
