//! Retry delay policy for upstream forwarding.

use rand::Rng;
use std::time::Duration;

use crate::config::UpstreamConfig;

/// Delay before retry number `attempt` (1-based), derived from the
/// upstream config: base doubled per attempt, capped at the configured
/// maximum, with up to 10% jitter added so synchronized clients spread out.
pub fn retry_backoff(attempt: u32, upstream: &UpstreamConfig) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let doublings = attempt.saturating_sub(1).min(16);
    let delay_ms = upstream
        .backoff_base_ms
        .saturating_mul(1u64 << doublings)
        .min(upstream.backoff_max_ms);

    let jitter_ceiling = delay_ms / 10;
    let jitter_ms = if jitter_ceiling > 0 {
        rand::thread_rng().gen_range(0..jitter_ceiling)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(base_ms: u64, max_ms: u64) -> UpstreamConfig {
        UpstreamConfig {
            retry_enabled: true,
            backoff_base_ms: base_ms,
            backoff_max_ms: max_ms,
        }
    }

    #[test]
    fn delay_doubles_and_caps_at_the_configured_maximum() {
        let config = upstream(100, 1000);

        let first = retry_backoff(1, &config);
        assert!(first.as_millis() >= 100 && first.as_millis() <= 110);

        let second = retry_backoff(2, &config);
        assert!(second.as_millis() >= 200);

        let capped = retry_backoff(10, &config);
        assert!(capped.as_millis() >= 1000 && capped.as_millis() <= 1100);
    }

    #[test]
    fn zeroth_attempt_has_no_delay() {
        assert_eq!(retry_backoff(0, &upstream(100, 1000)), Duration::ZERO);
    }
}
