//! Exponential backoff with jitter for `StartMigration` retries (spec.md
//! §4.6, Retry & backoff): base 2s, cap 10 min, max 8 attempts.

use rand::Rng;
use std::time::Duration;

/// Computes the delay before retry attempt number `attempt` (1-indexed:
/// the delay awaited *after* attempt 1 fails, before attempt 2). Jitter is
/// +/-20%, disableable for deterministic tests that assert on exact
/// cumulative backoff (spec.md §8, scenario S2).
pub fn delay_for_attempt(attempt: u32, base_seconds: u64, cap_seconds: u64, jitter: bool) -> Duration {
    let exponent = attempt.saturating_sub(1).min(30);
    let raw_seconds = (base_seconds as f64) * 2f64.powi(exponent as i32);
    let capped_seconds = raw_seconds.min(cap_seconds as f64);
    let jitter_factor = if jitter {
        rand::thread_rng().gen_range(0.8..1.2)
    } else {
        1.0
    };
    Duration::from_secs_f64(capped_seconds * jitter_factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_backs_off_near_base() {
        let d = delay_for_attempt(1, 2, 600, true);
        assert!(d.as_secs_f64() >= 1.6 && d.as_secs_f64() <= 2.4);
    }

    #[test]
    fn later_attempts_are_capped() {
        let d = delay_for_attempt(20, 2, 600, true);
        assert!(d.as_secs_f64() <= 720.0);
    }

    #[test]
    fn without_jitter_matches_spec_md_s2_cumulative_backoff() {
        let total: f64 = (1..=3)
            .map(|attempt| delay_for_attempt(attempt, 2, 600, false).as_secs_f64())
            .sum();
        assert_eq!(total, 14.0);
    }

    #[test]
    fn backoff_grows_exponentially_before_the_cap() {
        let d2 = delay_for_attempt(2, 2, 600, false);
        let d3 = delay_for_attempt(3, 2, 600, false);
        assert_eq!(d2.as_secs_f64(), 4.0);
        assert_eq!(d3.as_secs_f64(), 8.0);
    }
}
