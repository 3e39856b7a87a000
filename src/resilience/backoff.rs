//! Exponential backoff with optional jitter.

use std::time::Duration;
use rand::Rng;

/// Calculate the delay before retry number `attempt + 1`.
///
/// The delay is `base_ms * multiplier^attempt`, capped at `max_ms`. When
/// `jitter_ratio` is positive, up to that fraction of the delay is added at
/// random. A ratio of zero yields a deterministic schedule.
pub fn calculate_backoff(
    attempt: u32,
    base_ms: u64,
    multiplier: f64,
    max_ms: u64,
    jitter_ratio: f64,
) -> Duration {
    let factor = multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
    let delay_ms = (base_ms as f64 * factor).min(max_ms as f64) as u64;

    let jitter_range = (delay_ms as f64 * jitter_ratio.clamp(0.0, 1.0)) as u64;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(calculate_backoff(0, 100, 2.0, 2000, 0.0), Duration::from_millis(100));
        assert_eq!(calculate_backoff(1, 100, 2.0, 2000, 0.0), Duration::from_millis(200));
        assert_eq!(calculate_backoff(3, 100, 2.0, 2000, 0.0), Duration::from_millis(800));

        let max = calculate_backoff(10, 100, 2.0, 1000, 0.0);
        assert_eq!(max, Duration::from_millis(1000));
    }

    #[test]
    fn test_backoff_with_jitter_stays_in_range() {
        for _ in 0..50 {
            let d = calculate_backoff(2, 100, 2.0, 2000, 0.1);
            assert!(d >= Duration::from_millis(400));
            assert!(d < Duration::from_millis(440));
        }
    }

    #[test]
    fn test_multiplier_below_one_is_constant() {
        assert_eq!(calculate_backoff(5, 50, 0.5, 2000, 0.0), Duration::from_millis(50));
    }

    #[test]
    fn test_huge_attempt_saturates() {
        assert_eq!(calculate_backoff(u32::MAX, 100, 2.0, 5000, 0.0), Duration::from_millis(5000));
    }
}
