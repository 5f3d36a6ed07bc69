//! Rate-limit backoff schedule.

use std::time::Duration;

/// Wait before retrying after the `consecutive_count`-th back-to-back rate limit.
///
/// `base_delay_secs * multiplier^(consecutive_count - 1)`. A count of 0 is
/// treated as 1 (the counter is always incremented before the call).
pub fn compute_delay(base_delay_secs: f64, consecutive_count: u32, multiplier: f64) -> f64 {
    let exponent = consecutive_count.saturating_sub(1);
    let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
    base_delay_secs.max(0.0) * multiplier.powi(exponent)
}

/// Convert a delay in seconds to a sleepable duration.
///
/// Non-finite or oversized values saturate instead of panicking.
pub fn delay_duration(delay_secs: f64) -> Duration {
    Duration::try_from_secs_f64(delay_secs.max(0.0)).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn first_wait_equals_base() {
        assert!(approx(compute_delay(5.0, 1, 1.5), 5.0));
        assert!(approx(compute_delay(60.0, 1, 2.0), 60.0));
    }

    #[test]
    fn grows_by_multiplier_per_consecutive_limit() {
        assert!(approx(compute_delay(5.0, 2, 1.5), 7.5));
        assert!(approx(compute_delay(5.0, 3, 1.5), 11.25));
        assert!(approx(compute_delay(60.0, 4, 1.5), 202.5));
    }

    #[test]
    fn strictly_increasing_in_count() {
        let mut previous = compute_delay(1.0, 1, 1.5);
        for count in 2..20 {
            let next = compute_delay(1.0, count, 1.5);
            assert!(next > previous, "count {count}");
            previous = next;
        }
    }

    #[test]
    fn zero_base_never_waits() {
        assert_eq!(compute_delay(0.0, 7, 1.5), 0.0);
    }

    #[test]
    fn delay_duration_saturates() {
        assert_eq!(delay_duration(1.5), Duration::from_millis(1500));
        assert_eq!(delay_duration(-3.0), Duration::ZERO);
        assert_eq!(delay_duration(f64::INFINITY), Duration::MAX);
    }
}
