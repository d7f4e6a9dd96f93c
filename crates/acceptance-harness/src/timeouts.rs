// crates/acceptance-harness/src/timeouts.rs
// ============================================================================
// Module: Harness Timeouts
// Description: Timeout resolution with an optional configured floor.
// Purpose: Keep startup timeouts consistent and overridable across suites.
// ============================================================================

//! Timeout resolution against the configured floor.

use std::time::Duration;
use std::time::Instant;

/// Returns the effective timeout for `requested`.
///
/// The floor only ever lengthens a timeout; an explicitly longer request wins.
#[must_use]
pub fn resolve_timeout(requested: Duration, floor: Option<Duration>) -> Duration {
    floor.map_or(requested, |floor| requested.max(floor))
}

/// Returns the instant `timeout` from now, or `None` when it is not
/// representable and the wait has no deadline.
#[must_use]
pub fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Returns true once `now` has reached `deadline`.
#[must_use]
pub fn deadline_passed(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.is_some_and(|deadline| now >= deadline)
}

/// Time left until `deadline`, capped at `step`.
#[must_use]
pub fn next_wait(deadline: Option<Instant>, now: Instant, step: Duration) -> Duration {
    deadline.map_or(step, |deadline| deadline.saturating_duration_since(now).min(step))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use std::time::Instant;

    use super::deadline_after;
    use super::deadline_passed;
    use super::next_wait;
    use super::resolve_timeout;

    #[test]
    fn floor_never_shortens() {
        let requested = Duration::from_secs(10);
        assert_eq!(resolve_timeout(requested, None), requested);
        assert_eq!(resolve_timeout(requested, Some(Duration::from_secs(3))), requested);
        assert_eq!(
            resolve_timeout(requested, Some(Duration::from_secs(45))),
            Duration::from_secs(45)
        );
    }

    #[test]
    fn unrepresentable_deadline_means_no_deadline() {
        let deadline = deadline_after(Duration::from_secs(u64::MAX));
        assert_eq!(deadline, None);
        let now = Instant::now();
        assert!(!deadline_passed(deadline, now));
        assert_eq!(next_wait(deadline, now, Duration::from_millis(50)), Duration::from_millis(50));
    }

    #[test]
    fn deadline_wait_is_capped_and_expires() {
        let now = Instant::now();
        let deadline = Some(now + Duration::from_secs(2));
        assert_eq!(next_wait(deadline, now, Duration::from_millis(50)), Duration::from_millis(50));
        assert!(!deadline_passed(deadline, now));
        assert!(deadline_passed(deadline, now + Duration::from_secs(2)));
        assert_eq!(
            next_wait(deadline, now + Duration::from_secs(3), Duration::from_millis(50)),
            Duration::ZERO
        );
    }
}
