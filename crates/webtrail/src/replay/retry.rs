//! Retry policy.
//!
//! One policy serves every transient-failure site in the engine:
//! element resolution retries between timer ticks, and any host-side
//! operation that wants the same linear-backoff-with-ceiling shape.

/// Linear backoff with a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before giving up
    pub max_attempts: u32,
    /// Backoff grows by this much per attempt
    pub base_delay_ms: u64,
    /// Backoff never exceeds this
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::resolver()
    }
}

impl RetryPolicy {
    /// The element-resolution policy: five attempts, 500 ms per attempt,
    /// capped at two seconds.
    #[must_use]
    pub const fn resolver() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 2000,
        }
    }

    /// Delay before the given 1-based attempt.
    #[must_use]
    pub const fn delay_for(&self, attempt: u32) -> u64 {
        let delay = self.base_delay_ms * attempt as u64;
        if delay > self.max_delay_ms {
            self.max_delay_ms
        } else {
            delay
        }
    }

    /// True once `attempts_made` attempts have all failed.
    #[must_use]
    pub const fn exhausted(&self, attempts_made: u32) -> bool {
        attempts_made >= self.max_attempts
    }
}

/// Run an operation under a policy, synchronously.
///
/// `operation` receives the 1-based attempt number; `wait` is called
/// with each backoff delay between attempts (a blocking host sleeps, a
/// test counts). Returns the first success, or None once exhausted.
pub fn run_with_retry<T>(
    policy: &RetryPolicy,
    mut operation: impl FnMut(u32) -> Option<T>,
    mut wait: impl FnMut(u64),
) -> Option<T> {
    for attempt in 1..=policy.max_attempts {
        if let Some(value) = operation(attempt) {
            return Some(value);
        }
        if !policy.exhausted(attempt) {
            wait(policy.delay_for(attempt));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_linear_with_ceiling() {
        let policy = RetryPolicy::resolver();
        assert_eq!(policy.delay_for(1), 500);
        assert_eq!(policy.delay_for(2), 1000);
        assert_eq!(policy.delay_for(3), 1500);
        assert_eq!(policy.delay_for(4), 2000);
        assert_eq!(policy.delay_for(5), 2000);
    }

    #[test]
    fn exhaustion_at_max_attempts() {
        let policy = RetryPolicy::resolver();
        assert!(!policy.exhausted(4));
        assert!(policy.exhausted(5));
    }

    #[test]
    fn run_with_retry_stops_on_success() {
        let policy = RetryPolicy::resolver();
        let mut waits = Vec::new();
        let result = run_with_retry(
            &policy,
            |attempt| (attempt == 3).then_some(attempt),
            |d| waits.push(d),
        );
        assert_eq!(result, Some(3));
        assert_eq!(waits, vec![500, 1000]);
    }

    #[test]
    fn run_with_retry_exhausts() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 10,
            max_delay_ms: 100,
        };
        let mut calls = 0;
        let result: Option<()> = run_with_retry(
            &policy,
            |_| {
                calls += 1;
                None
            },
            |_| {},
        );
        assert_eq!(result, None);
        assert_eq!(calls, 2);
    }
}
