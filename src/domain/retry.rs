//! Bounded exponential backoff for transient source failures.

use crate::domain::error::QuantError;
use std::thread;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_tries: u32,
    /// Pause after the first failure; doubled after each further failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn no_delay(max_tries: u32) -> Self {
        Self {
            max_tries,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or
    /// `max_tries` attempts are used up. The last error is returned.
    pub fn run<T, F>(&self, label: &str, mut op: F) -> Result<T, QuantError>
    where
        F: FnMut() -> Result<T, QuantError>,
    {
        let max_tries = self.max_tries.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_tries => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        target: "twquant::retry",
                        label,
                        attempt,
                        max_tries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, backing off"
                    );
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn transient() -> QuantError {
        QuantError::TransientSource {
            source_name: "test".into(),
            reason: "timeout".into(),
        }
    }

    #[test]
    fn delays_double() {
        let policy = RetryPolicy {
            max_tries: 5,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let out = RetryPolicy::no_delay(3).run("op", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 { Err(transient()) } else { Ok(42) }
        });
        assert_eq!(out.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn gives_up_after_max_tries() {
        let calls = Cell::new(0);
        let out: Result<(), _> = RetryPolicy::no_delay(3).run("op", || {
            calls.set(calls.get() + 1);
            Err(transient())
        });
        assert!(out.unwrap_err().is_transient());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn invalid_response_is_not_retried() {
        let calls = Cell::new(0);
        let out: Result<(), _> = RetryPolicy::no_delay(3).run("op", || {
            calls.set(calls.get() + 1);
            Err(QuantError::InvalidResponse {
                source_name: "test".into(),
                reason: "no such stock".into(),
            })
        });
        assert!(matches!(out, Err(QuantError::InvalidResponse { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn zero_tries_still_attempts_once() {
        let calls = Cell::new(0);
        let _: Result<(), _> = RetryPolicy::no_delay(0).run("op", || {
            calls.set(calls.get() + 1);
            Err(transient())
        });
        assert_eq!(calls.get(), 1);
    }
}
