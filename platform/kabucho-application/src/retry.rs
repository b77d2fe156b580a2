use std::fmt::Display;
use std::thread;
use std::time::Duration;

/// Fixed-attempt-count retry with linear backoff. Applied at the
/// granularity of a single external call; cancellation is not supported,
/// batch jobs run to completion or fail.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

pub fn call_with_retry<T, E: Display>(
    policy: &RetryPolicy,
    label: &str,
    mut op: impl FnMut() -> Result<T, E>,
) -> Result<T, E> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts => {
                tracing::warn!(
                    target = label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "retrying after failure"
                );
                thread::sleep(policy.delay_for(attempt));
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{call_with_retry, RetryPolicy};
    use std::time::Duration;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let mut calls = 0u32;
        let result: Result<u32, String> = call_with_retry(&policy(3), "test", || {
            calls += 1;
            if calls < 3 {
                Err("transient".to_string())
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut calls = 0u32;
        let result: Result<(), String> = call_with_retry(&policy(3), "test", || {
            calls += 1;
            Err("persistent".to_string())
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn zero_attempts_clamps_to_one() {
        let mut calls = 0u32;
        let _: Result<(), String> = call_with_retry(&policy(0), "test", || {
            calls += 1;
            Err("boom".to_string())
        });
        assert_eq!(calls, 1);
    }
}
