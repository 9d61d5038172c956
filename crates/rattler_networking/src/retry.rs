//! Re-exports the [`RetryPolicy`] trait from the `retry_policies` crate along with its
//! implementations, plus a policy that never retries.

pub use retry_policies::{policies::*, Jitter, RetryDecision, RetryPolicy};
use std::time::SystemTime;

/// A [`RetryPolicy`] that always gives up immediately. Useful for callers that want to
/// disable retries, e.g. when replaying a recorded failure in a test.
#[derive(Clone, Copy, Debug)]
pub struct DoNotRetryPolicy;

impl RetryPolicy for DoNotRetryPolicy {
    fn should_retry(&self, _request_start_time: SystemTime, _n_past_retries: u32) -> RetryDecision {
        RetryDecision::DoNotRetry
    }
}

/// The default retry policy: exponential backoff capped at three attempts.
pub fn default_retry_policy() -> ExponentialBackoff {
    ExponentialBackoff::builder().build_with_max_retries(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_do_not_retry_policy() {
        assert!(matches!(
            DoNotRetryPolicy.should_retry(SystemTime::now(), 0),
            RetryDecision::DoNotRetry
        ));
    }
}
