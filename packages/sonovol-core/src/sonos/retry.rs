//! Caller-side retry for transient SOAP failures.
//!
//! The SOAP layer never retries on its own. Commands whose ordering matters
//! (grouping) opt in here so a momentary 701 "transition not available" does
//! not abort a multi-speaker operation.

use std::time::Duration;

use crate::error::SoapResult;

/// Backoff schedule for transient errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    /// Creates a policy that sleeps for each delay in turn between attempts.
    #[must_use]
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }

    /// Total number of attempts, including the first.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.delays.len() + 1
    }

    /// Runs `operation`, retrying while it fails with a transient error.
    ///
    /// Non-transient errors are returned immediately.
    pub async fn run<T, F, Fut>(&self, action: &str, mut operation: F) -> SoapResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = SoapResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(r) => return Ok(r),
                Err(e) if e.is_transient() && attempt < self.delays.len() => {
                    let delay = self.delays[attempt];
                    attempt += 1;
                    log::warn!(
                        "[Retry] {} transient error: {} (attempt {}/{}, next in {:?})",
                        action,
                        e,
                        attempt,
                        self.attempts(),
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    /// 200ms, 500ms, 1s.
    fn default() -> Self {
        Self::new(vec![
            Duration::from_millis(200),
            Duration::from_millis(500),
            Duration::from_millis(1000),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sonos::soap::SoapError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_transient_faults_until_success() {
        let calls = AtomicUsize::new(0);
        let result = RetryPolicy::default()
            .run("SetAVTransportURI", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SoapError::Fault("UPnPError (701)".into()))
                } else {
                    Ok("ok")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_schedule_is_exhausted() {
        let calls = AtomicUsize::new(0);
        let result: SoapResult<()> = RetryPolicy::default()
            .run("Play", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SoapError::Timeout)
            })
            .await;
        assert!(matches!(result, Err(SoapError::Timeout)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: SoapResult<()> = RetryPolicy::default()
            .run("GetVolume", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SoapError::HttpStatus(404, String::new()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
