// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded exponential backoff with jitter.
//
// Consumed by the spooler and directory clients around their network
// calls; the strategy itself never talks to either.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use spoolsync_core::error::{Error, Result};

/// A bounded-exponential-backoff-with-jitter executor.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    /// First backoff; doubles on every subsequent attempt.
    pub initial: Duration,
    /// Total number of attempts before the last error is returned.
    pub max_retries: u32,
    /// Upper bound on the (pre-jitter) backoff.
    pub max_backoff: Duration,
    /// Jitter is drawn uniformly from `[0, max_jitter)`.
    pub max_jitter: Duration,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max_retries: 5,
            max_backoff: Duration::from_secs(10),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryStrategy {
    /// Run `op` until it succeeds or the retry budget is exhausted,
    /// treating every error as retryable.
    pub async fn run<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_when(|_| true, op).await
    }

    /// Run `op` until it succeeds, the retry budget is exhausted (last
    /// error is returned), or `retryable` returns false for an error
    /// (that error is returned immediately, no further attempts).
    pub async fn run_when<T, C, F, Fut>(&self, retryable: C, mut op: F) -> Result<T>
    where
        C: Fn(&Error) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_retries.max(1);
        let mut backoff = self.initial;

        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt == attempts || !retryable(&err) {
                        return Err(err);
                    }
                    let delay = backoff.min(self.max_backoff) + self.jitter();
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
                    tokio::time::sleep(delay).await;
                    backoff = backoff.saturating_mul(2);
                }
            }
        }
        unreachable!("loop returns on the final attempt")
    }

    fn jitter(&self) -> Duration {
        let bound = self.max_jitter.as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..bound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryStrategy {
        RetryStrategy {
            initial: Duration::from_millis(1),
            max_retries: 3,
            max_backoff: Duration::from_millis(2),
            max_jitter: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = fast()
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 { Err(Error::Spooler("flaky".into())) } else { Ok(n) }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast()
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(Error::Spooler(format!("attempt {n}"))) }
            })
            .await;
        assert!(result.unwrap_err().to_string().contains("attempt 2"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast()
            .run_when(
                |e| !matches!(e, Error::NoDestinations),
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(Error::NoDestinations) }
                },
            )
            .await;
        assert!(matches!(result.unwrap_err(), Error::NoDestinations));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_then_caps_at_max_backoff() {
        let strategy = RetryStrategy {
            initial: Duration::from_secs(1),
            max_retries: 6,
            max_backoff: Duration::from_secs(4),
            max_jitter: Duration::ZERO,
        };
        let instants = std::sync::Mutex::new(Vec::new());
        let result: Result<()> = strategy
            .run(|| {
                instants.lock().unwrap().push(tokio::time::Instant::now());
                async { Err(Error::Spooler("always".into())) }
            })
            .await;
        assert!(result.is_err());

        // Uncapped the delays would be 1, 2, 4, 8, 16.
        let instants = instants.into_inner().unwrap();
        let gaps: Vec<u64> =
            instants.windows(2).map(|w| (w[1] - w[0]).as_secs()).collect();
        assert_eq!(gaps, vec![1, 2, 4, 4, 4]);
    }

    #[tokio::test]
    async fn zero_jitter_is_allowed() {
        let strategy = RetryStrategy { max_jitter: Duration::ZERO, ..fast() };
        let calls = AtomicU32::new(0);
        let result = strategy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 { Err(Error::Spooler("once".into())) } else { Ok(()) }
                }
            })
            .await;
        assert!(result.is_ok());
    }
}
