//! Exponential backoff with jitter, shared by every component that calls a
//! network backend (embedding, LLM, storage).
//!
//! Grounded on the `backoff` crate (stormasm-ioxnu22july/backoff): same
//! init/max/base shape, same
//! jittered-range-draw, retargeted here to retry any `AtlasError` the
//! caller marks retryable via [`AtlasError::is_retryable`].

use std::time::Duration;

use rand::Rng;

use crate::AtlasError;

/// Exponential backoff with jitter (AWS "full jitter" style).
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub init_backoff: Duration,
    pub max_backoff: Duration,
    pub base: f64,
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            init_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            base: 2.0,
            max_retries: 5,
        }
    }
}

struct Backoff {
    next_backoff_secs: f64,
    config: BackoffConfig,
}

impl Backoff {
    fn new(config: BackoffConfig) -> Self {
        let next_backoff_secs = config.init_backoff.as_secs_f64();
        Self {
            next_backoff_secs,
            config,
        }
    }

    fn next(&mut self) -> Duration {
        let lo = self.config.init_backoff.as_secs_f64();
        let hi = (self.next_backoff_secs * self.config.base).max(lo + f64::EPSILON);
        let drawn = rand::thread_rng().gen_range(lo..hi);
        let capped = self.config.max_backoff.as_secs_f64().min(drawn);
        let previous = std::mem::replace(&mut self.next_backoff_secs, capped);
        Duration::from_secs_f64(previous)
    }
}

/// Retry `op` while it returns a retryable [`AtlasError`], up to
/// `config.max_retries` attempts, sleeping with jittered exponential backoff
/// between attempts. Non-retryable errors are returned immediately.
pub async fn retry_with_backoff<T, F, Fut>(
    config: BackoffConfig,
    task_name: &str,
    mut op: F,
) -> Result<T, AtlasError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, AtlasError>>,
{
    let max_retries = config.max_retries;
    let mut backoff = Backoff::new(config);

    for attempt in 0..=max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_retries => {
                let wait = backoff.next();
                tracing::warn!(
                    task = task_name,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    error = %err,
                    "retrying after backend error"
                );
                tokio::time::sleep(wait).await;
            }
            Err(err) => return Err(err),
        }
    }
    unreachable!("loop always returns within max_retries + 1 iterations")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let config = BackoffConfig {
            init_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            base: 2.0,
            max_retries: 5,
        };
        let result: Result<u32, AtlasError> = retry_with_backoff(config, "test", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AtlasError::BackendUnavailable("not yet".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, AtlasError> =
            retry_with_backoff(BackoffConfig::default(), "test", || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(AtlasError::BackendFatal("auth failed".into())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let attempts = AtomicU32::new(0);
        let config = BackoffConfig {
            init_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            base: 2.0,
            max_retries: 2,
        };
        let result: Result<u32, AtlasError> = retry_with_backoff(config, "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(AtlasError::BackendUnavailable("down".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
