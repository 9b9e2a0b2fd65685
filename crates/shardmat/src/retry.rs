//! Bounded retries for store reads

use std::future::Future;

use tracing::warn;

use crate::config::ReadConfig;
use crate::error::{MatrixError, MatrixResult};

/// Run a store read under `policy`, retrying failures with linear backoff
///
/// A missing object is an answer, not a failure: it is returned at once as
/// [`MatrixError::Store`] so callers can branch on `is_not_found`. Any other
/// error still present after `max_attempts` tries becomes
/// [`MatrixError::RemoteRead`] labelled with `target`.
pub(crate) async fn read_with_retry<R, F, Fut>(
    policy: &ReadConfig,
    target: &str,
    op: F,
) -> MatrixResult<R>
where
    F: Fn() -> Fut,
    Fut: Future<Output = shardmat_store::Result<R>>,
{
    let attempts = policy.max_attempts;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_not_found() => return Err(MatrixError::Store(e)),
            Err(source) if attempt >= attempts => {
                return Err(MatrixError::RemoteRead {
                    key: target.to_string(),
                    attempts,
                    source,
                })
            }
            Err(e) => {
                warn!(object = target, attempt, max_attempts = attempts, error = %e, "Read failed, retrying");
                tokio::time::sleep(policy.backoff(attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> ReadConfig {
        ReadConfig {
            max_attempts: 4,
            backoff_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_recovers_within_budget() {
        let calls = &AtomicU32::new(0);
        let value = read_with_retry(&policy(), "b/k", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(io::Error::new(io::ErrorKind::TimedOut, "slow").into())
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_gives_up_with_target() {
        let calls = &AtomicU32::new(0);
        let result: MatrixResult<()> = read_with_retry(&policy(), "b/objects/m/", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::new(io::ErrorKind::TimedOut, "down").into())
        })
        .await;

        match result {
            Err(MatrixError::RemoteRead { key, attempts, .. }) => {
                assert_eq!(key, "b/objects/m/");
                assert_eq!(attempts, 4);
            }
            other => panic!("expected RemoteRead, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: MatrixResult<()> = read_with_retry(&policy(), "b/k", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(shardmat_store::Error::NotFound("b/k".to_string()))
        })
        .await;

        assert!(matches!(result, Err(MatrixError::Store(ref e)) if e.is_not_found()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
