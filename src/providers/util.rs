use crate::core::error::UpdateError;
use anyhow::Error;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// # Returns
/// Either the successful result or the error after all attempts
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await.map_err(anyhow::Error::from) {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// Runs `operation` with a deadline. An expired deadline is reported with the
/// error built by `on_timeout`.
pub async fn with_deadline<Fut, T>(
    deadline: Duration,
    operation: Fut,
    on_timeout: impl FnOnce() -> UpdateError,
) -> Result<T, UpdateError>
where
    Fut: Future<Output = Result<T, UpdateError>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result,
        Err(_) => {
            debug!(?deadline, "Operation timed out");
            Err(on_timeout())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_deadline_passes_result_through() {
        let result = with_deadline(
            Duration::from_secs(1),
            async { Ok::<_, UpdateError>(42) },
            || UpdateError::Storage("timeout".to_string()),
        )
        .await;
        assert_eq!(result.unwrap(), 42);

        let result: Result<(), _> = with_deadline(
            Duration::from_secs(1),
            async { Err(UpdateError::Parse("bad".to_string())) },
            || UpdateError::Storage("timeout".to_string()),
        )
        .await;
        assert!(matches!(result, Err(UpdateError::Parse(_))));
    }

    #[tokio::test]
    async fn test_with_deadline_maps_timeout() {
        let result: Result<(), _> = with_deadline(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            || UpdateError::SourceUnavailable("timed out".to_string()),
        )
        .await;
        assert!(matches!(result, Err(UpdateError::SourceUnavailable(_))));
    }
}
