use std::future::Future;
use std::time::Duration;

use log::warn;

/// Attempts made for a throttled write before giving up.
pub const MAX_WRITE_ATTEMPTS: u32 = 5;

/// Run `op` until it succeeds, fails with a non-retryable error, or
/// `MAX_WRITE_ATTEMPTS` is reached. The wait before retry `n` is `base * 2^n`.
pub async fn with_backoff<T, E, F, Fut, R>(label: &str, base: Duration, mut op: F, is_retryable: R) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < MAX_WRITE_ATTEMPTS && is_retryable(&e) => {
                let delay = base * 2u32.pow(attempt);
                warn!(
                    "{} throttled (attempt {}/{}), retrying in {:?}: {}",
                    label,
                    attempt + 1,
                    MAX_WRITE_ATTEMPTS,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
