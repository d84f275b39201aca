use services::common::RepositoryError;

pub const MAX_ATTEMPTS: u32 = 3;
pub const INITIAL_BACKOFF_MS: u64 = 100;
pub const BACKOFF_MULTIPLIER: u64 = 2;

/// Transient failures worth another attempt on a fresh connection
pub fn is_retryable(err: &RepositoryError) -> bool {
    matches!(
        err,
        RepositoryError::TransactionConflict
            | RepositoryError::ConnectionFailed(_)
            | RepositoryError::PoolError(_)
    )
}

/// Retry a stand-alone database operation with exponential backoff.
///
/// The block must check out its own connection; never wrap statements that
/// run inside a unit of work, since a retried statement would land in an
/// aborted transaction.
#[macro_export]
macro_rules! retry_db {
    ($operation:expr, $block:block) => {{
        use std::time::{Duration, Instant};
        use $crate::repositories::retry::{
            is_retryable, BACKOFF_MULTIPLIER, INITIAL_BACKOFF_MS, MAX_ATTEMPTS,
        };

        let mut attempt = 0u32;
        let mut backoff_ms = INITIAL_BACKOFF_MS;
        let start = Instant::now();

        loop {
            attempt += 1;

            let result: Result<_, services::common::RepositoryError> = async $block.await;

            match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(
                            operation = $operation,
                            attempt = attempt,
                            duration_ms = start.elapsed().as_millis() as u64,
                            "Database operation succeeded after retry"
                        );
                    }
                    break Ok(value);
                }
                Err(err) if is_retryable(&err) && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(
                        operation = $operation,
                        attempt = attempt,
                        max_attempts = MAX_ATTEMPTS,
                        error = %err,
                        backoff_ms = backoff_ms,
                        "Database operation failed, retrying"
                    );

                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= BACKOFF_MULTIPLIER;
                }
                Err(err) => {
                    tracing::error!(
                        operation = $operation,
                        attempt = attempt,
                        duration_ms = start.elapsed().as_millis() as u64,
                        error = %err,
                        "Database operation failed permanently"
                    );
                    break Err(err);
                }
            }
        }
    }};
}
