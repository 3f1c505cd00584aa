//! Retry utilities: backoff builders and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::interfaces::BusError;

/// Backoff for publish retries after a committed write.
///
/// - Min delay: 50ms
/// - Max delay: 2s
/// - Max attempts: `retries`
/// - Jitter enabled
///
/// The caller bounds the whole sequence with the publish timeout.
pub fn publish_backoff(retries: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(retries)
        .with_jitter()
}

/// Determines if a publish error may succeed on retry.
///
/// Non-retryable:
/// - `Encode`: the payload will never serialize
/// - `Closed`: the bus is shutting down
pub fn is_retryable_publish(error: &BusError) -> bool {
    matches!(
        error,
        BusError::Connection(_) | BusError::Publish(_) | BusError::Timeout(_)
    )
}
