//! Shared duration defaults and timeout wrappers.

use std::future::Future;
use std::time::Duration;

use crate::error::{AvlError, Result};

/// Default idle read timeout for a device session. Trackers in deep sleep
/// can legitimately go quiet for minutes.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// How long a graceful shutdown waits for sessions to drain.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-device reassembly buffer cap (10 MB).
pub const DEFAULT_BUFFER_CAP: usize = 10 * 1024 * 1024;

/// Await `future`, mapping expiry to [`AvlError::ConnectionTimeout`].
pub async fn with_idle_timeout<F, T>(limit: Duration, future: F) -> Result<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(AvlError::ConnectionTimeout),
    }
}
