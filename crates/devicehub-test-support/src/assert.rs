//! Polling assertions for asynchronous tests.

use std::future::Future;
use std::time::Duration;

use anyhow::{Result, bail};

/// Default deadline for [`eventually`].
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// Poll `check` every 20 ms until it returns `true` or `deadline` passes.
///
/// # Errors
///
/// Returns an error naming `what` when the deadline passes, or the first error
/// returned by `check`.
pub async fn eventually<F, Fut>(what: &str, deadline: Duration, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let started = tokio::time::Instant::now();
    loop {
        if check().await? {
            return Ok(());
        }
        if started.elapsed() >= deadline {
            bail!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
