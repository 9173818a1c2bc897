//! Simulated wireless scanner.
//!
//! Stands in for a paired hardware scanner: emits `BT-` codes at random
//! intervals through the same debounce path as real captures.

use std::ops::RangeInclusive;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::emitter::ScanEmitter;
use crate::error::{CaptureError, CaptureResult};

const CODE_PREFIX: &str = "BT-";
const CODE_RANGE: RangeInclusive<u32> = 100_000..=999_999;

/// Random-interval scan generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedScanner {
    min_interval: Duration,
    max_interval: Duration,
}

impl Default for SimulatedScanner {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(5))
    }
}

impl SimulatedScanner {
    /// Scanner emitting every `min_interval..=max_interval`.
    #[must_use]
    pub fn new(min_interval: Duration, max_interval: Duration) -> Self {
        Self {
            min_interval: min_interval.min(max_interval),
            max_interval: max_interval.max(min_interval),
        }
    }

    /// Generate scans until `cancel` fires or the channel closes.
    ///
    /// # Errors
    ///
    /// Propagates emitter failures other than a closed channel.
    pub async fn run(self, mut emitter: ScanEmitter, cancel: CancellationToken) -> CaptureResult<()> {
        info!("simulated scanner started");
        loop {
            let (delay, code) = self.next_scan();
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
            match emitter.offer(&code).await {
                Ok(outcome) => debug!(code = %code, ?outcome, "simulated scan offered"),
                Err(CaptureError::ChannelClosed) => {
                    info!("capture channel closed; simulated scanner stopping");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
        info!("simulated scanner stopped");
        Ok(())
    }

    fn next_scan(&self) -> (Duration, String) {
        let mut rng = rand::rng();
        let min = u64::try_from(self.min_interval.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max_interval.as_millis()).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(rng.random_range(min..=max));
        let code = format!("{CODE_PREFIX}{}", rng.random_range(CODE_RANGE));
        (delay, code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CapturedScan;
    use devicehub_config::LiveConfig;
    use devicehub_telemetry::Metrics;
    use tokio::sync::mpsc;

    #[test]
    fn codes_and_delays_stay_in_range() {
        let scanner = SimulatedScanner::default();
        for _ in 0..200 {
            let (delay, code) = scanner.next_scan();
            assert!((Duration::from_secs(2)..=Duration::from_secs(5)).contains(&delay));
            let digits = code.strip_prefix(CODE_PREFIX).unwrap_or_default();
            assert_eq!(digits.len(), 6);
            assert!(digits.parse::<u32>().is_ok_and(|value| CODE_RANGE.contains(&value)));
        }
    }

    #[test]
    fn inverted_bounds_are_normalised() {
        let scanner = SimulatedScanner::new(Duration::from_secs(5), Duration::from_secs(2));
        assert_eq!(scanner.min_interval, Duration::from_secs(2));
        assert_eq!(scanner.max_interval, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn emits_until_cancelled() -> anyhow::Result<()> {
        let (sender, mut receiver) = mpsc::channel::<CapturedScan>(8);
        let emitter = ScanEmitter::new("Device-001", LiveConfig::default(), sender, Metrics::new()?);
        let cancel = CancellationToken::new();
        let scanner = SimulatedScanner::new(Duration::from_millis(1), Duration::from_millis(5));
        let task = tokio::spawn(scanner.run(emitter, cancel.clone()));

        let scan = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await?
            .ok_or_else(|| anyhow::anyhow!("scanner closed without emitting"))?;
        assert!(scan.raw_data.starts_with(CODE_PREFIX));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task).await???;
        Ok(())
    }
}
