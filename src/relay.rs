//! Relay scheduler.
//!
//! Periodically snapshots the packet window and posts it as one batch to
//! the ingestion service. Delivery is at-most-once per snapshot: a failed
//! tick is logged and the next tick tries again with whatever the window
//! then holds. Records evicted between ticks without being delivered are
//! lost.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::window::PacketWindow;

/// Default relay period.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(5);

/// Default timeout for one relay HTTP call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Result of a successful relay tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The window was empty; nothing was sent.
    Skipped,
    /// A batch of this many records was accepted.
    Delivered(usize),
}

/// Forwards window snapshots to the ingestion endpoint on a fixed period.
pub struct RelayScheduler {
    window: Arc<PacketWindow>,
    client: reqwest::Client,
    endpoint: String,
    period: Duration,
}

impl RelayScheduler {
    /// Create a scheduler posting to `endpoint` (the full `/save-packets` URL).
    pub fn new(
        window: Arc<PacketWindow>,
        endpoint: impl Into<String>,
        period: Duration,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            window,
            client,
            endpoint: endpoint.into(),
            period,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Snapshot the window and deliver it once. Never retries.
    pub async fn tick(&self) -> Result<RelayOutcome, RelayError> {
        let batch = self.window.snapshot();
        if batch.is_empty() {
            return Ok(RelayOutcome::Skipped);
        }

        let response = self.client.post(&self.endpoint).json(&batch).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Rejected {
                status: status.as_u16(),
            });
        }

        Ok(RelayOutcome::Delivered(batch.len()))
    }

    /// Run ticks every period until `shutdown` is cancelled.
    ///
    /// The first tick fires one full period after start. Errors are logged
    /// and never escape. An in-flight delivery is abandoned on shutdown.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = time::interval_at(time::Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Relaying to {} every {:?}", self.endpoint, self.period);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.tick() => match result {
                    Ok(RelayOutcome::Delivered(n)) => debug!("Relayed {} packets", n),
                    Ok(RelayOutcome::Skipped) => debug!("Window empty, nothing to relay"),
                    Err(e) => warn!("Relay to {} failed: {}", self.endpoint, e),
                },
            }
        }

        info!(
            "Relay scheduler stopped ({} packets evicted from window)",
            self.window.evicted()
        );
    }
}
