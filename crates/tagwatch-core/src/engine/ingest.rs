// ── Tag ingestion ──
//
// Reads reach the engine two ways: the driver's read-ready callback
// triggers a large pull, and a short-cadence poll drains whatever the
// callback missed. Both publish into the raw read broadcast. A run of
// empty polls is treated as a stalled radio and the inventory is
// restarted. Nothing on this path fails loudly; errors are logged and
// the next tick tries again.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Engine, EngineInner};
use crate::config::EngineConfig;
use crate::driver::{ReaderEvents, ReaderSession, StatusEvent, run_blocking};
use crate::error::CoreError;
use crate::model::RawRead;

// ── Driver callbacks ─────────────────────────────────────────────

/// Listener handed to the driver. Runs on driver threads, so it only
/// hands work to the runtime and returns.
pub(super) struct EventBridge {
    engine: Weak<EngineInner>,
    runtime: Handle,
    status_tx: mpsc::UnboundedSender<StatusEvent>,
}

impl EventBridge {
    /// Must be called from within the runtime.
    pub(super) fn new(engine: &Engine, status_tx: mpsc::UnboundedSender<StatusEvent>) -> Self {
        Self {
            engine: Arc::downgrade(&engine.inner),
            runtime: Handle::current(),
            status_tx,
        }
    }
}

impl ReaderEvents for EventBridge {
    fn on_read_ready(&self) {
        let Some(inner) = self.engine.upgrade() else {
            return;
        };
        let engine = Engine { inner };
        self.runtime.spawn(async move {
            let batch = engine.inner.config.event_batch_size;
            engine.pull_and_publish(batch).await;
        });
    }

    fn on_status(&self, event: StatusEvent) {
        match event {
            StatusEvent::Trigger { .. } => {
                // Closed only after shutdown.
                let _ = self.status_tx.send(event);
            }
            StatusEvent::Other { description } => {
                debug!(%description, "reader status event");
            }
        }
    }
}

// ── Publishing ───────────────────────────────────────────────────

impl Engine {
    /// Drain up to `max` reads from the open reader and publish them.
    async fn pull_and_publish(&self, max: usize) {
        let Some(reader) = self.reader_session().await else {
            return;
        };
        match pull_batch(&reader, max, self.inner.config.pull_timeout).await {
            Ok(reads) => {
                self.publish_reads(reads);
            }
            Err(e) => debug!(error = %e, "event-driven read failed"),
        }
    }

    /// Filter and broadcast one batch. Returns how many reads went out.
    pub(super) fn publish_reads(&self, reads: Vec<RawRead>) -> usize {
        let filter = &self.inner.config.ingest_filter;
        let reads: Vec<RawRead> = reads
            .into_iter()
            .filter(|read| filter.allows(&read.epc, read.rssi))
            .collect();
        if reads.is_empty() {
            return 0;
        }
        let count = reads.len();
        // No receivers just means nobody is listening yet.
        let _ = self.inner.raw_tx.send(Arc::new(reads));
        count
    }
}

async fn pull_batch(
    reader: &Arc<dyn ReaderSession>,
    max: usize,
    timeout: Duration,
) -> Result<Vec<RawRead>, CoreError> {
    let reader = Arc::clone(reader);
    run_blocking(timeout, move || reader.read_tags(max)).await
}

// ── Stall detection ──────────────────────────────────────────────

/// Counts consecutive empty polls.
#[derive(Debug)]
pub(super) struct StallDetector {
    threshold: u32,
    empty: u32,
}

impl StallDetector {
    pub(super) fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            empty: 0,
        }
    }

    /// Record one poll; returns `true` when the reader should be restarted.
    pub(super) fn record(&mut self, received: usize) -> bool {
        if received > 0 {
            self.empty = 0;
            return false;
        }
        self.empty += 1;
        if self.empty >= self.threshold {
            self.empty = 0;
            return true;
        }
        false
    }
}

// ── Background tasks ─────────────────────────────────────────────

pub(super) async fn poll_task(
    engine: Engine,
    reader: Arc<dyn ReaderSession>,
    cancel: CancellationToken,
) {
    let config = &engine.inner.config;
    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stall = StallDetector::new(config.stall_threshold);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match pull_batch(&reader, config.poll_batch_size, config.pull_timeout).await {
                    Ok(reads) => {
                        let received = reads.len();
                        engine.publish_reads(reads);
                        if stall.record(received) {
                            info!(
                                empty_polls = config.stall_threshold,
                                "no reads for a while, restarting inventory"
                            );
                            restart_inventory(&reader, config).await;
                        }
                    }
                    Err(e) => debug!(error = %e, "poll read failed"),
                }
            }
        }
    }
    debug!("poll task stopped");
}

/// Stop, pause, purge, start. Each step is best effort.
async fn restart_inventory(reader: &Arc<dyn ReaderSession>, config: &EngineConfig) {
    let timeout = config.driver_call_timeout;

    let stopping = Arc::clone(reader);
    if let Err(e) = run_blocking(timeout, move || stopping.stop_inventory()).await {
        debug!(error = %e, "stop during restart failed");
    }
    tokio::time::sleep(config.stall_restart_pause).await;

    let starting = Arc::clone(reader);
    let result = run_blocking(timeout, move || {
        starting.purge_tags()?;
        starting.start_inventory()
    })
    .await;
    if let Err(e) = result {
        warn!(error = %e, "failed to restart inventory");
    }
}
