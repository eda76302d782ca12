// ── Classification pipeline ──
//
// Consumes raw read batches and routes each batch through the tag store.
// First sightings spawn a lookup; the result goes straight back into the
// store, which drops it if the session was cleared in the meantime.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Engine;
use crate::classify;
use crate::model::{FeedbackEvent, RawRead, ScanPolicy};
use crate::store::{Applied, Observed};

pub(super) async fn pipeline_task(
    engine: Engine,
    mut raw_rx: broadcast::Receiver<Arc<Vec<RawRead>>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            batch = raw_rx.recv() => match batch {
                Ok(reads) => engine.route_batch(&reads),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "classification pipeline lagged, reads dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
    debug!("classification pipeline stopped");
}

impl Engine {
    fn route_batch(&self, reads: &[RawRead]) {
        let observed = self
            .inner
            .store
            .observe_batch(reads, Instant::now(), Utc::now());
        for (read, outcome) in reads.iter().zip(observed) {
            match outcome {
                Observed::NeedsLookup { epoch, policy } => {
                    let engine = self.clone();
                    let epc = read.epc.clone();
                    tokio::spawn(async move { engine.resolve(epc, epoch, policy).await });
                }
                Observed::Ignored | Observed::Rejected | Observed::Updated | Observed::Pending => {}
            }
        }
    }

    /// Classify one EPC and apply the result. Outlives the connection so
    /// pending reads are always settled.
    async fn resolve(&self, epc: String, epoch: u64, policy: ScanPolicy) {
        let lookup = Arc::clone(&self.inner.lookup);
        let timeout = self.inner.config.lookup_timeout;

        let decision = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => return,
            decision = classify::classify(lookup.as_ref(), &policy, &epc, timeout) => decision,
        };

        match self.inner.store.apply_decision(epoch, decision) {
            Applied::Inserted(tag) => {
                debug!(epc = %tag.epc, rssi = tag.rssi, "new tag matched");
                self.emit(FeedbackEvent::NewTagMatched { epc: tag.epc.clone() });
            }
            Applied::Rejected => debug!(%epc, "tag rejected"),
            Applied::Stale => debug!(%epc, "discarding decision from a cleared session"),
        }
    }
}
