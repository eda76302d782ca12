// ── Staleness monitor ──
//
// While a session runs, the selected tag is demoted to the RSSI floor
// once it has been silent for the workflow's timeout, so proximity
// readouts show signal loss instead of the last good value.

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Engine;

pub(super) async fn sweep_task(engine: Engine, cancel: CancellationToken) {
    let config = &engine.inner.config;
    let mut interval = tokio::time::interval(config.sweep_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let timeout = engine
                    .inner
                    .store
                    .policy()
                    .workflow
                    .staleness_timeout(config.locate_timeout, config.monitor_timeout);
                if let Some(tag) = engine.inner.store.sweep(Instant::now(), timeout) {
                    debug!(epc = %tag.epc, "selected tag went silent");
                }
            }
        }
    }
    debug!("staleness monitor stopped");
}
