// ── Trigger handling ──
//
// Turns the reader's trigger press/release events into one scan toggle
// per release. Runs for the life of the engine so the status channel
// never needs to be rebuilt across reconnects.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Engine;
use crate::driver::StatusEvent;
use crate::trigger::TriggerEdgeDetector;

pub(super) async fn trigger_task(
    engine: Engine,
    mut status_rx: mpsc::UnboundedReceiver<StatusEvent>,
    cancel: CancellationToken,
) {
    let mut detector = TriggerEdgeDetector::new();

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = status_rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let StatusEvent::Trigger { pressed } = event else {
            continue;
        };
        engine.inner.trigger_pressed.send_replace(pressed);

        let Some(toggle) = detector.feed(pressed) else {
            continue;
        };
        debug!("trigger released");
        let _ = engine.inner.toggle_tx.send(toggle);

        if engine.inner.config.trigger_toggles_scan {
            match engine.toggle_session().await {
                Ok(scanning) => debug!(scanning, "scan toggled by trigger"),
                Err(e) => warn!(error = %e, "trigger could not toggle scanning"),
            }
        }
    }
    debug!("trigger task stopped");
}
