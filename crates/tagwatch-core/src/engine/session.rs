// ── Scan sessions ──
//
// A session is one inventory run: the reader is purged and started,
// and the poll and staleness tasks run until the session stops or the
// connection goes away. Tags accumulated in the store survive a
// stop/start; `clear_session` and policy changes reset them.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Engine, ingest, staleness};
use crate::driver::run_blocking;
use crate::error::CoreError;

/// Tasks belonging to the running session.
pub(super) struct ScanSession {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Start inventory. A no-op if a session is already running.
    pub async fn start_session(&self) -> Result<(), CoreError> {
        let mut active = self.inner.session.lock().await;
        if active.is_some() {
            debug!("scan session already running");
            return Ok(());
        }

        let reader = self
            .reader_session()
            .await
            .filter(|session| session.is_connected())
            .ok_or(CoreError::NotConnected)?;

        let starting = Arc::clone(&reader);
        let started = run_blocking(self.inner.config.driver_call_timeout, move || {
            starting.purge_tags()?;
            starting.start_inventory()
        })
        .await;
        if let Err(e) = started {
            // The poll task's stall recovery retries the start.
            warn!(error = %e, "failed to start inventory");
        }

        let cancel = self.inner.cancel_child.lock().await.child_token();
        let handles = vec![
            tokio::spawn(ingest::poll_task(
                self.clone(),
                Arc::clone(&reader),
                cancel.clone(),
            )),
            tokio::spawn(staleness::sweep_task(self.clone(), cancel.clone())),
        ];
        *active = Some(ScanSession { cancel, handles });

        self.inner.scanning.send_replace(true);
        info!("scan session started");
        Ok(())
    }

    /// Stop inventory and the session tasks. Idempotent.
    pub async fn stop_session(&self) {
        let mut active = self.inner.session.lock().await;
        let Some(session) = active.take() else {
            return;
        };

        session.cancel.cancel();
        for handle in session.handles {
            let _ = handle.await;
        }

        if let Some(reader) = self.reader_session().await {
            let result = run_blocking(self.inner.config.driver_call_timeout, move || {
                reader.stop_inventory()
            })
            .await;
            if let Err(e) = result {
                warn!(error = %e, "failed to stop inventory (non-fatal)");
            }
        }

        self.inner.scanning.send_replace(false);
        info!("scan session stopped");
    }

    /// Start if stopped, stop if running. Returns whether a session is
    /// running afterwards.
    pub async fn toggle_session(&self) -> Result<bool, CoreError> {
        if self.is_scanning() {
            self.stop_session().await;
            Ok(false)
        } else {
            self.start_session().await?;
            Ok(true)
        }
    }

    /// Drop every tag and cached decision, and purge the reader buffer.
    pub async fn clear_session(&self) {
        self.inner.store.clear();
        if let Some(reader) = self.reader_session().await {
            let result = run_blocking(self.inner.config.driver_call_timeout, move || {
                reader.purge_tags()
            })
            .await;
            if let Err(e) = result {
                debug!(error = %e, "failed to purge reader buffer");
            }
        }
        debug!("scan session cleared");
    }
}
