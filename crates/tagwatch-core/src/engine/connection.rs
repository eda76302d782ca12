// ── Connection state machine ──
//
// DISCONNECTED -> CONNECTING -> CONNECTED | ERROR. Connecting walks the
// paired devices, retries discovery with a driver re-initialization
// before the last attempt, opens the session, installs the event
// listener, and pushes the radio settings. Only connection failures are
// surfaced to the caller, as an ERROR state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ingest::EventBridge;
use super::{ConnectionState, Engine, ReaderHandle, pipeline, status};
use crate::driver::{DeviceInfo, ReaderEvents, ReaderSession, run_blocking};
use crate::error::CoreError;
use crate::model::FeedbackEvent;

impl Engine {
    /// Connect to a reader, preferring `preferred` (name or address).
    ///
    /// Never fails: the outcome is the returned (and published) state.
    /// Calling it while connected re-installs the event listener and
    /// returns `Connected`.
    pub async fn connect(&self, preferred: Option<&str>) -> ConnectionState {
        let _attempt = self.inner.connect_lock.lock().await;
        if self.inner.cancel.is_cancelled() {
            return ConnectionState::Disconnected;
        }

        if let Some(session) = self.reader_session().await {
            if session.is_connected() {
                debug!("reader already connected, re-installing event listener");
                if let Err(e) = self.install_listener(&session).await {
                    warn!(error = %e, "failed to re-install reader event listener");
                }
                self.set_state(ConnectionState::Connected);
                return ConnectionState::Connected;
            }
            info!("reader link lost, reconnecting");
            self.disconnect().await;
        }

        let cancel = self.connection_token().await;
        self.set_state(ConnectionState::Connecting);

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(CoreError::Shutdown),
            result = self.establish(preferred) => result,
        };

        match result {
            Ok(handle) => self.commit(handle, &cancel).await,
            Err(CoreError::Shutdown) => {
                debug!("connection attempt cancelled");
                self.set_state(ConnectionState::Disconnected);
                ConnectionState::Disconnected
            }
            Err(e) => {
                warn!(error = %e, "reader connection failed");
                let state = ConnectionState::Error {
                    message: e.to_string(),
                };
                self.set_state(state.clone());
                state
            }
        }
    }

    /// Release the reader. Safe from any state, including mid-connect.
    ///
    /// Stops the scan session, cancels connection tasks, and emits
    /// `DisconnectConfirmed` only if a reader was actually open.
    pub async fn disconnect(&self) {
        // Cancel the child token (not the parent, so reconnect works).
        self.inner.cancel_child.lock().await.cancel();
        self.stop_session().await;

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        let handle = {
            let mut reader = self.inner.reader.lock().await;
            let handle = reader.take();
            self.set_state(ConnectionState::Disconnected);
            handle
        };

        let Some(ReaderHandle { session, device }) = handle else {
            debug!("disconnect with no open reader");
            return;
        };

        let result = run_blocking(self.inner.config.driver_call_timeout, move || {
            if let Err(e) = session.remove_listener() {
                debug!(error = %e, "failed to remove reader event listener");
            }
            session.disconnect()
        })
        .await;
        if let Err(e) = result {
            warn!(error = %e, "reader disconnect failed (non-fatal)");
        }

        info!(device = %device.name, "reader disconnected");
        self.emit(FeedbackEvent::DisconnectConfirmed);
    }

    /// Whether a reader is open and its link is up.
    pub async fn is_connected(&self) -> bool {
        self.reader_session()
            .await
            .is_some_and(|session| session.is_connected())
    }

    /// The device the engine is connected to.
    pub async fn connected_device(&self) -> Option<DeviceInfo> {
        self.inner
            .reader
            .lock()
            .await
            .as_ref()
            .map(|handle| handle.device.clone())
    }

    // ── Private helpers ──────────────────────────────────────────

    /// The live connection token, replaced if a disconnect cancelled it.
    async fn connection_token(&self) -> CancellationToken {
        let mut child = self.inner.cancel_child.lock().await;
        if child.is_cancelled() {
            *child = self.inner.cancel.child_token();
        }
        child.clone()
    }

    /// Publish a freshly opened reader unless a disconnect raced us.
    async fn commit(&self, handle: ReaderHandle, cancel: &CancellationToken) -> ConnectionState {
        let device = handle.device.name.clone();
        {
            let mut reader = self.inner.reader.lock().await;
            if cancel.is_cancelled() {
                drop(reader);
                debug!("disconnect requested during connect, closing reader");
                let session = handle.session;
                let _ = run_blocking(self.inner.config.driver_call_timeout, move || {
                    session.disconnect()
                })
                .await;
                self.set_state(ConnectionState::Disconnected);
                return ConnectionState::Disconnected;
            }
            *reader = Some(handle);
            self.set_state(ConnectionState::Connected);
        }

        self.spawn_connection_tasks(cancel).await;
        info!(device = %device, "reader connected");
        self.emit(FeedbackEvent::ConnectConfirmed { device });
        ConnectionState::Connected
    }

    async fn establish(&self, preferred: Option<&str>) -> Result<ReaderHandle, CoreError> {
        let config = &self.inner.config;
        let timeout = config.driver_call_timeout;

        let driver = Arc::clone(&self.inner.driver);
        let paired = run_blocking(timeout, move || driver.paired_devices()).await?;
        let candidates: Vec<DeviceInfo> = paired
            .into_iter()
            .filter(|device| device.matches_family(&config.device_name_filters))
            .collect();
        if candidates.is_empty() {
            return Err(CoreError::NoPairedReader {
                filters: config.device_name_filters.join(", "),
            });
        }
        debug!(count = candidates.len(), "found paired reader candidates");

        let available = self.discover_readers().await?;
        let wanted = preferred.or(config.preferred_device.as_deref());
        let device = pick_device(&available, &candidates, wanted)
            .ok_or(CoreError::ReaderUnavailable {
                attempts: config.connect_attempts,
            })?;
        debug!(device = %device.name, address = %device.address, "opening reader");

        let driver = Arc::clone(&self.inner.driver);
        let target = device.clone();
        let session = run_blocking(timeout, move || {
            let session = driver.open(&target)?;
            if !session.is_connected() {
                session.connect()?;
            }
            Ok(session)
        })
        .await
        .map_err(|e| CoreError::ConnectionFailed {
            device: device.name.clone(),
            reason: e.to_string(),
        })?;

        if let Err(e) = self.install_listener(&session).await {
            let opened = Arc::clone(&session);
            let _ = run_blocking(timeout, move || opened.disconnect()).await;
            return Err(CoreError::ConnectionFailed {
                device: device.name,
                reason: format!("event listener setup failed: {e}"),
            });
        }

        let settings = config.reader.clone();
        let configured = Arc::clone(&session);
        if let Err(e) = run_blocking(timeout, move || configured.configure(&settings)).await {
            warn!(error = %e, "reader configuration failed, continuing with reader defaults");
        }

        Ok(ReaderHandle { session, device })
    }

    /// Poll the driver for reachable readers, re-initializing it once
    /// discovery has come up empty `reinitialize_after` times.
    async fn discover_readers(&self) -> Result<Vec<DeviceInfo>, CoreError> {
        let config = &self.inner.config;
        let attempts = config.connect_attempts.max(1);

        for attempt in 1..=attempts {
            let driver = Arc::clone(&self.inner.driver);
            match run_blocking(config.driver_call_timeout, move || driver.available_readers()).await
            {
                Ok(readers) if !readers.is_empty() => return Ok(readers),
                Ok(_) => debug!(attempt, "no reader available yet"),
                Err(e) => warn!(attempt, error = %e, "reader discovery failed"),
            }

            if attempt == attempts {
                break;
            }
            if attempt == config.reinitialize_after {
                info!(attempt, "re-initializing reader driver");
                let driver = Arc::clone(&self.inner.driver);
                if let Err(e) =
                    run_blocking(config.driver_call_timeout, move || driver.reinitialize()).await
                {
                    warn!(error = %e, "driver re-initialization failed");
                }
            }
            tokio::time::sleep(config.connect_backoff).await;
        }

        Err(CoreError::ReaderUnavailable { attempts })
    }

    /// Install a fresh event listener, replacing any previous one.
    async fn install_listener(&self, session: &Arc<dyn ReaderSession>) -> Result<(), CoreError> {
        let bridge: Arc<dyn ReaderEvents> =
            Arc::new(EventBridge::new(self, self.inner.status_tx.clone()));
        let session = Arc::clone(session);
        run_blocking(self.inner.config.driver_call_timeout, move || {
            session.remove_listener()?;
            session.set_listener(bridge)
        })
        .await
    }

    async fn spawn_connection_tasks(&self, cancel: &CancellationToken) {
        // Trigger handling outlives individual connections.
        if let Some(status_rx) = self.inner.status_rx.lock().await.take() {
            let root = self.inner.cancel.clone();
            self.inner.background.lock().await.push(tokio::spawn(
                status::trigger_task(self.clone(), status_rx, root),
            ));
        }

        let raw_rx = self.inner.raw_tx.subscribe();
        self.inner
            .task_handles
            .lock()
            .await
            .push(tokio::spawn(pipeline::pipeline_task(
                self.clone(),
                raw_rx,
                cancel.clone(),
            )));
    }
}

/// Choose the reader to open: the preferred one if reachable, then a
/// reachable paired candidate, then whatever the driver offers first.
fn pick_device(
    available: &[DeviceInfo],
    candidates: &[DeviceInfo],
    preferred: Option<&str>,
) -> Option<DeviceInfo> {
    if let Some(wanted) = preferred {
        let found = available.iter().find(|device| {
            device.name.eq_ignore_ascii_case(wanted) || device.address.eq_ignore_ascii_case(wanted)
        });
        match found {
            Some(device) => return Some(device.clone()),
            None => warn!(preferred = wanted, "preferred reader not available"),
        }
    }

    available
        .iter()
        .find(|device| {
            candidates
                .iter()
                .any(|c| c.address == device.address || c.name == device.name)
        })
        .or_else(|| available.first())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev(name: &str, address: &str) -> DeviceInfo {
        DeviceInfo::new(name, address)
    }

    #[test]
    fn preferred_reader_wins() {
        let available = vec![dev("RFD40-A", "01"), dev("RFD40-B", "02")];
        let picked = pick_device(&available, &available, Some("rfd40-b"));
        assert_eq!(picked.map(|d| d.address), Some("02".to_string()));
    }

    #[test]
    fn falls_back_to_paired_candidate() {
        let available = vec![dev("Other", "09"), dev("RFD40-A", "01")];
        let candidates = vec![dev("RFD40-A", "01")];
        let picked = pick_device(&available, &candidates, Some("missing"));
        assert_eq!(picked.map(|d| d.address), Some("01".to_string()));
    }

    #[test]
    fn nothing_available_is_none() {
        assert!(pick_device(&[], &[dev("RFD40-A", "01")], None).is_none());
    }
}
