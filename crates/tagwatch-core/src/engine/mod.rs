// ── Engine abstraction ──
//
// Full lifecycle management for one RFID reader: connection state
// machine, scan sessions, the classification pipeline, and the reactive
// tag store consumers render from.

mod connection;
mod ingest;
mod pipeline;
mod session;
mod staleness;
mod status;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::classify;
use crate::config::EngineConfig;
use crate::driver::{DeviceInfo, ReaderDriver, ReaderSession, StatusEvent};
use crate::error::CoreError;
use crate::lookup::LookupService;
use crate::model::{
    FeedbackEvent, Product, RawRead, ReadingMode, Registration, ScanPolicy, ScanToggle,
    TagObservation, Workflow,
};
use crate::store::TagStore;
use crate::stream::{TagSnapshot, TagStream};

use session::ScanSession;

const FEEDBACK_CHANNEL_SIZE: usize = 64;
const TOGGLE_CHANNEL_SIZE: usize = 16;

// ── ConnectionState ──────────────────────────────────────────────

/// Reader connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error { message: String },
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Error { message } => write!(f, "error: {message}"),
        }
    }
}

/// The open reader connection. At most one exists at a time.
struct ReaderHandle {
    session: Arc<dyn ReaderSession>,
    device: DeviceInfo,
}

// ── Engine ───────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<EngineInner>`. Commands are async methods;
/// state is exposed through `watch`/`broadcast` subscriptions and the
/// [`TagStore`]. Call [`shutdown()`](Self::shutdown) to stop every task.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    driver: Arc<dyn ReaderDriver>,
    lookup: Arc<dyn LookupService>,
    store: Arc<TagStore>,
    connection_state: watch::Sender<ConnectionState>,
    scanning: watch::Sender<bool>,
    trigger_pressed: watch::Sender<bool>,
    /// Raw reads after ingest filtering; lagging receivers lose the
    /// oldest batches.
    raw_tx: broadcast::Sender<Arc<Vec<RawRead>>>,
    feedback_tx: broadcast::Sender<FeedbackEvent>,
    toggle_tx: broadcast::Sender<ScanToggle>,
    /// Status events from the driver thread, consumed by the trigger task.
    status_tx: mpsc::UnboundedSender<StatusEvent>,
    status_rx: Mutex<Option<mpsc::UnboundedReceiver<StatusEvent>>>,
    cancel: CancellationToken,
    /// Child token for the current connection, cancelled on disconnect and
    /// replaced on the next connect.
    cancel_child: Mutex<CancellationToken>,
    reader: Mutex<Option<ReaderHandle>>,
    /// Serializes connect attempts.
    connect_lock: Mutex<()>,
    session: Mutex<Option<ScanSession>>,
    /// Connection-scoped tasks, joined on disconnect.
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    /// Engine-lifetime tasks, joined on shutdown.
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Create an engine. Does NOT connect; call [`connect()`](Self::connect).
    pub fn new(
        config: EngineConfig,
        driver: Arc<dyn ReaderDriver>,
        lookup: Arc<dyn LookupService>,
    ) -> Self {
        let store = Arc::new(TagStore::new(ScanPolicy {
            mode: config.reading_mode,
            ..ScanPolicy::default()
        }));
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (scanning, _) = watch::channel(false);
        let (trigger_pressed, _) = watch::channel(false);
        let (raw_tx, _) = broadcast::channel(config.raw_buffer.max(1));
        let (feedback_tx, _) = broadcast::channel(FEEDBACK_CHANNEL_SIZE);
        let (toggle_tx, _) = broadcast::channel(TOGGLE_CHANNEL_SIZE);
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(EngineInner {
                config,
                driver,
                lookup,
                store,
                connection_state,
                scanning,
                trigger_pressed,
                raw_tx,
                feedback_tx,
                toggle_tx,
                status_tx,
                status_rx: Mutex::new(Some(status_rx)),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                reader: Mutex::new(None),
                connect_lock: Mutex::new(()),
                session: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
                background: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Access the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Access the session tag store.
    pub fn store(&self) -> &Arc<TagStore> {
        &self.inner.store
    }

    /// Stop every task and release the reader. The engine cannot be
    /// reconnected afterwards.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.disconnect().await;

        let mut background = self.inner.background.lock().await;
        for handle in background.drain(..) {
            let _ = handle.await;
        }
        debug!("engine shut down");
    }

    // ── Policy commands ──────────────────────────────────────────

    /// Set (or clear) the product the operator is looking for.
    ///
    /// Clears the tag store and decision cache.
    pub fn set_reading_target(&self, target: Option<String>) {
        let target = target.filter(|t| !t.trim().is_empty());
        debug!(target = ?target, "reading target changed");
        self.inner.store.update_policy(|policy| policy.target = target);
    }

    /// Switch the global reading mode. Clears the tag store and cache.
    pub fn set_reading_mode(&self, mode: ReadingMode) {
        debug!(%mode, "reading mode changed");
        self.inner.store.update_policy(|policy| policy.mode = mode);
    }

    /// Switch workflow. Clears the tag store and cache; a monitor
    /// workflow selects its EPC.
    pub fn set_workflow(&self, workflow: Workflow) {
        debug!(workflow = ?workflow, "workflow changed");
        self.inner.store.update_policy(|policy| policy.workflow = workflow);
    }

    /// Mark a stored tag as the operator's focus.
    pub fn select_tag(&self, epc: &str) -> bool {
        self.inner.store.select(epc)
    }

    pub fn clear_selection(&self) {
        self.inner.store.clear_selection();
    }

    // ── Catalog queries ──────────────────────────────────────────

    /// Full registration (item and product) for one EPC.
    pub async fn describe_tag(&self, epc: &str) -> Result<Registration, CoreError> {
        classify::describe(
            self.inner.lookup.as_ref(),
            epc,
            self.inner.config.lookup_timeout,
        )
        .await
    }

    /// Every product in the catalog, for target suggestions.
    pub async fn list_products(&self) -> Result<Vec<Product>, CoreError> {
        let timeout = self.inner.config.lookup_timeout;
        tokio::time::timeout(timeout, self.inner.lookup.list_products())
            .await
            .map_err(|_| CoreError::LookupTimeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })?
    }

    // ── Subscriptions ────────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    /// Subscribe to the tag store.
    pub fn tags(&self) -> TagStream {
        self.inner.store.subscribe()
    }

    pub fn tags_snapshot(&self) -> TagSnapshot {
        self.inner.store.snapshot()
    }

    /// The selected tag's observation, updated on every read and on
    /// signal loss.
    pub fn selected_tag(&self) -> watch::Receiver<Option<Arc<TagObservation>>> {
        self.inner.store.subscribe_selected()
    }

    /// Raw reads as they arrive, after ingest filtering.
    pub fn raw_reads(&self) -> broadcast::Receiver<Arc<Vec<RawRead>>> {
        self.inner.raw_tx.subscribe()
    }

    pub fn feedback(&self) -> broadcast::Receiver<FeedbackEvent> {
        self.inner.feedback_tx.subscribe()
    }

    /// One event per trigger release.
    pub fn scan_toggles(&self) -> broadcast::Receiver<ScanToggle> {
        self.inner.toggle_tx.subscribe()
    }

    pub fn trigger_pressed(&self) -> watch::Receiver<bool> {
        self.inner.trigger_pressed.subscribe()
    }

    pub fn scanning(&self) -> watch::Receiver<bool> {
        self.inner.scanning.subscribe()
    }

    pub fn is_scanning(&self) -> bool {
        *self.inner.scanning.borrow()
    }

    // ── Private helpers ──────────────────────────────────────────

    fn set_state(&self, state: ConnectionState) {
        self.inner.connection_state.send_replace(state);
    }

    fn emit(&self, event: FeedbackEvent) {
        // No receivers is not an error; the UI may not be listening.
        let _ = self.inner.feedback_tx.send(event);
    }

    /// The open reader session, if any.
    async fn reader_session(&self) -> Option<Arc<dyn ReaderSession>> {
        self.inner
            .reader
            .lock()
            .await
            .as_ref()
            .map(|handle| Arc::clone(&handle.session))
    }
}
