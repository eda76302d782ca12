// ── Simulated reader ──
//
// An in-process `ReaderDriver` with a scriptable tag buffer. Used by the
// test suites and by the CLI's `--simulate` mode; it behaves like a
// handheld sled: reads are buffered only while inventory runs, and a
// trigger press/release arrives as status events.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{DeviceInfo, DriverError, ReaderDriver, ReaderEvents, ReaderSession, StatusEvent};
use crate::config::ReaderSettings;
use crate::model::RawRead;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scriptable reader driver.
///
/// Cheaply cloneable; clones share the same simulated hardware.
#[derive(Clone)]
pub struct SimulatedReader {
    inner: Arc<SimInner>,
}

struct SimInner {
    paired: Mutex<Vec<DeviceInfo>>,
    /// Discovery calls that report no reader before one shows up.
    hidden_for: AtomicU32,
    discoveries: AtomicU32,
    reinitializations: AtomicU32,
    fail_connect: Mutex<Option<String>>,
    fail_configure: AtomicBool,
    session: Mutex<Option<Arc<SimulatedSession>>>,
}

impl Default for SimulatedReader {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedReader {
    /// A driver with a single paired sled named `RFD40-SIM`.
    pub fn new() -> Self {
        Self::with_paired(vec![DeviceInfo::new("RFD40-SIM", "00:00:5E:00:53:01")])
    }

    pub fn with_paired(paired: Vec<DeviceInfo>) -> Self {
        Self {
            inner: Arc::new(SimInner {
                paired: Mutex::new(paired),
                hidden_for: AtomicU32::new(0),
                discoveries: AtomicU32::new(0),
                reinitializations: AtomicU32::new(0),
                fail_connect: Mutex::new(None),
                fail_configure: AtomicBool::new(false),
                session: Mutex::new(None),
            }),
        }
    }

    /// Report no available reader for the next `attempts` discovery calls.
    #[must_use]
    pub fn hidden_for(self, attempts: u32) -> Self {
        self.inner.hidden_for.store(attempts, Ordering::SeqCst);
        self
    }

    /// Make `connect()` fail with `reason`.
    #[must_use]
    pub fn failing_connect(self, reason: &str) -> Self {
        *lock(&self.inner.fail_connect) = Some(reason.to_string());
        self
    }

    /// Make `configure()` fail.
    #[must_use]
    pub fn failing_configure(self) -> Self {
        self.inner.fail_configure.store(true, Ordering::SeqCst);
        self
    }

    /// The session returned by the last `open()`.
    pub fn session(&self) -> Option<Arc<SimulatedSession>> {
        lock(&self.inner.session).clone()
    }

    pub fn discoveries(&self) -> u32 {
        self.inner.discoveries.load(Ordering::SeqCst)
    }

    pub fn reinitializations(&self) -> u32 {
        self.inner.reinitializations.load(Ordering::SeqCst)
    }
}

impl ReaderDriver for SimulatedReader {
    fn paired_devices(&self) -> Result<Vec<DeviceInfo>, DriverError> {
        Ok(lock(&self.inner.paired).clone())
    }

    fn available_readers(&self) -> Result<Vec<DeviceInfo>, DriverError> {
        self.inner.discoveries.fetch_add(1, Ordering::SeqCst);
        let hidden = self.inner.hidden_for.load(Ordering::SeqCst);
        if hidden > 0 {
            self.inner.hidden_for.store(hidden - 1, Ordering::SeqCst);
            return Ok(Vec::new());
        }
        Ok(lock(&self.inner.paired).clone())
    }

    fn reinitialize(&self) -> Result<(), DriverError> {
        self.inner.reinitializations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn open(&self, device: &DeviceInfo) -> Result<Arc<dyn ReaderSession>, DriverError> {
        let session = Arc::new(SimulatedSession {
            device: device.clone(),
            fail_connect: lock(&self.inner.fail_connect).clone(),
            fail_configure: self.inner.fail_configure.load(Ordering::SeqCst),
            connected: AtomicBool::new(false),
            inventory_running: AtomicBool::new(false),
            stalled: AtomicBool::new(false),
            buffer: Mutex::new(VecDeque::new()),
            listener: Mutex::new(None),
            settings: Mutex::new(None),
            starts: AtomicU32::new(0),
            stops: AtomicU32::new(0),
            purges: AtomicU32::new(0),
            listener_installs: AtomicU32::new(0),
        });
        *lock(&self.inner.session) = Some(Arc::clone(&session));
        Ok(session)
    }
}

/// A simulated reader connection.
pub struct SimulatedSession {
    device: DeviceInfo,
    fail_connect: Option<String>,
    fail_configure: bool,
    connected: AtomicBool,
    inventory_running: AtomicBool,
    stalled: AtomicBool,
    buffer: Mutex<VecDeque<RawRead>>,
    listener: Mutex<Option<Arc<dyn ReaderEvents>>>,
    settings: Mutex<Option<ReaderSettings>>,
    starts: AtomicU32,
    stops: AtomicU32,
    purges: AtomicU32,
    listener_installs: AtomicU32,
}

impl SimulatedSession {
    /// Buffer reads as if the antenna had seen them.
    ///
    /// Dropped while inventory is stopped or the reader is stalled.
    pub fn push_reads<I>(&self, reads: I)
    where
        I: IntoIterator<Item = RawRead>,
    {
        if !self.inventory_running.load(Ordering::SeqCst) || self.stalled.load(Ordering::SeqCst)
        {
            return;
        }
        lock(&self.buffer).extend(reads);
    }

    /// Fire the read-ready callback.
    pub fn notify_read_ready(&self) {
        let listener = lock(&self.listener).clone();
        if let Some(listener) = listener {
            listener.on_read_ready();
        }
    }

    /// Fire a trigger status event.
    pub fn set_trigger(&self, pressed: bool) {
        let listener = lock(&self.listener).clone();
        if let Some(listener) = listener {
            listener.on_status(StatusEvent::Trigger { pressed });
        }
    }

    /// Simulate the radio wedging: reads stop until inventory restarts.
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    /// Drop the link as if the sled went out of range.
    pub fn drop_link(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn inventory_running(&self) -> bool {
        self.inventory_running.load(Ordering::SeqCst)
    }

    pub fn inventory_starts(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn inventory_stops(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn purges(&self) -> u32 {
        self.purges.load(Ordering::SeqCst)
    }

    pub fn listener_installs(&self) -> u32 {
        self.listener_installs.load(Ordering::SeqCst)
    }

    pub fn has_listener(&self) -> bool {
        lock(&self.listener).is_some()
    }

    /// Settings applied by the last successful `configure()`.
    pub fn applied_settings(&self) -> Option<ReaderSettings> {
        lock(&self.settings).clone()
    }

    pub fn buffered(&self) -> usize {
        lock(&self.buffer).len()
    }

    fn ensure_connected(&self) -> Result<(), DriverError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DriverError::NotConnected)
        }
    }
}

impl ReaderSession for SimulatedSession {
    fn device(&self) -> &DeviceInfo {
        &self.device
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connect(&self) -> Result<(), DriverError> {
        if let Some(reason) = &self.fail_connect {
            return Err(DriverError::OperationFailed(reason.clone()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), DriverError> {
        self.connected.store(false, Ordering::SeqCst);
        self.inventory_running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn configure(&self, settings: &ReaderSettings) -> Result<(), DriverError> {
        self.ensure_connected()?;
        if self.fail_configure {
            return Err(DriverError::OperationFailed(
                "antenna configuration rejected".into(),
            ));
        }
        *lock(&self.settings) = Some(settings.clone());
        Ok(())
    }

    fn start_inventory(&self) -> Result<(), DriverError> {
        self.ensure_connected()?;
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.stalled.store(false, Ordering::SeqCst);
        self.inventory_running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_inventory(&self) -> Result<(), DriverError> {
        self.ensure_connected()?;
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.inventory_running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn purge_tags(&self) -> Result<(), DriverError> {
        self.ensure_connected()?;
        self.purges.fetch_add(1, Ordering::SeqCst);
        lock(&self.buffer).clear();
        Ok(())
    }

    fn read_tags(&self, max: usize) -> Result<Vec<RawRead>, DriverError> {
        self.ensure_connected()?;
        let mut buffer = lock(&self.buffer);
        let take = max.min(buffer.len());
        Ok(buffer.drain(..take).collect())
    }

    fn set_listener(&self, listener: Arc<dyn ReaderEvents>) -> Result<(), DriverError> {
        self.ensure_connected()?;
        self.listener_installs.fetch_add(1, Ordering::SeqCst);
        *lock(&self.listener) = Some(listener);
        Ok(())
    }

    fn remove_listener(&self) -> Result<(), DriverError> {
        *lock(&self.listener) = None;
        Ok(())
    }
}
