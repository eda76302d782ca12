// ── Reader driver abstraction ──
//
// The seam between the engine and vendor reader SDKs. Driver calls are
// synchronous and may block on radio or Bluetooth I/O; the engine runs
// every one of them on the blocking pool under a timeout, so a hung or
// panicking driver never stalls the async runtime.

pub mod sim;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::config::ReaderSettings;
use crate::error::CoreError;
use crate::model::RawRead;

pub use sim::{SimulatedReader, SimulatedSession};

/// Failure reported by a reader driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The reader rejected or failed an operation.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// The session is no longer attached to a reader.
    #[error("reader not connected")]
    NotConnected,

    /// Host radio (Bluetooth/USB) is unavailable.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),
}

/// A device known to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub address: String,
}

impl DeviceInfo {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Whether the name contains any of `filters` (case-insensitive).
    pub fn matches_family(&self, filters: &[String]) -> bool {
        let name = self.name.to_ascii_lowercase();
        filters
            .iter()
            .any(|f| name.contains(&f.to_ascii_lowercase()))
    }
}

/// Asynchronous status notification from the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Hardware trigger state changed.
    Trigger { pressed: bool },
    /// Anything else the driver reports (battery, temperature, ...).
    Other { description: String },
}

/// Callbacks the driver invokes from its own threads.
///
/// Implementations must return quickly and never block.
pub trait ReaderEvents: Send + Sync {
    /// New tag data is buffered on the reader.
    fn on_read_ready(&self);
    fn on_status(&self, event: StatusEvent);
}

/// Entry point of a vendor SDK.
pub trait ReaderDriver: Send + Sync + 'static {
    /// Devices paired/bonded with the host.
    fn paired_devices(&self) -> Result<Vec<DeviceInfo>, DriverError>;
    /// Readers the SDK can currently reach.
    fn available_readers(&self) -> Result<Vec<DeviceInfo>, DriverError>;
    /// Tear down and re-create the SDK's transport layer.
    fn reinitialize(&self) -> Result<(), DriverError>;
    /// Obtain a session handle for `device` (not yet connected).
    fn open(&self, device: &DeviceInfo) -> Result<Arc<dyn ReaderSession>, DriverError>;
}

/// One reader connection.
pub trait ReaderSession: Send + Sync + 'static {
    fn device(&self) -> &DeviceInfo;
    fn is_connected(&self) -> bool;
    fn connect(&self) -> Result<(), DriverError>;
    fn disconnect(&self) -> Result<(), DriverError>;
    fn configure(&self, settings: &ReaderSettings) -> Result<(), DriverError>;
    fn start_inventory(&self) -> Result<(), DriverError>;
    fn stop_inventory(&self) -> Result<(), DriverError>;
    /// Discard every buffered read.
    fn purge_tags(&self) -> Result<(), DriverError>;
    /// Drain up to `max` buffered reads.
    fn read_tags(&self, max: usize) -> Result<Vec<RawRead>, DriverError>;
    /// Install the event listener, replacing any previous one.
    fn set_listener(&self, listener: Arc<dyn ReaderEvents>) -> Result<(), DriverError>;
    fn remove_listener(&self) -> Result<(), DriverError>;
}

/// Run a blocking driver call on the blocking pool, bounded by `timeout`.
///
/// Driver panics surface as `CoreError::Internal`.
pub(crate) async fn run_blocking<T, F>(timeout: Duration, call: F) -> Result<T, CoreError>
where
    F: FnOnce() -> Result<T, DriverError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(call)).await {
        Ok(Ok(result)) => result.map_err(CoreError::from),
        Ok(Err(join)) => Err(CoreError::Internal(format!("reader driver call failed: {join}"))),
        Err(_) => Err(CoreError::DriverTimeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
