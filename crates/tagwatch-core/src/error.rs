// ── Core error types ──
//
// User-facing errors from tagwatch-core. Driver faults and HTTP failures
// are translated into domain variants; consumers never handle raw
// `reqwest` or vendor SDK errors directly.

use thiserror::Error;

use crate::driver::DriverError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("No paired RFID reader found (looked for names containing {filters})")]
    NoPairedReader { filters: String },

    #[error("Reader driver reported no available reader after {attempts} attempts")]
    ReaderUnavailable { attempts: u32 },

    #[error("Cannot connect to reader {device}: {reason}")]
    ConnectionFailed { device: String, reason: String },

    #[error("Reader not connected")]
    NotConnected,

    #[error("Reader call timed out after {timeout_ms}ms")]
    DriverTimeout { timeout_ms: u64 },

    #[error("Reader driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Engine is shutting down")]
    Shutdown,

    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Lookup failed: {message}")]
    Lookup {
        message: String,
        /// HTTP status code (if the backend answered).
        status: Option<u16>,
    },

    #[error("Lookup timed out after {timeout_ms}ms")]
    LookupTimeout { timeout_ms: u64 },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether this error came from the connection path.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NoPairedReader { .. }
                | Self::ReaderUnavailable { .. }
                | Self::ConnectionFailed { .. }
                | Self::NotConnected
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tagwatch_api::Error> for CoreError {
    fn from(err: tagwatch_api::Error) -> Self {
        match err {
            tagwatch_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid backend URL: {e}"),
            },
            tagwatch_api::Error::ClientBuild(message) => CoreError::Config { message },
            tagwatch_api::Error::Unauthorized => CoreError::Lookup {
                message: "backend rejected the API token".into(),
                status: Some(401),
            },
            tagwatch_api::Error::Api { status, message } => CoreError::Lookup {
                message,
                status: Some(status),
            },
            other => CoreError::Lookup {
                message: other.to_string(),
                status: other.status(),
            },
        }
    }
}
