//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use tagwatch_config::ConfigError;
use tagwatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const READER: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Reader ───────────────────────────────────────────────────────

    #[error("Could not connect to a reader: {reason}")]
    #[diagnostic(
        code(tagwatch::reader_unavailable),
        help(
            "Check that the reader is paired, charged, and switched on.\n\
             Pick a specific one with --device <name|address>."
        )
    )]
    ReaderUnavailable { reason: String },

    #[error("Reader is not connected")]
    #[diagnostic(code(tagwatch::not_connected))]
    NotConnected,

    // ── Backend ──────────────────────────────────────────────────────

    #[error("Inventory backend rejected the credentials")]
    #[diagnostic(
        code(tagwatch::auth_failed),
        help(
            "Store a token with: tagwatch config set-token --profile {profile}\n\
             Or set TAGWATCH_API_TOKEN."
        )
    )]
    AuthFailed { profile: String },

    #[error("Inventory backend error: {message}")]
    #[diagnostic(code(tagwatch::backend_error))]
    Backend { message: String },

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(tagwatch::not_found),
        help("Run: tagwatch {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Operation timed out after {millis}ms")]
    #[diagnostic(
        code(tagwatch::timeout),
        help("Increase timeout with --timeout or check backend responsiveness.")
    )]
    Timeout { millis: u64 },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tagwatch::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(tagwatch::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: tagwatch config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(tagwatch::config))]
    Config(ConfigError),

    // ── Internal / IO ────────────────────────────────────────────────

    #[error("Internal error: {0}")]
    #[diagnostic(code(tagwatch::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ReaderUnavailable { .. } | Self::NotConnected => exit_code::READER,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::ProfileNotFound { .. }
            | Self::Config(ConfigError::Validation { .. }) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NoPairedReader { .. }
            | CoreError::ReaderUnavailable { .. }
            | CoreError::ConnectionFailed { .. }
            | CoreError::Driver(_) => CliError::ReaderUnavailable {
                reason: err.to_string(),
            },

            CoreError::NotConnected | CoreError::Shutdown => CliError::NotConnected,

            CoreError::DriverTimeout { timeout_ms } | CoreError::LookupTimeout { timeout_ms } => {
                CliError::Timeout { millis: timeout_ms }
            }

            CoreError::Lookup {
                status: Some(401 | 403),
                ..
            } => CliError::AuthFailed {
                profile: "current".into(),
            },

            CoreError::Lookup { message, .. } => CliError::Backend { message },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_errors_use_reader_exit_code() {
        let err = CliError::from(CoreError::ReaderUnavailable { attempts: 3 });
        assert_eq!(err.exit_code(), exit_code::READER);
    }

    #[test]
    fn unauthorized_lookup_maps_to_auth() {
        let err = CliError::from(CoreError::Lookup {
            message: "nope".into(),
            status: Some(401),
        });
        assert!(matches!(err, CliError::AuthFailed { .. }));
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn lookup_timeout_maps_to_timeout() {
        let err = CliError::from(CoreError::LookupTimeout { timeout_ms: 500 });
        assert_eq!(err.exit_code(), exit_code::TIMEOUT);
    }
}
