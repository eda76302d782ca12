//! Shared configuration for the tagwatch CLI.
//!
//! TOML profiles, API token resolution (env + keyring + plaintext), and
//! translation to `tagwatch_core::EngineConfig` and the backend
//! transport. The CLI layers its flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use tagwatch_api::{TlsMode, TransportConfig};
use tagwatch_core::{EngineConfig, IngestFilter, ReaderSettings, ReadingMode};

const KEYRING_SERVICE: &str = "tagwatch";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("credential store error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Backend request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}

/// A named profile: one backend plus the reader and scan tuning to use
/// with it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Inventory backend base URL. Without one the built-in demo catalog
    /// is used.
    pub backend: Option<String>,

    /// Bearer token (plaintext; prefer keyring or env var).
    pub api_token: Option<String>,

    /// Environment variable name containing the bearer token.
    pub api_token_env: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Accept invalid backend certificates.
    pub insecure: Option<bool>,

    /// Override the default request timeout (seconds).
    pub timeout: Option<u64>,

    #[serde(default)]
    pub reader: ReaderProfile,

    #[serde(default)]
    pub scan: ScanProfile,
}

/// Which reader to connect to and how to set up its radio.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReaderProfile {
    /// Device-name substrings that identify a supported reader.
    pub device_filters: Option<Vec<String>>,
    /// Name or address of the reader to prefer.
    pub preferred_device: Option<String>,
    pub connect_attempts: Option<u32>,
    #[serde(default)]
    pub radio: ReaderSettings,
}

/// Scan tuning. Unset fields keep the engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScanProfile {
    pub reading_mode: Option<ReadingMode>,
    pub min_rssi: Option<i32>,
    pub epc_prefix: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub stall_threshold: Option<u32>,
    pub lookup_timeout_ms: Option<u64>,
    pub locate_timeout_ms: Option<u64>,
    pub monitor_timeout_ms: Option<u64>,
    pub trigger_toggles_scan: Option<bool>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "tagwatch", "tagwatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("tagwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment.
///
/// Environment keys use `TAGWATCH_` and `__` as the nesting separator,
/// e.g. `TAGWATCH_PROFILES__LAB__BACKEND`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TAGWATCH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the backend token from the credential chain.
///
/// `None` means the backend is used without authentication.
pub fn resolve_api_token(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    // 1. Profile's api_token_env → env var lookup
    if let Some(value) = profile
        .api_token_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
    {
        return Some(SecretString::from(value));
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &token_key(profile_name)) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    profile.api_token.clone().map(SecretString::from)
}

/// Store a backend token in the system keyring.
pub fn store_api_token(profile_name: &str, token: &SecretString) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &token_key(profile_name))?;
    entry.set_password(token.expose_secret())?;
    Ok(())
}

fn token_key(profile_name: &str) -> String {
    format!("{profile_name}/api-token")
}

// ── Translation ─────────────────────────────────────────────────────

/// Resolved backend endpoint.
#[derive(Debug, Clone)]
pub struct Backend {
    pub url: Url,
    pub transport: TransportConfig,
}

impl Profile {
    /// Build the engine configuration: engine defaults overlaid with
    /// whatever this profile sets.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let mut config = EngineConfig {
            reader: self.reader.radio.clone(),
            preferred_device: self.reader.preferred_device.clone(),
            ..EngineConfig::default()
        };

        if let Some(filters) = &self.reader.device_filters {
            if filters.iter().all(|f| f.trim().is_empty()) {
                return Err(invalid("reader.device_filters", "at least one filter is required"));
            }
            config.device_name_filters.clone_from(filters);
        }
        if let Some(attempts) = self.reader.connect_attempts {
            config.connect_attempts = positive("reader.connect_attempts", attempts)?;
        }

        let scan = &self.scan;
        if let Some(mode) = scan.reading_mode {
            config.reading_mode = mode;
        }
        if let Some(prefix) = &scan.epc_prefix {
            if !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid(
                    "scan.epc_prefix",
                    format!("'{prefix}' is not hexadecimal"),
                ));
            }
        }
        config.ingest_filter = IngestFilter {
            min_rssi: scan.min_rssi,
            epc_prefix: scan.epc_prefix.clone(),
        };
        if let Some(ms) = scan.poll_interval_ms {
            config.poll_interval = millis("scan.poll_interval_ms", ms)?;
        }
        if let Some(threshold) = scan.stall_threshold {
            config.stall_threshold = positive("scan.stall_threshold", threshold)?;
        }
        if let Some(ms) = scan.lookup_timeout_ms {
            config.lookup_timeout = millis("scan.lookup_timeout_ms", ms)?;
        }
        if let Some(ms) = scan.locate_timeout_ms {
            config.locate_timeout = millis("scan.locate_timeout_ms", ms)?;
        }
        if let Some(ms) = scan.monitor_timeout_ms {
            config.monitor_timeout = millis("scan.monitor_timeout_ms", ms)?;
        }
        if let Some(toggles) = scan.trigger_toggles_scan {
            config.trigger_toggles_scan = toggles;
        }

        Ok(config)
    }

    /// Build the backend endpoint, or `None` when no backend is configured.
    pub fn backend(
        &self,
        profile_name: &str,
        defaults: &Defaults,
    ) -> Result<Option<Backend>, ConfigError> {
        let Some(raw) = self.backend.as_deref() else {
            return Ok(None);
        };
        let url: Url = raw
            .parse()
            .map_err(|_| invalid("backend", format!("invalid URL: {raw}")))?;

        let tls = if self.insecure.unwrap_or(false) {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };

        let transport = TransportConfig {
            tls,
            timeout: Duration::from_secs(self.timeout.unwrap_or(defaults.timeout)),
            api_token: resolve_api_token(self, profile_name),
        };
        Ok(Some(Backend { url, transport }))
    }
}

fn positive(field: &str, value: u32) -> Result<u32, ConfigError> {
    if value == 0 {
        return Err(invalid(field, "must be greater than zero"));
    }
    Ok(value)
}

fn millis(field: &str, value: u64) -> Result<Duration, ConfigError> {
    if value == 0 {
        return Err(invalid(field, "must be greater than zero"));
    }
    Ok(Duration::from_millis(value))
}
