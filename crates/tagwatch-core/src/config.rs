// ── Runtime engine configuration ──
//
// These types describe *how* the engine drives the reader: connection
// retry policy, read cadences, staleness windows, and the radio
// settings pushed on connect. They never touch disk; the CLI builds an
// `EngineConfig` from its profile and hands it in.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::ReadingMode;

/// Gen2 inventory session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum InventorySession {
    #[default]
    S0,
    S1,
    S2,
    S3,
}

/// Gen2 inventory flag the reader singulates on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum InventoryState {
    #[default]
    A,
    B,
    Ab,
}

/// Gen2 SL flag selection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SlFlag {
    #[default]
    All,
    Deasserted,
    Asserted,
}

/// Reader beeper volume.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum BeeperVolume {
    #[default]
    Quiet,
    Low,
    Medium,
    High,
}

/// Radio settings applied once per connection.
///
/// A failure to apply them is logged and the connection proceeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    /// Index into the reader's transmit power table.
    pub transmit_power_index: u16,
    pub rf_mode_index: u16,
    pub session: InventorySession,
    pub inventory_state: InventoryState,
    pub sl_flag: SlFlag,
    pub beeper: BeeperVolume,
    /// Dynamic power optimization; off so every read reports RSSI.
    pub dynamic_power: bool,
    pub batch_mode: bool,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            transmit_power_index: 270,
            rf_mode_index: 0,
            session: InventorySession::S0,
            inventory_state: InventoryState::A,
            sl_flag: SlFlag::All,
            beeper: BeeperVolume::Quiet,
            dynamic_power: false,
            batch_mode: false,
        }
    }
}

/// Filters applied to raw reads before they reach the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestFilter {
    /// Drop reads weaker than this (dBm).
    pub min_rssi: Option<i32>,
    /// Keep only EPCs starting with this prefix (case-insensitive hex).
    pub epc_prefix: Option<String>,
}

impl IngestFilter {
    pub fn allows(&self, epc: &str, rssi: i32) -> bool {
        if self.min_rssi.is_some_and(|min| rssi < min) {
            return false;
        }
        match self.epc_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => epc
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix)),
            _ => true,
        }
    }
}

/// Configuration for one engine instance.
///
/// Built by the CLI, passed to `Engine`; core never reads config files.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Paired devices whose name contains one of these are reader candidates.
    pub device_name_filters: Vec<String>,
    /// Reader name to prefer when several are available.
    pub preferred_device: Option<String>,
    pub reader: ReaderSettings,

    // ── Connection ───────────────────────────────────────────────────
    pub connect_attempts: u32,
    pub connect_backoff: Duration,
    /// Re-initialize the driver after this many empty discovery attempts.
    pub reinitialize_after: u32,
    /// Upper bound on any single blocking driver call.
    pub driver_call_timeout: Duration,

    // ── Ingestion ────────────────────────────────────────────────────
    pub event_batch_size: usize,
    pub poll_batch_size: usize,
    pub poll_interval: Duration,
    /// Upper bound on one buffered-read pull.
    pub pull_timeout: Duration,
    /// Consecutive empty polls before the inventory is restarted.
    pub stall_threshold: u32,
    pub stall_restart_pause: Duration,
    pub ingest_filter: IngestFilter,
    /// Capacity of the raw read broadcast; the oldest batches drop first.
    pub raw_buffer: usize,

    // ── Classification ───────────────────────────────────────────────
    pub reading_mode: ReadingMode,
    pub lookup_timeout: Duration,

    // ── Staleness ────────────────────────────────────────────────────
    pub sweep_interval: Duration,
    pub locate_timeout: Duration,
    pub monitor_timeout: Duration,

    /// Whether a trigger release starts/stops the session by itself.
    pub trigger_toggles_scan: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device_name_filters: vec!["RFD".into(), "Zebra".into()],
            preferred_device: None,
            reader: ReaderSettings::default(),
            connect_attempts: 3,
            connect_backoff: Duration::from_secs(1),
            reinitialize_after: 2,
            driver_call_timeout: Duration::from_secs(10),
            event_batch_size: 500,
            poll_batch_size: 100,
            poll_interval: Duration::from_millis(30),
            pull_timeout: Duration::from_millis(500),
            stall_threshold: 20,
            stall_restart_pause: Duration::from_millis(100),
            ingest_filter: IngestFilter::default(),
            raw_buffer: 100,
            reading_mode: ReadingMode::default(),
            lookup_timeout: Duration::from_secs(5),
            sweep_interval: Duration::from_millis(100),
            locate_timeout: Duration::from_millis(1000),
            monitor_timeout: Duration::from_millis(1500),
            trigger_toggles_scan: true,
        }
    }
}
