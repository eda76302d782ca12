//! Tag acquisition and classification engine between a handheld RFID
//! reader driver and UI consumers (CLI / TUI).
//!
//! - **[`Engine`]**: central facade owning the reader lifecycle.
//!   [`connect()`](Engine::connect) walks paired devices, opens and
//!   configures a reader, then spawns the classification pipeline and
//!   trigger handling. [`start_session()`](Engine::start_session) begins
//!   inventory with a polling fallback, stall recovery, and a staleness
//!   monitor for the selected tag.
//!
//! - **[`TagStore`]**: deduplicating store of tags seen this session,
//!   backed by a per-session decision cache so each EPC is looked up at
//!   most once. Exposes snapshots and a [`TagStream`] subscription.
//!
//! - **Classification** ([`classify`]): decides whether a tag belongs in
//!   the view given the [`ReadingMode`], [`Workflow`], and optional
//!   product target, using a [`LookupService`].
//!
//! - **Drivers** ([`driver`]): the blocking [`ReaderDriver`] /
//!   [`ReaderSession`] seam, plus a [`SimulatedReader`] for tests and demos.
//!
//! - **Signal mapping** ([`signal`]): RSSI to progress, distance bucket,
//!   and proximity level for locate and monitor views.

pub mod classify;
pub mod config;
pub mod convert;
pub mod driver;
pub mod engine;
pub mod error;
pub mod lookup;
pub mod model;
pub mod signal;
pub mod store;
pub mod stream;
pub mod trigger;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{
    BeeperVolume, EngineConfig, IngestFilter, InventorySession, InventoryState, ReaderSettings,
    SlFlag,
};
pub use driver::{
    DeviceInfo, DriverError, ReaderDriver, ReaderEvents, ReaderSession, SimulatedReader,
    SimulatedSession, StatusEvent,
};
pub use engine::{ConnectionState, Engine};
pub use error::CoreError;
pub use lookup::{LookupService, StaticCatalog};
pub use signal::{DistanceBucket, Proximity, RSSI_FLOOR, SignalReading, signal_progress};
pub use store::TagStore;
pub use stream::{TagSnapshot, TagStream};
pub use trigger::TriggerEdgeDetector;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ClassificationDecision, FeedbackEvent, Product, RawRead, ReadingMode, RegisteredItem,
    Registration, ScanPolicy, ScanToggle, TagObservation, UNREGISTERED_LABEL, Workflow,
};
