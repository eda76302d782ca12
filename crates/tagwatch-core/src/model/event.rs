// ── Engine events ──
//
// One-shot notifications for the presentation layer. The engine never
// plays sounds or vibrates itself; a UI maps these to beeps and haptics.

use serde::Serialize;

/// Audible/haptic feedback cue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FeedbackEvent {
    /// A tag passed classification and entered the store for the first time.
    NewTagMatched { epc: String },
    /// The reader connection was established.
    ConnectConfirmed { device: String },
    /// An established reader connection was released.
    DisconnectConfirmed,
}

/// Emitted on every trigger release (pressed -> released edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanToggle;
