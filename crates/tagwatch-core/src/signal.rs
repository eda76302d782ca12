// ── RSSI presentation mapping ──
//
// Pure functions turning a dBm reading into the numbers a locate/monitor
// screen shows: a 0..=100 progress value, a coarse distance bucket, and
// a proximity tier for coloring.

use std::fmt;

use serde::Serialize;
use strum::Display;

/// RSSI written into the selected tag when its signal is lost.
pub const RSSI_FLOOR: i32 = -100;

/// Weakest reading shown as a non-empty bar.
const PROGRESS_MIN_DBM: i32 = -90;
/// Strongest reading; anything above is a full bar.
const PROGRESS_MAX_DBM: i32 = -20;

/// Map RSSI to a 0..=100 progress value.
///
/// Linear between -90 dBm and -20 dBm (clamped); the floor maps to 0.
pub fn signal_progress(rssi: i32) -> u8 {
    if rssi <= RSSI_FLOOR {
        return 0;
    }
    let clamped = rssi.clamp(PROGRESS_MIN_DBM, PROGRESS_MAX_DBM);
    let span = PROGRESS_MAX_DBM - PROGRESS_MIN_DBM;
    let scaled = (clamped - PROGRESS_MIN_DBM) * 100 / span;
    u8::try_from(scaled).unwrap_or(100)
}

/// Coarse distance estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceBucket {
    UnderHalfMeter,
    HalfToOneMeter,
    OneToTwoMeters,
    TwoToFourMeters,
    FourToEightMeters,
    BeyondEightMeters,
    /// The tag is lost; show an empty distance.
    NoSignal,
}

impl DistanceBucket {
    pub fn from_rssi(rssi: i32) -> Self {
        match rssi {
            r if r <= RSSI_FLOOR => Self::NoSignal,
            r if r >= -40 => Self::UnderHalfMeter,
            r if r >= -50 => Self::HalfToOneMeter,
            r if r >= -60 => Self::OneToTwoMeters,
            r if r >= -70 => Self::TwoToFourMeters,
            r if r >= -80 => Self::FourToEightMeters,
            _ => Self::BeyondEightMeters,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::UnderHalfMeter => "<0.5 m",
            Self::HalfToOneMeter => "0.5–1 m",
            Self::OneToTwoMeters => "1–2 m",
            Self::TwoToFourMeters => "2–4 m",
            Self::FourToEightMeters => "4–8 m",
            Self::BeyondEightMeters => ">8 m",
            Self::NoSignal => "",
        }
    }
}

impl fmt::Display for DistanceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Color tier for the signal bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Proximity {
    Near,
    Medium,
    Far,
    Lost,
}

impl Proximity {
    pub fn from_rssi(rssi: i32) -> Self {
        match rssi {
            r if r <= RSSI_FLOOR => Self::Lost,
            r if r >= -40 => Self::Near,
            r if r >= -60 => Self::Medium,
            _ => Self::Far,
        }
    }
}

/// Everything a signal widget needs for one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalReading {
    pub rssi: i32,
    pub progress: u8,
    pub distance: DistanceBucket,
    pub proximity: Proximity,
}

impl SignalReading {
    pub fn from_rssi(rssi: i32) -> Self {
        Self {
            rssi,
            progress: signal_progress(rssi),
            distance: DistanceBucket::from_rssi(rssi),
            proximity: Proximity::from_rssi(rssi),
        }
    }

    pub fn is_lost(&self) -> bool {
        self.distance == DistanceBucket::NoSignal
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn progress_is_linear_and_clamped() {
        assert_eq!(signal_progress(-45), 64);
        assert_eq!(signal_progress(-20), 100);
        assert_eq!(signal_progress(-5), 100);
        assert_eq!(signal_progress(-90), 0);
        assert_eq!(signal_progress(-95), 0);
        assert_eq!(signal_progress(RSSI_FLOOR), 0);
    }

    #[test]
    fn bucket_boundaries() {
        assert_eq!(DistanceBucket::from_rssi(-40), DistanceBucket::UnderHalfMeter);
        assert_eq!(DistanceBucket::from_rssi(-41), DistanceBucket::HalfToOneMeter);
        assert_eq!(DistanceBucket::from_rssi(-45), DistanceBucket::HalfToOneMeter);
        assert_eq!(DistanceBucket::from_rssi(-60), DistanceBucket::OneToTwoMeters);
        assert_eq!(DistanceBucket::from_rssi(-70), DistanceBucket::TwoToFourMeters);
        assert_eq!(DistanceBucket::from_rssi(-80), DistanceBucket::FourToEightMeters);
        assert_eq!(DistanceBucket::from_rssi(-81), DistanceBucket::BeyondEightMeters);
        assert_eq!(DistanceBucket::from_rssi(-99), DistanceBucket::BeyondEightMeters);
        assert_eq!(DistanceBucket::from_rssi(-100), DistanceBucket::NoSignal);
    }

    #[test]
    fn floor_reading_is_lost() {
        let reading = SignalReading::from_rssi(RSSI_FLOOR);
        assert!(reading.is_lost());
        assert_eq!(reading.progress, 0);
        assert_eq!(reading.distance.label(), "");
        assert_eq!(reading.proximity, Proximity::Lost);
    }

    #[test]
    fn proximity_tiers() {
        assert_eq!(Proximity::from_rssi(-35), Proximity::Near);
        assert_eq!(Proximity::from_rssi(-55), Proximity::Medium);
        assert_eq!(Proximity::from_rssi(-75), Proximity::Far);
    }
}
