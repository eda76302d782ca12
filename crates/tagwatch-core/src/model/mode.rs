// ── Reading policy types ──
//
// How incoming reads are filtered before and after classification:
// the global reading mode, the active workflow, and the optional
// product target.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Global classification mode.
///
/// Stored under the keys `mode_a` / `mode_b` / `mode_c` in settings files.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum ReadingMode {
    /// Only tags with a backend registration (matching the target, if set).
    #[serde(rename = "mode_a")]
    #[strum(to_string = "mode_a", serialize = "a", serialize = "registered")]
    OnlyRegistered,
    /// All tags, with a registration lookup to mark unregistered ones.
    #[serde(rename = "mode_b")]
    #[strum(to_string = "mode_b", serialize = "b", serialize = "lookup")]
    AllWithLookup,
    /// All tags.
    #[default]
    #[serde(rename = "mode_c")]
    #[strum(to_string = "mode_c", serialize = "c", serialize = "all")]
    AllUnfiltered,
}

impl ReadingMode {
    /// Whether a successful registration is required for acceptance.
    pub fn requires_registration(self) -> bool {
        matches!(self, Self::OnlyRegistered)
    }
}

/// The screen-level activity the engine is serving.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "workflow", rename_all = "snake_case")]
pub enum Workflow {
    /// Survey every tag in range.
    #[default]
    Inventory,
    /// Find tags of one product; reads are ignored until a target is set,
    /// and only the selected tag is tracked once one is chosen.
    Locate,
    /// Track the signal of a single known EPC.
    Monitor { epc: String },
}

impl Workflow {
    /// Whether unregistered tags may enter the store under modes B/C.
    pub fn accepts_unregistered(&self) -> bool {
        match self {
            Self::Inventory | Self::Monitor { .. } => true,
            Self::Locate => false,
        }
    }

    /// The EPC this workflow is pinned to, if any.
    pub fn pinned_epc(&self) -> Option<&str> {
        match self {
            Self::Monitor { epc } => Some(epc),
            _ => None,
        }
    }

    /// Silence period after which the selected tag is marked lost.
    pub fn staleness_timeout(&self, locate: Duration, monitor: Duration) -> Duration {
        match self {
            Self::Monitor { .. } => monitor,
            Self::Inventory | Self::Locate => locate,
        }
    }
}

/// The full set of knobs consulted for every read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanPolicy {
    pub mode: ReadingMode,
    pub workflow: Workflow,
    /// Product id the operator is looking for.
    pub target: Option<String>,
}

impl ScanPolicy {
    /// Pre-classification gate: should a read for `epc` be considered at all?
    pub fn admits(&self, epc: &str, selected: Option<&str>) -> bool {
        match &self.workflow {
            Workflow::Inventory => true,
            Workflow::Monitor { epc: pinned } => pinned == epc,
            Workflow::Locate => {
                self.target.is_some() && selected.is_none_or(|selected| selected == epc)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn reading_mode_parses_stored_keys() {
        assert_eq!(
            ReadingMode::from_str("mode_a").unwrap(),
            ReadingMode::OnlyRegistered
        );
        assert_eq!(ReadingMode::from_str("B").unwrap(), ReadingMode::AllWithLookup);
        assert_eq!(ReadingMode::from_str("all").unwrap(), ReadingMode::AllUnfiltered);
        assert_eq!(ReadingMode::AllWithLookup.to_string(), "mode_b");
        assert!(ReadingMode::from_str("mode_z").is_err());
    }

    #[test]
    fn reading_mode_serde_uses_stored_keys() {
        let json = serde_json::to_string(&ReadingMode::OnlyRegistered).unwrap();
        assert_eq!(json, "\"mode_a\"");
        let mode: ReadingMode = serde_json::from_str("\"mode_c\"").unwrap();
        assert_eq!(mode, ReadingMode::AllUnfiltered);
    }

    #[test]
    fn locate_ignores_reads_without_target() {
        let policy = ScanPolicy {
            workflow: Workflow::Locate,
            ..ScanPolicy::default()
        };
        assert!(!policy.admits("E1", None));
    }

    #[test]
    fn locate_freezes_on_selection() {
        let policy = ScanPolicy {
            workflow: Workflow::Locate,
            target: Some("SKU-1".into()),
            ..ScanPolicy::default()
        };
        assert!(policy.admits("E1", None));
        assert!(policy.admits("E1", Some("E1")));
        assert!(!policy.admits("E2", Some("E1")));
    }

    #[test]
    fn monitor_admits_only_its_epc() {
        let policy = ScanPolicy {
            workflow: Workflow::Monitor { epc: "E9".into() },
            ..ScanPolicy::default()
        };
        assert!(policy.admits("E9", None));
        assert!(!policy.admits("E1", None));
    }

    #[test]
    fn staleness_timeout_depends_on_workflow() {
        let locate = Duration::from_millis(1000);
        let monitor = Duration::from_millis(1500);
        assert_eq!(Workflow::Locate.staleness_timeout(locate, monitor), locate);
        assert_eq!(
            Workflow::Monitor { epc: "E".into() }.staleness_timeout(locate, monitor),
            monitor
        );
    }
}
