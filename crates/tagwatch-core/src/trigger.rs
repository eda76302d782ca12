// ── Trigger edge detection ──
//
// Hardware trigger events arrive as raw pressed/released states, with
// repeats. A scan toggle fires once per release.

use crate::model::ScanToggle;

/// Tracks the last trigger state and reports pressed -> released edges.
#[derive(Debug, Default, Clone, Copy)]
pub struct TriggerEdgeDetector {
    pressed: bool,
}

impl TriggerEdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw state; returns a toggle on the falling edge only.
    pub fn feed(&mut self, pressed: bool) -> Option<ScanToggle> {
        let released = self.pressed && !pressed;
        self.pressed = pressed;
        released.then_some(ScanToggle)
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toggles(states: &[bool]) -> usize {
        let mut detector = TriggerEdgeDetector::new();
        states.iter().filter_map(|&s| detector.feed(s)).count()
    }

    #[test]
    fn single_press_release_toggles_once() {
        assert_eq!(toggles(&[true, false]), 1);
    }

    #[test]
    fn repeated_states_collapse() {
        assert_eq!(toggles(&[true, true, false, false]), 1);
        assert_eq!(toggles(&[true, false, true, false]), 2);
    }

    #[test]
    fn release_without_press_is_ignored() {
        assert_eq!(toggles(&[false, false]), 0);
        assert_eq!(toggles(&[true]), 0);
    }

    #[test]
    fn tracks_current_state() {
        let mut detector = TriggerEdgeDetector::new();
        detector.feed(true);
        assert!(detector.is_pressed());
        detector.feed(false);
        assert!(!detector.is_pressed());
    }
}
