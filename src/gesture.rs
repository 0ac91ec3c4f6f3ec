// Raw gesture state: the one cell the detection loop writes and everyone
// else reads.
//
// Single writer (DetectionLoop), many readers (Debouncer, VisualStateMachine).
// Ticks run on one thread in a fixed order, so a plain struct handed around
// by reference is enough: a reader always sees the last complete write.
// If the stages ever move to separate threads, swap this for a snapshot
// handoff instead of sharing it.

use glam::Vec2;

use crate::classifier::Classification;

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct GestureState {
    pub is_detected: bool,
    pub hand_count: u8,
    /// Mean openness in [0,1]. Stale while `is_detected` is false.
    pub openness: f32,
    pub is_open: bool,
    /// Scene-space anchor of the first hand. Stale while `is_detected` is false.
    pub anchor: Vec2,
}

impl GestureState {
    /// Record a frame with at least one hand.
    pub fn apply(&mut self, c: &Classification) {
        self.is_detected = true;
        self.hand_count = c.hand_count;
        self.openness = c.openness;
        self.is_open = c.is_open;
        self.anchor = c.anchor;
    }

    /// Record "no hands". Openness and anchor keep their last values;
    /// readers must treat `is_detected == false` as authoritative.
    pub fn clear(&mut self) {
        self.is_detected = false;
        self.hand_count = 0;
    }

    /// Anchor only while a hand is actually in view.
    pub fn live_anchor(&self) -> Option<Vec2> {
        self.is_detected.then_some(self.anchor)
    }
}
