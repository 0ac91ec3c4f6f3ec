// Gesture debouncer: raw per-frame state -> committed gesture signal.
//
// Activation needs a run of agreeing ticks; losing the hands resets at once.

use tracing::info;

use crate::gesture::GestureState;

/// Agreeing ticks (after the first sighting) required before a commit.
pub const CONFIRM_TICKS: u32 = 3;

/// The only gesture data the visual layer may consult.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommittedGesture {
    pub hand_count: u8,
    pub is_open: bool,
}

impl CommittedGesture {
    pub const NONE: CommittedGesture = CommittedGesture { hand_count: 0, is_open: false };
}

/// Which committed fields changed on this tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitNotification {
    pub hand_count: Option<u8>,
    pub is_open: Option<bool>,
}

impl CommitNotification {
    pub fn is_empty(&self) -> bool {
        self.hand_count.is_none() && self.is_open.is_none()
    }
}

#[derive(Debug)]
pub struct Debouncer {
    committed: CommittedGesture,
    pending: CommittedGesture,
    agreeing: u32,
    threshold: u32,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(CONFIRM_TICKS)
    }
}

impl Debouncer {
    pub fn new(threshold: u32) -> Self {
        Self {
            committed: CommittedGesture::NONE,
            pending: CommittedGesture::NONE,
            agreeing: 0,
            threshold,
        }
    }

    pub fn committed(&self) -> CommittedGesture {
        self.committed
    }

    /// Feed one raw tick. Returns the changed fields, if any.
    pub fn update(&mut self, raw: &GestureState) -> Option<CommitNotification> {
        // No hands: commit the reset immediately, no confirmation window.
        if !raw.is_detected || raw.hand_count == 0 {
            self.agreeing = 0;
            self.pending = CommittedGesture::NONE;
            return self.commit(CommittedGesture::NONE);
        }

        let candidate = CommittedGesture { hand_count: raw.hand_count, is_open: raw.is_open };
        if candidate != self.pending {
            self.pending = candidate;
            self.agreeing = 0;
        } else {
            self.agreeing = self.agreeing.saturating_add(1);
        }

        if self.agreeing >= self.threshold {
            self.commit(self.pending)
        } else {
            None
        }
    }

    fn commit(&mut self, next: CommittedGesture) -> Option<CommitNotification> {
        let note = CommitNotification {
            hand_count: (next.hand_count != self.committed.hand_count).then_some(next.hand_count),
            is_open: (next.is_open != self.committed.is_open).then_some(next.is_open),
        };
        if note.is_empty() {
            return None;
        }
        info!(hands = next.hand_count, open = next.is_open, "gesture committed");
        self.committed = next;
        Some(note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn raw(hand_count: u8, is_open: bool) -> GestureState {
        GestureState { is_detected: hand_count > 0, hand_count, openness: 0.0, is_open, ..Default::default() }
    }

    #[test]
    fn candidate_needs_a_stable_run() {
        let mut d = Debouncer::default();
        for _ in 0..CONFIRM_TICKS {
            assert_eq!(d.update(&raw(1, false)), None);
        }
        let note = d.update(&raw(1, false)).unwrap();
        assert_eq!(note.hand_count, Some(1));
        assert_eq!(note.is_open, None);
        assert_eq!(d.committed(), CommittedGesture { hand_count: 1, is_open: false });
    }

    #[test]
    fn single_outlier_does_not_commit() {
        let mut d = Debouncer::default();
        for _ in 0..10 {
            d.update(&raw(1, false));
        }
        assert_eq!(d.update(&raw(1, true)), None);
        assert_eq!(d.update(&raw(1, false)), None);
        assert_eq!(d.committed(), CommittedGesture { hand_count: 1, is_open: false });
    }

    #[test]
    fn zero_hands_resets_in_the_same_tick() {
        let mut d = Debouncer::default();
        for _ in 0..5 {
            d.update(&raw(2, true));
        }
        assert_eq!(d.committed().hand_count, 2);

        let note = d.update(&raw(0, false)).unwrap();
        assert_eq!(note, CommitNotification { hand_count: Some(0), is_open: Some(false) });
        assert_eq!(d.committed(), CommittedGesture::NONE);
    }

    #[test]
    fn undetected_wins_over_stale_count() {
        let mut d = Debouncer::default();
        for _ in 0..5 {
            d.update(&raw(1, true));
        }
        let stale = GestureState { is_detected: false, hand_count: 1, is_open: true, ..Default::default() };
        assert!(d.update(&stale).is_some());
        assert_eq!(d.committed(), CommittedGesture::NONE);
    }

    #[test]
    fn identical_input_commits_once() {
        let mut d = Debouncer::default();
        let notes = (0..20).filter_map(|_| d.update(&raw(2, true))).count();
        assert_eq!(notes, 1);
    }

    #[test]
    fn reset_restarts_confirmation() {
        let mut d = Debouncer::default();
        d.update(&raw(1, false));
        d.update(&raw(1, false));
        d.update(&raw(0, false));
        for _ in 0..CONFIRM_TICKS {
            assert_eq!(d.update(&raw(1, false)), None);
        }
        assert!(d.update(&raw(1, false)).is_some());
    }

    proptest! {
        #[test]
        fn lone_outlier_never_changes_commit(
            stable_count in 1u8..=2,
            stable_open: bool,
            outlier_count in 1u8..=2,
            outlier_open: bool,
            lead in 4usize..12,
        ) {
            let mut d = Debouncer::default();
            for _ in 0..lead {
                d.update(&raw(stable_count, stable_open));
            }
            let before = d.committed();
            d.update(&raw(outlier_count, outlier_open));
            prop_assert_eq!(d.committed(), before);
            d.update(&raw(stable_count, stable_open));
            prop_assert_eq!(d.committed(), before);
        }
    }
}
