// Gesture classifier: raw landmark sets -> per-frame gesture metrics.
// Pure and deterministic; the only failure is a hand with the wrong shape.

use glam::Vec2;

use crate::error::Error;
use crate::landmarks::{index, LANDMARK_COUNT, MAX_HANDS};
use crate::types::HandResult;

/// Tip/palm ratio that maps to openness 0 (fist).
pub const RATIO_CLOSED: f32 = 0.95;
/// Tip/palm ratio that maps to openness 1 (flat palm).
pub const RATIO_OPEN: f32 = 1.5;
/// Aggregate openness above this counts as an open hand.
pub const OPEN_THRESHOLD: f32 = 0.45;

/// What one detection result says about the hands in view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub hand_count: u8,
    /// Mean openness across hands, in [0,1].
    pub openness: f32,
    pub is_open: bool,
    /// First hand's wrist in scene units.
    pub anchor: Vec2,
}

/// Affine remap of the tip/palm ratio: [0.95, 1.5] -> [0, 1], clamped.
#[inline]
pub fn openness_from_ratio(ratio: f32) -> f32 {
    ((ratio - RATIO_CLOSED) / (RATIO_OPEN - RATIO_CLOSED)).clamp(0.0, 1.0)
}

/// Openness of a single hand.
///
/// palm = |wrist - middle MCP|; ratio = mean |tip - wrist| / palm over the
/// four fingertips. A fully collapsed hand (0/0) reads as closed; a
/// zero-length palm with spread fingertips reads as fully open.
pub fn hand_openness(hand: &HandResult) -> Result<f32, Error> {
    let lm = &hand.landmarks;
    if lm.len() != LANDMARK_COUNT {
        return Err(Error::MalformedLandmarkSet { expected: LANDMARK_COUNT, actual: lm.len() });
    }

    let wrist = lm[index::WRIST];
    let palm = wrist.distance_2d(&lm[index::MIDDLE_FINGER_MCP]);
    let mean_tip = index::FINGERTIPS
        .iter()
        .map(|&i| lm[i].distance_2d(&wrist))
        .sum::<f32>()
        / index::FINGERTIPS.len() as f32;

    let ratio = mean_tip / palm;
    if ratio.is_nan() {
        return Ok(0.0);
    }
    Ok(openness_from_ratio(ratio))
}

/// Map a normalized wrist position to scene units, mirrored for a
/// user-facing camera.
#[inline]
pub fn anchor_from_normalized(x: f32, y: f32) -> Vec2 {
    Vec2::new(-(x - 0.5) * 3.0, -(y - 0.5) * 2.5)
}

/// Classify one detection result. `Ok(None)` means no hands.
pub fn classify(hands: &[HandResult]) -> Result<Option<Classification>, Error> {
    let hands = &hands[..hands.len().min(MAX_HANDS)];
    let Some(first) = hands.first() else { return Ok(None) };

    let mut total = 0.0;
    for hand in hands {
        total += hand_openness(hand)?;
    }
    let openness = total / hands.len() as f32;

    let wrist = first.landmarks[index::WRIST];
    Ok(Some(Classification {
        hand_count: hands.len() as u8,
        openness,
        is_open: openness > OPEN_THRESHOLD,
        anchor: anchor_from_normalized(wrist.x, wrist.y),
    }))
}
