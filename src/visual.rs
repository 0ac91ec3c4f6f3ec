// Visual state machine.
//
// Turns the committed gesture and the current `Pattern` into smoothly
// interpolated `Uniforms`, moves the particle cluster toward the hand, and
// lays out the two ornaments: the orbiting photo ring (visible as the vortex
// takes over) and the floating hearts (visible only while the fist holds the
// text formation).

use std::f32::consts::{PI, TAU};

use glam::{Mat3, Quat, Vec2, Vec3};

use crate::debounce::CommittedGesture;
use crate::gesture::GestureState;
use crate::pattern::Pattern;
use crate::shader::Uniforms;
use crate::types::DeviceClass;

pub const PHOTO_MIX_RATE: f32 = 0.1;
pub const OPENNESS_RATE: f32 = 0.15;
pub const ANCHOR_FOLLOW_RATE: f32 = 0.1;
pub const ANCHOR_RELAX_RATE: f32 = 0.05;
pub const HEART_SCALE_RATE: f32 = 0.1;

/// Text formation color (#FF00FF).
pub const ACCENT_COLOR: Vec3 = Vec3::new(1.0, 0.0, 1.0);
/// Per-particle secondary color (#FF1493).
pub const SECONDARY_COLOR: Vec3 = Vec3::new(1.0, 20.0 / 255.0, 147.0 / 255.0);

pub const RING_MEMBERS: usize = 12;
pub const RING_BASE_RADIUS: f32 = 3.8;
pub const RING_RADIUS_STEP: f32 = 0.2;
pub const CARD_SIZE: Vec2 = Vec2::new(2.2, 2.8);

pub const HEART_COUNT: usize = 6;
pub const HEART_RING_RADIUS: f32 = 3.5;

/// Exponential smoothing step. The result always lies between `current`
/// and `target`.
#[inline]
pub fn approach(current: f32, target: f32, rate: f32) -> f32 {
    let next = current + (target - current) * rate.clamp(0.0, 1.0);
    if target >= current { next.min(target) } else { next.max(target) }
}

/// One photo card: local position inside the ring group and its facing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RingMember {
    pub position: Vec3,
    pub orientation: Quat,
}

/// The orbiting photo ring. Group transform: translate(anchor) *
/// rotate_z(spin) * scale(photo_mix).
#[derive(Clone, Debug)]
pub struct PhotoRing {
    pub members: Vec<RingMember>,
    pub scale: f32,
    pub spin: f32,
}

impl PhotoRing {
    fn new() -> Self {
        Self {
            members: vec![RingMember { position: Vec3::ZERO, orientation: Quat::IDENTITY }; RING_MEMBERS],
            scale: 0.0,
            spin: 0.0,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.scale > 1e-3
    }

    /// Redistribute every member on its circle and turn it to face the ring
    /// center, then flip it half a turn so the photo reads the right way.
    fn layout(&mut self, elapsed: f32) {
        let n = self.members.len() as f32;
        for (i, m) in self.members.iter_mut().enumerate() {
            let fi = i as f32;
            let t = elapsed * 1.5 + fi / n * TAU;
            let radius = RING_BASE_RADIUS + fi * RING_RADIUS_STEP;
            m.position = Vec3::new(t.cos() * radius, t.sin() * radius, (t * 0.8 + fi).sin() * 2.5);
            m.orientation = facing(m.position, Vec3::ZERO) * Quat::from_rotation_y(PI);
        }
    }

    /// World-space transform of a point given in a member's local frame.
    pub fn world_point(&self, anchor: Vec3, member: &RingMember, local: Vec3) -> Vec3 {
        let in_group = member.position + member.orientation * local;
        anchor + Quat::from_rotation_z(self.spin) * (in_group * self.scale)
    }
}

/// Rotation whose +Z axis points from `from` toward `to`.
fn facing(from: Vec3, to: Vec3) -> Quat {
    let z = (to - from).normalize_or_zero();
    if z == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let up = if z.y.abs() > 0.999 { Vec3::Z } else { Vec3::Y };
    let x = up.cross(z).normalize();
    let y = z.cross(x);
    Quat::from_mat3(&Mat3::from_cols(x, y, z))
}

/// Six hearts circling the text while the fist is held.
#[derive(Clone, Debug)]
pub struct HeartRing {
    /// Local heart centers (before group scale/spin).
    pub hearts: Vec<Vec3>,
    pub scale: f32,
    pub spin: f32,
}

impl HeartRing {
    fn new() -> Self {
        let hearts = (0..HEART_COUNT)
            .map(|i| {
                let a = i as f32 / HEART_COUNT as f32 * TAU;
                Vec3::new(a.cos() * HEART_RING_RADIUS, 0.0, a.sin() * HEART_RING_RADIUS)
            })
            .collect();
        Self { hearts, scale: 0.0, spin: 0.0 }
    }

    pub fn is_visible(&self) -> bool {
        self.scale > 1e-3
    }

    fn bob(&mut self, elapsed: f32) {
        for (i, h) in self.hearts.iter_mut().enumerate() {
            h.y = (elapsed + i as f32 * 2.0).sin() * 0.4;
        }
    }

    pub fn world_point(&self, anchor: Vec3, local: Vec3) -> Vec3 {
        anchor + Quat::from_rotation_y(self.spin) * (local * self.scale)
    }
}

pub struct VisualStateMachine {
    uniforms: Uniforms,
    base_color: Vec3,
    started: bool,
    /// Cluster origin in scene units (follows the hand).
    anchor: Vec2,
    /// Cluster rotation about Y.
    spin: f32,
    ring: PhotoRing,
    hearts: HeartRing,
}

impl VisualStateMachine {
    pub fn new(base_color: Vec3, device: DeviceClass) -> Self {
        Self {
            uniforms: Uniforms {
                color: base_color,
                color2: SECONDARY_COLOR,
                constrained: device.is_constrained(),
                ..Default::default()
            },
            base_color,
            started: false,
            anchor: Vec2::ZERO,
            spin: 0.0,
            ring: PhotoRing::new(),
            hearts: HeartRing::new(),
        }
    }

    pub fn uniforms(&self) -> &Uniforms {
        &self.uniforms
    }

    pub fn anchor(&self) -> Vec2 {
        self.anchor
    }

    pub fn spin(&self) -> f32 {
        self.spin
    }

    pub fn ring(&self) -> &PhotoRing {
        &self.ring
    }

    pub fn hearts(&self) -> &HeartRing {
        &self.hearts
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Flip the start gate. Starting snaps openness back to fully dispersed.
    pub fn set_started(&mut self, started: bool) {
        self.started = started;
        self.uniforms.has_started = if started { 1.0 } else { 0.0 };
        if started {
            self.uniforms.openness = 1.0;
        }
    }

    pub fn target_photo_mix(pattern: Pattern, gesture: CommittedGesture) -> f32 {
        if gesture.hand_count >= 2 || pattern == Pattern::Vortex { 1.0 } else { 0.0 }
    }

    /// Collapse into the text only for a started session showing the text
    /// pattern with a committed closed hand.
    pub fn target_openness(started: bool, pattern: Pattern, gesture: CommittedGesture) -> f32 {
        if started && pattern == Pattern::Text && !gesture.is_open { 0.0 } else { 1.0 }
    }

    /// One render tick of `dt` seconds.
    pub fn tick(&mut self, dt: f32, pattern: Pattern, gesture: CommittedGesture, raw: &GestureState) {
        let u = &mut self.uniforms;
        u.time += dt;
        u.photo_mix = approach(u.photo_mix, Self::target_photo_mix(pattern, gesture), PHOTO_MIX_RATE);
        u.openness = approach(
            u.openness,
            Self::target_openness(self.started, pattern, gesture),
            OPENNESS_RATE,
        );
        // Discrete, not smoothed.
        u.color = if pattern == Pattern::Text { ACCENT_COLOR } else { self.base_color };

        match raw.live_anchor().filter(|_| self.started) {
            Some(hand) => {
                self.anchor.x = approach(self.anchor.x, hand.x, ANCHOR_FOLLOW_RATE);
                self.anchor.y = approach(self.anchor.y, hand.y, ANCHOR_FOLLOW_RATE);
            }
            None => {
                self.anchor.x = approach(self.anchor.x, 0.0, ANCHOR_RELAX_RATE);
                self.anchor.y = approach(self.anchor.y, 0.0, ANCHOR_RELAX_RATE);
            }
        }

        let mix = self.uniforms.photo_mix;
        let openness = self.uniforms.openness;
        let elapsed = self.uniforms.time;

        self.spin += dt * (0.2 + mix * 0.5);

        self.ring.scale = mix;
        self.ring.spin += dt * 2.5 * mix;
        self.ring.layout(elapsed);

        let show_hearts = (1.0 - openness) * (1.0 - mix);
        self.hearts.scale = approach(self.hearts.scale, show_hearts, HEART_SCALE_RATE);
        self.hearts.spin += dt * 0.8;
        self.hearts.bob(elapsed);
    }

    /// Cluster origin as a 3D point.
    pub fn anchor3(&self) -> Vec3 {
        self.anchor.extend(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DT: f32 = 1.0 / 60.0;

    fn vsm() -> VisualStateMachine {
        let mut v = VisualStateMachine::new(Vec3::new(1.0, 0.71, 0.76), DeviceClass::Desktop);
        v.set_started(true);
        v
    }

    fn g(hand_count: u8, is_open: bool) -> CommittedGesture {
        CommittedGesture { hand_count, is_open }
    }

    #[test]
    fn two_hands_raise_photo_mix() {
        let mut v = vsm();
        let raw = GestureState::default();
        for _ in 0..60 {
            v.tick(DT, Pattern::Scatter, g(2, true), &raw);
        }
        assert!(v.uniforms().photo_mix > 0.99);
        assert!(v.ring().is_visible());
        assert!(v.hearts().scale < 1e-3);
    }

    #[test]
    fn closed_fist_on_text_collapses() {
        let mut v = vsm();
        let raw = GestureState::default();
        for _ in 0..60 {
            v.tick(DT, Pattern::Text, g(1, false), &raw);
        }
        assert!(v.uniforms().openness < 0.01);
        assert_eq!(v.uniforms().color, ACCENT_COLOR);
        assert!(v.hearts().scale > 0.9);
    }

    #[test]
    fn nothing_collapses_before_start() {
        let mut v = VisualStateMachine::new(Vec3::ONE, DeviceClass::Desktop);
        for _ in 0..60 {
            v.tick(DT, Pattern::Text, g(1, false), &GestureState::default());
        }
        assert_eq!(v.uniforms().openness, 1.0);
    }

    #[test]
    fn manual_vortex_drives_photo_mix() {
        assert_eq!(VisualStateMachine::target_photo_mix(Pattern::Vortex, g(0, false)), 1.0);
        assert_eq!(VisualStateMachine::target_photo_mix(Pattern::Scatter, g(1, true)), 0.0);
    }

    #[test]
    fn anchor_follows_hand_then_relaxes() {
        let mut v = vsm();
        let raw = GestureState { is_detected: true, hand_count: 1, anchor: Vec2::new(1.0, -0.5), ..Default::default() };
        v.tick(DT, Pattern::Scatter, g(1, true), &raw);
        assert!((v.anchor().x - 0.1).abs() < 1e-6);
        assert!((v.anchor().y + 0.05).abs() < 1e-6);

        let lost = GestureState { is_detected: false, ..raw };
        v.tick(DT, Pattern::Scatter, g(0, false), &lost);
        assert!((v.anchor().x - 0.095).abs() < 1e-6);
    }

    #[test]
    fn ring_members_spread_and_face_the_center() {
        let mut v = vsm();
        v.tick(DT, Pattern::Scatter, g(2, true), &GestureState::default());
        let ring = v.ring();
        for (i, m) in ring.members.iter().enumerate() {
            let planar = m.position.truncate().length();
            assert!((planar - (RING_BASE_RADIUS + i as f32 * RING_RADIUS_STEP)).abs() < 1e-4);
            // After the half-turn flip, local -Z points at the center.
            let toward_center = (-m.position).normalize();
            let back = m.orientation * Vec3::NEG_Z;
            assert!(back.dot(toward_center) > 0.999, "member {i}");
        }
    }

    proptest! {
        #[test]
        fn approach_never_overshoots(start in 0.0f32..=1.0, target in prop::bool::ANY, rate in 0.0f32..=1.0, steps in 1usize..200) {
            let target = if target { 1.0 } else { 0.0 };
            let mut cur = start;
            let mut prev_gap = (target - cur).abs();
            for _ in 0..steps {
                cur = approach(cur, target, rate);
                let gap = (target - cur).abs();
                prop_assert!((0.0..=1.0).contains(&cur));
                prop_assert!(gap <= prev_gap + 1e-7);
                prev_gap = gap;
            }
        }
    }
}
