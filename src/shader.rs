// Per-particle vertex and fragment math.
//
// Everything here is a pure function of a particle's fixed inputs (text
// target, random seed) and the global `Uniforms`, so the formation logic
// can be tested without any rendering backend.

use std::f32::consts::PI;

use glam::Vec3;

/// Global blend parameters, written once per render tick by the visual
/// state machine and read by the renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Uniforms {
    /// Seconds since the render loop started.
    pub time: f32,
    /// 1 = dispersed, 0 = converged into the text.
    pub openness: f32,
    /// 0 = text/scatter, 1 = vortex around the photo ring.
    pub photo_mix: f32,
    /// 0 before the user starts, 1 after.
    pub has_started: f32,
    pub color: Vec3,
    pub color2: Vec3,
    pub constrained: bool,
}

impl Default for Uniforms {
    fn default() -> Self {
        Self {
            time: 0.0,
            openness: 1.0,
            photo_mix: 0.0,
            has_started: 0.0,
            color: Vec3::ONE,
            color2: Vec3::ONE,
            constrained: false,
        }
    }
}

#[inline]
pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Cheap periodic wobble, amplitude 0.1.
#[inline]
pub fn noise3d(p: Vec3, time: f32) -> Vec3 {
    Vec3::new((p.x * 10.0 + time).sin(), (p.y * 10.0 + time).sin(), (p.z * 10.0 + time).sin()) * 0.1
}

/// Scatter strength: fully dispersed until started, then the openness.
#[inline]
pub fn effective_scatter(u: &Uniforms) -> f32 {
    mix(1.0, u.openness, u.has_started)
}

/// Position on this particle's own orbit. Radius, speed and phase all come
/// from the seed, so each particle keeps a consistent path.
pub fn vortex_target(seed: Vec3, time: f32) -> Vec3 {
    let radius = mix(3.0, 8.5, seed.y);
    let speed = time * mix(1.5, 3.0, seed.x);
    let angle = seed.x * 2.0 * PI + speed;
    Vec3::new(angle.cos() * radius, angle.sin() * radius, (seed.z - 0.5) * 10.0)
}

/// Seed-centered random offset.
#[inline]
pub fn scatter_displacement(seed: Vec3, scatter: f32) -> Vec3 {
    (seed - Vec3::splat(0.5)) * scatter * 5.0
}

/// Push outward along the particle's own direction, wobbled by noise.
#[inline]
pub fn explosion_displacement(target: Vec3, time: f32, scatter: f32) -> Vec3 {
    (target + noise3d(target * 0.1, time)).normalize_or_zero() * scatter * 5.0
}

/// Final model-space position of one particle.
pub fn particle_position(text_target: Vec3, seed: Vec3, u: &Uniforms) -> Vec3 {
    let scatter = effective_scatter(u);
    let target = text_target.lerp(vortex_target(seed, u.time), u.photo_mix);
    target + scatter_displacement(seed, scatter) + explosion_displacement(target, u.time, scatter)
}

/// Largest point diameter, like a GL point size range. Authored at the
/// reference viewport height.
pub const MAX_POINT_SIZE: f32 = 64.0;

/// Point diameter in pixels at view depth `depth` (> 0, distance in front of
/// the camera). Smaller on constrained displays; never above
/// [`MAX_POINT_SIZE`].
pub fn point_size(u: &Uniforms, depth: f32) -> f32 {
    let base = mix(if u.constrained { 3.0 } else { 4.5 }, 6.0, u.photo_mix);
    (base * (45.0 / depth.max(0.1))).min(MAX_POINT_SIZE)
}

/// Sprite alpha; lower on constrained displays so additive blending does not
/// clump the text into a blob.
pub fn point_alpha(u: &Uniforms) -> f32 {
    mix(if u.constrained { 0.4 } else { 0.7 }, 0.45, u.photo_mix)
}

#[inline]
pub fn point_color(u: &Uniforms, seed: Vec3) -> Vec3 {
    u.color.lerp(u.color2, seed.z)
}

/// Fragment coverage of a round sprite at offset (`dx`, `dy`) from its
/// center, in sprite units (the sprite spans -0.5..0.5). `None` = discard.
pub fn sprite_coverage(dx: f32, dy: f32) -> Option<f32> {
    let dist = (dx * dx + dy * dy).sqrt();
    if dist > 0.5 {
        return None;
    }
    Some(smoothstep(0.5, 0.45, dist))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(openness: f32, photo_mix: f32) -> Uniforms {
        Uniforms { openness, photo_mix, has_started: 1.0, ..Default::default() }
    }

    #[test]
    fn converged_text_sits_on_target() {
        let target = Vec3::new(1.2, -0.4, 0.02);
        let seed = Vec3::new(0.9, 0.1, 0.7);
        let p = particle_position(target, seed, &started(0.0, 0.0));
        assert!((p - target).length() < 1e-6);
    }

    #[test]
    fn not_started_is_fully_scattered() {
        let u = Uniforms { openness: 0.0, has_started: 0.0, ..Default::default() };
        assert_eq!(effective_scatter(&u), 1.0);
    }

    #[test]
    fn full_photo_mix_follows_the_orbit() {
        let seed = Vec3::new(0.25, 0.5, 0.5);
        let u = Uniforms { time: 2.0, ..started(0.0, 1.0) };
        let p = particle_position(Vec3::new(3.0, 3.0, 0.0), seed, &u);
        let orbit = vortex_target(seed, 2.0);
        assert!((p - orbit).length() < 1e-5);
        // radius is mix(3, 8.5, seed.y)
        let r = (p.x * p.x + p.y * p.y).sqrt();
        assert!((r - 5.75).abs() < 1e-4);
    }

    #[test]
    fn orbit_is_periodic_per_particle() {
        let seed = Vec3::new(0.0, 0.0, 0.5);
        // speed 1.5 rad/s for seed.x = 0
        let a = vortex_target(seed, 0.0);
        let b = vortex_target(seed, 2.0 * PI / 1.5);
        assert!((a - b).length() < 1e-4);
    }

    #[test]
    fn scatter_pushes_away_from_target() {
        let target = Vec3::new(2.0, 0.0, 0.0);
        let seed = Vec3::splat(0.5);
        let p = particle_position(target, seed, &started(1.0, 0.0));
        assert!(p.length() > target.length() + 4.0);
    }

    #[test]
    fn explosion_at_origin_is_finite() {
        let d = explosion_displacement(Vec3::ZERO, 0.0, 1.0);
        assert!(d.is_finite());
    }

    #[test]
    fn constrained_points_are_smaller_and_dimmer() {
        let desktop = started(1.0, 0.0);
        let phone = Uniforms { constrained: true, ..desktop };
        assert!(point_size(&phone, 10.0) < point_size(&desktop, 10.0));
        assert!(point_alpha(&phone) < point_alpha(&desktop));
        assert!((point_size(&desktop, 10.0) - 20.25).abs() < 1e-4);
    }

    #[test]
    fn points_near_the_camera_are_capped() {
        let u = started(1.0, 1.0);
        assert_eq!(point_size(&u, 0.1), MAX_POINT_SIZE);
        assert_eq!(point_size(&u, 1.0), MAX_POINT_SIZE);
        assert!(point_size(&u, 10.0) < MAX_POINT_SIZE);
    }

    #[test]
    fn sprite_is_round_with_soft_edge() {
        assert_eq!(sprite_coverage(0.0, 0.0), Some(1.0));
        assert_eq!(sprite_coverage(0.4, 0.4), None);
        let edge = sprite_coverage(0.475, 0.0).unwrap();
        assert!(edge > 0.0 && edge < 1.0);
    }

    #[test]
    fn color_mixes_by_seed_depth() {
        let u = Uniforms { color: Vec3::X, color2: Vec3::Z, ..Default::default() };
        assert_eq!(point_color(&u, Vec3::new(0.3, 0.3, 0.0)), Vec3::X);
        assert_eq!(point_color(&u, Vec3::new(0.3, 0.3, 1.0)), Vec3::Z);
    }
}
