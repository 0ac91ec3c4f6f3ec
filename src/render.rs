// Software renderer for the particle scene.
//
// Draw order per frame: clear, photo ring cards (textured quads, 0.8
// opacity), hearts (0.9 opacity), then particles as soft round sprites with
// additive blending and no depth test, so overlaps brighten instead of
// occluding.

use std::path::Path;

use glam::{Quat, Vec2, Vec3};
use image::RgbImage;
use image::imageops::FilterType;
use tracing::{debug, warn};

use crate::error::Error;
use crate::field::ParticleField;
use crate::gamma::GammaLut;
use crate::shader;
use crate::types::FrameBuffer;
use crate::visual::{CARD_SIZE, VisualStateMachine};

pub const CAMERA_Z: f32 = 10.0;
pub const CAMERA_FOV_DEG: f32 = 55.0;
/// Point sizes are authored for a viewport this tall.
const REFERENCE_HEIGHT: f32 = 1000.0;

pub const CARD_OPACITY: f32 = 0.8;
pub const HEART_OPACITY: f32 = 0.9;
/// #FF69B4
pub const HEART_COLOR: [u8; 3] = [0xFF, 0x69, 0xB4];
/// Photo textures are downsampled to this before use.
pub const PHOTO_TEX_SIZE: (u32, u32) = (128, 160);

/// Fixed pinhole camera on +Z looking at the origin.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub width: f32,
    pub height: f32,
    focal: f32,
}

impl Camera {
    pub fn new(width: usize, height: usize) -> Self {
        let half_fov = CAMERA_FOV_DEG.to_radians() / 2.0;
        Self { width: width as f32, height: height as f32, focal: height as f32 / 2.0 / half_fov.tan() }
    }

    /// Screen position and view depth, or `None` behind the near plane.
    pub fn project(&self, world: Vec3) -> Option<(Vec2, f32)> {
        let depth = CAMERA_Z - world.z;
        if depth < 0.1 {
            return None;
        }
        let s = self.focal / depth;
        Some((Vec2::new(self.width / 2.0 + world.x * s, self.height / 2.0 - world.y * s), depth))
    }
}

/// Load one ring photo, downsampled to [`PHOTO_TEX_SIZE`].
pub fn load_photo(path: &Path) -> Result<RgbImage, Error> {
    let img = image::open(path).map_err(|source| Error::Photo { path: path.display().to_string(), source })?;
    let (w, h) = PHOTO_TEX_SIZE;
    Ok(img.resize_to_fill(w, h, FilterType::Triangle).to_rgb8())
}

/// Stand-in card when no photos were given: pink with a white border.
pub fn placeholder_photo(tint: [u8; 3]) -> RgbImage {
    let (w, h) = PHOTO_TEX_SIZE;
    RgbImage::from_fn(w, h, |x, y| {
        let border = x < 6 || y < 6 || x >= w - 6 || y >= h - 6;
        if border {
            image::Rgb([255, 255, 255])
        } else {
            let t = y as f32 / h as f32;
            let shade = |c: u8| (c as f32 * (0.75 + 0.25 * t)) as u8;
            image::Rgb([shade(tint[0]), shade(tint[1]), shade(tint[2])])
        }
    })
}

#[inline]
fn add_rgb_saturating(fb: &mut FrameBuffer, x: i32, y: i32, rgb: Vec3) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= fb.width || y >= fb.height {
        return;
    }
    let idx = y * fb.width + x;
    let old = fb.pixels[idx];
    let add = |shift: u32, v: f32| {
        let o = (old >> shift) & 0xFF;
        (o + (v * 255.0).round().clamp(0.0, 255.0) as u32).min(255) << shift
    };
    fb.pixels[idx] = add(16, rgb.x) | add(8, rgb.y) | add(0, rgb.z);
}

/// Soft round sprite of `diameter` pixels, added onto the framebuffer.
/// Returns how many pixels were visited; 0 when the sprite is off screen.
fn draw_sprite(fb: &mut FrameBuffer, center: Vec2, diameter: f32, color: Vec3, alpha: f32) -> usize {
    let r = (diameter / 2.0).ceil() as i32;
    if r <= 0 {
        return 0;
    }
    let (cx, cy) = (center.x.round() as i32, center.y.round() as i32);
    let (x0, x1) = ((cx - r).max(0), (cx + r).min(fb.width as i32 - 1));
    let (y0, y1) = ((cy - r).max(0), (cy + r).min(fb.height as i32 - 1));
    if x0 > x1 || y0 > y1 {
        return 0;
    }
    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = (x as f32 + 0.5 - center.x) / diameter;
            let dy = (y as f32 + 0.5 - center.y) / diameter;
            if let Some(edge) = shader::sprite_coverage(dx, dy) {
                add_rgb_saturating(fb, x, y, color * (edge * alpha));
            }
        }
    }
    ((x1 - x0 + 1) * (y1 - y0 + 1)) as usize
}

/// What one particle pass cost.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpriteStats {
    /// Particles that touched the screen.
    pub drawn: usize,
    /// Pixels visited over all sprites.
    pub area: usize,
    /// Widest sprite, in pixels.
    pub max_diameter: usize,
}

/// Inside test for the classic implicit heart, (x²+y²−1)³ − x²y³ ≤ 0, on a
/// unit box centered at the origin with y up.
#[inline]
pub fn heart_contains(x: f32, y: f32) -> bool {
    let (x, y) = (x * 1.25, y * 1.25 + 0.15);
    let a = x * x + y * y - 1.0;
    a * a * a - x * x * y * y * y <= 0.0
}

pub struct Renderer {
    camera: Camera,
    lut: GammaLut,
    photos: Vec<RgbImage>,
    clear: u32,
}

impl Renderer {
    /// Ring members alternate through `photos`; an empty list uses
    /// placeholder cards.
    pub fn new(width: usize, height: usize, photos: Vec<RgbImage>, tint: [u8; 3]) -> Self {
        let photos = if photos.is_empty() {
            debug!("no ring photos, using placeholders");
            vec![placeholder_photo(tint), placeholder_photo([tint[1], tint[0], tint[2]])]
        } else {
            photos
        };
        Self { camera: Camera::new(width, height), lut: GammaLut::new(), photos, clear: 0 }
    }

    /// Load every path, skipping (with a warning) the ones that fail.
    pub fn load_photos<P: AsRef<Path>>(paths: &[P]) -> Vec<RgbImage> {
        paths
            .iter()
            .filter_map(|p| match load_photo(p.as_ref()) {
                Ok(img) => Some(img),
                Err(e) => {
                    warn!(error = %e, "skipping ring photo");
                    None
                }
            })
            .collect()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn render(&self, fb: &mut FrameBuffer, vsm: &VisualStateMachine, field: &ParticleField) {
        fb.fill(self.clear);
        if vsm.ring().is_visible() {
            self.draw_ring(fb, vsm);
        }
        if vsm.hearts().is_visible() {
            self.draw_hearts(fb, vsm);
        }
        self.draw_particles(fb, vsm, field);
    }

    /// Every particle through the vertex/fragment math. Sprites that land
    /// entirely off screen are culled.
    pub fn draw_particles(&self, fb: &mut FrameBuffer, vsm: &VisualStateMachine, field: &ParticleField) -> SpriteStats {
        let u = vsm.uniforms();
        let spin = Quat::from_rotation_y(vsm.spin());
        let anchor = vsm.anchor3();
        let alpha = shader::point_alpha(u);
        let px_scale = self.camera.height / REFERENCE_HEIGHT;

        let mut stats = SpriteStats::default();
        for (target, seed) in field.targets.iter().zip(&field.seeds) {
            let local = shader::particle_position(*target, *seed, u);
            let Some((screen, depth)) = self.camera.project(anchor + spin * local) else {
                continue;
            };
            let size = (shader::point_size(u, depth) * px_scale).max(1.0);
            let area = draw_sprite(fb, screen, size, shader::point_color(u, *seed), alpha);
            if area > 0 {
                stats.drawn += 1;
                stats.area += area;
                stats.max_diameter = stats.max_diameter.max(size.ceil() as usize);
            }
        }
        stats
    }

    fn draw_ring(&self, fb: &mut FrameBuffer, vsm: &VisualStateMachine) {
        let ring = vsm.ring();
        let anchor = vsm.anchor3();
        let half = CARD_SIZE / 2.0;
        let corners = [
            Vec3::new(-half.x, -half.y, 0.0),
            Vec3::new(half.x, -half.y, 0.0),
            Vec3::new(half.x, half.y, 0.0),
            Vec3::new(-half.x, half.y, 0.0),
        ];
        let uvs = [Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 0.0)];

        // Far cards first so nearer ones composite on top.
        let mut order: Vec<(usize, f32)> = ring
            .members
            .iter()
            .enumerate()
            .map(|(i, m)| (i, ring.world_point(anchor, m, Vec3::ZERO).z))
            .collect();
        order.sort_by(|a, b| a.1.total_cmp(&b.1));

        for (i, _) in order {
            let member = &ring.members[i];
            let mut pts = [Vec2::ZERO; 4];
            let mut visible = true;
            for (slot, c) in pts.iter_mut().zip(corners) {
                match self.camera.project(ring.world_point(anchor, member, c)) {
                    Some((p, _)) => *slot = p,
                    None => visible = false,
                }
            }
            if !visible {
                continue;
            }
            let tex = &self.photos[i % self.photos.len()];
            self.fill_textured_triangle(fb, [pts[0], pts[1], pts[2]], [uvs[0], uvs[1], uvs[2]], tex);
            self.fill_textured_triangle(fb, [pts[0], pts[2], pts[3]], [uvs[0], uvs[2], uvs[3]], tex);
        }
    }

    /// Barycentric fill, double sided, nearest-texel sampling.
    fn fill_textured_triangle(&self, fb: &mut FrameBuffer, p: [Vec2; 3], uv: [Vec2; 3], tex: &RgbImage) {
        let area = edge(p[0], p[1], p[2]);
        if area.abs() < 1e-6 {
            return;
        }
        let min = p[0].min(p[1]).min(p[2]).max(Vec2::ZERO);
        let max = p[0].max(p[1]).max(p[2]).min(Vec2::new(fb.width as f32 - 1.0, fb.height as f32 - 1.0));
        if min.x > max.x || min.y > max.y {
            return;
        }
        let (tw, th) = tex.dimensions();
        for y in min.y.floor() as usize..=max.y.ceil() as usize {
            if y >= fb.height {
                break;
            }
            for x in min.x.floor() as usize..=max.x.ceil() as usize {
                if x >= fb.width {
                    break;
                }
                let q = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let w0 = edge(p[1], p[2], q) / area;
                let w1 = edge(p[2], p[0], q) / area;
                let w2 = 1.0 - w0 - w1;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }
                let t = uv[0] * w0 + uv[1] * w1 + uv[2] * w2;
                let tx = ((t.x * tw as f32) as u32).min(tw - 1);
                let ty = ((t.y * th as f32) as u32).min(th - 1);
                let texel = tex.get_pixel(tx, ty).0;
                let idx = y * fb.width + x;
                fb.pixels[idx] = self.lut.blend_over(fb.pixels[idx], texel, CARD_OPACITY);
            }
        }
    }

    fn draw_hearts(&self, fb: &mut FrameBuffer, vsm: &VisualStateMachine) {
        let hearts = vsm.hearts();
        let anchor = vsm.anchor3();
        for local in &hearts.hearts {
            let center = hearts.world_point(anchor, *local);
            let Some((screen, depth)) = self.camera.project(center) else {
                continue;
            };
            // Heart shape is ~1.2 units wide at scale 1.
            let size = 1.2 * hearts.scale * self.camera.focal / depth;
            self.fill_heart(fb, screen, size);
        }
    }

    fn fill_heart(&self, fb: &mut FrameBuffer, center: Vec2, size: f32) {
        let r = (size / 2.0).ceil() as i32;
        if r <= 0 {
            return;
        }
        let (cx, cy) = (center.x.round() as i32, center.y.round() as i32);
        for y in (cy - r).max(0)..=(cy + r).min(fb.height as i32 - 1) {
            for x in (cx - r).max(0)..=(cx + r).min(fb.width as i32 - 1) {
                let hx = (x as f32 + 0.5 - center.x) / size * 2.0;
                let hy = -(y as f32 + 0.5 - center.y) / size * 2.0;
                if heart_contains(hx, hy) {
                    let idx = y as usize * fb.width + x as usize;
                    fb.pixels[idx] = self.lut.blend_over(fb.pixels[idx], HEART_COLOR, HEART_OPACITY);
                }
            }
        }
    }
}

#[inline]
fn edge(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debounce::CommittedGesture;
    use crate::gesture::GestureState;
    use crate::pattern::Pattern;
    use crate::types::DeviceClass;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn lit(fb: &FrameBuffer) -> usize {
        fb.pixels.iter().filter(|p| **p != 0).count()
    }

    #[test]
    fn origin_projects_to_screen_center() {
        let cam = Camera::new(960, 540);
        let (p, depth) = cam.project(Vec3::ZERO).unwrap();
        assert_eq!(p, Vec2::new(480.0, 270.0));
        assert_eq!(depth, CAMERA_Z);
        assert!(cam.project(Vec3::new(0.0, 0.0, 10.0)).is_none());
    }

    #[test]
    fn up_is_up_on_screen() {
        let cam = Camera::new(200, 100);
        let (p, _) = cam.project(Vec3::new(1.0, 1.0, 0.0)).unwrap();
        assert!(p.x > 100.0 && p.y < 50.0);
    }

    #[test]
    fn heart_shape_has_lobes_and_point() {
        assert!(heart_contains(0.0, 0.0));
        assert!(heart_contains(-0.4, 0.4));
        assert!(!heart_contains(0.0, 0.95));
        assert!(!heart_contains(0.9, -0.9));
    }

    #[test]
    fn sprites_add_up() {
        let mut fb = FrameBuffer::new(20, 20);
        let c = Vec2::new(10.0, 10.0);
        draw_sprite(&mut fb, c, 8.0, Vec3::new(0.3, 0.0, 0.0), 1.0);
        let once = fb.pixels[10 * 20 + 10] >> 16;
        draw_sprite(&mut fb, c, 8.0, Vec3::new(0.3, 0.0, 0.0), 1.0);
        let twice = fb.pixels[10 * 20 + 10] >> 16;
        assert!(twice > once);
        // Corners of the bounding box are outside the round sprite.
        assert_eq!(fb.pixels[6 * 20 + 6], 0);
    }

    #[test]
    fn idle_scene_draws_particles_only() {
        let mut rng = StdRng::seed_from_u64(2);
        let field = ParticleField::generate("HI", 300, DeviceClass::Desktop, &mut rng);
        let vsm = VisualStateMachine::new(Vec3::new(1.0, 0.71, 0.76), DeviceClass::Desktop);
        let r = Renderer::new(320, 180, Vec::new(), [255, 182, 193]);
        let mut fb = FrameBuffer::new(320, 180);
        r.render(&mut fb, &vsm, &field);
        assert!(!vsm.ring().is_visible());
        assert!(lit(&fb) > 0);
        let mut again = FrameBuffer::new(320, 180);
        assert!(r.draw_particles(&mut again, &vsm, &field).drawn > 0);
    }

    #[test]
    fn visible_ring_paints_cards() {
        let mut rng = StdRng::seed_from_u64(2);
        let field = ParticleField::generate("HI", 0, DeviceClass::Desktop, &mut rng);
        let mut vsm = VisualStateMachine::new(Vec3::ONE, DeviceClass::Desktop);
        vsm.set_started(true);
        let two_open = CommittedGesture { hand_count: 2, is_open: true };
        for _ in 0..60 {
            vsm.tick(1.0 / 60.0, Pattern::Scatter, two_open, &GestureState::default());
        }
        let r = Renderer::new(320, 180, Vec::new(), [255, 182, 193]);
        let mut fb = FrameBuffer::new(320, 180);
        r.render(&mut fb, &vsm, &field);
        assert!(lit(&fb) > 500);
    }

    #[test]
    fn off_screen_sprites_are_culled() {
        let mut fb = FrameBuffer::new(20, 20);
        assert_eq!(draw_sprite(&mut fb, Vec2::new(-50.0, 10.0), 8.0, Vec3::ONE, 1.0), 0);
        assert_eq!(draw_sprite(&mut fb, Vec2::new(10.0, 400.0), 8.0, Vec3::ONE, 1.0), 0);
        assert_eq!(lit(&fb), 0);
        // Clipped at the edge: only the visible part is visited.
        assert!(draw_sprite(&mut fb, Vec2::new(0.0, 0.0), 8.0, Vec3::ONE, 1.0) <= 25);
    }

    #[test]
    fn vortex_scatter_sprites_stay_bounded() {
        let mut rng = StdRng::seed_from_u64(9);
        let field = ParticleField::generate("HAPPY\nVALENTINE'S DAY", 3000, DeviceClass::Desktop, &mut rng);
        let mut vsm = VisualStateMachine::new(Vec3::new(1.0, 0.71, 0.76), DeviceClass::Desktop);
        vsm.set_started(true);
        let two_open = CommittedGesture { hand_count: 2, is_open: true };
        let gesture = GestureState { is_detected: true, hand_count: 2, is_open: true, ..Default::default() };
        let r = Renderer::new(960, 540, Vec::new(), [255, 182, 193]);
        let mut fb = FrameBuffer::new(960, 540);

        let cap = (shader::MAX_POINT_SIZE * 540.0 / REFERENCE_HEIGHT).ceil() as usize;
        for i in 0..120 {
            vsm.tick(1.0 / 60.0, Pattern::Scatter, two_open, &gesture);
            if i % 20 != 19 {
                continue;
            }
            let stats = r.draw_particles(&mut fb, &vsm, &field);
            assert!(stats.max_diameter <= cap, "{stats:?}");
            // A sprite visits at most its (2r+1)² box.
            assert!(stats.area <= 3000 * (cap + 3) * (cap + 3), "{stats:?}");
        }
        assert!(vsm.uniforms().photo_mix > 0.9);
    }

    #[test]
    fn missing_photo_is_skipped() {
        let photos = Renderer::load_photos(&["/nonexistent/photo.png"]);
        assert!(photos.is_empty());
    }
}
