// Particle field generator.
//
// Rasterizes a (possibly multi-line) message onto a fixed off-screen canvas,
// keeps every pixel brighter than `LUMINANCE_THRESHOLD` as a candidate and
// hands each particle a candidate by even striding. Only the depth jitter is
// random, so the x/y targets are reproducible for a given message, canvas
// and particle count.

use glam::Vec3;
use image::{GrayImage, Luma};
use rand::Rng;
use tracing::debug;

use crate::font::{self, ADVANCE, GLYPH_H, GLYPH_W};
use crate::types::DeviceClass;

pub const CANVAS_WIDTH: u32 = 1024;
pub const CANVAS_HEIGHT: u32 = 512;
/// Glyph height in canvas pixels.
pub const FONT_PX: f32 = 110.0;
pub const LINE_HEIGHT: f32 = 115.0;
/// Lines wider than this share of the canvas are shrunk to fit.
const MAX_LINE_FILL: f32 = 0.96;
pub const LUMINANCE_THRESHOLD: u8 = 100;
pub const DEPTH_JITTER: f32 = 0.1;

pub const DEFAULT_MESSAGE: &str = "HAPPY\nVALENTINE'S DAY\nBEBE";
pub const DEFAULT_PARTICLE_COUNT: usize = 3000;

/// Canvas pixel to scene unit.
pub fn field_scale(device: DeviceClass) -> f32 {
    match device {
        DeviceClass::Desktop => 0.009,
        DeviceClass::Constrained => 0.007,
    }
}

/// Draw `message` white-on-black, one line per `\n`, each line centered
/// horizontally and the block centered vertically.
pub fn rasterize(message: &str, width: u32, height: u32) -> GrayImage {
    let mut canvas = GrayImage::new(width, height);
    let lines: Vec<&str> = message.split('\n').collect();

    // One glyph row is FONT_PX / 7 pixels tall; shrink if the widest line overflows.
    let widest = lines.iter().map(|l| font::text_cells(l)).max().unwrap_or(0) as f32;
    let mut cell = FONT_PX / GLYPH_H as f32;
    let fit = width as f32 * MAX_LINE_FILL;
    if widest * cell > fit {
        cell = fit / widest;
    }
    let line_height = LINE_HEIGHT * cell / (FONT_PX / GLYPH_H as f32);

    let total = (lines.len() as f32 - 1.0) * line_height;
    let start_y = height as f32 / 2.0 - total / 2.0;

    for (li, line) in lines.iter().enumerate() {
        let line_w = font::text_cells(line) as f32 * cell;
        let left = width as f32 / 2.0 - line_w / 2.0;
        // Middle baseline: the glyph box is centered on the line's y.
        let top = start_y + li as f32 * line_height - GLYPH_H as f32 * cell / 2.0;

        for (ci, ch) in line.chars().enumerate() {
            let gx = left + (ci * ADVANCE) as f32 * cell;
            for row in 0..GLYPH_H {
                for col in 0..GLYPH_W {
                    if font::lit(ch, col, row) {
                        fill_cell(&mut canvas, gx + col as f32 * cell, top + row as f32 * cell, cell);
                    }
                }
            }
        }
    }
    canvas
}

fn fill_cell(canvas: &mut GrayImage, x: f32, y: f32, size: f32) {
    let (w, h) = canvas.dimensions();
    let x0 = x.round().max(0.0) as u32;
    let y0 = y.round().max(0.0) as u32;
    let x1 = ((x + size).round().max(0.0) as u32).min(w);
    let y1 = ((y + size).round().max(0.0) as u32).min(h);
    for py in y0..y1 {
        for px in x0..x1 {
            canvas.put_pixel(px, py, Luma([255]));
        }
    }
}

/// Bright pixels in row-major order, recentered on the canvas middle with
/// y pointing up.
pub fn candidates(canvas: &GrayImage) -> Vec<(f32, f32)> {
    let (w, h) = canvas.dimensions();
    let (hw, hh) = (w as f32 / 2.0, h as f32 / 2.0);
    canvas
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] > LUMINANCE_THRESHOLD)
        .map(|(x, y, _)| (x as f32 - hw, -(y as f32 - hh)))
        .collect()
}

/// Evenly strided pick: particle `i` of `count` takes
/// `candidates[floor(i / count * len)]`, or the origin when nothing was drawn.
pub fn sample(candidates: &[(f32, f32)], i: usize, count: usize) -> (f32, f32) {
    if candidates.is_empty() || count == 0 {
        return (0.0, 0.0);
    }
    let idx = ((i as f64 / count as f64) * candidates.len() as f64).floor() as usize;
    candidates[idx.min(candidates.len() - 1)]
}

/// Text target for every particle, scaled to scene units with a small random
/// depth jitter.
pub fn text_targets<R: Rng + ?Sized>(message: &str, count: usize, device: DeviceClass, rng: &mut R) -> Vec<Vec3> {
    let canvas = rasterize(message, CANVAS_WIDTH, CANVAS_HEIGHT);
    let cands = candidates(&canvas);
    debug!(candidates = cands.len(), count, "rasterized message");

    let s = field_scale(device);
    (0..count)
        .map(|i| {
            let (x, y) = sample(&cands, i, count);
            let z = (rng.gen_range(0.0f32..1.0) - 0.5) * DEPTH_JITTER;
            Vec3::new(x * s, y * s, z)
        })
        .collect()
}

/// Per-particle random seed in [0,1)^3, fixed for the particle's lifetime.
pub fn random_seeds<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<Vec3> {
    (0..count)
        .map(|_| Vec3::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)))
        .collect()
}

/// The fixed per-particle inputs. Created once; `retarget` reruns the
/// rasterization only when the message or count actually changed.
#[derive(Clone, Debug)]
pub struct ParticleField {
    message: String,
    device: DeviceClass,
    pub targets: Vec<Vec3>,
    pub seeds: Vec<Vec3>,
}

impl ParticleField {
    pub fn generate<R: Rng + ?Sized>(message: &str, count: usize, device: DeviceClass, rng: &mut R) -> Self {
        Self {
            message: message.to_string(),
            device,
            targets: text_targets(message, count, device, rng),
            seeds: random_seeds(count, rng),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Returns true if the field was regenerated. Seeds survive a message
    /// change; a count change re-rolls them.
    pub fn retarget<R: Rng + ?Sized>(&mut self, message: &str, count: usize, rng: &mut R) -> bool {
        if message == self.message && count == self.targets.len() {
            return false;
        }
        self.targets = text_targets(message, count, self.device, rng);
        if count != self.seeds.len() {
            self.seeds = random_seeds(count, rng);
        }
        self.message = message.to_string();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn blank_message_puts_everyone_at_origin() {
        let mut rng = StdRng::seed_from_u64(1);
        let t = text_targets("   ", 50, DeviceClass::Desktop, &mut rng);
        assert_eq!(t.len(), 50);
        for p in t {
            assert_eq!((p.x, p.y), (0.0, 0.0));
            assert!(p.z.abs() <= DEPTH_JITTER / 2.0);
        }
    }

    #[test]
    fn xy_targets_are_reproducible_across_rngs() {
        let a = text_targets(DEFAULT_MESSAGE, 500, DeviceClass::Desktop, &mut StdRng::seed_from_u64(1));
        let b = text_targets(DEFAULT_MESSAGE, 500, DeviceClass::Desktop, &mut StdRng::seed_from_u64(99));
        for (p, q) in a.iter().zip(&b) {
            assert_eq!(p.x.to_bits(), q.x.to_bits());
            assert_eq!(p.y.to_bits(), q.y.to_bits());
        }
    }

    #[test]
    fn sampling_is_evenly_strided() {
        let cands: Vec<(f32, f32)> = (0..10).map(|i| (i as f32, 0.0)).collect();
        let picks: Vec<f32> = (0..5).map(|i| sample(&cands, i, 5).0).collect();
        assert_eq!(picks, vec![0.0, 2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn raster_is_centered_and_thresholded() {
        let canvas = rasterize("I", CANVAS_WIDTH, CANVAS_HEIGHT);
        let cands = candidates(&canvas);
        assert!(!cands.is_empty());
        let (sx, sy) = cands.iter().fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
        let n = cands.len() as f32;
        // 'I' is symmetric in both axes.
        assert!((sx / n).abs() < 2.0);
        assert!((sy / n).abs() < 2.0);
    }

    #[test]
    fn long_lines_shrink_to_fit() {
        let canvas = rasterize("VALENTINE'S DAY FOREVER", CANVAS_WIDTH, CANVAS_HEIGHT);
        let cands = candidates(&canvas);
        let half = CANVAS_WIDTH as f32 / 2.0;
        assert!(cands.iter().all(|(x, _)| x.abs() < half));
        // The first and last columns stay dark.
        assert!(canvas.get_pixel(0, CANVAS_HEIGHT / 2).0[0] == 0);
    }

    #[test]
    fn constrained_field_is_smaller() {
        let d = text_targets("HI", 200, DeviceClass::Desktop, &mut StdRng::seed_from_u64(3));
        let c = text_targets("HI", 200, DeviceClass::Constrained, &mut StdRng::seed_from_u64(3));
        let span = |v: &[Vec3]| v.iter().map(|p| p.x.abs()).fold(0.0f32, f32::max);
        assert!(span(&c) < span(&d));
    }

    #[test]
    fn retarget_only_when_changed() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut field = ParticleField::generate("HI", 100, DeviceClass::Desktop, &mut rng);
        let seeds = field.seeds.clone();
        assert!(!field.retarget("HI", 100, &mut rng));
        assert!(field.retarget("BYE", 100, &mut rng));
        assert_eq!(field.seeds, seeds);
        assert_eq!(field.message(), "BYE");
        assert!(field.retarget("BYE", 120, &mut rng));
        assert_eq!(field.len(), 120);
        assert_eq!(field.seeds.len(), 120);
    }

    #[test]
    fn seeds_lie_in_unit_cube() {
        let seeds = random_seeds(300, &mut StdRng::seed_from_u64(5));
        assert!(seeds.iter().all(|s| s.cmpge(Vec3::ZERO).all() && s.cmplt(Vec3::ONE).all()));
    }
}
