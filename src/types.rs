// Core types shared by capture, inference and rendering.

use serde::Deserialize;

#[derive(Clone, Debug)]
pub struct FrameBuffer {
    pub width: usize,      // how wide the frame is (pixels)
    pub height: usize,     // how tall the frame is (pixels)
    pub pixels: Vec<u32>,  // each entry is 0x00RRGGBB for minifb
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, pixels: vec![0u32; width * height] }
    }

    pub fn fill(&mut self, color: u32) {
        for p in &mut self.pixels { *p = color; }
    }

    /// Tightly packed RGB bytes, the layout the landmark detector expects.
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pixels.len() * 3);
        for px in &self.pixels {
            out.push(((px >> 16) & 0xFF) as u8);
            out.push(((px >> 8) & 0xFF) as u8);
            out.push((px & 0xFF) as u8);
        }
        out
    }
}

/// One captured video frame stamped with the capture clock.
#[derive(Clone, Debug)]
pub struct Frame {
    pub image: FrameBuffer,
    pub timestamp_ms: f64,
}

/// A landmark in normalized video coordinates: x,y in [0,1] (origin top-left),
/// z is depth relative to the wrist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Point3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Planar distance; depth from a monocular model is too noisy to use.
    #[inline]
    pub fn distance_2d(&self, other: &Point3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One detected hand. The source promises 21 points but we keep a Vec so a
/// short or long set can be reported instead of silently truncated.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct HandResult {
    pub landmarks: Vec<Point3>,
}

/// Chosen once at startup; tunes cadence, delegate, scale and point sprites.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceClass {
    #[default]
    Desktop,
    /// Phones, tablets, small displays.
    Constrained,
}

impl DeviceClass {
    pub fn is_constrained(self) -> bool {
        self == DeviceClass::Constrained
    }
}
