// Window + HUD drawing.
// The window shows the rendered particle scene; keyboard input is mapped to
// app commands here so the rest of the crate never touches minifb.

use crate::app::Command;
use crate::error::Error;
use crate::font::{self, ADVANCE, GLYPH_H, GLYPH_W};
use crate::types::FrameBuffer;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

/// Key bindings, in the order they are polled.
const BINDINGS: &[(Key, Command)] = &[
    (Key::Space, Command::Start),
    (Key::P, Command::CyclePattern),
    (Key::M, Command::NextMessage),
    (Key::F, Command::Focus),
    (Key::Key0, Command::SetHands(0)),
    (Key::Key1, Command::SetHands(1)),
    (Key::Key2, Command::SetHands(2)),
    (Key::O, Command::ToggleOpen),
];

pub struct Drawer {
    window: Window,
}

impl Drawer {
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self, Error> {
        let window = Window::new(title, width, height, WindowOptions::default())
            .map_err(|e| Error::WindowInit(e.to_string()))?;
        Ok(Self { window })
    }

    pub fn present(&mut self, framebuffer: &FrameBuffer) -> Result<(), Error> {
        self.window
            .update_with_buffer(&framebuffer.pixels, framebuffer.width, framebuffer.height)
            .map_err(|e| Error::WindowUpdate(e.to_string()))?;
        Ok(())
    }

    /// Returns false when the user closes the window.
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    /// Commands for keys pressed since the last update (no auto-repeat).
    pub fn commands(&self) -> Vec<Command> {
        BINDINGS
            .iter()
            .filter(|(key, _)| self.window.is_key_pressed(*key, KeyRepeat::No))
            .map(|(_, cmd)| *cmd)
            .collect()
    }

    /// minifb has no focus event; report the active flag so the caller can
    /// detect the edge.
    pub fn is_active(&mut self) -> bool {
        self.window.is_active()
    }
}

/// Put a pixel on the framebuffer if (x,y) is inside bounds.
#[inline]
fn put_pixel(fb: &mut FrameBuffer, x: i32, y: i32, color: u32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= fb.width || y >= fb.height {
        return;
    }
    let idx = y * fb.width + x;
    fb.pixels[idx] = color;
}

/// One glyph with every font pixel drawn as a `scale`x`scale` block and a
/// black drop shadow.
fn draw_char(fb: &mut FrameBuffer, x: i32, y: i32, ch: char, color: u32, scale: i32) {
    for (offset, c) in [(scale.max(1) / 2 + 1, 0x00000000), (0, color)] {
        for ry in 0..GLYPH_H {
            for rx in 0..GLYPH_W {
                if !font::lit(ch, rx, ry) {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        put_pixel(
                            fb,
                            x + rx as i32 * scale + sx + offset,
                            y + ry as i32 * scale + sy + offset,
                            c,
                        );
                    }
                }
            }
        }
    }
}

/// Draw a text string using 5x7 glyphs with 1-pixel spacing.
pub fn draw_text_5x7(fb: &mut FrameBuffer, x: i32, y: i32, text: &str, color: u32) {
    draw_text_scaled(fb, x, y, text, color, 1);
}

pub fn draw_text_scaled(fb: &mut FrameBuffer, mut x: i32, y: i32, text: &str, color: u32, scale: i32) {
    for ch in text.chars() {
        draw_char(fb, x, y, ch, color, scale);
        x += ADVANCE as i32 * scale;
    }
}

/// Horizontally centered line at row `y`.
pub fn draw_text_centered(fb: &mut FrameBuffer, y: i32, text: &str, color: u32, scale: i32) {
    let w = font::text_cells(text) as i32 * scale;
    draw_text_scaled(fb, (fb.width as i32 - w) / 2, y, text, color, scale);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_lands_inside_and_clips_outside() {
        let mut fb = FrameBuffer::new(40, 12);
        draw_text_5x7(&mut fb, 1, 1, "HI", 0x00_FF_FF_FF);
        assert!(fb.pixels.iter().any(|p| *p == 0x00_FF_FF_FF));
        // Writing off the edge must not panic.
        draw_text_scaled(&mut fb, 35, 8, "WWW", 0x00_FF_00_00, 3);
        draw_text_5x7(&mut fb, -20, -20, "X", 0x00_FF_00_00);
    }

    #[test]
    fn centered_text_is_symmetric() {
        let mut fb = FrameBuffer::new(61, 10);
        draw_text_centered(&mut fb, 0, "I", 0x00_FF_FF_FF, 1);
        let cols: Vec<usize> = (0..61).filter(|x| fb.pixels[*x] == 0x00_FF_FF_FF).collect();
        // Top row of 'I' is 0b01110: three lit columns around the middle.
        assert_eq!(cols, vec![29, 30, 31]);
    }

    #[test]
    fn every_binding_is_unique() {
        for (i, (k, _)) in BINDINGS.iter().enumerate() {
            assert!(BINDINGS[i + 1..].iter().all(|(o, _)| o != k));
        }
    }
}
