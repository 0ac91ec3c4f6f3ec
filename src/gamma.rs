// Linear-light compositing for the translucent ornaments (photo cards,
// hearts). Table lookups instead of powf so a few thousand card pixels per
// frame stay cheap.

pub struct GammaLut {
    // sRGB(0..255) -> linear (0..1) as f32
    srgb_to_linear: [f32; 256],
    // linear(0..1) -> sRGB(0..255) via 4096-step quantization
    linear_to_srgb: [u8; 4096],
}

impl Default for GammaLut {
    fn default() -> Self {
        Self::new()
    }
}

impl GammaLut {
    pub fn new() -> Self {
        let mut s2l = [0.0f32; 256];
        for (v, slot) in s2l.iter_mut().enumerate() {
            let c = v as f32 / 255.0;
            *slot = if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) };
        }

        let mut l2s = [0u8; 4096];
        for (i, slot) in l2s.iter_mut().enumerate() {
            let l = i as f32 / 4095.0;
            let s = if l <= 0.003_130_8 { 12.92 * l } else { 1.055 * l.powf(1.0 / 2.4) - 0.055 };
            *slot = (s * 255.0).round().clamp(0.0, 255.0) as u8;
        }

        Self { srgb_to_linear: s2l, linear_to_srgb: l2s }
    }

    #[inline]
    pub fn srgb_u8_to_linear(&self, v: u8) -> f32 {
        self.srgb_to_linear[v as usize]
    }

    #[inline]
    pub fn linear_to_srgb_u8(&self, l: f32) -> u8 {
        let idx = (l.clamp(0.0, 1.0) * 4095.0).round() as usize;
        self.linear_to_srgb[idx]
    }

    /// Source-over of `src` (sRGB) onto the packed 0x00RRGGBB `dst` pixel,
    /// mixed in linear light.
    pub fn blend_over(&self, dst: u32, src: [u8; 3], alpha: f32) -> u32 {
        let a = alpha.clamp(0.0, 1.0);
        let d = [(dst >> 16) as u8, (dst >> 8) as u8, dst as u8];
        let mut out = 0u32;
        for (c, (&s, &d)) in src.iter().zip(d.iter()).enumerate() {
            let l = self.srgb_u8_to_linear(d) * (1.0 - a) + self.srgb_u8_to_linear(s) * a;
            out |= (self.linear_to_srgb_u8(l) as u32) << (16 - 8 * c);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_round_trip_endpoints() {
        let lut = GammaLut::new();
        assert_eq!(lut.linear_to_srgb_u8(lut.srgb_u8_to_linear(0)), 0);
        assert_eq!(lut.linear_to_srgb_u8(lut.srgb_u8_to_linear(255)), 255);
        assert_eq!(lut.linear_to_srgb_u8(2.0), 255);
    }

    #[test]
    fn blend_over_extremes() {
        let lut = GammaLut::new();
        assert_eq!(lut.blend_over(0x00_12_34_56, [255, 0, 0], 0.0), 0x00_12_34_56);
        assert_eq!(lut.blend_over(0x00_12_34_56, [255, 0, 0], 1.0), 0x00_FF_00_00);
    }

    #[test]
    fn half_blend_is_brighter_than_srgb_average() {
        // Linear-light mixing of black and white lands above sRGB 128.
        let lut = GammaLut::new();
        let px = lut.blend_over(0, [255, 255, 255], 0.5);
        assert!(((px >> 16) & 0xFF) > 180);
    }
}
