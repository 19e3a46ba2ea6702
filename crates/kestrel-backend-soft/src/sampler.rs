//! Texture storage and sampling.

use kestrel_types::color::Color;
use kestrel_types::state::{AddressMode, TextureFilter, TextureType};

/// A texture as the software backend stores it: always RGBA8.
#[derive(Debug, Clone)]
pub struct SoftTexture {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub texture_type: TextureType,
}

impl SoftTexture {
    pub fn new(width: u32, height: u32, texture_type: TextureType) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
            texture_type,
        }
    }

    fn texel(&self, x: i64, y: i64, address: AddressMode) -> Color {
        let (w, h) = (self.width as i64, self.height as i64);
        let (x, y) = match address {
            AddressMode::Clamp => (x.clamp(0, w - 1), y.clamp(0, h - 1)),
            AddressMode::Wrap | AddressMode::Undefined => (x.rem_euclid(w), y.rem_euclid(h)),
        };
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Color::rgba(
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        )
    }

    /// Sample at normalized coordinates.
    pub fn sample(&self, u: f32, v: f32, filter: TextureFilter, address: AddressMode) -> Color {
        if self.width == 0 || self.height == 0 {
            return Color::WHITE;
        }
        let x = u * self.width as f32;
        let y = v * self.height as f32;
        match filter {
            TextureFilter::Nearest => self.texel(x.floor() as i64, y.floor() as i64, address),
            TextureFilter::Linear | TextureFilter::Undefined => {
                // Texel centers sit at half-integer coordinates.
                let fx = x - 0.5;
                let fy = y - 0.5;
                let x0 = fx.floor();
                let y0 = fy.floor();
                let tx = fx - x0;
                let ty = fy - y0;
                let (x0, y0) = (x0 as i64, y0 as i64);
                let top = self
                    .texel(x0, y0, address)
                    .lerp(self.texel(x0 + 1, y0, address), tx);
                let bottom = self
                    .texel(x0, y0 + 1, address)
                    .lerp(self.texel(x0 + 1, y0 + 1, address), tx);
                top.lerp(bottom, ty)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> SoftTexture {
        let mut t = SoftTexture::new(2, 2, TextureType::Managed);
        t.data = vec![
            255, 0, 0, 255, /**/ 0, 255, 0, 255, //
            0, 0, 255, 255, /**/ 255, 255, 255, 255,
        ];
        t
    }

    #[test]
    fn nearest_picks_texel() {
        let t = checker();
        let n = TextureFilter::Nearest;
        assert_eq!(t.sample(0.25, 0.25, n, AddressMode::Wrap), Color::RED);
        assert_eq!(t.sample(0.75, 0.25, n, AddressMode::Wrap), Color::GREEN);
        assert_eq!(t.sample(0.25, 0.75, n, AddressMode::Wrap), Color::BLUE);
    }

    #[test]
    fn wrap_and_clamp_differ_outside_unit_square() {
        let t = checker();
        let n = TextureFilter::Nearest;
        assert_eq!(t.sample(1.25, 0.25, n, AddressMode::Wrap), Color::RED);
        assert_eq!(t.sample(1.25, 0.25, n, AddressMode::Clamp), Color::GREEN);
        assert_eq!(t.sample(-0.25, 0.25, n, AddressMode::Wrap), Color::GREEN);
        assert_eq!(t.sample(-0.25, 0.25, n, AddressMode::Clamp), Color::RED);
    }

    #[test]
    fn linear_at_texel_center_is_exact() {
        let t = checker();
        let c = t.sample(0.25, 0.25, TextureFilter::Linear, AddressMode::Clamp);
        assert_eq!(c, Color::RED);
    }

    #[test]
    fn linear_blends_neighbors() {
        let t = checker();
        let c = t.sample(0.5, 0.25, TextureFilter::Linear, AddressMode::Clamp);
        assert!(c.r > 100 && c.r < 155);
        assert!(c.g > 100 && c.g < 155);
        assert_eq!(c.b, 0);
    }
}
