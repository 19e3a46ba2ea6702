//! RGBA color buffer with an optional depth buffer.

use kestrel_types::color::Color;
use kestrel_types::geometry::PixelRect;
use kestrel_types::image::{Image, ImageFormat};

/// A drawable surface: the back buffer or a render-target texture.
#[derive(Debug, Clone)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major, top row first.
    pub color: Vec<u8>,
    pub depth: Option<Vec<f32>>,
}

impl Surface {
    pub fn new(width: u32, height: u32, with_depth: bool) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            color: vec![0; n * 4],
            depth: with_depth.then(|| vec![1.0; n]),
        }
    }

    /// Wrap existing RGBA pixels. Render targets have no depth buffer.
    pub fn from_rgba(width: u32, height: u32, color: Vec<u8>) -> Self {
        debug_assert_eq!(color.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            color,
            depth: None,
        }
    }

    pub fn into_rgba(self) -> Vec<u8> {
        self.color
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn clear(&mut self, color: Option<Color>, depth: bool) {
        if let Some(c) = color {
            let px = [c.r, c.g, c.b, c.a];
            for chunk in self.color.chunks_exact_mut(4) {
                chunk.copy_from_slice(&px);
            }
        }
        if depth && let Some(d) = self.depth.as_mut() {
            d.fill(1.0);
        }
    }

    pub fn clear_rect(&mut self, rect: PixelRect, color: Color, depth: bool) {
        let Some(r) = rect.clip_to(self.width, self.height) else {
            return;
        };
        for y in r.y..r.y + r.h {
            for x in r.x..r.x + r.w {
                let i = self.index(x as u32, y as u32);
                self.color[i * 4..i * 4 + 4].copy_from_slice(&[color.r, color.g, color.b, color.a]);
                if depth && let Some(d) = self.depth.as_mut() {
                    d[i] = 1.0;
                }
            }
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Color {
        let i = self.index(x, y) * 4;
        Color::rgba(
            self.color[i],
            self.color[i + 1],
            self.color[i + 2],
            self.color[i + 3],
        )
    }

    pub fn put(&mut self, x: u32, y: u32, c: Color) {
        let i = self.index(x, y) * 4;
        self.color[i..i + 4].copy_from_slice(&[c.r, c.g, c.b, c.a]);
    }

    /// Less-or-equal depth test. Writes `z` when it passes and `write` is set.
    /// Always passes on surfaces without a depth buffer.
    pub fn depth_test(&mut self, x: u32, y: u32, z: f32, write: bool) -> bool {
        let i = self.index(x, y);
        let Some(d) = self.depth.as_mut() else {
            return true;
        };
        if z > d[i] {
            return false;
        }
        if write {
            d[i] = z;
        }
        true
    }

    pub fn to_image(&self, format: ImageFormat) -> Image {
        Image {
            width: self.width,
            height: self.height,
            format: ImageFormat::Rgba,
            data: self.color.clone(),
        }
        .convert(format)
    }
}
