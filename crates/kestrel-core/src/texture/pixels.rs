//! Pixel operations on locked texture buffers.
//!
//! Coordinates are in buffer space and every operation clips against both
//! the destination and the source, so callers may pass regions that hang
//! off either edge.

use kestrel_types::color::Color;
use kestrel_types::geometry::PixelRect;
use kestrel_types::image::{Image, ImageFormat};

/// Read-only pixels in any format.
#[derive(Debug, Clone, Copy)]
pub struct PixelSource<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

impl<'a> PixelSource<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32, format: ImageFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Color {
        let bpp = self.format.bpp();
        let i = (y as usize * self.width as usize + x as usize) * bpp;
        self.format.read(&self.data[i..i + bpp])
    }

    pub fn full_rect(&self) -> PixelRect {
        PixelRect::full(self.width, self.height)
    }
}

impl<'a> From<&'a Image> for PixelSource<'a> {
    fn from(image: &'a Image) -> Self {
        Self::new(&image.data, image.width, image.height, image.format)
    }
}

/// Mutable pixels in any format.
#[derive(Debug)]
pub struct PixelView<'a> {
    pub data: &'a mut [u8],
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

/// `(src * a + dst * (255 - a)) / 255` for color, source-over for alpha.
fn composite(dst: Color, src: Color, alpha: u8) -> Color {
    let a = src.a as u32 * alpha as u32 / 255;
    let inv = 255 - a;
    let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * inv) / 255) as u8;
    Color::rgba(
        mix(src.r, dst.r),
        mix(src.g, dst.g),
        mix(src.b, dst.b),
        (a + dst.a as u32 * inv / 255).min(255) as u8,
    )
}

/// Clip a copy of `src_rect` (within `src_w` x `src_h`) to `(dx, dy)` in a
/// `dst_w` x `dst_h` buffer. Returns `(dst_x, dst_y, src_x, src_y, w, h)`.
fn clip_copy(
    dx: i32,
    dy: i32,
    dst_w: u32,
    dst_h: u32,
    src_rect: PixelRect,
    src_w: u32,
    src_h: u32,
) -> Option<(i32, i32, i32, i32, i32, i32)> {
    let src = src_rect.clip_to(src_w, src_h)?;
    // Shift the destination by however much the source was clipped.
    let mut dx = dx + (src.x - src_rect.x);
    let mut dy = dy + (src.y - src_rect.y);
    let (mut sx, mut sy, mut w, mut h) = (src.x, src.y, src.w, src.h);
    if dx < 0 {
        sx -= dx;
        w += dx;
        dx = 0;
    }
    if dy < 0 {
        sy -= dy;
        h += dy;
        dy = 0;
    }
    w = w.min(dst_w as i32 - dx);
    h = h.min(dst_h as i32 - dy);
    if w <= 0 || h <= 0 {
        return None;
    }
    Some((dx, dy, sx, sy, w, h))
}

impl<'a> PixelView<'a> {
    pub fn new(data: &'a mut [u8], width: u32, height: u32, format: ImageFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
        }
    }

    pub fn as_source(&self) -> PixelSource<'_> {
        PixelSource::new(&self.data[..], self.width, self.height, self.format)
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.format.bpp()
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Option<Color> {
        if !self.in_bounds(x, y) {
            return None;
        }
        let i = self.offset(x as u32, y as u32);
        Some(self.format.read(&self.data[i..]))
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let i = self.offset(x as u32, y as u32);
        self.format.write(&mut self.data[i..], color);
        true
    }

    /// Apply `f` to every pixel of `rect` (clipped).
    fn map_rect(&mut self, rect: PixelRect, mut f: impl FnMut(Color) -> Color) -> bool {
        let Some(r) = rect.clip_to(self.width, self.height) else {
            return false;
        };
        let bpp = self.format.bpp();
        for y in r.y..r.y + r.h {
            for x in r.x..r.x + r.w {
                let i = self.offset(x as u32, y as u32);
                let px = &mut self.data[i..i + bpp];
                let c = f(self.format.read(px));
                self.format.write(px, c);
            }
        }
        true
    }

    pub fn fill_rect(&mut self, rect: PixelRect, color: Color) -> bool {
        let Some(r) = rect.clip_to(self.width, self.height) else {
            return false;
        };
        let bpp = self.format.bpp();
        let mut px = [0u8; 4];
        self.format.write(&mut px, color);
        for y in r.y..r.y + r.h {
            let start = self.offset(r.x as u32, y as u32);
            for chunk in self.data[start..start + r.w as usize * bpp].chunks_exact_mut(bpp) {
                chunk.copy_from_slice(&px[..bpp]);
            }
        }
        true
    }

    /// Copy `src_rect` of `src` to `(x, y)` without blending.
    pub fn write(&mut self, x: i32, y: i32, src: &PixelSource<'_>, src_rect: PixelRect) -> bool {
        let Some((dx, dy, sx, sy, w, h)) =
            clip_copy(x, y, self.width, self.height, src_rect, src.width, src.height)
        else {
            return false;
        };
        let bpp = self.format.bpp();
        if src.format == self.format {
            let row = w as usize * bpp;
            for j in 0..h {
                let d = self.offset(dx as u32, (dy + j) as u32);
                let s = ((sy + j) as usize * src.width as usize + sx as usize) * bpp;
                self.data[d..d + row].copy_from_slice(&src.data[s..s + row]);
            }
        } else {
            for j in 0..h {
                for i in 0..w {
                    let c = src.get((sx + i) as u32, (sy + j) as u32);
                    let d = self.offset((dx + i) as u32, (dy + j) as u32);
                    self.format.write(&mut self.data[d..d + bpp], c);
                }
            }
        }
        true
    }

    /// Composite `src_rect` of `src` over `(x, y)`.
    pub fn blit(
        &mut self,
        x: i32,
        y: i32,
        src: &PixelSource<'_>,
        src_rect: PixelRect,
        alpha: u8,
    ) -> bool {
        let Some((dx, dy, sx, sy, w, h)) =
            clip_copy(x, y, self.width, self.height, src_rect, src.width, src.height)
        else {
            return false;
        };
        let bpp = self.format.bpp();
        for j in 0..h {
            for i in 0..w {
                let s = src.get((sx + i) as u32, (sy + j) as u32);
                let d = self.offset((dx + i) as u32, (dy + j) as u32);
                let px = &mut self.data[d..d + bpp];
                let out = composite(self.format.read(px), s, alpha);
                self.format.write(px, out);
            }
        }
        true
    }

    /// Nearest-neighbor sample position in `src_rect` for destination pixel `i` of `n`.
    fn stretch_index(i: i32, n: i32, src_start: i32, src_len: i32) -> i32 {
        src_start + ((2 * i + 1) * src_len / (2 * n)).min(src_len - 1)
    }

    fn stretch_with(
        &mut self,
        dst_rect: PixelRect,
        src: &PixelSource<'_>,
        src_rect: PixelRect,
        mut put: impl FnMut(Color, Color) -> Color,
    ) -> bool {
        if dst_rect.is_empty() || src_rect.is_empty() {
            return false;
        }
        // Only sample inside the source; the mapping still spans src_rect.
        if src_rect.clip_to(src.width, src.height).is_none() {
            return false;
        }
        let Some(clip) = dst_rect.clip_to(self.width, self.height) else {
            return false;
        };
        let bpp = self.format.bpp();
        for y in clip.y..clip.y + clip.h {
            let sy = Self::stretch_index(y - dst_rect.y, dst_rect.h, src_rect.y, src_rect.h);
            if sy < 0 || sy >= src.height as i32 {
                continue;
            }
            for x in clip.x..clip.x + clip.w {
                let sx = Self::stretch_index(x - dst_rect.x, dst_rect.w, src_rect.x, src_rect.w);
                if sx < 0 || sx >= src.width as i32 {
                    continue;
                }
                let s = src.get(sx as u32, sy as u32);
                let d = self.offset(x as u32, y as u32);
                let px = &mut self.data[d..d + bpp];
                let out = put(self.format.read(px), s);
                self.format.write(px, out);
            }
        }
        true
    }

    /// Scale `src_rect` of `src` into `dst_rect` (nearest-neighbor) without blending.
    pub fn write_stretch(
        &mut self,
        dst_rect: PixelRect,
        src: &PixelSource<'_>,
        src_rect: PixelRect,
    ) -> bool {
        self.stretch_with(dst_rect, src, src_rect, |_, s| s)
    }

    /// Scale `src_rect` of `src` into `dst_rect` (nearest-neighbor) and composite.
    pub fn blit_stretch(
        &mut self,
        dst_rect: PixelRect,
        src: &PixelSource<'_>,
        src_rect: PixelRect,
        alpha: u8,
    ) -> bool {
        self.stretch_with(dst_rect, src, src_rect, |d, s| composite(d, s, alpha))
    }

    /// Shift hue by `degrees`.
    pub fn rotate_hue(&mut self, rect: PixelRect, degrees: f32) -> bool {
        if degrees % 360.0 == 0.0 {
            return rect.clip_to(self.width, self.height).is_some();
        }
        self.map_rect(rect, |c| {
            let (h, s, l) = c.to_hsl();
            Color::from_hsl(h + degrees, s, l, c.a)
        })
    }

    /// Multiply saturation by `factor`.
    pub fn saturate(&mut self, rect: PixelRect, factor: f32) -> bool {
        self.map_rect(rect, |c| {
            let (h, s, l) = c.to_hsl();
            Color::from_hsl(h, s * factor, l, c.a)
        })
    }

    /// Invert color channels; alpha is kept.
    pub fn invert(&mut self, rect: PixelRect) -> bool {
        self.map_rect(rect, |c| Color::rgba(255 - c.r, 255 - c.g, 255 - c.b, c.a))
    }

    /// Replace alpha with a value derived from the brightness of `map`.
    ///
    /// Brightness at or below `median - ambiguity / 2` becomes transparent,
    /// at or above `median + ambiguity / 2` opaque, with a linear ramp in
    /// between. The map must match the view size.
    pub fn insert_alpha_map(&mut self, map: &PixelSource<'_>, median: u8, ambiguity: u8) -> bool {
        if map.width != self.width || map.height != self.height {
            return false;
        }
        let low = median as i32 - ambiguity as i32 / 2;
        let range = ambiguity as i32;
        let full = PixelRect::full(self.width, self.height);
        let format = map.format;
        let bpp = format.bpp();
        let data = map.data;
        let mut index = 0usize;
        self.map_rect(full, |c| {
            let i = index;
            index += 1;
            let m = format.read(&data[i * bpp..]);
            let value = if format == ImageFormat::Alpha {
                m.a as i32
            } else {
                (m.r as i32 + m.g as i32 + m.b as i32) / 3
            };
            let a = if range == 0 {
                if value >= median as i32 { 255 } else { 0 }
            } else {
                ((value - low) * 255 / range).clamp(0, 255)
            };
            c.with_alpha(a as u8)
        })
    }

    /// Bilinear sample at a fractional pixel position, clamped to the edges.
    pub fn interpolated_pixel(&self, x: f32, y: f32) -> Option<Color> {
        self.as_source().interpolated(x, y)
    }
}

impl PixelSource<'_> {
    /// Bilinear sample at a fractional pixel position, clamped to the edges.
    ///
    /// Integer coordinates hit pixel centers exactly.
    pub fn interpolated(&self, x: f32, y: f32) -> Option<Color> {
        if self.width == 0 || self.height == 0 || !x.is_finite() || !y.is_finite() {
            return None;
        }
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);
        let (x0, y0) = (x.floor() as u32, y.floor() as u32);
        let (x1, y1) = ((x0 + 1).min(self.width - 1), (y0 + 1).min(self.height - 1));
        let (fx, fy) = (x - x0 as f32, y - y0 as f32);
        let top = self.get(x0, y0).lerp(self.get(x1, y0), fx);
        let bottom = self.get(x0, y1).lerp(self.get(x1, y1), fx);
        Some(top.lerp(bottom, fy))
    }
}
