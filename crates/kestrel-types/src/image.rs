//! Decoded pixel buffers and per-pixel format conversion.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::{KestrelError, Result};
use crate::geometry::PixelRect;

/// Byte layout of one pixel; names list channels in memory order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    #[default]
    Rgba,
    Bgra,
    Argb,
    Abgr,
    /// RGB with an ignored padding byte (reads back as opaque).
    Rgbx,
    Bgrx,
    Rgb,
    Bgr,
    Alpha,
    Greyscale,
}

impl ImageFormat {
    /// Bytes per pixel.
    pub const fn bpp(self) -> usize {
        match self {
            Self::Rgba | Self::Bgra | Self::Argb | Self::Abgr | Self::Rgbx | Self::Bgrx => 4,
            Self::Rgb | Self::Bgr => 3,
            Self::Alpha | Self::Greyscale => 1,
        }
    }

    pub const fn has_alpha(self) -> bool {
        matches!(
            self,
            Self::Rgba | Self::Bgra | Self::Argb | Self::Abgr | Self::Alpha
        )
    }

    /// Read one pixel from `px`, which must hold at least `bpp()` bytes.
    pub fn read(self, px: &[u8]) -> Color {
        match self {
            Self::Rgba => Color::rgba(px[0], px[1], px[2], px[3]),
            Self::Bgra => Color::rgba(px[2], px[1], px[0], px[3]),
            Self::Argb => Color::rgba(px[1], px[2], px[3], px[0]),
            Self::Abgr => Color::rgba(px[3], px[2], px[1], px[0]),
            Self::Rgbx | Self::Rgb => Color::rgb(px[0], px[1], px[2]),
            Self::Bgrx | Self::Bgr => Color::rgb(px[2], px[1], px[0]),
            Self::Alpha => Color::rgba(255, 255, 255, px[0]),
            Self::Greyscale => Color::rgb(px[0], px[0], px[0]),
        }
    }

    /// Write one pixel into `px`, which must hold at least `bpp()` bytes.
    pub fn write(self, px: &mut [u8], c: Color) {
        match self {
            Self::Rgba => px[..4].copy_from_slice(&[c.r, c.g, c.b, c.a]),
            Self::Bgra => px[..4].copy_from_slice(&[c.b, c.g, c.r, c.a]),
            Self::Argb => px[..4].copy_from_slice(&[c.a, c.r, c.g, c.b]),
            Self::Abgr => px[..4].copy_from_slice(&[c.a, c.b, c.g, c.r]),
            Self::Rgbx => px[..4].copy_from_slice(&[c.r, c.g, c.b, 255]),
            Self::Bgrx => px[..4].copy_from_slice(&[c.b, c.g, c.r, 255]),
            Self::Rgb => px[..3].copy_from_slice(&[c.r, c.g, c.b]),
            Self::Bgr => px[..3].copy_from_slice(&[c.b, c.g, c.r]),
            Self::Alpha => px[0] = c.a,
            Self::Greyscale => {
                px[0] = ((c.r as u16 + c.g as u16 + c.b as u16) / 3) as u8;
            }
        }
    }
}

/// Convert a tightly packed buffer from one format to another.
pub fn convert_pixels(src: &[u8], from: ImageFormat, to: ImageFormat) -> Vec<u8> {
    if from == to {
        return src.to_vec();
    }
    let count = src.len() / from.bpp();
    let mut out = vec![0u8; count * to.bpp()];
    for (s, d) in src
        .chunks_exact(from.bpp())
        .zip(out.chunks_exact_mut(to.bpp()))
    {
        to.write(d, from.read(s));
    }
    out
}

/// Copy `rect` out of a `width`-pixel-wide buffer into a tightly packed one.
///
/// `rect` must lie inside the buffer.
pub fn extract_region(src: &[u8], width: u32, bpp: usize, rect: PixelRect) -> Vec<u8> {
    let row = rect.w as usize * bpp;
    let mut out = Vec::with_capacity(row * rect.h as usize);
    for y in rect.y..rect.y + rect.h {
        let start = (y as usize * width as usize + rect.x as usize) * bpp;
        out.extend_from_slice(&src[start..start + row]);
    }
    out
}

/// Write a tightly packed `rect` of pixels into a `width`-pixel-wide buffer.
///
/// `rect` must lie inside the buffer and `pixels` must hold `rect.area()` pixels.
pub fn write_region(dst: &mut [u8], width: u32, bpp: usize, rect: PixelRect, pixels: &[u8]) {
    let row = rect.w as usize * bpp;
    for (i, y) in (rect.y..rect.y + rect.h).enumerate() {
        let start = (y as usize * width as usize + rect.x as usize) * bpp;
        dst[start..start + row].copy_from_slice(&pixels[i * row..(i + 1) * row]);
    }
}

/// A decoded image: tightly packed rows, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub data: Vec<u8>,
}

impl Image {
    pub fn new(width: u32, height: u32, format: ImageFormat, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * format.bpp();
        if data.len() != expected {
            return Err(KestrelError::Decode(format!(
                "{width}x{height} {format:?} image needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    pub fn filled(width: u32, height: u32, format: ImageFormat, color: Color) -> Self {
        let bpp = format.bpp();
        let mut px = [0u8; 4];
        format.write(&mut px, color);
        let data = px[..bpp].repeat(width as usize * height as usize);
        Self {
            width,
            height,
            format,
            data,
        }
    }

    pub fn bpp(&self) -> usize {
        self.format.bpp()
    }

    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.bpp();
        let i = (y as usize * self.width as usize + x as usize) * bpp;
        Some(self.format.read(&self.data[i..i + bpp]))
    }

    /// Return this image in `format`, converting pixels if needed.
    pub fn convert(self, format: ImageFormat) -> Image {
        if self.format == format {
            return self;
        }
        let data = convert_pixels(&self.data, self.format, format);
        Image {
            width: self.width,
            height: self.height,
            format,
            data,
        }
    }
}
