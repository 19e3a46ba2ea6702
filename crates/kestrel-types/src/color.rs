//! RGBA byte color with saturating arithmetic and HSL conversion.

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::error::{KestrelError, Result};

/// A color in RGBA format (0-255 per channel).
///
/// All arithmetic saturates, so every channel stays in `[0, 255]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

fn clamp_channel(value: f32) -> u8 {
    // `as` saturates and maps NaN to 0.
    value.clamp(0.0, 255.0) as u8
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Build a color from float channels in `[0.0, 1.0]`.
    pub fn from_f32(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            r: clamp_channel((r * 255.0).round()),
            g: clamp_channel((g * 255.0).round()),
            b: clamp_channel((b * 255.0).round()),
            a: clamp_channel((a * 255.0).round()),
        }
    }

    /// Return the same color with a different alpha value.
    pub const fn with_alpha(self, a: u8) -> Self {
        Self {
            r: self.r,
            g: self.g,
            b: self.b,
            a,
        }
    }

    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const GREY: Self = Self::rgb(127, 127, 127);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    pub const BLUE: Self = Self::rgb(0, 0, 255);
    pub const YELLOW: Self = Self::rgb(255, 255, 0);
    pub const MAGENTA: Self = Self::rgb(255, 0, 255);
    pub const CYAN: Self = Self::rgb(0, 255, 255);
    pub const CLEAR: Self = Self::rgba(0, 0, 0, 0);

    pub fn r_f(self) -> f32 {
        self.r as f32 / 255.0
    }

    pub fn g_f(self) -> f32 {
        self.g as f32 / 255.0
    }

    pub fn b_f(self) -> f32 {
        self.b as f32 / 255.0
    }

    pub fn a_f(self) -> f32 {
        self.a as f32 / 255.0
    }

    /// Unpack `0xRRGGBBAA`.
    pub const fn from_rgba_u32(value: u32) -> Self {
        Self {
            r: (value >> 24) as u8,
            g: (value >> 16) as u8,
            b: (value >> 8) as u8,
            a: value as u8,
        }
    }

    /// Pack as `0xRRGGBBAA`.
    pub const fn to_rgba_u32(self) -> u32 {
        ((self.r as u32) << 24) | ((self.g as u32) << 16) | ((self.b as u32) << 8) | self.a as u32
    }

    /// Unpack `0xAARRGGBB`.
    pub const fn from_argb_u32(value: u32) -> Self {
        Self {
            a: (value >> 24) as u8,
            r: (value >> 16) as u8,
            g: (value >> 8) as u8,
            b: value as u8,
        }
    }

    /// Pack as `0xAARRGGBB`.
    pub const fn to_argb_u32(self) -> u32 {
        ((self.a as u32) << 24) | ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Pack so the bytes in memory read r, g, b, a.
    ///
    /// This is the layout of the `color` field in colored vertices.
    pub const fn to_native_u32(self) -> u32 {
        u32::from_le_bytes([self.r, self.g, self.b, self.a])
    }

    /// Inverse of [`Color::to_native_u32`].
    pub const fn from_native_u32(value: u32) -> Self {
        let [r, g, b, a] = value.to_le_bytes();
        Self { r, g, b, a }
    }

    /// Parse `RRGGBB` or `RRGGBBAA`, with an optional `#` or `0x` prefix.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex
            .strip_prefix('#')
            .or_else(|| hex.strip_prefix("0x"))
            .unwrap_or(hex);
        let parse = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| KestrelError::Config(format!("invalid hex color {hex:?}: {e}")))
        };
        if !digits.is_ascii() {
            return Err(KestrelError::Config(format!("invalid hex color {hex:?}")));
        }
        match digits.len() {
            6 => Ok(Self::rgb(parse(0)?, parse(2)?, parse(4)?)),
            8 => Ok(Self::rgba(parse(0)?, parse(2)?, parse(4)?, parse(6)?)),
            _ => Err(KestrelError::Config(format!(
                "hex color must be RRGGBB or RRGGBBAA, got {hex:?}"
            ))),
        }
    }

    /// Format as lowercase `rrggbbaa`.
    pub fn to_hex(self) -> String {
        format!("{:08x}", self.to_rgba_u32())
    }

    /// Linearly interpolate toward `other`; `t` is clamped to `[0, 1]`.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| clamp_channel((a as f32 + (b as f32 - a as f32) * t).round());
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }

    /// Convert to hue (degrees, `[0, 360)`), saturation and lightness (`[0, 1]`).
    pub fn to_hsl(self) -> (f32, f32, f32) {
        let (r, g, b) = (self.r_f(), self.g_f(), self.b_f());
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        if max == min {
            return (0.0, 0.0, l);
        }
        let d = max - min;
        let s = if l > 0.5 {
            d / (2.0 - max - min)
        } else {
            d / (max + min)
        };
        let h = if max == r {
            (g - b) / d + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / d + 2.0
        } else {
            (r - g) / d + 4.0
        };
        ((h * 60.0) % 360.0, s, l)
    }

    /// Build a color from hue (degrees), saturation and lightness.
    pub fn from_hsl(h: f32, s: f32, l: f32, a: u8) -> Self {
        let s = s.clamp(0.0, 1.0);
        let l = l.clamp(0.0, 1.0);
        if s <= 0.0 {
            let v = clamp_channel((l * 255.0).round());
            return Self::rgba(v, v, v, a);
        }
        let h = h.rem_euclid(360.0) / 360.0;
        let q = if l < 0.5 {
            l * (1.0 + s)
        } else {
            l + s - l * s
        };
        let p = 2.0 * l - q;
        let channel = |t: f32| clamp_channel((hue_to_rgb(p, q, t) * 255.0).round());
        Self::rgba(
            channel(h + 1.0 / 3.0),
            channel(h),
            channel(h - 1.0 / 3.0),
            a,
        )
    }
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn map2(a: Color, b: Color, f: impl Fn(u8, u8) -> u8) -> Color {
    Color::rgba(f(a.r, b.r), f(a.g, b.g), f(a.b, b.b), f(a.a, b.a))
}

fn map1(a: Color, f: impl Fn(u8) -> u8) -> Color {
    Color::rgba(f(a.r), f(a.g), f(a.b), f(a.a))
}

impl Add for Color {
    type Output = Color;

    fn add(self, other: Color) -> Color {
        map2(self, other, u8::saturating_add)
    }
}

impl Sub for Color {
    type Output = Color;

    fn sub(self, other: Color) -> Color {
        map2(self, other, u8::saturating_sub)
    }
}

impl Mul for Color {
    type Output = Color;

    /// Modulate: `self / 255 * other` per channel.
    fn mul(self, other: Color) -> Color {
        map2(self, other, |a, b| clamp_channel(a as f32 / 255.0 * b as f32))
    }
}

impl Div for Color {
    type Output = Color;

    /// Inverse of modulation: `self / (other / 255)` per channel.
    fn div(self, other: Color) -> Color {
        map2(self, other, |a, b| {
            if b == 0 {
                if a == 0 { 0 } else { 255 }
            } else {
                clamp_channel(a as f32 * 255.0 / b as f32)
            }
        })
    }
}

impl Mul<f32> for Color {
    type Output = Color;

    fn mul(self, factor: f32) -> Color {
        map1(self, |a| clamp_channel(a as f32 * factor))
    }
}

impl Div<f32> for Color {
    type Output = Color;

    fn div(self, factor: f32) -> Color {
        map1(self, |a| clamp_channel(a as f32 / factor))
    }
}

impl AddAssign for Color {
    fn add_assign(&mut self, other: Color) {
        *self = *self + other;
    }
}

impl SubAssign for Color {
    fn sub_assign(&mut self, other: Color) {
        *self = *self - other;
    }
}

impl MulAssign for Color {
    fn mul_assign(&mut self, other: Color) {
        *self = *self * other;
    }
}

impl DivAssign for Color {
    fn div_assign(&mut self, other: Color) {
        *self = *self / other;
    }
}

impl MulAssign<f32> for Color {
    fn mul_assign(&mut self, factor: f32) {
        *self = *self * factor;
    }
}

impl DivAssign<f32> for Color {
    fn div_assign(&mut self, factor: f32) {
        *self = *self / factor;
    }
}
