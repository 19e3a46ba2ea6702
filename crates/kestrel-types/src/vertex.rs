//! Vertex layouts consumed directly by backend draw calls.
//!
//! Each layout is a flat `#[repr(C)]` struct of 32-bit floats, optionally
//! carrying a packed color (see [`Color::to_native_u32`]). Backends treat
//! slices of these as raw bytes through `bytemuck`.

use bytemuck::{Pod, Zeroable};

use crate::color::Color;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PlainVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl PlainVertex {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ColoredVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub color: u32,
}

impl ColoredVertex {
    pub const fn new(x: f32, y: f32, z: f32, color: Color) -> Self {
        Self {
            x,
            y,
            z,
            color: color.to_native_u32(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct TexturedVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub u: f32,
    pub v: f32,
}

impl TexturedVertex {
    pub const fn new(x: f32, y: f32, z: f32, u: f32, v: f32) -> Self {
        Self { x, y, z, u, v }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ColoredTexturedVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub color: u32,
    pub u: f32,
    pub v: f32,
}

impl ColoredTexturedVertex {
    pub const fn new(x: f32, y: f32, z: f32, color: Color, u: f32, v: f32) -> Self {
        Self {
            x,
            y,
            z,
            color: color.to_native_u32(),
            u,
            v,
        }
    }
}

/// A borrowed vertex buffer of one of the four layouts.
#[derive(Debug, Clone, Copy)]
pub enum VertexStream<'a> {
    Plain(&'a [PlainVertex]),
    Colored(&'a [ColoredVertex]),
    Textured(&'a [TexturedVertex]),
    ColoredTextured(&'a [ColoredTexturedVertex]),
}

impl<'a> VertexStream<'a> {
    pub fn len(&self) -> usize {
        match self {
            Self::Plain(v) => v.len(),
            Self::Colored(v) => v.len(),
            Self::Textured(v) => v.len(),
            Self::ColoredTextured(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether vertices carry texture coordinates.
    pub fn has_uv(&self) -> bool {
        matches!(self, Self::Textured(_) | Self::ColoredTextured(_))
    }

    /// Whether vertices carry a per-vertex color.
    pub fn has_color(&self) -> bool {
        matches!(self, Self::Colored(_) | Self::ColoredTextured(_))
    }

    /// Size of one vertex in bytes.
    pub fn stride(&self) -> usize {
        match self {
            Self::Plain(_) => size_of::<PlainVertex>(),
            Self::Colored(_) => size_of::<ColoredVertex>(),
            Self::Textured(_) => size_of::<TexturedVertex>(),
            Self::ColoredTextured(_) => size_of::<ColoredTexturedVertex>(),
        }
    }

    /// The first `count` vertices (or all of them if fewer).
    pub fn truncate(self, count: usize) -> VertexStream<'a> {
        match self {
            Self::Plain(v) => Self::Plain(&v[..count.min(v.len())]),
            Self::Colored(v) => Self::Colored(&v[..count.min(v.len())]),
            Self::Textured(v) => Self::Textured(&v[..count.min(v.len())]),
            Self::ColoredTextured(v) => Self::ColoredTextured(&v[..count.min(v.len())]),
        }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        match *self {
            Self::Plain(v) => bytemuck::cast_slice(v),
            Self::Colored(v) => bytemuck::cast_slice(v),
            Self::Textured(v) => bytemuck::cast_slice(v),
            Self::ColoredTextured(v) => bytemuck::cast_slice(v),
        }
    }

    /// Position of vertex `i`.
    pub fn position(&self, i: usize) -> [f32; 3] {
        match self {
            Self::Plain(v) => [v[i].x, v[i].y, v[i].z],
            Self::Colored(v) => [v[i].x, v[i].y, v[i].z],
            Self::Textured(v) => [v[i].x, v[i].y, v[i].z],
            Self::ColoredTextured(v) => [v[i].x, v[i].y, v[i].z],
        }
    }

    /// Texture coordinates of vertex `i`, `(0, 0)` for layouts without UVs.
    pub fn uv(&self, i: usize) -> [f32; 2] {
        match self {
            Self::Textured(v) => [v[i].u, v[i].v],
            Self::ColoredTextured(v) => [v[i].u, v[i].v],
            _ => [0.0, 0.0],
        }
    }

    /// Per-vertex color of vertex `i`, `None` for layouts without color.
    pub fn color(&self, i: usize) -> Option<Color> {
        match self {
            Self::Colored(v) => Some(Color::from_native_u32(v[i].color)),
            Self::ColoredTextured(v) => Some(Color::from_native_u32(v[i].color)),
            _ => None,
        }
    }
}

impl<'a> From<&'a [PlainVertex]> for VertexStream<'a> {
    fn from(v: &'a [PlainVertex]) -> Self {
        Self::Plain(v)
    }
}

impl<'a> From<&'a [ColoredVertex]> for VertexStream<'a> {
    fn from(v: &'a [ColoredVertex]) -> Self {
        Self::Colored(v)
    }
}

impl<'a> From<&'a [TexturedVertex]> for VertexStream<'a> {
    fn from(v: &'a [TexturedVertex]) -> Self {
        Self::Textured(v)
    }
}

impl<'a> From<&'a [ColoredTexturedVertex]> for VertexStream<'a> {
    fn from(v: &'a [ColoredTexturedVertex]) -> Self {
        Self::ColoredTextured(v)
    }
}
