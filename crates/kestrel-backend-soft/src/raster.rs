//! Scan conversion of triangles, lines and points.
//!
//! Pixel centers sit at `(x + 0.5, y + 0.5)`. Triangles use edge functions
//! with a tie-break on shared edges, so two triangles that share an edge
//! never both cover a pixel whose center lies exactly on it. Attributes are
//! interpolated perspective-correctly through `inv_w`.

use glam::Vec4;
use kestrel_types::color::Color;
use kestrel_types::geometry::PixelRect;

/// A vertex after projection and the viewport transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenVertex {
    pub x: f32,
    pub y: f32,
    /// Depth in `[0, 1]`.
    pub z: f32,
    /// `1 / w` of the clip-space position.
    pub inv_w: f32,
    pub u: f32,
    pub v: f32,
    /// Diffuse color, channels in `[0, 1]`.
    pub color: Vec4,
}

/// One covered pixel with interpolated attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fragment {
    pub x: u32,
    pub y: u32,
    pub z: f32,
    pub u: f32,
    pub v: f32,
    pub color: Color,
}

fn to_color(c: Vec4) -> Color {
    Color::from_f32(c.x, c.y, c.z, c.w)
}

fn edge(ax: f32, ay: f32, bx: f32, by: f32, px: f32, py: f32) -> f32 {
    (bx - ax) * (py - ay) - (by - ay) * (px - ax)
}

/// Whether a pixel exactly on the edge `a -> b` belongs to this triangle.
fn owns_edge(a: &ScreenVertex, b: &ScreenVertex) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    dy > 0.0 || (dy == 0.0 && dx < 0.0)
}

fn inside(w: f32, owned: bool) -> bool {
    w > 0.0 || (w == 0.0 && owned)
}

/// Pixel range `[lo, hi)` covering centers within `[min, max]`, clipped.
fn span(min: f32, max: f32, clip_lo: i32, clip_hi: i32) -> (i32, i32) {
    let lo = ((min - 0.5).ceil() as i32).max(clip_lo);
    let hi = (((max - 0.5).floor() as i32) + 1).min(clip_hi);
    (lo, hi)
}

pub fn triangle(
    a: &ScreenVertex,
    b: &ScreenVertex,
    c: &ScreenVertex,
    clip: PixelRect,
    mut emit: impl FnMut(Fragment),
) {
    let area = edge(a.x, a.y, b.x, b.y, c.x, c.y);
    if area == 0.0 || !area.is_finite() {
        return;
    }
    let (b, c) = if area < 0.0 { (c, b) } else { (b, c) };
    let area = area.abs();

    let (x0, x1) = span(
        a.x.min(b.x).min(c.x),
        a.x.max(b.x).max(c.x),
        clip.x,
        clip.x + clip.w,
    );
    let (y0, y1) = span(
        a.y.min(b.y).min(c.y),
        a.y.max(b.y).max(c.y),
        clip.y,
        clip.y + clip.h,
    );

    let own_bc = owns_edge(b, c);
    let own_ca = owns_edge(c, a);
    let own_ab = owns_edge(a, b);

    for py in y0..y1 {
        let cy = py as f32 + 0.5;
        for px in x0..x1 {
            let cx = px as f32 + 0.5;
            let w0 = edge(b.x, b.y, c.x, c.y, cx, cy);
            let w1 = edge(c.x, c.y, a.x, a.y, cx, cy);
            let w2 = edge(a.x, a.y, b.x, b.y, cx, cy);
            if !(inside(w0, own_bc) && inside(w1, own_ca) && inside(w2, own_ab)) {
                continue;
            }
            let (l0, l1, l2) = (w0 / area, w1 / area, w2 / area);
            let z = l0 * a.z + l1 * b.z + l2 * c.z;
            let p0 = l0 * a.inv_w;
            let p1 = l1 * b.inv_w;
            let p2 = l2 * c.inv_w;
            let sum = p0 + p1 + p2;
            let (p0, p1, p2) = if sum != 0.0 {
                (p0 / sum, p1 / sum, p2 / sum)
            } else {
                (l0, l1, l2)
            };
            emit(Fragment {
                x: px as u32,
                y: py as u32,
                z,
                u: p0 * a.u + p1 * b.u + p2 * c.u,
                v: p0 * a.v + p1 * b.v + p2 * c.v,
                color: to_color(a.color * p0 + b.color * p1 + c.color * p2),
            });
        }
    }
}

fn in_clip(x: i32, y: i32, clip: PixelRect) -> bool {
    x >= clip.x && y >= clip.y && x < clip.x + clip.w && y < clip.y + clip.h
}

/// DDA line from `a` to `b`. The final endpoint is not drawn, so connected
/// strips touch every joint once.
pub fn line(a: &ScreenVertex, b: &ScreenVertex, clip: PixelRect, mut emit: impl FnMut(Fragment)) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let steps = dx.abs().max(dy.abs()).ceil();
    if steps < 1.0 || !steps.is_finite() {
        return;
    }
    let n = steps as i32;
    for i in 0..n {
        let t = i as f32 / steps;
        let x = (a.x + dx * t).floor() as i32;
        let y = (a.y + dy * t).floor() as i32;
        if !in_clip(x, y, clip) {
            continue;
        }
        emit(Fragment {
            x: x as u32,
            y: y as u32,
            z: a.z + (b.z - a.z) * t,
            u: a.u + (b.u - a.u) * t,
            v: a.v + (b.v - a.v) * t,
            color: to_color(a.color.lerp(b.color, t)),
        });
    }
}

pub fn point(a: &ScreenVertex, clip: PixelRect, mut emit: impl FnMut(Fragment)) {
    let x = a.x.floor() as i32;
    let y = a.y.floor() as i32;
    if !in_clip(x, y, clip) {
        return;
    }
    emit(Fragment {
        x: x as u32,
        y: y as u32,
        z: a.z,
        u: a.u,
        v: a.v,
        color: to_color(a.color),
    });
}
