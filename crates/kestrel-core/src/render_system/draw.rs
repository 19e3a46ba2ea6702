//! Draw dispatch: every draw converges on [`RenderSystem::render`].

use kestrel_types::color::Color;
use kestrel_types::geometry::{PixelRect, Rect, Vec2};
use kestrel_types::state::{AddressMode, RenderOp};
use kestrel_types::vertex::{
    ColoredTexturedVertex, ColoredVertex, PlainVertex, TexturedVertex, VertexStream,
};

use super::RenderSystem;
use crate::backend::NativeTextureId;
use crate::render_state;

/// Largest vertex count `<= count` that forms whole primitives for `op`.
pub fn limit_vertices(op: RenderOp, count: usize) -> usize {
    match op {
        RenderOp::TriangleList => count - count % 3,
        RenderOp::TriangleStrip | RenderOp::TriangleFan => {
            if count < 3 {
                0
            } else {
                count
            }
        }
        RenderOp::LineList => count - count % 2,
        RenderOp::LineStrip => {
            if count < 2 {
                0
            } else {
                count
            }
        }
        RenderOp::PointList => count,
    }
}

/// Primitives drawn by `count` vertices, after [`limit_vertices`].
pub fn primitive_count(op: RenderOp, count: usize) -> usize {
    let count = limit_vertices(op, count);
    match op {
        RenderOp::TriangleList => count / 3,
        RenderOp::TriangleStrip | RenderOp::TriangleFan => count.saturating_sub(2),
        RenderOp::LineList => count / 2,
        RenderOp::LineStrip => count.saturating_sub(1),
        RenderOp::PointList => count,
    }
}

/// Owned vertices, for draws the render system has to rewrite.
enum OwnedStream {
    Plain(Vec<PlainVertex>),
    Colored(Vec<ColoredVertex>),
    Textured(Vec<TexturedVertex>),
    ColoredTextured(Vec<ColoredTexturedVertex>),
}

impl OwnedStream {
    fn as_stream(&self) -> VertexStream<'_> {
        match self {
            Self::Plain(v) => VertexStream::Plain(v),
            Self::Colored(v) => VertexStream::Colored(v),
            Self::Textured(v) => VertexStream::Textured(v),
            Self::ColoredTextured(v) => VertexStream::ColoredTextured(v),
        }
    }
}

/// Triangle list equivalent to a fan of at least three vertices.
fn fan_to_list(stream: VertexStream<'_>) -> OwnedStream {
    fn expand<T: Copy>(v: &[T]) -> Vec<T> {
        (1..v.len().saturating_sub(1))
            .flat_map(|i| [v[0], v[i], v[i + 1]])
            .collect()
    }
    match stream {
        VertexStream::Plain(v) => OwnedStream::Plain(expand(v)),
        VertexStream::Colored(v) => OwnedStream::Colored(expand(v)),
        VertexStream::Textured(v) => OwnedStream::Textured(expand(v)),
        VertexStream::ColoredTextured(v) => OwnedStream::ColoredTextured(expand(v)),
    }
}

/// Corners of `rect` in strip order: top-left, top-right, bottom-left,
/// bottom-right.
fn quad(rect: Rect) -> [(f32, f32); 4] {
    [
        (rect.x, rect.y),
        (rect.right(), rect.y),
        (rect.x, rect.bottom()),
        (rect.right(), rect.bottom()),
    ]
}

impl RenderSystem {
    /// Draw `vertices` with the system color white.
    ///
    /// Vertex counts that do not form whole primitives are cut to the
    /// largest valid prefix; empty draws are skipped. Failed draws are
    /// logged, never returned.
    pub fn render<'v>(&mut self, op: RenderOp, vertices: impl Into<VertexStream<'v>>) {
        self.dispatch(op, vertices.into(), Color::WHITE);
    }

    /// Draw `vertices` modulated by `color`.
    pub fn render_colored<'v>(
        &mut self,
        op: RenderOp,
        vertices: impl Into<VertexStream<'v>>,
        color: Color,
    ) {
        self.dispatch(op, vertices.into(), color);
    }

    fn dispatch(&mut self, op: RenderOp, vertices: VertexStream<'_>, color: Color) {
        if !self.device.is_ready() {
            log::debug!("skipping draw without a device");
            return;
        }
        let count = limit_vertices(op, vertices.len());
        if count == 0 {
            return;
        }
        let vertices = vertices.truncate(count);

        let textured = vertices.has_uv();
        self.state.texture_id = if textured {
            self.bind_active_texture()
        } else {
            None
        };
        self.state.texture_coordinates_enabled = textured;
        self.state.color_enabled = vertices.has_color();
        self.state.system_color = color;
        (self.state.vertex_shader, self.state.pixel_shader) = self.active_native_shaders();

        let force = std::mem::take(&mut self.force_state_update);
        self.stats.state_changes += render_state::reconcile(
            &self.state,
            &mut self.device_state,
            self.backend.as_mut(),
            force,
        );
        self.push_matrices();

        let result = if op == RenderOp::TriangleFan && !self.caps.triangle_fans {
            let list = fan_to_list(vertices);
            self.backend.draw(RenderOp::TriangleList, list.as_stream())
        } else {
            self.backend.draw(op, vertices)
        };
        match result {
            Ok(()) => {
                self.stats.draw_calls += 1;
                self.stats.primitives += primitive_count(op, count);
            }
            Err(e) => log::error!("{op:?} draw of {count} vertices failed: {e}"),
        }
    }

    /// Make the active texture drawable, loading it on demand, and adopt its
    /// sampling state. `None` draws untextured.
    fn bind_active_texture(&mut self) -> Option<NativeTextureId> {
        let id = self.active_texture?;
        let mut texture = self.texture_mut(id)?;
        let ready = if texture.load_mode().is_async() && !texture.is_loaded() {
            if texture.is_async_load_ready() {
                texture.load()
            } else {
                // Still decoding, or not started for on-demand textures.
                if !texture.is_async_load_queued() {
                    texture.load_async();
                }
                false
            }
        } else {
            texture.load()
        };
        if !ready {
            return None;
        }
        let native = texture.native_id();
        let filter = texture.filter();
        let address = self.textures.get(&id).map(|t| self.effective_address_mode(t));
        self.state.texture_filter = filter;
        self.state.texture_address_mode = address.unwrap_or(AddressMode::Wrap);
        native
    }

    fn push_matrices(&mut self) {
        if self.state.modelview_matrix_changed {
            self.backend.set_modelview_matrix(&self.modelview);
            self.state.modelview_matrix_changed = false;
        }
        if self.state.projection_matrix_changed {
            self.backend.set_projection_matrix(&self.projection);
            self.state.projection_matrix_changed = false;
        }
    }

    /// Outline of `rect` as a closed line strip.
    pub fn draw_rect(&mut self, rect: Rect, color: Color) {
        let [tl, tr, bl, br] = quad(rect);
        let v = [tl, tr, br, bl, tl].map(|(x, y)| PlainVertex::new(x, y, 0.0));
        self.render_colored(RenderOp::LineStrip, &v[..], color);
    }

    pub fn draw_filled_rect(&mut self, rect: Rect, color: Color) {
        let v = quad(rect).map(|(x, y)| PlainVertex::new(x, y, 0.0));
        self.render_colored(RenderOp::TriangleStrip, &v[..], color);
    }

    /// UV corners for `src` (normalized to the logical image) on the
    /// active texture's storage.
    fn quad_uvs(&self, src: Rect) -> [(f32, f32); 4] {
        let scale = self
            .active_texture
            .and_then(|id| self.textures.get(&id))
            .map_or(Vec2::ONE, |t| t.uv_scale());
        let src = Rect::new(src.x * scale.x, src.y * scale.y, src.w * scale.x, src.h * scale.y);
        quad(src)
    }

    /// Draw `rect` textured with the `src` region of the bound texture.
    pub fn draw_textured_rect(&mut self, rect: Rect, src: Rect) {
        let uvs = self.quad_uvs(src);
        let pos = quad(rect);
        let v: [TexturedVertex; 4] =
            std::array::from_fn(|i| TexturedVertex::new(pos[i].0, pos[i].1, 0.0, uvs[i].0, uvs[i].1));
        self.render(RenderOp::TriangleStrip, &v[..]);
    }

    pub fn draw_textured_rect_colored(&mut self, rect: Rect, src: Rect, color: Color) {
        let uvs = self.quad_uvs(src);
        let pos = quad(rect);
        let v: [TexturedVertex; 4] =
            std::array::from_fn(|i| TexturedVertex::new(pos[i].0, pos[i].1, 0.0, uvs[i].0, uvs[i].1));
        self.render_colored(RenderOp::TriangleStrip, &v[..], color);
    }

    /// Clear the whole target; the color is transparent black.
    pub fn clear(&mut self, use_color: bool, depth: bool) {
        if !self.device.is_ready() {
            return;
        }
        self.backend.clear(use_color.then_some(Color::CLEAR), depth);
    }

    /// Clear to `color`.
    pub fn clear_color(&mut self, color: Color, depth: bool) {
        if !self.device.is_ready() {
            return;
        }
        self.backend.clear(Some(color), depth);
    }

    /// Clear a sub-rectangle of the target.
    pub fn clear_rect(&mut self, depth: bool, rect: Rect, color: Color) {
        if !self.device.is_ready() {
            return;
        }
        let rect = PixelRect::new(
            rect.x.round() as i32,
            rect.y.round() as i32,
            rect.w.round() as i32,
            rect.h.round() as i32,
        );
        if rect.is_empty() {
            return;
        }
        self.backend.clear_rect(rect, color, depth);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_per_op() {
        assert_eq!(limit_vertices(RenderOp::TriangleList, 7), 6);
        assert_eq!(limit_vertices(RenderOp::TriangleList, 2), 0);
        assert_eq!(limit_vertices(RenderOp::TriangleStrip, 2), 0);
        assert_eq!(limit_vertices(RenderOp::TriangleFan, 5), 5);
        assert_eq!(limit_vertices(RenderOp::LineList, 5), 4);
        assert_eq!(limit_vertices(RenderOp::LineStrip, 1), 0);
        assert_eq!(limit_vertices(RenderOp::PointList, 1), 1);
    }

    #[test]
    fn primitive_counts() {
        assert_eq!(primitive_count(RenderOp::TriangleList, 7), 2);
        assert_eq!(primitive_count(RenderOp::TriangleStrip, 4), 2);
        assert_eq!(primitive_count(RenderOp::TriangleFan, 2), 0);
        assert_eq!(primitive_count(RenderOp::LineList, 4), 2);
        assert_eq!(primitive_count(RenderOp::LineStrip, 5), 4);
        assert_eq!(primitive_count(RenderOp::PointList, 3), 3);
    }

    #[test]
    fn fan_expands_to_triangles() {
        let v: Vec<PlainVertex> = (0..5).map(|i| PlainVertex::new(i as f32, 0.0, 0.0)).collect();
        let list = fan_to_list(VertexStream::Plain(&v));
        let OwnedStream::Plain(out) = list else {
            panic!("layout changed");
        };
        let xs: Vec<f32> = out.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 0.0, 2.0, 3.0, 0.0, 3.0, 4.0]);
    }

    #[test]
    fn quad_corner_order() {
        let q = quad(Rect::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(q, [(1.0, 2.0), (4.0, 2.0), (1.0, 6.0), (4.0, 6.0)]);
    }
}
