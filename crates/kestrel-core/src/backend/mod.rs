//! Backend trait definitions.
//!
//! Every graphics API binding implements [`GraphicsBackend`]. The render
//! system never calls a native API directly: state changes, texture storage
//! and draws all cross this trait boundary, and the render system decides
//! *when* each hook runs (lazily, only for state that actually changed).

pub mod recording;

use serde::Serialize;

use kestrel_types::color::Color;
use kestrel_types::error::{KestrelError, Result};
use kestrel_types::geometry::{Mat4, PixelRect};
use kestrel_types::image::{Image, ImageFormat};
use kestrel_types::state::{AddressMode, BlendMode, ColorMode, RenderOp, TextureFilter, TextureType};
use kestrel_types::vertex::VertexStream;

/// Opaque handle to a texture allocated by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeTextureId(pub u64);

/// Opaque handle to a compiled shader owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeShaderId(pub u64);

/// What a backend can do natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caps {
    pub max_texture_size: u32,
    /// Arbitrary texture sizes are supported.
    pub npot_textures: bool,
    /// Non-power-of-two sizes work, but only with clamped addressing.
    pub npot_textures_limited: bool,
    /// `RenderOp::TriangleFan` is drawn natively.
    pub triangle_fans: bool,
    pub render_targets: bool,
    /// Vertex and pixel shaders can be compiled from source.
    pub shaders: bool,
}

impl Default for Caps {
    fn default() -> Self {
        Self {
            max_texture_size: 4096,
            npot_textures: true,
            npot_textures_limited: false,
            triangle_fans: true,
            render_targets: true,
            shaders: true,
        }
    }
}

impl Caps {
    /// Whether textures must be padded to power-of-two storage.
    pub fn needs_pot_padding(&self) -> bool {
        !self.npot_textures && !self.npot_textures_limited
    }
}

/// Window the device is bound to, as reported by the windowing layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    /// Platform window handle, if the backend needs one.
    pub native_handle: Option<u64>,
}

impl WindowInfo {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fullscreen: false,
            native_handle: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub depth_buffer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DisplayMode {
    pub width: u32,
    pub height: u32,
    pub refresh_rate: u32,
}

/// Storage request for a new native texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub texture_type: TextureType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    pub name: String,
    pub display_width: u32,
    pub display_height: u32,
    pub cpu_cores: usize,
    pub max_texture_size: u32,
}

/// Native graphics API binding.
///
/// State hooks are only ever called with defined values; the `Undefined`
/// sentinels are filtered out before they reach a backend. Hooks that push
/// state are infallible, draws and resource operations return errors that
/// the render system logs (per-draw) or propagates (setup).
pub trait GraphicsBackend {
    fn name(&self) -> &str;

    fn caps(&self) -> Caps;

    /// Offset in pixels applied to orthographic projections so texel
    /// centers land on pixel centers.
    fn pixel_offset(&self) -> f32 {
        0.0
    }

    fn supported_display_modes(&self) -> Vec<DisplayMode> {
        Vec::new()
    }

    fn system_info(&self) -> SystemInfo {
        SystemInfo {
            name: self.name().to_string(),
            cpu_cores: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            max_texture_size: self.caps().max_texture_size,
            ..SystemInfo::default()
        }
    }

    // -- Device lifecycle ---------------------------------------------------

    fn create_device(&mut self, window: &WindowInfo, options: &RenderOptions) -> Result<()>;

    fn destroy_device(&mut self) -> Result<()>;

    /// Re-acquire the device after a loss. All native textures are gone
    /// afterwards.
    fn reset_device(&mut self) -> Result<()>;

    /// Whether the backend has detected a device loss since the last reset.
    fn device_lost(&self) -> bool {
        false
    }

    /// Resize the back buffer.
    fn set_resolution(&mut self, width: u32, height: u32, fullscreen: bool) -> Result<()>;

    fn set_viewport(&mut self, rect: PixelRect);

    /// Clear the whole surface. `color` is `None` to leave color untouched.
    fn clear(&mut self, color: Option<Color>, depth: bool);

    fn clear_rect(&mut self, rect: PixelRect, color: Color, depth: bool);

    // -- State hooks --------------------------------------------------------

    fn set_blend_mode(&mut self, mode: BlendMode);

    fn set_color_mode(&mut self, mode: ColorMode, factor: f32);

    fn set_texture_filter(&mut self, filter: TextureFilter);

    fn set_texture_address_mode(&mut self, mode: AddressMode);

    fn set_depth_buffer(&mut self, enabled: bool, write: bool);

    /// Constant color used for vertices without their own color.
    fn set_system_color(&mut self, color: Color);

    /// Which vertex attributes the next draws read.
    fn set_vertex_layout(&mut self, _textured: bool, _colored: bool) {}

    fn bind_texture(&mut self, id: Option<NativeTextureId>);

    fn set_modelview_matrix(&mut self, matrix: &Mat4);

    fn set_projection_matrix(&mut self, matrix: &Mat4);

    /// Redirect draws to a texture, or back to the back buffer with `None`.
    fn set_render_target(&mut self, target: Option<NativeTextureId>) -> Result<()>;

    // -- Drawing ------------------------------------------------------------

    fn draw(&mut self, op: RenderOp, vertices: VertexStream<'_>) -> Result<()>;

    fn present(&mut self) -> Result<()>;

    /// Read the back buffer.
    fn take_screenshot(&mut self, format: ImageFormat) -> Result<Image>;

    // -- Textures -----------------------------------------------------------

    /// The storage format the backend prefers for data in `format`.
    fn native_texture_format(&self, format: ImageFormat) -> ImageFormat;

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<NativeTextureId>;

    fn destroy_texture(&mut self, id: NativeTextureId);

    /// Write a tightly packed `rect` of pixels in `format`.
    fn upload_texture(
        &mut self,
        id: NativeTextureId,
        rect: PixelRect,
        data: &[u8],
        format: ImageFormat,
    ) -> Result<()>;

    /// Read `rect` back as tightly packed pixels in the texture's format.
    fn read_texture(&mut self, id: NativeTextureId, rect: PixelRect) -> Result<Vec<u8>>;

    // -- Shaders ------------------------------------------------------------

    fn create_vertex_shader(&mut self, _source: &str) -> Result<NativeShaderId> {
        Err(KestrelError::Backend(format!("{} has no shader support", self.name())))
    }

    fn create_pixel_shader(&mut self, _source: &str) -> Result<NativeShaderId> {
        Err(KestrelError::Backend(format!("{} has no shader support", self.name())))
    }

    fn destroy_shader(&mut self, _id: NativeShaderId) {}

    /// Vertex shader for the next draws, `None` for the built-in one.
    fn set_vertex_shader(&mut self, _id: Option<NativeShaderId>) {}

    /// Pixel shader for the next draws, `None` for the built-in one.
    fn set_pixel_shader(&mut self, _id: Option<NativeShaderId>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pot_padding_needed_only_without_any_npot_support() {
        let mut caps = Caps::default();
        assert!(!caps.needs_pot_padding());
        caps.npot_textures = false;
        caps.npot_textures_limited = true;
        assert!(!caps.needs_pot_padding());
        caps.npot_textures_limited = false;
        assert!(caps.needs_pot_padding());
    }

    #[test]
    fn system_info_serializes() {
        let info = SystemInfo {
            name: "soft".into(),
            display_width: 640,
            display_height: 480,
            cpu_cores: 4,
            max_texture_size: 2048,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"cpu_cores\":4"));
    }
}
