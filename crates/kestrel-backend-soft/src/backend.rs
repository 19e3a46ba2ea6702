//! [`GraphicsBackend`] implementation on top of the software rasterizer.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec4;

use kestrel_core::backend::{
    Caps, DisplayMode, GraphicsBackend, NativeTextureId, RenderOptions, SystemInfo, TextureDesc,
    WindowInfo,
};
use kestrel_types::color::Color;
use kestrel_types::error::{KestrelError, Result};
use kestrel_types::geometry::{Mat4, PixelRect};
use kestrel_types::image::{self, Image, ImageFormat};
use kestrel_types::state::{
    AddressMode, BlendMode, ColorMode, RenderOp, TextureFilter, TextureType,
};
use kestrel_types::vertex::VertexStream;

use crate::raster::{self, Fragment, ScreenVertex};
use crate::sampler::SoftTexture;
use crate::shade;
use crate::surface::Surface;

/// Shared switch that simulates losing the device.
///
/// While set, draws and texture operations fail and
/// [`GraphicsBackend::device_lost`] reports `true`. `reset_device` clears it.
#[derive(Debug, Clone, Default)]
pub struct DeviceLossTrigger(Rc<Cell<bool>>);

impl DeviceLossTrigger {
    pub fn trigger(&self) {
        self.0.set(true);
    }

    pub fn is_set(&self) -> bool {
        self.0.get()
    }

    fn clear(&self) {
        self.0.set(false);
    }
}

const DISPLAY_MODES: [(u32, u32); 5] = [(640, 480), (800, 600), (1024, 768), (1280, 720), (1920, 1080)];

/// Headless RGBA rasterizer.
pub struct SoftwareBackend {
    caps: Caps,
    back: Option<Surface>,
    depth_buffer: bool,
    textures: HashMap<u64, SoftTexture>,
    next_texture: u64,
    target: Option<NativeTextureId>,
    viewport: PixelRect,
    blend_mode: BlendMode,
    color_mode: ColorMode,
    lerp_factor: f32,
    filter: TextureFilter,
    address_mode: AddressMode,
    depth_test: bool,
    depth_write: bool,
    system_color: Color,
    bound: Option<NativeTextureId>,
    modelview: Mat4,
    projection: Mat4,
    loss: DeviceLossTrigger,
    frames: u64,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self::with_caps(Caps {
            max_texture_size: 8192,
            npot_textures: true,
            npot_textures_limited: false,
            triangle_fans: true,
            render_targets: true,
            shaders: false,
        })
    }

    /// Advertise restricted capabilities, e.g. to exercise POT padding.
    pub fn with_caps(caps: Caps) -> Self {
        Self {
            caps,
            back: None,
            depth_buffer: false,
            textures: HashMap::new(),
            next_texture: 1,
            target: None,
            viewport: PixelRect::default(),
            blend_mode: BlendMode::Alpha,
            color_mode: ColorMode::Multiply,
            lerp_factor: 0.0,
            filter: TextureFilter::Linear,
            address_mode: AddressMode::Wrap,
            depth_test: false,
            depth_write: false,
            system_color: Color::WHITE,
            bound: None,
            modelview: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            loss: DeviceLossTrigger::default(),
            frames: 0,
        }
    }

    /// Handle for simulating device loss after the backend is boxed.
    pub fn loss_trigger(&self) -> DeviceLossTrigger {
        self.loss.clone()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    fn check_device(&self) -> Result<()> {
        if self.loss.is_set() {
            return Err(KestrelError::Device("device lost".into()));
        }
        if self.back.is_none() {
            return Err(KestrelError::Device("no device".into()));
        }
        Ok(())
    }

    fn texture(&self, id: NativeTextureId) -> Result<&SoftTexture> {
        self.textures
            .get(&id.0)
            .ok_or_else(|| KestrelError::Backend(format!("unknown texture {id:?}")))
    }

    /// Run `f` on the current render target. A texture target is taken out
    /// of the texture table for the duration, so it can never be sampled
    /// while being drawn into.
    fn with_target<R>(&mut self, f: impl FnOnce(&Self, &mut Surface) -> R) -> Result<R> {
        match self.target {
            None => {
                let mut surface = self
                    .back
                    .take()
                    .ok_or_else(|| KestrelError::Device("no device".into()))?;
                let r = f(self, &mut surface);
                self.back = Some(surface);
                Ok(r)
            }
            Some(id) => {
                let SoftTexture {
                    width,
                    height,
                    data,
                    texture_type,
                } = self
                    .textures
                    .remove(&id.0)
                    .ok_or_else(|| KestrelError::Backend(format!("unknown render target {id:?}")))?;
                let mut surface = Surface::from_rgba(width, height, data);
                let r = f(self, &mut surface);
                self.textures.insert(
                    id.0,
                    SoftTexture {
                        width,
                        height,
                        data: surface.into_rgba(),
                        texture_type,
                    },
                );
                Ok(r)
            }
        }
    }

    fn to_screen(&self, mvp: &Mat4, vertices: &VertexStream<'_>, i: usize) -> ScreenVertex {
        let [x, y, z] = vertices.position(i);
        let clip = *mvp * Vec4::new(x, y, z, 1.0);
        let inv_w = if clip.w != 0.0 { 1.0 / clip.w } else { 0.0 };
        let ndc = clip.truncate() * inv_w;
        let vp = self.viewport;
        let [u, v] = vertices.uv(i);
        let color = vertices.color(i).unwrap_or(self.system_color);
        ScreenVertex {
            x: vp.x as f32 + (ndc.x + 1.0) * 0.5 * vp.w as f32,
            y: vp.y as f32 + (1.0 - ndc.y) * 0.5 * vp.h as f32,
            z: (ndc.z + 1.0) * 0.5,
            inv_w,
            u,
            v,
            color: Vec4::new(color.r_f(), color.g_f(), color.b_f(), color.a_f()),
        }
    }

    fn rasterize(&self, surface: &mut Surface, op: RenderOp, vertices: VertexStream<'_>) {
        let Some(clip) = self.viewport.clip_to(surface.width, surface.height) else {
            return;
        };
        let mvp = self.projection * self.modelview;
        let n = vertices.len();
        let screen: Vec<ScreenVertex> = (0..n).map(|i| self.to_screen(&mvp, &vertices, i)).collect();
        let texture = if vertices.has_uv() {
            self.bound.and_then(|id| self.textures.get(&id.0))
        } else {
            None
        };

        let mut shade = |f: Fragment| {
            if self.depth_test && !surface.depth_test(f.x, f.y, f.z, self.depth_write) {
                return;
            }
            let color = match texture {
                Some(t) => {
                    let texel = t.sample(f.u, f.v, self.filter, self.address_mode);
                    shade::combine(self.color_mode, self.lerp_factor, texel, f.color)
                }
                None => f.color,
            };
            let dst = surface.get(f.x, f.y);
            surface.put(f.x, f.y, shade::blend(self.blend_mode, color, dst));
        };

        // No near-plane clipping: primitives with a vertex behind the eye
        // are dropped.
        let visible = |v: &[&ScreenVertex]| v.iter().all(|s| s.inv_w > 0.0);
        let mut tri = |a: &ScreenVertex, b: &ScreenVertex, c: &ScreenVertex| {
            if visible(&[a, b, c]) {
                raster::triangle(a, b, c, clip, &mut shade);
            }
        };
        match op {
            RenderOp::TriangleList => {
                for t in screen.chunks_exact(3) {
                    tri(&t[0], &t[1], &t[2]);
                }
            }
            RenderOp::TriangleStrip => {
                for i in 2..n {
                    tri(&screen[i - 2], &screen[i - 1], &screen[i]);
                }
            }
            RenderOp::TriangleFan => {
                for i in 2..n {
                    tri(&screen[0], &screen[i - 1], &screen[i]);
                }
            }
            RenderOp::LineList | RenderOp::LineStrip => {
                let segments: Vec<(&ScreenVertex, &ScreenVertex)> = if op == RenderOp::LineList {
                    screen.chunks_exact(2).map(|s| (&s[0], &s[1])).collect()
                } else {
                    screen.windows(2).map(|s| (&s[0], &s[1])).collect()
                };
                for (a, b) in segments {
                    if visible(&[a, b]) {
                        raster::line(a, b, clip, &mut shade);
                    }
                }
            }
            RenderOp::PointList => {
                for p in &screen {
                    if visible(&[p]) {
                        raster::point(p, clip, &mut shade);
                    }
                }
            }
        }
    }
}

impl GraphicsBackend for SoftwareBackend {
    fn name(&self) -> &str {
        "software"
    }

    fn caps(&self) -> Caps {
        self.caps
    }

    fn supported_display_modes(&self) -> Vec<DisplayMode> {
        DISPLAY_MODES
            .iter()
            .map(|&(width, height)| DisplayMode {
                width,
                height,
                refresh_rate: 60,
            })
            .collect()
    }

    fn system_info(&self) -> SystemInfo {
        let (display_width, display_height) =
            self.back.as_ref().map_or((0, 0), |s| (s.width, s.height));
        SystemInfo {
            name: self.name().to_string(),
            display_width,
            display_height,
            cpu_cores: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            max_texture_size: self.caps.max_texture_size,
        }
    }

    fn create_device(&mut self, window: &WindowInfo, options: &RenderOptions) -> Result<()> {
        if window.width == 0 || window.height == 0 {
            return Err(KestrelError::Device(format!(
                "invalid back buffer size {}x{}",
                window.width, window.height
            )));
        }
        self.depth_buffer = options.depth_buffer;
        self.back = Some(Surface::new(window.width, window.height, options.depth_buffer));
        self.viewport = PixelRect::full(window.width, window.height);
        log::info!(
            "software device created: {}x{} depth={}",
            window.width,
            window.height,
            options.depth_buffer
        );
        Ok(())
    }

    fn destroy_device(&mut self) -> Result<()> {
        self.back = None;
        self.textures.clear();
        self.target = None;
        self.bound = None;
        log::info!("software device destroyed");
        Ok(())
    }

    fn reset_device(&mut self) -> Result<()> {
        let (w, h) = self
            .back
            .as_ref()
            .map(|s| (s.width, s.height))
            .ok_or_else(|| KestrelError::Device("no device to reset".into()))?;
        self.back = Some(Surface::new(w, h, self.depth_buffer));
        self.textures.clear();
        self.target = None;
        self.bound = None;
        self.loss.clear();
        log::info!("software device reset");
        Ok(())
    }

    fn device_lost(&self) -> bool {
        self.loss.is_set()
    }

    fn set_resolution(&mut self, width: u32, height: u32, _fullscreen: bool) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(KestrelError::Device(format!(
                "invalid back buffer size {width}x{height}"
            )));
        }
        self.back = Some(Surface::new(width, height, self.depth_buffer));
        Ok(())
    }

    fn set_viewport(&mut self, rect: PixelRect) {
        self.viewport = rect;
    }

    fn clear(&mut self, color: Option<Color>, depth: bool) {
        if let Err(e) = self.with_target(|_, s| s.clear(color, depth)) {
            log::warn!("clear skipped: {e}");
        }
    }

    fn clear_rect(&mut self, rect: PixelRect, color: Color, depth: bool) {
        if let Err(e) = self.with_target(|_, s| s.clear_rect(rect, color, depth)) {
            log::warn!("clear_rect skipped: {e}");
        }
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend_mode = mode;
    }

    fn set_color_mode(&mut self, mode: ColorMode, factor: f32) {
        self.color_mode = mode;
        self.lerp_factor = factor;
    }

    fn set_texture_filter(&mut self, filter: TextureFilter) {
        self.filter = filter;
    }

    fn set_texture_address_mode(&mut self, mode: AddressMode) {
        self.address_mode = mode;
    }

    fn set_depth_buffer(&mut self, enabled: bool, write: bool) {
        self.depth_test = enabled;
        self.depth_write = write;
    }

    fn set_system_color(&mut self, color: Color) {
        self.system_color = color;
    }

    fn bind_texture(&mut self, id: Option<NativeTextureId>) {
        self.bound = id;
    }

    fn set_modelview_matrix(&mut self, matrix: &Mat4) {
        self.modelview = *matrix;
    }

    fn set_projection_matrix(&mut self, matrix: &Mat4) {
        self.projection = *matrix;
    }

    fn set_render_target(&mut self, target: Option<NativeTextureId>) -> Result<()> {
        if let Some(id) = target {
            let texture = self.texture(id)?;
            if texture.texture_type != TextureType::RenderTarget {
                return Err(KestrelError::Backend(format!(
                    "texture {id:?} is not a render target"
                )));
            }
        }
        self.target = target;
        Ok(())
    }

    fn draw(&mut self, op: RenderOp, vertices: VertexStream<'_>) -> Result<()> {
        self.check_device()?;
        self.with_target(|backend, surface| backend.rasterize(surface, op, vertices))
    }

    fn present(&mut self) -> Result<()> {
        self.frames += 1;
        log::trace!("software frame {} presented", self.frames);
        Ok(())
    }

    fn take_screenshot(&mut self, format: ImageFormat) -> Result<Image> {
        self.back
            .as_ref()
            .map(|s| s.to_image(format))
            .ok_or_else(|| KestrelError::Device("no device".into()))
    }

    fn native_texture_format(&self, _format: ImageFormat) -> ImageFormat {
        ImageFormat::Rgba
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<NativeTextureId> {
        self.check_device()?;
        let max = self.caps.max_texture_size;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(KestrelError::Backend(format!(
                "unsupported texture size {}x{} (max {max})",
                desc.width, desc.height
            )));
        }
        let id = NativeTextureId(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(
            id.0,
            SoftTexture::new(desc.width, desc.height, desc.texture_type),
        );
        log::trace!("created {}x{} texture {id:?}", desc.width, desc.height);
        Ok(id)
    }

    fn destroy_texture(&mut self, id: NativeTextureId) {
        self.textures.remove(&id.0);
        if self.target == Some(id) {
            self.target = None;
        }
        if self.bound == Some(id) {
            self.bound = None;
        }
    }

    fn upload_texture(
        &mut self,
        id: NativeTextureId,
        rect: PixelRect,
        data: &[u8],
        format: ImageFormat,
    ) -> Result<()> {
        self.check_device()?;
        let texture = self
            .textures
            .get_mut(&id.0)
            .ok_or_else(|| KestrelError::Backend(format!("unknown texture {id:?}")))?;
        if rect.clip_to(texture.width, texture.height) != Some(rect) {
            return Err(KestrelError::Backend(format!(
                "upload rect {rect:?} out of bounds"
            )));
        }
        let pixels = image::convert_pixels(data, format, ImageFormat::Rgba);
        if pixels.len() != rect.area() * 4 {
            return Err(KestrelError::Backend(format!(
                "upload of {rect:?} needs {} bytes, got {}",
                rect.area() * format.bpp(),
                data.len()
            )));
        }
        image::write_region(&mut texture.data, texture.width, 4, rect, &pixels);
        Ok(())
    }

    fn read_texture(&mut self, id: NativeTextureId, rect: PixelRect) -> Result<Vec<u8>> {
        self.check_device()?;
        let texture = self.texture(id)?;
        if rect.clip_to(texture.width, texture.height) != Some(rect) {
            return Err(KestrelError::Backend(format!(
                "read rect {rect:?} out of bounds"
            )));
        }
        Ok(image::extract_region(&texture.data, texture.width, 4, rect))
    }
}
