//! A headless backend that records every call it receives.
//!
//! Textures are kept in memory so uploads and read-backs behave like a real
//! device. The [`Recording`] is shared through an `Rc<RefCell<_>>` so it can
//! be inspected after the backend has been boxed into a render system.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use kestrel_types::color::Color;
use kestrel_types::error::{KestrelError, Result};
use kestrel_types::geometry::{Mat4, PixelRect};
use kestrel_types::image::{self, Image, ImageFormat};
use kestrel_types::state::{AddressMode, BlendMode, ColorMode, RenderOp, TextureFilter};
use kestrel_types::vertex::VertexStream;

use super::{
    Caps, GraphicsBackend, NativeShaderId, NativeTextureId, RenderOptions, TextureDesc, WindowInfo,
};

/// Invocation count per backend hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub create_device: usize,
    pub destroy_device: usize,
    pub reset_device: usize,
    pub set_resolution: usize,
    pub set_viewport: usize,
    pub clear: usize,
    pub clear_rect: usize,
    pub set_blend_mode: usize,
    pub set_color_mode: usize,
    pub set_texture_filter: usize,
    pub set_texture_address_mode: usize,
    pub set_depth_buffer: usize,
    pub set_system_color: usize,
    pub set_vertex_layout: usize,
    pub bind_texture: usize,
    pub set_modelview_matrix: usize,
    pub set_projection_matrix: usize,
    pub set_render_target: usize,
    pub draw: usize,
    pub present: usize,
    pub create_texture: usize,
    pub destroy_texture: usize,
    pub upload_texture: usize,
    pub read_texture: usize,
    pub create_shader: usize,
    pub destroy_shader: usize,
    pub set_vertex_shader: usize,
    pub set_pixel_shader: usize,
}

impl CallCounts {
    /// Total number of render-state pushes (blend, color, texture, ...).
    pub fn state_changes(&self) -> usize {
        self.set_blend_mode
            + self.set_color_mode
            + self.set_texture_filter
            + self.set_texture_address_mode
            + self.set_depth_buffer
            + self.set_system_color
            + self.set_vertex_layout
            + self.bind_texture
            + self.set_vertex_shader
            + self.set_pixel_shader
    }
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub op: RenderOp,
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub texture: Option<NativeTextureId>,
}

/// Everything a [`RecordingBackend`] has seen.
#[derive(Debug, Default)]
pub struct Recording {
    pub counts: CallCounts,
    pub draws: Vec<RecordedDraw>,
    pub blend_mode: Option<BlendMode>,
    pub color_mode: Option<(ColorMode, f32)>,
    pub texture_filter: Option<TextureFilter>,
    pub texture_address_mode: Option<AddressMode>,
    pub system_color: Option<Color>,
    pub bound_texture: Option<NativeTextureId>,
    pub modelview: Option<Mat4>,
    pub projection: Option<Mat4>,
    pub viewport: Option<PixelRect>,
    pub render_target: Option<NativeTextureId>,
    pub vertex_shader: Option<NativeShaderId>,
    pub pixel_shader: Option<NativeShaderId>,
    /// Make the next `create_device` fail.
    pub fail_create_device: bool,
    /// Make every `create_texture` fail while set.
    pub fail_create_texture: bool,
    lost: bool,
    textures: HashMap<NativeTextureId, (TextureDesc, Vec<u8>)>,
    shaders: HashMap<NativeShaderId, String>,
}

impl Recording {
    /// Drop every native texture and report the device as lost.
    pub fn lose_device(&mut self) {
        self.lost = true;
        self.textures.clear();
        self.shaders.clear();
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn texture_desc(&self, id: NativeTextureId) -> Option<TextureDesc> {
        self.textures.get(&id).map(|(desc, _)| *desc)
    }

    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    pub fn shader_source(&self, id: NativeShaderId) -> Option<&str> {
        self.shaders.get(&id).map(String::as_str)
    }

    pub fn texture_data(&self, id: NativeTextureId) -> Option<&[u8]> {
        self.textures.get(&id).map(|(_, data)| data.as_slice())
    }

    /// Forget counts and draws, keeping device and texture state.
    pub fn reset_counts(&mut self) {
        self.counts = CallCounts::default();
        self.draws.clear();
    }
}

pub struct RecordingBackend {
    recording: Rc<RefCell<Recording>>,
    caps: Caps,
    pixel_offset: f32,
    next_texture: u64,
    next_shader: u64,
    size: (u32, u32),
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::with_caps(Caps::default())
    }

    pub fn with_caps(caps: Caps) -> Self {
        Self {
            recording: Rc::new(RefCell::new(Recording::default())),
            caps,
            pixel_offset: 0.0,
            next_texture: 1,
            next_shader: 1,
            size: (0, 0),
        }
    }

    pub fn with_pixel_offset(mut self, offset: f32) -> Self {
        self.pixel_offset = offset;
        self
    }

    /// Shared view of the recording.
    pub fn recording(&self) -> Rc<RefCell<Recording>> {
        Rc::clone(&self.recording)
    }

    fn rec(&self) -> std::cell::RefMut<'_, Recording> {
        self.recording.borrow_mut()
    }

    /// Empty source stands in for a compile error.
    fn create_shader(&mut self, source: &str) -> Result<NativeShaderId> {
        let recording = Rc::clone(&self.recording);
        let mut rec = recording.borrow_mut();
        rec.counts.create_shader += 1;
        if rec.lost {
            return Err(KestrelError::Device("device lost".into()));
        }
        if source.trim().is_empty() {
            return Err(KestrelError::Backend("empty shader source".into()));
        }
        let id = NativeShaderId(self.next_shader);
        self.next_shader += 1;
        rec.shaders.insert(id, source.to_string());
        Ok(id)
    }
}

impl GraphicsBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn caps(&self) -> Caps {
        self.caps
    }

    fn pixel_offset(&self) -> f32 {
        self.pixel_offset
    }

    fn create_device(&mut self, window: &WindowInfo, _options: &RenderOptions) -> Result<()> {
        let recording = Rc::clone(&self.recording);
        let mut rec = recording.borrow_mut();
        rec.counts.create_device += 1;
        if std::mem::take(&mut rec.fail_create_device) {
            return Err(KestrelError::Device("device creation refused".into()));
        }
        self.size = (window.width, window.height);
        Ok(())
    }

    fn destroy_device(&mut self) -> Result<()> {
        let mut rec = self.rec();
        rec.counts.destroy_device += 1;
        rec.textures.clear();
        rec.shaders.clear();
        Ok(())
    }

    fn reset_device(&mut self) -> Result<()> {
        let mut rec = self.rec();
        rec.counts.reset_device += 1;
        rec.lost = false;
        rec.textures.clear();
        rec.shaders.clear();
        Ok(())
    }

    fn device_lost(&self) -> bool {
        self.recording.borrow().lost
    }

    fn set_resolution(&mut self, width: u32, height: u32, _fullscreen: bool) -> Result<()> {
        self.rec().counts.set_resolution += 1;
        self.size = (width, height);
        Ok(())
    }

    fn set_viewport(&mut self, rect: PixelRect) {
        let mut rec = self.rec();
        rec.counts.set_viewport += 1;
        rec.viewport = Some(rect);
    }

    fn clear(&mut self, _color: Option<Color>, _depth: bool) {
        self.rec().counts.clear += 1;
    }

    fn clear_rect(&mut self, _rect: PixelRect, _color: Color, _depth: bool) {
        self.rec().counts.clear_rect += 1;
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        let mut rec = self.rec();
        rec.counts.set_blend_mode += 1;
        rec.blend_mode = Some(mode);
    }

    fn set_color_mode(&mut self, mode: ColorMode, factor: f32) {
        let mut rec = self.rec();
        rec.counts.set_color_mode += 1;
        rec.color_mode = Some((mode, factor));
    }

    fn set_texture_filter(&mut self, filter: TextureFilter) {
        let mut rec = self.rec();
        rec.counts.set_texture_filter += 1;
        rec.texture_filter = Some(filter);
    }

    fn set_texture_address_mode(&mut self, mode: AddressMode) {
        let mut rec = self.rec();
        rec.counts.set_texture_address_mode += 1;
        rec.texture_address_mode = Some(mode);
    }

    fn set_depth_buffer(&mut self, _enabled: bool, _write: bool) {
        self.rec().counts.set_depth_buffer += 1;
    }

    fn set_system_color(&mut self, color: Color) {
        let mut rec = self.rec();
        rec.counts.set_system_color += 1;
        rec.system_color = Some(color);
    }

    fn set_vertex_layout(&mut self, _textured: bool, _colored: bool) {
        self.rec().counts.set_vertex_layout += 1;
    }

    fn bind_texture(&mut self, id: Option<NativeTextureId>) {
        let mut rec = self.rec();
        rec.counts.bind_texture += 1;
        rec.bound_texture = id;
    }

    fn set_modelview_matrix(&mut self, matrix: &Mat4) {
        let mut rec = self.rec();
        rec.counts.set_modelview_matrix += 1;
        rec.modelview = Some(*matrix);
    }

    fn set_projection_matrix(&mut self, matrix: &Mat4) {
        let mut rec = self.rec();
        rec.counts.set_projection_matrix += 1;
        rec.projection = Some(*matrix);
    }

    fn set_render_target(&mut self, target: Option<NativeTextureId>) -> Result<()> {
        let mut rec = self.rec();
        rec.counts.set_render_target += 1;
        if let Some(id) = target
            && !rec.textures.contains_key(&id)
        {
            return Err(KestrelError::Backend(format!("unknown render target {id:?}")));
        }
        rec.render_target = target;
        Ok(())
    }

    fn draw(&mut self, op: RenderOp, vertices: VertexStream<'_>) -> Result<()> {
        let mut rec = self.rec();
        if rec.lost {
            return Err(KestrelError::Device("device lost".into()));
        }
        rec.counts.draw += 1;
        let n = vertices.len();
        let draw = RecordedDraw {
            op,
            positions: (0..n).map(|i| vertices.position(i)).collect(),
            uvs: if vertices.has_uv() {
                (0..n).map(|i| vertices.uv(i)).collect()
            } else {
                Vec::new()
            },
            texture: rec.bound_texture,
        };
        rec.draws.push(draw);
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.rec().counts.present += 1;
        Ok(())
    }

    fn take_screenshot(&mut self, format: ImageFormat) -> Result<Image> {
        let (w, h) = self.size;
        Ok(Image::filled(w, h, format, Color::BLACK))
    }

    fn native_texture_format(&self, format: ImageFormat) -> ImageFormat {
        format
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<NativeTextureId> {
        let recording = Rc::clone(&self.recording);
        let mut rec = recording.borrow_mut();
        rec.counts.create_texture += 1;
        if rec.fail_create_texture || rec.lost {
            return Err(KestrelError::Backend("texture allocation refused".into()));
        }
        let id = NativeTextureId(self.next_texture);
        self.next_texture += 1;
        let size = desc.width as usize * desc.height as usize * desc.format.bpp();
        rec.textures.insert(id, (*desc, vec![0; size]));
        Ok(id)
    }

    fn destroy_texture(&mut self, id: NativeTextureId) {
        let mut rec = self.rec();
        rec.counts.destroy_texture += 1;
        rec.textures.remove(&id);
    }

    fn upload_texture(
        &mut self,
        id: NativeTextureId,
        rect: PixelRect,
        data: &[u8],
        format: ImageFormat,
    ) -> Result<()> {
        let mut rec = self.rec();
        rec.counts.upload_texture += 1;
        let (desc, storage) = rec
            .textures
            .get_mut(&id)
            .ok_or_else(|| KestrelError::Backend(format!("unknown texture {id:?}")))?;
        if rect.clip_to(desc.width, desc.height) != Some(rect) {
            return Err(KestrelError::Backend(format!("upload rect {rect:?} out of bounds")));
        }
        let pixels = image::convert_pixels(data, format, desc.format);
        if pixels.len() != rect.area() * desc.format.bpp() {
            return Err(KestrelError::Backend("upload size mismatch".into()));
        }
        image::write_region(storage, desc.width, desc.format.bpp(), rect, &pixels);
        Ok(())
    }

    fn read_texture(&mut self, id: NativeTextureId, rect: PixelRect) -> Result<Vec<u8>> {
        let mut rec = self.rec();
        rec.counts.read_texture += 1;
        let (desc, storage) = rec
            .textures
            .get(&id)
            .ok_or_else(|| KestrelError::Backend(format!("unknown texture {id:?}")))?;
        if rect.clip_to(desc.width, desc.height) != Some(rect) {
            return Err(KestrelError::Backend(format!("read rect {rect:?} out of bounds")));
        }
        Ok(image::extract_region(storage, desc.width, desc.format.bpp(), rect))
    }

    fn create_vertex_shader(&mut self, source: &str) -> Result<NativeShaderId> {
        self.create_shader(source)
    }

    fn create_pixel_shader(&mut self, source: &str) -> Result<NativeShaderId> {
        self.create_shader(source)
    }

    fn destroy_shader(&mut self, id: NativeShaderId) {
        let mut rec = self.rec();
        rec.counts.destroy_shader += 1;
        rec.shaders.remove(&id);
    }

    fn set_vertex_shader(&mut self, id: Option<NativeShaderId>) {
        let mut rec = self.rec();
        rec.counts.set_vertex_shader += 1;
        rec.vertex_shader = id;
    }

    fn set_pixel_shader(&mut self, id: Option<NativeShaderId>) {
        let mut rec = self.rec();
        rec.counts.set_pixel_shader += 1;
        rec.pixel_shader = id;
    }
}
