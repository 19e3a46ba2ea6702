//! The render system: device lifecycle, texture registry and state.
//!
//! One [`RenderSystem`] owns one backend. Draws are in [`draw`], matrix
//! helpers in [`transform`], texture factories in [`textures`] and shader
//! registration in [`shaders`]; this
//! module holds the struct, device state machine and render-state setters.

mod draw;
mod shaders;
mod textures;
mod transform;

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kestrel_types::config::RenderConfig;
use kestrel_types::error::{KestrelError, Result};
use kestrel_types::geometry::{Mat4, PixelRect, Rect};
use kestrel_types::image::{Image, ImageFormat};
use kestrel_types::state::{AddressMode, BlendMode, ColorMode, LoadMode, TextureFilter, TextureType};

pub use draw::{limit_vertices, primitive_count};

use crate::backend::{Caps, DisplayMode, GraphicsBackend, RenderOptions, SystemInfo, WindowInfo};
use crate::decoder::{ImageDecoder, PngDecoder};
use crate::device::DeviceState;
use crate::idle::IdleTracker;
use crate::render_state::{self, RenderState};
use crate::shader::{PixelShaderId, Shader, VertexShaderId};
use crate::texture::{AsyncLoader, Texture, TextureId, TextureMut};

/// Counters for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub draw_calls: usize,
    pub primitives: usize,
    pub state_changes: usize,
}

pub struct RenderSystem {
    backend: Box<dyn GraphicsBackend>,
    config: RenderConfig,
    caps: Caps,
    device: DeviceState,
    window: WindowInfo,
    textures: HashMap<TextureId, Texture>,
    next_texture_id: u64,
    idle: IdleTracker,
    loader: AsyncLoader,
    decoder: Arc<dyn ImageDecoder>,
    shaders: HashMap<u64, Shader>,
    next_shader_id: u64,
    active_vertex_shader: Option<VertexShaderId>,
    active_pixel_shader: Option<PixelShaderId>,
    /// What callers asked for.
    state: RenderState,
    /// What the device currently has.
    device_state: RenderState,
    force_state_update: bool,
    active_texture: Option<TextureId>,
    render_target: Option<TextureId>,
    modelview: Mat4,
    projection: Mat4,
    ortho: Rect,
    viewport: PixelRect,
    stats: RenderStats,
    last_frame: RenderStats,
}

impl RenderSystem {
    pub fn new(backend: Box<dyn GraphicsBackend>, config: RenderConfig) -> Self {
        let caps = backend.caps();
        let window = WindowInfo {
            fullscreen: config.window.fullscreen,
            ..WindowInfo::new(config.window.width, config.window.height)
        };
        let loader = AsyncLoader::new(config.async_workers);
        Self {
            backend,
            caps,
            device: DeviceState::Uninitialized,
            textures: HashMap::new(),
            next_texture_id: 1,
            idle: IdleTracker::new(),
            loader,
            decoder: Arc::new(PngDecoder),
            shaders: HashMap::new(),
            next_shader_id: 1,
            active_vertex_shader: None,
            active_pixel_shader: None,
            state: RenderState::default(),
            device_state: RenderState::default(),
            force_state_update: true,
            active_texture: None,
            render_target: None,
            modelview: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            ortho: Rect::new(0.0, 0.0, window.width as f32, window.height as f32),
            viewport: PixelRect::full(window.width, window.height),
            window,
            config,
            stats: RenderStats::default(),
            last_frame: RenderStats::default(),
        }
    }

    /// Replace the image decoder used for file-backed textures.
    pub fn with_decoder(mut self, decoder: Arc<dyn ImageDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    pub fn caps(&self) -> Caps {
        self.caps
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn device_state(&self) -> DeviceState {
        self.device
    }

    pub fn is_created(&self) -> bool {
        self.device.is_ready()
    }

    pub fn window(&self) -> &WindowInfo {
        &self.window
    }

    /// Counters of the frame in progress.
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Counters of the last presented frame.
    pub fn last_frame_stats(&self) -> RenderStats {
        self.last_frame
    }

    /// The state the next draw will reconcile toward.
    pub fn render_state(&self) -> &RenderState {
        &self.state
    }

    /// The cached state of the device.
    pub fn device_render_state(&self) -> &RenderState {
        &self.device_state
    }

    fn require_device(&self) -> Result<()> {
        if self.device.is_ready() {
            Ok(())
        } else {
            Err(KestrelError::Device(format!(
                "{} device is not available ({:?})",
                self.backend.name(),
                self.device
            )))
        }
    }

    // -- Device lifecycle ---------------------------------------------------

    /// Create the native device for `window` and push default state.
    pub fn create(&mut self, window: &WindowInfo) -> Result<()> {
        if !self.device.can_create() {
            return Err(KestrelError::Device(format!(
                "{} device already exists",
                self.backend.name()
            )));
        }
        let options = RenderOptions {
            depth_buffer: self.config.depth_buffer,
        };
        self.backend
            .create_device(window, &options)
            .map_err(|e| match e {
                KestrelError::Device(_) => e,
                other => KestrelError::Device(other.to_string()),
            })?;
        self.caps = self.backend.caps();
        self.window = window.clone();
        self.device = DeviceState::Created;
        self.compile_shaders();
        log::info!(
            "created {} device ({}x{}{})",
            self.backend.name(),
            window.width,
            window.height,
            if window.fullscreen { ", fullscreen" } else { "" }
        );
        self.apply_device_defaults();
        Ok(())
    }

    fn apply_device_defaults(&mut self) {
        self.state = RenderState::device_defaults(self.config.depth_buffer);
        self.device_state.reset();
        self.active_texture = None;
        self.stats.state_changes += render_state::reconcile(
            &self.state,
            &mut self.device_state,
            self.backend.as_mut(),
            true,
        );
        self.force_state_update = false;
        let (w, h) = (self.window.width, self.window.height);
        self.set_viewport(PixelRect::full(w, h));
        self.modelview = Mat4::IDENTITY;
        self.state.modelview_matrix_changed = true;
        self.set_ortho_projection_size(w as f32, h as f32);
    }

    /// Adopt a (possibly new) window. Resizes the device if it exists.
    pub fn assign_window(&mut self, window: &WindowInfo) -> Result<()> {
        if self.device.is_ready() {
            self.set_resolution(window.width, window.height, window.fullscreen)?;
        }
        self.window = window.clone();
        Ok(())
    }

    /// Resize the back buffer; viewport and ortho projection follow.
    pub fn set_resolution(&mut self, width: u32, height: u32, fullscreen: bool) -> Result<()> {
        self.require_device()?;
        if width == 0 || height == 0 {
            return Err(KestrelError::Device(format!(
                "invalid resolution {width}x{height}"
            )));
        }
        self.backend.set_resolution(width, height, fullscreen)?;
        self.window.width = width;
        self.window.height = height;
        self.window.fullscreen = fullscreen;
        self.set_viewport(PixelRect::full(width, height));
        self.set_ortho_projection_size(width as f32, height as f32);
        log::info!("resolution set to {width}x{height}");
        Ok(())
    }

    /// Unload every texture and destroy the device. Textures and shaders
    /// stay registered and come back after a later [`create`](Self::create).
    pub fn destroy(&mut self) -> Result<()> {
        if !matches!(self.device, DeviceState::Created | DeviceState::Lost) {
            return Ok(());
        }
        if self.device.is_ready() {
            self.unload_textures();
            self.release_shaders();
        } else {
            for texture in self.textures.values_mut() {
                texture.native = None;
            }
            self.forget_shaders();
        }
        self.render_target = None;
        self.active_texture = None;
        self.state.reset();
        self.device_state.reset();
        self.backend.destroy_device()?;
        self.device = DeviceState::Destroyed;
        log::info!("destroyed {} device", self.backend.name());
        Ok(())
    }

    /// Forget every native handle after the device went away.
    ///
    /// Volatile textures lose their contents for good; other textures that
    /// were loaded are marked for restoration.
    pub fn on_device_lost(&mut self) {
        if self.device != DeviceState::Created {
            return;
        }
        log::warn!("{} device lost", self.backend.name());
        self.device = DeviceState::Lost;
        for texture in self.textures.values_mut() {
            let was_loaded = texture.native.take().is_some();
            if texture.texture_type == TextureType::Volatile {
                texture.data = None;
                texture.restore_pending = false;
            } else {
                texture.restore_pending = was_loaded;
            }
        }
        self.forget_shaders();
        self.render_target = None;
        self.state.texture_id = None;
        self.state.vertex_shader = None;
        self.state.pixel_shader = None;
        self.device_state.reset();
    }

    /// Reset the lost device and restore what was lost: cached state,
    /// matrices, shaders and every texture marked for restoration.
    pub fn on_device_restored(&mut self) -> Result<()> {
        if self.device != DeviceState::Lost {
            return Ok(());
        }
        self.backend.reset_device().map_err(|e| match e {
            KestrelError::Device(_) => e,
            other => KestrelError::Device(other.to_string()),
        })?;
        self.device = DeviceState::Created;
        self.caps = self.backend.caps();
        self.device_state.reset();
        self.force_state_update = true;
        self.state.modelview_matrix_changed = true;
        self.state.projection_matrix_changed = true;
        self.backend.set_viewport(self.viewport);
        self.compile_shaders();

        let mut pending: Vec<TextureId> = self
            .textures
            .values()
            .filter(|t| t.restore_pending)
            .map(|t| t.id)
            .collect();
        pending.sort();
        let mut restored = 0;
        for id in pending {
            let Some(mut texture) = self.texture_mut(id) else {
                continue;
            };
            if texture.load() {
                restored += 1;
            } else {
                log::warn!("could not restore texture {id} after device reset");
                texture.texture.restore_pending = false;
            }
        }
        log::info!("device restored, {restored} textures reloaded");
        Ok(())
    }

    /// Lose and restore in one step, for a device that needs a full reset.
    pub fn reset(&mut self) -> Result<()> {
        match self.device {
            DeviceState::Created => {
                self.on_device_lost();
                self.on_device_restored()
            }
            DeviceState::Lost => self.on_device_restored(),
            _ => Err(KestrelError::Device("no device to reset".into())),
        }
    }

    /// Per-frame housekeeping: upload finished async loads and unload idle
    /// dynamic textures. `dt` is in seconds.
    pub fn update(&mut self, dt: f32) {
        if !self.device.is_ready() {
            return;
        }
        let mut ready: Vec<TextureId> = self
            .textures
            .values()
            .filter(|t| t.load_mode == LoadMode::Async && t.is_async_load_ready())
            .map(|t| t.id)
            .collect();
        ready.sort();
        for id in ready {
            if let Some(mut texture) = self.texture_mut(id) {
                texture.load();
            }
        }

        let threshold = self.config.idle_texture_unload_time;
        if threshold <= 0.0 || dt <= 0.0 {
            return;
        }
        let mut candidates: Vec<TextureId> = self
            .textures
            .values()
            .filter(|t| t.is_loaded() && t.is_dynamic() && !t.is_locked())
            .map(|t| t.id)
            .collect();
        candidates.sort();
        let expired: Vec<TextureId> = candidates
            .into_iter()
            .filter(|&id| self.idle.advance(id, dt) > threshold)
            .collect();
        for id in expired {
            for member in self.idle.component(id) {
                if let Some(mut texture) = self.texture_mut(member)
                    && texture.is_loaded()
                {
                    log::debug!("unloading idle texture {member}");
                    texture.unload();
                }
            }
        }
    }

    /// Present the back buffer and roll the frame counters. Detects device
    /// loss, and retries restoration while the device is lost.
    pub fn present_frame(&mut self) -> Result<()> {
        match self.device {
            DeviceState::Created => {}
            DeviceState::Lost => {
                if let Err(e) = self.on_device_restored() {
                    log::warn!("device still lost: {e}");
                }
                return Ok(());
            }
            _ => return self.require_device(),
        }
        let result = self.backend.present();
        self.last_frame = std::mem::take(&mut self.stats);
        if self.backend.device_lost() {
            self.on_device_lost();
        }
        result
    }

    pub fn take_screenshot(&mut self, format: ImageFormat) -> Result<Image> {
        self.require_device()?;
        self.backend.take_screenshot(format)
    }

    pub fn system_info(&self) -> SystemInfo {
        let mut info = self.backend.system_info();
        if info.display_width == 0 {
            info.display_width = self.window.width;
            info.display_height = self.window.height;
        }
        info
    }

    pub fn supported_display_modes(&self) -> Vec<DisplayMode> {
        self.backend.supported_display_modes()
    }

    pub fn set_viewport(&mut self, rect: PixelRect) {
        self.viewport = rect;
        if self.device.is_ready() {
            self.backend.set_viewport(rect);
        }
    }

    pub fn viewport(&self) -> PixelRect {
        self.viewport
    }

    /// Redirect draws into a render-target texture, or back to the screen
    /// with `None`. The texture left behind gets its CPU copy refreshed.
    pub fn set_render_target(&mut self, target: Option<TextureId>) -> Result<()> {
        self.require_device()?;
        let native = match target {
            None => None,
            Some(id) => {
                if !self.caps.render_targets {
                    return Err(KestrelError::Backend(format!(
                        "{} does not support render targets",
                        self.backend.name()
                    )));
                }
                let texture = self
                    .textures
                    .get(&id)
                    .ok_or_else(|| KestrelError::Texture(format!("unknown texture {id}")))?;
                if texture.texture_type != TextureType::RenderTarget {
                    return Err(KestrelError::Texture(format!(
                        "texture {id} is not a render target"
                    )));
                }
                let mut texture = self
                    .texture_mut(id)
                    .ok_or_else(|| KestrelError::Texture(format!("unknown texture {id}")))?;
                if !texture.load() {
                    return Err(KestrelError::Texture(format!(
                        "render target {id} could not be loaded"
                    )));
                }
                texture.native_id()
            }
        };
        self.backend.set_render_target(native)?;
        let previous = std::mem::replace(&mut self.render_target, target);
        if let Some(previous) = previous
            && target != Some(previous)
        {
            self.refresh_cpu_copy(previous);
        }
        Ok(())
    }

    pub fn render_target(&self) -> Option<TextureId> {
        self.render_target
    }

    /// Read a render target's device pixels back into its CPU copy.
    fn refresh_cpu_copy(&mut self, id: TextureId) {
        let Some(texture) = self.textures.get_mut(&id) else {
            return;
        };
        let Some(native) = texture.native else {
            return;
        };
        if texture.locked || !texture.texture_type.keeps_cpu_copy(texture.filename.is_some()) {
            return;
        }
        let full = PixelRect::full(texture.width, texture.height);
        match self.backend.read_texture(native, full) {
            Ok(pixels) => texture.data = Some(pixels),
            Err(e) => log::error!("failed to read back render target {id}: {e}"),
        }
    }

    // -- Texture registry queries -------------------------------------------

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(&id)
    }

    /// Mutable handle for loading or editing a texture.
    pub fn texture_mut(&mut self, id: TextureId) -> Option<TextureMut<'_>> {
        let texture = self.textures.get_mut(&id)?;
        Some(TextureMut {
            texture,
            backend: self.backend.as_mut(),
            idle: &mut self.idle,
            loader: &self.loader,
            decoder: &self.decoder,
            caps: self.caps,
            device_ready: self.device.is_ready(),
        })
    }

    pub fn textures(&self) -> impl Iterator<Item = &Texture> {
        self.textures.values()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Unload every texture; they reload on demand.
    pub fn unload_textures(&mut self) {
        let ids: Vec<TextureId> = self.textures.keys().copied().collect();
        for id in ids {
            if let Some(mut texture) = self.texture_mut(id) {
                texture.unload();
            }
        }
    }

    pub fn vram_consumption(&self) -> usize {
        self.textures.values().map(Texture::current_vram_size).sum()
    }

    pub fn ram_consumption(&self) -> usize {
        self.textures.values().map(Texture::current_ram_size).sum()
    }

    pub fn async_ram_consumption(&self) -> usize {
        self.textures.values().map(Texture::current_async_ram_size).sum()
    }

    /// `name` itself, or `name` with the first configured extension that
    /// names an existing file.
    pub fn find_texture_file(&self, name: impl AsRef<Path>) -> Option<PathBuf> {
        existing_file(name.as_ref(), &self.config.texture_extensions)
    }

    /// Like [`find_texture_file`](Self::find_texture_file), relative to the
    /// configured resource directory.
    pub fn find_texture_resource(&self, name: impl AsRef<Path>) -> Option<PathBuf> {
        existing_file(
            &self.config.resource_dir.join(name.as_ref()),
            &self.config.texture_extensions,
        )
    }

    // -- Render state -------------------------------------------------------

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        if !mode.is_defined() {
            log::warn!("ignoring undefined blend mode");
            return;
        }
        self.state.blend_mode = mode;
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.state.blend_mode
    }

    /// Set the color mode; `factor` only matters for `Lerp` and is clamped
    /// to `[0, 1]`.
    pub fn set_color_mode(&mut self, mode: ColorMode, factor: f32) {
        if !mode.is_defined() {
            log::warn!("ignoring undefined color mode");
            return;
        }
        self.state.color_mode = mode;
        self.state.color_mode_factor = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            1.0
        };
    }

    pub fn color_mode(&self) -> ColorMode {
        self.state.color_mode
    }

    pub fn color_mode_factor(&self) -> f32 {
        self.state.color_mode_factor
    }

    /// Filter for the bound texture; also stored on the texture.
    pub fn set_texture_filter(&mut self, filter: TextureFilter) {
        if !filter.is_defined() {
            log::warn!("ignoring undefined texture filter");
            return;
        }
        self.state.texture_filter = filter;
        if let Some(id) = self.active_texture
            && let Some(texture) = self.textures.get_mut(&id)
        {
            texture.filter = filter;
        }
    }

    pub fn texture_filter(&self) -> TextureFilter {
        self.state.texture_filter
    }

    /// Address mode for the bound texture; also stored on the texture.
    pub fn set_texture_address_mode(&mut self, mode: AddressMode) {
        if !mode.is_defined() {
            log::warn!("ignoring undefined texture address mode");
            return;
        }
        self.state.texture_address_mode = mode;
        if let Some(id) = self.active_texture
            && let Some(texture) = self.textures.get_mut(&id)
        {
            texture.address_mode = mode;
        }
    }

    pub fn texture_address_mode(&self) -> AddressMode {
        self.state.texture_address_mode
    }

    pub fn set_depth_buffer(&mut self, enabled: bool, write: bool) {
        if enabled && !self.config.depth_buffer {
            log::warn!("depth testing enabled without a depth buffer");
        }
        self.state.depth_buffer = enabled;
        self.state.depth_buffer_write = write;
    }

    /// Bind a texture for textured draws, adopting its filter and address
    /// mode. Unknown ids unbind.
    pub fn set_texture(&mut self, id: Option<TextureId>) {
        let Some(id) = id else {
            self.active_texture = None;
            return;
        };
        let Some(texture) = self.textures.get(&id) else {
            log::warn!("cannot bind unknown texture {id}");
            self.active_texture = None;
            return;
        };
        self.state.texture_filter = texture.filter;
        self.state.texture_address_mode = self.effective_address_mode(texture);
        self.active_texture = Some(id);
    }

    pub fn texture_id(&self) -> Option<TextureId> {
        self.active_texture
    }

    /// A texture's address mode, forced to clamp where the device only
    /// supports non-power-of-two sizes that way.
    fn effective_address_mode(&self, texture: &Texture) -> AddressMode {
        let limited = !self.caps.npot_textures && self.caps.npot_textures_limited;
        let pot = texture.width.is_power_of_two() && texture.height.is_power_of_two();
        if limited && !pot {
            AddressMode::Clamp
        } else {
            texture.address_mode
        }
    }

    fn allocate_texture_id(&mut self) -> TextureId {
        let id = TextureId(self.next_texture_id);
        self.next_texture_id += 1;
        id
    }
}

fn existing_file(base: &Path, extensions: &[String]) -> Option<PathBuf> {
    if base.is_file() {
        return Some(base.to_path_buf());
    }
    extensions.iter().find_map(|ext| {
        let mut name = OsString::from(base.as_os_str());
        name.push(ext);
        let candidate = PathBuf::from(name);
        candidate.is_file().then_some(candidate)
    })
}

impl Drop for RenderSystem {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            log::error!("failed to destroy {} device: {e}", self.backend.name());
        }
    }
}
