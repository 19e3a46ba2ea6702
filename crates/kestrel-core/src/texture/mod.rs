//! Textures: CPU pixel data, native handles and the load state machine.
//!
//! A [`Texture`] is owned by the render system's registry and addressed by
//! [`TextureId`]. Read-only queries work on `&Texture`; anything that loads,
//! unloads or edits pixels goes through [`TextureMut`], which borrows the
//! backend alongside the texture.

mod async_load;
mod handle;
mod lock;
pub mod pixels;
pub(crate) mod pot;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kestrel_types::geometry::Vec2;
use kestrel_types::image::ImageFormat;
use kestrel_types::state::{AddressMode, LoadMode, TextureFilter, TextureType};

pub(crate) use async_load::{AsyncRequest, AsyncSlot};
pub use async_load::AsyncLoader;
pub use handle::TextureMut;
pub use lock::Lock;

use crate::backend::NativeTextureId;
use pot::Prepared;

/// Registry key of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureState {
    Unloaded,
    /// An async decode is queued or staged but not yet uploaded.
    Loading,
    Loaded,
}

/// Creation options for file-backed textures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureOptions {
    pub texture_type: TextureType,
    pub load_mode: LoadMode,
    /// Storage format to convert to instead of the decoded one.
    pub format: Option<ImageFormat>,
}

impl TextureOptions {
    pub fn with_load_mode(mut self, load_mode: LoadMode) -> Self {
        self.load_mode = load_mode;
        self
    }

    pub fn with_type(mut self, texture_type: TextureType) -> Self {
        self.texture_type = texture_type;
        self
    }

    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }
}

#[derive(Debug)]
pub struct Texture {
    pub(crate) id: TextureId,
    pub(crate) native: Option<NativeTextureId>,
    /// CPU copy at storage size, in `format`.
    pub(crate) data: Option<Vec<u8>>,
    pub(crate) async_slot: Option<Arc<AsyncSlot>>,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) effective_width: u32,
    pub(crate) effective_height: u32,
    pub(crate) format: ImageFormat,
    pub(crate) forced_format: Option<ImageFormat>,
    pub(crate) texture_type: TextureType,
    pub(crate) load_mode: LoadMode,
    pub(crate) filter: TextureFilter,
    pub(crate) address_mode: AddressMode,
    pub(crate) locked: bool,
    pub(crate) dirty: bool,
    pub(crate) first_upload: bool,
    pub(crate) held_lock: Option<Lock>,
    pub(crate) filename: Option<PathBuf>,
    pub(crate) from_resource: bool,
    /// Was loaded when the device went away.
    pub(crate) restore_pending: bool,
}

impl Texture {
    fn blank(id: TextureId, texture_type: TextureType, load_mode: LoadMode) -> Self {
        Self {
            id,
            native: None,
            data: None,
            async_slot: None,
            width: 0,
            height: 0,
            effective_width: 0,
            effective_height: 0,
            format: ImageFormat::default(),
            forced_format: None,
            texture_type,
            load_mode,
            filter: TextureFilter::Linear,
            address_mode: AddressMode::Wrap,
            locked: false,
            dirty: false,
            first_upload: true,
            held_lock: None,
            filename: None,
            from_resource: false,
            restore_pending: false,
        }
    }

    pub(crate) fn from_file(
        id: TextureId,
        path: PathBuf,
        from_resource: bool,
        options: TextureOptions,
    ) -> Self {
        let mut texture = Self::blank(id, options.texture_type, options.load_mode);
        texture.filename = Some(path);
        texture.from_resource = from_resource;
        texture.forced_format = options.format;
        texture
    }

    pub(crate) fn from_pixels(id: TextureId, prepared: Prepared, texture_type: TextureType) -> Self {
        let mut texture = Self::blank(id, texture_type, LoadMode::Immediate);
        texture.width = prepared.width;
        texture.height = prepared.height;
        texture.effective_width = prepared.effective_width;
        texture.effective_height = prepared.effective_height;
        texture.format = prepared.format;
        texture.data = Some(prepared.data);
        texture
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    /// Storage width, padded when the device lacks NPOT support.
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn effective_width(&self) -> u32 {
        self.effective_width
    }

    pub fn effective_height(&self) -> u32 {
        self.effective_height
    }

    /// Logical over storage size; multiply UVs by this to address only the
    /// logical image inside padded storage.
    pub fn uv_scale(&self) -> Vec2 {
        if self.width == 0 || self.height == 0 {
            return Vec2::ONE;
        }
        Vec2::new(
            self.effective_width as f32 / self.width as f32,
            self.effective_height as f32 / self.height as f32,
        )
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn texture_type(&self) -> TextureType {
        self.texture_type
    }

    pub fn load_mode(&self) -> LoadMode {
        self.load_mode
    }

    pub fn filter(&self) -> TextureFilter {
        self.filter
    }

    pub fn address_mode(&self) -> AddressMode {
        self.address_mode
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn is_from_resource(&self) -> bool {
        self.from_resource
    }

    pub fn is_loaded(&self) -> bool {
        self.native.is_some()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_async_load_queued(&self) -> bool {
        self.async_slot.as_ref().is_some_and(|slot| slot.is_queued())
    }

    /// Finished async pixels are waiting for upload.
    pub fn is_async_load_ready(&self) -> bool {
        self.async_slot.as_ref().is_some_and(|slot| slot.is_ready())
    }

    pub fn state(&self) -> TextureState {
        if self.is_loaded() {
            TextureState::Loaded
        } else if self.async_slot.is_some() {
            TextureState::Loading
        } else {
            TextureState::Unloaded
        }
    }

    /// Subject to idle unloading.
    pub fn is_dynamic(&self) -> bool {
        self.load_mode.is_on_demand()
    }

    pub fn has_cpu_copy(&self) -> bool {
        self.data.is_some() || matches!(&self.held_lock, Some(l) if !l.render_target)
    }

    pub fn native_id(&self) -> Option<NativeTextureId> {
        self.native
    }

    /// Device memory held by the native texture.
    pub fn current_vram_size(&self) -> usize {
        if self.is_loaded() {
            self.width as usize * self.height as usize * self.format.bpp()
        } else {
            0
        }
    }

    /// Memory held by the CPU copy.
    pub fn current_ram_size(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    /// Memory held by decoded async pixels not yet uploaded.
    pub fn current_async_ram_size(&self) -> usize {
        self.async_slot.as_ref().map_or(0, |slot| slot.staged_bytes())
    }
}
