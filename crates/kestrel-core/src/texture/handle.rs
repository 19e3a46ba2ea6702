//! Mutable access to a registered texture.

use std::fs::File;
use std::io::BufReader;
use std::ops::Deref;
use std::sync::Arc;

use kestrel_types::color::Color;
use kestrel_types::error::{KestrelError, Result};
use kestrel_types::geometry::PixelRect;
use kestrel_types::image::{self, Image, ImageFormat};
use kestrel_types::state::{AddressMode, TextureFilter};

use super::lock::{Lock, LockBuffer};
use super::pixels::{PixelSource, PixelView};
use super::pot::{self, Prepared};
use super::{AsyncLoader, AsyncRequest, Texture};
use crate::backend::{Caps, GraphicsBackend, NativeTextureId, TextureDesc};
use crate::decoder::ImageDecoder;
use crate::idle::IdleTracker;

/// A texture together with everything needed to load and edit it.
///
/// Obtained from [`RenderSystem::texture_mut`](crate::RenderSystem::texture_mut).
/// Derefs to [`Texture`] for queries.
pub struct TextureMut<'a> {
    pub(crate) texture: &'a mut Texture,
    pub(crate) backend: &'a mut dyn GraphicsBackend,
    pub(crate) idle: &'a mut IdleTracker,
    pub(crate) loader: &'a AsyncLoader,
    pub(crate) decoder: &'a Arc<dyn ImageDecoder>,
    pub(crate) caps: Caps,
    pub(crate) device_ready: bool,
}

impl Deref for TextureMut<'_> {
    type Target = Texture;

    fn deref(&self) -> &Texture {
        self.texture
    }
}

/// A rect covering any texture; locking clips it to the storage size.
fn whole() -> PixelRect {
    PixelRect::new(0, 0, i32::MAX, i32::MAX)
}

fn shift(rect: PixelRect, (ox, oy): (i32, i32)) -> PixelRect {
    PixelRect::new(rect.x.saturating_add(ox), rect.y.saturating_add(oy), rect.w, rect.h)
}

impl TextureMut<'_> {
    // -- Loading ------------------------------------------------------------

    /// Create the native texture and upload pixels. Idempotent.
    pub fn load(&mut self) -> bool {
        let id = self.texture.id;
        if self.texture.is_loaded() {
            self.idle.touch(id);
            return true;
        }
        if !self.device_ready {
            log::warn!("cannot load texture {id} without a device");
            return false;
        }
        if self.texture.locked {
            log::warn!("cannot load texture {id} while it is locked");
            return false;
        }
        let (prepared, from_cpu) = match self.staged_pixels() {
            Some(Ok(prepared)) => (prepared, false),
            Some(Err(e)) => {
                log::error!("failed to load texture {id}: {e}");
                return false;
            }
            None => {
                if let Some(data) = self.texture.data.take() {
                    let t = &*self.texture;
                    let prepared = Prepared {
                        data,
                        format: t.format,
                        width: t.width,
                        height: t.height,
                        effective_width: t.effective_width,
                        effective_height: t.effective_height,
                    };
                    (prepared, true)
                } else if self.texture.filename.is_some() {
                    match self.decode_file() {
                        Ok(prepared) => (prepared, false),
                        Err(e) => {
                            log::error!("failed to load texture {id}: {e}");
                            return false;
                        }
                    }
                } else {
                    log::warn!("texture {id} has no pixel source");
                    return false;
                }
            }
        };
        let native = match self.create_native(&prepared) {
            Ok(native) => native,
            Err(e) => {
                log::error!("failed to create texture {id}: {e}");
                if from_cpu {
                    self.texture.data = Some(prepared.data);
                }
                return false;
            }
        };
        let t = &mut *self.texture;
        t.native = Some(native);
        t.width = prepared.width;
        t.height = prepared.height;
        t.effective_width = prepared.effective_width;
        t.effective_height = prepared.effective_height;
        t.format = prepared.format;
        t.first_upload = false;
        t.dirty = false;
        t.restore_pending = false;
        t.data = t
            .texture_type
            .keeps_cpu_copy(t.filename.is_some())
            .then_some(prepared.data);
        log::debug!(
            "loaded texture {id} ({}x{} {:?})",
            t.width,
            t.height,
            t.format
        );
        self.idle.touch(id);
        true
    }

    /// Result of an async decode, waiting for it if still queued.
    fn staged_pixels(&mut self) -> Option<std::result::Result<Prepared, String>> {
        let slot = self.texture.async_slot.take()?;
        if slot.is_queued() {
            slot.wait(0.0);
        }
        slot.take()
    }

    fn storage_format(&self, decoded: ImageFormat) -> ImageFormat {
        self.backend
            .native_texture_format(self.texture.forced_format.unwrap_or(decoded))
    }

    fn decode_file(&self) -> Result<Prepared> {
        let path = self
            .texture
            .filename
            .as_deref()
            .ok_or_else(|| KestrelError::Texture("texture has no file".into()))?;
        let bytes = std::fs::read(path)
            .map_err(|e| KestrelError::Texture(format!("{}: {e}", path.display())))?;
        let image = self.decoder.decode(&bytes)?;
        let format = self.storage_format(image.format);
        Ok(pot::prepare(image, format, self.caps.needs_pot_padding()))
    }

    fn create_native(&mut self, prepared: &Prepared) -> Result<NativeTextureId> {
        let max = self.caps.max_texture_size;
        if prepared.width > max || prepared.height > max {
            return Err(KestrelError::Texture(format!(
                "{}x{} exceeds the maximum texture size {max}",
                prepared.width, prepared.height
            )));
        }
        let desc = TextureDesc {
            width: prepared.width,
            height: prepared.height,
            format: prepared.format,
            texture_type: self.texture.texture_type,
        };
        let native = self.backend.create_texture(&desc)?;
        let full = PixelRect::full(prepared.width, prepared.height);
        if let Err(e) = self
            .backend
            .upload_texture(native, full, &prepared.data, prepared.format)
        {
            self.backend.destroy_texture(native);
            return Err(e);
        }
        Ok(native)
    }

    /// Queue a background decode of the texture file.
    ///
    /// Returns false when the texture is already loaded, a job is pending, it
    /// has no file or no worker could take the job.
    pub fn load_async(&mut self) -> bool {
        let id = self.texture.id;
        if self.texture.is_loaded() || self.texture.async_slot.is_some() {
            return false;
        }
        let Some(path) = self.texture.filename.clone() else {
            return false;
        };
        if !self.load_meta_data() {
            return false;
        }
        let request = AsyncRequest {
            path,
            format: self.texture.format,
            pad: self.caps.needs_pot_padding(),
            decoder: Arc::clone(self.decoder),
        };
        match self.loader.submit(request) {
            Some(slot) => {
                log::debug!("queued async load of texture {id}");
                self.texture.async_slot = Some(slot);
                true
            }
            None => {
                log::warn!("no loader thread available for texture {id}");
                false
            }
        }
    }

    /// Block until a pending async decode finishes, then upload it. A
    /// timeout of zero waits indefinitely.
    pub fn wait_for_async_load(&mut self, timeout: f32) -> bool {
        let Some(slot) = self.texture.async_slot.as_ref().map(Arc::clone) else {
            return self.texture.is_loaded();
        };
        if !slot.wait(timeout) {
            return false;
        }
        self.load()
    }

    /// Read size and format from the file header without decoding pixels.
    pub fn load_meta_data(&mut self) -> bool {
        let id = self.texture.id;
        let Some(path) = self.texture.filename.clone() else {
            return false;
        };
        let meta = match File::open(&path)
            .map_err(KestrelError::from)
            .and_then(|file| self.decoder.read_metadata(&mut BufReader::new(file)))
        {
            Ok(meta) => meta,
            Err(e) => {
                log::error!("failed to read metadata of texture {id} ({}): {e}", path.display());
                return false;
            }
        };
        let (width, height) =
            pot::storage_size(meta.width, meta.height, self.caps.needs_pot_padding());
        let format = self.storage_format(meta.format);
        let t = &mut *self.texture;
        t.width = width;
        t.height = height;
        t.effective_width = meta.width;
        t.effective_height = meta.height;
        t.format = format;
        true
    }

    /// Destroy the native texture. File-backed textures also drop their
    /// CPU copy; others keep it for a later reload.
    pub fn unload(&mut self) {
        let id = self.texture.id;
        if self.texture.locked {
            log::warn!("cannot unload texture {id} while it is locked");
            return;
        }
        if let Some(slot) = self.texture.async_slot.take() {
            slot.discard();
        }
        if let Some(native) = self.texture.native.take() {
            self.backend.destroy_texture(native);
            log::debug!("unloaded texture {id}");
        }
        if self.texture.filename.is_some() {
            self.texture.data = None;
        }
        self.texture.restore_pending = false;
        self.idle.clear_timer(id);
    }

    pub fn set_filter(&mut self, filter: TextureFilter) {
        if !filter.is_defined() {
            log::warn!("ignoring undefined filter for texture {}", self.texture.id);
            return;
        }
        self.texture.filter = filter;
    }

    pub fn set_address_mode(&mut self, mode: AddressMode) {
        if !mode.is_defined() {
            log::warn!("ignoring undefined address mode for texture {}", self.texture.id);
            return;
        }
        self.texture.address_mode = mode;
    }

    // -- Locking ------------------------------------------------------------

    /// Lock `rect` (clipped to the texture) for CPU access.
    ///
    /// The CPU copy is mapped directly when there is one; otherwise the
    /// region is read back from the device. The returned lock has `failed`
    /// set when the texture is already locked or no pixels are available.
    pub fn try_lock(&mut self, rect: PixelRect) -> Lock {
        let id = self.texture.id;
        if self.texture.locked {
            log::warn!("texture {id} is already locked");
            return Lock::failed();
        }
        if self.texture.data.is_none() && !self.texture.is_loaded() && !self.load() {
            return Lock::failed();
        }
        let Some(rect) = rect.clip_to(self.texture.width, self.texture.height) else {
            return Lock::failed();
        };
        let t = &mut *self.texture;
        let lock = if let Some(data) = t.data.take() {
            Lock::cpu(id, rect, data, t.width, t.height, t.format)
        } else if let Some(native) = t.native {
            match self.backend.read_texture(native, rect) {
                Ok(pixels) => Lock::system(id, rect, pixels, t.format),
                Err(e) => {
                    log::error!("failed to read back texture {id}: {e}");
                    return Lock::failed();
                }
            }
        } else {
            return Lock::failed();
        };
        t.locked = true;
        self.idle.touch(id);
        lock
    }

    /// Release a lock from [`try_lock`](Self::try_lock). With `update` the
    /// locked region is uploaded now; otherwise a CPU lock leaves the
    /// texture dirty and a system lock's edits are dropped.
    pub fn unlock_region(&mut self, lock: Lock, update: bool) -> bool {
        self.release(lock, update, true)
    }

    fn release(&mut self, mut lock: Lock, upload: bool, edited: bool) -> bool {
        let id = self.texture.id;
        if lock.failed || lock.owner != Some(id) {
            log::warn!("texture {id} was not locked by this lock");
            return false;
        }
        self.texture.locked = false;
        lock.locked = false;
        let rect = lock.rect();
        match std::mem::take(&mut lock.buffer) {
            LockBuffer::Cpu(data) => {
                let mut ok = true;
                if let Some(native) = self.texture.native {
                    if upload && self.texture.dirty {
                        let full = PixelRect::full(self.texture.width, self.texture.height);
                        ok = self.upload(native, full, &data);
                    } else if upload {
                        let bpp = self.texture.format.bpp();
                        let region = image::extract_region(&data, self.texture.width, bpp, rect);
                        ok = self.upload(native, rect, &region);
                    } else if edited {
                        self.texture.dirty = true;
                    }
                }
                self.texture.data = Some(data);
                ok
            }
            LockBuffer::System(data) => match self.texture.native {
                Some(native) if upload => self.upload(native, rect, &data),
                Some(_) => true,
                None => false,
            },
            LockBuffer::None => false,
        }
    }

    fn upload(&mut self, native: NativeTextureId, rect: PixelRect, data: &[u8]) -> bool {
        match self
            .backend
            .upload_texture(native, rect, data, self.texture.format)
        {
            Ok(()) => {
                self.texture.dirty = false;
                true
            }
            Err(e) => {
                log::error!("failed to upload texture {}: {e}", self.texture.id);
                false
            }
        }
    }

    /// Hold a lock over the whole texture until [`unlock`](Self::unlock).
    /// Pixel operations in between edit the locked buffer directly.
    pub fn lock(&mut self) -> bool {
        let lock = self.try_lock(whole());
        if lock.failed {
            return false;
        }
        self.texture.held_lock = Some(lock);
        true
    }

    /// Release the held lock, uploading once if anything was edited.
    pub fn unlock(&mut self) -> bool {
        let Some(lock) = self.texture.held_lock.take() else {
            log::warn!("texture {} is not locked", self.texture.id);
            return false;
        };
        let dirty = self.texture.dirty;
        self.release(lock, dirty, dirty)
    }

    /// Run `f` on a view covering `rect`, through the held lock if there is
    /// one. `f` receives the offset from texture to view coordinates.
    fn edit<R>(
        &mut self,
        rect: PixelRect,
        write: bool,
        f: impl FnOnce(&mut PixelView<'_>, (i32, i32)) -> R,
    ) -> Option<R> {
        let id = self.texture.id;
        if let Some(held) = self.texture.held_lock.as_mut() {
            let origin = held.origin();
            let result = f(&mut held.view()?, origin);
            if write {
                self.texture.dirty = true;
            }
            self.idle.touch(id);
            return Some(result);
        }
        let mut lock = self.try_lock(rect);
        if lock.failed {
            return None;
        }
        let origin = lock.origin();
        let result = lock.view().map(|mut view| f(&mut view, origin));
        self.release(lock, write, write);
        result
    }

    // -- Pixel operations ---------------------------------------------------

    pub fn get_pixel(&mut self, x: i32, y: i32) -> Option<Color> {
        self.edit(PixelRect::new(x, y, 1, 1), false, |view, (ox, oy)| {
            view.get_pixel(x + ox, y + oy)
        })
        .flatten()
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) -> bool {
        self.edit(PixelRect::new(x, y, 1, 1), true, |view, (ox, oy)| {
            view.set_pixel(x + ox, y + oy, color)
        }) == Some(true)
    }

    pub fn fill_rect(&mut self, rect: PixelRect, color: Color) -> bool {
        self.edit(rect, true, |view, origin| {
            view.fill_rect(shift(rect, origin), color)
        }) == Some(true)
    }

    /// Fill the whole texture with transparent black.
    pub fn clear(&mut self) -> bool {
        self.fill_rect(whole(), Color::CLEAR)
    }

    /// Copy `src_rect` of `src` to `(x, y)`, converting formats, no blending.
    pub fn write(&mut self, x: i32, y: i32, src: &PixelSource<'_>, src_rect: PixelRect) -> bool {
        let dst = PixelRect::new(x, y, src_rect.w, src_rect.h);
        self.edit(dst, true, |view, (ox, oy)| {
            view.write(x + ox, y + oy, src, src_rect)
        }) == Some(true)
    }

    pub fn write_stretch(
        &mut self,
        dst_rect: PixelRect,
        src: &PixelSource<'_>,
        src_rect: PixelRect,
    ) -> bool {
        self.edit(dst_rect, true, |view, origin| {
            view.write_stretch(shift(dst_rect, origin), src, src_rect)
        }) == Some(true)
    }

    /// Composite `src_rect` of `src` over `(x, y)` with extra `alpha`.
    pub fn blit(
        &mut self,
        x: i32,
        y: i32,
        src: &PixelSource<'_>,
        src_rect: PixelRect,
        alpha: u8,
    ) -> bool {
        let dst = PixelRect::new(x, y, src_rect.w, src_rect.h);
        self.edit(dst, true, |view, (ox, oy)| {
            view.blit(x + ox, y + oy, src, src_rect, alpha)
        }) == Some(true)
    }

    pub fn blit_stretch(
        &mut self,
        dst_rect: PixelRect,
        src: &PixelSource<'_>,
        src_rect: PixelRect,
        alpha: u8,
    ) -> bool {
        self.edit(dst_rect, true, |view, origin| {
            view.blit_stretch(shift(dst_rect, origin), src, src_rect, alpha)
        }) == Some(true)
    }

    pub fn rotate_hue(&mut self, rect: PixelRect, degrees: f32) -> bool {
        self.edit(rect, true, |view, origin| {
            view.rotate_hue(shift(rect, origin), degrees)
        }) == Some(true)
    }

    pub fn saturate(&mut self, rect: PixelRect, factor: f32) -> bool {
        self.edit(rect, true, |view, origin| {
            view.saturate(shift(rect, origin), factor)
        }) == Some(true)
    }

    pub fn invert(&mut self, rect: PixelRect) -> bool {
        self.edit(rect, true, |view, origin| view.invert(shift(rect, origin))) == Some(true)
    }

    /// Derive alpha from the brightness of `map`, which must match the
    /// texture's storage size.
    pub fn insert_alpha_map(&mut self, map: &PixelSource<'_>, median: u8, ambiguity: u8) -> bool {
        self.edit(whole(), true, |view, _| {
            view.insert_alpha_map(map, median, ambiguity)
        }) == Some(true)
    }

    /// Copy of the full storage converted to `format`.
    pub fn copy_pixel_data(&mut self, format: ImageFormat) -> Option<Image> {
        self.edit(whole(), false, |view, _| {
            Image::new(view.width, view.height, view.format, view.data.to_vec())
                .ok()
                .map(|img| img.convert(format))
        })
        .flatten()
    }

    /// Bilinear sample at fractional texture coordinates.
    pub fn get_interpolated_pixel(&mut self, x: f32, y: f32) -> Option<Color> {
        self.edit(whole(), false, |view, (ox, oy)| {
            view.interpolated_pixel(x + ox as f32, y + oy as f32)
        })
        .flatten()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::backend::recording::RecordingBackend;
    use crate::decoder::{PngDecoder, RawDecoder};
    use crate::texture::{TextureId, TextureState};
    use kestrel_types::state::TextureType;

    struct Fixture {
        backend: RecordingBackend,
        idle: IdleTracker,
        loader: AsyncLoader,
        decoder: Arc<dyn ImageDecoder>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                backend: RecordingBackend::new(),
                idle: IdleTracker::new(),
                loader: AsyncLoader::new(1),
                decoder: Arc::new(RawDecoder::new(2, 2, ImageFormat::Rgba)),
            }
        }

        fn handle<'a>(&'a mut self, texture: &'a mut Texture) -> TextureMut<'a> {
            let caps = self.backend.caps();
            TextureMut {
                texture,
                backend: &mut self.backend,
                idle: &mut self.idle,
                loader: &self.loader,
                decoder: &self.decoder,
                caps,
                device_ready: true,
            }
        }
    }

    fn managed(w: u32, h: u32, color: Color) -> Texture {
        let image = Image::filled(w, h, ImageFormat::Rgba, color);
        let prepared = pot::prepare(image, ImageFormat::Rgba, false);
        Texture::from_pixels(TextureId(1), prepared, TextureType::Managed)
    }

    #[test]
    fn load_is_idempotent() {
        let mut fx = Fixture::new();
        let rec = fx.backend.recording();
        let mut tex = managed(2, 2, Color::RED);
        {
            let mut h = fx.handle(&mut tex);
            assert!(h.load());
            assert!(h.load());
        }
        assert_eq!(tex.state(), TextureState::Loaded);
        assert_eq!(rec.borrow().counts.create_texture, 1);
        assert_eq!(rec.borrow().counts.upload_texture, 1);
        assert!(tex.has_cpu_copy());
    }

    #[test]
    fn file_immutable_drops_cpu_copy_after_upload() {
        let mut fx = Fixture::new();
        let mut tex = managed(2, 2, Color::RED);
        tex.texture_type = TextureType::Immutable;
        tex.filename = Some(PathBuf::from("red.png"));
        assert!(fx.handle(&mut tex).load());
        assert!(!tex.has_cpu_copy());
        assert_eq!(tex.current_ram_size(), 0);
        assert_eq!(tex.current_vram_size(), 16);
    }

    #[test]
    fn memory_immutable_keeps_cpu_copy() {
        let mut fx = Fixture::new();
        let mut tex = managed(2, 2, Color::RED);
        tex.texture_type = TextureType::Immutable;
        {
            let mut h = fx.handle(&mut tex);
            assert!(h.load());
            h.unload();
            assert!(h.load());
        }
        assert!(tex.has_cpu_copy());
        assert_eq!(tex.current_ram_size(), 16);
    }

    #[test]
    fn failed_create_keeps_cpu_copy() {
        let mut fx = Fixture::new();
        fx.backend.recording().borrow_mut().fail_create_texture = true;
        let mut tex = managed(2, 2, Color::RED);
        assert!(!fx.handle(&mut tex).load());
        assert_eq!(tex.state(), TextureState::Unloaded);
        assert!(tex.has_cpu_copy());
    }

    #[test]
    fn no_load_without_device() {
        let mut fx = Fixture::new();
        let mut tex = managed(2, 2, Color::RED);
        let mut h = fx.handle(&mut tex);
        h.device_ready = false;
        assert!(!h.load());
    }

    #[test]
    fn second_lock_fails_and_changes_nothing() {
        let mut fx = Fixture::new();
        let mut tex = managed(2, 2, Color::RED);
        let mut h = fx.handle(&mut tex);
        let first = h.try_lock(PixelRect::new(0, 0, 2, 2));
        assert!(!first.failed);
        let second = h.try_lock(PixelRect::new(0, 0, 1, 1));
        assert!(second.failed);
        assert!(!h.set_pixel(0, 0, Color::BLUE));
        assert!(!h.unlock_region(second, true));
        assert!(h.is_locked());
        assert!(h.unlock_region(first, true));
        assert!(!h.is_locked());
        assert_eq!(h.get_pixel(0, 0), Some(Color::RED));
    }

    #[test]
    fn cpu_edit_uploads_region() {
        let mut fx = Fixture::new();
        let rec = fx.backend.recording();
        let mut tex = managed(2, 2, Color::RED);
        let native = {
            let mut h = fx.handle(&mut tex);
            assert!(h.load());
            assert!(h.set_pixel(1, 1, Color::GREEN));
            h.native_id().unwrap()
        };
        let rec = rec.borrow();
        assert_eq!(rec.counts.upload_texture, 2);
        assert_eq!(&rec.texture_data(native).unwrap()[12..16], &[0, 255, 0, 255]);
    }

    #[test]
    fn system_lock_reads_back_immutable() {
        let mut fx = Fixture::new();
        let rec = fx.backend.recording();
        let mut tex = managed(2, 2, Color::RED);
        tex.texture_type = TextureType::Immutable;
        tex.filename = Some(PathBuf::from("red.png"));
        let mut h = fx.handle(&mut tex);
        assert!(h.load());
        assert!(h.fill_rect(PixelRect::new(1, 0, 5, 5), Color::BLUE));
        assert_eq!(h.get_pixel(0, 0), Some(Color::RED));
        assert_eq!(h.get_pixel(1, 1), Some(Color::BLUE));
        assert!(!h.has_cpu_copy());
        assert!(rec.borrow().counts.read_texture >= 3);
    }

    #[test]
    fn persistent_lock_uploads_once() {
        let mut fx = Fixture::new();
        let rec = fx.backend.recording();
        let mut tex = managed(4, 4, Color::WHITE);
        let mut h = fx.handle(&mut tex);
        assert!(h.load());
        rec.borrow_mut().reset_counts();
        assert!(h.lock());
        assert!(!h.lock());
        assert!(h.set_pixel(0, 0, Color::BLACK));
        assert!(h.invert(PixelRect::new(1, 1, 2, 2)));
        assert!(h.is_dirty());
        assert_eq!(rec.borrow().counts.upload_texture, 0);
        assert!(h.unlock());
        assert!(!h.is_dirty());
        assert_eq!(rec.borrow().counts.upload_texture, 1);
        assert_eq!(h.get_pixel(1, 1), Some(Color::BLACK));
        assert!(!h.unlock());
    }

    #[test]
    fn unlock_without_update_marks_dirty() {
        let mut fx = Fixture::new();
        let mut tex = managed(2, 2, Color::WHITE);
        let mut h = fx.handle(&mut tex);
        assert!(h.load());
        let lock = h.try_lock(PixelRect::new(0, 0, 1, 1));
        assert!(h.unlock_region(lock, false));
        assert!(h.is_dirty());
    }

    #[test]
    fn copy_pixel_data_converts() {
        let mut fx = Fixture::new();
        let mut tex = managed(2, 1, Color::rgba(10, 20, 30, 40));
        let img = fx.handle(&mut tex).copy_pixel_data(ImageFormat::Bgr).unwrap();
        assert_eq!(img.format, ImageFormat::Bgr);
        assert_eq!(img.data, vec![30, 20, 10, 30, 20, 10]);
    }

    #[test]
    fn undefined_filter_ignored() {
        let mut fx = Fixture::new();
        let mut tex = managed(1, 1, Color::WHITE);
        let mut h = fx.handle(&mut tex);
        h.set_filter(TextureFilter::Nearest);
        h.set_filter(TextureFilter::Undefined);
        h.set_address_mode(AddressMode::Undefined);
        assert_eq!(h.filter(), TextureFilter::Nearest);
        assert_eq!(h.address_mode(), AddressMode::Wrap);
    }

    #[test]
    fn file_texture_loads_and_unloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.raw");
        std::fs::write(&path, [7u8; 16]).unwrap();
        let mut fx = Fixture::new();
        let rec = fx.backend.recording();
        let mut tex = Texture::from_file(TextureId(2), path, false, Default::default());
        let mut h = fx.handle(&mut tex);
        assert!(h.load_meta_data());
        assert_eq!((h.width(), h.height()), (2, 2));
        assert!(!h.is_loaded());
        assert!(h.load());
        h.unload();
        assert_eq!(h.state(), TextureState::Unloaded);
        assert!(!h.has_cpu_copy());
        assert_eq!(rec.borrow().live_textures(), 0);
        assert!(h.load());
    }

    #[test]
    fn meta_data_reads_png_header_only() {
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, 5, 3);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[1; 5 * 3 * 3]).unwrap();
        }
        let idat = bytes.windows(4).position(|w| w == b"IDAT").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.png");
        std::fs::write(&path, &bytes[..idat + 6]).unwrap();

        let mut fx = Fixture::new();
        fx.decoder = Arc::new(PngDecoder);
        let mut tex = Texture::from_file(TextureId(4), path, false, Default::default());
        let mut h = fx.handle(&mut tex);
        assert!(h.load_meta_data());
        assert_eq!((h.effective_width(), h.effective_height()), (5, 3));
        assert!(!h.load());
        assert!(!h.has_cpu_copy());
    }

    #[test]
    fn meta_data_of_missing_file_fails() {
        let mut fx = Fixture::new();
        let path = PathBuf::from("/nonexistent/t.png");
        let mut tex = Texture::from_file(TextureId(5), path, false, Default::default());
        assert!(!fx.handle(&mut tex).load_meta_data());
    }

    #[test]
    fn async_load_then_wait() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.raw");
        std::fs::write(&path, [9u8; 16]).unwrap();
        let mut fx = Fixture::new();
        let mut tex = Texture::from_file(TextureId(3), path, false, Default::default());
        let mut h = fx.handle(&mut tex);
        assert!(h.load_async());
        assert!(!h.load_async());
        assert!(h.wait_for_async_load(0.0));
        assert!(h.is_loaded());
        assert!(!h.is_async_load_queued());
        assert_eq!(h.get_pixel(1, 1), Some(Color::rgba(9, 9, 9, 9)));
    }
}
