//! Texture factories and registry maintenance.

use std::path::{Path, PathBuf};

use kestrel_types::color::Color;
use kestrel_types::error::{KestrelError, Result};
use kestrel_types::geometry::PixelRect;
use kestrel_types::image::{Image, ImageFormat};
use kestrel_types::state::{LoadMode, TextureType};

use super::RenderSystem;
use crate::texture::pixels::PixelSource;
use crate::texture::{Texture, TextureId, TextureOptions, pot};

impl RenderSystem {
    /// Register a texture backed by a file. `path` may omit a configured
    /// extension.
    ///
    /// `Immediate` textures load now, `Async` ones start decoding now, and
    /// on-demand modes only read the file header.
    pub fn create_texture_from_file(
        &mut self,
        path: impl AsRef<Path>,
        options: TextureOptions,
    ) -> Result<TextureId> {
        self.require_device()?;
        let path = path.as_ref();
        let found = self.find_texture_file(path).ok_or_else(|| {
            KestrelError::Texture(format!("texture file not found: {}", path.display()))
        })?;
        self.add_file_texture(found, false, options)
    }

    /// Like [`create_texture_from_file`](Self::create_texture_from_file),
    /// looked up under the configured resource directory.
    pub fn create_texture_from_resource(
        &mut self,
        name: impl AsRef<Path>,
        options: TextureOptions,
    ) -> Result<TextureId> {
        self.require_device()?;
        let name = name.as_ref();
        let found = self.find_texture_resource(name).ok_or_else(|| {
            KestrelError::Texture(format!("texture resource not found: {}", name.display()))
        })?;
        self.add_file_texture(found, true, options)
    }

    fn add_file_texture(
        &mut self,
        path: PathBuf,
        from_resource: bool,
        options: TextureOptions,
    ) -> Result<TextureId> {
        let id = self.allocate_texture_id();
        let display = path.display().to_string();
        self.textures
            .insert(id, Texture::from_file(id, path, from_resource, options));
        let ok = self.texture_mut(id).is_some_and(|mut texture| match options.load_mode {
            LoadMode::Immediate => texture.load(),
            LoadMode::Async => texture.load_async(),
            LoadMode::OnDemand | LoadMode::AsyncOnDemand => texture.load_meta_data(),
        });
        if !ok {
            self.destroy_texture(id);
            return Err(KestrelError::Texture(format!(
                "failed to create texture from {display}"
            )));
        }
        log::debug!("created texture {id} from {display} ({:?})", options.load_mode);
        Ok(id)
    }

    /// Register a texture from tightly packed `data` in `format`.
    pub fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        data: &[u8],
        format: ImageFormat,
        texture_type: TextureType,
    ) -> Result<TextureId> {
        self.require_device()?;
        let image = Image::new(width, height, format, data.to_vec())?;
        self.add_pixel_texture(image, texture_type)
    }

    /// Register a texture filled with `color`.
    pub fn create_texture_filled(
        &mut self,
        width: u32,
        height: u32,
        color: Color,
        format: ImageFormat,
        texture_type: TextureType,
    ) -> Result<TextureId> {
        self.require_device()?;
        self.add_pixel_texture(Image::filled(width, height, format, color), texture_type)
    }

    fn add_pixel_texture(&mut self, image: Image, texture_type: TextureType) -> Result<TextureId> {
        if image.width == 0 || image.height == 0 {
            return Err(KestrelError::Texture(format!(
                "cannot create a {}x{} texture",
                image.width, image.height
            )));
        }
        let storage = self.backend.native_texture_format(image.format);
        let prepared = pot::prepare(image, storage, self.caps.needs_pot_padding());
        let id = self.allocate_texture_id();
        self.textures
            .insert(id, Texture::from_pixels(id, prepared, texture_type));
        if !self.texture_mut(id).is_some_and(|mut texture| texture.load()) {
            self.destroy_texture(id);
            return Err(KestrelError::Texture(format!(
                "failed to create {texture_type:?} texture"
            )));
        }
        Ok(id)
    }

    /// Remove a texture: cancels its async load, frees the native texture
    /// and drops its dynamic links. Returns false for unknown ids.
    pub fn destroy_texture(&mut self, id: TextureId) -> bool {
        let Some(mut texture) = self.textures.remove(&id) else {
            return false;
        };
        if let Some(slot) = texture.async_slot.take() {
            slot.discard();
        }
        if let Some(native) = texture.native.take()
            && self.device.is_ready()
        {
            self.backend.destroy_texture(native);
        }
        self.idle.remove(id);
        if self.active_texture == Some(id) {
            self.active_texture = None;
            self.state.texture_id = None;
        }
        if self.render_target == Some(id) {
            self.render_target = None;
            if let Err(e) = self.backend.set_render_target(None) {
                log::error!("failed to unbind render target {id}: {e}");
            }
        }
        log::debug!("destroyed texture {id}");
        true
    }

    /// Link two textures so using either keeps both loaded.
    pub fn add_dynamic_link(&mut self, a: TextureId, b: TextureId) -> bool {
        if !self.textures.contains_key(&a) || !self.textures.contains_key(&b) {
            return false;
        }
        self.idle.add_link(a, b)
    }

    pub fn remove_dynamic_link(&mut self, a: TextureId, b: TextureId) -> bool {
        self.idle.remove_link(a, b)
    }

    pub fn dynamic_links(&self, id: TextureId) -> Vec<TextureId> {
        self.idle.links_of(id)
    }

    /// Composite `src_rect` of texture `src` over `dst` at `(x, y)`.
    pub fn blit_texture(
        &mut self,
        dst: TextureId,
        x: i32,
        y: i32,
        src: TextureId,
        src_rect: PixelRect,
        alpha: u8,
    ) -> bool {
        let Some(image) = self.texture_pixels(src) else {
            return false;
        };
        self.texture_mut(dst).is_some_and(|mut texture| {
            texture.blit(x, y, &PixelSource::from(&image), src_rect, alpha)
        })
    }

    /// Scale `src_rect` of texture `src` into `dst_rect` of `dst`.
    pub fn blit_texture_stretch(
        &mut self,
        dst: TextureId,
        dst_rect: PixelRect,
        src: TextureId,
        src_rect: PixelRect,
        alpha: u8,
    ) -> bool {
        let Some(image) = self.texture_pixels(src) else {
            return false;
        };
        self.texture_mut(dst).is_some_and(|mut texture| {
            texture.blit_stretch(dst_rect, &PixelSource::from(&image), src_rect, alpha)
        })
    }

    fn texture_pixels(&mut self, id: TextureId) -> Option<Image> {
        let mut texture = self.texture_mut(id)?;
        let format = texture.format();
        texture.copy_pixel_data(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_types::config::RenderConfig;

    use crate::backend::WindowInfo;
    use crate::backend::recording::RecordingBackend;

    fn created() -> RenderSystem {
        let mut rs = RenderSystem::new(Box::new(RecordingBackend::new()), RenderConfig::default());
        rs.create(&WindowInfo::new(16, 16)).unwrap();
        rs
    }

    #[test]
    fn factories_need_a_device() {
        let mut rs = RenderSystem::new(Box::new(RecordingBackend::new()), RenderConfig::default());
        let err = rs
            .create_texture_filled(2, 2, Color::RED, ImageFormat::Rgba, TextureType::Managed)
            .unwrap_err();
        assert!(matches!(err, KestrelError::Device(_)));
        assert_eq!(rs.texture_count(), 0);
    }

    #[test]
    fn filled_texture_is_loaded() {
        let mut rs = created();
        let id = rs
            .create_texture_filled(2, 2, Color::RED, ImageFormat::Rgba, TextureType::Managed)
            .unwrap();
        let tex = rs.texture(id).unwrap();
        assert!(tex.is_loaded());
        assert_eq!(rs.vram_consumption(), 16);
        assert_eq!(rs.ram_consumption(), 16);
    }

    #[test]
    fn wrong_data_size_rejected() {
        let mut rs = created();
        assert!(
            rs.create_texture(2, 2, &[0; 3], ImageFormat::Rgba, TextureType::Managed)
                .is_err()
        );
        assert!(
            rs.create_texture_filled(0, 2, Color::RED, ImageFormat::Rgba, TextureType::Managed)
                .is_err()
        );
        assert_eq!(rs.texture_count(), 0);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut rs = created();
        assert!(
            rs.create_texture_from_file("/nonexistent/kestrel", TextureOptions::default())
                .is_err()
        );
    }

    #[test]
    fn destroy_unbinds_and_unlinks() {
        let mut rs = created();
        let a = rs
            .create_texture_filled(1, 1, Color::RED, ImageFormat::Rgba, TextureType::Managed)
            .unwrap();
        let b = rs
            .create_texture_filled(1, 1, Color::RED, ImageFormat::Rgba, TextureType::Managed)
            .unwrap();
        assert!(rs.add_dynamic_link(a, b));
        rs.set_texture(Some(a));
        assert!(rs.destroy_texture(a));
        assert!(!rs.destroy_texture(a));
        assert_eq!(rs.texture_id(), None);
        assert!(rs.dynamic_links(b).is_empty());
        assert!(!rs.add_dynamic_link(a, b));
    }

    #[test]
    fn blit_between_textures() {
        let mut rs = created();
        let dst = rs
            .create_texture_filled(2, 2, Color::BLACK, ImageFormat::Rgba, TextureType::Managed)
            .unwrap();
        let src = rs
            .create_texture_filled(1, 1, Color::WHITE, ImageFormat::Rgb, TextureType::Managed)
            .unwrap();
        assert!(rs.blit_texture(dst, 1, 1, src, PixelRect::new(0, 0, 1, 1), 255));
        let mut tex = rs.texture_mut(dst).unwrap();
        assert_eq!(tex.get_pixel(1, 1), Some(Color::WHITE));
        assert_eq!(tex.get_pixel(0, 0), Some(Color::BLACK));
    }
}
