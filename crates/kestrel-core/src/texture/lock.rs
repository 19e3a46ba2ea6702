//! Lock descriptors for CPU access to texture pixels.

use kestrel_types::geometry::PixelRect;
use kestrel_types::image::ImageFormat;

use super::TextureId;
use super::pixels::{PixelSource, PixelView};

/// Where a lock's pixels live.
#[derive(Debug, Default)]
pub(crate) enum LockBuffer {
    #[default]
    None,
    /// The texture's CPU copy, moved into the lock until it is released.
    Cpu(Vec<u8>),
    /// A staging copy of the locked region read back from the device.
    System(Vec<u8>),
}

/// Exclusive CPU access to a region of a texture.
///
/// `x`, `y`, `w`, `h` is the locked region in texture pixels; `dx`, `dy` is
/// where that region starts inside the lock buffer, which is
/// `data_width` x `data_height` pixels. A lock whose `failed` flag is set
/// carries no buffer and must not be unlocked.
#[derive(Debug)]
pub struct Lock {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub dx: i32,
    pub dy: i32,
    pub data_width: u32,
    pub data_height: u32,
    pub format: ImageFormat,
    pub locked: bool,
    pub failed: bool,
    /// The lock reads back from device memory rather than a CPU copy.
    pub render_target: bool,
    pub(crate) owner: Option<TextureId>,
    pub(crate) buffer: LockBuffer,
}

impl Lock {
    pub(crate) fn failed() -> Self {
        Self {
            x: 0,
            y: 0,
            w: 0,
            h: 0,
            dx: 0,
            dy: 0,
            data_width: 0,
            data_height: 0,
            format: ImageFormat::default(),
            locked: false,
            failed: true,
            render_target: false,
            owner: None,
            buffer: LockBuffer::None,
        }
    }

    /// Lock over the texture's whole CPU copy.
    pub(crate) fn cpu(
        owner: TextureId,
        rect: PixelRect,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: ImageFormat,
    ) -> Self {
        Self {
            x: rect.x,
            y: rect.y,
            w: rect.w,
            h: rect.h,
            dx: rect.x,
            dy: rect.y,
            data_width: width,
            data_height: height,
            format,
            locked: true,
            failed: false,
            render_target: false,
            owner: Some(owner),
            buffer: LockBuffer::Cpu(data),
        }
    }

    /// Lock over a staging copy of just `rect`.
    pub(crate) fn system(owner: TextureId, rect: PixelRect, data: Vec<u8>, format: ImageFormat) -> Self {
        Self {
            x: rect.x,
            y: rect.y,
            w: rect.w,
            h: rect.h,
            dx: 0,
            dy: 0,
            data_width: rect.w as u32,
            data_height: rect.h as u32,
            format,
            locked: true,
            failed: false,
            render_target: true,
            owner: Some(owner),
            buffer: LockBuffer::System(data),
        }
    }

    pub fn rect(&self) -> PixelRect {
        PixelRect::new(self.x, self.y, self.w, self.h)
    }

    /// Offset to add to texture coordinates to get buffer coordinates.
    pub fn origin(&self) -> (i32, i32) {
        (self.dx - self.x, self.dy - self.y)
    }

    /// Mutable access to the lock buffer; `None` for a failed lock.
    pub fn view(&mut self) -> Option<PixelView<'_>> {
        let (w, h, format) = (self.data_width, self.data_height, self.format);
        match &mut self.buffer {
            LockBuffer::Cpu(data) | LockBuffer::System(data) => {
                Some(PixelView::new(data, w, h, format))
            }
            LockBuffer::None => None,
        }
    }

    pub fn source(&self) -> Option<PixelSource<'_>> {
        match &self.buffer {
            LockBuffer::Cpu(data) | LockBuffer::System(data) => Some(PixelSource::new(
                data,
                self.data_width,
                self.data_height,
                self.format,
            )),
            LockBuffer::None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_types::color::Color;

    #[test]
    fn failed_lock_has_no_view() {
        let mut lock = Lock::failed();
        assert!(lock.failed);
        assert!(!lock.locked);
        assert!(lock.view().is_none());
        assert!(lock.source().is_none());
    }

    #[test]
    fn cpu_lock_maps_texture_coordinates_directly() {
        let lock = Lock::cpu(
            TextureId(1),
            PixelRect::new(2, 3, 1, 1),
            vec![0; 4 * 4 * 4],
            4,
            4,
            ImageFormat::Rgba,
        );
        assert_eq!(lock.origin(), (0, 0));
        assert!(!lock.render_target);
    }

    #[test]
    fn system_lock_is_region_relative() {
        let mut lock = Lock::system(
            TextureId(1),
            PixelRect::new(2, 3, 2, 1),
            vec![0; 8],
            ImageFormat::Rgba,
        );
        assert_eq!(lock.origin(), (-2, -3));
        assert_eq!((lock.data_width, lock.data_height), (2, 1));
        let (ox, oy) = lock.origin();
        let mut view = lock.view().unwrap();
        assert!(view.set_pixel(3 + ox, 3 + oy, Color::RED));
        assert_eq!(view.get_pixel(1, 0), Some(Color::RED));
    }
}
