//! Conversion of decoded images into texture storage.

use kestrel_types::image::{self, Image, ImageFormat};
use kestrel_types::geometry::PixelRect;

/// Pixels ready for upload, in the texture's storage format and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Prepared {
    pub data: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub effective_width: u32,
    pub effective_height: u32,
}

impl Prepared {
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }
}

pub fn next_power_of_two(n: u32) -> u32 {
    n.max(1).next_power_of_two()
}

/// Storage size for a logical size.
pub fn storage_size(width: u32, height: u32, pad: bool) -> (u32, u32) {
    if pad {
        (next_power_of_two(width), next_power_of_two(height))
    } else {
        (width, height)
    }
}

/// Convert `image` to `format`, padding storage up to powers of two when
/// `pad` is set. Padding is transparent black in the top-left origin.
pub(crate) fn prepare(image: Image, format: ImageFormat, pad: bool) -> Prepared {
    let image = image.convert(format);
    let (width, height) = storage_size(image.width, image.height, pad);
    let data = if (width, height) == (image.width, image.height) {
        image.data
    } else {
        let mut padded = vec![0u8; width as usize * height as usize * format.bpp()];
        image::write_region(
            &mut padded,
            width,
            format.bpp(),
            PixelRect::full(image.width, image.height),
            &image.data,
        );
        padded
    };
    Prepared {
        data,
        format,
        width,
        height,
        effective_width: image.width,
        effective_height: image.height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_types::color::Color;

    #[test]
    fn powers() {
        assert_eq!(next_power_of_two(0), 1);
        assert_eq!(next_power_of_two(1), 1);
        assert_eq!(next_power_of_two(3), 4);
        assert_eq!(next_power_of_two(64), 64);
        assert_eq!(next_power_of_two(65), 128);
    }

    #[test]
    fn prepare_without_padding_keeps_size() {
        let img = Image::filled(3, 5, ImageFormat::Rgb, Color::RED);
        let p = prepare(img, ImageFormat::Rgba, false);
        assert_eq!((p.width, p.height), (3, 5));
        assert_eq!((p.effective_width, p.effective_height), (3, 5));
        assert_eq!(p.byte_size(), 60);
        assert_eq!(p.format, ImageFormat::Rgba);
    }

    #[test]
    fn prepare_pads_to_pot() {
        let img = Image::filled(3, 5, ImageFormat::Rgba, Color::RED);
        let p = prepare(img, ImageFormat::Rgba, true);
        assert_eq!((p.width, p.height), (4, 8));
        assert_eq!((p.effective_width, p.effective_height), (3, 5));
        assert_eq!(p.byte_size(), 4 * 8 * 4);
        // Logical pixels keep their place; padding is clear.
        assert_eq!(&p.data[0..4], &[255, 0, 0, 255]);
        assert_eq!(&p.data[12..16], &[0, 0, 0, 0]);
    }
}
