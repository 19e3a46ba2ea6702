//! Image decoding seam.
//!
//! The render system never parses file formats itself; it hands file bytes
//! to an [`ImageDecoder`]. Decoders run on async loader threads, hence the
//! `Send + Sync` bound.

use std::io::Read;

use kestrel_types::error::{KestrelError, Result};
use kestrel_types::image::{Image, ImageFormat};

/// Header information available without decoding pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Image>;

    /// Read only as much of `reader` as the header needs.
    fn read_metadata(&self, reader: &mut dyn Read) -> Result<ImageMetadata>;
}

fn png_error(e: png::DecodingError) -> KestrelError {
    KestrelError::Decode(format!("png: {e}"))
}

/// PNG decoder built on the `png` crate.
///
/// Palettes are expanded and 16-bit channels stripped, so output is always
/// 8 bits per channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngDecoder;

impl PngDecoder {
    fn reader<R: Read>(source: R) -> Result<png::Reader<R>> {
        let mut decoder = png::Decoder::new(source);
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        decoder.read_info().map_err(png_error)
    }

    fn format_of(color_type: png::ColorType) -> Result<ImageFormat> {
        match color_type {
            png::ColorType::Rgba => Ok(ImageFormat::Rgba),
            png::ColorType::Rgb => Ok(ImageFormat::Rgb),
            png::ColorType::Grayscale => Ok(ImageFormat::Greyscale),
            // No two-channel format; widened to RGBA on decode.
            png::ColorType::GrayscaleAlpha => Ok(ImageFormat::Rgba),
            png::ColorType::Indexed => Err(KestrelError::Decode(
                "png: palette was not expanded".into(),
            )),
        }
    }
}

impl ImageDecoder for PngDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Image> {
        let mut reader = Self::reader(bytes)?;
        let mut buf = vec![0u8; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).map_err(png_error)?;
        buf.truncate(info.buffer_size());
        let format = Self::format_of(info.color_type)?;
        let data = if info.color_type == png::ColorType::GrayscaleAlpha {
            buf.chunks_exact(2)
                .flat_map(|ga| [ga[0], ga[0], ga[0], ga[1]])
                .collect()
        } else {
            buf
        };
        log::debug!(
            "decoded {}x{} png as {format:?}",
            info.width,
            info.height
        );
        Image::new(info.width, info.height, format, data)
    }

    fn read_metadata(&self, reader: &mut dyn Read) -> Result<ImageMetadata> {
        let reader = Self::reader(reader)?;
        let (color_type, _) = reader.output_color_type();
        let info = reader.info();
        Ok(ImageMetadata {
            width: info.width,
            height: info.height,
            format: Self::format_of(color_type)?,
        })
    }
}

/// Decoder for headerless pixel dumps of a known size and format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDecoder {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

impl RawDecoder {
    pub fn new(width: u32, height: u32, format: ImageFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }
}

impl ImageDecoder for RawDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Image> {
        Image::new(self.width, self.height, self.format, bytes.to_vec())
    }

    fn read_metadata(&self, _reader: &mut dyn Read) -> Result<ImageMetadata> {
        Ok(ImageMetadata {
            width: self.width,
            height: self.height,
            format: self.format,
        })
    }
}
