//! PNG output for captured frames.

use std::fs;
use std::path::Path;

use kestrel_core::image::{Image, ImageFormat};

/// Write `image` as an 8-bit RGBA PNG, converting first if needed.
pub fn save_png(path: &Path, image: Image) -> anyhow::Result<()> {
    let image = image.convert(ImageFormat::Rgba);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    let mut encoder = png::Encoder::new(writer, image.width, image.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&image.data)?;
    Ok(())
}
