//! Mapping from kestrel enums to GL constants.

use gl::types::{GLenum, GLint};

use kestrel_types::image::ImageFormat;
use kestrel_types::state::{AddressMode, BlendMode, ColorMode, RenderOp, TextureFilter};

/// Blend equation and factors, or `None` to disable blending.
pub fn blend(mode: BlendMode) -> Option<(GLenum, GLenum, GLenum)> {
    match mode {
        BlendMode::Alpha | BlendMode::Undefined => {
            Some((gl::FUNC_ADD, gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA))
        }
        BlendMode::Add => Some((gl::FUNC_ADD, gl::SRC_ALPHA, gl::ONE)),
        BlendMode::Subtract => Some((gl::FUNC_REVERSE_SUBTRACT, gl::SRC_ALPHA, gl::ONE)),
        BlendMode::Overwrite => None,
    }
}

/// Value of the `u_color_mode` uniform.
pub fn color_mode(mode: ColorMode) -> GLint {
    match mode {
        ColorMode::Multiply | ColorMode::Undefined => 0,
        ColorMode::AlphaMap => 1,
        ColorMode::Lerp => 2,
    }
}

pub fn filter(filter: TextureFilter) -> GLint {
    match filter {
        TextureFilter::Nearest => gl::NEAREST as GLint,
        TextureFilter::Linear | TextureFilter::Undefined => gl::LINEAR as GLint,
    }
}

pub fn address(mode: AddressMode) -> GLint {
    match mode {
        AddressMode::Wrap | AddressMode::Undefined => gl::REPEAT as GLint,
        AddressMode::Clamp => gl::CLAMP_TO_EDGE as GLint,
    }
}

pub fn primitive(op: RenderOp) -> GLenum {
    match op {
        RenderOp::TriangleList => gl::TRIANGLES,
        RenderOp::TriangleStrip => gl::TRIANGLE_STRIP,
        RenderOp::TriangleFan => gl::TRIANGLE_FAN,
        RenderOp::LineList => gl::LINES,
        RenderOp::LineStrip => gl::LINE_STRIP,
        RenderOp::PointList => gl::POINTS,
    }
}

/// Storage format for data supplied in `format`. Core profile has no
/// alpha or luminance textures, so everything but BGR layouts widens to RGBA.
pub fn storage_format(format: ImageFormat) -> ImageFormat {
    match format {
        ImageFormat::Bgra | ImageFormat::Bgrx | ImageFormat::Bgr => ImageFormat::Bgra,
        _ => ImageFormat::Rgba,
    }
}

/// Client pixel format for a storage format.
pub fn pixel_format(storage: ImageFormat) -> GLenum {
    match storage {
        ImageFormat::Bgra => gl::BGRA,
        _ => gl::RGBA,
    }
}

/// Reverse row order of a tightly packed buffer in place.
pub fn flip_rows(data: &mut [u8], row_bytes: usize) {
    if row_bytes == 0 {
        return;
    }
    let rows = data.len() / row_bytes;
    for y in 0..rows / 2 {
        let (top, bottom) = data.split_at_mut((rows - 1 - y) * row_bytes);
        top[y * row_bytes..(y + 1) * row_bytes].swap_with_slice(&mut bottom[..row_bytes]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_disables_blending() {
        assert_eq!(blend(BlendMode::Overwrite), None);
        assert_eq!(
            blend(BlendMode::Subtract),
            Some((gl::FUNC_REVERSE_SUBTRACT, gl::SRC_ALPHA, gl::ONE))
        );
    }

    #[test]
    fn every_op_has_a_primitive() {
        let mut seen: Vec<GLenum> = RenderOp::ALL.iter().map(|&op| primitive(op)).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), RenderOp::ALL.len());
    }

    #[test]
    fn storage_widens_to_four_channels() {
        assert_eq!(storage_format(ImageFormat::Alpha), ImageFormat::Rgba);
        assert_eq!(storage_format(ImageFormat::Rgb), ImageFormat::Rgba);
        assert_eq!(storage_format(ImageFormat::Bgrx), ImageFormat::Bgra);
        assert_eq!(pixel_format(ImageFormat::Bgra), gl::BGRA);
    }

    #[test]
    fn flip_rows_reverses_order() {
        let mut data = vec![1, 1, 2, 2, 3, 3];
        flip_rows(&mut data, 2);
        assert_eq!(data, vec![3, 3, 2, 2, 1, 1]);
        let mut even = vec![1, 2, 3, 4];
        flip_rows(&mut even, 2);
        assert_eq!(even, vec![3, 4, 1, 2]);
    }
}
