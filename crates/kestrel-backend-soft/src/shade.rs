//! Per-fragment color combination and framebuffer blending.

use kestrel_types::color::Color;
use kestrel_types::state::{BlendMode, ColorMode};

/// `a * b / 255`, rounded.
fn modulate(a: u8, b: u8) -> u8 {
    ((a as u32 * b as u32 + 127) / 255) as u8
}

/// `(s * a + d * (255 - a)) / 255`, rounded.
fn mix(s: u8, d: u8, a: u8) -> u8 {
    let a = a as u32;
    ((s as u32 * a + d as u32 * (255 - a) + 127) / 255) as u8
}

/// Combine a texel with the interpolated diffuse color.
pub fn combine(mode: ColorMode, factor: f32, texel: Color, diffuse: Color) -> Color {
    match mode {
        ColorMode::AlphaMap => diffuse.with_alpha(modulate(texel.a, diffuse.a)),
        ColorMode::Lerp => {
            let t = (factor.clamp(0.0, 1.0) * 255.0).round() as u8;
            Color::rgba(
                mix(diffuse.r, texel.r, t),
                mix(diffuse.g, texel.g, t),
                mix(diffuse.b, texel.b, t),
                modulate(texel.a, diffuse.a),
            )
        }
        ColorMode::Multiply | ColorMode::Undefined => Color::rgba(
            modulate(texel.r, diffuse.r),
            modulate(texel.g, diffuse.g),
            modulate(texel.b, diffuse.b),
            modulate(texel.a, diffuse.a),
        ),
    }
}

/// Blend a shaded fragment onto the destination pixel.
///
/// Alpha goes through the same factor pair as the color channels.
pub fn blend(mode: BlendMode, src: Color, dst: Color) -> Color {
    let a = src.a;
    match mode {
        BlendMode::Overwrite => src,
        BlendMode::Add => Color::rgba(
            dst.r.saturating_add(modulate(src.r, a)),
            dst.g.saturating_add(modulate(src.g, a)),
            dst.b.saturating_add(modulate(src.b, a)),
            dst.a.saturating_add(modulate(a, a)),
        ),
        BlendMode::Subtract => Color::rgba(
            dst.r.saturating_sub(modulate(src.r, a)),
            dst.g.saturating_sub(modulate(src.g, a)),
            dst.b.saturating_sub(modulate(src.b, a)),
            dst.a.saturating_sub(modulate(a, a)),
        ),
        BlendMode::Alpha | BlendMode::Undefined => Color::rgba(
            mix(src.r, dst.r, a),
            mix(src.g, dst.g, a),
            mix(src.b, dst.b, a),
            modulate(a, a).saturating_add(modulate(dst.a, 255 - a)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HALF_RED: Color = Color::rgba(255, 0, 0, 128);

    #[test]
    fn multiply_modulates_every_channel() {
        let out = combine(ColorMode::Multiply, 1.0, Color::rgba(200, 100, 50, 255), HALF_RED);
        assert_eq!(out, Color::rgba(200, 0, 0, 128));
        let white = combine(ColorMode::Multiply, 1.0, Color::rgba(1, 2, 3, 4), Color::WHITE);
        assert_eq!(white, Color::rgba(1, 2, 3, 4));
    }

    #[test]
    fn alpha_map_keeps_diffuse_rgb() {
        let out = combine(ColorMode::AlphaMap, 1.0, Color::rgba(0, 0, 0, 255), HALF_RED);
        assert_eq!(out, HALF_RED);
        let clear = combine(ColorMode::AlphaMap, 1.0, Color::CLEAR, Color::WHITE);
        assert_eq!(clear.a, 0);
    }

    #[test]
    fn lerp_ends() {
        let texel = Color::rgb(0, 0, 255);
        let diffuse = Color::rgb(255, 0, 0);
        assert_eq!(combine(ColorMode::Lerp, 0.0, texel, diffuse), texel);
        assert_eq!(combine(ColorMode::Lerp, 1.0, texel, diffuse), diffuse);
        let mid = combine(ColorMode::Lerp, 0.5, texel, diffuse);
        assert_eq!(mid, Color::rgb(128, 0, 127));
    }

    #[test]
    fn alpha_blend_over_black() {
        let out = blend(BlendMode::Alpha, HALF_RED, Color::BLACK);
        assert_eq!(out, Color::rgba(128, 0, 0, 191));
        assert_eq!(blend(BlendMode::Alpha, Color::CLEAR, Color::BLUE), Color::BLUE);
    }

    #[test]
    fn alpha_channel_scales_by_source_alpha() {
        // SRC_ALPHA, ONE_MINUS_SRC_ALPHA applied to alpha itself.
        let out = blend(BlendMode::Alpha, HALF_RED, Color::CLEAR);
        assert_eq!(out.a, 64);
        let out = blend(BlendMode::Alpha, Color::rgba(0, 0, 0, 51), Color::rgba(0, 0, 0, 100));
        assert_eq!(out.a, 10 + 80);
    }

    #[test]
    fn add_and_subtract_saturate() {
        let grey = Color::rgb(200, 200, 200);
        assert_eq!(blend(BlendMode::Add, grey, grey), Color::rgb(255, 255, 255));
        assert_eq!(blend(BlendMode::Subtract, Color::WHITE, grey), Color::rgba(0, 0, 0, 0));
        assert_eq!(
            blend(BlendMode::Subtract, Color::rgb(50, 0, 0), grey),
            Color::rgba(150, 200, 200, 0)
        );
        let faint = Color::rgba(0, 0, 0, 51);
        assert_eq!(blend(BlendMode::Subtract, faint, grey).a, 245);
    }

    #[test]
    fn overwrite_ignores_destination() {
        assert_eq!(blend(BlendMode::Overwrite, HALF_RED, Color::WHITE), HALF_RED);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn color() -> impl Strategy<Value = Color> {
            any::<[u8; 4]>().prop_map(|[r, g, b, a]| Color::rgba(r, g, b, a))
        }

        proptest! {
            #[test]
            fn opaque_alpha_blend_is_source(src in color(), dst in color()) {
                let src = src.with_alpha(255);
                prop_assert_eq!(blend(BlendMode::Alpha, src, dst), src);
            }

            #[test]
            fn multiply_never_brightens(t in color(), d in color()) {
                let out = combine(ColorMode::Multiply, 1.0, t, d);
                prop_assert!(out.r <= t.r && out.g <= t.g && out.b <= t.b && out.a <= t.a);
            }
        }
    }
}
