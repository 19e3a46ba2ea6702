//! The render system driving the software backend end to end.

use kestrel_backend_soft::SoftwareBackend;
use kestrel_core::backend::Caps;
use kestrel_core::color::Color;
use kestrel_core::config::RenderConfig;
use kestrel_core::geometry::Rect;
use kestrel_core::image::ImageFormat;
use kestrel_core::state::{BlendMode, TextureFilter, TextureType};
use kestrel_core::{RenderSystem, WindowInfo};

const W: u32 = 16;
const H: u32 = 16;

fn system(backend: SoftwareBackend) -> RenderSystem {
    let config = RenderConfig {
        async_workers: 1,
        ..RenderConfig::default()
    };
    let mut rs = RenderSystem::new(Box::new(backend), config);
    rs.create(&WindowInfo::new(W, H)).unwrap();
    rs
}

fn pixel(rs: &mut RenderSystem, x: u32, y: u32) -> Color {
    rs.take_screenshot(ImageFormat::Rgba)
        .unwrap()
        .get_pixel(x, y)
        .unwrap()
}

#[test]
fn filled_rect_lands_on_screen_pixels() {
    let mut rs = system(SoftwareBackend::new());
    rs.clear_color(Color::BLACK, false);
    rs.draw_filled_rect(Rect::new(4.0, 4.0, 8.0, 8.0), Color::RED);
    assert_eq!(pixel(&mut rs, 3, 3), Color::BLACK);
    assert_eq!(pixel(&mut rs, 4, 4), Color::RED);
    assert_eq!(pixel(&mut rs, 11, 11), Color::RED);
    assert_eq!(pixel(&mut rs, 12, 12), Color::BLACK);
}

#[test]
fn textured_rect_blends_translucent_texels() {
    let mut rs = system(SoftwareBackend::new());
    rs.clear_color(Color::BLACK, false);
    let tex = rs
        .create_texture_filled(2, 2, Color::rgba(255, 255, 255, 51), ImageFormat::Rgba, TextureType::Managed)
        .unwrap();
    rs.set_texture(Some(tex));
    rs.draw_textured_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Rect::UNIT);
    assert_eq!(pixel(&mut rs, 1, 1), Color::rgba(51, 51, 51, 214));
}

#[test]
fn additive_blend_accumulates() {
    let mut rs = system(SoftwareBackend::new());
    rs.clear_color(Color::BLACK, false);
    rs.set_blend_mode(BlendMode::Add);
    let r = Rect::new(0.0, 0.0, 2.0, 2.0);
    rs.draw_filled_rect(r, Color::rgb(100, 0, 0));
    rs.draw_filled_rect(r, Color::rgb(100, 0, 0));
    assert_eq!(pixel(&mut rs, 0, 0).r, 200);
}

#[test]
fn render_target_contents_can_be_drawn() {
    let mut rs = system(SoftwareBackend::new());
    let target = rs
        .create_texture_filled(W, H, Color::CLEAR, ImageFormat::Rgba, TextureType::RenderTarget)
        .unwrap();
    rs.set_render_target(Some(target)).unwrap();
    rs.draw_filled_rect(Rect::new(0.0, 0.0, W as f32, H as f32), Color::GREEN);
    rs.set_render_target(None).unwrap();
    assert_eq!(pixel(&mut rs, 0, 0), Color::CLEAR);
    // The CPU copy was refreshed when the target was unbound.
    assert_eq!(
        rs.texture_mut(target).unwrap().get_pixel(5, 5),
        Some(Color::GREEN)
    );

    rs.texture_mut(target)
        .unwrap()
        .set_filter(TextureFilter::Nearest);
    rs.set_texture(Some(target));
    rs.draw_textured_rect(Rect::new(0.0, 0.0, 4.0, 4.0), Rect::UNIT);
    assert_eq!(pixel(&mut rs, 2, 2), Color::GREEN);
}

#[test]
fn padded_texture_shows_only_its_image() {
    let caps = Caps {
        max_texture_size: 8192,
        npot_textures: false,
        npot_textures_limited: false,
        triangle_fans: true,
        render_targets: true,
        shaders: false,
    };
    let mut rs = system(SoftwareBackend::with_caps(caps));
    rs.clear_color(Color::BLACK, false);
    let tex = rs
        .create_texture_filled(3, 3, Color::RED, ImageFormat::Rgba, TextureType::Managed)
        .unwrap();
    assert_eq!(rs.texture(tex).unwrap().width(), 4);
    rs.texture_mut(tex).unwrap().set_filter(TextureFilter::Nearest);
    rs.set_texture(Some(tex));
    rs.draw_textured_rect(Rect::new(0.0, 0.0, 6.0, 6.0), Rect::UNIT);
    for (x, y) in [(0, 0), (5, 0), (0, 5), (5, 5)] {
        assert_eq!(pixel(&mut rs, x, y), Color::RED, "pixel ({x}, {y})");
    }
}

#[test]
fn managed_texture_survives_device_loss() {
    let backend = SoftwareBackend::new();
    let trigger = backend.loss_trigger();
    let mut rs = system(backend);
    let tex = rs
        .create_texture_filled(2, 2, Color::BLUE, ImageFormat::Rgba, TextureType::Managed)
        .unwrap();

    trigger.trigger();
    rs.present_frame().unwrap();
    assert!(!rs.texture(tex).unwrap().is_loaded());
    rs.present_frame().unwrap();
    assert!(rs.texture(tex).unwrap().is_loaded());

    rs.texture_mut(tex).unwrap().set_filter(TextureFilter::Nearest);
    rs.set_texture(Some(tex));
    rs.draw_textured_rect(Rect::new(0.0, 0.0, 2.0, 2.0), Rect::UNIT);
    assert_eq!(pixel(&mut rs, 1, 1), Color::BLUE);
}

#[test]
fn screenshot_matches_window_size() {
    let mut rs = system(SoftwareBackend::new());
    let shot = rs.take_screenshot(ImageFormat::Rgb).unwrap();
    assert_eq!((shot.width, shot.height), (W, H));
    assert_eq!(shot.data.len(), (W * H * 3) as usize);
}

#[test]
fn shader_creation_is_refused() {
    let mut rs = system(SoftwareBackend::new());
    assert!(!rs.caps().shaders);
    assert!(rs.create_pixel_shader("void main() {}").is_err());
    rs.clear_color(Color::BLACK, false);
    rs.draw_filled_rect(Rect::new(0.0, 0.0, 2.0, 2.0), Color::RED);
    assert_eq!(pixel(&mut rs, 1, 1), Color::RED);
}
