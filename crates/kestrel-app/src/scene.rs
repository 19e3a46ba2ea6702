//! The demo scene: one of everything the render system can draw.

use kestrel_core::color::Color;
use kestrel_core::geometry::{PixelRect, Rect};
use kestrel_core::image::ImageFormat;
use kestrel_core::state::{BlendMode, ColorMode, RenderOp, TextureFilter, TextureType};
use kestrel_core::vertex::ColoredVertex;
use kestrel_core::{RenderSystem, TextureId};

const CHECKER_SIZE: u32 = 8;
const TARGET_SIZE: u32 = 64;
const BACKGROUND: Color = Color::rgb(24, 24, 32);

pub struct Scene {
    checker: TextureId,
    target: TextureId,
}

impl Scene {
    pub fn build(rs: &mut RenderSystem) -> anyhow::Result<Self> {
        let checker = rs.create_texture_filled(
            CHECKER_SIZE,
            CHECKER_SIZE,
            Color::WHITE,
            ImageFormat::Rgba,
            TextureType::Managed,
        )?;
        if let Some(mut texture) = rs.texture_mut(checker) {
            let cell = (CHECKER_SIZE / 2) as i32;
            texture.fill_rect(PixelRect::new(0, 0, cell, cell), Color::GREY);
            texture.fill_rect(PixelRect::new(cell, cell, cell, cell), Color::GREY);
            texture.set_filter(TextureFilter::Nearest);
        }

        let target = rs.create_texture_filled(
            TARGET_SIZE,
            TARGET_SIZE,
            Color::CLEAR,
            ImageFormat::Rgba,
            TextureType::RenderTarget,
        )?;
        log::debug!("scene textures: checker {checker}, target {target}");
        Ok(Self { checker, target })
    }

    /// Draw one frame. `frame` animates the offscreen pass.
    pub fn draw(&self, rs: &mut RenderSystem, frame: u32) -> anyhow::Result<()> {
        self.draw_offscreen(rs, frame)?;

        let (w, h) = (rs.window().width as f32, rs.window().height as f32);
        rs.clear_color(BACKGROUND, rs.config().depth_buffer);

        // Checkerboard, then the same texture tinted through lerp.
        rs.set_texture(Some(self.checker));
        rs.draw_textured_rect(Rect::new(8.0, 8.0, 64.0, 64.0), Rect::UNIT);
        rs.set_color_mode(ColorMode::Lerp, 0.5);
        rs.draw_textured_rect_colored(Rect::new(80.0, 8.0, 64.0, 64.0), Rect::UNIT, Color::BLUE);
        rs.set_color_mode(ColorMode::Multiply, 1.0);

        // Offscreen result.
        rs.set_texture(Some(self.target));
        rs.draw_textured_rect(Rect::new(152.0, 8.0, 64.0, 64.0), Rect::UNIT);
        rs.set_texture(None);

        // Additive overlap, then a translucent alpha-blended bar.
        rs.set_blend_mode(BlendMode::Add);
        rs.draw_filled_rect(Rect::new(8.0, 80.0, 48.0, 48.0), Color::rgb(160, 0, 0));
        rs.draw_filled_rect(Rect::new(32.0, 104.0, 48.0, 48.0), Color::rgb(0, 160, 0));
        rs.set_blend_mode(BlendMode::Alpha);
        rs.draw_filled_rect(
            Rect::new(0.0, h - 24.0, w, 16.0),
            Color::WHITE.with_alpha(96),
        );

        // Vertex-colored triangle.
        let triangle = [
            ColoredVertex::new(120.0, 150.0, 0.0, Color::RED),
            ColoredVertex::new(170.0, 80.0, 0.0, Color::GREEN),
            ColoredVertex::new(220.0, 150.0, 0.0, Color::BLUE),
        ];
        rs.render(RenderOp::TriangleList, &triangle[..]);

        rs.draw_rect(Rect::new(1.0, 1.0, w - 2.0, h - 2.0), Color::WHITE);
        Ok(())
    }

    fn draw_offscreen(&self, rs: &mut RenderSystem, frame: u32) -> anyhow::Result<()> {
        let viewport = rs.viewport();
        let ortho = rs.ortho_projection();
        let size = TARGET_SIZE as f32;

        rs.set_render_target(Some(self.target))?;
        rs.set_viewport(PixelRect::full(TARGET_SIZE, TARGET_SIZE));
        rs.set_ortho_projection_size(size, size);
        rs.clear_color(Color::rgb(40, 40, 80), false);
        let inset = (frame % 8) as f32 * 2.0;
        rs.draw_filled_rect(
            Rect::new(inset, inset, size - 2.0 * inset, size - 2.0 * inset),
            Color::rgb(255, 200, 0),
        );

        rs.set_render_target(None)?;
        rs.set_viewport(viewport);
        rs.set_ortho_projection(ortho);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_backend_soft::SoftwareBackend;
    use kestrel_core::WindowInfo;
    use kestrel_core::config::RenderConfig;

    fn system() -> RenderSystem {
        let mut rs = RenderSystem::new(Box::new(SoftwareBackend::new()), RenderConfig::default());
        rs.create(&WindowInfo::new(240, 180)).unwrap();
        rs
    }

    #[test]
    fn scene_renders_expected_regions() {
        let mut rs = system();
        let scene = Scene::build(&mut rs).unwrap();
        scene.draw(&mut rs, 0).unwrap();
        let shot = rs.take_screenshot(ImageFormat::Rgba).unwrap();

        // Checker cells: grey top-left, white top-right.
        assert_eq!(shot.get_pixel(10, 10), Some(Color::GREY));
        assert_eq!(shot.get_pixel(60, 10), Some(Color::WHITE));
        // Red and green both added onto the background.
        assert_eq!(shot.get_pixel(40, 110), Some(Color::rgb(184, 184, 32)));
        // Offscreen pass shows through at its center.
        assert_eq!(shot.get_pixel(184, 40), Some(Color::rgb(255, 200, 0)));
        // Untouched background.
        assert_eq!(shot.get_pixel(100, 120), Some(BACKGROUND));
    }

    #[test]
    fn offscreen_pass_restores_screen_state() {
        let mut rs = system();
        let scene = Scene::build(&mut rs).unwrap();
        scene.draw(&mut rs, 3).unwrap();
        assert_eq!(rs.render_target(), None);
        assert_eq!(rs.viewport(), PixelRect::full(240, 180));
        assert_eq!(rs.ortho_projection(), Rect::new(0.0, 0.0, 240.0, 180.0));
    }
}
