//! Draw dispatch and state reconciliation against a recording backend.

use std::cell::RefCell;
use std::rc::Rc;

use kestrel_core::backend::recording::{Recording, RecordingBackend};
use kestrel_core::color::Color;
use kestrel_core::config::RenderConfig;
use kestrel_core::geometry::{PixelRect, Rect};
use kestrel_core::image::ImageFormat;
use kestrel_core::state::{AddressMode, BlendMode, ColorMode, RenderOp, TextureFilter, TextureType};
use kestrel_core::vertex::{ColoredVertex, PlainVertex, TexturedVertex};
use kestrel_core::{Caps, RenderSystem, WindowInfo};

fn system_with(backend: RecordingBackend) -> (RenderSystem, Rc<RefCell<Recording>>) {
    let rec = backend.recording();
    let config = RenderConfig {
        async_workers: 1,
        ..RenderConfig::default()
    };
    let mut rs = RenderSystem::new(Box::new(backend), config);
    rs.create(&WindowInfo::new(64, 64)).unwrap();
    (rs, rec)
}

fn system() -> (RenderSystem, Rc<RefCell<Recording>>) {
    system_with(RecordingBackend::new())
}

fn white(rs: &mut RenderSystem, w: u32, h: u32) -> kestrel_core::TextureId {
    rs.create_texture_filled(w, h, Color::WHITE, ImageFormat::Rgba, TextureType::Managed)
        .unwrap()
}

#[test]
fn identical_draws_push_no_state_the_second_time() {
    let (mut rs, rec) = system();
    let tex = white(&mut rs, 4, 4);
    rs.set_texture(Some(tex));
    rs.set_blend_mode(BlendMode::Add);
    rs.set_color_mode(ColorMode::Lerp, 0.5);

    rs.draw_textured_rect(Rect::new(0.0, 0.0, 8.0, 8.0), Rect::UNIT);
    let after_first = rec.borrow().counts.clone();
    rs.draw_textured_rect(Rect::new(8.0, 0.0, 8.0, 8.0), Rect::UNIT);
    let after_second = rec.borrow().counts.clone();

    assert_eq!(after_second.draw, after_first.draw + 1);
    assert_eq!(after_second.state_changes(), after_first.state_changes());
    assert_eq!(after_second.set_modelview_matrix, 1);
    assert_eq!(after_second.set_projection_matrix, 1);
}

#[test]
fn changed_blend_mode_is_the_only_push() {
    let (mut rs, rec) = system();
    let v = [PlainVertex::new(0.0, 0.0, 0.0); 3];
    rs.render(RenderOp::TriangleList, &v[..]);
    rec.borrow_mut().reset_counts();

    rs.set_blend_mode(BlendMode::Subtract);
    rs.render(RenderOp::TriangleList, &v[..]);
    let r = rec.borrow();
    assert_eq!(r.counts.set_blend_mode, 1);
    assert_eq!(r.counts.state_changes(), 1);
    assert_eq!(r.blend_mode, Some(BlendMode::Subtract));
}

#[test]
fn matrices_are_pushed_once_per_change() {
    let (mut rs, rec) = system();
    let v = [PlainVertex::new(0.0, 0.0, 0.0); 3];
    rs.render(RenderOp::TriangleList, &v[..]);
    rs.translate(1.0, 2.0, 0.0);
    rs.translate(1.0, 2.0, 0.0);
    assert_eq!(rec.borrow().counts.set_modelview_matrix, 1);
    rs.render(RenderOp::TriangleList, &v[..]);
    rs.render(RenderOp::TriangleList, &v[..]);
    let r = rec.borrow();
    assert_eq!(r.counts.set_modelview_matrix, 2);
    assert_eq!(r.counts.set_projection_matrix, 1);
    assert_eq!(r.modelview, Some(rs.modelview_matrix()));
}

#[test]
fn textured_quad_is_tl_tr_bl_br() {
    let (mut rs, rec) = system();
    let tex = white(&mut rs, 4, 4);
    rs.set_texture(Some(tex));
    rs.draw_textured_rect(Rect::new(10.0, 20.0, 30.0, 40.0), Rect::new(0.0, 0.0, 0.5, 1.0));

    let r = rec.borrow();
    let draw = &r.draws[0];
    assert_eq!(draw.op, RenderOp::TriangleStrip);
    assert_eq!(
        draw.positions,
        vec![
            [10.0, 20.0, 0.0],
            [40.0, 20.0, 0.0],
            [10.0, 60.0, 0.0],
            [40.0, 60.0, 0.0]
        ]
    );
    assert_eq!(draw.uvs, vec![[0.0, 0.0], [0.5, 0.0], [0.0, 1.0], [0.5, 1.0]]);
    assert_eq!(draw.texture, rs.texture(tex).unwrap().native_id());
}

#[test]
fn padded_texture_quad_addresses_logical_image() {
    let caps = Caps {
        npot_textures: false,
        ..Caps::default()
    };
    let (mut rs, rec) = system_with(RecordingBackend::with_caps(caps));
    let tex = white(&mut rs, 3, 5);
    let t = rs.texture(tex).unwrap();
    assert_eq!((t.width(), t.height()), (4, 8));
    assert_eq!((t.effective_width(), t.effective_height()), (3, 5));

    rs.set_texture(Some(tex));
    rs.draw_textured_rect(Rect::new(0.0, 0.0, 3.0, 5.0), Rect::UNIT);
    let r = rec.borrow();
    assert_eq!(r.draws[0].uvs[3], [0.75, 0.625]);
}

#[test]
fn limited_npot_forces_clamp() {
    let caps = Caps {
        npot_textures: false,
        npot_textures_limited: true,
        ..Caps::default()
    };
    let (mut rs, rec) = system_with(RecordingBackend::with_caps(caps));
    let tex = white(&mut rs, 3, 3);
    rs.set_texture(Some(tex));
    rs.draw_textured_rect(Rect::new(0.0, 0.0, 3.0, 3.0), Rect::UNIT);
    assert_eq!(rec.borrow().texture_address_mode, Some(AddressMode::Clamp));
}

#[test]
fn binding_adopts_texture_sampling_state() {
    let (mut rs, rec) = system();
    let tex = white(&mut rs, 2, 2);
    rs.texture_mut(tex).unwrap().set_filter(TextureFilter::Nearest);
    rs.set_texture(Some(tex));
    rs.draw_textured_rect(Rect::new(0.0, 0.0, 2.0, 2.0), Rect::UNIT);
    assert_eq!(rec.borrow().texture_filter, Some(TextureFilter::Nearest));

    rs.set_texture_address_mode(AddressMode::Clamp);
    assert_eq!(rs.texture(tex).unwrap().address_mode(), AddressMode::Clamp);
}

#[test]
fn untextured_streams_unbind() {
    let (mut rs, rec) = system();
    let tex = white(&mut rs, 2, 2);
    rs.set_texture(Some(tex));
    rs.draw_textured_rect(Rect::new(0.0, 0.0, 2.0, 2.0), Rect::UNIT);
    let v = [ColoredVertex::new(0.0, 0.0, 0.0, Color::RED); 3];
    rs.render(RenderOp::TriangleList, &v[..]);
    let r = rec.borrow();
    assert_eq!(r.draws[1].texture, None);
    assert_eq!(r.bound_texture, None);
}

#[test]
fn incomplete_primitives_are_trimmed() {
    let (mut rs, rec) = system();
    let v = [PlainVertex::new(0.0, 0.0, 0.0); 7];
    rs.render(RenderOp::TriangleList, &v[..]);
    rs.render(RenderOp::LineStrip, &v[..1]);
    let r = rec.borrow();
    assert_eq!(r.draws.len(), 1);
    assert_eq!(r.draws[0].positions.len(), 6);
    assert_eq!(rs.stats().draw_calls, 1);
    assert_eq!(rs.stats().primitives, 2);
}

#[test]
fn fans_become_lists_without_native_support() {
    let caps = Caps {
        triangle_fans: false,
        ..Caps::default()
    };
    let (mut rs, rec) = system_with(RecordingBackend::with_caps(caps));
    let v: Vec<TexturedVertex> = (0..5)
        .map(|i| TexturedVertex::new(i as f32, 0.0, 0.0, 0.0, 0.0))
        .collect();
    rs.render(RenderOp::TriangleFan, &v[..]);
    let r = rec.borrow();
    assert_eq!(r.draws[0].op, RenderOp::TriangleList);
    assert_eq!(r.draws[0].positions.len(), 9);
    assert_eq!(rs.stats().primitives, 3);
}

#[test]
fn full_and_partial_clears() {
    let (mut rs, rec) = system();
    rs.clear(true, false);
    rs.clear_rect(false, Rect::new(1.0, 1.0, 4.0, 4.0), Color::RED);
    rs.clear_rect(false, Rect::new(1.0, 1.0, 0.0, 4.0), Color::RED);
    let r = rec.borrow();
    assert_eq!(r.counts.clear, 1);
    assert_eq!(r.counts.clear_rect, 1);
}

#[test]
fn render_target_binding() {
    let (mut rs, rec) = system();
    let plain = white(&mut rs, 4, 4);
    assert!(rs.set_render_target(Some(plain)).is_err());

    let target = rs
        .create_texture_filled(4, 4, Color::CLEAR, ImageFormat::Rgba, TextureType::RenderTarget)
        .unwrap();
    rs.set_render_target(Some(target)).unwrap();
    assert_eq!(rs.render_target(), Some(target));
    assert_eq!(
        rec.borrow().render_target,
        rs.texture(target).unwrap().native_id()
    );

    rs.set_render_target(None).unwrap();
    assert_eq!(rec.borrow().render_target, None);
    // Leaving the target refreshes its CPU copy from the device.
    assert!(rec.borrow().counts.read_texture >= 1);
}

#[test]
fn draws_without_device_are_skipped() {
    let backend = RecordingBackend::new();
    let rec = backend.recording();
    let mut rs = RenderSystem::new(Box::new(backend), RenderConfig::default());
    rs.draw_filled_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Color::RED);
    assert_eq!(rec.borrow().counts.draw, 0);
}

#[test]
fn outline_is_closed_line_strip() {
    let (mut rs, rec) = system();
    rs.draw_rect(Rect::new(0.0, 0.0, 2.0, 2.0), Color::GREEN);
    let r = rec.borrow();
    assert_eq!(r.draws[0].op, RenderOp::LineStrip);
    assert_eq!(r.draws[0].positions.len(), 5);
    assert_eq!(r.draws[0].positions[0], r.draws[0].positions[4]);
    assert_eq!(r.system_color, Some(Color::GREEN));
}

#[test]
fn partial_clear_rect_is_rounded_to_pixels() {
    let (mut rs, rec) = system();
    rs.clear_rect(true, Rect::new(0.4, 0.6, 2.2, 2.0), Color::BLUE);
    assert_eq!(rec.borrow().counts.clear_rect, 1);
    assert_eq!(rs.viewport(), PixelRect::full(64, 64));
}

const PIXEL_SOURCE: &str = "void main() { o_color = vec4(1.0); }";

#[test]
fn selected_shader_is_pushed_once() {
    let (mut rs, rec) = system();
    let ps = rs.create_pixel_shader(PIXEL_SOURCE).unwrap();
    let v = [PlainVertex::new(0.0, 0.0, 0.0); 3];
    rs.render(RenderOp::TriangleList, &v[..]);
    rec.borrow_mut().reset_counts();

    rs.set_pixel_shader(Some(ps));
    rs.render(RenderOp::TriangleList, &v[..]);
    rs.render(RenderOp::TriangleList, &v[..]);
    assert_eq!(rec.borrow().counts.set_pixel_shader, 1);
    assert_eq!(rec.borrow().counts.set_vertex_shader, 0);
    assert!(rec.borrow().pixel_shader.is_some());

    rs.set_pixel_shader(None);
    rs.render(RenderOp::TriangleList, &v[..]);
    let r = rec.borrow();
    assert_eq!(r.counts.set_pixel_shader, 2);
    assert_eq!(r.pixel_shader, None);
}

#[test]
fn shaders_survive_device_reset() {
    let (mut rs, rec) = system();
    let vs = rs.create_vertex_shader("void main() {}").unwrap();
    rs.set_vertex_shader(Some(vs));
    let v = [PlainVertex::new(0.0, 0.0, 0.0); 3];
    rs.render(RenderOp::TriangleList, &v[..]);
    let before = rec.borrow().vertex_shader;

    rs.reset().unwrap();
    rs.render(RenderOp::TriangleList, &v[..]);
    let r = rec.borrow();
    assert_eq!(r.live_shaders(), 1);
    assert!(r.vertex_shader.is_some());
    assert_ne!(r.vertex_shader, before);
    assert_eq!(rs.vertex_shader(), Some(vs));
}

#[test]
fn destroyed_shader_falls_back_to_builtin() {
    let (mut rs, rec) = system();
    let ps = rs.create_pixel_shader(PIXEL_SOURCE).unwrap();
    rs.set_pixel_shader(Some(ps));
    let v = [PlainVertex::new(0.0, 0.0, 0.0); 3];
    rs.render(RenderOp::TriangleList, &v[..]);
    rs.destroy_pixel_shader(ps);
    assert_eq!(rs.pixel_shader(), None);
    assert_eq!(rs.shader_count(), 0);
    let r = rec.borrow();
    assert_eq!(r.live_shaders(), 0);
    assert_eq!(r.pixel_shader, None);
}

#[test]
fn shader_compile_error_is_returned() {
    let (mut rs, _) = system();
    assert!(rs.create_vertex_shader("").is_err());
    assert_eq!(rs.shader_count(), 0);
}

#[test]
fn shaders_need_backend_support() {
    let caps = Caps {
        shaders: false,
        ..Caps::default()
    };
    let (mut rs, rec) = system_with(RecordingBackend::with_caps(caps));
    assert!(rs.create_pixel_shader(PIXEL_SOURCE).is_err());
    assert_eq!(rec.borrow().counts.create_shader, 0);
}
