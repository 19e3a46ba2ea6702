//! Snapshot of settable GPU state and the diff that pushes it to a backend.

use kestrel_types::color::Color;
use kestrel_types::state::{AddressMode, BlendMode, ColorMode, TextureFilter};

use crate::backend::{GraphicsBackend, NativeShaderId, NativeTextureId};

/// All state a draw depends on.
///
/// The render system keeps two of these: the state callers asked for and a
/// cache of what the device currently has. [`reconcile`] moves the device
/// cache toward the desired one.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub texture_id: Option<NativeTextureId>,
    pub texture_coordinates_enabled: bool,
    pub color_enabled: bool,
    pub texture_filter: TextureFilter,
    pub texture_address_mode: AddressMode,
    pub system_color: Color,
    pub blend_mode: BlendMode,
    pub color_mode: ColorMode,
    pub color_mode_factor: f32,
    pub depth_buffer: bool,
    pub depth_buffer_write: bool,
    /// `None` selects the backend's built-in shader.
    pub vertex_shader: Option<NativeShaderId>,
    pub pixel_shader: Option<NativeShaderId>,
    pub modelview_matrix_changed: bool,
    pub projection_matrix_changed: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            texture_id: None,
            texture_coordinates_enabled: false,
            color_enabled: false,
            texture_filter: TextureFilter::Undefined,
            texture_address_mode: AddressMode::Undefined,
            system_color: Color::BLACK,
            blend_mode: BlendMode::Undefined,
            color_mode: ColorMode::Undefined,
            color_mode_factor: 1.0,
            depth_buffer: false,
            depth_buffer_write: false,
            vertex_shader: None,
            pixel_shader: None,
            modelview_matrix_changed: true,
            projection_matrix_changed: true,
        }
    }
}

impl RenderState {
    /// Restore the sentinel values used before a device has been configured.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Desired state right after device creation.
    pub fn device_defaults(depth_buffer: bool) -> Self {
        Self {
            texture_id: None,
            texture_coordinates_enabled: false,
            color_enabled: false,
            texture_filter: TextureFilter::Linear,
            texture_address_mode: AddressMode::Wrap,
            system_color: Color::WHITE,
            blend_mode: BlendMode::Alpha,
            color_mode: ColorMode::Multiply,
            color_mode_factor: 1.0,
            depth_buffer,
            depth_buffer_write: depth_buffer,
            vertex_shader: None,
            pixel_shader: None,
            modelview_matrix_changed: true,
            projection_matrix_changed: true,
        }
    }
}

/// Push every field of `desired` that differs from `device` and record it in
/// `device`. With `force` every defined field is pushed.
///
/// Order is fixed: shaders, blend mode, color mode with its factor, texture
/// binding with the vertex layout, filter, address mode, depth buffer,
/// system color.
/// Matrix flags are left to the caller. Returns the number of backend calls.
pub fn reconcile(
    desired: &RenderState,
    device: &mut RenderState,
    backend: &mut dyn GraphicsBackend,
    force: bool,
) -> usize {
    let mut pushed = 0;

    if force || desired.vertex_shader != device.vertex_shader {
        backend.set_vertex_shader(desired.vertex_shader);
        device.vertex_shader = desired.vertex_shader;
        pushed += 1;
    }

    if force || desired.pixel_shader != device.pixel_shader {
        backend.set_pixel_shader(desired.pixel_shader);
        device.pixel_shader = desired.pixel_shader;
        pushed += 1;
    }

    if desired.blend_mode.is_defined() && (force || desired.blend_mode != device.blend_mode) {
        backend.set_blend_mode(desired.blend_mode);
        device.blend_mode = desired.blend_mode;
        pushed += 1;
    }

    if desired.color_mode.is_defined()
        && (force
            || desired.color_mode != device.color_mode
            || desired.color_mode_factor != device.color_mode_factor)
    {
        backend.set_color_mode(desired.color_mode, desired.color_mode_factor);
        device.color_mode = desired.color_mode;
        device.color_mode_factor = desired.color_mode_factor;
        pushed += 1;
    }

    if force || desired.texture_id != device.texture_id {
        backend.bind_texture(desired.texture_id);
        device.texture_id = desired.texture_id;
        pushed += 1;
    }

    if force
        || desired.texture_coordinates_enabled != device.texture_coordinates_enabled
        || desired.color_enabled != device.color_enabled
    {
        backend.set_vertex_layout(desired.texture_coordinates_enabled, desired.color_enabled);
        device.texture_coordinates_enabled = desired.texture_coordinates_enabled;
        device.color_enabled = desired.color_enabled;
        pushed += 1;
    }

    if desired.texture_filter.is_defined()
        && (force || desired.texture_filter != device.texture_filter)
    {
        backend.set_texture_filter(desired.texture_filter);
        device.texture_filter = desired.texture_filter;
        pushed += 1;
    }

    if desired.texture_address_mode.is_defined()
        && (force || desired.texture_address_mode != device.texture_address_mode)
    {
        backend.set_texture_address_mode(desired.texture_address_mode);
        device.texture_address_mode = desired.texture_address_mode;
        pushed += 1;
    }

    if force
        || desired.depth_buffer != device.depth_buffer
        || desired.depth_buffer_write != device.depth_buffer_write
    {
        backend.set_depth_buffer(desired.depth_buffer, desired.depth_buffer_write);
        device.depth_buffer = desired.depth_buffer;
        device.depth_buffer_write = desired.depth_buffer_write;
        pushed += 1;
    }

    if force || desired.system_color != device.system_color {
        backend.set_system_color(desired.system_color);
        device.system_color = desired.system_color;
        pushed += 1;
    }

    pushed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::RecordingBackend;

    #[test]
    fn reset_restores_sentinels() {
        let mut state = RenderState::device_defaults(true);
        state.reset();
        assert_eq!(state.blend_mode, BlendMode::Undefined);
        assert_eq!(state.color_mode, ColorMode::Undefined);
        assert_eq!(state.texture_filter, TextureFilter::Undefined);
        assert_eq!(state.texture_address_mode, AddressMode::Undefined);
        assert_eq!(state.color_mode_factor, 1.0);
        assert_eq!(state.system_color, Color::BLACK);
        assert!(!state.depth_buffer);
        assert!(state.modelview_matrix_changed);
    }

    #[test]
    fn first_reconcile_pushes_everything_defined() {
        let mut backend = RecordingBackend::new();
        let rec = backend.recording();
        let desired = RenderState::device_defaults(false);
        let mut device = RenderState::default();
        let pushed = reconcile(&desired, &mut device, &mut backend, true);
        assert_eq!(pushed, 10);
        let r = rec.borrow();
        assert_eq!(r.blend_mode, Some(BlendMode::Alpha));
        assert_eq!(r.texture_filter, Some(TextureFilter::Linear));
        assert_eq!(r.texture_address_mode, Some(AddressMode::Wrap));
        assert_eq!(device.blend_mode, BlendMode::Alpha);
    }

    #[test]
    fn identical_state_pushes_nothing() {
        let mut backend = RecordingBackend::new();
        let rec = backend.recording();
        let desired = RenderState::device_defaults(false);
        let mut device = RenderState::default();
        reconcile(&desired, &mut device, &mut backend, true);
        let before = rec.borrow().counts.state_changes();
        assert_eq!(reconcile(&desired, &mut device, &mut backend, false), 0);
        assert_eq!(rec.borrow().counts.state_changes(), before);
    }

    #[test]
    fn only_changed_field_is_pushed() {
        let mut backend = RecordingBackend::new();
        let rec = backend.recording();
        let mut desired = RenderState::device_defaults(false);
        let mut device = RenderState::default();
        reconcile(&desired, &mut device, &mut backend, true);
        rec.borrow_mut().reset_counts();

        desired.blend_mode = BlendMode::Add;
        assert_eq!(reconcile(&desired, &mut device, &mut backend, false), 1);
        let r = rec.borrow();
        assert_eq!(r.counts.set_blend_mode, 1);
        assert_eq!(r.counts.set_color_mode, 0);
        assert_eq!(r.counts.bind_texture, 0);
    }

    #[test]
    fn factor_change_alone_repushes_color_mode() {
        let mut backend = RecordingBackend::new();
        let rec = backend.recording();
        let mut desired = RenderState::device_defaults(false);
        desired.color_mode = ColorMode::Lerp;
        desired.color_mode_factor = 0.25;
        let mut device = RenderState::default();
        reconcile(&desired, &mut device, &mut backend, true);
        desired.color_mode_factor = 0.75;
        reconcile(&desired, &mut device, &mut backend, false);
        let r = rec.borrow();
        assert_eq!(r.counts.set_color_mode, 2);
        assert_eq!(r.color_mode, Some((ColorMode::Lerp, 0.75)));
    }

    #[test]
    fn undefined_desired_is_never_pushed() {
        let mut backend = RecordingBackend::new();
        let rec = backend.recording();
        let desired = RenderState::default();
        let mut device = RenderState::default();
        reconcile(&desired, &mut device, &mut backend, true);
        let r = rec.borrow();
        assert_eq!(r.counts.set_blend_mode, 0);
        assert_eq!(r.counts.set_color_mode, 0);
        assert_eq!(r.counts.set_texture_filter, 0);
        assert_eq!(r.counts.set_texture_address_mode, 0);
    }

    #[test]
    fn texture_binding_change() {
        let mut backend = RecordingBackend::new();
        let rec = backend.recording();
        let mut desired = RenderState::device_defaults(false);
        let mut device = RenderState::default();
        reconcile(&desired, &mut device, &mut backend, true);
        desired.texture_id = Some(NativeTextureId(7));
        desired.texture_coordinates_enabled = true;
        assert_eq!(reconcile(&desired, &mut device, &mut backend, false), 2);
        assert_eq!(rec.borrow().bound_texture, Some(NativeTextureId(7)));
    }

    #[test]
    fn shader_pushed_only_on_change() {
        let mut backend = RecordingBackend::new();
        let rec = backend.recording();
        let mut desired = RenderState::device_defaults(false);
        let mut device = RenderState::default();
        reconcile(&desired, &mut device, &mut backend, true);
        rec.borrow_mut().reset_counts();

        desired.pixel_shader = Some(NativeShaderId(3));
        assert_eq!(reconcile(&desired, &mut device, &mut backend, false), 1);
        assert_eq!(reconcile(&desired, &mut device, &mut backend, false), 0);
        desired.vertex_shader = Some(NativeShaderId(4));
        desired.pixel_shader = None;
        assert_eq!(reconcile(&desired, &mut device, &mut backend, false), 2);

        let r = rec.borrow();
        assert_eq!(r.counts.set_pixel_shader, 2);
        assert_eq!(r.counts.set_vertex_shader, 1);
        assert_eq!(r.vertex_shader, Some(NativeShaderId(4)));
        assert_eq!(r.pixel_shader, None);
    }
}
