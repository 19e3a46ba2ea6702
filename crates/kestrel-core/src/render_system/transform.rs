//! Modelview and projection helpers.
//!
//! Matrices are only stored here; they reach the backend on the next draw,
//! once per change.

use kestrel_types::geometry::{Mat4, Rect, Vec3};

use super::RenderSystem;

impl RenderSystem {
    fn modelview_changed(&mut self) {
        self.state.modelview_matrix_changed = true;
    }

    fn projection_changed(&mut self) {
        self.state.projection_matrix_changed = true;
    }

    pub fn modelview_matrix(&self) -> Mat4 {
        self.modelview
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn set_modelview_matrix(&mut self, matrix: Mat4) {
        self.modelview = matrix;
        self.modelview_changed();
    }

    pub fn set_projection_matrix(&mut self, matrix: Mat4) {
        self.projection = matrix;
        self.projection_changed();
    }

    pub fn set_identity_transform(&mut self) {
        self.set_modelview_matrix(Mat4::IDENTITY);
    }

    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.modelview *= Mat4::from_translation(Vec3::new(x, y, z));
        self.modelview_changed();
    }

    /// Rotate by `degrees` around `axis`. A zero axis is ignored.
    pub fn rotate(&mut self, degrees: f32, axis: Vec3) {
        let axis = axis.normalize_or_zero();
        if axis == Vec3::ZERO {
            log::warn!("ignoring rotation around a zero axis");
            return;
        }
        self.modelview *= Mat4::from_axis_angle(axis, degrees.to_radians());
        self.modelview_changed();
    }

    pub fn scale(&mut self, factor: f32) {
        self.scale_xyz(factor, factor, factor);
    }

    pub fn scale_xyz(&mut self, x: f32, y: f32, z: f32) {
        self.modelview *= Mat4::from_scale(Vec3::new(x, y, z));
        self.modelview_changed();
    }

    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        self.set_modelview_matrix(Mat4::look_at_rh(eye, target, up));
    }

    /// Perspective projection with a vertical field of view in degrees.
    pub fn set_perspective(&mut self, fov_degrees: f32, aspect: f32, near: f32, far: f32) {
        self.set_projection_matrix(Mat4::perspective_rh_gl(
            fov_degrees.to_radians(),
            aspect,
            near,
            far,
        ));
    }

    /// Orthographic projection mapping `rect` onto the target, y down.
    ///
    /// The backend's pixel offset is applied here, scaled from window
    /// pixels into `rect` units. [`ortho_projection`](Self::ortho_projection)
    /// reports `rect` unshifted.
    pub fn set_ortho_projection(&mut self, rect: Rect) {
        self.ortho = rect;
        let offset = self.backend.pixel_offset();
        let (ww, wh) = (self.window.width.max(1) as f32, self.window.height.max(1) as f32);
        let x = rect.x - offset * rect.w / ww;
        let y = rect.y - offset * rect.h / wh;
        self.set_projection_matrix(Mat4::orthographic_rh_gl(
            x,
            x + rect.w,
            y + rect.h,
            y,
            -1.0,
            1.0,
        ));
    }

    pub fn set_ortho_projection_size(&mut self, width: f32, height: f32) {
        self.set_ortho_projection(Rect::new(0.0, 0.0, width, height));
    }

    pub fn ortho_projection(&self) -> Rect {
        self.ortho
    }
}

#[cfg(test)]
mod tests {
    use kestrel_types::config::RenderConfig;
    use kestrel_types::geometry::{Rect, Vec3, Vec4};

    use crate::backend::WindowInfo;
    use crate::backend::recording::RecordingBackend;
    use crate::RenderSystem;

    fn created(offset: f32) -> RenderSystem {
        let backend = RecordingBackend::new().with_pixel_offset(offset);
        let mut rs = RenderSystem::new(Box::new(backend), RenderConfig::default());
        rs.create(&WindowInfo::new(100, 50)).unwrap();
        rs
    }

    #[test]
    fn ortho_maps_corners_to_clip_space() {
        let rs = created(0.0);
        let m = rs.projection_matrix();
        let tl = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let br = m * Vec4::new(100.0, 50.0, 0.0, 1.0);
        assert!((tl.x + 1.0).abs() < 1e-5 && (tl.y - 1.0).abs() < 1e-5);
        assert!((br.x - 1.0).abs() < 1e-5 && (br.y + 1.0).abs() < 1e-5);
    }

    #[test]
    fn pixel_offset_shifts_once() {
        let mut rs = created(0.5);
        rs.set_ortho_projection(Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_eq!(rs.ortho_projection(), Rect::new(0.0, 0.0, 100.0, 50.0));
        let p = rs.projection_matrix() * Vec4::new(-0.5, -0.5, 0.0, 1.0);
        assert!((p.x + 1.0).abs() < 1e-5, "{p:?}");
        assert!((p.y - 1.0).abs() < 1e-5, "{p:?}");
    }

    #[test]
    fn transforms_compose() {
        let mut rs = created(0.0);
        rs.set_identity_transform();
        rs.translate(10.0, 0.0, 0.0);
        rs.scale(2.0);
        let p = rs.modelview_matrix() * Vec4::new(1.0, 1.0, 0.0, 1.0);
        assert_eq!(p, Vec4::new(12.0, 2.0, 0.0, 1.0));
        let before = rs.modelview_matrix();
        rs.rotate(90.0, Vec3::ZERO);
        assert_eq!(rs.modelview_matrix(), before);
    }
}
