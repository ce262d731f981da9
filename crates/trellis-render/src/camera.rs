//! Camera and view management.
//!
//! Projections target Vulkan clip space: depth in `[0, 1]` and Y pointing down.

use glam::{EulerRot, Mat4, Quat, Vec3};

/// Camera for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    projection: Mat4,
    view: Mat4,
    inverse_view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            inverse_view: Mat4::IDENTITY,
        }
    }
}

fn flip_y(mut projection: Mat4) -> Mat4 {
    projection.y_axis.y = -projection.y_axis.y;
    projection
}

impl Camera {
    /// Create a camera with identity matrices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Right-handed orthographic projection.
    pub fn set_orthographic_projection(
        &mut self,
        left: f32,
        right: f32,
        top: f32,
        bottom: f32,
        near: f32,
        far: f32,
    ) {
        self.projection = flip_y(Mat4::orthographic_rh(left, right, bottom, top, near, far));
    }

    /// Right-handed perspective projection with a vertical field of view in radians.
    pub fn set_perspective_projection(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        debug_assert!(aspect.abs() > f32::EPSILON, "aspect ratio must be non-zero");
        self.projection = flip_y(Mat4::perspective_rh(fov_y, aspect, near, far));
    }

    /// Look from `position` along `direction`.
    pub fn set_view_direction(&mut self, position: Vec3, direction: Vec3, up: Vec3) {
        self.set_view(Mat4::look_to_rh(position, direction, up));
    }

    /// Look from `position` at `target`.
    pub fn set_view_target(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.set_view(Mat4::look_at_rh(position, target, up));
    }

    /// Place the camera with Euler angles applied yaw (Y), then pitch (X), then roll (Z).
    pub fn set_view_yxz(&mut self, position: Vec3, rotation: Vec3) {
        let orientation = Quat::from_euler(EulerRot::YXZ, rotation.y, rotation.x, rotation.z);
        let world = Mat4::from_rotation_translation(orientation, position);
        self.inverse_view = world;
        self.view = world.inverse();
    }

    fn set_view(&mut self, view: Mat4) {
        self.view = view;
        self.inverse_view = view.inverse();
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn inverse_view_matrix(&self) -> Mat4 {
        self.inverse_view
    }

    /// World-space camera position.
    pub fn position(&self) -> Vec3 {
        self.inverse_view.w_axis.truncate()
    }

    /// Get the view-projection matrix.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection * self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec4;

    #[test]
    fn perspective_maps_depth_to_unit_range_with_y_down() {
        let mut camera = Camera::new();
        camera.set_perspective_projection(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let proj = camera.projection_matrix();

        let near = proj * Vec4::new(0.0, 0.0, -0.1, 1.0);
        let far = proj * Vec4::new(0.0, 0.0, -100.0, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);

        // A point above the view axis lands in the upper half, which is negative Y
        let up = proj * Vec4::new(0.0, 1.0, -1.0, 1.0);
        assert!(up.y / up.w < 0.0);
    }

    #[test]
    fn orthographic_flips_y() {
        let mut camera = Camera::new();
        camera.set_orthographic_projection(-1.0, 1.0, 1.0, -1.0, 0.0, 10.0);
        let top = camera.projection_matrix() * Vec4::new(0.0, 1.0, -5.0, 1.0);
        assert_relative_eq!(top.y, -1.0, epsilon = 1e-5);
        assert_relative_eq!(top.z, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn view_yxz_inverse_round_trips() {
        let mut camera = Camera::new();
        let position = Vec3::new(1.0, -2.0, 3.0);
        camera.set_view_yxz(position, Vec3::new(0.3, 1.1, -0.2));

        let product = camera.view_matrix() * camera.inverse_view_matrix();
        for (a, b) in product
            .to_cols_array()
            .iter()
            .zip(Mat4::IDENTITY.to_cols_array().iter())
        {
            assert_relative_eq!(*a, *b, epsilon = 1e-5);
        }
        assert_relative_eq!(camera.position().x, position.x, epsilon = 1e-5);
        assert_relative_eq!(camera.position().y, position.y, epsilon = 1e-5);
        assert_relative_eq!(camera.position().z, position.z, epsilon = 1e-5);
    }

    #[test]
    fn yaw_turns_forward_toward_negative_x() {
        let mut camera = Camera::new();
        camera.set_view_yxz(Vec3::ZERO, Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0));
        // Camera-space forward (-Z) expressed in world space
        let forward = camera.inverse_view_matrix().transform_vector3(Vec3::NEG_Z);
        assert_relative_eq!(forward.x, -1.0, epsilon = 1e-5);
        assert_relative_eq!(forward.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn view_target_looks_at_target() {
        let mut camera = Camera::new();
        camera.set_view_target(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let origin = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert_relative_eq!(origin.z, -5.0, epsilon = 1e-5);
        assert_relative_eq!(origin.x, 0.0, epsilon = 1e-5);
    }
}
