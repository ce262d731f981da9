//! Global uniform buffer layout (std140).

use crate::camera::Camera;
use glam::{Vec3, Vec4};

/// Point lights the uniform buffer can hold.
pub const MAX_LIGHTS: usize = 10;

/// One point light as the shader sees it.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightUniform {
    /// World position, w unused.
    pub position: [f32; 4],
    /// RGB colour, w is intensity.
    pub color: [f32; 4],
}

/// Per-frame data bound at binding 0 of the global set.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobalUbo {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub inverse_view: [[f32; 4]; 4],
    /// RGB ambient colour, w is intensity.
    pub ambient_light_color: [f32; 4],
    pub point_lights: [PointLightUniform; MAX_LIGHTS],
    pub num_lights: i32,
    _pad: [i32; 3],
}

impl Default for GlobalUbo {
    fn default() -> Self {
        Self {
            projection: glam::Mat4::IDENTITY.to_cols_array_2d(),
            view: glam::Mat4::IDENTITY.to_cols_array_2d(),
            inverse_view: glam::Mat4::IDENTITY.to_cols_array_2d(),
            ambient_light_color: [1.0, 1.0, 1.0, 0.02],
            point_lights: [PointLightUniform::default(); MAX_LIGHTS],
            num_lights: 0,
            _pad: [0; 3],
        }
    }
}

impl GlobalUbo {
    /// Uniforms for `camera` with no lights.
    pub fn from_camera(camera: &Camera) -> Self {
        let mut ubo = Self::default();
        ubo.set_camera(camera);
        ubo
    }

    pub fn set_camera(&mut self, camera: &Camera) {
        self.projection = camera.projection_matrix().to_cols_array_2d();
        self.view = camera.view_matrix().to_cols_array_2d();
        self.inverse_view = camera.inverse_view_matrix().to_cols_array_2d();
    }

    /// Remove every light.
    pub fn clear_lights(&mut self) {
        self.point_lights = [PointLightUniform::default(); MAX_LIGHTS];
        self.num_lights = 0;
    }

    /// Append a light; returns false once [`MAX_LIGHTS`] are stored.
    pub fn push_light(&mut self, position: Vec3, color: Vec3, intensity: f32) -> bool {
        let Ok(index) = usize::try_from(self.num_lights) else {
            return false;
        };
        let Some(slot) = self.point_lights.get_mut(index) else {
            return false;
        };
        *slot = PointLightUniform {
            position: position.extend(1.0).to_array(),
            color: Vec4::new(color.x, color.y, color.z, intensity).to_array(),
        };
        self.num_lights += 1;
        true
    }

    /// Stored lights.
    pub fn lights(&self) -> &[PointLightUniform] {
        let count = usize::try_from(self.num_lights).unwrap_or(0).min(MAX_LIGHTS);
        &self.point_lights[..count]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    fn std140_offsets() {
        assert_eq!(offset_of!(GlobalUbo, projection), 0);
        assert_eq!(offset_of!(GlobalUbo, view), 64);
        assert_eq!(offset_of!(GlobalUbo, inverse_view), 128);
        assert_eq!(offset_of!(GlobalUbo, ambient_light_color), 192);
        assert_eq!(offset_of!(GlobalUbo, point_lights), 208);
        assert_eq!(size_of::<PointLightUniform>(), 32);
        assert_eq!(offset_of!(GlobalUbo, num_lights), 528);
        assert_eq!(size_of::<GlobalUbo>(), 544);
    }

    #[test]
    fn lights_stop_at_capacity() {
        let mut ubo = GlobalUbo::default();
        for i in 0..MAX_LIGHTS {
            assert!(ubo.push_light(Vec3::splat(i as f32), Vec3::ONE, 0.5));
        }
        assert!(!ubo.push_light(Vec3::ZERO, Vec3::ONE, 1.0));
        assert_eq!(ubo.lights().len(), MAX_LIGHTS);
        assert_eq!(ubo.lights()[3].position, [3.0, 3.0, 3.0, 1.0]);
        assert_eq!(ubo.lights()[3].color[3], 0.5);

        ubo.clear_lights();
        assert!(ubo.lights().is_empty());
    }

    #[test]
    fn camera_matrices_are_copied() {
        let mut camera = Camera::new();
        camera.set_view_target(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y);
        let ubo = GlobalUbo::from_camera(&camera);
        assert_eq!(ubo.view, camera.view_matrix().to_cols_array_2d());
        assert_eq!(ubo.num_lights, 0);
    }
}
