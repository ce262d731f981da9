//! Per-object push constants.

use crate::debug::DebugMode;
use crate::scene::Transform;
use ash::vk;
use glam::Mat4;

/// Push constant block of the textured object pipeline.
///
/// 144 bytes, above the 128 bytes every device guarantees; the pipeline layout must
/// be checked against `max_push_constants_size`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectPushConstants {
    pub model: [[f32; 4]; 4],
    /// Normal matrix widened to a mat4.
    pub normal: [[f32; 4]; 4],
    /// Bindless slot sampled by the fragment shader.
    pub texture_index: i32,
    pub debug_mode: i32,
    _pad: [i32; 2],
}

impl ObjectPushConstants {
    pub fn for_object(transform: &Transform, texture_index: u32, debug_mode: DebugMode) -> Self {
        Self {
            model: transform.matrix().to_cols_array_2d(),
            normal: Mat4::from_mat3(transform.normal_matrix()).to_cols_array_2d(),
            texture_index: i32::try_from(texture_index).unwrap_or(0),
            debug_mode: debug_mode.as_i32(),
            _pad: [0; 2],
        }
    }

    /// Range to declare in the pipeline layout.
    pub fn range() -> vk::PushConstantRange {
        vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: std::mem::size_of::<Self>() as u32,
        }
    }

    /// Whether the device accepts this block.
    pub fn fits(max_push_constants_size: u32) -> bool {
        std::mem::size_of::<Self>() as u64 <= u64::from(max_push_constants_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::mem::{offset_of, size_of};

    #[test]
    fn layout() {
        assert_eq!(offset_of!(ObjectPushConstants, normal), 64);
        assert_eq!(offset_of!(ObjectPushConstants, texture_index), 128);
        assert_eq!(offset_of!(ObjectPushConstants, debug_mode), 132);
        assert_eq!(size_of::<ObjectPushConstants>(), 144);
        assert_eq!(ObjectPushConstants::range().size, 144);
        assert!(!ObjectPushConstants::fits(128));
        assert!(ObjectPushConstants::fits(256));
    }

    #[test]
    fn for_object_fills_indices() {
        let transform = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let push = ObjectPushConstants::for_object(&transform, 4, DebugMode::ShowUvs);
        assert_eq!(push.texture_index, 4);
        assert_eq!(push.debug_mode, 2);
        assert_eq!(push.model[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(push.normal[3], [0.0, 0.0, 0.0, 1.0]);
    }
}
