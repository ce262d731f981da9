//! Per-frame draw context handed to render systems.

use crate::camera::Camera;
use crate::debug::DebugSettings;
use crate::push::ObjectPushConstants;
use crate::scene::{Scene, SceneObject};
use crate::texture_table::TextureLookup;
use ash::vk;

/// Everything a render system needs to record one frame.
#[derive(Clone, Copy)]
pub struct FrameInfo<'a> {
    /// Frame slot, selects the uniform buffer and global set.
    pub frame_index: usize,
    /// Seconds since the previous frame.
    pub frame_time: f32,
    pub command_buffer: vk::CommandBuffer,
    pub camera: &'a Camera,
    pub global_descriptor_set: vk::DescriptorSet,
    pub scene: &'a Scene,
    pub textures: TextureLookup<'a>,
    pub debug: DebugSettings,
}

impl FrameInfo<'_> {
    /// Bindless slot for a texture path, clamped to the bound range.
    pub fn texture_index(&self, path: &str) -> u32 {
        self.textures.slot(path)
    }

    /// Push constants for one submesh of a model object.
    ///
    /// Light objects and submeshes without a texture sample the fallback.
    pub fn push_constants(&self, object: &SceneObject, submesh: usize) -> ObjectPushConstants {
        let texture_index = object
            .materials()
            .map_or(0, |materials| self.textures.submesh_slot(materials, submesh));
        ObjectPushConstants::for_object(&object.transform, texture_index, self.debug.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::DebugMode;
    use crate::scene::{ModelMaterials, ObjectKind, Transform};
    use crate::texture_table::TextureTable;

    #[test]
    fn push_constants_use_bound_slots_and_debug_mode() {
        let mut scene = Scene::new();
        let id = scene.spawn(
            "barrel",
            Transform::default(),
            ObjectKind::Model(ModelMaterials::single("barrel.png")),
        );
        let table = TextureTable::from_scene(&scene);
        let camera = Camera::new();
        let mut frame = FrameInfo {
            frame_index: 1,
            frame_time: 0.016,
            command_buffer: vk::CommandBuffer::null(),
            camera: &camera,
            global_descriptor_set: vk::DescriptorSet::null(),
            scene: &scene,
            textures: TextureLookup::new(&table, 2),
            debug: DebugSettings {
                mode: DebugMode::TextureOnly,
                ..DebugSettings::default()
            },
        };

        let object = scene.get(id).unwrap();
        let push = frame.push_constants(object, 0);
        assert_eq!(push.texture_index, 1);
        assert_eq!(push.debug_mode, DebugMode::TextureOnly.as_i32());

        // Only the fallback bound
        frame.textures = TextureLookup::new(&table, 1);
        assert_eq!(frame.push_constants(object, 0).texture_index, 0);
        assert_eq!(frame.texture_index("barrel.png"), 0);
    }
}
