//! Render systems: per-frame hooks that update uniforms and record draws.

use crate::frame::FrameInfo;
use crate::ubo::{GlobalUbo, MAX_LIGHTS};
use trellis_gpu::Result;

/// A unit of per-frame work driven by the application.
///
/// `update` runs for every system before any `render`, while the uniform buffer
/// contents for the frame are still being assembled.
pub trait RenderSystem {
    fn name(&self) -> &str;

    /// Contribute to the frame's uniforms.
    fn update(&mut self, _frame: &FrameInfo<'_>, _ubo: &mut GlobalUbo) {}

    /// Record commands into `frame.command_buffer` inside the active render pass.
    fn render(&mut self, _device: &ash::Device, _frame: &FrameInfo<'_>) -> Result<()> {
        Ok(())
    }
}

/// Copies the scene's point lights into the uniform buffer.
#[derive(Debug, Default)]
pub struct LightSystem {
    dropped: usize,
}

impl LightSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lights left out of the last update because the buffer was full.
    pub fn dropped_lights(&self) -> usize {
        self.dropped
    }
}

impl RenderSystem for LightSystem {
    fn name(&self) -> &str {
        "lights"
    }

    fn update(&mut self, frame: &FrameInfo<'_>, ubo: &mut GlobalUbo) {
        ubo.clear_lights();
        let mut dropped = 0;
        for object in frame.scene.iter() {
            let Some(light) = object.point_light() else {
                continue;
            };
            if !ubo.push_light(object.transform.translation, light.color, light.intensity) {
                dropped += 1;
            }
        }
        if dropped > 0 && dropped != self.dropped {
            tracing::warn!("{dropped} point lights exceed the limit of {MAX_LIGHTS}");
        }
        self.dropped = dropped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera;
    use crate::debug::DebugSettings;
    use crate::scene::{PointLight, Scene};
    use crate::texture_table::{TextureLookup, TextureTable};
    use ash::vk;
    use glam::Vec3;

    fn frame<'a>(scene: &'a Scene, camera: &'a Camera, table: &'a TextureTable) -> FrameInfo<'a> {
        FrameInfo {
            frame_index: 0,
            frame_time: 0.0,
            command_buffer: vk::CommandBuffer::null(),
            camera,
            global_descriptor_set: vk::DescriptorSet::null(),
            scene,
            textures: TextureLookup::new(table, 1),
            debug: DebugSettings::default(),
        }
    }

    #[test]
    fn lights_are_copied_in_scene_order() {
        let mut scene = Scene::new();
        let red = PointLight {
            color: Vec3::X,
            intensity: 2.0,
            ..PointLight::default()
        };
        scene.spawn_point_light("red", Vec3::new(1.0, 0.0, 0.0), red);
        scene.spawn_point_light("white", Vec3::new(0.0, 3.0, 0.0), PointLight::default());

        let (camera, table) = (Camera::new(), TextureTable::new());
        let mut ubo = GlobalUbo::default();
        let mut system = LightSystem::new();
        system.update(&frame(&scene, &camera, &table), &mut ubo);

        assert_eq!(ubo.num_lights, 2);
        assert_eq!(ubo.lights()[0].color, [1.0, 0.0, 0.0, 2.0]);
        assert_eq!(ubo.lights()[1].position, [0.0, 3.0, 0.0, 1.0]);
    }

    #[test]
    fn excess_lights_are_counted() {
        let mut scene = Scene::new();
        for i in 0..(MAX_LIGHTS + 3) {
            scene.spawn_point_light(format!("l{i}"), Vec3::ZERO, PointLight::default());
        }
        let (camera, table) = (Camera::new(), TextureTable::new());
        let mut ubo = GlobalUbo::default();
        let mut system = LightSystem::new();
        system.update(&frame(&scene, &camera, &table), &mut ubo);
        assert_eq!(ubo.lights().len(), MAX_LIGHTS);
        assert_eq!(system.dropped_lights(), 3);
    }
}
