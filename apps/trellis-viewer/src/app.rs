//! Viewer application: demo scene, lights and the bindless texture table.

use glam::Vec3;
use tracing::info;
use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use trellis_app::{AppContext, Camera, FrameContext, TrellisApp, WindowEvent};
use trellis_render::{
    BindlessTextures, FrameInfo, GlobalUbo, LightSystem, ModelMaterials, ObjectKind, PointLight,
    RenderSystem, Scene, TextureLookup, TextureTable, Transform,
};

use crate::loader::ImageLoader;

/// Vertical field of view in radians (50 degrees).
const FOV_Y: f32 = 0.872_664_6;
/// Camera orbit speed in radians per second.
const ORBIT_SPEED: f32 = 0.25;
/// Light rotation speed in radians per second.
const LIGHT_SPEED: f32 = 0.8;
const ORBIT_RADIUS: f32 = 6.0;
const CAMERA_HEIGHT: f32 = 2.0;

/// Viewer application state.
pub struct Viewer {
    scene: Scene,
    textures: BindlessTextures,
    camera: Camera,
    systems: Vec<Box<dyn RenderSystem>>,
    orbit_angle: f32,
    orbiting: bool,
}

#[allow(clippy::cast_precision_loss)]
fn demo_scene() -> Scene {
    let mut scene = Scene::new();

    scene.spawn(
        "floor",
        Transform {
            scale: Vec3::new(5.0, 1.0, 5.0),
            ..Transform::default()
        },
        ObjectKind::Model(ModelMaterials::single("textures/floor.png")),
    );
    scene.spawn(
        "crate",
        Transform::from_translation(Vec3::new(-1.5, 0.5, 0.0)),
        ObjectKind::Model(ModelMaterials::single("textures/crate.png")),
    );
    scene.spawn(
        "lamp post",
        Transform {
            translation: Vec3::new(1.5, 0.0, 0.5),
            rotation: Vec3::new(0.0, 0.6, 0.0),
            ..Transform::default()
        },
        ObjectKind::Model(ModelMaterials {
            texture_paths: vec!["textures/metal.png".into(), String::new()],
            submesh_materials: vec![Some(0), Some(1), None],
        }),
    );
    scene.spawn(
        "barrel",
        Transform::from_translation(Vec3::new(0.0, 0.5, -1.5)),
        ObjectKind::Model(ModelMaterials::single("textures/crate.png")),
    );

    let colors = [
        Vec3::new(1.0, 0.1, 0.1),
        Vec3::new(0.1, 1.0, 0.1),
        Vec3::new(0.1, 0.1, 1.0),
        Vec3::new(1.0, 1.0, 0.1),
        Vec3::new(0.1, 1.0, 1.0),
        Vec3::ONE,
    ];
    for (i, color) in colors.iter().enumerate() {
        let angle = i as f32 * std::f32::consts::TAU / colors.len() as f32;
        scene.spawn_point_light(
            format!("light {i}"),
            Vec3::new(angle.cos() * 2.0, 1.5, angle.sin() * 2.0),
            PointLight {
                color: *color,
                intensity: 0.6,
                radius: 0.1,
            },
        );
    }

    scene
}

impl Viewer {
    /// Rotate every light around the vertical axis.
    fn rotate_lights(&mut self, angle: f32) {
        let (sin, cos) = angle.sin_cos();
        for object in self.scene.iter_mut() {
            if object.point_light().is_none() {
                continue;
            }
            let p = object.transform.translation;
            object.transform.translation = Vec3::new(p.x * cos - p.z * sin, p.y, p.x * sin + p.z * cos);
        }
    }

    fn update_camera(&mut self, aspect: f32) {
        self.camera.set_perspective_projection(FOV_Y, aspect, 0.1, 100.0);
        let position = Vec3::new(
            self.orbit_angle.sin() * ORBIT_RADIUS,
            CAMERA_HEIGHT,
            self.orbit_angle.cos() * ORBIT_RADIUS,
        );
        self.camera.set_view_target(position, Vec3::ZERO, Vec3::Y);
    }
}

impl TrellisApp for Viewer {
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
        let scene = demo_scene();
        let table = TextureTable::from_scene(&scene);
        info!(
            "Demo scene: {} objects, {} texture slots",
            scene.len(),
            table.len()
        );

        let mut loader = ImageLoader::from_env();
        info!("Loading textures from {}", loader.root().display());
        let textures = BindlessTextures::load(&ctx.gpu, table, &mut loader)?;
        ctx.bind_textures(&textures)?;

        let mut viewer = Self {
            scene,
            textures,
            camera: Camera::new(),
            systems: vec![Box::new(LightSystem::new())],
            orbit_angle: 0.0,
            orbiting: true,
        };
        viewer.update_camera(ctx.aspect_ratio());
        Ok(viewer)
    }

    fn update(&mut self, ctx: &mut AppContext, dt: f32) {
        if self.orbiting {
            self.orbit_angle = (self.orbit_angle + ORBIT_SPEED * dt) % std::f32::consts::TAU;
        }
        self.rotate_lights(LIGHT_SPEED * dt);
        self.update_camera(ctx.aspect_ratio());
    }

    fn render(&mut self, ctx: &AppContext, frame: &FrameContext) -> anyhow::Result<()> {
        let info = FrameInfo {
            frame_index: frame.frame_index,
            frame_time: frame.dt,
            command_buffer: frame.command_buffer,
            camera: &self.camera,
            global_descriptor_set: frame.global_descriptor_set,
            scene: &self.scene,
            textures: TextureLookup::new(self.textures.table(), ctx.resources.bound_texture_count()),
            debug: ctx.debug,
        };

        let mut ubo = GlobalUbo::from_camera(&self.camera);
        for system in &mut self.systems {
            system.update(&info, &mut ubo);
        }
        ctx.resources.update_ubo(info.frame_index, &ubo)?;

        for system in &mut self.systems {
            system.render(ctx.gpu.device(), &info)?;
        }
        Ok(())
    }

    fn on_event(&mut self, ctx: &mut AppContext, event: &WindowEvent) -> bool {
        let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(code),
                    state: ElementState::Pressed,
                    repeat: false,
                    ..
                },
            ..
        } = event
        else {
            return false;
        };

        match code {
            KeyCode::F3 => ctx.debug.cycle_mode(),
            KeyCode::F2 => {
                ctx.debug.wireframe = !ctx.debug.wireframe;
                info!("Wireframe: {}", ctx.debug.wireframe);
            }
            KeyCode::Space => self.orbiting = !self.orbiting,
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_scene_shares_textures() {
        let scene = demo_scene();
        let table = TextureTable::from_scene(&scene);
        assert_eq!(
            table.paths(),
            ["textures/floor.png", "textures/crate.png", "textures/metal.png"]
        );
        assert_eq!(scene.iter().filter(|o| o.point_light().is_some()).count(), 6);
    }
}
