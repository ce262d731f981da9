//! Frame loop and global resources for the Trellis engine.
//!
//! This crate provides:
//! - Frame pacing over a fixed ring of frames in flight
//! - Swapchain rebuilds on resize and presentation staleness
//! - The bindless global descriptor set and per-frame uniform buffers
//! - Camera, scene objects and the shader data layouts
//! - The per-frame draw contract for render systems

pub mod camera;
pub mod config;
pub mod debug;
pub mod frame;
pub mod push;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod scheduler;
pub mod system;
pub mod texture_table;
pub mod ubo;

pub use camera::Camera;
pub use config::RenderConfig;
pub use debug::{DebugMode, DebugSettings};
pub use frame::FrameInfo;
pub use push::ObjectPushConstants;
pub use renderer::Renderer;
pub use resources::{
    BindlessTextures, ResourceManager, TextureData, TextureLoader, MAX_BINDLESS_TEXTURES,
    MAX_TEXTURES_IN_SET,
};
pub use scene::{ModelMaterials, ObjectId, ObjectKind, PointLight, Scene, SceneObject, Transform};
pub use scheduler::{FrameScheduler, FrameState, SwapchainState, MAX_FRAMES_IN_FLIGHT};
pub use system::{LightSystem, RenderSystem};
pub use texture_table::{TextureLookup, TextureTable, FALLBACK_SLOT};
pub use ubo::{GlobalUbo, PointLightUniform, MAX_LIGHTS};
