//! Application context.

use std::sync::Arc;
use std::time::Instant;

use ash::vk;
use trellis_gpu::{GpuContext, SurfaceContext};
use trellis_render::{
    BindlessTextures, DebugSettings, RenderConfig, Renderer, ResourceManager,
    MAX_FRAMES_IN_FLIGHT,
};
use winit::window::Window;

/// Application context shared across all app methods.
///
/// Fields drop in declaration order: the resource manager releases its buffers
/// before the GPU context destroys the device.
pub struct AppContext {
    /// Global descriptor sets and uniform buffers.
    pub resources: ResourceManager,
    /// Swapchain frame loop.
    pub renderer: Renderer,
    /// Surface context for windowed rendering.
    pub surface: SurfaceContext,
    /// GPU context with device and queues.
    pub gpu: GpuContext,
    /// The window handle.
    pub window: Arc<Window>,
    /// Debug visualization toggles.
    pub debug: DebugSettings,
    /// Time of last frame (for delta time calculation).
    pub(crate) last_frame_time: Instant,
    destroyed: bool,
}

impl AppContext {
    /// Create a new application context.
    ///
    /// # Safety
    /// The window must have valid handles.
    pub(crate) unsafe fn new(
        window: Arc<Window>,
        gpu: GpuContext,
        config: RenderConfig,
    ) -> anyhow::Result<Self> {
        // SAFETY: Caller guarantees window has valid handles
        let surface = unsafe { SurfaceContext::from_window(&gpu, window.as_ref())? };

        let size = window.inner_size();
        let extent = vk::Extent2D {
            width: size.width.max(1),
            height: size.height.max(1),
        };

        let texture_limit = config.max_textures_in_set;
        let mut renderer = match Renderer::new(&gpu, &surface, extent, config) {
            Ok(renderer) => renderer,
            Err(e) => {
                unsafe { surface.destroy() };
                return Err(e.into());
            }
        };

        let resources = match ResourceManager::new(&gpu, MAX_FRAMES_IN_FLIGHT) {
            Ok(resources) => resources.with_texture_limit(texture_limit),
            Err(e) => {
                unsafe {
                    renderer.destroy(&gpu);
                    surface.destroy();
                }
                return Err(e.into());
            }
        };

        Ok(Self {
            resources,
            renderer,
            surface,
            gpu,
            window,
            debug: DebugSettings::default(),
            last_frame_time: Instant::now(),
            destroyed: false,
        })
    }

    /// Write the global descriptor sets for `textures`.
    pub fn bind_textures(&mut self, textures: &BindlessTextures) -> anyhow::Result<()> {
        self.resources.setup_descriptors(&self.gpu, textures)?;
        Ok(())
    }

    /// Get the current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.renderer.swapchain().extent()
    }

    /// Get the aspect ratio (width / height).
    pub fn aspect_ratio(&self) -> f32 {
        self.renderer.aspect_ratio()
    }

    /// Get the number of frames in flight.
    pub fn frames_in_flight(&self) -> usize {
        self.renderer.scheduler().frames_in_flight()
    }

    /// Frames presented so far.
    pub fn frame_count(&self) -> u64 {
        self.renderer.scheduler().frames_presented()
    }

    /// Destroy the renderer and surface. Idempotent.
    ///
    /// # Safety
    /// The GPU must be idle and all resources must not be in use.
    pub(crate) unsafe fn cleanup(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        // SAFETY: Caller guarantees GPU is idle and resources are not in use
        unsafe {
            self.renderer.destroy(&self.gpu);
            self.surface.destroy();
        }
    }
}
