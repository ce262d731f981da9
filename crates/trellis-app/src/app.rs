//! `TrellisApp` trait definition.

use crate::context::AppContext;
use crate::frame::FrameContext;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};

/// Trait for Trellis applications.
///
/// The framework creates the window, GPU context, renderer and global descriptor
/// resources, and drives the frame loop. Applications own their scene, textures and
/// render systems.
pub trait TrellisApp: Sized {
    /// Initialize the application.
    ///
    /// Called once after the GPU context and window have been created. Load textures
    /// here and bind them with [`AppContext::bind_textures`]; the first frame fails
    /// with `ResourceNotFound` otherwise.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Update application state.
    ///
    /// Called every frame before rendering.
    ///
    /// # Arguments
    /// * `ctx` - Application context with GPU and window access
    /// * `dt` - Delta time in seconds since last frame
    fn update(&mut self, ctx: &mut AppContext, dt: f32);

    /// Render a frame.
    ///
    /// Called with the swapchain render pass active. Write the frame's uniforms
    /// through `ctx.resources` and record draws into `frame.command_buffer`.
    ///
    /// The framework acquires the image, submits and presents, and rebuilds the
    /// swapchain when needed. Frames are skipped while the window is minimized.
    fn render(&mut self, ctx: &AppContext, frame: &FrameContext) -> anyhow::Result<()>;

    /// Handle window resize.
    ///
    /// The swapchain is rebuilt lazily at the start of the next frame.
    ///
    /// Default implementation does nothing.
    #[allow(unused_variables)]
    fn on_resize(&mut self, ctx: &mut AppContext, width: u32, height: u32) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handle window events.
    ///
    /// Return `true` if the event was handled and should not be processed further.
    ///
    /// Default implementation does nothing and returns `false`.
    #[allow(unused_variables)]
    fn on_event(&mut self, ctx: &mut AppContext, event: &WindowEvent) -> bool {
        false
    }

    /// Handle device events (raw input).
    ///
    /// Default implementation does nothing.
    #[allow(unused_variables)]
    fn on_device_event(&mut self, device_id: DeviceId, event: &DeviceEvent) {}

    /// Cleanup resources before shutdown.
    ///
    /// Called with the GPU idle, before the framework releases its own resources.
    ///
    /// Default implementation does nothing.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &mut AppContext) {}
}
