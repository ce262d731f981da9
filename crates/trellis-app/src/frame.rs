//! Per-frame context for rendering.

use ash::vk;

/// Context for the current frame being rendered.
///
/// The swapchain render pass is active while the application records into
/// `command_buffer`.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// Command buffer for recording rendering commands.
    pub command_buffer: vk::CommandBuffer,
    /// Frame slot; selects the uniform buffer and global descriptor set.
    pub frame_index: usize,
    /// Global descriptor set of this frame slot.
    pub global_descriptor_set: vk::DescriptorSet,
    /// Delta time since last frame in seconds.
    pub dt: f32,
    /// Frames presented so far.
    pub frame_number: u64,
}
