//! Swapchain frame loop.
//!
//! [`Renderer`] owns the swapchain generation, the frame slots and the per-image
//! semaphores, and performs the Vulkan calls [`FrameScheduler`] decides on.

use crate::config::RenderConfig;
use crate::scheduler::{FrameScheduler, MAX_FRAMES_IN_FLIGHT};
use ash::vk;
use std::sync::Arc;
use trellis_gpu::command::{begin_command_buffer, end_command_buffer, submit_command_buffer, CommandPool};
use trellis_gpu::swapchain::{calculate_extent, AcquireOutcome};
use trellis_gpu::sync::wait_for_fence;
use trellis_gpu::{
    FrameSlot, GpuContext, GpuError, ImageSemaphores, Result, SurfaceContext, Swapchain,
};

/// Drives acquire, record, submit and present for a window surface.
pub struct Renderer {
    device: Arc<ash::Device>,
    config: RenderConfig,
    command_pool: CommandPool,
    slots: Vec<FrameSlot>,
    render_finished: ImageSemaphores,
    swapchain: Swapchain,
    scheduler: FrameScheduler,
}

impl Renderer {
    /// Create the swapchain and [`MAX_FRAMES_IN_FLIGHT`] frame slots.
    pub fn new(
        gpu: &GpuContext,
        surface: &SurfaceContext,
        window_extent: vk::Extent2D,
        config: RenderConfig,
    ) -> Result<Self> {
        let device = gpu.device_handle();

        let mut swapchain =
            unsafe { Swapchain::new(gpu, surface, window_extent, config.vsync, None)? };

        let command_pool = match unsafe {
            CommandPool::new(
                &device,
                gpu.graphics_queue_family(),
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            )
        } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { swapchain.destroy(gpu) };
                return Err(e);
            }
        };

        let (slots, render_finished) = match unsafe {
            Self::create_sync_objects(&device, &command_pool, swapchain.image_count())
        } {
            Ok(objects) => objects,
            Err(e) => {
                unsafe {
                    command_pool.destroy(&device);
                    swapchain.destroy(gpu);
                }
                return Err(e);
            }
        };

        let fences = slots.iter().map(|slot| slot.in_flight).collect();
        let scheduler = FrameScheduler::new(fences, swapchain.image_count(), swapchain.extent());

        tracing::info!(
            "Renderer ready: {}x{}, {} images, {} frames in flight",
            swapchain.extent().width,
            swapchain.extent().height,
            swapchain.image_count(),
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(Self {
            device,
            config,
            command_pool,
            slots,
            render_finished,
            swapchain,
            scheduler,
        })
    }

    unsafe fn create_sync_objects(
        device: &ash::Device,
        command_pool: &CommandPool,
        image_count: usize,
    ) -> Result<(Vec<FrameSlot>, ImageSemaphores)> {
        let frames = u32::try_from(MAX_FRAMES_IN_FLIGHT)
            .map_err(|_| GpuError::InvalidState("Too many frames in flight".to_string()))?;
        let command_buffers = unsafe { command_pool.allocate_command_buffers(device, frames)? };

        let mut slots: Vec<FrameSlot> = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let release = |slots: &[FrameSlot]| {
            for slot in slots {
                unsafe { slot.destroy(device) };
            }
        };

        for command_buffer in command_buffers {
            match unsafe { FrameSlot::new(device, command_buffer) } {
                Ok(slot) => slots.push(slot),
                Err(e) => {
                    release(&slots);
                    return Err(e);
                }
            }
        }

        match unsafe { ImageSemaphores::new(device, image_count) } {
            Ok(semaphores) => Ok((slots, semaphores)),
            Err(e) => {
                release(&slots);
                Err(e)
            }
        }
    }

    /// Start a frame.
    ///
    /// Returns the slot's command buffer in the recording state, or `None` when no frame
    /// can be drawn right now (swapchain rebuilt or window minimized).
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn begin_frame(
        &mut self,
        gpu: &GpuContext,
        surface: &SurfaceContext,
    ) -> Result<Option<vk::CommandBuffer>> {
        self.scheduler.check_can_begin()?;

        if self.scheduler.needs_rebuild() && !self.recreate_swapchain(gpu, surface)? {
            return Ok(None);
        }

        let slot = &self.slots[self.scheduler.frame_index()];
        unsafe { slot.wait(&self.device)? };

        let outcome = unsafe { self.swapchain.acquire_next_image(slot.image_available)? };
        let (image_index, suboptimal) = match outcome {
            AcquireOutcome::Acquired {
                image_index,
                suboptimal,
            } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                tracing::debug!("Swapchain out of date on acquire");
                self.scheduler.on_acquire_out_of_date();
                self.recreate_swapchain(gpu, surface)?;
                return Ok(None);
            }
        };

        let plan = self.scheduler.on_acquired(image_index, suboptimal)?;
        if let Some(fence) = plan.wait_for_image {
            unsafe { wait_for_fence(&self.device, fence, u64::MAX)? };
        }

        let command_buffer = self.slots[plan.slot].command_buffer;
        unsafe {
            self.device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())?;
            begin_command_buffer(
                &self.device,
                command_buffer,
                vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            )?;
        }

        Ok(Some(command_buffer))
    }

    /// Finish the frame: submit, present and rebuild the swapchain if it went stale.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn end_frame(&mut self, gpu: &GpuContext, surface: &SurfaceContext) -> Result<()> {
        let submit = self.scheduler.prepare_submit()?;
        let slot = &self.slots[submit.slot];
        let render_finished = self.render_finished.get(submit.image_index).ok_or_else(|| {
            GpuError::InvalidFrameState(format!(
                "No render-finished semaphore for image {}",
                submit.image_index
            ))
        })?;

        unsafe {
            end_command_buffer(&self.device, slot.command_buffer)?;
            slot.reset(&self.device)?;
            submit_command_buffer(
                &self.device,
                gpu.graphics_queue(),
                slot.command_buffer,
                slot.image_available,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                render_finished,
                submit.fence,
            )?;
        }

        let status = unsafe {
            self.swapchain
                .present(gpu.present_queue(), submit.image_index, render_finished)?
        };

        if self.scheduler.on_presented(status)? {
            tracing::debug!("Rebuilding swapchain after present ({status:?})");
            self.recreate_swapchain(gpu, surface)?;
        }
        Ok(())
    }

    /// Replace the swapchain with one matching the current window extent.
    ///
    /// Returns `false` and leaves the swapchain stale while the window has no area;
    /// the next [`Self::begin_frame`] tries again.
    pub fn recreate_swapchain(&mut self, gpu: &GpuContext, surface: &SurfaceContext) -> Result<bool> {
        if self.scheduler.is_frame_in_progress() {
            return Err(GpuError::InvalidFrameState(
                "Swapchain rebuild requested while a frame is in progress".to_string(),
            ));
        }

        let window = self.scheduler.window_extent();
        let caps = surface.capabilities(gpu)?;
        let extent = calculate_extent(&caps.capabilities, window.width, window.height);
        if self.scheduler.is_minimized() || extent.width == 0 || extent.height == 0 {
            self.scheduler.mark_stale();
            tracing::trace!("Window has no drawable area; deferring swapchain rebuild");
            return Ok(false);
        }

        gpu.wait_idle()?;

        let replacement =
            unsafe { Swapchain::new(gpu, surface, window, self.config.vsync, Some(&self.swapchain))? };
        let mut retired = std::mem::replace(&mut self.swapchain, replacement);
        let previous_formats = retired.formats();
        unsafe { retired.destroy(gpu) };

        previous_formats.ensure_matches(self.swapchain.formats())?;

        let image_count = self.swapchain.image_count();
        if self
            .scheduler
            .on_rebuilt(image_count, self.swapchain.extent())?
        {
            tracing::debug!(
                "Swapchain image count changed {} -> {image_count}",
                self.render_finished.len()
            );
        }

        // A present that failed out-of-date may leave its wait semaphore signaled
        unsafe {
            self.render_finished.destroy(&self.device);
            self.render_finished = ImageSemaphores::new(&self.device, image_count)?;
        }

        tracing::info!(
            "Swapchain recreated: {}x{}",
            self.swapchain.extent().width,
            self.swapchain.extent().height
        );
        Ok(true)
    }

    /// Record the window's framebuffer size. Repeating the active size is a no-op.
    pub fn notify_resized(&mut self, width: u32, height: u32) {
        let window = vk::Extent2D { width, height };
        if self.scheduler.notify_resized(window, self.swapchain.extent()) {
            tracing::debug!("Window resized to {width}x{height}");
        }
    }

    fn render_pass_begin(
        &self,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
    ) {
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.config.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: self.config.clear_depth,
                    stencil: 0,
                },
            },
        ];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(&clear_values);

        #[allow(clippy::cast_precision_loss)]
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        unsafe {
            self.device
                .cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
            self.device.cmd_set_viewport(cmd, 0, &[viewport]);
            self.device.cmd_set_scissor(cmd, 0, &[render_area]);
        }
    }

    fn check_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<u32> {
        let image_index = self.scheduler.check_recording()?;
        if cmd != self.slots[self.scheduler.frame_index()].command_buffer {
            return Err(GpuError::InvalidFrameState(
                "Command buffer is not the current frame's".to_string(),
            ));
        }
        Ok(image_index)
    }

    /// Begin the swapchain render pass with full-extent viewport and scissor.
    pub fn begin_swapchain_render_pass(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let image_index = self.check_command_buffer(cmd)?;
        let framebuffer = self.swapchain.framebuffer(image_index).ok_or_else(|| {
            GpuError::InvalidFrameState(format!("No framebuffer for image {image_index}"))
        })?;
        self.render_pass_begin(
            cmd,
            self.swapchain.render_pass(),
            framebuffer,
            self.swapchain.extent(),
        );
        Ok(())
    }

    /// End the swapchain render pass.
    pub fn end_swapchain_render_pass(&self, cmd: vk::CommandBuffer) -> Result<()> {
        self.check_command_buffer(cmd)?;
        unsafe { self.device.cmd_end_render_pass(cmd) };
        Ok(())
    }

    /// Begin a render pass into an offscreen target, e.g. an editor viewport.
    ///
    /// The render pass must have a colour attachment followed by a depth attachment.
    pub fn begin_offscreen_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
    ) -> Result<()> {
        self.check_command_buffer(cmd)?;
        self.render_pass_begin(cmd, render_pass, framebuffer, extent);
        Ok(())
    }

    /// End an offscreen render pass.
    pub fn end_offscreen_render_pass(&self, cmd: vk::CommandBuffer) -> Result<()> {
        self.check_command_buffer(cmd)?;
        unsafe { self.device.cmd_end_render_pass(cmd) };
        Ok(())
    }

    /// Current frame slot.
    pub fn frame_index(&self) -> usize {
        self.scheduler.frame_index()
    }

    /// Command buffer of the frame being recorded.
    pub fn current_command_buffer(&self) -> Result<vk::CommandBuffer> {
        self.scheduler.check_recording()?;
        Ok(self.slots[self.scheduler.frame_index()].command_buffer)
    }

    /// Whether a frame is being recorded.
    pub fn is_frame_in_progress(&self) -> bool {
        self.scheduler.is_frame_in_progress()
    }

    /// Render pass of the swapchain framebuffers.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.swapchain.render_pass()
    }

    /// Swapchain width over height.
    pub fn aspect_ratio(&self) -> f32 {
        self.swapchain.extent_aspect_ratio()
    }

    /// Active swapchain generation.
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Number of swapchain images.
    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    /// Frame scheduling state.
    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Renderer configuration.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Release every resource. The device must be idle.
    ///
    /// # Safety
    /// No submitted work may still reference the renderer's resources.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        unsafe {
            for slot in self.slots.drain(..) {
                slot.destroy(&self.device);
            }
            self.render_finished.destroy(&self.device);
            self.command_pool.destroy(&self.device);
            self.swapchain.destroy(gpu);
        }
    }
}
