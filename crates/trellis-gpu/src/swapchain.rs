//! Swapchain management.
//!
//! A [`Swapchain`] owns one generation of presentable images together with everything
//! sized by them: colour views, one depth attachment per image, the render pass and
//! the framebuffers. Generations are replaced, never mutated.

use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::memory::GpuImage;
use crate::surface::SurfaceContext;
use ash::prelude::VkResult;
use ash::vk;
use gpu_allocator::MemoryLocation;

/// Depth formats in order of preference.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Colour and depth formats of a swapchain generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainFormats {
    pub color: vk::Format,
    pub depth: vk::Format,
}

impl SwapchainFormats {
    /// Fail with [`GpuError::FormatMismatch`] unless `current` equals `self`.
    ///
    /// Pipelines are built against the render pass formats, so a rebuild that changes
    /// them cannot be recovered from.
    pub fn ensure_matches(self, current: Self) -> Result<()> {
        if self == current {
            Ok(())
        } else {
            Err(GpuError::FormatMismatch {
                previous: (self.color, self.depth),
                current: (current.color, current.depth),
            })
        }
    }
}

/// Result of acquiring a swapchain image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image was acquired. `suboptimal` images are still usable this frame.
    Acquired { image_index: u32, suboptimal: bool },
    /// No image was acquired; the swapchain must be rebuilt.
    OutOfDate,
}

impl AcquireOutcome {
    /// Classify a raw acquire result. Errors other than out-of-date are fatal.
    pub fn from_result(result: VkResult<(u32, bool)>) -> Result<Self> {
        match result {
            Ok((image_index, suboptimal)) => Ok(Self::Acquired {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Self::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }
}

/// Result of presenting a swapchain image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Optimal,
    Suboptimal,
    OutOfDate,
}

impl PresentStatus {
    /// Classify a raw present result. Errors other than out-of-date are fatal.
    pub fn from_result(result: VkResult<bool>) -> Result<Self> {
        match result {
            Ok(false) => Ok(Self::Optimal),
            Ok(true) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(Self::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Self::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether the swapchain should be rebuilt before the next frame.
    pub fn needs_rebuild(self) -> bool {
        !matches!(self, Self::Optimal)
    }
}

/// One generation of presentable images and their attachments.
pub struct Swapchain {
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    depth_images: Vec<GpuImage>,
    depth_views: Vec<vk::ImageView>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    formats: SwapchainFormats,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Create a swapchain sized to `window_extent`.
    ///
    /// When `previous` is given its handle is passed as `old_swapchain`. The caller
    /// destroys `previous` once this returns successfully.
    ///
    /// # Safety
    /// The GPU context and surface must be valid.
    pub unsafe fn new(
        gpu: &GpuContext,
        surface: &SurfaceContext,
        window_extent: vk::Extent2D,
        vsync: bool,
        previous: Option<&Self>,
    ) -> Result<Self> {
        let caps = surface.capabilities(gpu)?;

        let surface_format = select_surface_format(&caps.formats).ok_or_else(|| {
            GpuError::SwapchainCreation("Surface reports no formats".to_string())
        })?;
        let present_mode = select_present_mode(&caps.present_modes, vsync);
        let extent = calculate_extent(
            &caps.capabilities,
            window_extent.width,
            window_extent.height,
        );
        if extent.width == 0 || extent.height == 0 {
            return Err(GpuError::SwapchainCreation(format!(
                "Zero-sized extent {}x{}",
                extent.width, extent.height
            )));
        }

        let depth_format = select_depth_format(&DEPTH_FORMAT_CANDIDATES, |format| {
            gpu.format_supports(
                format,
                vk::ImageTiling::OPTIMAL,
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            )
        })
        .ok_or_else(|| GpuError::SwapchainCreation("No supported depth format".to_string()))?;

        let image_count = desired_image_count(&caps.capabilities);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(previous.map_or(vk::SwapchainKHR::null(), |p| p.swapchain));

        let loader = surface.swapchain_loader.clone();
        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        let mut chain = Self {
            loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            depth_images: Vec::new(),
            depth_views: Vec::new(),
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
            formats: SwapchainFormats {
                color: surface_format.format,
                depth: depth_format,
            },
            extent,
            present_mode,
        };

        if let Err(e) = unsafe { chain.create_attachments(gpu) } {
            unsafe { chain.destroy(gpu) };
            return Err(e);
        }

        tracing::debug!(
            "Swapchain {}x{} with {} images ({:?}, {:?}, {:?})",
            extent.width,
            extent.height,
            chain.images.len(),
            chain.formats.color,
            chain.formats.depth,
            present_mode
        );

        Ok(chain)
    }

    /// Create views, depth attachments, the render pass and framebuffers.
    unsafe fn create_attachments(&mut self, gpu: &GpuContext) -> Result<()> {
        let device = gpu.device();

        self.images = unsafe { self.loader.get_swapchain_images(self.swapchain)? };

        for &image in &self.images {
            let view = unsafe {
                create_image_view(
                    device,
                    image,
                    self.formats.color,
                    vk::ImageAspectFlags::COLOR,
                )?
            };
            self.image_views.push(view);
        }

        for index in 0..self.images.len() {
            let image_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(self.formats.depth)
                .extent(vk::Extent3D {
                    width: self.extent.width,
                    height: self.extent.height,
                    depth: 1,
                })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED);

            let depth = gpu.allocator().lock().create_image(
                &image_info,
                MemoryLocation::GpuOnly,
                &format!("swapchain_depth_{index}"),
            )?;
            let depth_image = depth.image;
            self.depth_images.push(depth);

            let view = unsafe {
                create_image_view(
                    device,
                    depth_image,
                    self.formats.depth,
                    depth_aspect_mask(self.formats.depth),
                )?
            };
            self.depth_views.push(view);
        }

        self.render_pass = unsafe { create_render_pass(device, self.formats)? };

        for (&color, &depth) in self.image_views.iter().zip(&self.depth_views) {
            let attachments = [color, depth];
            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(self.render_pass)
                .attachments(&attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);
            let framebuffer = unsafe { device.create_framebuffer(&framebuffer_info, None)? };
            self.framebuffers.push(framebuffer);
        }

        Ok(())
    }

    /// Acquire the next image, signalling `semaphore` when it is ready.
    ///
    /// # Safety
    /// The semaphore must be unsignaled with no pending wait.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub unsafe fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<AcquireOutcome> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        };
        AcquireOutcome::from_result(result)
    }

    /// Present an image after `wait_semaphore` is signaled.
    ///
    /// # Safety
    /// The queue must support presentation to this swapchain's surface.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub unsafe fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<PresentStatus> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.loader.queue_present(queue, &present_info) };
        PresentStatus::from_result(result)
    }

    /// Whether `other` was built with the same colour and depth formats.
    pub fn compare_formats(&self, other: &Self) -> bool {
        self.formats == other.formats
    }

    /// Colour and depth formats.
    pub fn formats(&self) -> SwapchainFormats {
        self.formats
    }

    /// Image extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Width divided by height.
    #[allow(clippy::cast_precision_loss)]
    pub fn extent_aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height as f32
    }

    /// Number of presentable images.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Present mode in use.
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Render pass targeting the swapchain images.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Framebuffer for an image.
    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }

    /// Colour view for an image.
    pub fn image_view(&self, image_index: u32) -> Option<vk::ImageView> {
        self.image_views.get(image_index as usize).copied()
    }

    /// Raw swapchain handle.
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Destroy every resource of this generation.
    ///
    /// # Safety
    /// No submitted work may still reference the swapchain's images.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        let device = gpu.device();
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                device.destroy_framebuffer(framebuffer, None);
            }
            device.destroy_render_pass(self.render_pass, None);
            self.render_pass = vk::RenderPass::null();

            for view in self.depth_views.drain(..) {
                device.destroy_image_view(view, None);
            }
        }

        {
            let mut allocator = gpu.allocator().lock();
            for mut depth in self.depth_images.drain(..) {
                if let Err(e) = allocator.free_image(&mut depth) {
                    tracing::warn!("Failed to free swapchain depth image: {e}");
                }
            }
        }

        unsafe {
            for view in self.image_views.drain(..) {
                device.destroy_image_view(view, None);
            }
            self.images.clear();

            self.loader.destroy_swapchain(self.swapchain, None);
        }
        self.swapchain = vk::SwapchainKHR::null();
    }
}

/// Create a 2D single-mip view.
unsafe fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> Result<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping::default())
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect_mask)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );

    Ok(unsafe { device.create_image_view(&view_info, None)? })
}

/// Colour + depth render pass that leaves the colour image ready to present.
unsafe fn create_render_pass(
    device: &ash::Device,
    formats: SwapchainFormats,
) -> Result<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription::default()
            .format(formats.color)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
        vk::AttachmentDescription::default()
            .format(formats.depth)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
    ];

    let color_ref = [vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
    let depth_ref = vk::AttachmentReference::default()
        .attachment(1)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_ref)
        .depth_stencil_attachment(&depth_ref)];

    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(stages)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(stages)
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        )];

    let render_pass_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    Ok(unsafe { device.create_render_pass(&render_pass_info, None)? })
}

/// Select the best surface format, or `None` when the surface reports none.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_SRGB
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| available.first())
        .copied()
}

/// Select the best present mode.
pub fn select_present_mode(available: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| available.contains(mode))
        // FIFO is always supported
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Calculate swapchain extent.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired_width: u32,
    desired_height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width == u32::MAX {
        vk::Extent2D {
            width: desired_width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: desired_height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    } else {
        capabilities.current_extent
    }
}

/// One more image than the minimum, capped by the surface maximum (0 = unbounded).
pub fn desired_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// First candidate the device supports as an optimal-tiling depth attachment.
pub fn select_depth_format(
    candidates: &[vk::Format],
    supports: impl Fn(vk::Format) -> bool,
) -> Option<vk::Format> {
    candidates.iter().copied().find(|&format| supports(format))
}

/// Aspect mask for viewing a depth format as an attachment.
pub fn depth_aspect_mask(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::DEPTH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn surface_format_prefers_srgb() {
        let available = [
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = select_surface_format(&available).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn surface_format_falls_back_to_first() {
        let available = [
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = select_surface_format(&available).unwrap();
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
        assert!(select_surface_format(&[]).is_none());
    }

    #[test]
    fn present_mode_selection() {
        let all = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
        ];
        assert_eq!(select_present_mode(&all, true), vk::PresentModeKHR::FIFO);
        assert_eq!(select_present_mode(&all, false), vk::PresentModeKHR::MAILBOX);
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE], false),
            vk::PresentModeKHR::IMMEDIATE
        );
        assert_eq!(
            select_present_mode(&[vk::PresentModeKHR::FIFO], false),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn extent_uses_surface_extent_when_fixed() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            ..Default::default()
        };
        assert_eq!(
            calculate_extent(&caps, 1920, 1080),
            vk::Extent2D {
                width: 800,
                height: 600
            }
        );
    }

    #[test]
    fn extent_clamps_window_size_when_surface_defers() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 1024,
                height: 1024,
            },
            ..Default::default()
        };
        assert_eq!(
            calculate_extent(&caps, 1920, 600),
            vk::Extent2D {
                width: 1024,
                height: 600
            }
        );
    }

    #[test]
    fn image_count_respects_surface_limits() {
        let unbounded = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(desired_image_count(&unbounded), 3);

        let capped = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(desired_image_count(&capped), 3);
    }

    #[test]
    fn depth_format_takes_first_supported() {
        let chosen = select_depth_format(&DEPTH_FORMAT_CANDIDATES, |f| {
            f != vk::Format::D32_SFLOAT
        });
        assert_eq!(chosen, Some(vk::Format::D32_SFLOAT_S8_UINT));
        assert_eq!(select_depth_format(&DEPTH_FORMAT_CANDIDATES, |_| false), None);
    }

    #[test]
    fn stencil_formats_view_both_aspects() {
        assert_eq!(
            depth_aspect_mask(vk::Format::D32_SFLOAT),
            vk::ImageAspectFlags::DEPTH
        );
        assert!(depth_aspect_mask(vk::Format::D24_UNORM_S8_UINT)
            .contains(vk::ImageAspectFlags::STENCIL));
    }

    #[test]
    fn acquire_out_of_date_is_not_an_error() {
        assert_eq!(
            AcquireOutcome::from_result(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            AcquireOutcome::OutOfDate
        );
        assert_eq!(
            AcquireOutcome::from_result(Ok((2, true))).unwrap(),
            AcquireOutcome::Acquired {
                image_index: 2,
                suboptimal: true
            }
        );
        assert!(AcquireOutcome::from_result(Err(vk::Result::ERROR_DEVICE_LOST)).is_err());
    }

    #[test]
    fn present_status_classification() {
        assert_eq!(
            PresentStatus::from_result(Ok(false)).unwrap(),
            PresentStatus::Optimal
        );
        assert_eq!(
            PresentStatus::from_result(Ok(true)).unwrap(),
            PresentStatus::Suboptimal
        );
        let out_of_date =
            PresentStatus::from_result(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap();
        assert!(out_of_date.needs_rebuild());
        assert!(!PresentStatus::Optimal.needs_rebuild());
        assert!(PresentStatus::from_result(Err(vk::Result::ERROR_SURFACE_LOST_KHR)).is_err());
    }

    #[test]
    fn format_change_across_rebuild_is_fatal() {
        let previous = SwapchainFormats {
            color: vk::Format::B8G8R8A8_SRGB,
            depth: vk::Format::D32_SFLOAT,
        };
        assert!(previous.ensure_matches(previous).is_ok());

        let changed = SwapchainFormats {
            depth: vk::Format::D24_UNORM_S8_UINT,
            ..previous
        };
        let err = previous.ensure_matches(changed).unwrap_err();
        assert!(matches!(err, GpuError::FormatMismatch { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn rebuild_on_same_surface_keeps_formats() {
        let available = [
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let supports = |f: vk::Format| f != vk::Format::D32_SFLOAT;

        let select = || SwapchainFormats {
            color: select_surface_format(&available).unwrap().format,
            depth: select_depth_format(&DEPTH_FORMAT_CANDIDATES, supports).unwrap(),
        };
        let first = select();
        let second = select();

        assert_eq!(first, second);
        assert_eq!(first.color, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(first.depth, vk::Format::D32_SFLOAT_S8_UINT);
        assert!(first.ensure_matches(second).is_ok());
    }
}
