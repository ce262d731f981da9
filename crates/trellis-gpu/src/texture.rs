//! Sampled 2D textures.

use crate::command::{execute_single_time_commands, CommandPool};
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::memory::{GpuAllocator, GpuImage};
use ash::vk;
use gpu_allocator::MemoryLocation;
use parking_lot::Mutex;
use std::sync::Arc;

/// Format of every texture uploaded from 8-bit RGBA pixels.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Device-local RGBA texture with its view and sampler, released on drop.
pub struct Texture {
    device: Arc<ash::Device>,
    allocator: Arc<Mutex<GpuAllocator>>,
    image: GpuImage,
    view: vk::ImageView,
    sampler: vk::Sampler,
    width: u32,
    height: u32,
}

impl Texture {
    /// A 1x1 texture of a single colour.
    pub fn from_color(gpu: &GpuContext, rgba: [u8; 4], name: &str) -> Result<Self> {
        Self::from_rgba8(gpu, 1, 1, &rgba, name)
    }

    /// Upload tightly packed RGBA8 pixels.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn from_rgba8(
        gpu: &GpuContext,
        width: u32,
        height: u32,
        pixels: &[u8],
        name: &str,
    ) -> Result<Self> {
        let expected = rgba8_len(width, height).ok_or_else(|| {
            GpuError::InvalidState(format!("Texture '{name}' has invalid size {width}x{height}"))
        })?;
        if pixels.len() != expected {
            return Err(GpuError::InvalidState(format!(
                "Texture '{name}' expects {expected} bytes, got {}",
                pixels.len()
            )));
        }

        let device = gpu.device_handle();
        let allocator = gpu.allocator_handle();

        let mut staging = allocator.lock().create_buffer(
            pixels.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
            &format!("{name}_staging"),
        )?;

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(TEXTURE_FORMAT)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = staging
            .write_bytes(0, pixels)
            .and_then(|()| staging.flush(&device))
            .and_then(|()| {
                allocator
                    .lock()
                    .create_image(&image_info, MemoryLocation::GpuOnly, name)
            });

        let upload = image.and_then(|mut image| {
            match unsafe { upload_pixels(gpu, staging.buffer, image.image, width, height) } {
                Ok(()) => Ok(image),
                Err(e) => {
                    if let Err(free_err) = allocator.lock().free_image(&mut image) {
                        tracing::warn!("Failed to free texture '{name}': {free_err}");
                    }
                    Err(e)
                }
            }
        });

        if let Err(e) = allocator.lock().free_buffer(&mut staging) {
            tracing::warn!("Failed to free staging buffer for '{name}': {e}");
        }
        let image = upload?;

        let mut texture = Self {
            device,
            allocator,
            image,
            view: vk::ImageView::null(),
            sampler: vk::Sampler::null(),
            width,
            height,
        };

        let view_info = vk::ImageViewCreateInfo::default()
            .image(texture.image.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(TEXTURE_FORMAT)
            .subresource_range(color_subresource_range());
        texture.view = unsafe { texture.device.create_image_view(&view_info, None)? };

        let caps = gpu.capabilities();
        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(caps.supports_sampler_anisotropy)
            .max_anisotropy(if caps.supports_sampler_anisotropy {
                caps.max_sampler_anisotropy
            } else {
                1.0
            })
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .compare_op(vk::CompareOp::ALWAYS)
            .min_lod(0.0)
            .max_lod(0.0);
        texture.sampler = unsafe { texture.device.create_sampler(&sampler_info, None)? };

        Ok(texture)
    }

    /// Descriptor for sampling the texture from a fragment shader.
    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo::default()
            .sampler(self.sampler)
            .image_view(self.view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
    }

    /// Texture dimensions.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Image view handle.
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Sampler handle.
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_image_view(self.view, None);
        }
        if let Err(e) = self.allocator.lock().free_image(&mut self.image) {
            tracing::warn!("Failed to free texture image: {e}");
        }
    }
}

/// Byte length of a tightly packed RGBA8 image, `None` for empty or overflowing sizes.
pub fn rgba8_len(width: u32, height: u32) -> Option<usize> {
    if width == 0 || height == 0 {
        return None;
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
}

fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(vk::ImageAspectFlags::COLOR)
        .base_mip_level(0)
        .level_count(1)
        .base_array_layer(0)
        .layer_count(1)
}

/// Copy staging memory into the image and leave it shader-readable.
unsafe fn upload_pixels(
    gpu: &GpuContext,
    staging: vk::Buffer,
    image: vk::Image,
    width: u32,
    height: u32,
) -> Result<()> {
    let device = gpu.device();
    let pool = unsafe {
        CommandPool::new(
            device,
            gpu.graphics_queue_family(),
            vk::CommandPoolCreateFlags::TRANSIENT,
        )?
    };

    let result = unsafe {
        execute_single_time_commands(device, &pool, gpu.graphics_queue(), |cmd| {
            let to_transfer = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(color_subresource_range())
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);
            device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );

            let region = vk::BufferImageCopy::default()
                .image_subresource(
                    vk::ImageSubresourceLayers::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .mip_level(0)
                        .base_array_layer(0)
                        .layer_count(1),
                )
                .image_extent(vk::Extent3D {
                    width,
                    height,
                    depth: 1,
                });
            device.cmd_copy_buffer_to_image(
                cmd,
                staging,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            let to_shader = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(color_subresource_range())
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::SHADER_READ);
            device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_shader],
            );
        })
    };

    unsafe { pool.destroy(device) };
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba8_len_rejects_empty_images() {
        assert_eq!(rgba8_len(1, 1), Some(4));
        assert_eq!(rgba8_len(16, 8), Some(512));
        assert_eq!(rgba8_len(0, 8), None);
        assert_eq!(rgba8_len(8, 0), None);
    }
}
