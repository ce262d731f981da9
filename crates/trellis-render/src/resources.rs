//! Global descriptor set: per-frame uniform buffer plus the bindless texture array.
//!
//! Binding 0 is a uniform buffer, binding 1 a partially bound, variable-count array of
//! combined image samplers. Each frame slot gets its own set and uniform buffer so the
//! CPU never writes memory the GPU may still read.

use crate::texture_table::TextureTable;
use crate::ubo::GlobalUbo;
use ash::vk;
use gpu_allocator::MemoryLocation;
use parking_lot::Mutex;
use std::fmt::Display;
use std::sync::Arc;
use trellis_gpu::texture::rgba8_len;
use trellis_gpu::{
    DescriptorPool, DescriptorPoolBuilder, DescriptorSetLayout, DescriptorSetLayoutBuilder,
    DescriptorWriter, GpuAllocator, GpuBuffer, GpuContext, GpuError, Result, Texture,
};

/// Declared capacity of the texture array.
pub const MAX_BINDLESS_TEXTURES: u32 = 64;
/// Default number of textures written per set, fallback included.
pub const MAX_TEXTURES_IN_SET: u32 = 20;
pub const UBO_BINDING: u32 = 0;
pub const TEXTURE_BINDING: u32 = 1;

/// Colour of the 1x1 fallback texture.
pub const FALLBACK_COLOR: [u8; 4] = [255, 255, 255, 255];

/// Decoded RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Decodes texture files. Implemented by the application.
pub trait TextureLoader {
    type Error: Display;

    fn load(&mut self, path: &str) -> std::result::Result<TextureData, Self::Error>;
}

/// Uploaded textures in table slot order.
pub struct BindlessTextures {
    table: TextureTable,
    fallback: Texture,
    /// One entry per table path; `None` when it failed to load.
    textures: Vec<Option<Texture>>,
}

impl BindlessTextures {
    /// Upload the fallback and every path of `table`.
    ///
    /// Paths that fail to decode are logged and sampled as the fallback.
    pub fn load<L: TextureLoader>(gpu: &GpuContext, table: TextureTable, loader: &mut L) -> Result<Self> {
        let fallback = Texture::from_color(gpu, FALLBACK_COLOR, "fallback")?;

        let mut textures = Vec::with_capacity(table.paths().len());
        for path in table.paths() {
            let texture = match loader.load(path) {
                Ok(data) if rgba8_len(data.width, data.height) == Some(data.pixels.len()) => {
                    Some(Texture::from_rgba8(gpu, data.width, data.height, &data.pixels, path)?)
                }
                Ok(data) => {
                    tracing::warn!(
                        "Texture '{path}' has {} bytes for {}x{}; using fallback",
                        data.pixels.len(),
                        data.width,
                        data.height
                    );
                    None
                }
                Err(e) => {
                    tracing::warn!("Failed to load texture '{path}': {e}; using fallback");
                    None
                }
            };
            textures.push(texture);
        }

        let loaded = textures.iter().filter(|t| t.is_some()).count();
        tracing::info!("Loaded {loaded}/{} textures", textures.len());

        Ok(Self {
            table,
            fallback,
            textures,
        })
    }

    pub fn table(&self) -> &TextureTable {
        &self.table
    }

    /// Slots including the fallback.
    pub fn len(&self) -> usize {
        self.textures.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn fallback_info(&self) -> vk::DescriptorImageInfo {
        self.fallback.descriptor_info()
    }

    /// Image infos for slots `0..count`.
    pub fn descriptor_infos(&self, count: usize) -> Vec<vk::DescriptorImageInfo> {
        let fallback = self.fallback_info();
        std::iter::once(fallback)
            .chain(
                self.textures
                    .iter()
                    .map(|t| t.as_ref().map_or(fallback, Texture::descriptor_info)),
            )
            .take(count.max(1))
            .collect()
    }
}

/// Textures written into one set: the table size capped by the limit and capacity.
pub fn bound_texture_count(table_len: usize, limit: u32) -> u32 {
    let table_len = u32::try_from(table_len).unwrap_or(u32::MAX);
    table_len.min(limit).min(MAX_BINDLESS_TEXTURES).max(1)
}

fn global_set_for(sets: &[vk::DescriptorSet], frame_index: usize) -> Result<vk::DescriptorSet> {
    sets.get(frame_index).copied().ok_or_else(|| {
        GpuError::ResourceNotFound(format!(
            "No global descriptor set for frame {frame_index}; call setup_descriptors first"
        ))
    })
}

/// Owns the global layout, pool, uniform buffers and one global set per frame slot.
pub struct ResourceManager {
    device: Arc<ash::Device>,
    allocator: Arc<Mutex<GpuAllocator>>,
    frames_in_flight: usize,
    texture_limit: u32,
    pool: DescriptorPool,
    layout: DescriptorSetLayout,
    uniform_buffers: Vec<GpuBuffer>,
    global_sets: Vec<vk::DescriptorSet>,
    bound_textures: u32,
}

impl ResourceManager {
    /// Create the global layout, pool and one mapped uniform buffer per frame slot.
    pub fn new(gpu: &GpuContext, frames_in_flight: usize) -> Result<Self> {
        if frames_in_flight == 0 {
            return Err(GpuError::InvalidState(
                "At least one frame in flight is required".to_string(),
            ));
        }
        let device = gpu.device_handle();

        let stage_limit = gpu.capabilities().max_per_stage_sampled_images;
        if stage_limit < MAX_BINDLESS_TEXTURES {
            return Err(GpuError::DescriptorLayout(format!(
                "Device allows {stage_limit} sampled images per stage, {MAX_BINDLESS_TEXTURES} required"
            )));
        }

        let layout = unsafe {
            DescriptorSetLayoutBuilder::new()
                .uniform_buffer(UBO_BINDING, vk::ShaderStageFlags::ALL_GRAPHICS)
                .bindless_image_array(
                    TEXTURE_BINDING,
                    vk::ShaderStageFlags::FRAGMENT,
                    MAX_BINDLESS_TEXTURES,
                )
                .build(device.clone())?
        };
        let pool = unsafe { Self::create_pool(&device, frames_in_flight)? };

        let allocator = gpu.allocator_handle();
        let mut uniform_buffers = Vec::with_capacity(frames_in_flight);
        for frame in 0..frames_in_flight {
            let created = allocator.lock().create_buffer(
                std::mem::size_of::<GlobalUbo>() as u64,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                MemoryLocation::CpuToGpu,
                &format!("global_ubo_{frame}"),
            );
            match created {
                Ok(buffer) => uniform_buffers.push(buffer),
                Err(e) => {
                    let mut allocator = allocator.lock();
                    for mut buffer in uniform_buffers {
                        if let Err(free_error) = allocator.free_buffer(&mut buffer) {
                            tracing::warn!("Failed to free uniform buffer: {free_error}");
                        }
                    }
                    return Err(e);
                }
            }
        }

        tracing::debug!(
            "Global descriptors: {frames_in_flight} frames, {MAX_BINDLESS_TEXTURES} texture capacity"
        );

        Ok(Self {
            device,
            allocator,
            frames_in_flight,
            texture_limit: MAX_TEXTURES_IN_SET,
            pool,
            layout,
            uniform_buffers,
            global_sets: Vec::new(),
            bound_textures: 0,
        })
    }

    /// Cap the textures written per set. Takes effect on the next setup.
    #[must_use]
    pub fn with_texture_limit(mut self, limit: u32) -> Self {
        self.texture_limit = limit.clamp(1, MAX_BINDLESS_TEXTURES);
        self
    }

    unsafe fn create_pool(device: &Arc<ash::Device>, frames_in_flight: usize) -> Result<DescriptorPool> {
        let frames = u32::try_from(frames_in_flight)
            .map_err(|_| GpuError::InvalidState("Too many frames in flight".to_string()))?;
        unsafe {
            DescriptorPoolBuilder::new()
                .max_sets(frames * 2)
                .pool_size(vk::DescriptorType::UNIFORM_BUFFER, frames)
                .pool_size(
                    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    MAX_BINDLESS_TEXTURES * frames,
                )
                .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
                .build(device.clone())
        }
    }

    /// Write one global set per frame slot.
    ///
    /// An exhausted pool is replaced once; if the fresh pool still cannot hold the
    /// sets, they are written with the fallback texture only. Calling this again
    /// replaces the previous sets after waiting for the device.
    pub fn setup_descriptors(&mut self, gpu: &GpuContext, textures: &BindlessTextures) -> Result<()> {
        if !self.global_sets.is_empty() {
            gpu.wait_idle()?;
            unsafe { self.pool.reset()? };
            self.global_sets.clear();
        }

        let count = bound_texture_count(textures.len(), self.texture_limit);
        if (count as usize) < textures.len() {
            tracing::warn!(
                "{} textures requested, binding the first {count}",
                textures.len()
            );
        }
        let infos = textures.descriptor_infos(count as usize);

        if let Some(sets) = unsafe { self.allocate_all(&infos)? } {
            return self.commit(sets, count);
        }

        tracing::warn!("Global descriptor pool exhausted; retrying with a fresh pool");
        self.pool = unsafe { Self::create_pool(&self.device, self.frames_in_flight)? };
        if let Some(sets) = unsafe { self.allocate_all(&infos)? } {
            return self.commit(sets, count);
        }

        tracing::warn!("Fresh descriptor pool exhausted; binding the fallback texture only");
        let fallback = [textures.fallback_info()];
        let sets = unsafe { self.allocate_all(&fallback)? }.ok_or_else(|| {
            GpuError::DescriptorWrite("Descriptor pool cannot hold the global sets".to_string())
        })?;
        self.commit(sets, 1)
    }

    fn commit(&mut self, sets: Vec<vk::DescriptorSet>, count: u32) -> Result<()> {
        self.global_sets = sets;
        self.bound_textures = count;
        tracing::info!(
            "Global descriptor sets ready: {} frames, {count} textures bound",
            self.global_sets.len()
        );
        Ok(())
    }

    /// One set per frame slot, or `None` if the pool ran out. Partial allocations are freed.
    unsafe fn allocate_all(&mut self, images: &[vk::DescriptorImageInfo]) -> Result<Option<Vec<vk::DescriptorSet>>> {
        let count = u32::try_from(images.len())
            .map_err(|_| GpuError::DescriptorWrite("Too many textures".to_string()))?;
        let mut sets = Vec::with_capacity(self.frames_in_flight);

        for buffer in &self.uniform_buffers {
            let buffer_info = vk::DescriptorBufferInfo {
                buffer: buffer.buffer,
                offset: 0,
                range: std::mem::size_of::<GlobalUbo>() as u64,
            };
            let writer = DescriptorWriter::new(&self.layout)
                .write_buffer(UBO_BINDING, buffer_info)?
                .write_images(TEXTURE_BINDING, images)?;

            match unsafe { writer.build(&mut self.pool, count)? } {
                Some(set) => sets.push(set),
                None => {
                    unsafe { self.pool.free(&sets)? };
                    return Ok(None);
                }
            }
        }
        Ok(Some(sets))
    }

    /// Copy `ubo` into the uniform buffer of `frame_index`.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn update_ubo(&self, frame_index: usize, ubo: &GlobalUbo) -> Result<()> {
        let buffer = self.uniform_buffers.get(frame_index).ok_or_else(|| {
            GpuError::ResourceNotFound(format!(
                "No uniform buffer for frame {frame_index} of {}",
                self.frames_in_flight
            ))
        })?;
        buffer.write(std::slice::from_ref(ubo))?;
        buffer.flush(&self.device)
    }

    pub fn global_set_layout(&self) -> &DescriptorSetLayout {
        &self.layout
    }

    /// Global set of a frame slot.
    pub fn global_descriptor_set(&self, frame_index: usize) -> Result<vk::DescriptorSet> {
        global_set_for(&self.global_sets, frame_index)
    }

    /// Texture slots written in every set, fallback included. Zero before setup.
    pub fn bound_texture_count(&self) -> u32 {
        self.bound_textures
    }

    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        let mut allocator = self.allocator.lock();
        for buffer in &mut self.uniform_buffers {
            if let Err(e) = allocator.free_buffer(buffer) {
                tracing::warn!("Failed to free uniform buffer: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_gpu::DescriptorSetSchema;

    fn global_schema() -> DescriptorSetSchema {
        DescriptorSetLayoutBuilder::new()
            .uniform_buffer(UBO_BINDING, vk::ShaderStageFlags::ALL_GRAPHICS)
            .bindless_image_array(TEXTURE_BINDING, vk::ShaderStageFlags::FRAGMENT, MAX_BINDLESS_TEXTURES)
            .validate()
            .unwrap()
    }

    #[test]
    fn global_set_lookup_before_setup_fails() {
        let err = global_set_for(&[], 0).unwrap_err();
        assert!(matches!(err, GpuError::ResourceNotFound(_)));

        let sets = [vk::DescriptorSet::null(); 2];
        assert!(global_set_for(&sets, 1).is_ok());
        assert!(matches!(
            global_set_for(&sets, 2),
            Err(GpuError::ResourceNotFound(_))
        ));
    }

    #[test]
    fn bound_count_is_capped() {
        assert_eq!(bound_texture_count(1, MAX_TEXTURES_IN_SET), 1);
        assert_eq!(bound_texture_count(6, MAX_TEXTURES_IN_SET), 6);
        assert_eq!(bound_texture_count(31, MAX_TEXTURES_IN_SET), 20);
        assert_eq!(bound_texture_count(500, 1000), MAX_BINDLESS_TEXTURES);
        assert_eq!(bound_texture_count(0, 0), 1);
    }

    #[test]
    fn global_schema_accepts_every_bound_count() {
        let schema = global_schema();
        for table_len in [1, 2, 20, 64, 100] {
            let count = bound_texture_count(table_len, MAX_BINDLESS_TEXTURES);
            let images = vec![vk::DescriptorImageInfo::default(); count as usize];
            let writer = DescriptorWriter::for_schema(&schema)
                .write_buffer(UBO_BINDING, vk::DescriptorBufferInfo::default())
                .unwrap()
                .write_images(TEXTURE_BINDING, &images)
                .unwrap();
            writer.validate_variable_count(count).unwrap();
        }
    }

    #[test]
    fn pool_sized_for_frames_holds_every_set() {
        let schema = global_schema();
        let frames = 2;
        let mut budget = trellis_gpu::PoolBudget::new(
            frames * 2,
            &[
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    descriptor_count: frames,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    descriptor_count: MAX_BINDLESS_TEXTURES * frames,
                },
            ],
        );
        let demand = schema.demand(MAX_BINDLESS_TEXTURES);
        assert!(budget.reserve(&demand));
        assert!(budget.reserve(&demand));
        // Uniform buffers are used up after one set per frame
        assert!(!budget.can_fit(&schema.demand(1)));
    }
}
