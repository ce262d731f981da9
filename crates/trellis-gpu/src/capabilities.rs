//! GPU capability detection.

use ash::vk;
use std::collections::HashSet;
use std::ffi::CStr;

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// Descriptor indexing support needed by the bindless texture array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DescriptorIndexingSupport {
    pub runtime_descriptor_array: bool,
    pub partially_bound: bool,
    pub variable_descriptor_count: bool,
    pub sampled_image_non_uniform_indexing: bool,
}

impl DescriptorIndexingSupport {
    /// Whether every feature the bindless binding relies on is present.
    pub fn supports_bindless(&self) -> bool {
        self.runtime_descriptor_array
            && self.partially_bound
            && self.variable_descriptor_count
            && self.sampled_image_non_uniform_indexing
    }
}

/// Detected GPU capabilities.
#[derive(Debug, Clone)]
pub struct GpuCapabilities {
    /// GPU vendor
    pub vendor: GpuVendor,
    /// Device name
    pub device_name: String,
    /// Vulkan API version
    pub api_version: u32,
    /// Driver version
    pub driver_version: u32,

    /// Bindless descriptor support
    pub descriptor_indexing: DescriptorIndexingSupport,
    /// Anisotropic filtering support
    pub supports_sampler_anisotropy: bool,
    /// Maximum sampler anisotropy
    pub max_sampler_anisotropy: f32,
    /// Maximum sampled images per stage
    pub max_per_stage_sampled_images: u32,
    /// Alignment for uniform buffer offsets
    pub min_uniform_buffer_offset_alignment: u64,
    /// Atom size for non-coherent memory flushes
    pub non_coherent_atom_size: u64,

    /// Device-local memory in MB
    pub device_local_memory_mb: u64,

    // Available extensions
    pub available_extensions: HashSet<String>,
}

impl GpuCapabilities {
    /// Query capabilities from a physical device.
    ///
    /// # Safety
    /// The instance and physical device must be valid.
    pub unsafe fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let features = unsafe { instance.get_physical_device_features(physical_device) };

        let mut indexing = vk::PhysicalDeviceDescriptorIndexingFeatures::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default().push_next(&mut indexing);
        unsafe { instance.get_physical_device_features2(physical_device, &mut features2) };

        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(physical_device)
                .unwrap_or_default()
        };

        let available_extensions: HashSet<String> = extensions
            .iter()
            .filter_map(|ext| {
                ext.extension_name_as_c_str()
                    .ok()
                    .and_then(|name| name.to_str().ok())
                    .map(String::from)
            })
            .collect();

        let vendor = GpuVendor::from_vendor_id(properties.vendor_id);
        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        let device_local_memory_mb: u64 = memory_properties
            .memory_heaps
            .iter()
            .take(memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size / (1024 * 1024))
            .sum();

        Self {
            vendor,
            device_name,
            api_version: properties.api_version,
            driver_version: properties.driver_version,

            descriptor_indexing: DescriptorIndexingSupport {
                runtime_descriptor_array: indexing.runtime_descriptor_array == vk::TRUE,
                partially_bound: indexing.descriptor_binding_partially_bound == vk::TRUE,
                variable_descriptor_count: indexing.descriptor_binding_variable_descriptor_count
                    == vk::TRUE,
                sampled_image_non_uniform_indexing: indexing
                    .shader_sampled_image_array_non_uniform_indexing
                    == vk::TRUE,
            },
            supports_sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
            max_sampler_anisotropy: properties.limits.max_sampler_anisotropy,
            max_per_stage_sampled_images: properties.limits.max_per_stage_descriptor_sampled_images,
            min_uniform_buffer_offset_alignment: properties
                .limits
                .min_uniform_buffer_offset_alignment,
            non_coherent_atom_size: properties.limits.non_coherent_atom_size,

            device_local_memory_mb,

            available_extensions,
        }
    }

    /// Check if the GPU meets minimum requirements for the engine.
    pub fn meets_requirements(&self) -> bool {
        let api_major = vk::api_version_major(self.api_version);
        let api_minor = vk::api_version_minor(self.api_version);

        if api_major < 1 || (api_major == 1 && api_minor < 2) {
            return false;
        }

        if !self
            .available_extensions
            .contains(ash::khr::swapchain::NAME.to_str().unwrap_or_default())
        {
            return false;
        }

        self.descriptor_indexing.supports_bindless()
    }

    /// Get a human-readable summary of capabilities.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}) - Vulkan {}.{}.{} - {} MB VRAM",
            self.device_name,
            self.vendor,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
            self.device_local_memory_mb,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_identification() {
        assert_eq!(GpuVendor::from_vendor_id(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_vendor_id(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_vendor_id(0x8086), GpuVendor::Intel);
        assert_eq!(GpuVendor::from_vendor_id(0x1234), GpuVendor::Other(0x1234));
    }

    #[test]
    fn bindless_requires_every_indexing_feature() {
        let full = DescriptorIndexingSupport {
            runtime_descriptor_array: true,
            partially_bound: true,
            variable_descriptor_count: true,
            sampled_image_non_uniform_indexing: true,
        };
        assert!(full.supports_bindless());

        let missing_variable = DescriptorIndexingSupport {
            variable_descriptor_count: false,
            ..full
        };
        assert!(!missing_variable.supports_bindless());
        assert!(!DescriptorIndexingSupport::default().supports_bindless());
    }
}
