//! Vulkan abstraction layer for the Trellis engine.
//!
//! This crate provides:
//! - Vulkan instance and device management
//! - GPU capability detection
//! - Memory allocation via gpu-allocator
//! - Swapchain generations with depth attachments and render pass
//! - Validated descriptor set layouts, pools and writers
//! - Sampled textures

pub mod capabilities;
pub mod command;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod instance;
pub mod memory;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod texture;

pub use capabilities::{DescriptorIndexingSupport, GpuCapabilities, GpuVendor};
pub use context::{GpuContext, GpuContextBuilder};
pub use descriptors::{
    BindingSpec, DescriptorPool, DescriptorPoolBuilder, DescriptorSetLayout,
    DescriptorSetLayoutBuilder, DescriptorSetSchema, DescriptorWriter, PoolBudget,
};
pub use error::{GpuError, Result};
pub use memory::{GpuAllocator, GpuBuffer, GpuImage};
pub use surface::{SurfaceCapabilities, SurfaceContext};
pub use swapchain::{AcquireOutcome, PresentStatus, Swapchain, SwapchainFormats};
pub use sync::{create_fence, create_semaphore, FrameSlot, ImageSemaphores};
pub use texture::Texture;
