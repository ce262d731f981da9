//! GPU error types.

use ash::vk;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// No suitable GPU found.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// Required extension not supported.
    #[error("Required extension not supported: {0}")]
    ExtensionNotSupported(String),

    /// Memory allocation failed.
    #[error("Memory allocation failed: {0}")]
    AllocationFailed(String),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// A rebuilt swapchain reports different color or depth formats than its predecessor.
    #[error("Swapchain format changed across rebuild: {previous:?} -> {current:?}")]
    FormatMismatch {
        previous: (vk::Format, vk::Format),
        current: (vk::Format, vk::Format),
    },

    /// Descriptor set layout rejected during validation.
    #[error("Invalid descriptor set layout: {0}")]
    DescriptorLayout(String),

    /// Descriptor write rejected during validation.
    #[error("Invalid descriptor write: {0}")]
    DescriptorWrite(String),

    /// Frame lifecycle method called out of order.
    #[error("Invalid frame state: {0}")]
    InvalidFrameState(String),

    /// Resource not found.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl GpuError {
    /// Whether the error reports a stale presentation surface.
    ///
    /// Stale surfaces are handled by rebuilding the swapchain and never reach callers
    /// of the frame loop.
    pub fn is_surface_stale(&self) -> bool {
        matches!(
            self,
            Self::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR)
        )
    }

    /// Whether the error must abort the current run.
    pub fn is_fatal(&self) -> bool {
        !self.is_surface_stale()
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_surface_is_not_fatal() {
        assert!(!GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DATE_KHR).is_fatal());
        assert!(!GpuError::Vulkan(vk::Result::SUBOPTIMAL_KHR).is_fatal());
    }

    #[test]
    fn creation_failures_are_fatal() {
        assert!(GpuError::Vulkan(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY).is_fatal());
        assert!(GpuError::FormatMismatch {
            previous: (vk::Format::B8G8R8A8_SRGB, vk::Format::D32_SFLOAT),
            current: (vk::Format::R8G8B8A8_SRGB, vk::Format::D32_SFLOAT),
        }
        .is_fatal());
        assert!(GpuError::DescriptorWrite("too many images".into()).is_fatal());
    }
}
