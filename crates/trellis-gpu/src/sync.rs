//! Synchronization primitives.

use crate::error::Result;
use ash::vk;

/// Create a semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    let semaphore = unsafe { device.create_semaphore(&create_info, None)? };
    Ok(semaphore)
}

/// Create a fence.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    let fence = unsafe { device.create_fence(&create_info, None)? };
    Ok(fence)
}

/// Wait for a fence to be signaled.
///
/// # Safety
/// The device and fence must be valid.
#[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
pub unsafe fn wait_for_fence(
    device: &ash::Device,
    fence: vk::Fence,
    timeout_ns: u64,
) -> Result<()> {
    unsafe { device.wait_for_fences(&[fence], true, timeout_ns)? };
    Ok(())
}

/// Reset a fence to unsignaled state.
///
/// # Safety
/// The device and fence must be valid.
#[cfg_attr(feature = "profiling-tracy", tracing::instrument(level = "trace", skip_all))]
pub unsafe fn reset_fence(device: &ash::Device, fence: vk::Fence) -> Result<()> {
    unsafe { device.reset_fences(&[fence])? };
    Ok(())
}

/// Synchronization and recording resources of one frame slot.
pub struct FrameSlot {
    /// Signaled when the acquired swapchain image is ready to be rendered to.
    pub image_available: vk::Semaphore,
    /// Signaled when this slot's last submission completes. Created signaled.
    pub in_flight: vk::Fence,
    /// Primary command buffer recorded for this slot.
    pub command_buffer: vk::CommandBuffer,
}

impl FrameSlot {
    /// Create the slot's semaphore and fence around an allocated command buffer.
    ///
    /// # Safety
    /// The device and command buffer must be valid.
    pub unsafe fn new(device: &ash::Device, command_buffer: vk::CommandBuffer) -> Result<Self> {
        let image_available = unsafe { create_semaphore(device)? };
        let in_flight = match unsafe { create_fence(device, true) } {
            Ok(fence) => fence,
            Err(e) => {
                unsafe { device.destroy_semaphore(image_available, None) };
                return Err(e);
            }
        };

        Ok(Self {
            image_available,
            in_flight,
            command_buffer,
        })
    }

    /// Block until the slot's previous submission completes.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn wait(&self, device: &ash::Device) -> Result<()> {
        unsafe { wait_for_fence(device, self.in_flight, u64::MAX) }
    }

    /// Reset the fence before submitting.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn reset(&self, device: &ash::Device) -> Result<()> {
        unsafe { reset_fence(device, self.in_flight) }
    }

    /// Destroy the semaphore and fence. The command buffer belongs to its pool.
    ///
    /// # Safety
    /// The device must be valid and resources must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_fence(self.in_flight, None);
        }
    }
}

/// One semaphore per swapchain image, signaled when rendering to that image completes.
pub struct ImageSemaphores {
    semaphores: Vec<vk::Semaphore>,
}

impl ImageSemaphores {
    /// Create `count` semaphores.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device, count: usize) -> Result<Self> {
        let mut semaphores = Vec::with_capacity(count);
        for _ in 0..count {
            match unsafe { create_semaphore(device) } {
                Ok(semaphore) => semaphores.push(semaphore),
                Err(e) => {
                    for semaphore in semaphores {
                        unsafe { device.destroy_semaphore(semaphore, None) };
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self { semaphores })
    }

    /// Semaphore for the given image.
    pub fn get(&self, image_index: u32) -> Option<vk::Semaphore> {
        self.semaphores.get(image_index as usize).copied()
    }

    /// Number of semaphores.
    pub fn len(&self) -> usize {
        self.semaphores.len()
    }

    /// Whether no semaphores are held.
    pub fn is_empty(&self) -> bool {
        self.semaphores.is_empty()
    }

    /// Destroy all semaphores.
    ///
    /// # Safety
    /// The device must be valid and no semaphore may be pending.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        for semaphore in self.semaphores.drain(..) {
            unsafe { device.destroy_semaphore(semaphore, None) };
        }
    }
}
