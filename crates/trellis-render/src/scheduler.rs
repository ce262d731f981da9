//! Device-free frame pacing state machine.
//!
//! [`FrameScheduler`] decides which fences to wait on, when a frame may start or end,
//! and when the swapchain has to be rebuilt. [`crate::Renderer`] performs the Vulkan
//! calls; keeping the decisions here lets them be tested without a GPU.

use ash::vk;
use trellis_gpu::swapchain::PresentStatus;
use trellis_gpu::{GpuError, Result};

/// Number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Whether a frame is being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Started { image_index: u32 },
}

/// Whether the current swapchain still matches the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapchainState {
    Valid,
    Stale,
}

/// What the renderer must do after an image was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquirePlan {
    pub slot: usize,
    pub image_index: u32,
    /// Fence of an older frame still rendering to this image.
    pub wait_for_image: Option<vk::Fence>,
}

/// What the renderer must submit at the end of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitPlan {
    pub slot: usize,
    pub image_index: u32,
    /// Reset immediately before the submit it guards.
    pub fence: vk::Fence,
}

fn lifecycle_violation(message: &str) -> GpuError {
    if cfg!(debug_assertions) {
        panic!("{message}");
    }
    GpuError::InvalidFrameState(message.to_string())
}

/// Frame slot ring plus the per-image fence table.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    slot_fences: Vec<vk::Fence>,
    images_in_flight: Vec<Option<vk::Fence>>,
    current_frame: usize,
    state: FrameState,
    swapchain: SwapchainState,
    window_extent: vk::Extent2D,
    frames_presented: u64,
}

impl FrameScheduler {
    /// Scheduler over one fence per frame slot and `image_count` swapchain images.
    pub fn new(slot_fences: Vec<vk::Fence>, image_count: usize, window_extent: vk::Extent2D) -> Self {
        debug_assert!(!slot_fences.is_empty(), "at least one frame slot is required");
        Self {
            slot_fences,
            images_in_flight: vec![None; image_count],
            current_frame: 0,
            state: FrameState::Idle,
            swapchain: SwapchainState::Valid,
            window_extent,
            frames_presented: 0,
        }
    }

    /// Current frame slot, in `0..frames_in_flight()`.
    pub fn frame_index(&self) -> usize {
        self.current_frame
    }

    /// Number of frame slots.
    pub fn frames_in_flight(&self) -> usize {
        self.slot_fences.len()
    }

    /// Fence guarding the current slot's previous submission.
    pub fn slot_fence(&self) -> vk::Fence {
        self.slot_fences[self.current_frame]
    }

    /// Frame lifecycle state.
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Swapchain validity.
    pub fn swapchain_state(&self) -> SwapchainState {
        self.swapchain
    }

    /// Whether a frame is being recorded.
    pub fn is_frame_in_progress(&self) -> bool {
        matches!(self.state, FrameState::Started { .. })
    }

    /// Image being recorded, if any.
    pub fn image_index(&self) -> Option<u32> {
        match self.state {
            FrameState::Started { image_index } => Some(image_index),
            FrameState::Idle => None,
        }
    }

    /// Whether the swapchain must be rebuilt before acquiring.
    pub fn needs_rebuild(&self) -> bool {
        self.swapchain == SwapchainState::Stale
    }

    /// Last window extent reported.
    pub fn window_extent(&self) -> vk::Extent2D {
        self.window_extent
    }

    /// Whether the window currently has no drawable area.
    pub fn is_minimized(&self) -> bool {
        self.window_extent.width == 0 || self.window_extent.height == 0
    }

    /// Number of frames submitted and presented.
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Fence recorded for an image, if any.
    pub fn image_fence(&self, image_index: u32) -> Option<vk::Fence> {
        self.images_in_flight
            .get(image_index as usize)
            .copied()
            .flatten()
    }

    /// Number of swapchain images tracked.
    pub fn image_count(&self) -> usize {
        self.images_in_flight.len()
    }

    /// Check that a new frame may start.
    pub fn check_can_begin(&self) -> Result<()> {
        if self.is_frame_in_progress() {
            return Err(lifecycle_violation(
                "begin_frame called while a frame is already in progress",
            ));
        }
        Ok(())
    }

    /// Check that recording commands for the current frame is allowed.
    pub fn check_recording(&self) -> Result<u32> {
        self.image_index().ok_or_else(|| {
            lifecycle_violation("render pass recorded while no frame is in progress")
        })
    }

    /// Record the window's framebuffer extent.
    ///
    /// Returns whether the swapchain became stale. Reporting the extent the valid
    /// swapchain already has changes nothing.
    pub fn notify_resized(&mut self, window_extent: vk::Extent2D, active: vk::Extent2D) -> bool {
        if self.swapchain == SwapchainState::Valid && window_extent == active {
            return false;
        }
        self.window_extent = window_extent;
        self.swapchain = SwapchainState::Stale;
        true
    }

    /// Mark the swapchain stale outside of a resize, e.g. after a suboptimal present.
    pub fn mark_stale(&mut self) {
        self.swapchain = SwapchainState::Stale;
    }

    /// Acquire reported the swapchain out of date; no image was acquired.
    pub fn on_acquire_out_of_date(&mut self) {
        self.swapchain = SwapchainState::Stale;
    }

    /// An image was acquired for the current slot.
    pub fn on_acquired(&mut self, image_index: u32, suboptimal: bool) -> Result<AcquirePlan> {
        self.check_can_begin()?;
        let slot_fence = self.slot_fence();
        let entry = self
            .images_in_flight
            .get_mut(image_index as usize)
            .ok_or_else(|| {
                GpuError::InvalidFrameState(format!(
                    "Acquired image {image_index} outside the swapchain"
                ))
            })?;

        // The slot fence was already waited on; any other fence is an older frame
        let wait_for_image = entry.filter(|&fence| fence != slot_fence);
        *entry = Some(slot_fence);

        if suboptimal {
            self.swapchain = SwapchainState::Stale;
        }
        self.state = FrameState::Started { image_index };

        Ok(AcquirePlan {
            slot: self.current_frame,
            image_index,
            wait_for_image,
        })
    }

    /// Recording finished; returns what to submit.
    pub fn prepare_submit(&self) -> Result<SubmitPlan> {
        match self.state {
            FrameState::Started { image_index } => Ok(SubmitPlan {
                slot: self.current_frame,
                image_index,
                fence: self.slot_fence(),
            }),
            FrameState::Idle => Err(lifecycle_violation(
                "end_frame called while no frame is in progress",
            )),
        }
    }

    /// The frame was submitted and presented. Advances to the next slot.
    ///
    /// Returns whether the swapchain must be rebuilt now.
    pub fn on_presented(&mut self, status: PresentStatus) -> Result<bool> {
        self.prepare_submit()?;
        if status.needs_rebuild() {
            self.swapchain = SwapchainState::Stale;
        }
        self.state = FrameState::Idle;
        self.current_frame = (self.current_frame + 1) % self.slot_fences.len();
        self.frames_presented += 1;
        Ok(self.needs_rebuild())
    }

    /// A new swapchain generation replaced the old one after a device idle wait.
    ///
    /// Returns whether the image count changed, in which case per-image resources must
    /// be recreated.
    pub fn on_rebuilt(&mut self, image_count: usize, extent: vk::Extent2D) -> Result<bool> {
        if self.is_frame_in_progress() {
            return Err(lifecycle_violation(
                "swapchain rebuilt while a frame is in progress",
            ));
        }
        let changed = image_count != self.images_in_flight.len();
        // Every fence is signaled after the idle wait
        self.images_in_flight = vec![None; image_count];
        self.swapchain = SwapchainState::Valid;
        self.window_extent = extent;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use std::collections::HashMap;

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 800,
        height: 600,
    };

    fn fences(count: u64) -> Vec<vk::Fence> {
        (1..=count).map(vk::Fence::from_raw).collect()
    }

    fn scheduler(image_count: usize) -> FrameScheduler {
        FrameScheduler::new(fences(MAX_FRAMES_IN_FLIGHT as u64), image_count, EXTENT)
    }

    /// Fence signal state of a simulated queue.
    #[derive(Default)]
    struct FakeGpu {
        signaled: HashMap<vk::Fence, bool>,
        /// Image -> fence of the submission that last rendered it
        image_owner: HashMap<u32, vk::Fence>,
    }

    impl FakeGpu {
        fn new(fences: &[vk::Fence]) -> Self {
            Self {
                signaled: fences.iter().map(|&f| (f, true)).collect(),
                image_owner: HashMap::new(),
            }
        }

        fn wait(&mut self, fence: vk::Fence) {
            // Waiting completes the submission
            self.signaled.insert(fence, true);
        }

        fn submit(&mut self, fence: vk::Fence, image_index: u32) {
            assert!(self.signaled[&fence], "fence reset while still pending");
            self.signaled.insert(fence, false);
            self.image_owner.insert(image_index, fence);
        }

        fn pending(&self) -> usize {
            self.signaled.values().filter(|&&s| !s).count()
        }

        fn image_busy(&self, image_index: u32) -> bool {
            self.image_owner
                .get(&image_index)
                .is_some_and(|fence| !self.signaled[fence])
        }
    }

    /// Run one frame the way the renderer does; returns the slot used.
    fn run_frame(s: &mut FrameScheduler, gpu: &mut FakeGpu, image_index: u32) -> usize {
        s.check_can_begin().unwrap();
        gpu.wait(s.slot_fence());
        let plan = s.on_acquired(image_index, false).unwrap();
        if let Some(fence) = plan.wait_for_image {
            gpu.wait(fence);
        }
        assert!(!gpu.image_busy(image_index), "image {image_index} re-recorded while in use");

        let submit = s.prepare_submit().unwrap();
        assert_eq!(submit.slot, plan.slot);
        gpu.submit(submit.fence, submit.image_index);
        assert!(gpu.pending() <= MAX_FRAMES_IN_FLIGHT);

        s.on_presented(PresentStatus::Optimal).unwrap();
        plan.slot
    }

    #[test]
    fn slots_cycle_modulo_frames_in_flight() {
        let mut s = scheduler(3);
        let mut gpu = FakeGpu::new(&fences(2));
        let slots: Vec<usize> = (0..4).map(|i| run_frame(&mut s, &mut gpu, i % 3)).collect();
        assert_eq!(slots, vec![0, 1, 0, 1]);
        assert_eq!(s.frames_presented(), 4);
    }

    #[test]
    fn ten_frames_three_images_two_slots() {
        let slot_fences = fences(2);
        let mut s = scheduler(3);
        let mut gpu = FakeGpu::new(&slot_fences);

        let mut image_waits = Vec::new();
        for frame in 0..10u32 {
            let image_index = frame % 3;
            s.check_can_begin().unwrap();
            let slot = s.frame_index();
            assert_eq!(slot, frame as usize % MAX_FRAMES_IN_FLIGHT);
            gpu.wait(s.slot_fence());

            let plan = s.on_acquired(image_index, false).unwrap();
            image_waits.push(plan.wait_for_image);
            if let Some(fence) = plan.wait_for_image {
                gpu.wait(fence);
            }
            assert!(!gpu.image_busy(image_index));
            assert_eq!(s.image_fence(image_index), Some(slot_fences[slot]));

            let submit = s.prepare_submit().unwrap();
            gpu.submit(submit.fence, image_index);
            assert!(gpu.pending() <= MAX_FRAMES_IN_FLIGHT);
            assert!(!s.on_presented(PresentStatus::Optimal).unwrap());
        }

        // First use of each image never waits
        assert_eq!(&image_waits[..3], &[None, None, None]);
        // Frame 3 reuses image 0 (last drawn by slot 0) from slot 1
        assert_eq!(image_waits[3], Some(slot_fences[0]));
        // Frame 4 reuses image 1 (last drawn by slot 1) from slot 0
        assert_eq!(image_waits[4], Some(slot_fences[1]));
        assert_eq!(s.frames_presented(), 10);
        assert_eq!(s.frame_index(), 0);
    }

    #[test]
    fn image_wait_skips_own_slot_fence() {
        let slot_fences = fences(2);
        let mut s = scheduler(2);
        let mut gpu = FakeGpu::new(&slot_fences);

        // Two slots over two images: each image always returns to the same slot
        for frame in 0..6u32 {
            gpu.wait(s.slot_fence());
            let plan = s.on_acquired(frame % 2, false).unwrap();
            assert_eq!(plan.wait_for_image, None);
            let submit = s.prepare_submit().unwrap();
            gpu.submit(submit.fence, frame % 2);
            s.on_presented(PresentStatus::Optimal).unwrap();
        }
    }

    #[test]
    fn out_of_date_at_frame_five_rebuilds_without_advancing() {
        let slot_fences = fences(2);
        let mut s = scheduler(3);
        let mut gpu = FakeGpu::new(&slot_fences);

        for frame in 0..5u32 {
            run_frame(&mut s, &mut gpu, frame % 3);
        }
        let slot_before = s.frame_index();
        assert_eq!(slot_before, 1);

        // Frame 5: the slot fence wait succeeds, then acquire reports out of date
        s.check_can_begin().unwrap();
        gpu.wait(s.slot_fence());
        s.on_acquire_out_of_date();
        assert!(s.needs_rebuild());
        assert_eq!(s.state(), FrameState::Idle);

        // Renderer idles the device and rebuilds
        for &fence in &slot_fences {
            gpu.wait(fence);
        }
        assert!(!s.on_rebuilt(3, EXTENT).unwrap());
        assert_eq!(s.swapchain_state(), SwapchainState::Valid);
        assert_eq!(s.frame_index(), slot_before);
        assert_eq!(s.frames_presented(), 5);
        // Fence was never reset, so the retry does not block forever
        assert!(gpu.signaled[&s.slot_fence()]);
        assert_eq!(s.image_fence(0), None);

        let slot = run_frame(&mut s, &mut gpu, 0);
        assert_eq!(slot, slot_before);
        assert_eq!(s.frames_presented(), 6);
    }

    #[test]
    fn present_out_of_date_requests_rebuild_and_advances() {
        let mut s = scheduler(3);
        s.on_acquired(0, false).unwrap();
        s.prepare_submit().unwrap();
        assert!(s.on_presented(PresentStatus::OutOfDate).unwrap());
        assert_eq!(s.frame_index(), 1);
        assert!(s.needs_rebuild());
    }

    #[test]
    fn suboptimal_acquire_proceeds_and_marks_stale() {
        let mut s = scheduler(3);
        let plan = s.on_acquired(1, true).unwrap();
        assert_eq!(plan.image_index, 1);
        assert!(s.is_frame_in_progress());
        assert!(s.on_presented(PresentStatus::Optimal).unwrap());
    }

    #[test]
    fn image_count_change_resets_table() {
        let mut s = scheduler(3);
        s.on_acquired(2, false).unwrap();
        s.on_presented(PresentStatus::Suboptimal).unwrap();
        assert!(s.on_rebuilt(4, EXTENT).unwrap());
        assert_eq!(s.image_count(), 4);
        assert!((0..4).all(|i| s.image_fence(i).is_none()));
    }

    #[test]
    fn resize_to_active_extent_is_idempotent() {
        let mut s = scheduler(3);
        assert!(!s.notify_resized(EXTENT, EXTENT));
        assert!(!s.notify_resized(EXTENT, EXTENT));
        assert_eq!(s.swapchain_state(), SwapchainState::Valid);

        let bigger = vk::Extent2D {
            width: 1024,
            height: 768,
        };
        assert!(s.notify_resized(bigger, EXTENT));
        assert!(s.notify_resized(bigger, EXTENT));
        assert_eq!(s.window_extent(), bigger);
        assert!(s.needs_rebuild());

        s.on_rebuilt(3, bigger).unwrap();
        assert!(!s.notify_resized(bigger, bigger));
        assert!(!s.needs_rebuild());
    }

    #[test]
    fn restore_after_minimize_still_rebuilds() {
        let mut s = scheduler(3);
        s.notify_resized(vk::Extent2D::default(), EXTENT);
        assert!(s.is_minimized());

        // Back to the old size while still stale
        assert!(s.notify_resized(EXTENT, EXTENT));
        assert!(!s.is_minimized());
        assert!(s.needs_rebuild());
    }

    #[test]
    fn acquired_index_outside_swapchain_is_rejected() {
        let mut s = scheduler(2);
        assert!(s.on_acquired(5, false).is_err());
        assert!(!s.is_frame_in_progress());
    }

    #[test]
    #[cfg_attr(
        debug_assertions,
        should_panic(expected = "end_frame called while no frame is in progress")
    )]
    fn end_without_begin_is_rejected() {
        let s = scheduler(3);
        assert!(matches!(
            s.prepare_submit(),
            Err(GpuError::InvalidFrameState(_))
        ));
    }

    #[test]
    #[cfg_attr(
        debug_assertions,
        should_panic(expected = "begin_frame called while a frame is already in progress")
    )]
    fn double_begin_is_rejected() {
        let mut s = scheduler(3);
        s.on_acquired(0, false).unwrap();
        assert!(s.check_can_begin().is_err());
    }

    #[test]
    #[cfg_attr(
        debug_assertions,
        should_panic(expected = "render pass recorded while no frame is in progress")
    )]
    fn recording_outside_frame_is_rejected() {
        let s = scheduler(3);
        assert!(s.check_recording().is_err());
    }
}
