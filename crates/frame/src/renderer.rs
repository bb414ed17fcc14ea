//! Per-frame acquire, submit and present.
//!
//! The [`Renderer`] owns one [`FrameSync`] per frame slot and walks them as a
//! ring. Recording is left to the caller:
//!
//! 1. [`Renderer::begin_frame`] waits for the slot's fence, acquires the next
//!    image and returns its index.
//! 2. The caller records into that index, usually through
//!    `Block::process`.
//! 3. [`Renderer::end_frame`] submits the command buffers and presents.
//!
//! # Synchronization Flow
//!
//! ```text
//! wait(fence[sync]) -> acquire(image_acquired[sync])
//! reset(fence[sync]) -> submit(wait image_acquired[sync], signal render_complete[sync], fence[sync])
//! present(wait render_complete[sync]) -> sync = (sync + 1) % frame_count
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use lava_rhi::device::Device;
//! use lava_rhi::swapchain::Swapchain;
//! use lava_block::Block;
//! use lava_frame::Renderer;
//!
//! # fn example(device: Arc<Device>, swapchain: &mut Swapchain, block: &mut Block) -> Result<(), lava_rhi::RhiError> {
//! let mut renderer = Renderer::new(device, swapchain)?;
//!
//! if let Some(frame) = renderer.begin_frame(swapchain)? {
//!     block.process(frame as usize)?;
//!     renderer.end_frame(swapchain, &block.collect_buffers())?;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use lava_rhi::device::Device;
use lava_rhi::swapchain::{ACQUIRE_TIMEOUT_NS, PresentTarget};
use lava_rhi::sync::{Fence, QueueSubmit, Semaphore, SyncDevice};
use lava_rhi::{RhiError, RhiResult};
use tracing::{debug, error, info, trace};

/// Length of one fence poll in nanoseconds.
pub const FENCE_POLL_NS: u64 = 100;

/// Sync objects of one frame slot.
pub struct FrameSync<D: SyncDevice = Device> {
    /// Signaled once the slot's last submission retired.
    fence: Fence<D>,
    /// Signaled by image acquisition, waited on by the submit.
    image_acquired: Semaphore<D>,
    /// Signaled by the submit, waited on by present.
    render_complete: Semaphore<D>,
}

impl<D: SyncDevice> FrameSync<D> {
    fn new(device: &Arc<D>) -> RhiResult<Self> {
        Ok(Self {
            // Signaled so the first wait on every slot returns at once
            fence: Fence::new(device.clone(), true)?,
            image_acquired: Semaphore::new(device.clone())?,
            render_complete: Semaphore::new(device.clone())?,
        })
    }

    #[inline]
    pub fn fence(&self) -> &Fence<D> {
        &self.fence
    }

    #[inline]
    pub fn image_acquired(&self) -> &Semaphore<D> {
        &self.image_acquired
    }

    #[inline]
    pub fn render_complete(&self) -> &Semaphore<D> {
        &self.render_complete
    }
}

/// Drives the acquire/submit/present protocol for a present target.
///
/// # Thread Safety
///
/// The renderer is used from the frame loop thread only.
pub struct Renderer<D: SyncDevice = Device> {
    device: Arc<D>,
    frames: Vec<FrameSync<D>>,
    /// Fence of the submission that last used each image.
    images_in_flight: Vec<vk::Fence>,
    current_sync: usize,
    current_frame: u32,
    user_wait_semaphores: Vec<vk::Semaphore>,
    user_wait_stages: Vec<vk::PipelineStageFlags>,
    user_signal_semaphores: Vec<vk::Semaphore>,
    active: bool,
    on_destroy: Option<Box<dyn FnMut()>>,
}

impl<D: SyncDevice> Renderer<D> {
    /// Creates one fence and two semaphores per frame slot of `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if the target has no images or a sync object
    /// cannot be created.
    pub fn new(device: Arc<D>, target: &impl PresentTarget) -> RhiResult<Self> {
        let frame_count = target.frame_count();
        if frame_count == 0 {
            error!("Renderer target has no images");
            return Err(RhiError::SwapchainError(
                "target has no images".to_string(),
            ));
        }

        let mut frames = Vec::with_capacity(frame_count);
        for slot in 0..frame_count {
            let sync = FrameSync::new(&device)
                .inspect_err(|e| error!("Failed to create sync objects for slot {}: {}", slot, e))?;
            frames.push(sync);
        }

        info!("Renderer created with {} queued frame(s)", frame_count);

        Ok(Self {
            device,
            frames,
            images_in_flight: vec![vk::Fence::null(); frame_count],
            current_sync: 0,
            current_frame: 0,
            user_wait_semaphores: Vec::new(),
            user_wait_stages: Vec::new(),
            user_signal_semaphores: Vec::new(),
            active: true,
            on_destroy: None,
        })
    }

    /// Waits for the current slot and acquires the next image.
    ///
    /// Returns `Ok(None)` when the renderer is inactive, the fence wait
    /// fails, or the target is out of date. In the last case a reload is
    /// requested on `target` and the caller should skip this tick. A
    /// suboptimal image is still rendered, with a reload requested.
    ///
    /// # Errors
    ///
    /// Returns an error if acquisition fails for another reason.
    pub fn begin_frame(&mut self, target: &mut impl PresentTarget) -> RhiResult<Option<u32>> {
        if !self.active || self.frames.is_empty() {
            return Ok(None);
        }

        let sync = &self.frames[self.current_sync];

        loop {
            match sync.fence.poll(FENCE_POLL_NS) {
                Ok(true) => break,
                Ok(false) => continue,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    target.request_reload();
                    return Ok(None);
                }
                Err(e) => {
                    error!("Frame fence wait failed: {:?}", e);
                    return Ok(None);
                }
            }
        }

        let (image_index, suboptimal) =
            match target.acquire_next_image(sync.image_acquired.handle(), ACQUIRE_TIMEOUT_NS) {
                Ok(result) => result,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    debug!("Acquire reported out of date");
                    target.request_reload();
                    return Ok(None);
                }
                Err(e) => {
                    error!("Failed to acquire next image: {:?}", e);
                    return Err(e.into());
                }
            };
        if suboptimal {
            target.request_reload();
        }

        // Images may come back out of order, so the acquired one can still
        // be owned by another slot's submission.
        let image = image_index as usize;
        if image >= self.images_in_flight.len() {
            self.images_in_flight.resize(image + 1, vk::Fence::null());
        }
        let in_use = self.images_in_flight[image];
        if in_use != vk::Fence::null() && in_use != sync.fence.handle() {
            match self.device.wait_for_fence(in_use, u64::MAX) {
                Ok(_) => {}
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    target.request_reload();
                    return Ok(None);
                }
                Err(e) => {
                    error!("Image fence wait failed: {:?}", e);
                    return Ok(None);
                }
            }
        }
        self.images_in_flight[image] = sync.fence.handle();

        self.current_frame = image_index;
        trace!("Frame {} begins on sync slot {}", image_index, self.current_sync);
        Ok(Some(image_index))
    }

    /// Submits `command_buffers` and presents the current image.
    ///
    /// The slot's fence is reset right before the submit. If the submit
    /// fails, an empty batch waiting on the acquire semaphore is submitted
    /// with the fence instead, so the slot's next wait does not block.
    ///
    /// The ring advances once the submit succeeded, whatever present
    /// reports. An out-of-date or suboptimal present requests a reload and
    /// counts as success.
    ///
    /// # Errors
    ///
    /// Returns an error if `command_buffers` is empty, the fence reset or
    /// submit fails (the ring does not advance), or present fails for
    /// another reason.
    pub fn end_frame(
        &mut self,
        target: &mut impl PresentTarget,
        command_buffers: &[vk::CommandBuffer],
    ) -> RhiResult<()> {
        if command_buffers.is_empty() {
            error!("end_frame called without command buffers");
            return Err(RhiError::CommandError(
                "no command buffers to submit".to_string(),
            ));
        }
        let Some(sync) = self.frames.get(self.current_sync) else {
            return Err(RhiError::InvalidHandle("renderer not created".to_string()));
        };

        let mut wait_semaphores = vec![sync.image_acquired.handle()];
        wait_semaphores.extend_from_slice(&self.user_wait_semaphores);

        let mut wait_stages = vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        wait_stages.extend_from_slice(&self.user_wait_stages);

        let render_complete = sync.render_complete.handle();
        let mut signal_semaphores = vec![render_complete];
        signal_semaphores.extend_from_slice(&self.user_signal_semaphores);

        let submit = QueueSubmit {
            wait_semaphores: &wait_semaphores,
            wait_stages: &wait_stages,
            command_buffers,
            signal_semaphores: &signal_semaphores,
        };
        sync.fence
            .reset()
            .inspect_err(|e| error!("Failed to reset frame fence: {}", e))?;
        if let Err(e) = self.device.submit_graphics(&submit, sync.fence.handle()) {
            error!("Frame submit failed: {}", e);
            let release = QueueSubmit {
                wait_semaphores: &wait_semaphores[..1],
                wait_stages: &[vk::PipelineStageFlags::ALL_COMMANDS],
                ..QueueSubmit::default()
            };
            if let Err(e) = self.device.submit_graphics(&release, sync.fence.handle()) {
                error!("Failed to re-signal frame fence: {}", e);
            }
            return Err(e);
        }

        let presented = target.present(self.current_frame, render_complete);
        self.current_sync = (self.current_sync + 1) % self.frames.len();

        match presented {
            Ok(false) => Ok(()),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                target.request_reload();
                Ok(())
            }
            Err(e) => {
                error!("Present failed: {:?}", e);
                Err(e.into())
            }
        }
    }

    /// Waits for the device, runs `on_destroy` and releases the sync
    /// objects. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.frames.is_empty() {
            return;
        }

        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle before renderer destroy: {}", e);
        }

        if let Some(on_destroy) = self.on_destroy.as_mut() {
            on_destroy();
        }

        self.frames.clear();
        self.images_in_flight.clear();
        self.current_sync = 0;
        self.current_frame = 0;
        debug!("Renderer destroyed");
    }

    /// Adds a semaphore the next submits also wait on at `stage`.
    pub fn add_user_wait_semaphore(&mut self, semaphore: vk::Semaphore, stage: vk::PipelineStageFlags) {
        self.user_wait_semaphores.push(semaphore);
        self.user_wait_stages.push(stage);
    }

    /// Adds a semaphore the next submits also signal.
    pub fn add_user_signal_semaphore(&mut self, semaphore: vk::Semaphore) {
        self.user_signal_semaphores.push(semaphore);
    }

    pub fn clear_user_semaphores(&mut self) {
        self.user_wait_semaphores.clear();
        self.user_wait_stages.clear();
        self.user_signal_semaphores.clear();
    }

    pub fn set_on_destroy(&mut self, on_destroy: impl FnMut() + 'static) {
        self.on_destroy = Some(Box::new(on_destroy));
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    #[inline]
    pub fn active(&self) -> bool {
        self.active
    }

    /// Number of frame slots.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Index of the sync slot the next frame uses.
    #[inline]
    pub fn current_sync(&self) -> usize {
        self.current_sync
    }

    /// Image index returned by the last successful `begin_frame`.
    #[inline]
    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn sync(&self, slot: usize) -> Option<&FrameSync<D>> {
        self.frames.get(slot)
    }

    #[inline]
    pub fn device(&self) -> &Arc<D> {
        &self.device
    }
}

impl<D: SyncDevice> Drop for Renderer<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}
