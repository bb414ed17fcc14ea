//! Synchronization primitives for Vulkan.
//!
//! This module provides wrappers for Vulkan synchronization objects:
//! - [`Semaphore`] - GPU-to-GPU synchronization (between queue operations)
//! - [`Fence`] - GPU-to-CPU synchronization (for host waiting)
//!
//! Both are generic over [`SyncDevice`], the narrow slice of the device
//! that creates, waits on and submits with them. [`Device`] implements it;
//! tests substitute a recording mock.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use lava_rhi::device::Device;
//! use lava_rhi::sync::{Semaphore, Fence};
//!
//! # fn example(device: Arc<Device>) -> Result<(), lava_rhi::RhiError> {
//! let image_available = Semaphore::new(device.clone())?;
//! let in_flight_fence = Fence::new(device.clone(), true)?;
//!
//! in_flight_fence.wait(u64::MAX)?;
//! in_flight_fence.reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// One graphics queue submission.
///
/// `wait_semaphores` and `wait_stages` are parallel slices.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueSubmit<'a> {
    pub wait_semaphores: &'a [vk::Semaphore],
    pub wait_stages: &'a [vk::PipelineStageFlags],
    pub command_buffers: &'a [vk::CommandBuffer],
    pub signal_semaphores: &'a [vk::Semaphore],
}

/// Device operations needed by the frame synchronization ring.
pub trait SyncDevice {
    /// Creates a fence, optionally in the signaled state.
    fn create_fence(&self, signaled: bool) -> RhiResult<vk::Fence>;

    fn destroy_fence(&self, fence: vk::Fence);

    /// Creates an unsignaled binary semaphore.
    fn create_semaphore(&self) -> RhiResult<vk::Semaphore>;

    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    /// Waits up to `timeout_ns` for `fence`.
    ///
    /// Returns `Ok(true)` when signaled and `Ok(false)` on timeout. Any
    /// other native result, such as device loss, is returned as `Err`.
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<bool, vk::Result>;

    fn reset_fence(&self, fence: vk::Fence) -> RhiResult<()>;

    /// Submits one batch to the graphics queue, signaling `fence` on completion.
    fn submit_graphics(&self, submit: &QueueSubmit<'_>, fence: vk::Fence) -> RhiResult<()>;

    /// Blocks until every queue of the device has drained.
    fn wait_idle(&self) -> RhiResult<()>;
}

impl SyncDevice for Device {
    fn create_fence(&self, signaled: bool) -> RhiResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);

        let fence = unsafe { self.handle().create_fence(&create_info, None)? };
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.handle().destroy_fence(fence, None) };
    }

    fn create_semaphore(&self) -> RhiResult<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { self.handle().create_semaphore(&create_info, None)? };
        Ok(semaphore)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.handle().destroy_semaphore(semaphore, None) };
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<bool, vk::Result> {
        match unsafe { self.handle().wait_for_fences(&[fence], true, timeout_ns) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> RhiResult<()> {
        unsafe { self.handle().reset_fences(&[fence])? };
        Ok(())
    }

    fn submit_graphics(&self, submit: &QueueSubmit<'_>, fence: vk::Fence) -> RhiResult<()> {
        if submit.wait_semaphores.len() != submit.wait_stages.len() {
            return Err(RhiError::CommandError(format!(
                "{} wait semaphore(s) but {} wait stage(s)",
                submit.wait_semaphores.len(),
                submit.wait_stages.len()
            )));
        }

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(submit.wait_semaphores)
            .wait_dst_stage_mask(submit.wait_stages)
            .command_buffers(submit.command_buffers)
            .signal_semaphores(submit.signal_semaphores);

        unsafe {
            self.handle()
                .queue_submit(self.graphics_queue(), &[submit_info], fence)
                .map_err(|e| {
                    error!("Graphics queue submit failed: {:?}", e);
                    e
                })?;
        }
        Ok(())
    }

    fn wait_idle(&self) -> RhiResult<()> {
        Device::wait_idle(self)
    }
}

/// Vulkan semaphore wrapper.
///
/// The semaphore is destroyed when this wrapper is dropped.
pub struct Semaphore<D: SyncDevice = Device> {
    /// Reference to the logical device.
    device: Arc<D>,
    /// Vulkan semaphore handle.
    semaphore: vk::Semaphore,
}

impl<D: SyncDevice> Semaphore<D> {
    /// Creates a new semaphore in the unsignaled state.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<D>) -> RhiResult<Self> {
        let semaphore = device.create_semaphore()?;
        debug!("Created semaphore");
        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl<D: SyncDevice> Drop for Semaphore<D> {
    fn drop(&mut self) {
        self.device.destroy_semaphore(self.semaphore);
    }
}

/// Vulkan fence wrapper.
///
/// The fence is destroyed when this wrapper is dropped.
pub struct Fence<D: SyncDevice = Device> {
    /// Reference to the logical device.
    device: Arc<D>,
    /// Vulkan fence handle.
    fence: vk::Fence,
}

impl<D: SyncDevice> Fence<D> {
    /// Creates a new fence.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `signaled` - If true, creates the fence in the signaled state so the
    ///   first wait returns at once.
    ///
    /// # Errors
    ///
    /// Returns an error if fence creation fails.
    pub fn new(device: Arc<D>, signaled: bool) -> RhiResult<Self> {
        let fence = device.create_fence(signaled)?;
        debug!(
            "Created fence ({})",
            if signaled { "signaled" } else { "unsignaled" }
        );
        Ok(Self { device, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Waits for the fence to become signaled.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Timeout in nanoseconds. Use `u64::MAX` for infinite wait.
    ///
    /// # Errors
    ///
    /// Returns `VulkanError(TIMEOUT)` if the timeout expires, or the native
    /// error if the wait fails.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        match self.device.wait_for_fence(self.fence, timeout) {
            Ok(true) => Ok(()),
            Ok(false) => Err(RhiError::VulkanError(vk::Result::TIMEOUT)),
            Err(e) => Err(e.into()),
        }
    }

    /// Waits once, returning whether the fence was signaled before `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the native error when the wait itself fails.
    pub fn poll(&self, timeout: u64) -> Result<bool, vk::Result> {
        self.device.wait_for_fence(self.fence, timeout)
    }

    /// Resets the fence to the unsignaled state.
    ///
    /// The fence must not be in use by any queue operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset operation fails.
    pub fn reset(&self) -> RhiResult<()> {
        self.device.reset_fence(self.fence)
    }
}

impl<D: SyncDevice> Drop for Fence<D> {
    fn drop(&mut self) {
        self.device.destroy_fence(self.fence);
    }
}
