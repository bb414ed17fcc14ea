//! Recording GPU and present target used by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use lava_rhi::command::CommandDevice;
use lava_rhi::swapchain::PresentTarget;
use lava_rhi::sync::{QueueSubmit, SyncDevice};
use lava_rhi::{RhiError, RhiResult};

/// One recorded queue submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub wait_semaphores: Vec<vk::Semaphore>,
    pub wait_stages: Vec<vk::PipelineStageFlags>,
    pub command_buffers: Vec<vk::CommandBuffer>,
    pub signal_semaphores: Vec<vk::Semaphore>,
    pub fence: vk::Fence,
}

#[derive(Default)]
pub struct MockGpu {
    events: RefCell<Vec<String>>,
    next_handle: Cell<u64>,
    /// Number of fence waits that report a timeout before succeeding.
    pub pending_timeouts: Cell<u32>,
    /// Error returned by the next fence wait.
    pub fence_error: Cell<Option<vk::Result>>,
    /// Fails the next submit only.
    pub fail_submit: Cell<bool>,
    pub submissions: RefCell<Vec<Submission>>,
}

#[allow(clippy::arc_with_non_send_sync)]
pub fn mock_gpu() -> Arc<MockGpu> {
    Arc::new(MockGpu::default())
}

impl MockGpu {
    fn handle(&self) -> u64 {
        let next = self.next_handle.get() + 1;
        self.next_handle.set(next);
        next
    }

    pub fn log(&self, event: impl Into<String>) {
        self.events.borrow_mut().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.starts_with(prefix))
            .count()
    }

    pub fn filtered(&self, prefixes: &[&str]) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter(|event| prefixes.iter().any(|prefix| event.starts_with(prefix)))
            .cloned()
            .collect()
    }
}

impl SyncDevice for MockGpu {
    fn create_fence(&self, signaled: bool) -> RhiResult<vk::Fence> {
        let fence = vk::Fence::from_raw(self.handle());
        self.log(format!("create_fence {} {}", fence.as_raw(), signaled));
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.log(format!("destroy_fence {}", fence.as_raw()));
    }

    fn create_semaphore(&self) -> RhiResult<vk::Semaphore> {
        Ok(vk::Semaphore::from_raw(self.handle()))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.log(format!("destroy_semaphore {}", semaphore.as_raw()));
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> Result<bool, vk::Result> {
        self.log(format!("wait_fence {}", fence.as_raw()));
        if let Some(error) = self.fence_error.take() {
            return Err(error);
        }
        let left = self.pending_timeouts.get();
        if left > 0 {
            self.pending_timeouts.set(left - 1);
            return Ok(false);
        }
        Ok(true)
    }

    fn reset_fence(&self, fence: vk::Fence) -> RhiResult<()> {
        self.log(format!("reset_fence {}", fence.as_raw()));
        Ok(())
    }

    fn submit_graphics(&self, submit: &QueueSubmit<'_>, fence: vk::Fence) -> RhiResult<()> {
        if self.fail_submit.take() {
            self.log(format!("submit_failed {}", fence.as_raw()));
            return Err(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST));
        }
        self.log(format!("submit {}", fence.as_raw()));
        self.submissions.borrow_mut().push(Submission {
            wait_semaphores: submit.wait_semaphores.to_vec(),
            wait_stages: submit.wait_stages.to_vec(),
            command_buffers: submit.command_buffers.to_vec(),
            signal_semaphores: submit.signal_semaphores.to_vec(),
            fence,
        });
        Ok(())
    }

    fn wait_idle(&self) -> RhiResult<()> {
        self.log("wait_idle");
        Ok(())
    }
}

impl CommandDevice for MockGpu {
    fn create_command_pool(
        &self,
        _queue_family: u32,
        _flags: vk::CommandPoolCreateFlags,
    ) -> RhiResult<vk::CommandPool> {
        Ok(vk::CommandPool::from_raw(self.handle()))
    }

    fn destroy_command_pool(&self, _pool: vk::CommandPool) {}

    fn reset_command_pool(&self, pool: vk::CommandPool) -> RhiResult<()> {
        self.log(format!("reset_pool {}", pool.as_raw()));
        Ok(())
    }

    fn allocate_command_buffers(
        &self,
        _pool: vk::CommandPool,
        _level: vk::CommandBufferLevel,
        count: u32,
    ) -> RhiResult<Vec<vk::CommandBuffer>> {
        Ok((0..count)
            .map(|_| vk::CommandBuffer::from_raw(self.handle()))
            .collect())
    }

    fn free_command_buffers(&self, _pool: vk::CommandPool, _buffers: &[vk::CommandBuffer]) {}

    fn begin_command_buffer(
        &self,
        buffer: vk::CommandBuffer,
        _flags: vk::CommandBufferUsageFlags,
    ) -> RhiResult<()> {
        self.log(format!("begin {}", buffer.as_raw()));
        Ok(())
    }

    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> RhiResult<()> {
        self.log(format!("end {}", buffer.as_raw()));
        Ok(())
    }
}

/// Present target with scripted acquire and present results.
///
/// Without a script, images are handed out round robin and presents
/// succeed.
pub struct MockTarget {
    gpu: Arc<MockGpu>,
    frames: usize,
    next_image: Cell<u32>,
    pub acquires: RefCell<VecDeque<Result<(u32, bool), vk::Result>>>,
    pub presents: RefCell<VecDeque<Result<bool, vk::Result>>>,
    pub reload_requested: bool,
}

impl MockTarget {
    pub fn new(gpu: &Arc<MockGpu>, frames: usize) -> Self {
        Self {
            gpu: gpu.clone(),
            frames,
            next_image: Cell::new(0),
            acquires: RefCell::new(VecDeque::new()),
            presents: RefCell::new(VecDeque::new()),
            reload_requested: false,
        }
    }
}

impl PresentTarget for MockTarget {
    fn frame_count(&self) -> usize {
        self.frames
    }

    fn acquire_next_image(&self, semaphore: vk::Semaphore, _timeout_ns: u64) -> Result<(u32, bool), vk::Result> {
        let result = self.acquires.borrow_mut().pop_front().unwrap_or_else(|| {
            let image = self.next_image.get();
            self.next_image.set((image + 1) % self.frames as u32);
            Ok((image, false))
        });
        self.gpu.log(format!("acquire {}", semaphore.as_raw()));
        result
    }

    fn present(&self, image_index: u32, wait_semaphore: vk::Semaphore) -> Result<bool, vk::Result> {
        self.gpu
            .log(format!("present {} {}", image_index, wait_semaphore.as_raw()));
        self.presents.borrow_mut().pop_front().unwrap_or(Ok(false))
    }

    fn request_reload(&mut self) {
        self.reload_requested = true;
    }
}
