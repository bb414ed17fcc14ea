//! Command pool and command buffer management.
//!
//! - [`CommandDevice`] is the device slice needed to manage pools and to
//!   begin and end recording. [`Device`] implements it.
//! - [`CommandPool`] owns one VkCommandPool and frees it on drop.
//! - [`CommandBuffer`] wraps a pool-owned VkCommandBuffer with the vertex
//!   bind and draw calls used inside recording callbacks.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use lava_rhi::device::Device;
//! use lava_rhi::command::{CommandPool, CommandDevice};
//! use ash::vk;
//!
//! # fn example(device: Arc<Device>) -> Result<(), lava_rhi::RhiError> {
//! let pool = CommandPool::new(device.clone(), device.graphics_family())?;
//! let buffers = pool.allocate(vk::CommandBufferLevel::PRIMARY, 1)?;
//!
//! device.begin_command_buffer(buffers[0], vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
//! // ... record rendering commands ...
//! device.end_command_buffer(buffers[0])?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Device operations for command pools and command buffer recording.
pub trait CommandDevice {
    fn create_command_pool(
        &self,
        queue_family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> RhiResult<vk::CommandPool>;

    fn destroy_command_pool(&self, pool: vk::CommandPool);

    /// Returns every buffer allocated from `pool` to the initial state.
    fn reset_command_pool(&self, pool: vk::CommandPool) -> RhiResult<()>;

    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
        count: u32,
    ) -> RhiResult<Vec<vk::CommandBuffer>>;

    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);

    fn begin_command_buffer(
        &self,
        buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> RhiResult<()>;

    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> RhiResult<()>;
}

impl CommandDevice for Device {
    fn create_command_pool(
        &self,
        queue_family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> RhiResult<vk::CommandPool> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(flags);

        let pool = unsafe { self.handle().create_command_pool(&create_info, None)? };
        Ok(pool)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.handle().destroy_command_pool(pool, None) };
    }

    fn reset_command_pool(&self, pool: vk::CommandPool) -> RhiResult<()> {
        unsafe {
            self.handle()
                .reset_command_pool(pool, vk::CommandPoolResetFlags::empty())?;
        }
        Ok(())
    }

    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
        count: u32,
    ) -> RhiResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(level)
            .command_buffer_count(count);

        let buffers = unsafe { self.handle().allocate_command_buffers(&alloc_info)? };
        Ok(buffers)
    }

    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        if buffers.is_empty() {
            return;
        }
        unsafe { self.handle().free_command_buffers(pool, buffers) };
    }

    fn begin_command_buffer(
        &self,
        buffer: vk::CommandBuffer,
        flags: vk::CommandBufferUsageFlags,
    ) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);

        unsafe {
            self.handle()
                .begin_command_buffer(buffer, &begin_info)
                .map_err(|e| {
                    error!("Failed to begin command buffer: {:?}", e);
                    e
                })?;
        }
        Ok(())
    }

    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> RhiResult<()> {
        unsafe {
            self.handle().end_command_buffer(buffer).map_err(|e| {
                error!("Failed to end command buffer: {:?}", e);
                e
            })?;
        }
        Ok(())
    }
}

/// Vulkan command pool wrapper.
///
/// A command pool is used to allocate command buffers. Each pool is associated
/// with a specific queue family and can only allocate command buffers that
/// will be submitted to queues of that family.
///
/// # Thread Safety
///
/// Command pools are not thread-safe. For multi-threaded command recording,
/// create a separate pool per thread.
pub struct CommandPool<D: CommandDevice = Device> {
    /// Reference to the logical device.
    device: Arc<D>,
    /// Vulkan command pool handle.
    pool: vk::CommandPool,
    /// Queue family index this pool belongs to.
    queue_family_index: u32,
}

impl<D: CommandDevice> CommandPool<D> {
    /// Creates a new command pool for the specified queue family.
    ///
    /// The pool is created with the `RESET_COMMAND_BUFFER` flag, so buffers
    /// may be reset individually as well as through [`CommandPool::reset`].
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `queue_family_index` - The queue family for command buffer submission
    ///
    /// # Errors
    ///
    /// Returns an error if command pool creation fails.
    pub fn new(device: Arc<D>, queue_family_index: u32) -> RhiResult<Self> {
        Self::with_flags(
            device,
            queue_family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )
    }

    /// Creates a command pool with explicit creation flags.
    ///
    /// # Errors
    ///
    /// Returns an error if command pool creation fails.
    pub fn with_flags(
        device: Arc<D>,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> RhiResult<Self> {
        let pool = device.create_command_pool(queue_family_index, flags)?;

        debug!(
            "Command pool created for queue family {}",
            queue_family_index
        );

        Ok(Self {
            device,
            pool,
            queue_family_index,
        })
    }

    /// Returns the Vulkan command pool handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Returns the queue family index this pool belongs to.
    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// Allocates `count` command buffers of the given level.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails or the driver returns fewer
    /// buffers than requested.
    pub fn allocate(
        &self,
        level: vk::CommandBufferLevel,
        count: u32,
    ) -> RhiResult<Vec<vk::CommandBuffer>> {
        let buffers = self.device.allocate_command_buffers(self.pool, level, count)?;
        if buffers.len() != count as usize {
            self.device.free_command_buffers(self.pool, &buffers);
            return Err(RhiError::CommandError(format!(
                "requested {count} command buffer(s), got {}",
                buffers.len()
            )));
        }
        Ok(buffers)
    }

    /// Allocates one primary command buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    pub fn allocate_primary(&self) -> RhiResult<vk::CommandBuffer> {
        let buffers = self.allocate(vk::CommandBufferLevel::PRIMARY, 1)?;
        buffers
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::CommandError("no command buffer allocated".to_string()))
    }

    /// Frees buffers previously allocated from this pool.
    pub fn free(&self, buffers: &[vk::CommandBuffer]) {
        self.device.free_command_buffers(self.pool, buffers);
    }

    /// Resets the pool, returning all of its command buffers to the initial
    /// state in one call.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset fails.
    pub fn reset(&self) -> RhiResult<()> {
        self.device.reset_command_pool(self.pool)
    }

    /// Returns a reference to the device.
    #[inline]
    pub fn device(&self) -> &Arc<D> {
        &self.device
    }
}

impl<D: CommandDevice> Drop for CommandPool<D> {
    fn drop(&mut self) {
        self.device.destroy_command_pool(self.pool);
        debug!(
            "Command pool destroyed for queue family {}",
            self.queue_family_index
        );
    }
}

/// Recording helper over a command buffer owned by a pool.
///
/// The wrapper does NOT own the underlying VkCommandBuffer handle. The handle
/// is freed when the owning pool frees it or is destroyed.
///
/// ```no_run
/// # use std::sync::Arc;
/// # use lava_rhi::device::Device;
/// # use lava_rhi::command::CommandBuffer;
/// # use ash::vk;
/// # fn example(device: Arc<Device>, cmd: vk::CommandBuffer) {
/// let cmd = CommandBuffer::from_handle(device, cmd);
/// cmd.draw(3, 1, 0, 0);
/// # }
/// ```
pub struct CommandBuffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan command buffer handle.
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    /// Wraps an existing command buffer handle.
    #[inline]
    pub fn from_handle(device: Arc<Device>, buffer: vk::CommandBuffer) -> Self {
        Self { device, buffer }
    }

    /// Returns the raw Vulkan command buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    /// Binds vertex buffers starting at `first_binding`.
    pub fn bind_vertex_buffers(
        &self,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    ) {
        unsafe {
            self.device.handle().cmd_bind_vertex_buffers(
                self.buffer,
                first_binding,
                buffers,
                offsets,
            );
        }
    }

    /// Issues a non-indexed draw command.
    ///
    /// # Arguments
    ///
    /// * `vertex_count` - Number of vertices to draw
    /// * `instance_count` - Number of instances to draw
    /// * `first_vertex` - Offset to the first vertex
    /// * `first_instance` - Offset to the first instance
    pub fn draw(
        &self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.handle().cmd_draw(
                self.buffer,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use ash::vk::Handle;

    use super::*;

    #[derive(Default)]
    struct PoolLog {
        events: RefCell<Vec<String>>,
        short_allocation: bool,
    }

    impl CommandDevice for PoolLog {
        fn create_command_pool(
            &self,
            queue_family: u32,
            _flags: vk::CommandPoolCreateFlags,
        ) -> RhiResult<vk::CommandPool> {
            self.events.borrow_mut().push(format!("create {queue_family}"));
            Ok(vk::CommandPool::from_raw(7))
        }
        fn destroy_command_pool(&self, pool: vk::CommandPool) {
            self.events.borrow_mut().push(format!("destroy {}", pool.as_raw()));
        }
        fn reset_command_pool(&self, _pool: vk::CommandPool) -> RhiResult<()> {
            self.events.borrow_mut().push("reset".to_string());
            Ok(())
        }
        fn allocate_command_buffers(
            &self,
            _pool: vk::CommandPool,
            _level: vk::CommandBufferLevel,
            count: u32,
        ) -> RhiResult<Vec<vk::CommandBuffer>> {
            let count = if self.short_allocation { count - 1 } else { count };
            Ok((0..count).map(|i| vk::CommandBuffer::from_raw(100 + i as u64)).collect())
        }
        fn free_command_buffers(&self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
            self.events.borrow_mut().push(format!("free {}", buffers.len()));
        }
        fn begin_command_buffer(
            &self,
            _buffer: vk::CommandBuffer,
            _flags: vk::CommandBufferUsageFlags,
        ) -> RhiResult<()> {
            Ok(())
        }
        fn end_command_buffer(&self, _buffer: vk::CommandBuffer) -> RhiResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_pool_lifecycle() {
        let device = Arc::new(PoolLog::default());
        {
            let pool = CommandPool::new(device.clone(), 3).unwrap();
            assert_eq!(pool.queue_family_index(), 3);
            assert_eq!(pool.allocate_primary().unwrap().as_raw(), 100);
            pool.reset().unwrap();
        }
        assert_eq!(*device.events.borrow(), vec!["create 3", "reset", "destroy 7"]);
    }

    #[test]
    fn test_short_allocation_is_an_error() {
        let device = Arc::new(PoolLog {
            short_allocation: true,
            ..Default::default()
        });
        let pool = CommandPool::new(device.clone(), 0).unwrap();
        let err = pool.allocate(vk::CommandBufferLevel::PRIMARY, 3).unwrap_err();
        assert!(matches!(err, RhiError::CommandError(_)));
        assert!(device.events.borrow().contains(&"free 2".to_string()));
    }

    #[test]
    fn test_command_buffer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CommandBuffer>();
    }

    #[test]
    fn test_command_pool_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CommandPool>();
    }
}
