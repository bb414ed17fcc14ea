//! Host-visible GPU buffers.
//!
//! Vertex, index and uniform data written from the CPU every frame lives in
//! [`Buffer`]s backed by gpu-allocator. A buffer read by in-flight frames
//! must not be rewritten until the renderer has waited on their fences, so
//! per-frame data is usually kept in one buffer per frame slot.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use lava_rhi::device::Device;
//! use lava_rhi::buffer::{Buffer, BufferUsage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), lava_rhi::RhiError> {
//! let vertices: [f32; 6] = [0.0, 0.5, -0.5, -0.5, 0.5, -0.5];
//! let vertex_buffer = Buffer::new_with_slice(device, BufferUsage::Vertex, &vertices)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Buffer usage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer - stores vertex data
    Vertex,
    /// Index buffer - stores index data
    Index,
    /// Uniform buffer - stores shader uniform data
    Uniform,
    /// Storage buffer - read and written by shaders
    Storage,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferUsage::Index => vk::BufferUsageFlags::INDEX_BUFFER,
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Storage => vk::BufferUsageFlags::STORAGE_BUFFER,
        }
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Storage => "storage",
        }
    }
}

/// Checks that `len` bytes at `offset` fit into a buffer of `size` bytes.
fn check_write_range(offset: vk::DeviceSize, len: usize, size: vk::DeviceSize) -> RhiResult<()> {
    let end = offset.checked_add(len as vk::DeviceSize);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(RhiError::InvalidHandle(format!(
            "Write exceeds buffer size: offset {} + data {} > buffer {}",
            offset, len, size
        ))),
    }
}

/// GPU buffer in host-visible memory.
///
/// The memory stays persistently mapped for the lifetime of the buffer.
pub struct Buffer {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan buffer handle.
    buffer: vk::Buffer,
    /// GPU memory allocation.
    allocation: Option<Allocation>,
    /// Buffer size in bytes.
    size: vk::DeviceSize,
    /// Buffer usage type.
    usage: BufferUsage,
}

impl Buffer {
    /// Creates a new buffer with the specified size.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `usage` - The intended buffer usage
    /// * `size` - Buffer size in bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero or buffer/memory allocation fails.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = device.allocator().and_then(|mut allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name: usage.name(),
                    requirements,
                    location: MemoryLocation::CpuToGpu,
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(RhiError::from)
        });

        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                error!("Failed to allocate {} buffer memory: {}", usage.name(), e);
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let bound = unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };

        let this = Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        };

        // Drop releases the allocation and the handle on failure
        bound?;
        debug!("Created {} buffer: {} bytes", usage.name(), size);

        Ok(this)
    }

    /// Creates a buffer sized for `data` and uploads it.
    ///
    /// # Errors
    ///
    /// Returns an error if buffer creation or data upload fails.
    pub fn new_with_slice<T: bytemuck::Pod>(
        device: Arc<Device>,
        usage: BufferUsage,
        data: &[T],
    ) -> RhiResult<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let buffer = Self::new(device, usage, bytes.len() as vk::DeviceSize)?;
        buffer.write_data(0, bytes)?;
        Ok(buffer)
    }

    /// Writes raw bytes to the buffer at the specified offset.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The buffer memory is not mapped
    /// - The write would exceed the buffer size
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        check_write_range(offset, data.len(), self.size)?;

        let allocation = self.allocation.as_ref().ok_or_else(|| {
            RhiError::InvalidHandle("Buffer allocation is not available".to_string())
        })?;

        let mapped_ptr = allocation
            .mapped_ptr()
            .ok_or_else(|| RhiError::InvalidHandle("Buffer memory is not mapped".to_string()))?;

        unsafe {
            let dst = mapped_ptr.as_ptr().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst as *mut u8, data.len());
        }

        Ok(())
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the buffer usage type.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free buffer allocation: {:?}", e);
                    }
                }
                Err(e) => error!("Leaking {} buffer allocation: {}", self.usage.name(), e),
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_to_vk_usage() {
        assert_eq!(BufferUsage::Vertex.to_vk_usage(), vk::BufferUsageFlags::VERTEX_BUFFER);
        assert_eq!(BufferUsage::Index.to_vk_usage(), vk::BufferUsageFlags::INDEX_BUFFER);
        assert_eq!(BufferUsage::Uniform.to_vk_usage(), vk::BufferUsageFlags::UNIFORM_BUFFER);
        assert_eq!(BufferUsage::Storage.to_vk_usage(), vk::BufferUsageFlags::STORAGE_BUFFER);
    }

    #[test]
    fn test_write_range() {
        assert!(check_write_range(0, 16, 16).is_ok());
        assert!(check_write_range(8, 8, 16).is_ok());
        assert!(check_write_range(8, 9, 16).is_err());
        assert!(check_write_range(u64::MAX, 1, 16).is_err());
    }
}
