//! Descriptor set layouts and pools.
//!
//! A [`Descriptor`] accumulates bindings, then `create` turns them into a
//! VkDescriptorSetLayout. Pipeline layouts hold descriptors by shared
//! reference, so a descriptor must outlive every layout built from it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use lava_rhi::device::Device;
//! use lava_block::descriptor::{make_descriptor, DescriptorPool};
//!
//! # fn example(device: Arc<Device>) -> Result<(), lava_rhi::RhiError> {
//! let descriptor = make_descriptor(device.clone());
//! descriptor
//!     .borrow_mut()
//!     .add_binding(0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX);
//! descriptor.borrow_mut().create()?;
//!
//! let sizes = [vk::DescriptorPoolSize::default()
//!     .ty(vk::DescriptorType::UNIFORM_BUFFER)
//!     .descriptor_count(2)];
//! let mut pool = DescriptorPool::new(device);
//! pool.create(&sizes, 2, vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)?;
//!
//! let set = descriptor.borrow().allocate_set(pool.handle())?;
//! # Ok(())
//! # }
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use ash::vk;
use lava_rhi::device::Device;
use lava_rhi::{RhiError, RhiResult};
use tracing::debug;

use crate::device::RenderDevice;

/// Shared handle to a descriptor set layout.
pub type DescriptorRef<D = Device> = Rc<RefCell<Descriptor<D>>>;

/// Creates an empty descriptor for `device`.
pub fn make_descriptor<D: RenderDevice>(device: Arc<D>) -> DescriptorRef<D> {
    Rc::new(RefCell::new(Descriptor::new(device)))
}

/// Descriptor set layout with its binding list.
pub struct Descriptor<D: RenderDevice = Device> {
    device: Arc<D>,
    layout: vk::DescriptorSetLayout,
    bindings: Vec<vk::DescriptorSetLayoutBinding<'static>>,
}

impl<D: RenderDevice> Descriptor<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            layout: vk::DescriptorSetLayout::null(),
            bindings: Vec::new(),
        }
    }

    /// Adds a single-descriptor binding at `binding`.
    pub fn add_binding(
        &mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
    ) {
        self.add(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(1)
                .stage_flags(stage_flags),
        );
    }

    pub fn add(&mut self, binding: vk::DescriptorSetLayoutBinding<'static>) {
        self.bindings.push(binding);
    }

    pub fn clear_bindings(&mut self) {
        self.bindings.clear();
    }

    #[inline]
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding<'static>] {
        &self.bindings
    }

    #[inline]
    pub fn binding_count(&self) -> u32 {
        self.bindings.len() as u32
    }

    /// Creates the native layout from the accumulated bindings.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn create(&mut self) -> RhiResult<()> {
        if self.layout != vk::DescriptorSetLayout::null() {
            self.destroy();
        }
        self.layout = self.device.create_descriptor_set_layout(&self.bindings)?;
        debug!(
            "Created descriptor set layout with {} binding(s)",
            self.bindings.len()
        );
        Ok(())
    }

    /// Destroys the native layout. Bindings are kept.
    pub fn destroy(&mut self) {
        if self.layout == vk::DescriptorSetLayout::null() {
            return;
        }
        self.device.destroy_descriptor_set_layout(self.layout);
        self.layout = vk::DescriptorSetLayout::null();
        debug!("Destroyed descriptor set layout");
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    #[inline]
    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Allocates one set with this layout from `pool`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is exhausted or the layout is not created.
    pub fn allocate_set(&self, pool: vk::DescriptorPool) -> RhiResult<vk::DescriptorSet> {
        self.allocate_sets(1, pool)?
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::InvalidHandle("no descriptor set allocated".to_string()))
    }

    /// Allocates `count` sets with this layout from `pool`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is exhausted or the layout is not created.
    pub fn allocate_sets(
        &self,
        count: u32,
        pool: vk::DescriptorPool,
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        if self.layout == vk::DescriptorSetLayout::null() {
            return Err(RhiError::InvalidHandle(
                "descriptor set layout not created".to_string(),
            ));
        }
        let layouts = vec![self.layout; count as usize];
        self.device.allocate_descriptor_sets(pool, &layouts)
    }

    /// Returns `sets` to `pool`. The pool must allow freeing individual sets.
    ///
    /// # Errors
    ///
    /// Returns an error if freeing fails.
    pub fn free_sets(&self, sets: &[vk::DescriptorSet], pool: vk::DescriptorPool) -> RhiResult<()> {
        self.device.free_descriptor_sets(pool, sets)
    }

    /// Points `binding` of `set` at `info`, using the type the binding was
    /// declared with.
    ///
    /// # Errors
    ///
    /// Returns an error if this descriptor has no such binding.
    pub fn write_buffer(
        &self,
        set: vk::DescriptorSet,
        binding: u32,
        info: &[vk::DescriptorBufferInfo],
    ) -> RhiResult<()> {
        let declared = self
            .bindings
            .iter()
            .find(|entry| entry.binding == binding)
            .ok_or_else(|| RhiError::InvalidHandle(format!("no descriptor binding {}", binding)))?;

        let write = buffer_write(set, binding, declared.descriptor_type, info);
        self.device.update_descriptor_sets(&[write]);
        Ok(())
    }
}

impl<D: RenderDevice> Drop for Descriptor<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Descriptor pool sized up front for a fixed number of sets.
pub struct DescriptorPool<D: RenderDevice = Device> {
    device: Arc<D>,
    pool: vk::DescriptorPool,
    sizes: Vec<vk::DescriptorPoolSize>,
    max_sets: u32,
}

impl<D: RenderDevice> DescriptorPool<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            pool: vk::DescriptorPool::null(),
            sizes: Vec::new(),
            max_sets: 0,
        }
    }

    /// Creates the native pool.
    ///
    /// # Arguments
    ///
    /// * `sizes` - Descriptor counts per type
    /// * `max_sets` - Maximum number of sets allocated at once
    /// * `flags` - Usually `FREE_DESCRIPTOR_SET`
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation fails.
    pub fn create(
        &mut self,
        sizes: &[vk::DescriptorPoolSize],
        max_sets: u32,
        flags: vk::DescriptorPoolCreateFlags,
    ) -> RhiResult<()> {
        self.destroy();
        self.pool = self.device.create_descriptor_pool(sizes, max_sets, flags)?;
        self.sizes = sizes.to_vec();
        self.max_sets = max_sets;
        debug!(
            "Created descriptor pool: max_sets={}, pool_sizes={}",
            max_sets,
            sizes.len()
        );
        Ok(())
    }

    pub fn destroy(&mut self) {
        if self.pool == vk::DescriptorPool::null() {
            return;
        }
        self.device.destroy_descriptor_pool(self.pool);
        self.pool = vk::DescriptorPool::null();
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    #[inline]
    pub fn sizes(&self) -> &[vk::DescriptorPoolSize] {
        &self.sizes
    }

    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl<D: RenderDevice> Drop for DescriptorPool<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Write for a single uniform or storage buffer binding.
pub fn buffer_write<'a>(
    set: vk::DescriptorSet,
    binding: u32,
    descriptor_type: vk::DescriptorType,
    info: &'a [vk::DescriptorBufferInfo],
) -> vk::WriteDescriptorSet<'a> {
    vk::WriteDescriptorSet::default()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(descriptor_type)
        .buffer_info(info)
}
