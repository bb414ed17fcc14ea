//! Pipeline layout over shared descriptors and push constant ranges.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use ash::vk;
use lava_rhi::RhiResult;
use lava_rhi::device::Device;
use tracing::debug;

use crate::descriptor::DescriptorRef;
use crate::device::RenderDevice;

/// Shared handle to a pipeline layout.
pub type PipelineLayoutRef<D = Device> = Rc<RefCell<PipelineLayout<D>>>;

/// Creates an empty pipeline layout for `device`.
pub fn make_pipeline_layout<D: RenderDevice>(device: Arc<D>) -> PipelineLayoutRef<D> {
    Rc::new(RefCell::new(PipelineLayout::new(device)))
}

/// Descriptor set layouts and push constant ranges a pipeline's shaders expect.
///
/// Create the layout before any pipeline that references it; destroy it
/// only after those pipelines are gone.
pub struct PipelineLayout<D: RenderDevice = Device> {
    device: Arc<D>,
    layout: vk::PipelineLayout,
    descriptors: Vec<DescriptorRef<D>>,
    push_constant_ranges: Vec<vk::PushConstantRange>,
}

impl<D: RenderDevice> PipelineLayout<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            layout: vk::PipelineLayout::null(),
            descriptors: Vec::new(),
            push_constant_ranges: Vec::new(),
        }
    }

    /// Appends a descriptor; set numbers follow insertion order.
    pub fn add_descriptor(&mut self, descriptor: DescriptorRef<D>) {
        self.descriptors.push(descriptor);
    }

    pub fn add_push_constant_range(&mut self, range: vk::PushConstantRange) {
        self.push_constant_ranges.push(range);
    }

    pub fn clear_descriptors(&mut self) {
        self.descriptors.clear();
    }

    pub fn clear_ranges(&mut self) {
        self.push_constant_ranges.clear();
    }

    pub fn clear(&mut self) {
        self.clear_descriptors();
        self.clear_ranges();
    }

    #[inline]
    pub fn descriptors(&self) -> &[DescriptorRef<D>] {
        &self.descriptors
    }

    #[inline]
    pub fn push_constant_ranges(&self) -> &[vk::PushConstantRange] {
        &self.push_constant_ranges
    }

    /// Flattens the descriptors and ranges into a native pipeline layout.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn create(&mut self) -> RhiResult<()> {
        if self.layout != vk::PipelineLayout::null() {
            self.device.destroy_pipeline_layout(self.layout);
            self.layout = vk::PipelineLayout::null();
        }

        let set_layouts: Vec<vk::DescriptorSetLayout> = self
            .descriptors
            .iter()
            .map(|descriptor| descriptor.borrow().handle())
            .collect();

        self.layout = self
            .device
            .create_pipeline_layout(&set_layouts, &self.push_constant_ranges)?;

        debug!(
            "Created pipeline layout with {} descriptor set layout(s) and {} push constant range(s)",
            set_layouts.len(),
            self.push_constant_ranges.len()
        );
        Ok(())
    }

    /// Destroys the native layout and forgets its descriptors and ranges.
    pub fn destroy(&mut self) {
        self.clear();
        if self.layout == vk::PipelineLayout::null() {
            return;
        }
        self.device.destroy_pipeline_layout(self.layout);
        self.layout = vk::PipelineLayout::null();
        debug!("Pipeline layout destroyed");
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }

    #[inline]
    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Binds one descriptor set at `first_set`.
    pub fn bind_descriptor_set(
        &self,
        cmd: vk::CommandBuffer,
        set: vk::DescriptorSet,
        first_set: u32,
        offsets: &[u32],
        bind_point: vk::PipelineBindPoint,
    ) {
        self.device
            .cmd_bind_descriptor_sets(cmd, bind_point, self.layout, first_set, &[set], offsets);
    }

    /// Binds `set` as set 0 for graphics.
    pub fn bind(&self, cmd: vk::CommandBuffer, set: vk::DescriptorSet) {
        self.bind_descriptor_set(cmd, set, 0, &[], vk::PipelineBindPoint::GRAPHICS);
    }
}

impl<D: RenderDevice> Drop for PipelineLayout<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}
