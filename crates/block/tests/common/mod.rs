//! Recording device used by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use lava_block::RenderDevice;
use lava_rhi::command::CommandDevice;
use lava_rhi::{RhiError, RhiResult};

/// Minimal valid SPIR-V word stream: the magic number plus a header word.
pub const SPIRV: [u8; 8] = [0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00];

#[derive(Default)]
pub struct MockDevice {
    events: RefCell<Vec<String>>,
    next_handle: Cell<u64>,
    pub fail_framebuffer_after: Cell<Option<usize>>,
    pub fail_begin: Cell<bool>,
    framebuffers_created: Cell<usize>,
    pub clear_values: RefCell<Vec<Vec<vk::ClearValue>>>,
    pub viewports: RefCell<Vec<vk::Viewport>>,
    pub scissors: RefCell<Vec<vk::Rect2D>>,
    pub stage_counts: RefCell<Vec<u32>>,
}

#[allow(clippy::arc_with_non_send_sync)]
pub fn mock_device() -> Arc<MockDevice> {
    Arc::new(MockDevice::default())
}

impl MockDevice {
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

    /// Events starting with one of `prefixes`, in order.
    pub fn filtered(&self, prefixes: &[&str]) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter(|event| prefixes.iter().any(|prefix| event.starts_with(prefix)))
            .cloned()
            .collect()
    }
}

impl CommandDevice for MockDevice {
    fn create_command_pool(
        &self,
        _queue_family: u32,
        _flags: vk::CommandPoolCreateFlags,
    ) -> RhiResult<vk::CommandPool> {
        let pool = vk::CommandPool::from_raw(self.handle());
        self.log(format!("create_pool {}", pool.as_raw()));
        Ok(pool)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.log(format!("destroy_pool {}", pool.as_raw()));
    }

    fn reset_command_pool(&self, pool: vk::CommandPool) -> RhiResult<()> {
        self.log(format!("reset {}", pool.as_raw()));
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

    fn free_command_buffers(&self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        for buffer in buffers {
            self.log(format!("free {}", buffer.as_raw()));
        }
    }

    fn begin_command_buffer(
        &self,
        buffer: vk::CommandBuffer,
        _flags: vk::CommandBufferUsageFlags,
    ) -> RhiResult<()> {
        if self.fail_begin.get() {
            return Err(RhiError::VulkanError(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        }
        self.log(format!("begin {}", buffer.as_raw()));
        Ok(())
    }

    fn end_command_buffer(&self, buffer: vk::CommandBuffer) -> RhiResult<()> {
        self.log(format!("end {}", buffer.as_raw()));
        Ok(())
    }
}

impl RenderDevice for MockDevice {
    fn create_render_pass(
        &self,
        attachments: &[vk::AttachmentDescription],
        subpasses: &[vk::SubpassDescription<'_>],
        _dependencies: &[vk::SubpassDependency],
    ) -> RhiResult<vk::RenderPass> {
        self.log(format!(
            "create_render_pass {} {}",
            attachments.len(),
            subpasses.len()
        ));
        Ok(vk::RenderPass::from_raw(self.handle()))
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.log(format!("destroy_render_pass {}", render_pass.as_raw()));
    }

    fn create_framebuffer(
        &self,
        _render_pass: vk::RenderPass,
        views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RhiResult<vk::Framebuffer> {
        let created = self.framebuffers_created.get();
        if self.fail_framebuffer_after.get() == Some(created) {
            return Err(RhiError::VulkanError(vk::Result::ERROR_OUT_OF_HOST_MEMORY));
        }
        self.framebuffers_created.set(created + 1);

        let framebuffer = vk::Framebuffer::from_raw(self.handle());
        self.log(format!(
            "create_framebuffer {} {} {}x{}",
            framebuffer.as_raw(),
            views.len(),
            extent.width,
            extent.height
        ));
        Ok(framebuffer)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.log(format!("destroy_framebuffer {}", framebuffer.as_raw()));
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> RhiResult<vk::DescriptorSetLayout> {
        self.log(format!("create_set_layout {}", bindings.len()));
        Ok(vk::DescriptorSetLayout::from_raw(self.handle()))
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.log(format!("destroy_set_layout {}", layout.as_raw()));
    }

    fn create_descriptor_pool(
        &self,
        sizes: &[vk::DescriptorPoolSize],
        max_sets: u32,
        _flags: vk::DescriptorPoolCreateFlags,
    ) -> RhiResult<vk::DescriptorPool> {
        self.log(format!("create_descriptor_pool {} {}", sizes.len(), max_sets));
        Ok(vk::DescriptorPool::from_raw(self.handle()))
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.log(format!("destroy_descriptor_pool {}", pool.as_raw()));
    }

    fn allocate_descriptor_sets(
        &self,
        _pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        Ok(layouts
            .iter()
            .map(|_| vk::DescriptorSet::from_raw(self.handle()))
            .collect())
    }

    fn free_descriptor_sets(
        &self,
        _pool: vk::DescriptorPool,
        sets: &[vk::DescriptorSet],
    ) -> RhiResult<()> {
        self.log(format!("free_sets {}", sets.len()));
        Ok(())
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) {
        self.log(format!("update_sets {}", writes.len()));
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<vk::PipelineLayout> {
        self.log(format!(
            "create_layout {} {}",
            set_layouts.len(),
            push_constant_ranges.len()
        ));
        Ok(vk::PipelineLayout::from_raw(self.handle()))
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.log(format!("destroy_layout {}", layout.as_raw()));
    }

    fn create_shader_module(&self, code: &[u32]) -> RhiResult<vk::ShaderModule> {
        self.log(format!("create_shader {}", code.len()));
        Ok(vk::ShaderModule::from_raw(self.handle()))
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.log(format!("destroy_shader {}", module.as_raw()));
    }

    fn create_graphics_pipeline(
        &self,
        _cache: vk::PipelineCache,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> RhiResult<vk::Pipeline> {
        self.stage_counts.borrow_mut().push(info.stage_count);
        let pipeline = vk::Pipeline::from_raw(self.handle());
        self.log(format!("create_graphics_pipeline {}", pipeline.as_raw()));
        Ok(pipeline)
    }

    fn create_compute_pipeline(
        &self,
        _cache: vk::PipelineCache,
        _info: &vk::ComputePipelineCreateInfo<'_>,
    ) -> RhiResult<vk::Pipeline> {
        let pipeline = vk::Pipeline::from_raw(self.handle());
        self.log(format!("create_compute_pipeline {}", pipeline.as_raw()));
        Ok(pipeline)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.log(format!("destroy_pipeline {}", pipeline.as_raw()));
    }

    fn cmd_begin_render_pass(
        &self,
        _cmd: vk::CommandBuffer,
        _render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        _area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) {
        self.clear_values.borrow_mut().push(clear_values.to_vec());
        self.log(format!("begin_render_pass {}", framebuffer.as_raw()));
    }

    fn cmd_next_subpass(&self, _cmd: vk::CommandBuffer) {
        self.log("next_subpass");
    }

    fn cmd_end_render_pass(&self, _cmd: vk::CommandBuffer) {
        self.log("end_render_pass");
    }

    fn cmd_bind_pipeline(
        &self,
        _cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) {
        let point = if bind_point == vk::PipelineBindPoint::COMPUTE {
            "compute"
        } else {
            "graphics"
        };
        self.log(format!("bind_pipeline {} {}", point, pipeline.as_raw()));
    }

    fn cmd_set_viewport(&self, _cmd: vk::CommandBuffer, viewport: vk::Viewport) {
        self.viewports.borrow_mut().push(viewport);
        self.log("set_viewport");
    }

    fn cmd_set_scissor(&self, _cmd: vk::CommandBuffer, scissor: vk::Rect2D) {
        self.scissors.borrow_mut().push(scissor);
        self.log("set_scissor");
    }

    fn cmd_set_line_width(&self, _cmd: vk::CommandBuffer, width: f32) {
        self.log(format!("set_line_width {width}"));
    }

    fn cmd_bind_descriptor_sets(
        &self,
        _cmd: vk::CommandBuffer,
        _bind_point: vk::PipelineBindPoint,
        _layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        _dynamic_offsets: &[u32],
    ) {
        self.log(format!("bind_sets {} {}", first_set, sets.len()));
    }
}
