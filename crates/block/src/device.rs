//! Device operations used by render passes, pipelines and layouts.
//!
//! [`RenderDevice`] is the slice of the Vulkan device the render graph needs:
//! object creation for passes, framebuffers, layouts, shader modules and
//! pipelines, plus the handful of commands recorded around `on_process`
//! callbacks. [`Device`] implements it; tests substitute a recording mock.

use std::slice;

use ash::vk;
use lava_rhi::device::Device;
use lava_rhi::{RhiError, RhiResult};
use tracing::error;

/// Render graph side of the device.
pub trait RenderDevice {
    fn create_render_pass(
        &self,
        attachments: &[vk::AttachmentDescription],
        subpasses: &[vk::SubpassDescription<'_>],
        dependencies: &[vk::SubpassDependency],
    ) -> RhiResult<vk::RenderPass>;

    fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    /// Creates a single-layer framebuffer over `views`.
    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RhiResult<vk::Framebuffer>;

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> RhiResult<vk::DescriptorSetLayout>;

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    fn create_descriptor_pool(
        &self,
        sizes: &[vk::DescriptorPoolSize],
        max_sets: u32,
        flags: vk::DescriptorPoolCreateFlags,
    ) -> RhiResult<vk::DescriptorPool>;

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);

    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Vec<vk::DescriptorSet>>;

    fn free_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        sets: &[vk::DescriptorSet],
    ) -> RhiResult<()>;

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]);

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<vk::PipelineLayout>;

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);

    fn create_shader_module(&self, code: &[u32]) -> RhiResult<vk::ShaderModule>;

    fn destroy_shader_module(&self, module: vk::ShaderModule);

    fn create_graphics_pipeline(
        &self,
        cache: vk::PipelineCache,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> RhiResult<vk::Pipeline>;

    fn create_compute_pipeline(
        &self,
        cache: vk::PipelineCache,
        info: &vk::ComputePipelineCreateInfo<'_>,
    ) -> RhiResult<vk::Pipeline>;

    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    );

    fn cmd_next_subpass(&self, cmd: vk::CommandBuffer);

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer);

    fn cmd_bind_pipeline(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    );

    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewport: vk::Viewport);

    fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissor: vk::Rect2D);

    fn cmd_set_line_width(&self, cmd: vk::CommandBuffer, width: f32);

    fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    );
}

impl RenderDevice for Device {
    fn create_render_pass(
        &self,
        attachments: &[vk::AttachmentDescription],
        subpasses: &[vk::SubpassDescription<'_>],
        dependencies: &[vk::SubpassDependency],
    ) -> RhiResult<vk::RenderPass> {
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(attachments)
            .subpasses(subpasses)
            .dependencies(dependencies);

        let render_pass = unsafe {
            self.handle()
                .create_render_pass(&create_info, None)
                .map_err(|e| {
                    error!("Failed to create render pass: {:?}", e);
                    e
                })?
        };
        Ok(render_pass)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.handle().destroy_render_pass(render_pass, None) };
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RhiResult<vk::Framebuffer> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(views)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe {
            self.handle()
                .create_framebuffer(&create_info, None)
                .map_err(|e| {
                    error!("Failed to create framebuffer: {:?}", e);
                    e
                })?
        };
        Ok(framebuffer)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.handle().destroy_framebuffer(framebuffer, None) };
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> RhiResult<vk::DescriptorSetLayout> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        let layout = unsafe {
            self.handle()
                .create_descriptor_set_layout(&create_info, None)?
        };
        Ok(layout)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.handle().destroy_descriptor_set_layout(layout, None) };
    }

    fn create_descriptor_pool(
        &self,
        sizes: &[vk::DescriptorPoolSize],
        max_sets: u32,
        flags: vk::DescriptorPoolCreateFlags,
    ) -> RhiResult<vk::DescriptorPool> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(sizes)
            .max_sets(max_sets)
            .flags(flags);
        let pool = unsafe { self.handle().create_descriptor_pool(&create_info, None)? };
        Ok(pool)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.handle().destroy_descriptor_pool(pool, None) };
    }

    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(layouts);
        let sets = unsafe { self.handle().allocate_descriptor_sets(&alloc_info)? };
        Ok(sets)
    }

    fn free_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        sets: &[vk::DescriptorSet],
    ) -> RhiResult<()> {
        if sets.is_empty() {
            return Ok(());
        }
        unsafe { self.handle().free_descriptor_sets(pool, sets)? };
        Ok(())
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) {
        unsafe { self.handle().update_descriptor_sets(writes, &[]) };
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<vk::PipelineLayout> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);

        let layout = unsafe {
            self.handle()
                .create_pipeline_layout(&create_info, None)
                .map_err(|e| {
                    error!("Failed to create pipeline layout: {:?}", e);
                    e
                })?
        };
        Ok(layout)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.handle().destroy_pipeline_layout(layout, None) };
    }

    fn create_shader_module(&self, code: &[u32]) -> RhiResult<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        let module = unsafe {
            self.handle()
                .create_shader_module(&create_info, None)
                .map_err(|e| {
                    error!("Failed to create shader module: {:?}", e);
                    e
                })?
        };
        Ok(module)
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        unsafe { self.handle().destroy_shader_module(module, None) };
    }

    fn create_graphics_pipeline(
        &self,
        cache: vk::PipelineCache,
        info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> RhiResult<vk::Pipeline> {
        let pipelines = unsafe {
            self.handle()
                .create_graphics_pipelines(cache, slice::from_ref(info), None)
                .map_err(|(_, result)| {
                    error!("Failed to create graphics pipeline: {:?}", result);
                    result
                })?
        };
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::PipelineError("no graphics pipeline returned".to_string()))
    }

    fn create_compute_pipeline(
        &self,
        cache: vk::PipelineCache,
        info: &vk::ComputePipelineCreateInfo<'_>,
    ) -> RhiResult<vk::Pipeline> {
        let pipelines = unsafe {
            self.handle()
                .create_compute_pipelines(cache, slice::from_ref(info), None)
                .map_err(|(_, result)| {
                    error!("Failed to create compute pipeline: {:?}", result);
                    result
                })?
        };
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::PipelineError("no compute pipeline returned".to_string()))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.handle().destroy_pipeline(pipeline, None) };
    }

    fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) {
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(area)
            .clear_values(clear_values);

        unsafe {
            self.handle()
                .cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
        }
    }

    fn cmd_next_subpass(&self, cmd: vk::CommandBuffer) {
        unsafe {
            self.handle()
                .cmd_next_subpass(cmd, vk::SubpassContents::INLINE);
        }
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.handle().cmd_end_render_pass(cmd) };
    }

    fn cmd_bind_pipeline(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) {
        unsafe { self.handle().cmd_bind_pipeline(cmd, bind_point, pipeline) };
    }

    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewport: vk::Viewport) {
        unsafe { self.handle().cmd_set_viewport(cmd, 0, &[viewport]) };
    }

    fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissor: vk::Rect2D) {
        unsafe { self.handle().cmd_set_scissor(cmd, 0, &[scissor]) };
    }

    fn cmd_set_line_width(&self, cmd: vk::CommandBuffer, width: f32) {
        unsafe { self.handle().cmd_set_line_width(cmd, width) };
    }

    fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        unsafe {
            self.handle().cmd_bind_descriptor_sets(
                cmd,
                bind_point,
                layout,
                first_set,
                sets,
                dynamic_offsets,
            );
        }
    }
}
