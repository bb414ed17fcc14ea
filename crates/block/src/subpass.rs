//! Subpasses and the dependencies between them.

use std::cell::RefCell;
use std::rc::Rc;

use ash::vk;
use lava_rhi::device::Device;

use crate::device::RenderDevice;
use crate::graphics_pipeline::GraphicsPipelineRef;
use crate::pipeline::Pipeline;

/// Shared handle to a subpass.
pub type SubpassRef<D = Device> = Rc<RefCell<Subpass<D>>>;

/// Creates an empty subpass at `bind_point`.
pub fn make_subpass<D: RenderDevice>(bind_point: vk::PipelineBindPoint) -> SubpassRef<D> {
    Rc::new(RefCell::new(Subpass::new(bind_point)))
}

/// One stage of a render pass with the pipelines that draw into it.
pub struct Subpass<D: RenderDevice = Device> {
    bind_point: vk::PipelineBindPoint,
    color_attachments: Vec<vk::AttachmentReference>,
    depth_stencil_attachment: Option<vk::AttachmentReference>,
    input_attachments: Vec<vk::AttachmentReference>,
    resolve_attachments: Vec<vk::AttachmentReference>,
    preserve_attachments: Vec<u32>,
    pipelines: Vec<GraphicsPipelineRef<D>>,
    active: bool,
}

impl<D: RenderDevice> Default for Subpass<D> {
    fn default() -> Self {
        Self::new(vk::PipelineBindPoint::GRAPHICS)
    }
}

impl<D: RenderDevice> Subpass<D> {
    pub fn new(bind_point: vk::PipelineBindPoint) -> Self {
        Self {
            bind_point,
            color_attachments: Vec::new(),
            depth_stencil_attachment: None,
            input_attachments: Vec::new(),
            resolve_attachments: Vec::new(),
            preserve_attachments: Vec::new(),
            pipelines: Vec::new(),
            active: true,
        }
    }

    #[inline]
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        self.bind_point
    }

    pub fn set_bind_point(&mut self, bind_point: vk::PipelineBindPoint) {
        self.bind_point = bind_point;
    }

    pub fn set_color_attachment(&mut self, attachment: u32, layout: vk::ImageLayout) {
        self.set_color_attachments(&[vk::AttachmentReference { attachment, layout }]);
    }

    pub fn set_color_attachments(&mut self, attachments: &[vk::AttachmentReference]) {
        self.color_attachments = attachments.to_vec();
    }

    pub fn set_depth_stencil_attachment(&mut self, attachment: u32, layout: vk::ImageLayout) {
        self.depth_stencil_attachment = Some(vk::AttachmentReference { attachment, layout });
    }

    pub fn set_input_attachment(&mut self, attachment: u32, layout: vk::ImageLayout) {
        self.set_input_attachments(&[vk::AttachmentReference { attachment, layout }]);
    }

    pub fn set_input_attachments(&mut self, attachments: &[vk::AttachmentReference]) {
        self.input_attachments = attachments.to_vec();
    }

    pub fn set_resolve_attachment(&mut self, attachment: u32, layout: vk::ImageLayout) {
        self.set_resolve_attachments(&[vk::AttachmentReference { attachment, layout }]);
    }

    pub fn set_resolve_attachments(&mut self, attachments: &[vk::AttachmentReference]) {
        self.resolve_attachments = attachments.to_vec();
    }

    pub fn add_preserve_attachment(&mut self, attachment: u32) {
        self.preserve_attachments.push(attachment);
    }

    pub fn set_preserve_attachments(&mut self, attachments: &[u32]) {
        self.preserve_attachments = attachments.to_vec();
    }

    #[inline]
    pub fn color_attachments(&self) -> &[vk::AttachmentReference] {
        &self.color_attachments
    }

    #[inline]
    pub fn depth_stencil_attachment(&self) -> Option<&vk::AttachmentReference> {
        self.depth_stencil_attachment.as_ref()
    }

    /// Native description borrowing this subpass's reference lists.
    pub fn description(&self) -> vk::SubpassDescription<'_> {
        let mut description = vk::SubpassDescription::default()
            .pipeline_bind_point(self.bind_point)
            .color_attachments(&self.color_attachments)
            .input_attachments(&self.input_attachments)
            .preserve_attachments(&self.preserve_attachments);

        if !self.resolve_attachments.is_empty() {
            description = description.resolve_attachments(&self.resolve_attachments);
        }
        if let Some(depth) = self.depth_stencil_attachment.as_ref() {
            description = description.depth_stencil_attachment(depth);
        }
        description
    }

    // Activity toggling at this level is not mirrored in the native subpass
    // graph; see `RenderPass::process`.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    #[inline]
    pub fn activated(&self) -> bool {
        self.active
    }

    pub fn add(&mut self, pipeline: GraphicsPipelineRef<D>) {
        self.pipelines.push(pipeline);
    }

    pub fn add_front(&mut self, pipeline: GraphicsPipelineRef<D>) {
        self.pipelines.insert(0, pipeline);
    }

    /// Removes `pipeline` without destroying it.
    pub fn remove(&mut self, pipeline: &GraphicsPipelineRef<D>) -> bool {
        let before = self.pipelines.len();
        self.pipelines.retain(|p| !Rc::ptr_eq(p, pipeline));
        self.pipelines.len() != before
    }

    /// Destroys and removes every pipeline.
    pub fn clear_pipelines(&mut self) {
        for pipeline in self.pipelines.drain(..) {
            pipeline.borrow_mut().destroy();
        }
    }

    #[inline]
    pub fn pipelines(&self) -> &[GraphicsPipelineRef<D>] {
        &self.pipelines
    }

    /// Drives the subpass's pipelines for a target of `size`.
    ///
    /// Pipelines that are inactive or have no `on_process` callback are
    /// skipped. The callback is detached while it runs, so it may borrow its
    /// own pipeline.
    pub fn process(&self, cmd: vk::CommandBuffer, size: vk::Extent2D) {
        for pipeline in &self.pipelines {
            let mut callback = {
                let mut p = pipeline.borrow_mut();
                if !p.activated() {
                    continue;
                }
                let Some(callback) = p.base_mut().take_on_process() else {
                    continue;
                };

                if p.auto_bind() {
                    p.bind(cmd);
                }
                if p.auto_sizing() {
                    p.set_viewport_and_scissor(cmd, size);
                }
                if p.auto_line_width() {
                    p.apply_line_width(cmd);
                }
                callback
            };

            callback(cmd);
            pipeline.borrow_mut().base_mut().restore_on_process(callback);
        }
    }
}

/// Synchronization between two subpasses of a render pass.
#[derive(Clone, Copy, Debug)]
pub struct SubpassDependency {
    dependency: vk::SubpassDependency,
}

impl Default for SubpassDependency {
    fn default() -> Self {
        Self {
            dependency: vk::SubpassDependency {
                src_subpass: 0,
                dst_subpass: 0,
                src_stage_mask: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage_mask: vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                src_access_mask: vk::AccessFlags::empty(),
                dst_access_mask: vk::AccessFlags::empty(),
                dependency_flags: vk::DependencyFlags::empty(),
            },
        }
    }
}

impl SubpassDependency {
    #[inline]
    pub fn dependency(&self) -> &vk::SubpassDependency {
        &self.dependency
    }

    /// Source and destination subpass; `vk::SUBPASS_EXTERNAL` is allowed.
    pub fn set_subpass(&mut self, src: u32, dst: u32) -> &mut Self {
        self.dependency.src_subpass = src;
        self.dependency.dst_subpass = dst;
        self
    }

    pub fn set_stage_mask(
        &mut self,
        src: vk::PipelineStageFlags,
        dst: vk::PipelineStageFlags,
    ) -> &mut Self {
        self.dependency.src_stage_mask = src;
        self.dependency.dst_stage_mask = dst;
        self
    }

    pub fn set_access_mask(&mut self, src: vk::AccessFlags, dst: vk::AccessFlags) -> &mut Self {
        self.dependency.src_access_mask = src;
        self.dependency.dst_access_mask = dst;
        self
    }

    pub fn set_dependency_flags(&mut self, flags: vk::DependencyFlags) -> &mut Self {
        self.dependency.dependency_flags = flags;
        self
    }
}

/// Dependency from `src` to `dst`, usually with `BY_REGION` flags.
pub fn make_subpass_dependency(src: u32, dst: u32, flags: vk::DependencyFlags) -> SubpassDependency {
    let mut dependency = SubpassDependency::default();
    dependency.set_subpass(src, dst).set_dependency_flags(flags);
    dependency
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_defaults() {
        let dependency = SubpassDependency::default();
        let raw = dependency.dependency();
        assert_eq!(raw.src_subpass, 0);
        assert_eq!(raw.dst_subpass, 0);
        assert_eq!(raw.src_stage_mask, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(raw.dst_stage_mask, vk::PipelineStageFlags::BOTTOM_OF_PIPE);
        assert!(raw.src_access_mask.is_empty());
        assert!(raw.dependency_flags.is_empty());
    }

    #[test]
    fn test_make_subpass_dependency() {
        let dependency =
            make_subpass_dependency(vk::SUBPASS_EXTERNAL, 0, vk::DependencyFlags::BY_REGION);
        let raw = dependency.dependency();
        assert_eq!(raw.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(raw.dst_subpass, 0);
        assert_eq!(raw.dependency_flags, vk::DependencyFlags::BY_REGION);
    }

    #[test]
    fn test_subpass_description_references() {
        let mut subpass: Subpass = Subpass::default();
        subpass.set_color_attachment(0, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        subpass.set_depth_stencil_attachment(1, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
        subpass.add_preserve_attachment(2);

        let description = subpass.description();
        assert_eq!(description.pipeline_bind_point, vk::PipelineBindPoint::GRAPHICS);
        assert_eq!(description.color_attachment_count, 1);
        assert_eq!(description.preserve_attachment_count, 1);
        assert!(description.p_resolve_attachments.is_null());
        assert!(!description.p_depth_stencil_attachment.is_null());
    }
}
