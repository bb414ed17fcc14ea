//! Render pass with per-frame framebuffers.
//!
//! A [`RenderPass`] accumulates attachments, subpasses and dependencies, then
//! `create` builds the native pass plus one framebuffer per frame slot. It
//! implements [`TargetCallback`], so once registered with a render target its
//! framebuffers follow swapchain resizes.
//!
//! Attachment order is significant: it is the index used by subpass
//! references, the order of clear values and the order of the image views
//! supplied per frame slot.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use lava_rhi::device::Device;
//! use lava_block::{make_render_pass, make_subpass, Attachment, make_subpass_dependency};
//!
//! # fn example(device: Arc<Device>, format: vk::Format, views: Vec<Vec<vk::ImageView>>, area: vk::Rect2D) -> Result<(), lava_rhi::RhiError> {
//! let mut color = Attachment::new(format, vk::SampleCountFlags::TYPE_1);
//! color
//!     .set_op(vk::AttachmentLoadOp::CLEAR, vk::AttachmentStoreOp::STORE)
//!     .set_final_layout(vk::ImageLayout::PRESENT_SRC_KHR);
//!
//! let subpass = make_subpass(vk::PipelineBindPoint::GRAPHICS);
//! subpass
//!     .borrow_mut()
//!     .set_color_attachment(0, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
//!
//! let pass = make_render_pass(device);
//! {
//!     let mut pass = pass.borrow_mut();
//!     pass.add_attachment(color);
//!     pass.add_subpass(subpass);
//!     pass.add_dependency(make_subpass_dependency(vk::SUBPASS_EXTERNAL, 0, vk::DependencyFlags::BY_REGION));
//!     pass.set_clear_color([0.1, 0.1, 0.1]);
//!     pass.create(&views, area)?;
//! }
//! # Ok(())
//! # }
//! ```

use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use ash::vk;
use lava_rhi::device::Device;
use lava_rhi::swapchain::TargetCallback;
use lava_rhi::{RhiError, RhiResult};
use tracing::{debug, error, info, warn};

use crate::attachment::{Attachment, is_depth_stencil_format};
use crate::device::RenderDevice;
use crate::graphics_pipeline::GraphicsPipelineRef;
use crate::subpass::{Subpass, SubpassDependency, SubpassRef};

/// Shared handle to a render pass.
pub type RenderPassRef<D = Device> = Rc<RefCell<RenderPass<D>>>;

/// Creates an empty render pass for `device`.
pub fn make_render_pass<D: RenderDevice>(device: Arc<D>) -> RenderPassRef<D> {
    Rc::new(RefCell::new(RenderPass::new(device)))
}

/// Clear value used for an attachment without an explicit one.
fn default_clear_value(format: vk::Format) -> vk::ClearValue {
    if is_depth_stencil_format(format) {
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        }
    } else {
        vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        }
    }
}

pub struct RenderPass<D: RenderDevice = Device> {
    device: Arc<D>,
    render_pass: vk::RenderPass,
    attachments: Vec<Attachment>,
    subpasses: Vec<SubpassRef<D>>,
    dependencies: Vec<SubpassDependency>,
    framebuffers: Vec<vk::Framebuffer>,
    clear_values: Vec<vk::ClearValue>,
    clear_color: [f32; 3],
    area: vk::Rect2D,
}

impl<D: RenderDevice> RenderPass<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            render_pass: vk::RenderPass::null(),
            attachments: Vec::new(),
            subpasses: Vec::new(),
            dependencies: Vec::new(),
            framebuffers: Vec::new(),
            clear_values: Vec::new(),
            clear_color: [0.0; 3],
            area: vk::Rect2D::default(),
        }
    }

    /// Appends an attachment; its index is the current attachment count.
    pub fn add_attachment(&mut self, attachment: Attachment) -> u32 {
        self.attachments.push(attachment);
        (self.attachments.len() - 1) as u32
    }

    pub fn add_subpass(&mut self, subpass: SubpassRef<D>) {
        self.subpasses.push(subpass);
    }

    pub fn add_dependency(&mut self, dependency: SubpassDependency) {
        self.dependencies.push(dependency);
    }

    /// Builds the native pass and one framebuffer per entry of
    /// `target_attachments`, each sized to `area`.
    ///
    /// # Errors
    ///
    /// Returns an error if pass or framebuffer creation fails. Nothing
    /// created by this call is kept in that case.
    pub fn create(
        &mut self,
        target_attachments: &[Vec<vk::ImageView>],
        area: vk::Rect2D,
    ) -> RhiResult<()> {
        if self.render_pass != vk::RenderPass::null() {
            warn!("Render pass created twice, releasing the previous one");
            self.destroy_framebuffers();
            self.device.destroy_render_pass(self.render_pass);
            self.render_pass = vk::RenderPass::null();
        }

        let attachments: Vec<vk::AttachmentDescription> = self
            .attachments
            .iter()
            .map(|attachment| *attachment.description())
            .collect();
        let dependencies: Vec<vk::SubpassDependency> = self
            .dependencies
            .iter()
            .map(|dependency| *dependency.dependency())
            .collect();

        let render_pass = {
            let subpasses: Vec<Ref<'_, Subpass<D>>> =
                self.subpasses.iter().map(|subpass| subpass.borrow()).collect();
            let descriptions: Vec<vk::SubpassDescription<'_>> =
                subpasses.iter().map(|subpass| subpass.description()).collect();

            self.device
                .create_render_pass(&attachments, &descriptions, &dependencies)?
        };
        self.render_pass = render_pass;

        if let Err(e) = self.create_framebuffers(target_attachments, area) {
            self.device.destroy_render_pass(self.render_pass);
            self.render_pass = vk::RenderPass::null();
            return Err(e);
        }

        info!(
            "Render pass created: {} attachment(s), {} subpass(es), {} framebuffer(s)",
            self.attachments.len(),
            self.subpasses.len(),
            self.framebuffers.len()
        );
        Ok(())
    }

    fn create_framebuffers(
        &mut self,
        target_attachments: &[Vec<vk::ImageView>],
        area: vk::Rect2D,
    ) -> RhiResult<()> {
        let mut framebuffers = Vec::with_capacity(target_attachments.len());

        for (slot, views) in target_attachments.iter().enumerate() {
            if views.len() != self.attachments.len() {
                error!(
                    "Frame slot {} supplies {} view(s) for {} attachment(s)",
                    slot,
                    views.len(),
                    self.attachments.len()
                );
                self.release_framebuffers(&framebuffers);
                return Err(RhiError::RenderPassError(format!(
                    "slot {slot} has {} view(s), pass has {} attachment(s)",
                    views.len(),
                    self.attachments.len()
                )));
            }

            match self
                .device
                .create_framebuffer(self.render_pass, views, area.extent)
            {
                Ok(framebuffer) => framebuffers.push(framebuffer),
                Err(e) => {
                    self.release_framebuffers(&framebuffers);
                    return Err(e);
                }
            }
        }

        self.framebuffers = framebuffers;
        self.area = area;
        debug!(
            "Created {} framebuffer(s) at {}x{}",
            self.framebuffers.len(),
            area.extent.width,
            area.extent.height
        );
        Ok(())
    }

    fn release_framebuffers(&self, framebuffers: &[vk::Framebuffer]) {
        for &framebuffer in framebuffers {
            self.device.destroy_framebuffer(framebuffer);
        }
    }

    fn destroy_framebuffers(&mut self) {
        let framebuffers = std::mem::take(&mut self.framebuffers);
        self.release_framebuffers(&framebuffers);
    }

    /// Releases framebuffers and the native pass, destroys the subpasses'
    /// pipelines and forgets the accumulated descriptions. Safe to call more
    /// than once.
    pub fn destroy(&mut self) {
        self.attachments.clear();
        self.dependencies.clear();

        for subpass in self.subpasses.drain(..) {
            subpass.borrow_mut().clear_pipelines();
        }

        self.destroy_framebuffers();

        if self.render_pass != vk::RenderPass::null() {
            self.device.destroy_render_pass(self.render_pass);
            self.render_pass = vk::RenderPass::null();
            debug!("Render pass destroyed");
        }
    }

    /// Records the pass into `cmd` using the framebuffer of `frame`.
    ///
    /// Inactive subpasses are skipped without a subpass transition, so
    /// subpass activity has to match the native subpass graph. Toggle
    /// pipelines within a subpass instead.
    pub fn process(&self, cmd: vk::CommandBuffer, frame: usize) {
        let Some(&framebuffer) = self.framebuffers.get(frame) else {
            error!(
                "Render pass has no framebuffer for frame {} ({} available)",
                frame,
                self.framebuffers.len()
            );
            return;
        };

        let clear_values = self.resolve_clear_values();
        self.device.cmd_begin_render_pass(
            cmd,
            self.render_pass,
            framebuffer,
            self.area,
            &clear_values,
        );

        let mut first = true;
        for subpass in &self.subpasses {
            let subpass = subpass.borrow();
            if !subpass.activated() {
                continue;
            }
            if !first {
                self.device.cmd_next_subpass(cmd);
            }
            first = false;
            subpass.process(cmd, self.area.extent);
        }

        self.device.cmd_end_render_pass(cmd);
    }

    /// Clear values aligned with the attachment list.
    ///
    /// Missing entries fall back to opaque black for color attachments and
    /// depth 1.0 / stencil 0 for depth attachments; extra entries are
    /// dropped.
    pub fn resolve_clear_values(&self) -> Vec<vk::ClearValue> {
        self.attachments
            .iter()
            .enumerate()
            .map(|(index, attachment)| {
                self.clear_values
                    .get(index)
                    .copied()
                    .unwrap_or_else(|| default_clear_value(attachment.format()))
            })
            .collect()
    }

    pub fn set_clear_values(&mut self, values: Vec<vk::ClearValue>) {
        self.clear_values = values;
    }

    #[inline]
    pub fn clear_values(&self) -> &[vk::ClearValue] {
        &self.clear_values
    }

    /// Sets a color clear for attachment 0 and a depth clear for attachment 1.
    pub fn set_clear_color(&mut self, color: [f32; 3]) {
        self.clear_color = color;
        self.clear_values = vec![
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [color[0], color[1], color[2], 1.0],
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];
    }

    #[inline]
    pub fn clear_color(&self) -> [f32; 3] {
        self.clear_color
    }

    /// Adds `pipeline` to the back of subpass `subpass`.
    pub fn add_pipeline(&self, pipeline: GraphicsPipelineRef<D>, subpass: usize) -> bool {
        match self.subpasses.get(subpass) {
            Some(target) => {
                target.borrow_mut().add(pipeline);
                true
            }
            None => false,
        }
    }

    /// Adds `pipeline` to the front of subpass `subpass`.
    pub fn add_front_pipeline(&self, pipeline: GraphicsPipelineRef<D>, subpass: usize) -> bool {
        match self.subpasses.get(subpass) {
            Some(target) => {
                target.borrow_mut().add_front(pipeline);
                true
            }
            None => false,
        }
    }

    pub fn remove_pipeline(&self, pipeline: &GraphicsPipelineRef<D>, subpass: usize) -> bool {
        self.subpasses
            .get(subpass)
            .is_some_and(|target| target.borrow_mut().remove(pipeline))
    }

    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    #[inline]
    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    #[inline]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    #[inline]
    pub fn dependencies(&self) -> &[SubpassDependency] {
        &self.dependencies
    }

    #[inline]
    pub fn subpass_count(&self) -> usize {
        self.subpasses.len()
    }

    #[inline]
    pub fn exists_subpass(&self, index: usize) -> bool {
        index < self.subpasses.len()
    }

    pub fn subpass(&self, index: usize) -> Option<&SubpassRef<D>> {
        self.subpasses.get(index)
    }

    #[inline]
    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    #[inline]
    pub fn area(&self) -> vk::Rect2D {
        self.area
    }
}

impl<D: RenderDevice> TargetCallback for RenderPass<D> {
    fn on_created(&mut self, attachments: &[Vec<vk::ImageView>], area: vk::Rect2D) -> RhiResult<()> {
        if self.render_pass == vk::RenderPass::null() {
            return Err(RhiError::InvalidHandle("render pass not created".to_string()));
        }
        self.destroy_framebuffers();
        self.create_framebuffers(attachments, area)
    }

    fn on_destroyed(&mut self) {
        self.destroy_framebuffers();
    }
}

impl<D: RenderDevice> Drop for RenderPass<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}
