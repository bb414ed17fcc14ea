//! Render pass attachment descriptions.

use ash::vk;

/// One attachment slot of a render pass.
///
/// The order attachments are added to a pass fixes their index, which is
/// what subpass references, clear values and framebuffer views line up with.
#[derive(Clone, Copy, Debug)]
pub struct Attachment {
    description: vk::AttachmentDescription,
}

impl Default for Attachment {
    fn default() -> Self {
        Self::new(vk::Format::UNDEFINED, vk::SampleCountFlags::TYPE_1)
    }
}

impl Attachment {
    /// Creates an attachment that loads and stores both aspects, with
    /// undefined initial and final layouts.
    pub fn new(format: vk::Format, samples: vk::SampleCountFlags) -> Self {
        Self {
            description: vk::AttachmentDescription {
                flags: vk::AttachmentDescriptionFlags::empty(),
                format,
                samples,
                load_op: vk::AttachmentLoadOp::LOAD,
                store_op: vk::AttachmentStoreOp::STORE,
                stencil_load_op: vk::AttachmentLoadOp::LOAD,
                stencil_store_op: vk::AttachmentStoreOp::STORE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::UNDEFINED,
            },
        }
    }

    #[inline]
    pub fn description(&self) -> &vk::AttachmentDescription {
        &self.description
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.description.format
    }

    pub fn set_format(&mut self, format: vk::Format) -> &mut Self {
        self.description.format = format;
        self
    }

    pub fn set_samples(&mut self, samples: vk::SampleCountFlags) -> &mut Self {
        self.description.samples = samples;
        self
    }

    pub fn set_op(
        &mut self,
        load_op: vk::AttachmentLoadOp,
        store_op: vk::AttachmentStoreOp,
    ) -> &mut Self {
        self.set_load_op(load_op).set_store_op(store_op)
    }

    pub fn set_load_op(&mut self, load_op: vk::AttachmentLoadOp) -> &mut Self {
        self.description.load_op = load_op;
        self
    }

    pub fn set_store_op(&mut self, store_op: vk::AttachmentStoreOp) -> &mut Self {
        self.description.store_op = store_op;
        self
    }

    pub fn set_stencil_op(
        &mut self,
        load_op: vk::AttachmentLoadOp,
        store_op: vk::AttachmentStoreOp,
    ) -> &mut Self {
        self.set_stencil_load_op(load_op).set_stencil_store_op(store_op)
    }

    pub fn set_stencil_load_op(&mut self, load_op: vk::AttachmentLoadOp) -> &mut Self {
        self.description.stencil_load_op = load_op;
        self
    }

    pub fn set_stencil_store_op(&mut self, store_op: vk::AttachmentStoreOp) -> &mut Self {
        self.description.stencil_store_op = store_op;
        self
    }

    pub fn set_layouts(&mut self, initial: vk::ImageLayout, last: vk::ImageLayout) -> &mut Self {
        self.set_initial_layout(initial).set_final_layout(last)
    }

    pub fn set_initial_layout(&mut self, layout: vk::ImageLayout) -> &mut Self {
        self.description.initial_layout = layout;
        self
    }

    pub fn set_final_layout(&mut self, layout: vk::ImageLayout) -> &mut Self {
        self.description.final_layout = layout;
        self
    }

    /// Returns `true` when the attachment holds depth and/or stencil data.
    #[inline]
    pub fn is_depth_stencil(&self) -> bool {
        is_depth_stencil_format(self.description.format)
    }
}

/// Returns `true` for formats with a depth or stencil aspect.
pub fn is_depth_stencil_format(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D16_UNORM
            | vk::Format::X8_D24_UNORM_PACK32
            | vk::Format::D32_SFLOAT
            | vk::Format::S8_UINT
            | vk::Format::D16_UNORM_S8_UINT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
    )
}
