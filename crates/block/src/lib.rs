//! Render graph building blocks.
//!
//! This crate composes recorded GPU work on top of `lava_rhi`:
//! - [`block::Block`] replays an ordered list of recording callbacks into
//!   one command buffer per frame slot
//! - [`render_pass::RenderPass`] owns the native pass, its subpasses and the
//!   per-slot framebuffers, and rebuilds them through the swapchain's target
//!   callbacks
//! - [`graphics_pipeline::GraphicsPipeline`] and
//!   [`compute_pipeline::ComputePipeline`] accumulate state before `create`
//!   and expose an `on_process` slot for draw and dispatch calls
//!
//! Objects that form the graph are shared as `Rc<RefCell<_>>` handles built
//! by the `make_*` functions. Everything here runs on the frame-loop thread.
//!
//! Native calls go through the [`device::RenderDevice`] trait, implemented
//! for [`lava_rhi::device::Device`].

pub mod attachment;
pub mod block;
pub mod compute_pipeline;
pub mod descriptor;
pub mod device;
pub mod graphics_pipeline;
pub mod pipeline;
pub mod pipeline_layout;
pub mod render_pass;
pub mod subpass;

pub use attachment::Attachment;
pub use block::{Block, CommandId};
pub use compute_pipeline::{ComputePipeline, ComputePipelineRef, make_compute_pipeline};
pub use descriptor::{Descriptor, DescriptorPool, DescriptorRef, make_descriptor};
pub use device::RenderDevice;
pub use graphics_pipeline::{
    GraphicsPipeline, GraphicsPipelineRef, ViewportSizing, make_graphics_pipeline,
};
pub use pipeline::{Pipeline, PipelineShaderStage, make_pipeline_shader_stage};
pub use pipeline_layout::{PipelineLayout, PipelineLayoutRef, make_pipeline_layout};
pub use render_pass::{RenderPass, RenderPassRef, make_render_pass};
pub use subpass::{Subpass, SubpassDependency, SubpassRef, make_subpass, make_subpass_dependency};
