//! Graphics pipeline built against a render pass subpass.
//!
//! All state is accumulated on the object first; [`GraphicsPipeline::create`]
//! then assembles the native create info in one go. The defaults are a
//! triangle list, one viewport and scissor, single sampling, no depth test,
//! filled polygons without culling and dynamic viewport and scissor.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use lava_rhi::device::Device;
//! use lava_rhi::shader::ShaderStage;
//! use lava_block::{make_graphics_pipeline, make_pipeline_layout, Pipeline};
//!
//! # fn example(device: Arc<Device>, pass: vk::RenderPass, vert: &[u8], frag: &[u8]) -> Result<(), lava_rhi::RhiError> {
//! let layout = make_pipeline_layout(device.clone());
//! layout.borrow_mut().create()?;
//!
//! let pipeline = make_graphics_pipeline(device, vk::PipelineCache::null());
//! {
//!     let mut p = pipeline.borrow_mut();
//!     p.add_shader(vert, ShaderStage::Vertex)?;
//!     p.add_shader(frag, ShaderStage::Fragment)?;
//!     p.add_default_color_blend_attachment();
//!     p.set_layout(layout);
//!     p.create(pass)?;
//! }
//! # Ok(())
//! # }
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use ash::vk;
use lava_rhi::device::Device;
use lava_rhi::shader::ShaderStage;
use lava_rhi::{RhiError, RhiResult};
use tracing::{debug, error, info, warn};

use crate::device::RenderDevice;
use crate::pipeline::{Pipeline, PipelineBase, PipelineShaderStage, make_pipeline_shader_stage};

/// Shared handle to a graphics pipeline.
pub type GraphicsPipelineRef<D = Device> = Rc<RefCell<GraphicsPipeline<D>>>;

/// Creates an empty graphics pipeline for `device`.
pub fn make_graphics_pipeline<D: RenderDevice>(
    device: Arc<D>,
    cache: vk::PipelineCache,
) -> GraphicsPipelineRef<D> {
    Rc::new(RefCell::new(GraphicsPipeline::new(device, cache)))
}

/// How the viewport and scissor are derived from the target size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewportSizing {
    /// Cover the whole target.
    #[default]
    Input,
    /// Use the stored viewport and scissor verbatim.
    Absolute,
    /// Treat the stored viewport as fractions of the target size.
    Relative,
}

/// Computes the viewport and scissor recorded for a target of `size`.
///
/// In [`ViewportSizing::Relative`] mode the scissor covers the scaled
/// viewport rectangle.
pub fn compute_viewport_and_scissor(
    sizing: ViewportSizing,
    viewport: &vk::Viewport,
    scissor: &vk::Rect2D,
    size: vk::Extent2D,
) -> (vk::Viewport, vk::Rect2D) {
    let width = size.width as f32;
    let height = size.height as f32;

    match sizing {
        ViewportSizing::Input => (
            vk::Viewport {
                x: 0.0,
                y: 0.0,
                width,
                height,
                min_depth: 0.0,
                max_depth: 1.0,
            },
            vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: size,
            },
        ),
        ViewportSizing::Absolute => (*viewport, *scissor),
        ViewportSizing::Relative => {
            let scaled = vk::Viewport {
                x: viewport.x * width,
                y: viewport.y * height,
                width: viewport.width * width,
                height: viewport.height * height,
                min_depth: viewport.min_depth,
                max_depth: viewport.max_depth,
            };
            let rect = vk::Rect2D {
                offset: vk::Offset2D {
                    x: scaled.x.round() as i32,
                    y: scaled.y.round() as i32,
                },
                extent: vk::Extent2D {
                    width: scaled.width.round().max(0.0) as u32,
                    height: scaled.height.round().max(0.0) as u32,
                },
            };
            (scaled, rect)
        }
    }
}

/// Standard alpha blending with full RGBA writes.
pub fn create_color_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState {
        blend_enable: vk::TRUE,
        src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
        dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        color_blend_op: vk::BlendOp::ADD,
        src_alpha_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        dst_alpha_blend_factor: vk::BlendFactor::ZERO,
        alpha_blend_op: vk::BlendOp::ADD,
        color_write_mask: vk::ColorComponentFlags::RGBA,
    }
}

/// Fixed-function state handed to the `on_create` hook.
#[derive(Clone, Copy)]
pub struct FixedFunctionState {
    pub input_assembly: vk::PipelineInputAssemblyStateCreateInfo<'static>,
    pub viewport_count: u32,
    pub scissor_count: u32,
    pub multisample: vk::PipelineMultisampleStateCreateInfo<'static>,
    pub depth_stencil: vk::PipelineDepthStencilStateCreateInfo<'static>,
    pub rasterization: vk::PipelineRasterizationStateCreateInfo<'static>,
}

impl Default for FixedFunctionState {
    fn default() -> Self {
        Self {
            input_assembly: vk::PipelineInputAssemblyStateCreateInfo::default()
                .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
                .primitive_restart_enable(false),
            viewport_count: 1,
            scissor_count: 1,
            multisample: vk::PipelineMultisampleStateCreateInfo::default()
                .rasterization_samples(vk::SampleCountFlags::TYPE_1)
                .sample_shading_enable(false)
                .min_sample_shading(0.0),
            depth_stencil: vk::PipelineDepthStencilStateCreateInfo::default()
                .depth_test_enable(false)
                .depth_write_enable(false)
                .depth_compare_op(vk::CompareOp::NEVER)
                .depth_bounds_test_enable(false)
                .stencil_test_enable(false),
            rasterization: vk::PipelineRasterizationStateCreateInfo::default()
                .depth_clamp_enable(false)
                .rasterizer_discard_enable(false)
                .polygon_mode(vk::PolygonMode::FILL)
                .cull_mode(vk::CullModeFlags::NONE)
                .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
                .depth_bias_enable(false)
                .line_width(1.0),
        }
    }
}

/// Last-moment hook over the fixed-function state. Returning `false`
/// cancels creation.
pub type CreateHook = Box<dyn FnMut(&mut FixedFunctionState) -> bool>;

/// Graphics pipeline with accumulated shader and fixed-function state.
pub struct GraphicsPipeline<D: RenderDevice = Device> {
    base: PipelineBase<D>,
    render_pass: vk::RenderPass,
    subpass: u32,
    state: FixedFunctionState,
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState>,
    blend_constants: [f32; 4],
    dynamic_states: Vec<vk::DynamicState>,
    shader_stages: Vec<Rc<PipelineShaderStage<D>>>,
    sizing: ViewportSizing,
    viewport: vk::Viewport,
    scissor: vk::Rect2D,
    auto_size: bool,
    auto_line_width: bool,
    line_width: f32,
    on_create: Option<CreateHook>,
}

impl<D: RenderDevice> GraphicsPipeline<D> {
    pub fn new(device: Arc<D>, cache: vk::PipelineCache) -> Self {
        Self {
            base: PipelineBase::new(device, cache),
            render_pass: vk::RenderPass::null(),
            subpass: 0,
            state: FixedFunctionState::default(),
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            color_blend_attachments: Vec::new(),
            blend_constants: [0.0; 4],
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            shader_stages: Vec::new(),
            sizing: ViewportSizing::Input,
            viewport: vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
                min_depth: 0.0,
                max_depth: 1.0,
            },
            scissor: vk::Rect2D::default(),
            auto_size: true,
            auto_line_width: false,
            line_width: 1.0,
            on_create: None,
        }
    }

    /// Creates the native pipeline for `subpass` of `render_pass`.
    ///
    /// The `on_create` hook runs first and may adjust the fixed-function
    /// state. A layout must have been set.
    ///
    /// # Errors
    ///
    /// Returns an error if the hook rejects creation, the layout is missing,
    /// no shader stage was added, or native creation fails. A previously
    /// created handle is released first, so none is left on failure.
    pub fn create(&mut self, render_pass: vk::RenderPass) -> RhiResult<()> {
        self.base.release_handle();

        if let Some(hook) = self.on_create.as_mut()
            && !hook(&mut self.state)
        {
            error!("Graphics pipeline creation cancelled by on_create");
            return Err(RhiError::PipelineError(
                "creation cancelled by on_create".to_string(),
            ));
        }

        let layout = self
            .base
            .layout_handle()
            .ok_or_else(|| RhiError::InvalidHandle("pipeline layout not created".to_string()))?;

        if self.shader_stages.is_empty() {
            error!("Graphics pipeline has no shader stages");
            return Err(RhiError::PipelineError("no shader stages".to_string()));
        }

        let specializations: Vec<vk::SpecializationInfo<'_>> = self
            .shader_stages
            .iter()
            .map(|stage| stage.specialization_info())
            .collect();
        let stages: Vec<vk::PipelineShaderStageCreateInfo<'_>> = self
            .shader_stages
            .iter()
            .zip(&specializations)
            .map(|(stage, specialization)| stage.create_info(specialization))
            .collect();

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(self.state.viewport_count)
            .scissor_count(self.state.scissor_count);

        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::CLEAR)
            .attachments(&self.color_blend_attachments)
            .blend_constants(self.blend_constants);

        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&self.dynamic_states);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&self.state.input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&self.state.rasterization)
            .multisample_state(&self.state.multisample)
            .depth_stencil_state(&self.state.depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(self.subpass)
            .base_pipeline_index(-1);

        let pipeline = self
            .device()
            .create_graphics_pipeline(self.pipeline_cache(), &create_info)?;
        self.base.set_handle(pipeline);
        self.render_pass = render_pass;

        info!(
            "Graphics pipeline created ({} stage(s), subpass {})",
            stages.len(),
            self.subpass
        );
        Ok(())
    }

    /// Sets viewport and scissor for a target of `size` per the sizing mode.
    pub fn set_viewport_and_scissor(&mut self, cmd: vk::CommandBuffer, size: vk::Extent2D) {
        let (viewport, scissor) =
            compute_viewport_and_scissor(self.sizing, &self.viewport, &self.scissor, size);

        if self.sizing == ViewportSizing::Input {
            self.viewport = viewport;
            self.scissor = scissor;
        }

        let device = self.device();
        device.cmd_set_viewport(cmd, viewport);
        device.cmd_set_scissor(cmd, scissor);
    }

    /// Records the stored line width.
    pub fn apply_line_width(&self, cmd: vk::CommandBuffer) {
        self.device().cmd_set_line_width(cmd, self.line_width);
    }

    pub fn set_render_pass(&mut self, render_pass: vk::RenderPass) {
        self.render_pass = render_pass;
    }

    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn set_subpass(&mut self, subpass: u32) {
        self.subpass = subpass;
    }

    #[inline]
    pub fn subpass(&self) -> u32 {
        self.subpass
    }

    pub fn set_vertex_input_binding(&mut self, description: vk::VertexInputBindingDescription) {
        self.set_vertex_input_bindings(&[description]);
    }

    pub fn set_vertex_input_bindings(&mut self, descriptions: &[vk::VertexInputBindingDescription]) {
        self.vertex_bindings = descriptions.to_vec();
    }

    pub fn set_vertex_input_attribute(&mut self, attribute: vk::VertexInputAttributeDescription) {
        self.set_vertex_input_attributes(&[attribute]);
    }

    pub fn set_vertex_input_attributes(&mut self, attributes: &[vk::VertexInputAttributeDescription]) {
        self.vertex_attributes = attributes.to_vec();
    }

    #[inline]
    pub fn vertex_input_bindings(&self) -> &[vk::VertexInputBindingDescription] {
        &self.vertex_bindings
    }

    #[inline]
    pub fn vertex_input_attributes(&self) -> &[vk::VertexInputAttributeDescription] {
        &self.vertex_attributes
    }

    pub fn set_input_topology(&mut self, topology: vk::PrimitiveTopology) {
        self.state.input_assembly.topology = topology;
    }

    pub fn set_depth_test_and_write(&mut self, test_enable: bool, write_enable: bool) {
        self.state.depth_stencil.depth_test_enable = test_enable.into();
        self.state.depth_stencil.depth_write_enable = write_enable.into();
    }

    pub fn set_depth_compare_op(&mut self, compare_op: vk::CompareOp) {
        self.state.depth_stencil.depth_compare_op = compare_op;
    }

    pub fn set_rasterization_cull_mode(&mut self, cull_mode: vk::CullModeFlags) {
        self.state.rasterization.cull_mode = cull_mode;
    }

    pub fn set_rasterization_front_face(&mut self, front_face: vk::FrontFace) {
        self.state.rasterization.front_face = front_face;
    }

    pub fn set_rasterization_polygon_mode(&mut self, polygon_mode: vk::PolygonMode) {
        self.state.rasterization.polygon_mode = polygon_mode;
    }

    #[inline]
    pub fn state(&self) -> &FixedFunctionState {
        &self.state
    }

    #[inline]
    pub fn state_mut(&mut self) -> &mut FixedFunctionState {
        &mut self.state
    }

    /// Appends blend state for the next color attachment of the subpass.
    pub fn add_color_blend_attachment(&mut self, attachment: vk::PipelineColorBlendAttachmentState) {
        self.color_blend_attachments.push(attachment);
    }

    pub fn add_default_color_blend_attachment(&mut self) {
        self.add_color_blend_attachment(create_color_blend_attachment());
    }

    pub fn clear_color_blend_attachment(&mut self) {
        self.color_blend_attachments.clear();
    }

    #[inline]
    pub fn color_blend_attachments(&self) -> &[vk::PipelineColorBlendAttachmentState] {
        &self.color_blend_attachments
    }

    pub fn set_blend_constants(&mut self, constants: [f32; 4]) {
        self.blend_constants = constants;
    }

    pub fn set_dynamic_states(&mut self, states: &[vk::DynamicState]) {
        self.dynamic_states = states.to_vec();
    }

    pub fn add_dynamic_state(&mut self, state: vk::DynamicState) {
        self.dynamic_states.push(state);
    }

    pub fn clear_dynamic_states(&mut self) {
        self.dynamic_states.clear();
    }

    #[inline]
    pub fn dynamic_states(&self) -> &[vk::DynamicState] {
        &self.dynamic_states
    }

    /// Compiles `data` and appends it as a shader stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is empty or not SPIR-V, or module
    /// creation fails.
    pub fn add_shader_stage(&mut self, data: &[u8], stage: ShaderStage) -> RhiResult<()> {
        if data.is_empty() {
            error!("Graphics pipeline shader stage data is empty");
            return Err(RhiError::ShaderError(format!("no {stage} shader data")));
        }
        let shader_stage = make_pipeline_shader_stage(self.device().clone(), data, stage)
            .inspect_err(|e| error!("Failed to create graphics pipeline shader stage: {}", e))?;
        self.add(shader_stage);
        Ok(())
    }

    /// Same as [`GraphicsPipeline::add_shader_stage`].
    ///
    /// # Errors
    ///
    /// See [`GraphicsPipeline::add_shader_stage`].
    pub fn add_shader(&mut self, data: &[u8], stage: ShaderStage) -> RhiResult<()> {
        self.add_shader_stage(data, stage)
    }

    pub fn add(&mut self, shader_stage: Rc<PipelineShaderStage<D>>) {
        if self
            .shader_stages
            .iter()
            .any(|existing| existing.stage() == shader_stage.stage())
        {
            warn!("Graphics pipeline already has a {} stage", shader_stage.stage());
        }
        self.shader_stages.push(shader_stage);
    }

    #[inline]
    pub fn shader_stages(&self) -> &[Rc<PipelineShaderStage<D>>] {
        &self.shader_stages
    }

    pub fn clear_shader_stages(&mut self) {
        self.shader_stages.clear();
    }

    /// Drops blend attachments and shader stages.
    pub fn clear(&mut self) {
        self.clear_color_blend_attachment();
        self.clear_shader_stages();
    }

    pub fn set_auto_size(&mut self, auto_size: bool) {
        self.auto_size = auto_size;
    }

    #[inline]
    pub fn auto_sizing(&self) -> bool {
        self.auto_size
    }

    pub fn set_sizing(&mut self, sizing: ViewportSizing) {
        self.sizing = sizing;
    }

    #[inline]
    pub fn sizing(&self) -> ViewportSizing {
        self.sizing
    }

    pub fn set_viewport(&mut self, viewport: vk::Viewport) {
        self.viewport = viewport;
    }

    #[inline]
    pub fn viewport(&self) -> vk::Viewport {
        self.viewport
    }

    pub fn set_scissor(&mut self, scissor: vk::Rect2D) {
        self.scissor = scissor;
    }

    #[inline]
    pub fn scissor(&self) -> vk::Rect2D {
        self.scissor
    }

    pub fn set_line_width(&mut self, width: f32) {
        self.line_width = width;
    }

    #[inline]
    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    pub fn set_auto_line_width(&mut self, auto_line_width: bool) {
        self.auto_line_width = auto_line_width;
    }

    #[inline]
    pub fn auto_line_width(&self) -> bool {
        self.auto_line_width
    }

    pub fn set_on_create(&mut self, hook: impl FnMut(&mut FixedFunctionState) -> bool + 'static) {
        self.on_create = Some(Box::new(hook));
    }

    /// Copies the accumulated configuration into `target`.
    ///
    /// Layout and shader stages are shared, not duplicated. The native
    /// handle, callbacks and render pass binding are not copied; `target`
    /// still has to be created.
    pub fn copy_to(&self, target: &mut GraphicsPipeline<D>) {
        target.base.set_layout_ref(self.layout());
        target.subpass = self.subpass;
        target.state = self.state;
        target.shader_stages = self.shader_stages.clone();
        target.vertex_bindings = self.vertex_bindings.clone();
        target.vertex_attributes = self.vertex_attributes.clone();
        target.color_blend_attachments = self.color_blend_attachments.clone();
        target.blend_constants = self.blend_constants;
        target.dynamic_states = self.dynamic_states.clone();
        target.sizing = self.sizing;
        target.viewport = self.viewport;
        target.scissor = self.scissor;
        target.auto_size = self.auto_size;
        target.auto_line_width = self.auto_line_width;
        target.line_width = self.line_width;
    }

    /// Copies the accumulated configuration of `source` into `self`.
    pub fn copy_from(&mut self, source: &GraphicsPipeline<D>) {
        source.copy_to(self);
    }
}

impl<D: RenderDevice> Pipeline<D> for GraphicsPipeline<D> {
    #[inline]
    fn base(&self) -> &PipelineBase<D> {
        &self.base
    }

    #[inline]
    fn base_mut(&mut self) -> &mut PipelineBase<D> {
        &mut self.base
    }

    fn bind(&self, cmd: vk::CommandBuffer) {
        self.device()
            .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.handle());
    }

    fn destroy(&mut self) {
        self.clear();
        if self.base.release() {
            debug!("Graphics pipeline destroyed");
        }
    }
}

impl<D: RenderDevice> Drop for GraphicsPipeline<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}
