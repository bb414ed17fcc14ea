//! Shared pipeline state and shader stages.
//!
//! [`PipelineBase`] carries what graphics and compute pipelines have in
//! common: the native handle, the optional pipeline cache, the layout, the
//! activity flags and the `on_process` recording slot. The [`Pipeline`]
//! trait exposes it uniformly so a subpass can drive any pipeline the same
//! way.

use std::ffi::CStr;
use std::rc::Rc;
use std::sync::Arc;

use ash::vk;
use lava_rhi::RhiResult;
use lava_rhi::device::Device;
use lava_rhi::shader::{ShaderStage, parse_spirv};
use tracing::debug;

use crate::device::RenderDevice;
use crate::pipeline_layout::PipelineLayoutRef;

/// Entry point used for every shader stage.
pub const SHADER_ENTRY: &CStr = c"main";

/// Recording callback invoked once per frame with the command buffer.
pub type ProcessFn = Box<dyn FnMut(vk::CommandBuffer)>;

/// State common to every pipeline kind.
pub struct PipelineBase<D: RenderDevice = Device> {
    device: Arc<D>,
    pipeline: vk::Pipeline,
    cache: vk::PipelineCache,
    layout: Option<PipelineLayoutRef<D>>,
    active: bool,
    auto_bind: bool,
    on_process: Option<ProcessFn>,
}

impl<D: RenderDevice> PipelineBase<D> {
    pub fn new(device: Arc<D>, cache: vk::PipelineCache) -> Self {
        Self {
            device,
            pipeline: vk::Pipeline::null(),
            cache,
            layout: None,
            active: true,
            auto_bind: true,
            on_process: None,
        }
    }

    /// Destroys the native handle, keeping layout and callbacks.
    pub(crate) fn release_handle(&mut self) -> bool {
        if self.pipeline == vk::Pipeline::null() {
            return false;
        }
        self.device.destroy_pipeline(self.pipeline);
        self.pipeline = vk::Pipeline::null();
        true
    }

    pub(crate) fn set_handle(&mut self, pipeline: vk::Pipeline) {
        self.pipeline = pipeline;
    }

    /// Destroys the native handle and drops the layout reference.
    pub(crate) fn release(&mut self) -> bool {
        self.layout = None;
        self.release_handle()
    }

    /// Returns the created layout handle, if a layout is set and created.
    pub(crate) fn layout_handle(&self) -> Option<vk::PipelineLayout> {
        let handle = self.layout.as_ref()?.borrow().handle();
        (handle != vk::PipelineLayout::null()).then_some(handle)
    }

    pub(crate) fn set_layout_ref(&mut self, layout: Option<PipelineLayoutRef<D>>) {
        self.layout = layout;
    }

    pub(crate) fn take_on_process(&mut self) -> Option<ProcessFn> {
        self.on_process.take()
    }

    /// Puts a callback back unless a new one was installed meanwhile.
    pub(crate) fn restore_on_process(&mut self, callback: ProcessFn) {
        if self.on_process.is_none() {
            self.on_process = Some(callback);
        }
    }
}

/// Uniform create/destroy/bind contract over graphics and compute pipelines.
pub trait Pipeline<D: RenderDevice> {
    fn base(&self) -> &PipelineBase<D>;

    fn base_mut(&mut self) -> &mut PipelineBase<D>;

    /// Records the bind of this pipeline at its bind point.
    fn bind(&self, cmd: vk::CommandBuffer);

    /// Releases the native pipeline. Safe to call more than once.
    fn destroy(&mut self);

    #[inline]
    fn handle(&self) -> vk::Pipeline {
        self.base().pipeline
    }

    /// Returns `true` once a native pipeline exists.
    #[inline]
    fn ready(&self) -> bool {
        self.base().pipeline != vk::Pipeline::null()
    }

    #[inline]
    fn device(&self) -> &Arc<D> {
        &self.base().device
    }

    #[inline]
    fn pipeline_cache(&self) -> vk::PipelineCache {
        self.base().cache
    }

    fn layout(&self) -> Option<PipelineLayoutRef<D>> {
        self.base().layout.clone()
    }

    fn set_layout(&mut self, layout: PipelineLayoutRef<D>) {
        self.base_mut().layout = Some(layout);
    }

    fn set_active(&mut self, active: bool) {
        self.base_mut().active = active;
    }

    #[inline]
    fn activated(&self) -> bool {
        self.base().active
    }

    fn toggle(&mut self) {
        let base = self.base_mut();
        base.active = !base.active;
    }

    fn set_auto_bind(&mut self, auto_bind: bool) {
        self.base_mut().auto_bind = auto_bind;
    }

    #[inline]
    fn auto_bind(&self) -> bool {
        self.base().auto_bind
    }

    fn set_on_process(&mut self, callback: impl FnMut(vk::CommandBuffer) + 'static)
    where
        Self: Sized,
    {
        self.base_mut().on_process = Some(Box::new(callback));
    }

    fn clear_on_process(&mut self) {
        self.base_mut().on_process = None;
    }

    #[inline]
    fn has_on_process(&self) -> bool {
        self.base().on_process.is_some()
    }
}

/// One compiled shader module plus its specialization constants.
pub struct PipelineShaderStage<D: RenderDevice = Device> {
    device: Option<Arc<D>>,
    stage: ShaderStage,
    module: vk::ShaderModule,
    specialization_entries: Vec<vk::SpecializationMapEntry>,
    specialization_data: Vec<u8>,
}

impl<D: RenderDevice> PipelineShaderStage<D> {
    pub fn new(stage: ShaderStage) -> Self {
        Self {
            device: None,
            stage,
            module: vk::ShaderModule::null(),
            specialization_entries: Vec::new(),
            specialization_data: Vec::new(),
        }
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn set_stage(&mut self, stage: ShaderStage) {
        self.stage = stage;
    }

    pub fn add_specialization_entry(&mut self, entry: vk::SpecializationMapEntry) {
        self.specialization_entries.push(entry);
    }

    #[inline]
    pub fn specialization_entries(&self) -> &[vk::SpecializationMapEntry] {
        &self.specialization_entries
    }

    #[inline]
    pub fn specialization_data(&self) -> &[u8] {
        &self.specialization_data
    }

    /// Builds the shader module from SPIR-V bytes.
    ///
    /// `specialization_data` is copied so callers may drop their buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not SPIR-V or module creation fails.
    pub fn create(
        &mut self,
        device: Arc<D>,
        shader_data: &[u8],
        specialization_data: &[u8],
    ) -> RhiResult<()> {
        let code = parse_spirv(shader_data)?;
        let module = device.create_shader_module(&code)?;

        self.destroy();
        if !specialization_data.is_empty() {
            self.specialization_data = specialization_data.to_vec();
        }
        self.module = module;
        self.device = Some(device);

        debug!("Created {} shader stage ({} words)", self.stage, code.len());
        Ok(())
    }

    pub fn destroy(&mut self) {
        if let Some(device) = self.device.take() {
            device.destroy_shader_module(self.module);
            self.module = vk::ShaderModule::null();
        }
    }

    #[inline]
    pub fn module(&self) -> vk::ShaderModule {
        self.module
    }

    pub fn specialization_info(&self) -> vk::SpecializationInfo<'_> {
        vk::SpecializationInfo::default()
            .map_entries(&self.specialization_entries)
            .data(&self.specialization_data)
    }

    pub fn create_info<'a>(
        &'a self,
        specialization: &'a vk::SpecializationInfo<'a>,
    ) -> vk::PipelineShaderStageCreateInfo<'a> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(SHADER_ENTRY)
            .specialization_info(specialization)
    }
}

impl<D: RenderDevice> Drop for PipelineShaderStage<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Compiles `data` into a shareable shader stage.
///
/// # Errors
///
/// Returns an error if the data is not valid SPIR-V or module creation fails.
pub fn make_pipeline_shader_stage<D: RenderDevice>(
    device: Arc<D>,
    data: &[u8],
    stage: ShaderStage,
) -> RhiResult<Rc<PipelineShaderStage<D>>> {
    let mut shader_stage = PipelineShaderStage::new(stage);
    shader_stage.create(device, data, &[])?;
    Ok(Rc::new(shader_stage))
}
