//! Compute pipeline with a single shader stage.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use ash::vk;
use lava_rhi::device::Device;
use lava_rhi::shader::ShaderStage;
use lava_rhi::{RhiError, RhiResult};
use tracing::{debug, error, info};

use crate::device::RenderDevice;
use crate::pipeline::{Pipeline, PipelineBase, PipelineShaderStage, make_pipeline_shader_stage};

/// Shared handle to a compute pipeline.
pub type ComputePipelineRef<D = Device> = Rc<RefCell<ComputePipeline<D>>>;

/// Creates an empty compute pipeline for `device`.
pub fn make_compute_pipeline<D: RenderDevice>(
    device: Arc<D>,
    cache: vk::PipelineCache,
) -> ComputePipelineRef<D> {
    Rc::new(RefCell::new(ComputePipeline::new(device, cache)))
}

pub struct ComputePipeline<D: RenderDevice = Device> {
    base: PipelineBase<D>,
    shader_stage: Option<Rc<PipelineShaderStage<D>>>,
}

impl<D: RenderDevice> ComputePipeline<D> {
    pub fn new(device: Arc<D>, cache: vk::PipelineCache) -> Self {
        Self {
            base: PipelineBase::new(device, cache),
            shader_stage: None,
        }
    }

    /// Compiles `data` and uses it as the compute stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is empty or not SPIR-V, or module
    /// creation fails.
    pub fn set_shader_stage(&mut self, data: &[u8], stage: ShaderStage) -> RhiResult<()> {
        if data.is_empty() {
            error!("Compute pipeline shader stage data is empty");
            return Err(RhiError::ShaderError(format!("no {stage} shader data")));
        }
        let shader_stage = make_pipeline_shader_stage(self.device().clone(), data, stage)
            .inspect_err(|e| error!("Failed to create compute pipeline shader stage: {}", e))?;
        self.set(shader_stage);
        Ok(())
    }

    pub fn set(&mut self, shader_stage: Rc<PipelineShaderStage<D>>) {
        self.shader_stage = Some(shader_stage);
    }

    #[inline]
    pub fn shader_stage(&self) -> Option<&Rc<PipelineShaderStage<D>>> {
        self.shader_stage.as_ref()
    }

    /// Creates the native compute pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage or layout is missing, or native
    /// creation fails.
    pub fn create(&mut self) -> RhiResult<()> {
        self.base.release_handle();

        let layout = self
            .base
            .layout_handle()
            .ok_or_else(|| RhiError::InvalidHandle("pipeline layout not created".to_string()))?;

        let Some(shader_stage) = self.shader_stage.as_ref() else {
            error!("Compute pipeline has no shader stage");
            return Err(RhiError::PipelineError("no compute shader stage".to_string()));
        };

        let specialization = shader_stage.specialization_info();
        let create_info = vk::ComputePipelineCreateInfo::default()
            .stage(shader_stage.create_info(&specialization))
            .layout(layout)
            .base_pipeline_index(-1);

        let pipeline = self
            .device()
            .create_compute_pipeline(self.pipeline_cache(), &create_info)?;
        self.base.set_handle(pipeline);

        info!("Compute pipeline created");
        Ok(())
    }

    /// Shares layout and shader stage with `target`.
    pub fn copy_to(&self, target: &mut ComputePipeline<D>) {
        target.base.set_layout_ref(self.layout());
        target.shader_stage = self.shader_stage.clone();
    }

    pub fn copy_from(&mut self, source: &ComputePipeline<D>) {
        source.copy_to(self);
    }
}

impl<D: RenderDevice> Pipeline<D> for ComputePipeline<D> {
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
            .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::COMPUTE, self.handle());
    }

    fn destroy(&mut self) {
        self.shader_stage = None;
        if self.base.release() {
            debug!("Compute pipeline destroyed");
        }
    }
}

impl<D: RenderDevice> Drop for ComputePipeline<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}
