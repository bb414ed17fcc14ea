//! lava demo
//!
//! Opens a window, clears it in a slowly cycling color and, when compiled
//! SPIR-V shaders are found under `shaders/`, draws a triangle on top.
//! Escape or closing the window ends the run.

use std::cell::RefCell;
use std::path::Path;
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use ash::vk;
use clap::Parser;
use glam::Vec3;
use tracing::{error, info, warn};

use lava_block::{
    Attachment, Block, GraphicsPipelineRef, Pipeline, PipelineLayoutRef, RenderPassRef,
    make_graphics_pipeline, make_pipeline_layout, make_render_pass, make_subpass,
    make_subpass_dependency,
};
use lava_core::{FrameArgs, FrameConfig};
use lava_frame::{Frame, FrameError, RenderTarget, Renderer, RunContext};
use lava_platform::{KeyCode, Platform};
use lava_rhi::buffer::{Buffer, BufferUsage};
use lava_rhi::command::CommandBuffer;
use lava_rhi::device::Device;
use lava_rhi::shader::ShaderStage;
use lava_rhi::swapchain::PresentTarget;

const VERTEX_SHADER: &str = "shaders/triangle.vert.spv";
const FRAGMENT_SHADER: &str = "shaders/triangle.frag.spv";

/// Seconds for one full trip around the hue circle.
const HUE_PERIOD: f32 = 12.0;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 2],
    color: [f32; 3],
}

const TRIANGLE: [Vertex; 3] = [
    Vertex { position: [0.0, -0.5], color: [1.0, 0.0, 0.0] },
    Vertex { position: [0.5, 0.5], color: [0.0, 1.0, 0.0] },
    Vertex { position: [-0.5, 0.5], color: [0.0, 0.0, 1.0] },
];

/// Pipeline, layout and vertex data of the optional triangle.
struct Triangle {
    pipeline: GraphicsPipelineRef,
    layout: PipelineLayoutRef,
    vertices: Buffer,
}

/// Everything the run callback renders with.
///
/// Fields drop in declaration order, so recording state goes before the
/// render target that owns the swapchain.
struct Demo {
    block: Block,
    triangle: Option<Triangle>,
    pass: RenderPassRef,
    renderer: Renderer,
    target: RenderTarget,
    base_color: Vec3,
}

impl Demo {
    fn create(device: Arc<Device>, target: RenderTarget, config: &FrameConfig) -> Result<Self> {
        let renderer = Renderer::new(device.clone(), &target).context("renderer")?;

        let pass = make_render_pass(device.clone());
        {
            let mut pass = pass.borrow_mut();
            let mut color = Attachment::new(target.format(), vk::SampleCountFlags::TYPE_1);
            color
                .set_load_op(vk::AttachmentLoadOp::CLEAR)
                .set_store_op(vk::AttachmentStoreOp::STORE)
                .set_final_layout(vk::ImageLayout::PRESENT_SRC_KHR);
            pass.add_attachment(color);

            let subpass = make_subpass(vk::PipelineBindPoint::GRAPHICS);
            subpass
                .borrow_mut()
                .set_color_attachment(0, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
            pass.add_subpass(subpass);

            let mut dependency =
                make_subpass_dependency(vk::SUBPASS_EXTERNAL, 0, vk::DependencyFlags::BY_REGION);
            dependency
                .set_stage_mask(
                    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                )
                .set_access_mask(
                    vk::AccessFlags::empty(),
                    vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                );
            pass.add_dependency(dependency);

            pass.set_clear_color(config.clear_color);
            pass.create(&target.attachments(), target.area())
                .context("render pass")?;
        }

        let triangle = match create_triangle(&device, &pass) {
            Ok(Some(triangle)) => Some(triangle),
            Ok(None) => {
                info!("No shaders under shaders/, clearing only");
                None
            }
            Err(e) => {
                warn!("Triangle pipeline unavailable: {:#}", e);
                None
            }
        };

        let mut block = Block::new();
        block
            .create(device.clone(), target.frame_count(), device.graphics_family())
            .context("command block")?;
        let recorded_pass = pass.clone();
        block
            .add_cmd(move |cmd, frame| recorded_pass.borrow().process(cmd, frame))
            .context("command block")?;

        let mut target = target;
        target.add_callback(pass.clone());

        Ok(Self {
            block,
            triangle,
            pass,
            renderer,
            target,
            base_color: Vec3::from_array(config.clear_color),
        })
    }

    /// One frame. Returns false when the loop should abort.
    fn render(&mut self, seconds: f32) -> bool {
        if self.target.reload_request() {
            if let Err(e) = self.target.reload() {
                error!("Failed to reload render target: {}", e);
                return false;
            }
            // A rebuilt swapchain may hand out more images than before
            let images = self.target.frame_count();
            if images > self.block.frame_count()
                && let Err(e) = self.block.set_frame_count(images)
            {
                error!("Failed to resize command block: {}", e);
                return false;
            }
        }

        self.pass
            .borrow_mut()
            .set_clear_color(cycle_hue(seconds / HUE_PERIOD, self.base_color));

        let frame = match self.renderer.begin_frame(&mut self.target) {
            Ok(Some(frame)) => frame,
            Ok(None) => return true,
            Err(e) => {
                error!("Failed to begin frame: {}", e);
                return false;
            }
        };

        if let Err(e) = self.block.process(frame as usize) {
            error!("Failed to record frame {}: {}", frame, e);
            return false;
        }

        if let Err(e) = self
            .renderer
            .end_frame(&mut self.target, &self.block.collect_buffers())
        {
            // Present problems are recovered by the reload on the next step
            warn!("Failed to end frame: {}", e);
        }
        true
    }

    fn destroy(&mut self) {
        self.block.destroy();
        if let Some(triangle) = self.triangle.take() {
            triangle.pipeline.borrow_mut().destroy();
            triangle.layout.borrow_mut().destroy();
            drop(triangle.vertices);
        }
        self.pass.borrow_mut().destroy();
        self.renderer.destroy();
        self.target.destroy();
    }
}

/// Builds the triangle pipeline if both shaders exist.
fn create_triangle(device: &Arc<Device>, pass: &RenderPassRef) -> Result<Option<Triangle>> {
    let (vertex, fragment) = (Path::new(VERTEX_SHADER), Path::new(FRAGMENT_SHADER));
    if !vertex.exists() || !fragment.exists() {
        return Ok(None);
    }

    let vertices = Buffer::new_with_slice(device.clone(), BufferUsage::Vertex, &TRIANGLE)
        .context("vertex buffer")?;

    let layout = make_pipeline_layout(device.clone());
    layout.borrow_mut().create().context("pipeline layout")?;

    let pipeline = make_graphics_pipeline(device.clone(), vk::PipelineCache::null());
    {
        let mut pipeline = pipeline.borrow_mut();
        pipeline.add_shader(&std::fs::read(vertex)?, ShaderStage::Vertex)?;
        pipeline.add_shader(&std::fs::read(fragment)?, ShaderStage::Fragment)?;
        pipeline.add_default_color_blend_attachment();
        pipeline.set_vertex_input_binding(vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        });
        pipeline.set_vertex_input_attributes(&[
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: size_of::<[f32; 2]>() as u32,
            },
        ]);
        pipeline.set_layout(layout.clone());
        pipeline
            .create(pass.borrow().handle())
            .context("graphics pipeline")?;

        let draw_device = device.clone();
        let vertex_buffer = vertices.handle();
        pipeline.set_on_process(move |cmd| {
            let cmd = CommandBuffer::from_handle(draw_device.clone(), cmd);
            cmd.bind_vertex_buffers(0, &[vertex_buffer], &[0]);
            cmd.draw(TRIANGLE.len() as u32, 1, 0, 0);
        });
    }

    pass.borrow().add_pipeline(pipeline.clone(), 0);
    info!("Triangle pipeline ready");
    Ok(Some(Triangle {
        pipeline,
        layout,
        vertices,
    }))
}

/// Mixes `base` with a fully saturated color at `hue` (in turns).
fn cycle_hue(hue: f32, base: Vec3) -> [f32; 3] {
    let k = (Vec3::new(5.0, 3.0, 1.0) + Vec3::splat(hue.fract() * 6.0)) % 6.0;
    let rgb = Vec3::ONE - k.min(Vec3::splat(4.0) - k).clamp(Vec3::ZERO, Vec3::ONE);
    (rgb * 0.5 + base * 0.5).to_array()
}

fn run(config: FrameConfig) -> std::result::Result<(), FrameError> {
    let platform = Platform::new(config.window.clone())
        .map_err(|e| FrameError::WindowCreateFailed(e.to_string()))?;
    let extensions = platform
        .required_extensions()
        .map_err(|e| FrameError::WindowCreateFailed(e.to_string()))?;
    let platform = Rc::new(RefCell::new(platform));

    let mut frame = Frame::new(config.clone(), platform.clone());
    frame.setup(extensions)?;

    let (surface, size) = {
        let mut platform = platform.borrow_mut();
        let window = platform
            .open()
            .map_err(|e| FrameError::WindowCreateFailed(e.to_string()))?;
        let instance = frame.instance().ok_or(FrameError::NotReady)?;
        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| FrameError::WindowCreateFailed(e.to_string()))?;
        (surface, window.framebuffer_size())
    };

    let device = frame.create_device(surface)?;
    let target = frame.create_target(device.clone(), surface, size)?;

    let demo = Demo::create(device, target, &config)
        .map_err(|e| FrameError::CreateFailed(format!("{:#}", e)))?;
    let demo = Rc::new(RefCell::new(demo));

    let run_demo = demo.clone();
    let run_platform = platform.clone();
    let wait_when_iconified = config.wait_for_events;
    frame.add_run(move |ctx: &mut RunContext<'_>| {
        let mut platform = run_platform.borrow_mut();
        if platform.close_request() || platform.input().is_key_just_pressed(KeyCode::Escape) {
            ctx.shut_down();
            return true;
        }

        let Some(window) = platform.window_mut() else {
            return true;
        };
        let iconified = window.iconified();
        ctx.set_wait_for_events(wait_when_iconified && iconified);
        if iconified {
            return true;
        }

        let mut demo = run_demo.borrow_mut();
        if let Some(size) = window.take_resize_request()
            && let Err(e) = demo.target.resize(size)
        {
            error!("Failed to resize render target: {}", e);
            return false;
        }

        demo.render(ctx.time().current().as_secs_f32())
    });

    let end_demo = demo.clone();
    frame.add_run_end(move || end_demo.borrow_mut().destroy());

    frame.run()
}

fn main() -> ExitCode {
    let args = FrameArgs::parse();
    let config = match FrameConfig::resolve(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(config) {
        Ok(()) => {
            info!("Demo finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Demo failed: {}", e);
            eprintln!("lava_demo: {} (code {})", e, e.code());
            ExitCode::from(e.code().unsigned_abs() as u8)
        }
    }
}
