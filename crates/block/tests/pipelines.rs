mod common;

use std::cell::Cell;
use std::rc::Rc;

use ash::vk;
use ash::vk::Handle;
use lava_block::{
    GraphicsPipeline, Pipeline, ViewportSizing, make_compute_pipeline, make_descriptor,
    make_graphics_pipeline, make_pipeline_layout, make_subpass,
};
use lava_rhi::shader::ShaderStage;

use common::{MockDevice, SPIRV, mock_device};

fn created_layout(device: &std::sync::Arc<MockDevice>) -> lava_block::PipelineLayoutRef<MockDevice> {
    let layout = make_pipeline_layout(device.clone());
    layout.borrow_mut().create().unwrap();
    layout
}

fn ready_pipeline(device: &std::sync::Arc<MockDevice>) -> GraphicsPipeline<MockDevice> {
    let mut pipeline = GraphicsPipeline::new(device.clone(), vk::PipelineCache::null());
    pipeline.set_layout(created_layout(device));
    pipeline.add_shader_stage(&SPIRV, ShaderStage::Vertex).unwrap();
    pipeline.add_shader_stage(&SPIRV, ShaderStage::Fragment).unwrap();
    pipeline.add_default_color_blend_attachment();
    pipeline
}

const EXTENT: vk::Extent2D = vk::Extent2D {
    width: 640,
    height: 480,
};

#[test]
fn test_graphics_pipeline_create() {
    let device = mock_device();
    let mut pipeline = ready_pipeline(&device);
    assert!(!pipeline.ready());

    pipeline.create(vk::RenderPass::from_raw(42)).unwrap();
    assert!(pipeline.ready());
    assert_eq!(pipeline.render_pass().as_raw(), 42);
    assert_eq!(*device.stage_counts.borrow(), vec![2]);
}

#[test]
fn test_graphics_pipeline_requires_layout() {
    let device = mock_device();
    let mut pipeline: GraphicsPipeline<MockDevice> =
        GraphicsPipeline::new(device.clone(), vk::PipelineCache::null());
    pipeline.add_shader_stage(&SPIRV, ShaderStage::Vertex).unwrap();
    assert!(pipeline.create(vk::RenderPass::from_raw(1)).is_err());

    pipeline.set_layout(make_pipeline_layout(device.clone()));
    assert!(pipeline.create(vk::RenderPass::from_raw(1)).is_err());
    assert!(!pipeline.ready());
    assert_eq!(device.count("create_graphics_pipeline"), 0);
}

#[test]
fn test_graphics_pipeline_requires_shader_stages() {
    let device = mock_device();
    let mut pipeline: GraphicsPipeline<MockDevice> =
        GraphicsPipeline::new(device.clone(), vk::PipelineCache::null());
    pipeline.set_layout(created_layout(&device));
    assert!(pipeline.create(vk::RenderPass::from_raw(1)).is_err());
}

#[test]
fn test_shader_stage_rejects_bad_data() {
    let device = mock_device();
    let mut pipeline: GraphicsPipeline<MockDevice> =
        GraphicsPipeline::new(device.clone(), vk::PipelineCache::null());
    assert!(pipeline.add_shader_stage(&[], ShaderStage::Vertex).is_err());
    assert!(pipeline.add_shader_stage(&[1, 2, 3, 4], ShaderStage::Vertex).is_err());
    assert!(pipeline.shader_stages().is_empty());
    assert_eq!(device.count("create_shader"), 0);
}

#[test]
fn test_on_create_can_cancel_and_adjust() {
    let device = mock_device();
    let mut pipeline = ready_pipeline(&device);

    pipeline.set_on_create(|_| false);
    assert!(pipeline.create(vk::RenderPass::from_raw(1)).is_err());
    assert!(!pipeline.ready());

    pipeline.set_on_create(|state| {
        state.rasterization.cull_mode = vk::CullModeFlags::BACK;
        true
    });
    pipeline.create(vk::RenderPass::from_raw(1)).unwrap();
    assert!(pipeline.ready());
    assert_eq!(pipeline.state().rasterization.cull_mode, vk::CullModeFlags::BACK);
}

#[test]
fn test_recreate_releases_previous_handle() {
    let device = mock_device();
    let mut pipeline = ready_pipeline(&device);
    pipeline.create(vk::RenderPass::from_raw(1)).unwrap();
    let first = pipeline.handle();
    pipeline.create(vk::RenderPass::from_raw(1)).unwrap();

    assert_ne!(pipeline.handle(), first);
    assert_eq!(device.count(&format!("destroy_pipeline {}", first.as_raw())), 1);
}

#[test]
fn test_failed_recreate_leaves_no_handle() {
    let device = mock_device();
    let mut pipeline = ready_pipeline(&device);
    pipeline.create(vk::RenderPass::from_raw(1)).unwrap();
    let first = pipeline.handle();

    pipeline.clear_shader_stages();
    assert!(pipeline.create(vk::RenderPass::from_raw(2)).is_err());

    assert!(!pipeline.ready());
    assert_eq!(pipeline.handle(), vk::Pipeline::null());
    assert_eq!(pipeline.render_pass().as_raw(), 1);
    assert_eq!(device.count(&format!("destroy_pipeline {}", first.as_raw())), 1);
    assert!(pipeline.layout().is_some());

    pipeline.destroy();
    assert_eq!(device.count("destroy_pipeline"), 1);
}

#[test]
fn test_pipeline_destroy_twice() {
    let device = mock_device();
    let mut pipeline = ready_pipeline(&device);
    pipeline.create(vk::RenderPass::from_raw(1)).unwrap();

    pipeline.destroy();
    assert!(!pipeline.ready());
    assert!(pipeline.layout().is_none());
    assert!(pipeline.shader_stages().is_empty());
    assert_eq!(device.count("destroy_pipeline"), 1);
    assert_eq!(device.count("destroy_shader"), 2);

    pipeline.destroy();
    drop(pipeline);
    assert_eq!(device.count("destroy_pipeline"), 1);
}

#[test]
fn test_copy_to_shares_stages_and_layout() {
    let device = mock_device();
    let mut source = ready_pipeline(&device);
    source.set_subpass(1);
    source.set_line_width(2.0);
    source.set_sizing(ViewportSizing::Relative);

    let mut target = GraphicsPipeline::new(device.clone(), vk::PipelineCache::null());
    source.copy_to(&mut target);

    assert_eq!(target.subpass(), 1);
    assert_eq!(target.line_width(), 2.0);
    assert_eq!(target.sizing(), ViewportSizing::Relative);
    assert_eq!(target.shader_stages().len(), 2);
    assert!(Rc::ptr_eq(&source.shader_stages()[0], &target.shader_stages()[0]));
    assert!(Rc::ptr_eq(
        &source.layout().unwrap(),
        &target.layout().unwrap()
    ));
    assert!(!target.ready());
    assert_eq!(device.count("create_shader"), 2);
}

#[test]
fn test_subpass_process_auto_bind_and_sizing() {
    let device = mock_device();
    let subpass = make_subpass(vk::PipelineBindPoint::GRAPHICS);

    let pipeline = make_graphics_pipeline(device.clone(), vk::PipelineCache::null());
    let calls = Rc::new(Cell::new(0));
    {
        let mut p = pipeline.borrow_mut();
        p.set_layout(created_layout(&device));
        p.add_shader_stage(&SPIRV, ShaderStage::Vertex).unwrap();
        p.create(vk::RenderPass::from_raw(1)).unwrap();
        let calls = calls.clone();
        p.set_on_process(move |_| calls.set(calls.get() + 1));
    }
    subpass.borrow_mut().add(pipeline.clone());

    device.clear_events();
    subpass.borrow().process(vk::CommandBuffer::from_raw(8), EXTENT);
    assert_eq!(calls.get(), 1);
    assert_eq!(
        device.events(),
        vec![
            format!("bind_pipeline graphics {}", pipeline.borrow().handle().as_raw()),
            "set_viewport".to_string(),
            "set_scissor".to_string(),
        ]
    );
    let viewport = device.viewports.borrow()[0];
    assert_eq!(viewport.width, 640.0);
    assert_eq!(viewport.height, 480.0);
    assert!(pipeline.borrow().has_on_process());

    {
        let mut p = pipeline.borrow_mut();
        p.set_auto_bind(false);
        p.set_auto_size(false);
        p.set_auto_line_width(true);
        p.set_line_width(3.0);
    }
    device.clear_events();
    subpass.borrow().process(vk::CommandBuffer::from_raw(8), EXTENT);
    assert_eq!(calls.get(), 2);
    assert_eq!(device.events(), vec!["set_line_width 3".to_string()]);
}

#[test]
fn test_subpass_skips_inactive_and_callbackless_pipelines() {
    let device = mock_device();
    let subpass = make_subpass(vk::PipelineBindPoint::GRAPHICS);

    let inactive = make_graphics_pipeline(device.clone(), vk::PipelineCache::null());
    let calls = Rc::new(Cell::new(0));
    {
        let calls = calls.clone();
        let mut p = inactive.borrow_mut();
        p.set_on_process(move |_| calls.set(calls.get() + 1));
        p.set_active(false);
    }
    let silent = make_graphics_pipeline(device.clone(), vk::PipelineCache::null());
    subpass.borrow_mut().add(inactive.clone());
    subpass.borrow_mut().add(silent);

    device.clear_events();
    subpass.borrow().process(vk::CommandBuffer::from_raw(8), EXTENT);
    assert_eq!(calls.get(), 0);
    assert!(device.events().is_empty());

    inactive.borrow_mut().toggle();
    subpass.borrow().process(vk::CommandBuffer::from_raw(8), EXTENT);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_on_process_may_borrow_its_pipeline() {
    let device = mock_device();
    let subpass = make_subpass(vk::PipelineBindPoint::GRAPHICS);
    let pipeline = make_graphics_pipeline(device.clone(), vk::PipelineCache::null());

    let seen = Rc::new(Cell::new(0.0_f32));
    {
        let weak = Rc::downgrade(&pipeline);
        let seen = seen.clone();
        pipeline.borrow_mut().set_on_process(move |_| {
            if let Some(pipeline) = weak.upgrade() {
                seen.set(pipeline.borrow().line_width());
            }
        });
    }
    pipeline.borrow_mut().set_line_width(4.0);
    subpass.borrow_mut().add(pipeline.clone());

    subpass.borrow().process(vk::CommandBuffer::from_raw(8), EXTENT);
    assert_eq!(seen.get(), 4.0);
}

#[test]
fn test_subpass_remove_and_clear() {
    let device = mock_device();
    let subpass = make_subpass(vk::PipelineBindPoint::GRAPHICS);
    let first = make_graphics_pipeline(device.clone(), vk::PipelineCache::null());
    let second = make_graphics_pipeline(device.clone(), vk::PipelineCache::null());
    subpass.borrow_mut().add(first.clone());
    subpass.borrow_mut().add(second.clone());

    assert!(subpass.borrow_mut().remove(&first));
    assert!(!subpass.borrow_mut().remove(&first));
    assert_eq!(subpass.borrow().pipelines().len(), 1);

    second.borrow_mut().set_layout(make_pipeline_layout(device.clone()));
    subpass.borrow_mut().clear_pipelines();
    assert!(subpass.borrow().pipelines().is_empty());
    assert!(second.borrow().layout().is_none());
}

#[test]
fn test_pipeline_layout_collects_descriptor_layouts() {
    let device = mock_device();
    let descriptor = make_descriptor(device.clone());
    {
        let mut descriptor = descriptor.borrow_mut();
        descriptor.add_binding(0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::VERTEX);
        descriptor.add_binding(
            1,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::ShaderStageFlags::FRAGMENT,
        );
        descriptor.create().unwrap();
    }
    assert_eq!(descriptor.borrow().binding_count(), 2);

    let layout = make_pipeline_layout(device.clone());
    {
        let mut layout = layout.borrow_mut();
        layout.add_descriptor(descriptor.clone());
        layout.add_push_constant_range(
            vk::PushConstantRange::default()
                .stage_flags(vk::ShaderStageFlags::VERTEX)
                .size(64),
        );
        layout.create().unwrap();
        layout.bind(vk::CommandBuffer::from_raw(2), vk::DescriptorSet::from_raw(99));
    }

    assert_eq!(device.count("create_set_layout 2"), 1);
    assert_eq!(device.count("create_layout 1 1"), 1);
    assert_eq!(device.count("bind_sets 0 1"), 1);

    layout.borrow_mut().destroy();
    layout.borrow_mut().destroy();
    assert_eq!(device.count("destroy_layout"), 1);
    assert!(layout.borrow().descriptors().is_empty());
}

#[test]
fn test_pipeline_layout_destroy_clears_uncreated_config() {
    let device = mock_device();
    let layout = make_pipeline_layout(device.clone());
    let mut layout = layout.borrow_mut();
    layout.add_descriptor(make_descriptor(device.clone()));
    layout.add_push_constant_range(
        vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::FRAGMENT)
            .size(16),
    );

    layout.destroy();
    assert!(layout.descriptors().is_empty());
    assert!(layout.push_constant_ranges().is_empty());
    assert_eq!(device.count("destroy_layout"), 0);
}

#[test]
fn test_descriptor_write_buffer_uses_declared_binding() {
    let device = mock_device();
    let descriptor = make_descriptor(device.clone());
    descriptor
        .borrow_mut()
        .add_binding(3, vk::DescriptorType::STORAGE_BUFFER, vk::ShaderStageFlags::COMPUTE);
    descriptor.borrow_mut().create().unwrap();

    let info = [vk::DescriptorBufferInfo::default()
        .buffer(vk::Buffer::from_raw(40))
        .range(vk::WHOLE_SIZE)];
    let set = vk::DescriptorSet::from_raw(77);

    descriptor.borrow().write_buffer(set, 3, &info).unwrap();
    assert_eq!(device.count("update_sets 1"), 1);

    assert!(descriptor.borrow().write_buffer(set, 0, &info).is_err());
    assert_eq!(device.count("update_sets"), 1);
}

#[test]
fn test_compute_pipeline_create_and_bind() {
    let device = mock_device();
    let pipeline = make_compute_pipeline(device.clone(), vk::PipelineCache::null());
    let mut pipeline = pipeline.borrow_mut();

    pipeline.set_layout(created_layout(&device));
    assert!(pipeline.create().is_err());

    pipeline.set_shader_stage(&SPIRV, ShaderStage::Compute).unwrap();
    pipeline.create().unwrap();
    assert!(pipeline.ready());

    pipeline.bind(vk::CommandBuffer::from_raw(1));
    assert_eq!(
        device.count(&format!("bind_pipeline compute {}", pipeline.handle().as_raw())),
        1
    );

    pipeline.destroy();
    assert!(pipeline.shader_stage().is_none());
    assert_eq!(device.count("destroy_pipeline"), 1);
}

#[test]
fn test_failed_compute_recreate_leaves_no_handle() {
    let device = mock_device();
    let pipeline = make_compute_pipeline(device.clone(), vk::PipelineCache::null());
    let mut pipeline = pipeline.borrow_mut();
    pipeline.set_layout(created_layout(&device));
    pipeline.set_shader_stage(&SPIRV, ShaderStage::Compute).unwrap();
    pipeline.create().unwrap();
    let first = pipeline.handle();

    pipeline.set_layout(make_pipeline_layout(device.clone()));
    assert!(pipeline.create().is_err());

    assert!(!pipeline.ready());
    assert_eq!(pipeline.handle(), vk::Pipeline::null());
    assert_eq!(device.count(&format!("destroy_pipeline {}", first.as_raw())), 1);
}
