mod common;

use std::cell::RefCell;
use std::rc::Rc;

use ash::vk;
use ash::vk::Handle;
use lava_block::{
    Attachment, Pipeline, RenderPass, make_graphics_pipeline, make_render_pass, make_subpass,
};
use lava_rhi::swapchain::TargetCallback;

use common::{MockDevice, mock_device};

fn area(width: u32, height: u32) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D::default(),
        extent: vk::Extent2D { width, height },
    }
}

fn views(slots: usize, per_slot: usize) -> Vec<Vec<vk::ImageView>> {
    (0..slots)
        .map(|slot| {
            (0..per_slot)
                .map(|index| vk::ImageView::from_raw((1000 + slot * 10 + index) as u64))
                .collect()
        })
        .collect()
}

fn color_depth_pass(device: &std::sync::Arc<MockDevice>) -> RenderPass<MockDevice> {
    let mut pass = RenderPass::new(device.clone());
    pass.add_attachment(Attachment::new(
        vk::Format::B8G8R8A8_UNORM,
        vk::SampleCountFlags::TYPE_1,
    ));
    pass.add_attachment(Attachment::new(
        vk::Format::D32_SFLOAT,
        vk::SampleCountFlags::TYPE_1,
    ));

    let subpass = make_subpass(vk::PipelineBindPoint::GRAPHICS);
    {
        let mut subpass = subpass.borrow_mut();
        subpass.set_color_attachment(0, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        subpass.set_depth_stencil_attachment(1, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    }
    pass.add_subpass(subpass);
    pass
}

#[test]
fn test_attachment_indices_follow_insertion() {
    let device = mock_device();
    let mut pass: RenderPass<MockDevice> = RenderPass::new(device);
    let format = vk::Format::R8G8B8A8_UNORM;
    assert_eq!(pass.add_attachment(Attachment::new(format, vk::SampleCountFlags::TYPE_1)), 0);
    assert_eq!(pass.add_attachment(Attachment::new(format, vk::SampleCountFlags::TYPE_1)), 1);
    assert_eq!(pass.attachments().len(), 2);
}

#[test]
fn test_render_pass_creates_framebuffer_per_slot() {
    let device = mock_device();
    let mut pass = color_depth_pass(&device);
    pass.create(&views(3, 2), area(800, 600)).unwrap();

    assert_ne!(pass.handle(), vk::RenderPass::null());
    assert_eq!(pass.framebuffers().len(), 3);
    assert_eq!(device.count("create_render_pass 2 1"), 1);
    assert_eq!(device.count("create_framebuffer"), 3);
    assert!(
        device
            .filtered(&["create_framebuffer"])
            .iter()
            .all(|event| event.ends_with(" 2 800x600"))
    );
    assert_eq!(pass.area().extent.width, 800);
}

#[test]
fn test_clear_values_align_with_attachments() {
    let device = mock_device();
    let mut pass = color_depth_pass(&device);
    pass.set_clear_color([0.25, 0.5, 0.75]);
    pass.create(&views(2, 2), area(64, 64)).unwrap();

    pass.process(vk::CommandBuffer::from_raw(77), 1);

    let recorded = device.clear_values.borrow();
    assert_eq!(recorded.len(), 1);
    let values = &recorded[0];
    assert_eq!(values.len(), 2);

    let color = unsafe { values[0].color.float32 };
    assert_eq!(color, [0.25, 0.5, 0.75, 1.0]);
    let depth = unsafe { values[1].depth_stencil };
    assert_eq!(depth.depth, 1.0);
    assert_eq!(depth.stencil, 0);
}

#[test]
fn test_missing_clear_values_use_format_defaults() {
    let device = mock_device();
    let pass = color_depth_pass(&device);
    assert!(pass.clear_values().is_empty());

    let values = pass.resolve_clear_values();
    assert_eq!(values.len(), 2);
    assert_eq!(unsafe { values[0].color.float32 }, [0.0, 0.0, 0.0, 1.0]);
    assert_eq!(unsafe { values[1].depth_stencil.depth }, 1.0);
}

#[test]
fn test_process_uses_framebuffer_of_frame() {
    let device = mock_device();
    let mut pass = color_depth_pass(&device);
    pass.create(&views(2, 2), area(32, 32)).unwrap();

    let second = pass.framebuffers()[1].as_raw();
    device.clear_events();
    pass.process(vk::CommandBuffer::from_raw(5), 1);

    assert_eq!(
        device.events(),
        vec![format!("begin_render_pass {second}"), "end_render_pass".to_string()]
    );
}

#[test]
fn test_process_without_framebuffer_records_nothing() {
    let device = mock_device();
    let pass = color_depth_pass(&device);
    device.clear_events();
    pass.process(vk::CommandBuffer::from_raw(5), 0);
    assert!(device.events().is_empty());
}

#[test]
fn test_next_subpass_only_between_active_subpasses() {
    let device = mock_device();
    let mut pass = color_depth_pass(&device);
    pass.add_subpass(make_subpass(vk::PipelineBindPoint::GRAPHICS));
    pass.add_subpass(make_subpass(vk::PipelineBindPoint::GRAPHICS));
    pass.create(&views(1, 2), area(16, 16)).unwrap();

    device.clear_events();
    pass.process(vk::CommandBuffer::from_raw(9), 0);
    assert_eq!(device.count("next_subpass"), 2);

    pass.subpass(1).unwrap().borrow_mut().set_active(false);
    device.clear_events();
    pass.process(vk::CommandBuffer::from_raw(9), 0);
    assert_eq!(device.count("next_subpass"), 1);
}

#[test]
fn test_subpass_pipelines_run_in_order() {
    let device = mock_device();
    let mut pass = color_depth_pass(&device);
    pass.create(&views(1, 2), area(16, 16)).unwrap();

    let order = Rc::new(RefCell::new(Vec::new()));
    for (name, front) in [("back", false), ("front", true)] {
        let pipeline = make_graphics_pipeline(device.clone(), vk::PipelineCache::null());
        let order = order.clone();
        pipeline.borrow_mut().set_on_process(move |_| order.borrow_mut().push(name));
        if front {
            assert!(pass.add_front_pipeline(pipeline, 0));
        } else {
            assert!(pass.add_pipeline(pipeline, 0));
        }
    }
    let missing = make_graphics_pipeline(device.clone(), vk::PipelineCache::null());
    assert!(!pass.add_pipeline(missing, 4));

    pass.process(vk::CommandBuffer::from_raw(3), 0);
    assert_eq!(*order.borrow(), vec!["front", "back"]);
}

#[test]
fn test_framebuffer_view_count_mismatch() {
    let device = mock_device();
    let mut pass = color_depth_pass(&device);
    let result = pass.create(&views(2, 1), area(16, 16));

    assert!(result.is_err());
    assert_eq!(pass.handle(), vk::RenderPass::null());
    assert!(pass.framebuffers().is_empty());
    assert_eq!(device.count("destroy_render_pass"), 1);
}

#[test]
fn test_framebuffer_failure_releases_partial_set() {
    let device = mock_device();
    device.fail_framebuffer_after.set(Some(1));
    let mut pass = color_depth_pass(&device);

    assert!(pass.create(&views(3, 2), area(16, 16)).is_err());
    assert_eq!(device.count("create_framebuffer"), 1);
    assert_eq!(device.count("destroy_framebuffer"), 1);
    assert_eq!(pass.handle(), vk::RenderPass::null());
}

#[test]
fn test_target_callback_rebuilds_framebuffers() {
    let device = mock_device();
    let mut pass = color_depth_pass(&device);
    pass.create(&views(2, 2), area(100, 100)).unwrap();
    let old = pass.framebuffers().to_vec();

    pass.on_destroyed();
    assert!(pass.framebuffers().is_empty());
    assert_eq!(device.count("destroy_framebuffer"), 2);

    pass.on_created(&views(3, 2), area(200, 150)).unwrap();
    assert_eq!(pass.framebuffers().len(), 3);
    assert!(pass.framebuffers().iter().all(|fb| !old.contains(fb)));
    assert_eq!(pass.area().extent, vk::Extent2D { width: 200, height: 150 });
}

#[test]
fn test_target_callback_requires_created_pass() {
    let device = mock_device();
    let mut pass = color_depth_pass(&device);
    assert!(pass.on_created(&views(1, 2), area(8, 8)).is_err());
}

#[test]
fn test_render_pass_destroy_twice() {
    let device = mock_device();
    let pass = make_render_pass(device.clone());
    {
        let mut pass = pass.borrow_mut();
        pass.add_attachment(Attachment::new(
            vk::Format::B8G8R8A8_UNORM,
            vk::SampleCountFlags::TYPE_1,
        ));
        pass.add_subpass(make_subpass(vk::PipelineBindPoint::GRAPHICS));
        pass.create(&views(2, 1), area(8, 8)).unwrap();

        pass.destroy();
        pass.destroy();
    }

    assert_eq!(device.count("destroy_render_pass"), 1);
    assert_eq!(device.count("destroy_framebuffer"), 2);
    assert_eq!(pass.borrow().subpass_count(), 0);
    assert!(pass.borrow().attachments().is_empty());

    drop(pass);
    assert_eq!(device.count("destroy_render_pass"), 1);
}

#[test]
fn test_second_create_releases_previous_pass() {
    let device = mock_device();
    let mut pass = color_depth_pass(&device);
    pass.create(&views(1, 2), area(8, 8)).unwrap();
    pass.create(&views(1, 2), area(8, 8)).unwrap();

    assert_eq!(device.count("create_render_pass"), 2);
    assert_eq!(device.count("destroy_render_pass"), 1);
    assert_eq!(device.count("destroy_framebuffer"), 1);
    assert_eq!(pass.framebuffers().len(), 1);
}
