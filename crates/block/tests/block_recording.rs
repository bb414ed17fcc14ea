mod common;

use lava_block::Block;

use common::{MockDevice, mock_device};

fn marker_cmd(
    device: &std::sync::Arc<MockDevice>,
    name: &'static str,
) -> impl FnMut(ash::vk::CommandBuffer, usize) + 'static {
    let device = device.clone();
    move |_, frame| device.log(format!("{name} {frame}"))
}

#[test]
fn test_block_rejects_zero_frames() {
    let device = mock_device();
    let mut block: Block<MockDevice> = Block::new();
    assert!(block.create(device, 0, 0).is_err());
    assert!(!block.is_created());
}

#[test]
fn test_block_order_after_remove_and_readd() {
    let device = mock_device();
    let mut block: Block<MockDevice> = Block::new();
    block.create(device.clone(), 2, 0).unwrap();

    let a = block.add_cmd(marker_cmd(&device, "a")).unwrap();
    let b = block.add_cmd(marker_cmd(&device, "b")).unwrap();
    let c = block.add_cmd(marker_cmd(&device, "c")).unwrap();
    assert_eq!(block.order(), &[a, b, c]);

    block.remove_cmd(b);
    assert_eq!(block.order(), &[a, c]);
    assert_eq!(device.count("free"), 2);

    let b = block.add_cmd(marker_cmd(&device, "b")).unwrap();
    assert_eq!(block.order(), &[a, c, b]);

    device.clear_events();
    block.process(1).unwrap();
    assert_eq!(device.filtered(&["a ", "b ", "c "]), vec!["a 1", "c 1", "b 1"]);
}

#[test]
fn test_block_resets_slot_pool_each_frame() {
    let device = mock_device();
    let mut block: Block<MockDevice> = Block::new();
    block.add_cmd(marker_cmd(&device, "first")).unwrap();
    block.add_cmd(marker_cmd(&device, "second")).unwrap();
    block.create(device.clone(), 2, 0).unwrap();

    device.clear_events();
    block.process(0).unwrap();
    block.process(1).unwrap();
    block.process(0).unwrap();

    let events = device.filtered(&["reset", "first", "second"]);
    assert_eq!(events.len(), 9);

    let resets: Vec<&String> = events.iter().filter(|e| e.starts_with("reset")).collect();
    assert_eq!(resets.len(), 3);
    assert_ne!(resets[0], resets[1]);
    assert_eq!(resets[0], resets[2]);

    assert_eq!(events[1], "first 0");
    assert_eq!(events[2], "second 0");
    assert_eq!(events[4], "first 1");
    assert_eq!(events[5], "second 1");
    assert_eq!(events[7], "first 0");
    assert_eq!(events[8], "second 0");
}

#[test]
fn test_block_records_between_begin_and_end() {
    let device = mock_device();
    let mut block: Block<MockDevice> = Block::new();
    block.create(device.clone(), 1, 0).unwrap();
    let id = block.add_cmd(marker_cmd(&device, "draw")).unwrap();

    device.clear_events();
    block.process(0).unwrap();

    let buffer = ash::vk::Handle::as_raw(block.command_buffer(id).unwrap());
    let events = device.filtered(&["begin", "draw", "end"]);
    assert_eq!(
        events,
        vec![
            format!("begin {buffer}"),
            "draw 0".to_string(),
            format!("end {buffer}"),
        ]
    );
}

#[test]
fn test_block_skips_inactive_commands() {
    let device = mock_device();
    let mut block: Block<MockDevice> = Block::new();
    block.create(device.clone(), 2, 0).unwrap();

    let shown = block.add_cmd(marker_cmd(&device, "shown")).unwrap();
    let hidden = block
        .add_cmd_with_state(marker_cmd(&device, "hidden"), false)
        .unwrap();
    assert!(!block.activated(hidden));

    block.process(1).unwrap();
    assert_eq!(device.count("hidden"), 0);
    assert_eq!(device.count("shown"), 1);
    assert_eq!(block.current_frame(), 1);

    let buffers = block.collect_buffers();
    assert_eq!(buffers, vec![block.command_buffer_at(shown, 1).unwrap()]);

    assert!(block.set_active(hidden, true));
    assert_eq!(block.collect_buffers().len(), 2);
}

#[test]
fn test_block_process_out_of_range() {
    let device = mock_device();
    let mut block: Block<MockDevice> = Block::new();
    assert!(block.process(0).is_err());

    block.create(device, 2, 0).unwrap();
    assert!(block.process(2).is_err());
    assert!(block.process(1).is_ok());
}

#[test]
fn test_block_follows_frame_count_change() {
    let device = mock_device();
    let mut block: Block<MockDevice> = Block::new();
    assert!(block.set_frame_count(3).is_err());

    block.create(device.clone(), 2, 5).unwrap();
    let id = block.add_cmd(marker_cmd(&device, "draw")).unwrap();
    assert!(block.process(2).is_err());

    device.clear_events();
    block.set_frame_count(2).unwrap();
    assert!(device.events().is_empty());

    block.set_frame_count(3).unwrap();
    assert_eq!(block.frame_count(), 3);
    assert_eq!(device.count("create_pool"), 3);
    assert!(block.command_buffer_at(id, 2).is_some());

    device.clear_events();
    block.process(2).unwrap();
    assert_eq!(device.filtered(&["draw"]), vec!["draw 2"]);
    assert!(block.set_frame_count(0).is_err());
}

#[test]
fn test_block_process_propagates_begin_failure() {
    let device = mock_device();
    let mut block: Block<MockDevice> = Block::new();
    block.create(device.clone(), 1, 0).unwrap();
    block.add_cmd(marker_cmd(&device, "never")).unwrap();

    device.fail_begin.set(true);
    assert!(block.process(0).is_err());
    assert_eq!(device.count("never"), 0);
}

#[test]
fn test_block_destroy_twice() {
    let device = mock_device();
    let mut block: Block<MockDevice> = Block::new();
    block.create(device.clone(), 3, 0).unwrap();
    block.add_cmd(marker_cmd(&device, "a")).unwrap();

    block.destroy();
    let destroyed = device.count("destroy_pool");
    assert_eq!(destroyed, 3);
    assert_eq!(device.count("free"), 3);
    assert!(block.order().is_empty());

    block.destroy();
    assert_eq!(device.count("destroy_pool"), destroyed);
}

#[test]
fn test_block_unknown_id_queries() {
    let device = mock_device();
    let mut block: Block<MockDevice> = Block::new();
    block.create(device.clone(), 1, 0).unwrap();
    let id = block.add_cmd(marker_cmd(&device, "a")).unwrap();
    block.remove_cmd(id);

    assert!(!block.set_active(id, true));
    assert!(!block.activated(id));
    assert!(block.command_buffer(id).is_none());
    block.remove_cmd(id);
}
