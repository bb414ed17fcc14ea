//! Per-frame command recording.
//!
//! A [`Block`] keeps one command pool per frame slot and an ordered list of
//! commands. Every command owns one primary buffer per slot. Each frame,
//! [`Block::process`] resets the slot's pool and re-records every active
//! command in insertion order.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use lava_rhi::device::Device;
//! use lava_block::Block;
//!
//! # fn example(device: Arc<Device>, frame_count: usize) -> Result<(), lava_rhi::RhiError> {
//! let mut block = Block::new();
//! block.create(device.clone(), frame_count, device.graphics_family())?;
//!
//! let clear = block.add_cmd(|cmd, frame| {
//!     // record into `cmd` for `frame`
//! })?;
//!
//! block.process(0)?;
//! let buffers = block.collect_buffers();
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use ash::vk;
use lava_rhi::command::{CommandDevice, CommandPool};
use lava_rhi::device::Device;
use lava_rhi::{RhiError, RhiResult};
use tracing::{debug, error};

/// Recording callback, called with the slot's command buffer and the slot.
pub type RecordFn = Box<dyn FnMut(vk::CommandBuffer, usize)>;

/// Stable identifier of a command within its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(u64);

struct Command {
    buffers: Vec<vk::CommandBuffer>,
    on_process: RecordFn,
    active: bool,
}

impl Command {
    fn allocate<D: CommandDevice>(&mut self, pools: &[CommandPool<D>]) -> RhiResult<()> {
        let mut buffers = Vec::with_capacity(pools.len());
        for (slot, pool) in pools.iter().enumerate() {
            match pool.allocate_primary() {
                Ok(buffer) => buffers.push(buffer),
                Err(e) => {
                    error!("Failed to allocate command buffer for slot {}: {}", slot, e);
                    for (pool, buffer) in pools.iter().zip(&buffers) {
                        pool.free(std::slice::from_ref(buffer));
                    }
                    return Err(e);
                }
            }
        }
        self.buffers = buffers;
        Ok(())
    }

    fn free<D: CommandDevice>(&mut self, pools: &[CommandPool<D>]) {
        for (pool, buffer) in pools.iter().zip(self.buffers.drain(..)) {
            pool.free(&[buffer]);
        }
    }
}

/// Ordered set of commands replayed into every frame slot.
pub struct Block<D: CommandDevice = Device> {
    pools: Vec<CommandPool<D>>,
    commands: BTreeMap<CommandId, Command>,
    order: Vec<CommandId>,
    next_id: u64,
    current_frame: usize,
}

impl<D: CommandDevice> Default for Block<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: CommandDevice> Block<D> {
    pub fn new() -> Self {
        Self {
            pools: Vec::new(),
            commands: BTreeMap::new(),
            order: Vec::new(),
            next_id: 0,
            current_frame: 0,
        }
    }

    /// Creates `frame_count` command pools on `queue_family` and allocates
    /// buffers for every command added so far.
    ///
    /// # Errors
    ///
    /// Returns an error if `frame_count` is zero or pool creation or buffer
    /// allocation fails.
    pub fn create(&mut self, device: Arc<D>, frame_count: usize, queue_family: u32) -> RhiResult<()> {
        if frame_count == 0 {
            return Err(RhiError::CommandError("block needs at least one frame".to_string()));
        }
        if !self.pools.is_empty() {
            self.release();
        }

        let mut pools = Vec::with_capacity(frame_count);
        for _ in 0..frame_count {
            let pool = CommandPool::new(device.clone(), queue_family)
                .inspect_err(|e| error!("Failed to create block command pool: {}", e))?;
            pools.push(pool);
        }

        let mut failure = None;
        for command in self.commands.values_mut() {
            if let Err(e) = command.allocate(&pools) {
                failure = Some(e);
                break;
            }
        }
        if let Some(e) = failure {
            for command in self.commands.values_mut() {
                command.free(&pools);
            }
            return Err(e);
        }

        self.pools = pools;
        self.current_frame = 0;
        debug!(
            "Block created: {} frame(s), {} command(s)",
            frame_count,
            self.commands.len()
        );
        Ok(())
    }

    /// Recreates the pools for `frame_count` frames on the same device and
    /// queue family, reallocating every command's buffers. Does nothing if
    /// the count is unchanged. The device must be idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the block is not created, `frame_count` is zero,
    /// or pool creation or buffer allocation fails.
    pub fn set_frame_count(&mut self, frame_count: usize) -> RhiResult<()> {
        if frame_count == self.pools.len() {
            return Ok(());
        }
        let Some(pool) = self.pools.first() else {
            return Err(RhiError::CommandError("block not created".to_string()));
        };
        let (device, queue_family) = (pool.device().clone(), pool.queue_family_index());

        debug!("Block frame count {} -> {}", self.pools.len(), frame_count);
        self.create(device, frame_count, queue_family)
    }

    fn release(&mut self) {
        for command in self.commands.values_mut() {
            command.free(&self.pools);
        }
        self.pools.clear();
    }

    /// Frees all command buffers and pools and forgets every command.
    /// Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.pools.is_empty() && self.commands.is_empty() {
            return;
        }
        self.release();
        self.order.clear();
        self.commands.clear();
        debug!("Block destroyed");
    }

    /// Appends an active command to the recording order.
    ///
    /// # Errors
    ///
    /// Returns an error if buffer allocation fails on an already created block.
    pub fn add_cmd(
        &mut self,
        on_process: impl FnMut(vk::CommandBuffer, usize) + 'static,
    ) -> RhiResult<CommandId> {
        self.add_cmd_with_state(on_process, true)
    }

    /// Appends a command in the given activity state.
    ///
    /// # Errors
    ///
    /// Returns an error if buffer allocation fails on an already created block.
    pub fn add_cmd_with_state(
        &mut self,
        on_process: impl FnMut(vk::CommandBuffer, usize) + 'static,
        active: bool,
    ) -> RhiResult<CommandId> {
        let mut command = Command {
            buffers: Vec::new(),
            on_process: Box::new(on_process),
            active,
        };
        if !self.pools.is_empty() {
            command.allocate(&self.pools)?;
        }

        let id = CommandId(self.next_id);
        self.next_id += 1;
        self.commands.insert(id, command);
        self.order.push(id);
        Ok(id)
    }

    /// Frees the command's buffers and drops it from the order. Unknown ids
    /// are ignored.
    pub fn remove_cmd(&mut self, id: CommandId) {
        let Some(mut command) = self.commands.remove(&id) else {
            return;
        };
        command.free(&self.pools);
        self.order.retain(|entry| *entry != id);
    }

    /// Re-records every active command for `frame`.
    ///
    /// The slot's pool is reset first, so all of its buffers start fresh.
    /// The caller must have waited for the slot's previous submission.
    ///
    /// # Errors
    ///
    /// Returns an error if the block is not created, `frame` is out of range,
    /// or a reset, begin or end fails. Recording stops at the first failure
    /// and the slot's buffers must not be submitted.
    pub fn process(&mut self, frame: usize) -> RhiResult<()> {
        let pool = self.pools.get(frame).ok_or_else(|| {
            RhiError::CommandError(format!(
                "frame {frame} out of range for {} pool(s)",
                self.pools.len()
            ))
        })?;

        self.current_frame = frame;
        pool.reset()
            .inspect_err(|e| error!("Failed to reset block command pool: {}", e))?;

        let device = pool.device();
        for id in &self.order {
            let Some(command) = self.commands.get_mut(id) else {
                continue;
            };
            if !command.active {
                continue;
            }

            let Some(&buffer) = command.buffers.get(frame) else {
                return Err(RhiError::CommandError(format!(
                    "command has no buffer for frame {frame}"
                )));
            };
            device.begin_command_buffer(buffer, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;
            (command.on_process)(buffer, frame);
            device.end_command_buffer(buffer)?;
        }
        Ok(())
    }

    /// Buffers of the active commands for the current frame, in order.
    pub fn collect_buffers(&self) -> Vec<vk::CommandBuffer> {
        self.order
            .iter()
            .filter_map(|id| self.commands.get(id))
            .filter(|command| command.active)
            .filter_map(|command| command.buffers.get(self.current_frame).copied())
            .collect()
    }

    /// Returns `false` for unknown ids.
    pub fn set_active(&mut self, id: CommandId, active: bool) -> bool {
        match self.commands.get_mut(&id) {
            Some(command) => {
                command.active = active;
                true
            }
            None => false,
        }
    }

    pub fn activated(&self, id: CommandId) -> bool {
        self.commands.get(&id).is_some_and(|command| command.active)
    }

    /// The command's buffer for the current frame.
    pub fn command_buffer(&self, id: CommandId) -> Option<vk::CommandBuffer> {
        self.command_buffer_at(id, self.current_frame)
    }

    pub fn command_buffer_at(&self, id: CommandId, frame: usize) -> Option<vk::CommandBuffer> {
        self.commands.get(&id)?.buffers.get(frame).copied()
    }

    /// Command ids in recording order.
    #[inline]
    pub fn order(&self) -> &[CommandId] {
        &self.order
    }

    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.pools.len()
    }

    #[inline]
    pub fn is_created(&self) -> bool {
        !self.pools.is_empty()
    }
}

impl<D: CommandDevice> Drop for Block<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}
