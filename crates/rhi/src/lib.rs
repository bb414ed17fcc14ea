//! Vulkan device layer (Render Hardware Interface).
//!
//! This crate provides a safe abstraction over Vulkan using the `ash` crate.
//! It handles:
//! - Instance and device creation
//! - Queue access and submission
//! - Swapchain management and target callbacks
//! - Command pools and command buffer recording
//! - Buffers backed by gpu-allocator
//! - Synchronization primitives
//!
//! The [`command::CommandDevice`] and [`sync::SyncDevice`] traits are the
//! seams the frame orchestration layers talk through; [`device::Device`]
//! implements both.

mod error;

pub mod buffer;
pub mod command;
pub mod device;
pub mod instance;
pub mod physical_device;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
