//! Platform layer for the frame loop.
//!
//! This crate provides:
//! - A winit window with close, resize and iconify requests
//! - Vulkan surface creation through ash-window
//! - An event pump the frame loop drives once per step
//! - Keyboard and mouse state

mod input;
mod pump;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use pump::Platform;
pub use window::{Window, required_extensions};
