//! Frame orchestration on top of the device layer.
//!
//! - [`Renderer`]: per-slot fences and semaphores, acquire/submit/present
//! - [`RenderTarget`]: swapchain plus the callbacks following its rebuilds
//! - [`RunLoop`] and [`Frame`]: the cooperative loop and its instance and
//!   device lifecycle

mod error;

pub mod frame;
pub mod render_target;
pub mod renderer;
pub mod run_loop;

pub use error::{FrameError, FrameResult};
pub use frame::Frame;
pub use render_target::{RenderTarget, TargetHooks};
pub use renderer::{FENCE_POLL_NS, FrameSync, Renderer};
pub use run_loop::{RunContext, RunId, RunLoop, ShutdownHandle};
