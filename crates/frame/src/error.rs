//! Frame-level error types.

use lava_rhi::RhiError;
use thiserror::Error;

/// Errors reported by the run loop and the frame setup path.
///
/// Every variant maps to a negative process exit code through
/// [`FrameError::code`].
#[derive(Error, Debug)]
pub enum FrameError {
    /// `run` was entered while a run was already in progress
    #[error("Frame is still running")]
    StillRunning,

    /// The frame was used before a successful setup
    #[error("Frame is not ready")]
    NotReady,

    /// A component failed to create
    #[error("Create failed: {0}")]
    CreateFailed(String),

    /// A run callback returned `false`
    #[error("Run aborted")]
    Aborted,

    /// The platform window could not be created
    #[error("Window create failed: {0}")]
    WindowCreateFailed(String),

    /// No device could be created for the surface
    #[error("Device create failed: {0}")]
    DeviceCreateFailed(#[source] RhiError),

    /// The swapchain or render target could not be created
    #[error("Render target create failed: {0}")]
    RenderTargetCreateFailed(#[source] RhiError),

    /// Device layer error outside the cases above
    #[error(transparent)]
    Rhi(#[from] RhiError),
}

impl FrameError {
    /// Process exit code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::StillRunning => -1,
            Self::NotReady => -2,
            Self::CreateFailed(_) | Self::Rhi(_) => -3,
            Self::Aborted => -4,
            Self::WindowCreateFailed(_) => -5,
            Self::DeviceCreateFailed(_) => -6,
            Self::RenderTargetCreateFailed(_) => -7,
        }
    }
}

/// Result type alias for frame operations.
pub type FrameResult<T> = std::result::Result<T, FrameError>;
