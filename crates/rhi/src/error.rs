//! RHI-specific error types.

use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load Vulkan
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Invalid or unreadable shader code
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface query or support error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// A handle was used before creation or after destruction
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Pipeline or pipeline layout creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Render pass or framebuffer creation error
    #[error("Render pass error: {0}")]
    RenderPassError(String),

    /// Command pool or command buffer misuse
    #[error("Command error: {0}")]
    CommandError(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
