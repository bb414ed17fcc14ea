//! Error types shared across the workspace.

use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for the non-GPU layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Surface or instance level Vulkan errors raised outside the device layer
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the core Error type.
pub type Result<T> = std::result::Result<T, Error>;
