//! Core utilities shared by the lava crates.
//!
//! This crate provides foundational types used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - The run-time clock driven by the frame loop
//! - Frame configuration from the command line and TOML files
//! - The event pump seam between the run loop and the platform layer

mod config;
mod error;
mod event;
mod logging;
mod time;

pub use config::{ConfigError, FrameArgs, FrameConfig, WindowConfig};
pub use error::{Error, Result};
pub use event::{EventPump, Headless};
pub use logging::{DEFAULT_FILTER, init_logging, init_logging_with};
pub use time::RunTime;
