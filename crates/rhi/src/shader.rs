//! SPIR-V loading and shader stage naming.
//!
//! Shader modules themselves are created by the pipeline layer; this module
//! turns shader bytes into validated SPIR-V words.
//!
//! # Example
//!
//! ```no_run
//! use lava_rhi::shader::parse_spirv;
//!
//! # fn example() -> Result<(), lava_rhi::RhiError> {
//! let bytes = std::fs::read("shaders/triangle.vert.spv").unwrap_or_default();
//! let words = parse_spirv(&bytes)?;
//! assert!(!words.is_empty());
//! # Ok(())
//! # }
//! ```

use ash::vk;

use crate::error::{RhiError, RhiResult};

/// First word of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Shader stage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader stage - processes each vertex
    Vertex,
    /// Fragment (pixel) shader stage - processes each fragment
    Fragment,
    /// Compute shader stage - general-purpose GPU computation
    Compute,
    /// Geometry shader stage - processes primitives
    Geometry,
    /// Tessellation control shader stage
    TessControl,
    /// Tessellation evaluation shader stage
    TessEvaluation,
}

impl ShaderStage {
    /// Converts the shader stage to Vulkan shader stage flags.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
            ShaderStage::Compute => vk::ShaderStageFlags::COMPUTE,
            ShaderStage::Geometry => vk::ShaderStageFlags::GEOMETRY,
            ShaderStage::TessControl => vk::ShaderStageFlags::TESSELLATION_CONTROL,
            ShaderStage::TessEvaluation => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
        }
    }

    /// Maps a single Vulkan stage bit back to a stage, if it is one of ours.
    pub fn from_vk_stage(flags: vk::ShaderStageFlags) -> Option<Self> {
        match flags {
            vk::ShaderStageFlags::VERTEX => Some(ShaderStage::Vertex),
            vk::ShaderStageFlags::FRAGMENT => Some(ShaderStage::Fragment),
            vk::ShaderStageFlags::COMPUTE => Some(ShaderStage::Compute),
            vk::ShaderStageFlags::GEOMETRY => Some(ShaderStage::Geometry),
            vk::ShaderStageFlags::TESSELLATION_CONTROL => Some(ShaderStage::TessControl),
            vk::ShaderStageFlags::TESSELLATION_EVALUATION => Some(ShaderStage::TessEvaluation),
            _ => None,
        }
    }

    /// Returns a human-readable name for the shader stage.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
            ShaderStage::Geometry => "geometry",
            ShaderStage::TessControl => "tessellation control",
            ShaderStage::TessEvaluation => "tessellation evaluation",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Converts SPIR-V bytes into little-endian code words.
///
/// # Errors
///
/// Returns [`RhiError::ShaderError`] if the data is empty, not a multiple
/// of 4 bytes, or does not start with the SPIR-V magic number.
pub fn parse_spirv(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    if bytes.is_empty() {
        return Err(RhiError::ShaderError("SPIR-V code is empty".to_string()));
    }

    if !bytes.len().is_multiple_of(4) {
        return Err(RhiError::ShaderError(format!(
            "SPIR-V code must be 4-byte aligned, got {} bytes",
            bytes.len()
        )));
    }

    let code: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if code[0] != SPIRV_MAGIC {
        return Err(RhiError::ShaderError(format!(
            "Bad SPIR-V magic number {:#010x}",
            code[0]
        )));
    }

    Ok(code)
}
