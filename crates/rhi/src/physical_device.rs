//! Physical device (GPU) selection.
//!
//! A GPU qualifies when it exposes a graphics queue, can present to the
//! target surface, and supports `VK_KHR_swapchain`. Among qualifying GPUs
//! the highest-rated one wins, with discrete GPUs first.
//!
//! # Example
//!
//! ```no_run
//! use lava_rhi::instance::{Instance, InstanceDesc};
//! use lava_rhi::physical_device::select_physical_device;
//! use ash::vk;
//!
//! let instance = Instance::new(&InstanceDesc::default()).expect("Failed to create instance");
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = instance.surface_loader();
//!
//! let device_info = select_physical_device(instance.handle(), surface, &surface_loader)
//!     .expect("Failed to select physical device");
//!
//! println!("Selected GPU: {:?}", device_info.device_name());
//! ```

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};

/// Queue family indices for different queue types.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Index of the queue family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the queue family that supports presentation to a surface.
    pub present_family: Option<u32>,
    /// Index of the queue family that supports compute operations.
    pub compute_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Checks if the graphics and present families were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns the unique queue family indices, graphics first.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(3);

        for family in [self.graphics_family, self.present_family, self.compute_family]
            .into_iter()
            .flatten()
        {
            if !families.contains(&family) {
                families.push(family);
            }
        }

        families
    }
}

/// Information about a physical device (GPU).
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features.
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family indices for different operations.
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        device_type_name(self.properties.device_type)
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }

    /// Returns the total device local memory in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{major}.{minor}.{patch}"))
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

fn device_type_name(device_type: vk::PhysicalDeviceType) -> &'static str {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
        vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
        vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
        vk::PhysicalDeviceType::CPU => "CPU",
        _ => "Other",
    }
}

/// Selects the most suitable physical device for presenting to `surface`.
///
/// # Arguments
///
/// * `instance` - The Vulkan instance
/// * `surface` - The window surface for present support checking
/// * `surface_loader` - The surface extension loader
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no GPU qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    let mut best: Option<(PhysicalDeviceInfo, u64)> = None;

    for device in devices {
        let Some(info) = check_device_suitability(instance, device, surface, surface_loader) else {
            continue;
        };

        let score = rate_device(
            info.properties.device_type,
            info.device_local_memory(),
            &info.queue_families,
        );
        debug!(
            "GPU '{}' ({}) - Score: {}",
            info.device_name(),
            info.device_type_name(),
            score
        );

        if best.as_ref().is_none_or(|(_, best_score)| score > *best_score) {
            best = Some((info, score));
        }
    }

    let Some((selected, score)) = best else {
        warn!("No suitable GPU found with required capabilities");
        return Err(RhiError::NoSuitableGpu);
    };

    let (major, minor, patch) = selected.api_version();
    info!(
        "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}, Score: {}",
        selected.device_name(),
        selected.device_type_name(),
        major,
        minor,
        patch,
        score
    );

    Ok(selected)
}

fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let features = unsafe { instance.get_physical_device_features(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let device_name = properties
        .device_name_as_c_str()
        .ok()
        .and_then(|name| name.to_str().ok())
        .unwrap_or("Unknown");

    if !supports_extension(instance, device, ash::khr::swapchain::NAME) {
        debug!("GPU '{}' skipped: VK_KHR_swapchain not supported", device_name);
        return None;
    }

    let queue_families = pick_queue_families(&families, |index| unsafe {
        surface_loader
            .get_physical_device_surface_support(device, index, surface)
            .unwrap_or(false)
    });

    if !queue_families.is_complete() {
        debug!(
            "GPU '{}' skipped: missing required queue families (graphics={}, present={})",
            device_name,
            queue_families.graphics_family.is_some(),
            queue_families.present_family.is_some()
        );
        return None;
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        features,
        memory_properties,
        queue_families,
    })
}

fn supports_extension(instance: &ash::Instance, device: vk::PhysicalDevice, name: &CStr) -> bool {
    let Ok(extensions) = (unsafe { instance.enumerate_device_extension_properties(device) }) else {
        return false;
    };

    extensions
        .iter()
        .any(|ext| ext.extension_name_as_c_str().is_ok_and(|ext_name| ext_name == name))
}

/// Chooses queue families from the reported properties.
///
/// Graphics takes the first family with `GRAPHICS`. Present prefers the
/// graphics family when it can present, otherwise the first family that can.
/// Compute prefers a family without graphics, falling back to graphics.
pub fn pick_queue_families(
    families: &[vk::QueueFamilyProperties],
    present_support: impl Fn(u32) -> bool,
) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();
    let mut dedicated_compute: Option<u32> = None;

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;

        if family.queue_count == 0 {
            continue;
        }

        let has_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let has_compute = family.queue_flags.contains(vk::QueueFlags::COMPUTE);

        if has_graphics && indices.graphics_family.is_none() {
            indices.graphics_family = Some(i);
        }

        if has_compute && !has_graphics && dedicated_compute.is_none() {
            dedicated_compute = Some(i);
        }
    }

    indices.present_family = match indices.graphics_family {
        Some(graphics) if present_support(graphics) => Some(graphics),
        _ => (0..families.len() as u32)
            .find(|&i| families[i as usize].queue_count > 0 && present_support(i)),
    };

    indices.compute_family = dedicated_compute.or(indices.graphics_family);

    indices
}

/// Rates a physical device. Higher scores are more desirable.
fn rate_device(
    device_type: vk::PhysicalDeviceType,
    device_local_memory: u64,
    queue_families: &QueueFamilyIndices,
) -> u64 {
    let mut score = match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 100_000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 10_000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 1_000,
        vk::PhysicalDeviceType::CPU => 100,
        _ => 1,
    };

    // VRAM in MB, capped at 16GB
    score += (device_local_memory / (1024 * 1024)).min(16_000);

    // Presenting from the graphics queue avoids ownership transfers
    if queue_families.graphics_family == queue_families.present_family {
        score += 50;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_queue_family_indices_default() {
        let indices = QueueFamilyIndices::default();
        assert!(indices.graphics_family.is_none());
        assert!(indices.present_family.is_none());
        assert!(indices.compute_family.is_none());
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_unique_families_with_duplicates() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
            compute_family: Some(1),
        };
        assert_eq!(indices.unique_families(), vec![0, 1]);
    }

    #[test]
    fn test_present_prefers_graphics_family() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let indices = pick_queue_families(&families, |_| true);
        assert_eq!(indices.graphics_family, Some(1));
        assert_eq!(indices.present_family, Some(1));
        assert_eq!(indices.compute_family, Some(1));
    }

    #[test]
    fn test_separate_present_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::TRANSFER),
        ];
        let indices = pick_queue_families(&families, |i| i == 2);
        assert_eq!(indices.graphics_family, Some(0));
        assert_eq!(indices.present_family, Some(2));
        assert_eq!(indices.compute_family, Some(1));
        assert!(indices.is_complete());
    }

    #[test]
    fn test_no_present_support() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let indices = pick_queue_families(&families, |_| false);
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_empty_families_skipped() {
        let mut empty = family(vk::QueueFlags::GRAPHICS);
        empty.queue_count = 0;
        let families = [empty, family(vk::QueueFlags::GRAPHICS)];
        let indices = pick_queue_families(&families, |_| true);
        assert_eq!(indices.graphics_family, Some(1));
        assert_eq!(indices.present_family, Some(1));
    }

    #[test]
    fn test_discrete_rated_above_integrated() {
        let families = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
            compute_family: Some(0),
        };
        let gib = 1024 * 1024 * 1024;
        let discrete = rate_device(vk::PhysicalDeviceType::DISCRETE_GPU, 2 * gib, &families);
        let integrated = rate_device(vk::PhysicalDeviceType::INTEGRATED_GPU, 64 * gib, &families);
        assert!(discrete > integrated);
    }
}
