//! Vulkan logical device and queue management.
//!
//! This module handles VkDevice creation, queue retrieval, and gpu-allocator
//! initialization.
//!
//! # Example
//!
//! ```no_run
//! use lava_rhi::instance::{Instance, InstanceDesc};
//! use lava_rhi::physical_device::select_physical_device;
//! use lava_rhi::device::Device;
//! use ash::vk;
//!
//! let instance = Instance::new(&InstanceDesc::default()).expect("Failed to create instance");
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let surface_loader = instance.surface_loader();
//!
//! let physical_device_info = select_physical_device(instance.handle(), surface, &surface_loader)
//!     .expect("No suitable GPU found");
//!
//! let device = Device::new(&instance, &physical_device_info)
//!     .expect("Failed to create logical device");
//!
//! let graphics_queue = device.graphics_queue();
//! let present_queue = device.present_queue();
//! ```

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, error, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices};

/// Required device extensions.
const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Optional base features, enabled only when the GPU reports them.
fn optional_features(supported: &vk::PhysicalDeviceFeatures) -> vk::PhysicalDeviceFeatures {
    vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(supported.sampler_anisotropy == vk::TRUE)
        .fill_mode_non_solid(supported.fill_mode_non_solid == vk::TRUE)
        .wide_lines(supported.wide_lines == vk::TRUE)
        .independent_blend(supported.independent_blend == vk::TRUE)
}

/// Vulkan logical device wrapper.
///
/// Owns the logical device, its queues and the memory allocator.
///
/// # Thread Safety
///
/// The [`Device`] is designed to be shared across threads using `Arc`. The
/// internal allocator is protected by a `Mutex`.
pub struct Device {
    /// Vulkan logical device handle.
    device: ash::Device,
    /// Physical device handle.
    physical_device: vk::PhysicalDevice,
    /// Device properties captured at selection time.
    properties: vk::PhysicalDeviceProperties,
    /// Base features that were enabled.
    enabled_features: vk::PhysicalDeviceFeatures,
    /// GPU memory allocator. Dropped before the device is destroyed.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    /// Graphics queue handle.
    graphics_queue: vk::Queue,
    /// Presentation queue handle.
    present_queue: vk::Queue,
    /// Compute queue handle (may be the same as graphics queue).
    compute_queue: vk::Queue,
    /// Queue family indices.
    queue_families: QueueFamilyIndices,
}

impl Device {
    /// Creates a new logical device.
    ///
    /// Enables `VK_KHR_swapchain` and whichever of the optional base features
    /// (sampler anisotropy, non-solid fill, wide lines, independent blend)
    /// the GPU supports.
    ///
    /// # Arguments
    ///
    /// * `instance` - The Vulkan instance
    /// * `physical_device_info` - Information about the selected physical device
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The queue families are incomplete
    /// - Device creation fails
    /// - Allocator initialization fails
    pub fn new(instance: &Instance, physical_device_info: &PhysicalDeviceInfo) -> RhiResult<Arc<Self>> {
        let queue_families = physical_device_info.queue_families;

        let (Some(graphics_family), Some(present_family)) =
            (queue_families.graphics_family, queue_families.present_family)
        else {
            return Err(RhiError::NoSuitableGpu);
        };
        let compute_family = queue_families.compute_family.unwrap_or(graphics_family);

        let unique_families = queue_families.unique_families();
        let queue_priorities = [1.0f32];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_create_infos.len(),
            unique_families
        );

        let features = optional_features(&physical_device_info.features);

        let extension_names: Vec<*const std::ffi::c_char> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };

        info!(
            "Logical device created on '{}' with {} extension(s)",
            physical_device_info.device_name(),
            DEVICE_EXTENSIONS.len()
        );

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        let compute_queue = unsafe { device.get_device_queue(compute_family, 0) };
        debug!(
            "Queues retrieved (graphics={}, present={}, compute={})",
            graphics_family, present_family, compute_family
        );

        let allocator = match Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: physical_device_info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        }) {
            Ok(allocator) => allocator,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };

        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            physical_device: physical_device_info.device,
            properties: physical_device_info.properties,
            enabled_features: features,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
            compute_queue,
            queue_families,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the physical device properties.
    #[inline]
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    /// Returns the base features enabled at creation.
    #[inline]
    pub fn enabled_features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.enabled_features
    }

    /// Returns the graphics queue handle.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the presentation queue handle.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Returns the compute queue handle.
    ///
    /// This is the graphics queue when no dedicated compute family exists.
    #[inline]
    pub fn compute_queue(&self) -> vk::Queue {
        self.compute_queue
    }

    /// Returns the queue family indices.
    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// Returns the graphics queue family index.
    #[inline]
    pub fn graphics_family(&self) -> u32 {
        self.queue_families.graphics_family.unwrap_or_default()
    }

    /// Locks the GPU memory allocator.
    ///
    /// # Errors
    ///
    /// Returns an error if another thread panicked while holding the lock.
    pub fn allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| RhiError::InvalidHandle("allocator mutex poisoned".to_string()))
    }

    /// Waits for the device to become idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails, typically with device loss.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                error!("Failed to wait for device idle during drop: {:?}", e);
            }

            // The allocator frees its memory blocks through the device
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("physical_device", &self.physical_device)
            .field("queue_families", &self.queue_families)
            .finish_non_exhaustive()
    }
}

// Safety: Device is Send+Sync because:
// - ash::Device is Send+Sync
// - vk::PhysicalDevice and vk::Queue are Copy types (handles)
// - Allocator is protected by Mutex
// - Queue access is externally synchronized by the frame loop, which submits
//   from a single thread
unsafe impl Send for Device {}
unsafe impl Sync for Device {}
