//! Vulkan instance management.
//!
//! This module handles VkInstance creation, validation layers, and the debug
//! utils messenger that routes driver messages into `tracing`.
//!
//! # Example
//!
//! ```no_run
//! use lava_rhi::instance::{Instance, InstanceDesc};
//!
//! let desc = InstanceDesc {
//!     app_name: "triangle".to_string(),
//!     validation: cfg!(debug_assertions),
//!     ..Default::default()
//! };
//! let instance = Instance::new(&desc).expect("Failed to create Vulkan instance");
//! let vk_instance = instance.handle();
//! ```

use std::ffi::{CStr, CString, c_char};

use ash::{Entry, vk};
use tracing::{debug, error, info, trace, warn};

use crate::error::{RhiError, RhiResult};

/// The Khronos validation layer name.
const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Engine name reported to drivers.
const ENGINE_NAME: &CStr = c"lava";

/// Parameters for [`Instance::new`].
#[derive(Debug, Clone)]
pub struct InstanceDesc {
    /// Application name reported to the driver.
    pub app_name: String,
    /// Enable the Khronos validation layer when it is installed.
    pub validation: bool,
    /// Enable debug utils (messenger, object names) even without validation.
    pub debug_utils: bool,
    /// Surface extensions required by the window system.
    ///
    /// When empty, the platform defaults for the current OS are used.
    pub surface_extensions: Vec<&'static CStr>,
}

impl Default for InstanceDesc {
    fn default() -> Self {
        Self {
            app_name: "lava".to_string(),
            validation: false,
            debug_utils: false,
            surface_extensions: Vec::new(),
        }
    }
}

/// Vulkan instance wrapper with optional validation layer support.
///
/// When dropped, it destroys the debug messenger and then the instance.
/// Every device, surface and swapchain created from it must be gone first.
pub struct Instance {
    /// Vulkan entry point loader
    entry: Entry,
    /// Vulkan instance handle
    instance: ash::Instance,
    /// Debug utils extension loader and messenger
    debug: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    /// Validation layer is active
    validation: bool,
}

impl Instance {
    /// Creates a new Vulkan instance targeting Vulkan 1.1.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Vulkan library cannot be loaded
    /// - Instance creation fails
    /// - Debug messenger setup fails
    pub fn new(desc: &InstanceDesc) -> RhiResult<Self> {
        // Load the Vulkan library
        let entry = unsafe { Entry::load()? };

        let validation = desc.validation && Self::is_validation_layer_available(&entry)?;
        if desc.validation && !validation {
            warn!("Validation layer requested but not available, proceeding without it");
        }
        let debug_utils = validation || desc.debug_utils;

        let app_name = CString::new(desc.app_name.as_str())
            .unwrap_or_else(|_| CString::from(c"lava"));

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(ENGINE_NAME)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_1);

        let mut extensions = if desc.surface_extensions.is_empty() {
            default_surface_extensions()
        } else {
            desc.surface_extensions.clone()
        };
        if debug_utils {
            extensions.push(ash::ext::debug_utils::NAME);
        }
        let extension_ptrs: Vec<*const c_char> =
            extensions.iter().map(|ext| ext.as_ptr()).collect();

        let layers: Vec<*const c_char> = if validation {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        info!(
            "Vulkan instance created for '{}' with {} extension(s)",
            desc.app_name,
            extensions.len()
        );

        let debug = if debug_utils {
            let loader = ash::ext::debug_utils::Instance::new(&entry, &instance);
            match Self::setup_debug_messenger(&loader) {
                Ok(messenger) => Some((loader, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        if validation {
            info!("Validation layers enabled");
        }

        Ok(Self {
            entry,
            instance,
            debug,
            validation,
        })
    }

    /// Returns the Vulkan instance handle.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the Vulkan entry point loader.
    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Returns whether validation layers are enabled.
    #[inline]
    pub fn has_validation(&self) -> bool {
        self.validation
    }

    /// Returns whether the debug utils messenger is installed.
    #[inline]
    pub fn has_debug_utils(&self) -> bool {
        self.debug.is_some()
    }

    /// Creates a surface extension loader for this instance.
    pub fn surface_loader(&self) -> ash::khr::surface::Instance {
        ash::khr::surface::Instance::new(&self.entry, &self.instance)
    }

    /// Checks if the Khronos validation layer is available.
    fn is_validation_layer_available(entry: &Entry) -> RhiResult<bool> {
        let available_layers = unsafe { entry.enumerate_instance_layer_properties()? };

        let found = available_layers.iter().any(|layer| {
            layer
                .layer_name_as_c_str()
                .is_ok_and(|name| name == VALIDATION_LAYER_NAME)
        });

        Ok(found)
    }

    fn setup_debug_messenger(
        debug_utils: &ash::ext::debug_utils::Instance,
    ) -> RhiResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? };
        debug!("Debug messenger created");

        Ok(messenger)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some((loader, messenger)) = self.debug.take() {
                loader.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }
}

/// Surface extensions for the current OS, used when the window system did
/// not report its own list.
fn default_surface_extensions() -> Vec<&'static CStr> {
    let mut extensions = vec![ash::khr::surface::NAME];

    #[cfg(target_os = "windows")]
    extensions.push(ash::khr::win32_surface::NAME);

    #[cfg(target_os = "linux")]
    {
        extensions.push(ash::khr::xlib_surface::NAME);
        extensions.push(ash::khr::wayland_surface::NAME);
    }

    #[cfg(target_os = "macos")]
    extensions.push(ash::ext::metal_surface::NAME);

    extensions
}

/// Routes debug utils messages into `tracing` at the matching level.
///
/// # Safety
///
/// Called by the Vulkan loader with a valid callback data pointer, as the
/// debug utils extension specifies.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let kind = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "performance",
        _ => "general",
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!(target: "lava::vulkan", "[{kind}] {message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!(target: "lava::vulkan", "[{kind}] {message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => debug!(target: "lava::vulkan", "[{kind}] {message}"),
        _ => trace!(target: "lava::vulkan", "[{kind}] {message}"),
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_creation_without_validation() {
        // Requires a Vulkan loader and driver
        match Instance::new(&InstanceDesc::default()) {
            Ok(instance) => {
                assert!(!instance.has_validation());
                assert!(!instance.has_debug_utils());
            }
            Err(RhiError::LoadingError(_)) => {
                eprintln!("Skipping test: Vulkan not available");
            }
            Err(e) => {
                eprintln!("Skipping test: no usable Vulkan driver ({e})");
            }
        }
    }

    #[test]
    fn test_debug_utils_without_validation() {
        let desc = InstanceDesc {
            debug_utils: true,
            ..Default::default()
        };
        match Instance::new(&desc) {
            Ok(instance) => {
                assert!(instance.has_debug_utils());
            }
            Err(e) => {
                eprintln!("Skipping test: Vulkan not available ({e})");
            }
        }
    }

    #[test]
    fn test_default_surface_extensions() {
        let extensions = default_surface_extensions();
        assert_eq!(extensions[0], ash::khr::surface::NAME);

        #[cfg(target_os = "linux")]
        assert_eq!(extensions.len(), 3);

        #[cfg(any(target_os = "windows", target_os = "macos"))]
        assert_eq!(extensions.len(), 2);
    }

    #[test]
    fn test_default_desc() {
        let desc = InstanceDesc::default();
        assert_eq!(desc.app_name, "lava");
        assert!(!desc.validation);
        assert!(desc.surface_extensions.is_empty());
    }
}
