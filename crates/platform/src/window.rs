//! Window management using winit.
//!
//! The window records the requests the frame loop reacts to (close, resize,
//! iconify) and creates the Vulkan surface for the swapchain.

use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use lava_core::{Error, Result, WindowConfig};

/// A winit window plus the requests raised by its events.
pub struct Window {
    window: Arc<WinitWindow>,
    framebuffer_size: vk::Extent2D,
    close_request: bool,
    resize_request: bool,
    iconified: bool,
}

impl Window {
    /// Creates a window from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Window`] if the platform refuses the window.
    pub fn new(event_loop: &ActiveEventLoop, config: &WindowConfig) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(config.resizable);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        let size = window.inner_size();
        tracing::info!("Window created: {}x{}", size.width, size.height);

        Ok(Self {
            window: Arc::new(window),
            framebuffer_size: vk::Extent2D {
                width: size.width,
                height: size.height,
            },
            close_request: false,
            resize_request: false,
            iconified: false,
        })
    }

    /// Get a reference to the underlying winit window.
    #[inline]
    pub fn inner(&self) -> &WinitWindow {
        &self.window
    }

    /// Size of the drawable area in pixels.
    #[inline]
    pub fn framebuffer_size(&self) -> vk::Extent2D {
        self.framebuffer_size
    }

    #[inline]
    pub fn close_request(&self) -> bool {
        self.close_request
    }

    #[inline]
    pub fn resize_request(&self) -> bool {
        self.resize_request
    }

    /// Whether the window is minimized or has no drawable area.
    #[inline]
    pub fn iconified(&self) -> bool {
        self.iconified
    }

    pub fn request_close(&mut self) {
        self.close_request = true;
    }

    /// Records a new framebuffer size and raises the resize request.
    pub fn handle_resize(&mut self, width: u32, height: u32) {
        self.framebuffer_size = vk::Extent2D { width, height };
        self.resize_request = true;
        self.iconified =
            width == 0 || height == 0 || self.window.is_minimized().unwrap_or(false);
        tracing::debug!("Window resized: {}x{}", width, height);
    }

    /// Clears the resize request and returns the size to resize to.
    pub fn take_resize_request(&mut self) -> Option<vk::Extent2D> {
        if !self.resize_request {
            return None;
        }
        self.resize_request = false;
        Some(self.framebuffer_size)
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Creates a Vulkan surface for this window.
    ///
    /// The caller owns the returned surface. It is usually handed to a
    /// swapchain, which destroys it.
    ///
    /// # Errors
    ///
    /// Returns an error if the window handles are unavailable or surface
    /// creation fails.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<vk::SurfaceKHR> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;

        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {}", e)))?;

        // SAFETY: The entry and instance are valid references provided by the caller.
        // The display and window handles come from the live winit window.
        let surface = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Vulkan(format!("Failed to create Vulkan surface: {}", e)))?
        };

        tracing::info!("Vulkan surface created");
        Ok(surface)
    }
}

/// Instance extensions needed to create surfaces on `display_handle`.
///
/// # Errors
///
/// Returns an error if the display system is not supported.
pub fn required_extensions(display_handle: RawDisplayHandle) -> Result<Vec<&'static CStr>> {
    let extensions = ash_window::enumerate_required_extensions(display_handle)
        .map_err(|e| Error::Vulkan(format!("Failed to enumerate required extensions: {}", e)))?;

    // SAFETY: ash_window returns pointers to static, null-terminated extension names.
    let names: Vec<&'static CStr> = extensions
        .iter()
        .map(|&ext| unsafe { CStr::from_ptr(ext) })
        .collect();

    tracing::debug!("Required Vulkan extensions for surface: {:?}", names);
    Ok(names)
}
