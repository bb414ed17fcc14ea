//! Application context: instance, devices and the run loop.

use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;
use lava_core::{EventPump, FrameConfig, Headless, init_logging_with};
use lava_rhi::device::Device;
use lava_rhi::instance::{Instance, InstanceDesc};
use lava_rhi::physical_device::select_physical_device;
use lava_rhi::swapchain::SwapchainDesc;
use tracing::{error, info, warn};

use crate::error::{FrameError, FrameResult};
use crate::render_target::RenderTarget;
use crate::run_loop::{RunContext, RunId, RunLoop, ShutdownHandle};

/// Owns the Vulkan instance, the devices made from it and the run loop.
///
/// A frame moves from *uninitialized* to *ready* on [`setup`](Self::setup)
/// and stays ready across any number of [`run`](Self::run) calls.
pub struct Frame<P: EventPump = Headless> {
    config: FrameConfig,
    // Drop order: callbacks (and the devices they captured), devices, instance
    run_loop: RunLoop<P>,
    devices: Vec<Arc<Device>>,
    instance: Option<Instance>,
}

impl Frame<Headless> {
    /// Creates a frame without a platform window.
    pub fn headless(config: FrameConfig) -> Self {
        Self::new(config, Headless)
    }
}

impl<P: EventPump> Frame<P> {
    pub fn new(config: FrameConfig, pump: P) -> Self {
        Self {
            config,
            run_loop: RunLoop::new(pump),
            devices: Vec::new(),
            instance: None,
        }
    }

    /// Installs logging and creates the instance.
    ///
    /// Returns `Ok(false)` if the frame is already set up.
    ///
    /// # Arguments
    ///
    /// * `surface_extensions` - Instance extensions the window system needs,
    ///   empty for the platform defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the Vulkan library cannot be loaded or the
    /// instance cannot be created.
    pub fn setup(&mut self, surface_extensions: Vec<&'static CStr>) -> FrameResult<bool> {
        if self.instance.is_some() {
            warn!("Frame is already set up");
            return Ok(false);
        }

        init_logging_with(self.config.log_level.as_deref());

        let desc = InstanceDesc {
            app_name: self.config.app_name.clone(),
            validation: self.config.debug,
            debug_utils: self.config.utils,
            surface_extensions,
        };
        let instance = Instance::new(&desc).inspect_err(|e| error!("Failed to create instance: {}", e))?;

        info!("Frame ready: {}", self.config.app_name);
        self.instance = Some(instance);
        Ok(true)
    }

    #[inline]
    pub fn ready(&self) -> bool {
        self.instance.is_some()
    }

    #[inline]
    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    /// Picks a GPU that can present to `surface` and creates a device on it.
    ///
    /// # Errors
    ///
    /// - [`FrameError::NotReady`] before a successful setup
    /// - [`FrameError::DeviceCreateFailed`] if no device can be created
    pub fn create_device(&mut self, surface: vk::SurfaceKHR) -> FrameResult<Arc<Device>> {
        let instance = self.instance.as_ref().ok_or(FrameError::NotReady)?;

        let surface_loader = instance.surface_loader();
        let info = select_physical_device(instance.handle(), surface, &surface_loader)
            .map_err(FrameError::DeviceCreateFailed)?;
        let device = Device::new(instance, &info).map_err(FrameError::DeviceCreateFailed)?;

        self.devices.push(device.clone());
        Ok(device)
    }

    /// Creates a render target for `surface` using the configured present
    /// settings.
    ///
    /// # Errors
    ///
    /// - [`FrameError::NotReady`] before a successful setup
    /// - [`FrameError::RenderTargetCreateFailed`] if the swapchain fails
    pub fn create_target(
        &self,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        size: vk::Extent2D,
    ) -> FrameResult<RenderTarget> {
        let instance = self.instance.as_ref().ok_or(FrameError::NotReady)?;

        let desc = SwapchainDesc {
            size,
            v_sync: self.config.v_sync,
            triple_buffer: self.config.triple_buffer,
            ..SwapchainDesc::default()
        };
        RenderTarget::new(instance, device, surface, &desc).map_err(FrameError::RenderTargetCreateFailed)
    }

    /// Runs the loop until shut down, then waits for every device to idle
    /// and runs the run-end callbacks.
    ///
    /// # Errors
    ///
    /// - [`FrameError::NotReady`] before a successful setup
    /// - [`FrameError::StillRunning`] if already running
    /// - [`FrameError::Aborted`] if a callback returned `false`
    pub fn run(&mut self) -> FrameResult<()> {
        if !self.ready() {
            return Err(FrameError::NotReady);
        }

        let devices = self.devices.clone();
        self.run_loop.run_with(move || {
            for device in &devices {
                if let Err(e) = device.wait_idle() {
                    error!("Failed to wait for device idle after run: {}", e);
                }
            }
        })
    }

    pub fn add_run(&mut self, run: impl FnMut(&mut RunContext<'_>) -> bool + 'static) -> RunId {
        self.run_loop.add_run(run)
    }

    pub fn add_run_end(&mut self, run_end: impl FnMut() + 'static) -> RunId {
        self.run_loop.add_run_end(run_end)
    }

    pub fn add_run_once(&mut self, run: impl FnOnce(&mut RunContext<'_>) -> bool + 'static) -> RunId {
        self.run_loop.add_run_once(run)
    }

    pub fn remove(&mut self, id: RunId) -> bool {
        self.run_loop.remove(id)
    }

    pub fn shut_down(&self) -> bool {
        self.run_loop.shut_down()
    }

    #[inline]
    pub fn running(&self) -> bool {
        self.run_loop.running()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.run_loop.shutdown_handle()
    }

    #[inline]
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    #[inline]
    pub fn run_loop(&self) -> &RunLoop<P> {
        &self.run_loop
    }

    #[inline]
    pub fn run_loop_mut(&mut self) -> &mut RunLoop<P> {
        &mut self.run_loop
    }
}
