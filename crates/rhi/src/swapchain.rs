//! Swapchain management.
//!
//! This module handles VkSwapchainKHR creation, image acquisition,
//! presentation and resize handling.
//!
//! A [`Swapchain`] owns its surface and the views of its backbuffer images.
//! Anything that owns per-image resources (framebuffers, mostly) registers a
//! [`TargetCallback`]. On resize the callbacks are told to release those
//! resources in registration order, the chain is rebuilt, and the callbacks
//! are told to recreate them in reverse registration order.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use lava_rhi::device::Device;
//! use lava_rhi::instance::Instance;
//! use lava_rhi::swapchain::{Swapchain, SwapchainDesc};
//! use ash::vk;
//!
//! # fn example(instance: &Instance, device: Arc<Device>, surface: vk::SurfaceKHR) -> Result<(), lava_rhi::RhiError> {
//! let desc = SwapchainDesc {
//!     size: vk::Extent2D { width: 1280, height: 720 },
//!     ..Default::default()
//! };
//! let mut swapchain = Swapchain::new(instance, device, surface, &desc)?;
//!
//! // On window resize:
//! swapchain.resize(vk::Extent2D { width: 1920, height: 1080 })?;
//! # Ok(())
//! # }
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// Default wait for [`PresentTarget::acquire_next_image`].
pub const ACQUIRE_TIMEOUT_NS: u64 = u64::MAX;

/// Per-image attachment views, one list per backbuffer.
pub type TargetAttachments = Vec<Vec<vk::ImageView>>;

/// Receiver of create/destroy notifications from a resizable target.
pub trait TargetCallback {
    /// Called after the target was (re)built.
    ///
    /// `attachments[i]` holds the views for frame slot `i`; `area` covers the
    /// whole target.
    ///
    /// # Errors
    ///
    /// An error stops the notification sequence and is returned by the
    /// operation that triggered it.
    fn on_created(&mut self, attachments: &[Vec<vk::ImageView>], area: vk::Rect2D) -> RhiResult<()>;

    /// Called before the target's images go away.
    fn on_destroyed(&mut self);
}

/// Shared handle to a registered callback.
pub type SharedTargetCallback = Rc<RefCell<dyn TargetCallback>>;

/// Identifier handed out when a callback is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

/// Ordered list of target callbacks.
#[derive(Default)]
pub struct TargetCallbacks {
    next_id: u64,
    entries: Vec<(CallbackId, SharedTargetCallback)>,
}

impl TargetCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a callback and returns its id.
    pub fn add(&mut self, callback: SharedTargetCallback) -> CallbackId {
        let id = CallbackId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, callback));
        id
    }

    /// Removes a callback. Returns false for unknown ids.
    pub fn remove(&mut self, id: CallbackId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Calls `on_destroyed` in registration order.
    pub fn notify_destroyed(&self) {
        for (_, callback) in &self.entries {
            callback.borrow_mut().on_destroyed();
        }
    }

    /// Calls `on_created` in reverse registration order, stopping at the
    /// first failure.
    pub fn notify_created(&self, attachments: &[Vec<vk::ImageView>], area: vk::Rect2D) -> RhiResult<()> {
        for (id, callback) in self.entries.iter().rev() {
            callback.borrow_mut().on_created(attachments, area).map_err(|e| {
                error!("Target callback {:?} failed on create: {}", id, e);
                e
            })?;
        }
        Ok(())
    }
}

/// Preferred surface formats in request order, plus the wanted color space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceFormatRequest {
    pub formats: Vec<vk::Format>,
    pub color_space: vk::ColorSpaceKHR,
}

impl Default for SurfaceFormatRequest {
    fn default() -> Self {
        Self {
            formats: vec![
                vk::Format::B8G8R8A8_UNORM,
                vk::Format::R8G8B8A8_UNORM,
                vk::Format::B8G8R8_UNORM,
                vk::Format::R8G8B8_UNORM,
                vk::Format::B8G8R8A8_SRGB,
                vk::Format::R8G8B8A8_SRGB,
                vk::Format::B8G8R8_SRGB,
                vk::Format::R8G8B8_SRGB,
            ],
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }
}

/// Picks a surface format for `request` out of the reported `formats`.
///
/// A lone `UNDEFINED` entry means the surface takes any format, so the first
/// requested one is used. Otherwise the first requested format available in
/// the requested color space wins, falling back to the first reported
/// format. Returns `None` when nothing is reported.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    request: &SurfaceFormatRequest,
) -> Option<vk::SurfaceFormatKHR> {
    if let [only] = formats {
        if only.format == vk::Format::UNDEFINED
            && let Some(&first) = request.formats.first()
        {
            return Some(vk::SurfaceFormatKHR {
                format: first,
                color_space: request.color_space,
            });
        }
        return Some(*only);
    }

    request
        .formats
        .iter()
        .find_map(|&wanted| {
            formats
                .iter()
                .find(|f| f.format == wanted && f.color_space == request.color_space)
                .copied()
        })
        .or_else(|| formats.first().copied())
}

/// Chooses the present mode.
///
/// V-sync always uses FIFO. Otherwise MAILBOX is preferred; IMMEDIATE is
/// accepted only with triple buffering off. FIFO is the guaranteed fallback.
pub fn choose_present_mode(
    present_modes: &[vk::PresentModeKHR],
    v_sync: bool,
    triple_buffer: bool,
) -> vk::PresentModeKHR {
    if v_sync {
        return vk::PresentModeKHR::FIFO;
    }

    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        return vk::PresentModeKHR::MAILBOX;
    }

    if !triple_buffer && present_modes.contains(&vk::PresentModeKHR::IMMEDIATE) {
        return vk::PresentModeKHR::IMMEDIATE;
    }

    vk::PresentModeKHR::FIFO
}

/// Chooses the swapchain extent.
///
/// A defined current extent wins; otherwise the requested size is clamped to
/// the surface limits.
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, size: vk::Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: size.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: size.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Two images above the minimum, capped by the maximum when there is one.
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 2;

    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

fn choose_transform(capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if capabilities
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        capabilities.current_transform
    }
}

fn choose_composite_alpha(capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::CompositeAlphaFlagsKHR {
    [
        vk::CompositeAlphaFlagsKHR::OPAQUE,
        vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::POST_MULTIPLIED,
        vk::CompositeAlphaFlagsKHR::INHERIT,
    ]
    .into_iter()
    .find(|&flag| capabilities.supported_composite_alpha.contains(flag))
    .unwrap_or(vk::CompositeAlphaFlagsKHR::OPAQUE)
}

fn choose_image_usage(capabilities: &vk::SurfaceCapabilitiesKHR) -> vk::ImageUsageFlags {
    let mut usage = vk::ImageUsageFlags::COLOR_ATTACHMENT;
    for extra in [vk::ImageUsageFlags::TRANSFER_SRC, vk::ImageUsageFlags::TRANSFER_DST] {
        if capabilities.supported_usage_flags.contains(extra) {
            usage |= extra;
        }
    }
    usage
}

/// Swapchain surface support details.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (min/max image count, extents, transforms, etc.)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats (format and color space combinations)
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes (FIFO, MAILBOX, IMMEDIATE, etc.)
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support details for a physical device and surface.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the queries fail.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };

        let formats =
            unsafe { surface_loader.get_physical_device_surface_formats(physical_device, surface)? };

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unlimited".to_string()
            } else {
                capabilities.max_image_count.to_string()
            }
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }
}

/// Creation parameters for [`Swapchain::new`].
#[derive(Debug, Clone)]
pub struct SwapchainDesc {
    /// Framebuffer size of the window.
    pub size: vk::Extent2D,
    pub v_sync: bool,
    pub triple_buffer: bool,
    pub format_request: SurfaceFormatRequest,
}

impl Default for SwapchainDesc {
    fn default() -> Self {
        Self {
            size: vk::Extent2D::default(),
            v_sync: false,
            triple_buffer: true,
            format_request: SurfaceFormatRequest::default(),
        }
    }
}

/// The image chain a renderer acquires from and presents to.
pub trait PresentTarget {
    /// Number of backbuffers, which is also the number of frame slots.
    fn frame_count(&self) -> usize;

    /// Acquires the next image, signaling `semaphore` once it is usable.
    ///
    /// Returns the image index and whether the chain is suboptimal.
    fn acquire_next_image(&self, semaphore: vk::Semaphore, timeout_ns: u64) -> Result<(u32, bool), vk::Result>;

    /// Queues `image_index` for presentation after `wait_semaphore`.
    ///
    /// Returns whether the chain is suboptimal.
    fn present(&self, image_index: u32, wait_semaphore: vk::Semaphore) -> Result<bool, vk::Result>;

    /// Marks the chain for rebuilding before the next frame.
    fn request_reload(&mut self);
}

/// Native side of a resizable image chain, driven by [`resize_chain`].
pub trait ImageChain {
    /// Size of the current images.
    fn extent(&self) -> vk::Extent2D;

    fn has_images(&self) -> bool;

    fn reload_requested(&self) -> bool;

    fn wait_idle(&self) -> RhiResult<()>;

    /// Releases the per-image views. The chain itself is kept for reuse.
    fn release_images(&mut self);

    /// Builds images of `size`, retiring the previous chain and clearing
    /// the reload request.
    fn rebuild(&mut self, size: vk::Extent2D) -> RhiResult<()>;

    fn attachments(&self) -> TargetAttachments;

    fn area(&self) -> vk::Rect2D;
}

/// Rebuilds `chain` for `size` and notifies `callbacks` around it.
///
/// Waits for idle, calls `on_destroyed` in registration order while the
/// old images still exist, rebuilds, then calls `on_created` in reverse
/// order. A zero-sized request stops after the release. Resizing to the
/// current size without a pending reload does nothing.
///
/// # Errors
///
/// Returns an error if the device wait, the rebuild or a callback fails.
pub fn resize_chain<C: ImageChain + ?Sized>(
    chain: &mut C,
    callbacks: &TargetCallbacks,
    size: vk::Extent2D,
) -> RhiResult<()> {
    if size == chain.extent() && !chain.reload_requested() && chain.has_images() {
        return Ok(());
    }

    chain.wait_idle()?;

    if chain.has_images() {
        callbacks.notify_destroyed();
        chain.release_images();
    }

    if size.width == 0 || size.height == 0 {
        debug!("Chain resize to {}x{} deferred", size.width, size.height);
        return Ok(());
    }

    chain.rebuild(size)?;

    let attachments = chain.attachments();
    callbacks.notify_created(&attachments, chain.area())
}

/// Vulkan swapchain wrapper.
///
/// Owns the surface, the swapchain and the backbuffer views. The images are
/// owned by the swapchain itself.
///
/// # Thread Safety
///
/// The swapchain is used from the frame loop thread only.
pub struct Swapchain {
    /// Reference to the logical device
    device: Arc<Device>,
    /// Surface extension loader
    surface_loader: ash::khr::surface::Instance,
    /// Swapchain extension loader
    swapchain_loader: ash::khr::swapchain::Device,
    /// Presentation surface, destroyed with the swapchain
    surface: vk::SurfaceKHR,
    /// Swapchain handle
    swapchain: vk::SwapchainKHR,
    /// Swapchain images (owned by the swapchain)
    images: Vec<vk::Image>,
    /// Image views for the swapchain images
    image_views: Vec<vk::ImageView>,
    surface_format: vk::SurfaceFormatKHR,
    /// Requested size
    size: vk::Extent2D,
    /// Size of the current images
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    v_sync: bool,
    triple_buffer: bool,
    reload_requested: bool,
    callbacks: TargetCallbacks,
}

impl Swapchain {
    /// Creates a swapchain for `surface`, taking ownership of the surface.
    ///
    /// The surface is destroyed together with the swapchain, including when
    /// this constructor fails.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Surface queries fail
    /// - The surface reports no formats or present modes
    /// - Swapchain or image view creation fails
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        desc: &SwapchainDesc,
    ) -> RhiResult<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());

        let mut swapchain = Self {
            device,
            surface_loader: instance.surface_loader(),
            swapchain_loader,
            surface,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            surface_format: vk::SurfaceFormatKHR::default(),
            size: desc.size,
            extent: vk::Extent2D::default(),
            present_mode: vk::PresentModeKHR::FIFO,
            v_sync: desc.v_sync,
            triple_buffer: desc.triple_buffer,
            reload_requested: false,
            callbacks: TargetCallbacks::new(),
        };

        let formats = unsafe {
            swapchain
                .surface_loader
                .get_physical_device_surface_formats(swapchain.device.physical_device(), surface)?
        };
        swapchain.surface_format = choose_surface_format(&formats, &desc.format_request)
            .ok_or_else(|| RhiError::SurfaceError("surface reports no formats".to_string()))?;

        debug!(
            "Surface format {:?} / {:?}",
            swapchain.surface_format.format, swapchain.surface_format.color_space
        );

        swapchain.setup()?;
        Ok(swapchain)
    }

    /// Builds the chain for the current size, retiring the previous one.
    fn setup(&mut self) -> RhiResult<()> {
        let support = SwapchainSupportDetails::query(
            self.device.physical_device(),
            self.surface,
            &self.surface_loader,
        )?;

        if support.present_modes.is_empty() {
            error!("Surface reports no present modes");
            return Err(RhiError::SwapchainError(
                "no present modes available".to_string(),
            ));
        }

        let capabilities = &support.capabilities;
        let present_mode = choose_present_mode(&support.present_modes, self.v_sync, self.triple_buffer);
        let extent = choose_extent(capabilities, self.size);
        let image_count = determine_image_count(capabilities);

        info!(
            "Creating swapchain: {}x{}, format {:?}, present mode {:?}, {} images",
            extent.width, extent.height, self.surface_format.format, present_mode, image_count
        );

        let old_swapchain = self.swapchain;

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(choose_image_usage(capabilities))
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(choose_transform(capabilities))
            .composite_alpha(choose_composite_alpha(capabilities))
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe {
            self.swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| {
                    error!("Failed to create swapchain: {:?}", e);
                    e
                })?
        };

        let images = match unsafe { self.swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e.into());
            }
        };

        let image_views = match create_image_views(&self.device, &images, self.surface_format.format) {
            Ok(views) => views,
            Err(e) => {
                unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e);
            }
        };

        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(old_swapchain, None) };
        }

        info!("Swapchain created with {} images", images.len());

        self.swapchain = swapchain;
        self.images = images;
        self.image_views = image_views;
        self.extent = extent;
        self.present_mode = present_mode;
        self.reload_requested = false;

        Ok(())
    }

    /// Rebuilds the chain for a new size, notifying the target callbacks.
    ///
    /// Waits for the device to go idle, tells every callback to release its
    /// per-image resources, rebuilds the chain, then tells the callbacks to
    /// recreate them. A zero-sized request (minimized window) releases the
    /// old images and returns without rebuilding. Resizing to the current
    /// size without a pending reload does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the device wait, the rebuild or a callback fails.
    pub fn resize(&mut self, size: vk::Extent2D) -> RhiResult<()> {
        self.size = size;

        // Callbacks only see their own state, so the list can be lent out
        let callbacks = std::mem::take(&mut self.callbacks);
        let result = resize_chain(self, &callbacks, size);
        self.callbacks = callbacks;
        result
    }

    /// Rebuilds the chain at the current size.
    ///
    /// # Errors
    ///
    /// Same as [`Swapchain::resize`].
    pub fn reload(&mut self) -> RhiResult<()> {
        self.reload_requested = true;
        self.resize(self.size)
    }

    /// Releases the views, the swapchain and the surface.
    ///
    /// Callbacks are told to release their resources first. Calling this
    /// again does nothing.
    pub fn destroy(&mut self) {
        if self.surface == vk::SurfaceKHR::null() && self.swapchain == vk::SwapchainKHR::null() {
            return;
        }

        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle before swapchain destroy: {}", e);
        }

        if !self.image_views.is_empty() {
            self.callbacks.notify_destroyed();
            self.destroy_image_views();
        }

        if self.swapchain != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(self.swapchain, None) };
            self.swapchain = vk::SwapchainKHR::null();
            info!(
                "Swapchain destroyed (was {}x{}, {} images)",
                self.extent.width,
                self.extent.height,
                self.images.len()
            );
        }
        self.images.clear();

        if self.surface != vk::SurfaceKHR::null() {
            unsafe { self.surface_loader.destroy_surface(self.surface, None) };
            self.surface = vk::SurfaceKHR::null();
        }
    }

    /// Registers a target callback. It is notified on the next rebuild.
    pub fn add_callback(&mut self, callback: SharedTargetCallback) -> CallbackId {
        self.callbacks.add(callback)
    }

    /// Unregisters a target callback.
    pub fn remove_callback(&mut self, id: CallbackId) -> bool {
        self.callbacks.remove(id)
    }

    /// Returns whether a reload was requested since the last rebuild.
    #[inline]
    pub fn reload_request(&self) -> bool {
        self.reload_requested
    }

    /// One single-view attachment list per backbuffer.
    pub fn attachments(&self) -> TargetAttachments {
        self.image_views.iter().map(|&view| vec![view]).collect()
    }

    /// The full area of the current images.
    #[inline]
    pub fn area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Returns the surface handle.
    #[inline]
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Returns the device the swapchain was created on.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Returns the swapchain image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    /// Returns the swapchain color space.
    #[inline]
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.surface_format.color_space
    }

    /// Returns the swapchain extent (resolution).
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the present mode.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    #[inline]
    pub fn v_sync(&self) -> bool {
        self.v_sync
    }

    #[inline]
    pub fn triple_buffer(&self) -> bool {
        self.triple_buffer
    }

    /// Returns the number of swapchain images.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Returns all swapchain images.
    #[inline]
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// Returns all image views.
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    fn destroy_image_views(&mut self) {
        for &image_view in &self.image_views {
            unsafe {
                self.device.handle().destroy_image_view(image_view, None);
            }
        }
        self.image_views.clear();
    }
}

impl ImageChain for Swapchain {
    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn has_images(&self) -> bool {
        !self.image_views.is_empty()
    }

    fn reload_requested(&self) -> bool {
        self.reload_requested
    }

    fn wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }

    fn release_images(&mut self) {
        self.destroy_image_views();
    }

    fn rebuild(&mut self, size: vk::Extent2D) -> RhiResult<()> {
        self.size = size;
        self.setup()
    }

    fn attachments(&self) -> TargetAttachments {
        Swapchain::attachments(self)
    }

    fn area(&self) -> vk::Rect2D {
        Swapchain::area(self)
    }
}

impl PresentTarget for Swapchain {
    fn frame_count(&self) -> usize {
        self.images.len()
    }

    fn acquire_next_image(&self, semaphore: vk::Semaphore, timeout_ns: u64) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, timeout_ns, semaphore, vk::Fence::null())
        }
    }

    fn present(&self, image_index: u32, wait_semaphore: vk::Semaphore) -> Result<bool, vk::Result> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe {
            self.swapchain_loader
                .queue_present(self.device.present_queue(), &present_info)
        }
    }

    fn request_reload(&mut self) {
        if !self.reload_requested {
            warn!("Swapchain reload requested");
        }
        self.reload_requested = true;
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Creates image views for swapchain images.
fn create_image_views(device: &Device, images: &[vk::Image], format: vk::Format) -> RhiResult<Vec<vk::ImageView>> {
    let mut image_views = Vec::with_capacity(images.len());

    for (i, &image) in images.iter().enumerate() {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        match unsafe { device.handle().create_image_view(&create_info, None) } {
            Ok(view) => image_views.push(view),
            Err(e) => {
                for &view in &image_views {
                    unsafe { device.handle().destroy_image_view(view, None) };
                }
                return Err(RhiError::SwapchainError(format!(
                    "Failed to create image view {}: {:?}",
                    i, e
                )));
            }
        }
    }

    debug!("Created {} image views", image_views.len());
    Ok(image_views)
}
