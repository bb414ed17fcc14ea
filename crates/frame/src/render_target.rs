//! Swapchain plus the callbacks that follow its rebuilds.
//!
//! A [`RenderTarget`] registers one [`TargetHooks`] with its swapchain. On
//! every rebuild the hooks decide which attachments the registered
//! callbacks (usually render passes) see, and run the optional
//! start/stop hooks around them.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use ash::vk;
use lava_rhi::device::Device;
use lava_rhi::instance::Instance;
use lava_rhi::swapchain::{
    CallbackId, PresentTarget, SharedTargetCallback, Swapchain, SwapchainDesc, TargetAttachments,
    TargetCallback, TargetCallbacks,
};
use lava_rhi::RhiResult;
use tracing::{debug, info};

type CreateAttachmentsFn =
    Box<dyn FnMut(&[Vec<vk::ImageView>], vk::Rect2D) -> RhiResult<TargetAttachments>>;
type StartFn = Box<dyn FnMut() -> RhiResult<()>>;
type StopFn = Box<dyn FnMut()>;

/// Hooks run around each swapchain rebuild.
#[derive(Default)]
pub struct TargetHooks {
    callbacks: TargetCallbacks,
    on_create_attachments: Option<CreateAttachmentsFn>,
    on_destroy_attachments: Option<StopFn>,
    on_swapchain_start: Option<StartFn>,
    on_swapchain_stop: Option<StopFn>,
}

impl TargetHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback that receives the target attachments.
    pub fn add_callback(&mut self, callback: SharedTargetCallback) -> CallbackId {
        self.callbacks.add(callback)
    }

    pub fn remove_callback(&mut self, id: CallbackId) -> bool {
        self.callbacks.remove(id)
    }

    pub fn clear_callbacks(&mut self) {
        self.callbacks.clear();
    }

    #[inline]
    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Builds the per-slot attachments from the swapchain views.
    ///
    /// Without this hook the swapchain views are passed through unchanged.
    pub fn set_on_create_attachments(
        &mut self,
        hook: impl FnMut(&[Vec<vk::ImageView>], vk::Rect2D) -> RhiResult<TargetAttachments> + 'static,
    ) {
        self.on_create_attachments = Some(Box::new(hook));
    }

    /// Releases whatever `on_create_attachments` built.
    pub fn set_on_destroy_attachments(&mut self, hook: impl FnMut() + 'static) {
        self.on_destroy_attachments = Some(Box::new(hook));
    }

    /// Runs after the callbacks saw a rebuilt target.
    pub fn set_on_swapchain_start(&mut self, hook: impl FnMut() -> RhiResult<()> + 'static) {
        self.on_swapchain_start = Some(Box::new(hook));
    }

    /// Runs before the callbacks release their resources.
    pub fn set_on_swapchain_stop(&mut self, hook: impl FnMut() + 'static) {
        self.on_swapchain_stop = Some(Box::new(hook));
    }
}

impl TargetCallback for TargetHooks {
    fn on_created(&mut self, attachments: &[Vec<vk::ImageView>], area: vk::Rect2D) -> RhiResult<()> {
        let target_attachments = match self.on_create_attachments.as_mut() {
            Some(create) => create(attachments, area)?,
            None => attachments.to_vec(),
        };

        self.callbacks.notify_created(&target_attachments, area)?;

        if let Some(start) = self.on_swapchain_start.as_mut() {
            start()?;
        }
        Ok(())
    }

    fn on_destroyed(&mut self) {
        if let Some(stop) = self.on_swapchain_stop.as_mut() {
            stop();
        }

        self.callbacks.notify_destroyed();

        if let Some(destroy) = self.on_destroy_attachments.as_mut() {
            destroy();
        }
    }
}

/// Swapchain with its own target-callback list.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use ash::vk;
/// use lava_rhi::device::Device;
/// use lava_rhi::instance::Instance;
/// use lava_rhi::swapchain::SwapchainDesc;
/// use lava_block::make_render_pass;
/// use lava_frame::RenderTarget;
///
/// # fn example(instance: &Instance, device: Arc<Device>, surface: vk::SurfaceKHR) -> Result<(), lava_rhi::RhiError> {
/// let mut target = RenderTarget::new(instance, device.clone(), surface, &SwapchainDesc::default())?;
///
/// let pass = make_render_pass(device);
/// pass.borrow_mut().create(&target.attachments(), target.area())?;
/// target.add_callback(pass.clone());
/// # Ok(())
/// # }
/// ```
pub struct RenderTarget {
    swapchain: Swapchain,
    hooks: Rc<RefCell<TargetHooks>>,
    hook_id: Option<CallbackId>,
}

impl RenderTarget {
    /// Creates the swapchain for `surface` and hooks into its rebuilds.
    ///
    /// # Errors
    ///
    /// Returns an error if the swapchain cannot be created.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        desc: &SwapchainDesc,
    ) -> RhiResult<Self> {
        let mut swapchain = Swapchain::new(instance, device, surface, desc)?;

        let hooks = Rc::new(RefCell::new(TargetHooks::new()));
        let hook_id = swapchain.add_callback(hooks.clone());

        info!(
            "Render target created ({}x{}, {} frames)",
            swapchain.extent().width,
            swapchain.extent().height,
            swapchain.frame_count()
        );

        Ok(Self {
            swapchain,
            hooks,
            hook_id: Some(hook_id),
        })
    }

    /// Registers a callback notified on every rebuild.
    pub fn add_callback(&mut self, callback: SharedTargetCallback) -> CallbackId {
        self.hooks.borrow_mut().add_callback(callback)
    }

    pub fn remove_callback(&mut self, id: CallbackId) -> bool {
        self.hooks.borrow_mut().remove_callback(id)
    }

    /// Rebuilds the swapchain for a new window size.
    ///
    /// # Errors
    ///
    /// Returns an error if the rebuild or a callback fails.
    pub fn resize(&mut self, size: vk::Extent2D) -> RhiResult<()> {
        self.swapchain.resize(size)
    }

    /// Rebuilds the swapchain at its current size.
    ///
    /// # Errors
    ///
    /// Returns an error if the rebuild or a callback fails.
    pub fn reload(&mut self) -> RhiResult<()> {
        self.swapchain.reload()
    }

    /// Releases the callbacks and the swapchain. Safe to call more than once.
    pub fn destroy(&mut self) {
        self.hooks.borrow_mut().clear_callbacks();

        if let Some(id) = self.hook_id.take() {
            self.swapchain.remove_callback(id);
            debug!("Render target hooks detached");
        }
        self.swapchain.destroy();
    }

    #[inline]
    pub fn reload_request(&self) -> bool {
        self.swapchain.reload_request()
    }

    /// Attachments of the current swapchain images, one list per slot.
    pub fn attachments(&self) -> TargetAttachments {
        self.swapchain.attachments()
    }

    #[inline]
    pub fn area(&self) -> vk::Rect2D {
        self.swapchain.area()
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.swapchain.format()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    #[inline]
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Hooks run around each rebuild.
    #[inline]
    pub fn hooks(&self) -> &Rc<RefCell<TargetHooks>> {
        &self.hooks
    }
}

impl PresentTarget for RenderTarget {
    fn frame_count(&self) -> usize {
        self.swapchain.frame_count()
    }

    fn acquire_next_image(&self, semaphore: vk::Semaphore, timeout_ns: u64) -> Result<(u32, bool), vk::Result> {
        self.swapchain.acquire_next_image(semaphore, timeout_ns)
    }

    fn present(&self, image_index: u32, wait_semaphore: vk::Semaphore) -> Result<bool, vk::Result> {
        self.swapchain.present(image_index, wait_semaphore)
    }

    fn request_reload(&mut self) {
        self.swapchain.request_reload();
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        self.destroy();
    }
}
