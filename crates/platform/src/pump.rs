//! winit event loop driven from the frame loop.
//!
//! The frame loop owns the iteration, so instead of handing control to
//! `EventLoop::run_app` the platform pumps pending events once per step.

use std::ffi::CStr;
use std::time::Duration;

use lava_core::{Error, EventPump, Result, WindowConfig};
use raw_window_handle::HasDisplayHandle;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::{MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::WindowId;

use crate::input::InputState;
use crate::window::{Window, required_extensions};

/// Pumps allowed for the first resume to create the window.
const OPEN_ATTEMPTS: usize = 64;

/// Receives winit callbacks during a pump.
struct Handler {
    config: WindowConfig,
    window: Option<Window>,
    input: InputState,
    error: Option<Error>,
}

impl ApplicationHandler for Handler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        match Window::new(event_loop, &self.config) {
            Ok(window) => self.window = Some(window),
            Err(e) => {
                error!("Failed to create window: {}", e);
                self.error = Some(e);
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                window.request_close();
            }
            WindowEvent::Resized(size) => window.handle_resize(size.width, size.height),
            WindowEvent::Focused(false) => self.input.release_all(),
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    self.input.handle_key(key, event.state.is_pressed());
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.input.handle_button(button.into(), state.is_pressed());
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.input.handle_cursor(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseWheel { delta, .. } => match delta {
                MouseScrollDelta::LineDelta(x, y) => self.input.handle_scroll(x, y),
                MouseScrollDelta::PixelDelta(position) => {
                    self.input.handle_scroll(position.x as f32, position.y as f32)
                }
            },
            _ => {}
        }
    }
}

/// One window and the event loop feeding it.
///
/// Implements [`EventPump`], so it can be handed to the frame loop directly
/// or shared through `Rc<RefCell<Platform>>`.
pub struct Platform {
    event_loop: EventLoop<()>,
    handler: Handler,
}

impl Platform {
    /// Creates the event loop. The window opens with [`open`](Self::open).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Window`] if the event loop cannot be created.
    pub fn new(config: WindowConfig) -> Result<Self> {
        let event_loop = EventLoop::new().map_err(|e| Error::Window(e.to_string()))?;

        Ok(Self {
            event_loop,
            handler: Handler {
                config,
                window: None,
                input: InputState::new(),
                error: None,
            },
        })
    }

    /// Instance extensions needed for surfaces on this display.
    ///
    /// # Errors
    ///
    /// Returns an error if the display handle is unavailable or unsupported.
    pub fn required_extensions(&self) -> Result<Vec<&'static CStr>> {
        let display_handle = self
            .event_loop
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;
        required_extensions(display_handle.as_raw())
    }

    /// Pumps until the platform resumed and the window exists.
    ///
    /// # Errors
    ///
    /// Returns an error if window creation fails or the platform never
    /// resumes.
    pub fn open(&mut self) -> Result<&mut Window> {
        for _ in 0..OPEN_ATTEMPTS {
            if self.handler.window.is_some() {
                break;
            }
            self.pump(Some(Duration::ZERO));
            if let Some(e) = self.handler.error.take() {
                return Err(e);
            }
        }

        self.handler
            .window
            .as_mut()
            .ok_or_else(|| Error::Window("platform did not resume".to_string()))
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.handler) {
            info!("Event loop exited with code {}", code);
            if let Some(window) = self.handler.window.as_mut() {
                window.request_close();
            }
        }
    }

    #[inline]
    pub fn window(&self) -> Option<&Window> {
        self.handler.window.as_ref()
    }

    #[inline]
    pub fn window_mut(&mut self) -> Option<&mut Window> {
        self.handler.window.as_mut()
    }

    #[inline]
    pub fn input(&self) -> &InputState {
        &self.handler.input
    }

    /// True once the window asked to close, or if it never opened.
    pub fn close_request(&self) -> bool {
        self.window().is_none_or(Window::close_request)
    }

    pub fn resize_request(&self) -> bool {
        self.window().is_some_and(Window::resize_request)
    }

    pub fn iconified(&self) -> bool {
        self.window().is_some_and(Window::iconified)
    }
}

impl EventPump for Platform {
    fn pump_events(&mut self, wait: bool) {
        self.handler.input.begin_pump();
        self.pump(if wait { None } else { Some(Duration::ZERO) });
    }
}
