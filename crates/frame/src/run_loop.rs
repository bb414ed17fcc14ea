//! Single-threaded cooperative run loop.
//!
//! Every step pumps platform events, runs the pending run-once callbacks,
//! then every run callback in id order, and finally applies the removals
//! requested during the step. Teardown callbacks registered with
//! [`RunLoop::add_run_end`] run once after the loop stops.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use lava_core::{EventPump, Headless, RunTime};
use tracing::{debug, info, warn};

use crate::error::{FrameError, FrameResult};

/// Identifier of a registered run, run-end or run-once callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(u64);

/// Cloneable handle that stops the loop at the end of the current step.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Rc<Cell<bool>>);

impl ShutdownHandle {
    /// Stops the loop. Returns false if it was not running.
    pub fn shut_down(&self) -> bool {
        self.0.replace(false)
    }

    #[inline]
    pub fn running(&self) -> bool {
        self.0.get()
    }

    fn start(&self) {
        self.0.set(true);
    }
}

/// What a callback sees of the loop while it runs.
pub struct RunContext<'a> {
    id: Option<RunId>,
    time: &'a RunTime,
    shutdown: &'a ShutdownHandle,
    pending_removes: &'a mut Vec<RunId>,
    wait_for_events: &'a mut bool,
}

impl RunContext<'_> {
    /// Id of the running callback, `None` for run-once callbacks.
    #[inline]
    pub fn id(&self) -> Option<RunId> {
        self.id
    }

    #[inline]
    pub fn time(&self) -> &RunTime {
        self.time
    }

    /// Ends the loop after this step.
    pub fn shut_down(&self) -> bool {
        self.shutdown.shut_down()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Queues `id` for removal at the end of the step.
    ///
    /// Returns false if the id is already queued.
    pub fn remove(&mut self, id: RunId) -> bool {
        queue_remove(self.pending_removes, id)
    }

    /// Makes the next event pumps block until an event arrives.
    pub fn set_wait_for_events(&mut self, wait: bool) {
        *self.wait_for_events = wait;
    }
}

type RunFn = Box<dyn FnMut(&mut RunContext<'_>) -> bool>;
type RunOnceFn = Box<dyn FnOnce(&mut RunContext<'_>) -> bool>;
type RunEndFn = Box<dyn FnMut()>;

fn queue_remove(pending: &mut Vec<RunId>, id: RunId) -> bool {
    if pending.contains(&id) {
        return false;
    }
    pending.push(id);
    true
}

/// Cooperative frame loop over an [`EventPump`].
///
/// # Example
///
/// ```
/// use lava_frame::RunLoop;
///
/// let mut run_loop = RunLoop::headless();
/// let mut frames = 0;
/// run_loop.add_run(move |ctx| {
///     frames += 1;
///     if frames == 3 {
///         ctx.shut_down();
///     }
///     true
/// });
/// assert!(run_loop.run().is_ok());
/// ```
pub struct RunLoop<P: EventPump = Headless> {
    pump: P,
    wait_for_events: bool,
    running: ShutdownHandle,
    time: RunTime,
    start: Option<Instant>,
    runs: BTreeMap<RunId, RunFn>,
    run_ends: BTreeMap<RunId, RunEndFn>,
    run_once: Vec<(RunId, RunOnceFn)>,
    pending_removes: Vec<RunId>,
    next_id: u64,
}

impl RunLoop<Headless> {
    /// Creates a loop without a platform window.
    pub fn headless() -> Self {
        Self::new(Headless)
    }
}

impl<P: EventPump> RunLoop<P> {
    pub fn new(pump: P) -> Self {
        Self {
            pump,
            wait_for_events: false,
            running: ShutdownHandle::default(),
            time: RunTime::new(),
            start: None,
            runs: BTreeMap::new(),
            run_ends: BTreeMap::new(),
            run_once: Vec::new(),
            pending_removes: Vec::new(),
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> RunId {
        let id = RunId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Registers a callback that runs every step until removed.
    ///
    /// Returning `false` aborts the loop.
    pub fn add_run(&mut self, run: impl FnMut(&mut RunContext<'_>) -> bool + 'static) -> RunId {
        let id = self.next_id();
        self.runs.insert(id, Box::new(run));
        id
    }

    /// Registers a teardown callback that runs after the loop stops.
    pub fn add_run_end(&mut self, run_end: impl FnMut() + 'static) -> RunId {
        let id = self.next_id();
        self.run_ends.insert(id, Box::new(run_end));
        id
    }

    /// Registers a callback for the start of the next step only.
    pub fn add_run_once(&mut self, run: impl FnOnce(&mut RunContext<'_>) -> bool + 'static) -> RunId {
        let id = self.next_id();
        self.run_once.push((id, Box::new(run)));
        id
    }

    /// Queues a run, run-end or run-once callback for removal.
    ///
    /// Removals apply at the end of the current step or on
    /// [`trigger_run_remove`](Self::trigger_run_remove). Returns false for
    /// unknown ids and ids already queued.
    pub fn remove(&mut self, id: RunId) -> bool {
        let known = self.runs.contains_key(&id)
            || self.run_ends.contains_key(&id)
            || self.run_once.iter().any(|(once, _)| *once == id);
        known && queue_remove(&mut self.pending_removes, id)
    }

    /// Applies all queued removals now.
    pub fn trigger_run_remove(&mut self) {
        for id in self.pending_removes.drain(..) {
            if self.runs.remove(&id).is_none() && self.run_ends.remove(&id).is_none() {
                self.run_once.retain(|(once, _)| *once != id);
            }
        }
    }

    /// Runs one iteration. Returns false if a callback asked to abort.
    pub fn run_step(&mut self) -> bool {
        self.pump.pump_events(self.wait_for_events);
        self.time.tick();

        for (id, run) in std::mem::take(&mut self.run_once) {
            if self.pending_removes.contains(&id) {
                continue;
            }
            let mut ctx = RunContext {
                id: None,
                time: &self.time,
                shutdown: &self.running,
                pending_removes: &mut self.pending_removes,
                wait_for_events: &mut self.wait_for_events,
            };
            if !run(&mut ctx) {
                warn!("Run-once callback {:?} aborted the step", id);
                return false;
            }
        }

        for (id, run) in self.runs.iter_mut() {
            if self.pending_removes.contains(id) {
                continue;
            }
            let mut ctx = RunContext {
                id: Some(*id),
                time: &self.time,
                shutdown: &self.running,
                pending_removes: &mut self.pending_removes,
                wait_for_events: &mut self.wait_for_events,
            };
            if !run(&mut ctx) {
                warn!("Run callback {:?} aborted the step", id);
                return false;
            }
        }

        self.trigger_run_remove();
        true
    }

    /// Runs until shut down, then calls `wait_idle` and the run-end
    /// callbacks in registration order.
    ///
    /// # Errors
    ///
    /// - [`FrameError::StillRunning`] if the loop is already running
    /// - [`FrameError::Aborted`] if a callback returned `false`
    pub fn run_with(&mut self, wait_idle: impl FnOnce()) -> FrameResult<()> {
        if self.running.running() {
            return Err(FrameError::StillRunning);
        }

        self.running.start();
        self.start = Some(Instant::now());
        self.time.reset();
        info!("Run loop started");

        let mut aborted = false;
        while self.running.running() {
            if !self.run_step() {
                aborted = true;
                break;
            }
        }

        wait_idle();

        for run_end in self.run_ends.values_mut() {
            run_end();
        }
        self.trigger_run_remove();
        self.running.shut_down();

        debug!("Run loop stopped after {:?}", self.running_time());
        if aborted {
            Err(FrameError::Aborted)
        } else {
            Ok(())
        }
    }

    /// [`run_with`](Self::run_with) without a device to wait for.
    ///
    /// # Errors
    ///
    /// Same as [`run_with`](Self::run_with).
    pub fn run(&mut self) -> FrameResult<()> {
        self.run_with(|| {})
    }

    /// Ends the loop after the current step. Returns false if not running.
    pub fn shut_down(&self) -> bool {
        self.running.shut_down()
    }

    #[inline]
    pub fn running(&self) -> bool {
        self.running.running()
    }

    /// Handle that lets code outside the callbacks stop the loop.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.running.clone()
    }

    /// Wall time since the last `run` started.
    pub fn running_time(&self) -> Duration {
        self.start.map(|start| start.elapsed()).unwrap_or_default()
    }

    #[inline]
    pub fn run_time(&self) -> &RunTime {
        &self.time
    }

    #[inline]
    pub fn run_time_mut(&mut self) -> &mut RunTime {
        &mut self.time
    }

    pub fn set_wait_for_events(&mut self, wait: bool) {
        self.wait_for_events = wait;
    }

    #[inline]
    pub fn wait_for_events(&self) -> bool {
        self.wait_for_events
    }

    #[inline]
    pub fn pump(&self) -> &P {
        &self.pump
    }

    #[inline]
    pub fn pump_mut(&mut self) -> &mut P {
        &mut self.pump
    }

    /// Number of registered run callbacks.
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Number of registered run-end callbacks.
    pub fn run_end_count(&self) -> usize {
        self.run_ends.len()
    }
}
