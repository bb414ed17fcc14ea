//! Event pump seam between the frame loop and the platform layer.

use std::cell::RefCell;
use std::rc::Rc;

/// Drains platform events once per run-loop iteration.
///
/// The frame loop calls [`pump_events`](EventPump::pump_events) at the start
/// of every step. When `wait` is set the implementation may block until at
/// least one event arrives, which is how a minimized window stops spinning
/// the CPU.
pub trait EventPump {
    /// Processes pending events, blocking for the next one when `wait` is set.
    fn pump_events(&mut self, wait: bool);
}

impl<T: EventPump + ?Sized> EventPump for Box<T> {
    fn pump_events(&mut self, wait: bool) {
        (**self).pump_events(wait);
    }
}

impl<T: EventPump + ?Sized> EventPump for Rc<RefCell<T>> {
    fn pump_events(&mut self, wait: bool) {
        self.borrow_mut().pump_events(wait);
    }
}

/// Event pump for runs without a window.
#[derive(Debug, Default, Clone, Copy)]
pub struct Headless;

impl EventPump for Headless {
    fn pump_events(&mut self, _wait: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting {
        polls: u32,
        waits: u32,
    }

    impl EventPump for Counting {
        fn pump_events(&mut self, wait: bool) {
            if wait {
                self.waits += 1;
            } else {
                self.polls += 1;
            }
        }
    }

    #[test]
    fn test_shared_pump_forwards_to_inner() {
        let inner = Rc::new(RefCell::new(Counting { polls: 0, waits: 0 }));
        let mut shared = inner.clone();

        shared.pump_events(false);
        shared.pump_events(true);
        shared.pump_events(false);

        assert_eq!(inner.borrow().polls, 2);
        assert_eq!(inner.borrow().waits, 1);
    }

    #[test]
    fn test_boxed_pump_is_object_safe() {
        let mut pump: Box<dyn EventPump> = Box::new(Headless);
        pump.pump_events(true);
    }
}
