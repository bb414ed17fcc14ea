//! Run-time clock for the frame loop.

use std::time::{Duration, Instant};

/// Clock advanced once per run-loop iteration.
///
/// `current` accumulates scaled frame time and stops while paused, so
/// animation code can read it without caring about pauses or slow motion.
/// The wall-clock running time since [`reset`](RunTime::reset) is available
/// separately through [`elapsed`](RunTime::elapsed).
#[derive(Debug, Clone)]
pub struct RunTime {
    start: Instant,
    last_tick: Instant,
    current: Duration,
    delta: Duration,
    /// Step used in place of the measured delta when `use_fix_delta` is set.
    pub fix_delta: Duration,
    /// Use `fix_delta` instead of the measured frame time.
    pub use_fix_delta: bool,
    /// Multiplier applied to every delta.
    pub speed: f32,
    /// While paused the delta is zero and `current` does not advance.
    pub paused: bool,
}

impl RunTime {
    /// Default fixed step.
    pub const DEFAULT_FIX_DELTA: Duration = Duration::from_millis(20);

    /// Create a new clock, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            current: Duration::ZERO,
            delta: Duration::ZERO,
            fix_delta: Self::DEFAULT_FIX_DELTA,
            use_fix_delta: false,
            speed: 1.0,
            paused: false,
        }
    }

    /// Wall-clock time since the clock was created or reset.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Accumulated, speed-scaled time excluding pauses.
    #[inline]
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Delta produced by the last [`tick`](RunTime::tick).
    #[inline]
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Delta of the last tick in seconds.
    #[inline]
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Advance the clock to now and return the new delta.
    pub fn tick(&mut self) -> Duration {
        self.tick_at(Instant::now())
    }

    /// Advance the clock to `now` and return the new delta.
    pub fn tick_at(&mut self, now: Instant) -> Duration {
        let measured = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;

        self.delta = if self.paused {
            Duration::ZERO
        } else {
            let step = if self.use_fix_delta {
                self.fix_delta
            } else {
                measured
            };
            if self.speed == 1.0 {
                step
            } else {
                step.mul_f64(f64::from(self.speed.max(0.0)))
            }
        };

        self.current += self.delta;
        self.delta
    }

    /// Reset the clock to the current time.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
        self.current = Duration::ZERO;
        self.delta = Duration::ZERO;
    }
}

impl Default for RunTime {
    fn default() -> Self {
        Self::new()
    }
}
