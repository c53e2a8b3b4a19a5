//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the platform
//! abstraction traits defined in `fiber-core`. Applications can
//! construct a [`StdRuntime`], hand its [`TaskScheduler`] to a
//! [`fiber_core::Root`] and call [`StdRuntime::run_idle_slice`] from their
//! event loop whenever they have spare time.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use fiber_core::{Clock, IdleCallback, IdleDeadline, IdleScheduler, TaskScheduler};

/// Clock implementation backed by [`std::time::Instant`].
#[derive(Debug, Clone)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Converts a point on this clock's axis back into an [`Instant`].
    pub fn instant_at(&self, time: Duration) -> Instant {
        self.origin + time
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Idle slice tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Length of one idle slice.
    pub frame_budget: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_budget: Duration::from_millis(16),
        }
    }
}

impl FrameConfig {
    pub fn with_frame_budget(mut self, budget: Duration) -> Self {
        self.frame_budget = budget;
        self
    }
}

/// Deadline ending at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FrameDeadline {
    end: Instant,
}

impl FrameDeadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            end: Instant::now() + budget,
        }
    }
}

impl IdleDeadline for FrameDeadline {
    fn time_remaining(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }
}

/// Idle scheduler that queues callbacks until the embedder grants a slice.
pub struct StdIdleScheduler {
    config: FrameConfig,
    callbacks: RefCell<VecDeque<IdleCallback>>,
    frame_requested: Cell<bool>,
    frame_waker: RefCell<Option<Rc<dyn Fn() + 'static>>>,
}

impl StdIdleScheduler {
    pub fn new(config: FrameConfig) -> Self {
        Self {
            config,
            callbacks: RefCell::new(VecDeque::new()),
            frame_requested: Cell::new(false),
            frame_waker: RefCell::new(None),
        }
    }

    /// Returns whether idle time has been requested since the last call.
    pub fn take_frame_request(&self) -> bool {
        self.frame_requested.replace(false)
    }

    /// Registers a waker that will be invoked whenever idle time is requested.
    pub fn set_frame_waker(&self, waker: impl Fn() + 'static) {
        *self.frame_waker.borrow_mut() = Some(Rc::new(waker));
    }

    /// Clears any registered frame waker.
    pub fn clear_frame_waker(&self) {
        *self.frame_waker.borrow_mut() = None;
    }

    pub fn has_pending(&self) -> bool {
        !self.callbacks.borrow().is_empty()
    }

    /// Runs the callbacks queued so far within one frame budget. Callbacks
    /// requested while the slice runs wait for the next one. Returns whether
    /// anything ran.
    pub fn run_idle_slice(&self) -> bool {
        let batch: Vec<IdleCallback> = self.callbacks.borrow_mut().drain(..).collect();
        if batch.is_empty() {
            return false;
        }
        let deadline = FrameDeadline::new(self.config.frame_budget);
        let mut batch = batch.into_iter();
        for callback in batch.by_ref() {
            callback(&deadline);
            if deadline.time_remaining().is_zero() {
                break;
            }
        }
        let deferred: Vec<IdleCallback> = batch.collect();
        if !deferred.is_empty() {
            log::debug!("idle slice over budget, deferring {} callbacks", deferred.len());
            let mut callbacks = self.callbacks.borrow_mut();
            for callback in deferred.into_iter().rev() {
                callbacks.push_front(callback);
            }
            drop(callbacks);
            self.request_frame();
        }
        true
    }

    fn request_frame(&self) {
        self.frame_requested.set(true);
        let waker = self.frame_waker.borrow().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdIdleScheduler {
    fn default() -> Self {
        Self::new(FrameConfig::default())
    }
}

impl fmt::Debug for StdIdleScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdIdleScheduler")
            .field("config", &self.config)
            .field("pending", &self.callbacks.borrow().len())
            .field("frame_requested", &self.frame_requested.get())
            .finish()
    }
}

impl IdleScheduler for StdIdleScheduler {
    fn request_idle_callback(&self, callback: IdleCallback) {
        self.callbacks.borrow_mut().push_back(callback);
        self.request_frame();
    }
}

/// Convenience container bundling the standard clock, idle scheduler and
/// task scheduler.
#[derive(Clone)]
pub struct StdRuntime {
    clock: Rc<StdClock>,
    idle: Rc<StdIdleScheduler>,
    scheduler: TaskScheduler,
}

impl StdRuntime {
    /// Creates a new standard runtime instance.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    pub fn with_config(config: FrameConfig) -> Self {
        let clock = Rc::new(StdClock::new());
        let idle = Rc::new(StdIdleScheduler::new(config));
        let scheduler = TaskScheduler::new(clock.clone(), idle.clone());
        Self {
            clock,
            idle,
            scheduler,
        }
    }

    /// Returns the task scheduler to hand to a [`fiber_core::Root`].
    pub fn scheduler(&self) -> TaskScheduler {
        self.scheduler.clone()
    }

    /// Returns the clock implementation.
    pub fn clock(&self) -> Rc<StdClock> {
        Rc::clone(&self.clock)
    }

    /// Returns the idle scheduler implementation.
    pub fn idle(&self) -> Rc<StdIdleScheduler> {
        Rc::clone(&self.idle)
    }

    /// Grants one frame budget of idle time.
    pub fn run_idle_slice(&self) -> bool {
        self.idle.run_idle_slice()
    }

    /// Grants idle slices until nothing is queued, up to `max_slices`.
    /// Returns the number of slices used.
    pub fn run_until_idle(&self, max_slices: usize) -> usize {
        let mut slices = 0;
        while slices < max_slices && self.idle.run_idle_slice() {
            slices += 1;
        }
        if self.has_pending_work() {
            log::warn!("work still pending after {slices} idle slices");
        }
        slices
    }

    pub fn has_pending_work(&self) -> bool {
        self.idle.has_pending()
    }

    /// Returns whether idle time was requested since the last poll.
    pub fn take_frame_request(&self) -> bool {
        self.idle.take_frame_request()
    }

    /// Registers a waker to be called when the runtime requests idle time.
    pub fn set_frame_waker(&self, waker: impl Fn() + 'static) {
        self.idle.set_frame_waker(waker);
    }

    /// Clears any previously registered frame waker.
    pub fn clear_frame_waker(&self) {
        self.idle.clear_frame_waker();
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("idle", &self.idle)
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}
