//! Deterministic clock, idle scheduler and deadlines for tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use fiber_core::{Clock, IdleCallback, IdleDeadline, IdleScheduler};

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Idle scheduler whose callbacks run only when the test hands out a slice.
#[derive(Default)]
pub struct ManualIdleScheduler {
    callbacks: RefCell<VecDeque<IdleCallback>>,
    slices: Cell<usize>,
}

impl ManualIdleScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending(&self) -> bool {
        !self.callbacks.borrow().is_empty()
    }

    pub fn pending(&self) -> usize {
        self.callbacks.borrow().len()
    }

    /// Number of slices handed out so far.
    pub fn slices_run(&self) -> usize {
        self.slices.get()
    }

    /// Runs the oldest pending callback with `deadline`. Returns `false` if
    /// nothing was waiting.
    pub fn run_slice(&self, deadline: &dyn IdleDeadline) -> bool {
        let callback = self.callbacks.borrow_mut().pop_front();
        match callback {
            Some(callback) => {
                self.slices.set(self.slices.get() + 1);
                callback(deadline);
                true
            }
            None => false,
        }
    }
}

impl IdleScheduler for ManualIdleScheduler {
    fn request_idle_callback(&self, callback: IdleCallback) {
        self.callbacks.borrow_mut().push_back(callback);
    }
}

/// Deadline with a constant amount of time left.
#[derive(Debug, Clone, Copy)]
pub struct FixedDeadline(pub Duration);

impl IdleDeadline for FixedDeadline {
    fn time_remaining(&self) -> Duration {
        self.0
    }
}

/// Deadline that loses one millisecond every time it is consulted.
///
/// With the default one millisecond yield threshold, `TickDeadline::new(n)`
/// lets the work loop perform exactly `n` units before it yields.
#[derive(Debug)]
pub struct TickDeadline {
    remaining: Cell<u32>,
}

impl TickDeadline {
    pub fn new(ticks: u32) -> Self {
        Self {
            remaining: Cell::new(ticks),
        }
    }
}

impl IdleDeadline for TickDeadline {
    fn time_remaining(&self) -> Duration {
        let left = self.remaining.get().saturating_sub(1);
        self.remaining.set(left);
        Duration::from_millis(u64::from(left))
    }
}
