//! Platform abstraction traits for the reconciliation runtime.
//!
//! The runtime never reads the wall clock or talks to the host event loop
//! directly. Time and idle notifications are delegated to these traits so
//! the same work loop can be driven by real frame deadlines, by a test
//! harness, or synchronously.

use std::time::Duration;

/// Provides monotonic time for the task scheduler.
pub trait Clock {
    /// Time elapsed since the clock's origin.
    ///
    /// Task expirations are expressed on the same axis.
    fn now(&self) -> Duration;
}

/// Describes the idle slice granted by the host environment.
pub trait IdleDeadline {
    /// Time left in the current slice. Reaches zero once the slice is spent.
    fn time_remaining(&self) -> Duration;

    /// Whether the callback was invoked because its timeout elapsed rather
    /// than because the host had spare time.
    fn did_timeout(&self) -> bool {
        false
    }
}

/// Callback invoked by an [`IdleScheduler`] once the host has spare time.
pub type IdleCallback = Box<dyn FnOnce(&dyn IdleDeadline) + 'static>;

/// Requests idle notifications from the host environment.
///
/// Implementations must invoke each callback at most once. Invoking it from
/// inside `request_idle_callback` is allowed but defeats the purpose.
pub trait IdleScheduler {
    /// Ask the host to call `callback` during its next idle period.
    fn request_idle_callback(&self, callback: IdleCallback);
}

/// A deadline that never runs out. Used to flush work synchronously.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnboundedDeadline;

impl IdleDeadline for UnboundedDeadline {
    fn time_remaining(&self) -> Duration {
        Duration::MAX
    }
}
