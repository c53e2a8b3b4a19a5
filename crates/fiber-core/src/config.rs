use std::time::Duration;

/// Tuning knobs of a [`Root`](crate::Root).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootConfig {
    /// The work loop yields once less than this much of the idle slice is left.
    pub yield_threshold: Duration,
    /// Expiration, relative to scheduling time, of the task that drives a
    /// render. Zero means due immediately.
    pub render_expiration: Duration,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            yield_threshold: Duration::from_millis(1),
            render_expiration: Duration::ZERO,
        }
    }
}

impl RootConfig {
    pub fn with_yield_threshold(mut self, threshold: Duration) -> Self {
        self.yield_threshold = threshold;
        self
    }

    pub fn with_render_expiration(mut self, expiration: Duration) -> Self {
        self.render_expiration = expiration;
        self
    }
}
