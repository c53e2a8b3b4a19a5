//! Positional state slots for components.
//!
//! While a component renders, a [`HookFrame`] is installed on a thread-local
//! stack. The k-th `use_state` call of the render is served by slot k.
//!
//! Queued updates are read without being consumed: a build folds everything
//! queued so far and remembers how many entries it used, and the prefix is
//! only dropped when that build commits. A build that gets abandoned (because
//! another update arrived) leaves the queue intact for its replacement.

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use crate::error::RenderError;

/// Receives "state changed, render again" requests from setters.
pub(crate) trait UpdateScheduler {
    fn schedule_update(&self);
}

struct Detached;

impl UpdateScheduler for Detached {
    fn schedule_update(&self) {}
}

pub(crate) fn detached_scheduler() -> Weak<dyn UpdateScheduler> {
    Weak::<Detached>::new()
}

/// A pending state change.
pub enum Update<T> {
    Replace(T),
    Transform(Rc<dyn Fn(&T) -> T>),
}

impl<T: Clone> Update<T> {
    fn apply(&self, state: &T) -> T {
        match self {
            Update::Replace(value) => value.clone(),
            Update::Transform(transform) => transform(state),
        }
    }
}

impl<T: Clone> Clone for Update<T> {
    fn clone(&self) -> Self {
        match self {
            Update::Replace(value) => Update::Replace(value.clone()),
            Update::Transform(transform) => Update::Transform(Rc::clone(transform)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Update<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Replace(value) => f.debug_tuple("Replace").field(value).finish(),
            Update::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

pub(crate) struct UpdateQueue<T> {
    pending: RefCell<VecDeque<Update<T>>>,
}

impl<T> UpdateQueue<T> {
    fn new() -> Self {
        Self {
            pending: RefCell::new(VecDeque::new()),
        }
    }

    fn push(&self, update: Update<T>) {
        self.pending.borrow_mut().push_back(update);
    }
}

impl<T: Clone> UpdateQueue<T> {
    /// Folds every queued update over `base`, left to right.
    fn fold(&self, base: &T) -> (T, usize) {
        let pending = self.pending.borrow();
        let state = pending
            .iter()
            .fold(base.clone(), |state, update| update.apply(&state));
        (state, pending.len())
    }
}

/// Type-erased view used by the commit phase.
pub(crate) trait PendingUpdates {
    fn discard(&self, count: usize);
}

impl<T> PendingUpdates for UpdateQueue<T> {
    fn discard(&self, count: usize) {
        let mut pending = self.pending.borrow_mut();
        let count = count.min(pending.len());
        pending.drain(..count);
    }
}

/// One persistent state record of a component unit.
#[derive(Clone)]
pub(crate) struct HookSlot {
    state: Rc<dyn Any>,
    queue: Rc<dyn Any>,
    pending: Rc<dyn PendingUpdates>,
    consumed: usize,
    type_name: &'static str,
}

impl HookSlot {
    fn new<T: 'static>(value: T, queue: Rc<UpdateQueue<T>>, consumed: usize) -> Self {
        Self {
            state: Rc::new(value),
            queue: queue.clone(),
            pending: queue,
            consumed,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Drops the updates this slot's build folded in.
    pub(crate) fn commit(&mut self) {
        self.pending.discard(self.consumed);
        self.consumed = 0;
    }
}

/// Hook bookkeeping for a single component invocation.
pub(crate) struct HookFrame {
    component: &'static str,
    previous: Option<Vec<HookSlot>>,
    slots: Vec<HookSlot>,
    updater: Weak<dyn UpdateScheduler>,
    error: Option<RenderError>,
}

impl HookFrame {
    /// `previous` is `None` on first mount and the alternate's slots otherwise.
    pub(crate) fn new(
        component: &'static str,
        previous: Option<Vec<HookSlot>>,
        updater: Weak<dyn UpdateScheduler>,
    ) -> Self {
        Self {
            component,
            previous,
            slots: Vec::new(),
            updater,
            error: None,
        }
    }

    fn next_state<T: Clone + 'static>(&mut self, init: impl FnOnce() -> T) -> (T, StateSetter<T>) {
        let index = self.slots.len();
        let previous = self.previous.as_ref().and_then(|slots| slots.get(index));
        let (value, queue, consumed) = match previous {
            Some(slot) => match (
                slot.state.downcast_ref::<T>(),
                Rc::clone(&slot.queue).downcast::<UpdateQueue<T>>(),
            ) {
                (Some(base), Ok(queue)) => {
                    let (value, consumed) = queue.fold(base);
                    (value, queue, consumed)
                }
                _ => {
                    if self.error.is_none() {
                        self.error = Some(RenderError::HookTypeMismatch {
                            component: self.component,
                            index,
                            requested: std::any::type_name::<T>(),
                            stored: slot.type_name,
                        });
                    }
                    (init(), Rc::new(UpdateQueue::new()), 0)
                }
            },
            None => (init(), Rc::new(UpdateQueue::new()), 0),
        };
        self.slots
            .push(HookSlot::new(value.clone(), Rc::clone(&queue), consumed));
        let setter = StateSetter {
            queue,
            updater: self.updater.clone(),
        };
        (value, setter)
    }

    /// Returns the slots produced by the render, or the contract violation
    /// it ran into.
    pub(crate) fn finish(self) -> Result<Vec<HookSlot>, RenderError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if let Some(previous) = &self.previous {
            if previous.len() != self.slots.len() {
                return Err(RenderError::HookCountMismatch {
                    component: self.component,
                    expected: previous.len(),
                    found: self.slots.len(),
                });
            }
        }
        Ok(self.slots)
    }
}

thread_local! {
    static HOOK_FRAMES: RefCell<Vec<HookFrame>> = RefCell::new(Vec::new());
}

/// Runs `render` with `frame` installed and returns the frame afterwards.
/// Panics inside `render` are caught so the frame stack stays balanced.
pub(crate) fn render_with_hooks<R>(
    frame: HookFrame,
    render: impl FnOnce() -> R,
) -> (std::thread::Result<R>, Option<HookFrame>) {
    HOOK_FRAMES.with(|frames| frames.borrow_mut().push(frame));
    let result = panic::catch_unwind(AssertUnwindSafe(render));
    let frame = HOOK_FRAMES.with(|frames| frames.borrow_mut().pop());
    (result, frame)
}

/// Returns the state held by this call position, creating it with `initial`
/// on first render.
///
/// # Panics
///
/// Panics when called outside of a component render.
pub fn use_state<T: Clone + 'static>(initial: T) -> (T, StateSetter<T>) {
    use_state_with(move || initial)
}

/// Like [`use_state`], computing the initial value only on first render.
pub fn use_state_with<T: Clone + 'static>(init: impl FnOnce() -> T) -> (T, StateSetter<T>) {
    HOOK_FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        let Some(frame) = frames.last_mut() else {
            panic!("use_state may only be called while a component renders");
        };
        frame.next_state(init)
    })
}

/// Queues changes to one state slot and requests a new render.
pub struct StateSetter<T> {
    queue: Rc<UpdateQueue<T>>,
    updater: Weak<dyn UpdateScheduler>,
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Rc::clone(&self.queue),
            updater: self.updater.clone(),
        }
    }
}

impl<T> fmt::Debug for StateSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSetter")
            .field("pending", &self.queue.pending.borrow().len())
            .finish()
    }
}

impl<T: 'static> StateSetter<T> {
    /// Replaces the state on the next render.
    pub fn set(&self, value: T) {
        self.enqueue(Update::Replace(value));
    }

    /// Derives the next state from the previous one on the next render.
    pub fn update(&self, transform: impl Fn(&T) -> T + 'static) {
        self.enqueue(Update::Transform(Rc::new(transform)));
    }

    pub fn enqueue(&self, update: Update<T>) {
        self.queue.push(update);
        match self.updater.upgrade() {
            Some(updater) => updater.schedule_update(),
            None => log::warn!("state update queued for a root that no longer exists"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render<R>(frame: HookFrame, body: impl FnOnce() -> R) -> (R, HookFrame) {
        let (result, frame) = render_with_hooks(frame, body);
        (result.expect("render panicked"), frame.expect("frame popped"))
    }

    #[test]
    fn slots_fold_pending_updates_in_queue_order() {
        let frame = HookFrame::new("counter", None, detached_scheduler());
        let ((value, setter), frame) = render(frame, || use_state(10));
        assert_eq!(value, 10);
        let mut slots = frame.finish().expect("first render");

        setter.update(|v| v * 2);
        setter.set(3);
        setter.update(|v| v + 1);

        let frame = HookFrame::new("counter", Some(slots.clone()), detached_scheduler());
        let ((value, _), frame) = render(frame, || use_state(10));
        assert_eq!(value, 4);

        // Nothing was consumed yet: a replacement build sees the same queue.
        let frame_again = HookFrame::new("counter", Some(slots.clone()), detached_scheduler());
        let ((again, _), _) = render(frame_again, || use_state(10));
        assert_eq!(again, 4);

        slots = frame.finish().expect("second render");
        for slot in &mut slots {
            slot.commit();
        }
        let frame = HookFrame::new("counter", Some(slots), detached_scheduler());
        let ((value, _), _) = render(frame, || use_state(10));
        assert_eq!(value, 4, "committed updates are not applied twice");
    }

    #[test]
    fn changed_slot_count_is_reported() {
        let frame = HookFrame::new("form", None, detached_scheduler());
        let (_, frame) = render(frame, || {
            use_state(1);
            use_state(2);
        });
        let slots = frame.finish().expect("first render");

        let frame = HookFrame::new("form", Some(slots), detached_scheduler());
        let (_, frame) = render(frame, || {
            use_state(1);
        });
        assert!(matches!(
            frame.finish(),
            Err(RenderError::HookCountMismatch {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn changed_slot_type_is_reported() {
        let frame = HookFrame::new("form", None, detached_scheduler());
        let (_, frame) = render(frame, || {
            use_state(1i32);
        });
        let slots = frame.finish().expect("first render");

        let frame = HookFrame::new("form", Some(slots), detached_scheduler());
        let (_, frame) = render(frame, || {
            use_state(String::from("x"));
        });
        assert!(matches!(
            frame.finish(),
            Err(RenderError::HookTypeMismatch { index: 0, .. })
        ));
    }

    #[test]
    #[should_panic(expected = "use_state may only be called while a component renders")]
    fn use_state_outside_render_panics() {
        let _ = use_state(0);
    }

    #[test]
    fn panicking_render_leaves_frame_stack_balanced() {
        let frame = HookFrame::new("boom", None, detached_scheduler());
        let (result, frame) = render_with_hooks(frame, || -> i32 { panic!("boom") });
        assert!(result.is_err());
        assert!(frame.is_some());
        HOOK_FRAMES.with(|frames| assert!(frames.borrow().is_empty()));
    }
}
