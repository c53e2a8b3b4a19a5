//! Cooperative task queue drained during idle slices.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::collections::map::HashSet;
use crate::error::{panic_message, TaskError};
use crate::platform::{Clock, IdleDeadline, IdleScheduler};

pub type TaskId = u64;

type Callable = Box<dyn FnOnce(&dyn IdleDeadline) -> Result<(), TaskError> + 'static>;

struct ScheduledTask {
    id: TaskId,
    callable: Callable,
    expiration: Duration,
}

struct SchedulerInner {
    clock: Rc<dyn Clock>,
    idle: Rc<dyn IdleScheduler>,
    queue: RefCell<VecDeque<ScheduledTask>>,
    // Ids still allowed to run; cancelled entries are skipped lazily.
    live: RefCell<HashSet<TaskId>>,
    draining: Cell<bool>,
    // Set by a running task that wants the rest of the slice given back.
    slice_yielded: Cell<bool>,
    next_id: Cell<TaskId>,
}

impl SchedulerInner {
    fn request_drain(self: &Rc<Self>) {
        let weak: Weak<Self> = Rc::downgrade(self);
        self.idle.request_idle_callback(Box::new(move |deadline| {
            if let Some(inner) = weak.upgrade() {
                inner.drain(deadline);
            }
        }));
    }

    /// Pops the next live entry along with the number of live entries
    /// behind it.
    fn pop(&self) -> Option<(ScheduledTask, usize)> {
        let mut queue = self.queue.borrow_mut();
        let live = self.live.borrow();
        loop {
            let task = queue.pop_front()?;
            if live.contains(&task.id) {
                let others = queue.iter().filter(|other| live.contains(&other.id)).count();
                return Some((task, others));
            }
        }
    }

    fn drain(self: &Rc<Self>, deadline: &dyn IdleDeadline) {
        self.slice_yielded.set(false);
        let mut deferred = 0usize;
        while let Some((task, others)) = self.pop() {
            let now = self.clock.now();
            if now < task.expiration && others > 0 {
                self.queue.borrow_mut().push_back(task);
                deferred += 1;
                // A whole rotation without anything due: wait for the next slice.
                if deferred > others {
                    break;
                }
            } else {
                deferred = 0;
                self.live.borrow_mut().remove(&task.id);
                self.run(task, deadline);
            }
            if self.slice_yielded.replace(false) || deadline.time_remaining().is_zero() {
                break;
            }
        }

        if self.queue.borrow().is_empty() {
            self.draining.set(false);
        } else {
            self.request_drain();
        }
    }

    fn run(&self, task: ScheduledTask, deadline: &dyn IdleDeadline) {
        let id = task.id;
        let callable = task.callable;
        match panic::catch_unwind(AssertUnwindSafe(|| callable(deadline))) {
            Ok(Ok(())) => log::trace!("task {id} finished"),
            Ok(Err(err)) => log::error!("task {id} failed: {err}"),
            Err(payload) => log::error!("task {id} panicked: {}", panic_message(&*payload)),
        }
    }
}

/// Queue of deferred callables with expiration times.
///
/// Entries run in insertion order during idle slices. An entry whose
/// expiration is still in the future yields its turn to the entries behind
/// it, unless it is the only one left. Each entry runs at most once, never
/// after [`cancel`](Self::cancel), and a failing entry does not stop the
/// ones after it.
#[derive(Clone)]
pub struct TaskScheduler {
    inner: Rc<SchedulerInner>,
}

impl TaskScheduler {
    pub fn new(clock: Rc<dyn Clock>, idle: Rc<dyn IdleScheduler>) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                clock,
                idle,
                queue: RefCell::new(VecDeque::new()),
                live: RefCell::new(HashSet::new()),
                draining: Cell::new(false),
                slice_yielded: Cell::new(false),
                next_id: Cell::new(1),
            }),
        }
    }

    pub fn now(&self) -> Duration {
        self.inner.clock.now()
    }

    /// Enqueues `callable` to run before `expiration` (best effort) or as
    /// soon as idle time is available.
    pub fn schedule(
        &self,
        callable: impl FnOnce(&dyn IdleDeadline) -> Result<(), TaskError> + 'static,
        expiration: Duration,
    ) -> TaskId {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.live.borrow_mut().insert(id);
        self.inner.queue.borrow_mut().push_back(ScheduledTask {
            id,
            callable: Box::new(callable),
            expiration,
        });
        // A drain is already requested or running; it will pick this up.
        if !self.inner.draining.replace(true) {
            self.inner.request_drain();
        }
        id
    }

    /// Like [`schedule`](Self::schedule) with an expiration relative to now.
    pub fn schedule_after(
        &self,
        callable: impl FnOnce(&dyn IdleDeadline) -> Result<(), TaskError> + 'static,
        delay: Duration,
    ) -> TaskId {
        let expiration = self.now().saturating_add(delay);
        self.schedule(callable, expiration)
    }

    /// Ends the current idle slice as soon as the running task returns.
    /// Queued tasks, including ones scheduled by that task, wait for the
    /// next idle callback. Has no effect outside of a drain.
    pub fn yield_slice(&self) {
        self.inner.slice_yielded.set(true);
    }

    /// Drops a queued task. Returns `false` if it already ran or was cancelled.
    pub fn cancel(&self, id: TaskId) -> bool {
        self.inner.live.borrow_mut().remove(&id)
    }

    /// Number of tasks still waiting to run.
    pub fn len(&self) -> usize {
        self.inner.live.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an idle callback is outstanding or running.
    pub fn is_draining(&self) -> bool {
        self.inner.draining.get()
    }
}

impl fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("pending", &self.len())
            .field("draining", &self.is_draining())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/scheduler_tests.rs"]
mod tests;
