//! Entry point tying the work loop to the task scheduler.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::commit::CommitReport;
use crate::config::RootConfig;
use crate::element::Element;
use crate::error::RenderError;
use crate::hooks::UpdateScheduler;
use crate::host::Host;
use crate::platform::{IdleDeadline, UnboundedDeadline};
use crate::scheduler::{TaskId, TaskScheduler};
use crate::work_loop::{LoopState, PendingEffect, Step, WorkLoop};

/// Result of driving the work loop for one idle slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    /// Nothing is left to do.
    Idle,
    /// The slice ran out with work remaining.
    Yielded,
}

struct RootInner<H: Host + 'static> {
    work: RefCell<WorkLoop<H>>,
    phase: Rc<Cell<LoopState>>,
    scheduler: TaskScheduler,
    config: RootConfig,
    // Requests are applied at the next unit boundary, never mid-unit.
    pending_render: RefCell<Option<(Element, H::Node)>>,
    restart_requested: Cell<bool>,
    scheduled_task: Cell<Option<TaskId>>,
    last_error: RefCell<Option<RenderError>>,
    last_commit: Cell<Option<CommitReport>>,
    this: Weak<RootInner<H>>,
}

impl<H: Host + 'static> RootInner<H> {
    fn has_requests(&self) -> bool {
        self.pending_render.borrow().is_some() || self.restart_requested.get()
    }

    fn apply_requests(&self, work: &mut WorkLoop<H>) {
        let render = self.pending_render.borrow_mut().take();
        if let Some((element, container)) = render {
            self.restart_requested.set(false);
            work.seed(element, container);
        } else if self.restart_requested.replace(false) {
            log::debug!("state changed, restarting render");
            work.restart();
        }
    }

    fn ensure_scheduled(&self) {
        if self.scheduled_task.get().is_some() {
            return;
        }
        let weak = self.this.clone();
        let id = self.scheduler.schedule_after(
            move |deadline| {
                let Some(inner) = weak.upgrade() else {
                    return Ok(());
                };
                inner.scheduled_task.set(None);
                match inner.perform_work(deadline)? {
                    WorkStatus::Yielded => {
                        inner.ensure_scheduled();
                        inner.scheduler.yield_slice();
                    }
                    WorkStatus::Idle => {}
                }
                Ok(())
            },
            self.config.render_expiration,
        );
        self.scheduled_task.set(Some(id));
    }

    fn perform_work(&self, deadline: &dyn IdleDeadline) -> Result<WorkStatus, RenderError> {
        let mut work = self.work.borrow_mut();
        loop {
            self.apply_requests(&mut work);
            match work.step() {
                Ok(Step::Idle) => return Ok(WorkStatus::Idle),
                Ok(Step::Performed) => {}
                Ok(Step::Committed(report)) => self.last_commit.set(Some(report)),
                Err(err) => {
                    *self.last_error.borrow_mut() = Some(err.clone());
                    return Err(err);
                }
            }
            if deadline.time_remaining() < self.config.yield_threshold {
                if work.has_work() || self.has_requests() {
                    log::debug!("idle slice exhausted, yielding");
                    return Ok(WorkStatus::Yielded);
                }
                return Ok(WorkStatus::Idle);
            }
        }
    }
}

impl<H: Host + 'static> UpdateScheduler for RootInner<H> {
    fn schedule_update(&self) {
        self.restart_requested.set(true);
        self.ensure_scheduled();
    }
}

/// A render target: the committed tree, the build in flight and the host
/// they are applied to.
///
/// Rendering is asynchronous. [`render`](Self::render) and state setters
/// only record the request and schedule a task; the tree is built across
/// idle slices handed out by the [`TaskScheduler`] and committed in one go
/// once complete.
pub struct Root<H: Host + 'static> {
    inner: Rc<RootInner<H>>,
}

impl<H: Host + 'static> Clone for Root<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H: Host + 'static> Root<H> {
    pub fn new(host: H, scheduler: TaskScheduler, config: RootConfig) -> Self {
        let inner = Rc::new_cyclic(|this: &Weak<RootInner<H>>| {
            let updater: Weak<dyn UpdateScheduler> = this.clone();
            let work = WorkLoop::new(host, updater);
            RootInner {
                phase: work.phase(),
                work: RefCell::new(work),
                scheduler,
                config,
                pending_render: RefCell::new(None),
                restart_requested: Cell::new(false),
                scheduled_task: Cell::new(None),
                last_error: RefCell::new(None),
                last_commit: Cell::new(None),
                this: this.clone(),
            }
        });
        Self { inner }
    }

    /// Requests a render of `element` into `container`. A build that has
    /// not committed yet is abandoned in favour of this one.
    pub fn render(&self, element: Element, container: H::Node) {
        *self.inner.pending_render.borrow_mut() = Some((element, container));
        self.inner.ensure_scheduled();
    }

    /// Drives the work loop until `deadline` runs low or nothing is left.
    pub fn perform_work(&self, deadline: &dyn IdleDeadline) -> Result<WorkStatus, RenderError> {
        self.inner.perform_work(deadline)
    }

    /// Runs all pending work to completion without yielding.
    pub fn flush_sync(&self) -> Result<(), RenderError> {
        if let Some(task) = self.inner.scheduled_task.take() {
            self.inner.scheduler.cancel(task);
        }
        self.inner.perform_work(&UnboundedDeadline).map(|_| ())
    }

    pub fn loop_state(&self) -> LoopState {
        self.inner.phase.get()
    }

    /// Whether a render or state change is waiting to be built or committed.
    pub fn has_pending_work(&self) -> bool {
        self.inner.has_requests() || self.inner.phase.get() != LoopState::Idle
    }

    /// Takes the error that aborted the most recent failed render.
    pub fn take_error(&self) -> Option<RenderError> {
        self.inner.last_error.borrow_mut().take()
    }

    pub fn last_commit(&self) -> Option<CommitReport> {
        self.inner.last_commit.get()
    }

    pub fn pending_effects(&self) -> Vec<PendingEffect> {
        self.inner.work.borrow().pending_effects()
    }

    /// Indented rendering of the committed tree.
    pub fn dump_fibers(&self) -> String {
        self.inner.work.borrow().dump_fibers()
    }

    /// Number of units alive across both buffers.
    pub fn fiber_count(&self) -> usize {
        self.inner.work.borrow().arena().len()
    }

    pub fn with_host<R>(&self, f: impl FnOnce(&H) -> R) -> R {
        f(self.inner.work.borrow().host())
    }

    /// Gives mutable access to the host between renders, e.g. to dispatch
    /// events. State setters called from inside `f` are safe.
    pub fn with_host_mut<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        f(self.inner.work.borrow_mut().host_mut())
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.inner.scheduler
    }
}

impl<H: Host + 'static> fmt::Debug for Root<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Root")
            .field("state", &self.loop_state())
            .field("last_commit", &self.last_commit())
            .field("config", &self.inner.config)
            .finish()
    }
}
