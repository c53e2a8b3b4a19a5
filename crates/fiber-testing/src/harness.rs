use std::any::Any;
use std::rc::Rc;

use fiber_core::{Element, IdleDeadline, Root, RootConfig, TaskScheduler, UnboundedDeadline};

use crate::host::{HostOp, MemoryHost, MemoryNodeId};
use crate::platform::{ManualClock, ManualIdleScheduler, TickDeadline};

const MAX_SLICES: usize = 10_000;

/// A [`Root`] over a [`MemoryHost`] driven by hand-fed idle slices.
pub struct TestRoot {
    root: Root<MemoryHost>,
    clock: Rc<ManualClock>,
    idle: Rc<ManualIdleScheduler>,
    container: MemoryNodeId,
}

impl TestRoot {
    pub fn new() -> Self {
        Self::with_config(RootConfig::default())
    }

    pub fn with_config(config: RootConfig) -> Self {
        let clock = Rc::new(ManualClock::new());
        let idle = Rc::new(ManualIdleScheduler::new());
        let scheduler = TaskScheduler::new(clock.clone(), idle.clone());
        let mut host = MemoryHost::new();
        let container = host.create_container();
        Self {
            root: Root::new(host, scheduler, config),
            clock,
            idle,
            container,
        }
    }

    pub fn root(&self) -> &Root<MemoryHost> {
        &self.root
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn idle(&self) -> &ManualIdleScheduler {
        &self.idle
    }

    pub fn container(&self) -> MemoryNodeId {
        self.container
    }

    /// Requests a render into the default container.
    pub fn render(&self, element: Element) {
        self.root.render(element, self.container);
    }

    /// Creates another container in the same host.
    pub fn create_container(&self) -> MemoryNodeId {
        self.root.with_host_mut(MemoryHost::create_container)
    }

    pub fn run_slice(&self, deadline: &dyn IdleDeadline) -> bool {
        self.idle.run_slice(deadline)
    }

    /// Hands out unbounded slices until no idle callback is pending.
    /// Returns the number of slices used.
    ///
    /// # Panics
    ///
    /// Panics if work keeps rescheduling itself.
    pub fn run_until_idle(&self) -> usize {
        self.drive(|| Box::new(UnboundedDeadline))
    }

    /// Like [`run_until_idle`](Self::run_until_idle), but every slice only
    /// allows `ticks` units of work.
    pub fn run_slices(&self, ticks: u32) -> usize {
        self.drive(|| Box::new(TickDeadline::new(ticks)))
    }

    fn drive(&self, deadline: impl Fn() -> Box<dyn IdleDeadline>) -> usize {
        let mut slices = 0;
        while self.idle.has_pending() {
            assert!(slices < MAX_SLICES, "work did not settle after {MAX_SLICES} slices");
            self.idle.run_slice(&*deadline());
            slices += 1;
        }
        slices
    }

    /// The host tree below the default container.
    pub fn dump(&self) -> String {
        self.root.with_host(|host| host.dump_tree(self.container))
    }

    pub fn text(&self) -> String {
        self.root.with_host(|host| host.text_content(self.container))
    }

    pub fn find(&self, tag: &str) -> Option<MemoryNodeId> {
        self.root.with_host(|host| host.find_by_tag(self.container, tag))
    }

    pub fn children(&self, node: MemoryNodeId) -> Vec<MemoryNodeId> {
        self.root.with_host(|host| host.children(node).to_vec())
    }

    pub fn take_ops(&self) -> Vec<HostOp> {
        self.root.with_host_mut(MemoryHost::take_ops)
    }

    pub fn with_host<R>(&self, f: impl FnOnce(&MemoryHost) -> R) -> R {
        self.root.with_host(f)
    }

    /// Calls the listener registered for `event` on `node`, outside of any
    /// borrow of the root, so the listener may set state freely.
    pub fn dispatch(&self, node: MemoryNodeId, event: &str, payload: &dyn Any) -> bool {
        match self.root.with_host(|host| host.listener(node, event)) {
            Some(listener) => {
                listener.call(payload);
                true
            }
            None => false,
        }
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}
