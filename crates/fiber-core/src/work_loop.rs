//! Resumable depth-first build of the work-in-progress tree.
//!
//! All resumption state lives in [`Session`]: the cursor to the next unit,
//! the roots of both buffers and the pending deletions. A build may stop
//! after any unit and continue later from the cursor alone.

use std::cell::Cell;
use std::fmt::Write as _;
use std::rc::{Rc, Weak};

use crate::commit::{apply_effects, CommitReport};
use crate::element::{Element, PropValue, Props, TEXT_VALUE};
use crate::error::{panic_message, RenderError};
use crate::fiber::{EffectTag, Fiber, FiberArena, FiberId, FiberKind};
use crate::hooks::{render_with_hooks, HookFrame, UpdateScheduler};
use crate::host::{Host, NodeKind};
use crate::reconciler::reconcile_children;

/// Phase of the work loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No build in flight.
    Idle,
    /// Units remain to be performed.
    Active,
    /// The build is complete and being applied to the host.
    Committing,
}

/// An effect recorded by the build in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEffect {
    pub fiber: FiberId,
    pub kind: FiberKind,
    pub tag: EffectTag,
}

/// Root pointers of one render cycle.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub(crate) current_root: Option<FiberId>,
    pub(crate) wip_root: Option<FiberId>,
    pub(crate) next_unit: Option<FiberId>,
    pub(crate) deletions: Vec<FiberId>,
}

/// Outcome of a single [`WorkLoop::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Performed,
    Committed(CommitReport),
    Idle,
}

pub(crate) struct WorkLoop<H: Host> {
    arena: FiberArena<H::Node>,
    host: H,
    session: Session,
    phase: Rc<Cell<LoopState>>,
    updater: Weak<dyn UpdateScheduler>,
}

impl<H: Host> WorkLoop<H> {
    pub(crate) fn new(host: H, updater: Weak<dyn UpdateScheduler>) -> Self {
        Self {
            arena: FiberArena::new(),
            host,
            session: Session::default(),
            phase: Rc::new(Cell::new(LoopState::Idle)),
            updater,
        }
    }

    pub(crate) fn host(&self) -> &H {
        &self.host
    }

    pub(crate) fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub(crate) fn arena(&self) -> &FiberArena<H::Node> {
        &self.arena
    }

    /// Shared view of the loop phase, readable while the loop is borrowed.
    pub(crate) fn phase(&self) -> Rc<Cell<LoopState>> {
        Rc::clone(&self.phase)
    }

    pub(crate) fn has_work(&self) -> bool {
        self.session.wip_root.is_some()
    }

    /// Starts a build of `element` inside `container`, replacing any build
    /// that has not committed yet.
    pub(crate) fn seed(&mut self, element: Element, container: H::Node) {
        let props = Rc::new(Props::with_children(vec![element]));
        self.seed_root(container, props);
    }

    /// Starts over from the latest requested tree so queued state updates
    /// are picked up.
    pub(crate) fn restart(&mut self) {
        let source = self.session.wip_root.or(self.session.current_root);
        let Some(fiber) = source.and_then(|id| self.arena.get(id)) else {
            return;
        };
        let Some(container) = fiber.host_node.clone() else {
            return;
        };
        let props = Rc::clone(&fiber.props);
        self.seed_root(container, props);
    }

    fn seed_root(&mut self, container: H::Node, props: Rc<Props>) {
        self.discard_work_in_progress();
        let alternate = self.session.current_root.filter(|&current| {
            self.arena
                .get(current)
                .is_some_and(|fiber| fiber.host_node.as_ref() == Some(&container))
        });
        if alternate.is_none() && self.session.current_root.is_some() {
            log::debug!("rendering into a new container, mounting fresh");
        }
        let root = self.arena.insert(Fiber::root(container, props, alternate));
        self.session.wip_root = Some(root);
        self.session.next_unit = Some(root);
        self.phase.set(LoopState::Active);
        log::debug!("seeded render at {root}");
    }

    /// Drops the uncommitted tree. Host nodes created for it are left to the host.
    pub(crate) fn discard_work_in_progress(&mut self) {
        if let Some(wip) = self.session.wip_root.take() {
            let freed = self.arena.free_subtree(wip);
            log::trace!("discarded {freed} uncommitted fibers");
        }
        self.session.next_unit = None;
        self.session.deletions.clear();
        self.phase.set(LoopState::Idle);
    }

    /// Performs one unit, committing synchronously when it was the last one.
    /// Any error discards the work in progress and leaves `current` alone.
    pub(crate) fn step(&mut self) -> Result<Step, RenderError> {
        let Some(wip_root) = self.session.wip_root else {
            return Ok(Step::Idle);
        };
        if let Some(unit) = self.session.next_unit {
            match self.perform_unit_of_work(unit) {
                Ok(next) => self.session.next_unit = next,
                Err(err) => {
                    self.discard_work_in_progress();
                    return Err(err);
                }
            }
            if self.session.next_unit.is_some() {
                return Ok(Step::Performed);
            }
        }
        self.commit(wip_root).map(Step::Committed)
    }

    fn perform_unit_of_work(&mut self, id: FiberId) -> Result<Option<FiberId>, RenderError> {
        let fiber = self.arena.fiber(id)?;
        log::trace!("performing {} ({id})", fiber.kind);
        match fiber.kind.clone() {
            FiberKind::Component(component) => {
                let props = Rc::clone(&fiber.props);
                let previous = match fiber.alternate {
                    Some(alternate) => Some(self.arena.fiber(alternate)?.hooks.clone()),
                    None => None,
                };
                let frame = HookFrame::new(component.name(), previous, self.updater.clone());
                let (result, frame) = render_with_hooks(frame, || component.render(&props));
                let child = match result {
                    Ok(Ok(element)) => element,
                    Ok(Err(source)) => {
                        return Err(RenderError::Component {
                            component: component.name(),
                            source,
                        })
                    }
                    Err(payload) => {
                        return Err(RenderError::ComponentPanicked {
                            component: component.name(),
                            message: panic_message(&*payload),
                        })
                    }
                };
                let Some(frame) = frame else {
                    return Err(RenderError::ComponentPanicked {
                        component: component.name(),
                        message: "hook frame was lost during render".to_owned(),
                    });
                };
                self.arena.fiber_mut(id)?.hooks = frame.finish()?;
                self.reconcile(id, std::slice::from_ref(&child))?;
            }
            FiberKind::Host(tag) => {
                self.ensure_host_node(id, NodeKind::Element(&tag))?;
                self.reconcile_own_children(id)?;
            }
            FiberKind::Text => self.ensure_host_node(id, NodeKind::Text)?,
            FiberKind::Root => self.reconcile_own_children(id)?,
        }
        self.next_unit_after(id)
    }

    fn ensure_host_node(&mut self, id: FiberId, kind: NodeKind<'_>) -> Result<(), RenderError> {
        if self.arena.fiber(id)?.host_node.is_some() {
            return Ok(());
        }
        let node = self.host.create_node(kind)?;
        self.arena.fiber_mut(id)?.host_node = Some(node);
        Ok(())
    }

    fn reconcile_own_children(&mut self, id: FiberId) -> Result<(), RenderError> {
        let props = Rc::clone(&self.arena.fiber(id)?.props);
        self.reconcile(id, props.children())
    }

    fn reconcile(&mut self, id: FiberId, elements: &[Element]) -> Result<(), RenderError> {
        reconcile_children(&mut self.arena, &mut self.session.deletions, id, elements)
    }

    /// Depth-first successor: the first child, else the nearest sibling of
    /// the unit or one of its ancestors.
    fn next_unit_after(&self, id: FiberId) -> Result<Option<FiberId>, RenderError> {
        let fiber = self.arena.fiber(id)?;
        if fiber.child.is_some() {
            return Ok(fiber.child);
        }
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let fiber = self.arena.fiber(current)?;
            if fiber.sibling.is_some() {
                return Ok(fiber.sibling);
            }
            cursor = fiber.parent;
        }
        Ok(None)
    }

    fn commit(&mut self, wip_root: FiberId) -> Result<CommitReport, RenderError> {
        self.phase.set(LoopState::Committing);
        let deletions = std::mem::take(&mut self.session.deletions);
        let report = match apply_effects(&self.arena, &mut self.host, wip_root, &deletions) {
            Ok(report) => report,
            Err(err) => {
                self.discard_work_in_progress();
                return Err(err);
            }
        };

        let committed: Vec<FiberId> = self.arena.descendants(wip_root).collect();
        for id in committed.into_iter().chain(Some(wip_root)) {
            let fiber = self.arena.fiber_mut(id)?;
            for slot in &mut fiber.hooks {
                slot.commit();
            }
            fiber.alternate = None;
            fiber.effect_tag = EffectTag::None;
        }
        if let Some(previous) = self.session.current_root.replace(wip_root) {
            self.arena.free_subtree(previous);
        }
        self.session.wip_root = None;
        self.session.next_unit = None;
        self.phase.set(LoopState::Idle);
        log::debug!(
            "committed {} placements, {} updates, {} deletions",
            report.placements,
            report.updates,
            report.deletions
        );
        Ok(report)
    }

    /// Effects of the build in flight, deletions first, then pre-order.
    pub(crate) fn pending_effects(&self) -> Vec<PendingEffect> {
        let Some(wip_root) = self.session.wip_root else {
            return Vec::new();
        };
        let deleted = self.session.deletions.iter().filter_map(|&id| {
            self.arena.get(id).map(|fiber| PendingEffect {
                fiber: id,
                kind: fiber.kind.clone(),
                tag: EffectTag::Deletion,
            })
        });
        let built = self.arena.descendants(wip_root).filter_map(|id| {
            self.arena.get(id).map(|fiber| PendingEffect {
                fiber: id,
                kind: fiber.kind.clone(),
                tag: fiber.effect_tag,
            })
        });
        deleted.chain(built).collect()
    }

    /// Indented rendering of the committed tree.
    pub(crate) fn dump_fibers(&self) -> String {
        let mut output = String::new();
        match self.session.current_root {
            Some(root) => self.dump_fiber(&mut output, root, 0),
            None => output.push_str("(no root)\n"),
        }
        output
    }

    fn dump_fiber(&self, output: &mut String, id: FiberId, depth: usize) {
        let indent = "  ".repeat(depth);
        let Some(fiber) = self.arena.get(id) else {
            let _ = writeln!(output, "{indent}{id} (missing)");
            return;
        };
        let _ = write!(output, "{indent}{}", fiber.kind);
        for (name, value) in fiber.props.attributes() {
            match value {
                PropValue::Listener(_) => {}
                _ if name == TEXT_VALUE => {
                    let _ = write!(output, " {:?}", value.to_string());
                }
                _ => {
                    let _ = write!(output, " {name}={:?}", value.to_string());
                }
            }
        }
        if fiber.hook_count() > 0 {
            let _ = write!(output, " [{} hooks]", fiber.hook_count());
        }
        output.push('\n');
        for child in self.arena.children(id) {
            self.dump_fiber(output, child, depth + 1);
        }
    }
}

#[cfg(test)]
#[path = "tests/work_loop_tests.rs"]
mod tests;
