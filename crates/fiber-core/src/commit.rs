//! Applies a finished work-in-progress tree to the host in one pass.

use crate::element::{event_name, PropValue, Props};
use crate::error::RenderError;
use crate::fiber::{EffectTag, FiberArena, FiberId};
use crate::host::Host;

/// Counts of the effects applied by one commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub placements: usize,
    pub updates: usize,
    pub deletions: usize,
}

impl CommitReport {
    /// Whether the commit changed the structure of the host tree.
    pub fn is_structural(&self) -> bool {
        self.placements > 0 || self.deletions > 0
    }
}

/// Runs deletions, then placements and updates in pre-order.
///
/// Stops at the first host failure; mutations applied before it stay.
pub(crate) fn apply_effects<H: Host>(
    arena: &FiberArena<H::Node>,
    host: &mut H,
    wip_root: FiberId,
    deletions: &[FiberId],
) -> Result<CommitReport, RenderError> {
    let mut report = CommitReport::default();

    for &deleted in deletions {
        let parent = host_parent(arena, deleted)?;
        remove_host_nodes(arena, host, &parent, deleted)?;
        report.deletions += 1;
    }

    for id in arena.descendants(wip_root) {
        let fiber = arena.fiber(id)?;
        match fiber.effect_tag {
            EffectTag::Placement => {
                report.placements += 1;
                let Some(node) = fiber.host_node.as_ref() else {
                    continue;
                };
                update_props(host, node, &Props::default(), &fiber.props)?;
                let parent = host_parent(arena, id)?;
                match host_sibling(arena, id)? {
                    Some(before) => host.insert_before(&parent, node, &before)?,
                    None => host.append_child(&parent, node)?,
                }
            }
            EffectTag::Update => {
                report.updates += 1;
                let (Some(node), Some(alternate)) = (fiber.host_node.as_ref(), fiber.alternate) else {
                    continue;
                };
                let old = arena.fiber(alternate)?;
                update_props(host, node, &old.props, &fiber.props)?;
            }
            EffectTag::None | EffectTag::Deletion => {}
        }
    }
    Ok(report)
}

/// Host node of the closest ancestor that has one. The root always does.
fn host_parent<N: Clone>(arena: &FiberArena<N>, id: FiberId) -> Result<N, RenderError> {
    let mut cursor = arena.fiber(id)?.parent;
    while let Some(parent) = cursor {
        let fiber = arena.fiber(parent)?;
        if let Some(node) = &fiber.host_node {
            return Ok(node.clone());
        }
        cursor = fiber.parent;
    }
    Err(RenderError::StaleFiber { id })
}

/// First mounted host node that follows `id` in host order, looking through
/// component units. Siblings that are about to be placed are skipped since
/// they are not in the host tree yet.
fn host_sibling<N: Clone>(arena: &FiberArena<N>, id: FiberId) -> Result<Option<N>, RenderError> {
    let mut cursor = id;
    'siblings: loop {
        loop {
            let fiber = arena.fiber(cursor)?;
            if let Some(sibling) = fiber.sibling {
                cursor = sibling;
                break;
            }
            match fiber.parent {
                Some(parent) if arena.fiber(parent)?.host_node.is_none() => cursor = parent,
                _ => return Ok(None),
            }
        }
        loop {
            let fiber = arena.fiber(cursor)?;
            if fiber.effect_tag == EffectTag::Placement {
                continue 'siblings;
            }
            if let Some(node) = &fiber.host_node {
                return Ok(Some(node.clone()));
            }
            match fiber.child {
                Some(child) => cursor = child,
                None => continue 'siblings,
            }
        }
    }
}

/// Detaches the nearest host nodes at or below `id` from `parent`.
fn remove_host_nodes<H: Host>(
    arena: &FiberArena<H::Node>,
    host: &mut H,
    parent: &H::Node,
    id: FiberId,
) -> Result<(), RenderError> {
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        let fiber = arena.fiber(current)?;
        match &fiber.host_node {
            Some(node) => host.remove_child(parent, node)?,
            None => {
                let children: Vec<_> = arena.children(current).collect();
                stack.extend(children.into_iter().rev());
            }
        }
    }
    Ok(())
}

/// Brings `node`'s attributes and listeners from `old` to `new`.
pub(crate) fn update_props<H: Host>(
    host: &mut H,
    node: &H::Node,
    old: &Props,
    new: &Props,
) -> Result<(), RenderError> {
    for (name, previous) in old.attributes() {
        let next = new.get(name);
        match previous {
            PropValue::Listener(listener) => {
                if next != Some(previous) {
                    host.remove_listener(node, &event_name(name), listener)?;
                }
            }
            _ => {
                if next.map_or(true, PropValue::is_listener) {
                    host.clear_attribute(node, name)?;
                }
            }
        }
    }

    for (name, value) in new.attributes() {
        if old.get(name) == Some(value) {
            continue;
        }
        match value {
            PropValue::Listener(listener) => host.add_listener(node, &event_name(name), listener)?,
            _ => host.set_attribute(node, name, value)?,
        }
    }
    Ok(())
}
