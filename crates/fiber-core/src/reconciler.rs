//! Positional child diffing.

use crate::element::Element;
use crate::fiber::{Fiber, FiberArena, FiberId};
use crate::error::RenderError;

/// Builds the child chain of `parent` from `elements`, pairing position `i`
/// with the `i`-th child of `parent`'s alternate.
///
/// A pair with the same kind becomes an update of the old unit. Otherwise
/// the new element is placed fresh and the old unit, if any, is pushed onto
/// `deletions`. Committed units are only read, never relinked.
pub(crate) fn reconcile_children<N: Clone>(
    arena: &mut FiberArena<N>,
    deletions: &mut Vec<FiberId>,
    parent: FiberId,
    elements: &[Element],
) -> Result<(), RenderError> {
    let mut old = match arena.fiber(parent)?.alternate {
        Some(alternate) => arena.fiber(alternate)?.child,
        None => None,
    };
    let mut previous: Option<FiberId> = None;
    let mut index = 0;

    while index < elements.len() || old.is_some() {
        let element = elements.get(index);
        let (same_kind, old_sibling) = match old {
            Some(old_id) => {
                let old_fiber = arena.fiber(old_id)?;
                let same = element.is_some_and(|element| old_fiber.kind.matches(element.kind()));
                (same, old_fiber.sibling)
            }
            None => (false, None),
        };

        let created = match (element, old) {
            (Some(element), Some(old_id)) if same_kind => {
                let fiber = Fiber::updated(arena.fiber(old_id)?, old_id, parent, element);
                Some(arena.insert(fiber))
            }
            (Some(element), _) => Some(arena.insert(Fiber::placed(parent, element))),
            (None, _) => None,
        };
        if !same_kind {
            deletions.extend(old);
        }

        if let Some(id) = created {
            match previous {
                None => arena.fiber_mut(parent)?.child = Some(id),
                Some(prev) => arena.fiber_mut(prev)?.sibling = Some(id),
            }
            previous = Some(id);
        }
        old = old_sibling;
        index += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{component, text, Props};
    use crate::fiber::{EffectTag, FiberKind};
    use std::rc::Rc;

    fn kinds(arena: &FiberArena<u32>, parent: FiberId) -> Vec<(String, EffectTag)> {
        arena
            .children(parent)
            .map(|id| {
                let fiber = arena.get(id).unwrap();
                (fiber.kind().to_string(), fiber.effect_tag())
            })
            .collect()
    }

    fn list(tags: &[&str]) -> Vec<Element> {
        tags.iter().map(|tag| Element::host(tag)).collect()
    }

    fn mount(arena: &mut FiberArena<u32>, elements: &[Element]) -> FiberId {
        let root = arena.insert(Fiber::root(0, Rc::new(Props::new()), None));
        let mut deletions = Vec::new();
        reconcile_children(arena, &mut deletions, root, elements).unwrap();
        assert!(deletions.is_empty());
        root
    }

    fn rebuild(
        arena: &mut FiberArena<u32>,
        current: FiberId,
        elements: &[Element],
    ) -> (FiberId, Vec<FiberId>) {
        let root = arena.insert(Fiber::root(0, Rc::new(Props::new()), Some(current)));
        let mut deletions = Vec::new();
        reconcile_children(arena, &mut deletions, root, elements).unwrap();
        (root, deletions)
    }

    #[test]
    fn first_mount_places_every_child() {
        let mut arena = FiberArena::new();
        let root = mount(&mut arena, &list(&["a", "b"]));
        assert_eq!(
            kinds(&arena, root),
            vec![
                ("<a>".to_string(), EffectTag::Placement),
                ("<b>".to_string(), EffectTag::Placement),
            ]
        );
    }

    #[test]
    fn changed_middle_kind_replaces_only_that_position() {
        let mut arena = FiberArena::new();
        let current = mount(&mut arena, &list(&["a", "b", "c"]));
        let old_b = arena.children(current).nth(1).unwrap();

        let (wip, deletions) = rebuild(&mut arena, current, &list(&["a", "x", "c"]));

        assert_eq!(deletions, vec![old_b]);
        assert_eq!(
            kinds(&arena, wip),
            vec![
                ("<a>".to_string(), EffectTag::Update),
                ("<x>".to_string(), EffectTag::Placement),
                ("<c>".to_string(), EffectTag::Update),
            ]
        );
        let old: Vec<_> = arena.children(current).collect();
        let new: Vec<_> = arena.children(wip).collect();
        assert_eq!(arena.get(new[0]).unwrap().alternate(), Some(old[0]));
        assert_eq!(arena.get(new[1]).unwrap().alternate(), None);
        assert_eq!(arena.get(new[2]).unwrap().alternate(), Some(old[2]));
        assert_eq!(
            kinds(&arena, current).len(),
            3,
            "the committed chain is left untouched"
        );
    }

    #[test]
    fn shorter_list_deletes_the_tail() {
        let mut arena = FiberArena::new();
        let current = mount(&mut arena, &list(&["a", "b", "c"]));
        let old: Vec<_> = arena.children(current).collect();

        let (wip, deletions) = rebuild(&mut arena, current, &list(&["a"]));

        assert_eq!(deletions, vec![old[1], old[2]]);
        assert_eq!(kinds(&arena, wip), vec![("<a>".to_string(), EffectTag::Update)]);
    }

    #[test]
    fn empty_list_deletes_everything() {
        let mut arena = FiberArena::new();
        let current = mount(&mut arena, &list(&["a", "b"]));
        let (wip, deletions) = rebuild(&mut arena, current, &[]);
        assert_eq!(deletions.len(), 2);
        assert!(arena.get(wip).unwrap().child().is_none());
    }

    #[test]
    fn reordered_same_kind_siblings_update_in_place() {
        let mut arena = FiberArena::new();
        let current = mount(&mut arena, &[text("one"), text("two")]);
        let (wip, deletions) = rebuild(&mut arena, current, &[text("two"), text("one")]);
        assert!(deletions.is_empty());
        let tags: Vec<_> = arena
            .children(wip)
            .map(|id| arena.get(id).unwrap().effect_tag())
            .collect();
        assert_eq!(tags, vec![EffectTag::Update, EffectTag::Update]);
    }

    #[test]
    fn updates_inherit_the_host_node() {
        let mut arena = FiberArena::new();
        let current = mount(&mut arena, &list(&["a"]));
        let old = arena.children(current).next().unwrap();
        arena.get_mut(old).unwrap().host_node = Some(7);

        let (wip, _) = rebuild(&mut arena, current, &list(&["a"]));
        let new = arena.children(wip).next().unwrap();
        assert_eq!(arena.get(new).unwrap().host_node(), Some(&7));
        assert_eq!(arena.get(new).unwrap().kind(), &FiberKind::Host(Rc::from("a")));
    }

    #[test]
    fn updated_components_take_the_new_render_function() {
        fn labelled(label: &'static str) -> Element {
            component(move |_| Ok(text(label)), Props::new())
        }

        let mut arena = FiberArena::new();
        let current = mount(&mut arena, &[labelled("first")]);
        let (wip, deletions) = rebuild(&mut arena, current, &[labelled("second")]);
        assert!(deletions.is_empty());

        let unit = arena.children(wip).next().unwrap();
        let fiber = arena.get(unit).unwrap();
        assert_eq!(fiber.effect_tag(), EffectTag::Update);
        let FiberKind::Component(render) = fiber.kind() else {
            panic!("expected a component unit, got {}", fiber.kind());
        };
        let output = render.render(fiber.props()).unwrap();
        assert_eq!(
            output.props().get(crate::element::TEXT_VALUE).and_then(|v| v.as_text()),
            Some("second")
        );
    }
}
