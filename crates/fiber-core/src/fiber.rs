//! Work units ("fibers") and the arena that owns them.
//!
//! The tree is encoded with parent/child/sibling links instead of child
//! vectors so a build can be suspended between any two units and resumed
//! from a single cursor. Links are arena ids; ids carry a generation so a
//! reference to a freed unit is detected instead of silently aliasing.

use std::fmt;
use std::rc::Rc;

use crate::element::{ComponentRef, Element, ElementKind, Props};
use crate::error::RenderError;
use crate::hooks::HookSlot;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FiberId {
    index: u32,
    generation: u32,
}

impl fmt::Display for FiberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// What a unit stands for.
#[derive(Debug, Clone, PartialEq)]
pub enum FiberKind {
    /// The unit wrapping a host container.
    Root,
    Host(Rc<str>),
    Text,
    Component(ComponentRef),
}

impl FiberKind {
    /// Positional identity rule: same slot, same kind.
    pub fn matches(&self, element: &ElementKind) -> bool {
        match (self, element) {
            (FiberKind::Host(tag), ElementKind::Host(other)) => tag == other,
            (FiberKind::Text, ElementKind::Text) => true,
            (FiberKind::Component(component), ElementKind::Component(other)) => component == other,
            _ => false,
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self, FiberKind::Component(_))
    }
}

impl From<&ElementKind> for FiberKind {
    fn from(kind: &ElementKind) -> Self {
        match kind {
            ElementKind::Host(tag) => FiberKind::Host(Rc::clone(tag)),
            ElementKind::Text => FiberKind::Text,
            ElementKind::Component(component) => FiberKind::Component(component.clone()),
        }
    }
}

impl fmt::Display for FiberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FiberKind::Root => f.write_str("Root"),
            FiberKind::Host(tag) => write!(f, "<{tag}>"),
            FiberKind::Text => f.write_str("#text"),
            FiberKind::Component(component) => write!(f, "{}", component.name()),
        }
    }
}

/// Host mutation a unit requires at commit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum EffectTag {
    #[default]
    None,
    Placement,
    Update,
    Deletion,
}

pub struct Fiber<N> {
    pub(crate) kind: FiberKind,
    pub(crate) props: Rc<Props>,
    pub(crate) host_node: Option<N>,
    pub(crate) parent: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    pub(crate) alternate: Option<FiberId>,
    pub(crate) effect_tag: EffectTag,
    pub(crate) hooks: Vec<HookSlot>,
}

impl<N: Clone> Fiber<N> {
    pub(crate) fn root(container: N, props: Rc<Props>, alternate: Option<FiberId>) -> Self {
        Self {
            kind: FiberKind::Root,
            props,
            host_node: Some(container),
            parent: None,
            child: None,
            sibling: None,
            alternate,
            effect_tag: EffectTag::None,
            hooks: Vec::new(),
        }
    }

    /// A unit for a position whose previous occupant had a different kind
    /// or did not exist.
    pub(crate) fn placed(parent: FiberId, element: &Element) -> Self {
        Self {
            kind: FiberKind::from(element.kind()),
            props: element.shared_props(),
            host_node: None,
            parent: Some(parent),
            child: None,
            sibling: None,
            alternate: None,
            effect_tag: EffectTag::Placement,
            hooks: Vec::new(),
        }
    }

    /// A unit taking over `old`'s position and host node. Kind and props
    /// come from `element`, so a component runs its latest render function.
    pub(crate) fn updated(old: &Fiber<N>, old_id: FiberId, parent: FiberId, element: &Element) -> Self {
        Self {
            kind: FiberKind::from(element.kind()),
            props: element.shared_props(),
            host_node: old.host_node.clone(),
            parent: Some(parent),
            child: None,
            sibling: None,
            alternate: Some(old_id),
            effect_tag: EffectTag::Update,
            hooks: Vec::new(),
        }
    }
}

impl<N> Fiber<N> {
    pub fn kind(&self) -> &FiberKind {
        &self.kind
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn host_node(&self) -> Option<&N> {
        self.host_node.as_ref()
    }

    pub fn parent(&self) -> Option<FiberId> {
        self.parent
    }

    pub fn child(&self) -> Option<FiberId> {
        self.child
    }

    pub fn sibling(&self) -> Option<FiberId> {
        self.sibling
    }

    pub fn alternate(&self) -> Option<FiberId> {
        self.alternate
    }

    pub fn effect_tag(&self) -> EffectTag {
        self.effect_tag
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }
}

impl<N: fmt::Debug> fmt::Debug for Fiber<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fiber")
            .field("kind", &self.kind)
            .field("host_node", &self.host_node)
            .field("parent", &self.parent)
            .field("child", &self.child)
            .field("sibling", &self.sibling)
            .field("alternate", &self.alternate)
            .field("effect_tag", &self.effect_tag)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

struct ArenaEntry<N> {
    generation: u32,
    fiber: Option<Fiber<N>>,
}

/// Slab of units shared by the committed and the work-in-progress tree.
pub struct FiberArena<N> {
    entries: Vec<ArenaEntry<N>>,
    free: Vec<u32>,
    live: usize,
}

impl<N> Default for FiberArena<N> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }
}

impl<N> FiberArena<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub(crate) fn insert(&mut self, fiber: Fiber<N>) -> FiberId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.fiber = Some(fiber);
            return FiberId {
                index,
                generation: entry.generation,
            };
        }
        let index = self.entries.len() as u32;
        self.entries.push(ArenaEntry {
            generation: 0,
            fiber: Some(fiber),
        });
        FiberId {
            index,
            generation: 0,
        }
    }

    pub(crate) fn remove(&mut self, id: FiberId) -> Option<Fiber<N>> {
        let entry = self.entries.get_mut(id.index as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        let fiber = entry.fiber.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(fiber)
    }

    pub fn get(&self, id: FiberId) -> Option<&Fiber<N>> {
        self.entries
            .get(id.index as usize)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.fiber.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber<N>> {
        self.entries
            .get_mut(id.index as usize)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.fiber.as_mut())
    }

    /// Like [`get`](Self::get) but reports a stale id as an error.
    pub fn fiber(&self, id: FiberId) -> Result<&Fiber<N>, RenderError> {
        self.get(id).ok_or(RenderError::StaleFiber { id })
    }

    pub(crate) fn fiber_mut(&mut self, id: FiberId) -> Result<&mut Fiber<N>, RenderError> {
        self.get_mut(id).ok_or(RenderError::StaleFiber { id })
    }

    /// Iterates the sibling chain below `parent`.
    pub fn children(&self, parent: FiberId) -> Children<'_, N> {
        Children {
            arena: self,
            next: self.get(parent).and_then(|fiber| fiber.child),
        }
    }

    /// Pre-order walk of the units below `root`, excluding `root` itself.
    pub fn descendants(&self, root: FiberId) -> Descendants<'_, N> {
        Descendants {
            arena: self,
            root,
            next: self.get(root).and_then(|fiber| fiber.child),
        }
    }

    /// Frees `root` and every unit below it. Siblings of `root` are kept.
    pub(crate) fn free_subtree(&mut self, root: FiberId) -> usize {
        let Some(fiber) = self.remove(root) else {
            return 0;
        };
        let mut freed = 1;
        let mut stack: Vec<FiberId> = fiber.child.into_iter().collect();
        while let Some(id) = stack.pop() {
            if let Some(fiber) = self.remove(id) {
                freed += 1;
                stack.extend(fiber.sibling);
                stack.extend(fiber.child);
            }
        }
        freed
    }
}

pub struct Children<'a, N> {
    arena: &'a FiberArena<N>,
    next: Option<FiberId>,
}

impl<N> Iterator for Children<'_, N> {
    type Item = FiberId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = self.arena.get(id).and_then(|fiber| fiber.sibling);
        Some(id)
    }
}

pub struct Descendants<'a, N> {
    arena: &'a FiberArena<N>,
    root: FiberId,
    next: Option<FiberId>,
}

impl<N> Iterator for Descendants<'_, N> {
    type Item = FiberId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let fiber = self.arena.get(id)?;
        self.next = fiber.child.or_else(|| {
            let mut cursor = id;
            loop {
                if cursor == self.root {
                    return None;
                }
                let unit = self.arena.get(cursor)?;
                if let Some(sibling) = unit.sibling {
                    return Some(sibling);
                }
                cursor = unit.parent?;
            }
        });
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{text, Element};

    fn root(arena: &mut FiberArena<u32>) -> FiberId {
        arena.insert(Fiber::root(0, Rc::new(Props::new()), None))
    }

    #[test]
    fn removed_ids_are_detected_as_stale() {
        let mut arena = FiberArena::new();
        let id = root(&mut arena);
        assert!(arena.remove(id).is_some());
        assert!(matches!(
            arena.fiber(id),
            Err(RenderError::StaleFiber { id: stale }) if stale == id
        ));

        let reused = root(&mut arena);
        assert_ne!(reused, id, "slot reuse must bump the generation");
        assert!(arena.get(id).is_none());
        assert!(arena.get(reused).is_some());
    }

    #[test]
    fn free_subtree_keeps_the_roots_siblings() {
        let mut arena = FiberArena::new();
        let parent = root(&mut arena);
        let element = Element::host("li").child(text("x"));
        let first = arena.insert(Fiber::placed(parent, &element));
        let second = arena.insert(Fiber::placed(parent, &element));
        let grandchild = arena.insert(Fiber::placed(first, &text("x")));
        arena.get_mut(parent).unwrap().child = Some(first);
        arena.get_mut(first).unwrap().sibling = Some(second);
        arena.get_mut(first).unwrap().child = Some(grandchild);

        assert_eq!(arena.free_subtree(first), 2);
        assert!(arena.get(grandchild).is_none());
        assert!(arena.get(second).is_some());
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn descendants_walk_in_pre_order_without_leaving_the_subtree() {
        let mut arena = FiberArena::new();
        let parent = root(&mut arena);
        let element = Element::host("li");
        let a = arena.insert(Fiber::placed(parent, &element));
        let a1 = arena.insert(Fiber::placed(a, &element));
        let a2 = arena.insert(Fiber::placed(a, &element));
        let b = arena.insert(Fiber::placed(parent, &element));
        arena.get_mut(parent).unwrap().child = Some(a);
        arena.get_mut(a).unwrap().child = Some(a1);
        arena.get_mut(a1).unwrap().sibling = Some(a2);
        arena.get_mut(a).unwrap().sibling = Some(b);

        assert_eq!(arena.descendants(parent).collect::<Vec<_>>(), vec![a, a1, a2, b]);
        assert_eq!(arena.descendants(a).collect::<Vec<_>>(), vec![a1, a2]);
        assert_eq!(arena.descendants(b).count(), 0);
    }

    #[test]
    fn matches_compares_kind_only() {
        assert!(FiberKind::Host(Rc::from("div")).matches(&ElementKind::from("div")));
        assert!(!FiberKind::Host(Rc::from("div")).matches(&ElementKind::from("span")));
        assert!(FiberKind::Text.matches(&ElementKind::Text));
        assert!(!FiberKind::Root.matches(&ElementKind::Text));
    }
}
