use std::fmt::Write as _;

use fiber_core::collections::map::HashMap;
use fiber_core::{Host, HostError, Listener, NodeKind, PropValue, TEXT_VALUE};
use indexmap::IndexMap;

pub type MemoryNodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryNodeKind {
    Container,
    Element(String),
    Text,
}

#[derive(Debug, Clone)]
pub struct MemoryNode {
    pub kind: MemoryNodeKind,
    pub attributes: IndexMap<String, PropValue>,
    pub listeners: HashMap<String, Listener>,
    pub parent: Option<MemoryNodeId>,
    pub children: Vec<MemoryNodeId>,
}

impl MemoryNode {
    fn new(kind: MemoryNodeKind) -> Self {
        Self {
            kind,
            attributes: IndexMap::new(),
            listeners: HashMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            MemoryNodeKind::Element(tag) => Some(tag),
            _ => None,
        }
    }
}

/// One primitive call received by a [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    Create { node: MemoryNodeId, kind: MemoryNodeKind },
    SetAttribute { node: MemoryNodeId, name: String, value: String },
    ClearAttribute { node: MemoryNodeId, name: String },
    AddListener { node: MemoryNodeId, event: String },
    RemoveListener { node: MemoryNodeId, event: String },
    Append { parent: MemoryNodeId, child: MemoryNodeId },
    InsertBefore { parent: MemoryNodeId, child: MemoryNodeId, reference: MemoryNodeId },
    Remove { parent: MemoryNodeId, child: MemoryNodeId },
}

/// Host tree kept in memory, recording every primitive it receives.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<Option<MemoryNode>>,
    ops: Vec<HostOp>,
    failing: Option<&'static str>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached node to render into. Not recorded as an operation.
    pub fn create_container(&mut self) -> MemoryNodeId {
        self.nodes.push(Some(MemoryNode::new(MemoryNodeKind::Container)));
        self.nodes.len() - 1
    }

    pub fn node(&self, id: MemoryNodeId) -> Option<&MemoryNode> {
        self.nodes.get(id).and_then(Option::as_ref)
    }

    pub fn children(&self, id: MemoryNodeId) -> &[MemoryNodeId] {
        match self.node(id) {
            Some(node) => &node.children,
            None => &[],
        }
    }

    /// Concatenated text of every text node below `id`, in tree order.
    pub fn text_content(&self, id: MemoryNodeId) -> String {
        let mut output = String::new();
        self.collect_text(id, &mut output);
        output
    }

    fn collect_text(&self, id: MemoryNodeId, output: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        if node.kind == MemoryNodeKind::Text {
            if let Some(value) = node.attributes.get(TEXT_VALUE) {
                let _ = write!(output, "{value}");
            }
        }
        for &child in &node.children {
            self.collect_text(child, output);
        }
    }

    /// First element below `root` (pre-order) with the given tag.
    pub fn find_by_tag(&self, root: MemoryNodeId, tag: &str) -> Option<MemoryNodeId> {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            if id != root && node.tag() == Some(tag) {
                return Some(id);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    /// Number of element nodes created so far.
    pub fn created_elements(&self) -> usize {
        self.created(|kind| matches!(kind, MemoryNodeKind::Element(_)))
    }

    /// Number of text nodes created so far.
    pub fn created_texts(&self) -> usize {
        self.created(|kind| *kind == MemoryNodeKind::Text)
    }

    fn created(&self, filter: impl Fn(&MemoryNodeKind) -> bool) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, HostOp::Create { kind, .. } if filter(kind)))
            .count()
    }

    /// Makes every call of the named primitive (e.g. `"append_child"`) fail.
    pub fn fail_operation(&mut self, operation: Option<&'static str>) {
        self.failing = operation;
    }

    pub fn listener(&self, node: MemoryNodeId, event: &str) -> Option<Listener> {
        self.node(node)?.listeners.get(event).cloned()
    }

    pub fn dump_tree(&self, root: MemoryNodeId) -> String {
        let mut output = String::new();
        self.dump_node(&mut output, root, 0);
        output
    }

    fn dump_node(&self, output: &mut String, id: MemoryNodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        let Some(node) = self.node(id) else {
            let _ = writeln!(output, "{indent}[{id}] (missing)");
            return;
        };
        match &node.kind {
            MemoryNodeKind::Container => {
                let _ = write!(output, "{indent}[{id}] container");
            }
            MemoryNodeKind::Text => {
                let value = node
                    .attributes
                    .get(TEXT_VALUE)
                    .map(ToString::to_string)
                    .unwrap_or_default();
                let _ = write!(output, "{indent}[{id}] {value:?}");
            }
            MemoryNodeKind::Element(tag) => {
                let _ = write!(output, "{indent}[{id}] <{tag}");
                for (name, value) in &node.attributes {
                    let _ = write!(output, " {name}={:?}", value.to_string());
                }
                output.push('>');
            }
        }
        output.push('\n');
        for &child in &node.children {
            self.dump_node(output, child, depth + 1);
        }
    }

    fn check(&self, operation: &'static str) -> Result<(), HostError> {
        if self.failing == Some(operation) {
            return Err(HostError::new(operation, "injected failure"));
        }
        Ok(())
    }

    fn node_mut(&mut self, operation: &'static str, id: MemoryNodeId) -> Result<&mut MemoryNode, HostError> {
        self.nodes
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or_else(|| HostError::new(operation, format!("node {id} does not exist")))
    }

    fn record(&mut self, op: HostOp) {
        log::trace!("host op {op:?}");
        self.ops.push(op);
    }

    fn detach(&mut self, child: MemoryNodeId) {
        let parent = self.nodes.get(child).and_then(Option::as_ref).and_then(|node| node.parent);
        if let Some(parent) = parent {
            if let Some(Some(node)) = self.nodes.get_mut(parent) {
                node.children.retain(|&id| id != child);
            }
        }
    }

    fn attach(
        &mut self,
        operation: &'static str,
        parent: MemoryNodeId,
        child: MemoryNodeId,
        index: Option<usize>,
    ) -> Result<(), HostError> {
        self.node_mut(operation, child)?;
        self.detach(child);
        let node = self.node_mut(operation, parent)?;
        match index {
            Some(index) => node.children.insert(index, child),
            None => node.children.push(child),
        }
        self.node_mut(operation, child)?.parent = Some(parent);
        Ok(())
    }
}

impl Host for MemoryHost {
    type Node = MemoryNodeId;

    fn create_node(&mut self, kind: NodeKind<'_>) -> Result<MemoryNodeId, HostError> {
        self.check("create_node")?;
        let kind = match kind {
            NodeKind::Element(tag) => MemoryNodeKind::Element(tag.to_owned()),
            NodeKind::Text => MemoryNodeKind::Text,
        };
        let id = self.nodes.len();
        self.nodes.push(Some(MemoryNode::new(kind.clone())));
        self.record(HostOp::Create { node: id, kind });
        Ok(id)
    }

    fn set_attribute(
        &mut self,
        node: &MemoryNodeId,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError> {
        self.check("set_attribute")?;
        self.node_mut("set_attribute", *node)?
            .attributes
            .insert(name.to_owned(), value.clone());
        self.record(HostOp::SetAttribute {
            node: *node,
            name: name.to_owned(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn clear_attribute(&mut self, node: &MemoryNodeId, name: &str) -> Result<(), HostError> {
        self.check("clear_attribute")?;
        self.node_mut("clear_attribute", *node)?
            .attributes
            .shift_remove(name);
        self.record(HostOp::ClearAttribute {
            node: *node,
            name: name.to_owned(),
        });
        Ok(())
    }

    fn add_listener(
        &mut self,
        node: &MemoryNodeId,
        event: &str,
        listener: &Listener,
    ) -> Result<(), HostError> {
        self.check("add_listener")?;
        self.node_mut("add_listener", *node)?
            .listeners
            .insert(event.to_owned(), listener.clone());
        self.record(HostOp::AddListener {
            node: *node,
            event: event.to_owned(),
        });
        Ok(())
    }

    fn remove_listener(
        &mut self,
        node: &MemoryNodeId,
        event: &str,
        listener: &Listener,
    ) -> Result<(), HostError> {
        self.check("remove_listener")?;
        let target = self.node_mut("remove_listener", *node)?;
        if target.listeners.get(event) == Some(listener) {
            target.listeners.remove(event);
        }
        self.record(HostOp::RemoveListener {
            node: *node,
            event: event.to_owned(),
        });
        Ok(())
    }

    fn append_child(&mut self, parent: &MemoryNodeId, child: &MemoryNodeId) -> Result<(), HostError> {
        self.check("append_child")?;
        self.attach("append_child", *parent, *child, None)?;
        self.record(HostOp::Append {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: &MemoryNodeId,
        child: &MemoryNodeId,
        reference: &MemoryNodeId,
    ) -> Result<(), HostError> {
        self.check("insert_before")?;
        if child == reference {
            return Err(HostError::new("insert_before", "node cannot precede itself"));
        }
        self.detach(*child);
        let index = self
            .children(*parent)
            .iter()
            .position(|id| id == reference)
            .ok_or_else(|| {
                HostError::new(
                    "insert_before",
                    format!("node {reference} is not a child of {parent}"),
                )
            })?;
        self.attach("insert_before", *parent, *child, Some(index))?;
        self.record(HostOp::InsertBefore {
            parent: *parent,
            child: *child,
            reference: *reference,
        });
        Ok(())
    }

    fn remove_child(&mut self, parent: &MemoryNodeId, child: &MemoryNodeId) -> Result<(), HostError> {
        self.check("remove_child")?;
        let node = self.node_mut("remove_child", *parent)?;
        let Some(index) = node.children.iter().position(|id| id == child) else {
            return Err(HostError::new(
                "remove_child",
                format!("node {child} is not a child of {parent}"),
            ));
        };
        node.children.remove(index);
        self.node_mut("remove_child", *child)?.parent = None;
        self.record(HostOp::Remove {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_places_the_child_in_front_of_the_reference() {
        let mut host = MemoryHost::new();
        let container = host.create_container();
        let a = host.create_node(NodeKind::Element("a")).unwrap();
        let b = host.create_node(NodeKind::Element("b")).unwrap();
        let c = host.create_node(NodeKind::Element("c")).unwrap();
        host.append_child(&container, &a).unwrap();
        host.append_child(&container, &c).unwrap();
        host.insert_before(&container, &b, &c).unwrap();
        assert_eq!(host.children(container), &[a, b, c]);

        host.remove_child(&container, &a).unwrap();
        assert_eq!(host.children(container), &[b, c]);
        assert!(host.remove_child(&container, &a).is_err());
    }

    #[test]
    fn dump_shows_attributes_and_text() {
        let mut host = MemoryHost::new();
        let container = host.create_container();
        let h1 = host.create_node(NodeKind::Element("h1")).unwrap();
        let text = host.create_node(NodeKind::Text).unwrap();
        host.set_attribute(&h1, "title", &PropValue::from("greeting")).unwrap();
        host.set_attribute(&text, TEXT_VALUE, &PropValue::from("Hello")).unwrap();
        host.append_child(&h1, &text).unwrap();
        host.append_child(&container, &h1).unwrap();

        assert_eq!(
            host.dump_tree(container),
            "[0] container\n  [1] <h1 title=\"greeting\">\n    [2] \"Hello\"\n"
        );
        assert_eq!(host.text_content(container), "Hello");
        assert_eq!(host.find_by_tag(container, "h1"), Some(h1));
    }

    #[test]
    fn injected_failures_surface_as_host_errors() {
        let mut host = MemoryHost::new();
        host.fail_operation(Some("create_node"));
        let err = host.create_node(NodeKind::Text).unwrap_err();
        assert_eq!(err.operation, "create_node");
        host.fail_operation(None);
        assert!(host.create_node(NodeKind::Text).is_ok());
    }

    #[test]
    fn listeners_are_looked_up_by_event_name() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut host = MemoryHost::new();
        let button = host.create_node(NodeKind::Element("button")).unwrap();
        let clicks = Rc::new(Cell::new(0));
        let counter = Rc::clone(&clicks);
        let listener = Listener::new(move |_| counter.set(counter.get() + 1));
        host.add_listener(&button, "click", &listener).unwrap();

        host.listener(button, "click").expect("click listener").call(&());
        assert!(host.listener(button, "input").is_none());
        host.remove_listener(&button, "click", &listener).unwrap();
        assert!(host.listener(button, "click").is_none());
        assert_eq!(clicks.get(), 1);
    }
}
