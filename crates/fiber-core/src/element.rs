//! Tree descriptions: the plain data a render pass reconciles against.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::ComponentError;

/// Attribute holding the content of a text leaf.
pub const TEXT_VALUE: &str = "nodeValue";

/// Callback attached to a host node for a named event.
///
/// Two listeners are equal only if they share the same allocation, so
/// re-creating a closure on every render counts as a change.
#[derive(Clone)]
pub struct Listener {
    callback: Rc<dyn Fn(&dyn Any) + 'static>,
}

impl Listener {
    pub fn new(callback: impl Fn(&dyn Any) + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    pub fn call(&self, event: &dyn Any) {
        (self.callback)(event);
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.callback) as *const ()
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", self.addr())
    }
}

/// Value of a single attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Listener(Listener),
}

impl PropValue {
    pub fn is_listener(&self) -> bool {
        matches!(self, PropValue::Listener(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Text(text) => f.write_str(text),
            PropValue::Int(value) => write!(f, "{value}"),
            PropValue::Float(value) => write!(f, "{value}"),
            PropValue::Bool(value) => write!(f, "{value}"),
            PropValue::Listener(listener) => write!(f, "{listener:?}"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Text(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Text(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value.into())
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<Listener> for PropValue {
    fn from(listener: Listener) -> Self {
        PropValue::Listener(listener)
    }
}

/// Maps an `onXxx` attribute name to the host event name (`xxx`, lower-cased).
pub fn event_name(attribute: &str) -> String {
    attribute
        .strip_prefix("on")
        .unwrap_or(attribute)
        .to_ascii_lowercase()
}

/// Attributes and children of a tree description node.
#[derive(Debug, Clone, Default)]
pub struct Props {
    attributes: IndexMap<String, PropValue>,
    children: Vec<Element>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_children(children: Vec<Element>) -> Self {
        Self {
            attributes: IndexMap::new(),
            children,
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.attributes.get(name)
    }

    /// Sets an attribute, replacing any previous value under the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn push_child(&mut self, child: impl Into<Element>) {
        self.children.push(child.into());
    }
}

/// Render function signature shared by every component.
pub type RenderFn = dyn Fn(&Props) -> Result<Element, ComponentError> + 'static;

/// Plain function pointer form of a render function.
pub type RenderFnPtr = fn(&Props) -> Result<Element, ComponentError>;

/// What makes two component references the same component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ComponentKey {
    /// A function item or closure: its type is unique to it.
    Type(TypeId),
    /// A function pointer: every pointer shares one type, so the address
    /// tells them apart.
    Pointer(usize),
}

/// Reference to a stateful computation.
///
/// Identity is the type of the render function: invoking the same function
/// or closure expression on every render keeps the component's state.
/// Function pointers (e.g. taken from a table) are told apart by address.
#[derive(Clone)]
pub struct ComponentRef {
    key: ComponentKey,
    name: &'static str,
    render: Rc<RenderFn>,
}

impl ComponentRef {
    pub fn new<F>(render: F) -> Self
    where
        F: Fn(&Props) -> Result<Element, ComponentError> + 'static,
    {
        if let Some(&pointer) = (&render as &dyn Any).downcast_ref::<RenderFnPtr>() {
            return Self::from_fn(pointer);
        }
        Self {
            key: ComponentKey::Type(TypeId::of::<F>()),
            name: std::any::type_name::<F>(),
            render: Rc::new(render),
        }
    }

    /// A component backed by a function pointer, identified by its address.
    pub fn from_fn(render: RenderFnPtr) -> Self {
        Self {
            key: ComponentKey::Pointer(render as usize),
            name: "fn component",
            render: Rc::new(render),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn render(&self, props: &Props) -> Result<Element, ComponentError> {
        (self.render)(props)
    }
}

impl PartialEq for ComponentRef {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentRef").field(&self.name).finish()
    }
}

/// What a description node stands for.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Host(Rc<str>),
    Text,
    Component(ComponentRef),
}

impl From<&str> for ElementKind {
    fn from(tag: &str) -> Self {
        ElementKind::Host(Rc::from(tag))
    }
}

impl From<ComponentRef> for ElementKind {
    fn from(component: ComponentRef) -> Self {
        ElementKind::Component(component)
    }
}

/// Immutable description of a node and its subtree. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Element {
    kind: ElementKind,
    props: Rc<Props>,
}

impl Element {
    pub fn new(kind: ElementKind, props: Props) -> Self {
        Self {
            kind,
            props: Rc::new(props),
        }
    }

    /// Starts a host element description, e.g. `Element::host("div")`.
    pub fn host(tag: &str) -> Self {
        Self::new(ElementKind::from(tag), Props::new())
    }

    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub(crate) fn shared_props(&self) -> Rc<Props> {
        Rc::clone(&self.props)
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        Rc::make_mut(&mut self.props).set(name, value);
        self
    }

    /// Attaches a listener for `event` (stored under `on<event>`).
    pub fn on(self, event: &str, callback: impl Fn(&dyn Any) + 'static) -> Self {
        self.attr(format!("on{event}"), Listener::new(callback))
    }

    pub fn child(mut self, child: impl Into<Element>) -> Self {
        Rc::make_mut(&mut self.props).push_child(child);
        self
    }

    pub fn children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Element>,
    {
        let props = Rc::make_mut(&mut self.props);
        for child in children {
            props.push_child(child);
        }
        self
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        text(value)
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        text(value)
    }
}

impl From<i64> for Element {
    fn from(value: i64) -> Self {
        text(value.to_string())
    }
}

impl From<i32> for Element {
    fn from(value: i32) -> Self {
        text(value.to_string())
    }
}

/// Creates a text leaf.
pub fn text(value: impl Into<String>) -> Element {
    let mut props = Props::new();
    props.set(TEXT_VALUE, PropValue::Text(value.into()));
    Element::new(ElementKind::Text, props)
}

/// Creates a component description.
pub fn component<F>(render: F, props: Props) -> Element
where
    F: Fn(&Props) -> Result<Element, ComponentError> + 'static,
{
    Element::new(ElementKind::Component(ComponentRef::new(render)), props)
}

/// Builds a description from its parts; strings and numbers among the
/// children become text leaves.
pub fn create_element<K, A, N, V, C>(kind: K, attributes: A, children: C) -> Element
where
    K: Into<ElementKind>,
    A: IntoIterator<Item = (N, V)>,
    N: Into<String>,
    V: Into<PropValue>,
    C: IntoIterator,
    C::Item: Into<Element>,
{
    let mut props = Props::new();
    for (name, value) in attributes {
        props.set(name, value);
    }
    for child in children {
        props.push_child(child);
    }
    Element::new(kind.into(), props)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_element_wraps_strings_in_text_leaves() {
        let element = create_element(
            "h1",
            [("title", "foo")],
            [Element::from("Hello"), Element::host("a").child("world")],
        );

        assert_eq!(element.kind(), &ElementKind::from("h1"));
        assert_eq!(element.props().get("title"), Some(&PropValue::from("foo")));
        let children = element.props().children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].kind(), &ElementKind::Text);
        assert_eq!(
            children[0].props().get(TEXT_VALUE).and_then(PropValue::as_text),
            Some("Hello")
        );
        assert!(children[0].props().children().is_empty());
        assert_eq!(children[1].props().children().len(), 1);
    }

    #[test]
    fn attribute_keys_stay_unique_and_ordered() {
        let element = Element::host("div")
            .attr("id", "a")
            .attr("class", "b")
            .attr("id", "c");
        let names: Vec<_> = element.props().attributes().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["id", "class"]);
        assert_eq!(element.props().get("id"), Some(&PropValue::from("c")));
    }

    #[test]
    fn component_identity_follows_render_function_type() {
        fn greeting(_: &Props) -> Result<Element, ComponentError> {
            Ok(text("hi"))
        }
        fn farewell(_: &Props) -> Result<Element, ComponentError> {
            Ok(text("bye"))
        }

        assert_eq!(ComponentRef::new(greeting), ComponentRef::new(greeting));
        assert_ne!(ComponentRef::new(greeting), ComponentRef::new(farewell));
    }

    #[test]
    fn function_pointers_are_told_apart_by_address() {
        fn greeting(_: &Props) -> Result<Element, ComponentError> {
            Ok(text("hi"))
        }
        fn farewell(_: &Props) -> Result<Element, ComponentError> {
            Ok(text("bye"))
        }

        let table: [RenderFnPtr; 2] = [greeting, farewell];
        assert_ne!(ComponentRef::new(table[0]), ComponentRef::new(table[1]));
        assert_eq!(ComponentRef::new(table[0]), ComponentRef::new(table[0]));
        assert_eq!(ComponentRef::new(table[1]), ComponentRef::from_fn(farewell));
    }

    #[test]
    fn listeners_compare_by_allocation() {
        let listener = Listener::new(|_| {});
        let same = listener.clone();
        let other = Listener::new(|_| {});
        assert_eq!(listener, same);
        assert_ne!(listener, other);
    }

    #[test]
    fn event_names_drop_the_on_prefix() {
        assert_eq!(event_name("onClick"), "click");
        assert_eq!(event_name("onmouseover"), "mouseover");
        assert_eq!(event_name("input"), "input");
    }
}
