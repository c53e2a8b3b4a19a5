//! The host tree the commit phase mutates.

use std::fmt;

use crate::element::{Listener, PropValue};
use crate::error::HostError;

/// Kind of node to create.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeKind<'a> {
    Element(&'a str),
    Text,
}

/// Node creation and mutation primitives of the host tree.
///
/// Handles are cheap to clone; a unit that keeps its position across renders
/// keeps the same handle. No method is retried on failure.
pub trait Host {
    type Node: Clone + PartialEq + fmt::Debug;

    fn create_node(&mut self, kind: NodeKind<'_>) -> Result<Self::Node, HostError>;

    fn set_attribute(
        &mut self,
        node: &Self::Node,
        name: &str,
        value: &PropValue,
    ) -> Result<(), HostError>;

    fn clear_attribute(&mut self, node: &Self::Node, name: &str) -> Result<(), HostError>;

    fn add_listener(
        &mut self,
        node: &Self::Node,
        event: &str,
        listener: &Listener,
    ) -> Result<(), HostError>;

    fn remove_listener(
        &mut self,
        node: &Self::Node,
        event: &str,
        listener: &Listener,
    ) -> Result<(), HostError>;

    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), HostError>;

    /// Inserts `child` in front of `reference`, which is already a child of `parent`.
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        reference: &Self::Node,
    ) -> Result<(), HostError>;

    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), HostError>;
}
