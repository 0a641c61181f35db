//! Native render surface.
//!
//! The reconciler never touches a platform tree directly. It holds opaque
//! [`NativeNode`] handles and issues calls through a [`NativeRenderer`]
//! implemented by the platform (DOM bindings, a canvas scene, an HTML string
//! builder, the in-memory tree in [`crate::testing`]).

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::props::{Listener, PropValue};

/// Markup namespace of an element and its descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Svg,
    #[serde(rename = "mathml")]
    MathMl,
}

impl Namespace {
    /// Namespace a tag switches into, if any.
    pub fn for_tag(tag: &str) -> Option<Namespace> {
        match tag {
            "svg" => Some(Namespace::Svg),
            "math" => Some(Namespace::MathMl),
            _ => None,
        }
    }

    /// Namespace URI as used by XML-based targets.
    pub fn uri(self) -> &'static str {
        match self {
            Namespace::Svg => "http://www.w3.org/2000/svg",
            Namespace::MathMl => "http://www.w3.org/1998/Math/MathML",
        }
    }
}

/// Opaque handle to a node created by a [`NativeRenderer`].
///
/// Handles compare by identity: two handles are equal when they refer to
/// the same underlying node.
#[derive(Clone)]
pub struct NativeNode(Rc<dyn Any>);

impl NativeNode {
    /// Wrap a platform node.
    pub fn new<T: Any>(node: T) -> Self {
        Self(Rc::new(node))
    }

    /// Wrap an already shared platform node without re-allocating.
    pub fn from_rc<T: Any>(node: Rc<T>) -> Self {
        Self(node)
    }

    /// Borrow the platform node as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Get a shared handle to the platform node as `T`.
    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        Rc::clone(&self.0).downcast::<T>().ok()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &NativeNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address-based identity, stable for the node's lifetime.
    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for NativeNode {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for NativeNode {}

impl fmt::Debug for NativeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeNode({:#x})", self.identity())
    }
}

/// Platform operations the reconciler relies on.
///
/// Every call carries the namespace of the node being touched so that
/// XML-flavoured targets can pick the right factory or attribute space.
/// Implementations use interior mutability; the reconciler only holds a
/// shared reference.
pub trait NativeRenderer {
    fn create_element(&self, name: &str, namespace: Option<Namespace>) -> NativeNode;

    fn create_text_node(&self, text: &str, namespace: Option<Namespace>) -> NativeNode;

    fn set_property(
        &self,
        node: &NativeNode,
        key: &str,
        value: &PropValue,
        namespace: Option<Namespace>,
    );

    fn remove_property(&self, node: &NativeNode, key: &str, namespace: Option<Namespace>);

    fn set_style(
        &self,
        node: &NativeNode,
        key: &str,
        value: &serde_json::Value,
        namespace: Option<Namespace>,
    );

    fn remove_style(&self, node: &NativeNode, key: &str, namespace: Option<Namespace>);

    /// Replace the full class list; an empty string clears it.
    fn set_class(&self, node: &NativeNode, class: &str, namespace: Option<Namespace>);

    fn listen(
        &self,
        node: &NativeNode,
        event_type: &str,
        listener: &Listener,
        namespace: Option<Namespace>,
    );

    fn un_listen(
        &self,
        node: &NativeNode,
        event_type: &str,
        listener: &Listener,
        namespace: Option<Namespace>,
    );

    /// Insert `child` as the last child of `parent`.
    fn append_child(&self, parent: &NativeNode, child: &NativeNode, namespace: Option<Namespace>);

    /// Insert `child` as the first child of `parent`.
    fn prepend_child(&self, parent: &NativeNode, child: &NativeNode, namespace: Option<Namespace>);

    /// Insert `node` immediately after `reference`, under the same parent.
    fn insert_after(&self, node: &NativeNode, reference: &NativeNode, namespace: Option<Namespace>);

    /// Detach `node` from its parent.
    fn remove(&self, node: &NativeNode, namespace: Option<Namespace>);

    /// Remove every child of `node`.
    fn clean_children(&self, node: &NativeNode, namespace: Option<Namespace>);

    fn sync_text_content(&self, node: &NativeNode, text: &str, namespace: Option<Namespace>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_table() {
        assert_eq!(Namespace::for_tag("svg"), Some(Namespace::Svg));
        assert_eq!(Namespace::for_tag("math"), Some(Namespace::MathMl));
        assert_eq!(Namespace::for_tag("div"), None);
        assert_eq!(Namespace::for_tag("foreignObject"), None);
    }

    #[test]
    fn native_nodes_compare_by_identity() {
        let a = NativeNode::new(String::from("node"));
        let b = NativeNode::new(String::from("node"));

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.downcast_ref::<String>().map(String::as_str), Some("node"));
        assert!(a.downcast::<u32>().is_none());
    }
}
