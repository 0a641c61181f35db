//! In-memory render target.
//!
//! [`MemoryRenderer`] implements [`NativeRenderer`] over a small element and
//! text tree kept in memory. It can serialise the tree to HTML, dispatch
//! events to registered listeners, and counts the operations it performed,
//! which makes it useful for tests and benchmarks.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

use crate::native::{Namespace, NativeNode, NativeRenderer};
use crate::props::{Listener, PropValue};

/// A node of the in-memory tree.
pub struct MemoryNode {
    tag: Option<Rc<str>>,
    namespace: Option<Namespace>,
    text: RefCell<String>,
    attrs: RefCell<IndexMap<String, PropValue>>,
    styles: RefCell<IndexMap<String, Value>>,
    class: RefCell<String>,
    listeners: RefCell<Vec<(String, Listener)>>,
    parent: RefCell<Weak<MemoryNode>>,
    children: RefCell<Vec<Rc<MemoryNode>>>,
}

impl MemoryNode {
    fn new(tag: Option<&str>, text: &str, namespace: Option<Namespace>) -> Rc<Self> {
        Rc::new(Self {
            tag: tag.map(Rc::from),
            namespace,
            text: RefCell::new(text.to_owned()),
            attrs: RefCell::new(IndexMap::new()),
            styles: RefCell::new(IndexMap::new()),
            class: RefCell::new(String::new()),
            listeners: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
        })
    }

    fn detach(self: &Rc<Self>) -> bool {
        let parent = self.parent.replace(Weak::new()).upgrade();
        match parent {
            Some(parent) => {
                parent
                    .children
                    .borrow_mut()
                    .retain(|child| !Rc::ptr_eq(child, self));
                true
            }
            None => false,
        }
    }

    fn text_content(&self, out: &mut String) {
        match self.tag {
            None => out.push_str(&self.text.borrow()),
            Some(_) => {
                for child in self.children.borrow().iter() {
                    child.text_content(out);
                }
            }
        }
    }

    fn write_html(&self, out: &mut String) {
        let Some(tag) = &self.tag else {
            out.push_str(&escape(&self.text.borrow()));
            return;
        };
        out.push('<');
        out.push_str(tag);
        let class = self.class.borrow();
        if !class.is_empty() {
            out.push_str(&format!(" class=\"{}\"", escape(&class)));
        }
        for (key, value) in self.attrs.borrow().iter() {
            match value.as_value() {
                Some(Value::Bool(true)) => out.push_str(&format!(" {key}")),
                Some(Value::Bool(false)) | Some(Value::Null) | None => {}
                Some(Value::String(s)) => out.push_str(&format!(" {key}=\"{}\"", escape(s))),
                Some(other) => out.push_str(&format!(" {key}=\"{other}\"")),
            }
        }
        let styles = self.styles.borrow();
        if !styles.is_empty() {
            let declarations: Vec<String> = styles
                .iter()
                .map(|(name, value)| match value {
                    Value::String(s) => format!("{name}: {s}"),
                    other => format!("{name}: {other}"),
                })
                .collect();
            out.push_str(&format!(" style=\"{}\"", escape(&declarations.join("; "))));
        }
        out.push('>');
        self.write_children(out);
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }

    fn write_children(&self, out: &mut String) {
        for child in self.children.borrow().iter() {
            child.write_html(out);
        }
    }
}

impl fmt::Debug for MemoryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut html = String::new();
        self.write_html(&mut html);
        f.write_str(&html)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub created: usize,
    pub inserted: usize,
    /// Inserts of nodes that already had a parent.
    pub moved: usize,
    pub removed: usize,
    pub text_synced: usize,
    pub props_set: usize,
    pub props_removed: usize,
    pub listened: usize,
    pub unlistened: usize,
}

/// A [`NativeRenderer`] building an in-memory tree.
#[derive(Default)]
pub struct MemoryRenderer {
    stats: Cell<RenderStats>,
}

impl MemoryRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A detached `<root>` element to mount into. Not counted.
    pub fn create_root(&self) -> NativeNode {
        NativeNode::from_rc(MemoryNode::new(Some("root"), "", None))
    }

    pub fn stats(&self) -> RenderStats {
        self.stats.get()
    }

    pub fn reset_stats(&self) {
        self.stats.set(RenderStats::default());
    }

    fn bump(&self, f: impl FnOnce(&mut RenderStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    /// Resolve a handle created by a memory renderer.
    pub fn node(node: &NativeNode) -> Option<Rc<MemoryNode>> {
        node.downcast::<MemoryNode>()
    }

    fn resolve(node: &NativeNode, op: &'static str) -> Option<Rc<MemoryNode>> {
        let resolved = Self::node(node);
        if resolved.is_none() {
            warn!(op, "node was not created by a memory renderer");
        }
        resolved
    }

    /// Outer HTML of `node`.
    pub fn to_html(&self, node: &NativeNode) -> String {
        let mut html = String::new();
        if let Some(node) = Self::node(node) {
            node.write_html(&mut html);
        }
        html
    }

    /// HTML of `node`'s children.
    pub fn inner_html(&self, node: &NativeNode) -> String {
        let mut html = String::new();
        if let Some(node) = Self::node(node) {
            node.write_children(&mut html);
        }
        html
    }

    pub fn text_content(&self, node: &NativeNode) -> String {
        let mut text = String::new();
        if let Some(node) = Self::node(node) {
            node.text_content(&mut text);
        }
        text
    }

    pub fn children(&self, node: &NativeNode) -> Vec<NativeNode> {
        Self::node(node)
            .map(|node| {
                node.children
                    .borrow()
                    .iter()
                    .cloned()
                    .map(NativeNode::from_rc)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn parent(&self, node: &NativeNode) -> Option<NativeNode> {
        Self::node(node)
            .and_then(|node| node.parent.borrow().upgrade())
            .map(NativeNode::from_rc)
    }

    /// Tag name, `None` for text nodes.
    pub fn tag(&self, node: &NativeNode) -> Option<String> {
        Self::node(node).and_then(|node| node.tag.as_deref().map(str::to_owned))
    }

    pub fn namespace(&self, node: &NativeNode) -> Option<Namespace> {
        Self::node(node).and_then(|node| node.namespace)
    }

    pub fn attr(&self, node: &NativeNode, key: &str) -> Option<PropValue> {
        Self::node(node).and_then(|node| node.attrs.borrow().get(key).cloned())
    }

    pub fn class(&self, node: &NativeNode) -> String {
        Self::node(node)
            .map(|node| node.class.borrow().clone())
            .unwrap_or_default()
    }

    pub fn style(&self, node: &NativeNode, key: &str) -> Option<Value> {
        Self::node(node).and_then(|node| node.styles.borrow().get(key).cloned())
    }

    pub fn listener_count(&self, node: &NativeNode, event_type: &str) -> usize {
        Self::node(node)
            .map(|node| {
                node.listeners
                    .borrow()
                    .iter()
                    .filter(|(name, _)| name == event_type)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Call every `event_type` listener on `node`. Returns how many ran.
    pub fn dispatch(&self, node: &NativeNode, event_type: &str, payload: &dyn Any) -> usize {
        let Some(node) = Self::node(node) else {
            return 0;
        };
        let listeners: Vec<Listener> = node
            .listeners
            .borrow()
            .iter()
            .filter(|(name, _)| name == event_type)
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in &listeners {
            listener.call(payload);
        }
        listeners.len()
    }

    /// Depth-first search for the first element with `tag`.
    pub fn find(&self, root: &NativeNode, tag: &str) -> Option<NativeNode> {
        fn walk(node: &Rc<MemoryNode>, tag: &str) -> Option<Rc<MemoryNode>> {
            if node.tag.as_deref() == Some(tag) {
                return Some(node.clone());
            }
            node.children.borrow().iter().find_map(|child| walk(child, tag))
        }
        Self::node(root)
            .and_then(|node| walk(&node, tag))
            .map(NativeNode::from_rc)
    }

    fn attach(&self, parent: &Rc<MemoryNode>, child: &Rc<MemoryNode>, position: Option<usize>, moved: bool) {
        {
            let mut children = parent.children.borrow_mut();
            let index = position.unwrap_or(children.len()).min(children.len());
            children.insert(index, child.clone());
        }
        *child.parent.borrow_mut() = Rc::downgrade(parent);
        self.bump(|s| {
            s.inserted += 1;
            if moved {
                s.moved += 1;
            }
        });
    }
}

impl fmt::Debug for MemoryRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRenderer")
            .field("stats", &self.stats.get())
            .finish()
    }
}

impl NativeRenderer for MemoryRenderer {
    fn create_element(&self, name: &str, namespace: Option<Namespace>) -> NativeNode {
        self.bump(|s| s.created += 1);
        NativeNode::from_rc(MemoryNode::new(Some(name), "", namespace))
    }

    fn create_text_node(&self, text: &str, namespace: Option<Namespace>) -> NativeNode {
        self.bump(|s| s.created += 1);
        NativeNode::from_rc(MemoryNode::new(None, text, namespace))
    }

    fn set_property(&self, node: &NativeNode, key: &str, value: &PropValue, _: Option<Namespace>) {
        if let Some(node) = Self::resolve(node, "set_property") {
            node.attrs.borrow_mut().insert(key.to_owned(), value.clone());
            self.bump(|s| s.props_set += 1);
        }
    }

    fn remove_property(&self, node: &NativeNode, key: &str, _: Option<Namespace>) {
        if let Some(node) = Self::resolve(node, "remove_property") {
            node.attrs.borrow_mut().shift_remove(key);
            self.bump(|s| s.props_removed += 1);
        }
    }

    fn set_style(&self, node: &NativeNode, key: &str, value: &Value, _: Option<Namespace>) {
        if let Some(node) = Self::resolve(node, "set_style") {
            node.styles.borrow_mut().insert(key.to_owned(), value.clone());
        }
    }

    fn remove_style(&self, node: &NativeNode, key: &str, _: Option<Namespace>) {
        if let Some(node) = Self::resolve(node, "remove_style") {
            node.styles.borrow_mut().shift_remove(key);
        }
    }

    fn set_class(&self, node: &NativeNode, class: &str, _: Option<Namespace>) {
        if let Some(node) = Self::resolve(node, "set_class") {
            *node.class.borrow_mut() = class.to_owned();
        }
    }

    fn listen(&self, node: &NativeNode, event_type: &str, listener: &Listener, _: Option<Namespace>) {
        if let Some(node) = Self::resolve(node, "listen") {
            node.listeners
                .borrow_mut()
                .push((event_type.to_owned(), listener.clone()));
            self.bump(|s| s.listened += 1);
        }
    }

    fn un_listen(&self, node: &NativeNode, event_type: &str, listener: &Listener, _: Option<Namespace>) {
        if let Some(node) = Self::resolve(node, "un_listen") {
            node.listeners
                .borrow_mut()
                .retain(|(name, l)| !(name == event_type && l.ptr_eq(listener)));
            self.bump(|s| s.unlistened += 1);
        }
    }

    fn append_child(&self, parent: &NativeNode, child: &NativeNode, _: Option<Namespace>) {
        if let (Some(parent), Some(child)) = (
            Self::resolve(parent, "append_child"),
            Self::resolve(child, "append_child"),
        ) {
            let moved = child.detach();
            self.attach(&parent, &child, None, moved);
        }
    }

    fn prepend_child(&self, parent: &NativeNode, child: &NativeNode, _: Option<Namespace>) {
        if let (Some(parent), Some(child)) = (
            Self::resolve(parent, "prepend_child"),
            Self::resolve(child, "prepend_child"),
        ) {
            let moved = child.detach();
            self.attach(&parent, &child, Some(0), moved);
        }
    }

    fn insert_after(&self, node: &NativeNode, reference: &NativeNode, _: Option<Namespace>) {
        let (Some(node), Some(reference)) = (
            Self::resolve(node, "insert_after"),
            Self::resolve(reference, "insert_after"),
        ) else {
            return;
        };
        if Rc::ptr_eq(&node, &reference) {
            return;
        }
        let moved = node.detach();
        let Some(parent) = reference.parent.borrow().upgrade() else {
            warn!("insert_after: reference node is detached");
            return;
        };
        let position = parent
            .children
            .borrow()
            .iter()
            .position(|child| Rc::ptr_eq(child, &reference))
            .map(|index| index + 1);
        self.attach(&parent, &node, position, moved);
    }

    fn remove(&self, node: &NativeNode, _: Option<Namespace>) {
        if let Some(node) = Self::resolve(node, "remove") {
            node.detach();
            self.bump(|s| s.removed += 1);
        }
    }

    fn clean_children(&self, node: &NativeNode, _: Option<Namespace>) {
        if let Some(node) = Self::resolve(node, "clean_children") {
            let children = std::mem::take(&mut *node.children.borrow_mut());
            for child in children {
                *child.parent.borrow_mut() = Weak::new();
                self.bump(|s| s.removed += 1);
            }
        }
    }

    fn sync_text_content(&self, node: &NativeNode, text: &str, _: Option<Namespace>) {
        if let Some(node) = Self::resolve(node, "sync_text_content") {
            *node.text.borrow_mut() = text.to_owned();
            self.bump(|s| s.text_synced += 1);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_operations_and_html() {
        let r = MemoryRenderer::new();
        let root = r.create_root();
        let a = r.create_element("a", None);
        let b = r.create_text_node("b", None);
        let c = r.create_element("c", None);

        r.append_child(&root, &a, None);
        r.insert_after(&b, &a, None);
        r.prepend_child(&root, &c, None);
        assert_eq!(r.inner_html(&root), "<c></c><a></a>b");

        r.insert_after(&c, &b, None);
        assert_eq!(r.inner_html(&root), "<a></a>b<c></c>");
        assert_eq!(r.stats().moved, 1);

        r.remove(&a, None);
        assert_eq!(r.inner_html(&root), "b<c></c>");
        assert!(r.parent(&a).is_none());
        assert_eq!(r.parent(&b), Some(root.clone()));
    }

    #[test]
    fn attributes_render_in_html() {
        let r = MemoryRenderer::new();
        let el = r.create_element("input", None);
        r.set_class(&el, "big red", None);
        r.set_property(&el, "type", &PropValue::from("text"), None);
        r.set_property(&el, "disabled", &PropValue::from(true), None);
        r.set_style(&el, "color", &Value::from("red"), None);
        r.set_style(&el, "width", &Value::from(10), None);

        assert_eq!(
            r.to_html(&el),
            "<input class=\"big red\" type=\"text\" disabled style=\"color: red; width: 10\"></input>"
        );
        r.remove_property(&el, "disabled", None);
        r.remove_style(&el, "width", None);
        assert_eq!(
            r.to_html(&el),
            "<input class=\"big red\" type=\"text\" style=\"color: red\"></input>"
        );
    }

    #[test]
    fn dispatch_reaches_listeners() {
        let r = MemoryRenderer::new();
        let el = r.create_element("button", None);
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        let listener = Listener::new(move |event| {
            let step = event.downcast_ref::<i32>().copied().unwrap_or(1);
            hits_clone.set(hits_clone.get() + step);
        });

        r.listen(&el, "click", &listener, None);
        assert_eq!(r.dispatch(&el, "click", &5), 1);
        assert_eq!(r.dispatch(&el, "keyup", &()), 0);
        assert_eq!(hits.get(), 5);

        r.un_listen(&el, "click", &listener, None);
        assert_eq!(r.listener_count(&el, "click"), 0);
    }

    #[test]
    fn text_content_and_escaping() {
        let r = MemoryRenderer::new();
        let root = r.create_root();
        let text = r.create_text_node("a < b", None);
        r.append_child(&root, &text, None);
        assert_eq!(r.text_content(&root), "a < b");
        assert_eq!(r.inner_html(&root), "a &lt; b");

        r.sync_text_content(&text, "done", None);
        assert_eq!(r.text_content(&root), "done");
        r.clean_children(&root, None);
        assert_eq!(r.inner_html(&root), "");
    }
}
