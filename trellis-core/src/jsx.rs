//! Template Model
//!
//! Components describe their output as a tree of [`JsxNode`]s. A template is
//! cheap to clone (every branch is reference counted) and is thrown away
//! once the reconciler has turned it into an atom chain.
//!
//! # Building Templates
//!
//! ```rust
//! use trellis_core::jsx::{element, JsxNode};
//!
//! let view: JsxNode = element("ul")
//!     .class("list")
//!     .children((1..=3).map(|n| element("li").key(n).child(n)))
//!     .into();
//! ```
//!
//! Values that render nothing (`()`, `false`, `None`) become
//! [`JsxNode::Empty`]; numbers and strings become text.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::component::{Instance, IntoInstance, PropsView};
use crate::error::Result;
use crate::props::{Listener, PropValue, Props};
use crate::refs::DynamicRef;

/// Explicit identity of a node among its siblings.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Key(Rc<str>);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Self(Rc::from(key))
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Self(Rc::from(key))
    }
}

macro_rules! key_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Key {
                fn from(key: $ty) -> Self {
                    Self(Rc::from(key.to_string()))
                }
            }
        )*
    };
}

key_from_int!(i32, i64, u32, u64, usize);

type SetupFn = dyn Fn(PropsView) -> Result<Instance>;

/// A component function together with its identity.
///
/// Two templates refer to the same component when they were created from the
/// same function (or closure expression).
#[derive(Clone)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
    setup: Rc<SetupFn>,
}

impl ComponentType {
    pub fn of<F, R>(setup: F) -> Self
    where
        F: Fn(PropsView) -> R + 'static,
        R: IntoInstance,
    {
        let full = type_name::<F>();
        Self {
            id: TypeId::of::<F>(),
            name: full.rsplit("::").next().unwrap_or(full),
            setup: Rc::new(move |props| setup(props).into_instance()),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn setup(&self, props: PropsView) -> Result<Instance> {
        (self.setup)(props)
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentType({})", self.name)
    }
}

/// A native element in a template.
#[derive(Debug)]
pub struct JsxElement {
    pub tag: Rc<str>,
    pub props: Props,
    pub key: Option<Key>,
}

/// A component invocation in a template.
#[derive(Debug)]
pub struct JsxComponent {
    pub ty: ComponentType,
    pub props: Rc<Props>,
    pub key: Option<Key>,
}

/// A node of a component template.
#[derive(Clone, Default)]
pub enum JsxNode {
    #[default]
    Empty,
    Text(Rc<str>),
    Element(Rc<JsxElement>),
    Component(Rc<JsxComponent>),
    List(Rc<Vec<JsxNode>>),
}

impl JsxNode {
    pub fn is_empty(&self) -> bool {
        matches!(self, JsxNode::Empty)
    }
}

impl PartialEq for JsxNode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JsxNode::Empty, JsxNode::Empty) => true,
            (JsxNode::Text(a), JsxNode::Text(b)) => a == b,
            (JsxNode::Element(a), JsxNode::Element(b)) => Rc::ptr_eq(a, b),
            (JsxNode::Component(a), JsxNode::Component(b)) => Rc::ptr_eq(a, b),
            (JsxNode::List(a), JsxNode::List(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for JsxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsxNode::Empty => f.write_str("Empty"),
            JsxNode::Text(text) => write!(f, "{text:?}"),
            JsxNode::Element(el) => write!(f, "<{}>", el.tag),
            JsxNode::Component(c) => write!(f, "<{}/>", c.ty.name()),
            JsxNode::List(items) => f.debug_list().entries(items.iter()).finish(),
        }
    }
}

impl From<()> for JsxNode {
    fn from(_: ()) -> Self {
        JsxNode::Empty
    }
}

impl From<bool> for JsxNode {
    fn from(_: bool) -> Self {
        JsxNode::Empty
    }
}

impl From<&str> for JsxNode {
    fn from(text: &str) -> Self {
        JsxNode::Text(Rc::from(text))
    }
}

impl From<String> for JsxNode {
    fn from(text: String) -> Self {
        JsxNode::Text(Rc::from(text))
    }
}

impl From<Rc<str>> for JsxNode {
    fn from(text: Rc<str>) -> Self {
        JsxNode::Text(text)
    }
}

macro_rules! text_from_display {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for JsxNode {
                fn from(value: $ty) -> Self {
                    JsxNode::Text(Rc::from(value.to_string()))
                }
            }
        )*
    };
}

text_from_display!(i32, i64, u32, u64, usize, f64, char);

impl<T: Into<JsxNode>> From<Option<T>> for JsxNode {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(JsxNode::Empty)
    }
}

impl<T: Into<JsxNode>> From<Vec<T>> for JsxNode {
    fn from(items: Vec<T>) -> Self {
        JsxNode::List(Rc::new(items.into_iter().map(Into::into).collect()))
    }
}

impl From<ElementBuilder> for JsxNode {
    fn from(builder: ElementBuilder) -> Self {
        builder.build()
    }
}

impl From<ComponentBuilder> for JsxNode {
    fn from(builder: ComponentBuilder) -> Self {
        builder.build()
    }
}

/// A text node.
pub fn text(content: impl Into<String>) -> JsxNode {
    JsxNode::Text(Rc::from(content.into()))
}

/// Group several nodes without a wrapping element.
pub fn fragment<I, T>(items: I) -> JsxNode
where
    I: IntoIterator<Item = T>,
    T: Into<JsxNode>,
{
    JsxNode::List(Rc::new(items.into_iter().map(Into::into).collect()))
}

fn children_prop(children: Vec<JsxNode>) -> Option<JsxNode> {
    let mut children = children;
    match children.len() {
        0 => None,
        1 => children.pop(),
        _ => Some(JsxNode::List(Rc::new(children))),
    }
}

/// Start an element template.
pub fn element(tag: &str) -> ElementBuilder {
    ElementBuilder {
        tag: Rc::from(tag),
        props: Props::new(),
        key: None,
        children: Vec::new(),
        refs: Vec::new(),
    }
}

/// Builder returned by [`element`].
#[must_use]
pub struct ElementBuilder {
    tag: Rc<str>,
    props: Props,
    key: Option<Key>,
    children: Vec<JsxNode>,
    refs: Vec<DynamicRef>,
}

impl ElementBuilder {
    /// Set a native property or attribute.
    pub fn attr(mut self, key: &str, value: impl Into<PropValue>) -> Self {
        self.props.insert(key, value);
        self
    }

    /// Set the `class` prop; strings, arrays and `{name: bool}` objects work.
    pub fn class(self, class: impl Into<Value>) -> Self {
        self.attr("class", PropValue::Value(class.into()))
    }

    /// Set the `style` prop; `"a: b; c: d"` strings and objects work.
    pub fn style(self, style: impl Into<Value>) -> Self {
        self.attr("style", PropValue::Value(style.into()))
    }

    /// Attach a listener; `on("click", ..)` is stored as `onClick`.
    pub fn on<F>(self, event: &str, handler: F) -> Self
    where
        F: Fn(&dyn Any) + 'static,
    {
        let mut name = String::with_capacity(event.len() + 2);
        name.push_str("on");
        let mut chars = event.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
        self.attr(&name, Listener::new(handler))
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn node_ref(mut self, r: impl Into<DynamicRef>) -> Self {
        self.refs.push(r.into());
        self
    }

    pub fn child(mut self, child: impl Into<JsxNode>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I, T>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<JsxNode>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> JsxNode {
        let mut props = self.props;
        if let Some(children) = children_prop(self.children) {
            props.insert("children", children);
        }
        if !self.refs.is_empty() {
            props.insert("ref", self.refs);
        }
        JsxNode::Element(Rc::new(JsxElement {
            tag: self.tag,
            props,
            key: self.key,
        }))
    }
}

/// Start a component template.
pub fn component<F, R>(setup: F) -> ComponentBuilder
where
    F: Fn(PropsView) -> R + 'static,
    R: IntoInstance,
{
    ComponentBuilder {
        ty: ComponentType::of(setup),
        props: Props::new(),
        key: None,
        children: Vec::new(),
        refs: Vec::new(),
    }
}

/// Builder returned by [`component`].
#[must_use]
pub struct ComponentBuilder {
    ty: ComponentType,
    props: Props,
    key: Option<Key>,
    children: Vec<JsxNode>,
    refs: Vec<DynamicRef>,
}

impl ComponentBuilder {
    pub fn prop(mut self, key: &str, value: impl Into<PropValue>) -> Self {
        self.props.insert(key, value);
        self
    }

    /// Replace all props at once.
    pub fn props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Bind a ref to the value the component exposes.
    pub fn node_ref(mut self, r: impl Into<DynamicRef>) -> Self {
        self.refs.push(r.into());
        self
    }

    pub fn child(mut self, child: impl Into<JsxNode>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children<I, T>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<JsxNode>,
    {
        self.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> JsxNode {
        let mut props = self.props;
        if let Some(children) = children_prop(self.children) {
            props.insert("children", children);
        }
        if !self.refs.is_empty() {
            props.insert("ref", self.refs);
        }
        JsxNode::Component(Rc::new(JsxComponent {
            ty: self.ty,
            props: Rc::new(props),
            key: self.key,
        }))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
