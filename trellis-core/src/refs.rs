//! Node and component references.
//!
//! A [`DynamicRef`] is handed a target whenever the node or component it is
//! attached to appears, and told to let go when it disappears. Binding the
//! same target twice is a no-op. The callback may return a [`Cleanup`],
//! which runs when that target is unbound.
//!
//! [`StaticRef`] keeps the first target it is bound to and exposes it
//! through [`StaticRef::current`].

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::native::NativeNode;
use crate::reactive::{Cleanup, IntoCleanup};

/// What a ref gets bound to.
#[derive(Clone)]
pub enum RefTarget {
    /// A native node produced by an element.
    Node(NativeNode),
    /// The value a component exposed from its setup.
    Instance(Rc<dyn Any>),
}

impl RefTarget {
    /// Identity of the target, used to make binding idempotent.
    pub fn identity(&self) -> usize {
        match self {
            RefTarget::Node(node) => node.identity(),
            RefTarget::Instance(value) => Rc::as_ptr(value) as *const () as usize,
        }
    }

    pub fn as_node(&self) -> Option<&NativeNode> {
        match self {
            RefTarget::Node(node) => Some(node),
            RefTarget::Instance(_) => None,
        }
    }

    /// The exposed component value, downcast to `T`.
    pub fn instance<T: Any>(&self) -> Option<Rc<T>> {
        match self {
            RefTarget::Instance(value) => Rc::clone(value).downcast::<T>().ok(),
            RefTarget::Node(_) => None,
        }
    }
}

impl fmt::Debug for RefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefTarget::Node(node) => f.debug_tuple("Node").field(node).finish(),
            RefTarget::Instance(_) => f.write_str("Instance"),
        }
    }
}

type RefCallback = dyn Fn(&RefTarget) -> Option<Cleanup>;

struct DynamicRefInner {
    callback: Box<RefCallback>,
    bound: RefCell<IndexMap<usize, Option<Cleanup>>>,
}

/// A ref driven by a callback.
#[derive(Clone)]
pub struct DynamicRef {
    inner: Rc<DynamicRefInner>,
}

impl DynamicRef {
    pub fn new<F, R>(callback: F) -> Self
    where
        F: Fn(&RefTarget) -> R + 'static,
        R: IntoCleanup,
    {
        Self {
            inner: Rc::new(DynamicRefInner {
                callback: Box::new(move |target| callback(target).into_cleanup()),
                bound: RefCell::new(IndexMap::new()),
            }),
        }
    }

    /// Bind a target. Does nothing if it is already bound.
    pub fn bind(&self, target: &RefTarget) {
        let identity = target.identity();
        if self.inner.bound.borrow().contains_key(&identity) {
            return;
        }
        let cleanup = (self.inner.callback)(target);
        self.inner.bound.borrow_mut().insert(identity, cleanup);
    }

    /// Unbind a target, running the cleanup its binding returned.
    pub fn unbind(&self, target: &RefTarget) {
        let entry = self.inner.bound.borrow_mut().shift_remove(&target.identity());
        if let Some(Some(cleanup)) = entry {
            cleanup.run();
        }
    }

    pub fn is_bound(&self, target: &RefTarget) -> bool {
        self.inner.bound.borrow().contains_key(&target.identity())
    }

    pub fn bound_count(&self) -> usize {
        self.inner.bound.borrow().len()
    }

    pub fn ptr_eq(&self, other: &DynamicRef) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for DynamicRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for DynamicRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicRef")
            .field("bound", &self.bound_count())
            .finish()
    }
}

/// A ref remembering the first target it was bound to.
#[derive(Clone)]
pub struct StaticRef {
    current: Rc<RefCell<Option<RefTarget>>>,
    inner: DynamicRef,
}

impl StaticRef {
    pub fn new() -> Self {
        let current: Rc<RefCell<Option<RefTarget>>> = Rc::new(RefCell::new(None));
        let slot = current.clone();
        let inner = DynamicRef::new(move |target: &RefTarget| {
            if slot.borrow().is_some() {
                return None;
            }
            *slot.borrow_mut() = Some(target.clone());
            let slot = slot.clone();
            let identity = target.identity();
            Some(Cleanup::new(move || {
                let mut current = slot.borrow_mut();
                if current.as_ref().map(RefTarget::identity) == Some(identity) {
                    *current = None;
                }
            }))
        });
        Self { current, inner }
    }

    /// The captured target, if still bound.
    pub fn current(&self) -> Option<RefTarget> {
        self.current.borrow().clone()
    }

    /// The captured native node, if the ref sits on an element.
    pub fn node(&self) -> Option<NativeNode> {
        self.current().and_then(|target| target.as_node().cloned())
    }

    /// The captured component value, downcast to `T`.
    pub fn instance<T: Any>(&self) -> Option<Rc<T>> {
        self.current().and_then(|target| target.instance::<T>())
    }

    pub fn as_dynamic(&self) -> &DynamicRef {
        &self.inner
    }
}

impl Default for StaticRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StaticRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticRef")
            .field("current", &self.current())
            .finish()
    }
}

impl From<&StaticRef> for DynamicRef {
    fn from(r: &StaticRef) -> Self {
        r.inner.clone()
    }
}

impl From<StaticRef> for DynamicRef {
    fn from(r: StaticRef) -> Self {
        r.inner
    }
}

impl From<&DynamicRef> for DynamicRef {
    fn from(r: &DynamicRef) -> Self {
        r.clone()
    }
}

/// Create a ref that keeps the first bound target.
pub fn create_ref() -> StaticRef {
    StaticRef::new()
}

/// Create a ref that calls `callback` for every bound target.
pub fn create_dynamic_ref<F, R>(callback: F) -> DynamicRef
where
    F: Fn(&RefTarget) -> R + 'static,
    R: IntoCleanup,
{
    DynamicRef::new(callback)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn binding_is_idempotent_per_target() {
        let calls = Rc::new(Cell::new(0));
        let cleanups = Rc::new(Cell::new(0));
        let (calls_clone, cleanups_clone) = (calls.clone(), cleanups.clone());

        let r = create_dynamic_ref(move |_target: &RefTarget| {
            calls_clone.set(calls_clone.get() + 1);
            let cleanups = cleanups_clone.clone();
            Cleanup::new(move || cleanups.set(cleanups.get() + 1))
        });

        let node = RefTarget::Node(NativeNode::new(1u8));
        r.bind(&node);
        r.bind(&node);
        assert_eq!(calls.get(), 1);
        assert!(r.is_bound(&node));

        r.unbind(&node);
        r.unbind(&node);
        assert_eq!(cleanups.get(), 1);
        assert_eq!(r.bound_count(), 0);
    }

    #[test]
    fn static_ref_keeps_first_target() {
        let r = create_ref();
        let first = NativeNode::new("first");
        let second = NativeNode::new("second");

        r.as_dynamic().bind(&RefTarget::Node(first.clone()));
        r.as_dynamic().bind(&RefTarget::Node(second.clone()));
        assert_eq!(r.node(), Some(first.clone()));

        r.as_dynamic().unbind(&RefTarget::Node(second));
        assert_eq!(r.node(), Some(first.clone()));

        r.as_dynamic().unbind(&RefTarget::Node(first));
        assert!(r.current().is_none());
    }

    #[test]
    fn instance_targets_downcast() {
        let r = create_ref();
        let exposed: Rc<dyn Any> = Rc::new(String::from("api"));
        r.as_dynamic().bind(&RefTarget::Instance(exposed));

        assert_eq!(r.instance::<String>().as_deref().map(String::as_str), Some("api"));
        assert!(r.instance::<u32>().is_none());
        assert!(r.node().is_none());
    }
}
