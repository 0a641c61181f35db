//! Component Model
//!
//! A [`Component`] is one live invocation of a component function. It owns
//! its props, its lifecycle hooks, the reactive scope of its render, and the
//! flags that drive incremental updates.
//!
//! # How Components Update
//!
//! 1. The first render runs the setup function once (untracked), which
//!    returns an [`Instance`]. The instance's render closure is then run
//!    inside the component's [`ReactiveScope`].
//!
//! 2. When a signal read by the render changes, the scope marks the
//!    component *dirty*: its own output is stale. Every ancestor is marked
//!    *changed*: something below it is stale, its own output is not. The
//!    root forwards the change to the application, which schedules a
//!    refresh.
//!
//! 3. A refresh walks down from the root through changed components only,
//!    re-renders the dirty ones, and finishes each visited component with
//!    [`Component::rendered`], which clears the flags and runs the
//!    `updated`/`mounted` hooks.
//!
//! A parent re-render passes fresh props down through
//! [`Component::update`]. A clean component whose props are shallowly
//! equal keeps its previous output, and so does one whose memo predicate
//! says the new props can reuse it.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tracing::{trace, warn};

use crate::atom::AtomId;
use crate::error::Result;
use crate::hooks::ComponentContext;
use crate::injector::{InjectFlags, Injector, TokenId};
use crate::jsx::{ComponentType, JsxNode, Key};
use crate::native::NativeNode;
use crate::props::Props;
use crate::reactive::{untrack, Cleanup, ReactiveScope};
use crate::refs::RefTarget;
use crate::scheduler::Scheduler;

static NEXT_COMPONENT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    fn new() -> Self {
        Self(NEXT_COMPONENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Read-only access to a component's current props.
///
/// The view always resolves to the latest props: when a parent re-renders
/// with new props the component re-points the view, so render closures that
/// captured it read fresh values.
#[derive(Clone)]
pub struct PropsView {
    slot: Rc<RefCell<Rc<Props>>>,
}

impl PropsView {
    pub(crate) fn new(props: Rc<Props>) -> Self {
        Self {
            slot: Rc::new(RefCell::new(props)),
        }
    }

    pub(crate) fn replace(&self, props: Rc<Props>) {
        *self.slot.borrow_mut() = props;
    }

    /// Snapshot of the current props.
    pub fn get(&self) -> Rc<Props> {
        self.slot.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&Props) -> R) -> R {
        f(&self.slot.borrow())
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.with(|props| props.value(key).cloned())
    }

    pub fn str(&self, key: &str) -> Option<String> {
        self.with(|props| props.str(key).map(str::to_owned))
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.with(|props| props.i64(key))
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.with(|props| props.f64(key))
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.with(|props| props.bool(key))
    }

    /// The nested template, or [`JsxNode::Empty`].
    pub fn children(&self) -> JsxNode {
        self.with(|props| props.children().cloned().unwrap_or_default())
    }
}

impl fmt::Debug for PropsView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with(|props| fmt::Debug::fmt(props, f))
    }
}

type RenderFn = Box<dyn FnMut() -> JsxNode>;
type MemoFn = Box<dyn Fn(&Props, &Props) -> bool>;

/// What a component's setup returns.
pub struct Instance {
    render: RenderFn,
    use_memo: Option<MemoFn>,
    portal_host: Option<NativeNode>,
    exposed: Option<Rc<dyn Any>>,
}

impl Instance {
    /// An instance rendering with `render`.
    pub fn new<F, N>(mut render: F) -> Self
    where
        F: FnMut() -> N + 'static,
        N: Into<JsxNode>,
    {
        Self {
            render: Box::new(move || render().into()),
            use_memo: None,
            portal_host: None,
            exposed: None,
        }
    }

    /// Attach a memo predicate. `can_use_memo(current, previous)` returning
    /// `true` keeps the previous output.
    pub fn memo<M>(mut self, can_use_memo: M) -> Self
    where
        M: Fn(&Props, &Props) -> bool + 'static,
    {
        self.use_memo = Some(Box::new(can_use_memo));
        self
    }

    /// Render the component's children into `host` instead of in place.
    pub fn portal(mut self, host: NativeNode) -> Self {
        self.portal_host = Some(host);
        self
    }

    /// Publish a value to refs attached to the component.
    pub fn expose<T: Any>(mut self, value: T) -> Self {
        self.exposed = Some(Rc::new(value));
        self
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("memo", &self.use_memo.is_some())
            .field("portal_host", &self.portal_host)
            .field("exposed", &self.exposed.is_some())
            .finish()
    }
}

/// Build an instance whose re-renders are gated by `can_use_memo`.
pub fn with_memo<M, F, N>(can_use_memo: M, render: F) -> Instance
where
    M: Fn(&Props, &Props) -> bool + 'static,
    F: FnMut() -> N + 'static,
    N: Into<JsxNode>,
{
    Instance::new(render).memo(can_use_memo)
}

/// Build an instance whose output renders into `host`.
pub fn create_portal<F, N>(render: F, host: NativeNode) -> Instance
where
    F: FnMut() -> N + 'static,
    N: Into<JsxNode>,
{
    Instance::new(render).portal(host)
}

/// Values a setup function may return.
pub trait IntoInstance {
    fn into_instance(self) -> Result<Instance>;
}

impl IntoInstance for Instance {
    fn into_instance(self) -> Result<Instance> {
        Ok(self)
    }
}

impl IntoInstance for Result<Instance> {
    fn into_instance(self) -> Result<Instance> {
        self
    }
}

type MountedHook = Box<dyn FnOnce() -> Option<Cleanup>>;
type UpdatedHook = Box<dyn FnMut() -> Option<Cleanup>>;
type PropsChangedHook = Box<dyn FnMut(&Props, &Props) -> Option<Cleanup>>;

#[derive(Default)]
struct LifecycleHooks {
    mounted: Vec<MountedHook>,
    updated: Vec<UpdatedHook>,
    updated_cleanups: Vec<Cleanup>,
    props_changed: Vec<PropsChangedHook>,
    props_changed_cleanups: Vec<Cleanup>,
    unmounted: Vec<Cleanup>,
}

/// Where a component's output sits in the native tree.
#[derive(Clone, Debug)]
pub(crate) struct ViewMetadata {
    pub(crate) atom: AtomId,
    pub(crate) host: NativeNode,
    pub(crate) is_parent: bool,
    pub(crate) root_host: NativeNode,
}

/// A live component.
pub struct Component {
    id: ComponentId,
    ty: ComponentType,
    key: Option<Key>,
    parent: RefCell<Option<Weak<Component>>>,
    props: PropsView,
    instance: RefCell<Option<Instance>>,
    dirty: Cell<bool>,
    changed: Cell<bool>,
    first_render: Cell<bool>,
    destroyed: Cell<bool>,
    changed_children: RefCell<Vec<Rc<Component>>>,
    hooks: RefCell<LifecycleHooks>,
    scope: ReactiveScope,
    view: RefCell<Option<ViewMetadata>>,
    providers: RefCell<HashMap<TokenId, Rc<dyn Any>>>,
    injector: Option<Rc<dyn Injector>>,
    scheduler: Rc<dyn Scheduler>,
    on_change: Option<Box<dyn Fn()>>,
}

impl Component {
    /// Create a child of `parent`.
    pub(crate) fn new(
        ty: ComponentType,
        props: Rc<Props>,
        key: Option<Key>,
        parent: &Rc<Component>,
    ) -> Rc<Self> {
        Self::build(
            ty,
            props,
            key,
            Some(Rc::downgrade(parent)),
            parent.scheduler.clone(),
            None,
            None,
        )
    }

    /// Create the root of a component tree. `on_change` runs every time
    /// something below the root changes.
    pub(crate) fn new_root(
        ty: ComponentType,
        scheduler: Rc<dyn Scheduler>,
        injector: Option<Rc<dyn Injector>>,
        on_change: Box<dyn Fn()>,
    ) -> Rc<Self> {
        Self::build(
            ty,
            Rc::new(Props::new()),
            None,
            None,
            scheduler,
            injector,
            Some(on_change),
        )
    }

    fn build(
        ty: ComponentType,
        props: Rc<Props>,
        key: Option<Key>,
        parent: Option<Weak<Component>>,
        scheduler: Rc<dyn Scheduler>,
        injector: Option<Rc<dyn Injector>>,
        on_change: Option<Box<dyn Fn()>>,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Component>| {
            let weak = weak.clone();
            Component {
                id: ComponentId::new(),
                ty,
                key,
                parent: RefCell::new(parent),
                props: PropsView::new(props),
                instance: RefCell::new(None),
                dirty: Cell::new(false),
                changed: Cell::new(false),
                first_render: Cell::new(true),
                destroyed: Cell::new(false),
                changed_children: RefCell::new(Vec::new()),
                hooks: RefCell::new(LifecycleHooks::default()),
                scope: ReactiveScope::new(move || {
                    if let Some(component) = weak.upgrade() {
                        component.mark_as_dirtied();
                    }
                }),
                view: RefCell::new(None),
                providers: RefCell::new(HashMap::new()),
                injector,
                scheduler,
                on_change,
            }
        })
    }

    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.ty.name()
    }

    pub fn ty(&self) -> &ComponentType {
        &self.ty
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn props(&self) -> Rc<Props> {
        self.props.get()
    }

    pub fn parent(&self) -> Option<Rc<Component>> {
        self.parent.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Own output is stale.
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Something at or below this component is stale.
    pub fn is_changed(&self) -> bool {
        self.changed.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn is_first_render(&self) -> bool {
        self.first_render.get()
    }

    /// Number of signals the last render read.
    pub fn dependency_count(&self) -> usize {
        self.scope.dependency_count()
    }

    pub fn portal_host(&self) -> Option<NativeNode> {
        self.instance
            .borrow()
            .as_ref()
            .and_then(|instance| instance.portal_host.clone())
    }

    pub fn exposed(&self) -> Option<Rc<dyn Any>> {
        self.instance
            .borrow()
            .as_ref()
            .and_then(|instance| instance.exposed.clone())
    }

    // ---- Dirty tracking ----

    /// Mark this component's output stale and notify its ancestors.
    pub fn mark_as_dirtied(self: &Rc<Self>) {
        if self.destroyed.get() {
            return;
        }
        self.dirty.set(true);
        self.mark_as_changed(None);
    }

    /// Record that `child` (or this component itself) changed and propagate
    /// upward until an already changed ancestor is reached.
    pub(crate) fn mark_as_changed(self: &Rc<Self>, child: Option<&Rc<Component>>) {
        if let Some(child) = child {
            let mut children = self.changed_children.borrow_mut();
            if !children.iter().any(|c| Rc::ptr_eq(c, child)) {
                children.push(child.clone());
            }
        }
        if let Some(on_change) = &self.on_change {
            self.changed.set(true);
            on_change();
            return;
        }
        if self.changed.replace(true) {
            return;
        }
        if let Some(parent) = self.parent() {
            parent.mark_as_changed(Some(self));
        }
    }

    #[cfg(test)]
    pub(crate) fn changed_children(&self) -> Vec<Rc<Component>> {
        self.changed_children.borrow().clone()
    }

    pub(crate) fn take_changed_children(&self) -> Vec<Rc<Component>> {
        mem::take(&mut *self.changed_children.borrow_mut())
    }

    pub(crate) fn has_changed_children(&self) -> bool {
        !self.changed_children.borrow().is_empty()
    }

    /// Give back the children a failed pass did not finish and drop the
    /// changed flag, so the next change below re-notifies the root.
    pub(crate) fn requeue_changed_children(&self, pending: Vec<Rc<Component>>) {
        let mut children = self.changed_children.borrow_mut();
        let recorded = mem::replace(&mut *children, pending);
        for child in recorded {
            if !children.iter().any(|c| Rc::ptr_eq(c, &child)) {
                children.push(child);
            }
        }
        self.changed.set(false);
    }

    pub(crate) fn clear_changed_children(&self) {
        self.changed_children.borrow_mut().clear();
    }

    // ---- Rendering ----

    /// Run setup and produce the first template.
    pub(crate) fn render(self: &Rc<Self>) -> Result<JsxNode> {
        let instance = {
            let _context = ComponentContext::enter(self.clone());
            untrack(|| self.ty.setup(self.props.clone()))?
        };
        *self.instance.borrow_mut() = Some(instance);
        Ok(self.rerender())
    }

    /// Run the render closure again, replacing the tracked dependencies.
    pub(crate) fn rerender(&self) -> JsxNode {
        let mut instance = self.instance.borrow_mut();
        match instance.as_mut() {
            Some(instance) => self.scope.track(|| (instance.render)()),
            None => JsxNode::Empty,
        }
    }

    /// Offer new props. Returns the new template when the component has to
    /// re-render, or `None` when its previous output can be kept.
    pub(crate) fn update(self: &Rc<Self>, new_props: Rc<Props>) -> Option<JsxNode> {
        let old_props = self.props.get();
        let changes = new_props.changes_since(&old_props);

        if changes.is_empty() {
            if !self.dirty.get() {
                self.props.replace(new_props);
                return None;
            }
        } else {
            self.invoke_props_changed_hooks(&new_props, &old_props);
            self.sync_refs(&old_props, &new_props);
            if !self.dirty.get() && !self.can_update(&old_props, &new_props) {
                trace!(component = self.name(), "memo kept previous output");
                self.props.replace(new_props);
                return None;
            }
        }

        self.props.replace(new_props);
        Some(self.rerender())
    }

    fn can_update(&self, old_props: &Props, new_props: &Props) -> bool {
        let instance = self.instance.borrow();
        match instance.as_ref().and_then(|i| i.use_memo.as_ref()) {
            Some(can_use_memo) => !can_use_memo(new_props, old_props),
            None => true,
        }
    }

    /// Finish a render pass for this component.
    pub(crate) fn rendered(self: &Rc<Self>) {
        let first = self.first_render.replace(false);
        self.dirty.set(false);
        self.changed.set(false);

        self.invoke_updated_hooks();
        if first {
            self.invoke_mounted_hooks();
            self.bind_refs();
        }

        if self.destroyed.get() {
            return;
        }
        // Children recorded after this pass took the list are still pending.
        if !self.changed_children.borrow().is_empty() {
            self.changed.set(true);
        }
        if !self.changed.get() || self.on_change.is_some() {
            return;
        }
        let (Some(parent), child) = (self.parent(), Rc::downgrade(self)) else {
            return;
        };
        let parent = Rc::downgrade(&parent);
        self.scheduler.queue_microtask(Box::new(move || {
            let (Some(parent), Some(child)) = (parent.upgrade(), child.upgrade()) else {
                return;
            };
            if !child.is_destroyed() {
                parent.mark_as_changed(Some(&child));
            }
        }));
    }

    // ---- View metadata ----

    pub(crate) fn view(&self) -> Option<ViewMetadata> {
        self.view.borrow().clone()
    }

    pub(crate) fn set_view(&self, view: ViewMetadata) {
        *self.view.borrow_mut() = Some(view);
    }

    /// Point the insertion cursor of this component at a new host.
    pub(crate) fn retarget(&self, host: &NativeNode, is_parent: bool) {
        match self.view.borrow_mut().as_mut() {
            Some(view) => {
                view.host = host.clone();
                view.is_parent = is_parent;
            }
            None => warn!(component = self.name(), "retargeting a component without a view"),
        }
    }

    // ---- Hooks ----

    pub(crate) fn add_mounted_hook(&self, hook: MountedHook) {
        self.hooks.borrow_mut().mounted.push(hook);
    }

    pub(crate) fn add_updated_hook(&self, hook: UpdatedHook) {
        self.hooks.borrow_mut().updated.push(hook);
    }

    pub(crate) fn add_props_changed_hook(&self, hook: PropsChangedHook) {
        self.hooks.borrow_mut().props_changed.push(hook);
    }

    pub(crate) fn add_unmounted_hook(&self, cleanup: Cleanup) {
        if self.destroyed.get() {
            cleanup.run();
        } else {
            self.hooks.borrow_mut().unmounted.push(cleanup);
        }
    }

    fn invoke_mounted_hooks(&self) {
        let hooks = mem::take(&mut self.hooks.borrow_mut().mounted);
        for hook in hooks {
            if let Some(cleanup) = hook() {
                self.add_unmounted_hook(cleanup);
            }
        }
    }

    fn invoke_updated_hooks(&self) {
        let stale = mem::take(&mut self.hooks.borrow_mut().updated_cleanups);
        for cleanup in stale {
            cleanup.run();
        }

        let mut hooks = mem::take(&mut self.hooks.borrow_mut().updated);
        let mut cleanups = Vec::new();
        for hook in hooks.iter_mut() {
            if let Some(cleanup) = hook() {
                cleanups.push(cleanup);
            }
        }

        if self.destroyed.get() {
            cleanups.into_iter().for_each(Cleanup::run);
            return;
        }
        let mut slot = self.hooks.borrow_mut();
        hooks.append(&mut slot.updated);
        slot.updated = hooks;
        slot.updated_cleanups.extend(cleanups);
    }

    fn invoke_props_changed_hooks(&self, new_props: &Props, old_props: &Props) {
        let stale = mem::take(&mut self.hooks.borrow_mut().props_changed_cleanups);
        for cleanup in stale {
            cleanup.run();
        }

        let mut hooks = mem::take(&mut self.hooks.borrow_mut().props_changed);
        let mut cleanups = Vec::new();
        for hook in hooks.iter_mut() {
            if let Some(cleanup) = hook(new_props, old_props) {
                cleanups.push(cleanup);
            }
        }

        let mut slot = self.hooks.borrow_mut();
        hooks.append(&mut slot.props_changed);
        slot.props_changed = hooks;
        slot.props_changed_cleanups.extend(cleanups);
    }

    // ---- Refs ----

    fn ref_target(&self) -> Option<RefTarget> {
        self.exposed().map(RefTarget::Instance)
    }

    fn bind_refs(&self) {
        let props = self.props.get();
        if props.refs().is_empty() {
            return;
        }
        match self.ref_target() {
            Some(target) => props.refs().iter().for_each(|r| r.bind(&target)),
            None => trace!(component = self.name(), "refs on a component that exposes nothing"),
        }
    }

    fn sync_refs(&self, old_props: &Props, new_props: &Props) {
        if self.first_render.get() {
            return;
        }
        let Some(target) = self.ref_target() else {
            return;
        };
        for r in old_props.refs() {
            if !new_props.refs().contains(r) {
                r.unbind(&target);
            }
        }
        for r in new_props.refs() {
            if !old_props.refs().contains(r) {
                r.bind(&target);
            }
        }
    }

    // ---- Teardown ----

    /// Tear the component down: drop subscriptions, unbind refs and run the
    /// cleanup and unmount callbacks in registration order.
    pub(crate) fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        trace!(component = self.name(), id = self.id.0, "destroy");

        self.scope.clear();
        if let Some(target) = self.ref_target() {
            self.props.get().refs().iter().for_each(|r| r.unbind(&target));
        }

        let hooks = mem::take(&mut *self.hooks.borrow_mut());
        hooks.updated_cleanups.into_iter().for_each(Cleanup::run);
        hooks.props_changed_cleanups.into_iter().for_each(Cleanup::run);
        hooks.unmounted.into_iter().for_each(Cleanup::run);

        self.changed_children.borrow_mut().clear();
        self.providers.borrow_mut().clear();
        *self.view.borrow_mut() = None;
        *self.parent.borrow_mut() = None;
        let instance = self.instance.borrow_mut().take();
        drop(instance);
    }

    // ---- Injection ----

    pub(crate) fn provide_value(&self, token: TokenId, value: Rc<dyn Any>) {
        self.providers.borrow_mut().insert(token, value);
    }
}

impl Injector for Component {
    fn get(&self, token: TokenId, flags: InjectFlags) -> Option<Rc<dyn Any>> {
        if flags != InjectFlags::SkipSelf {
            if let Some(value) = self.providers.borrow().get(&token) {
                return Some(value.clone());
            }
        }
        if flags == InjectFlags::SelfOnly {
            return None;
        }
        match self.parent() {
            Some(parent) => parent.get(token, InjectFlags::Default),
            None => self.injector.as_ref()?.get(token, InjectFlags::Default),
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("key", &self.key)
            .field("dirty", &self.dirty.get())
            .field("changed", &self.changed.get())
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{on_mounted, on_props_changed, on_unmounted, on_updated};
    use crate::reactive::Signal;
    use crate::scheduler::MicrotaskQueue;

    fn blank(_props: PropsView) -> Instance {
        Instance::new(|| JsxNode::Empty)
    }

    fn root_with_counter() -> (Rc<Component>, Rc<Cell<usize>>) {
        let notified = Rc::new(Cell::new(0));
        let notified_clone = notified.clone();
        let root = Component::new_root(
            ComponentType::of(blank),
            Rc::new(MicrotaskQueue::new()),
            None,
            Box::new(move || notified_clone.set(notified_clone.get() + 1)),
        );
        (root, notified)
    }

    fn child_of(parent: &Rc<Component>) -> Rc<Component> {
        Component::new(ComponentType::of(blank), Rc::new(Props::new()), None, parent)
    }

    #[test]
    fn dirty_marks_ancestors_changed_only() {
        let (root, notified) = root_with_counter();
        let a = child_of(&root);
        let b = child_of(&root);
        let a1 = child_of(&a);
        let b1 = child_of(&b);

        a1.mark_as_dirtied();

        assert!(a1.is_dirty() && a1.is_changed());
        assert!(a.is_changed() && !a.is_dirty());
        assert!(root.is_changed() && !root.is_dirty());
        assert!(!b.is_changed() && !b1.is_changed());
        assert_eq!(notified.get(), 1);

        assert_eq!(root.changed_children().len(), 1);
        assert!(Rc::ptr_eq(&root.changed_children()[0], &a));
        assert!(Rc::ptr_eq(&a.changed_children()[0], &a1));
    }

    #[test]
    fn repeated_marks_stop_at_changed_ancestor() {
        let (root, notified) = root_with_counter();
        let a = child_of(&root);
        let a1 = child_of(&a);
        let a2 = child_of(&a);

        a1.mark_as_dirtied();
        a1.mark_as_dirtied();
        a2.mark_as_dirtied();

        assert_eq!(notified.get(), 1);
        assert_eq!(a.changed_children().len(), 2);
        assert_eq!(root.changed_children().len(), 1);
    }

    #[test]
    fn render_tracks_signals_and_dirties_on_write() {
        let (root, _) = root_with_counter();
        let count = Signal::new(0);
        let count_clone = count.clone();
        let ty = ComponentType::of(move |_props: PropsView| {
            let count = count_clone.clone();
            Instance::new(move || count.get())
        });
        let component = Component::new(ty, Rc::new(Props::new()), None, &root);

        let template = component.render().unwrap();
        assert_eq!(template, JsxNode::from("0"));
        assert_eq!(component.dependency_count(), 1);

        count.set(1);
        assert!(component.is_dirty());
        assert_eq!(component.rerender(), JsxNode::from("1"));
    }

    #[test]
    fn setup_reads_are_not_tracked() {
        let (root, _) = root_with_counter();
        let count = Signal::new(0);
        let count_clone = count.clone();
        let ty = ComponentType::of(move |_props: PropsView| {
            let initial = count_clone.get();
            Instance::new(move || initial)
        });
        let component = Component::new(ty, Rc::new(Props::new()), None, &root);

        component.render().unwrap();
        count.set(5);
        assert!(!component.is_dirty());
        assert_eq!(component.dependency_count(), 0);
    }

    #[test]
    fn unchanged_props_skip_render() {
        let (root, _) = root_with_counter();
        let renders = Rc::new(Cell::new(0));
        let renders_clone = renders.clone();
        let ty = ComponentType::of(move |props: PropsView| {
            let renders = renders_clone.clone();
            Instance::new(move || {
                renders.set(renders.get() + 1);
                props.i64("value").unwrap_or_default()
            })
        });
        let component = Component::new(ty, Rc::new(Props::new().with("value", 1)), None, &root);
        component.render().unwrap();
        component.rendered();

        assert!(component.update(Rc::new(Props::new().with("value", 1))).is_none());
        assert_eq!(renders.get(), 1);

        let next = component.update(Rc::new(Props::new().with("value", 2)));
        assert_eq!(next, Some(JsxNode::from("2")));
        assert_eq!(renders.get(), 2);
    }

    #[test]
    fn memo_predicate_gates_props_updates() {
        let (root, _) = root_with_counter();
        let renders = Rc::new(Cell::new(0));
        let renders_clone = renders.clone();
        let ty = ComponentType::of(move |_props: PropsView| {
            let renders = renders_clone.clone();
            with_memo(
                |current: &Props, previous: &Props| current.str("label") == previous.str("label"),
                move || {
                    renders.set(renders.get() + 1);
                    JsxNode::Empty
                },
            )
        });
        let props = |label: &str, extra: i64| Rc::new(Props::new().with("label", label).with("extra", extra));
        let component = Component::new(ty, props("a", 0), None, &root);
        component.render().unwrap();
        component.rendered();

        assert!(component.update(props("a", 1)).is_none());
        assert_eq!(component.props().i64("extra"), Some(1));
        assert_eq!(renders.get(), 1);

        assert!(component.update(props("b", 1)).is_some());
        assert_eq!(renders.get(), 2);
    }

    #[test]
    fn lifecycle_hooks_run_in_order() {
        let (root, _) = root_with_counter();
        let log = Rc::new(RefCell::new(Vec::<String>::new()));
        let log_clone = log.clone();
        let ty = ComponentType::of(move |_props: PropsView| -> Result<Instance> {
            let log = log_clone.clone();
            let (l1, l2, l3, l4) = (log.clone(), log.clone(), log.clone(), log.clone());
            on_mounted(move || {
                l1.borrow_mut().push("mounted".into());
                let l = l1.clone();
                Cleanup::new(move || l.borrow_mut().push("mounted cleanup".into()))
            })?;
            on_updated(move || l2.borrow_mut().push("updated".into()))?;
            on_props_changed(move |new: &Props, old: &Props| {
                l3.borrow_mut().push(format!("props {:?} -> {:?}", old.i64("v"), new.i64("v")));
            })?;
            on_unmounted(move || l4.borrow_mut().push("unmounted".into()))?;
            Ok(Instance::new(|| JsxNode::Empty))
        });

        let component = Component::new(ty, Rc::new(Props::new().with("v", 1)), None, &root);
        component.render().unwrap();
        component.rendered();
        component.update(Rc::new(Props::new().with("v", 2)));
        component.rendered();
        component.destroy();
        component.destroy();

        assert_eq!(
            *log.borrow(),
            vec![
                "updated",
                "mounted",
                "props Some(1) -> Some(2)",
                "updated",
                "unmounted",
                "mounted cleanup",
            ]
        );
        assert!(component.is_destroyed());
        assert!(component.parent().is_none());
    }

    #[test]
    fn changes_recorded_after_the_pass_reach_the_parent_again() {
        let queue = MicrotaskQueue::new();
        let root = Component::new_root(
            ComponentType::of(blank),
            Rc::new(queue.clone()),
            None,
            Box::new(|| {}),
        );
        let parent = child_of(&root);
        let child = child_of(&parent);

        // The parent is mid-pass, so a change below it stops there.
        parent.changed.set(true);
        child.mark_as_dirtied();
        assert_eq!(parent.changed_children().len(), 1);
        assert!(!root.is_changed());

        parent.clear_changed_children();
        parent.mark_as_changed(Some(&child));
        parent.rendered();
        assert!(parent.is_changed());

        queue.run_until_idle();
        assert!(root.is_changed());
        assert!(Rc::ptr_eq(&root.changed_children()[0], &parent));
    }

    #[test]
    fn destroyed_components_ignore_writes() {
        let (root, notified) = root_with_counter();
        let child = child_of(&root);
        child.destroy();
        child.mark_as_dirtied();
        assert!(!child.is_dirty());
        assert_eq!(notified.get(), 0);
    }

    #[test]
    fn injection_walks_up_to_the_root_injector() {
        use crate::injector::{resolve, InjectionToken, ProviderTable};

        let app_token = InjectionToken::<&'static str>::new("app");
        let local_token = InjectionToken::<u32>::new("local");
        let table: Rc<dyn Injector> = Rc::new(ProviderTable::new().provide(&app_token, "from app"));
        let root = Component::new_root(
            ComponentType::of(blank),
            Rc::new(MicrotaskQueue::new()),
            Some(table),
            Box::new(|| {}),
        );
        let parent = child_of(&root);
        let child = child_of(&parent);
        parent.provide_value(local_token.id(), Rc::new(7u32));

        let child_ref: &dyn Injector = &*child;
        assert_eq!(resolve(child_ref, &local_token, InjectFlags::Default).as_deref(), Some(&7));
        assert_eq!(resolve(child_ref, &app_token, InjectFlags::Default).as_deref(), Some(&"from app"));
        assert!(resolve(child_ref, &local_token, InjectFlags::SelfOnly).is_none());
        let parent_ref: &dyn Injector = &*parent;
        assert!(resolve(parent_ref, &local_token, InjectFlags::SkipSelf).is_none());
    }
}
