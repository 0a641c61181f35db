//! Atom-Chain Reconciler
//!
//! The reconciler turns templates into native nodes and keeps them in sync
//! as components re-render. It owns the [`AtomArena`] holding the current
//! frame and talks to the platform only through a [`NativeRenderer`].
//!
//! # Diffing
//!
//! When a component produces a new template, the template is flattened into
//! a fresh atom chain and compared against the previous chain:
//!
//! 1. Every new atom is matched against the first remaining old atom with the
//!    same kind, tag or component function and key. Matched atoms are
//!    spliced out of the old chain, so each old atom is used at most once.
//! 2. Old atoms left over after matching are removed from the native tree
//!    and their components destroyed, before anything is inserted.
//! 3. The recorded commits run in template order. New atoms are built and
//!    inserted after the running cursor. Matched atoms are patched in place
//!    and only moved when they would otherwise end up out of order: when an
//!    ancestor moved, when an earlier node was appended at the root, or when
//!    their old position precedes the last node that stayed put.
//!
//! The move rule is positional, not offset based: a matched node keeps its
//! place as long as old indices keep increasing, and the first one that
//! goes backwards is moved behind the cursor. Matching stays a forward
//! first-match scan without a longest-increasing-subsequence pass, so the
//! final order is always the template order but the number of native moves
//! is not minimal for every permutation. Rotating a list right by one, for
//! instance, moves every node but the new head.
//!
//! # Incremental Updates
//!
//! A refresh starts at the root and only descends into components flagged
//! *changed*. A *dirty* component re-renders and diffs its own chain. The
//! cursor it ends on becomes the insertion point of the components that
//! follow it, which are retargeted so their next update inserts in the right
//! place.

use std::iter;
use std::mem;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{debug, debug_span, trace, warn};

use crate::atom::{Atom, AtomArena, AtomId, AtomKind, ComponentSlot};
use crate::component::{Component, ViewMetadata};
use crate::error::Result;
use crate::jsx::{JsxComponent, JsxElement};
use crate::native::{Namespace, NativeNode, NativeRenderer};
use crate::props::{class_to_string, style_to_map, PropValue};
use crate::refs::{DynamicRef, RefTarget};

/// Insertion cursor for a diff.
///
/// With `is_parent` set the next node goes first inside `host`; otherwise it
/// goes right after `host`.
#[derive(Clone, Debug)]
pub(crate) struct DiffContext {
    host: NativeNode,
    is_parent: bool,
    root_host: NativeNode,
    /// A node was appended to the root host during this pass.
    appended: bool,
}

impl DiffContext {
    fn root(host: NativeNode) -> Self {
        Self {
            root_host: host.clone(),
            host,
            is_parent: true,
            appended: false,
        }
    }

    fn inside(parent: &NativeNode, root_host: &NativeNode) -> Self {
        Self {
            host: parent.clone(),
            is_parent: true,
            root_host: root_host.clone(),
            appended: false,
        }
    }

    fn from_view(view: &ViewMetadata) -> Self {
        Self {
            host: view.host.clone(),
            is_parent: view.is_parent,
            root_host: view.root_host.clone(),
            appended: false,
        }
    }

    fn view(&self, atom: AtomId) -> ViewMetadata {
        ViewMetadata {
            atom,
            host: self.host.clone(),
            is_parent: self.is_parent,
            root_host: self.root_host.clone(),
        }
    }

    fn advance(&mut self, node: &NativeNode) {
        self.host = node.clone();
        self.is_parent = false;
    }
}

/// One step of a diff, recorded during matching and executed afterwards.
#[derive(Debug, Clone, Copy)]
enum Commit {
    Create(AtomId),
    Reuse { new: AtomId, old: AtomId },
}

pub(crate) struct Reconciler {
    arena: AtomArena,
    renderer: Rc<dyn NativeRenderer>,
}

impl Reconciler {
    pub(crate) fn new(renderer: Rc<dyn NativeRenderer>) -> Self {
        Self {
            arena: AtomArena::new(),
            renderer,
        }
    }

    pub(crate) fn arena(&self) -> &AtomArena {
        &self.arena
    }

    /// Build `root` and everything below it into `host`.
    pub(crate) fn mount(
        &mut self,
        root: &Rc<Component>,
        host: &NativeNode,
        namespace: Option<Namespace>,
    ) -> Result<()> {
        let span = debug_span!("mount", root = root.name());
        let _enter = span.enter();

        let id = self.arena.insert(Atom {
            kind: AtomKind::Component(ComponentSlot::Live(root.clone())),
            index: 0,
            key: None,
            native: None,
            namespace,
            child: None,
            sibling: None,
        });
        let mut ctx = DiffContext::root(host.clone());
        self.build_component(id, root, &mut ctx)?;
        debug!(atoms = self.arena.len(), "mounted");
        Ok(())
    }

    /// Bring the native tree up to date with every pending change below
    /// `root`.
    pub(crate) fn refresh(&mut self, root: &Rc<Component>) -> Result<()> {
        let span = debug_span!("render_pass", root = root.name());
        let _enter = span.enter();

        self.deep_update(root)?;
        debug!(atoms = self.arena.len(), "render pass finished");
        Ok(())
    }

    /// Tear down the whole tree below `root`, `root` included.
    pub(crate) fn unmount(&mut self, root: &Rc<Component>) {
        let Some(view) = root.view() else {
            root.destroy();
            return;
        };
        match self.arena.remove(view.atom) {
            Some(atom) => self.clean_atom(atom, true),
            None => root.destroy(),
        }
        debug!(atoms = self.arena.len(), "unmounted");
    }

    // ---- Incremental update ----

    fn deep_update(&mut self, component: &Rc<Component>) -> Result<()> {
        if component.is_destroyed() {
            warn!(component = component.name(), "refresh requested for a destroyed component");
            return Ok(());
        }
        if component.is_dirty() {
            let Some(view) = component.view() else {
                warn!(component = component.name(), "dirty component has no view");
                return Ok(());
            };
            trace!(component = component.name(), "re-render");
            if let Err(err) = self.rerender_in_place(component, &view) {
                self.discard_output(&view);
                component.requeue_changed_children(Vec::new());
                return Err(err);
            }
            component.rendered();
        } else if component.is_changed() || component.has_changed_children() {
            let mut pending = component.take_changed_children().into_iter();
            while let Some(child) = pending.next() {
                if let Err(err) = self.deep_update(&child) {
                    component.requeue_changed_children(iter::once(child).chain(pending).collect());
                    return Err(err);
                }
            }
            component.rendered();
        }
        Ok(())
    }

    fn rerender_in_place(&mut self, component: &Rc<Component>, view: &ViewMetadata) -> Result<()> {
        let mut ctx = DiffContext::from_view(view);
        self.apply_changes(component, &mut ctx, false)?;
        if component.portal_host().is_none() {
            self.retarget_following(component, &mut ctx)?;
        }
        Ok(())
    }

    /// Drop what a failed re-render left below `view`, so the next pass
    /// builds the component's output from scratch instead of matching
    /// half-built atoms.
    fn discard_output(&mut self, view: &ViewMetadata) {
        let Some(atom) = self.arena.try_get_mut(view.atom) else {
            return;
        };
        let head = atom.child.take();
        self.clean_chain(head, true);
    }

    /// Re-render `component` and diff its output against the old chain.
    fn apply_changes(
        &mut self,
        component: &Rc<Component>,
        ctx: &mut DiffContext,
        need_move: bool,
    ) -> Result<()> {
        let Some(view) = component.view() else {
            warn!(component = component.name(), "component has no view");
            return Ok(());
        };
        let Some(namespace) = self.arena.try_get(view.atom).map(|atom| atom.namespace) else {
            warn!(component = component.name(), "component view points at a freed atom");
            return Ok(());
        };

        component.clear_changed_children();
        let template = component.rerender();
        let head = self.arena.create_child_chain(&template, namespace);
        let old = mem::replace(&mut self.arena.get_mut(view.atom).child, head);

        match component.portal_host() {
            Some(host) => self.diff(head, old, &mut DiffContext::root(host), component, false),
            None => self.diff(head, old, ctx, component, need_move),
        }
    }

    /// Fix the insertion point of everything rendered after `component`.
    ///
    /// Normally only the components up to the next native node need a new
    /// cursor. When the re-render appended to the root host, the nodes that
    /// follow are moved behind it as well.
    fn retarget_following(
        &mut self,
        component: &Rc<Component>,
        ctx: &mut DiffContext,
    ) -> Result<()> {
        let mut current = component.clone();
        loop {
            let Some(view) = current.view() else {
                return Ok(());
            };
            let Some(next) = self.arena.try_get(view.atom).map(|atom| atom.sibling) else {
                return Ok(());
            };
            if ctx.appended {
                self.reuse_view(next, ctx, true)?;
            } else if self.retarget_chain(next, ctx) {
                return Ok(());
            }

            let Some(parent) = current.parent() else {
                return Ok(());
            };
            if parent.portal_host().is_some() {
                return Ok(());
            }
            let Some(parent_view) = parent.view() else {
                return Ok(());
            };
            let Some(parent_child) = self.arena.try_get(parent_view.atom).map(|atom| atom.child)
            else {
                return Ok(());
            };
            // Inside an element of the parent's output, the element bounds
            // the cursor.
            if !self.arena.chain_contains(parent_child, view.atom) {
                return Ok(());
            }
            current = parent;
        }
    }

    /// Retarget components until a native node is reached. Returns whether
    /// one was.
    fn retarget_chain(&self, head: Option<AtomId>, ctx: &DiffContext) -> bool {
        let mut cursor = head;
        while let Some(id) = cursor {
            let atom = self.arena.get(id);
            match atom.component() {
                Some(component) => {
                    component.retarget(&ctx.host, ctx.is_parent);
                    if component.portal_host().is_none() && self.retarget_chain(atom.child, ctx) {
                        return true;
                    }
                }
                None => return true,
            }
            cursor = atom.sibling;
        }
        false
    }

    // ---- Diff ----

    fn diff(
        &mut self,
        new_head: Option<AtomId>,
        old_head: Option<AtomId>,
        ctx: &mut DiffContext,
        owner: &Rc<Component>,
        need_move: bool,
    ) -> Result<()> {
        let mut commits: SmallVec<[Commit; 16]> = SmallVec::new();
        let mut old_head = old_head;
        let mut cursor = new_head;
        while let Some(new) = cursor {
            commits.push(match self.take_match(&mut old_head, new) {
                Some(old) => Commit::Reuse { new, old },
                None => Commit::Create(new),
            });
            cursor = self.arena.get(new).sibling;
        }

        self.clean_chain(old_head, true);

        let mut last_placed = 0;
        let mut pending = commits.into_iter();
        while let Some(commit) = pending.next() {
            let result = match commit {
                Commit::Create(id) => {
                    trace!(index = self.arena.get(id).index, "create");
                    self.build_atom(id, ctx, owner)
                }
                Commit::Reuse { new, old } => {
                    let old_index = self.arena.get(old).index;
                    let moved = need_move || ctx.appended || old_index < last_placed;
                    if !moved {
                        last_placed = old_index;
                    }
                    trace!(index = self.arena.get(new).index, old_index, moved, "reuse");
                    self.update_atom(new, old, ctx, owner, moved)
                }
            };
            if let Err(err) = result {
                // Matched atoms not reached yet are linked from neither chain.
                for commit in pending {
                    if let Commit::Reuse { old, .. } = commit {
                        if let Some(atom) = self.arena.remove(old) {
                            self.clean_atom(atom, true);
                        }
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Unlink and return the first atom of the old chain matching `new`.
    fn take_match(&mut self, old_head: &mut Option<AtomId>, new: AtomId) -> Option<AtomId> {
        let mut prev: Option<AtomId> = None;
        let mut cursor = *old_head;
        while let Some(id) = cursor {
            let next = self.arena.get(id).sibling;
            if self.arena.get(new).matches(self.arena.get(id)) {
                match prev {
                    Some(prev) => self.arena.get_mut(prev).sibling = next,
                    None => *old_head = next,
                }
                self.arena.get_mut(id).sibling = None;
                return Some(id);
            }
            prev = Some(id);
            cursor = next;
        }
        None
    }

    // ---- Building ----

    fn insert(&self, node: &NativeNode, ctx: &mut DiffContext, namespace: Option<Namespace>) {
        if ctx.is_parent {
            if ctx.host == ctx.root_host {
                self.renderer.append_child(&ctx.host, node, namespace);
                ctx.appended = true;
            } else {
                self.renderer.prepend_child(&ctx.host, node, namespace);
            }
        } else {
            self.renderer.insert_after(node, &ctx.host, namespace);
        }
        ctx.advance(node);
    }

    fn build_chain(
        &mut self,
        head: Option<AtomId>,
        ctx: &mut DiffContext,
        owner: &Rc<Component>,
    ) -> Result<()> {
        let mut cursor = head;
        while let Some(id) = cursor {
            self.build_atom(id, ctx, owner)?;
            cursor = self.arena.get(id).sibling;
        }
        Ok(())
    }

    fn build_atom(&mut self, id: AtomId, ctx: &mut DiffContext, owner: &Rc<Component>) -> Result<()> {
        let atom = self.arena.get(id);
        let namespace = atom.namespace;
        match atom.kind.clone() {
            AtomKind::Text(text) => {
                let node = self.renderer.create_text_node(&text, namespace);
                self.arena.get_mut(id).native = Some(node.clone());
                self.insert(&node, ctx, namespace);
                Ok(())
            }
            AtomKind::Element(el) => self.build_element(id, &el, ctx, owner),
            AtomKind::Component(ComponentSlot::Pending(jsx)) => {
                let component =
                    Component::new(jsx.ty.clone(), jsx.props.clone(), jsx.key.clone(), owner);
                self.arena.get_mut(id).kind =
                    AtomKind::Component(ComponentSlot::Live(component.clone()));
                self.build_component(id, &component, ctx)
            }
            AtomKind::Component(ComponentSlot::Live(component)) => {
                self.build_component(id, &component, ctx)
            }
        }
    }

    fn build_element(
        &mut self,
        id: AtomId,
        el: &Rc<JsxElement>,
        ctx: &mut DiffContext,
        owner: &Rc<Component>,
    ) -> Result<()> {
        let (namespace, child_namespace) = {
            let atom = self.arena.get(id);
            (atom.namespace, atom.child_namespace())
        };
        let node = self.renderer.create_element(&el.tag, namespace);
        for (key, value) in el.props.iter() {
            self.set_prop(&node, key, value, namespace);
        }
        self.arena.get_mut(id).native = Some(node.clone());

        if let Some(children) = el.props.children() {
            let head = self.arena.create_child_chain(children, child_namespace);
            self.arena.get_mut(id).child = head;
            let mut child_ctx = DiffContext::inside(&node, &ctx.root_host);
            self.build_chain(head, &mut child_ctx, owner)?;
        }

        self.insert(&node, ctx, namespace);
        let target = RefTarget::Node(node);
        for r in el.props.refs() {
            r.bind(&target);
        }
        Ok(())
    }

    fn build_component(
        &mut self,
        id: AtomId,
        component: &Rc<Component>,
        ctx: &mut DiffContext,
    ) -> Result<()> {
        trace!(component = component.name(), "build component");
        let namespace = self.arena.get(id).namespace;
        component.set_view(ctx.view(id));

        let template = component.render()?;
        let head = self.arena.create_child_chain(&template, namespace);
        self.arena.get_mut(id).child = head;
        match component.portal_host() {
            Some(host) => self.build_chain(head, &mut DiffContext::root(host), component)?,
            None => self.build_chain(head, ctx, component)?,
        }
        component.rendered();
        Ok(())
    }

    // ---- Updating ----

    fn update_atom(
        &mut self,
        id: AtomId,
        old: AtomId,
        ctx: &mut DiffContext,
        owner: &Rc<Component>,
        moved: bool,
    ) -> Result<()> {
        let Some(old) = self.arena.remove(old) else {
            warn!("matched atom was freed before its update");
            return self.build_atom(id, ctx, owner);
        };
        match self.arena.get(id).kind.clone() {
            AtomKind::Text(text) => self.update_text(id, &text, old, ctx, owner, moved),
            AtomKind::Element(el) => self.update_element(id, &el, old, ctx, owner, moved),
            AtomKind::Component(ComponentSlot::Pending(jsx)) => {
                self.update_component(id, &jsx, old, ctx, owner, moved)
            }
            AtomKind::Component(ComponentSlot::Live(component)) => {
                warn!(component = component.name(), "new atom already holds a live component");
                self.clean_atom(old, true);
                Ok(())
            }
        }
    }

    fn place(&self, node: &NativeNode, ctx: &mut DiffContext, namespace: Option<Namespace>, moved: bool) {
        if moved {
            self.insert(node, ctx, namespace);
        } else {
            ctx.advance(node);
        }
    }

    fn update_text(
        &mut self,
        id: AtomId,
        text: &str,
        old: Atom,
        ctx: &mut DiffContext,
        owner: &Rc<Component>,
        moved: bool,
    ) -> Result<()> {
        let Some(node) = old.native.clone() else {
            warn!("reused text atom has no native node, rebuilding");
            return self.build_atom(id, ctx, owner);
        };
        let namespace = self.arena.get(id).namespace;
        if let AtomKind::Text(previous) = &old.kind {
            if &**previous != text {
                self.renderer.sync_text_content(&node, text, namespace);
            }
        }
        self.arena.get_mut(id).native = Some(node.clone());
        self.place(&node, ctx, namespace, moved);
        Ok(())
    }

    fn update_element(
        &mut self,
        id: AtomId,
        el: &Rc<JsxElement>,
        old: Atom,
        ctx: &mut DiffContext,
        owner: &Rc<Component>,
        moved: bool,
    ) -> Result<()> {
        let (Some(node), AtomKind::Element(old_el)) = (old.native.clone(), &old.kind) else {
            warn!(tag = &*el.tag, "reused element atom has no native node, rebuilding");
            self.clean_chain(old.child, false);
            return self.build_atom(id, ctx, owner);
        };
        let (namespace, child_namespace) = {
            let atom = self.arena.get(id);
            (atom.namespace, atom.child_namespace())
        };
        self.arena.get_mut(id).native = Some(node.clone());
        self.place(&node, ctx, namespace, moved);

        let changes = el.props.changes_since(&old_el.props);
        for (key, value) in &changes.remove {
            self.remove_prop(&node, key, value, namespace);
        }
        for (key, value) in &changes.add {
            self.set_prop(&node, key, value, namespace);
        }
        for (key, value, previous) in &changes.replace {
            self.replace_prop(&node, key, value, previous, namespace);
        }
        sync_node_refs(old_el.props.refs(), el.props.refs(), &node);

        let mut child_ctx = DiffContext::inside(&node, &ctx.root_host);
        if el.props.get("children") != old_el.props.get("children") {
            let head = match el.props.children() {
                Some(children) => self.arena.create_child_chain(children, child_namespace),
                None => None,
            };
            self.arena.get_mut(id).child = head;
            self.diff(head, old.child, &mut child_ctx, owner, false)
        } else {
            self.arena.get_mut(id).child = old.child;
            self.reuse_view(old.child, &mut child_ctx, false)
        }
    }

    fn update_component(
        &mut self,
        id: AtomId,
        jsx: &Rc<JsxComponent>,
        old: Atom,
        ctx: &mut DiffContext,
        owner: &Rc<Component>,
        moved: bool,
    ) -> Result<()> {
        let Some(component) = old.component().cloned() else {
            warn!(component = jsx.ty.name(), "reused component atom was never instantiated");
            self.clean_atom(old, true);
            return self.build_atom(id, ctx, owner);
        };
        let namespace = self.arena.get(id).namespace;
        self.arena.get_mut(id).kind = AtomKind::Component(ComponentSlot::Live(component.clone()));
        component.set_view(ctx.view(id));

        let was_changed = component.is_changed();
        component.clear_changed_children();
        let portal = component.portal_host();

        match component.update(jsx.props.clone()) {
            None => {
                self.arena.get_mut(id).child = old.child;
                match portal {
                    Some(host) => self.reuse_view(old.child, &mut DiffContext::root(host), false)?,
                    None => self.reuse_view(old.child, ctx, moved)?,
                }
                if was_changed {
                    component.rendered();
                }
            }
            Some(template) => {
                trace!(component = component.name(), "re-render from props");
                let head = self.arena.create_child_chain(&template, namespace);
                self.arena.get_mut(id).child = head;
                match portal {
                    Some(host) => {
                        self.diff(head, old.child, &mut DiffContext::root(host), &component, false)?
                    }
                    None => self.diff(head, old.child, ctx, &component, moved)?,
                }
                component.rendered();
            }
        }
        Ok(())
    }

    /// Walk a chain that keeps its structure: advance the cursor over it,
    /// move nodes if asked, and bring stale components up to date.
    fn reuse_view(&mut self, head: Option<AtomId>, ctx: &mut DiffContext, moved: bool) -> Result<()> {
        let mut cursor = head;
        while let Some(id) = cursor {
            let atom = self.arena.get(id);
            let (next, child, namespace) = (atom.sibling, atom.child, atom.namespace);
            match atom.kind.clone() {
                AtomKind::Text(_) | AtomKind::Element(_) => {
                    let is_element = matches!(atom.kind, AtomKind::Element(_));
                    match atom.native.clone() {
                        Some(node) => {
                            self.place(&node, ctx, namespace, moved);
                            if is_element {
                                let mut child_ctx = DiffContext::inside(&node, &ctx.root_host);
                                self.reuse_view(child, &mut child_ctx, false)?;
                            }
                        }
                        None => warn!("rendered atom has no native node"),
                    }
                }
                AtomKind::Component(ComponentSlot::Live(component)) => {
                    self.reuse_component(id, &component, ctx, moved)?;
                }
                AtomKind::Component(ComponentSlot::Pending(jsx)) => {
                    warn!(component = jsx.ty.name(), "rendered chain holds an uninstantiated component");
                }
            }
            cursor = next;
        }
        Ok(())
    }

    fn reuse_component(
        &mut self,
        id: AtomId,
        component: &Rc<Component>,
        ctx: &mut DiffContext,
        moved: bool,
    ) -> Result<()> {
        component.set_view(ctx.view(id));
        if component.is_dirty() {
            self.apply_changes(component, ctx, moved)?;
            component.rendered();
            return Ok(());
        }

        let child = self.arena.get(id).child;
        let changed = component.is_changed();
        if changed {
            component.clear_changed_children();
        }
        match component.portal_host() {
            Some(host) if changed => {
                self.reuse_view(child, &mut DiffContext::root(host), false)?;
            }
            Some(_) => {}
            None => self.reuse_view(child, ctx, moved)?,
        }
        if changed {
            component.rendered();
        }
        Ok(())
    }

    // ---- Props ----

    fn set_prop(&self, node: &NativeNode, key: &str, value: &PropValue, namespace: Option<Namespace>) {
        match key {
            "children" | "ref" => {}
            "class" => {
                let class = value.as_value().map(class_to_string).unwrap_or_default();
                self.renderer.set_class(node, &class, namespace);
            }
            "style" => {
                if let Some(style) = value.as_value() {
                    for (name, value) in style_to_map(style) {
                        self.renderer.set_style(node, &name, &value, namespace);
                    }
                }
            }
            _ => match listener_event(key, value) {
                Some(event) => {
                    if let PropValue::Listener(listener) = value {
                        self.renderer.listen(node, &event, listener, namespace);
                    }
                }
                None => self.renderer.set_property(node, key, value, namespace),
            },
        }
    }

    fn remove_prop(&self, node: &NativeNode, key: &str, value: &PropValue, namespace: Option<Namespace>) {
        match key {
            "children" | "ref" => {}
            "class" => self.renderer.set_class(node, "", namespace),
            "style" => {
                if let Some(style) = value.as_value() {
                    for name in style_to_map(style).keys() {
                        self.renderer.remove_style(node, name, namespace);
                    }
                }
            }
            _ => match (listener_event(key, value), value) {
                (Some(event), PropValue::Listener(listener)) => {
                    self.renderer.un_listen(node, &event, listener, namespace);
                }
                _ => self.renderer.remove_property(node, key, namespace),
            },
        }
    }

    fn replace_prop(
        &self,
        node: &NativeNode,
        key: &str,
        value: &PropValue,
        previous: &PropValue,
        namespace: Option<Namespace>,
    ) {
        match key {
            "children" | "ref" => {}
            "class" => {
                let class = value.as_value().map(class_to_string).unwrap_or_default();
                let old_class = previous.as_value().map(class_to_string).unwrap_or_default();
                if class != old_class {
                    self.renderer.set_class(node, &class, namespace);
                }
            }
            "style" => {
                let styles = value.as_value().map(style_to_map).unwrap_or_default();
                let old_styles = previous.as_value().map(style_to_map).unwrap_or_default();
                for name in old_styles.keys() {
                    if !styles.contains_key(name) {
                        self.renderer.remove_style(node, name, namespace);
                    }
                }
                for (name, style) in &styles {
                    if old_styles.get(name) != Some(style) {
                        self.renderer.set_style(node, name, style, namespace);
                    }
                }
            }
            _ => {
                match (listener_event(key, previous), previous) {
                    (Some(event), PropValue::Listener(listener)) => {
                        self.renderer.un_listen(node, &event, listener, namespace);
                    }
                    _ if listener_event(key, value).is_some() => {
                        self.renderer.remove_property(node, key, namespace);
                    }
                    _ => {}
                }
                self.set_prop(node, key, value, namespace);
            }
        }
    }

    // ---- Removal ----

    fn clean_chain(&mut self, head: Option<AtomId>, need_clean: bool) {
        let mut cursor = head;
        while let Some(id) = cursor {
            let Some(atom) = self.arena.remove(id) else {
                warn!("chain links to a freed atom");
                return;
            };
            cursor = atom.sibling;
            self.clean_atom(atom, need_clean);
        }
    }

    /// Remove an unlinked atom and everything below it. Only the topmost
    /// native node is detached; its descendants go with it.
    fn clean_atom(&mut self, atom: Atom, need_clean: bool) {
        match &atom.kind {
            AtomKind::Text(_) => {
                if let (true, Some(node)) = (need_clean, &atom.native) {
                    self.renderer.remove(node, atom.namespace);
                }
            }
            AtomKind::Element(el) => {
                if let Some(node) = &atom.native {
                    let target = RefTarget::Node(node.clone());
                    for r in el.props.refs() {
                        r.unbind(&target);
                    }
                    if need_clean {
                        self.renderer.remove(node, atom.namespace);
                    }
                }
                self.clean_chain(atom.child, false);
            }
            AtomKind::Component(ComponentSlot::Live(component)) => {
                let need_clean = need_clean || component.portal_host().is_some();
                self.clean_chain(atom.child, need_clean);
                component.destroy();
            }
            AtomKind::Component(ComponentSlot::Pending(_)) => {
                self.clean_chain(atom.child, need_clean);
            }
        }
    }
}

/// Event name for an `onXxx` listener prop, lowercased the way DOM events
/// are named: `onClick` is `click`, `onKeyDown` is `keydown`.
fn listener_event(key: &str, value: &PropValue) -> Option<String> {
    if !matches!(value, PropValue::Listener(_)) {
        return None;
    }
    let rest = key.strip_prefix("on")?;
    if !rest.starts_with(|c: char| c.is_ascii_uppercase()) {
        return None;
    }
    Some(rest.to_ascii_lowercase())
}

fn sync_node_refs(old: &[DynamicRef], new: &[DynamicRef], node: &NativeNode) {
    let target = RefTarget::Node(node.clone());
    for r in old {
        if !new.contains(r) {
            r.unbind(&target);
        }
    }
    for r in new {
        if !old.contains(r) {
            r.bind(&target);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
