//! Atom Chains
//!
//! One rendered frame is stored as a tree of atoms. Each atom is a Text,
//! Element or Component node with two links: `child` (first nested atom) and
//! `sibling` (next atom at the same level). A parent's children are a singly
//! linked chain, so the reconciler can splice matched atoms out of the old
//! chain in O(1).
//!
//! # Storage
//!
//! Atoms live in an [`AtomArena`] and are addressed by [`AtomId`]s. Freed
//! slots go on a free list and are recycled by the next build, so frequent
//! re-renders do not grow the arena. Each slot carries a generation counter;
//! an id taken before its slot was recycled no longer resolves.
//!
//! # Building
//!
//! [`AtomArena::create_child_chain`] flattens a template into a chain:
//! lists are flattened recursively, empty values emit nothing, and every
//! emitted atom gets the next ascending `index`. `svg` and `math` elements
//! switch namespace for themselves and their descendants; the children of
//! `foreignObject` go back to no namespace.

use std::any::TypeId;
use std::rc::Rc;

use crate::component::Component;
use crate::jsx::{JsxComponent, JsxElement, JsxNode, Key};
use crate::native::{Namespace, NativeNode};

/// Handle to an atom stored in an [`AtomArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomId {
    index: u32,
    generation: u32,
}

/// A component atom, before and after instantiation.
#[derive(Clone)]
pub(crate) enum ComponentSlot {
    Pending(Rc<JsxComponent>),
    Live(Rc<Component>),
}

#[derive(Clone)]
pub(crate) enum AtomKind {
    Text(Rc<str>),
    Element(Rc<JsxElement>),
    Component(ComponentSlot),
}

/// What two atoms must share to be matched by the reconciler.
#[derive(PartialEq)]
enum Identity<'a> {
    Text,
    Element(&'a str),
    Component(TypeId),
}

pub(crate) struct Atom {
    pub(crate) kind: AtomKind,
    pub(crate) index: usize,
    pub(crate) key: Option<Key>,
    pub(crate) native: Option<NativeNode>,
    pub(crate) namespace: Option<Namespace>,
    pub(crate) child: Option<AtomId>,
    pub(crate) sibling: Option<AtomId>,
}

impl Atom {
    fn identity(&self) -> Identity<'_> {
        match &self.kind {
            AtomKind::Text(_) => Identity::Text,
            AtomKind::Element(el) => Identity::Element(&el.tag),
            AtomKind::Component(ComponentSlot::Pending(jsx)) => Identity::Component(jsx.ty.id()),
            AtomKind::Component(ComponentSlot::Live(c)) => Identity::Component(c.ty().id()),
        }
    }

    /// Same kind, same tag or component function, same key.
    pub(crate) fn matches(&self, other: &Atom) -> bool {
        self.key == other.key && self.identity() == other.identity()
    }

    /// Namespace for this atom's children.
    pub(crate) fn child_namespace(&self) -> Option<Namespace> {
        match &self.kind {
            AtomKind::Element(el) if &*el.tag == "foreignObject" => None,
            _ => self.namespace,
        }
    }

    pub(crate) fn component(&self) -> Option<&Rc<Component>> {
        match &self.kind {
            AtomKind::Component(ComponentSlot::Live(component)) => Some(component),
            _ => None,
        }
    }
}

struct Slot {
    generation: u32,
    atom: Option<Atom>,
}

/// Slab of atoms with free-list recycling.
#[derive(Default)]
pub struct AtomArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl AtomArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live atoms.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots ever allocated.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn contains(&self, id: AtomId) -> bool {
        self.try_get(id).is_some()
    }

    pub(crate) fn insert(&mut self, atom: Atom) -> AtomId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.atom = Some(atom);
            return AtomId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            atom: Some(atom),
        });
        AtomId {
            index,
            generation: 0,
        }
    }

    /// Free an atom and hand it back.
    pub(crate) fn remove(&mut self, id: AtomId) -> Option<Atom> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let atom = slot.atom.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(atom)
    }

    pub(crate) fn try_get(&self, id: AtomId) -> Option<&Atom> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.atom.as_ref())
    }

    pub(crate) fn try_get_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.atom.as_mut())
    }

    /// Resolve a live id.
    ///
    /// # Panics
    ///
    /// Panics if the atom was freed; ids held by the reconciler are always
    /// live.
    pub(crate) fn get(&self, id: AtomId) -> &Atom {
        match self.try_get(id) {
            Some(atom) => atom,
            None => panic!("stale atom id {id:?}"),
        }
    }

    pub(crate) fn get_mut(&mut self, id: AtomId) -> &mut Atom {
        match self.try_get_mut(id) {
            Some(atom) => atom,
            None => panic!("stale atom id {id:?}"),
        }
    }

    /// Ids of a chain, head first.
    pub(crate) fn chain(&self, head: Option<AtomId>) -> Vec<AtomId> {
        let mut ids = Vec::new();
        let mut cursor = head;
        while let Some(id) = cursor {
            ids.push(id);
            cursor = self.get(id).sibling;
        }
        ids
    }

    pub(crate) fn chain_contains(&self, head: Option<AtomId>, target: AtomId) -> bool {
        let mut cursor = head;
        while let Some(id) = cursor {
            if id == target {
                return true;
            }
            cursor = self.get(id).sibling;
        }
        false
    }

    /// Turn a template into a fresh chain and return its head.
    pub(crate) fn create_child_chain(
        &mut self,
        template: &JsxNode,
        namespace: Option<Namespace>,
    ) -> Option<AtomId> {
        let mut builder = ChainBuilder {
            arena: self,
            namespace,
            head: None,
            tail: None,
            next_index: 0,
        };
        builder.push(template);
        builder.head
    }
}

struct ChainBuilder<'a> {
    arena: &'a mut AtomArena,
    namespace: Option<Namespace>,
    head: Option<AtomId>,
    tail: Option<AtomId>,
    next_index: usize,
}

impl ChainBuilder<'_> {
    fn push(&mut self, node: &JsxNode) {
        match node {
            JsxNode::Empty => {}
            JsxNode::List(items) => {
                for item in items.iter() {
                    self.push(item);
                }
            }
            JsxNode::Text(text) => {
                self.link(AtomKind::Text(text.clone()), None, self.namespace);
            }
            JsxNode::Element(el) => {
                let namespace = Namespace::for_tag(&el.tag).or(self.namespace);
                self.link(AtomKind::Element(el.clone()), el.key.clone(), namespace);
            }
            JsxNode::Component(jsx) => {
                self.link(
                    AtomKind::Component(ComponentSlot::Pending(jsx.clone())),
                    jsx.key.clone(),
                    self.namespace,
                );
            }
        }
    }

    fn link(&mut self, kind: AtomKind, key: Option<Key>, namespace: Option<Namespace>) {
        let id = self.arena.insert(Atom {
            kind,
            index: self.next_index,
            key,
            native: None,
            namespace,
            child: None,
            sibling: None,
        });
        self.next_index += 1;
        match self.tail {
            Some(tail) => self.arena.get_mut(tail).sibling = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
