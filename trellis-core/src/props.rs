//! Props and Change Detection
//!
//! Props are an ordered map from string keys to [`PropValue`]s. The same
//! map type is used for element attributes and for component inputs.
//!
//! # Reserved Keys
//!
//! - `children`: nested template ([`PropValue::Children`])
//! - `ref`: one or more [`DynamicRef`]s bound to the node or component
//! - `class`: string, array or object form, normalised by [`class_to_string`]
//! - `style`: string (`"a: b; c: d"`) or object form, see [`style_to_map`]
//! - `on[A-Z]...`: event listeners ([`PropValue::Listener`])
//!
//! # Change Sets
//!
//! [`get_object_changes`] compares two maps key by key and reports the
//! additions, removals and replacements. Applying a change set to the old map
//! (removes, then adds, then replaces) reconstructs the new one.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jsx::JsxNode;
use crate::refs::{DynamicRef, StaticRef};

/// An event handler. Receives the platform event payload.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&dyn Any)>);

impl Listener {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&dyn Any) + 'static,
    {
        Self(Rc::new(handler))
    }

    /// Invoke the handler with an event payload.
    pub fn call(&self, event: &dyn Any) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Listener) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Listener")
    }
}

/// A single prop value.
///
/// Plain data compares by value; handlers, refs, children and opaque values
/// compare by identity.
#[derive(Clone)]
pub enum PropValue {
    Value(Value),
    Children(JsxNode),
    Listener(Listener),
    Ref(Rc<Vec<DynamicRef>>),
    Any(Rc<dyn Any>),
}

impl PropValue {
    /// Wrap an arbitrary value, compared by identity.
    pub fn any<T: Any>(value: T) -> Self {
        Self::Any(Rc::new(value))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_listener(&self) -> Option<&Listener> {
        match self {
            Self::Listener(listener) => Some(listener),
            _ => None,
        }
    }

    pub fn as_children(&self) -> Option<&JsxNode> {
        match self {
            Self::Children(node) => Some(node),
            _ => None,
        }
    }

    /// Refs carried by a `ref` prop; empty for any other value.
    pub fn refs(&self) -> &[DynamicRef] {
        match self {
            Self::Ref(refs) => refs.as_slice(),
            _ => &[],
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Any(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Children(a), Self::Children(b)) => a == b,
            (Self::Listener(a), Self::Listener(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => Rc::ptr_eq(a, b),
            (Self::Any(a), Self::Any(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value}"),
            Self::Children(node) => f.debug_tuple("Children").field(node).finish(),
            Self::Listener(_) => f.write_str("Listener"),
            Self::Ref(refs) => write!(f, "Ref({})", refs.len()),
            Self::Any(_) => f.write_str("Any"),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PropValue {
                fn from(value: $ty) -> Self {
                    Self::Value(Value::from(value))
                }
            }
        )*
    };
}

value_from!(&str, String, bool, i32, i64, u32, u64, usize, f64);

impl From<Value> for PropValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<JsxNode> for PropValue {
    fn from(node: JsxNode) -> Self {
        Self::Children(node)
    }
}

impl From<Listener> for PropValue {
    fn from(listener: Listener) -> Self {
        Self::Listener(listener)
    }
}

impl From<DynamicRef> for PropValue {
    fn from(r: DynamicRef) -> Self {
        Self::Ref(Rc::new(vec![r]))
    }
}

impl From<&StaticRef> for PropValue {
    fn from(r: &StaticRef) -> Self {
        Self::Ref(Rc::new(vec![r.as_dynamic().clone()]))
    }
}

impl From<Vec<DynamicRef>> for PropValue {
    fn from(refs: Vec<DynamicRef>) -> Self {
        Self::Ref(Rc::new(refs))
    }
}

/// An ordered, immutable-once-shared prop map.
///
/// Components only ever see props through a shared reference, so a body
/// cannot write to its own inputs.
#[derive(Clone, Default, PartialEq)]
pub struct Props {
    entries: IndexMap<String, PropValue>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Plain data value under `key`.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.get(key).and_then(PropValue::as_value)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.value(key).and_then(Value::as_str)
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.value(key).and_then(Value::as_i64)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.value(key).and_then(Value::as_f64)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.value(key).and_then(Value::as_bool)
    }

    /// The nested template passed under `children`.
    pub fn children(&self) -> Option<&JsxNode> {
        self.get("children").and_then(PropValue::as_children)
    }

    /// Refs passed under `ref`.
    pub fn refs(&self) -> &[DynamicRef] {
        self.get("ref").map(PropValue::refs).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &IndexMap<String, PropValue> {
        &self.entries
    }

    /// Change set turning `old` into `self`.
    pub fn changes_since(&self, old: &Props) -> ObjectChanges<PropValue> {
        get_object_changes(&self.entries, &old.entries)
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<PropValue>> FromIterator<(K, V)> for Props {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Props::new();
        for (key, value) in iter {
            props.insert(key, value);
        }
        props
    }
}

/// Key-level differences between two maps.
///
/// `replace` entries carry `(key, new, old)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectChanges<V> {
    pub add: Vec<(String, V)>,
    pub remove: Vec<(String, V)>,
    pub replace: Vec<(String, V, V)>,
}

impl<V> Default for ObjectChanges<V> {
    fn default() -> Self {
        Self {
            add: Vec::new(),
            remove: Vec::new(),
            replace: Vec::new(),
        }
    }
}

impl<V> ObjectChanges<V> {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.replace.is_empty()
    }

    /// Number of keys touched.
    pub fn len(&self) -> usize {
        self.add.len() + self.remove.len() + self.replace.len()
    }
}

impl<V: Clone> ObjectChanges<V> {
    /// Rebuild the new map from `old`: removes, then adds, then replaces.
    pub fn apply(&self, old: &IndexMap<String, V>) -> IndexMap<String, V> {
        let mut next = old.clone();
        for (key, _) in &self.remove {
            next.shift_remove(key);
        }
        for (key, value) in &self.add {
            next.insert(key.clone(), value.clone());
        }
        for (key, value, _) in &self.replace {
            next.insert(key.clone(), value.clone());
        }
        next
    }
}

impl<V: Serialize> ObjectChanges<V> {
    /// Compact MessagePack encoding of the change set.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(self)
    }
}

impl<V: for<'de> Deserialize<'de>> ObjectChanges<V> {
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

/// Compare `new` against `old`.
pub fn get_object_changes<V>(
    new: &IndexMap<String, V>,
    old: &IndexMap<String, V>,
) -> ObjectChanges<V>
where
    V: Clone + PartialEq,
{
    let mut changes = ObjectChanges::default();

    for (key, old_value) in old {
        match new.get(key) {
            None => changes.remove.push((key.clone(), old_value.clone())),
            Some(new_value) if new_value != old_value => {
                changes
                    .replace
                    .push((key.clone(), new_value.clone(), old_value.clone()));
            }
            Some(_) => {}
        }
    }

    for (key, new_value) in new {
        if !old.contains_key(key) {
            changes.add.push((key.clone(), new_value.clone()));
        }
    }

    changes
}

/// Flatten a `class` prop into a space separated class list.
///
/// Strings are used as-is, arrays are flattened recursively, objects
/// contribute the keys whose values are truthy.
pub fn class_to_string(value: &Value) -> String {
    let mut classes = Vec::new();
    collect_classes(value, &mut classes);
    classes.join(" ")
}

fn collect_classes(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            out.extend(s.split_whitespace().map(str::to_owned));
        }
        Value::Array(items) => {
            for item in items {
                collect_classes(item, out);
            }
        }
        Value::Object(map) => {
            for (name, enabled) in map {
                if is_truthy(enabled) {
                    out.push(name.clone());
                }
            }
        }
        _ => {}
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|n| n != 0.0 && !n.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Normalise a `style` prop into a property map.
///
/// Accepts `"color: red; font-size: 12px"` strings and objects; anything
/// else yields an empty map.
pub fn style_to_map(value: &Value) -> IndexMap<String, Value> {
    let mut styles = IndexMap::new();
    match value {
        Value::String(s) => {
            for declaration in s.split(';') {
                let Some((name, value)) = declaration.split_once(':') else {
                    continue;
                };
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                styles.insert(name.to_owned(), Value::String(value.trim().to_owned()));
            }
        }
        Value::Object(map) => {
            for (name, value) in map {
                if !value.is_null() {
                    styles.insert(name.clone(), value.clone());
                }
            }
        }
        _ => {}
    }
    styles
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
