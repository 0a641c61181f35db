//! Dependency Injection
//!
//! Values are registered under typed [`InjectionToken`]s and resolved through
//! a chain of [`Injector`]s. Components are injector nodes themselves: a
//! lookup starts at the asking component, walks up its ancestors and finally
//! reaches the application's injector.
//!
//! [`ProviderTable`] is a plain injector with explicit registration. It holds
//! ready values and lazily evaluated factories, and may delegate misses to a
//! parent.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an injection token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(u64);

/// A typed key for injected values.
pub struct InjectionToken<T> {
    id: TokenId,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> InjectionToken<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            id: TokenId(NEXT_TOKEN_ID.fetch_add(1, Ordering::Relaxed)),
            name,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> TokenId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for InjectionToken<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for InjectionToken<T> {}

impl<T> fmt::Debug for InjectionToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InjectionToken({})", self.name)
    }
}

/// How far a lookup may travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InjectFlags {
    /// This node, then its ancestors.
    #[default]
    Default,
    /// This node only.
    SelfOnly,
    /// Ancestors only.
    SkipSelf,
    /// Like `Default`, but a miss is not an error.
    Optional,
}

/// Resolves token ids to shared values.
pub trait Injector {
    fn get(&self, token: TokenId, flags: InjectFlags) -> Option<Rc<dyn Any>>;
}

/// Typed lookup on top of [`Injector::get`].
pub fn resolve<T: 'static>(
    injector: &dyn Injector,
    token: &InjectionToken<T>,
    flags: InjectFlags,
) -> Option<Rc<T>> {
    injector
        .get(token.id(), flags)
        .and_then(|value| value.downcast::<T>().ok())
}

type Factory = Box<dyn Fn(&ProviderTable) -> Rc<dyn Any>>;

/// An explicit-registration injector.
#[derive(Default)]
pub struct ProviderTable {
    values: RefCell<HashMap<TokenId, Rc<dyn Any>>>,
    factories: HashMap<TokenId, Factory>,
    parent: Option<Rc<dyn Injector>>,
}

impl ProviderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delegate misses to `parent`.
    pub fn with_parent(mut self, parent: Rc<dyn Injector>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Register a ready value.
    pub fn provide<T: 'static>(self, token: &InjectionToken<T>, value: T) -> Self {
        self.values.borrow_mut().insert(token.id(), Rc::new(value));
        self
    }

    /// Register a factory, evaluated on first lookup and cached.
    ///
    /// The factory may resolve other tokens through the table it is given.
    pub fn provide_factory<T, F>(mut self, token: &InjectionToken<T>, factory: F) -> Self
    where
        T: 'static,
        F: Fn(&ProviderTable) -> T + 'static,
    {
        self.factories.insert(
            token.id(),
            Box::new(move |table| Rc::new(factory(table)) as Rc<dyn Any>),
        );
        self
    }

    /// Create a child table that falls back to this one.
    pub fn child(self: &Rc<Self>) -> ProviderTable {
        ProviderTable::new().with_parent(self.clone())
    }

    fn get_own(&self, token: TokenId) -> Option<Rc<dyn Any>> {
        if let Some(value) = self.values.borrow().get(&token) {
            return Some(value.clone());
        }
        let factory = self.factories.get(&token)?;
        let value = factory(self);
        self.values.borrow_mut().insert(token, value.clone());
        Some(value)
    }
}

impl Injector for ProviderTable {
    fn get(&self, token: TokenId, flags: InjectFlags) -> Option<Rc<dyn Any>> {
        if flags != InjectFlags::SkipSelf {
            if let Some(value) = self.get_own(token) {
                return Some(value);
            }
        }
        if flags == InjectFlags::SelfOnly {
            return None;
        }
        self.parent.as_ref()?.get(token, InjectFlags::Default)
    }
}

impl fmt::Debug for ProviderTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderTable")
            .field("values", &self.values.borrow().len())
            .field("factories", &self.factories.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn values_resolve_by_token() {
        let name = InjectionToken::<String>::new("name");
        let port = InjectionToken::<u16>::new("port");
        let table = ProviderTable::new()
            .provide(&name, "trellis".to_string())
            .provide(&port, 8080);

        assert_eq!(
            resolve(&table, &name, InjectFlags::Default).as_deref(),
            Some(&"trellis".to_string())
        );
        assert_eq!(resolve(&table, &port, InjectFlags::Default).as_deref(), Some(&8080));
    }

    #[test]
    fn factories_are_lazy_and_cached() {
        let base = InjectionToken::<u32>::new("base");
        let doubled = InjectionToken::<u32>::new("doubled");
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();

        let table = ProviderTable::new().provide(&base, 21).provide_factory(&doubled, move |t| {
            calls_clone.set(calls_clone.get() + 1);
            resolve(t, &base, InjectFlags::Default).map_or(0, |v| *v * 2)
        });

        assert_eq!(calls.get(), 0);
        assert_eq!(resolve(&table, &doubled, InjectFlags::Default).as_deref(), Some(&42));
        assert_eq!(resolve(&table, &doubled, InjectFlags::Default).as_deref(), Some(&42));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn flags_control_the_walk() {
        let token = InjectionToken::<&'static str>::new("where");
        let parent = Rc::new(ProviderTable::new().provide(&token, "parent"));
        let child = parent.child().provide(&token, "child");
        let empty_child = parent.child();

        assert_eq!(resolve(&child, &token, InjectFlags::Default).as_deref(), Some(&"child"));
        assert_eq!(resolve(&child, &token, InjectFlags::SkipSelf).as_deref(), Some(&"parent"));
        assert_eq!(resolve(&empty_child, &token, InjectFlags::Default).as_deref(), Some(&"parent"));
        assert!(resolve(&empty_child, &token, InjectFlags::SelfOnly).is_none());
    }

    #[test]
    fn wrong_type_does_not_resolve() {
        let token = InjectionToken::<u8>::new("byte");
        let table = ProviderTable::new().provide(&token, 1u8);
        let alias = InjectionToken::<u16> {
            id: token.id(),
            name: "alias",
            _marker: PhantomData,
        };
        assert!(resolve(&table, &alias, InjectFlags::Default).is_none());
    }
}
