//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a tracking scope (component render,
//!    computed, effect), the signal registers that scope as a subscriber.
//!    Reading twice in the same scope still registers exactly once.
//!
//! 2. When a signal is written with a value equal to the current one,
//!    nothing happens.
//!
//! 3. Otherwise every registered subscriber is notified synchronously, in
//!    subscription order. Notification iterates over a snapshot, so
//!    subscribers may unsubscribe (or subscribe) while being notified.
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A unique ID (8 bytes)
//! - The value, behind a `RefCell`
//! - An ordered table of subscriber notifiers

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::scope::{Dependency, Source};
use super::SubscriberId;

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
pub(crate) fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

struct SignalInner<T> {
    id: u64,
    value: RefCell<T>,
    subscribers: RefCell<IndexMap<SubscriberId, Rc<dyn Fn()>>>,
}

impl<T> Source for SignalInner<T> {
    fn unsubscribe(&self, subscriber: SubscriberId) {
        self.subscribers.borrow_mut().shift_remove(&subscriber);
    }
}

/// A reactive signal holding a value of type T.
///
/// Clones share the same value and subscriber table.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: next_signal_id(),
                value: RefCell::new(value),
                subscribers: RefCell::new(IndexMap::new()),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a tracking scope, this also registers the current
    /// computation as a subscriber.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.track();
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value without tracking dependencies.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Set a new value and notify subscribers.
    ///
    /// Writing a value equal to the current one is a no-op.
    pub fn set(&self, value: T)
    where
        T: PartialEq,
    {
        {
            let mut guard = self.inner.value.borrow_mut();
            if *guard == value {
                return;
            }
            *guard = value;
        }

        self.notify();
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
        T: PartialEq,
    {
        let new_value = f(&self.inner.value.borrow());
        self.set(new_value);
    }

    /// Mutate the value in place. Always notifies.
    pub fn modify<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        f(&mut self.inner.value.borrow_mut());
        self.notify();
    }

    /// Notify all subscribers that the value has changed.
    pub fn notify(&self) {
        let snapshot: SmallVec<[Rc<dyn Fn()>; 4]> =
            self.inner.subscribers.borrow().values().cloned().collect();
        for notify in snapshot {
            notify();
        }
    }

    /// Register a notification callback for a subscriber.
    ///
    /// Subscribing an ID that is already registered keeps its original
    /// position in the notification order.
    pub fn subscribe<F>(&self, subscriber_id: SubscriberId, notify: F)
    where
        F: Fn() + 'static,
    {
        self.inner
            .subscribers
            .borrow_mut()
            .entry(subscriber_id)
            .or_insert_with(|| Rc::new(notify));
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, subscriber_id: SubscriberId) {
        self.inner.unsubscribe(subscriber_id);
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    fn track(&self) {
        let Some(subscriber) = ReactiveContext::current_subscriber() else {
            return;
        };
        let source: Weak<dyn Source> = Rc::downgrade(&self.inner) as Weak<dyn Source>;
        if ReactiveContext::track_dependency(Dependency::new(self.inner.id, source)) {
            self.inner
                .subscribers
                .borrow_mut()
                .entry(subscriber.id())
                .or_insert_with(|| subscriber.notifier());
        }
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Create a signal. Usable anywhere, inside or outside components.
pub fn create_signal<T: 'static>(value: T) -> Signal<T> {
    Signal::new(value)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
