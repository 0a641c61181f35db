//! Computed Implementation
//!
//! A Computed is a derived value that re-runs its producer whenever one of
//! the signals it read last time changes, and stores the result in its own
//! signal.
//!
//! # How Computeds Work
//!
//! 1. On creation, the producer runs inside a fresh tracking scope and the
//!    result seeds the backing signal.
//!
//! 2. When any recorded dependency fires, the producer runs again inside the
//!    same scope, which drops the old dependency set first. Dependencies are
//!    dynamic: only the reads made by the latest run are watched.
//!
//! 3. The result is written into the backing signal. Because signal writes
//!    ignore equal values, readers of the computed are only notified when the
//!    derived value actually changed.
//!
//! A recursion guard stops a producer that indirectly writes one of its own
//! dependencies from recomputing re-entrantly.

use std::cell::Cell;
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use super::scope::ReactiveScope;
use super::signal::Signal;
use crate::hooks;

struct ComputedInner<T: 'static> {
    producer: Box<dyn Fn() -> T>,
    signal: Signal<T>,
    scope: ReactiveScope,
    recomputing: Cell<bool>,
    recompute_count: Cell<usize>,
}

impl<T: Clone + PartialEq + 'static> ComputedInner<T> {
    fn recompute(&self) {
        if self.recomputing.replace(true) {
            return;
        }
        let value = self.scope.track(|| (self.producer)());
        self.recompute_count.set(self.recompute_count.get() + 1);
        self.recomputing.set(false);
        self.signal.set(value);
    }
}

/// A derived value kept in sync with the signals it reads.
///
/// # Type Parameters
///
/// - `T`: The computed value. `PartialEq` lets an unchanged result skip
///   notifying downstream readers.
pub struct Computed<T: 'static> {
    inner: Rc<ComputedInner<T>>,
}

impl<T: Clone + PartialEq + 'static> Computed<T> {
    /// Create a computed and run the producer once.
    pub fn new<F>(producer: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner<T>>| {
            let weak = weak.clone();
            let scope = ReactiveScope::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.recompute();
                }
            });
            let value = scope.track(&producer);
            ComputedInner {
                producer: Box::new(producer),
                signal: Signal::new(value),
                scope,
                recomputing: Cell::new(false),
                recompute_count: Cell::new(0),
            }
        });

        Self { inner }
    }

    /// Read the current value, tracking the read.
    pub fn get(&self) -> T {
        self.inner.signal.get()
    }

    /// Read the current value without tracking.
    pub fn get_untracked(&self) -> T {
        self.inner.signal.get_untracked()
    }

    /// The signal the computed writes into.
    pub fn signal(&self) -> &Signal<T> {
        &self.inner.signal
    }

    /// Stop following dependencies. The last value stays readable.
    pub fn dispose(&self) {
        self.inner.scope.clear();
    }

    /// How many times the producer re-ran after creation.
    pub fn recompute_count(&self) -> usize {
        self.inner.recompute_count.get()
    }

    /// Number of sources read by the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.scope.dependency_count()
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + Debug + 'static> Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("value", &self.get_untracked())
            .field("recompute_count", &self.recompute_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Create a computed value.
///
/// Inside a component setup, the computed is disposed when the component
/// unmounts.
pub fn computed<T, F>(producer: F) -> Computed<T>
where
    T: Clone + PartialEq + 'static,
    F: Fn() -> T + 'static,
{
    let computed = Computed::new(producer);
    let handle = computed.clone();
    hooks::dispose_with_component(move || handle.dispose());
    computed
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
