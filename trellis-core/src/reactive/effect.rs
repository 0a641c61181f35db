//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect re-runs synchronously.
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution.
//!
//! # Watches
//!
//! [`watch`] splits an effect in two: a tracked `source` producing a value,
//! and an untracked `callback` invoked with the new and previous value
//! whenever the source's result changes.
//!
//! # Cleanup
//!
//! Effects and watch callbacks can return a [`Cleanup`]. It runs before the
//! next invocation and when the effect is disposed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::cleanup::{Cleanup, IntoCleanup};
use super::context::untrack;
use super::scope::ReactiveScope;
use crate::hooks;

type EffectFn = Box<dyn FnMut() -> Option<Cleanup>>;

struct EffectInner {
    run: RefCell<EffectFn>,
    scope: ReactiveScope,
    cleanup: RefCell<Option<Cleanup>>,
    teardown: RefCell<Vec<Cleanup>>,
    disposed: Cell<bool>,
    running: Cell<bool>,
    run_count: Cell<usize>,
}

impl EffectInner {
    fn execute(&self) {
        if self.disposed.get() || self.running.replace(true) {
            return;
        }

        if let Some(cleanup) = self.cleanup.borrow_mut().take() {
            cleanup.run();
        }

        let cleanup = self.scope.track(|| (&mut *self.run.borrow_mut())());
        *self.cleanup.borrow_mut() = cleanup;

        self.run_count.set(self.run_count.get() + 1);
        self.running.set(false);
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.scope.clear();
        if let Some(cleanup) = self.cleanup.borrow_mut().take() {
            cleanup.run();
        }
        let teardown = std::mem::take(&mut *self.teardown.borrow_mut());
        for cleanup in teardown {
            cleanup.run();
        }
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let count_clone = count.clone();
/// let effect = Effect::new(move || {
///     let _ = count_clone.get();
/// });
///
/// count.set(5);
/// assert_eq!(effect.run_count(), 2);
/// ```
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create a new effect and run it immediately.
    pub fn new<F, R>(run: F) -> Self
    where
        F: FnMut() -> R + 'static,
        R: IntoCleanup,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create a new effect without running it.
    pub fn new_lazy<F, R>(mut run: F) -> Self
    where
        F: FnMut() -> R + 'static,
        R: IntoCleanup,
    {
        let inner = Rc::new_cyclic(|weak: &Weak<EffectInner>| {
            let weak = weak.clone();
            EffectInner {
                run: RefCell::new(Box::new(move || run().into_cleanup())),
                scope: ReactiveScope::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.execute();
                    }
                }),
                cleanup: RefCell::new(None),
                teardown: RefCell::new(Vec::new()),
                disposed: Cell::new(false),
                running: Cell::new(false),
                run_count: Cell::new(0),
            }
        });

        Self { inner }
    }

    /// Execute the effect function inside its tracking scope.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Dispose of the effect: unsubscribe and run the pending cleanup.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Register an extra action to run when the effect is disposed.
    pub(crate) fn on_dispose(&self, cleanup: Cleanup) {
        if self.is_disposed() {
            cleanup.run();
        } else {
            self.inner.teardown.borrow_mut().push(cleanup);
        }
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of dependencies.
    pub fn dependency_count(&self) -> usize {
        self.inner.scope.dependency_count()
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an effect; inside a component setup it is disposed on unmount.
pub fn create_effect<F, R>(run: F) -> Effect
where
    F: FnMut() -> R + 'static,
    R: IntoCleanup,
{
    let effect = Effect::new(run);
    let handle = effect.clone();
    hooks::dispose_with_component(move || handle.dispose());
    effect
}

/// Watch `source` and call `callback(new, old)` whenever its result changes.
///
/// The source is tracked, the callback is not. The callback's returned
/// cleanup runs before the next invocation and when the watch is disposed.
/// Inside a component setup, the watch is disposed on unmount.
pub fn watch<T, S, C, R>(source: S, mut callback: C) -> Effect
where
    T: Clone + PartialEq + 'static,
    S: Fn() -> T + 'static,
    C: FnMut(&T, &T) -> R + 'static,
    R: IntoCleanup,
{
    let last: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
    let pending: Rc<RefCell<Option<Cleanup>>> = Rc::new(RefCell::new(None));
    let pending_on_dispose = pending.clone();

    let effect = Effect::new(move || {
        let value = source();
        let previous = last.borrow_mut().replace(value.clone());
        let Some(old) = previous else {
            return None;
        };
        if old == value {
            return None;
        }
        if let Some(cleanup) = pending.borrow_mut().take() {
            cleanup.run();
        }
        let cleanup = untrack(|| callback(&value, &old)).into_cleanup();
        *pending.borrow_mut() = cleanup;
        None::<Cleanup>
    });

    effect.on_dispose(Cleanup::new(move || {
        if let Some(cleanup) = pending_on_dispose.borrow_mut().take() {
            cleanup.run();
        }
    }));
    let handle = effect.clone();
    hooks::dispose_with_component(move || handle.dispose());
    effect
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
