//! Reactive Scope
//!
//! A scope is the unit that *owns* a set of subscriptions. Component render
//! functions, computeds and effects each hold one. Running a function through
//! [`ReactiveScope::track`]:
//!
//! 1. tears down every subscription recorded by the previous run,
//! 2. pushes a tracking frame onto the [`ReactiveContext`] stack,
//! 3. runs the function (signal reads subscribe the scope's notifier),
//! 4. keeps the freshly collected dependency set for the next teardown.
//!
//! Dependencies are therefore dynamic: a branch that stops reading a signal
//! also stops being notified by it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};

/// Anything a scope can subscribe to.
pub(crate) trait Source {
    /// Drop the subscription registered for `subscriber`.
    fn unsubscribe(&self, subscriber: SubscriberId);
}

/// A recorded read of a [`Source`] by some tracking frame.
#[derive(Clone)]
pub(crate) struct Dependency {
    source_id: u64,
    source: Weak<dyn Source>,
}

impl Dependency {
    pub(crate) fn new(source_id: u64, source: Weak<dyn Source>) -> Self {
        Self { source_id, source }
    }

    pub(crate) fn source_id(&self) -> u64 {
        self.source_id
    }

    fn release(&self, subscriber: SubscriberId) {
        if let Some(source) = self.source.upgrade() {
            source.unsubscribe(subscriber);
        }
    }
}

/// Owner of the subscriptions made by one dependent computation.
pub struct ReactiveScope {
    subscriber: Subscriber,
    dependencies: RefCell<Vec<Dependency>>,
}

impl ReactiveScope {
    /// Create a scope whose dependencies invoke `notify` when they change.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            subscriber: Subscriber::new(notify),
            dependencies: RefCell::new(Vec::new()),
        }
    }

    /// The subscriber ID signals see for this scope.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber.id()
    }

    /// Run `f`, replacing the previous dependency set with the reads made by `f`.
    pub fn track<R>(&self, f: impl FnOnce() -> R) -> R {
        self.clear();

        let ctx = ReactiveContext::enter(&self.subscriber);
        let result = f();
        let collected = ReactiveContext::take_dependencies();
        drop(ctx);

        *self.dependencies.borrow_mut() = collected;
        result
    }

    /// Unsubscribe from every recorded dependency.
    pub fn clear(&self) {
        let previous = std::mem::take(&mut *self.dependencies.borrow_mut());
        for dependency in &previous {
            dependency.release(self.subscriber.id());
        }
    }

    /// Number of distinct sources read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.dependencies.borrow().len()
    }
}

impl Drop for ReactiveScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for ReactiveScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveScope")
            .field("subscriber", &self.subscriber.id())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}
