//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a tracking scope (a component render, a computed, an effect),
//! we push the subscriber onto the stack. When the computation completes, we
//! pop it.
//!
//! Frames may also be *untracked*: component setup functions and explicit
//! [`untrack`] calls push a frame without a subscriber, so reads inside them
//! never leak into an enclosing scope.
//!
//! The stack is only ever touched during synchronous execution; a tracking
//! scope must never be held across an `.await`.

use std::cell::RefCell;

use super::scope::Dependency;
use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The subscriber of the current computation, `None` for untracked frames.
    subscriber: Option<Subscriber>,
    /// Dependencies collected during this computation.
    dependencies: Vec<Dependency>,
}

/// Guard that pops the context when dropped.
///
/// This keeps the context stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new tracking frame for the given subscriber.
    ///
    /// While this context is active, any signals that are read will
    /// register the subscriber as a dependent.
    pub fn enter(subscriber: &Subscriber) -> Self {
        let subscriber_id = Some(subscriber.id());
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber: Some(subscriber.clone()),
                dependencies: Vec::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Enter a frame in which reads are not tracked.
    pub fn untracked() -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber: None,
                dependencies: Vec::new(),
            });
        });

        Self {
            subscriber_id: None,
        }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|entry| entry.subscriber.is_some())
        })
    }

    /// Get the current subscriber, if any.
    pub fn current_subscriber() -> Option<Subscriber> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber.clone())
        })
    }

    /// Record a dependency in the innermost tracking frame.
    ///
    /// Returns `true` when the dependency was not yet recorded in this frame,
    /// i.e. when the caller should register the subscription.
    pub(crate) fn track_dependency(dependency: Dependency) -> bool {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let Some(entry) = stack.last_mut() else {
                return false;
            };
            if entry.subscriber.is_none() {
                return false;
            }
            if entry
                .dependencies
                .iter()
                .any(|dep| dep.source_id() == dependency.source_id())
            {
                return false;
            }
            entry.dependencies.push(dependency);
            true
        })
    }

    /// Take the dependencies collected in the current frame.
    pub(crate) fn take_dependencies() -> Vec<Dependency> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|entry| std::mem::take(&mut entry.dependencies))
                .unwrap_or_default()
        })
    }

    /// Source ids recorded so far in the current frame.
    pub fn dependency_ids() -> Vec<u64> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.iter().map(Dependency::source_id).collect())
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber.as_ref().map(Subscriber::id),
                    self.subscriber_id,
                    "ReactiveContext mismatch"
                );
            }
        });
    }
}

/// Run `f` without tracking any signal reads.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;

    #[test]
    fn context_tracks_subscriber() {
        let subscriber = Subscriber::new(|| {});

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(&subscriber);

            assert!(ReactiveContext::is_active());
            assert_eq!(
                ReactiveContext::current_subscriber().map(|s| s.id()),
                Some(subscriber.id())
            );
        }

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn context_dedupes_dependencies() {
        let subscriber = Subscriber::new(|| {});
        let signal = Signal::new(1);
        let other = Signal::new(2);

        let _ctx = ReactiveContext::enter(&subscriber);
        signal.get();
        signal.get();
        other.get();

        assert_eq!(ReactiveContext::dependency_ids(), vec![signal.id(), other.id()]);
    }

    #[test]
    fn nested_contexts() {
        let outer = Subscriber::new(|| {});
        let inner = Subscriber::new(|| {});

        {
            let _ctx1 = ReactiveContext::enter(&outer);
            assert_eq!(ReactiveContext::current_subscriber().map(|s| s.id()), Some(outer.id()));

            {
                let _ctx2 = ReactiveContext::enter(&inner);
                assert_eq!(ReactiveContext::current_subscriber().map(|s| s.id()), Some(inner.id()));
            }

            assert_eq!(ReactiveContext::current_subscriber().map(|s| s.id()), Some(outer.id()));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn untracked_frame_hides_outer_scope() {
        let outer = Subscriber::new(|| {});
        let signal = Signal::new(0);

        let _ctx = ReactiveContext::enter(&outer);
        untrack(|| {
            assert!(!ReactiveContext::is_active());
            signal.get();
        });

        assert!(ReactiveContext::dependency_ids().is_empty());
        assert_eq!(signal.subscriber_count(), 0);
    }
}
