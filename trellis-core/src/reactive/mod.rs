//! Reactive Primitives
//!
//! This module implements the signal layer: signals, computeds, effects and
//! watches, plus the tracking scopes that connect them to component renders.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking scope, the signal registers that scope as a dependent.
//! When the signal's value changes, all dependents are notified.
//!
//! ## Scopes
//!
//! A [`ReactiveScope`] owns the subscriptions made while a function runs
//! through it. Re-running the function replaces the subscriptions, so the
//! dependency set always reflects the latest run. Component renders use a
//! scope to mark themselves dirty when something they read changes.
//!
//! ## Computeds and Effects
//!
//! A [`Computed`] re-runs its producer eagerly whenever a dependency fires
//! and stores the result in its own signal. An [`Effect`] re-runs a side
//! effect; [`watch`] is an effect that reports new/old values of a source.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking stack to automatically
//! detect dependencies. Everything here is single-threaded (`Rc`/`RefCell`);
//! writes from event handlers or timers notify synchronously, and any tree
//! work they cause is deferred to the next microtask flush.

mod cleanup;
mod computed;
mod context;
mod effect;
mod scope;
mod signal;
mod subscriber;

pub use cleanup::{Cleanup, IntoCleanup};
pub use computed::{computed, Computed};
pub use context::{untrack, ReactiveContext};
pub use effect::{create_effect, watch, Effect};
pub use scope::ReactiveScope;
pub use signal::{create_signal, Signal};
pub use subscriber::{Subscriber, SubscriberId};
