//! Trellis Core
//!
//! This crate provides the runtime of the Trellis component UI framework.
//! It implements:
//!
//! - Reactive primitives (signals, computeds, effects, watches)
//! - A component model with lifecycle hooks, refs and dependency injection
//! - An atom-chain reconciler that patches a native tree through a
//!   pluggable [`NativeRenderer`]
//! - Microtask batching of updates
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Signals and dependency tracking
//! - `jsx`, `props`: The template model components render
//! - `component`, `hooks`: Component instances and their lifecycle
//! - `reconciler`: Diffing of atom chains and native tree patching
//! - `app`: Mounting, scheduling and teardown of a whole tree
//! - `testing`: An in-memory renderer for tests and benchmarks
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use trellis_core::jsx::{component, element};
//! use trellis_core::reactive::Signal;
//! use trellis_core::scheduler::MicrotaskQueue;
//! use trellis_core::testing::MemoryRenderer;
//! use trellis_core::{create_app, AppConfig, Instance, PropsView};
//!
//! let count = Signal::new(0);
//! let counter = count.clone();
//! let renderer = Rc::new(MemoryRenderer::new());
//! let queue = MicrotaskQueue::new();
//! let host = renderer.create_root();
//!
//! let app = create_app(
//!     component(move |_props: PropsView| {
//!         let count = counter.clone();
//!         Instance::new(move || element("p").child(count.get().to_string()))
//!     }),
//!     AppConfig::new(renderer.clone()).scheduler(Rc::new(queue.clone())),
//! );
//! app.mount(host.clone())?;
//! assert_eq!(renderer.inner_html(&host), "<p>0</p>");
//!
//! // The write schedules a render pass; draining the queue runs it.
//! count.set(1);
//! queue.run_until_idle();
//! assert_eq!(renderer.inner_html(&host), "<p>1</p>");
//! # Ok::<(), trellis_core::ViewError>(())
//! ```

pub mod app;
pub mod atom;
pub mod component;
pub mod error;
pub mod hooks;
pub mod injector;
pub mod jsx;
pub mod native;
pub mod props;
pub mod reactive;
mod reconciler;
pub mod refs;
pub mod scheduler;
pub mod testing;

pub use app::{create_app, AppConfig, Application, Module, RenderOptions};
pub use component::{create_portal, with_memo, Component, ComponentId, Instance, IntoInstance, PropsView};
pub use error::{Result, ViewError};
pub use hooks::{inject, inject_or, inject_with, on_mounted, on_props_changed, on_unmounted, on_updated, provide};
pub use injector::{InjectFlags, InjectionToken, Injector, ProviderTable};
pub use jsx::{component, element, fragment, text, ComponentType, JsxNode, Key};
pub use native::{Namespace, NativeNode, NativeRenderer};
pub use props::{get_object_changes, ObjectChanges, PropValue, Props};
pub use reactive::{computed, create_effect, create_signal, untrack, watch, Computed, Effect, Signal};
pub use refs::{create_dynamic_ref, create_ref, DynamicRef, RefTarget, StaticRef};
pub use scheduler::{MicrotaskQueue, Scheduler, TokioScheduler};
