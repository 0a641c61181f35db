//! Component Hooks
//!
//! Hooks attach behaviour to the component whose setup function is currently
//! running. The runtime pushes that component onto a thread-local setup
//! stack before calling setup and pops it afterwards, so hooks must be
//! called synchronously from setup: not from render closures, event handlers
//! or after an `.await`. Outside of setup every hook returns
//! [`ViewError::OutsideComponent`].
//!
//! # Example
//!
//! ```rust
//! use trellis_core::hooks::{on_mounted, on_unmounted};
//! use trellis_core::{Instance, PropsView, Result};
//!
//! fn clock(_props: PropsView) -> Result<Instance> {
//!     on_mounted(|| println!("mounted"))?;
//!     on_unmounted(|| println!("unmounted"))?;
//!     Ok(Instance::new(|| "tick"))
//! }
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use crate::component::Component;
use crate::error::{Result, ViewError};
use crate::injector::{resolve, InjectFlags, InjectionToken};
use crate::props::Props;
use crate::reactive::{Cleanup, IntoCleanup};

thread_local! {
    static SETUP_STACK: RefCell<Vec<Rc<Component>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that keeps a component on the setup stack.
pub(crate) struct ComponentContext {
    _private: (),
}

impl ComponentContext {
    pub(crate) fn enter(component: Rc<Component>) -> Self {
        SETUP_STACK.with(|stack| stack.borrow_mut().push(component));
        Self { _private: () }
    }
}

impl Drop for ComponentContext {
    fn drop(&mut self) {
        SETUP_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert!(popped.is_some(), "setup stack underflow");
        });
    }
}

/// The component whose setup is running, or an error naming `hook`.
pub(crate) fn current_component(hook: &'static str) -> Result<Rc<Component>> {
    SETUP_STACK
        .with(|stack| stack.borrow().last().cloned())
        .ok_or(ViewError::OutsideComponent { hook })
}

/// Whether a component setup is running.
pub fn in_setup() -> bool {
    SETUP_STACK.with(|stack| !stack.borrow().is_empty())
}

/// Run `f` when the current component unmounts; does nothing outside setup.
pub(crate) fn dispose_with_component(f: impl FnOnce() + 'static) {
    let component = SETUP_STACK.with(|stack| stack.borrow().last().cloned());
    if let Some(component) = component {
        component.add_unmounted_hook(Cleanup::new(f));
    }
}

/// Run `hook` once after the component's first render. A returned
/// [`Cleanup`] runs on unmount.
pub fn on_mounted<F, R>(hook: F) -> Result<()>
where
    F: FnOnce() -> R + 'static,
    R: IntoCleanup,
{
    let component = current_component("on_mounted")?;
    component.add_mounted_hook(Box::new(move || hook().into_cleanup()));
    Ok(())
}

/// Run `hook` after every render of the component, the first included.
/// A returned [`Cleanup`] runs before the next call and on unmount.
pub fn on_updated<F, R>(mut hook: F) -> Result<()>
where
    F: FnMut() -> R + 'static,
    R: IntoCleanup,
{
    let component = current_component("on_updated")?;
    component.add_updated_hook(Box::new(move || hook().into_cleanup()));
    Ok(())
}

/// Run `hook(new, old)` whenever the parent passes different props.
pub fn on_props_changed<F, R>(mut hook: F) -> Result<()>
where
    F: FnMut(&Props, &Props) -> R + 'static,
    R: IntoCleanup,
{
    let component = current_component("on_props_changed")?;
    component.add_props_changed_hook(Box::new(move |new, old| hook(new, old).into_cleanup()));
    Ok(())
}

/// Run `hook` when the component is destroyed.
pub fn on_unmounted<F>(hook: F) -> Result<()>
where
    F: FnOnce() + 'static,
{
    let component = current_component("on_unmounted")?;
    component.add_unmounted_hook(Cleanup::new(hook));
    Ok(())
}

/// Make `value` available to this component and its descendants.
pub fn provide<T: 'static>(token: &InjectionToken<T>, value: T) -> Result<()> {
    let component = current_component("provide")?;
    component.provide_value(token.id(), Rc::new(value));
    Ok(())
}

/// Resolve `token` from the nearest provider.
pub fn inject<T: 'static>(token: &InjectionToken<T>) -> Result<Rc<T>> {
    inject_with(token, InjectFlags::Default)?.ok_or_else(|| ViewError::NoProvider {
        token: token.name().to_string(),
    })
}

/// Resolve `token` with explicit scoping. With [`InjectFlags::Optional`] a
/// miss is `Ok(None)`; otherwise it is [`ViewError::NoProvider`].
pub fn inject_with<T: 'static>(
    token: &InjectionToken<T>,
    flags: InjectFlags,
) -> Result<Option<Rc<T>>> {
    let component = current_component("inject")?;
    match resolve(&*component, token, flags) {
        Some(value) => Ok(Some(value)),
        None if flags == InjectFlags::Optional => Ok(None),
        None => Err(ViewError::NoProvider {
            token: token.name().to_string(),
        }),
    }
}

/// Resolve `token`, falling back to `default` on a miss.
pub fn inject_or<T: 'static>(token: &InjectionToken<T>, default: T) -> Result<Rc<T>> {
    Ok(inject_with(token, InjectFlags::Optional)?.unwrap_or_else(|| Rc::new(default)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Instance, PropsView};
    use crate::jsx::{ComponentType, JsxNode};
    use crate::scheduler::MicrotaskQueue;

    fn blank(_props: PropsView) -> Instance {
        Instance::new(|| JsxNode::Empty)
    }

    fn root() -> Rc<Component> {
        Component::new_root(
            ComponentType::of(blank),
            Rc::new(MicrotaskQueue::new()),
            None,
            Box::new(|| {}),
        )
    }

    #[test]
    fn hooks_fail_outside_setup() {
        assert!(!in_setup());
        let err = on_mounted(|| {}).unwrap_err();
        assert_eq!(err.to_string(), "`on_mounted` cannot be called outside the component");
        assert!(matches!(
            on_unmounted(|| {}),
            Err(ViewError::OutsideComponent { hook: "on_unmounted" })
        ));
        let token = InjectionToken::<u8>::new("byte");
        assert!(matches!(inject(&token), Err(ViewError::OutsideComponent { .. })));
    }

    #[test]
    fn context_guard_restores_the_stack() {
        let root = root();
        {
            let _context = ComponentContext::enter(root.clone());
            assert!(in_setup());
            assert!(Rc::ptr_eq(&current_component("test").unwrap(), &root));
        }
        assert!(!in_setup());
    }

    #[test]
    fn provide_and_inject_across_components() {
        let token = InjectionToken::<String>::new("theme");
        let missing = InjectionToken::<u8>::new("missing");
        let root = root();
        let child = Component::new(ComponentType::of(blank), Rc::new(Props::new()), None, &root);

        {
            let _context = ComponentContext::enter(root.clone());
            provide(&token, "dark".to_string()).unwrap();
        }

        let _context = ComponentContext::enter(child);
        assert_eq!(inject(&token).unwrap().as_str(), "dark");
        assert_eq!(
            inject(&missing).unwrap_err().to_string(),
            "No provide for `missing`"
        );
        assert!(inject_with(&missing, InjectFlags::Optional).unwrap().is_none());
        assert_eq!(*inject_or(&missing, 3).unwrap(), 3);
        assert!(matches!(
            inject_with(&token, InjectFlags::SelfOnly),
            Err(ViewError::NoProvider { .. })
        ));
    }

    #[test]
    fn disposal_registers_only_inside_setup() {
        use std::cell::Cell;

        let disposed = Rc::new(Cell::new(0));
        let outside = disposed.clone();
        dispose_with_component(move || outside.set(outside.get() + 1));

        let root = root();
        {
            let _context = ComponentContext::enter(root.clone());
            let inside = disposed.clone();
            dispose_with_component(move || inside.set(inside.get() + 10));
        }
        assert_eq!(disposed.get(), 0);
        root.destroy();
        assert_eq!(disposed.get(), 10);
    }
}
