//! Application Lifecycle
//!
//! [`create_app`] wraps a root template in a root component and pairs it
//! with a renderer. [`Application::mount`] builds the tree into a host node;
//! afterwards every state change below the root schedules one refresh on the
//! configured [`Scheduler`], so writes made in the same tick share a single
//! render pass.
//!
//! With `auto_update` turned off nothing is scheduled and the host drives
//! updates by calling [`Application::render`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::component::{Component, Instance, PropsView};
use crate::error::{Result, ViewError};
use crate::injector::{InjectionToken, Injector};
use crate::jsx::{ComponentType, JsxNode};
use crate::native::{Namespace, NativeNode, NativeRenderer};
use crate::reconciler::Reconciler;
use crate::scheduler::{MicrotaskQueue, Scheduler};

/// Plain-data render settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    /// Schedule a render pass automatically after state changes.
    pub auto_update: bool,
    /// Namespace of the host node, e.g. when mounting inside an `<svg>`.
    pub namespace: Option<Namespace>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            auto_update: true,
            namespace: None,
        }
    }
}

impl RenderOptions {
    /// Parse options from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Everything an application needs besides its root template.
pub struct AppConfig {
    renderer: Rc<dyn NativeRenderer>,
    options: RenderOptions,
    scheduler: Option<Rc<dyn Scheduler>>,
    injector: Option<Rc<dyn Injector>>,
}

impl AppConfig {
    pub fn new(renderer: Rc<dyn NativeRenderer>) -> Self {
        Self {
            renderer,
            options: RenderOptions::default(),
            scheduler: None,
            injector: None,
        }
    }

    pub fn auto_update(mut self, auto_update: bool) -> Self {
        self.options.auto_update = auto_update;
        self
    }

    pub fn namespace(mut self, namespace: Option<Namespace>) -> Self {
        self.options.namespace = namespace;
        self
    }

    pub fn options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Where refresh passes are queued. Defaults to a private
    /// [`MicrotaskQueue`] that nobody drains, so hosts that rely on
    /// `auto_update` should pass their own.
    pub fn scheduler(mut self, scheduler: Rc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Fallback for lookups no component provides.
    pub fn injector(mut self, injector: Rc<dyn Injector>) -> Self {
        self.injector = Some(injector);
        self
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("options", &self.options)
            .field("scheduler", &self.scheduler.is_some())
            .field("injector", &self.injector.is_some())
            .finish()
    }
}

/// A plug-in that takes part in the application lifecycle.
pub trait Module {
    /// Called on mount, before the first render.
    fn setup(&self, _app: &Application) -> Result<()> {
        Ok(())
    }

    /// Called after the first render completed.
    fn on_after_startup(&self, _app: &Application) {}

    /// Called once the tree has been torn down.
    fn on_destroy(&self) {}
}

struct AppInner {
    root: Rc<Component>,
    reconciler: RefCell<Reconciler>,
    host: RefCell<Option<NativeNode>>,
    options: RenderOptions,
    scheduler: Rc<dyn Scheduler>,
    destroyed: Rc<Cell<bool>>,
    task_pending: Cell<bool>,
    modules: RefCell<Vec<Rc<dyn Module>>>,
}

impl AppInner {
    fn schedule_refresh(self: &Rc<Self>) {
        if !self.options.auto_update || self.destroyed.get() || self.task_pending.replace(true) {
            return;
        }
        let app = Rc::downgrade(self);
        self.scheduler.queue_microtask(Box::new(move || {
            let Some(app) = app.upgrade() else {
                return;
            };
            app.task_pending.set(false);
            if let Err(err) = app.refresh() {
                error!(%err, "scheduled render pass failed");
            }
        }));
    }

    fn refresh(&self) -> Result<()> {
        if self.host.borrow().is_none() {
            return Err(ViewError::NotMounted);
        }
        let mut reconciler = self
            .reconciler
            .try_borrow_mut()
            .map_err(|_| ViewError::RenderInProgress)?;
        reconciler.refresh(&self.root)
    }
}

/// A mounted (or mountable) component tree.
#[derive(Clone)]
pub struct Application {
    inner: Rc<AppInner>,
}

impl Application {
    fn new(template: JsxNode, config: AppConfig) -> Self {
        let destroyed = Rc::new(Cell::new(false));
        let root_destroyed = destroyed.clone();
        let root_type = ComponentType::of(move |_props: PropsView| {
            let destroyed = root_destroyed.clone();
            let template = template.clone();
            Instance::new(move || {
                if destroyed.get() {
                    JsxNode::Empty
                } else {
                    template.clone()
                }
            })
        });
        let scheduler = config
            .scheduler
            .unwrap_or_else(|| Rc::new(MicrotaskQueue::new()));

        let inner = Rc::new_cyclic(|app: &Weak<AppInner>| {
            let app = app.clone();
            let root = Component::new_root(
                root_type,
                scheduler.clone(),
                config.injector,
                Box::new(move || {
                    if let Some(app) = app.upgrade() {
                        app.schedule_refresh();
                    }
                }),
            );
            AppInner {
                root,
                reconciler: RefCell::new(Reconciler::new(config.renderer)),
                host: RefCell::new(None),
                options: config.options,
                scheduler,
                destroyed,
                task_pending: Cell::new(false),
                modules: RefCell::new(Vec::new()),
            }
        });
        Self { inner }
    }

    /// Build the tree into `host`.
    pub fn mount(&self, host: NativeNode) -> Result<()> {
        if self.inner.host.borrow().is_some() || self.inner.destroyed.get() {
            return Err(ViewError::AlreadyMounted);
        }
        *self.inner.host.borrow_mut() = Some(host.clone());

        let modules = self.inner.modules.borrow().clone();
        for module in &modules {
            module.setup(self)?;
        }

        {
            let mut reconciler = self
                .inner
                .reconciler
                .try_borrow_mut()
                .map_err(|_| ViewError::RenderInProgress)?;
            reconciler.mount(&self.inner.root, &host, self.inner.options.namespace)?;
        }
        debug!(auto_update = self.inner.options.auto_update, "application mounted");

        for module in &modules {
            module.on_after_startup(self);
        }
        Ok(())
    }

    /// Run a render pass now, applying every pending change.
    pub fn render(&self) -> Result<()> {
        self.inner.refresh()
    }

    /// Tear the whole tree down. Calling it again does nothing.
    pub fn destroy(&self) -> Result<()> {
        if self.inner.destroyed.replace(true) {
            return Ok(());
        }
        if self.inner.host.borrow().is_some() {
            self.inner.root.mark_as_dirtied();
            let mut reconciler = self
                .inner
                .reconciler
                .try_borrow_mut()
                .map_err(|_| ViewError::RenderInProgress)?;
            reconciler.refresh(&self.inner.root)?;
            reconciler.unmount(&self.inner.root);
        } else {
            self.inner.root.destroy();
        }
        debug!("application destroyed");

        let modules = std::mem::take(&mut *self.inner.modules.borrow_mut());
        for module in modules {
            module.on_destroy();
        }
        Ok(())
    }

    /// Make `value` injectable everywhere in the tree.
    pub fn provide<T: 'static>(&self, token: &InjectionToken<T>, value: T) -> &Self {
        self.inner.root.provide_value(token.id(), Rc::new(value));
        self
    }

    /// Register a module. Modules set up on mount.
    pub fn use_module<M: Module + 'static>(&self, module: M) -> &Self {
        if self.is_mounted() {
            warn!("module registered after mount will not be set up");
        }
        self.inner.modules.borrow_mut().push(Rc::new(module));
        self
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.host.borrow().is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    pub fn host(&self) -> Option<NativeNode> {
        self.inner.host.borrow().clone()
    }

    /// The component wrapping the root template.
    pub fn root(&self) -> &Rc<Component> {
        &self.inner.root
    }

    /// Whether a scheduled render pass is waiting to run.
    pub fn has_pending_render(&self) -> bool {
        self.inner.task_pending.get()
    }

    /// Number of live atoms in the current frame.
    pub fn atom_count(&self) -> usize {
        match self.inner.reconciler.try_borrow() {
            Ok(reconciler) => reconciler.arena().len(),
            Err(_) => 0,
        }
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("options", &self.inner.options)
            .field("mounted", &self.is_mounted())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// Create an application rendering `root`.
pub fn create_app(root: impl Into<JsxNode>, config: AppConfig) -> Application {
    Application::new(root.into(), config)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
