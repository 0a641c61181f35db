//! Integration Tests for the Component Runtime
//!
//! These tests mount whole applications on the in-memory renderer and check
//! that signals, components and the reconciler work together correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{json, Value};

use trellis_core::hooks::on_mounted;
use trellis_core::reactive::{ReactiveContext, Signal, SubscriberId};
use trellis_core::testing::MemoryRenderer;
use trellis_core::{
    component, create_app, create_portal, element, get_object_changes, with_memo, AppConfig,
    Application, Instance, JsxNode, MicrotaskQueue, NativeNode, ObjectChanges, Props, PropsView,
    TokioScheduler, ViewError,
};

struct Mounted {
    app: Application,
    renderer: Rc<MemoryRenderer>,
    queue: MicrotaskQueue,
    host: NativeNode,
}

impl Mounted {
    fn new(root: impl Into<JsxNode>) -> Self {
        let renderer = Rc::new(MemoryRenderer::new());
        let queue = MicrotaskQueue::new();
        let host = renderer.create_root();
        let app = create_app(
            root,
            AppConfig::new(renderer.clone()).scheduler(Rc::new(queue.clone())),
        );
        app.mount(host.clone()).unwrap();
        Self {
            app,
            renderer,
            queue,
            host,
        }
    }

    fn flush(&self) {
        self.queue.run_until_idle();
    }

    fn html(&self) -> String {
        self.renderer.inner_html(&self.host)
    }

    fn find(&self, tag: &str) -> Option<NativeNode> {
        self.renderer.find(&self.host, tag)
    }
}

/// Test that a click handler updates the rendered count.
#[test]
fn counter_updates_on_click() {
    let counter = |_props: PropsView| {
        let count = Signal::new(0);
        Instance::new(move || {
            let write = count.clone();
            element("div")
                .on("click", move |_| write.update(|n| n + 1))
                .child(count.get().to_string())
        })
    };
    let mounted = Mounted::new(component(counter));
    let div = mounted.find("div").unwrap();
    assert_eq!(mounted.renderer.text_content(&div), "0");

    mounted.renderer.dispatch(&div, "click", &());
    mounted.flush();
    assert_eq!(mounted.renderer.text_content(&div), "1");

    mounted.renderer.dispatch(&div, "click", &());
    mounted.flush();
    assert_eq!(mounted.renderer.text_content(&div), "2");
    assert_eq!(mounted.find("div"), Some(div));
}

/// Test that switching tags replaces the node and unrelated updates keep it.
#[test]
fn conditional_children_swap_nodes() {
    let is_show = Signal::new(true);
    let other = Signal::new(0);
    let (show, extra) = (is_show.clone(), other.clone());
    let parent = move |_props: PropsView| {
        let (show, extra) = (show.clone(), extra.clone());
        Instance::new(move || {
            let branch = if show.get() {
                element("nav").child("1111").build()
            } else {
                element("p").child("2222").build()
            };
            element("main")
                .child(branch)
                .child(element("span").child(extra.get().to_string()))
                .build()
        })
    };
    let mounted = Mounted::new(component(parent));
    let nav = mounted.find("nav").unwrap();
    let nav_text = mounted.renderer.children(&nav)[0].clone();

    other.set(1);
    mounted.flush();
    assert_eq!(mounted.find("nav"), Some(nav.clone()));
    assert_eq!(mounted.renderer.children(&nav)[0], nav_text);
    assert_eq!(mounted.html(), "<main><nav>1111</nav><span>1</span></main>");

    is_show.set(false);
    mounted.flush();
    assert!(mounted.find("nav").is_none());
    assert!(mounted.renderer.parent(&nav).is_none());
    assert_eq!(mounted.html(), "<main><p>2222</p><span>1</span></main>");
}

/// Test that destroying the app also clears nodes rendered through a portal.
#[test]
fn destroy_removes_portal_nodes() {
    let renderer = Rc::new(MemoryRenderer::new());
    let portal_host = renderer.create_root();
    let target = portal_host.clone();
    let modal = move |_props: PropsView| {
        create_portal(|| element("div").class("modal").child("hello"), target.clone())
    };
    let page = move |_props: PropsView| {
        let modal = modal.clone();
        Instance::new(move || {
            element("section").child(component(modal.clone()))
        })
    };

    let host = renderer.create_root();
    let app = create_app(component(page), AppConfig::new(renderer.clone()));
    app.mount(host.clone()).unwrap();
    assert_eq!(renderer.inner_html(&host), "<section></section>");
    assert_eq!(
        renderer.inner_html(&portal_host),
        "<div class=\"modal\">hello</div>"
    );

    app.destroy().unwrap();
    assert_eq!(renderer.inner_html(&host), "");
    assert_eq!(renderer.inner_html(&portal_host), "");
}

/// Test that a keyed reorder keeps every list item node.
#[test]
fn keyed_reorder_preserves_node_identity() {
    let ids = Signal::new(vec!["id1", "id2", "id3"]);
    let read = ids.clone();
    let list = move |_props: PropsView| {
        let read = read.clone();
        Instance::new(move || {
            element("ul").children(
                read.get()
                    .into_iter()
                    .map(|id| element("li").key(id).child(id)),
            )
        })
    };
    let mounted = Mounted::new(component(list));
    let ul = mounted.find("ul").unwrap();
    let before = mounted.renderer.children(&ul);

    ids.set(vec!["id3", "id1", "id2"]);
    mounted.flush();

    let after = mounted.renderer.children(&ul);
    assert_eq!(mounted.renderer.text_content(&ul), "id3id1id2");
    assert_eq!(after.len(), 3);
    assert_eq!(after[0], before[2]);
    assert_eq!(after[1], before[0]);
    assert_eq!(after[2], before[1]);
}

/// Test that the memo predicate gates child re-renders.
#[test]
fn memo_gate_counts_renders() {
    let renders = Rc::new(Cell::new(0));
    let value = Signal::new(1);
    let tick = Signal::new(0);

    let counter = renders.clone();
    let child = move |props: PropsView| {
        let counter = counter.clone();
        let props_for_render = props.clone();
        with_memo(
            |current: &Props, previous: &Props| current.value("value") == previous.value("value"),
            move || {
                counter.set(counter.get() + 1);
                props_for_render.i64("value").unwrap_or_default().to_string()
            },
        )
    };
    let (read_value, read_tick) = (value.clone(), tick.clone());
    let parent = move |_props: PropsView| {
        let (read_value, read_tick, child) = (read_value.clone(), read_tick.clone(), child.clone());
        Instance::new(move || {
            element("div")
                .attr("data-tick", read_tick.get())
                .child(component(child.clone()).prop("value", read_value.get()))
        })
    };

    let mounted = Mounted::new(component(parent));
    assert_eq!(renders.get(), 1);

    tick.set(1);
    mounted.flush();
    assert_eq!(renders.get(), 1);

    value.set(2);
    mounted.flush();
    assert_eq!(renders.get(), 2);
    assert_eq!(mounted.renderer.text_content(&mounted.host), "2");
}

/// Test that writing an equal value notifies nobody.
#[test]
fn idempotent_write_does_not_notify() {
    let signal = Signal::new(String::from("same"));
    let hits = Rc::new(Cell::new(0));
    let hits_clone = hits.clone();
    signal.subscribe(SubscriberId::new(), move || hits_clone.set(hits_clone.get() + 1));

    signal.set(String::from("same"));
    assert_eq!(hits.get(), 0);
    signal.set(String::from("other"));
    assert_eq!(hits.get(), 1);
}

/// Test that reading a signal twice in one scope subscribes once.
#[test]
fn repeated_reads_subscribe_once() {
    let signal = Signal::new(1);
    let runs = Rc::new(Cell::new(0));
    let (read, runs_clone) = (signal.clone(), runs.clone());
    let effect = trellis_core::Effect::new(move || {
        let _ = read.get() + read.get();
        runs_clone.set(runs_clone.get() + 1);
    });

    assert_eq!(signal.subscriber_count(), 1);
    assert_eq!(effect.dependency_count(), 1);
    signal.set(2);
    assert_eq!(runs.get(), 2);
    assert!(ReactiveContext::current_subscriber().is_none());
}

/// Test that a change set survives JSON and rebuilds the new props.
#[test]
fn object_changes_round_trip() {
    let old: indexmap::IndexMap<String, Value> =
        serde_json::from_value(json!({"a": 1, "b": "x", "c": [1, 2]})).unwrap();
    let new: indexmap::IndexMap<String, Value> =
        serde_json::from_value(json!({"b": "y", "c": [1, 2], "d": null})).unwrap();

    let changes = get_object_changes(&new, &old);
    assert_eq!(changes.add.len(), 1);
    assert_eq!(changes.remove.len(), 1);
    assert_eq!(changes.replace.len(), 1);

    let json = serde_json::to_string(&changes).unwrap();
    let parsed: ObjectChanges<Value> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.apply(&old), new);

    let bytes = changes.to_msgpack().unwrap();
    assert_eq!(ObjectChanges::<Value>::from_msgpack(&bytes).unwrap().apply(&old), new);
}

/// Test that a signal written from `on_mounted` triggers one more render.
#[test]
fn on_mounted_write_rerenders() {
    let status = |_props: PropsView| -> trellis_core::Result<Instance> {
        let ready = Signal::new(false);
        let write = ready.clone();
        on_mounted(move || write.set(true))?;
        Ok(Instance::new(move || if ready.get() { "ready" } else { "loading" }))
    };
    let mounted = Mounted::new(component(status));
    assert_eq!(mounted.html(), "loading");
    assert!(mounted.app.has_pending_render());

    mounted.flush();
    assert_eq!(mounted.html(), "ready");
}

/// Test that updates from nested components are all applied in one pass.
#[test]
fn nested_changes_share_one_pass() {
    let left = Signal::new("a");
    let right = Signal::new("b");
    let leaf = |props: PropsView| {
        Instance::new(move || {
            props.with(|props| {
                props
                    .get("source")
                    .and_then(|value| value.downcast_ref::<Signal<&'static str>>())
                    .map(|signal| signal.get().to_string())
                    .unwrap_or_default()
            })
        })
    };
    let (l, r) = (left.clone(), right.clone());
    let root = move |_props: PropsView| {
        let (l, r) = (l.clone(), r.clone());
        Instance::new(move || {
            element("div")
                .child(component(leaf).prop("source", trellis_core::PropValue::any(l.clone())))
                .child(component(leaf).prop("source", trellis_core::PropValue::any(r.clone())))
        })
    };
    let mounted = Mounted::new(component(root));
    assert_eq!(mounted.html(), "<div>ab</div>");

    left.set("x");
    right.set("y");
    assert_eq!(mounted.queue.len(), 1);
    mounted.flush();
    assert_eq!(mounted.html(), "<div>xy</div>");
}

/// Test that a render pass failing in one component does not stop later
/// updates anywhere in the tree.
#[test]
fn failed_pass_does_not_block_later_updates() {
    let broken = Signal::new(false);
    let count = Signal::new(0);

    let failing = |_props: PropsView| -> trellis_core::Result<Instance> {
        Err(ViewError::setup("failing", "setup refused"))
    };
    let read_broken = broken.clone();
    let left = move |_props: PropsView| {
        let broken = read_broken.clone();
        Instance::new(move || {
            if broken.get() {
                component(failing).build()
            } else {
                JsxNode::from("x")
            }
        })
    };
    let read_count = count.clone();
    let right = move |_props: PropsView| {
        let count = read_count.clone();
        Instance::new(move || element("y").child(count.get().to_string()))
    };
    let page = move |_props: PropsView| {
        let (left, right) = (left.clone(), right.clone());
        Instance::new(move || {
            element("p")
                .child(component(left.clone()))
                .child(component(right.clone()))
        })
    };
    let mounted = Mounted::new(component(page));
    assert_eq!(mounted.html(), "<p>x<y>0</y></p>");

    broken.set(true);
    assert_eq!(mounted.queue.len(), 1);
    mounted.flush();
    assert_eq!(mounted.html(), "<p><y>0</y></p>");

    broken.set(false);
    assert!(mounted.app.has_pending_render());
    mounted.flush();
    assert_eq!(mounted.html(), "<p>x<y>0</y></p>");

    count.set(1);
    assert!(mounted.app.has_pending_render());
    mounted.flush();
    assert_eq!(mounted.html(), "<p>x<y>1</y></p>");
}

/// Test that a manual render retries work left over by a failed pass.
#[test]
fn manual_render_retries_a_failed_pass() {
    let broken = Signal::new(false);
    let allow = Rc::new(Cell::new(true));

    let gate = allow.clone();
    let guarded = move |_props: PropsView| -> trellis_core::Result<Instance> {
        if gate.get() {
            Ok(Instance::new(|| "ok"))
        } else {
            Err(ViewError::setup("guarded", "not allowed yet"))
        }
    };
    let read_broken = broken.clone();
    let root = move |_props: PropsView| {
        let (broken, guarded) = (read_broken.clone(), guarded.clone());
        Instance::new(move || {
            if broken.get() {
                element("b").child(component(guarded.clone())).build()
            } else {
                element("a").build()
            }
        })
    };
    let mounted = Mounted::new(component(root));

    allow.set(false);
    broken.set(true);
    mounted.flush();
    assert_eq!(mounted.html(), "");
    assert!(!mounted.app.has_pending_render());

    allow.set(true);
    mounted.app.render().unwrap();
    assert_eq!(mounted.html(), "<b>ok</b>");
    assert_eq!(mounted.app.atom_count(), 5);
}

/// Test that the tokio scheduler drives updates on a `LocalSet`.
#[tokio::test]
async fn tokio_scheduler_flushes_updates() {
    let local = tokio::task::LocalSet::new();
    let html = Rc::new(RefCell::new(String::new()));
    let html_out = html.clone();

    local
        .run_until(async move {
            let count = Signal::new(0);
            let read = count.clone();
            let renderer = Rc::new(MemoryRenderer::new());
            let host = renderer.create_root();
            let app = create_app(
                component(move |_props: PropsView| {
                    let read = read.clone();
                    Instance::new(move || read.get().to_string())
                }),
                AppConfig::new(renderer.clone()).scheduler(Rc::new(TokioScheduler)),
            );
            app.mount(host.clone()).unwrap();

            count.set(7);
            for _ in 0..4 {
                tokio::task::yield_now().await;
            }
            *html_out.borrow_mut() = renderer.inner_html(&host);
        })
        .await;

    assert_eq!(*html.borrow(), "7");
}
