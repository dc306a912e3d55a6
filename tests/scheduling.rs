//! End-to-end scheduling behaviour: writes, batching and the microtask boundary.

use std::cell::Cell;
use std::rc::Rc;

use rstest::rstest;
use spark_vdom::scheduler::{pending_jobs, reset_scheduler};
use spark_vdom::*;

fn counter(count: Ref<i64>, renders: Rc<Cell<u32>>) -> Rc<ComponentDef> {
    ComponentDef::new("Counter")
        .with_setup(move |_| {
            let (count, renders) = (count.clone(), renders.clone());
            SetupResult::render(move |_| {
                renders.set(renders.get() + 1);
                h("b", props! {}, count.get().to_string())
            })
        })
        .into_rc()
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(50)]
fn writes_in_one_tick_render_once(#[case] writes: i64) {
    reset_scheduler();
    let host = Rc::new(MemoryHost::new());
    let root = host.create_root("app");
    let count = create_ref(0_i64);
    let renders = Rc::new(Cell::new(0));

    let mut app = create_app(host.clone(), counter(count.clone(), renders.clone()), props! {});
    app.mount(root).unwrap();
    assert_eq!(renders.get(), 1);

    for n in 1..=writes {
        count.set(n);
    }
    assert_eq!(pending_jobs(), 1);

    assert_eq!(run_microtasks(), Ok(1));
    assert_eq!(renders.get(), 2);
    assert_eq!(host.to_markup(root), format!("<app><b>{writes}</b></app>"));
}

#[test]
fn sibling_components_flush_in_queue_order() {
    reset_scheduler();
    let host = Rc::new(MemoryHost::new());
    let root = host.create_root("app");
    let first = create_ref(0_i64);
    let second = create_ref(0_i64);
    let (first_renders, second_renders) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));

    let tree = h(
        "div",
        props! {},
        vec![
            component_vnode(&counter(first.clone(), first_renders.clone()), props! {}),
            component_vnode(&counter(second.clone(), second_renders.clone()), props! {}),
        ],
    );
    let renderer = Renderer::new(host.clone());
    renderer.render(&tree, root).unwrap();

    second.set(2);
    first.set(1);
    second.set(3);
    assert_eq!(pending_jobs(), 2);

    run_microtasks().unwrap();
    assert_eq!((first_renders.get(), second_renders.get()), (2, 2));
    assert_eq!(host.to_markup(root), "<app><div><b>1</b><b>3</b></div></app>");
}

#[test]
fn computed_feeds_component_render() {
    reset_scheduler();
    let host = Rc::new(MemoryHost::new());
    let root = host.create_root("app");
    let items = reactive([("done", 1_i64), ("open", 2)]);

    let summary = {
        let items = items.clone();
        ComponentDef::new("Summary")
            .with_setup(move |_| {
                let source = items.clone();
                let total = computed(move || {
                    source.get("done").unwrap_or(0) + source.get("open").unwrap_or(0)
                });
                SetupResult::render(move |_| h("p", props! {}, total.get().to_string()))
            })
            .into_rc()
    };

    let mut app = create_app(host.clone(), summary, props! {});
    app.mount(root).unwrap();
    assert_eq!(host.to_markup(root), "<app><p>3</p></app>");

    items.set("open", 5);
    items.set("done", 4);
    run_microtasks().unwrap();
    assert_eq!(host.to_markup(root), "<app><p>9</p></app>");
}

#[test]
fn next_tick_runs_after_queued_render() {
    reset_scheduler();
    let host = Rc::new(MemoryHost::new());
    let root = host.create_root("app");
    let count = create_ref(0_i64);
    let renders = Rc::new(Cell::new(0));

    let mut app = create_app(host.clone(), counter(count.clone(), renders.clone()), props! {});
    app.mount(root).unwrap();

    count.set(7);
    let seen = Rc::new(std::cell::RefCell::new(String::new()));
    let (h2, s) = (host.clone(), seen.clone());
    next_tick(move || *s.borrow_mut() = h2.to_markup(root));

    run_microtasks().unwrap();
    assert_eq!(*seen.borrow(), "<app><b>7</b></app>");
}

#[test]
fn failed_render_is_reported_and_others_still_run() {
    reset_scheduler();
    let host = Rc::new(MemoryHost::new());
    let root = host.create_root("app");
    let trip = create_ref(false);
    let count = create_ref(0_i64);
    let renders = Rc::new(Cell::new(0));

    let fragile = {
        let trip = trip.clone();
        ComponentDef::new("Fragile")
            .with_render(move |_| {
                if trip.get() {
                    panic!("fragile render");
                }
                h("i", props! {}, "ok")
            })
            .into_rc()
    };

    let tree = h(
        "div",
        props! {},
        vec![
            component_vnode(&fragile, props! {}),
            component_vnode(&counter(count.clone(), renders.clone()), props! {}),
        ],
    );
    Renderer::new(host.clone()).render(&tree, root).unwrap();

    trip.set(true);
    count.set(1);
    let err = run_microtasks().unwrap_err();
    assert_eq!(err, RenderError::JobPanicked { message: "fragile render".into() });
    assert_eq!(renders.get(), 2);
    assert!(host.to_markup(root).contains("<b>1</b>"));
}
