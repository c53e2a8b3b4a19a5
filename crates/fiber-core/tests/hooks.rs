use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fiber_core::{
    component, text, use_state, ComponentError, Element, Props, RenderFnPtr, StateSetter,
};
use fiber_testing::{TestRoot, TickDeadline};

thread_local! {
    static RENDERS: Cell<usize> = const { Cell::new(0) };
    static SETTERS: RefCell<Vec<StateSetter<i32>>> = const { RefCell::new(Vec::new()) };
}

fn renders() -> usize {
    RENDERS.with(Cell::get)
}

fn setter(index: usize) -> StateSetter<i32> {
    SETTERS.with(|setters| setters.borrow()[index].clone())
}

/// Two independent slots; publishes their setters for the test to drive.
fn pair(_: &Props) -> Result<Element, ComponentError> {
    RENDERS.with(|count| count.set(count.get() + 1));
    let (first, set_first) = use_state(0);
    let (second, set_second) = use_state(1);
    SETTERS.with(|setters| *setters.borrow_mut() = vec![set_first, set_second]);
    Ok(text(format!("{first} {second}")))
}

#[test]
fn state_slots_accumulate_independently() {
    let harness = TestRoot::new();
    harness.render(component(pair, Props::new()));
    harness.run_until_idle();
    assert_eq!(harness.text(), "0 1");

    for _ in 0..3 {
        setter(0).update(|value| value + 1);
        setter(1).update(|value| value + 2);
        harness.run_until_idle();
    }
    assert_eq!(harness.text(), "3 7");
}

#[test]
fn updates_issued_together_render_once_in_call_order() {
    let harness = TestRoot::new();
    harness.render(component(pair, Props::new()));
    harness.run_until_idle();
    let before = renders();

    let set = setter(0);
    set.update(|value| value + 10);
    set.set(5);
    set.update(|value| value * 3);
    harness.run_until_idle();

    assert_eq!(renders() - before, 1);
    assert_eq!(harness.text(), "15 1");
    assert_eq!(harness.root().last_commit().unwrap().updates, 2);
}

#[test]
fn setters_stay_valid_across_renders() {
    let harness = TestRoot::new();
    harness.render(component(pair, Props::new()));
    harness.run_until_idle();
    let first_setter = setter(1);

    first_setter.set(10);
    harness.run_until_idle();
    first_setter.update(|value| value + 1);
    harness.run_until_idle();

    assert_eq!(harness.text(), "0 11");
}

#[test]
fn an_update_during_a_build_restarts_it_without_losing_anything() {
    let harness = TestRoot::new();
    let tree = || {
        Element::host("div").children([
            component(pair, Props::new()),
            Element::host("p").child("filler"),
            Element::host("p").child("filler"),
        ])
    };
    harness.render(tree());
    harness.run_until_idle();

    setter(0).update(|value| value + 1);
    // Stop right after the component rendered with the first update.
    harness.run_slice(&TickDeadline::new(4));
    assert!(harness.root().has_pending_work());
    setter(0).update(|value| value + 1);
    harness.run_until_idle();

    assert_eq!(harness.text(), "2 1fillerfiller");
}

#[test]
fn listeners_drive_state_changes() {
    fn clicker(_: &Props) -> Result<Element, ComponentError> {
        let (count, set_count) = use_state(0);
        Ok(Element::host("button")
            .on("click", move |_| set_count.update(|n| n + 1))
            .child(format!("clicked {count}")))
    }

    let harness = TestRoot::new();
    harness.render(component(clicker, Props::new()));
    harness.run_until_idle();
    let button = harness.find("button").unwrap();

    assert!(harness.dispatch(button, "click", &()));
    assert!(harness.dispatch(button, "click", &()));
    harness.run_until_idle();

    assert_eq!(harness.text(), "clicked 2");
    assert_eq!(harness.find("button"), Some(button), "the host node is reused");
}

#[test]
fn components_render_with_their_props() {
    fn greeting(props: &Props) -> Result<Element, ComponentError> {
        let name = props
            .get("name")
            .and_then(|value| value.as_text())
            .ok_or("missing name")?;
        Ok(Element::host("h1").child(format!("Hello, {name}")))
    }

    let harness = TestRoot::new();
    let mut props = Props::new();
    props.set("name", "world");
    harness.render(Element::host("main").child(component(greeting, props)));
    harness.run_until_idle();
    assert_eq!(harness.text(), "Hello, world");
}

#[test]
fn swapping_a_component_for_another_drops_its_state() {
    fn one(_: &Props) -> Result<Element, ComponentError> {
        let (value, _) = use_state(String::from("one"));
        Ok(text(value))
    }
    fn two(_: &Props) -> Result<Element, ComponentError> {
        let (value, _) = use_state(2);
        Ok(text(value.to_string()))
    }

    let harness = TestRoot::new();
    harness.render(component(one, Props::new()));
    harness.run_until_idle();
    harness.render(component(two, Props::new()));
    harness.run_until_idle();

    assert!(harness.root().take_error().is_none());
    assert_eq!(harness.text(), "2");
    assert_eq!(harness.root().last_commit().unwrap().deletions, 1);
}

#[test]
fn updates_after_the_root_is_dropped_are_ignored() {
    let captured = Rc::new(RefCell::new(None));
    {
        let harness = TestRoot::new();
        harness.render(component(pair, Props::new()));
        harness.run_until_idle();
        *captured.borrow_mut() = Some(setter(0));
    }
    let set = captured.borrow_mut().take().unwrap();
    set.set(3);
}

#[test]
fn rerendering_with_new_props_updates_in_place() {
    fn greeting(props: &Props) -> Result<Element, ComponentError> {
        let name = props
            .get("name")
            .and_then(|value| value.as_text())
            .ok_or("missing name")?;
        Ok(Element::host("h1").child(format!("Hello, {name}")))
    }
    let greet = |name: &str| {
        let mut props = Props::new();
        props.set("name", name);
        Element::host("main").child(component(greeting, props))
    };

    let harness = TestRoot::new();
    harness.render(greet("world"));
    harness.run_until_idle();
    let heading = harness.find("h1").unwrap();

    harness.render(greet("there"));
    harness.run_until_idle();

    assert_eq!(harness.text(), "Hello, there");
    assert_eq!(harness.find("h1"), Some(heading));
    assert!(!harness.root().last_commit().unwrap().is_structural());
}

#[test]
fn rerendering_a_closure_sees_its_new_captures_and_keeps_state() {
    fn labelled(label: &'static str) -> Element {
        component(
            move |_| {
                let (count, _) = use_state(7);
                Ok(text(format!("{label} {count}")))
            },
            Props::new(),
        )
    }

    let harness = TestRoot::new();
    harness.render(labelled("first"));
    harness.run_until_idle();
    assert_eq!(harness.text(), "first 7");

    harness.render(labelled("second"));
    harness.run_until_idle();

    assert!(harness.root().take_error().is_none());
    assert_eq!(harness.text(), "second 7");
    assert_eq!(harness.root().last_commit().unwrap().deletions, 0);
}

#[test]
fn function_pointer_components_are_distinct_components() {
    fn one(_: &Props) -> Result<Element, ComponentError> {
        let (value, _) = use_state(String::from("one"));
        Ok(text(value))
    }
    fn two(_: &Props) -> Result<Element, ComponentError> {
        let (value, _) = use_state(2);
        Ok(text(value.to_string()))
    }
    let table: [RenderFnPtr; 2] = [one, two];

    let harness = TestRoot::new();
    harness.render(component(table[0], Props::new()));
    harness.run_until_idle();
    assert_eq!(harness.text(), "one");

    harness.render(component(table[1], Props::new()));
    harness.run_until_idle();

    assert!(harness.root().take_error().is_none());
    assert_eq!(harness.text(), "2");
    assert_eq!(harness.root().last_commit().unwrap().deletions, 1);
}
