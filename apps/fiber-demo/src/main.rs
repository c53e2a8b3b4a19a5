use fiber_core::{component, use_state, ComponentError, Element, Props, Root, RootConfig};
use fiber_runtime_std::StdRuntime;
use fiber_testing::{MemoryHost, MemoryNodeId};

const MAX_SLICES: usize = 1_000;

fn counter(_: &Props) -> Result<Element, ComponentError> {
    let (count, set_count) = use_state(0i32);
    let increment = set_count.clone();
    let decrement = set_count;

    let mut column = Element::host("section")
        .attr("class", "counter")
        .child(Element::host("h1").child(format!("Count: {count}")))
        .child(
            Element::host("button")
                .attr("id", "inc")
                .on("click", move |_| increment.update(|n| n + 1))
                .child("Increment"),
        )
        .child(
            Element::host("button")
                .attr("id", "dec")
                .on("click", move |_| decrement.update(|n| n - 1))
                .child("Decrement"),
        );
    if count % 2 == 0 {
        column = column.child(Element::host("p").child("even"));
    } else {
        column = column.child(Element::host("em").child("odd"));
    }
    Ok(column)
}

fn button(root: &Root<MemoryHost>, container: MemoryNodeId, id: &str) -> Option<MemoryNodeId> {
    root.with_host(|host| {
        let section = host.find_by_tag(container, "section")?;
        host.children(section).iter().copied().find(|&child| {
            host.node(child)
                .and_then(|node| node.attributes.get("id"))
                .and_then(|value| value.as_text())
                .is_some_and(|value| value == id)
        })
    })
}

fn click(root: &Root<MemoryHost>, node: MemoryNodeId) {
    // Fetch the listener first so it runs without the host borrowed.
    let listener = root.with_host(|host| host.listener(node, "click"));
    match listener {
        Some(listener) => listener.call(&()),
        None => log::warn!("node {node} has no click listener"),
    }
}

fn settle(runtime: &StdRuntime) {
    let slices = runtime.run_until_idle(MAX_SLICES);
    log::info!("settled after {slices} idle slices");
}

fn main() {
    env_logger::init();

    println!("=== Fiber Counter Demo ===");

    let runtime = StdRuntime::new();
    let mut host = MemoryHost::new();
    let container = host.create_container();
    let root = Root::new(host, runtime.scheduler(), RootConfig::default());

    root.render(component(counter, Props::new()), container);
    settle(&runtime);
    println!("{}", root.with_host(|host| host.dump_tree(container)));

    let (Some(inc), Some(dec)) = (button(&root, container, "inc"), button(&root, container, "dec"))
    else {
        eprintln!("counter buttons are missing");
        return;
    };

    for (label, node) in [("increment", inc), ("increment", inc), ("decrement", dec)] {
        click(&root, node);
        settle(&runtime);
        println!("after {label}:");
        println!("{}", root.with_host(|host| host.dump_tree(container)));
        if let Some(report) = root.last_commit() {
            println!(
                "  placements: {}, updates: {}, deletions: {}",
                report.placements, report.updates, report.deletions
            );
        }
    }

    if let Some(err) = root.take_error() {
        eprintln!("render failed: {err}");
    }
}
