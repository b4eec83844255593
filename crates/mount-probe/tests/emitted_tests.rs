//! Integration tests for emission recording

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::rc::Rc;

use mount_probe::runtime::console;
use mount_probe::{
    args, component, h, mount, Component, ComponentDef, ConsoleCapture, EventArg, MountingOptions,
    WarningKind, WrapperApi,
};
use pretty_assertions::assert_eq;

fn emitter(name: &str) -> ComponentDef {
    Component::named(name)
        .render(|ctx| {
            let handle = ctx.handle().clone();
            h("button")
                .on("click", move |_| handle.emit("pressed", args![1]))
                .text("press")
                .into()
        })
        .build()
}

// ============================================================================
// Recording
// ============================================================================

#[tokio::test]
async fn test_emissions_keep_call_order_per_event() {
    let sequence = Component::named("Sequence")
        .render(|ctx| {
            let handle = ctx.handle().clone();
            h("button")
                .on("click", move |_| {
                    handle.emit("a", args![1]);
                    handle.emit("b", args!["x"]);
                    handle.emit("a", args![2, true]);
                })
                .into()
        })
        .build();
    let wrapper = mount(&sequence, MountingOptions::new());
    wrapper.find("button").trigger("click").await.unwrap();

    let emitted = wrapper.emitted();
    assert_eq!(emitted.keys().cloned().collect::<Vec<_>>(), vec!["a".to_string(), "b".to_string()]);

    let a = wrapper.emitted_event("a").unwrap();
    assert_eq!(a.len(), 2);
    assert!(a[0][0].eq_value(&1_i32));
    assert!(a[1][0].eq_value(&2_i32));
    assert!(a[1][1].eq_value(&true));

    let order: Vec<String> = wrapper.emitted_order().into_iter().map(|e| e.event).collect();
    assert_eq!(order, vec!["a", "b", "a"]);
    assert!(wrapper.emitted_event("never").is_none());
}

#[tokio::test]
async fn test_arguments_are_recorded_by_identity() {
    let payload = EventArg::new(vec![1_u8, 2, 3]);
    let sent = payload.clone();
    let sharer = Component::named("Sharer")
        .render(move |ctx| {
            let handle = ctx.handle().clone();
            let sent = sent.clone();
            h("button")
                .on("click", move |_| handle.emit("share", vec![sent.clone()]))
                .into()
        })
        .build();
    let wrapper = mount(&sharer, MountingOptions::new());
    wrapper.find("button").trigger("click").await.unwrap();

    let calls = wrapper.emitted_event("share").unwrap();
    assert!(calls[0][0].ptr_eq(&payload));
    assert_eq!(calls[0][0].downcast_ref::<Vec<u8>>(), Some(&vec![1, 2, 3]));
}

#[test]
fn test_emits_from_lifecycle_hooks_are_recorded() {
    let eager = Component::named("Eager")
        .created(|handle| handle.emit("ready", args!["created"]))
        .mounted(|handle| handle.emit("ready", args!["mounted"]))
        .render(|_| h("div").into())
        .build();
    let wrapper = mount(&eager, MountingOptions::new());
    let ready = wrapper.emitted_event("ready").unwrap();
    assert_eq!(ready.len(), 2);
    assert!(ready[0][0].eq_value(&"created"));
    assert!(ready[1][0].eq_value(&"mounted"));
}

// ============================================================================
// Console
// ============================================================================

#[tokio::test]
async fn test_unhandled_emit_warning_is_suppressed_while_attached() {
    let capture = ConsoleCapture::start();
    let filters_before = console::filter_count();

    let wrapper = mount(&emitter("Loud"), MountingOptions::new());
    assert_eq!(console::filter_count(), filters_before + 1);
    wrapper.find("button").trigger("click").await.unwrap();
    assert!(capture.of_kind(WarningKind::UnhandledEmit).is_empty());
    assert_eq!(wrapper.emitted_event("pressed").unwrap().len(), 1);

    wrapper.unmount().unwrap();
    assert_eq!(console::filter_count(), filters_before);
}

#[test]
fn test_suppression_ends_when_wrapper_is_dropped() {
    let capture = ConsoleCapture::start();
    {
        let _wrapper = mount(&emitter("Loud"), MountingOptions::new());
    }
    assert_eq!(console::filter_count(), 0);

    // Emitting from an app nobody records reaches the console again.
    let app = mount_probe::App::new();
    let root = app.mount(&emitter("Loud"), mount_probe::runtime::MountPlan::new());
    app.handle(root).emit("pressed", Vec::new());
    let warnings = capture.of_kind(WarningKind::UnhandledEmit);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].text.contains("\"pressed\""), "{}", warnings[0].text);
}

#[tokio::test]
async fn test_unrecorded_app_still_warns_while_a_wrapper_is_attached() {
    let capture = ConsoleCapture::start();
    let wrapper = mount(&emitter("Loud"), MountingOptions::new());

    let other = mount_probe::App::new();
    let root = other.mount(&emitter("Other"), mount_probe::runtime::MountPlan::new());
    other.handle(root).emit("pressed", Vec::new());
    wrapper.find("button").trigger("click").await.unwrap();

    let warnings = capture.of_kind(WarningKind::UnhandledEmit);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].app, Some(other.id()));
    assert_eq!(wrapper.emitted_event("pressed").unwrap().len(), 1);
}

#[test]
fn test_other_warnings_still_reach_the_console() {
    let capture = ConsoleCapture::start();
    let parent = Component::named("Parent")
        .render(|_| h("div").child(mount_probe::resolve("Missing")).into())
        .build();
    let wrapper = mount(&parent, MountingOptions::new());
    assert_eq!(capture.of_kind(WarningKind::UnresolvedComponent).len(), 1);
    assert_eq!(wrapper.html(), "<div><missing></missing></div>");
}

// ============================================================================
// Scoping
// ============================================================================

#[tokio::test]
async fn test_child_wrapper_reports_only_its_own_emissions() {
    let child = emitter("Child");
    let child_ref = child.clone();
    let parent = Component::named("Parent")
        .mounted(|handle| handle.emit("parent-ready", Vec::new()))
        .render(move |_| {
            h("div")
                .child(component(&child_ref).attr("id", "first"))
                .child(component(&child_ref).attr("id", "second"))
                .into()
        })
        .build();
    let wrapper = mount(&parent, MountingOptions::new());
    wrapper.find("#second").trigger("click").await.unwrap();

    let children = wrapper.find_all_components(&child);
    assert_eq!(children.len(), 2);
    assert!(children[0].emitted().is_empty());
    assert_eq!(children[1].emitted_event("pressed").unwrap().len(), 1);
    assert!(children[1].emitted_event("parent-ready").is_none());

    let all = wrapper.emitted();
    assert!(all.contains_key("parent-ready"));
    assert!(all.contains_key("pressed"));
}

#[test]
fn test_listener_receives_emitted_arguments() {
    let received = Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = Rc::clone(&received);
    let child = Component::named("Child")
        .emits(&["pressed"])
        .mounted(|handle| handle.emit("pressed", args![7]))
        .render(|_| h("span").into())
        .build();
    let parent = Component::named("Parent")
        .render(move |_| {
            let sink = Rc::clone(&sink);
            component(&child)
                .on("pressed", move |args| {
                    sink.borrow_mut().push(*args[0].downcast_ref::<i32>().unwrap());
                })
                .into()
        })
        .build();
    let wrapper = mount(&parent, MountingOptions::new());
    assert_eq!(*received.borrow(), vec![7]);
    assert_eq!(wrapper.emitted_event("pressed").unwrap().len(), 1);
}
